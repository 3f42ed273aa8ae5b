//! `syncwarden config show|init|path`

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use syncwarden_core::config::{self, Config};

use super::home;

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the effective configuration (defaults when no file exists).
    Show {
        /// Emit JSON instead of a table.
        #[arg(long)]
        json: bool,
    },
    /// Write the default configuration if none exists.
    Init,
    /// Print the configuration file path.
    Path,
}

#[derive(Tabled)]
struct SettingRow {
    #[tabled(rename = "setting")]
    key: &'static str,
    #[tabled(rename = "value")]
    value: String,
}

pub fn run(command: ConfigCommand) -> Result<()> {
    let home = home()?;
    let path = config::config_path_at(&home);

    match command {
        ConfigCommand::Show { json } => {
            let config = config::load_or_default_at(&home)
                .with_context(|| format!("failed to load {}", path.display()))?;
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&config)
                        .context("failed to render config JSON")?
                );
            } else {
                let mut table = Table::new(rows(&config));
                table.with(Style::rounded());
                println!("{table}");
                if !path.exists() {
                    println!("(defaults; run 'syncwarden config init' to write {})", path.display());
                }
            }
        }
        ConfigCommand::Init => {
            let existed = path.exists();
            config::init_at(&home)
                .with_context(|| format!("failed to initialize {}", path.display()))?;
            if existed {
                println!("config already exists: {}", path.display());
            } else {
                println!("{} Wrote default config to {}", "✓".green(), path.display());
            }
        }
        ConfigCommand::Path => println!("{}", path.display()),
    }
    Ok(())
}

fn rows(config: &Config) -> Vec<SettingRow> {
    vec![
        SettingRow {
            key: "program",
            value: config.program.clone(),
        },
        SettingRow {
            key: "arguments",
            value: config.arguments.join(" "),
        },
        SettingRow {
            key: "enabled_notifications",
            value: config.enabled_notifications.to_string(),
        },
        SettingRow {
            key: "ignore_inavailability_after_start",
            value: format!("{}s", config.ignore_inavailability_after_start),
        },
        SettingRow {
            key: "kill_timeout_secs",
            value: format!("{}s", config.kill_timeout_secs),
        },
        SettingRow {
            key: "auto_confirm_kill",
            value: config.auto_confirm_kill.to_string(),
        },
    ]
}
