//! Process supervision for the synchronization daemon and the foreground
//! runtime that ties it to the notification aggregator.

pub mod backend;
mod error;
pub mod process;
mod replay;
mod runtime;

pub use backend::{ExitStatus, ProcessBackend, ProcessEvent, TokioBackend};
pub use error::DaemonError;
pub use process::{main_instance, set_main_instance, SupervisorSignal, SyncthingProcess};
pub use replay::{replay, replay_file, ReplaySummary};
pub use runtime::{
    format_notification, init_tracing, run, start_blocking, EventSource, RunOptions, RunSummary,
    Runtime, RuntimeCommand, LOCAL_CONNECTION,
};
