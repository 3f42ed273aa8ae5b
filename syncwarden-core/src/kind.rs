//! [`NotificationKind`], the set of high-level notifications a user can enable.
//!
//! Behaves like a C-style flag enum: values combine with `|` and every bit is
//! tested independently with [`NotificationKind::contains`].

use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Bit set of enabled high-level notifications.
///
/// In YAML/JSON the set is written as a list of kebab-case names:
/// `[connected-disconnected, new-device]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct NotificationKind(u8);

impl NotificationKind {
    pub const NONE: Self = Self(0x0);
    pub const CONNECTED_DISCONNECTED: Self = Self(0x1);
    pub const LOCAL_SYNC_COMPLETE: Self = Self(0x2);
    pub const REMOTE_SYNC_COMPLETE: Self = Self(0x4);
    pub const NEW_DEVICE: Self = Self(0x8);
    pub const NEW_DIR: Self = Self(0x10);
    pub const ALL: Self = Self(0x1f);

    const NAMED: [(Self, &'static str); 5] = [
        (Self::CONNECTED_DISCONNECTED, "connected-disconnected"),
        (Self::LOCAL_SYNC_COMPLETE, "local-sync-complete"),
        (Self::REMOTE_SYNC_COMPLETE, "remote-sync-complete"),
        (Self::NEW_DEVICE, "new-device"),
        (Self::NEW_DIR, "new-dir"),
    ];

    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Builds a set from raw bits, dropping bits that name no notification.
    pub const fn from_bits_truncate(bits: u8) -> Self {
        Self(bits & Self::ALL.0)
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// `true` iff every bit of `other` is set. `NONE` is never contained.
    pub const fn contains(self, other: Self) -> bool {
        other.0 != 0 && self.0 & other.0 == other.0
    }

    /// Names of the set bits, in declaration order.
    pub fn names(self) -> impl Iterator<Item = &'static str> {
        Self::NAMED
            .into_iter()
            .filter(move |(flag, _)| self.contains(*flag))
            .map(|(_, name)| name)
    }
}

impl BitOr for NotificationKind {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for NotificationKind {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl FromIterator<NotificationKind> for NotificationKind {
    fn from_iter<I: IntoIterator<Item = NotificationKind>>(iter: I) -> Self {
        iter.into_iter().fold(Self::NONE, |acc, kind| acc | kind)
    }
}

impl FromStr for NotificationKind {
    type Err = ConfigError;

    /// Parses a single flag name; `none` and `all` are accepted as well.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase().replace('_', "-");
        match name.as_str() {
            "none" => return Ok(Self::NONE),
            "all" => return Ok(Self::ALL),
            _ => {}
        }
        Self::NAMED
            .into_iter()
            .find(|(_, candidate)| *candidate == name)
            .map(|(flag, _)| flag)
            .ok_or_else(|| ConfigError::UnknownNotification {
                name: s.to_string(),
            })
    }
}

impl TryFrom<Vec<String>> for NotificationKind {
    type Error = ConfigError;

    fn try_from(names: Vec<String>) -> Result<Self, Self::Error> {
        names.iter().map(|name| name.parse::<Self>()).collect()
    }
}

impl From<NotificationKind> for Vec<String> {
    fn from(kind: NotificationKind) -> Self {
        kind.names().map(str::to_string).collect()
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "none");
        }
        let names: Vec<&str> = self.names().collect();
        write!(f, "{}", names.join("|"))
    }
}
