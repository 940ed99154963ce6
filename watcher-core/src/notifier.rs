//! Notification sink abstraction.
//!
//! [`Notifier`] is transport-agnostic; dbus-notifier implements it over the D-Bus session bus.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;

use crate::error::NotifyError;

/// Severity understood by the desktop status sink. Rendered lower-case on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotifyLevel {
    Normal,
    Success,
    Notice,
    Info,
    Warn,
    Critical,
    Error,
}

impl NotifyLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotifyLevel::Normal => "normal",
            NotifyLevel::Success => "success",
            NotifyLevel::Notice => "notice",
            NotifyLevel::Info => "info",
            NotifyLevel::Warn => "warn",
            NotifyLevel::Critical => "critical",
            NotifyLevel::Error => "error",
        }
    }
}

impl fmt::Display for NotifyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotifyLevel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "normal" => Ok(NotifyLevel::Normal),
            "success" => Ok(NotifyLevel::Success),
            "notice" => Ok(NotifyLevel::Notice),
            "info" => Ok(NotifyLevel::Info),
            "warn" => Ok(NotifyLevel::Warn),
            "critical" => Ok(NotifyLevel::Critical),
            "error" => Ok(NotifyLevel::Error),
            other => Err(format!("Unknown notify level: {}", other)),
        }
    }
}

/// Sends one notification to an external sink. Calls are sequential from the session loop.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Delivers `message` at `level`. Failures are reported, never retried here.
    async fn notify(&self, level: NotifyLevel, message: &str) -> Result<(), NotifyError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_round_trip_through_str() {
        for level in [
            NotifyLevel::Normal,
            NotifyLevel::Success,
            NotifyLevel::Notice,
            NotifyLevel::Info,
            NotifyLevel::Warn,
            NotifyLevel::Critical,
            NotifyLevel::Error,
        ] {
            assert_eq!(level.as_str().parse::<NotifyLevel>().unwrap(), level);
        }
    }

    #[test]
    fn test_level_parse_is_case_insensitive() {
        assert_eq!("ERROR".parse::<NotifyLevel>().unwrap(), NotifyLevel::Error);
        assert_eq!(" warn ".parse::<NotifyLevel>().unwrap(), NotifyLevel::Warn);
    }

    #[test]
    fn test_level_parse_unknown() {
        assert!("fatal".parse::<NotifyLevel>().is_err());
    }

    #[test]
    fn test_level_display() {
        assert_eq!(NotifyLevel::Error.to_string(), "error");
    }
}
