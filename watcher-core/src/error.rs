//! Error types for the watcher core.
//!
//! [`WatcherError`] is the top-level error; [`NotifyError`] is returned by
//! [`crate::Notifier`] implementations.

use thiserror::Error;

/// Top-level error for the watcher (config, transport, notifier, handler, state, IO).
#[derive(Error, Debug)]
pub enum WatcherError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Notify error: {0}")]
    Notify(#[from] NotifyError),

    #[error("Handler error: {0}")]
    Handler(String),

    #[error("State error: {0}")]
    State(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors produced while talking to the notification sink.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotifyError {
    /// The bus connection or the remote endpoint could not be set up.
    #[error("Notifier connection failed: {0}")]
    Connection(String),

    /// The remote `notify` call failed.
    #[error("Notifier call failed: {0}")]
    Call(String),
}

/// Result type for core operations; uses [`WatcherError`].
pub type Result<T> = std::result::Result<T, WatcherError>;
