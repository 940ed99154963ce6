//! Log-only notifier, selected explicitly with `--log-only`.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tracing::warn;
use watcher_core::{Notifier, NotifyError, NotifyLevel};

/// Writes every notification to the log at warn level. Never fails.
#[derive(Debug, Default)]
pub struct LogNotifier {
    sent: AtomicUsize,
}

impl LogNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of notifications written so far.
    pub fn sent(&self) -> usize {
        self.sent.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, level: NotifyLevel, message: &str) -> Result<(), NotifyError> {
        self.sent.fetch_add(1, Ordering::SeqCst);
        warn!(level = %level, message = %message, "notification");
        Ok(())
    }
}
