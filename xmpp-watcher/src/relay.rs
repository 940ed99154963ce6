//! Relay: forwards bot messages to the notifier. Notifier failures are logged and swallowed.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info, instrument};
use watcher_core::{
    ClassifiedEvent, Handler, HandlerResponse, InboundMessage, Notifier, NotifyError, NotifyLevel,
    Result,
};

use crate::classifier::classify;
use crate::config::SessionConfig;

/// Severity used for relayed bot messages; high-visibility in the desktop sink.
pub const RELAY_LEVEL: NotifyLevel = NotifyLevel::Error;

/// Result of one relay attempt. Never an error: the session must not see notifier failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome {
    Delivered,
    Failed(NotifyError),
}

/// Sends `"{author}: {body}"` to the notifier once, logging any failure.
#[instrument(skip(notifier, event), fields(author = %event.author))]
pub async fn relay(
    notifier: &dyn Notifier,
    level: NotifyLevel,
    event: &ClassifiedEvent,
) -> RelayOutcome {
    info!("{} SAID: {}", event.author, event.body);

    match notifier.notify(level, &event.notification_text()).await {
        Ok(()) => RelayOutcome::Delivered,
        Err(e) => {
            error!(level = %level, error = %e, "Failed to send notification");
            RelayOutcome::Failed(e)
        }
    }
}

/// Chain handler that classifies each message and relays bot messages.
pub struct BotRelayHandler {
    config: Arc<SessionConfig>,
    notifier: Arc<dyn Notifier>,
    level: NotifyLevel,
}

impl BotRelayHandler {
    pub fn new(config: Arc<SessionConfig>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            config,
            notifier,
            level: RELAY_LEVEL,
        }
    }

    pub fn with_level(mut self, level: NotifyLevel) -> Self {
        self.level = level;
        self
    }
}

#[async_trait]
impl Handler for BotRelayHandler {
    async fn handle(&self, message: &InboundMessage) -> Result<HandlerResponse> {
        match classify(message, &self.config) {
            Some(event) => {
                // Delivered or not, the message is consumed; failures were logged by relay().
                relay(self.notifier.as_ref(), self.level, &event).await;
                Ok(HandlerResponse::Stop)
            }
            None => Ok(HandlerResponse::Continue),
        }
    }
}
