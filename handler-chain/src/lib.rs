//! # Handler chain
//!
//! Runs a sequence of handlers for each inbound message. Each handler has optional
//! before/handle/after: all before run in order (any false stops the chain); then handle
//! runs until Stop; then all after run in reverse.

use std::sync::Arc;

use tracing::{debug, info, instrument};
use watcher_core::{Handler, HandlerResponse, InboundMessage, Result};

/// Chain of handlers: before (all) → handle (until Stop) → after (reverse).
#[derive(Clone, Default)]
pub struct HandlerChain {
    handlers: Vec<Arc<dyn Handler>>,
}

impl HandlerChain {
    /// Creates an empty chain.
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    /// Appends a handler (runs in order; first Stop ends the handle phase).
    pub fn add_handler(mut self, handler: Arc<dyn Handler>) -> Self {
        self.handlers.push(handler);
        self
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Runs all before → handle until Stop → all after in reverse.
    /// Returns Stop if any handler stopped, else Continue.
    #[instrument(skip(self, message), fields(sender = %message.sender.bare))]
    pub async fn handle(&self, message: &InboundMessage) -> Result<HandlerResponse> {
        let mut final_response = HandlerResponse::Continue;

        debug!(
            kind = ?message.kind,
            nickname = ?message.sender.nickname,
            "step: handler_chain started"
        );

        for h in &self.handlers {
            let name = std::any::type_name_of_val(h.as_ref());
            let should_continue = h.before(message).await?;
            if !should_continue {
                info!(handler = %name, "step: before returned false, chain stopped");
                return Ok(HandlerResponse::Stop);
            }
        }

        for h in &self.handlers {
            let name = std::any::type_name_of_val(h.as_ref());
            let response = h.handle(message).await?;
            debug!(handler = %name, response = ?response, "Handler processed");

            match response {
                HandlerResponse::Stop => {
                    debug!(handler = %name, "step: handler chain stopped by handler");
                    final_response = response;
                    break;
                }
                HandlerResponse::Continue => {}
            }
        }

        for h in self.handlers.iter().rev() {
            h.after(message, &final_response).await?;
        }

        debug!(response = ?final_response, "step: handler_chain finished");

        Ok(final_response)
    }
}

// Unit/integration tests live in tests/handler_chain_test.rs
