//! Handler trait and transport conversion trait.

use async_trait::async_trait;

use super::{message::InboundMessage, response::HandlerResponse};

/// Converts a transport-specific message stanza to core [`InboundMessage`].
pub trait ToInboundMessage: Send + Sync {
    fn to_inbound(&self) -> InboundMessage;
}

/// Single handler concept: optional before / handle / after.
/// Chain runs all before → handle until Stop → all after (reverse).
#[async_trait]
pub trait Handler: Send + Sync {
    /// Runs before the handle phase. Return false to stop the chain.
    async fn before(&self, _message: &InboundMessage) -> crate::error::Result<bool> {
        Ok(true)
    }
    /// Processes the message. Return Stop to end the handle phase. Default: Continue.
    async fn handle(&self, _message: &InboundMessage) -> crate::error::Result<HandlerResponse> {
        Ok(HandlerResponse::Continue)
    }
    /// Runs after the handle phase (reverse order), with the final response.
    async fn after(
        &self,
        _message: &InboundMessage,
        _response: &HandlerResponse,
    ) -> crate::error::Result<()> {
        Ok(())
    }
}
