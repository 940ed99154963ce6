//! Maps an inbound message to a bot event, or nothing.

use watcher_core::{ClassifiedEvent, InboundMessage, MessageKind};

use crate::config::SessionConfig;

/// Returns the bot event for `msg`, or `None` when the author is not an allowlisted bot.
///
/// Direct messages are attributed to the sender's local-part. Room messages are attributed to
/// the in-room nickname, falling back to the local-part. Other stanza kinds and empty bodies
/// are ignored.
pub fn classify(msg: &InboundMessage, config: &SessionConfig) -> Option<ClassifiedEvent> {
    let author = match &msg.kind {
        MessageKind::Direct => msg.sender.local.as_str(),
        MessageKind::Groupchat => msg
            .sender
            .nickname
            .as_deref()
            .unwrap_or(msg.sender.local.as_str()),
        MessageKind::Other(_) => return None,
    };

    if msg.body.is_empty() || author.is_empty() || !config.is_bot(author) {
        return None;
    }

    Some(ClassifiedEvent::new(author, msg.body.clone()))
}
