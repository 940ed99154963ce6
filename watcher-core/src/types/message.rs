//! Inbound message and sender types for the core model.

/// Stanza type of an inbound message, reduced to what the watcher cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageKind {
    /// One-to-one message (`chat` or `normal`).
    Direct,
    /// Message broadcast in a multi-user room.
    Groupchat,
    /// Anything else (`error`, `headline`, ...); carries the wire label for logging.
    Other(String),
}

/// Who sent a message: bare address, its local-part and, for room traffic, the nickname.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sender {
    /// `local@domain` (for room traffic this is the room address).
    pub bare: String,
    /// Local-part of `bare`; empty when the address has none.
    pub local: String,
    /// In-room nickname (the resource of a room occupant address).
    pub nickname: Option<String>,
}

impl Sender {
    /// Builds a sender from a bare address; the local-part is everything before the first `@`.
    pub fn from_bare(bare: impl Into<String>) -> Self {
        let bare = bare.into();
        let local = match bare.split_once('@') {
            Some((local, _)) => local.to_string(),
            None => String::new(),
        };
        Self {
            bare,
            local,
            nickname: None,
        }
    }

    /// Attaches an in-room nickname; empty nicknames are treated as absent.
    pub fn with_nickname(mut self, nickname: Option<String>) -> Self {
        self.nickname = nickname.filter(|n| !n.is_empty());
        self
    }
}

/// A single message received from the transport. Consumed immediately by the handler chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub kind: MessageKind,
    pub sender: Sender,
    pub body: String,
}

impl InboundMessage {
    pub fn new(kind: MessageKind, sender: Sender, body: impl Into<String>) -> Self {
        Self {
            kind,
            sender,
            body: body.into(),
        }
    }

    pub fn direct(from_bare: &str, body: &str) -> Self {
        Self::new(MessageKind::Direct, Sender::from_bare(from_bare), body)
    }

    pub fn groupchat(room: &str, nickname: Option<&str>, body: &str) -> Self {
        let sender = Sender::from_bare(room).with_nickname(nickname.map(str::to_string));
        Self::new(MessageKind::Groupchat, sender, body)
    }
}
