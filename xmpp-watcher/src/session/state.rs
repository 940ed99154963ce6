//! Connection lifecycle states and the allowed transitions between them.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    SessionEstablished,
    RoomsJoining,
    Active,
    Closing,
}

impl ConnectionState {
    /// Whether `self → next` is a legal move. Every live state may move to `Closing`.
    pub fn can_transition_to(self, next: ConnectionState) -> bool {
        use ConnectionState::*;
        matches!(
            (self, next),
            (Disconnected, Connecting)
                | (Connecting, Connected)
                | (Connecting, Disconnected)
                | (Connected, SessionEstablished)
                | (SessionEstablished, RoomsJoining)
                | (RoomsJoining, Active)
                | (Closing, Disconnected)
                | (Connecting | Connected | SessionEstablished | RoomsJoining | Active, Closing)
        )
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::SessionEstablished => "session_established",
            ConnectionState::RoomsJoining => "rooms_joining",
            ConnectionState::Active => "active",
            ConnectionState::Closing => "closing",
        };
        f.write_str(s)
    }
}
