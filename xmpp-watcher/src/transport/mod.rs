//! Transport seam between the protocol session and the XMPP library.
//!
//! [`Transport`] is what the session drives; [`xmpp::XmppConnector`] builds the
//! implementation over a real client stream. Tests substitute scripted transports.

mod adapters;
mod stream;
mod tls;
pub mod xmpp;

use async_trait::async_trait;
use thiserror::Error;
use watcher_core::{InboundMessage, WatcherError};

pub use adapters::{
    is_history_replay, join_presence, message_event, presence_event, roster_request,
    status_presence, XmppMessageWrapper,
};
pub use stream::{establish, order_srv_targets, select_mechanism, SrvTarget};
pub use tls::TlsSettings;
pub use xmpp::{XmppConnector, XmppTransport};

/// Where the transport connects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerAddress {
    /// Resolve the account domain through DNS SRV records.
    Srv,
    /// Connect to this host and port directly.
    Explicit { host: String, port: u16 },
}

/// Everything the transport library needs to open a client stream.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Account address, `local@domain`.
    pub jid: String,
    pub password: String,
    pub address: ServerAddress,
    /// When false, the server certificate is not checked during the TLS handshake.
    pub validate_certificate: bool,
}

/// Presence broadcast on session start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceUpdate {
    pub show: PresenceShow,
    pub status: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceShow {
    Available,
    Away,
    Chat,
    DoNotDisturb,
    ExtendedAway,
}

/// A request to join one multi-user room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinRequest {
    /// Room address, `name@service`.
    pub room: String,
    pub nickname: String,
    pub password: Option<String>,
}

/// Events delivered by the transport, in wire order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Stream negotiated, authenticated and bound.
    Online { bound_jid: String },
    Message(InboundMessage),
    /// The room acknowledged our join (self-presence received).
    RoomJoined { room: String },
    /// The room answered our join with an error presence.
    RoomJoinFailed { room: String, reason: String },
    /// The connection is gone. Before `Online` this means the handshake failed.
    Disconnected { reason: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Connect failed: {0}")]
    Connect(String),

    #[error("TLS failed: {0}")]
    Tls(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Send failed: {0}")]
    Send(String),

    #[error("Transport closed")]
    Closed,

    #[error("Invalid address: {0}")]
    InvalidAddress(String),
}

impl From<TransportError> for WatcherError {
    fn from(e: TransportError) -> Self {
        WatcherError::Transport(e.to_string())
    }
}

/// An open client stream. Owned exclusively by one protocol session.
#[async_trait]
pub trait Transport: Send {
    /// Next event; `None` once the stream has ended. Must be cancel-safe.
    async fn next_event(&mut self) -> Option<TransportEvent>;
    async fn send_presence(&mut self, presence: &PresenceUpdate) -> Result<(), TransportError>;
    /// Asks the server for the contact roster; the answer is not surfaced.
    async fn request_roster(&mut self) -> Result<(), TransportError>;
    /// Sends the join presence; the outcome arrives later as `RoomJoined` or `RoomJoinFailed`.
    async fn join_room(&mut self, request: &JoinRequest) -> Result<(), TransportError>;
    /// Ends the stream and releases the connection.
    async fn close(&mut self) -> Result<(), TransportError>;
}

/// Opens transports. `connect` returns once the attempt has been issued;
/// the outcome arrives as events.
pub trait Connector: Send + Sync {
    fn connect(&self, config: TransportConfig) -> Result<Box<dyn Transport>, TransportError>;
}
