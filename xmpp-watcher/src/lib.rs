//! # XMPP room watcher
//!
//! Keeps an XMPP session, joins the configured rooms and relays messages from bot accounts
//! to the desktop status notifier. The session engine talks to the server through the
//! [`transport::Transport`] seam; [`transport::XmppConnector`] is the `tokio-xmpp` implementation.

pub mod classifier;
pub mod cli;
pub mod config;
pub mod relay;
pub mod runner;
pub mod session;
pub mod transport;

pub use classifier::classify;
pub use cli::Cli;
pub use config::{ConfigOverrides, SessionConfig};
pub use relay::{relay, BotRelayHandler, RelayOutcome, RELAY_LEVEL};
pub use runner::{run_watcher, start, start_with_connector, RunOptions, ShutdownHandle, Watcher};
pub use session::{
    ConnectionState, ProtocolSession, RoomMembership, RoomMemberships, SessionEvent, SessionStatus,
};
pub use transport::{
    Connector, JoinRequest, PresenceShow, PresenceUpdate, ServerAddress, Transport,
    TransportConfig, TransportError, TransportEvent,
};

pub use watcher_core::{
    ClassifiedEvent, Handler, HandlerResponse, InboundMessage, MessageKind, Notifier, NotifyError,
    NotifyLevel, Sender, WatcherError,
};
