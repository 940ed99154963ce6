//! The session engine. Owns the transport exclusively and runs on a single task:
//! transport events, room joins and handler dispatch are strictly sequential.

use std::sync::Arc;

use handler_chain::HandlerChain;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use watcher_core::{InboundMessage, Result, WatcherError};

use super::membership::{RoomMembership, RoomMemberships};
use super::state::ConnectionState;
use crate::config::SessionConfig;
use crate::transport::{
    Connector, JoinRequest, PresenceShow, PresenceUpdate, ServerAddress, Transport,
    TransportConfig, TransportEvent,
};

/// Snapshot published on every state or membership change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStatus {
    pub state: ConnectionState,
    pub rooms: Vec<RoomMembership>,
}

/// Events the session reacts to, one variant per handler kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    SessionStart { bound_jid: String },
    Message(InboundMessage),
}

enum Flow {
    Continue,
    Stop,
}

enum Polled {
    Event(TransportEvent),
    Ended,
    TimedOut,
    Shutdown,
}

enum JoinWait {
    Confirmed,
    Failed(String),
    TimedOut,
    Lost(String),
    Shutdown,
}

pub struct ProtocolSession {
    config: Arc<SessionConfig>,
    chain: HandlerChain,
    transport: Option<Box<dyn Transport>>,
    memberships: RoomMemberships,
    status: watch::Sender<SessionStatus>,
    shutdown: CancellationToken,
}

impl ProtocolSession {
    pub fn new(config: Arc<SessionConfig>, chain: HandlerChain) -> Self {
        let (status, _) = watch::channel(SessionStatus {
            state: ConnectionState::Disconnected,
            rooms: Vec::new(),
        });
        Self {
            config,
            chain,
            transport: None,
            memberships: RoomMemberships::new(),
            status,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.status.borrow().state
    }

    /// Receiver for state and membership changes.
    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.status.subscribe()
    }

    /// Token that ends `run()` when cancelled. Cancellation is permanent for this session.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Issues the connection attempt. `address` wins over the configured host/port,
    /// which win over SRV. The outcome is observed through state changes while `run()`
    /// drives the session.
    #[instrument(skip(self, connector), fields(user = %self.config.user))]
    pub fn connect(
        &mut self,
        connector: &dyn Connector,
        address: Option<ServerAddress>,
    ) -> Result<()> {
        let current = self.state();
        if current != ConnectionState::Disconnected {
            return Err(WatcherError::State(format!(
                "connect() called while {}",
                current
            )));
        }

        let address = address.unwrap_or_else(|| self.config.server_address());
        info!(address = ?address, "Connecting");
        self.transition(ConnectionState::Connecting)?;

        let transport_config = TransportConfig {
            jid: self.config.user.clone(),
            password: self.config.password.clone(),
            address,
            validate_certificate: self.config.validate_certificate,
        };

        match connector.connect(transport_config) {
            Ok(transport) => {
                self.transport = Some(transport);
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Connection attempt failed");
                self.transition(ConnectionState::Disconnected)?;
                Err(e.into())
            }
        }
    }

    /// Drives the session until shutdown or loss of the transport. The transport is closed
    /// on every exit path.
    ///
    /// Returns an error only when the session never came up (handshake or authentication failure).
    pub async fn run(&mut self) -> Result<()> {
        if self.transport.is_none() {
            return Err(WatcherError::State("run() called before connect()".to_string()));
        }
        let result = self.drive().await;
        self.teardown().await;
        result
    }

    async fn drive(&mut self) -> Result<()> {
        let shutdown = self.shutdown.clone();
        loop {
            match self.poll(&shutdown, None).await {
                Polled::Shutdown => {
                    info!(state = %self.state(), "Shutdown requested");
                    return Ok(());
                }
                Polled::TimedOut => {}
                Polled::Ended => return self.on_transport_lost("stream ended"),
                Polled::Event(event) => match event {
                    TransportEvent::Online { bound_jid } => {
                        let start = SessionEvent::SessionStart { bound_jid };
                        if let Flow::Stop = self.dispatch(start).await? {
                            return Ok(());
                        }
                    }
                    TransportEvent::Message(message) => {
                        self.dispatch(SessionEvent::Message(message)).await?;
                    }
                    TransportEvent::RoomJoined { room } => self.on_room_joined(&room),
                    TransportEvent::RoomJoinFailed { room, reason } => {
                        self.on_room_failed(&room, &reason)
                    }
                    TransportEvent::Disconnected { reason } => {
                        return self.on_transport_lost(&reason);
                    }
                },
            }
        }
    }

    async fn dispatch(&mut self, event: SessionEvent) -> Result<Flow> {
        match event {
            SessionEvent::SessionStart { bound_jid } => {
                if self.state() != ConnectionState::Connecting {
                    warn!(
                        state = %self.state(),
                        bound_jid = %bound_jid,
                        "Ignoring repeated session start"
                    );
                    return Ok(Flow::Continue);
                }
                self.on_session_start(&bound_jid).await
            }
            SessionEvent::Message(message) => {
                deliver(&self.chain, &message).await;
                Ok(Flow::Continue)
            }
        }
    }

    /// Presence and roster are best-effort; joins follow regardless.
    #[instrument(skip(self))]
    async fn on_session_start(&mut self, bound_jid: &str) -> Result<Flow> {
        self.transition(ConnectionState::Connected)?;
        self.transition(ConnectionState::SessionEstablished)?;
        info!("Session started");

        let presence = PresenceUpdate {
            show: PresenceShow::DoNotDisturb,
            status: self.config.status.clone(),
        };
        if let Err(e) = self.transport()?.send_presence(&presence).await {
            warn!(error = %e, operation = "send_presence", "Presence broadcast failed");
        }
        if let Err(e) = self.transport()?.request_roster().await {
            warn!(error = %e, operation = "request_roster", "Roster request failed");
        }

        self.join_rooms().await
    }

    /// Joins configured rooms one at a time, in order. Each join is acknowledged, failed or
    /// timed out before the next is issued.
    async fn join_rooms(&mut self) -> Result<Flow> {
        self.transition(ConnectionState::RoomsJoining)?;

        let config = self.config.clone();
        let nickname = config.nickname().to_string();

        for room in &config.rooms {
            if self.shutdown.is_cancelled() {
                info!(room = %room, "Shutdown requested during room joins");
                return Ok(Flow::Stop);
            }

            let request = JoinRequest {
                room: room.clone(),
                nickname: nickname.clone(),
                password: Some(config.password.clone()),
            };
            self.memberships.request(room);
            self.publish_rooms();
            info!(room = %room, nickname = %nickname, "Joining room");

            if let Err(e) = self.transport()?.join_room(&request).await {
                error!(room = %room, error = %e, "Room join request failed");
                self.memberships.fail(room, e.to_string());
                self.publish_rooms();
                continue;
            }

            match self.await_join(room).await {
                JoinWait::Confirmed => info!(room = %room, "Joined room"),
                JoinWait::Failed(reason) => {
                    warn!(room = %room, reason = %reason, "Room join failed")
                }
                JoinWait::TimedOut => warn!(
                    room = %room,
                    timeout_secs = config.join_timeout.as_secs(),
                    "Room join timed out"
                ),
                JoinWait::Lost(reason) => {
                    self.on_transport_lost(&reason)?;
                    return Ok(Flow::Stop);
                }
                JoinWait::Shutdown => {
                    info!(room = %room, "Shutdown requested during room joins");
                    return Ok(Flow::Stop);
                }
            }
        }

        self.transition(ConnectionState::Active)?;
        info!(
            joined = self.memberships.confirmed_count(),
            configured = config.rooms.len(),
            "Watcher active"
        );
        Ok(Flow::Continue)
    }

    /// Waits for the outcome of the join just issued for `room`, delivering messages that
    /// arrive meanwhile.
    async fn await_join(&mut self, room: &str) -> JoinWait {
        let shutdown = self.shutdown.clone();
        let deadline = Instant::now() + self.config.join_timeout;

        loop {
            match self.poll(&shutdown, Some(deadline)).await {
                Polled::Shutdown => return JoinWait::Shutdown,
                Polled::Ended => return JoinWait::Lost("stream ended".to_string()),
                Polled::TimedOut => {
                    self.memberships.fail(room, "timeout");
                    self.publish_rooms();
                    return JoinWait::TimedOut;
                }
                Polled::Event(TransportEvent::RoomJoined { room: joined }) if joined == room => {
                    self.memberships.confirm(room);
                    self.publish_rooms();
                    return JoinWait::Confirmed;
                }
                Polled::Event(TransportEvent::RoomJoinFailed { room: failed, reason })
                    if failed == room =>
                {
                    self.memberships.fail(room, reason.clone());
                    self.publish_rooms();
                    return JoinWait::Failed(reason);
                }
                Polled::Event(TransportEvent::RoomJoined { room: other }) => {
                    self.on_room_joined(&other)
                }
                Polled::Event(TransportEvent::RoomJoinFailed { room: other, reason }) => {
                    self.on_room_failed(&other, &reason)
                }
                Polled::Event(TransportEvent::Message(message)) => {
                    deliver(&self.chain, &message).await
                }
                Polled::Event(TransportEvent::Online { bound_jid }) => {
                    debug!(bound_jid = %bound_jid, "Ignoring online event while joining")
                }
                Polled::Event(TransportEvent::Disconnected { reason }) => {
                    return JoinWait::Lost(reason)
                }
            }
        }
    }

    /// Next transport event, racing shutdown and the optional deadline. Cancel-safe.
    async fn poll(&mut self, shutdown: &CancellationToken, deadline: Option<Instant>) -> Polled {
        let Some(transport) = self.transport.as_deref_mut() else {
            return Polled::Ended;
        };

        let timer = async {
            match deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = shutdown.cancelled() => Polled::Shutdown,
            event = transport.next_event() => match event {
                Some(event) => Polled::Event(event),
                None => Polled::Ended,
            },
            _ = timer => Polled::TimedOut,
        }
    }

    /// Room outcome that arrived outside its own join window (e.g. after a timeout).
    fn on_room_joined(&mut self, room: &str) {
        if self.memberships.confirm(room) {
            info!(room = %room, "Late join confirmation");
            self.publish_rooms();
        } else {
            debug!(room = %room, "Ignoring join confirmation for unknown room");
        }
    }

    fn on_room_failed(&mut self, room: &str, reason: &str) {
        if self.memberships.fail(room, reason) {
            warn!(room = %room, reason = %reason, "Room reported an error");
            self.publish_rooms();
        } else {
            debug!(room = %room, reason = %reason, "Ignoring error for unknown room");
        }
    }

    /// Before the session is up this is a failed handshake and an error; afterwards a dropped
    /// connection.
    fn on_transport_lost(&mut self, reason: &str) -> Result<()> {
        if self.state() == ConnectionState::Connecting {
            error!(reason = %reason, "Handshake failed");
            self.transport = None;
            self.transition(ConnectionState::Disconnected)?;
            return Err(WatcherError::Transport(format!("handshake failed: {}", reason)));
        }
        warn!(state = %self.state(), reason = %reason, "Connection lost");
        Ok(())
    }

    /// Closing → Disconnected, releasing the transport and discarding memberships.
    async fn teardown(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            if self.state().can_transition_to(ConnectionState::Closing) {
                let _ = self.transition(ConnectionState::Closing);
            }
            if let Err(e) = transport.close().await {
                warn!(error = %e, operation = "close", "Transport did not close cleanly");
            }
        }

        self.memberships.clear();
        self.publish_rooms();

        if self.state() != ConnectionState::Disconnected {
            let current = self.state();
            if current != ConnectionState::Closing {
                let _ = self.transition(ConnectionState::Closing);
            }
            let _ = self.transition(ConnectionState::Disconnected);
        }
        info!("Session closed");
    }

    fn transport(&mut self) -> Result<&mut (dyn Transport + 'static)> {
        self.transport
            .as_deref_mut()
            .ok_or_else(|| WatcherError::State("no transport".to_string()))
    }

    fn transition(&mut self, next: ConnectionState) -> Result<()> {
        let current = self.state();
        if !current.can_transition_to(next) {
            error!(from = %current, to = %next, "Rejected state transition");
            return Err(WatcherError::State(format!(
                "invalid transition {} -> {}",
                current, next
            )));
        }
        info!(from = %current, to = %next, "State transition");
        self.status.send_modify(|status| status.state = next);
        Ok(())
    }

    fn publish_rooms(&self) {
        let rooms = self.memberships.all().to_vec();
        self.status.send_modify(|status| status.rooms = rooms);
    }
}

/// Runs the handler chain. Handler failures are logged and never affect the session state.
///
/// Borrows only the chain so the session future stays `Send`.
async fn deliver(chain: &HandlerChain, message: &InboundMessage) {
    if let Err(e) = chain.handle(message).await {
        error!(
            error = %e,
            sender = %message.sender.bare,
            nickname = ?message.sender.nickname,
            "Handler chain failed"
        );
    }
}
