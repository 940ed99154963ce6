//! [`Transport`] over a tokio-xmpp client stream.
//!
//! Connection setup runs in a spawned task (see [`super::stream::establish`]); this layer
//! maps inbound stanzas to [`TransportEvent`]s and serializes outbound ones.

use std::collections::HashMap;
use std::str::FromStr;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::task::{JoinError, JoinHandle};
use tokio_xmpp::parsers::{message::Message, presence::Presence, Element, Jid};
use tokio_xmpp::Packet;
use tracing::{debug, info, instrument, trace};

use super::adapters::{
    join_presence, message_event, presence_event, roster_request, status_presence,
};
use super::stream::{establish, ClientStream};
use super::tls::TlsSettings;
use super::{
    Connector, JoinRequest, PresenceUpdate, Transport, TransportConfig, TransportError,
    TransportEvent,
};

/// Builds [`XmppTransport`]s. Must be called from within a tokio runtime.
#[derive(Debug, Clone, Default)]
pub struct XmppConnector;

impl Connector for XmppConnector {
    #[instrument(skip_all, fields(jid = %config.jid, address = ?config.address))]
    fn connect(&self, config: TransportConfig) -> Result<Box<dyn Transport>, TransportError> {
        let jid = Jid::from_str(&config.jid)
            .map_err(|e| TransportError::InvalidAddress(format!("{}: {}", config.jid, e)))?;
        let tls = TlsSettings::from(&config);

        let setup = tokio::spawn(establish(jid, config.password, config.address, tls));
        debug!("Connection attempt issued");
        Ok(Box::new(XmppTransport {
            state: StreamState::Connecting(setup),
            pending_joins: HashMap::new(),
        }))
    }
}

enum StreamState {
    Connecting(JoinHandle<Result<ClientStream, TransportError>>),
    Online(ClientStream),
    Closed,
}

enum Polled {
    Setup(Result<Result<ClientStream, TransportError>, JoinError>),
    Packet(Option<Result<Packet, tokio_xmpp::Error>>),
}

/// Client stream plus the rooms whose join acknowledgment is still outstanding.
pub struct XmppTransport {
    state: StreamState,
    /// room → nickname used in the join
    pending_joins: HashMap<String, String>,
}

impl XmppTransport {
    async fn send(&mut self, stanza: Element) -> Result<(), TransportError> {
        match &mut self.state {
            StreamState::Online(stream) => stream
                .send(Packet::Stanza(stanza))
                .await
                .map_err(|e| TransportError::Send(e.to_string())),
            StreamState::Connecting(_) => {
                Err(TransportError::Send("stream not established".to_string()))
            }
            StreamState::Closed => Err(TransportError::Closed),
        }
    }

    fn finish_setup(
        &mut self,
        outcome: Result<Result<ClientStream, TransportError>, JoinError>,
    ) -> TransportEvent {
        match outcome {
            Ok(Ok(stream)) => {
                let bound_jid = stream.jid.to_string();
                info!(%bound_jid, "Session established");
                self.state = StreamState::Online(stream);
                TransportEvent::Online { bound_jid }
            }
            Ok(Err(e)) => self.lost(e.to_string()),
            Err(e) => self.lost(format!("connection task failed: {}", e)),
        }
    }

    fn lost(&mut self, reason: String) -> TransportEvent {
        self.state = StreamState::Closed;
        self.pending_joins.clear();
        TransportEvent::Disconnected { reason }
    }

    /// Maps one inbound stanza; `None` for stanzas the session does not care about.
    fn map_stanza(&mut self, stanza: Element) -> Option<TransportEvent> {
        if stanza.name() == "message" {
            return match Message::try_from(stanza) {
                Ok(message) => message_event(&message),
                Err(e) => {
                    debug!(error = %e, "Dropping unparsable message stanza");
                    None
                }
            };
        }

        if stanza.name() == "presence" {
            let presence = match Presence::try_from(stanza) {
                Ok(presence) => presence,
                Err(e) => {
                    debug!(error = %e, "Dropping unparsable presence stanza");
                    return None;
                }
            };
            let event = presence_event(&presence, &self.pending_joins)?;
            match &event {
                TransportEvent::RoomJoined { room }
                | TransportEvent::RoomJoinFailed { room, .. } => {
                    self.pending_joins.remove(room);
                }
                _ => {}
            }
            return Some(event);
        }

        trace!(name = %stanza.name(), "Ignoring stanza");
        None
    }
}

#[async_trait]
impl Transport for XmppTransport {
    async fn next_event(&mut self) -> Option<TransportEvent> {
        loop {
            let polled = match &mut self.state {
                StreamState::Closed => return None,
                StreamState::Connecting(setup) => Polled::Setup(setup.await),
                StreamState::Online(stream) => Polled::Packet(stream.next().await),
            };

            match polled {
                Polled::Setup(outcome) => return Some(self.finish_setup(outcome)),
                Polled::Packet(Some(Ok(Packet::Stanza(stanza)))) => {
                    if let Some(event) = self.map_stanza(stanza) {
                        return Some(event);
                    }
                }
                Polled::Packet(Some(Ok(Packet::StreamEnd)) | None) => {
                    return Some(self.lost("stream closed by server".to_string()));
                }
                Polled::Packet(Some(Ok(_))) => {}
                Polled::Packet(Some(Err(e))) => return Some(self.lost(e.to_string())),
            }
        }
    }

    async fn send_presence(&mut self, update: &PresenceUpdate) -> Result<(), TransportError> {
        self.send(status_presence(update).into()).await
    }

    async fn request_roster(&mut self) -> Result<(), TransportError> {
        self.send(roster_request().into()).await
    }

    async fn join_room(&mut self, request: &JoinRequest) -> Result<(), TransportError> {
        let presence = join_presence(request)?;

        self.pending_joins
            .insert(request.room.clone(), request.nickname.clone());
        let sent = self.send(presence.into()).await;
        if sent.is_err() {
            self.pending_joins.remove(&request.room);
        }
        sent
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.pending_joins.clear();
        match std::mem::replace(&mut self.state, StreamState::Closed) {
            StreamState::Online(mut stream) => stream
                .send(Packet::StreamEnd)
                .await
                .map_err(|e| TransportError::Send(e.to_string())),
            StreamState::Connecting(setup) => {
                setup.abort();
                Ok(())
            }
            StreamState::Closed => Ok(()),
        }
    }
}

impl Drop for XmppTransport {
    fn drop(&mut self) {
        if let StreamState::Connecting(setup) = &self.state {
            setup.abort();
        }
    }
}
