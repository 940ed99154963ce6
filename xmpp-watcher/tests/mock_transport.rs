//! Scripted transport and connector for driving the session without a server.
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;
use xmpp_watcher::{
    Connector, JoinRequest, PresenceUpdate, Transport, TransportConfig, TransportError,
    TransportEvent,
};

/// How the scripted server answers a join for a room.
#[derive(Debug, Clone)]
pub enum JoinReply {
    Confirm,
    Fail(String),
    /// Never answers.
    Silent,
    /// The join presence cannot be sent.
    SendError,
}

/// Everything the session did to the transport, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Presence(PresenceUpdate),
    Roster,
    Join(JoinRequest),
    /// A join answer handed back to the session.
    Answered(String),
    Close,
}

pub type ActionLog = Arc<Mutex<Vec<Action>>>;

pub struct MockTransport {
    events: mpsc::UnboundedReceiver<TransportEvent>,
    replies: HashMap<String, JoinReply>,
    pending: VecDeque<TransportEvent>,
    actions: ActionLog,
}

#[async_trait]
impl Transport for MockTransport {
    async fn next_event(&mut self) -> Option<TransportEvent> {
        if let Some(event) = self.pending.pop_front() {
            match &event {
                TransportEvent::RoomJoined { room }
                | TransportEvent::RoomJoinFailed { room, .. } => {
                    self.actions.lock().unwrap().push(Action::Answered(room.clone()));
                }
                _ => {}
            }
            return Some(event);
        }
        self.events.recv().await
    }

    async fn send_presence(&mut self, presence: &PresenceUpdate) -> Result<(), TransportError> {
        self.actions.lock().unwrap().push(Action::Presence(presence.clone()));
        Ok(())
    }

    async fn request_roster(&mut self) -> Result<(), TransportError> {
        self.actions.lock().unwrap().push(Action::Roster);
        Ok(())
    }

    async fn join_room(&mut self, request: &JoinRequest) -> Result<(), TransportError> {
        self.actions.lock().unwrap().push(Action::Join(request.clone()));
        match self.replies.get(&request.room).cloned().unwrap_or(JoinReply::Confirm) {
            JoinReply::Confirm => self.pending.push_back(TransportEvent::RoomJoined {
                room: request.room.clone(),
            }),
            JoinReply::Fail(reason) => self.pending.push_back(TransportEvent::RoomJoinFailed {
                room: request.room.clone(),
                reason,
            }),
            JoinReply::Silent => {}
            JoinReply::SendError => return Err(TransportError::Send("socket closed".to_string())),
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.actions.lock().unwrap().push(Action::Close);
        Ok(())
    }
}

/// Hands out one [`MockTransport`] and records the config it was asked to connect with.
pub struct MockConnector {
    transport: Mutex<Option<MockTransport>>,
    configs: Mutex<Vec<TransportConfig>>,
    fail: bool,
}

impl MockConnector {
    pub fn configs(&self) -> Vec<TransportConfig> {
        self.configs.lock().unwrap().clone()
    }

    pub fn failing() -> Self {
        Self {
            transport: Mutex::new(None),
            configs: Mutex::new(Vec::new()),
            fail: true,
        }
    }
}

impl Connector for MockConnector {
    fn connect(&self, config: TransportConfig) -> Result<Box<dyn Transport>, TransportError> {
        self.configs.lock().unwrap().push(config);
        if self.fail {
            return Err(TransportError::Connect("connection refused".to_string()));
        }
        match self.transport.lock().unwrap().take() {
            Some(transport) => Ok(Box::new(transport)),
            None => Err(TransportError::Connect("already connected".to_string())),
        }
    }
}

/// Connector, the sender feeding server events, and the action log.
pub fn mock_server(
    replies: &[(&str, JoinReply)],
) -> (MockConnector, mpsc::UnboundedSender<TransportEvent>, ActionLog) {
    let (tx, rx) = mpsc::unbounded_channel();
    let actions: ActionLog = Arc::new(Mutex::new(Vec::new()));
    let transport = MockTransport {
        events: rx,
        replies: replies
            .iter()
            .map(|(room, reply)| (room.to_string(), reply.clone()))
            .collect(),
        pending: VecDeque::new(),
        actions: actions.clone(),
    };
    let connector = MockConnector {
        transport: Mutex::new(Some(transport)),
        configs: Mutex::new(Vec::new()),
        fail: false,
    };
    (connector, tx, actions)
}

pub fn online() -> TransportEvent {
    TransportEvent::Online {
        bound_jid: "watcher@example.com/res".to_string(),
    }
}

pub fn joins(actions: &ActionLog) -> Vec<String> {
    actions
        .lock()
        .unwrap()
        .iter()
        .filter_map(|a| match a {
            Action::Join(request) => Some(request.room.clone()),
            _ => None,
        })
        .collect()
}
