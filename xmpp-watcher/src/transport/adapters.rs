//! Adapters between XMPP stanzas (xmpp-parsers) and watcher types.
//! Depends only on the parser types and watcher_core type definitions.

use std::collections::HashMap;
use std::str::FromStr;

use tokio_xmpp::parsers::{
    iq::Iq,
    message::{Message, MessageType},
    muc::{muc::History, Muc},
    ns,
    presence::{Presence, Show, Type as PresenceType},
    roster::Roster,
    Jid,
};
use watcher_core::{InboundMessage, MessageKind, Sender, ToInboundMessage};

use super::{JoinRequest, PresenceShow, PresenceUpdate, TransportError, TransportEvent};

pub const ROSTER_REQUEST_ID: &str = "roster-1";

/// Splits `local@domain/resource` into the bare part and the optional resource.
pub fn split_jid(jid: &str) -> (&str, Option<&str>) {
    match jid.split_once('/') {
        Some((bare, resource)) => (bare, Some(resource)),
        None => (jid, None),
    }
}

/// Wraps a parsed message stanza for conversion to core [`InboundMessage`].
pub struct XmppMessageWrapper<'a>(pub &'a Message);

impl<'a> ToInboundMessage for XmppMessageWrapper<'a> {
    fn to_inbound(&self) -> InboundMessage {
        let from = self.0.from.as_ref().map(|j| j.to_string()).unwrap_or_default();
        let (bare, resource) = split_jid(&from);

        let kind = match self.0.type_ {
            MessageType::Chat | MessageType::Normal => MessageKind::Direct,
            MessageType::Groupchat => MessageKind::Groupchat,
            MessageType::Error => MessageKind::Other("error".to_string()),
            MessageType::Headline => MessageKind::Other("headline".to_string()),
        };

        let sender = match kind {
            MessageKind::Groupchat => {
                Sender::from_bare(bare).with_nickname(resource.map(str::to_string))
            }
            _ => Sender::from_bare(bare),
        };

        InboundMessage::new(kind, sender, self.body())
    }
}

impl<'a> XmppMessageWrapper<'a> {
    /// Body in the default language, else the first body present, else empty.
    fn body(&self) -> String {
        self.0
            .bodies
            .get("")
            .or_else(|| self.0.bodies.values().next())
            .map(|b| b.0.clone())
            .unwrap_or_default()
    }
}

/// Room history replayed on join carries a `urn:xmpp:delay` stamp.
pub fn is_history_replay(message: &Message) -> bool {
    message.type_ == MessageType::Groupchat
        && message.payloads.iter().any(|p| p.is("delay", ns::DELAY))
}

/// Maps a message stanza to an event; replayed room history yields `None`.
pub fn message_event(message: &Message) -> Option<TransportEvent> {
    if is_history_replay(message) {
        return None;
    }
    Some(TransportEvent::Message(XmppMessageWrapper(message).to_inbound()))
}

/// Available presence with the configured show and status text.
pub fn status_presence(update: &PresenceUpdate) -> Presence {
    let mut presence = Presence::new(PresenceType::None);
    presence.show = match update.show {
        PresenceShow::Available => None,
        PresenceShow::Away => Some(Show::Away),
        PresenceShow::Chat => Some(Show::Chat),
        PresenceShow::DoNotDisturb => Some(Show::Dnd),
        PresenceShow::ExtendedAway => Some(Show::Xa),
    };
    presence.set_status(String::new(), update.status.clone());
    presence
}

pub fn roster_request() -> Iq {
    Iq::from_get(
        ROSTER_REQUEST_ID,
        Roster {
            ver: None,
            items: vec![],
        },
    )
}

/// Join presence addressed to `room/nickname`. Asks the room for no history.
pub fn join_presence(request: &JoinRequest) -> Result<Presence, TransportError> {
    let occupant = format!("{}/{}", request.room, request.nickname);
    let to = Jid::from_str(&occupant)
        .map_err(|e| TransportError::InvalidAddress(format!("{}: {}", occupant, e)))?;

    let mut muc = Muc::new().with_history(History::new().with_maxchars(0));
    if let Some(password) = &request.password {
        muc = muc.with_password(password.clone());
    }

    Ok(Presence::new(PresenceType::None).with_to(to).with_payload(muc))
}

/// Maps a presence stanza to a join outcome for one of the `pending` rooms (room → nickname).
///
/// Self-presence from `room/nickname` confirms the join; an error presence from the room
/// fails it. Every other presence (occupants coming and going, contacts) yields `None`.
pub fn presence_event(
    presence: &Presence,
    pending: &HashMap<String, String>,
) -> Option<TransportEvent> {
    let from = presence.from.as_ref()?.to_string();
    let (room, resource) = split_jid(&from);
    let nickname = pending.get(room)?;

    match presence.type_ {
        PresenceType::Error => Some(TransportEvent::RoomJoinFailed {
            room: room.to_string(),
            reason: error_condition(presence),
        }),
        PresenceType::None if resource == Some(nickname.as_str()) => {
            Some(TransportEvent::RoomJoined {
                room: room.to_string(),
            })
        }
        _ => None,
    }
}

/// Defined condition of an error presence (e.g. `conflict`, `not-authorized`),
/// plus its text if any.
fn error_condition(presence: &Presence) -> String {
    let Some(error) = presence.payloads.iter().find(|el| el.name() == "error") else {
        return "unknown error".to_string();
    };

    let condition = error
        .children()
        .find(|c| c.name() != "text")
        .map(|c| c.name().to_string())
        .unwrap_or_else(|| "unknown error".to_string());

    match error.children().find(|c| c.name() == "text").map(|t| t.text()) {
        Some(text) if !text.is_empty() => format!("{}: {}", condition, text),
        _ => condition,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_xmpp::parsers::Element;

    fn join(password: Option<&str>) -> JoinRequest {
        JoinRequest {
            room: "team@conf.example".to_string(),
            nickname: "watcher".to_string(),
            password: password.map(str::to_string),
        }
    }

    fn message(xml: &str) -> Message {
        let el: Element = xml.parse().unwrap();
        Message::try_from(el).unwrap()
    }

    fn presence(xml: &str) -> Presence {
        let el: Element = xml.parse().unwrap();
        Presence::try_from(el).unwrap()
    }

    fn pending() -> HashMap<String, String> {
        let mut pending = HashMap::new();
        pending.insert("team@conf.example".to_string(), "watcher".to_string());
        pending
    }

    #[test]
    fn test_split_jid() {
        assert_eq!(split_jid("a@b/c"), ("a@b", Some("c")));
        assert_eq!(split_jid("a@b"), ("a@b", None));
        assert_eq!(split_jid("a@b/c/d"), ("a@b", Some("c/d")));
    }

    #[test]
    fn test_groupchat_message_to_inbound() {
        let msg = message(
            "<message xmlns='jabber:client' from='team@conf.example/alice' type='groupchat'>\
             <body>build failed</body></message>",
        );
        let inbound = XmppMessageWrapper(&msg).to_inbound();

        assert_eq!(inbound.kind, MessageKind::Groupchat);
        assert_eq!(inbound.sender.bare, "team@conf.example");
        assert_eq!(inbound.sender.nickname.as_deref(), Some("alice"));
        assert_eq!(inbound.body, "build failed");
    }

    #[test]
    fn test_chat_message_to_inbound() {
        let msg = message(
            "<message xmlns='jabber:client' from='alice@example.com/laptop' type='chat'>\
             <body>hi</body></message>",
        );
        let inbound = XmppMessageWrapper(&msg).to_inbound();

        assert_eq!(inbound.kind, MessageKind::Direct);
        assert_eq!(inbound.sender.local, "alice");
        assert!(inbound.sender.nickname.is_none());
        assert_eq!(inbound.body, "hi");
    }

    #[test]
    fn test_message_without_type_is_direct() {
        let msg = message(
            "<message xmlns='jabber:client' from='alice@example.com'><body>hi</body></message>",
        );
        assert_eq!(XmppMessageWrapper(&msg).to_inbound().kind, MessageKind::Direct);
    }

    #[test]
    fn test_error_message_is_other() {
        let msg = message("<message xmlns='jabber:client' from='alice@example.com' type='error'/>");
        let inbound = XmppMessageWrapper(&msg).to_inbound();
        assert_eq!(inbound.kind, MessageKind::Other("error".to_string()));
        assert_eq!(inbound.body, "");
    }

    #[test]
    fn test_self_presence_confirms_join() {
        let p = presence("<presence xmlns='jabber:client' from='team@conf.example/watcher'/>");
        assert_eq!(
            presence_event(&p, &pending()),
            Some(TransportEvent::RoomJoined {
                room: "team@conf.example".to_string()
            })
        );
    }

    #[test]
    fn test_other_occupant_presence_is_ignored() {
        let p = presence("<presence xmlns='jabber:client' from='team@conf.example/alice'/>");
        assert_eq!(presence_event(&p, &pending()), None);
    }

    #[test]
    fn test_presence_from_unknown_room_is_ignored() {
        let p = presence("<presence xmlns='jabber:client' from='ops@conf.example/watcher'/>");
        assert_eq!(presence_event(&p, &pending()), None);
    }

    #[test]
    fn test_error_presence_fails_join() {
        let p = presence(
            "<presence xmlns='jabber:client' from='team@conf.example/watcher' type='error'>\
             <error type='auth'>\
             <not-authorized xmlns='urn:ietf:params:xml:ns:xmpp-stanzas'/>\
             </error></presence>",
        );
        assert_eq!(
            presence_event(&p, &pending()),
            Some(TransportEvent::RoomJoinFailed {
                room: "team@conf.example".to_string(),
                reason: "not-authorized".to_string()
            })
        );
    }

    #[test]
    fn test_delayed_groupchat_is_dropped() {
        let msg = message(
            "<message xmlns='jabber:client' from='team@conf.example/alice' type='groupchat'>\
             <body>build failed last week</body>\
             <delay xmlns='urn:xmpp:delay' stamp='2020-01-01T00:00:00Z'/></message>",
        );
        assert!(is_history_replay(&msg));
        assert_eq!(message_event(&msg), None);
    }

    #[test]
    fn test_live_groupchat_is_delivered() {
        let msg = message(
            "<message xmlns='jabber:client' from='team@conf.example/alice' type='groupchat'>\
             <body>build failed</body></message>",
        );
        match message_event(&msg) {
            Some(TransportEvent::Message(inbound)) => {
                assert_eq!(inbound.sender.nickname.as_deref(), Some("alice"));
                assert_eq!(inbound.body, "build failed");
            }
            other => panic!("expected message event, got {:?}", other),
        }
    }

    #[test]
    fn test_delayed_direct_message_is_kept() {
        let msg = message(
            "<message xmlns='jabber:client' from='alice@example.com/laptop' type='chat'>\
             <body>hi</body><delay xmlns='urn:xmpp:delay' stamp='2020-01-01T00:00:00Z'/>\
             </message>",
        );
        assert!(!is_history_replay(&msg));
        assert!(message_event(&msg).is_some());
    }

    #[test]
    fn test_join_presence_targets_occupant_without_history() {
        let el: Element = join_presence(&join(None)).unwrap().into();

        assert_eq!(el.attr("to"), Some("team@conf.example/watcher"));
        assert_eq!(el.attr("type"), None);
        let muc = el.get_child("x", ns::MUC).unwrap();
        let history = muc.get_child("history", ns::MUC).unwrap();
        assert_eq!(history.attr("maxchars"), Some("0"));
        assert!(muc.get_child("password", ns::MUC).is_none());
    }

    #[test]
    fn test_join_presence_carries_room_password() {
        let el: Element = join_presence(&join(Some("letmein"))).unwrap().into();

        let muc = el.get_child("x", ns::MUC).unwrap();
        assert_eq!(muc.get_child("password", ns::MUC).unwrap().text(), "letmein");
        assert!(muc.get_child("history", ns::MUC).is_some());
    }

    #[test]
    fn test_join_presence_rejects_bad_room() {
        let request = JoinRequest {
            room: "@".to_string(),
            nickname: "watcher".to_string(),
            password: None,
        };
        assert!(matches!(
            join_presence(&request),
            Err(TransportError::InvalidAddress(_))
        ));
    }

    #[test]
    fn test_status_presence_dnd() {
        let update = PresenceUpdate {
            show: PresenceShow::DoNotDisturb,
            status: "Watching rooms".to_string(),
        };
        let el: Element = status_presence(&update).into();

        assert_eq!(el.attr("to"), None);
        assert_eq!(el.get_child("show", ns::DEFAULT_NS).unwrap().text(), "dnd");
        assert_eq!(
            el.get_child("status", ns::DEFAULT_NS).unwrap().text(),
            "Watching rooms"
        );
    }

    #[test]
    fn test_status_presence_available_has_no_show() {
        let update = PresenceUpdate {
            show: PresenceShow::Available,
            status: String::new(),
        };
        let el: Element = status_presence(&update).into();
        assert!(el.get_child("show", ns::DEFAULT_NS).is_none());
    }

    #[test]
    fn test_roster_request_queries_roster() {
        let el: Element = roster_request().into();

        assert_eq!(el.attr("type"), Some("get"));
        assert_eq!(el.attr("id"), Some(ROSTER_REQUEST_ID));
        assert!(el.get_child("query", ns::ROSTER).is_some());
    }
}
