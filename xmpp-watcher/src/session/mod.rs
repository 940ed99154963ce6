//! Protocol session: connection state machine, room joins and message dispatch.

mod engine;
mod membership;
mod state;

pub use engine::{ProtocolSession, SessionEvent, SessionStatus};
pub use membership::{RoomMembership, RoomMemberships};
pub use state::ConnectionState;
