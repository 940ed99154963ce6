//! Core types: inbound message, sender, classified event, handler response, and Handler trait.
//!
//! Types are split into one file per main type for easier navigation.

mod event;
mod handler;
mod message;
mod response;

pub use event::ClassifiedEvent;
pub use handler::{Handler, ToInboundMessage};
pub use message::{InboundMessage, MessageKind, Sender};
pub use response::HandlerResponse;
