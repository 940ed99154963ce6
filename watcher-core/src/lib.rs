//! # watcher-core
//!
//! Core types and traits for the room watcher: [`InboundMessage`], [`ClassifiedEvent`],
//! [`Handler`], [`Notifier`], error types and tracing initialization. Transport-agnostic;
//! used by handler-chain, dbus-notifier and xmpp-watcher.

pub mod error;
pub mod logger;
pub mod notifier;
pub mod secret;
pub mod types;

pub use error::{NotifyError, Result, WatcherError};
pub use logger::init_tracing;
pub use notifier::{Notifier, NotifyLevel};
pub use secret::mask_secret;
pub use types::{
    ClassifiedEvent, Handler, HandlerResponse, InboundMessage, MessageKind, Sender,
    ToInboundMessage,
};
