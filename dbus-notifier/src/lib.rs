//! # dbus-notifier
//!
//! Notifier clients implementing [`watcher_core::Notifier`]:
//! [`DbusNotifier`] calls `notify(level, body)` on the desktop status sink over the D-Bus
//! session bus; [`LogNotifier`] only writes notifications to the log.

mod dbus;
mod log_notifier;

pub use dbus::{DbusEndpoint, DbusNotifier};
pub use log_notifier::LogNotifier;
