//! Wires config, notifier, handler chain and transport into a running watcher.

use std::sync::Arc;

use anyhow::{Context, Result};
use dbus_notifier::{DbusNotifier, LogNotifier};
use handler_chain::HandlerChain;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};
use watcher_core::{init_tracing, mask_secret, Notifier};

use crate::config::SessionConfig;
use crate::relay::BotRelayHandler;
use crate::session::{ConnectionState, ProtocolSession, SessionStatus};
use crate::transport::{Connector, XmppConnector};

/// Options that do not belong to the session itself.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Use [`LogNotifier`] instead of the D-Bus sink.
    pub log_only: bool,
    /// Log filter level; `None` falls back to `RUST_LOG` or `info`.
    pub log_level: Option<String>,
}

/// Cancels a running [`Watcher`] from another task.
#[derive(Debug, Clone)]
pub struct ShutdownHandle(CancellationToken);

impl ShutdownHandle {
    pub fn shutdown(&self) {
        self.0.cancel();
    }
}

/// A connected (or connecting) watcher. `run()` drives it until shutdown or disconnect.
pub struct Watcher {
    session: ProtocolSession,
}

impl Watcher {
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle(self.session.shutdown_token())
    }

    pub fn shutdown(&self) {
        self.session.shutdown();
    }

    pub fn state(&self) -> ConnectionState {
        self.session.state()
    }

    pub fn status(&self) -> watch::Receiver<SessionStatus> {
        self.session.subscribe()
    }

    pub async fn run(mut self) -> Result<()> {
        self.session.run().await?;
        Ok(())
    }
}

/// Builds the handler chain around `notifier` and starts connecting over XMPP.
pub fn start(config: SessionConfig, notifier: Arc<dyn Notifier>) -> Result<Watcher> {
    start_with_connector(config, notifier, &XmppConnector)
}

/// Same as [`start`] with a caller-supplied transport connector.
pub fn start_with_connector(
    config: SessionConfig,
    notifier: Arc<dyn Notifier>,
    connector: &dyn Connector,
) -> Result<Watcher> {
    let config = Arc::new(config);
    let relay = BotRelayHandler::new(config.clone(), notifier);
    let chain = HandlerChain::new().add_handler(Arc::new(relay));

    let mut session = ProtocolSession::new(config, chain);
    session.connect(connector, None)?;
    Ok(Watcher { session })
}

/// Main entry: validates config, initializes logging, builds the notifier, then connects
/// and runs until Ctrl-C or disconnect.
#[instrument(skip(config, options), fields(user = %config.user))]
pub async fn run_watcher(config: SessionConfig, options: RunOptions) -> Result<()> {
    config.validate()?;
    init_tracing(&config.log_file, options.log_level.as_deref())?;

    info!(
        user = %config.user,
        password = %mask_secret(&config.password),
        server = ?config.server_address(),
        rooms = ?config.rooms,
        bots = ?config.bots,
        validate_certificate = config.validate_certificate,
        "Initializing watcher"
    );

    let notifier: Arc<dyn Notifier> = if options.log_only {
        info!("Log-only mode: notifications are written to the log");
        Arc::new(LogNotifier::new())
    } else {
        Arc::new(
            DbusNotifier::connect()
                .await
                .context("Failed to connect to the desktop notifier")?,
        )
    };

    let watcher = start(config, notifier)?;

    let handle = watcher.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, shutting down");
            handle.shutdown();
        }
    });

    info!("Watcher started");
    watcher.run().await
}
