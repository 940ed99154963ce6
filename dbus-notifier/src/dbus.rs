//! Session-bus client for the `com.alwaysdata.status` interface exported by the desktop
//! shell extension.

use async_trait::async_trait;
use tracing::{debug, instrument};
use watcher_core::{Notifier, NotifyError, NotifyLevel};
use zbus::{proxy, Connection};

pub const DEFAULT_SERVICE: &str = "org.gnome.Shell";
pub const DEFAULT_PATH: &str = "/com/alwaysdata/status";

#[proxy(
    interface = "com.alwaysdata.status",
    default_service = "org.gnome.Shell",
    default_path = "/com/alwaysdata/status",
    gen_blocking = false
)]
trait Status {
    #[zbus(name = "notify")]
    fn notify(&self, level: &str, body: &str) -> zbus::Result<()>;
}

/// Well-known bus name and object path of the status sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbusEndpoint {
    pub service: String,
    pub path: String,
}

impl Default for DbusEndpoint {
    fn default() -> Self {
        Self {
            service: DEFAULT_SERVICE.to_string(),
            path: DEFAULT_PATH.to_string(),
        }
    }
}

/// Notifier backed by a session-bus proxy. The bus connection lives as long as this value.
pub struct DbusNotifier {
    proxy: StatusProxy<'static>,
}

impl DbusNotifier {
    /// Connects to the session bus and resolves the default endpoint.
    pub async fn connect() -> Result<Self, NotifyError> {
        Self::connect_to(DbusEndpoint::default()).await
    }

    /// Connects to the session bus and resolves the given endpoint.
    #[instrument(skip_all, fields(service = %endpoint.service, path = %endpoint.path))]
    pub async fn connect_to(endpoint: DbusEndpoint) -> Result<Self, NotifyError> {
        let connection = Connection::session().await.map_err(connection_error)?;
        let proxy = StatusProxy::builder(&connection)
            .destination(endpoint.service)
            .map_err(connection_error)?
            .path(endpoint.path)
            .map_err(connection_error)?
            .build()
            .await
            .map_err(connection_error)?;

        debug!("D-Bus proxy is ready");
        Ok(Self { proxy })
    }
}

#[async_trait]
impl Notifier for DbusNotifier {
    async fn notify(&self, level: NotifyLevel, message: &str) -> Result<(), NotifyError> {
        self.proxy
            .notify(level.as_str(), message)
            .await
            .map_err(call_error)
    }
}

fn connection_error(e: zbus::Error) -> NotifyError {
    NotifyError::Connection(e.to_string())
}

fn call_error(e: zbus::Error) -> NotifyError {
    NotifyError::Call(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_endpoint() {
        let endpoint = DbusEndpoint::default();
        assert_eq!(endpoint.service, "org.gnome.Shell");
        assert_eq!(endpoint.path, "/com/alwaysdata/status");
    }

    #[test]
    fn test_error_mapping_keeps_message() {
        let err = call_error(zbus::Error::Failure("no such object".to_string()));
        assert!(matches!(err, NotifyError::Call(ref m) if m.contains("no such object")));

        let err = connection_error(zbus::Error::Failure("no bus".to_string()));
        assert!(matches!(err, NotifyError::Connection(ref m) if m.contains("no bus")));
    }
}
