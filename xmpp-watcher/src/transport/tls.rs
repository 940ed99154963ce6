//! TLS upgrade of the client stream.
//!
//! Certificate and hostname checks follow [`TransportConfig::validate_certificate`].

use tokio::io::{AsyncRead, AsyncWrite};
use tokio_native_tls::{TlsConnector, TlsStream};
use tracing::{info, warn};

use super::{TransportConfig, TransportError};

/// How the server certificate is checked during the STARTTLS upgrade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TlsSettings {
    pub accept_invalid_certs: bool,
    pub accept_invalid_hostnames: bool,
}

impl TlsSettings {
    pub fn from_validation(validate_certificate: bool) -> Self {
        Self {
            accept_invalid_certs: !validate_certificate,
            accept_invalid_hostnames: !validate_certificate,
        }
    }

    pub fn verifies(&self) -> bool {
        !self.accept_invalid_certs && !self.accept_invalid_hostnames
    }

    /// Builds the connector used for the handshake.
    pub fn connector(&self) -> Result<TlsConnector, TransportError> {
        let connector = native_tls::TlsConnector::builder()
            .danger_accept_invalid_certs(self.accept_invalid_certs)
            .danger_accept_invalid_hostnames(self.accept_invalid_hostnames)
            .build()
            .map_err(|e| TransportError::Tls(e.to_string()))?;
        Ok(TlsConnector::from(connector))
    }
}

impl From<&TransportConfig> for TlsSettings {
    fn from(config: &TransportConfig) -> Self {
        Self::from_validation(config.validate_certificate)
    }
}

/// Runs the TLS handshake over an already negotiated plain stream.
pub async fn upgrade_to_tls<S>(
    stream: S,
    domain: &str,
    settings: TlsSettings,
) -> Result<TlsStream<S>, TransportError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    if !settings.verifies() {
        warn!(domain, "Server certificate will not be validated");
    }

    let tls_stream = settings
        .connector()?
        .connect(domain, stream)
        .await
        .map_err(|e| TransportError::Tls(format!("{}: {}", domain, e)))?;

    info!(domain, verified = settings.verifies(), "TLS handshake completed");
    Ok(tls_stream)
}
