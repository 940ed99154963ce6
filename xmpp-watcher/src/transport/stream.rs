//! Client stream setup over tokio-xmpp's stream codec.
//!
//! Order: TCP (SRV or explicit host), STARTTLS, TLS handshake, SASL, resource binding.
//! Owning the sequence lets the TLS step honor [`TlsSettings`].

use std::collections::HashSet;
use std::str::FromStr;

use futures::{SinkExt, StreamExt};
use sasl::client::mechanisms::{Plain, Scram};
use sasl::client::Mechanism;
use sasl::common::scram::{Sha1, Sha256};
use sasl::common::{ChannelBinding, Credentials};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_native_tls::TlsStream;
use tokio_xmpp::parsers::{
    bind::{BindQuery, BindResponse},
    iq::{Iq, IqType},
    ns,
    sasl::{Auth, Challenge, Failure, Mechanism as SaslMechanism, Response, Success},
    Element, Jid,
};
use tokio_xmpp::xmpp_stream::XMPPStream;
use tokio_xmpp::Packet;
use tracing::{debug, info, instrument};
use trust_dns_resolver::TokioAsyncResolver;

use super::tls::{upgrade_to_tls, TlsSettings};
use super::{ServerAddress, TransportError};

pub type ClientStream = XMPPStream<TlsStream<TcpStream>>;

pub const DEFAULT_CLIENT_PORT: u16 = 5222;
const BIND_REQUEST_ID: &str = "bind-1";

/// Mechanisms we offer, strongest first.
const MECHANISM_PREFERENCE: [&str; 3] = ["SCRAM-SHA-256", "SCRAM-SHA-1", "PLAIN"];

/// One `_xmpp-client._tcp` SRV answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SrvTarget {
    pub priority: u16,
    pub weight: u16,
    pub host: String,
    pub port: u16,
}

/// Lowest priority first; within a priority, heavier weight first.
pub fn order_srv_targets(mut targets: Vec<SrvTarget>) -> Vec<SrvTarget> {
    targets.sort_by(|a, b| {
        a.priority
            .cmp(&b.priority)
            .then_with(|| b.weight.cmp(&a.weight))
    });
    targets
}

/// Picks the first entry of [`MECHANISM_PREFERENCE`] the server offers.
pub fn select_mechanism(offered: &HashSet<String>) -> Option<&'static str> {
    MECHANISM_PREFERENCE
        .iter()
        .copied()
        .find(|name| offered.contains(*name))
}

/// Opens an authenticated, bound client stream for `jid`.
#[instrument(skip_all, fields(jid = %jid, address = ?address))]
pub async fn establish(
    jid: Jid,
    password: String,
    address: ServerAddress,
    tls: TlsSettings,
) -> Result<ClientStream, TransportError> {
    let domain = jid.domain_str().to_string();
    let username = jid
        .node_str()
        .ok_or_else(|| TransportError::InvalidAddress(format!("{} has no local part", jid)))?
        .to_string();

    let tcp = match &address {
        ServerAddress::Srv => connect_srv(&domain).await?,
        ServerAddress::Explicit { host, port } => connect_host(host, *port).await?,
    };

    let plain = start_stream(tcp, &jid).await?;
    if !plain.stream_features.can_starttls() {
        return Err(TransportError::Tls("server does not offer STARTTLS".to_string()));
    }
    let tcp = request_starttls(plain).await?;
    let encrypted = upgrade_to_tls(tcp, &domain, tls).await?;

    let stream = start_stream(encrypted, &jid).await?;
    let encrypted = authenticate(stream, &username, &password).await?;
    info!("Authenticated");

    let stream = start_stream(encrypted, &jid).await?;
    bind(stream).await
}

async fn start_stream<S>(stream: S, jid: &Jid) -> Result<XMPPStream<S>, TransportError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    XMPPStream::start(stream, jid.clone(), ns::JABBER_CLIENT.to_string())
        .await
        .map_err(|e| TransportError::Connect(e.to_string()))
}

async fn connect_host(host: &str, port: u16) -> Result<TcpStream, TransportError> {
    let stream = TcpStream::connect((host, port))
        .await
        .map_err(|e| TransportError::Connect(format!("{}:{}: {}", host, port, e)))?;
    debug!(host, port, "TCP connected");
    Ok(stream)
}

/// Tries the SRV targets of `domain` in order; without SRV records falls back to `domain:5222`.
async fn connect_srv(domain: &str) -> Result<TcpStream, TransportError> {
    let resolver = TokioAsyncResolver::tokio_from_system_conf()
        .map_err(|e| TransportError::Connect(format!("resolver: {}", e)))?;

    let query = format!("_xmpp-client._tcp.{}.", domain);
    let lookup = match resolver.srv_lookup(query.as_str()).await {
        Ok(lookup) => lookup,
        Err(e) => {
            debug!(domain, error = %e, "No SRV records, using the domain directly");
            return connect_host(domain, DEFAULT_CLIENT_PORT).await;
        }
    };

    let targets = order_srv_targets(
        lookup
            .iter()
            .map(|srv| SrvTarget {
                priority: srv.priority(),
                weight: srv.weight(),
                host: srv.target().to_ascii().trim_end_matches('.').to_string(),
                port: srv.port(),
            })
            .collect(),
    );

    let mut last_error = TransportError::Connect(format!("no SRV targets for {}", domain));
    for target in targets {
        match connect_host(&target.host, target.port).await {
            Ok(stream) => return Ok(stream),
            Err(e) => {
                debug!(host = %target.host, error = %e, "SRV target unreachable");
                last_error = e;
            }
        }
    }
    Err(last_error)
}

async fn request_starttls(mut stream: XMPPStream<TcpStream>) -> Result<TcpStream, TransportError> {
    let starttls = Element::builder("starttls", ns::TLS).build();
    stream
        .send(Packet::Stanza(starttls))
        .await
        .map_err(|e| TransportError::Connect(e.to_string()))?;

    loop {
        match stream.next().await {
            Some(Ok(Packet::Stanza(stanza))) if stanza.is("proceed", ns::TLS) => {
                return Ok(stream.into_inner());
            }
            Some(Ok(Packet::Stanza(stanza))) if stanza.is("failure", ns::TLS) => {
                return Err(TransportError::Tls("server refused STARTTLS".to_string()));
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => return Err(TransportError::Connect(e.to_string())),
            None => return Err(TransportError::Closed),
        }
    }
}

fn mechanism_for(
    name: &str,
    credentials: Credentials,
) -> Result<Box<dyn Mechanism + Send + Sync>, TransportError> {
    let mechanism: Box<dyn Mechanism + Send + Sync> = match name {
        "SCRAM-SHA-256" => Box::new(Scram::<Sha256>::from_credentials(credentials).map_err(auth)?),
        "SCRAM-SHA-1" => Box::new(Scram::<Sha1>::from_credentials(credentials).map_err(auth)?),
        _ => Box::new(Plain::from_credentials(credentials).map_err(auth)?),
    };
    Ok(mechanism)
}

fn auth(e: impl std::fmt::Display) -> TransportError {
    TransportError::Auth(e.to_string())
}

async fn authenticate<S>(
    mut stream: XMPPStream<S>,
    username: &str,
    password: &str,
) -> Result<S, TransportError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let offered: HashSet<String> = stream
        .stream_features
        .sasl_mechanisms()
        .map_err(auth)?
        .collect();
    let name = select_mechanism(&offered).ok_or_else(|| {
        TransportError::Auth(format!("no supported mechanism among {:?}", offered))
    })?;
    debug!(mechanism = name, "Starting SASL");

    let credentials = Credentials::default()
        .with_username(username)
        .with_password(password)
        .with_channel_binding(ChannelBinding::None);
    let mut mechanism = mechanism_for(name, credentials)?;

    let request = Auth {
        mechanism: SaslMechanism::from_str(name).map_err(auth)?,
        data: mechanism.initial(),
    };
    send_element(&mut stream, request.into()).await?;

    loop {
        let stanza = match stream.next().await {
            Some(Ok(Packet::Stanza(stanza))) => stanza,
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Err(TransportError::Connect(e.to_string())),
            None => return Err(TransportError::Closed),
        };

        if stanza.is("challenge", ns::SASL) {
            let challenge = Challenge::try_from(stanza).map_err(auth)?;
            let data = mechanism.response(&challenge.data).map_err(auth)?;
            send_element(&mut stream, Response { data }.into()).await?;
        } else if stanza.is("success", ns::SASL) {
            let success = Success::try_from(stanza).map_err(auth)?;
            mechanism.success(&success.data).map_err(auth)?;
            return Ok(stream.into_inner());
        } else if stanza.is("failure", ns::SASL) {
            let failure = Failure::try_from(stanza).map_err(auth)?;
            return Err(TransportError::Auth(format!(
                "server rejected credentials: {:?}",
                failure.defined_condition
            )));
        }
    }
}

async fn bind(mut stream: ClientStream) -> Result<ClientStream, TransportError> {
    if !stream.stream_features.can_bind() {
        return Ok(stream);
    }

    let resource = stream.jid.resource_str().map(str::to_string);
    let request = Iq::from_set(BIND_REQUEST_ID, BindQuery::new(resource));
    send_element(&mut stream, request.into()).await?;

    loop {
        let stanza = match stream.next().await {
            Some(Ok(Packet::Stanza(stanza))) => stanza,
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Err(TransportError::Connect(e.to_string())),
            None => return Err(TransportError::Closed),
        };
        let Ok(iq) = Iq::try_from(stanza) else {
            continue;
        };
        if iq.id != BIND_REQUEST_ID {
            continue;
        }

        return match iq.payload {
            IqType::Result(Some(payload)) => {
                let bound = BindResponse::try_from(payload)
                    .map_err(|e| TransportError::Connect(format!("bind response: {}", e)))?;
                stream.jid = Jid::from(bound);
                Ok(stream)
            }
            IqType::Result(None) => Ok(stream),
            _ => Err(TransportError::Connect("resource binding refused".to_string())),
        };
    }
}

async fn send_element<S>(stream: &mut XMPPStream<S>, element: Element) -> Result<(), TransportError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    stream
        .send(Packet::Stanza(element))
        .await
        .map_err(|e| TransportError::Send(e.to_string()))
}
