//! Endpoint fleet / MAPI responder.
//!
//! Binds one `TcpListener` per declared endpoint and runs each one's accept
//! loop as an independent `tokio::spawn`'d task (`TcpListener::bind` plus a
//! background task per listener), so that N independent listeners share
//! only the immutable [`ArtifactStore`] and the port map.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tracing::{debug, info, warn};

use crate::mapi;
use crate::store::ArtifactStore;
use crate::tls::{self, TlsEndpointConfig, TlsVersion};
use crate::{Error, Result};

/// One declared MAPI endpoint.
struct EndpointDecl {
    name: &'static str,
    tls: Option<TlsEndpointConfig<'static>>,
}

/// The seven MAPI endpoints, in declaration order. Order matters in
/// sequential port-allocation mode.
const ENDPOINTS: &[EndpointDecl] = &[
    EndpointDecl { name: "plain", tls: None },
    EndpointDecl {
        name: "server1",
        tls: Some(TlsEndpointConfig { cert_id: "server1", version_pin: None, client_trust_id: None }),
    },
    EndpointDecl {
        name: "server2",
        tls: Some(TlsEndpointConfig { cert_id: "server2", version_pin: None, client_trust_id: None }),
    },
    EndpointDecl {
        name: "server3",
        tls: Some(TlsEndpointConfig { cert_id: "server3", version_pin: None, client_trust_id: None }),
    },
    EndpointDecl {
        name: "expiredcert",
        tls: Some(TlsEndpointConfig { cert_id: "server1x", version_pin: None, client_trust_id: None }),
    },
    EndpointDecl {
        name: "tls12",
        tls: Some(TlsEndpointConfig {
            cert_id: "server1",
            version_pin: Some(TlsVersion::Tls12),
            client_trust_id: None,
        }),
    },
    EndpointDecl {
        name: "clientauth",
        tls: Some(TlsEndpointConfig {
            cert_id: "server1",
            version_pin: None,
            client_trust_id: Some("ca2"),
        }),
    },
];

/// An ordered, insertion-order-preserving endpoint-name → bound-port map.
///
/// Ordering matters because the HTTP directory lists endpoints in
/// declaration order; a plain `HashMap` would not preserve it.
#[derive(Debug, Clone, Default)]
pub struct PortMap {
    entries: Vec<(String, u16)>,
}

impl PortMap {
    fn insert(&mut self, name: impl Into<String>, port: u16) {
        self.entries.push((name.into(), port));
    }

    /// Look up the bound port for a named endpoint.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<u16> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, p)| *p)
    }

    /// Iterate `(name, port)` pairs in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u16)> {
        self.entries.iter().map(|(n, p)| (n.as_str(), *p))
    }

    /// Number of endpoints in the map.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Bind and spawn all seven MAPI listeners.
///
/// Returns the resulting port map once every listener is bound and its
/// accept loop has been spawned: the bound port for each MAPI endpoint is
/// written into the port map before the listener begins accepting.
///
/// # Errors
///
/// Returns an error if any endpoint's TLS config cannot be built from the
/// artifact store, or if any listener fails to bind.
pub async fn bind_all(
    listen_addr: &str,
    base_port: u16,
    sequential: bool,
    store: Arc<ArtifactStore>,
) -> Result<PortMap> {
    let mut port_map = PortMap::default();

    for (index, decl) in ENDPOINTS.iter().enumerate() {
        // Sequential mode: the HTTP directory owns base_port, so MAPI
        // listeners start at base_port + 1.
        let requested_port = if sequential {
            base_port
                .checked_add(1 + u16::try_from(index).unwrap_or(u16::MAX))
                .ok_or_else(|| Error::Config("sequential port allocation overflowed u16".to_string()))?
        } else {
            0
        };

        let listener = bind_with_reuseaddr(listen_addr, requested_port)
            .await
            .map_err(|e| Error::Bind { endpoint: decl.name.to_string(), source: into_io_error(e) })?;
        let bound_port = listener.local_addr()?.port();
        port_map.insert(decl.name, bound_port);

        let acceptor = match &decl.tls {
            Some(config) => {
                let server_config = tls::build_acceptor(&store, config)?;
                Some(tokio_rustls::TlsAcceptor::from(Arc::new(server_config)))
            }
            None => None,
        };

        info!(endpoint = decl.name, port = bound_port, tls = acceptor.is_some(), "bound MAPI endpoint");
        tokio::spawn(accept_loop(decl.name, listener, acceptor));
    }

    Ok(port_map)
}

fn into_io_error(e: Error) -> std::io::Error {
    match e {
        Error::Io(io) => io,
        other => std::io::Error::other(other.to_string()),
    }
}

/// Bind a listener with `SO_REUSEADDR` set, so rapid restarts during
/// client-test iteration don't stall on `TIME_WAIT`. Shared with the HTTP
/// directory publisher, which binds exactly `base_port` the same way.
pub(crate) async fn bind_with_reuseaddr(host: &str, port: u16) -> Result<TcpListener> {
    let mut addrs = tokio::net::lookup_host((host, port)).await?;
    let addr: SocketAddr = addrs
        .next()
        .ok_or_else(|| Error::Config(format!("could not resolve listen address '{host}'")))?;

    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };
    socket.set_reuseaddr(true)?;
    socket.bind(addr)?;
    Ok(socket.listen(1024)?)
}

/// Accept connections for one endpoint forever; each connection is handled
/// on its own spawned task so a slow or hung client never blocks accept on
/// this listener or any other.
async fn accept_loop(
    endpoint: &'static str,
    listener: TcpListener,
    acceptor: Option<tokio_rustls::TlsAcceptor>,
) {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(pair) => pair,
            Err(e) => {
                warn!(endpoint, error = %e, "accept failed");
                continue;
            }
        };
        debug!(endpoint, %peer, "accepted connection");
        let acceptor = acceptor.clone();
        tokio::spawn(async move {
            handle_connection(endpoint, stream, acceptor).await;
        });
    }
}

/// Drive one connection: optional TLS handshake, challenge, one logical
/// request, error reply, close.
async fn handle_connection(
    endpoint: &'static str,
    stream: TcpStream,
    acceptor: Option<tokio_rustls::TlsAcceptor>,
) {
    match acceptor {
        Some(acceptor) => match acceptor.accept(stream).await {
            Ok(tls_stream) => drive_mapi_exchange(endpoint, tls_stream).await,
            Err(e) => {
                // Handshake failure is never fatal to the listener.
                info!(endpoint, error = %e, "TLS handshake failed");
            }
        },
        None => drive_mapi_exchange(endpoint, stream).await,
    }
}

async fn drive_mapi_exchange<S>(endpoint: &'static str, mut stream: S)
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    if let Err(e) = mapi::write_message(&mut stream, CHALLENGE_BYTES).await {
        warn!(endpoint, error = %e, "failed to send challenge");
        return;
    }

    if let Err(e) = mapi::read_message(&mut stream).await {
        info!(endpoint, error = %e, "failed to read client request");
        return;
    }

    if let Err(e) = mapi::write_message(&mut stream, ERROR_BYTES).await {
        warn!(endpoint, error = %e, "failed to send error reply");
    }
}

const CHALLENGE_BYTES: &[u8] = mapi::CHALLENGE.as_bytes();
const ERROR_BYTES: &[u8] = mapi::ERROR_REPLY.as_bytes();

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_declarations_match_the_spec_table() {
        let names: Vec<&str> = ENDPOINTS.iter().map(|e| e.name).collect();
        assert_eq!(
            names,
            vec!["plain", "server1", "server2", "server3", "expiredcert", "tls12", "clientauth"]
        );
    }

    #[test]
    fn plain_endpoint_has_no_tls() {
        assert!(ENDPOINTS[0].tls.is_none());
    }

    #[test]
    fn expiredcert_endpoint_uses_server1x_certificate() {
        let decl = ENDPOINTS.iter().find(|e| e.name == "expiredcert").unwrap();
        assert_eq!(decl.tls.as_ref().unwrap().cert_id, "server1x");
    }

    #[test]
    fn tls12_endpoint_pins_tls_1_2() {
        let decl = ENDPOINTS.iter().find(|e| e.name == "tls12").unwrap();
        assert_eq!(decl.tls.as_ref().unwrap().version_pin, Some(TlsVersion::Tls12));
    }

    #[test]
    fn clientauth_endpoint_trusts_ca2() {
        let decl = ENDPOINTS.iter().find(|e| e.name == "clientauth").unwrap();
        assert_eq!(decl.tls.as_ref().unwrap().client_trust_id, Some("ca2"));
    }

    #[test]
    fn port_map_preserves_insertion_order() {
        let mut map = PortMap::default();
        map.insert("plain", 1);
        map.insert("server1", 2);
        let ordered: Vec<(&str, u16)> = map.iter().collect();
        assert_eq!(ordered, vec![("plain", 1), ("server1", 2)]);
    }

    #[test]
    fn port_map_get_finds_bound_port_by_name() {
        let mut map = PortMap::default();
        map.insert("plain", 4242);
        assert_eq!(map.get("plain"), Some(4242));
        assert_eq!(map.get("nope"), None);
    }
}
