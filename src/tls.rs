//! TLS context factory.
//!
//! Builds a `rustls::ServerConfig` for one declared endpoint directly from
//! in-memory PEM bytes held in the [`ArtifactStore`] — no temporary files.
//! Root store construction, the `WebPkiClientVerifier` builder, and
//! certificate chain / key loading via `rustls-pemfile` are generalized
//! from a single fixed mTLS policy to per-endpoint version pinning and
//! optional client trust anchors. Keys and certs are read directly from
//! the in-memory slice; there is no scoped-temp-file dance to maintain.

use std::sync::Arc;

use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::server::WebPkiClientVerifier;
use rustls::{RootCertStore, ServerConfig};

use crate::store::ArtifactStore;
use crate::{Error, Result};

/// A TLS protocol version an endpoint can be pinned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsVersion {
    /// TLS 1.2 only.
    Tls12,
    /// TLS 1.3 only.
    Tls13,
}

/// Declarative TLS configuration for one endpoint, resolved against the
/// [`ArtifactStore`] by [`build_acceptor`].
#[derive(Debug, Clone)]
pub struct TlsEndpointConfig<'a> {
    /// Artifact name stem of the server certificate/key (`cert_id`).
    pub cert_id: &'a str,
    /// When set, both the minimum and maximum negotiated version are
    /// pinned to this value. When unset, minimum is TLS 1.3 and the
    /// maximum is unrestricted.
    pub version_pin: Option<TlsVersion>,
    /// When set, peer certificate verification is required against the
    /// trust anchor `{client_trust_id}.crt`.
    pub client_trust_id: Option<&'a str>,
}

/// Build a `rustls::ServerConfig` for one endpoint.
///
/// # Errors
///
/// Returns an error if the referenced artifacts are missing or malformed,
/// or if rustls rejects the resulting configuration (e.g. mismatched
/// cert/key pair).
pub fn build_acceptor(store: &ArtifactStore, config: &TlsEndpointConfig<'_>) -> Result<ServerConfig> {
    let server_certs = load_certs(store, &format!("{}.crt", config.cert_id))?;
    let server_key = load_private_key(store, &format!("{}.key", config.cert_id))?;

    let versions = match config.version_pin {
        Some(version) => versions_for(version),
        None => &[&rustls::version::TLS13],
    };
    let builder = ServerConfig::builder_with_protocol_versions(versions);

    let tls_config = match config.client_trust_id {
        Some(trust_id) => {
            let ca_certs = load_certs(store, &format!("{trust_id}.crt"))?;
            let mut root_store = RootCertStore::empty();
            for cert in ca_certs {
                root_store.add(cert).map_err(|e| {
                    Error::Config(format!("failed to add trust anchor '{trust_id}' to root store: {e}"))
                })?;
            }
            let verifier = WebPkiClientVerifier::builder(Arc::new(root_store))
                .build()
                .map_err(|e| Error::Config(format!("failed to build client verifier: {e}")))?;
            builder
                .with_client_cert_verifier(verifier)
                .with_single_cert(server_certs, server_key)
        }
        None => builder
            .with_no_client_auth()
            .with_single_cert(server_certs, server_key),
    }
    .map_err(|e| Error::Config(format!("TLS config error for '{}': {e}", config.cert_id)))?;

    Ok(tls_config)
}

fn versions_for(version: TlsVersion) -> &'static [&'static rustls::SupportedProtocolVersion] {
    match version {
        TlsVersion::Tls12 => &[&rustls::version::TLS12],
        TlsVersion::Tls13 => &[&rustls::version::TLS13],
    }
}

fn load_certs(store: &ArtifactStore, name: &str) -> Result<Vec<CertificateDer<'static>>> {
    let bytes = store
        .get(name)
        .ok_or_else(|| Error::Config(format!("artifact '{name}' not found")))?;
    let certs: Vec<CertificateDer<'static>> = rustls_pemfile::certs(&mut &*bytes)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::Config(format!("failed to parse certs from '{name}': {e}")))?;
    if certs.is_empty() {
        return Err(Error::Config(format!("no certificates found in '{name}'")));
    }
    Ok(certs)
}

fn load_private_key(store: &ArtifactStore, name: &str) -> Result<PrivateKeyDer<'static>> {
    let bytes = store
        .get(name)
        .ok_or_else(|| Error::Config(format!("artifact '{name}' not found")))?;
    rustls_pemfile::private_key(&mut &*bytes)
        .map_err(|e| Error::Config(format!("failed to parse private key from '{name}': {e}")))?
        .ok_or_else(|| Error::Config(format!("no private key found in '{name}'")))
}
