//! Error types for the TLS MAPI test harness

use std::io;

use thiserror::Error;

/// Result type alias for the harness
pub type Result<T> = std::result::Result<T, Error>;

/// Harness errors.
///
/// Startup-fatal variants (`Pki`, `Bind`, `Config`) propagate out of `main`
/// and abort the process. `Tls` and `Protocol` are per-connection errors:
/// they are logged and the connection is dropped, never propagated across
/// connections.
#[derive(Error, Debug)]
pub enum Error {
    /// PKI generation failure (key generation, certificate signing,
    /// duplicate artifact name).
    #[error("PKI generation error: {0}")]
    Pki(String),

    /// Configuration error (bad CLI input, bad TLS config shape).
    #[error("Configuration error: {0}")]
    Config(String),

    /// Listener bind failure.
    #[error("Failed to bind '{endpoint}': {source}")]
    Bind {
        /// Endpoint name that failed to bind.
        endpoint: String,
        /// Underlying bind error.
        #[source]
        source: io::Error,
    },

    /// TLS handshake failure on an accepted connection.
    #[error("TLS handshake failed: {0}")]
    Tls(String),

    /// MAPI framing error (truncated message, oversized header).
    #[error("Protocol framing error: {0}")]
    Protocol(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}
