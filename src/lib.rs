//! TLS MAPI test harness
//!
//! Generates a small self-contained X.509 PKI and serves a fleet of
//! MAPI-stub TLS endpoints, each configured differently (plain, TLS 1.3,
//! TLS 1.2-only, client-auth-required, expired certificate), so a MonetDB
//! wire-protocol TLS client implementation can be exercised against all of
//! them in one run. A small HTTP directory publishes the generated
//! artifacts and the endpoints' bound ports for the test client to fetch.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cli;
pub mod directory;
pub mod error;
pub mod fleet;
pub mod mapi;
pub mod pki;
pub mod store;
pub mod tls;
pub mod writeout;

pub use error::{Error, Result};

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the global `tracing` subscriber.
///
/// # Errors
///
/// Returns an error if a global subscriber has already been installed.
pub fn setup_tracing(level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .try_init()
        .map_err(|e| Error::Config(format!("failed to install tracing subscriber: {e}")))
}
