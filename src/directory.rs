//! HTTP directory publisher.
//!
//! An `axum` router exposing the generated PKI artifacts and the MAPI port
//! map to a test client over plain HTTP: shared immutable state behind
//! `Arc`, routes as thin lookups with no business logic of their own.

use std::sync::Arc;

use axum::Router;
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::fleet::PortMap;
use crate::store::{self, ArtifactStore};
use crate::Result;

#[derive(Clone)]
struct AppState {
    store: Arc<ArtifactStore>,
    ports: Arc<PortMap>,
}

fn build_router(store: Arc<ArtifactStore>, ports: Arc<PortMap>) -> Router {
    Router::new()
        .route("/", get(list_ports))
        .route("/{name}", get(get_artifact))
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { store, ports })
}

/// `GET /`: one `NAME:PORT` line per declared MAPI endpoint, in declaration
/// order.
async fn list_ports(State(state): State<AppState>) -> impl IntoResponse {
    let mut body = String::new();
    for (name, port) in state.ports.iter() {
        body.push_str(name);
        body.push(':');
        body.push_str(&port.to_string());
        body.push('\n');
    }
    ([(header::CONTENT_TYPE, store::TEXT_CONTENT_TYPE)], body)
}

/// `GET /{name}`: the raw bytes of one artifact, or 404 if it isn't in the
/// store.
async fn get_artifact(State(state): State<AppState>, Path(name): Path<String>) -> Response {
    match state.store.get(&name) {
        Some(bytes) => {
            let content_type = store::content_type_for(&bytes);
            ([(header::CONTENT_TYPE, content_type)], bytes.to_vec()).into_response()
        }
        None => (StatusCode::NOT_FOUND, format!("no such artifact: {name}")).into_response(),
    }
}

/// Bind the directory listener on exactly `base_port`.
///
/// Bound before any MAPI listener in sequential mode, so the endpoint
/// fleet's `base_port + 1, +2, ...` allocation is unambiguous.
///
/// # Errors
///
/// Returns an error if the listener fails to bind.
pub async fn bind(listen_addr: &str, base_port: u16) -> Result<tokio::net::TcpListener> {
    crate::fleet::bind_with_reuseaddr(listen_addr, base_port)
        .await
        .map_err(|e| crate::Error::Bind { endpoint: "directory".to_string(), source: into_io_error(e) })
}

/// Serve the directory forever on an already-bound listener.
///
/// # Errors
///
/// Returns an error if the HTTP server exits abnormally.
pub async fn serve_on(
    listener: tokio::net::TcpListener,
    store: Arc<ArtifactStore>,
    ports: Arc<PortMap>,
) -> Result<()> {
    let bound = listener.local_addr()?;
    info!(addr = %bound, "HTTP directory listening");

    let router = build_router(store, ports);
    axum::serve(listener, router)
        .await
        .map_err(|e| crate::Error::Config(format!("HTTP directory server failed: {e}")))?;
    Ok(())
}

fn into_io_error(e: crate::Error) -> std::io::Error {
    match e {
        crate::Error::Io(io) => io,
        other => std::io::Error::other(other.to_string()),
    }
}
