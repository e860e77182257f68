//! `tlstester` — TLS MAPI test harness binary entry point.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};

use tlstester::cli::Cli;
use tlstester::{directory, fleet, pki, setup_tracing, writeout};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    if let Err(e) = setup_tracing(level) {
        eprintln!("failed to set up logging: {e}");
        return ExitCode::FAILURE;
    }

    let store = match pki::generate(&cli.hostname) {
        Ok(store) => store,
        Err(e) => {
            error!("PKI generation failed: {e}");
            return ExitCode::FAILURE;
        }
    };
    let store = Arc::new(store);

    if let Some(dir) = &cli.write {
        if let Err(e) = writeout::write_all(&store, dir).await {
            error!("failed to write artifacts to '{}': {e}", dir.display());
            return ExitCode::FAILURE;
        }
    }

    // Bind the directory listener on base_port before the MAPI fleet, so
    // sequential port allocation (base_port + 1, +2, ...) is unambiguous.
    let directory_listener = match directory::bind(&cli.listen_addr, cli.base_port).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("failed to bind HTTP directory: {e}");
            return ExitCode::FAILURE;
        }
    };

    let ports = match fleet::bind_all(&cli.listen_addr, cli.base_port, cli.sequential, store.clone()).await {
        Ok(ports) => ports,
        Err(e) => {
            error!("failed to bind MAPI endpoint fleet: {e}");
            return ExitCode::FAILURE;
        }
    };
    let ports = Arc::new(ports);

    info!(
        base_port = cli.base_port,
        sequential = cli.sequential,
        endpoints = ports.len(),
        "MAPI endpoint fleet bound"
    );

    if let Err(e) = directory::serve_on(directory_listener, store, ports).await {
        error!("HTTP directory server failed: {e}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
