//! Command-line interface

use std::path::PathBuf;

use clap::Parser;

/// A utility to help test TLS MAPI client implementations.
#[derive(Parser, Debug)]
#[command(name = "tlstester")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Base port on which the directory is reachable; also the baseline for
    /// sequential MAPI port allocation.
    #[arg(short = 'p', long = "base-port")]
    pub base_port: u16,

    /// Write generated keys and certs to this directory.
    #[arg(short = 'w', long = "write", value_name = "DIR")]
    pub write: Option<PathBuf>,

    /// Interface to listen on.
    #[arg(long = "listen-addr", default_value = "localhost")]
    pub listen_addr: String,

    /// Server name to sign certificates for.
    #[arg(
        short = 'n',
        long = "hostname",
        default_value = "localhost.localdomain"
    )]
    pub hostname: String,

    /// Allocate ports sequentially after base-port, instead of whatever the
    /// OS decides.
    #[arg(long = "sequential")]
    pub sequential: bool,

    /// Log more information.
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}
