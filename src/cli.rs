//! Command line interface for the `htlc-interceptor` binary.
//!
//! Kept free of crate dependencies so the build script can include it to
//! render the man page.

use std::net::SocketAddr;

use clap::Parser;

/// Command line arguments for the `htlc-interceptor` binary.
#[derive(Debug, Parser)]
#[command(
    name = "htlc-interceptor",
    version,
    about = "Intercept forwarded HTLCs on a Lightning node and resolve them"
)]
pub struct Cli {
    /// Address of the node's interceptor plugin, as `host:port`.
    #[arg(long, env = "HTLC_INTERCEPTOR_PLUGIN_ADDRESS")]
    pub plugin_address: String,

    /// Hex-encoded public key of the local node.
    #[arg(long, env = "HTLC_INTERCEPTOR_NODE_ID")]
    pub node_id: String,

    /// Pause between HTLC stream reconnect attempts, in milliseconds.
    #[arg(long, default_value_t = 1_000)]
    pub reconnect_delay_ms: u64,

    /// Deadline for a channel graph lookup, in milliseconds.
    #[arg(long, default_value_t = 5_000)]
    pub graph_timeout_ms: u64,

    /// Maximum number of HTLCs processed concurrently. Unbounded if unset.
    #[arg(long)]
    pub max_in_flight: Option<usize>,

    /// Maximum transport frame length in bytes.
    #[arg(long, default_value_t = 64 * 1024)]
    pub max_frame_length: usize,

    /// Serve Prometheus metrics on this address.
    #[arg(long)]
    pub metrics_listen: Option<SocketAddr>,
}
