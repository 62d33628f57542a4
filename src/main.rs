//! `htlc-interceptor` binary.
//!
//! Connects to the node plugin and resolves every intercepted HTLC with the
//! pass-through decider until interrupted. Deployments with a real policy
//! embed the library and supply their own [`htlc_interceptor::Decider`].

mod cli;

use std::time::Duration;

use clap::Parser;
use htlc_interceptor::{
    Interceptor,
    InterceptorConfig,
    NoGraph,
    NodeId,
    PassThrough,
    ReconnectConfig,
    TcpTransport,
};
use log::info;
use tokio::{select, signal};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Applications embedding the library should install their own subscriber.
    tracing_subscriber::fmt::init();

    let cli = cli::Cli::parse();
    let node_id: NodeId = cli.node_id.parse()?;

    if let Some(addr) = cli.metrics_listen {
        install_metrics_exporter(addr)?;
    }

    let config = InterceptorConfig::new(cli.plugin_address, node_id)
        .reconnect(ReconnectConfig {
            delay: Duration::from_millis(cli.reconnect_delay_ms),
        })
        .graph_timeout(Duration::from_millis(cli.graph_timeout_ms))
        .max_in_flight(cli.max_in_flight)
        .max_frame_length(cli.max_frame_length);
    let transport = TcpTransport::from_config(&config);
    let interceptor = Interceptor::new(&config, transport, PassThrough, NoGraph);

    let run = interceptor.start();
    tokio::pin!(run);
    select! {
        res = &mut run => return res.map_err(Into::into),
        res = signal::ctrl_c() => {
            res?;
            info!("shutdown signal received");
        }
    }

    let (stopped, started) = tokio::join!(interceptor.stop(), run);
    stopped?;
    started?;
    Ok(())
}

#[cfg(feature = "metrics")]
fn install_metrics_exporter(addr: std::net::SocketAddr) -> Result<(), Box<dyn std::error::Error>> {
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    info!("serving metrics: addr={addr}");
    Ok(())
}

#[cfg(not(feature = "metrics"))]
fn install_metrics_exporter(addr: std::net::SocketAddr) -> Result<(), Box<dyn std::error::Error>> {
    log::warn!("metrics feature disabled; ignoring --metrics-listen={addr}");
    Ok(())
}
