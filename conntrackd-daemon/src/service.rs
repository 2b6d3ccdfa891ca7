//! Service assembly and lifecycle.
//!
//! Builds the filter, the GeoIP reader, and the sink bus from the
//! resolved configuration, wires SIGINT/SIGTERM into a cancellation
//! token, and runs the ingest pipeline until shutdown.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;

use conntrackd_conntrack::IngestPipelineBuilder;
use conntrackd_core::config::ConntrackdConfig;
use conntrackd_filter::Filter;
use conntrackd_geoip::GeoReader;
use conntrackd_sink::SinkBus;

/// Build all components and run the pipeline until shutdown.
///
/// Returns `true` for a signal-initiated clean shutdown and `false`
/// when the listener died on a fatal socket error.
pub async fn run(config: ConntrackdConfig) -> Result<bool> {
    let filter = Arc::new(
        Filter::build(&config.filter_rules).context("failed to compile filter rules")?,
    );

    let geoip = match &config.geoip_database {
        Some(path) => Some(Arc::new(
            GeoReader::open(path).context("failed to open geoip database")?,
        )),
        None => None,
    };

    let bus = Arc::new(
        SinkBus::new(&config.sinks)
            .await
            .context("failed to initialize sinks")?,
    );

    tracing::info!(
        sinks = ?bus.sink_names(),
        rules = ?filter.rule_texts(),
        geoip = ?config.geoip_database,
        "starting conntrackd service"
    );

    let mut builder = IngestPipelineBuilder::new().filter(filter).bus(bus);
    if let Some(geoip) = geoip {
        builder = builder.geoip(geoip);
    }
    let pipeline = builder.build().context("failed to assemble pipeline")?;

    let cancel = CancellationToken::new();
    spawn_signal_handler(cancel.clone())?;

    let clean = pipeline
        .run(cancel)
        .await
        .context("conntrack pipeline failed")?;

    tracing::info!(clean = clean, "conntrackd service stopped");
    Ok(clean)
}

/// Spawn a task that cancels the token on SIGINT or SIGTERM.
fn spawn_signal_handler(cancel: CancellationToken) -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {}", e))?;

    tokio::spawn(async move {
        let signal = tokio::select! {
            _ = sigterm.recv() => "SIGTERM",
            _ = sigint.recv() => "SIGINT",
        };
        tracing::info!(signal = signal, "shutdown signal received");
        cancel.cancel();
    });

    Ok(())
}
