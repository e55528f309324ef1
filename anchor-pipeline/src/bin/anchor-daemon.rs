//! Anchoring daemon: reconciliation sweeps on an interval

use anchor_core::TransactionStore;
use anchor_pipeline::reconcile::VerifyOnlySource;
use anchor_pipeline::{AnchorPipeline, DaemonConfig, ReconciliationJob};
use ledger_gateway::{ConsensusClient, MirrorClient};
use std::error::Error;
use std::sync::atomic::Ordering;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    tracing::info!("Starting VeriMed anchor daemon");

    // Load configuration
    let config = match std::env::var("ANCHOR_CONFIG") {
        Ok(path) => DaemonConfig::from_file(path)?,
        Err(_) => DaemonConfig::from_env()?,
    };

    // Startup invariant: production never runs simulated
    config.validate()?;

    let store = Arc::new(TransactionStore::open(&config.core)?);
    let client = Arc::new(ConsensusClient::new(config.gateway.clone())?);
    let mirror = Arc::new(MirrorClient::new(&config.gateway)?);

    let pipeline = Arc::new(AnchorPipeline::new(
        store,
        client,
        &config.core,
        config.retry.clone(),
        config.gateway.fee.clone(),
    ));

    // Without a domain-storage adapter the sweep confirms submitted
    // anchors only; embedders provide their own EntitySource for full
    // re-anchoring.
    let job = Arc::new(ReconciliationJob::new(
        pipeline,
        Arc::new(VerifyOnlySource),
        mirror,
        config.reconcile.clone(),
    ));

    let stop = job.stop_handle();
    let loop_handle = tokio::spawn(job.run_loop());

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down anchor daemon");
    stop.store(true, Ordering::Relaxed);
    loop_handle.abort();

    Ok(())
}
