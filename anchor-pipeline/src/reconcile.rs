//! Reconciliation: best-effort batch repair of missing or unconfirmed
//! anchors
//!
//! Scans for entities whose bookkeeping row is absent, a simulation
//! fallback, or present but unverified, orders them oldest first, and
//! re-drives each through the regular pipeline with a fixed inter-item
//! delay so the external log is not resaturated. Per-item failures are
//! caught and counted independently; a run can be aborted between items
//! without corrupting state, and re-running it is a no-op for anything
//! already verified.

use crate::config::ReconcileConfig;
use crate::pipeline::AnchorPipeline;
use crate::{Error, Result};
use anchor_core::types::{EntityType, LedgerTransactionRecord, RecordSnapshot, TxStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ledger_gateway::mirror::TransactionLookup;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Boundary to the (out-of-scope) domain storage layer
///
/// The reconciliation job needs two things from it: which entities carry
/// no anchor at all, and the current snapshot of any entity it re-drives.
#[async_trait]
pub trait EntitySource: Send + Sync {
    /// Entities with no ledger transaction recorded (e.g. created while
    /// anchoring was down)
    async fn unanchored(&self) -> Result<Vec<(EntityType, String)>>;

    /// Current snapshot of one entity, if it still exists
    async fn load(&self, entity_type: EntityType, entity_id: &str)
        -> Result<Option<RecordSnapshot>>;
}

/// Source for deployments where the domain store is not wired in
///
/// Reports nothing unanchored and no snapshots, which narrows the sweep
/// to confirming already-submitted anchors against the mirror.
#[derive(Debug, Clone, Default)]
pub struct VerifyOnlySource;

#[async_trait]
impl EntitySource for VerifyOnlySource {
    async fn unanchored(&self) -> Result<Vec<(EntityType, String)>> {
        Ok(Vec::new())
    }

    async fn load(
        &self,
        _entity_type: EntityType,
        _entity_id: &str,
    ) -> Result<Option<RecordSnapshot>> {
        Ok(None)
    }
}

/// Per-entity-type repair counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TypeCounts {
    /// Entities successfully re-anchored or confirmed
    pub repaired: u64,
    /// Entities whose repair failed this run
    pub failed: u64,
}

/// Aggregate result of one reconciliation run
#[derive(Debug, Clone)]
pub struct ReconciliationReport {
    /// Run start
    pub started_at: DateTime<Utc>,
    /// Run end
    pub finished_at: DateTime<Utc>,
    /// Work items considered
    pub scanned: usize,
    /// Items repaired
    pub repaired: u64,
    /// Items that failed (independently; no failure aborts the rest)
    pub failed: u64,
    /// Per-entity-type breakdown
    pub by_type: HashMap<EntityType, TypeCounts>,
    /// True when the run was stopped between items
    pub aborted: bool,
}

struct WorkItem {
    entity_type: EntityType,
    entity_id: String,
    existing: Option<LedgerTransactionRecord>,
}

/// The reconciliation job
pub struct ReconciliationJob {
    pipeline: Arc<AnchorPipeline>,
    source: Arc<dyn EntitySource>,
    lookup: Arc<dyn TransactionLookup>,
    config: ReconcileConfig,
    stop: Arc<AtomicBool>,
}

impl ReconciliationJob {
    /// Assemble the job
    pub fn new(
        pipeline: Arc<AnchorPipeline>,
        source: Arc<dyn EntitySource>,
        lookup: Arc<dyn TransactionLookup>,
        config: ReconcileConfig,
    ) -> Self {
        Self {
            pipeline,
            source,
            lookup,
            config,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Handle that aborts the run between items
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        self.stop.clone()
    }

    /// One reconciliation sweep
    pub async fn run(&self) -> Result<ReconciliationReport> {
        let started_at = Utc::now();
        let items = self.collect_work().await?;
        let scanned = items.len();

        info!(scanned, "Reconciliation sweep starting");

        let mut repaired = 0u64;
        let mut failed = 0u64;
        let mut by_type: HashMap<EntityType, TypeCounts> = HashMap::new();
        let mut aborted = false;

        for (i, item) in items.iter().enumerate() {
            if self.stop.load(Ordering::Relaxed) {
                warn!(processed = i, remaining = scanned - i, "Reconciliation aborted");
                aborted = true;
                break;
            }
            if i > 0 {
                tokio::time::sleep(Duration::from_millis(self.config.inter_item_delay_ms)).await;
            }

            let counts = by_type.entry(item.entity_type).or_default();
            match self.repair(item).await {
                Ok(()) => {
                    repaired += 1;
                    counts.repaired += 1;
                    self.pipeline.metrics().record_repair();
                }
                Err(e) => {
                    // One failure must not abort the remaining items
                    error!(
                        entity_type = %item.entity_type,
                        entity_id = %item.entity_id,
                        error = %e,
                        "Reconciliation item failed"
                    );
                    failed += 1;
                    counts.failed += 1;
                }
            }
        }

        let report = ReconciliationReport {
            started_at,
            finished_at: Utc::now(),
            scanned,
            repaired,
            failed,
            by_type,
            aborted,
        };

        info!(
            scanned = report.scanned,
            repaired = report.repaired,
            failed = report.failed,
            aborted = report.aborted,
            "Reconciliation sweep finished"
        );

        Ok(report)
    }

    /// Run forever on the configured interval (daemon mode)
    pub async fn run_loop(self: Arc<Self>) {
        let mut ticker =
            tokio::time::interval(Duration::from_secs(self.config.interval_secs));
        loop {
            ticker.tick().await;
            if self.stop.load(Ordering::Relaxed) {
                info!("Reconciliation loop stopping");
                return;
            }
            if let Err(e) = self.run().await {
                error!(error = %e, "Reconciliation sweep errored");
            }
        }
    }

    // Gather work oldest-first: entities with no row at all come before
    // rows ordered by creation time. An entity whose latest row is already
    // verified is excluded, which is what makes re-runs no-ops.
    async fn collect_work(&self) -> Result<Vec<WorkItem>> {
        let store = self.pipeline.store();
        let mut seen: HashSet<(EntityType, String)> = HashSet::new();
        let mut missing = Vec::new();
        let mut stale = Vec::new();

        for (entity_type, entity_id) in self.source.unanchored().await? {
            if !seen.insert((entity_type, entity_id.clone())) {
                continue;
            }
            match store.latest_for_entity(entity_type, &entity_id)? {
                Some(latest) if latest.verified => continue,
                Some(latest) => stale.push(WorkItem {
                    entity_type,
                    entity_id,
                    existing: Some(latest),
                }),
                None => missing.push(WorkItem {
                    entity_type,
                    entity_id,
                    existing: None,
                }),
            }
        }

        for row in store.scan_unverified(self.config.scan_limit)? {
            if !seen.insert((row.entity_type, row.entity_id.clone())) {
                continue;
            }
            let latest = store
                .latest_for_entity(row.entity_type, &row.entity_id)?
                .unwrap_or(row);
            if latest.verified {
                continue;
            }
            stale.push(WorkItem {
                entity_type: latest.entity_type,
                entity_id: latest.entity_id.clone(),
                existing: Some(latest),
            });
        }

        stale.sort_by_key(|item| item.existing.as_ref().map(|r| r.created_at));
        missing.extend(stale);
        Ok(missing)
    }

    // Repair one entity: confirm an unconfirmed success where possible,
    // otherwise re-anchor from the current snapshot and confirm the fresh
    // row.
    async fn repair(&self, item: &WorkItem) -> Result<()> {
        if let Some(existing) = &item.existing {
            if existing.status == TxStatus::Success {
                let payload = match self.source.load(item.entity_type, &item.entity_id).await? {
                    Some(snapshot) => Some(snapshot.to_value().map_err(Error::Core)?),
                    None => None,
                };
                match self
                    .pipeline
                    .verify_and_mark(existing, self.lookup.as_ref(), payload.as_ref())
                    .await
                {
                    Ok(_) => return Ok(()),
                    Err(e) => {
                        // Fall through to a fresh anchor; the old row stays
                        // as history
                        warn!(
                            transaction_id = %existing.transaction_id,
                            error = %e,
                            "Existing anchor did not verify; re-anchoring"
                        );
                    }
                }
            }
        }

        let snapshot = self
            .source
            .load(item.entity_type, &item.entity_id)
            .await?
            .ok_or_else(|| {
                Error::SnapshotUnavailable(format!("{}/{}", item.entity_type, item.entity_id))
            })?;

        let record = self
            .pipeline
            .anchor_direct(item.entity_type, &item.entity_id, &snapshot)
            .await?;

        match record.status {
            TxStatus::Failed => Err(Error::Other(
                record
                    .error
                    .unwrap_or_else(|| "submission failed".to_string()),
            )),
            TxStatus::Success => {
                let value = snapshot.to_value().map_err(Error::Core)?;
                if let Err(e) = self
                    .pipeline
                    .verify_and_mark(&record, self.lookup.as_ref(), Some(&value))
                    .await
                {
                    // Anchored but unconfirmed: the next sweep will pick it
                    // up again
                    warn!(
                        transaction_id = %record.transaction_id,
                        error = %e,
                        "Fresh anchor not yet verifiable"
                    );
                }
                Ok(())
            }
            // Simulated receipts stay unverified by design
            _ => Ok(()),
        }
    }
}
