//! End-to-end production run: ledger → queue → generate → commit → ledger.
//!
//! Processing is strictly sequential: upstream rate limits make
//! parallel fan-out counter-productive, and sequential processing keeps
//! failure isolation trivial. The ledger is written exactly once, at
//! the end of the run, as an atomic whole-file replace; on abrupt
//! termination it reflects only items whose commit had already
//! succeeded, so partially-generated items are simply re-attempted on
//! the next run.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Instant;

use chrono::Utc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use insightforge_shared::{CatalogItem, PriorityTier, Result, RunReport};

use crate::gate::Gate;
use crate::generate::Generator;
use crate::{assemble, queue, schema};

/// Configuration for one production run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Per-run item cap.
    pub cap: usize,
    /// Fraction of the queue assigned the premium tier.
    pub premium_fraction: f64,
    /// Estimated-spend ceiling; 0.0 disables the meter.
    pub cost_ceiling_usd: f64,
    /// Completion-ledger file.
    pub ledger_path: PathBuf,
    /// Directory for produced asset files.
    pub products_dir: PathBuf,
    /// Asset schema document.
    pub schema_path: PathBuf,
}

// ---------------------------------------------------------------------------
// Progress reporting
// ---------------------------------------------------------------------------

/// Progress callback for reporting run status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called after each queue item resolves, committed or not.
    fn item_done(&self, item_id: &str, committed: bool, current: usize, total: usize);
    /// Called when the run completes.
    fn done(&self, report: &RunReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn item_done(&self, _item_id: &str, _committed: bool, _current: usize, _total: usize) {}
    fn done(&self, _report: &RunReport) {}
}

// ---------------------------------------------------------------------------
// Run controller
// ---------------------------------------------------------------------------

/// Run the full production pipeline over a pre-fetched catalog.
///
/// Per-item failures are isolated: logged, counted, and never fatal.
/// The only error this returns is a failed ledger persist at the end;
/// everything produced before that is already durably on disk.
#[instrument(skip_all, fields(catalog = catalog.len(), cap = config.cap))]
pub async fn run(
    config: &RunConfig,
    catalog: &[CatalogItem],
    generator: &Generator,
    progress: &dyn ProgressReporter,
) -> Result<RunReport> {
    let run_id = Uuid::now_v7();
    let started_at = Utc::now();
    let start = Instant::now();

    info!(%run_id, "starting production run");

    progress.phase("Loading completion ledger");
    let completed = insightforge_ledger::load(&config.ledger_path);

    progress.phase("Building work queue");
    let queue = queue::build(catalog, &completed, config.cap, config.premium_fraction);
    let premium_assigned = queue
        .iter()
        .filter(|e| e.tier == PriorityTier::Premium)
        .count();

    info!(
        queued = queue.len(),
        premium = premium_assigned,
        already_completed = completed.len(),
        "work queue built"
    );

    progress.phase("Loading asset schema");
    let gate = Gate::new(
        schema::load_schema(&config.schema_path),
        config.products_dir.clone(),
    );

    progress.phase("Producing insight assets");

    let mut new_ids: HashSet<String> = HashSet::new();
    let mut produced_premium = 0usize;
    let mut produced_standard = 0usize;
    let mut failed = 0usize;
    let mut skipped_cost = 0usize;
    let mut spent_usd = 0.0f64;

    for (i, entry) in queue.iter().enumerate() {
        if config.cost_ceiling_usd > 0.0 && spent_usd >= config.cost_ceiling_usd {
            skipped_cost = queue.len() - i;
            warn!(
                spent_usd,
                ceiling_usd = config.cost_ceiling_usd,
                skipped = skipped_cost,
                "cost ceiling reached, remaining queue skipped"
            );
            break;
        }

        let outcome = generator.generate(entry).await;
        spent_usd += outcome.cost_usd;

        let committed = match outcome.insight {
            Some(generated) => {
                let asset = assemble::assemble(&entry.item, &generated.text, generated.tier_used);
                if gate.commit(&asset) {
                    new_ids.insert(entry.item.id.clone());
                    match generated.tier_used {
                        PriorityTier::Premium => produced_premium += 1,
                        PriorityTier::Standard => produced_standard += 1,
                    }
                    true
                } else {
                    failed += 1;
                    false
                }
            }
            None => {
                warn!(item = %entry.item.id, "no backend produced an insight, item skipped");
                failed += 1;
                false
            }
        };

        progress.item_done(&entry.item.id, committed, i + 1, queue.len());
    }

    // One atomic write at end of run; also re-canonicalizes a ledger
    // file that was found corrupt at load time.
    progress.phase("Persisting completion ledger");
    insightforge_ledger::merge_and_persist(&config.ledger_path, &completed, &new_ids)?;

    let report = RunReport {
        run_id,
        started_at,
        finished_at: Utc::now(),
        queued: queue.len(),
        premium_assigned,
        produced_premium,
        produced_standard,
        failed,
        skipped_cost,
        estimated_cost_usd: spent_usd,
    };

    info!(
        %run_id,
        produced_premium,
        produced_standard,
        failed,
        skipped_cost,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "production run complete"
    );

    progress.done(&report);
    Ok(report)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
