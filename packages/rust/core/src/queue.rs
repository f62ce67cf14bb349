//! Work queue builder: selects one run's bounded shard.
//!
//! Intersects the ranked catalog with the completion ledger, truncates
//! to the per-run cap, and partitions the result into priority tiers.

use std::collections::HashSet;

use insightforge_shared::{CatalogItem, PriorityTier, WorkQueueEntry};

/// Build the work queue for one run.
///
/// The raw catalog is scanned in rank order past already-completed
/// items until `cap` new entries are collected or the catalog is
/// exhausted; the cap applies to the filtered queue, never the raw
/// catalog. The top `ceil(len × premium_fraction)` entries of the
/// filtered queue are premium; the rest standard.
pub fn build(
    catalog: &[CatalogItem],
    completed: &HashSet<String>,
    cap: usize,
    premium_fraction: f64,
) -> Vec<WorkQueueEntry> {
    let selected: Vec<&CatalogItem> = catalog
        .iter()
        .filter(|item| !completed.contains(&item.id))
        .take(cap)
        .collect();

    let premium_count = premium_slots(selected.len(), premium_fraction);

    selected
        .into_iter()
        .enumerate()
        .map(|(i, item)| WorkQueueEntry {
            item: item.clone(),
            tier: if i < premium_count {
                PriorityTier::Premium
            } else {
                PriorityTier::Standard
            },
        })
        .collect()
}

/// `ceil(len × fraction)`, clamped to the queue length.
fn premium_slots(len: usize, fraction: f64) -> usize {
    if len == 0 || fraction <= 0.0 {
        return 0;
    }
    ((len as f64 * fraction).ceil() as usize).min(len)
}
