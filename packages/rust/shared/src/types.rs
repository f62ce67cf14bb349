//! Core domain types for the insight production pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// CatalogItem
// ---------------------------------------------------------------------------

/// One row of the source catalog, immutable once loaded for a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogItem {
    /// Stable unique identifier from the catalog source.
    pub id: String,
    /// Work title.
    pub title: String,
    /// Author credit (may be empty).
    pub author: String,
    /// Raw subject string from the catalog (may be empty).
    pub subjects: String,
    /// Popularity signal (download count); 0 when the column is absent.
    pub popularity: u64,
    /// 1-based rank by descending popularity, catalog order on ties.
    pub rank: usize,
}

// ---------------------------------------------------------------------------
// PriorityTier / WorkQueueEntry
// ---------------------------------------------------------------------------

/// Priority classification controlling how many backend stages are
/// attempted for an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriorityTier {
    Premium,
    Standard,
}

impl std::fmt::Display for PriorityTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Premium => write!(f, "premium"),
            Self::Standard => write!(f, "standard"),
        }
    }
}

/// One unit of work for a single run: an unprocessed catalog item and
/// the tier it was assigned at queue-build time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkQueueEntry {
    pub item: CatalogItem,
    pub tier: PriorityTier,
}

// ---------------------------------------------------------------------------
// InsightAsset
// ---------------------------------------------------------------------------

/// A question/answer pair inside an asset's quiz list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizPair {
    pub q: String,
    pub a: String,
}

/// The schema-shaped output record, one per produced item.
///
/// Created by the assembler, never mutated afterwards. Discarded (not
/// persisted, not ledgered) when it fails schema validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightAsset {
    /// Stable item identifier (catalog id).
    pub item_id: String,
    /// Truncated title (≤ 80 chars) or "Unknown".
    pub title: String,
    /// Truncated author (≤ 50 chars) or "Unknown Author".
    pub author: String,
    /// Target audience label.
    pub audience: String,
    /// The generated free-text insight.
    pub insight: String,
    /// Short prompt cards, at least 3.
    pub cards: Vec<String>,
    /// Question/answer pairs, at least 3.
    pub quiz: Vec<QuizPair>,
    /// Short narration script.
    pub narration: String,
    /// Keyword tags, at least 3.
    pub keywords: Vec<String>,
    /// The tier actually used to generate the insight (may differ from
    /// the assigned tier after fallback).
    pub tier: PriorityTier,
}

// ---------------------------------------------------------------------------
// RunReport
// ---------------------------------------------------------------------------

/// End-of-run summary counters. Successes are counted by the tier
/// actually used, not the tier assigned.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Time-sortable identifier for this run.
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Entries selected into the work queue.
    pub queued: usize,
    /// Entries assigned the premium tier at queue build.
    pub premium_assigned: usize,
    /// Assets committed with the premium tier label.
    pub produced_premium: usize,
    /// Assets committed with the standard tier label.
    pub produced_standard: usize,
    /// Items that produced no committed asset (retried on a later run).
    pub failed: usize,
    /// Items skipped because the cost ceiling was reached.
    pub skipped_cost: usize,
    /// Estimated spend accrued across all backend calls.
    pub estimated_cost_usd: f64,
}

impl RunReport {
    /// Total committed assets across both tiers.
    pub fn produced(&self) -> usize {
        self.produced_premium + self.produced_standard
    }
}
