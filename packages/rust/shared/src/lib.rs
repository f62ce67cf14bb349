//! Shared types, error model, and configuration for insightforge.
//!
//! This crate is the foundation depended on by all other insightforge crates.
//! It provides:
//! - [`InsightForgeError`], the unified error type
//! - Domain types ([`CatalogItem`], [`WorkQueueEntry`], [`InsightAsset`], [`RunReport`])
//! - Configuration ([`AppConfig`], [`RunConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, BackendsConfig, CatalogConfig, OutputConfig, ProviderConfig, ProviderFlavor,
    RetryConfig, RunKnobs, config_dir, config_file_path, init_config, load_config,
    load_config_from, validate_startup,
};
pub use error::{InsightForgeError, Result};
pub use types::{CatalogItem, InsightAsset, PriorityTier, QuizPair, RunReport, WorkQueueEntry};
