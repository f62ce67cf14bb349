//! Validation & persistence gate.
//!
//! The only path by which an asset reaches durable storage. Validation
//! happens first; only a valid asset is serialized, gzip-compressed,
//! and written under `products/{item_id}.json.gz` via a temp-file +
//! rename so readers never observe a partial file. A `false` return
//! means storage and the ledger were left untouched.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde_json::Value;
use tracing::{debug, warn};

use insightforge_shared::{InsightAsset, InsightForgeError, Result};

use crate::schema;

/// Gate over one products directory and one schema document.
pub struct Gate {
    schema: Value,
    products_dir: PathBuf,
}

impl Gate {
    pub fn new(schema: Value, products_dir: PathBuf) -> Self {
        Self {
            schema,
            products_dir,
        }
    }

    /// Target path for an item's asset file.
    pub fn asset_path(&self, item_id: &str) -> PathBuf {
        self.products_dir.join(format!("{item_id}.json.gz"))
    }

    /// Validate and persist one asset.
    ///
    /// Returns `true` only after the asset passed schema validation and
    /// the compressed file was durably renamed into place. Failures are
    /// logged and isolated; the caller moves on to the next item.
    pub fn commit(&self, asset: &InsightAsset) -> bool {
        match self.try_commit(asset) {
            Ok(()) => {
                debug!(item = %asset.item_id, tier = %asset.tier, "asset committed");
                true
            }
            Err(e) => {
                warn!(item = %asset.item_id, error = %e, "asset rejected");
                false
            }
        }
    }

    fn try_commit(&self, asset: &InsightAsset) -> Result<()> {
        let value = serde_json::to_value(asset)
            .map_err(|e| InsightForgeError::validation(format!("serialize failed: {e}")))?;

        schema::validate(&self.schema, &value)?;

        std::fs::create_dir_all(&self.products_dir)
            .map_err(|e| InsightForgeError::io(&self.products_dir, e))?;

        let bytes = serde_json::to_vec(&value)
            .map_err(|e| InsightForgeError::validation(format!("serialize failed: {e}")))?;

        let target = self.asset_path(&asset.item_id);
        let temp = self
            .products_dir
            .join(format!(".{}.json.gz.tmp", asset.item_id));

        let file = std::fs::File::create(&temp).map_err(|e| InsightForgeError::io(&temp, e))?;
        let mut encoder = GzEncoder::new(file, Compression::default());
        encoder
            .write_all(&bytes)
            .map_err(|e| InsightForgeError::io(&temp, e))?;
        encoder
            .finish()
            .map_err(|e| InsightForgeError::io(&temp, e))?;

        std::fs::rename(&temp, &target).map_err(|e| InsightForgeError::io(&target, e))?;
        Ok(())
    }
}

/// Read back a persisted asset (gunzip + parse). Used by the audit path.
pub fn read_asset(path: &Path) -> Result<Value> {
    let file = std::fs::File::open(path).map_err(|e| InsightForgeError::io(path, e))?;
    let mut decoder = GzDecoder::new(file);
    let mut content = String::new();
    decoder
        .read_to_string(&mut content)
        .map_err(|e| InsightForgeError::io(path, e))?;

    serde_json::from_str(&content)
        .map_err(|e| InsightForgeError::parse(format!("{}: {e}", path.display())))
}
