use crate::StorageError;
use anyhow::{Context, Result};
use filemart_market::{MarketSnapshot, SNAPSHOT_VERSION};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const SNAPSHOT_FILE: &str = "snapshot.json";
pub const MANIFEST_FILE: &str = "manifest.json";

/// Summary written next to an exported snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotManifest {
    pub version: u32,
    pub bid_count: u64,
    pub owner_count: u64,
    pub event_count: u64,
    /// Hex blake3 digest of `snapshot.json` as written.
    pub digest: String,
}

fn digest_of(bytes: &[u8]) -> String {
    hex::encode(blake3::hash(bytes).as_bytes())
}

/// Write `snapshot.json` and `manifest.json` into `dir`, creating it if needed.
pub fn export_snapshot(snapshot: &MarketSnapshot, dir: &Path) -> Result<SnapshotManifest> {
    fs::create_dir_all(dir)
        .with_context(|| format!("failed to create export directory {}", dir.display()))?;

    let body = serde_json::to_vec_pretty(snapshot).map_err(StorageError::from)?;
    let manifest = SnapshotManifest {
        version: snapshot.version,
        bid_count: snapshot.bids.len() as u64,
        owner_count: snapshot.owners.len() as u64,
        event_count: snapshot.events.len() as u64,
        digest: digest_of(&body),
    };

    fs::write(dir.join(SNAPSHOT_FILE), &body).map_err(StorageError::from)?;
    let manifest_body = serde_json::to_vec_pretty(&manifest).map_err(StorageError::from)?;
    fs::write(dir.join(MANIFEST_FILE), manifest_body).map_err(StorageError::from)?;

    tracing::info!(
        dir = %dir.display(),
        bids = manifest.bid_count,
        events = manifest.event_count,
        "snapshot exported"
    );
    Ok(manifest)
}

/// Read a snapshot previously written by [`export_snapshot`], verifying its digest.
pub fn import_snapshot(dir: &Path) -> Result<(SnapshotManifest, MarketSnapshot)> {
    let manifest_body = fs::read(dir.join(MANIFEST_FILE))
        .with_context(|| format!("missing {MANIFEST_FILE} in {}", dir.display()))?;
    let manifest: SnapshotManifest =
        serde_json::from_slice(&manifest_body).map_err(StorageError::from)?;
    if manifest.version != SNAPSHOT_VERSION {
        return Err(StorageError::UnsupportedVersion(manifest.version).into());
    }

    let body = fs::read(dir.join(SNAPSHOT_FILE))
        .with_context(|| format!("missing {SNAPSHOT_FILE} in {}", dir.display()))?;
    let actual = digest_of(&body);
    if actual != manifest.digest {
        return Err(StorageError::DigestMismatch {
            expected: manifest.digest,
            actual,
        }
        .into());
    }

    let snapshot: MarketSnapshot = serde_json::from_slice(&body).map_err(StorageError::from)?;
    if snapshot.version != manifest.version {
        return Err(StorageError::UnsupportedVersion(snapshot.version).into());
    }
    tracing::info!(dir = %dir.display(), events = manifest.event_count, "snapshot imported");
    Ok((manifest, snapshot))
}
