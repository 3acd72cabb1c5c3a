use anyhow::Result;
use filemart_market::{MarketEvent, MarketSnapshot};
use parking_lot::RwLock;
use sled::transaction::{ConflictableTransactionResult, TransactionError};
use sled::{Db, Transactional, Tree};
use std::path::Path;
use std::sync::Arc;

pub mod snapshot;

pub use snapshot::{export_snapshot, import_snapshot, SnapshotManifest};

const STATE_KEY: &[u8] = b"market";

/// Storage errors
#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] sled::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Event history diverged: {stored} events stored, snapshot carries {incoming}")]
    HistoryMismatch { stored: u64, incoming: u64 },
    #[error("Snapshot digest mismatch: manifest {expected}, computed {actual}")]
    DigestMismatch { expected: String, actual: String },
    #[error("Unsupported snapshot version {0}")]
    UnsupportedVersion(u32),
    #[error("Storage transaction aborted")]
    Aborted,
}

/// Abstract persistence for the market image and its event journal.
pub trait MarketStore {
    /// Latest saved image, with its full event journal.
    fn load(&self) -> Result<Option<MarketSnapshot>>;
    /// Persist `snapshot`, appending journal entries not yet stored.
    fn save(&self, snapshot: &MarketSnapshot) -> Result<()>;
    /// Journal entries with `sequence >= from`.
    fn events_since(&self, from: u64) -> Result<Vec<MarketEvent>>;
    /// Swap the stored image and journal for `snapshot` in one step.
    ///
    /// Unlike [`MarketStore::save`] the incoming journal may be shorter than
    /// the stored one. Either the whole image is replaced or nothing changes.
    fn replace(&self, snapshot: &MarketSnapshot) -> Result<()>;
    /// Remove every stored record.
    fn reset(&self) -> Result<()>;
}

/// Sled-backed implementation
pub struct SledMarketStore {
    db: Db,
    state: Tree,
    events: Tree,
}

impl SledMarketStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = sled::open(path)?;
        let state = db.open_tree("state")?;
        let events = db.open_tree("events")?;
        Ok(Self { db, state, events })
    }

    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }

    /// Number of journal entries stored.
    pub fn event_count(&self) -> Result<u64> {
        Ok(match self.events.last()? {
            Some((key, _)) => decode_sequence(&key)? + 1,
            None => 0,
        })
    }
}

fn decode_sequence(key: &[u8]) -> Result<u64> {
    let bytes: [u8; 8] = key
        .try_into()
        .map_err(|_| anyhow::anyhow!("event key has {} bytes, expected 8", key.len()))?;
    Ok(u64::from_be_bytes(bytes))
}

fn check_history(stored: u64, incoming: u64) -> Result<()> {
    if incoming < stored {
        return Err(StorageError::HistoryMismatch { stored, incoming }.into());
    }
    Ok(())
}

type EncodedEvents = Vec<(Vec<u8>, Vec<u8>)>;

/// Serialize the image without its journal, plus journal entries from `skip` on.
fn encode_image(snapshot: &MarketSnapshot, skip: usize) -> Result<(Vec<u8>, EncodedEvents)> {
    let image = MarketSnapshot {
        events: Vec::new(),
        ..snapshot.clone()
    };
    let state_bytes = serde_json::to_vec(&image).map_err(StorageError::from)?;
    let events = snapshot
        .events
        .iter()
        .skip(skip)
        .map(|event| -> serde_json::Result<(Vec<u8>, Vec<u8>)> {
            Ok((event.sequence.to_be_bytes().to_vec(), serde_json::to_vec(event)?))
        })
        .collect::<serde_json::Result<Vec<_>>>()
        .map_err(StorageError::from)?;
    Ok((state_bytes, events))
}

impl SledMarketStore {
    /// Write the image, drop `stale` journal keys and insert `events`, all in
    /// one multi-tree transaction.
    fn write_image(
        &self,
        state_bytes: &[u8],
        stale: &[Vec<u8>],
        events: &[(Vec<u8>, Vec<u8>)],
    ) -> Result<()> {
        (&self.state, &self.events)
            .transaction(
                |(state_tree, event_tree)| -> ConflictableTransactionResult<(), ()> {
                    state_tree.insert(STATE_KEY, state_bytes)?;
                    for key in stale {
                        event_tree.remove(key.as_slice())?;
                    }
                    for (key, value) in events {
                        event_tree.insert(key.as_slice(), value.as_slice())?;
                    }
                    Ok(())
                },
            )
            .map_err(|err| match err {
                TransactionError::Abort(()) => StorageError::Aborted,
                TransactionError::Storage(e) => StorageError::Database(e),
            })?;
        self.flush()
    }
}

impl MarketStore for SledMarketStore {
    fn load(&self) -> Result<Option<MarketSnapshot>> {
        let Some(bytes) = self.state.get(STATE_KEY)? else {
            return Ok(None);
        };
        let mut snapshot: MarketSnapshot =
            serde_json::from_slice(&bytes).map_err(StorageError::from)?;
        snapshot.events = self.events_since(0)?;
        Ok(Some(snapshot))
    }

    fn save(&self, snapshot: &MarketSnapshot) -> Result<()> {
        let stored = self.event_count()?;
        check_history(stored, snapshot.events.len() as u64)?;

        let (state_bytes, new_events) = encode_image(snapshot, stored as usize)?;
        self.write_image(&state_bytes, &[], &new_events)?;
        tracing::debug!(
            bids = snapshot.bids.len(),
            appended = new_events.len(),
            "market snapshot saved"
        );
        Ok(())
    }

    fn replace(&self, snapshot: &MarketSnapshot) -> Result<()> {
        let (state_bytes, events) = encode_image(snapshot, 0)?;
        let stale = self
            .events
            .range((snapshot.events.len() as u64).to_be_bytes().to_vec()..)
            .keys()
            .map(|key| key.map(|key| key.to_vec()))
            .collect::<std::result::Result<Vec<_>, sled::Error>>()
            .map_err(StorageError::from)?;

        self.write_image(&state_bytes, &stale, &events)?;
        tracing::info!(
            bids = snapshot.bids.len(),
            events = events.len(),
            dropped = stale.len(),
            "market image replaced"
        );
        Ok(())
    }

    fn events_since(&self, from: u64) -> Result<Vec<MarketEvent>> {
        self.events
            .range(from.to_be_bytes().to_vec()..)
            .map(|item| -> Result<MarketEvent> {
                let (_, value) = item?;
                Ok(serde_json::from_slice(&value).map_err(StorageError::from)?)
            })
            .collect()
    }

    fn reset(&self) -> Result<()> {
        self.state.clear()?;
        self.events.clear()?;
        self.flush()?;
        tracing::info!("market store cleared");
        Ok(())
    }
}

/// In-memory implementation
#[derive(Default, Clone)]
pub struct MemoryMarketStore {
    image: Arc<RwLock<Option<MarketSnapshot>>>,
}

impl MemoryMarketStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MarketStore for MemoryMarketStore {
    fn load(&self) -> Result<Option<MarketSnapshot>> {
        Ok(self.image.read().clone())
    }

    fn save(&self, snapshot: &MarketSnapshot) -> Result<()> {
        let mut image = self.image.write();
        let stored = image.as_ref().map(|s| s.events.len() as u64).unwrap_or(0);
        check_history(stored, snapshot.events.len() as u64)?;
        *image = Some(snapshot.clone());
        Ok(())
    }

    fn replace(&self, snapshot: &MarketSnapshot) -> Result<()> {
        *self.image.write() = Some(snapshot.clone());
        Ok(())
    }

    fn events_since(&self, from: u64) -> Result<Vec<MarketEvent>> {
        Ok(self
            .image
            .read()
            .as_ref()
            .map(|s| {
                s.events
                    .iter()
                    .filter(|event| event.sequence >= from)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn reset(&self) -> Result<()> {
        *self.image.write() = None;
        Ok(())
    }
}
