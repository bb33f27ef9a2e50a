use crate::errors::LedgerError;
use crate::models::{DayKey, DayLedger, LedgerData, StoredDay};
use crate::storage::persist_data;
use std::{future::Future, path::PathBuf, sync::Arc};
use tokio::sync::Mutex;
use tracing::{debug, error};

/// A stored value together with the version it was read at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Versioned<T> {
    pub version: u64,
    pub value: T,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CasOutcome {
    Committed { version: u64 },
    /// The stored version no longer matches the expected one.
    Conflict,
}

/// Versioned key-value storage for day ledgers.
///
/// Writers never overwrite blindly: `compare_and_swap` only commits when the
/// key is still at the version the caller read (`None` meaning the key must
/// still be absent).
pub trait LedgerStore: Send + Sync {
    fn load(
        &self,
        key: &DayKey,
    ) -> impl Future<Output = Result<Option<Versioned<DayLedger>>, LedgerError>> + Send;

    fn compare_and_swap(
        &self,
        key: &DayKey,
        expected_version: Option<u64>,
        next: DayLedger,
    ) -> impl Future<Output = Result<CasOutcome, LedgerError>> + Send;
}

/// In-memory ledger map, optionally mirrored to a JSON file on every commit.
///
/// Single-file store: every commit rewrites the whole file under one lock, so
/// commits for unrelated users queue behind each other.
#[derive(Clone)]
pub struct JsonLedgerStore {
    path: Option<PathBuf>,
    data: Arc<Mutex<LedgerData>>,
}

impl JsonLedgerStore {
    pub fn new(path: PathBuf, data: LedgerData) -> Self {
        Self {
            path: Some(path),
            data: Arc::new(Mutex::new(data)),
        }
    }

    pub fn in_memory() -> Self {
        Self {
            path: None,
            data: Arc::new(Mutex::new(LedgerData::default())),
        }
    }
}

impl LedgerStore for JsonLedgerStore {
    async fn load(&self, key: &DayKey) -> Result<Option<Versioned<DayLedger>>, LedgerError> {
        let data = self.data.lock().await;
        Ok(data.get(key).map(|day| Versioned {
            version: day.version,
            value: day.ledger.clone(),
        }))
    }

    async fn compare_and_swap(
        &self,
        key: &DayKey,
        expected_version: Option<u64>,
        next: DayLedger,
    ) -> Result<CasOutcome, LedgerError> {
        let mut data = self.data.lock().await;
        let stored_version = data.get(key).map(|day| day.version);
        if stored_version != expected_version {
            debug!(
                user_id = %key.user_id,
                date = %key.date,
                ?expected_version,
                ?stored_version,
                "ledger version moved, rejecting commit"
            );
            return Ok(CasOutcome::Conflict);
        }

        let version = stored_version.map_or(1, |version| version + 1);
        let mut snapshot = data.clone();
        snapshot.insert(
            key,
            StoredDay {
                version,
                ledger: next,
            },
        );

        // Publish only after the file is durable so a failed write changes nothing.
        if let Some(path) = &self.path {
            if let Err(err) = persist_data(path, &snapshot).await {
                error!("failed to persist ledger data: {err}");
                return Err(err);
            }
        }
        *data = snapshot;

        debug!(user_id = %key.user_id, date = %key.date, version, "ledger committed");
        Ok(CasOutcome::Committed { version })
    }
}
