//! Persistence layer.
//!
//! In-memory state is authoritative; storage is a durability mirror. Each
//! concern is saved under its own key through a `PersistenceGateway`, and
//! every key is loaded independently so that one missing or corrupted value
//! only resets that concern to its defaults.

pub mod file;
pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

pub use file::JsonFileStore;
pub use memory::MemoryStore;

/// Key-value store holding one JSON document per key.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    /// Raw JSON stored under `key`, or `None` if nothing was ever saved.
    async fn load(&self, key: &str) -> Result<Option<String>>;

    /// Replace the value stored under `key`.
    async fn save(&self, key: &str, json: &str) -> Result<()>;
}

/// Every key the core reads or writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
    Settings,
    History,
    SessionStats,
    DismissedNudges,
    SelfExclusion,
    BreakUntil,
    RealityCheck,
}

impl StorageKey {
    pub const ALL: &'static [StorageKey] = &[
        StorageKey::Settings,
        StorageKey::History,
        StorageKey::SessionStats,
        StorageKey::DismissedNudges,
        StorageKey::SelfExclusion,
        StorageKey::BreakUntil,
        StorageKey::RealityCheck,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StorageKey::Settings => "settings",
            StorageKey::History => "history",
            StorageKey::SessionStats => "session-stats",
            StorageKey::DismissedNudges => "dismissed-nudges",
            StorageKey::SelfExclusion => "self-exclusion",
            StorageKey::BreakUntil => "break-until",
            StorageKey::RealityCheck => "reality-check",
        }
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Load and decode one key, falling back to `T::default()` when the key is
/// absent, unreadable, or holds malformed JSON.
pub async fn load_or_default<T>(gateway: &dyn PersistenceGateway, key: StorageKey) -> T
where
    T: DeserializeOwned + Default,
{
    match gateway.load(key.as_str()).await {
        Ok(Some(raw)) => match serde_json::from_str(&raw) {
            Ok(value) => {
                debug!(%key, "Loaded persisted value");
                value
            }
            Err(e) => {
                warn!(%key, error = %e, "Discarding malformed persisted value, using defaults");
                T::default()
            }
        },
        Ok(None) => {
            debug!(%key, "Nothing persisted, using defaults");
            T::default()
        }
        Err(e) => {
            warn!(%key, error = %e, "Failed to load persisted value, using defaults");
            T::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

enum WriteOp {
    Save { key: StorageKey, json: String },
    Flush(oneshot::Sender<()>),
}

/// Fire-and-forget handle to a background writer.
///
/// Mutations serialise their new snapshot synchronously and enqueue it;
/// one task applies the writes in submission order, so a later snapshot is
/// never overwritten by an earlier one. Clones share the same task, which
/// exits once every handle is dropped.
#[derive(Clone)]
pub struct PersistenceWriter {
    tx: Option<mpsc::UnboundedSender<WriteOp>>,
}

impl PersistenceWriter {
    /// Start the writer task. Must be called inside a tokio runtime.
    pub fn spawn(gateway: Arc<dyn PersistenceGateway>) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<WriteOp>();

        let handle = tokio::spawn(async move {
            while let Some(op) = rx.recv().await {
                match op {
                    WriteOp::Save { key, json } => {
                        if let Err(e) = gateway.save(key.as_str(), &json).await {
                            warn!(%key, error = %e, "Failed to persist value");
                        }
                    }
                    WriteOp::Flush(done) => {
                        let _ = done.send(());
                    }
                }
            }
            debug!("Persistence writer stopped");
        });

        (Self { tx: Some(tx) }, handle)
    }

    /// A writer that discards everything; state lives in memory only.
    pub fn detached() -> Self {
        Self { tx: None }
    }

    /// Enqueue `value` to be saved under `key`.
    pub fn save<T: Serialize>(&self, key: StorageKey, value: &T) {
        let Some(tx) = &self.tx else {
            return;
        };
        let json = match serde_json::to_string(value) {
            Ok(json) => json,
            Err(e) => {
                warn!(%key, error = %e, "Failed to serialise value for persistence");
                return;
            }
        };
        if tx.send(WriteOp::Save { key, json }).is_err() {
            warn!(%key, "Persistence writer has stopped; value kept in memory only");
        }
    }

    /// Wait until every write enqueued before this call has been attempted.
    pub async fn flush(&self) {
        let Some(tx) = &self.tx else {
            return;
        };
        let (done_tx, done_rx) = oneshot::channel();
        if tx.send(WriteOp::Flush(done_tx)).is_ok() {
            let _ = done_rx.await;
        }
    }
}

impl fmt::Debug for PersistenceWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistenceWriter")
            .field("detached", &self.tx.is_none())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
