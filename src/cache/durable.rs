//! Durable record cache that survives process restarts.
//!
//! Holds the last known-good set of records together with the time it was
//! saved. Readers decide what to do with stale data; the cache never discards
//! records on its own.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DurableCacheError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Summary of what the durable cache currently holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DurableCacheInfo {
    pub exists: bool,
    pub age: Option<Duration>,
    pub records: usize,
    pub fresh: bool,
}

/// Persisted key-value store for one record set with age-based freshness.
pub trait DurableCache<T>: Send + Sync {
    /// Last saved records, fresh or not.
    fn get_cached(&self) -> Option<Vec<T>>;

    /// Whether the saved records are younger than the freshness window.
    fn is_fresh(&self) -> bool;

    /// Replace the saved records.
    ///
    /// The new records are readable through `get_cached` even when saving
    /// them fails; the error only reports that they were not persisted.
    fn set_cached(&self, records: &[T]) -> Result<(), DurableCacheError>;

    /// Keep the records but treat them as stale from now on.
    fn mark_stale(&self);

    fn info(&self) -> DurableCacheInfo;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Snapshot<T> {
    saved_at_secs: u64,
    records: Vec<T>,
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

impl<T> Snapshot<T> {
    fn age(&self) -> Duration {
        Duration::from_secs(now_secs().saturating_sub(self.saved_at_secs))
    }

    fn is_fresh(&self, max_age: Duration) -> bool {
        self.saved_at_secs > 0 && self.age() < max_age
    }
}

fn info_of<T>(snapshot: Option<&Snapshot<T>>, max_age: Duration) -> DurableCacheInfo {
    match snapshot {
        Some(s) => DurableCacheInfo {
            exists: true,
            age: Some(s.age()),
            records: s.records.len(),
            fresh: s.is_fresh(max_age),
        },
        None => DurableCacheInfo {
            exists: false,
            age: None,
            records: 0,
            fresh: false,
        },
    }
}

/// JSON-file backed durable cache.
pub struct FileDurableCache<T> {
    path: PathBuf,
    max_age: Duration,
    state: RwLock<Option<Snapshot<T>>>,
}

impl<T> FileDurableCache<T>
where
    T: Clone + Serialize + DeserializeOwned + Send + Sync,
{
    /// Open the cache at `path`, loading previously saved records if present.
    ///
    /// A corrupt file is ignored (and overwritten on the next save).
    pub fn open(path: impl AsRef<Path>, max_age: Duration) -> Self {
        let path = path.as_ref().to_path_buf();
        let state = match Self::load(&path) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Ignoring unreadable durable cache");
                None
            }
        };

        if let Some(snapshot) = &state {
            tracing::info!(
                path = %path.display(),
                records = snapshot.records.len(),
                "Loaded durable cache"
            );
        }

        Self {
            path,
            max_age,
            state: RwLock::new(state),
        }
    }

    fn load(path: &Path) -> Result<Option<Snapshot<T>>, DurableCacheError> {
        if !path.exists() {
            return Ok(None);
        }
        let reader = BufReader::new(File::open(path)?);
        Ok(Some(serde_json::from_reader(reader)?))
    }

    fn persist(&self, snapshot: &Snapshot<T>) -> Result<(), DurableCacheError> {
        let tmp = self.path.with_extension("tmp");
        {
            let writer = BufWriter::new(File::create(&tmp)?);
            serde_json::to_writer(writer, snapshot)?;
        }
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl<T> DurableCache<T> for FileDurableCache<T>
where
    T: Clone + Serialize + DeserializeOwned + Send + Sync,
{
    fn get_cached(&self) -> Option<Vec<T>> {
        read(&self.state).as_ref().map(|s| s.records.clone())
    }

    fn is_fresh(&self) -> bool {
        read(&self.state).as_ref().is_some_and(|s| s.is_fresh(self.max_age))
    }

    fn set_cached(&self, records: &[T]) -> Result<(), DurableCacheError> {
        let mut state = write(&self.state);
        let snapshot = state.insert(Snapshot {
            saved_at_secs: now_secs(),
            records: records.to_vec(),
        });
        self.persist(snapshot)?;
        tracing::debug!(path = %self.path.display(), records = records.len(), "Saved durable cache");
        Ok(())
    }

    fn mark_stale(&self) {
        let mut state = write(&self.state);
        if let Some(snapshot) = state.as_mut() {
            snapshot.saved_at_secs = 0;
            if let Err(e) = self.persist(snapshot) {
                tracing::warn!(path = %self.path.display(), error = %e, "Failed to persist stale marker");
            }
        }
    }

    fn info(&self) -> DurableCacheInfo {
        info_of(read(&self.state).as_ref(), self.max_age)
    }
}

/// In-memory durable cache, for tests and when persistence is disabled.
pub struct MemoryDurableCache<T> {
    max_age: Duration,
    state: RwLock<Option<Snapshot<T>>>,
}

impl<T> MemoryDurableCache<T> {
    pub fn new(max_age: Duration) -> Self {
        Self {
            max_age,
            state: RwLock::new(None),
        }
    }
}

impl<T> DurableCache<T> for MemoryDurableCache<T>
where
    T: Clone + Send + Sync,
{
    fn get_cached(&self) -> Option<Vec<T>> {
        read(&self.state).as_ref().map(|s| s.records.clone())
    }

    fn is_fresh(&self) -> bool {
        read(&self.state).as_ref().is_some_and(|s| s.is_fresh(self.max_age))
    }

    fn set_cached(&self, records: &[T]) -> Result<(), DurableCacheError> {
        *write(&self.state) = Some(Snapshot {
            saved_at_secs: now_secs(),
            records: records.to_vec(),
        });
        Ok(())
    }

    fn mark_stale(&self) {
        if let Some(snapshot) = write(&self.state).as_mut() {
            snapshot.saved_at_secs = 0;
        }
    }

    fn info(&self) -> DurableCacheInfo {
        info_of(read(&self.state).as_ref(), self.max_age)
    }
}

fn read<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}
