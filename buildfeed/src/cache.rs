//! Time-boxed cache over a durable key-value store, plus the error cooldown
//! that throttles repeated failing fetch rounds.
use crate::counter;
use crate::metrics_defs::{CACHE_EXPIRED, CACHE_HIT, CACHE_MISS};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub const CACHE_DURATION: Duration = Duration::from_secs(30 * 60);
pub const COOLDOWN_DURATION: Duration = Duration::from_secs(15 * 60);

// Value of `last_error_ms` before any error was recorded.
const NEVER: u64 = 0;

pub trait Clock: Send + Sync {
    /// Milliseconds since the UNIX epoch.
    fn now_ms(&self) -> u64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// Stored form of every cached value.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct CacheEntry<T> {
    pub timestamp: u64,
    pub data: T,
}

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// String key-value storage that outlives the process.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// One file per key under a base directory.
pub struct FilesystemStore {
    dir: PathBuf,
}

impl FilesystemStore {
    pub fn new(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        fs::create_dir_all(dir.as_ref())?;
        Ok(FilesystemStore {
            dir: dir.as_ref().to_path_buf(),
        })
    }

    // Keys are arbitrary strings, encode them into something safe as a file name.
    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", URL_SAFE_NO_PAD.encode(key.as_bytes())))
    }
}

impl KeyValueStore for FilesystemStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        fs::write(self.path_for(key), value)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        match fs::remove_file(self.path_for(key)) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

/// Non-durable store, used when no cache directory is configured.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

pub struct CacheStore {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    // In-memory only, a restart clears the cooldown.
    last_error_ms: AtomicU64,
}

impl CacheStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    pub fn with_clock(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        CacheStore {
            store,
            clock,
            last_error_ms: AtomicU64::new(NEVER),
        }
    }

    fn elapsed_since(&self, timestamp: u64) -> Duration {
        Duration::from_millis(self.clock.now_ms().saturating_sub(timestamp))
    }

    /// Returns the payload stored under `key` if it is younger than
    /// `CACHE_DURATION`. Expired entries are removed.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.store.get(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                counter!(CACHE_MISS).increment(1);
                return None;
            }
            Err(e) => {
                tracing::warn!(key, error = %e, "failed to read cache entry");
                return None;
            }
        };

        let entry: CacheEntry<T> = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(key, error = %e, "ignoring undecodable cache entry");
                return None;
            }
        };

        if self.elapsed_since(entry.timestamp) < CACHE_DURATION {
            counter!(CACHE_HIT).increment(1);
            return Some(entry.data);
        }

        counter!(CACHE_EXPIRED).increment(1);
        tracing::debug!(key, "cache entry expired");
        if let Err(e) = self.store.remove(key) {
            tracing::warn!(key, error = %e, "failed to remove expired cache entry");
        }
        None
    }

    /// Overwrites the entry for `key`. Failures are logged, not returned.
    pub fn put<T: Serialize>(&self, key: &str, value: &T) {
        let entry = CacheEntry {
            timestamp: self.clock.now_ms(),
            data: value,
        };

        let result = serde_json::to_string(&entry)
            .map_err(StoreError::from)
            .and_then(|raw| self.store.set(key, &raw));

        if let Err(e) = result {
            tracing::error!(key, error = %e, "failed to save cache entry");
        }
    }

    pub fn is_in_cooldown(&self) -> bool {
        let last = self.last_error_ms.load(Ordering::Acquire);
        last != NEVER && self.elapsed_since(last) < COOLDOWN_DURATION
    }

    /// Starts the cooldown window.
    pub fn mark_error(&self) {
        // Zero is reserved for "no error yet"
        let now = self.clock.now_ms().max(1);
        self.last_error_ms.store(now, Ordering::Release);
    }
}
