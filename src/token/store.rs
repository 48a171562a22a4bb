//! Revocation Store
//!
//! Key/value backends with per-key expiry that hold revocation records.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::core::{Clock, SystemClock};
use crate::error::{JwtAuthError, StoreError};

/// Revocation store interface.
///
/// A write must be visible to later reads from the same process.
#[async_trait]
pub trait RevocationStore: Send + Sync {
    /// Store a value under a key for `ttl`.
    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), JwtAuthError>;

    /// Retrieve a live value.
    async fn get(&self, key: &str) -> Result<Option<String>, JwtAuthError>;

    /// Delete a key. Returns whether it existed.
    async fn delete(&self, key: &str) -> Result<bool, JwtAuthError>;

    /// Whether [`RevocationStore::delete_prefix`] is available.
    fn supports_prefix_delete(&self) -> bool {
        false
    }

    /// Delete every key starting with `prefix`. Returns the number deleted.
    async fn delete_prefix(&self, prefix: &str) -> Result<u64, JwtAuthError> {
        Err(StoreError::Unsupported {
            operation: format!("delete_prefix({})", prefix),
        }
        .into())
    }
}

/// Writes between sweeps of expired entries.
pub const PURGE_INTERVAL: u64 = 64;

#[derive(Clone, Debug)]
struct Entry {
    value: String,
    expires_at_ms: i64,
}

/// Expiring map shared by the in-memory and mock stores.
struct Entries {
    entries: Mutex<HashMap<String, Entry>>,
    clock: Arc<dyn Clock>,
    writes: AtomicU64,
}

impl Entries {
    fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
            writes: AtomicU64::new(0),
        }
    }

    fn set(&self, key: &str, value: String, ttl: Duration) {
        let now = self.clock.now_ms();
        let expires_at_ms = now.saturating_add(i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX));

        let mut entries = self.entries.lock();
        if (self.writes.fetch_add(1, Ordering::Relaxed) + 1) % PURGE_INTERVAL == 0 {
            entries.retain(|_, entry| entry.expires_at_ms > now);
        }
        entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at_ms,
            },
        );
    }

    fn get(&self, key: &str) -> Option<String> {
        let now = self.clock.now_ms();
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(entry) if entry.expires_at_ms > now => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    fn delete(&self, key: &str) -> bool {
        let now = self.clock.now_ms();
        self.entries
            .lock()
            .remove(key)
            .map(|entry| entry.expires_at_ms > now)
            .unwrap_or(false)
    }

    fn delete_prefix(&self, prefix: &str) -> u64 {
        let now = self.clock.now_ms();
        let mut entries = self.entries.lock();
        let mut deleted = 0;
        entries.retain(|key, entry| {
            if key.starts_with(prefix) {
                if entry.expires_at_ms > now {
                    deleted += 1;
                }
                false
            } else {
                true
            }
        });
        deleted
    }

    fn purge_expired(&self) -> usize {
        let now = self.clock.now_ms();
        let mut entries = self.entries.lock();
        let initial_count = entries.len();
        entries.retain(|_, entry| entry.expires_at_ms > now);
        initial_count - entries.len()
    }

    fn len(&self) -> usize {
        self.entries.lock().len()
    }

    fn live_keys(&self) -> Vec<String> {
        let now = self.clock.now_ms();
        let mut keys: Vec<String> = self
            .entries
            .lock()
            .iter()
            .filter(|(_, entry)| entry.expires_at_ms > now)
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        keys
    }
}

/// In-process revocation store.
///
/// Suitable for a single process; records are lost on restart.
pub struct InMemoryRevocationStore {
    entries: Entries,
}

impl InMemoryRevocationStore {
    /// Create new in-memory store using the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create new in-memory store measuring expiry with `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Entries::new(clock),
        }
    }

    /// Drop expired records. Returns how many were dropped.
    ///
    /// Writes also sweep expired records every [`PURGE_INTERVAL`] calls.
    pub fn purge_expired(&self) -> usize {
        self.entries.purge_expired()
    }

    /// Records held, including expired ones not swept yet.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keys of live records, sorted.
    pub fn keys(&self) -> Vec<String> {
        self.entries.live_keys()
    }
}

impl Default for InMemoryRevocationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RevocationStore for InMemoryRevocationStore {
    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), JwtAuthError> {
        self.entries.set(key, value, ttl);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, JwtAuthError> {
        Ok(self.entries.get(key))
    }

    async fn delete(&self, key: &str) -> Result<bool, JwtAuthError> {
        Ok(self.entries.delete(key))
    }

    fn supports_prefix_delete(&self) -> bool {
        true
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<u64, JwtAuthError> {
        Ok(self.entries.delete_prefix(prefix))
    }
}

/// Mock revocation store for testing.
pub struct MockRevocationStore {
    entries: Entries,
    set_history: Mutex<Vec<(String, String, Duration)>>,
    get_history: Mutex<Vec<String>>,
    delete_history: Mutex<Vec<String>>,
    next_error: Mutex<Option<JwtAuthError>>,
    should_fail: Mutex<bool>,
    delay: Mutex<Option<Duration>>,
    prefix_delete: bool,
}

impl MockRevocationStore {
    /// Create new mock store using the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create new mock store measuring expiry with `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Entries::new(clock),
            set_history: Mutex::new(Vec::new()),
            get_history: Mutex::new(Vec::new()),
            delete_history: Mutex::new(Vec::new()),
            next_error: Mutex::new(None),
            should_fail: Mutex::new(false),
            delay: Mutex::new(None),
            prefix_delete: false,
        }
    }

    /// Advertise prefix deletion.
    pub fn with_prefix_delete(mut self, enabled: bool) -> Self {
        self.prefix_delete = enabled;
        self
    }

    /// Set next error to return.
    pub fn set_next_error(&self, error: JwtAuthError) -> &Self {
        *self.next_error.lock() = Some(error);
        self
    }

    /// Set store to fail all operations.
    pub fn set_should_fail(&self, should_fail: bool) -> &Self {
        *self.should_fail.lock() = should_fail;
        self
    }

    /// Delay every operation.
    pub fn set_delay(&self, delay: Option<Duration>) -> &Self {
        *self.delay.lock() = delay;
        self
    }

    /// Pre-populate a record.
    pub fn add_record(&self, key: &str, value: &str, ttl: Duration) -> &Self {
        self.entries.set(key, value.to_string(), ttl);
        self
    }

    /// Get set history as `(key, value, ttl)`.
    pub fn get_set_history(&self) -> Vec<(String, String, Duration)> {
        self.set_history.lock().clone()
    }

    /// Get get history.
    pub fn get_get_history(&self) -> Vec<String> {
        self.get_history.lock().clone()
    }

    /// Get delete history.
    pub fn get_delete_history(&self) -> Vec<String> {
        self.delete_history.lock().clone()
    }

    /// Keys of live records, sorted.
    pub fn keys(&self) -> Vec<String> {
        self.entries.live_keys()
    }

    async fn check_error(&self) -> Result<(), JwtAuthError> {
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if *self.should_fail.lock() {
            return Err(StoreError::Unavailable {
                message: "Mock store failure".to_string(),
            }
            .into());
        }

        if let Some(error) = self.next_error.lock().take() {
            return Err(error);
        }

        Ok(())
    }
}

impl Default for MockRevocationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RevocationStore for MockRevocationStore {
    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), JwtAuthError> {
        self.check_error().await?;

        self.set_history
            .lock()
            .push((key.to_string(), value.clone(), ttl));
        self.entries.set(key, value, ttl);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, JwtAuthError> {
        self.check_error().await?;

        self.get_history.lock().push(key.to_string());
        Ok(self.entries.get(key))
    }

    async fn delete(&self, key: &str) -> Result<bool, JwtAuthError> {
        self.check_error().await?;

        self.delete_history.lock().push(key.to_string());
        Ok(self.entries.delete(key))
    }

    fn supports_prefix_delete(&self) -> bool {
        self.prefix_delete
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<u64, JwtAuthError> {
        if !self.prefix_delete {
            return Err(StoreError::Unsupported {
                operation: format!("delete_prefix({})", prefix),
            }
            .into());
        }
        self.check_error().await?;
        Ok(self.entries.delete_prefix(prefix))
    }
}

/// Create in-memory revocation store.
pub fn create_in_memory_revocation_store() -> InMemoryRevocationStore {
    InMemoryRevocationStore::new()
}

/// Create mock revocation store for testing.
pub fn create_mock_revocation_store() -> MockRevocationStore {
    MockRevocationStore::new()
}
