//! Blacklist
//!
//! Revocation semantics on top of a [`RevocationStore`].
//!
//! Records live under `<prefix>:<scene>:<jti>`. Single-point tokens carry
//! `<scene>_<subject>` as their `jti`, so their record is the subject's
//! supersession cutoff; multi-point tokens get one record per token.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::core::Clock;
use crate::error::{JwtAuthError, JwtAuthResult, StoreError, TokenError};
use crate::telemetry::JwtMetrics;
use crate::token::RevocationStore;
use crate::types::{ClaimSet, SceneConfig};

/// Key segment of the per-scene key index.
pub const INDEX_KEY: &str = "__index";

/// Stored revocation record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevocationRecord {
    /// Cutoff in unix milliseconds.
    pub valid_until: i64,
}

impl RevocationRecord {
    /// Multi-point rule: the record blacks the token out once its cutoff is reached.
    pub fn blacks_out(&self, now_ms: i64) -> bool {
        self.valid_until <= now_ms
    }

    /// Single-point rule: tokens issued at or before the cutoff are superseded.
    pub fn supersedes(&self, issued_at_ms: i64) -> bool {
        issued_at_ms <= self.valid_until
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct IndexEntry {
    key: String,
    expires_at_ms: i64,
}

/// Revocation record writer and checker.
pub struct Blacklist<S: RevocationStore> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    timeout: Duration,
    metrics: Arc<dyn JwtMetrics>,
    index_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl<S: RevocationStore> Blacklist<S> {
    pub fn new(
        store: Arc<S>,
        clock: Arc<dyn Clock>,
        timeout: Duration,
        metrics: Arc<dyn JwtMetrics>,
    ) -> Self {
        Self {
            store,
            clock,
            timeout,
            metrics,
            index_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Store key of a token's record.
    pub fn record_key(scene: &SceneConfig, jti: &str) -> String {
        format!("{}:{}:{}", scene.blacklist_key_prefix, scene.name, jti)
    }

    fn scene_prefix(scene: &SceneConfig) -> String {
        format!("{}:{}:", scene.blacklist_key_prefix, scene.name)
    }

    fn index_key(scene: &SceneConfig) -> String {
        Self::record_key(scene, INDEX_KEY)
    }

    /// Revoke a token on logout.
    ///
    /// Returns `false` when the scene does not keep revocation records.
    pub async fn add(&self, scene: &SceneConfig, claims: &ClaimSet) -> JwtAuthResult<bool> {
        if !scene.blacklist_enabled {
            return Ok(false);
        }

        let jti = claims.jti().ok_or_else(|| TokenError::Malformed {
            message: "token has no jti".to_string(),
        })?;
        let now_ms = self.clock.now_ms();

        // Single-point stamps may run ahead of the clock within one millisecond.
        let (valid_until, ttl) = if scene.is_single_point() {
            let issued_at_ms = claims.issued_at_ms().unwrap_or(now_ms);
            (now_ms.max(issued_at_ms), Duration::from_secs(scene.ttl))
        } else {
            let exp_ms = claims
                .expires_at()
                .map(|exp| exp.saturating_mul(1000))
                .unwrap_or(now_ms);
            let remaining_ms = exp_ms.max(now_ms) - now_ms;
            if remaining_ms == 0 {
                debug!(scene = %scene.name, jti = jti, "Token already expired, no record written");
                return Ok(true);
            }
            (now_ms, Duration::from_secs(((remaining_ms + 999) / 1000) as u64))
        };

        let record = RevocationRecord { valid_until };
        self.write(scene, jti, record, ttl, "logout").await?;
        debug!(scene = %scene.name, jti = jti, "Token blacked out");
        Ok(true)
    }

    /// Supersede every earlier token of a single-point subject.
    pub async fn supersede(
        &self,
        scene: &SceneConfig,
        jti: &str,
        issued_at_ms: i64,
    ) -> JwtAuthResult<()> {
        if !scene.blacklist_enabled {
            return Ok(());
        }

        let record = RevocationRecord {
            valid_until: issued_at_ms - 1,
        };
        self.write(scene, jti, record, Duration::from_secs(scene.ttl), "supersession")
            .await?;
        debug!(scene = %scene.name, jti = jti, "Earlier tokens superseded");
        Ok(())
    }

    /// Check a token against its record.
    pub async fn is_revoked(&self, scene: &SceneConfig, claims: &ClaimSet) -> JwtAuthResult<bool> {
        let Some(jti) = claims.jti() else {
            return Ok(false);
        };

        let key = Self::record_key(scene, jti);
        let Some(raw) = self.bounded("get", self.store.get(&key)).await? else {
            return Ok(false);
        };

        let record: RevocationRecord = serde_json::from_str(&raw).map_err(|e| {
            self.metrics.record_store_error("get", "corrupted_record");
            StoreError::CorruptedRecord {
                key: key.clone(),
                message: e.to_string(),
            }
        })?;

        if scene.is_single_point() {
            // A missing iat counts as superseded.
            let issued_at_ms = claims.issued_at_ms().unwrap_or(i64::MIN);
            Ok(record.supersedes(issued_at_ms))
        } else {
            Ok(record.blacks_out(self.clock.now_ms()))
        }
    }

    /// Delete one record.
    pub async fn remove(&self, scene: &SceneConfig, jti: &str) -> JwtAuthResult<bool> {
        let key = Self::record_key(scene, jti);
        self.bounded("delete", self.store.delete(&key)).await
    }

    /// Delete every record of a scene. Returns how many were deleted.
    pub async fn clear(&self, scene: &SceneConfig) -> JwtAuthResult<u64> {
        if self.store.supports_prefix_delete() {
            let prefix = Self::scene_prefix(scene);
            return self
                .bounded("delete_prefix", self.store.delete_prefix(&prefix))
                .await;
        }

        let index_key = Self::index_key(scene);
        let lock = self.index_lock(&index_key);
        let _guard = lock.lock().await;

        let entries = self.read_index(&index_key).await?;
        let mut deleted = 0;
        for entry in entries {
            if self.bounded("delete", self.store.delete(&entry.key)).await? {
                deleted += 1;
            }
        }
        self.bounded("delete", self.store.delete(&index_key)).await?;
        Ok(deleted)
    }

    async fn write(
        &self,
        scene: &SceneConfig,
        jti: &str,
        record: RevocationRecord,
        ttl: Duration,
        kind: &'static str,
    ) -> JwtAuthResult<()> {
        let key = Self::record_key(scene, jti);
        let value = serde_json::to_string(&record).map_err(|e| StoreError::CorruptedRecord {
            key: key.clone(),
            message: e.to_string(),
        })?;

        if let Err(error) = self.bounded("set", self.store.set(&key, value, ttl)).await {
            self.metrics.record_revocation(&scene.name, kind, false);
            return Err(error);
        }
        self.metrics.record_revocation(&scene.name, kind, true);

        if !self.store.supports_prefix_delete() {
            self.index(scene, key, ttl).await?;
        }
        Ok(())
    }

    /// Add a key to the scene index, pruning expired entries.
    async fn index(&self, scene: &SceneConfig, key: String, ttl: Duration) -> JwtAuthResult<()> {
        let index_key = Self::index_key(scene);
        let lock = self.index_lock(&index_key);
        let _guard = lock.lock().await;

        let now_ms = self.clock.now_ms();
        let expires_at_ms = now_ms.saturating_add(i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX));

        let mut entries: Vec<IndexEntry> = self
            .read_index(&index_key)
            .await?
            .into_iter()
            .filter(|entry| entry.expires_at_ms > now_ms && entry.key != key)
            .collect();
        entries.push(IndexEntry { key, expires_at_ms });

        let longest_ms = entries
            .iter()
            .map(|entry| entry.expires_at_ms - now_ms)
            .max()
            .unwrap_or(0);
        let value = serde_json::to_string(&entries).map_err(|e| StoreError::CorruptedRecord {
            key: index_key.clone(),
            message: e.to_string(),
        })?;

        self.bounded(
            "set",
            self.store.set(
                &index_key,
                value,
                Duration::from_millis(longest_ms.max(0) as u64),
            ),
        )
        .await
    }

    /// Serializes read-modify-write cycles on one scene index.
    fn index_lock(&self, index_key: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.index_locks
            .lock()
            .entry(index_key.to_string())
            .or_default()
            .clone()
    }

    async fn read_index(&self, index_key: &str) -> JwtAuthResult<Vec<IndexEntry>> {
        match self.bounded("get", self.store.get(index_key)).await? {
            Some(raw) => serde_json::from_str(&raw).map_err(|e| {
                StoreError::CorruptedRecord {
                    key: index_key.to_string(),
                    message: e.to_string(),
                }
                .into()
            }),
            None => Ok(Vec::new()),
        }
    }

    /// Run a store call under the configured timeout.
    async fn bounded<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = JwtAuthResult<T>>,
    ) -> JwtAuthResult<T> {
        let result = match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout {
                timeout: self.timeout,
            }
            .into()),
        };

        if let Err(JwtAuthError::Store(error)) = &result {
            self.metrics.record_store_error(operation, error.kind());
            warn!(operation = operation, reason = error.kind(), error = %error, "Revocation store call failed");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::MockClock;
    use crate::telemetry::{InMemoryMetrics, NoOpMetrics};
    use crate::token::{InMemoryRevocationStore, MockRevocationStore};
    use crate::types::{LoginType, SceneSettings, SigningAlgorithm, SigningKeys};
    use secrecy::SecretString;
    use serde_json::json;

    const NOW_MS: i64 = 1_700_000_000_000;

    fn scene(name: &str, login_type: LoginType) -> SceneConfig {
        let settings = SceneSettings {
            secret: Some(SecretString::new("c2VjcmV0".to_string())),
            ..Default::default()
        };
        SceneConfig {
            name: name.to_string(),
            algorithm: SigningAlgorithm::HS256,
            keys: SigningKeys::from_settings(name, SigningAlgorithm::HS256, &settings).unwrap(),
            ttl: 3600,
            login_type,
            subject_claim_key: "uid".to_string(),
            blacklist_enabled: true,
            blacklist_key_prefix: "jwt".to_string(),
            leeway: 0,
            refreshed_token_key: "X-Refreshed-Token".to_string(),
        }
    }

    fn claims(jti: &str, iat_ms: i64, exp: i64) -> ClaimSet {
        ClaimSet::new()
            .with("jti", jti)
            .with("iat", json!(iat_ms as f64 / 1000.0))
            .with("exp", exp)
    }

    fn blacklist<S: RevocationStore>(store: Arc<S>, clock: Arc<MockClock>) -> Blacklist<S> {
        Blacklist::new(store, clock, Duration::from_millis(50), Arc::new(NoOpMetrics))
    }

    #[tokio::test]
    async fn test_logout_record_ttl_covers_remaining_lifetime() {
        let clock = Arc::new(MockClock::at_millis(NOW_MS));
        let store = Arc::new(MockRevocationStore::with_clock(clock.clone()));
        let blacklist = blacklist(store.clone(), clock.clone());
        let admin = scene("admin", LoginType::MultiPoint);

        let token = claims("admin_abc", NOW_MS, NOW_MS / 1000 + 1800);
        assert!(blacklist.add(&admin, &token).await.unwrap());

        let history = store.get_set_history();
        assert_eq!(history[0].0, "jwt:admin:admin_abc");
        assert_eq!(history[0].2, Duration::from_secs(1800));
        assert!(blacklist.is_revoked(&admin, &token).await.unwrap());

        clock.advance_secs(1799);
        assert!(blacklist.is_revoked(&admin, &token).await.unwrap());
    }

    #[tokio::test]
    async fn test_supersession_spares_new_token() {
        let clock = Arc::new(MockClock::at_millis(NOW_MS));
        let store = Arc::new(InMemoryRevocationStore::with_clock(clock.clone()));
        let blacklist = blacklist(store, clock.clone());
        let app = scene("app", LoginType::SinglePoint);

        let first = claims("app_u1", NOW_MS, NOW_MS / 1000 + 3600);
        let second = claims("app_u1", NOW_MS + 1, NOW_MS / 1000 + 3600);

        blacklist.supersede(&app, "app_u1", NOW_MS + 1).await.unwrap();
        assert!(blacklist.is_revoked(&app, &first).await.unwrap());
        assert!(!blacklist.is_revoked(&app, &second).await.unwrap());
    }

    #[tokio::test]
    async fn test_single_point_logout_revokes_current_token() {
        let clock = Arc::new(MockClock::at_millis(NOW_MS));
        let store = Arc::new(InMemoryRevocationStore::with_clock(clock.clone()));
        let blacklist = blacklist(store, clock.clone());
        let app = scene("app", LoginType::SinglePoint);

        let token = claims("app_u1", NOW_MS, NOW_MS / 1000 + 3600);
        clock.advance_secs(10);
        assert!(blacklist.add(&app, &token).await.unwrap());
        assert!(blacklist.is_revoked(&app, &token).await.unwrap());
    }

    #[tokio::test]
    async fn test_disabled_blacklist_writes_nothing() {
        let clock = Arc::new(MockClock::at_millis(NOW_MS));
        let store = Arc::new(MockRevocationStore::with_clock(clock.clone()));
        let blacklist = blacklist(store.clone(), clock);
        let mut admin = scene("admin", LoginType::MultiPoint);
        admin.blacklist_enabled = false;

        let token = claims("admin_abc", NOW_MS, NOW_MS / 1000 + 60);
        assert!(!blacklist.add(&admin, &token).await.unwrap());
        blacklist.supersede(&admin, "admin_abc", NOW_MS).await.unwrap();
        assert!(store.get_set_history().is_empty());
    }

    #[tokio::test]
    async fn test_store_timeout_fails_closed() {
        let clock = Arc::new(MockClock::at_millis(NOW_MS));
        let store = Arc::new(MockRevocationStore::with_clock(clock.clone()));
        store.set_delay(Some(Duration::from_millis(500)));
        let metrics = Arc::new(InMemoryMetrics::new());
        let blacklist = Blacklist::new(store, clock, Duration::from_millis(10), metrics.clone());

        let admin = scene("admin", LoginType::MultiPoint);
        let error = blacklist
            .is_revoked(&admin, &claims("admin_abc", NOW_MS, NOW_MS / 1000 + 60))
            .await
            .unwrap_err();

        assert!(matches!(
            error,
            JwtAuthError::Store(StoreError::Timeout { .. })
        ));
        assert_eq!(
            metrics.count_with_label("jwt_store_errors_total", "reason", "timeout"),
            1
        );
    }

    #[tokio::test]
    async fn test_corrupted_record() {
        let clock = Arc::new(MockClock::at_millis(NOW_MS));
        let store = Arc::new(MockRevocationStore::with_clock(clock.clone()));
        store.add_record("jwt:admin:admin_abc", "not json", Duration::from_secs(60));
        let blacklist = blacklist(store, clock);

        let result = blacklist
            .is_revoked(
                &scene("admin", LoginType::MultiPoint),
                &claims("admin_abc", NOW_MS, NOW_MS / 1000 + 60),
            )
            .await;
        assert!(matches!(
            result,
            Err(JwtAuthError::Store(StoreError::CorruptedRecord { .. }))
        ));
    }

    #[tokio::test]
    async fn test_clear_through_index() {
        let clock = Arc::new(MockClock::at_millis(NOW_MS));
        let store = Arc::new(MockRevocationStore::with_clock(clock.clone()));
        let blacklist = blacklist(store.clone(), clock.clone());
        let admin = scene("admin", LoginType::MultiPoint);
        let other = scene("other", LoginType::MultiPoint);

        let exp = NOW_MS / 1000 + 600;
        blacklist.add(&admin, &claims("admin_a", NOW_MS, exp)).await.unwrap();
        blacklist.add(&admin, &claims("admin_b", NOW_MS, exp)).await.unwrap();
        blacklist.add(&other, &claims("other_a", NOW_MS, exp)).await.unwrap();

        assert_eq!(blacklist.clear(&admin).await.unwrap(), 2);
        assert_eq!(
            store.keys(),
            vec!["jwt:other:__index".to_string(), "jwt:other:other_a".to_string()]
        );
    }

    #[tokio::test]
    async fn test_clear_by_prefix() {
        let clock = Arc::new(MockClock::at_millis(NOW_MS));
        let store = Arc::new(InMemoryRevocationStore::with_clock(clock.clone()));
        let blacklist = blacklist(store.clone(), clock);
        let admin = scene("admin", LoginType::MultiPoint);

        let token = claims("admin_a", NOW_MS, NOW_MS / 1000 + 600);
        blacklist.add(&admin, &token).await.unwrap();
        assert_eq!(blacklist.clear(&admin).await.unwrap(), 1);
        assert!(!blacklist.is_revoked(&admin, &token).await.unwrap());
    }

    #[tokio::test]
    async fn test_remove_single_record() {
        let clock = Arc::new(MockClock::at_millis(NOW_MS));
        let store = Arc::new(InMemoryRevocationStore::with_clock(clock.clone()));
        let blacklist = blacklist(store, clock);
        let admin = scene("admin", LoginType::MultiPoint);

        let token = claims("admin_a", NOW_MS, NOW_MS / 1000 + 600);
        blacklist.add(&admin, &token).await.unwrap();
        assert!(blacklist.remove(&admin, "admin_a").await.unwrap());
        assert!(!blacklist.is_revoked(&admin, &token).await.unwrap());
    }

    #[test]
    fn test_record_rules() {
        let record = RevocationRecord { valid_until: 100 };
        assert!(record.blacks_out(100));
        assert!(!record.blacks_out(99));
        assert!(record.supersedes(100));
        assert!(!record.supersedes(101));
    }
}
