//! Metrics
//!
//! Token engine metrics collection interfaces and implementations.

use parking_lot::Mutex;
use std::collections::HashMap;

/// Metric labels.
pub type MetricLabels = HashMap<String, String>;

/// Token engine metrics interface.
pub trait JwtMetrics: Send + Sync {
    /// Record token issuance.
    fn record_token_issued(&self, scene: &str, login_type: &str);

    /// Record a validation outcome; `reason` is `ok` on success.
    fn record_validation(&self, scene: &str, reason: &str);

    /// Record a revocation record write.
    fn record_revocation(&self, scene: &str, kind: &str, success: bool);

    /// Record a refresh, explicit or automatic.
    fn record_refresh(&self, scene: &str, automatic: bool, success: bool);

    /// Record a revocation store failure.
    fn record_store_error(&self, operation: &str, reason: &str);
}

/// No-op metrics implementation.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpMetrics;

impl JwtMetrics for NoOpMetrics {
    fn record_token_issued(&self, _scene: &str, _login_type: &str) {}
    fn record_validation(&self, _scene: &str, _reason: &str) {}
    fn record_revocation(&self, _scene: &str, _kind: &str, _success: bool) {}
    fn record_refresh(&self, _scene: &str, _automatic: bool, _success: bool) {}
    fn record_store_error(&self, _operation: &str, _reason: &str) {}
}

/// No-op metrics singleton.
pub fn no_op_metrics() -> NoOpMetrics {
    NoOpMetrics
}

/// Metric entry for in-memory storage.
#[derive(Debug, Clone)]
pub struct MetricEntry {
    pub name: String,
    pub value: f64,
    pub labels: MetricLabels,
}

/// In-memory metrics for testing.
#[derive(Default)]
pub struct InMemoryMetrics {
    entries: Mutex<Vec<MetricEntry>>,
}

impl InMemoryMetrics {
    /// Create new in-memory metrics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all recorded entries.
    pub fn get_entries(&self) -> Vec<MetricEntry> {
        self.entries.lock().clone()
    }

    /// Get entries by name.
    pub fn get_entries_by_name(&self, name: &str) -> Vec<MetricEntry> {
        self.entries
            .lock()
            .iter()
            .filter(|e| e.name == name)
            .cloned()
            .collect()
    }

    /// Count entries by name whose label matches.
    pub fn count_with_label(&self, name: &str, label: &str, value: &str) -> usize {
        self.entries
            .lock()
            .iter()
            .filter(|e| e.name == name && e.labels.get(label).map(String::as_str) == Some(value))
            .count()
    }

    /// Clear all entries.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    fn record(&self, name: &str, labels: &[(&str, &str)]) {
        let labels = labels
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        self.entries.lock().push(MetricEntry {
            name: name.to_string(),
            value: 1.0,
            labels,
        });
    }
}

impl JwtMetrics for InMemoryMetrics {
    fn record_token_issued(&self, scene: &str, login_type: &str) {
        self.record(
            "jwt_tokens_issued_total",
            &[("scene", scene), ("login_type", login_type)],
        );
    }

    fn record_validation(&self, scene: &str, reason: &str) {
        self.record(
            "jwt_validations_total",
            &[("scene", scene), ("reason", reason)],
        );
    }

    fn record_revocation(&self, scene: &str, kind: &str, success: bool) {
        let success = success.to_string();
        self.record(
            "jwt_revocations_total",
            &[("scene", scene), ("kind", kind), ("success", &success)],
        );
    }

    fn record_refresh(&self, scene: &str, automatic: bool, success: bool) {
        let mode = if automatic { "automatic" } else { "explicit" };
        let success = success.to_string();
        self.record(
            "jwt_refreshes_total",
            &[("scene", scene), ("mode", mode), ("success", &success)],
        );
    }

    fn record_store_error(&self, operation: &str, reason: &str) {
        self.record(
            "jwt_store_errors_total",
            &[("operation", operation), ("reason", reason)],
        );
    }
}

/// Create in-memory metrics for testing.
pub fn create_in_memory_metrics() -> InMemoryMetrics {
    InMemoryMetrics::new()
}
