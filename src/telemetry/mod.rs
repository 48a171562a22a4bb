//! Telemetry
//!
//! Observability components for the token engine.
//!
//! - **Logging**: `tracing` subscriber setup and structured rejection events
//! - **Metrics**: counters for issuance, validation, revocation and refresh

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, log_rejection, LogFormat, LogLevel, LoggingConfig};
pub use metrics::{
    create_in_memory_metrics, no_op_metrics, InMemoryMetrics, JwtMetrics, MetricEntry,
    MetricLabels, NoOpMetrics,
};
