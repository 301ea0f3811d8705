//! # Fabric Telemetry
//!
//! Logging and metrics for the Fabric client.
//!
//! ## Components
//!
//! - **Logs**: `tracing` subscriber, pretty or JSON
//! - **Metrics**: Prometheus counters for proposals, retries and orderer streams
//!
//! ## Usage
//!
//! ```rust,ignore
//! use fabric_telemetry::{init_telemetry, TelemetryConfig};
//!
//! let _guard = init_telemetry(TelemetryConfig::from_env())?;
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `FABRIC_SERVICE_NAME` | `fabric-client` | Service name in log records |
//! | `FABRIC_LOG_LEVEL` | `info` | Log level filter |
//! | `FABRIC_JSON_LOGS` | `false` | Emit JSON log lines |
//! | `FABRIC_CONSOLE_OUTPUT` | `true` | Write logs to stdout |

#![warn(missing_docs)]

mod config;
mod logging;
pub mod metrics;

pub use config::TelemetryConfig;
pub use logging::{init_logging, LoggingGuard};
pub use metrics::{
    gather_metrics, register_metrics, MetricsHandle, BROADCASTS, DELIVERIES,
    ENDORSEMENTS_COLLECTED, PROPOSALS_SENT, RETRY_ATTEMPTS,
};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    /// The global subscriber could not be installed
    #[error("Failed to initialize logging: {0}")]
    LoggingInit(String),

    /// A metric could not be registered or encoded
    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),

    /// The configuration could not be turned into a filter
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Initialize logging and register metrics.
///
/// Returns a guard to hold for the lifetime of the application.
pub fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    let metrics = register_metrics()?;
    let logging = init_logging(&config)?;

    Ok(TelemetryGuard {
        _logging: logging,
        metrics,
    })
}

/// Guard that keeps telemetry active.
pub struct TelemetryGuard {
    _logging: LoggingGuard,
    metrics: MetricsHandle,
}

impl TelemetryGuard {
    /// Metrics registry handle.
    pub fn metrics(&self) -> &MetricsHandle {
        &self.metrics
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!("Shutting down telemetry...");
    }
}

/// Convenience macro for recording a metric increment.
#[macro_export]
macro_rules! metric_inc {
    ($metric:expr) => {
        $metric.inc()
    };
    ($metric:expr, $labels:expr) => {
        $metric.with_label_values($labels).inc()
    };
}
