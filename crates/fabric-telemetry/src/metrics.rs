//! Prometheus metrics for the client.
//!
//! All metrics follow the naming convention: `fabric_<area>_<metric>_total`.
//! Counters are usable before [`register_metrics`] runs; registration only
//! makes them visible to [`gather_metrics`].

use lazy_static::lazy_static;
use prometheus::{Counter, CounterVec, Encoder, Opts, Registry, TextEncoder};
use std::sync::Arc;

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // ENDORSEMENT METRICS
    // =========================================================================

    /// Proposals sent to endorsers, by outcome (success/error)
    pub static ref PROPOSALS_SENT: CounterVec = CounterVec::new(
        Opts::new("fabric_proposals_sent_total", "Total proposals sent to endorsing peers"),
        &["outcome"]
    ).expect("metric creation failed");

    /// Distinct endorsements that passed the agreement rule
    pub static ref ENDORSEMENTS_COLLECTED: Counter = Counter::new(
        "fabric_endorsements_collected_total",
        "Total distinct endorsements collected into transactions"
    ).expect("metric creation failed");

    // =========================================================================
    // RETRY METRICS
    // =========================================================================

    /// Retries performed, by status group of the error that triggered them
    pub static ref RETRY_ATTEMPTS: CounterVec = CounterVec::new(
        Opts::new("fabric_retry_attempts_total", "Total retries after a retryable error"),
        &["group"]
    ).expect("metric creation failed");

    // =========================================================================
    // ORDERER METRICS
    // =========================================================================

    /// Broadcast exchanges, by outcome (success/error)
    pub static ref BROADCASTS: CounterVec = CounterVec::new(
        Opts::new("fabric_broadcasts_total", "Total envelopes broadcast to the orderer"),
        &["outcome"]
    ).expect("metric creation failed");

    /// Deliver exchanges, by outcome (success/error)
    pub static ref DELIVERIES: CounterVec = CounterVec::new(
        Opts::new("fabric_deliveries_total", "Total block requests served by the orderer"),
        &["outcome"]
    ).expect("metric creation failed");
}

/// Handle to the registry once all metrics are registered.
#[derive(Clone)]
pub struct MetricsHandle {
    registry: Arc<Registry>,
}

impl MetricsHandle {
    /// Gather all registered metric families.
    pub fn gather(&self) -> Vec<prometheus::proto::MetricFamily> {
        self.registry.gather()
    }
}

/// Register every client metric with [`REGISTRY`].
pub fn register_metrics() -> Result<MetricsHandle, TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(PROPOSALS_SENT.clone()),
        Box::new(ENDORSEMENTS_COLLECTED.clone()),
        Box::new(RETRY_ATTEMPTS.clone()),
        Box::new(BROADCASTS.clone()),
        Box::new(DELIVERIES.clone()),
    ];

    for metric in metrics {
        REGISTRY
            .register(metric)
            .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    }

    Ok(MetricsHandle {
        registry: Arc::new(REGISTRY.clone()),
    })
}

/// Encode all registered metrics as Prometheus text format.
pub fn gather_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

/// Label value for an outcome counter.
pub fn outcome<T, E>(result: &Result<T, E>) -> &'static str {
    if result.is_ok() {
        "success"
    } else {
        "error"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_gather() {
        // May fail if another test registered first, which is fine
        let _ = register_metrics();
        PROPOSALS_SENT.with_label_values(&["success"]).inc();

        let text = gather_metrics().unwrap();
        assert!(text.contains("fabric_proposals_sent_total"));
    }

    #[test]
    fn test_counter_increment() {
        ENDORSEMENTS_COLLECTED.inc();
        assert!(ENDORSEMENTS_COLLECTED.get() >= 1.0);
    }

    #[test]
    fn test_outcome_label() {
        let ok: Result<(), ()> = Ok(());
        let err: Result<(), ()> = Err(());
        assert_eq!(outcome(&ok), "success");
        assert_eq!(outcome(&err), "error");
    }
}
