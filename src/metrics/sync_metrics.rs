//! Sync engine metrics using OpenTelemetry.

use opentelemetry::KeyValue;
use opentelemetry::metrics::{Counter, Histogram, Meter};
use std::time::Instant;

/// Metrics collector for the sync engine.
///
/// # Examples
///
/// ```rust,no_run
/// use apollo_client::metrics::SyncMetrics;
/// use opentelemetry::global;
///
/// let metrics = SyncMetrics::new(global::meter("apollo-client"));
///
/// let timer = metrics.start_long_poll();
/// // ... long-poll ...
/// metrics.record_long_poll(timer);
/// ```
#[derive(Clone)]
pub struct SyncMetrics {
    sync_cycles: Counter<u64>,
    sync_failures: Counter<u64>,
    backup_fallbacks: Counter<u64>,
    namespaces_applied: Counter<u64>,
    long_poll_duration: Histogram<f64>,
}

impl SyncMetrics {
    /// Create a new metrics collector with the provided meter.
    pub fn new(meter: Meter) -> Self {
        let sync_cycles = meter
            .u64_counter("apollo_client.sync.cycles")
            .with_description("Total number of sync cycles")
            .build();

        let sync_failures = meter
            .u64_counter("apollo_client.sync.failures")
            .with_description("Number of failed notification or config requests")
            .build();

        let backup_fallbacks = meter
            .u64_counter("apollo_client.backup.fallbacks")
            .with_description("Number of namespaces served from backup files")
            .build();

        let namespaces_applied = meter
            .u64_counter("apollo_client.namespace.applied")
            .with_description("Number of snapshots applied to namespace stores")
            .build();

        let long_poll_duration = meter
            .f64_histogram("apollo_client.long_poll.duration")
            .with_description("Duration of long-poll requests in seconds")
            .with_unit("s")
            .build();

        Self {
            sync_cycles,
            sync_failures,
            backup_fallbacks,
            namespaces_applied,
            long_poll_duration,
        }
    }

    /// Count a sync cycle and start timing its long-poll.
    pub fn start_long_poll(&self) -> Instant {
        self.sync_cycles.add(1, &[]);
        Instant::now()
    }

    /// Record the duration of a long-poll started with [`start_long_poll`](Self::start_long_poll).
    pub fn record_long_poll(&self, start: Instant) {
        self.long_poll_duration
            .record(start.elapsed().as_secs_f64(), &[]);
    }

    /// Record a failed request.
    pub fn record_failure(&self, stage: &'static str) {
        self.sync_failures.add(1, &[KeyValue::new("stage", stage)]);
    }

    /// Record a namespace loaded from its backup file.
    pub fn record_backup_fallback(&self, namespace: &str) {
        self.backup_fallbacks
            .add(1, &[KeyValue::new("namespace", namespace.to_string())]);
    }

    /// Record a snapshot applied to a namespace.
    pub fn record_applied(&self, namespace: &str) {
        self.namespaces_applied
            .add(1, &[KeyValue::new("namespace", namespace.to_string())]);
    }
}
