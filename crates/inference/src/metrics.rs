use opentelemetry::{
    KeyValue, global,
    metrics::{Counter, Histogram},
};
use std::time::Duration;

/// Driver instruments on the global meter. No-ops until a meter provider is installed.
#[derive(Clone)]
pub struct DriverMetrics {
    runs: Counter<u64>,
    failed: Counter<u64>,
    rejected: Counter<u64>,
    duration: Histogram<f64>,
}

impl DriverMetrics {
    pub fn new(meter_name: &'static str) -> Self {
        let meter = global::meter(meter_name);
        let latency_buckets = [
            0.001, 0.002, 0.005, 0.01, 0.015, 0.02, 0.03, 0.05, 0.075, 0.1, 0.15, 0.2, 0.3, 0.5,
            1.0, 2.0,
        ];
        Self {
            runs: meter
                .u64_counter("inference_runs_total")
                .with_description("Runs admitted and completed")
                .build(),
            failed: meter
                .u64_counter("inference_runs_failed_total")
                .with_description("Runs that completed with a backend error")
                .build(),
            rejected: meter
                .u64_counter("inference_admission_rejected_total")
                .with_description("Submissions rejected because a run was in flight")
                .build(),
            duration: meter
                .f64_histogram("inference_run_duration_seconds")
                .with_description("Time from admission to completion")
                .with_unit("s")
                .with_boundaries(latency_buckets.to_vec())
                .build(),
        }
    }

    pub fn record_completion(&self, elapsed: Duration, ok: bool) {
        let attrs = [KeyValue::new("status", if ok { "ok" } else { "error" })];
        self.runs.add(1, &attrs);
        if !ok {
            self.failed.add(1, &[]);
        }
        self.duration.record(elapsed.as_secs_f64(), &attrs);
    }

    pub fn record_rejection(&self) {
        self.rejected.add(1, &[]);
    }
}
