//! Metrics interface onto the host monitoring subsystem.

/// Records plugin metrics. Implementations must be cheap and non-blocking.
pub trait MetricsRecorder: Send + Sync + std::fmt::Debug + 'static {
    /// Record a gauge/histogram sample.
    fn record_metric(&self, name: &str, value: f64);

    /// Increment a counter by `by`.
    fn increment_counter(&self, name: &str, by: u64);
}
