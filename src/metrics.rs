use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

const LATENCY_WINDOW: usize = 1000;

/// Sliding window of recent latency samples, in nanoseconds
#[derive(Debug, Clone)]
pub struct LatencyWindow {
    samples: Arc<Mutex<VecDeque<u64>>>,
    capacity: usize,
}

impl LatencyWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }

    pub fn record(&self, nanos: u64) {
        let mut samples = self.samples.lock();
        if samples.len() >= self.capacity {
            samples.pop_front();
        }
        samples.push_back(nanos);
    }

    /// Percentile `p` (0.0..=1.0) of the window, in microseconds
    pub fn percentile_us(&self, p: f64) -> f64 {
        let mut sorted: Vec<u64> = self.samples.lock().iter().copied().collect();
        if sorted.is_empty() {
            return 0.0;
        }
        sorted.sort_unstable();
        let idx = ((sorted.len() as f64 * p).ceil() as usize)
            .saturating_sub(1)
            .min(sorted.len() - 1);
        sorted[idx] as f64 / 1000.0
    }

    pub fn count(&self) -> usize {
        self.samples.lock().len()
    }
}

/// Per-stage counters shared between a stage and the pipelines that own it
#[derive(Debug, Clone)]
pub struct StageMetrics {
    received: Arc<AtomicU64>,
    emitted: Arc<AtomicU64>,
    suppressed: Arc<AtomicU64>,
    latency: LatencyWindow,
    start_time: Instant,
}

impl StageMetrics {
    pub fn new() -> Self {
        Self {
            received: Arc::new(AtomicU64::new(0)),
            emitted: Arc::new(AtomicU64::new(0)),
            suppressed: Arc::new(AtomicU64::new(0)),
            latency: LatencyWindow::new(LATENCY_WINDOW),
            start_time: Instant::now(),
        }
    }

    pub fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_emitted(&self) {
        self.emitted.fetch_add(1, Ordering::Relaxed);
    }

    /// The stage halted an element instead of forwarding it
    pub fn record_suppressed(&self) {
        self.suppressed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_latency(&self, nanos: u64) {
        self.latency.record(nanos);
    }

    pub fn total_received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    pub fn total_emitted(&self) -> u64 {
        self.emitted.load(Ordering::Relaxed)
    }

    pub fn total_suppressed(&self) -> u64 {
        self.suppressed.load(Ordering::Relaxed)
    }

    /// Received elements per second since the stage was created
    pub fn throughput_eps(&self) -> f64 {
        let secs = self.start_time.elapsed().as_secs_f64();
        if secs == 0.0 {
            0.0
        } else {
            self.total_received() as f64 / secs
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            received: self.total_received(),
            emitted: self.total_emitted(),
            suppressed: self.total_suppressed(),
            throughput_eps: self.throughput_eps(),
            latency_p50_us: self.latency.percentile_us(0.50),
            latency_p95_us: self.latency.percentile_us(0.95),
            latency_p99_us: self.latency.percentile_us(0.99),
            elapsed: self.start_time.elapsed(),
        }
    }
}

impl Default for StageMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// A snapshot of stage metrics at a point in time
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub received: u64,
    pub emitted: u64,
    pub suppressed: u64,
    pub throughput_eps: f64,
    pub latency_p50_us: f64,
    pub latency_p95_us: f64,
    pub latency_p99_us: f64,
    pub elapsed: Duration,
}

impl MetricsSnapshot {
    /// Format metrics as a human-readable string
    pub fn format(&self) -> String {
        format!(
            "Received: {}, Emitted: {}, Suppressed: {}, Throughput: {:.2} elem/s, \
             Latency P50: {:.2}µs, P95: {:.2}µs, P99: {:.2}µs, Elapsed: {:.2}s",
            self.received,
            self.emitted,
            self.suppressed,
            self.throughput_eps,
            self.latency_p50_us,
            self.latency_p95_us,
            self.latency_p99_us,
            self.elapsed.as_secs_f64()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latency_window_percentiles() {
        let window = LatencyWindow::new(10);
        for i in 1..=10 {
            window.record(i * 1000);
        }
        assert_eq!(window.percentile_us(0.50), 5.0);
        assert_eq!(window.percentile_us(0.99), 10.0);
    }

    #[test]
    fn test_latency_window_slides() {
        let window = LatencyWindow::new(3);
        for i in 0..5 {
            window.record(i);
        }
        assert_eq!(window.count(), 3);
    }

    #[test]
    fn test_stage_metrics_counters() {
        let metrics = StageMetrics::new();
        let shared = metrics.clone();
        for _ in 0..10 {
            metrics.record_received();
        }
        for _ in 0..7 {
            metrics.record_emitted();
        }
        for _ in 0..3 {
            metrics.record_suppressed();
        }

        let snapshot = shared.snapshot();
        assert_eq!(snapshot.received, 10);
        assert_eq!(snapshot.emitted, 7);
        assert_eq!(snapshot.suppressed, 3);
        assert!(snapshot.format().contains("Suppressed: 3"));
    }
}
