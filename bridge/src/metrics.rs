// Windowed relay counters.
// Invariants: counters only count events since the last `log_and_reset`.

use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;
use tracing::info;

use crate::utils::lock;

const MIN_ELAPSED_SECS: f64 = 0.001;

#[derive(Debug)]
struct MetricsWindow {
    received: u64,
    published: u64,
    errors: u64,
    started_at: Instant,
}

impl MetricsWindow {
    fn new(started_at: Instant) -> Self {
        Self {
            received: 0,
            published: 0,
            errors: 0,
            started_at,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MetricsReport {
    pub received: u64,
    pub published: u64,
    pub errors: u64,
    pub elapsed: Duration,
    pub received_per_sec: f64,
}

#[derive(Debug)]
pub struct MetricsAggregator {
    window: Mutex<MetricsWindow>,
}

impl Default for MetricsAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsAggregator {
    pub fn new() -> Self {
        Self {
            window: Mutex::new(MetricsWindow::new(Instant::now())),
        }
    }

    pub fn record_received(&self) {
        let mut window = lock(&self.window);
        window.received = window.received.saturating_add(1);
    }

    pub fn record_published(&self) {
        let mut window = lock(&self.window);
        window.published = window.published.saturating_add(1);
    }

    pub fn record_error(&self) {
        let mut window = lock(&self.window);
        window.errors = window.errors.saturating_add(1);
    }

    pub fn received(&self) -> u64 {
        lock(&self.window).received
    }

    pub fn published(&self) -> u64 {
        lock(&self.window).published
    }

    pub fn errors(&self) -> u64 {
        lock(&self.window).errors
    }

    /// Closes the current window, logs it, and starts a new one.
    pub fn log_and_reset(&self) -> MetricsReport {
        let now = Instant::now();
        let closed = {
            let mut window = lock(&self.window);
            std::mem::replace(&mut *window, MetricsWindow::new(now))
        };

        let elapsed = now.saturating_duration_since(closed.started_at);
        let received_per_sec = closed.received as f64 / elapsed.as_secs_f64().max(MIN_ELAPSED_SECS);
        let report = MetricsReport {
            received: closed.received,
            published: closed.published,
            errors: closed.errors,
            elapsed,
            received_per_sec,
        };

        info!(
            udp = report.received,
            published = report.published,
            errors = report.errors,
            window_ms = elapsed.as_millis() as u64,
            "udp={} pub={} err={} rate={:.1}/s",
            report.received,
            report.published,
            report.errors,
            report.received_per_sec
        );
        report
    }
}
