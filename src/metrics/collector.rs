use crate::metrics::snapshot::MetricsSnapshot;
use crate::model::Source;
use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};
use std::time::{Duration, Instant};

#[derive(Clone)]
pub struct MetricsCollector {
    urls_queued: Arc<AtomicU64>,
    urls_done: Arc<AtomicU64>,
    urls_failed: Arc<AtomicU64>,
    field_rows: Arc<AtomicU64>,
    lab_rows: Arc<AtomicU64>,
    rows_written: Arc<AtomicU64>,
    writes_abandoned: Arc<AtomicU64>,
    requests_total: Arc<AtomicU64>,
    requests_failed: Arc<AtomicU64>,
    token_refreshes: Arc<AtomicU64>,
    active_workers: Arc<AtomicU64>,
    total_response_time_ms: Arc<AtomicU64>,
    start_time: Arc<Instant>,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self {
            urls_queued: Arc::new(AtomicU64::new(0)),
            urls_done: Arc::new(AtomicU64::new(0)),
            urls_failed: Arc::new(AtomicU64::new(0)),
            field_rows: Arc::new(AtomicU64::new(0)),
            lab_rows: Arc::new(AtomicU64::new(0)),
            rows_written: Arc::new(AtomicU64::new(0)),
            writes_abandoned: Arc::new(AtomicU64::new(0)),
            requests_total: Arc::new(AtomicU64::new(0)),
            requests_failed: Arc::new(AtomicU64::new(0)),
            token_refreshes: Arc::new(AtomicU64::new(0)),
            active_workers: Arc::new(AtomicU64::new(0)),
            total_response_time_ms: Arc::new(AtomicU64::new(0)),
            start_time: Arc::new(Instant::now()),
        }
    }
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_urls_queued(&self, n: u64) {
        self.urls_queued.fetch_add(n, Ordering::SeqCst);
    }

    /// Records a finished URL; `None` means the task itself crashed.
    pub fn record_outcome(&self, source: Option<Source>) {
        self.urls_done.fetch_add(1, Ordering::SeqCst);
        match source {
            Some(Source::Field) => {
                self.field_rows.fetch_add(1, Ordering::SeqCst);
            }
            Some(Source::Lab) => {
                self.lab_rows.fetch_add(1, Ordering::SeqCst);
            }
            Some(Source::WebDev) => {}
            Some(Source::Error) | None => {
                self.urls_failed.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    pub fn increment_rows_written(&self) {
        self.rows_written.fetch_add(1, Ordering::SeqCst);
    }

    pub fn increment_writes_abandoned(&self) {
        self.writes_abandoned.fetch_add(1, Ordering::SeqCst);
    }

    pub fn increment_token_refreshes(&self) {
        self.token_refreshes.fetch_add(1, Ordering::SeqCst);
    }

    /// Counts a worker as active until the returned guard drops, panics included.
    pub fn track_active_worker(&self) -> ActiveWorker {
        self.active_workers.fetch_add(1, Ordering::SeqCst);
        ActiveWorker {
            active_workers: self.active_workers.clone(),
        }
    }

    pub fn record_request(&self, duration: Duration, failed: bool) {
        self.requests_total.fetch_add(1, Ordering::SeqCst);
        if failed {
            self.requests_failed.fetch_add(1, Ordering::SeqCst);
        }
        self.total_response_time_ms
            .fetch_add(duration.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let total_requests = self.requests_total.load(Ordering::SeqCst);
        let total_time = self.total_response_time_ms.load(Ordering::SeqCst);
        let done = self.urls_done.load(Ordering::SeqCst);

        let avg_response_time_ms = if total_requests > 0 {
            total_time / total_requests
        } else {
            0
        };

        let elapsed = self.start_time.elapsed().as_secs_f64();

        MetricsSnapshot {
            urls_queued: self.urls_queued.load(Ordering::SeqCst),
            urls_done: done,
            urls_failed: self.urls_failed.load(Ordering::SeqCst),
            field_rows: self.field_rows.load(Ordering::SeqCst),
            lab_rows: self.lab_rows.load(Ordering::SeqCst),
            rows_written: self.rows_written.load(Ordering::SeqCst),
            writes_abandoned: self.writes_abandoned.load(Ordering::SeqCst),
            requests_total: total_requests,
            requests_failed: self.requests_failed.load(Ordering::SeqCst),
            token_refreshes: self.token_refreshes.load(Ordering::SeqCst),
            active_workers: self.active_workers.load(Ordering::SeqCst),
            avg_response_time_ms,
            urls_per_minute: if elapsed > 0.0 {
                done as f64 * 60.0 / elapsed
            } else {
                0.0
            },
            elapsed_seconds: elapsed,
        }
    }
}

pub struct ActiveWorker {
    active_workers: Arc<AtomicU64>,
}

impl Drop for ActiveWorker {
    fn drop(&mut self) {
        self.active_workers.fetch_sub(1, Ordering::SeqCst);
    }
}
