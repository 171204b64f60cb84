use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub urls_queued: u64,
    pub urls_done: u64,
    pub urls_failed: u64,
    pub field_rows: u64,
    pub lab_rows: u64,
    pub rows_written: u64,
    pub writes_abandoned: u64,
    pub requests_total: u64,
    pub requests_failed: u64,
    pub token_refreshes: u64,
    pub active_workers: u64,
    pub avg_response_time_ms: u64,
    pub urls_per_minute: f64,
    pub elapsed_seconds: f64,
}
