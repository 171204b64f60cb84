use crate::metrics::collector::MetricsCollector;
use crate::metrics::snapshot::MetricsSnapshot;
use crate::model::{RunCounters, ScanOutcome, Source, Strategy, StrategyResult, UrlTask};
use crate::pagespeed::Analyzer;
use crate::sheet::RowWriter;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;

pub const DEFAULT_PROGRESS_EVERY: u64 = 25;

/// Fans URLs out over a bounded set of tokio tasks, one task per URL.
///
/// Tasks are submitted in input order and complete in whatever order the
/// network allows. Rows are addressed by URL index, so completion order never
/// matters for the destination.
pub struct ScanEngine {
    analyzer: Arc<dyn Analyzer>,
    writer: Arc<dyn RowWriter>,
    concurrency: usize,
    progress_every: u64,
    metrics: Arc<MetricsCollector>,
}

impl ScanEngine {
    pub fn new(
        analyzer: Arc<dyn Analyzer>,
        writer: Arc<dyn RowWriter>,
        concurrency: usize,
        metrics: Option<Arc<MetricsCollector>>,
    ) -> Self {
        Self {
            analyzer,
            writer,
            concurrency: concurrency.max(1),
            progress_every: DEFAULT_PROGRESS_EVERY,
            metrics: metrics.unwrap_or_else(|| Arc::new(MetricsCollector::new())),
        }
    }

    pub fn with_progress_every(mut self, every: u64) -> Self {
        self.progress_every = every.max(1);
        self
    }

    /// Scans every non-blank URL at `index >= start_index` and writes its row.
    pub async fn run(&self, urls: &[String], start_index: usize) -> RunCounters {
        let total = urls.len();
        let work: Vec<UrlTask> = urls
            .iter()
            .enumerate()
            .filter(|(index, url)| *index >= start_index && !url.trim().is_empty())
            .map(|(index, url)| UrlTask {
                index,
                url: url.trim().to_string(),
            })
            .collect();
        let queued = work.len();
        self.metrics.add_urls_queued(queued as u64);

        log::info!(
            "Found {} URLs, starting from index {}, workers={}",
            total,
            start_index,
            self.concurrency
        );

        let mut completions = stream::iter(work.into_iter().map(|task| {
            let analyzer = self.analyzer.clone();
            let writer = self.writer.clone();
            let metrics = self.metrics.clone();
            let handle = tokio::spawn(scan_url(analyzer, writer, metrics, task.clone(), total));
            async move { (task, handle.await) }
        }))
        .buffer_unordered(self.concurrency);

        let mut counters = RunCounters::default();
        while let Some((task, joined)) = completions.next().await {
            counters.done += 1;
            match joined {
                Ok(outcome) => {
                    self.metrics.record_outcome(Some(outcome.overall_source));
                    if outcome.overall_source == Source::Error {
                        counters.errors += 1;
                    }
                }
                Err(e) => {
                    counters.errors += 1;
                    self.metrics.record_outcome(None);
                    log::error!("[{}/{}] {} → EXCEPTION: {}", task.index + 1, total, task.url, e);
                }
            }

            if counters.done % self.progress_every == 0 {
                log::info!(
                    "--- Progress: {}/{} done, {} errors ---",
                    counters.done,
                    queued,
                    counters.errors
                );
            }
        }

        log::info!(
            "=== COMPLETE: {} URLs processed, {} errors ===",
            counters.done,
            counters.errors
        );
        counters
    }

    pub fn get_metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn watch_metrics(&self) -> watch::Receiver<MetricsSnapshot> {
        let (tx, rx) = watch::channel(self.metrics.snapshot());
        let metrics = self.metrics.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_millis(500));
            loop {
                interval.tick().await;
                if tx.send(metrics.snapshot()).is_err() {
                    break;
                }
            }
        });
        rx
    }
}

async fn measure_timed(
    analyzer: &dyn Analyzer,
    metrics: &MetricsCollector,
    url: &str,
    strategy: Strategy,
) -> StrategyResult {
    let start = Instant::now();
    let result = analyzer.measure(url, strategy).await;
    metrics.record_request(start.elapsed(), result.source == Source::Error);
    result
}

/// Full pipeline for one URL: both strategies, merge, one row write.
async fn scan_url(
    analyzer: Arc<dyn Analyzer>,
    writer: Arc<dyn RowWriter>,
    metrics: Arc<MetricsCollector>,
    task: UrlTask,
    total: usize,
) -> ScanOutcome {
    let _active = metrics.track_active_worker();

    let (mobile, desktop) = tokio::join!(
        measure_timed(analyzer.as_ref(), &metrics, &task.url, Strategy::Mobile),
        measure_timed(analyzer.as_ref(), &metrics, &task.url, Strategy::Desktop),
    );
    let outcome = ScanOutcome::new(task.index, mobile, desktop);

    let row = task.row();
    match writer.write_row(row, &outcome.row_values()).await {
        Ok(()) => metrics.increment_rows_written(),
        Err(e) => {
            metrics.increment_writes_abandoned();
            log::error!("Sheet write error row {}: {}", row, e);
        }
    }

    log::info!(
        "[{}/{}] {} → M:{}s D:{}s [{}]",
        task.index + 1,
        total,
        task.url,
        outcome.mobile.lcp_label(),
        outcome.desktop.lcp_label(),
        outcome.overall_source
    );

    outcome
}
