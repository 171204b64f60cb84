//! Slow retry pass for rows the API scan could not fill.
//!
//! Each failed row is re-measured by rendering the public PageSpeed dashboard
//! in a headless browser and reading the numbers out of the page text. The
//! browser session is shared, so URLs are processed strictly one at a time.

use crate::error::Result;
use crate::model::{ERROR_CELL, MetricRecord, Source, Strategy, format_metric, row_for_index};
use crate::pagespeed::normalize_url;
use crate::sheet::RowWriter;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

pub mod browser;
pub mod parse;

pub use browser::AgentBrowser;
pub use parse::{parse_page_text, parse_value};

/// A rendering capability: navigate, then read the visible page text.
#[async_trait]
pub trait RenderedTextFetcher: Send + Sync {
    async fn open(&self, url: &str) -> Result<()>;
    async fn text(&self) -> Result<String>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorRow {
    pub row: usize,
    pub url: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetrySummary {
    pub fixed: u64,
    pub still_broken: u64,
    pub write_failures: u64,
}

/// Rows (A..N from row 2) whose URL is set but whose column B is `ERROR` or blank.
pub fn find_error_rows(rows: &[Vec<String>]) -> Vec<ErrorRow> {
    rows.iter()
        .enumerate()
        .filter_map(|(index, cells)| {
            let url = cells.first().map(|c| c.trim()).unwrap_or_default();
            if url.is_empty() {
                return None;
            }
            let mobile_lcp = cells.get(1).map(|c| c.trim()).unwrap_or_default();
            (mobile_lcp == ERROR_CELL || mobile_lcp.is_empty()).then(|| ErrorRow {
                row: row_for_index(index),
                url: url.to_string(),
            })
        })
        .collect()
}

/// Columns B..N for a recovered row. A strategy that could not be scraped
/// leaves its six cells blank.
pub fn fallback_row_values(mobile: Option<&MetricRecord>, desktop: Option<&MetricRecord>) -> Vec<String> {
    let mut values = Vec::with_capacity(13);
    for record in [mobile, desktop] {
        match record {
            Some(record) => values.extend(record.cells()),
            None => values.extend(std::iter::repeat_n(String::new(), 6)),
        }
    }
    values.push(Source::WebDev.to_string());
    values
}

pub fn analysis_url(base: &str, url: &str, strategy: Strategy) -> Result<String> {
    let target = normalize_url(url);
    let url = url::Url::parse_with_params(base, &[("url", target.as_str()), ("form_factor", strategy.as_str())])
        .map_err(|e| crate::error::Error::Config(format!("invalid analysis URL {}: {}", base, e)))?;
    Ok(url.into())
}

pub struct FallbackScraper {
    fetcher: Arc<dyn RenderedTextFetcher>,
    writer: Arc<dyn RowWriter>,
    analysis_base: String,
    settle: Duration,
    pause: Duration,
    text_limit: usize,
}

impl FallbackScraper {
    pub fn new(
        fetcher: Arc<dyn RenderedTextFetcher>,
        writer: Arc<dyn RowWriter>,
        analysis_base: impl Into<String>,
    ) -> Self {
        Self {
            fetcher,
            writer,
            analysis_base: analysis_base.into(),
            settle: Duration::from_secs(65),
            pause: Duration::from_secs(5),
            text_limit: 3000,
        }
    }

    pub fn with_delays(mut self, settle: Duration, pause: Duration) -> Self {
        self.settle = settle;
        self.pause = pause;
        self
    }

    pub fn with_text_limit(mut self, limit: usize) -> Self {
        self.text_limit = limit;
        self
    }

    async fn try_scrape(&self, url: &str, strategy: Strategy) -> Result<Option<MetricRecord>> {
        let page = analysis_url(&self.analysis_base, url, strategy)?;
        self.fetcher.open(&page).await?;
        // The dashboard renders client-side with no completion signal.
        tokio::time::sleep(self.settle).await;
        let text = self.fetcher.text().await?;
        let text: String = text.chars().take(self.text_limit).collect();
        Ok(parse_page_text(&text))
    }

    /// One strategy for one URL; `None` unless LCP was recovered.
    pub async fn scrape(&self, url: &str, strategy: Strategy) -> Option<MetricRecord> {
        match self.try_scrape(url, strategy).await {
            Ok(record) => record,
            Err(e) => {
                log::warn!("Browser error for {} ({}): {}", url, strategy, e);
                None
            }
        }
    }

    pub async fn run(&self, rows: &[ErrorRow]) -> RetrySummary {
        let mut summary = RetrySummary::default();

        for ErrorRow { row, url } in rows {
            log::info!("[{}] {}", row, url);

            log::info!("  Scraping mobile...");
            let mobile = self.scrape(url, Strategy::Mobile).await;
            tokio::time::sleep(self.pause).await;

            log::info!("  Scraping desktop...");
            let desktop = self.scrape(url, Strategy::Desktop).await;
            tokio::time::sleep(self.pause).await;

            if mobile.is_none() && desktop.is_none() {
                summary.still_broken += 1;
                log::info!("  → Still no data");
                continue;
            }

            let values = fallback_row_values(mobile.as_ref(), desktop.as_ref());
            match self.writer.write_row(*row, &values).await {
                Ok(()) => {
                    summary.fixed += 1;
                    let lcp = |r: &Option<MetricRecord>| {
                        r.as_ref()
                            .and_then(|r| r.lcp)
                            .map(|v| format_metric(Some(v)))
                            .unwrap_or_else(|| "?".to_string())
                    };
                    log::info!("  → Fixed! M-LCP:{}s D-LCP:{}s", lcp(&mobile), lcp(&desktop));
                }
                Err(e) => {
                    summary.write_failures += 1;
                    log::error!("Sheet write error row {}: {}", row, e);
                }
            }
        }

        log::info!(
            "=== RETRY COMPLETE: {} fixed, {} still broken ===",
            summary.fixed,
            summary.still_broken
        );
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn error_and_blank_rows_are_selected() {
        let rows = vec![
            row(&["ok.com", "2.1", "0.05"]),
            row(&["broken.com", "ERROR", "", "", "", "", "ERROR"]),
            row(&["fresh.com"]),
            row(&[]),
            row(&["", "ERROR"]),
            row(&["blank-b.com", " "]),
        ];
        assert_eq!(
            find_error_rows(&rows),
            vec![
                ErrorRow { row: 3, url: "broken.com".into() },
                ErrorRow { row: 4, url: "fresh.com".into() },
                ErrorRow { row: 7, url: "blank-b.com".into() },
            ]
        );
    }

    #[test]
    fn analysis_url_encodes_target() {
        let url = analysis_url("https://pagespeed.web.dev/analysis", "example.com/a b", Strategy::Desktop).unwrap();
        assert_eq!(
            url,
            "https://pagespeed.web.dev/analysis?url=https%3A%2F%2Fexample.com%2Fa+b&form_factor=desktop"
        );
    }

    #[test]
    fn missing_strategy_leaves_blank_cells() {
        let mobile = MetricRecord {
            lcp: Some(2.3),
            ..Default::default()
        };
        assert_eq!(
            fallback_row_values(Some(&mobile), None),
            vec!["2.3", "", "", "", "", "", "", "", "", "", "", "", "Web.dev"]
        );
    }
}
