pub mod auth;
pub mod config;
pub mod error;
pub mod extract;
pub mod fallback;
pub mod metrics;
pub mod model;
pub mod pagespeed;
pub mod scanner;
pub mod sheet;

pub use auth::{SharedToken, TokenProvider};
pub use error::{Error, Result};
pub use fallback::{FallbackScraper, RenderedTextFetcher};
pub use metrics::collector::MetricsCollector;
pub use metrics::snapshot::MetricsSnapshot;
pub use model::{MetricRecord, RunCounters, ScanOutcome, Source, Strategy, StrategyResult};
pub use pagespeed::{Analyzer, PageSpeedClient};
pub use scanner::ScanEngine;
pub use sheet::{RowReader, RowWriter, SheetsClient};
