use serde::{Deserialize, Serialize};
use std::fmt;

/// Sheet row 1 holds the header, so URL index 0 lands on row 2.
pub const HEADER_ROWS: usize = 1;

/// Cell written into the first and last column of a strategy that failed.
pub const ERROR_CELL: &str = "ERROR";

/// Maps a 0-based URL index to its destination row.
pub fn row_for_index(index: usize) -> usize {
    index + HEADER_ROWS + 1
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlTask {
    pub index: usize,
    pub url: String,
}

impl UrlTask {
    pub fn row(&self) -> usize {
        row_for_index(self.index)
    }
}

/// Simulated device class for one analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    Mobile,
    Desktop,
}

impl Strategy {
    pub const ALL: [Strategy; 2] = [Strategy::Mobile, Strategy::Desktop];

    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Mobile => "mobile",
            Strategy::Desktop => "desktop",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a row's numbers came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Source {
    Field,
    Lab,
    Error,
    /// Recovered by the rendered-page retry pass.
    #[serde(rename = "Web.dev")]
    WebDev,
}

impl Source {
    /// Field beats Lab beats Error, so partial success on one device still counts.
    pub fn merge(a: Source, b: Source) -> Source {
        if a == Source::Field || b == Source::Field {
            Source::Field
        } else if a == Source::Lab || b == Source::Lab {
            Source::Lab
        } else {
            Source::Error
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Field => "Field",
            Source::Lab => "Lab",
            Source::Error => "Error",
            Source::WebDev => "Web.dev",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Assessment {
    Fast,
    Average,
    Slow,
    Other(String),
}

impl Assessment {
    pub fn from_category(category: &str) -> Self {
        match category {
            "FAST" => Assessment::Fast,
            "AVERAGE" => Assessment::Average,
            "SLOW" => Assessment::Slow,
            other => Assessment::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Assessment::Fast => "FAST",
            Assessment::Average => "AVERAGE",
            Assessment::Slow => "SLOW",
            Assessment::Other(s) => s,
        }
    }
}

/// Normalized Core Web Vitals for one (URL, strategy) pair.
///
/// `lcp`, `fcp` and `ttfb` are seconds, `inp` milliseconds and `cls` unitless.
/// Values are rounded when the record is built since that is what gets
/// persisted. `None` means "not reported", which is distinct from zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    pub lcp: Option<f64>,
    pub cls: Option<f64>,
    pub inp: Option<f64>,
    pub fcp: Option<f64>,
    pub ttfb: Option<f64>,
    pub assessment: Option<Assessment>,
}

impl MetricRecord {
    /// The six cells `lcp, cls, inp, fcp, ttfb, assessment`.
    pub fn cells(&self) -> [String; 6] {
        [
            format_metric(self.lcp),
            format_metric(self.cls),
            format_metric(self.inp),
            format_metric(self.fcp),
            format_metric(self.ttfb),
            self.assessment
                .as_ref()
                .map(|a| a.as_str().to_string())
                .unwrap_or_default(),
        ]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StrategyResult {
    pub record: Option<MetricRecord>,
    pub source: Source,
}

impl StrategyResult {
    pub fn error() -> Self {
        Self {
            record: None,
            source: Source::Error,
        }
    }

    pub fn field(record: MetricRecord) -> Self {
        Self {
            record: Some(record),
            source: Source::Field,
        }
    }

    pub fn lab(record: MetricRecord) -> Self {
        Self {
            record: Some(record),
            source: Source::Lab,
        }
    }

    /// Cells for a scan row; a missing record marks the first and last cell `ERROR`.
    pub fn cells(&self) -> [String; 6] {
        match &self.record {
            Some(record) => record.cells(),
            None => [
                ERROR_CELL.to_string(),
                String::new(),
                String::new(),
                String::new(),
                String::new(),
                ERROR_CELL.to_string(),
            ],
        }
    }

    pub fn lcp_label(&self) -> String {
        self.record
            .as_ref()
            .and_then(|r| r.lcp)
            .map(|v| format_metric(Some(v)))
            .unwrap_or_else(|| "ERR".to_string())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScanOutcome {
    pub index: usize,
    pub mobile: StrategyResult,
    pub desktop: StrategyResult,
    pub overall_source: Source,
}

impl ScanOutcome {
    pub fn new(index: usize, mobile: StrategyResult, desktop: StrategyResult) -> Self {
        let overall_source = Source::merge(mobile.source, desktop.source);
        Self {
            index,
            mobile,
            desktop,
            overall_source,
        }
    }

    /// Columns B..N of the destination row.
    pub fn row_values(&self) -> Vec<String> {
        let mut values = Vec::with_capacity(13);
        values.extend(self.mobile.cells());
        values.extend(self.desktop.cells());
        values.push(self.overall_source.to_string());
        values
    }
}

/// Aggregate result of a scan run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCounters {
    pub done: u64,
    pub errors: u64,
}

/// Rounds to `places` decimals, exact ties going to the even digit.
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round_ties_even() / factor
}

/// Shortest decimal form (`2.1`, `150`), or an empty cell when not reported.
pub fn format_metric(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{}", v),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_are_offset_past_the_header() {
        assert_eq!(row_for_index(0), 2);
        assert_eq!(row_for_index(5), 7);
        let rows: std::collections::HashSet<_> = (0..1000).map(row_for_index).collect();
        assert_eq!(rows.len(), 1000);
    }

    #[test]
    fn source_merge_prefers_field_then_lab() {
        use Source::*;
        let cases = [
            (Field, Field, Field),
            (Field, Lab, Field),
            (Field, Error, Field),
            (Lab, Field, Field),
            (Lab, Lab, Lab),
            (Lab, Error, Lab),
            (Error, Field, Field),
            (Error, Lab, Lab),
            (Error, Error, Error),
        ];
        for (a, b, expected) in cases {
            assert_eq!(Source::merge(a, b), expected, "{a:?} + {b:?}");
        }
    }

    #[test]
    fn failed_strategy_marks_first_and_last_cell() {
        let cells = StrategyResult::error().cells();
        assert_eq!(cells, ["ERROR", "", "", "", "", "ERROR"]);
    }

    #[test]
    fn missing_metrics_render_empty_but_zero_renders() {
        let record = MetricRecord {
            lcp: Some(0.0),
            ..Default::default()
        };
        assert_eq!(record.cells(), ["0", "", "", "", "", ""]);
    }

    #[test]
    fn row_layout_is_mobile_desktop_source() {
        let mobile = StrategyResult::lab(MetricRecord {
            lcp: Some(3.45),
            cls: Some(0.125),
            fcp: Some(1.8),
            ttfb: Some(0.0),
            ..Default::default()
        });
        let outcome = ScanOutcome::new(0, mobile, StrategyResult::error());
        assert_eq!(outcome.overall_source, Source::Lab);
        assert_eq!(
            outcome.row_values(),
            vec!["3.45", "0.125", "", "1.8", "0", "", "ERROR", "", "", "", "", "ERROR", "Lab"]
        );
    }

    #[test]
    fn rounding_matches_persisted_precision() {
        assert_eq!(round_to(2100.0 / 1000.0, 2), 2.1);
        assert_eq!(round_to(8.0 / 100.0, 2), 0.08);
        assert_eq!(round_to(0.123_456, 3), 0.123);
        assert_eq!(round_to(1.125, 2), 1.12);
        assert_eq!(round_to(1.375, 2), 1.38);
    }
}
