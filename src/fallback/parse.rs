//! Pattern matching over the text of the rendered PageSpeed dashboard.

use crate::model::{Assessment, MetricRecord, round_to};
use regex::Regex;
use std::sync::LazyLock;

static LCP: LazyLock<Regex> = LazyLock::new(|| metric_regex("Largest Contentful Paint \\(LCP\\)"));
static INP: LazyLock<Regex> = LazyLock::new(|| metric_regex("Interaction to Next Paint \\(INP\\)"));
static FCP: LazyLock<Regex> = LazyLock::new(|| metric_regex("First Contentful Paint \\(FCP\\)"));
static TTFB: LazyLock<Regex> = LazyLock::new(|| metric_regex("Time to First Byte \\(TTFB\\)"));
static CLS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Cumulative Layout Shift \(CLS\)\n([\d.]+)").expect("valid CLS pattern"));
static VERDICT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Core Web Vitals Assessment:\s*\n?\s*(Passed|Failed)").expect("valid verdict pattern")
});

fn metric_regex(label: &str) -> Regex {
    Regex::new(&format!(r"{label}\n([\d.]+\s*(?:ms|s))")).expect("valid metric pattern")
}

/// `"2.1 s"` → 2.1, `"249 ms"` → 249, `"0.26"` → 0.26. No unit conversion.
pub fn parse_value(text: &str) -> Option<f64> {
    let text = text.trim();
    let number = text
        .strip_suffix("ms")
        .or_else(|| text.strip_suffix('s'))
        .unwrap_or(text)
        .trim_end();
    number.parse().ok()
}

fn is_millis(literal: &str) -> bool {
    literal.trim_end().ends_with("ms")
}

/// Seconds, rounded to two places.
fn seconds(literal: &str) -> Option<f64> {
    let value = parse_value(literal)?;
    let secs = if is_millis(literal) { value / 1000.0 } else { value };
    Some(round_to(secs, 2))
}

/// Whole milliseconds.
fn millis(literal: &str) -> Option<f64> {
    let value = parse_value(literal)?;
    let ms = if is_millis(literal) { value } else { value * 1000.0 };
    Some(ms.round())
}

fn capture<'t>(re: &Regex, text: &'t str) -> Option<&'t str> {
    re.captures(text).and_then(|c| c.get(1)).map(|m| m.as_str())
}

/// Extracts the metric schema from page text. Returns `None` unless LCP was
/// found, since a row without LCP is not worth overwriting.
pub fn parse_page_text(text: &str) -> Option<MetricRecord> {
    let lcp = capture(&LCP, text).and_then(seconds)?;

    Some(MetricRecord {
        lcp: Some(lcp),
        cls: capture(&CLS, text).and_then(parse_value),
        inp: capture(&INP, text).and_then(millis),
        fcp: capture(&FCP, text).and_then(seconds),
        ttfb: capture(&TTFB, text).and_then(seconds),
        assessment: capture(&VERDICT, text).map(|verdict| {
            if verdict == "Passed" {
                Assessment::Fast
            } else {
                Assessment::Slow
            }
        }),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = "Discover what your real users are experiencing\n\
Core Web Vitals Assessment: Failed\n\
Largest Contentful Paint (LCP)\n2.3 s\n\
Interaction to Next Paint (INP)\n249 ms\n\
Cumulative Layout Shift (CLS)\n0.26\n\
First Contentful Paint (FCP)\n1.8 s\n\
Time to First Byte (TTFB)\n640 ms\n";

    #[test]
    fn parse_value_accepts_units() {
        assert_eq!(parse_value("249 ms"), Some(249.0));
        assert_eq!(parse_value("2.1 s"), Some(2.1));
        assert_eq!(parse_value("0.26"), Some(0.26));
        assert_eq!(parse_value("2.1s"), Some(2.1));
        assert_eq!(parse_value("n/a"), None);
    }

    #[test]
    fn full_page_is_normalized() {
        let record = parse_page_text(PAGE).unwrap();
        assert_eq!(record.lcp, Some(2.3));
        assert_eq!(record.inp, Some(249.0));
        assert_eq!(record.cls, Some(0.26));
        assert_eq!(record.fcp, Some(1.8));
        assert_eq!(record.ttfb, Some(0.64));
        assert_eq!(record.assessment, Some(Assessment::Slow));
    }

    #[test]
    fn units_are_converted_both_ways() {
        let text = "Core Web Vitals Assessment:\n Passed\n\
Largest Contentful Paint (LCP)\n980 ms\n\
Interaction to Next Paint (INP)\n0.3 s\n";
        let record = parse_page_text(text).unwrap();
        assert_eq!(record.lcp, Some(0.98));
        assert_eq!(record.inp, Some(300.0));
        assert_eq!(record.assessment, Some(Assessment::Fast));
    }

    #[test]
    fn lcp_alone_is_enough() {
        let record = parse_page_text("Largest Contentful Paint (LCP)\n2.3 s\n").unwrap();
        assert_eq!(
            record,
            MetricRecord {
                lcp: Some(2.3),
                ..Default::default()
            }
        );
    }

    #[test]
    fn missing_lcp_yields_nothing() {
        assert!(parse_page_text("Cumulative Layout Shift (CLS)\n0.1\n").is_none());
        assert!(parse_page_text("").is_none());
    }
}
