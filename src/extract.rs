//! Normalizes a PageSpeed Insights v5 response into a [`MetricRecord`].
//!
//! Field (CrUX) data is preferred; lab (Lighthouse) audits are the fallback.

use crate::error::{Error, Result};
use crate::model::{Assessment, MetricRecord, StrategyResult, round_to};
use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Default, Deserialize)]
pub struct PageSpeedResponse {
    #[serde(default)]
    pub error: Option<serde_json::Value>,
    #[serde(default, rename = "loadingExperience")]
    pub loading_experience: Option<LoadingExperience>,
    #[serde(default, rename = "lighthouseResult")]
    pub lighthouse_result: Option<LighthouseResult>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LoadingExperience {
    #[serde(default)]
    pub metrics: HashMap<String, FieldMetric>,
    #[serde(default)]
    pub overall_category: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct FieldMetric {
    #[serde(default)]
    pub percentile: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LighthouseResult {
    #[serde(default)]
    pub audits: HashMap<String, Audit>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Audit {
    #[serde(default, rename = "numericValue")]
    pub numeric_value: Option<f64>,
}

const FIELD_LCP: &str = "LARGEST_CONTENTFUL_PAINT_MS";
const FIELD_CLS: &str = "CUMULATIVE_LAYOUT_SHIFT_SCORE";
const FIELD_INP: &str = "INTERACTION_TO_NEXT_PAINT";
const FIELD_FCP: &str = "FIRST_CONTENTFUL_PAINT_MS";
const FIELD_TTFB: &str = "EXPERIMENTAL_TIME_TO_FIRST_BYTE";

const AUDIT_LCP: &str = "largest-contentful-paint";
const AUDIT_CLS: &str = "cumulative-layout-shift";
const AUDIT_FCP: &str = "first-contentful-paint";
const AUDIT_TTFB: &str = "server-response-time";

fn ms_to_secs(ms: f64) -> f64 {
    round_to(ms / 1000.0, 2)
}

/// Real-user data. Needs both a metrics map and an overall verdict.
pub fn extract_field(response: &PageSpeedResponse) -> Option<MetricRecord> {
    let experience = response.loading_experience.as_ref()?;
    let category = experience.overall_category.as_deref().filter(|c| !c.is_empty())?;
    if experience.metrics.is_empty() {
        return None;
    }

    let percentile = |key: &str| experience.metrics.get(key).and_then(|m| m.percentile);

    Some(MetricRecord {
        lcp: percentile(FIELD_LCP).map(ms_to_secs),
        // CrUX reports CLS in hundredths.
        cls: percentile(FIELD_CLS).map(|raw| round_to(raw / 100.0, 2)),
        inp: percentile(FIELD_INP),
        fcp: percentile(FIELD_FCP).map(ms_to_secs),
        ttfb: percentile(FIELD_TTFB).map(ms_to_secs),
        assessment: Some(Assessment::from_category(category)),
    })
}

/// Synthetic data. LCP and CLS are mandatory; TTFB reads as zero when the
/// audit is missing, and there is never an INP or a verdict.
pub fn extract_lab(response: &PageSpeedResponse) -> Option<MetricRecord> {
    let audits = &response.lighthouse_result.as_ref()?.audits;
    let value = |key: &str| audits.get(key).and_then(|a| a.numeric_value);

    let lcp = value(AUDIT_LCP)?;
    let cls = value(AUDIT_CLS)?;

    Some(MetricRecord {
        lcp: Some(ms_to_secs(lcp)),
        cls: Some(round_to(cls, 3)),
        inp: None,
        fcp: value(AUDIT_FCP).map(ms_to_secs),
        ttfb: Some(ms_to_secs(value(AUDIT_TTFB).unwrap_or(0.0))),
        assessment: None,
    })
}

/// Field pass, then lab pass, else `Error`.
pub fn extract(response: &PageSpeedResponse) -> StrategyResult {
    if response.error.is_some() {
        return StrategyResult::error();
    }
    if let Some(record) = extract_field(response) {
        return StrategyResult::field(record);
    }
    if let Some(record) = extract_lab(response) {
        return StrategyResult::lab(record);
    }
    log::debug!("Response carries neither field nor lab data");
    StrategyResult::error()
}

pub fn parse_response(body: &serde_json::Value) -> Result<PageSpeedResponse> {
    PageSpeedResponse::deserialize(body)
        .map_err(|e| Error::Extraction(format!("unexpected PageSpeed payload shape: {}", e)))
}

/// Parses a raw JSON payload; a body that is not a JSON object yields `Error`.
pub fn extract_json(body: &serde_json::Value) -> StrategyResult {
    match parse_response(body) {
        Ok(response) => extract(&response),
        Err(e) => {
            log::debug!("{}", e);
            StrategyResult::error()
        }
    }
}
