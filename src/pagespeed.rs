use crate::error::{Error, Result};
use crate::extract;
use crate::model::{Strategy, StrategyResult};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

pub const DEFAULT_ENDPOINT: &str = "https://www.googleapis.com/pagespeedonline/v5/runPagespeed";

/// Produces one normalized measurement per (URL, strategy).
///
/// Implementations never fail: every problem collapses into
/// [`StrategyResult::error`] and is only visible in the log.
#[async_trait]
pub trait Analyzer: Send + Sync {
    async fn measure(&self, url: &str, strategy: Strategy) -> StrategyResult;
}

/// Prefixes `https://` when the URL carries no scheme.
pub fn normalize_url(url: &str) -> String {
    let url = url.trim();
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("https://{}", url)
    }
}

pub struct PageSpeedClient {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl PageSpeedClient {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("pagespeed-bulk/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        })
    }

    async fn fetch(&self, url: &str, strategy: Strategy) -> Result<serde_json::Value> {
        let res = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("url", url),
                ("strategy", strategy.as_str()),
                ("category", "performance"),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            let message = res.text().await.unwrap_or_default();
            return Err(Error::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(res.json().await?)
    }
}

#[async_trait]
impl Analyzer for PageSpeedClient {
    async fn measure(&self, url: &str, strategy: Strategy) -> StrategyResult {
        let url = normalize_url(url);
        log::debug!("Analyzing {} ({})", url, strategy);

        match self.fetch(&url, strategy).await {
            Ok(body) => {
                let result = extract::extract_json(&body);
                if result.record.is_none() {
                    log::warn!("No usable data for {} ({})", url, strategy);
                }
                result
            }
            Err(e) => {
                log::warn!("PageSpeed request failed for {} ({}): {}", url, strategy, e);
                StrategyResult::error()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_hosts_get_https() {
        assert_eq!(normalize_url("example.com"), "https://example.com");
        assert_eq!(normalize_url("  example.com/a?b=c "), "https://example.com/a?b=c");
        assert_eq!(normalize_url("http://example.com"), "http://example.com");
        assert_eq!(normalize_url("https://example.com"), "https://example.com");
    }
}
