use crate::config::AuthConfig;
use crate::error::{Error, Result};
use crate::metrics::collector::MetricsCollector;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

pub mod cli;
pub mod service_account;

pub use cli::CliTokenProvider;
pub use service_account::ServiceAccountProvider;

pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
pub const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";

/// Source of bearer tokens for the sheet API.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn acquire(&self) -> Result<String>;

    /// Called after the current token was rejected.
    async fn refresh(&self) -> Result<String> {
        self.acquire().await
    }
}

pub fn provider_from_config(config: &AuthConfig) -> Result<Arc<dyn TokenProvider>> {
    Ok(match config {
        AuthConfig::ServiceAccount {
            credentials,
            token_uri,
        } => Arc::new(ServiceAccountProvider::from_file(credentials, token_uri.clone())?),
        AuthConfig::Cli {
            account,
            credentials,
            command,
            token_uri,
        } => Arc::new(CliTokenProvider::new(
            account.clone(),
            credentials.into(),
            command.clone(),
            token_uri.clone(),
        )),
    })
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// POSTs an OAuth form to the token endpoint and returns the access token.
pub(crate) async fn exchange(token_uri: &str, form: &[(&str, &str)]) -> Result<String> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()?;

    let res = client
        .post(token_uri)
        .form(form)
        .send()
        .await
        .map_err(|e| Error::Auth(format!("token exchange failed: {}", e)))?;

    let status = res.status();
    if !status.is_success() {
        let message = res.text().await.unwrap_or_default();
        return Err(Error::Auth(format!("token endpoint returned {}: {}", status, message)));
    }

    let body: TokenResponse = res
        .json()
        .await
        .map_err(|e| Error::Auth(format!("malformed token response: {}", e)))?;
    Ok(body.access_token)
}

/// The bearer token shared by every worker.
///
/// Only the refresh call runs under the lock. A worker that saw a stale token
/// passes it to [`SharedToken::refresh_if_stale`]; if another worker already
/// replaced it, the fresh token is returned without a second exchange.
pub struct SharedToken {
    provider: Arc<dyn TokenProvider>,
    current: Mutex<String>,
    metrics: Option<Arc<MetricsCollector>>,
}

impl SharedToken {
    pub async fn acquire(provider: Arc<dyn TokenProvider>) -> Result<Self> {
        let token = provider.acquire().await?;
        Ok(Self::with_token(provider, token))
    }

    pub fn with_token(provider: Arc<dyn TokenProvider>, token: String) -> Self {
        Self {
            provider,
            current: Mutex::new(token),
            metrics: None,
        }
    }

    /// Counts every refresh that reaches the provider.
    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub async fn get(&self) -> String {
        self.current.lock().await.clone()
    }

    pub async fn refresh_if_stale(&self, previous: &str) -> Result<String> {
        let mut current = self.current.lock().await;
        if *current != previous {
            log::debug!("Token already refreshed by another worker");
            return Ok(current.clone());
        }
        log::info!("Refreshing sheet access token");
        let fresh = self.provider.refresh().await?;
        if let Some(metrics) = &self.metrics {
            metrics.increment_token_refreshes();
        }
        *current = fresh.clone();
        Ok(fresh)
    }
}
