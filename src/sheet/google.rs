use super::{RowReader, RowWriter, qualify, row_range};
use crate::auth::SharedToken;
use crate::config::ScanConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetMeta>,
}

#[derive(Debug, Deserialize)]
struct SheetMeta {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
struct SheetProperties {
    title: String,
}

#[derive(Debug, Clone)]
pub struct SheetsSettings {
    pub endpoint: String,
    pub spreadsheet_id: String,
    pub url_range: String,
    pub rows_range: String,
    pub metadata_timeout: Duration,
    pub request_timeout: Duration,
}

impl SheetsSettings {
    pub fn from_config(config: &ScanConfig) -> Self {
        Self {
            endpoint: config.sheets_endpoint.clone(),
            spreadsheet_id: config.spreadsheet_id.clone(),
            url_range: config.url_range.clone(),
            rows_range: config.rows_range.clone(),
            metadata_timeout: Duration::from_secs(config.metadata_timeout_secs),
            request_timeout: Duration::from_secs(config.write_timeout_secs),
        }
    }
}

/// Sheets v4 values API.
///
/// Every call sends the current shared token. On a 401 the token is refreshed
/// once and the call retried once; anything else is returned to the caller.
pub struct SheetsClient {
    client: Client,
    token: Arc<SharedToken>,
    settings: SheetsSettings,
    sheet_name: Option<String>,
}

impl SheetsClient {
    pub fn new(settings: SheetsSettings, token: Arc<SharedToken>) -> Result<Self> {
        let client = Client::builder().timeout(settings.request_timeout).build()?;
        Ok(Self {
            client,
            token,
            settings,
            sheet_name: None,
        })
    }

    /// Builds the client and detects the first sheet's title.
    pub async fn connect(settings: SheetsSettings, token: Arc<SharedToken>) -> Result<Self> {
        let mut client = Self::new(settings, token)?;
        client.sheet_name = client.detect_sheet_name().await;
        Ok(client)
    }

    pub fn with_sheet_name(mut self, name: Option<String>) -> Self {
        self.sheet_name = name;
        self
    }

    pub fn sheet_name(&self) -> Option<&str> {
        self.sheet_name.as_deref()
    }

    fn spreadsheet_url(&self) -> String {
        format!(
            "{}/{}",
            self.settings.endpoint.trim_end_matches('/'),
            self.settings.spreadsheet_id
        )
    }

    fn values_url(&self, range: &str) -> String {
        format!(
            "{}/values/{}",
            self.spreadsheet_url(),
            urlencoding::encode(range)
        )
    }

    /// Title of the first sheet, `None` on any failure.
    pub async fn detect_sheet_name(&self) -> Option<String> {
        let token = self.token.get().await;
        let res = self
            .client
            .get(self.spreadsheet_url())
            .query(&[("fields", "sheets.properties.title")])
            .bearer_auth(token)
            .timeout(self.settings.metadata_timeout)
            .send()
            .await;

        let meta: SpreadsheetMeta = match res {
            Ok(res) if res.status().is_success() => match res.json().await {
                Ok(meta) => meta,
                Err(e) => {
                    log::warn!("Unreadable spreadsheet metadata: {}", e);
                    return None;
                }
            },
            Ok(res) => {
                log::warn!("Sheet name lookup returned {}", res.status());
                return None;
            }
            Err(e) => {
                log::warn!("Sheet name lookup failed: {}", e);
                return None;
            }
        };

        meta.sheets.into_iter().next().map(|s| s.properties.title)
    }

    /// Sends a request built for `token`, mapping 401 to [`Error::Unauthorized`].
    async fn send_once(&self, request: RequestBuilder) -> Result<reqwest::Response> {
        let res = request.send().await?;
        let status = res.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(Error::Unauthorized);
        }
        if !status.is_success() {
            let message = res.text().await.unwrap_or_default();
            return Err(Error::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(res)
    }

    /// One attempt, then at most one refresh and one retry on 401.
    async fn send_authorized<F>(&self, build: F) -> Result<reqwest::Response>
    where
        F: Fn(&str) -> RequestBuilder,
    {
        let token = self.token.get().await;
        match self.send_once(build(&token)).await {
            Err(Error::Unauthorized) => {
                let fresh = self.token.refresh_if_stale(&token).await?;
                self.send_once(build(&fresh)).await
            }
            other => other,
        }
    }

    async fn read_range(&self, range: &str) -> Result<Vec<Vec<String>>> {
        let url = self.values_url(&qualify(self.sheet_name(), range));
        let res = self
            .send_authorized(|token| self.client.get(&url).bearer_auth(token))
            .await?;
        let body: ValueRange = res.json().await?;
        Ok(body.values)
    }
}

#[async_trait]
impl RowReader for SheetsClient {
    async fn read_urls(&self) -> Result<Vec<String>> {
        let rows = self.read_range(&self.settings.url_range).await?;
        Ok(rows
            .into_iter()
            .map(|row| row.first().map(|c| c.trim().to_string()).unwrap_or_default())
            .collect())
    }

    async fn read_rows(&self) -> Result<Vec<Vec<String>>> {
        self.read_range(&self.settings.rows_range).await
    }
}

#[async_trait]
impl RowWriter for SheetsClient {
    async fn write_row(&self, row: usize, values: &[String]) -> Result<()> {
        let range = row_range(self.sheet_name(), row);
        let url = self.values_url(&range);
        let body = json!({
            "range": range,
            "majorDimension": "ROWS",
            "values": [values],
        });

        self.send_authorized(|token| {
            self.client
                .put(&url)
                .query(&[("valueInputOption", "RAW")])
                .bearer_auth(token)
                .json(&body)
        })
        .await?;
        Ok(())
    }
}
