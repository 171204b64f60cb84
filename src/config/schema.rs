use crate::pagespeed;
use crate::sheet;
use serde::{Deserialize, Serialize};
use validator::Validate;

pub const API_KEY_ENV: &str = "GOOGLE_PAGESPEED_API_TOKEN";

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ScanConfig {
    #[serde(default)]
    #[validate(length(min = 1))]
    pub spreadsheet_id: String,

    pub auth: AuthConfig,

    /// PageSpeed API key; falls back to `GOOGLE_PAGESPEED_API_TOKEN`.
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_workers")]
    #[validate(range(min = 1, max = 64))]
    pub workers: usize,

    #[serde(default)]
    pub start_index: usize,

    #[serde(default = "default_api_timeout")]
    #[validate(range(min = 1))]
    pub api_timeout_secs: u64,

    #[serde(default = "default_metadata_timeout")]
    #[validate(range(min = 1))]
    pub metadata_timeout_secs: u64,

    #[serde(default = "default_write_timeout")]
    #[validate(range(min = 1))]
    pub write_timeout_secs: u64,

    #[serde(default = "default_progress_every")]
    #[validate(range(min = 1))]
    pub progress_every: u64,

    #[serde(default = "default_pagespeed_endpoint")]
    pub pagespeed_endpoint: String,

    #[serde(default = "default_sheets_endpoint")]
    pub sheets_endpoint: String,

    #[serde(default = "default_url_range")]
    pub url_range: String,

    #[serde(default = "default_rows_range")]
    pub rows_range: String,

    #[serde(default)]
    pub fallback: FallbackConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthConfig {
    /// Service-account key file signed locally.
    ServiceAccount {
        credentials: String,
        #[serde(default)]
        token_uri: Option<String>,
    },
    /// Refresh token exported by an external CLI.
    Cli {
        account: String,
        #[serde(default = "default_cli_credentials")]
        credentials: String,
        #[serde(default = "default_cli_command")]
        command: String,
        #[serde(default)]
        token_uri: Option<String>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackConfig {
    #[serde(default = "default_browser_command")]
    pub browser_command: String,

    #[serde(default = "default_analysis_url")]
    pub analysis_url: String,

    /// Wait after opening the page before its text is read.
    #[serde(default = "default_settle")]
    pub settle_secs: u64,

    /// Pause after each scrape so the shared browser session is not flooded.
    #[serde(default = "default_pause")]
    pub pause_secs: u64,

    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,

    #[serde(default = "default_text_limit")]
    pub text_limit: usize,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            browser_command: default_browser_command(),
            analysis_url: default_analysis_url(),
            settle_secs: default_settle(),
            pause_secs: default_pause(),
            command_timeout_secs: default_command_timeout(),
            text_limit: default_text_limit(),
        }
    }
}

impl ScanConfig {
    /// The configured key, else the environment variable.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.is_empty())
            .or_else(|| std::env::var(API_KEY_ENV).ok().filter(|k| !k.is_empty()))
    }
}

fn default_workers() -> usize {
    4
}

fn default_api_timeout() -> u64 {
    90
}

fn default_metadata_timeout() -> u64 {
    15
}

fn default_write_timeout() -> u64 {
    30
}

fn default_progress_every() -> u64 {
    25
}

fn default_pagespeed_endpoint() -> String {
    pagespeed::DEFAULT_ENDPOINT.to_string()
}

fn default_sheets_endpoint() -> String {
    sheet::DEFAULT_ENDPOINT.to_string()
}

fn default_url_range() -> String {
    "A2:A10000".to_string()
}

fn default_rows_range() -> String {
    "A2:N10000".to_string()
}

fn default_cli_credentials() -> String {
    "/home/node/.config/gogcli/credentials.json".to_string()
}

fn default_cli_command() -> String {
    "gog".to_string()
}

fn default_browser_command() -> String {
    "agent-browser".to_string()
}

fn default_analysis_url() -> String {
    "https://pagespeed.web.dev/analysis".to_string()
}

fn default_settle() -> u64 {
    65
}

fn default_pause() -> u64 {
    5
}

fn default_command_timeout() -> u64 {
    15
}

fn default_text_limit() -> usize {
    3000
}
