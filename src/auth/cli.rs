use super::{DEFAULT_TOKEN_URI, TokenProvider, exchange};
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

const EXPORT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct OAuthClient {
    client_id: String,
    client_secret: String,
}

#[derive(Debug, Deserialize)]
struct ExportedTokens {
    refresh_token: String,
}

/// Delegates to an external CLI that manages a user's refresh token.
///
/// The CLI is invoked as `<command> auth tokens export <account> --out <file>`
/// and the exported refresh token is exchanged using the OAuth client stored
/// in `credentials`.
pub struct CliTokenProvider {
    account: String,
    credentials: PathBuf,
    command: String,
    token_uri: String,
}

impl CliTokenProvider {
    pub fn new(
        account: String,
        credentials: PathBuf,
        command: String,
        token_uri: Option<String>,
    ) -> Self {
        Self {
            account,
            credentials,
            command,
            token_uri: token_uri.unwrap_or_else(|| DEFAULT_TOKEN_URI.to_string()),
        }
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    fn read_client(&self) -> Result<OAuthClient> {
        let content = std::fs::read_to_string(&self.credentials)
            .map_err(|e| Error::Auth(format!("{}: {}", self.credentials.display(), e)))?;
        Ok(serde_json::from_str(&content)?)
    }

    async fn export_refresh_token(&self) -> Result<String> {
        // Dropping the handle removes the exported secret.
        let out = tempfile::Builder::new()
            .prefix("tokens-")
            .suffix(".json")
            .tempfile()?;

        let mut cmd = Command::new(&self.command);
        cmd.args(["auth", "tokens", "export", &self.account, "--out"])
            .arg(out.path())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let output = tokio::time::timeout(EXPORT_TIMEOUT, cmd.output())
            .await
            .map_err(|_| Error::Auth(format!("{} timed out exporting tokens", self.command)))?
            .map_err(|e| Error::Auth(format!("failed to run {}: {}", self.command, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Auth(format!("{} export failed: {}", self.command, stderr.trim())));
        }

        let content = tokio::fs::read_to_string(out.path()).await?;
        let tokens: ExportedTokens = serde_json::from_str(&content)?;
        Ok(tokens.refresh_token)
    }
}

#[async_trait]
impl TokenProvider for CliTokenProvider {
    async fn acquire(&self) -> Result<String> {
        let client = self.read_client()?;
        let refresh_token = self.export_refresh_token().await?;
        exchange(
            &self.token_uri,
            &[
                ("client_id", client.client_id.as_str()),
                ("client_secret", client.client_secret.as_str()),
                ("refresh_token", refresh_token.as_str()),
                ("grant_type", "refresh_token"),
            ],
        )
        .await
    }
}
