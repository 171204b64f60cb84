use super::{DEFAULT_TOKEN_URI, SHEETS_SCOPE, TokenProvider, exchange};
use crate::error::{Error, Result};
use async_trait::async_trait;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde::{Deserialize, Serialize};
use std::path::Path;

const ASSERTION_LIFETIME_SECS: i64 = 3600;
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub token_uri: Option<String>,
}

#[derive(Debug, Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

/// Signs an RS256 assertion with a service-account key and trades it for an
/// access token.
pub struct ServiceAccountProvider {
    key: ServiceAccountKey,
    encoding_key: EncodingKey,
    token_uri: String,
}

impl ServiceAccountProvider {
    pub fn new(key: ServiceAccountKey, token_uri: Option<String>) -> Result<Self> {
        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())?;
        let token_uri = token_uri
            .or_else(|| key.token_uri.clone())
            .unwrap_or_else(|| DEFAULT_TOKEN_URI.to_string());

        Ok(Self {
            key,
            encoding_key,
            token_uri,
        })
    }

    pub fn from_file(path: impl AsRef<Path>, token_uri: Option<String>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Auth(format!("{}: {}", path.display(), e)))?;
        let key: ServiceAccountKey = serde_json::from_str(&content)?;
        Self::new(key, token_uri)
    }

    pub fn client_email(&self) -> &str {
        &self.key.client_email
    }

    pub fn assertion(&self) -> Result<String> {
        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            iss: &self.key.client_email,
            scope: SHEETS_SCOPE,
            aud: &self.token_uri,
            iat: now,
            exp: now + ASSERTION_LIFETIME_SECS,
        };
        Ok(encode(&Header::new(Algorithm::RS256), &claims, &self.encoding_key)?)
    }
}

#[async_trait]
impl TokenProvider for ServiceAccountProvider {
    async fn acquire(&self) -> Result<String> {
        let assertion = self.assertion()?;
        exchange(
            &self.token_uri,
            &[("grant_type", JWT_BEARER_GRANT), ("assertion", &assertion)],
        )
        .await
    }
}
