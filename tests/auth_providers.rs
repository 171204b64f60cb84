use pagespeed_bulk::auth::{ServiceAccountProvider, TokenProvider, service_account::ServiceAccountKey};
use pagespeed_bulk::error::Error;
use serde_json::json;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TEST_KEY: &str = include_str!("fixtures/service_account.pem");

fn key() -> ServiceAccountKey {
    ServiceAccountKey {
        client_email: "scanner@project.iam.gserviceaccount.com".into(),
        private_key: TEST_KEY.into(),
        token_uri: None,
    }
}

#[tokio::test]
async fn service_account_exchanges_signed_assertion() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=urn%3Aietf%3Aparams%3Aoauth%3Agrant-type%3Ajwt-bearer"))
        .and(body_string_contains("assertion=eyJ"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "ya29.sa-token",
            "expires_in": 3599,
            "token_type": "Bearer"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = ServiceAccountProvider::new(key(), Some(format!("{}/token", server.uri()))).unwrap();
    assert_eq!(provider.acquire().await.unwrap(), "ya29.sa-token");
}

#[test]
fn assertion_is_a_three_part_jwt() {
    let provider = ServiceAccountProvider::new(key(), None).unwrap();
    let assertion = provider.assertion().unwrap();
    assert_eq!(assertion.split('.').count(), 3);
    assert_eq!(provider.client_email(), "scanner@project.iam.gserviceaccount.com");
}

#[test]
fn invalid_private_key_is_an_auth_error() {
    let mut bad = key();
    bad.private_key = "not a pem".into();
    assert!(matches!(ServiceAccountProvider::new(bad, None), Err(Error::Auth(_))));
}

#[tokio::test]
async fn rejected_exchange_is_an_auth_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({ "error": "invalid_grant" })))
        .mount(&server)
        .await;

    let provider = ServiceAccountProvider::new(key(), Some(format!("{}/token", server.uri()))).unwrap();
    let err = provider.refresh().await.unwrap_err();
    assert!(matches!(err, Error::Auth(_)));
    assert!(err.to_string().contains("invalid_grant"));
}

#[cfg(unix)]
mod cli_provider {
    use super::*;
    use pagespeed_bulk::auth::CliTokenProvider;
    use std::io::Write;
    use std::os::unix::fs::PermissionsExt;
    use std::path::PathBuf;

    fn write_file(dir: &tempfile::TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    fn fake_cli(dir: &tempfile::TempDir) -> String {
        // Invoked as: auth tokens export <account> --out <path>
        let path = write_file(
            dir,
            "gog",
            "#!/bin/sh\n[ \"$4\" = \"me@example.com\" ] || exit 1\necho '{\"refresh_token\":\"rt-123\"}' > \"$6\"\n",
        );
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[tokio::test]
    async fn exported_refresh_token_is_exchanged() {
        let dir = tempfile::tempdir().unwrap();
        let credentials = write_file(
            &dir,
            "credentials.json",
            r#"{"client_id":"cid","client_secret":"secret"}"#,
        );
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("refresh_token=rt-123"))
            .and(body_string_contains("client_id=cid"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access_token": "ya29.user" })))
            .expect(1)
            .mount(&server)
            .await;

        let provider = CliTokenProvider::new(
            "me@example.com".into(),
            credentials,
            fake_cli(&dir),
            Some(format!("{}/token", server.uri())),
        );
        assert_eq!(provider.acquire().await.unwrap(), "ya29.user");
    }

    #[tokio::test]
    async fn failing_export_is_an_auth_error() {
        let dir = tempfile::tempdir().unwrap();
        let credentials = write_file(
            &dir,
            "credentials.json",
            r#"{"client_id":"cid","client_secret":"secret"}"#,
        );
        let provider = CliTokenProvider::new(
            "someone-else@example.com".into(),
            credentials,
            fake_cli(&dir),
            Some("http://127.0.0.1:9/token".into()),
        );
        assert!(matches!(provider.acquire().await, Err(Error::Auth(_))));
    }
}
