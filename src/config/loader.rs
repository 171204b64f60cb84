use crate::config::schema::ScanConfig;
use crate::error::{Error, Result};
use std::fs;
use std::path::Path;
use validator::Validate;

/// Command-line values that take precedence over the file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub spreadsheet_id: Option<String>,
    pub api_key: Option<String>,
    pub workers: Option<usize>,
    pub start_index: Option<usize>,
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<ScanConfig> {
        Self::load_with(path, Overrides::default())
    }

    pub fn load_with<P: AsRef<Path>>(path: P, overrides: Overrides) -> Result<ScanConfig> {
        let config = Self::load_file(path.as_ref())?;
        let config = Self::apply_overrides(config, overrides);
        config.validate().map_err(Error::Validation)?;
        Ok(config)
    }

    fn load_file(path: &Path) -> Result<ScanConfig> {
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Ok(serde_json::from_str(&content)?),
            Some("yaml") | Some("yml") => Ok(serde_yaml::from_str(&content)?),
            Some("toml") => Ok(toml::from_str(&content)?),
            _ => Err(Error::Config(format!(
                "Unsupported file extension: {}",
                path.display()
            ))),
        }
    }

    fn apply_overrides(mut config: ScanConfig, overrides: Overrides) -> ScanConfig {
        if let Some(id) = overrides.spreadsheet_id {
            config.spreadsheet_id = id;
        }
        if overrides.api_key.is_some() {
            config.api_key = overrides.api_key;
        }
        if let Some(workers) = overrides.workers {
            config.workers = workers;
        }
        if let Some(start) = overrides.start_index {
            config.start_index = start;
        }
        config
    }

    /// Fails when no PageSpeed key is configured anywhere.
    pub fn require_api_key(config: &ScanConfig) -> Result<String> {
        config.resolve_api_key().ok_or_else(|| {
            Error::Config(format!(
                "PageSpeed API key required. Set {} or use --api-key",
                crate::config::API_KEY_ENV
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AuthConfig;
    use std::io::Write;

    fn write_config(suffix: &str, content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn toml_config_gets_defaults() {
        let file = write_config(
            ".toml",
            r#"
spreadsheet_id = "abc123"

[auth]
type = "service_account"
credentials = "key.json"
"#,
        );
        let config = ConfigLoader::load(file.path()).unwrap();
        assert_eq!(config.spreadsheet_id, "abc123");
        assert_eq!(config.workers, 4);
        assert_eq!(config.start_index, 0);
        assert_eq!(config.api_timeout_secs, 90);
        assert_eq!(config.progress_every, 25);
        assert_eq!(config.fallback.settle_secs, 65);
        assert_eq!(config.fallback.text_limit, 3000);
        assert!(matches!(config.auth, AuthConfig::ServiceAccount { .. }));
    }

    #[test]
    fn yaml_cli_auth_and_overrides() {
        let file = write_config(
            ".yaml",
            "spreadsheet_id: abc\nworkers: 2\nauth:\n  type: cli\n  account: me@example.com\n",
        );
        let overrides = Overrides {
            workers: Some(8),
            start_index: Some(5),
            api_key: Some("k".into()),
            ..Default::default()
        };
        let config = ConfigLoader::load_with(file.path(), overrides).unwrap();
        assert_eq!(config.workers, 8);
        assert_eq!(config.start_index, 5);
        assert_eq!(ConfigLoader::require_api_key(&config).unwrap(), "k");
        match config.auth {
            AuthConfig::Cli { account, command, .. } => {
                assert_eq!(account, "me@example.com");
                assert_eq!(command, "gog");
            }
            other => panic!("unexpected auth {:?}", other),
        }
    }

    #[test]
    fn zero_workers_fails_validation() {
        let file = write_config(
            ".json",
            r#"{"spreadsheet_id":"abc","workers":0,"auth":{"type":"service_account","credentials":"k.json"}}"#,
        );
        assert!(matches!(
            ConfigLoader::load(file.path()),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let file = write_config(".ini", "spreadsheet_id=abc");
        assert!(matches!(ConfigLoader::load(file.path()), Err(Error::Config(_))));
    }
}
