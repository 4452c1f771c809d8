use api_client::{ClientConfig, DEFAULT_BUCKET, DEFAULT_TABLE};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing credentials: {0}")]
    MissingCredentials(String),
    #[error("Load Error: {0}")]
    Load(String),
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct AppConfig {
    pub log_level: String,
    pub backend_url: Option<String>,
    pub api_key: Option<String>,
    pub bucket: String,
    pub table: String,
    pub data_dir: PathBuf,
}

#[derive(Default)]
pub struct AppConfigOverrides {
    pub log_level: Option<String>,
    pub backend_url: Option<String>,
    pub api_key: Option<String>,
}

fn base_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".mediagallery")
}

pub fn default_path() -> PathBuf {
    base_dir().join("config")
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl AppConfig {
    /// Read the TOML file at `path` (or the default location) and layer
    /// `GALLERY_*` environment variables over it. A missing file is fine.
    pub fn load_from(path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.unwrap_or_else(default_path);
        let cfg = config::Config::builder()
            .add_source(
                config::File::from(path)
                    .format(config::FileFormat::Toml)
                    .required(false),
            )
            .add_source(config::Environment::with_prefix("GALLERY"))
            .build()
            .map_err(|e| ConfigError::Load(e.to_string()))?;

        let log_level = cfg
            .get_string("log_level")
            .unwrap_or_else(|_| "info".to_string());
        let backend_url = non_blank(cfg.get_string("backend_url").ok());
        let api_key = non_blank(cfg.get_string("api_key").ok());
        let bucket = cfg
            .get_string("bucket")
            .unwrap_or_else(|_| DEFAULT_BUCKET.to_string());
        let table = cfg
            .get_string("table")
            .unwrap_or_else(|_| DEFAULT_TABLE.to_string());
        let data_dir = cfg
            .get_string("data_dir")
            .map(PathBuf::from)
            .unwrap_or_else(|_| base_dir());

        Ok(Self {
            log_level,
            backend_url,
            api_key,
            bucket,
            table,
            data_dir,
        })
    }

    pub fn apply_overrides(mut self, ov: &AppConfigOverrides) -> Self {
        if let Some(l) = &ov.log_level {
            self.log_level = l.clone();
        }
        if let Some(u) = non_blank(ov.backend_url.clone()) {
            self.backend_url = Some(u);
        }
        if let Some(k) = non_blank(ov.api_key.clone()) {
            self.api_key = Some(k);
        }
        self
    }

    /// Connection settings for the backend. Both URL and key are required.
    pub fn client_config(&self) -> Result<ClientConfig, ConfigError> {
        let mut missing = Vec::new();
        if self.backend_url.is_none() {
            missing.push("backend_url (GALLERY_BACKEND_URL)");
        }
        if self.api_key.is_none() {
            missing.push("api_key (GALLERY_API_KEY)");
        }
        match (&self.backend_url, &self.api_key) {
            (Some(url), Some(key)) => {
                let mut client = ClientConfig::new(url.clone(), key.clone());
                client.bucket = self.bucket.clone();
                client.table = self.table.clone();
                Ok(client)
            }
            _ => Err(ConfigError::MissingCredentials(missing.join(", "))),
        }
    }

    pub fn save_to(&self, path: Option<PathBuf>) -> std::io::Result<()> {
        let path = path.unwrap_or_else(default_path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let data = toml::to_string(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        std::fs::write(path, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::tempdir;

    fn clear_env() {
        for key in [
            "GALLERY_BACKEND_URL",
            "GALLERY_API_KEY",
            "GALLERY_LOG_LEVEL",
            "GALLERY_BUCKET",
        ] {
            std::env::remove_var(key);
        }
    }

    #[test]
    #[serial]
    fn test_defaults_without_file() {
        clear_env();
        let dir = tempdir().unwrap();
        let cfg = AppConfig::load_from(Some(dir.path().join("missing"))).unwrap();
        assert_eq!(cfg.log_level, "info");
        assert_eq!(cfg.bucket, "media");
        assert_eq!(cfg.table, "media_items");
        assert!(cfg.backend_url.is_none());
        match cfg.client_config() {
            Err(ConfigError::MissingCredentials(msg)) => {
                assert!(msg.contains("backend_url"));
                assert!(msg.contains("api_key"));
            }
            other => panic!("expected missing credentials, got {:?}", other),
        }
    }

    #[test]
    #[serial]
    fn test_file_then_env_then_overrides() {
        clear_env();
        let dir = tempdir().unwrap();
        let path = dir.path().join("config");
        std::fs::write(
            &path,
            "backend_url = \"https://file.example\"\napi_key = \"file-key\"\nbucket = \"uploads\"\n",
        )
        .unwrap();

        std::env::set_var("GALLERY_API_KEY", "env-key");
        let cfg = AppConfig::load_from(Some(path)).unwrap();
        clear_env();
        assert_eq!(cfg.backend_url.as_deref(), Some("https://file.example"));
        assert_eq!(cfg.api_key.as_deref(), Some("env-key"));

        let cfg = cfg.apply_overrides(&AppConfigOverrides {
            log_level: Some("debug".into()),
            backend_url: Some("https://flag.example/".into()),
            api_key: None,
        });
        let client = cfg.client_config().unwrap();
        assert_eq!(client.base_url, "https://flag.example");
        assert_eq!(client.api_key, "env-key");
        assert_eq!(client.bucket, "uploads");
        assert_eq!(cfg.log_level, "debug");
    }

    #[test]
    #[serial]
    fn test_save_round_trip() {
        clear_env();
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config");
        let cfg = AppConfig::load_from(Some(path.clone()))
            .unwrap()
            .apply_overrides(&AppConfigOverrides {
                backend_url: Some("https://abc.example".into()),
                api_key: Some("key".into()),
                ..Default::default()
            });
        cfg.save_to(Some(path.clone())).unwrap();

        let loaded = AppConfig::load_from(Some(path)).unwrap();
        assert_eq!(loaded, cfg);
    }
}
