//! Application configuration
//!
//! Layers, lowest priority first:
//! 1. built-in defaults
//! 2. an optional config file (`--config` / `CONFIG_PATH`, JSON or TOML)
//! 3. `QUOTEBOOK_`-prefixed environment variables, `__` between sections,
//!    e.g. `QUOTEBOOK_SERVER__ADDRESS=0.0.0.0:8080`

use crate::error::{Error, Result};
use crate::server::ServerConfig;
use crate::storage::StoreConfig;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

pub const ENV_PREFIX: &str = "QUOTEBOOK";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: StoreConfig,
}

impl AppConfig {
    /// Resolve the configuration from file and environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            debug!(path = %path.display(), "Loading config file");
            builder = builder.add_source(File::from(path).required(true));
        }
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__"),
        );

        let config: AppConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.server.validate()?;
        self.database.validate()
    }

    /// Render as TOML, e.g. for `quotebook config`
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn write_temp(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("quotebook_{}_{}", std::process::id(), name));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.server.address, "127.0.0.1:8080");
        assert_eq!(config.database.kind, "memdb");
        assert_eq!(config.database.gc_threshold, 0.1);
        assert_eq!(config.database.gc_interval_ms, 500);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_json_file() -> Result<()> {
        let path = write_temp(
            "config.json",
            r#"{
                "server": {"address": "0.0.0.0:9000", "timeout_secs": 5},
                "database": {"type": "memdb", "gc_threshold": 0.25}
            }"#,
        );

        let config = AppConfig::load(Some(&path))?;
        assert_eq!(config.server.address, "0.0.0.0:9000");
        assert_eq!(config.server.timeout_secs, 5);
        assert!(config.server.enable_cors);
        assert_eq!(config.database.gc_threshold, 0.25);
        assert_eq!(config.database.gc_interval_ms, 500);

        std::fs::remove_file(path).ok();
        Ok(())
    }

    #[test]
    fn test_load_rejects_unknown_db() {
        let path = write_temp("bad_db.toml", "[database]\ntype = \"redis\"\n");

        let err = AppConfig::load(Some(&path)).unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let path = std::env::temp_dir().join("quotebook_does_not_exist.toml");
        assert!(AppConfig::load(Some(&path)).is_err());
    }

    #[test]
    fn test_toml_round_trip() -> Result<()> {
        let rendered = AppConfig::default().to_toml()?;
        assert!(rendered.contains("[database]"));
        assert!(rendered.contains("type = \"memdb\""));

        let path = write_temp("rendered.toml", &rendered);
        assert_eq!(AppConfig::load(Some(&path))?, AppConfig::default());
        std::fs::remove_file(path).ok();
        Ok(())
    }
}
