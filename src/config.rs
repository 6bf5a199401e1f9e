//! Server configuration: optional YAML file named by `CRM_CONFIG`, then
//! `CRM_*` environment overrides, then defaults.

use crate::errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_PATH_VAR: &str = "CRM_CONFIG";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// SQLite file; parent directories are created on startup.
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// Directory for the daily rolling JSON log. Logs go to stdout when unset.
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// Allowed CORS origins; empty allows any origin.
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_database_path() -> PathBuf {
    PathBuf::from("data/crm.sqlite")
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            database_path: default_database_path(),
            log_dir: None,
            cors_origins: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// Reads the file named by `CRM_CONFIG` when set and applies the process
    /// environment on top.
    pub fn load() -> AppResult<Self> {
        let mut config = match std::env::var(CONFIG_PATH_VAR) {
            Ok(path) if !path.trim().is_empty() => Self::from_file(Path::new(path.trim()))?,
            _ => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> AppResult<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("cannot read {}: {}", path.display(), err)))?;
        Self::from_yaml_str(&raw)
    }

    pub fn from_yaml_str(raw: &str) -> AppResult<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(raw)?)
    }

    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> AppResult<()> {
        if let Some(host) = lookup("CRM_HOST").filter(|value| !value.trim().is_empty()) {
            self.host = host.trim().to_string();
        }
        if let Some(port) = lookup("CRM_PORT") {
            self.port = port
                .trim()
                .parse()
                .map_err(|_| AppError::Config(format!("CRM_PORT is not a port number: {}", port)))?;
        }
        if let Some(path) = lookup("CRM_DATABASE_PATH").filter(|value| !value.trim().is_empty()) {
            self.database_path = PathBuf::from(path.trim());
        }
        if let Some(dir) = lookup("CRM_LOG_DIR").filter(|value| !value.trim().is_empty()) {
            self.log_dir = Some(PathBuf::from(dir.trim()));
        }
        Ok(())
    }

    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::ServerConfig;
    use crate::errors::AppError;
    use std::collections::HashMap;
    use std::path::PathBuf;

    #[test]
    fn defaults_fill_missing_yaml_keys() {
        let config = ServerConfig::from_yaml_str("port: 9000\ncors_origins: [\"http://localhost:5173\"]\n")
            .expect("parse");
        assert_eq!(config.port, 9000);
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.database_path, PathBuf::from("data/crm.sqlite"));
        assert_eq!(config.cors_origins.len(), 1);
        assert_eq!(config.socket_addr(), "127.0.0.1:9000");
    }

    #[test]
    fn environment_overrides_file_values() {
        let mut config = ServerConfig::from_yaml_str("host: 0.0.0.0\n").expect("parse");
        let env: HashMap<&str, &str> = [("CRM_PORT", "7001"), ("CRM_LOG_DIR", "/var/log/crm")]
            .into_iter()
            .collect();
        config
            .apply_overrides(|key| env.get(key).map(|value| value.to_string()))
            .expect("overrides");
        assert_eq!(config.socket_addr(), "0.0.0.0:7001");
        assert_eq!(config.log_dir, Some(PathBuf::from("/var/log/crm")));
    }

    #[test]
    fn bad_port_and_bad_yaml_are_config_errors() {
        let mut config = ServerConfig::default();
        let err = config
            .apply_overrides(|key| (key == "CRM_PORT").then(|| "eighty".to_string()))
            .expect_err("bad port");
        assert!(matches!(err, AppError::Config(_)));

        let err = ServerConfig::from_yaml_str("port: [1, 2]").expect_err("bad yaml");
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn reads_yaml_from_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("crm.yaml");
        std::fs::write(&path, "database_path: /tmp/crm-test.sqlite\n").expect("write config");
        let config = ServerConfig::from_file(&path).expect("load");
        assert_eq!(config.database_path, PathBuf::from("/tmp/crm-test.sqlite"));
    }
}
