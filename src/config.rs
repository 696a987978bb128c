// src/config.rs

use std::{fmt, path::PathBuf};
use thiserror::Error;

/// Service-account key the warehouse client authenticates with.
pub const CREDENTIALS_FILE: &str = "creds.json";

pub const DEFAULT_SFTP_PORT: u16 = 22;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value {value:?} for {key}: expected a port number")]
    InvalidPort { key: &'static str, value: String },
}

/// Connection settings for the SFTP server holding the daily exports.
#[derive(Clone)]
pub struct SftpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

// Keep the password out of logs.
impl fmt::Debug for SftpConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SftpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Where the aggregate table ends up.
#[derive(Debug, Clone)]
pub struct WarehouseConfig {
    /// `None` is only acceptable for the local Parquet store.
    pub project: Option<String>,
    pub dataset: String,
    pub table: String,
    pub credentials_path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub sftp: SftpConfig,
    pub warehouse: WarehouseConfig,
}

impl Config {
    /// Read the job configuration from the process environment, loading a
    /// `.env` file from the working directory first when there is one.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &'static str| -> Result<String, ConfigError> {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::Missing(key))
        };

        let port = match lookup("SFTP_PORT").filter(|v| !v.trim().is_empty()) {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|_| ConfigError::InvalidPort {
                    key: "SFTP_PORT",
                    value: raw,
                })?,
            None => DEFAULT_SFTP_PORT,
        };

        Ok(Self {
            sftp: SftpConfig {
                host: required("SFTP_HOST")?,
                port,
                username: required("SFTP_USER")?,
                password: required("SFTP_PASS")?,
            },
            warehouse: WarehouseConfig {
                project: lookup("GCP_PROJECT").filter(|v| !v.trim().is_empty()),
                dataset: required("BQ_DATASET")?,
                table: required("BQ_TABLE")?,
                credentials_path: PathBuf::from(CREDENTIALS_FILE),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn full() -> HashMap<String, String> {
        env(&[
            ("SFTP_USER", "etl"),
            ("SFTP_PASS", "hunter2"),
            ("SFTP_HOST", "sftp.example.com"),
            ("GCP_PROJECT", "analytics-prod"),
            ("BQ_DATASET", "orders"),
            ("BQ_TABLE", "by_customer"),
        ])
    }

    #[test]
    fn test_defaults_port_to_22() {
        let vars = full();
        let cfg = Config::from_lookup(|k| vars.get(k).cloned()).unwrap();
        assert_eq!(cfg.sftp.port, 22);
        assert_eq!(cfg.sftp.host, "sftp.example.com");
        assert_eq!(cfg.warehouse.project.as_deref(), Some("analytics-prod"));
        assert_eq!(cfg.warehouse.credentials_path, PathBuf::from("creds.json"));
    }

    #[test]
    fn test_explicit_port() {
        let mut vars = full();
        vars.insert("SFTP_PORT".into(), "2222".into());
        let cfg = Config::from_lookup(|k| vars.get(k).cloned()).unwrap();
        assert_eq!(cfg.sftp.port, 2222);
    }

    #[test]
    fn test_bad_port_is_rejected() {
        let mut vars = full();
        vars.insert("SFTP_PORT".into(), "twenty-two".into());
        let err = Config::from_lookup(|k| vars.get(k).cloned()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPort { .. }));
    }

    #[test]
    fn test_missing_variable() {
        let mut vars = full();
        vars.remove("SFTP_PASS");
        let err = Config::from_lookup(|k| vars.get(k).cloned()).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("SFTP_PASS")));
    }

    #[test]
    fn test_project_is_optional() {
        let mut vars = full();
        vars.remove("GCP_PROJECT");
        let cfg = Config::from_lookup(|k| vars.get(k).cloned()).unwrap();
        assert!(cfg.warehouse.project.is_none());
    }

    #[test]
    fn test_debug_hides_password() {
        let vars = full();
        let cfg = Config::from_lookup(|k| vars.get(k).cloned()).unwrap();
        let printed = format!("{:?}", cfg);
        assert!(!printed.contains("hunter2"));
    }
}
