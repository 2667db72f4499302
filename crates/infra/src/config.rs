//! Configuration loading and representation.
//!
//! Everything comes from the environment:
//!
//! | variable | default |
//! |---|---|
//! | `KNIGI_DATABASE_URL` | `sqlite://knigi.db` |
//! | `KNIGI_LOG_FORMAT` | `json` (`json` or `pretty`) |
//!
//! Log filtering itself is read from `RUST_LOG` by the observability crate.

use thiserror::Error;

use knigi_observability::LogFormat;

pub const DATABASE_URL_VAR: &str = "KNIGI_DATABASE_URL";
pub const LOG_FORMAT_VAR: &str = "KNIGI_LOG_FORMAT";
pub const DEFAULT_DATABASE_URL: &str = "sqlite://knigi.db";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub database_url: String,
    pub log_format: LogFormat,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            log_format: LogFormat::default(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from an arbitrary variable lookup (tests inject a map here).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(url) = lookup(DATABASE_URL_VAR) {
            if url.trim().is_empty() {
                return Err(ConfigError::Invalid {
                    var: DATABASE_URL_VAR,
                    reason: "cannot be empty".to_string(),
                });
            }
            config.database_url = url;
        }

        if let Some(format) = lookup(LOG_FORMAT_VAR) {
            config.log_format = format.parse().map_err(|e: knigi_observability::UnknownLogFormat| {
                ConfigError::Invalid {
                    var: LOG_FORMAT_VAR,
                    reason: e.to_string(),
                }
            })?;
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var| map.get(var).cloned()
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.database_url, "sqlite://knigi.db");
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn environment_overrides_defaults() {
        let config = AppConfig::from_lookup(lookup(&[
            ("KNIGI_DATABASE_URL", "sqlite::memory:"),
            ("KNIGI_LOG_FORMAT", "pretty"),
        ]))
        .unwrap();
        assert_eq!(config.database_url, "sqlite::memory:");
        assert_eq!(config.log_format, LogFormat::Pretty);
    }

    #[test]
    fn bad_log_format_names_the_variable() {
        let err = AppConfig::from_lookup(lookup(&[("KNIGI_LOG_FORMAT", "xml")])).unwrap_err();
        match err {
            ConfigError::Invalid { var, reason } => {
                assert_eq!(var, "KNIGI_LOG_FORMAT");
                assert!(reason.contains("xml"));
            }
        }
    }

    #[test]
    fn blank_database_url_is_rejected() {
        assert!(AppConfig::from_lookup(lookup(&[("KNIGI_DATABASE_URL", "  ")])).is_err());
    }
}
