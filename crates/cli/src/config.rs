//! `custody.toml` configuration.
//!
//! Every section is optional. A section that is present replaces its
//! defaults as a whole; `[identities]` in particular is the complete
//! credential table, not an addition to the built-in one.
//!
//! Precedence, lowest first: built-in defaults, the config file, `CUSTODY_*`
//! environment variables, command-line flags.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use custody_core::RoleRegistry;
use custody_ledger::StaticIdentityResolver;

use crate::logging::LogFormat;

pub(crate) const DEFAULT_PORT: u16 = 8080;
pub(crate) const DEFAULT_STORE_PATH: &str = "custody-store.json";

pub(crate) const ENV_PORT: &str = "CUSTODY_PORT";
pub(crate) const ENV_LOG_LEVEL: &str = "CUSTODY_LOG_LEVEL";
pub(crate) const ENV_LOG_FORMAT: &str = "CUSTODY_LOG_FORMAT";
pub(crate) const ENV_STORE: &str = "CUSTODY_STORE";

#[derive(Debug, thiserror::Error)]
pub(crate) enum ConfigError {
    #[error("error reading config '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("error parsing config '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid value for {name}: {reason}")]
    Env { name: &'static str, reason: String },

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct Config {
    pub(crate) roles: RoleRegistry,
    pub(crate) identities: BTreeMap<String, String>,
    pub(crate) server: ServerConfig,
    pub(crate) store: StoreConfig,
    pub(crate) log: LogConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct ServerConfig {
    pub(crate) port: u16,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct StoreConfig {
    pub(crate) path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct LogConfig {
    pub(crate) level: String,
    pub(crate) format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        let identities = [
            ("CiplaMSP", "Cipla"),
            ("MedlifeMSP", "Medlife"),
            ("ApolloMSP", "Apollo"),
            ("CDSCOMSP", "CDSCO"),
        ]
        .into_iter()
        .map(|(c, r)| (c.to_string(), r.to_string()))
        .collect();
        Self {
            roles: RoleRegistry::default(),
            identities,
            server: ServerConfig::default(),
            store: StoreConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: DEFAULT_PORT }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_STORE_PATH),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Human,
        }
    }
}

impl Config {
    /// Load `path` if given, otherwise start from the defaults, then apply
    /// the process environment and validate.
    pub(crate) fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        config.apply_env(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub(crate) fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply `CUSTODY_*` overrides. `lookup` stands in for the environment.
    pub(crate) fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup(ENV_PORT) {
            self.server.port = port.trim().parse().map_err(|e| ConfigError::Env {
                name: ENV_PORT,
                reason: format!("'{}': {}", port, e),
            })?;
        }
        if let Some(level) = lookup(ENV_LOG_LEVEL) {
            self.log.level = level;
        }
        if let Some(format) = lookup(ENV_LOG_FORMAT) {
            self.log.format = format.parse().map_err(|reason| ConfigError::Env {
                name: ENV_LOG_FORMAT,
                reason,
            })?;
        }
        if let Some(store) = lookup(ENV_STORE) {
            self.store.path = PathBuf::from(store);
        }
        Ok(())
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.roles.manufacturer.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "roles.manufacturer must not be empty".to_string(),
            ));
        }
        if self.roles.regulator.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "roles.regulator must not be empty".to_string(),
            ));
        }
        for (credential, role) in &self.identities {
            if credential.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "identities contains an empty credential".to_string(),
                ));
            }
            if role.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "identities.{} maps to an empty role",
                    credential
                )));
            }
        }
        Ok(())
    }

    pub(crate) fn identity_resolver(&self) -> StaticIdentityResolver {
        self.identities
            .iter()
            .map(|(c, r)| (c.clone(), r.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.roles.manufacturer, "Cipla");
        assert_eq!(config.roles.regulator, "CDSCO");
        assert_eq!(config.identities.get("CDSCOMSP").map(String::as_str), Some("CDSCO"));
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn sections_override_defaults() {
        let config: Config = toml::from_str(
            r#"
            [roles]
            manufacturer = "SunPharma"

            [identities]
            "sun-admin" = "SunPharma"

            [log]
            format = "json"
            "#,
        )
        .unwrap();
        assert_eq!(config.roles.manufacturer, "SunPharma");
        assert_eq!(config.roles.regulator, "CDSCO");
        assert_eq!(config.identities.len(), 1);
        assert_eq!(config.log.format, LogFormat::Json);
        assert_eq!(config.log.level, "info");
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(toml::from_str::<Config>("[server]\nhost = \"0.0.0.0\"").is_err());
    }

    #[test]
    fn log_format_in_file_ignores_case() {
        let config = toml::from_str::<Config>("[log]\nformat = \"JSON\"\n").unwrap();
        assert_eq!(config.log.format, LogFormat::Json);
        let err = toml::from_str::<Config>("[log]\nformat = \"xml\"\n").unwrap_err();
        assert!(err.to_string().contains("unknown log format"));
    }

    #[test]
    fn misspelled_role_key_is_rejected() {
        let err =
            toml::from_str::<Config>("[roles]\nmanufacturr = \"SunPharma\"\n").unwrap_err();
        assert!(err.to_string().contains("manufacturr"));
    }

    #[test]
    fn env_overrides_file_values() {
        let mut config = Config::default();
        config
            .apply_env(|name| match name {
                ENV_PORT => Some("9090".to_string()),
                ENV_LOG_FORMAT => Some("json".to_string()),
                ENV_STORE => Some("/tmp/ledger.json".to_string()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.log.format, LogFormat::Json);
        assert_eq!(config.store.path, PathBuf::from("/tmp/ledger.json"));
    }

    #[test]
    fn bad_env_port_is_an_error() {
        let err = Config::default()
            .apply_env(|name| (name == ENV_PORT).then(|| "eighty".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains(ENV_PORT));
    }

    #[test]
    fn empty_roles_fail_validation() {
        let mut config = Config::default();
        config.roles.regulator = " ".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config
            .identities
            .insert("GhostMSP".to_string(), String::new());
        assert!(config.validate().is_err());
    }
}
