// ABOUTME: Configuration parsing from TOML file with environment variable overrides
// ABOUTME: Validates required fields and provides sensible defaults for optional ones
use boti_core::{DispatchConfig, PeerId, SessionConfig};
use boti_providers::{CiSettings, RepoSettings, SocialSettings};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("{field} is required (set in config.toml or {env} env var)")]
    Missing {
        field: &'static str,
        env: &'static str,
    },

    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub bot: BotConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub console: ConsoleConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct BotConfig {
    #[serde(default)]
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default = "default_resource")]
    pub resource: String,
    #[serde(default)]
    pub allowed: Vec<String>,
    #[serde(default)]
    pub debug: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stranger_reply: Option<String>,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            username: String::new(),
            password: None,
            resource: default_resource(),
            allowed: Vec::new(),
            debug: false,
            stranger_reply: None,
        }
    }
}

impl std::fmt::Debug for BotConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BotConfig")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("resource", &self.resource)
            .field("allowed", &self.allowed)
            .field("debug", &self.debug)
            .field("stranger_reply", &self.stranger_reply)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsoleConfig {
    /// Identity used for lines typed on stdin
    #[serde(default = "default_console_peer")]
    pub peer: String,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            peer: default_console_peer(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Also write daily-rotated log files here when set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directory: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub ci: CiSettings,
    #[serde(default)]
    pub repo: RepoSettings,
    #[serde(default)]
    pub social: SocialSettings,
}

fn default_resource() -> String {
    "boti".to_string()
}

fn default_console_peer() -> String {
    "console@localhost".to_string()
}

fn env_flag(name: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(ConfigError::Invalid {
            field: name,
            reason: format!("expected a boolean, got: {}", other),
        }),
    }
}

fn env_count(name: &'static str, value: &str) -> Result<usize, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        field: name,
        reason: format!("expected a positive number, got: {}", value),
    })
}

impl Config {
    /// Load from `BOTI_CONFIG_PATH` or `config.toml` with environment overrides
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("BOTI_CONFIG_PATH").ok().map(PathBuf::from);
        Self::load_from(path.as_deref())
    }

    /// Load from `path`, or from `config.toml` if it exists when `path` is
    /// `None`. Environment overrides are applied before validation.
    pub fn load_from(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::read(path)?,
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
                Self::read(Path::new(DEFAULT_CONFIG_PATH))?
            }
            None => Config::default(),
        };

        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    fn read(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Ok(val) = std::env::var("BOTI_USERNAME") {
            self.bot.username = val;
        }
        if let Ok(val) = std::env::var("BOTI_PASSWORD") {
            self.bot.password = Some(val);
        }
        if let Ok(val) = std::env::var("BOTI_RESOURCE") {
            self.bot.resource = val;
        }
        if let Ok(val) = std::env::var("BOTI_ALLOWED") {
            self.bot.allowed = val
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Ok(val) = std::env::var("BOTI_DEBUG") {
            self.bot.debug = env_flag("BOTI_DEBUG", &val)?;
        }
        if let Ok(val) = std::env::var("BOTI_MAX_CONCURRENT") {
            self.dispatch.max_concurrent = env_count("BOTI_MAX_CONCURRENT", &val)?;
        }
        if let Ok(val) = std::env::var("BOTI_QUEUE_CAPACITY") {
            self.dispatch.queue_capacity = env_count("BOTI_QUEUE_CAPACITY", &val)?;
        }
        if let Ok(val) = std::env::var("BOTI_CONSOLE_PEER") {
            self.console.peer = val;
        }
        Ok(())
    }

    /// Check required fields. Blank allow-list entries are dropped first.
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        if self.bot.username.trim().is_empty() {
            return Err(ConfigError::Missing {
                field: "bot.username",
                env: "BOTI_USERNAME",
            });
        }
        if !self.bot.username.contains('@') {
            return Err(ConfigError::Invalid {
                field: "bot.username",
                reason: format!("expected user@domain, got: {}", self.bot.username),
            });
        }
        if self.bot.password.as_deref().map_or(true, |p| p.is_empty()) {
            return Err(ConfigError::Missing {
                field: "bot.password",
                env: "BOTI_PASSWORD",
            });
        }

        self.bot.allowed.retain(|s| !s.trim().is_empty());
        if self.bot.allowed.is_empty() {
            return Err(ConfigError::Invalid {
                field: "bot.allowed",
                reason: "must contain at least one peer".to_string(),
            });
        }
        for peer in &self.bot.allowed {
            if !PeerId::new(peer.trim()).is_bare() {
                return Err(ConfigError::Invalid {
                    field: "bot.allowed",
                    reason: format!("expected a bare identity without /resource, got: {}", peer),
                });
            }
        }

        if self.dispatch.max_concurrent == 0 {
            return Err(ConfigError::Invalid {
                field: "dispatch.max_concurrent",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.dispatch.queue_capacity == 0 {
            return Err(ConfigError::Invalid {
                field: "dispatch.queue_capacity",
                reason: "must be at least 1".to_string(),
            });
        }

        Ok(())
    }

    /// Full identity the bot signs in with, `username/resource`
    pub fn identity(&self) -> PeerId {
        PeerId::new(format!("{}/{}", self.bot.username, self.bot.resource))
    }

    pub fn session_config(&self) -> SessionConfig {
        let config = SessionConfig::new(self.bot.allowed.iter().map(|s| s.trim().to_string()))
            .with_dispatch(self.dispatch.clone());
        match &self.bot.stranger_reply {
            Some(reply) => config.with_stranger_reply(reply.clone()),
            None => config,
        }
    }

    /// Default tracing filter when `RUST_LOG` is not set
    pub fn log_filter(&self) -> &'static str {
        if self.bot.debug {
            "debug"
        } else {
            "info"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_is_redacted_in_debug() {
        let bot = BotConfig {
            username: "boti@example.com".to_string(),
            password: Some("hunter2".to_string()),
            ..Default::default()
        };
        let debug = format!("{:?}", bot);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_env_flag_values() {
        assert!(env_flag("X", "true").unwrap());
        assert!(env_flag("X", "1").unwrap());
        assert!(!env_flag("X", "no").unwrap());
        assert!(env_flag("X", "maybe").is_err());
    }

    #[test]
    fn test_identity_includes_resource() {
        let mut config = Config::default();
        config.bot.username = "boti@example.com".to_string();
        assert_eq!(config.identity().as_str(), "boti@example.com/boti");
    }
}
