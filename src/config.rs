//! Application configuration.
//!
//! Resolution order (highest priority first):
//! 1. Environment variables (`MATURITY_*`)
//! 2. TOML file passed to [`AppConfig::load`]
//! 3. Compiled defaults
//!
//! Provider credentials stay in the gateway's own variables
//! (`OPENROUTER_API_KEY`, `OPENROUTER_BASE_URL`, `OPENROUTER_TIMEOUT_SECONDS`).

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::gateway::GatewayConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {message}")]
    Parse { path: String, message: String },
    #[error("invalid value for {field}: {message}")]
    Invalid { field: String, message: String },
}

/// Which interviewer scores and phrases the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AiProvider {
    OpenRouter,
    Fallback,
}

impl AiProvider {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OpenRouter => "openrouter",
            Self::Fallback => "fallback",
        }
    }
}

impl fmt::Display for AiProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AiProvider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openrouter" => Ok(Self::OpenRouter),
            "fallback" => Ok(Self::Fallback),
            other => Err(ConfigError::Invalid {
                field: "ai_provider".to_string(),
                message: format!("unknown provider '{other}' (expected openrouter or fallback)"),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// SQLite ledger file.
    pub store_path: PathBuf,
    /// Catalog JSON document; the built-in catalog when unset.
    pub catalog_path: Option<PathBuf>,
    pub ai_provider: AiProvider,
    /// OpenRouter model id.
    pub model: String,
    pub temperature: f32,
    /// Output cap for evaluate turns. Opening questions use a smaller cap.
    pub max_tokens: u32,
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from(".maturity_ledger.sqlite"),
            catalog_path: None,
            ai_provider: AiProvider::OpenRouter,
            model: "openai/gpt-4o-mini".to_string(),
            temperature: 0.7,
            max_tokens: 500,
            max_retries: 2,
            retry_base_delay_ms: 1_000,
        }
    }
}

impl AppConfig {
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                    path: path.display().to_string(),
                    source,
                })?;
                Self::from_toml_named(&raw, &path.display().to_string())?
            }
            None => Self::default(),
        };
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        Self::from_toml_named(raw, "<string>")
    }

    fn from_toml_named(raw: &str, name: &str) -> Result<Self, ConfigError> {
        toml::from_str(raw).map_err(|e| ConfigError::Parse {
            path: name.to_string(),
            message: e.to_string(),
        })
    }

    /// Apply `MATURITY_*` overrides read through `lookup`.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("MATURITY_STORE_PATH") {
            self.store_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("MATURITY_CATALOG_PATH") {
            self.catalog_path = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("MATURITY_AI_PROVIDER") {
            self.ai_provider = v.parse()?;
        }
        if let Some(v) = lookup("MATURITY_MODEL") {
            self.model = v;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::Invalid {
                field: "temperature".to_string(),
                message: "must be between 0.0 and 2.0".to_string(),
            });
        }
        if self.max_tokens == 0 {
            return Err(ConfigError::Invalid {
                field: "max_tokens".to_string(),
                message: "must be greater than 0".to_string(),
            });
        }
        if self.ai_provider == AiProvider::OpenRouter && self.model.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "model".to_string(),
                message: "required for the openrouter provider".to_string(),
            });
        }
        Ok(())
    }

    pub fn gateway_config(&self) -> GatewayConfig {
        GatewayConfig {
            max_retries: self.max_retries,
            retry_base_delay: Duration::from_millis(self.retry_base_delay_ms),
            ..GatewayConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = AppConfig::from_toml(
            r#"
ai_provider = "fallback"
store_path = "/tmp/ledger.sqlite"
"#,
        )
        .unwrap();
        assert_eq!(config.ai_provider, AiProvider::Fallback);
        assert_eq!(config.store_path, PathBuf::from("/tmp/ledger.sqlite"));
        assert_eq!(config.model, "openai/gpt-4o-mini");
        assert_eq!(config.max_tokens, 500);
    }

    #[test]
    fn unknown_provider_in_toml_is_parse_error() {
        let err = AppConfig::from_toml("ai_provider = \"gemini\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn env_overrides_win() {
        let env: HashMap<&str, &str> = [
            ("MATURITY_AI_PROVIDER", "Fallback"),
            ("MATURITY_MODEL", "google/gemini-2.0-flash-001"),
            ("MATURITY_CATALOG_PATH", "catalog.json"),
        ]
        .into_iter()
        .collect();
        let mut config = AppConfig::default();
        config
            .apply_env_overrides(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.ai_provider, AiProvider::Fallback);
        assert_eq!(config.model, "google/gemini-2.0-flash-001");
        assert_eq!(config.catalog_path, Some(PathBuf::from("catalog.json")));
    }

    #[test]
    fn env_rejects_unknown_provider() {
        let mut config = AppConfig::default();
        let err = config
            .apply_env_overrides(|k| (k == "MATURITY_AI_PROVIDER").then(|| "mystery".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn validate_rejects_hot_temperature() {
        let config = AppConfig {
            temperature: 3.0,
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
