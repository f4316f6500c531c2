//! Environment-driven configuration.
//!
//! | Variable | Default |
//! |---|---|
//! | `OPENAI_API_KEY` | none (completion tier disabled) |
//! | `OPENAI_BASE_URL` | `https://api.openai.com/v1` |
//! | `COMPLETION_MODEL` | `gpt-3.5-turbo` |
//! | `OPENSERV_API_KEY` | none (delegated tier disabled) |
//! | `AGENT_SYSTEM_PROMPT` | Smart Money Tracker prompt |
//! | `TIER_TIMEOUT_SECS` | `30` |
//! | `PORT` | `5000` |
//! | `BIND_HOST` | `0.0.0.0` |
//!
//! Empty values count as unset.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::capabilities::CapabilityRegistry;
use crate::delegation::{CredentialedDelegate, DelegatedExecutor};
use crate::dispatch::{DispatchEngine, DEFAULT_SYSTEM_PROMPT, DEFAULT_TIER_TIMEOUT};
use crate::llms::providers::openai::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use crate::llms::{CompletionBackend, OpenAICompletion};

/// Channel name of the credentialed delegation tier.
pub const DELEGATION_CHANNEL: &str = "openserv";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {name}: '{value}' ({reason})")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Runtime configuration for the dispatch service.
#[derive(Clone)]
pub struct DispatchConfig {
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub completion_model: String,
    pub openserv_api_key: Option<String>,
    pub system_prompt: String,
    pub tier_timeout: Duration,
    pub port: u16,
    pub bind_host: String,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            openai_base_url: DEFAULT_BASE_URL.into(),
            completion_model: DEFAULT_MODEL.into(),
            openserv_api_key: None,
            system_prompt: DEFAULT_SYSTEM_PROMPT.into(),
            tier_timeout: DEFAULT_TIER_TIMEOUT,
            port: 5000,
            bind_host: "0.0.0.0".into(),
        }
    }
}

impl DispatchConfig {
    /// Load from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let tier_timeout = match get("TIER_TIMEOUT_SECS") {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                Ok(_) => {
                    return Err(ConfigError::Invalid {
                        name: "TIER_TIMEOUT_SECS",
                        value: raw,
                        reason: "must be greater than zero".into(),
                    })
                }
                Err(e) => {
                    return Err(ConfigError::Invalid {
                        name: "TIER_TIMEOUT_SECS",
                        value: raw,
                        reason: e.to_string(),
                    })
                }
            },
            None => defaults.tier_timeout,
        };

        let port = match get("PORT") {
            Some(raw) => raw.trim().parse::<u16>().map_err(|e| ConfigError::Invalid {
                name: "PORT",
                value: raw.clone(),
                reason: e.to_string(),
            })?,
            None => defaults.port,
        };

        Ok(Self {
            openai_api_key: get("OPENAI_API_KEY"),
            openai_base_url: get("OPENAI_BASE_URL").unwrap_or(defaults.openai_base_url),
            completion_model: get("COMPLETION_MODEL").unwrap_or(defaults.completion_model),
            openserv_api_key: get("OPENSERV_API_KEY"),
            system_prompt: get("AGENT_SYSTEM_PROMPT").unwrap_or(defaults.system_prompt),
            tier_timeout,
            port,
            bind_host: get("BIND_HOST").unwrap_or(defaults.bind_host),
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind_host, self.port)
    }

    /// The delegated tier, or `None` when no credential is set.
    pub fn delegate(&self) -> Option<Arc<dyn DelegatedExecutor>> {
        match CredentialedDelegate::from_credential(DELEGATION_CHANNEL, self.openserv_api_key.clone()) {
            Some(d) => Some(Arc::new(d)),
            None => {
                tracing::warn!("OPENSERV_API_KEY not set; delegated execution disabled");
                None
            }
        }
    }

    /// The completion backend, or `None` when no credential is set.
    pub fn completion_backend(&self) -> Option<Arc<dyn CompletionBackend>> {
        let backend = OpenAICompletion::new(
            self.completion_model.clone(),
            self.openai_api_key.clone(),
            Some(self.openai_base_url.clone()),
        )
        .with_timeout(self.tier_timeout);
        if !backend.is_configured() {
            tracing::info!("OPENAI_API_KEY not set; unmatched queries get the static answer");
            return None;
        }
        Some(Arc::new(backend))
    }

    /// Assemble the engine for `registry` from this configuration.
    pub fn build_engine(&self, registry: Arc<CapabilityRegistry>) -> DispatchEngine {
        DispatchEngine::new(registry)
            .with_delegate(self.delegate())
            .with_completion(self.completion_backend())
            .with_system_prompt(self.system_prompt.clone())
            .with_tier_timeout(self.tier_timeout)
    }
}

impl std::fmt::Debug for DispatchConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchConfig")
            .field("openai_api_key", &self.openai_api_key.as_ref().map(|_| "<set>"))
            .field("openai_base_url", &self.openai_base_url)
            .field("completion_model", &self.completion_model)
            .field("openserv_api_key", &self.openserv_api_key.as_ref().map(|_| "<set>"))
            .field("tier_timeout", &self.tier_timeout)
            .field("port", &self.port)
            .field("bind_host", &self.bind_host)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<DispatchConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        DispatchConfig::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let cfg = load(&[]).unwrap();
        assert_eq!(cfg.openai_api_key, None);
        assert_eq!(cfg.openai_base_url, "https://api.openai.com/v1");
        assert_eq!(cfg.completion_model, "gpt-3.5-turbo");
        assert_eq!(cfg.tier_timeout, Duration::from_secs(30));
        assert_eq!(cfg.bind_addr(), "0.0.0.0:5000");
        assert!(cfg.delegate().is_none());
        assert!(cfg.completion_backend().is_none());
    }

    #[test]
    fn test_empty_values_are_absent() {
        let cfg = load(&[("OPENAI_API_KEY", ""), ("OPENSERV_API_KEY", "   "), ("PORT", "")]).unwrap();
        assert_eq!(cfg.openai_api_key, None);
        assert_eq!(cfg.openserv_api_key, None);
        assert_eq!(cfg.port, 5000);
    }

    #[test]
    fn test_overrides() {
        let cfg = load(&[
            ("OPENAI_API_KEY", "sk-1"),
            ("OPENSERV_API_KEY", "os-1"),
            ("COMPLETION_MODEL", "gpt-4o-mini"),
            ("TIER_TIMEOUT_SECS", "5"),
            ("PORT", "8080"),
            ("BIND_HOST", "127.0.0.1"),
        ])
        .unwrap();
        assert_eq!(cfg.completion_model, "gpt-4o-mini");
        assert_eq!(cfg.tier_timeout, Duration::from_secs(5));
        assert_eq!(cfg.bind_addr(), "127.0.0.1:8080");
        assert!(cfg.delegate().is_some());
        assert_eq!(cfg.completion_backend().unwrap().model(), "gpt-4o-mini");
    }

    #[test]
    fn test_invalid_numbers() {
        assert!(matches!(
            load(&[("PORT", "eighty")]),
            Err(ConfigError::Invalid { name: "PORT", .. })
        ));
        assert!(matches!(
            load(&[("TIER_TIMEOUT_SECS", "0")]),
            Err(ConfigError::Invalid { name: "TIER_TIMEOUT_SECS", .. })
        ));
    }

    #[test]
    fn test_debug_hides_keys() {
        let cfg = load(&[("OPENAI_API_KEY", "sk-very-secret")]).unwrap();
        assert!(!format!("{:?}", cfg).contains("very-secret"));
    }
}
