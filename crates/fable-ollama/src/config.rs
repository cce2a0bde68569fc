//! Ollama configuration

use fable_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

pub const DEFAULT_HOST: &str = "http://localhost:11434";
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Configuration for the Ollama client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OllamaConfig {
    pub host: String,
    pub timeout_secs: u64,
}

impl OllamaConfig {
    /// Create configuration with explicit values
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = timeout.as_secs().max(1);
        self
    }

    /// Create configuration from a variable lookup (`OLLAMA_HOST`, `OLLAMA_TIMEOUT_SECS`)
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup("OLLAMA_HOST").unwrap_or_else(|| DEFAULT_HOST.to_string());
        let host = if host.contains("://") {
            host
        } else {
            format!("http://{}", host)
        };
        Url::parse(&host)
            .map_err(|e| Error::Configuration(format!("invalid OLLAMA_HOST '{}': {}", host, e)))?;

        let timeout_secs = match lookup("OLLAMA_TIMEOUT_SECS") {
            Some(raw) => raw.trim().parse::<u64>().map_err(|_| {
                Error::Configuration(format!("OLLAMA_TIMEOUT_SECS must be an integer, got '{}'", raw))
            })?,
            None => DEFAULT_TIMEOUT_SECS,
        };

        Ok(Self {
            host: host.trim_end_matches('/').to_string(),
            timeout_secs,
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!("{}/api/{}", self.host, path)
    }
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self::new(DEFAULT_HOST)
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
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = OllamaConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, OllamaConfig::default());
        assert_eq!(config.endpoint("tags"), "http://localhost:11434/api/tags");
    }

    #[test]
    fn test_bare_host_gets_scheme() {
        let config = OllamaConfig::from_lookup(lookup(&[
            ("OLLAMA_HOST", "gpu-box:11434/"),
            ("OLLAMA_TIMEOUT_SECS", "30"),
        ]))
        .unwrap();
        assert_eq!(config.host, "http://gpu-box:11434");
        assert_eq!(config.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_bad_timeout() {
        let err = OllamaConfig::from_lookup(lookup(&[("OLLAMA_TIMEOUT_SECS", "soon")])).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }
}
