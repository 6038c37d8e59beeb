//! Environment-driven client configuration.

use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "https://pet-manager-api.geia.vip";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Settings for building a `Registry`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryConfig {
    pub api_url: String,
    pub session_file: PathBuf,
    pub request_timeout: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            session_file: default_session_file(),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl RegistryConfig {
    /// Read `PET_REGISTRY_API_URL`, `PET_REGISTRY_SESSION_FILE` and
    /// `PET_REGISTRY_TIMEOUT_SECS`, falling back to defaults. An unparsable
    /// timeout falls back to the default as well.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            api_url: lookup("PET_REGISTRY_API_URL")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.api_url),
            session_file: lookup("PET_REGISTRY_SESSION_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.session_file),
            request_timeout: lookup("PET_REGISTRY_TIMEOUT_SECS")
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
        }
    }
}

fn default_session_file() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("pet-registry")
        .join("session.json")
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = RegistryConfig::from_lookup(lookup(&[]));
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert!(config.session_file.ends_with("pet-registry/session.json"));
    }

    #[test]
    fn overrides_from_environment() {
        let config = RegistryConfig::from_lookup(lookup(&[
            ("PET_REGISTRY_API_URL", "http://127.0.0.1:3000"),
            ("PET_REGISTRY_SESSION_FILE", "/tmp/s.json"),
            ("PET_REGISTRY_TIMEOUT_SECS", "5"),
        ]));
        assert_eq!(config.api_url, "http://127.0.0.1:3000");
        assert_eq!(config.session_file, PathBuf::from("/tmp/s.json"));
        assert_eq!(config.request_timeout, Duration::from_secs(5));
    }

    #[test]
    fn bad_timeout_falls_back() {
        let config = RegistryConfig::from_lookup(lookup(&[("PET_REGISTRY_TIMEOUT_SECS", "soon")]));
        assert_eq!(config.request_timeout, Duration::from_secs(30));
    }
}
