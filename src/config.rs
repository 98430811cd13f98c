//! Client configuration.
//!
//! The defaults live in `config/client.toml` and are embedded at compile
//! time; a browser has no process environment, so overrides are read from
//! the build environment with `option_env!`.

use std::time::Duration;

use serde::Deserialize;
use url::Url;

use crate::error::MechaLungError;

const DEFAULT_CONFIG: &str = include_str!("../config/client.toml");

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ClientConfig {
    /// Root of the remote API, e.g. `http://localhost:8000`.
    pub api_base_url: Url,
    pub request_timeout_secs: u64,
    /// `tracing` filter directive, e.g. `info` or `mecha_lung=debug`.
    pub log_level: String,
    /// localStorage key holding the bearer token.
    pub session_key: String,
}

/// Build-time overrides, one per config field that may vary by deployment.
#[derive(Debug, Clone, Copy, Default)]
pub struct Overrides<'a> {
    pub api_base_url: Option<&'a str>,
    pub request_timeout_secs: Option<&'a str>,
    pub log_level: Option<&'a str>,
}

impl Overrides<'static> {
    pub fn from_build_env() -> Self {
        Self {
            api_base_url: option_env!("MECHA_LUNG_API_URL"),
            request_timeout_secs: option_env!("MECHA_LUNG_TIMEOUT_SECS"),
            log_level: option_env!("MECHA_LUNG_LOG"),
        }
    }
}

impl ClientConfig {
    /// The embedded defaults, unvalidated.
    ///
    /// # Panics
    /// Panics if the embedded TOML is invalid (a build-time bug).
    pub fn embedded() -> Self {
        toml::from_str(DEFAULT_CONFIG).expect("embedded client.toml must be valid TOML")
    }

    /// Embedded defaults with build-time overrides applied and validated.
    pub fn load() -> Result<Self, MechaLungError> {
        Self::embedded().with_overrides(Overrides::from_build_env())
    }

    pub fn from_toml(text: &str) -> Result<Self, MechaLungError> {
        let config: Self = toml::from_str(text)
            .map_err(|e| MechaLungError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_overrides(mut self, overrides: Overrides<'_>) -> Result<Self, MechaLungError> {
        if let Some(raw) = overrides.api_base_url.filter(|s| !s.is_empty()) {
            self.api_base_url = Url::parse(raw).map_err(|e| {
                MechaLungError::Config(format!("Invalid API URL '{}': {}", raw, e))
            })?;
        }
        if let Some(raw) = overrides.request_timeout_secs.filter(|s| !s.is_empty()) {
            self.request_timeout_secs = raw.trim().parse().map_err(|e| {
                MechaLungError::Config(format!("Invalid request timeout '{}': {}", raw, e))
            })?;
        }
        if let Some(level) = overrides.log_level.filter(|s| !s.is_empty()) {
            self.log_level = level.to_string();
        }
        self.validate()?;
        Ok(self)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn validate(&self) -> Result<(), MechaLungError> {
        match self.api_base_url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(MechaLungError::Config(format!(
                    "API URL must use http or https, got '{}'",
                    other
                )))
            }
        }
        if self.api_base_url.query().is_some() || self.api_base_url.fragment().is_some() {
            return Err(MechaLungError::Config(
                "API URL must not carry a query or fragment".to_string(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(MechaLungError::Config(
                "request_timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.session_key.trim().is_empty() {
            return Err(MechaLungError::Config("session_key must not be empty".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_defaults_load() {
        let config = ClientConfig::embedded();
        assert!(config.validate().is_ok());
        assert_eq!(config.api_base_url.as_str(), "http://localhost:8000/");
        assert_eq!(config.request_timeout(), Duration::from_secs(15));
        assert_eq!(config.session_key, "token");
    }

    #[test]
    fn test_overrides_apply() {
        let config = ClientConfig::embedded()
            .with_overrides(Overrides {
                api_base_url: Some("https://api.example.org/lung"),
                request_timeout_secs: Some(" 30 "),
                log_level: Some("mecha_lung=debug"),
            })
            .unwrap();
        assert_eq!(config.api_base_url.host_str(), Some("api.example.org"));
        assert_eq!(config.request_timeout_secs, 30);
        assert_eq!(config.log_level, "mecha_lung=debug");
    }

    #[test]
    fn test_empty_overrides_are_ignored() {
        let config = ClientConfig::embedded()
            .with_overrides(Overrides {
                api_base_url: Some(""),
                ..Overrides::default()
            })
            .unwrap();
        assert_eq!(config, ClientConfig::embedded());
    }

    #[test]
    fn test_bad_timeout_override_is_rejected() {
        let err = ClientConfig::embedded()
            .with_overrides(Overrides {
                request_timeout_secs: Some("soon"),
                ..Overrides::default()
            })
            .unwrap_err();
        assert!(matches!(err, MechaLungError::Config(_)));
    }

    #[test]
    fn test_from_toml_validates() {
        let text = r#"
            api_base_url = "ftp://files.example.org"
            request_timeout_secs = 10
            log_level = "warn"
            session_key = "token"
        "#;
        assert!(ClientConfig::from_toml(text).is_err());

        let zero = text
            .replace("ftp://files.example.org", "http://localhost:9000")
            .replace("= 10", "= 0");
        assert!(ClientConfig::from_toml(&zero).is_err());
    }
}
