use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

use crate::capabilities::ValidatedUrl;
use crate::{AppError, ErrorKind};

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_RESPONSE_LANGUAGE: &str = "Vietnamese";
pub const DEFAULT_TIMEOUT_MS: u64 = 60_000;
pub const MIN_TIMEOUT_MS: u64 = 1_000;
pub const MAX_TIMEOUT_MS: u64 = 300_000;

pub const API_KEY_VAR: &str = "API_KEY";
pub const MODEL_VAR: &str = "GEMINI_MODEL";
pub const ENDPOINT_VAR: &str = "GEMINI_ENDPOINT";
pub const LANGUAGE_VAR: &str = "FRUIT_RESPONSE_LANGUAGE";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("API_KEY is not set")]
    MissingApiKey,

    #[error("invalid endpoint '{endpoint}': {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("invalid model name '{0}'")]
    InvalidModel(String),
}

impl From<ConfigError> for AppError {
    fn from(e: ConfigError) -> Self {
        AppError::new(
            ErrorKind::Configuration,
            "The analysis service is not configured.",
        )
        .with_internal(e.to_string())
    }
}

/// Settings as the shell sends them in `Event::Started`. Nothing here has
/// been checked; [`ClientConfig::try_from`] is the only way in.
#[derive(Clone, Debug, Deserialize)]
pub struct ClientSettings {
    pub api_key: SecretString,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub response_language: Option<String>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl ClientSettings {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::new(api_key.into()),
            model: None,
            endpoint: None,
            response_language: None,
            timeout_ms: None,
        }
    }
}

impl TryFrom<ClientSettings> for ClientConfig {
    type Error = ConfigError;

    fn try_from(settings: ClientSettings) -> Result<Self, Self::Error> {
        let mut config = Self::new(settings.api_key.expose_secret().as_str())?;

        if let Some(model) = settings.model {
            config = config.with_model(model)?;
        }
        if let Some(endpoint) = settings.endpoint {
            config = config.with_endpoint(endpoint)?;
        }
        if let Some(language) = settings.response_language.filter(|l| !l.trim().is_empty()) {
            config = config.with_response_language(language);
        }
        if let Some(timeout_ms) = settings.timeout_ms {
            config = config.with_timeout_ms(timeout_ms);
        }

        Ok(config)
    }
}

/// Everything the analysis client needs to talk to the model API.
///
/// Every constructor validates; `Debug` never prints the key.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    api_key: SecretString,
    model: String,
    endpoint: String,
    response_language: String,
    timeout_ms: u64,
}

impl ClientConfig {
    pub fn new(api_key: impl Into<String>) -> Result<Self, ConfigError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(ConfigError::MissingApiKey);
        }

        Ok(Self {
            api_key: SecretString::new(api_key),
            model: DEFAULT_MODEL.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            response_language: DEFAULT_RESPONSE_LANGUAGE.to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
        })
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads settings through `lookup`; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let settings = ClientSettings {
            model: get(MODEL_VAR),
            endpoint: get(ENDPOINT_VAR),
            response_language: get(LANGUAGE_VAR),
            ..ClientSettings::new(get(API_KEY_VAR).ok_or(ConfigError::MissingApiKey)?)
        };
        Self::try_from(settings)
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Result<Self, ConfigError> {
        let model = model.into().trim().to_string();
        let valid = !model.is_empty()
            && model
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_'));
        if !valid {
            return Err(ConfigError::InvalidModel(model));
        }
        self.model = model;
        Ok(self)
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Result<Self, ConfigError> {
        let endpoint = endpoint.into();
        let url = ValidatedUrl::new(endpoint.trim()).map_err(|e| ConfigError::InvalidEndpoint {
            endpoint: endpoint.clone(),
            reason: e.to_string(),
        })?;
        self.endpoint = url.as_str().trim_end_matches('/').to_string();
        Ok(self)
    }

    pub fn with_response_language(mut self, language: impl Into<String>) -> Self {
        self.response_language = language.into().trim().to_string();
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms.clamp(MIN_TIMEOUT_MS, MAX_TIMEOUT_MS);
        self
    }

    pub fn api_key(&self) -> &str {
        self.api_key.expose_secret()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn response_language(&self) -> &str {
        &self.response_language
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.clamp(MIN_TIMEOUT_MS, MAX_TIMEOUT_MS))
    }

    pub fn generate_content_url(&self) -> String {
        format!("{}/models/{}:generateContent", self.endpoint, self.model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn missing_key_is_fatal() {
        let err = ClientConfig::from_lookup(lookup(&[])).unwrap_err();
        assert_eq!(err, ConfigError::MissingApiKey);

        let app: AppError = err.into();
        assert_eq!(app.kind, ErrorKind::Configuration);
        assert_eq!(app.severity, crate::ErrorSeverity::Fatal);
        assert!(!app.is_retryable());
    }

    #[test]
    fn blank_key_counts_as_missing() {
        let err = ClientConfig::from_lookup(lookup(&[(API_KEY_VAR, "   ")])).unwrap_err();
        assert_eq!(err, ConfigError::MissingApiKey);
    }

    #[test]
    fn defaults_apply() {
        let config = ClientConfig::from_lookup(lookup(&[(API_KEY_VAR, "k")])).unwrap();
        assert_eq!(config.model(), DEFAULT_MODEL);
        assert_eq!(config.endpoint(), DEFAULT_ENDPOINT);
        assert_eq!(config.response_language(), "Vietnamese");
        assert_eq!(config.timeout(), Duration::from_secs(60));
        assert_eq!(
            config.generate_content_url(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:generateContent"
        );
    }

    #[test]
    fn overrides_are_read() {
        let config = ClientConfig::from_lookup(lookup(&[
            (API_KEY_VAR, "k"),
            (MODEL_VAR, "gemini-2.0-pro"),
            (ENDPOINT_VAR, "https://proxy.internal.test/v1/"),
            (LANGUAGE_VAR, "English"),
        ]))
        .unwrap();
        assert_eq!(
            config.generate_content_url(),
            "https://proxy.internal.test/v1/models/gemini-2.0-pro:generateContent"
        );
        assert_eq!(config.response_language(), "English");
    }

    #[test]
    fn bad_endpoint_is_rejected() {
        let err = ClientConfig::new("k")
            .unwrap()
            .with_endpoint("ftp://example.com")
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEndpoint { .. }));
    }

    #[test]
    fn model_with_path_characters_is_rejected() {
        assert!(ClientConfig::new("k").unwrap().with_model("../x").is_err());
        assert!(ClientConfig::new("k").unwrap().with_model("").is_err());
    }

    #[test]
    fn timeout_is_clamped() {
        let config = ClientConfig::new("k").unwrap();
        assert_eq!(
            config.clone().with_timeout_ms(0).timeout(),
            Duration::from_secs(1)
        );
        assert_eq!(
            config.with_timeout_ms(10_000_000).timeout(),
            Duration::from_secs(300)
        );
    }

    fn settings(json: &str) -> Result<ClientConfig, ConfigError> {
        let settings: ClientSettings = serde_json::from_str(json).unwrap();
        ClientConfig::try_from(settings)
    }

    #[test]
    fn settings_from_shell_are_validated() {
        assert_eq!(
            settings(r#"{"api_key":""}"#).unwrap_err(),
            ConfigError::MissingApiKey
        );
        assert!(matches!(
            settings(r#"{"api_key":"k","model":"../../x"}"#),
            Err(ConfigError::InvalidModel(_))
        ));
        assert!(matches!(
            settings(r#"{"api_key":"k","endpoint":"javascript:alert(1)"}"#),
            Err(ConfigError::InvalidEndpoint { .. })
        ));
    }

    #[test]
    fn settings_fill_defaults_and_clamp() {
        let config = settings(r#"{"api_key":"k","response_language":"  ","timeout_ms":0}"#).unwrap();
        assert_eq!(config.model(), DEFAULT_MODEL);
        assert_eq!(config.response_language(), DEFAULT_RESPONSE_LANGUAGE);
        assert_eq!(config.timeout(), Duration::from_secs(1));
    }

    #[test]
    fn debug_hides_key() {
        let config = ClientConfig::new("AIza-very-secret").unwrap();
        let printed = format!("{config:?}");
        assert!(!printed.contains("AIza-very-secret"));
        assert_eq!(config.api_key(), "AIza-very-secret");
    }
}
