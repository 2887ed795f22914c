//! Provider configuration.

use std::fmt;

use serde::Deserialize;
use url::Url;

use crate::error::ProviderError;
use crate::schema::{Attribute, Schema};

/// Environment used when neither the provider nor a resource names one.
pub const DEFAULT_ENVIRONMENT: &str = "default";

/// Typed provider configuration, parsed from the orchestrator's JSON block.
#[derive(Clone, Deserialize, PartialEq, Eq)]
pub struct ProviderConfig {
    /// Base URL of the Flipt server, e.g. `http://localhost:8080`.
    pub endpoint: String,
    /// Default environment for every resource that does not set its own.
    #[serde(default)]
    pub environment_key: Option<String>,
    /// Static client token, sent as `Authorization: Bearer <token>`.
    #[serde(default)]
    pub token: Option<String>,
    /// JWT, sent as `Authorization: JWT <jwt>`.
    #[serde(default)]
    pub jwt: Option<String>,
}

impl ProviderConfig {
    /// Schema of the provider configuration block.
    pub fn schema() -> Schema {
        Schema::v0()
            .with_description("Manage Flipt namespaces, flags, segments and their rules")
            .with_attribute(
                "endpoint",
                Attribute::required_string()
                    .with_description("Flipt server URL (http or https)"),
            )
            .with_attribute(
                "environment_key",
                Attribute::optional_string()
                    .with_description("Default environment key, defaults to 'default'"),
            )
            .with_attribute(
                "token",
                Attribute::optional_string()
                    .sensitive()
                    .with_description("Client token for bearer authentication"),
            )
            .with_attribute(
                "jwt",
                Attribute::optional_string()
                    .sensitive()
                    .with_description("JWT for authentication"),
            )
    }

    /// Parse and check a configuration document.
    pub fn from_value(value: serde_json::Value) -> Result<Self, ProviderError> {
        let config: ProviderConfig = serde_json::from_value(value)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the semantic rules the schema cannot express.
    pub fn validate(&self) -> Result<(), ProviderError> {
        if self.endpoint.trim().is_empty() {
            return Err(ProviderError::Configuration(
                "endpoint must not be empty".to_string(),
            ));
        }
        self.base_url()?;

        if non_empty(&self.token).is_some() && non_empty(&self.jwt).is_some() {
            return Err(ProviderError::Configuration(
                "token and jwt are mutually exclusive".to_string(),
            ));
        }
        Ok(())
    }

    /// The endpoint as a URL, without a trailing slash.
    pub fn base_url(&self) -> Result<Url, ProviderError> {
        let trimmed = self.endpoint.trim().trim_end_matches('/');
        let url = Url::parse(trimmed).map_err(|e| {
            ProviderError::Configuration(format!("invalid endpoint '{}': {}", self.endpoint, e))
        })?;
        match url.scheme() {
            "http" | "https" => {},
            other => {
                return Err(ProviderError::Configuration(format!(
                    "endpoint must use http or https, got '{}'",
                    other
                )));
            },
        }
        if url.cannot_be_a_base() {
            return Err(ProviderError::Configuration(format!(
                "endpoint '{}' cannot be used as a base URL",
                self.endpoint
            )));
        }
        Ok(url)
    }

    /// The configured default environment, or `default`.
    pub fn environment(&self) -> &str {
        non_empty(&self.environment_key).unwrap_or(DEFAULT_ENVIRONMENT)
    }

    /// Value of the `Authorization` header, if any credential is configured.
    pub fn authorization(&self) -> Option<String> {
        if let Some(token) = non_empty(&self.token) {
            return Some(format!("Bearer {}", token));
        }
        non_empty(&self.jwt).map(|jwt| format!("JWT {}", jwt))
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("endpoint", &self.endpoint)
            .field("environment_key", &self.environment_key)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("jwt", &self.jwt.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_minimal_config_defaults() {
        let config = ProviderConfig::from_value(json!({"endpoint": "http://localhost:8080"}))
            .unwrap();
        assert_eq!(config.environment(), "default");
        assert!(config.authorization().is_none());
        assert_eq!(config.base_url().unwrap().as_str(), "http://localhost:8080/");
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let config = ProviderConfig::from_value(json!({
            "endpoint": "https://flipt.example.com/proxy/",
            "environment_key": "staging"
        }))
        .unwrap();
        assert_eq!(
            config.base_url().unwrap().as_str(),
            "https://flipt.example.com/proxy"
        );
        assert_eq!(config.environment(), "staging");
    }

    #[test]
    fn test_empty_environment_falls_back_to_default() {
        let config = ProviderConfig::from_value(json!({
            "endpoint": "http://localhost:8080",
            "environment_key": ""
        }))
        .unwrap();
        assert_eq!(config.environment(), DEFAULT_ENVIRONMENT);
    }

    #[test]
    fn test_authorization_headers() {
        let config = ProviderConfig::from_value(json!({
            "endpoint": "http://localhost:8080",
            "token": "secret-token"
        }))
        .unwrap();
        assert_eq!(config.authorization().as_deref(), Some("Bearer secret-token"));

        let config = ProviderConfig::from_value(json!({
            "endpoint": "http://localhost:8080",
            "jwt": "a.b.c"
        }))
        .unwrap();
        assert_eq!(config.authorization().as_deref(), Some("JWT a.b.c"));
    }

    #[test]
    fn test_token_and_jwt_are_exclusive() {
        let err = ProviderConfig::from_value(json!({
            "endpoint": "http://localhost:8080",
            "token": "t",
            "jwt": "j"
        }))
        .unwrap_err();
        assert!(matches!(err, ProviderError::Configuration(_)));
        assert!(err.message().contains("mutually exclusive"));
    }

    #[test]
    fn test_rejects_bad_endpoints() {
        for endpoint in ["", "localhost:8080", "ftp://flipt.example.com", "not a url"] {
            let result = ProviderConfig::from_value(json!({ "endpoint": endpoint }));
            assert!(result.is_err(), "endpoint {:?} should be rejected", endpoint);
        }
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = ProviderConfig::from_value(json!({
            "endpoint": "http://localhost:8080",
            "token": "super-secret"
        }))
        .unwrap();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("<redacted>"));
    }
}
