//! ARM client configuration.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{ArmError, ArmResult};

/// Public Azure Resource Manager endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://management.azure.com";

/// Policy API version used for definition reads.
pub const DEFAULT_API_VERSION: &str = "2021-06-01";

/// ARM client configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArmClientConfig {
    /// Resource Manager base URL.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// `api-version` query parameter.
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Per-request timeout in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Bearer token for the `Authorization` header.
    #[serde(default, skip_serializing)]
    pub bearer_token: Option<String>,
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_api_version() -> String {
    DEFAULT_API_VERSION.to_string()
}

const fn default_request_timeout_ms() -> u64 {
    60_000
}

impl Default for ArmClientConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            api_version: default_api_version(),
            request_timeout_ms: default_request_timeout_ms(),
            bearer_token: None,
        }
    }
}

impl ArmClientConfig {
    /// Builder: set the endpoint.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Builder: set the API version.
    #[must_use]
    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = api_version.into();
        self
    }

    /// Builder: set the request timeout.
    #[must_use]
    pub const fn with_request_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.request_timeout_ms = timeout_ms;
        self
    }

    /// Builder: set the bearer token.
    #[must_use]
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    /// Validate the configuration and return the parsed endpoint.
    ///
    /// # Errors
    /// Returns `ArmError::Url` if the endpoint does not parse, or
    /// `ArmError::InvalidConfig` for an unusable endpoint, an empty API
    /// version or a zero timeout.
    pub fn validate(&self) -> ArmResult<Url> {
        let endpoint = Url::parse(&self.endpoint)?;
        if endpoint.cannot_be_a_base() {
            return Err(ArmError::InvalidConfig(format!(
                "endpoint {} cannot carry a path",
                self.endpoint
            )));
        }
        if self.api_version.trim().is_empty() {
            return Err(ArmError::InvalidConfig("api_version must not be empty".into()));
        }
        if self.request_timeout_ms == 0 {
            return Err(ArmError::InvalidConfig(
                "request_timeout_ms must be greater than zero".into(),
            ));
        }
        Ok(endpoint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let config = ArmClientConfig::default();
        let url = config.validate().unwrap();
        assert_eq!(url.host_str(), Some("management.azure.com"));
        assert_eq!(config.api_version, DEFAULT_API_VERSION);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            ArmClientConfig::default().with_endpoint("not a url").validate(),
            Err(ArmError::Url(_))
        ));
        assert!(matches!(
            ArmClientConfig::default().with_endpoint("mailto:ops@example.com").validate(),
            Err(ArmError::InvalidConfig(_))
        ));
        assert!(matches!(
            ArmClientConfig::default().with_api_version(" ").validate(),
            Err(ArmError::InvalidConfig(_))
        ));
        assert!(matches!(
            ArmClientConfig::default().with_request_timeout_ms(0).validate(),
            Err(ArmError::InvalidConfig(_))
        ));
    }

    #[test]
    fn token_is_not_serialized() {
        let config = ArmClientConfig::default().with_bearer_token("secret");
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("secret"));

        let parsed: ArmClientConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(parsed, ArmClientConfig::default());
    }
}
