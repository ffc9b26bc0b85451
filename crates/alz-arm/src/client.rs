//! Policy client over the Azure Resource Manager REST API.

use std::time::Duration;

use alz_core::{ClientError, PolicyClient, PolicyDefinition, PolicySetDefinition};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::config::ArmClientConfig;
use crate::error::{ArmError, ArmResult};

const POLICY_DEFINITIONS: &str = "policyDefinitions";
const POLICY_SET_DEFINITIONS: &str = "policySetDefinitions";

/// Reads built-in definitions from the tenant-independent provider scope.
#[derive(Debug, Clone)]
pub struct ArmPolicyClient {
    http: reqwest::Client,
    endpoint: Url,
    config: ArmClientConfig,
}

impl ArmPolicyClient {
    /// Create a client from validated configuration.
    ///
    /// # Errors
    /// Returns a configuration error, or `ArmError::Http` if the HTTP client
    /// cannot be built.
    pub fn new(config: ArmClientConfig) -> ArmResult<Self> {
        let endpoint = config.validate()?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()?;
        Ok(Self {
            http,
            endpoint,
            config,
        })
    }

    #[must_use]
    pub const fn config(&self) -> &ArmClientConfig {
        &self.config
    }

    fn resource_url(&self, collection: &str, name: &str) -> ArmResult<Url> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|()| ArmError::InvalidConfig("endpoint cannot carry a path".into()))?
            .pop_if_empty()
            .extend(["providers", "Microsoft.Authorization", collection, name]);
        url.query_pairs_mut()
            .append_pair("api-version", &self.config.api_version);
        Ok(url)
    }

    #[instrument(skip(self), fields(endpoint = %self.endpoint))]
    async fn get<T: DeserializeOwned>(&self, collection: &str, name: &str) -> ArmResult<T> {
        let url = self.resource_url(collection, name)?;
        let mut request = self.http.get(url);
        if let Some(token) = &self.config.bearer_token {
            request = request.header("Authorization", format!("Bearer {token}"));
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            let err = ArmError::Status {
                status: status.as_u16(),
                body,
            };
            warn!(
                status = status.as_u16(),
                retryable = err.is_retryable(),
                "ARM request failed"
            );
            return Err(err);
        }

        debug!(status = status.as_u16(), bytes = body.len(), "ARM resource read");
        Ok(serde_json::from_str(&body)?)
    }

    /// Fetch a built-in policy definition.
    ///
    /// # Errors
    /// Returns any transport, status or decode error.
    pub async fn policy_definition(&self, name: &str) -> ArmResult<PolicyDefinition> {
        self.get(POLICY_DEFINITIONS, name).await
    }

    /// Fetch a built-in policy set definition.
    ///
    /// # Errors
    /// Returns any transport, status or decode error.
    pub async fn policy_set_definition(&self, name: &str) -> ArmResult<PolicySetDefinition> {
        self.get(POLICY_SET_DEFINITIONS, name).await
    }
}

#[async_trait]
impl PolicyClient for ArmPolicyClient {
    async fn get_builtin_policy_definition(
        &self,
        name: &str,
    ) -> Result<PolicyDefinition, ClientError> {
        Ok(self.policy_definition(name).await?)
    }

    async fn get_builtin_policy_set_definition(
        &self,
        name: &str,
    ) -> Result<PolicySetDefinition, ClientError> {
        Ok(self.policy_set_definition(name).await?)
    }
}
