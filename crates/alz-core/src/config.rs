//! Library options and deployment-wide well-known values.

use serde::{Deserialize, Serialize};

use crate::error::{AlzError, AlzResult};

/// Default number of concurrent built-in definition requests.
pub const DEFAULT_PARALLELISM: usize = 10;

/// Options for an [`AlzLib`](crate::AlzLib).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlzLibOptions {
    /// Maximum number of in-flight built-in definition requests.
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,

    /// Allow a later library to replace definitions loaded by an earlier one.
    #[serde(default)]
    pub allow_overwrite: bool,

    /// Values stamped into well-known policy assignment parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub well_known_values: Option<WellKnownPolicyValues>,
}

const fn default_parallelism() -> usize {
    DEFAULT_PARALLELISM
}

impl Default for AlzLibOptions {
    fn default() -> Self {
        Self {
            parallelism: DEFAULT_PARALLELISM,
            allow_overwrite: false,
            well_known_values: None,
        }
    }
}

impl AlzLibOptions {
    /// Parse options from TOML.
    ///
    /// # Errors
    /// Returns `AlzError::ConfigParse` if the document is malformed, or
    /// `AlzError::InvalidConfig` if validation fails.
    pub fn from_toml_str(s: &str) -> AlzResult<Self> {
        let options: Self = toml::from_str(s)?;
        options.validate()?;
        Ok(options)
    }

    /// Builder: set parallelism.
    #[must_use]
    pub const fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism;
        self
    }

    /// Builder: allow or forbid overwrites on merge.
    #[must_use]
    pub const fn with_allow_overwrite(mut self, allow: bool) -> Self {
        self.allow_overwrite = allow;
        self
    }

    /// Builder: set well-known values.
    #[must_use]
    pub fn with_well_known_values(mut self, values: WellKnownPolicyValues) -> Self {
        self.well_known_values = Some(values);
        self
    }

    /// Validate the options.
    ///
    /// # Errors
    /// Returns `AlzError::InvalidConfig` if parallelism is zero or the
    /// well-known values are incomplete.
    pub fn validate(&self) -> AlzResult<()> {
        if self.parallelism == 0 {
            return Err(AlzError::InvalidConfig(
                "parallelism must be greater than zero".into(),
            ));
        }
        if let Some(values) = &self.well_known_values {
            values.validate()?;
        }
        Ok(())
    }
}

/// Deployment-wide values written into specific policy assignment parameters.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WellKnownPolicyValues {
    /// Azure region used for assignment locations and region parameters.
    pub default_location: String,
    /// Resource id of the central Log Analytics workspace.
    pub default_log_analytics_workspace_id: String,
}

impl WellKnownPolicyValues {
    /// Create a set of well-known values.
    #[must_use]
    pub fn new(
        default_location: impl Into<String>,
        default_log_analytics_workspace_id: impl Into<String>,
    ) -> Self {
        Self {
            default_location: default_location.into(),
            default_log_analytics_workspace_id: default_log_analytics_workspace_id.into(),
        }
    }

    /// Validate the values.
    ///
    /// # Errors
    /// Returns `AlzError::InvalidConfig` if the default location is empty.
    pub fn validate(&self) -> AlzResult<()> {
        if self.default_location.trim().is_empty() {
            return Err(AlzError::InvalidConfig(
                "well_known_values.default_location must not be empty".into(),
            ));
        }
        Ok(())
    }
}
