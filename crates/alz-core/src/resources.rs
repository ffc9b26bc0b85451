//! Typed Azure Resource Manager records for policy and role resources.
//!
//! Only the fields the projection engine reads or rewrites are modelled
//! explicitly. Everything else is kept in flattened `additional` maps so a
//! record survives a deserialize/serialize cycle unchanged.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Parameter values keyed by parameter name.
pub type ParameterValues = BTreeMap<String, ParameterValue>;

/// Parameter definitions keyed by parameter name.
pub type ParameterDefinitions = BTreeMap<String, ParameterDefinition>;

/// Fields not modelled explicitly.
pub type AdditionalFields = BTreeMap<String, Value>;

/// The resource kinds handled by the library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    PolicyDefinition,
    PolicySetDefinition,
    PolicyAssignment,
    RoleDefinition,
    Archetype,
    ManagementGroup,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PolicyDefinition => write!(f, "policy definition"),
            Self::PolicySetDefinition => write!(f, "policy set definition"),
            Self::PolicyAssignment => write!(f, "policy assignment"),
            Self::RoleDefinition => write!(f, "role definition"),
            Self::Archetype => write!(f, "archetype"),
            Self::ManagementGroup => write!(f, "management group"),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Parameters
// ─────────────────────────────────────────────────────────────────────────────

/// A parameter value, `{ "value": ... }` on the wire.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ParameterValue {
    #[serde(default)]
    pub value: Value,
}

impl ParameterValue {
    /// Wrap a JSON value.
    #[must_use]
    pub fn new(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
        }
    }
}

/// A parameter declared by a policy (set) definition.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterDefinition {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub parameter_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ParameterMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_values: Option<Vec<Value>>,
    #[serde(flatten)]
    pub additional: AdditionalFields,
}

impl ParameterDefinition {
    /// True when the metadata flags this parameter with `assignPermissions`.
    #[must_use]
    pub fn assigns_permissions(&self) -> bool {
        self.metadata
            .as_ref()
            .and_then(|m| m.assign_permissions)
            .unwrap_or(false)
    }
}

/// Parameter metadata.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// The assignment identity needs a role over the scope held by this parameter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assign_permissions: Option<bool>,
    #[serde(flatten)]
    pub additional: AdditionalFields,
}

// ─────────────────────────────────────────────────────────────────────────────
// Policy definitions
// ─────────────────────────────────────────────────────────────────────────────

/// A policy definition.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PolicyDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
    #[serde(default)]
    pub properties: PolicyDefinitionProperties,
}

/// Properties of a policy definition.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyDefinitionProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: ParameterDefinitions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_rule: Option<Value>,
    #[serde(flatten)]
    pub additional: AdditionalFields,
}

impl PolicyDefinition {
    /// Create an empty definition with the given name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            resource_type: Some("Microsoft.Authorization/policyDefinitions".to_string()),
            ..Self::default()
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Policy set definitions
// ─────────────────────────────────────────────────────────────────────────────

/// A policy set definition (initiative).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PolicySetDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
    #[serde(default)]
    pub properties: PolicySetDefinitionProperties,
}

/// Properties of a policy set definition.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicySetDefinitionProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: ParameterDefinitions,
    #[serde(default)]
    pub policy_definitions: Vec<PolicyDefinitionReference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_definition_groups: Option<Vec<Value>>,
    #[serde(flatten)]
    pub additional: AdditionalFields,
}

/// A member of a policy set definition.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyDefinitionReference {
    pub policy_definition_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_definition_reference_id: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: ParameterValues,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_names: Option<Vec<String>>,
    #[serde(flatten)]
    pub additional: AdditionalFields,
}

impl PolicySetDefinition {
    /// Create an empty set definition with the given name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            resource_type: Some("Microsoft.Authorization/policySetDefinitions".to_string()),
            ..Self::default()
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Policy assignments
// ─────────────────────────────────────────────────────────────────────────────

/// Managed identity type of a policy assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum IdentityType {
    SystemAssigned,
    UserAssigned,
    #[default]
    None,
}

/// Managed identity descriptor of a policy assignment.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    #[serde(rename = "type", default)]
    pub identity_type: IdentityType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_assigned_identities: Option<BTreeMap<String, Value>>,
}

/// A policy assignment.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PolicyAssignment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<Identity>,
    #[serde(default)]
    pub properties: PolicyAssignmentProperties,
}

/// Properties of a policy assignment.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyAssignmentProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub policy_definition_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_scopes: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: ParameterValues,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enforcement_mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    #[serde(flatten)]
    pub additional: AdditionalFields,
}

impl PolicyAssignment {
    /// Create an assignment of the given definition id.
    #[must_use]
    pub fn new(name: impl Into<String>, policy_definition_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            resource_type: Some("Microsoft.Authorization/policyAssignments".to_string()),
            properties: PolicyAssignmentProperties {
                policy_definition_id: policy_definition_id.into(),
                ..PolicyAssignmentProperties::default()
            },
            ..Self::default()
        }
    }

    /// True when the assignment carries a managed identity other than `None`.
    #[must_use]
    pub fn has_managed_identity(&self) -> bool {
        self.identity
            .as_ref()
            .is_some_and(|i| i.identity_type != IdentityType::None)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Role definitions
// ─────────────────────────────────────────────────────────────────────────────

/// A custom role definition.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RoleDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
    #[serde(default)]
    pub properties: RoleDefinitionProperties,
}

/// Properties of a role definition.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleDefinitionProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub role_type: Option<String>,
    #[serde(default)]
    pub permissions: Vec<Permission>,
    #[serde(default)]
    pub assignable_scopes: Vec<String>,
    #[serde(flatten)]
    pub additional: AdditionalFields,
}

/// A role definition permission block.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Permission {
    #[serde(default)]
    pub actions: Vec<String>,
    #[serde(default)]
    pub not_actions: Vec<String>,
    #[serde(default)]
    pub data_actions: Vec<String>,
    #[serde(default)]
    pub not_data_actions: Vec<String>,
}

impl RoleDefinition {
    /// Create an empty role definition with the given name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            resource_type: Some("Microsoft.Authorization/roleDefinitions".to_string()),
            ..Self::default()
        }
    }
}
