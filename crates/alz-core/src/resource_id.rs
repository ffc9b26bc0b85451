//! Resource identifier formatting and classification.

use uuid::Uuid;

use crate::error::{AlzError, AlzResult};

const MANAGEMENT_GROUP_PREFIX: &str = "/providers/Microsoft.Management/managementGroups/";
const AUTHORIZATION_PROVIDER: &str = "/providers/Microsoft.Authorization";

/// Resource id of a management group.
#[must_use]
pub fn management_group_id(management_group: &str) -> String {
    format!("{MANAGEMENT_GROUP_PREFIX}{management_group}")
}

/// Resource id of a policy assignment at a management group.
#[must_use]
pub fn policy_assignment_id(management_group: &str, name: &str) -> String {
    scoped_id(management_group, "policyAssignments", name)
}

/// Resource id of a policy definition at a management group.
#[must_use]
pub fn policy_definition_id(management_group: &str, name: &str) -> String {
    scoped_id(management_group, "policyDefinitions", name)
}

/// Resource id of a policy set definition at a management group.
#[must_use]
pub fn policy_set_definition_id(management_group: &str, name: &str) -> String {
    scoped_id(management_group, "policySetDefinitions", name)
}

/// Resource id of a role definition at a management group.
#[must_use]
pub fn role_definition_id(management_group: &str, name: &str) -> String {
    scoped_id(management_group, "roleDefinitions", name)
}

fn scoped_id(management_group: &str, resource_type: &str, name: &str) -> String {
    format!(
        "{MANAGEMENT_GROUP_PREFIX}{management_group}{AUTHORIZATION_PROVIDER}/{resource_type}/{name}"
    )
}

/// The last `/`-separated segment of an id.
#[must_use]
pub fn last_segment(id: &str) -> &str {
    id.rsplit('/').next().unwrap_or(id)
}

/// The last-but-one `/`-separated segment of an id, if there is one.
#[must_use]
pub fn last_but_one_segment(id: &str) -> Option<&str> {
    let mut segments = id.rsplit('/');
    segments.next()?;
    segments.next()
}

/// Whether `id` has the shape of an ARM resource id.
///
/// The id must be rooted at `/subscriptions`, `/providers` or `/tenants`
/// and consist of non-empty segments in key/value pairs.
#[must_use]
pub fn is_arm_resource_id(id: &str) -> bool {
    let Some(path) = id.strip_prefix('/') else {
        return false;
    };
    let segments: Vec<&str> = path.split('/').collect();
    if segments.len() < 2 || segments.len() % 2 != 0 || segments.iter().any(|s| s.is_empty()) {
        return false;
    }
    ["subscriptions", "providers", "tenants"]
        .iter()
        .any(|root| segments[0].eq_ignore_ascii_case(root))
}

/// What a definition id points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    PolicyDefinition,
    PolicySetDefinition,
}

impl ReferenceKind {
    /// Classify an id by its resource type segment.
    ///
    /// # Errors
    /// Returns `AlzError::InvalidResourceType` unless the penultimate segment is
    /// `policyDefinitions` or `policySetDefinitions` (case-insensitive).
    pub fn from_resource_id(id: &str) -> AlzResult<Self> {
        match last_but_one_segment(id) {
            Some(t) if t.eq_ignore_ascii_case("policyDefinitions") => Ok(Self::PolicyDefinition),
            Some(t) if t.eq_ignore_ascii_case("policySetDefinitions") => {
                Ok(Self::PolicySetDefinition)
            }
            _ => Err(AlzError::InvalidResourceType(id.to_string())),
        }
    }

    /// Resource id of this kind of definition at a management group.
    #[must_use]
    pub fn scoped_id(self, management_group: &str, name: &str) -> String {
        match self {
            Self::PolicyDefinition => policy_definition_id(management_group, name),
            Self::PolicySetDefinition => policy_set_definition_id(management_group, name),
        }
    }
}

/// Version 5 (SHA-1, URL namespace) UUID over the concatenated parts.
///
/// Used for role definition names so repeated projections produce the same ids.
#[must_use]
pub fn uuid_v5(parts: &[&str]) -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_URL, parts.concat().as_bytes())
}
