//! Deployment tree nodes.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::catalog::ArchetypeResources;
use crate::resource_id::management_group_id;
use crate::resources::{PolicyAssignment, PolicyDefinition, PolicySetDefinition, RoleDefinition};

/// Where a management group hangs in the hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum Parent {
    /// No parent; the node is the root.
    #[default]
    None,
    /// An existing management group outside this deployment; the node is the root.
    External(String),
    /// Another management group in this deployment.
    ManagementGroup(String),
}

impl Parent {
    /// Build a parent from a name and an "is external" flag.
    ///
    /// An empty, non-external name means no parent.
    #[must_use]
    pub fn from_name(name: &str, is_external: bool) -> Self {
        if is_external {
            Self::External(name.to_string())
        } else if name.is_empty() {
            Self::None
        } else {
            Self::ManagementGroup(name.to_string())
        }
    }

    /// Whether a node with this parent is the root of the deployment.
    #[must_use]
    pub const fn is_root(&self) -> bool {
        matches!(self, Self::None | Self::External(_))
    }
}

/// Extra role assignments a policy assignment's managed identity needs.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyAssignmentAdditionalRoleAssignments {
    /// Role definition ids, first-seen order, no duplicates.
    pub role_definition_ids: Vec<String>,
    /// Scopes beyond the assignment scope, first-seen order, no duplicates.
    pub additional_scopes: Vec<String>,
}

/// A management group with its own copies of archetype resources.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagementGroup {
    name: String,
    display_name: String,
    parent: Parent,
    children: Vec<String>,
    pub policy_definitions: BTreeMap<String, PolicyDefinition>,
    pub policy_set_definitions: BTreeMap<String, PolicySetDefinition>,
    pub policy_assignments: BTreeMap<String, PolicyAssignment>,
    pub role_definitions: BTreeMap<String, RoleDefinition>,
    /// Derived by the role-assignment pass, keyed by assignment name.
    pub additional_role_assignments: BTreeMap<String, PolicyAssignmentAdditionalRoleAssignments>,
}

impl ManagementGroup {
    pub(crate) fn new(
        name: impl Into<String>,
        display_name: impl Into<String>,
        parent: Parent,
        resources: ArchetypeResources,
    ) -> Self {
        Self {
            name: name.into(),
            display_name: display_name.into(),
            parent,
            children: Vec::new(),
            policy_definitions: resources.policy_definitions,
            policy_set_definitions: resources.policy_set_definitions,
            policy_assignments: resources.policy_assignments,
            role_definitions: resources.role_definitions,
            additional_role_assignments: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    #[must_use]
    pub const fn parent(&self) -> &Parent {
        &self.parent
    }

    /// Names of direct children, in insertion order.
    #[must_use]
    pub fn children(&self) -> &[String] {
        &self.children
    }

    pub(crate) fn push_child(&mut self, child: &str) {
        if !self.children.iter().any(|c| c == child) {
            self.children.push(child.to_string());
        }
    }

    /// Resource id of this management group.
    #[must_use]
    pub fn resource_id(&self) -> String {
        management_group_id(&self.name)
    }
}
