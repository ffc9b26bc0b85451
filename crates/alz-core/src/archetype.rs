//! Archetypes: named bundles of policy and role resource names.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;

use crate::config::WellKnownPolicyValues;
use crate::error::{AlzError, AlzResult};
use crate::library::ParameterOverrides;
use crate::resources::ResourceKind;

/// Name of the built-in archetype with no members.
pub const EMPTY_ARCHETYPE: &str = "empty";

/// A reusable bundle of resource names.
///
/// Archetypes hold names, not resources. Resources are copied out of the
/// catalog when the archetype is projected onto a management group, so
/// changing an archetype never affects a group created from it earlier.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Archetype {
    name: String,
    pub policy_definitions: BTreeSet<String>,
    pub policy_set_definitions: BTreeSet<String>,
    pub policy_assignments: BTreeSet<String>,
    pub role_definitions: BTreeSet<String>,
    /// Assignment name → parameter name → value, applied at projection.
    pub parameter_overrides: ParameterOverrides,
    well_known_values: Option<WellKnownPolicyValues>,
}

impl Archetype {
    /// Create an archetype with no members.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The well-known values this archetype was stamped with, if any.
    #[must_use]
    pub const fn well_known_values(&self) -> Option<&WellKnownPolicyValues> {
        self.well_known_values.as_ref()
    }

    /// Return a copy stamped with the given well-known values.
    ///
    /// For every well-known assignment present in this archetype, the mapped
    /// parameters are overridden with the matching field of `values`.
    /// Assignments the archetype does not contain are skipped. `self` is
    /// left untouched.
    #[must_use]
    pub fn with_well_known_policy_values(&self, values: &WellKnownPolicyValues) -> Self {
        let mut result = self.clone();
        for (assignment, parameter, field) in WELL_KNOWN_PARAMETERS {
            if !result.policy_assignments.contains(*assignment) {
                continue;
            }
            result
                .parameter_overrides
                .entry((*assignment).to_string())
                .or_default()
                .insert((*parameter).to_string(), field.value(values));
        }
        result.well_known_values = Some(values.clone());
        result
    }

    /// The member set for a resource kind.
    #[must_use]
    pub const fn members(&self, kind: MemberKind) -> &BTreeSet<String> {
        match kind {
            MemberKind::PolicyDefinition => &self.policy_definitions,
            MemberKind::PolicySetDefinition => &self.policy_set_definitions,
            MemberKind::PolicyAssignment => &self.policy_assignments,
            MemberKind::RoleDefinition => &self.role_definitions,
        }
    }

    fn members_mut(&mut self, kind: MemberKind) -> &mut BTreeSet<String> {
        match kind {
            MemberKind::PolicyDefinition => &mut self.policy_definitions,
            MemberKind::PolicySetDefinition => &mut self.policy_set_definitions,
            MemberKind::PolicyAssignment => &mut self.policy_assignments,
            MemberKind::RoleDefinition => &mut self.role_definitions,
        }
    }

    /// Add a member, failing if it is already present.
    pub(crate) fn add_member(&mut self, kind: MemberKind, name: &str) -> AlzResult<()> {
        if !self.members_mut(kind).insert(name.to_string()) {
            return Err(AlzError::DuplicateArchetypeMember {
                archetype: self.name.clone(),
                kind: kind.into(),
                name: name.to_string(),
            });
        }
        Ok(())
    }

    /// Remove a member, failing if it is not present.
    pub(crate) fn remove_member(&mut self, kind: MemberKind, name: &str) -> AlzResult<()> {
        if !self.members_mut(kind).remove(name) {
            return Err(AlzError::ArchetypeMemberNotFound {
                archetype: self.name.clone(),
                kind: kind.into(),
                name: name.to_string(),
            });
        }
        if kind == MemberKind::PolicyAssignment {
            self.parameter_overrides.remove(name);
        }
        Ok(())
    }

    /// Record a parameter override for an assignment.
    pub(crate) fn set_parameter_override(&mut self, assignment: &str, parameter: &str, value: Value) {
        self.parameter_overrides
            .entry(assignment.to_string())
            .or_default()
            .insert(parameter.to_string(), value);
    }

    /// Parameter overrides for one assignment.
    #[must_use]
    pub fn overrides_for(&self, assignment: &str) -> Option<&BTreeMap<String, Value>> {
        self.parameter_overrides.get(assignment)
    }
}

/// The four member collections of an archetype.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    PolicyDefinition,
    PolicySetDefinition,
    PolicyAssignment,
    RoleDefinition,
}

impl MemberKind {
    pub const ALL: [Self; 4] = [
        Self::PolicyDefinition,
        Self::PolicySetDefinition,
        Self::PolicyAssignment,
        Self::RoleDefinition,
    ];
}

impl From<MemberKind> for ResourceKind {
    fn from(kind: MemberKind) -> Self {
        match kind {
            MemberKind::PolicyDefinition => Self::PolicyDefinition,
            MemberKind::PolicySetDefinition => Self::PolicySetDefinition,
            MemberKind::PolicyAssignment => Self::PolicyAssignment,
            MemberKind::RoleDefinition => Self::RoleDefinition,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Well-known parameter values
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
enum WellKnownField {
    Location,
    LogAnalyticsWorkspaceId,
}

impl WellKnownField {
    fn value(self, values: &WellKnownPolicyValues) -> Value {
        match self {
            Self::Location => Value::String(values.default_location.clone()),
            Self::LogAnalyticsWorkspaceId => {
                Value::String(values.default_log_analytics_workspace_id.clone())
            }
        }
    }
}

/// Assignment name, parameter name, source field.
const WELL_KNOWN_PARAMETERS: &[(&str, &str, WellKnownField)] = &[
    ("Deploy-AzActivity-Log", "logAnalytics", WellKnownField::LogAnalyticsWorkspaceId),
    ("Deploy-AzSqlDb-Auditing", "logAnalyticsWorkspaceId", WellKnownField::LogAnalyticsWorkspaceId),
    ("Deploy-Log-Analytics", "workspaceRegion", WellKnownField::Location),
    ("Deploy-Log-Analytics", "automationRegion", WellKnownField::Location),
    ("Deploy-MDFC-Config", "logAnalytics", WellKnownField::LogAnalyticsWorkspaceId),
    ("Deploy-MDFC-Config", "ascExportResourceGroupLocation", WellKnownField::Location),
    ("Deploy-Resource-Diag", "logAnalytics", WellKnownField::LogAnalyticsWorkspaceId),
    ("Deploy-VM-Monitoring", "logAnalytics_1", WellKnownField::LogAnalyticsWorkspaceId),
    ("Deploy-VMSS-Monitoring", "logAnalytics_1", WellKnownField::LogAnalyticsWorkspaceId),
];
