//! Derivation of the extra role assignments policy identities need.
//!
//! Policies with `deployIfNotExists` or `modify` effects name the roles their
//! managed identity must hold in `then.details.roleDefinitionIds`. Parameters
//! flagged `assignPermissions` carry further scopes that need the same roles.

use std::collections::BTreeMap;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::catalog::Catalog;
use crate::error::{AlzError, AlzResult};
use crate::management_group::{ManagementGroup, PolicyAssignmentAdditionalRoleAssignments};
use crate::resource_id::{ReferenceKind, is_arm_resource_id, last_segment};
use crate::resources::{
    ParameterValues, PolicyAssignment, PolicyDefinition, PolicyDefinitionReference, ResourceKind,
};

/// The part of a policy rule that lists required role definitions.
///
/// Only `then` is required; everything else in the rule is ignored.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PolicyRuleRoleIds {
    #[serde(alias = "Then")]
    then: Option<RuleThen>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
struct RuleThen {
    #[serde(default, alias = "Details")]
    details: Option<RuleDetails>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
enum RuleDetails {
    Object {
        #[serde(default, rename = "roleDefinitionIds", alias = "RoleDefinitionIds")]
        role_definition_ids: Vec<String>,
    },
    Other(serde_json::Value),
}

impl PolicyRuleRoleIds {
    /// Read the role definition ids from a definition's policy rule.
    ///
    /// A rule without `details.roleDefinitionIds` yields an empty list.
    /// `assignment` names the assignment being processed, for error context.
    ///
    /// # Errors
    /// Returns `AlzError::MalformedPolicyRule` if the rule is missing, is not
    /// an object, or has no `then` object.
    pub fn from_definition(
        definition: &PolicyDefinition,
        assignment: &str,
    ) -> AlzResult<Vec<String>> {
        let malformed = |message: String| AlzError::MalformedPolicyRule {
            assignment: assignment.to_string(),
            definition: definition.name.clone(),
            message,
        };
        let rule = definition
            .properties
            .policy_rule
            .as_ref()
            .ok_or_else(|| malformed("policy rule is missing".into()))?;
        let parsed = Self::deserialize(rule).map_err(|e| malformed(e.to_string()))?;
        let then = parsed
            .then
            .ok_or_else(|| malformed("policy rule has no then block".into()))?;
        Ok(match then.details {
            Some(RuleDetails::Object {
                role_definition_ids,
            }) => role_definition_ids,
            Some(RuleDetails::Other(_)) | None => Vec::new(),
        })
    }
}

/// Pull `name` out of `[parameters('name')]`.
///
/// # Errors
/// Returns `AlzError::InvalidParameterReference` if `value` does not match the pattern exactly.
pub fn extract_parameter_name_from_arm_function(value: &str) -> AlzResult<&str> {
    value
        .strip_prefix("[parameters('")
        .and_then(|rest| rest.strip_suffix("')]"))
        .ok_or_else(|| AlzError::InvalidParameterReference(value.to_string()))
}

impl ManagementGroup {
    /// Work out the extra role assignments for every identity-bearing assignment.
    ///
    /// Definitions are looked up in `catalog` by name. The node is only
    /// updated when every assignment succeeds.
    ///
    /// # Errors
    /// Returns an error naming the assignment if its definition cannot be
    /// found, its rule is malformed, a plain definition grants no roles, a set
    /// member leaves a scope parameter unbound, or a scope is not an ARM
    /// resource id.
    pub fn generate_policy_assignment_additional_role_assignments(
        &mut self,
        catalog: &Catalog,
    ) -> AlzResult<()> {
        let mut derived = BTreeMap::new();
        for (name, assignment) in &self.policy_assignments {
            if !assignment.has_managed_identity() {
                continue;
            }
            let additional = derive_for_assignment(assignment, catalog)?;
            debug!(
                management_group = %self.name(),
                assignment = %name,
                roles = additional.role_definition_ids.len(),
                scopes = additional.additional_scopes.len(),
                "Derived additional role assignments"
            );
            derived.insert(name.clone(), additional);
        }
        self.additional_role_assignments = derived;
        Ok(())
    }
}

fn derive_for_assignment(
    assignment: &PolicyAssignment,
    catalog: &Catalog,
) -> AlzResult<PolicyAssignmentAdditionalRoleAssignments> {
    let id = &assignment.properties.policy_definition_id;
    let kind = ReferenceKind::from_resource_id(id).map_err(|_| {
        AlzError::AssignmentInvalidResourceType {
            assignment: assignment.name.clone(),
            id: id.clone(),
        }
    })?;
    let definition_name = last_segment(id);
    let mut result = PolicyAssignmentAdditionalRoleAssignments::default();

    match kind {
        ReferenceKind::PolicyDefinition => {
            let definition = catalog.policy_definition(definition_name).ok_or_else(|| {
                AlzError::ReferenceNotFound {
                    kind: ResourceKind::PolicyDefinition,
                    name: definition_name.to_string(),
                    referenced_by: format!("policy assignment {}", assignment.name),
                }
            })?;
            let role_ids = PolicyRuleRoleIds::from_definition(&definition, &assignment.name)?;
            if role_ids.is_empty() {
                return Err(AlzError::NoRoleDefinitionIds {
                    assignment: assignment.name.clone(),
                    definition: definition.name,
                });
            }
            append_all(&mut result.role_definition_ids, role_ids);

            for parameter in permission_parameters(&definition) {
                append_assignment_scope(assignment, parameter, &mut result.additional_scopes)?;
            }
        }
        ReferenceKind::PolicySetDefinition => {
            let set = catalog.policy_set_definition(definition_name).ok_or_else(|| {
                AlzError::ReferenceNotFound {
                    kind: ResourceKind::PolicySetDefinition,
                    name: definition_name.to_string(),
                    referenced_by: format!("policy assignment {}", assignment.name),
                }
            })?;
            for reference in &set.properties.policy_definitions {
                derive_for_set_member(assignment, &set.name, reference, catalog, &mut result)?;
            }
        }
    }
    Ok(result)
}

fn derive_for_set_member(
    assignment: &PolicyAssignment,
    set_name: &str,
    reference: &PolicyDefinitionReference,
    catalog: &Catalog,
    result: &mut PolicyAssignmentAdditionalRoleAssignments,
) -> AlzResult<()> {
    let member_name = last_segment(&reference.policy_definition_id);
    let definition =
        catalog
            .policy_definition(member_name)
            .ok_or_else(|| AlzError::ReferenceNotFound {
                kind: ResourceKind::PolicyDefinition,
                name: member_name.to_string(),
                referenced_by: format!("policy set definition {set_name}"),
            })?;
    append_all(
        &mut result.role_definition_ids,
        PolicyRuleRoleIds::from_definition(&definition, &assignment.name)?,
    );

    let owner = format!(
        "policy set definition {set_name} reference {}",
        reference
            .policy_definition_reference_id
            .as_deref()
            .unwrap_or(member_name)
    );
    for parameter in permission_parameters(&definition) {
        let expression = string_parameter(&reference.parameters, parameter, &owner)?.ok_or_else(
            || AlzError::UnboundSetMemberParameter {
                assignment: assignment.name.clone(),
                set: set_name.to_string(),
                definition: definition.name.clone(),
                parameter: parameter.to_string(),
            },
        )?;
        let outer = extract_parameter_name_from_arm_function(expression)?;
        append_assignment_scope(assignment, outer, &mut result.additional_scopes)?;
    }
    Ok(())
}

/// Record the assignment's value of `parameter` as a scope.
///
/// An unset parameter is skipped with a warning.
fn append_assignment_scope(
    assignment: &PolicyAssignment,
    parameter: &str,
    scopes: &mut Vec<String>,
) -> AlzResult<()> {
    let Some(scope) =
        string_parameter(&assignment.properties.parameters, parameter, &assignment.name)?
    else {
        warn!(
            assignment = %assignment.name,
            parameter = %parameter,
            "assignPermissions parameter not set on assignment, skipping scope"
        );
        return Ok(());
    };
    if !is_arm_resource_id(scope) {
        return Err(AlzError::InvalidScope {
            assignment: assignment.name.clone(),
            parameter: parameter.to_string(),
            value: scope.to_string(),
        });
    }
    append_if_missing(scopes, scope);
    Ok(())
}

fn permission_parameters(definition: &PolicyDefinition) -> impl Iterator<Item = &str> {
    definition
        .properties
        .parameters
        .iter()
        .filter(|(_, p)| p.assigns_permissions())
        .map(|(name, _)| name.as_str())
}

/// A parameter's value as a string; `None` if unset.
fn string_parameter<'a>(
    values: &'a ParameterValues,
    parameter: &str,
    owner: &str,
) -> AlzResult<Option<&'a str>> {
    let Some(value) = values.get(parameter) else {
        return Ok(None);
    };
    value
        .value
        .as_str()
        .map(Some)
        .ok_or_else(|| AlzError::ParameterNotString {
            parameter: parameter.to_string(),
            owner: owner.to_string(),
        })
}

fn append_if_missing(list: &mut Vec<String>, value: &str) {
    if !list.iter().any(|v| v == value) {
        list.push(value.to_string());
    }
}

fn append_all(list: &mut Vec<String>, values: Vec<String>) {
    for value in values {
        append_if_missing(list, &value);
    }
}
