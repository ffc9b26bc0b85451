//! The deployment tree.
//!
//! Nodes live in one map keyed by name; parent and children are stored as
//! names. A parent must exist before its child is added, so the tree can
//! never contain a cycle.

use std::collections::BTreeMap;

use parking_lot::RwLock;
use tracing::{info, instrument};

use crate::archetype::Archetype;
use crate::catalog::Catalog;
use crate::config::WellKnownPolicyValues;
use crate::error::{AlzError, AlzResult};
use crate::hierarchy::HierarchyNode;
use crate::management_group::{ManagementGroup, Parent};
use crate::resource_id::{
    ReferenceKind, last_segment, management_group_id, policy_assignment_id, policy_definition_id,
    policy_set_definition_id, role_definition_id, uuid_v5,
};
use crate::resources::ResourceKind;

/// Definition name → name of the management group that owns it.
type OwnerMap = BTreeMap<String, String>;

/// A management group hierarchy built from archetypes.
#[derive(Debug, Default)]
pub struct Deployment {
    management_groups: RwLock<BTreeMap<String, ManagementGroup>>,
}

impl Deployment {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a management group built from `archetype`.
    ///
    /// The archetype's resources are copied from `catalog` and rewritten
    /// to this node's scope. Every precondition is checked before the tree
    /// is touched, so a failed call leaves it unchanged.
    ///
    /// # Errors
    /// Returns an error if the archetype has no well-known values, the name
    /// is taken, the parent is missing, a second root is requested, or an
    /// assignment references something other than a policy (set) definition.
    #[instrument(skip(self, catalog, archetype), fields(archetype = %archetype.name()))]
    pub fn add_management_group(
        &self,
        catalog: &Catalog,
        name: &str,
        display_name: &str,
        parent: Parent,
        archetype: &Archetype,
    ) -> AlzResult<()> {
        let mut mgs = self.management_groups.write();
        insert_management_group(&mut mgs, catalog, name, display_name, parent, archetype)
    }

    /// Add a planned hierarchy, parents before children.
    ///
    /// Each node gets a copy of its archetype stamped with `values`. Nodes
    /// are added to a staged copy of the tree, which replaces the tree only
    /// once every node has been added.
    ///
    /// # Errors
    /// Returns `AlzError::HierarchyArchetypeNotFound` for an unknown
    /// archetype, or any error of [`add_management_group`](Self::add_management_group).
    #[instrument(skip_all, fields(management_groups = plan.len()))]
    pub fn add_hierarchy(
        &self,
        catalog: &Catalog,
        plan: &[HierarchyNode],
        values: &WellKnownPolicyValues,
    ) -> AlzResult<()> {
        let mut mgs = self.management_groups.write();
        let mut staged = mgs.clone();
        for node in plan {
            let archetype = catalog
                .copy_archetype(&node.archetype)
                .map_err(|_| AlzError::HierarchyArchetypeNotFound {
                    management_group: node.name.clone(),
                    archetype: node.archetype.clone(),
                })?
                .with_well_known_policy_values(values);
            insert_management_group(
                &mut staged,
                catalog,
                &node.name,
                &node.display_name,
                node.parent.clone(),
                &archetype,
            )?;
        }
        *mgs = staged;
        info!(management_groups = plan.len(), "Management group hierarchy added");
        Ok(())
    }

    /// Run the role-assignment pass on a node in the tree.
    ///
    /// # Errors
    /// Returns `AlzError::ManagementGroupNotFound` for an unknown node, or
    /// any derivation error.
    pub fn generate_policy_assignment_additional_role_assignments(
        &self,
        name: &str,
        catalog: &Catalog,
    ) -> AlzResult<()> {
        let mut mgs = self.management_groups.write();
        let mg = mgs
            .get_mut(name)
            .ok_or_else(|| AlzError::ManagementGroupNotFound(name.to_string()))?;
        mg.generate_policy_assignment_additional_role_assignments(catalog)
    }

    /// Snapshot of a management group.
    #[must_use]
    pub fn management_group(&self, name: &str) -> Option<ManagementGroup> {
        self.management_groups.read().get(name).cloned()
    }

    /// Sorted names of every management group.
    #[must_use]
    pub fn management_group_names(&self) -> Vec<String> {
        self.management_groups.read().keys().cloned().collect()
    }

    /// Name of the root management group, if one has been added.
    #[must_use]
    pub fn root(&self) -> Option<String> {
        self.management_groups
            .read()
            .values()
            .find(|mg| mg.parent().is_root())
            .map(|mg| mg.name().to_string())
    }

    #[must_use]
    pub fn children(&self, name: &str) -> Option<Vec<String>> {
        self.management_groups
            .read()
            .get(name)
            .map(|mg| mg.children().to_vec())
    }

    #[must_use]
    pub fn parent(&self, name: &str) -> Option<Parent> {
        self.management_groups
            .read()
            .get(name)
            .map(|mg| mg.parent().clone())
    }
}

/// Build a node from `archetype` and insert it into `mgs`.
///
/// Every precondition is checked before `mgs` is touched.
fn insert_management_group(
    mgs: &mut BTreeMap<String, ManagementGroup>,
    catalog: &Catalog,
    name: &str,
    display_name: &str,
    parent: Parent,
    archetype: &Archetype,
) -> AlzResult<()> {
    let well_known = archetype
        .well_known_values()
        .ok_or(AlzError::WellKnownValuesNotSet)?;
    let resources = catalog.archetype_resources(archetype)?;

    if mgs.contains_key(name) {
        return Err(AlzError::AlreadyExists {
            kind: ResourceKind::ManagementGroup,
            name: name.to_string(),
        });
    }
    match &parent {
        Parent::External(external) if mgs.contains_key(external) => {
            return Err(AlzError::ExternalParentExists(external.clone()));
        }
        Parent::ManagementGroup(p) if !mgs.contains_key(p) => {
            return Err(AlzError::ParentNotFound(p.clone()));
        }
        _ => {}
    }
    if parent.is_root() {
        if let Some(existing) = mgs.values().find(|mg| mg.parent().is_root()) {
            return Err(AlzError::MultipleRootManagementGroups {
                existing: existing.name().to_string(),
                requested: name.to_string(),
            });
        }
    }

    let mut mg = ManagementGroup::new(name, display_name, parent.clone(), resources);

    // Owners over the whole tree; the new node wins for names it holds itself.
    let mut pd_owners = OwnerMap::new();
    let mut psd_owners = OwnerMap::new();
    for node in mgs.values().chain(std::iter::once(&mg)) {
        for pd in node.policy_definitions.keys() {
            pd_owners.insert(pd.clone(), node.name().to_string());
        }
        for psd in node.policy_set_definitions.keys() {
            psd_owners.insert(psd.clone(), node.name().to_string());
        }
    }

    modify_policy_definitions(&mut mg);
    modify_policy_set_definitions(&mut mg, &pd_owners);
    modify_policy_assignments(&mut mg, &pd_owners, &psd_owners, well_known)?;
    modify_role_definitions(&mut mg);

    if let Parent::ManagementGroup(p) = &parent {
        if let Some(parent_mg) = mgs.get_mut(p) {
            parent_mg.push_child(name);
        }
    }
    info!(
        management_group = %name,
        policy_definitions = mg.policy_definitions.len(),
        policy_set_definitions = mg.policy_set_definitions.len(),
        policy_assignments = mg.policy_assignments.len(),
        role_definitions = mg.role_definitions.len(),
        "Management group added"
    );
    mgs.insert(name.to_string(), mg);
    Ok(())
}

fn modify_policy_definitions(mg: &mut ManagementGroup) {
    let scope = mg.name().to_string();
    for (name, def) in &mut mg.policy_definitions {
        def.id = Some(policy_definition_id(&scope, name));
    }
}

/// Point set members at their owning node; unowned members are built-in and left alone.
fn modify_policy_set_definitions(mg: &mut ManagementGroup, pd_owners: &OwnerMap) {
    let scope = mg.name().to_string();
    for (name, set) in &mut mg.policy_set_definitions {
        set.id = Some(policy_set_definition_id(&scope, name));
        for reference in &mut set.properties.policy_definitions {
            let member = last_segment(&reference.policy_definition_id);
            if let Some(owner) = pd_owners.get(member) {
                reference.policy_definition_id = policy_definition_id(owner, member);
            }
        }
    }
}

fn modify_policy_assignments(
    mg: &mut ManagementGroup,
    pd_owners: &OwnerMap,
    psd_owners: &OwnerMap,
    well_known: &WellKnownPolicyValues,
) -> AlzResult<()> {
    let scope = mg.name().to_string();
    for (name, assignment) in &mut mg.policy_assignments {
        assignment.id = Some(policy_assignment_id(&scope, name));
        assignment.properties.scope = Some(management_group_id(&scope));
        if assignment.location.is_some() {
            assignment.location = Some(well_known.default_location.clone());
        }

        let id = &assignment.properties.policy_definition_id;
        let kind = ReferenceKind::from_resource_id(id).map_err(|_| {
            AlzError::AssignmentInvalidResourceType {
                assignment: name.clone(),
                id: id.clone(),
            }
        })?;
        let target = last_segment(id);
        let owners = match kind {
            ReferenceKind::PolicyDefinition => pd_owners,
            ReferenceKind::PolicySetDefinition => psd_owners,
        };
        if let Some(owner) = owners.get(target) {
            assignment.properties.policy_definition_id = kind.scoped_id(owner, target);
        }
    }
    Ok(())
}

/// Role definition names are a v5 UUID of node and role name, so ids are reproducible.
fn modify_role_definitions(mg: &mut ManagementGroup) {
    let scope = mg.name().to_string();
    let scope_id = mg.resource_id();
    for role in mg.role_definitions.values_mut() {
        let uuid = uuid_v5(&[&scope, &role.name]);
        role.id = Some(role_definition_id(&scope, &uuid.to_string()));
        role.properties.assignable_scopes = vec![scope_id.clone()];
    }
}
