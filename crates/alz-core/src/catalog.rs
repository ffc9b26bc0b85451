//! The catalog: every definition, assignment and archetype known to the library.
//!
//! All maps sit behind one `parking_lot::RwLock` owned by [`Catalog`]. Nothing
//! outside this module touches the maps directly; readers get owned clones.

use std::collections::{BTreeMap, BTreeSet};

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::archetype::{Archetype, EMPTY_ARCHETYPE, MemberKind};
use crate::error::{AlzError, AlzResult};
use crate::library::{LibArchetype, LibManagementGroup, LibraryResult, ParameterOverrides};
use crate::resources::{
    ParameterValue, PolicyAssignment, PolicyDefinition, PolicySetDefinition, ResourceKind,
    RoleDefinition,
};

#[derive(Debug)]
struct CatalogInner {
    policy_definitions: BTreeMap<String, PolicyDefinition>,
    policy_set_definitions: BTreeMap<String, PolicySetDefinition>,
    policy_assignments: BTreeMap<String, PolicyAssignment>,
    role_definitions: BTreeMap<String, RoleDefinition>,
    archetypes: BTreeMap<String, Archetype>,
    management_groups: BTreeMap<String, LibManagementGroup>,
}

impl CatalogInner {
    fn contains(&self, kind: MemberKind, name: &str) -> bool {
        match kind {
            MemberKind::PolicyDefinition => self.policy_definitions.contains_key(name),
            MemberKind::PolicySetDefinition => self.policy_set_definitions.contains_key(name),
            MemberKind::PolicyAssignment => self.policy_assignments.contains_key(name),
            MemberKind::RoleDefinition => self.role_definitions.contains_key(name),
        }
    }
}

/// Resources copied out of the catalog for one archetype.
#[derive(Debug, Clone, Default)]
pub struct ArchetypeResources {
    pub policy_definitions: BTreeMap<String, PolicyDefinition>,
    pub policy_set_definitions: BTreeMap<String, PolicySetDefinition>,
    pub policy_assignments: BTreeMap<String, PolicyAssignment>,
    pub role_definitions: BTreeMap<String, RoleDefinition>,
}

/// Thread-safe store of library and built-in resources.
#[derive(Debug)]
pub struct Catalog {
    inner: RwLock<CatalogInner>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}

impl Catalog {
    /// Create a catalog holding only the reserved empty archetype.
    #[must_use]
    pub fn new() -> Self {
        let mut archetypes = BTreeMap::new();
        archetypes.insert(EMPTY_ARCHETYPE.to_string(), Archetype::new(EMPTY_ARCHETYPE));
        Self {
            inner: RwLock::new(CatalogInner {
                policy_definitions: BTreeMap::new(),
                policy_set_definitions: BTreeMap::new(),
                policy_assignments: BTreeMap::new(),
                role_definitions: BTreeMap::new(),
                archetypes,
                management_groups: BTreeMap::new(),
            }),
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Merge
    // ─────────────────────────────────────────────────────────────────────

    /// Merge the definitions, assignments and management groups of a processed library.
    ///
    /// Collisions are checked for every entry before anything is inserted,
    /// so a rejected merge leaves the catalog unchanged.
    ///
    /// # Errors
    /// Returns `AlzError::AlreadyExists` on the first colliding name when
    /// `allow_overwrite` is false.
    pub fn add_result(&self, result: &LibraryResult, allow_overwrite: bool) -> AlzResult<()> {
        let mut inner = self.inner.write();

        if !allow_overwrite {
            check_collisions(
                &inner.policy_definitions,
                &result.policy_definitions,
                ResourceKind::PolicyDefinition,
            )?;
            check_collisions(
                &inner.policy_set_definitions,
                &result.policy_set_definitions,
                ResourceKind::PolicySetDefinition,
            )?;
            check_collisions(
                &inner.policy_assignments,
                &result.policy_assignments,
                ResourceKind::PolicyAssignment,
            )?;
            check_collisions(
                &inner.role_definitions,
                &result.role_definitions,
                ResourceKind::RoleDefinition,
            )?;
            check_collisions(
                &inner.management_groups,
                &result.management_groups,
                ResourceKind::ManagementGroup,
            )?;
        }

        inner.policy_definitions.extend(
            result
                .policy_definitions
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        inner.policy_set_definitions.extend(
            result
                .policy_set_definitions
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        inner.policy_assignments.extend(
            result
                .policy_assignments
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        inner.role_definitions.extend(
            result
                .role_definitions
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        inner.management_groups.extend(
            result
                .management_groups
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        Ok(())
    }

    /// Build archetypes from a processed library and apply its overlays.
    ///
    /// Definitions are built first, then extensions, then exclusions.
    /// Overlays may target archetypes from this call or an earlier one.
    /// Nothing is registered unless every archetype in the call succeeds.
    ///
    /// # Errors
    /// Returns an error if an archetype name is taken, a member name is not
    /// in the catalog, an overlay target does not exist, or an
    /// `archetype_config` entry cannot be applied.
    pub fn generate_archetypes(&self, result: &LibraryResult) -> AlzResult<()> {
        let mut inner = self.inner.write();
        let mut staged: BTreeMap<String, Archetype> = BTreeMap::new();

        for (name, la) in &result.archetypes {
            if inner.archetypes.contains_key(name) {
                return Err(AlzError::AlreadyExists {
                    kind: ResourceKind::Archetype,
                    name: name.clone(),
                });
            }
            let mut arch = Archetype::new(name.clone());
            for kind in MemberKind::ALL {
                for member in lib_members(la, kind) {
                    if !inner.contains(kind, member) {
                        return Err(AlzError::ArchetypeReferenceNotFound {
                            archetype: name.clone(),
                            kind: kind.into(),
                            name: member.clone(),
                        });
                    }
                    arch.add_member(kind, member)?;
                }
            }
            apply_archetype_config(&inner, &mut arch, &la.parameter_overrides, false)?;
            staged.insert(name.clone(), arch);
        }

        for ext in &result.archetype_extensions {
            let arch = staged_target(&inner, &mut staged, &ext.name)?;
            for kind in MemberKind::ALL {
                for member in lib_members(ext, kind) {
                    if !inner.contains(kind, member) {
                        return Err(AlzError::ArchetypeReferenceNotFound {
                            archetype: ext.name.clone(),
                            kind: kind.into(),
                            name: member.clone(),
                        });
                    }
                    arch.add_member(kind, member)?;
                }
            }
            apply_archetype_config(&inner, arch, &ext.parameter_overrides, true)?;
            debug!(archetype = %ext.name, "Archetype extension applied");
        }

        for exc in &result.archetype_exclusions {
            let arch = staged_target(&inner, &mut staged, &exc.name)?;
            for kind in MemberKind::ALL {
                for member in lib_members(exc, kind) {
                    arch.remove_member(kind, member)?;
                }
            }
            debug!(archetype = %exc.name, "Archetype exclusion applied");
        }

        let count = staged.len();
        inner.archetypes.extend(staged);
        info!(archetypes = count, "Archetypes generated");
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Built-in insertion
    // ─────────────────────────────────────────────────────────────────────

    /// Insert a fetched built-in policy definition.
    pub(crate) fn insert_policy_definition(&self, definition: PolicyDefinition) {
        self.inner
            .write()
            .policy_definitions
            .insert(definition.name.clone(), definition);
    }

    /// Insert a fetched built-in policy set definition.
    pub(crate) fn insert_policy_set_definition(&self, definition: PolicySetDefinition) {
        self.inner
            .write()
            .policy_set_definitions
            .insert(definition.name.clone(), definition);
    }

    // ─────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────

    #[must_use]
    pub fn policy_definition(&self, name: &str) -> Option<PolicyDefinition> {
        self.inner.read().policy_definitions.get(name).cloned()
    }

    #[must_use]
    pub fn policy_set_definition(&self, name: &str) -> Option<PolicySetDefinition> {
        self.inner.read().policy_set_definitions.get(name).cloned()
    }

    #[must_use]
    pub fn policy_assignment(&self, name: &str) -> Option<PolicyAssignment> {
        self.inner.read().policy_assignments.get(name).cloned()
    }

    #[must_use]
    pub fn role_definition(&self, name: &str) -> Option<RoleDefinition> {
        self.inner.read().role_definitions.get(name).cloned()
    }

    /// Management groups declared by the merged libraries.
    #[must_use]
    pub fn management_groups(&self) -> BTreeMap<String, LibManagementGroup> {
        self.inner.read().management_groups.clone()
    }

    /// Whether a resource of the given kind is present.
    #[must_use]
    pub fn contains(&self, kind: MemberKind, name: &str) -> bool {
        self.inner.read().contains(kind, name)
    }

    /// Sorted names of every resource of a kind.
    #[must_use]
    pub fn names(&self, kind: MemberKind) -> Vec<String> {
        let inner = self.inner.read();
        match kind {
            MemberKind::PolicyDefinition => inner.policy_definitions.keys().cloned().collect(),
            MemberKind::PolicySetDefinition => {
                inner.policy_set_definitions.keys().cloned().collect()
            }
            MemberKind::PolicyAssignment => inner.policy_assignments.keys().cloned().collect(),
            MemberKind::RoleDefinition => inner.role_definitions.keys().cloned().collect(),
        }
    }

    /// Sorted archetype names, including the reserved empty archetype.
    #[must_use]
    pub fn archetype_names(&self) -> Vec<String> {
        self.inner.read().archetypes.keys().cloned().collect()
    }

    /// Deep copy of a catalog archetype.
    ///
    /// # Errors
    /// Returns `AlzError::ArchetypeNotFound` if no archetype has this name.
    pub fn copy_archetype(&self, name: &str) -> AlzResult<Archetype> {
        self.inner
            .read()
            .archetypes
            .get(name)
            .cloned()
            .ok_or_else(|| AlzError::ArchetypeNotFound(name.to_string()))
    }

    /// Definition ids referenced by the assignments of every archetype.
    #[must_use]
    pub fn archetype_assignment_definition_ids(&self) -> Vec<String> {
        let inner = self.inner.read();
        let mut seen = BTreeSet::new();
        inner
            .archetypes
            .values()
            .flat_map(|arch| arch.policy_assignments.iter())
            .filter_map(|name| inner.policy_assignments.get(name))
            .map(|pa| pa.properties.policy_definition_id.clone())
            .filter(|id| seen.insert(id.clone()))
            .collect()
    }

    /// Copy every resource an archetype names out of the catalog.
    ///
    /// Archetype parameter overrides are applied to the copied assignments.
    ///
    /// # Errors
    /// Returns `AlzError::ReferenceNotFound` if a member is not in the catalog.
    pub fn archetype_resources(&self, archetype: &Archetype) -> AlzResult<ArchetypeResources> {
        let inner = self.inner.read();
        let mut resources = ArchetypeResources::default();

        for name in &archetype.policy_definitions {
            let def = inner
                .policy_definitions
                .get(name)
                .ok_or_else(|| missing(ResourceKind::PolicyDefinition, name, archetype))?;
            resources
                .policy_definitions
                .insert(name.clone(), def.clone());
        }
        for name in &archetype.policy_set_definitions {
            let def = inner
                .policy_set_definitions
                .get(name)
                .ok_or_else(|| missing(ResourceKind::PolicySetDefinition, name, archetype))?;
            resources
                .policy_set_definitions
                .insert(name.clone(), def.clone());
        }
        for name in &archetype.policy_assignments {
            let mut pa = inner
                .policy_assignments
                .get(name)
                .ok_or_else(|| missing(ResourceKind::PolicyAssignment, name, archetype))?
                .clone();
            if let Some(overrides) = archetype.overrides_for(name) {
                for (param, value) in overrides {
                    pa.properties
                        .parameters
                        .insert(param.clone(), ParameterValue::new(value.clone()));
                }
            }
            resources.policy_assignments.insert(name.clone(), pa);
        }
        for name in &archetype.role_definitions {
            let rd = inner
                .role_definitions
                .get(name)
                .ok_or_else(|| missing(ResourceKind::RoleDefinition, name, archetype))?;
            resources.role_definitions.insert(name.clone(), rd.clone());
        }
        Ok(resources)
    }
}

fn check_collisions<T>(
    existing: &BTreeMap<String, T>,
    incoming: &BTreeMap<String, T>,
    kind: ResourceKind,
) -> AlzResult<()> {
    match incoming.keys().find(|k| existing.contains_key(*k)) {
        Some(name) => Err(AlzError::AlreadyExists {
            kind,
            name: name.clone(),
        }),
        None => Ok(()),
    }
}

fn lib_members(la: &LibArchetype, kind: MemberKind) -> &[String] {
    match kind {
        MemberKind::PolicyDefinition => &la.policy_definitions,
        MemberKind::PolicySetDefinition => &la.policy_set_definitions,
        MemberKind::PolicyAssignment => &la.policy_assignments,
        MemberKind::RoleDefinition => &la.role_definitions,
    }
}

/// The staged copy of an overlay target, pulling it from the catalog if needed.
fn staged_target<'a>(
    inner: &CatalogInner,
    staged: &'a mut BTreeMap<String, Archetype>,
    name: &str,
) -> AlzResult<&'a mut Archetype> {
    if name == EMPTY_ARCHETYPE {
        return Err(AlzError::ArchetypeConfig {
            archetype: name.to_string(),
            message: "the reserved empty archetype cannot be modified".into(),
        });
    }
    if !staged.contains_key(name) {
        let existing = inner
            .archetypes
            .get(name)
            .cloned()
            .ok_or_else(|| AlzError::ArchetypeNotFound(name.to_string()))?;
        staged.insert(name.to_string(), existing);
    }
    staged
        .get_mut(name)
        .ok_or_else(|| AlzError::ArchetypeNotFound(name.to_string()))
}

/// Record `archetype_config.parameters` on an archetype.
///
/// An entry for an assignment outside the archetype is an error for
/// definitions and skipped for extensions. The parameter must exist on the
/// catalog assignment.
fn apply_archetype_config(
    inner: &CatalogInner,
    arch: &mut Archetype,
    config: &ParameterOverrides,
    skip_absent_assignments: bool,
) -> AlzResult<()> {
    for (assignment, parameters) in config {
        if !arch.policy_assignments.contains(assignment) {
            if skip_absent_assignments {
                warn!(
                    archetype = %arch.name(),
                    assignment = %assignment,
                    "Skipping archetype_config for assignment not in archetype"
                );
                continue;
            }
            return Err(AlzError::ArchetypeConfig {
                archetype: arch.name().to_string(),
                message: format!(
                    "cannot modify policy parameters of assignment {assignment} as it is not in the archetype"
                ),
            });
        }
        let Some(pa) = inner.policy_assignments.get(assignment) else {
            return Err(AlzError::ArchetypeReferenceNotFound {
                archetype: arch.name().to_string(),
                kind: ResourceKind::PolicyAssignment,
                name: assignment.clone(),
            });
        };
        for (parameter, value) in parameters {
            if !pa.properties.parameters.contains_key(parameter) {
                return Err(AlzError::ArchetypeConfig {
                    archetype: arch.name().to_string(),
                    message: format!(
                        "cannot modify policy parameter {parameter} of assignment {assignment} as it does not exist"
                    ),
                });
            }
            arch.set_parameter_override(assignment, parameter, value.clone());
        }
    }
    Ok(())
}

fn missing(kind: ResourceKind, name: &str, archetype: &Archetype) -> AlzError {
    AlzError::ReferenceNotFound {
        kind,
        name: name.to_string(),
        referenced_by: format!("archetype {}", archetype.name()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn assignment(name: &str) -> PolicyAssignment {
        let mut pa = PolicyAssignment::new(
            name,
            "/providers/Microsoft.Authorization/policyDefinitions/builtin-1",
        );
        pa.properties
            .parameters
            .insert("effect".into(), ParameterValue::new("Audit"));
        pa
    }

    fn library() -> LibraryResult {
        let mut result = LibraryResult::default();
        for name in ["pd1", "pd2"] {
            result
                .policy_definitions
                .insert(name.into(), PolicyDefinition::new(name));
        }
        result
            .policy_set_definitions
            .insert("psd1".into(), PolicySetDefinition::new("psd1"));
        result.policy_assignments.insert("pa1".into(), assignment("pa1"));
        result.policy_assignments.insert("pa2".into(), assignment("pa2"));
        result
            .role_definitions
            .insert("rd1".into(), RoleDefinition::new("rd1"));
        result
    }

    fn lib_archetype(name: &str) -> LibArchetype {
        LibArchetype {
            name: name.into(),
            policy_definitions: vec!["pd1".into()],
            policy_assignments: vec!["pa1".into()],
            role_definitions: vec!["rd1".into()],
            ..LibArchetype::default()
        }
    }

    #[test]
    fn new_catalog_has_empty_archetype() {
        let catalog = Catalog::new();
        assert_eq!(catalog.archetype_names(), vec![EMPTY_ARCHETYPE.to_string()]);
        let empty = catalog.copy_archetype(EMPTY_ARCHETYPE).unwrap();
        assert!(empty.policy_assignments.is_empty());
    }

    #[test]
    fn disjoint_merges_add_up() {
        let catalog = Catalog::new();
        catalog.add_result(&library(), false).unwrap();

        let mut second = LibraryResult::default();
        second
            .policy_definitions
            .insert("pd3".into(), PolicyDefinition::new("pd3"));
        catalog.add_result(&second, false).unwrap();

        assert_eq!(catalog.names(MemberKind::PolicyDefinition).len(), 3);
    }

    #[test]
    fn colliding_merge_is_rejected_and_atomic() {
        let catalog = Catalog::new();
        catalog.add_result(&library(), false).unwrap();

        let mut second = LibraryResult::default();
        second
            .policy_definitions
            .insert("pd-new".into(), PolicyDefinition::new("pd-new"));
        let mut replacement = RoleDefinition::new("rd1");
        replacement.properties.role_name = Some("changed".into());
        second.role_definitions.insert("rd1".into(), replacement);

        let err = catalog.add_result(&second, false).unwrap_err();
        assert_eq!(err.to_string(), "role definition rd1 already exists");
        assert!(!catalog.contains(MemberKind::PolicyDefinition, "pd-new"));
        assert_eq!(catalog.role_definition("rd1").unwrap().properties.role_name, None);
    }

    #[test]
    fn management_group_declarations_merge_and_collide() {
        let catalog = Catalog::new();
        let mut result = LibraryResult::default();
        result.management_groups.insert(
            "alz".into(),
            LibManagementGroup {
                name: "alz".into(),
                archetype: "root".into(),
                is_root: true,
                ..LibManagementGroup::default()
            },
        );
        catalog.add_result(&result, false).unwrap();
        assert!(catalog.management_groups()["alz"].is_root);

        let err = catalog.add_result(&result, false).unwrap_err();
        assert_eq!(err.to_string(), "management group alz already exists");
    }

    #[test]
    fn overwrite_replaces_entries() {
        let catalog = Catalog::new();
        catalog.add_result(&library(), false).unwrap();

        let mut second = LibraryResult::default();
        let mut replacement = RoleDefinition::new("rd1");
        replacement.properties.role_name = Some("changed".into());
        second.role_definitions.insert("rd1".into(), replacement);
        catalog.add_result(&second, true).unwrap();

        assert_eq!(
            catalog.role_definition("rd1").unwrap().properties.role_name.as_deref(),
            Some("changed")
        );
    }

    #[test]
    fn generates_archetypes() {
        let catalog = Catalog::new();
        let mut result = library();
        let mut la = lib_archetype("root");
        la.parameter_overrides
            .entry("pa1".into())
            .or_default()
            .insert("effect".into(), json!("Deny"));
        result.archetypes.insert("root".into(), la);
        catalog.add_result(&result, false).unwrap();
        catalog.generate_archetypes(&result).unwrap();

        let root = catalog.copy_archetype("root").unwrap();
        assert!(root.policy_definitions.contains("pd1"));
        assert_eq!(root.overrides_for("pa1").unwrap()["effect"], json!("Deny"));
    }

    #[test]
    fn missing_reference_fails_without_registering() {
        let catalog = Catalog::new();
        let mut result = library();
        result.archetypes.insert("good".into(), lib_archetype("good"));
        let mut bad = lib_archetype("bad");
        bad.policy_definitions.push("does-not-exist".into());
        result.archetypes.insert("bad".into(), bad);
        catalog.add_result(&result, false).unwrap();

        let err = catalog.generate_archetypes(&result).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("bad"), "{msg}");
        assert!(msg.contains("does-not-exist"), "{msg}");
        assert!(catalog.copy_archetype("bad").is_err());
        assert!(catalog.copy_archetype("good").is_err());
    }

    #[test]
    fn duplicate_archetype_name_fails() {
        let catalog = Catalog::new();
        let mut result = library();
        result.archetypes.insert("root".into(), lib_archetype("root"));
        catalog.add_result(&result, false).unwrap();
        catalog.generate_archetypes(&result).unwrap();

        let err = catalog.generate_archetypes(&result).unwrap_err();
        assert!(matches!(err, AlzError::AlreadyExists { kind: ResourceKind::Archetype, .. }));
    }

    #[test]
    fn reserved_empty_name_is_rejected() {
        let catalog = Catalog::new();
        let mut result = library();
        result
            .archetypes
            .insert(EMPTY_ARCHETYPE.into(), lib_archetype(EMPTY_ARCHETYPE));
        catalog.add_result(&result, false).unwrap();
        assert!(catalog.generate_archetypes(&result).is_err());
    }

    #[test]
    fn config_for_assignment_outside_archetype_fails() {
        let catalog = Catalog::new();
        let mut result = library();
        let mut la = lib_archetype("root");
        la.parameter_overrides
            .entry("pa2".into())
            .or_default()
            .insert("effect".into(), json!("Deny"));
        result.archetypes.insert("root".into(), la);
        catalog.add_result(&result, false).unwrap();

        let err = catalog.generate_archetypes(&result).unwrap_err();
        assert!(matches!(err, AlzError::ArchetypeConfig { .. }));
    }

    #[test]
    fn config_for_unknown_parameter_fails() {
        let catalog = Catalog::new();
        let mut result = library();
        let mut la = lib_archetype("root");
        la.parameter_overrides
            .entry("pa1".into())
            .or_default()
            .insert("nope".into(), json!(1));
        result.archetypes.insert("root".into(), la);
        catalog.add_result(&result, false).unwrap();

        let err = catalog.generate_archetypes(&result).unwrap_err();
        assert!(err.to_string().contains("nope"));
    }

    #[test]
    fn extensions_and_exclusions_overlay_archetypes() {
        let catalog = Catalog::new();
        let mut result = library();
        result.archetypes.insert("root".into(), lib_archetype("root"));

        let mut ext = LibArchetype {
            name: "root".into(),
            policy_assignments: vec!["pa2".into()],
            policy_set_definitions: vec!["psd1".into()],
            ..LibArchetype::default()
        };
        ext.parameter_overrides
            .entry("not-in-archetype".into())
            .or_default()
            .insert("effect".into(), json!("Deny"));
        result.archetype_extensions.push(ext);
        result.archetype_exclusions.push(LibArchetype {
            name: "root".into(),
            role_definitions: vec!["rd1".into()],
            ..LibArchetype::default()
        });

        catalog.add_result(&result, false).unwrap();
        catalog.generate_archetypes(&result).unwrap();

        let root = catalog.copy_archetype("root").unwrap();
        assert!(root.policy_assignments.contains("pa2"));
        assert!(root.policy_set_definitions.contains("psd1"));
        assert!(root.role_definitions.is_empty());
    }

    #[test]
    fn extension_with_duplicate_member_fails() {
        let catalog = Catalog::new();
        let mut result = library();
        result.archetypes.insert("root".into(), lib_archetype("root"));
        result.archetype_extensions.push(LibArchetype {
            name: "root".into(),
            policy_definitions: vec!["pd1".into()],
            ..LibArchetype::default()
        });
        catalog.add_result(&result, false).unwrap();

        let err = catalog.generate_archetypes(&result).unwrap_err();
        assert!(matches!(err, AlzError::DuplicateArchetypeMember { .. }));
        assert!(catalog.copy_archetype("root").is_err());
    }

    #[test]
    fn overlay_on_missing_archetype_fails() {
        let catalog = Catalog::new();
        let mut result = library();
        result.archetype_exclusions.push(LibArchetype {
            name: "ghost".into(),
            ..LibArchetype::default()
        });
        catalog.add_result(&result, false).unwrap();
        assert!(matches!(
            catalog.generate_archetypes(&result),
            Err(AlzError::ArchetypeNotFound(_))
        ));
    }

    #[test]
    fn archetype_resources_are_independent_copies() {
        let catalog = Catalog::new();
        let mut result = library();
        let mut la = lib_archetype("root");
        la.parameter_overrides
            .entry("pa1".into())
            .or_default()
            .insert("effect".into(), json!("Deny"));
        result.archetypes.insert("root".into(), la);
        catalog.add_result(&result, false).unwrap();
        catalog.generate_archetypes(&result).unwrap();

        let root = catalog.copy_archetype("root").unwrap();
        let mut resources = catalog.archetype_resources(&root).unwrap();
        assert_eq!(
            resources.policy_assignments["pa1"].properties.parameters["effect"].value,
            json!("Deny")
        );

        resources
            .role_definitions
            .get_mut("rd1")
            .unwrap()
            .properties
            .assignable_scopes
            .push("/mutated".into());
        assert!(catalog
            .role_definition("rd1")
            .unwrap()
            .properties
            .assignable_scopes
            .is_empty());
        assert_eq!(
            catalog.policy_assignment("pa1").unwrap().properties.parameters["effect"].value,
            json!("Audit")
        );
    }

    #[test]
    fn lists_assignment_definition_ids_once() {
        let catalog = Catalog::new();
        let mut result = library();
        let mut la = lib_archetype("root");
        la.policy_assignments.push("pa2".into());
        result.archetypes.insert("root".into(), la);
        catalog.add_result(&result, false).unwrap();
        catalog.generate_archetypes(&result).unwrap();

        assert_eq!(
            catalog.archetype_assignment_definition_ids(),
            vec!["/providers/Microsoft.Authorization/policyDefinitions/builtin-1".to_string()]
        );
    }
}
