//! Management group hierarchies declared in a library.
//!
//! `management_group_*` files describe a tree: exactly one declaration is
//! the root and the rest hang below it through `children` lists. Planning
//! checks the whole tree and orders it parents-first, ready for
//! [`Deployment::add_hierarchy`](crate::Deployment::add_hierarchy).

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use tracing::{debug, warn};

use crate::error::{AlzError, AlzResult};
use crate::library::LibManagementGroup;
use crate::management_group::Parent;

/// A management group to add, with its parent resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HierarchyNode {
    pub name: String,
    pub display_name: String,
    pub parent: Parent,
    pub archetype: String,
}

/// Order declared management groups breadth-first from the root.
///
/// The root hangs below `external_parent` when one is given and has no
/// parent otherwise. Declarations the root cannot reach are skipped.
///
/// # Errors
/// Returns an error if no declaration or more than one is the root, a
/// child is not declared, or a management group is reached twice.
pub fn plan_hierarchy(
    groups: &BTreeMap<String, LibManagementGroup>,
    external_parent: Option<&str>,
) -> AlzResult<Vec<HierarchyNode>> {
    let mut roots = groups.values().filter(|mg| mg.is_root);
    let root = roots.next().ok_or(AlzError::NoRootManagementGroup)?;
    if let Some(other) = roots.next() {
        return Err(AlzError::MultipleRootManagementGroups {
            existing: root.name.clone(),
            requested: other.name.clone(),
        });
    }

    let root_parent = external_parent.map_or(Parent::None, |p| Parent::External(p.to_string()));
    let mut queue = VecDeque::from([(root, root_parent)]);
    let mut seen = BTreeSet::new();
    let mut plan = Vec::with_capacity(groups.len());

    while let Some((mg, parent)) = queue.pop_front() {
        if !seen.insert(mg.name.as_str()) {
            return Err(AlzError::RepeatedManagementGroup(mg.name.clone()));
        }
        for child in &mg.children {
            let declared = groups
                .get(child)
                .ok_or_else(|| AlzError::UndeclaredManagementGroup {
                    name: child.clone(),
                    parent: mg.name.clone(),
                })?;
            queue.push_back((declared, Parent::ManagementGroup(mg.name.clone())));
        }
        plan.push(HierarchyNode {
            name: mg.name.clone(),
            display_name: mg.display_name.clone(),
            parent,
            archetype: mg.archetype.clone(),
        });
    }

    for name in groups.keys().filter(|n| !seen.contains(n.as_str())) {
        warn!(management_group = %name, "Management group is not reachable from the root, skipping");
    }
    debug!(root = %root.name, management_groups = plan.len(), "Hierarchy planned");
    Ok(plan)
}
