//! End-to-end: library → catalog → built-ins → management group → role assignments.

mod common;

use std::sync::Arc;

use alz_core::{
    AlzError, AlzLib, AlzLibOptions, DirectorySource, LibrarySource, MemberKind, MemorySource,
    Parent, ResourceKind, WellKnownPolicyValues, process_library,
};
use common::{FakePolicyClient, LAW_ID, LogCapture, RG_SCOPE, ROLE_R1};
use pretty_assertions::assert_eq;
use serde_json::json;
use tracing_subscriber::EnvFilter;

fn options() -> AlzLibOptions {
    AlzLibOptions::default()
        .with_parallelism(4)
        .with_well_known_values(WellKnownPolicyValues::new("eastus", LAW_ID))
}

async fn deploy(client: Arc<FakePolicyClient>) -> AlzLib {
    let alz = AlzLib::new(options()).unwrap().with_policy_client(client);
    alz.init(&[&common::library(), &common::extra_library()])
        .await
        .unwrap();
    let root = alz.copy_archetype_with_well_known_values("root").unwrap();
    alz.add_management_group(
        "alz",
        "Azure Landing Zones",
        Parent::External("tenant-root".into()),
        &root,
    )
    .unwrap();
    alz.generate_policy_assignment_additional_role_assignments("alz")
        .unwrap();
    alz
}

#[tokio::test]
async fn single_archetype_root_end_to_end() {
    let client = Arc::new(FakePolicyClient::default());
    let alz = deploy(client.clone()).await;

    // Built-ins referenced by assignments and by the local set are fetched once each.
    assert_eq!(client.requested(), vec!["builtin-audit", "builtin-deny"]);

    let mg = alz.deployment().management_group("alz").unwrap();
    assert_eq!(mg.display_name(), "Azure Landing Zones");
    assert_eq!(mg.parent(), &Parent::External("tenant-root".into()));
    assert_eq!(mg.policy_definitions.len(), 1);
    assert_eq!(mg.policy_set_definitions.len(), 1);
    assert_eq!(mg.policy_assignments.len(), 3);
    assert_eq!(mg.role_definitions.len(), 1);

    for (name, pa) in &mg.policy_assignments {
        assert_eq!(
            pa.id.as_deref(),
            Some(&*format!(
                "/providers/Microsoft.Management/managementGroups/alz/providers/Microsoft.Authorization/policyAssignments/{name}"
            ))
        );
        assert_eq!(
            pa.properties.scope.as_deref(),
            Some("/providers/Microsoft.Management/managementGroups/alz")
        );
    }

    let activity = &mg.policy_assignments["Deploy-AzActivity-Log"];
    assert_eq!(activity.location.as_deref(), Some("eastus"));
    assert_eq!(activity.properties.parameters["logAnalytics"].value, json!(LAW_ID));

    let deny = &mg.policy_assignments["Deny-Builtin"];
    assert_eq!(
        deny.properties.policy_definition_id,
        "/providers/Microsoft.Authorization/policyDefinitions/builtin-deny"
    );
    assert!(deny.location.is_none());

    // Every identity-bearing assignment has an entry; the others do not.
    let derived = &mg.additional_role_assignments;
    assert_eq!(
        derived.keys().cloned().collect::<Vec<_>>(),
        vec!["Deploy-AzActivity-Log".to_string(), "Enforce-Guardrails".to_string()]
    );
    assert_eq!(derived["Deploy-AzActivity-Log"].role_definition_ids, vec![ROLE_R1]);
    assert_eq!(derived["Deploy-AzActivity-Log"].additional_scopes, vec![LAW_ID]);
    assert_eq!(derived["Enforce-Guardrails"].role_definition_ids, vec![ROLE_R1]);
    assert_eq!(derived["Enforce-Guardrails"].additional_scopes, vec![RG_SCOPE]);
}

/// The test library plus a declared three-node hierarchy.
fn hierarchy_library(landing_zone_archetype: &str) -> MemorySource {
    common::library()
        .with_json(
            "management_group_alz.json",
            &json!({
                "name": "alz",
                "display_name": "Azure Landing Zones",
                "archetype": "root",
                "is_root": true,
                "children": ["platform", "landing-zones"]
            }),
        )
        .with_json(
            "management_group_platform.json",
            &json!({ "name": "platform", "display_name": "Platform", "archetype": "empty" }),
        )
        .with_json(
            "management_group_landing_zones.json",
            &json!({
                "name": "landing-zones",
                "display_name": "Landing Zones",
                "archetype": landing_zone_archetype
            }),
        )
}

#[tokio::test]
async fn declared_hierarchy_end_to_end() {
    let alz = AlzLib::new(options())
        .unwrap()
        .with_policy_client(Arc::new(FakePolicyClient::default()));
    alz.init(&[&hierarchy_library("empty")]).await.unwrap();
    alz.add_management_groups_from_library(Some("tenant-root"))
        .unwrap();

    let deployment = alz.deployment();
    assert_eq!(
        deployment.management_group_names(),
        vec!["alz".to_string(), "landing-zones".to_string(), "platform".to_string()]
    );
    assert_eq!(deployment.root().as_deref(), Some("alz"));
    assert_eq!(
        deployment.children("alz").unwrap(),
        vec!["platform".to_string(), "landing-zones".to_string()]
    );
    assert_eq!(
        deployment.parent("landing-zones"),
        Some(Parent::ManagementGroup("alz".into()))
    );

    let root = deployment.management_group("alz").unwrap();
    assert_eq!(root.parent(), &Parent::External("tenant-root".into()));
    assert_eq!(root.policy_assignments.len(), 3);
    assert_eq!(
        root.policy_assignments["Deploy-AzActivity-Log"].location.as_deref(),
        Some("eastus")
    );
    assert_eq!(
        deployment.management_group("landing-zones").unwrap().display_name(),
        "Landing Zones"
    );

    alz.generate_policy_assignment_additional_role_assignments("alz")
        .unwrap();
    let derived = deployment.management_group("alz").unwrap().additional_role_assignments;
    assert_eq!(derived["Deploy-AzActivity-Log"].additional_scopes, vec![LAW_ID]);
}

#[tokio::test]
async fn failed_hierarchy_leaves_deployment_empty() {
    let alz = AlzLib::new(options())
        .unwrap()
        .with_policy_client(Arc::new(FakePolicyClient::default()));
    alz.init(&[&hierarchy_library("missing")]).await.unwrap();

    let err = alz.add_management_groups_from_library(None).unwrap_err();
    assert_eq!(
        err.to_string(),
        "archetype missing not found when converting management group landing-zones"
    );
    assert!(alz.deployment().management_group_names().is_empty());
}

#[tokio::test]
async fn later_libraries_contribute_definitions_only() {
    let alz = deploy(Arc::new(FakePolicyClient::default())).await;
    let catalog = alz.catalog();

    assert!(catalog.contains(MemberKind::PolicyDefinition, "Extra-Definition"));
    assert!(!catalog.contains(MemberKind::PolicyAssignment, "Ignored-Assignment"));
    assert!(!catalog.archetype_names().contains(&"ignored".to_string()));
}

#[tokio::test]
async fn pipeline_is_deterministic() {
    let first = deploy(Arc::new(FakePolicyClient::default())).await;
    let second = deploy(Arc::new(FakePolicyClient::default())).await;

    let a = first.deployment().management_group("alz").unwrap();
    let b = second.deployment().management_group("alz").unwrap();
    assert_eq!(
        a.role_definitions["network-ops"].id,
        b.role_definitions["network-ops"].id
    );
    assert_eq!(
        serde_json::to_string(&a).unwrap(),
        serde_json::to_string(&b).unwrap()
    );
    assert_eq!(
        a.role_definitions["network-ops"].properties.assignable_scopes,
        vec!["/providers/Microsoft.Management/managementGroups/alz".to_string()]
    );
}

#[tokio::test]
async fn second_root_is_rejected() {
    let alz = deploy(Arc::new(FakePolicyClient::default())).await;
    let root = alz.copy_archetype_with_well_known_values("root").unwrap();

    let err = alz
        .add_management_group("alz-2", "Second", Parent::External("tenant-root".into()), &root)
        .unwrap_err();
    assert!(matches!(err, AlzError::MultipleRootManagementGroups { .. }));
    assert_eq!(alz.deployment().management_group_names(), vec!["alz".to_string()]);
}

#[tokio::test]
async fn failed_fetch_fails_init() {
    let client = Arc::new(FakePolicyClient::failing_on(&["builtin-deny"]));
    let alz = AlzLib::new(options()).unwrap().with_policy_client(client);
    let err = alz.init(&[&common::library()]).await.unwrap_err();

    match err {
        AlzError::BuiltInFetch { kind, name, .. } => {
            assert_eq!(kind, ResourceKind::PolicyDefinition);
            assert_eq!(name, "builtin-deny");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn init_without_client_needs_builtins() {
    let alz = AlzLib::new(options()).unwrap();
    let err = alz.init(&[&common::library()]).await.unwrap_err();
    assert!(matches!(err, AlzError::PolicyClientNotConfigured));
}

#[tokio::test]
async fn init_from_directory() {
    let dir = tempfile::tempdir().unwrap();
    for (name, doc) in common::library_documents() {
        std::fs::write(dir.path().join(name), doc.to_string()).unwrap();
    }
    let source = DirectorySource::new(dir.path());
    let client = Arc::new(FakePolicyClient::default());
    let alz = AlzLib::new(options())
        .unwrap()
        .with_policy_client(client.clone());
    alz.init(&[&source as &dyn LibrarySource]).await.unwrap();

    assert!(alz.catalog().archetype_names().contains(&"root".to_string()));
    assert_eq!(client.calls(), 2);
}

#[test]
fn skipped_extension_config_is_logged() {
    let capture = LogCapture::default();
    let _guard = capture.install_json(EnvFilter::new("warn"));

    let source = common::library().with_json(
        "archetype_extension_root.json",
        &json!({
            "extend_root": {
                "archetype_config": {
                    "parameters": { "Not-In-Root": { "effect": "Deny" } }
                }
            }
        }),
    );
    let result = process_library(&source).unwrap();
    let alz = AlzLib::new(options()).unwrap();
    alz.add_result(&result).unwrap();
    alz.generate_archetypes(&result).unwrap();

    let lines = capture.lines();
    assert!(
        lines.iter().any(|l| l["assignment"] == "Not-In-Root"
            && l["message"]
                .as_str()
                .is_some_and(|m| m.contains("archetype_config"))),
        "expected a warning, got {lines:?}"
    );
}
