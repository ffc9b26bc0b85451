//! Shared fixtures for alz-core integration tests.

#![allow(dead_code)]

use std::collections::BTreeSet;
use std::io::{self, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use alz_core::{
    ClientError, MemorySource, PolicyClient, PolicyDefinition, PolicySetDefinition,
};
use async_trait::async_trait;
use serde_json::{Value, json};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt};

pub const LAW_ID: &str = "/subscriptions/00000000-0000-0000-0000-000000000000/resourceGroups/mgmt/providers/Microsoft.OperationalInsights/workspaces/law";
pub const RG_SCOPE: &str =
    "/subscriptions/00000000-0000-0000-0000-000000000000/resourceGroups/my-rg";
pub const ROLE_R1: &str =
    "/providers/Microsoft.Authorization/roleDefinitions/4d97b98b-1d4f-4787-a291-c67834d212e7";

// ─────────────────────────────────────────────────────────────────────────────
// Fake policy client
// ─────────────────────────────────────────────────────────────────────────────

/// Returns an audit-only built-in for any name, unless told to fail.
#[derive(Default)]
pub struct FakePolicyClient {
    pub fail: BTreeSet<String>,
    pub calls: AtomicUsize,
    pub requested: Mutex<Vec<String>>,
}

impl FakePolicyClient {
    pub fn failing_on(names: &[&str]) -> Self {
        Self {
            fail: names.iter().map(ToString::to_string).collect(),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requested(&self) -> Vec<String> {
        let mut names = self
            .requested
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone();
        names.sort();
        names
    }

    fn record(&self, name: &str) -> Result<(), ClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requested
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(name.to_string());
        if self.fail.contains(name) {
            return Err(format!("built-in {name} unavailable").into());
        }
        Ok(())
    }
}

#[async_trait]
impl PolicyClient for FakePolicyClient {
    async fn get_builtin_policy_definition(
        &self,
        name: &str,
    ) -> Result<PolicyDefinition, ClientError> {
        self.record(name)?;
        let mut def = PolicyDefinition::new(name);
        def.id = Some(format!(
            "/providers/Microsoft.Authorization/policyDefinitions/{name}"
        ));
        def.properties.policy_type = Some("BuiltIn".into());
        def.properties.policy_rule = Some(json!({
            "if": { "field": "type", "equals": "Microsoft.Storage/storageAccounts" },
            "then": { "effect": "audit" }
        }));
        Ok(def)
    }

    async fn get_builtin_policy_set_definition(
        &self,
        name: &str,
    ) -> Result<PolicySetDefinition, ClientError> {
        self.record(name)?;
        Ok(PolicySetDefinition::new(name))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Library fixtures
// ─────────────────────────────────────────────────────────────────────────────

fn custom_definition_id(name: &str) -> String {
    format!(
        "/providers/Microsoft.Management/managementGroups/placeholder/providers/Microsoft.Authorization/policyDefinitions/{name}"
    )
}

/// The documents of a small landing-zone library with one archetype.
pub fn library_documents() -> Vec<(&'static str, Value)> {
    vec![
        (
            "policy_definition_deploy_diag.json",
            json!({
                "name": "Deploy-Diag",
                "type": "Microsoft.Authorization/policyDefinitions",
                "properties": {
                    "policyType": "Custom",
                    "mode": "Indexed",
                    "parameters": {
                        "logAnalytics": {
                            "type": "String",
                            "metadata": { "displayName": "Workspace", "assignPermissions": true }
                        }
                    },
                    "policyRule": {
                        "if": { "field": "type", "equals": "Microsoft.KeyVault/vaults" },
                        "then": {
                            "effect": "deployIfNotExists",
                            "details": { "roleDefinitionIds": [ROLE_R1] }
                        }
                    }
                }
            }),
        ),
        (
            "policy_set_definition_enforce_guardrails.json",
            json!({
                "name": "Enforce-Guardrails",
                "type": "Microsoft.Authorization/policySetDefinitions",
                "properties": {
                    "policyType": "Custom",
                    "parameters": { "workspaceId": { "type": "String" } },
                    "policyDefinitions": [
                        {
                            "policyDefinitionReferenceId": "diag",
                            "policyDefinitionId": custom_definition_id("Deploy-Diag"),
                            "parameters": {
                                "logAnalytics": { "value": "[parameters('workspaceId')]" }
                            }
                        },
                        {
                            "policyDefinitionReferenceId": "audit",
                            "policyDefinitionId": "/providers/Microsoft.Authorization/policyDefinitions/builtin-audit"
                        }
                    ]
                }
            }),
        ),
        (
            "policy_assignment_deploy_azactivity_log.json",
            json!({
                "name": "Deploy-AzActivity-Log",
                "type": "Microsoft.Authorization/policyAssignments",
                "location": "placeholder",
                "identity": { "type": "SystemAssigned" },
                "properties": {
                    "policyDefinitionId": custom_definition_id("Deploy-Diag"),
                    "parameters": { "logAnalytics": { "value": "placeholder" } }
                }
            }),
        ),
        (
            "policy_assignment_enforce_guardrails.json",
            json!({
                "name": "Enforce-Guardrails",
                "type": "Microsoft.Authorization/policyAssignments",
                "location": "placeholder",
                "identity": { "type": "SystemAssigned" },
                "properties": {
                    "policyDefinitionId": "/providers/Microsoft.Management/managementGroups/placeholder/providers/Microsoft.Authorization/policySetDefinitions/Enforce-Guardrails",
                    "parameters": { "workspaceId": { "value": RG_SCOPE } }
                }
            }),
        ),
        (
            "policy_assignment_deny_builtin.json",
            json!({
                "name": "Deny-Builtin",
                "type": "Microsoft.Authorization/policyAssignments",
                "properties": {
                    "policyDefinitionId": "/providers/Microsoft.Authorization/policyDefinitions/builtin-deny",
                    "enforcementMode": "Default"
                }
            }),
        ),
        (
            "role_definition_network_ops.json",
            json!({
                "name": "network-ops",
                "type": "Microsoft.Authorization/roleDefinitions",
                "properties": {
                    "roleName": "Network Operations",
                    "permissions": [{ "actions": ["Microsoft.Network/*"] }],
                    "assignableScopes": ["/placeholder"]
                }
            }),
        ),
        (
            "archetype_definition_root.json",
            json!({
                "root": {
                    "policy_assignments": ["Deploy-AzActivity-Log", "Enforce-Guardrails", "Deny-Builtin"],
                    "policy_definitions": ["Deploy-Diag"],
                    "policy_set_definitions": ["Enforce-Guardrails"],
                    "role_definitions": ["network-ops"]
                }
            }),
        ),
    ]
}

pub fn library() -> MemorySource {
    library_documents()
        .into_iter()
        .fold(MemorySource::new("test-library"), |source, (name, doc)| {
            source.with_json(name, &doc)
        })
}

/// A second library: only its definitions should be merged.
pub fn extra_library() -> MemorySource {
    MemorySource::new("extra-library")
        .with_json(
            "policy_definition_extra.json",
            &json!({
                "name": "Extra-Definition",
                "properties": { "policyRule": { "if": {}, "then": { "effect": "audit" } } }
            }),
        )
        .with_json(
            "policy_assignment_ignored.json",
            &json!({
                "name": "Ignored-Assignment",
                "properties": { "policyDefinitionId": "/providers/Microsoft.Authorization/policyDefinitions/x" }
            }),
        )
        .with_json(
            "archetype_definition_ignored.json",
            &json!({ "ignored": { "policy_assignments": ["Ignored-Assignment"] } }),
        )
}

// ─────────────────────────────────────────────────────────────────────────────
// Log capture
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct LogCapture {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl LogCapture {
    pub fn install_json(&self, filter: EnvFilter) -> tracing::subscriber::DefaultGuard {
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(self.clone())
            .json()
            .with_ansi(false)
            .with_target(false)
            .with_current_span(false)
            .flatten_event(true);
        let subscriber = tracing_subscriber::registry().with(filter).with(layer);
        tracing::subscriber::set_default(subscriber)
    }

    pub fn lines(&self) -> Vec<Value> {
        let guard = self
            .bytes
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        String::from_utf8_lossy(&guard)
            .lines()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect()
    }
}

pub struct LogCaptureWriter {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl Write for LogCaptureWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.bytes
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for LogCapture {
    type Writer = LogCaptureWriter;

    fn make_writer(&'a self) -> Self::Writer {
        LogCaptureWriter {
            bytes: Arc::clone(&self.bytes),
        }
    }
}
