//! Built-in definition resolver.
//!
//! Assignments frequently reference provider-owned definitions that no
//! library ships. The resolver fetches those on demand through a
//! [`PolicyClient`], at most `parallelism` requests at a time, and writes
//! each result into the catalog as it arrives.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument};

use crate::archetype::MemberKind;
use crate::catalog::Catalog;
use crate::error::{AlzError, AlzResult, ClientError};
use crate::resource_id::{ReferenceKind, last_segment};
use crate::resources::{PolicyDefinition, PolicySetDefinition, ResourceKind};

/// Source of provider built-in policy definitions.
#[async_trait]
pub trait PolicyClient: Send + Sync {
    /// Fetch a built-in policy definition by name.
    async fn get_builtin_policy_definition(
        &self,
        name: &str,
    ) -> Result<PolicyDefinition, ClientError>;

    /// Fetch a built-in policy set definition by name.
    async fn get_builtin_policy_set_definition(
        &self,
        name: &str,
    ) -> Result<PolicySetDefinition, ClientError>;
}

/// A definition type the resolver knows how to fetch and store.
#[async_trait]
trait BuiltIn: Sized + Send + 'static {
    const KIND: ResourceKind;
    const MEMBER: MemberKind;

    async fn fetch(client: &dyn PolicyClient, name: &str) -> Result<Self, ClientError>;

    fn store(self, catalog: &Catalog);
}

#[async_trait]
impl BuiltIn for PolicyDefinition {
    const KIND: ResourceKind = ResourceKind::PolicyDefinition;
    const MEMBER: MemberKind = MemberKind::PolicyDefinition;

    async fn fetch(client: &dyn PolicyClient, name: &str) -> Result<Self, ClientError> {
        client.get_builtin_policy_definition(name).await
    }

    fn store(self, catalog: &Catalog) {
        catalog.insert_policy_definition(self);
    }
}

#[async_trait]
impl BuiltIn for PolicySetDefinition {
    const KIND: ResourceKind = ResourceKind::PolicySetDefinition;
    const MEMBER: MemberKind = MemberKind::PolicySetDefinition;

    async fn fetch(client: &dyn PolicyClient, name: &str) -> Result<Self, ClientError> {
        client.get_builtin_policy_set_definition(name).await
    }

    fn store(self, catalog: &Catalog) {
        catalog.insert_policy_set_definition(self);
    }
}

/// Fetches missing built-in definitions into a catalog.
pub struct BuiltInResolver<'a> {
    catalog: &'a Catalog,
    client: Option<Arc<dyn PolicyClient>>,
    parallelism: usize,
}

impl<'a> BuiltInResolver<'a> {
    /// Create a resolver over `catalog`.
    ///
    /// # Errors
    /// Returns `AlzError::InvalidConfig` if `parallelism` is zero.
    pub fn new(
        catalog: &'a Catalog,
        client: Option<Arc<dyn PolicyClient>>,
        parallelism: usize,
    ) -> AlzResult<Self> {
        if parallelism == 0 {
            return Err(AlzError::InvalidConfig(
                "parallelism must be greater than zero".into(),
            ));
        }
        Ok(Self {
            catalog,
            client,
            parallelism,
        })
    }

    /// Make sure every definition behind `ids` is in the catalog.
    ///
    /// Policy definitions already present are skipped. Policy set
    /// definitions already present are still checked for missing members.
    ///
    /// # Errors
    /// Returns `AlzError::InvalidResourceType` for an id that is neither a
    /// policy definition nor a policy set definition, and any fetch error.
    #[instrument(skip_all, fields(ids = ids.len()))]
    pub async fn resolve_references(&self, ids: &[String]) -> AlzResult<()> {
        let mut definitions = Vec::new();
        let mut set_definitions = Vec::new();
        for id in ids {
            let name = last_segment(id).to_string();
            match ReferenceKind::from_resource_id(id)? {
                ReferenceKind::PolicyDefinition => {
                    if !self.catalog.contains(MemberKind::PolicyDefinition, &name) {
                        definitions.push(name);
                    }
                }
                ReferenceKind::PolicySetDefinition => set_definitions.push(name),
            }
        }

        if !definitions.is_empty() {
            self.fetch_builtin_definitions(&definitions).await?;
        }
        if !set_definitions.is_empty() {
            let missing_sets: Vec<String> = set_definitions
                .iter()
                .filter(|n| !self.catalog.contains(MemberKind::PolicySetDefinition, n))
                .cloned()
                .collect();
            if !missing_sets.is_empty() {
                self.fetch::<PolicySetDefinition>(&missing_sets).await?;
            }
            self.fetch_set_members(&set_definitions).await?;
        }
        Ok(())
    }

    /// Fetch built-in policy definitions that are not yet in the catalog.
    ///
    /// # Errors
    /// Returns `AlzError::PolicyClientNotConfigured` without a client, or the
    /// first fetch error; in-flight requests are cancelled.
    #[instrument(skip_all, fields(names = names.len()))]
    pub async fn fetch_builtin_definitions(&self, names: &[String]) -> AlzResult<()> {
        self.fetch::<PolicyDefinition>(names).await.map(|_| ())
    }

    /// Fetch built-in policy set definitions, then every definition they reference.
    ///
    /// # Errors
    /// As [`fetch_builtin_definitions`](Self::fetch_builtin_definitions).
    #[instrument(skip_all, fields(names = names.len()))]
    pub async fn fetch_builtin_set_definitions(&self, names: &[String]) -> AlzResult<()> {
        let fetched = self.fetch::<PolicySetDefinition>(names).await?;
        self.fetch_set_members(&fetched).await
    }

    async fn fetch_set_members(&self, set_names: &[String]) -> AlzResult<()> {
        let mut members = BTreeSet::new();
        for set_name in set_names {
            let Some(set) = self.catalog.policy_set_definition(set_name) else {
                continue;
            };
            for reference in &set.properties.policy_definitions {
                let name = last_segment(&reference.policy_definition_id);
                if !self.catalog.contains(MemberKind::PolicyDefinition, name) {
                    members.insert(name.to_string());
                }
            }
        }
        if members.is_empty() {
            return Ok(());
        }
        let members: Vec<String> = members.into_iter().collect();
        self.fetch_builtin_definitions(&members).await
    }

    /// Fetch every unique name not in the catalog; returns the names fetched.
    async fn fetch<T: BuiltIn>(&self, names: &[String]) -> AlzResult<Vec<String>> {
        let client = self
            .client
            .clone()
            .ok_or(AlzError::PolicyClientNotConfigured)?;

        let mut seen = BTreeSet::new();
        let missing: Vec<String> = names
            .iter()
            .filter(|n| seen.insert(n.as_str()))
            .filter(|n| {
                let present = self.catalog.contains(T::MEMBER, n);
                if present {
                    debug!(kind = %T::KIND, name = %n, "Already in catalog, skipping fetch");
                }
                !present
            })
            .cloned()
            .collect();
        if missing.is_empty() {
            return Ok(Vec::new());
        }

        let semaphore = Arc::new(Semaphore::new(self.parallelism));
        let mut join_set = JoinSet::new();
        for name in missing {
            let client = Arc::clone(&client);
            let semaphore = Arc::clone(&semaphore);
            join_set.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return (name, Err(ClientError::from("fetch semaphore closed")));
                };
                let result = T::fetch(client.as_ref(), &name).await;
                (name, result)
            });
        }

        // Returning early drops the set, which aborts every in-flight fetch.
        let mut fetched = Vec::new();
        while let Some(joined) = join_set.join_next().await {
            let (name, result) = joined.map_err(|e| AlzError::FetchTask(e.to_string()))?;
            match result {
                Ok(definition) => {
                    definition.store(self.catalog);
                    fetched.push(name);
                }
                Err(source) => {
                    join_set.abort_all();
                    return Err(AlzError::BuiltInFetch {
                        kind: T::KIND,
                        name,
                        source,
                    });
                }
            }
        }

        info!(kind = %T::KIND, count = fetched.len(), "Fetched built-in definitions");
        Ok(fetched)
    }
}
