//! ALZ Core - Azure landing zone library processing and deployment projection
//!
//! This crate turns declarative policy libraries into a concrete management
//! group hierarchy:
//!
//! - **Library processing**: classify and parse library files from any source
//! - **Catalog**: merge libraries, build archetypes, apply overlays
//! - **Built-in resolution**: fetch provider-owned definitions with bounded parallelism
//! - **Deployment**: copy archetype resources into management groups and rewrite their ids
//! - **Hierarchy**: build the management group tree a library declares
//! - **Role assignments**: derive the extra roles policy identities need
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use alz_core::{AlzLib, AlzLibOptions, DirectorySource, Parent, WellKnownPolicyValues};
//!
//! let options = AlzLibOptions::default()
//!     .with_well_known_values(WellKnownPolicyValues::new("eastus", law_id));
//! let alz = AlzLib::new(options)?.with_policy_client(client);
//! alz.init(&[&DirectorySource::new("lib")]).await?;
//!
//! let root = alz.copy_archetype_with_well_known_values("root")?;
//! alz.add_management_group("alz", "Azure Landing Zones", Parent::External(tenant), &root)?;
//! alz.generate_policy_assignment_additional_role_assignments("alz")?;
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

mod archetype;
mod builtin;
mod catalog;
mod config;
mod deployment;
mod error;
mod hierarchy;
mod library;
mod management_group;
pub mod resource_id;
mod resources;
mod role_assignments;

pub use archetype::*;
pub use builtin::*;
pub use catalog::*;
pub use config::*;
pub use deployment::*;
pub use error::*;
pub use hierarchy::*;
pub use library::*;
pub use management_group::*;
pub use resources::*;
pub use role_assignments::*;

use std::sync::Arc;

use tracing::{info, instrument};

/// Entry point: a catalog, an optional built-in client and a deployment tree.
pub struct AlzLib {
    options: AlzLibOptions,
    catalog: Catalog,
    policy_client: Option<Arc<dyn PolicyClient>>,
    deployment: Deployment,
}

impl std::fmt::Debug for AlzLib {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlzLib")
            .field("options", &self.options)
            .field("catalog", &self.catalog)
            .field("policy_client", &self.policy_client.is_some())
            .field("deployment", &self.deployment)
            .finish()
    }
}

impl AlzLib {
    /// Create an empty library.
    ///
    /// # Errors
    /// Returns `AlzError::InvalidConfig` if the options do not validate.
    pub fn new(options: AlzLibOptions) -> AlzResult<Self> {
        options.validate()?;
        Ok(Self {
            options,
            catalog: Catalog::new(),
            policy_client: None,
            deployment: Deployment::new(),
        })
    }

    /// Builder: set the client used to fetch built-in definitions.
    #[must_use]
    pub fn with_policy_client(mut self, client: Arc<dyn PolicyClient>) -> Self {
        self.policy_client = Some(client);
        self
    }

    #[must_use]
    pub const fn options(&self) -> &AlzLibOptions {
        &self.options
    }

    #[must_use]
    pub const fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    #[must_use]
    pub const fn deployment(&self) -> &Deployment {
        &self.deployment
    }

    /// Load libraries in order, build archetypes and fetch referenced built-ins.
    ///
    /// The first library contributes everything. Later libraries contribute
    /// policy, policy set and role definitions only. Archetypes are built
    /// from the first library once every library is merged, so they may
    /// reference definitions from any of them.
    ///
    /// # Errors
    /// Returns the first processing, merge, archetype or fetch error.
    #[instrument(skip_all, fields(sources = sources.len()))]
    pub async fn init(&self, sources: &[&dyn LibrarySource]) -> AlzResult<()> {
        let mut first = None;
        for (i, source) in sources.iter().enumerate() {
            let result = process_library(*source)?;
            if i == 0 {
                self.add_result(&result)?;
                first = Some(result);
            } else {
                self.add_result(&result.definitions_only())?;
            }
        }

        if let Some(first) = first {
            self.generate_archetypes(&first)?;
        }

        let ids = self.catalog.archetype_assignment_definition_ids();
        self.resolve_references(&ids).await?;
        info!(
            archetypes = self.catalog.archetype_names().len(),
            "ALZ library initialised"
        );
        Ok(())
    }

    /// Merge a processed library, honouring `allow_overwrite`.
    ///
    /// # Errors
    /// See [`Catalog::add_result`].
    pub fn add_result(&self, result: &LibraryResult) -> AlzResult<()> {
        self.catalog.add_result(result, self.options.allow_overwrite)
    }

    /// Build the archetypes of a processed library.
    ///
    /// # Errors
    /// See [`Catalog::generate_archetypes`].
    pub fn generate_archetypes(&self, result: &LibraryResult) -> AlzResult<()> {
        self.catalog.generate_archetypes(result)
    }

    fn resolver(&self) -> AlzResult<BuiltInResolver<'_>> {
        BuiltInResolver::new(
            &self.catalog,
            self.policy_client.clone(),
            self.options.parallelism,
        )
    }

    /// Fetch whatever built-ins `ids` need.
    ///
    /// # Errors
    /// See [`BuiltInResolver::resolve_references`].
    pub async fn resolve_references(&self, ids: &[String]) -> AlzResult<()> {
        self.resolver()?.resolve_references(ids).await
    }

    /// Fetch built-in policy definitions by name.
    ///
    /// # Errors
    /// See [`BuiltInResolver::fetch_builtin_definitions`].
    pub async fn fetch_builtin_definitions(&self, names: &[String]) -> AlzResult<()> {
        self.resolver()?.fetch_builtin_definitions(names).await
    }

    /// Fetch built-in policy set definitions and their members by name.
    ///
    /// # Errors
    /// See [`BuiltInResolver::fetch_builtin_set_definitions`].
    pub async fn fetch_builtin_set_definitions(&self, names: &[String]) -> AlzResult<()> {
        self.resolver()?.fetch_builtin_set_definitions(names).await
    }

    /// Deep copy of a catalog archetype.
    ///
    /// # Errors
    /// Returns `AlzError::ArchetypeNotFound` if no archetype has this name.
    pub fn copy_archetype(&self, name: &str) -> AlzResult<Archetype> {
        self.catalog.copy_archetype(name)
    }

    /// Copy an archetype and stamp it with the configured well-known values.
    ///
    /// # Errors
    /// Returns `AlzError::WellKnownValuesNotSet` if the options carry none,
    /// or `AlzError::ArchetypeNotFound`.
    pub fn copy_archetype_with_well_known_values(&self, name: &str) -> AlzResult<Archetype> {
        let values = self
            .options
            .well_known_values
            .as_ref()
            .ok_or(AlzError::WellKnownValuesNotSet)?;
        Ok(self.copy_archetype(name)?.with_well_known_policy_values(values))
    }

    /// Add a management group to the deployment.
    ///
    /// # Errors
    /// See [`Deployment::add_management_group`].
    pub fn add_management_group(
        &self,
        name: &str,
        display_name: &str,
        parent: Parent,
        archetype: &Archetype,
    ) -> AlzResult<()> {
        self.deployment
            .add_management_group(&self.catalog, name, display_name, parent, archetype)
    }

    /// Add the management group hierarchy declared by the libraries.
    ///
    /// Every node gets a copy of its archetype stamped with the configured
    /// well-known values. The root hangs below `external_parent` when given.
    /// The deployment is only changed if every node is added.
    ///
    /// # Errors
    /// Returns `AlzError::WellKnownValuesNotSet` if the options carry none,
    /// any planning error of [`plan_hierarchy`], or any error of
    /// [`Deployment::add_hierarchy`].
    pub fn add_management_groups_from_library(
        &self,
        external_parent: Option<&str>,
    ) -> AlzResult<()> {
        let values = self
            .options
            .well_known_values
            .as_ref()
            .ok_or(AlzError::WellKnownValuesNotSet)?;
        let plan = plan_hierarchy(&self.catalog.management_groups(), external_parent)?;
        self.deployment.add_hierarchy(&self.catalog, &plan, values)
    }

    /// Derive additional role assignments for a management group in the deployment.
    ///
    /// # Errors
    /// See [`Deployment::generate_policy_assignment_additional_role_assignments`].
    pub fn generate_policy_assignment_additional_role_assignments(
        &self,
        management_group: &str,
    ) -> AlzResult<()> {
        self.deployment
            .generate_policy_assignment_additional_role_assignments(management_group, &self.catalog)
    }
}
