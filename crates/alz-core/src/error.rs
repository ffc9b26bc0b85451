//! Error types for library processing, catalog merges and deployment projection.

use std::path::PathBuf;

use crate::resources::ResourceKind;

/// Boxed error returned by a [`PolicyClient`](crate::PolicyClient) implementation.
pub type ClientError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// ALZ library errors.
#[derive(Debug, thiserror::Error)]
pub enum AlzError {
    // ── Configuration ──────────────────────────────────────────────────────
    /// Invalid options or well-known values.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration file could not be parsed.
    #[error("Configuration parse failed: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Built-in definitions were requested but no policy client was supplied.
    #[error("policy client not configured")]
    PolicyClientNotConfigured,

    // ── Duplicates and conflicts ───────────────────────────────────────────
    /// A named resource is already present and overwrite is disabled.
    #[error("{kind} {name} already exists")]
    AlreadyExists {
        /// Kind of the colliding resource.
        kind: ResourceKind,
        /// Colliding name.
        name: String,
    },

    /// The same resource name appears twice in one library.
    #[error("{kind} {name} is defined more than once in the library (second definition in {file})")]
    DuplicateInLibrary {
        /// Kind of the duplicated resource.
        kind: ResourceKind,
        /// Duplicated name.
        name: String,
        /// File holding the second definition.
        file: String,
    },

    /// An archetype overlay adds a member that is already present.
    #[error("duplicate {kind} in archetype {archetype}: {name}")]
    DuplicateArchetypeMember {
        /// Archetype being extended.
        archetype: String,
        /// Member kind.
        kind: ResourceKind,
        /// Member name.
        name: String,
    },

    /// A second root management group was requested.
    #[error("multiple root management groups: {existing} and {requested}")]
    MultipleRootManagementGroups {
        /// The root already in the tree.
        existing: String,
        /// The rejected management group.
        requested: String,
    },

    /// An external parent id names a management group that is part of the tree.
    #[error("external parent management group set, but already exists {0}")]
    ExternalParentExists(String),

    // ── Missing references ─────────────────────────────────────────────────
    /// An archetype references a name that the catalog does not hold.
    #[error("error processing archetype {archetype}, {kind} {name} does not exist in the library")]
    ArchetypeReferenceNotFound {
        /// Archetype holding the reference.
        archetype: String,
        /// Referenced kind.
        kind: ResourceKind,
        /// Referenced name.
        name: String,
    },

    /// No archetype with this name exists.
    #[error("archetype {0} not found")]
    ArchetypeNotFound(String),

    /// An archetype exclusion removes a member that is not present.
    #[error("cannot exclude {kind} {name} from archetype {archetype} as it does not exist")]
    ArchetypeMemberNotFound {
        /// Archetype being reduced.
        archetype: String,
        /// Member kind.
        kind: ResourceKind,
        /// Member name.
        name: String,
    },

    /// An `archetype_config` entry cannot be applied.
    #[error("archetype_config.parameters error in archetype {archetype}: {message}")]
    ArchetypeConfig {
        /// Archetype holding the config.
        archetype: String,
        /// What went wrong.
        message: String,
    },

    /// The parent management group is not part of the tree.
    #[error("parent management group not found {0}")]
    ParentNotFound(String),

    /// The library declares management groups but none is the root.
    #[error("no root management group found")]
    NoRootManagementGroup,

    /// A declared child management group has no declaration of its own.
    #[error("management group {name}, child of {parent}, is not declared in the library")]
    UndeclaredManagementGroup {
        /// The missing child.
        name: String,
        /// The declaration listing it.
        parent: String,
    },

    /// A declared management group is reached twice from the root.
    #[error("management group {0} appears more than once in the hierarchy")]
    RepeatedManagementGroup(String),

    /// A declared management group names an archetype the catalog does not hold.
    #[error("archetype {archetype} not found when converting management group {management_group}")]
    HierarchyArchetypeNotFound {
        /// The declared management group.
        management_group: String,
        /// The missing archetype.
        archetype: String,
    },

    /// No management group with this name is in the deployment.
    #[error("management group {0} not found")]
    ManagementGroupNotFound(String),

    /// A referenced resource is missing from the catalog.
    #[error("{kind} {name}, referenced by {referenced_by}, not found in the catalog")]
    ReferenceNotFound {
        /// Missing kind.
        kind: ResourceKind,
        /// Missing name.
        name: String,
        /// The resource holding the reference.
        referenced_by: String,
    },

    /// The archetype has not been stamped with well-known values.
    #[error(
        "archetype well known values not set, use Archetype::with_well_known_policy_values() to update"
    )]
    WellKnownValuesNotSet,

    // ── Malformed data ─────────────────────────────────────────────────────
    /// A resource id does not end in a policy (set) definition segment pair.
    #[error("unexpected resource type in id {0}")]
    InvalidResourceType(String),

    /// A policy assignment references something other than a policy (set) definition.
    #[error("policy assignment {assignment} has invalid resource type in id {id}")]
    AssignmentInvalidResourceType {
        /// Assignment name.
        assignment: String,
        /// The offending id.
        id: String,
    },

    /// The policy rule does not have the shape needed to read role definition ids.
    #[error(
        "policy assignment {assignment}: policy definition {definition} has a malformed policy rule: {message}"
    )]
    MalformedPolicyRule {
        /// Assignment being processed.
        assignment: String,
        /// Definition name.
        definition: String,
        /// What went wrong.
        message: String,
    },

    /// An identity-bearing assignment references a definition that grants no roles.
    #[error("policy assignment {assignment}: policy definition {definition} has no role definition ids")]
    NoRoleDefinitionIds {
        /// Assignment being processed.
        assignment: String,
        /// Definition name.
        definition: String,
    },

    /// A set member does not bind one of its definition's `assignPermissions` parameters.
    #[error(
        "policy assignment {assignment}: parameter {parameter} not found in policy set definition {set} reference to policy definition {definition}"
    )]
    UnboundSetMemberParameter {
        /// Assignment being processed.
        assignment: String,
        /// Set definition holding the member reference.
        set: String,
        /// Member definition name.
        definition: String,
        /// The unbound parameter.
        parameter: String,
    },

    /// A scope-bearing parameter value is not an ARM resource id.
    #[error("parameter {parameter} value {value} in policy assignment {assignment} is not an ARM resource id")]
    InvalidScope {
        /// Assignment being processed.
        assignment: String,
        /// Assignment parameter holding the scope.
        parameter: String,
        /// The rejected value.
        value: String,
    },

    /// A set member parameter value is not of the form `[parameters('name')]`.
    #[error("value is not a parameter reference: {0}")]
    InvalidParameterReference(String),

    /// A scope-bearing parameter value is not a string.
    #[error("parameter {parameter} value in {owner} is not a string")]
    ParameterNotString {
        /// Parameter name.
        parameter: String,
        /// The assignment or definition reference holding the value.
        owner: String,
    },

    /// A library file could not be interpreted.
    #[error("error processing library file {file}: {message}")]
    InvalidLibraryFile {
        /// File name.
        file: String,
        /// What went wrong.
        message: String,
    },

    /// A library file is not valid JSON for its kind.
    #[error("error parsing library file {file}: {source}")]
    LibraryParse {
        /// File name.
        file: String,
        /// Underlying parse error.
        #[source]
        source: serde_json::Error,
    },

    /// A library source could not be read.
    #[error("error reading library {path}: {message}")]
    LibraryIo {
        /// Path being read.
        path: PathBuf,
        /// What went wrong.
        message: String,
    },

    // ── Remote fetch ───────────────────────────────────────────────────────
    /// The policy client failed to return a built-in definition.
    #[error("failed to fetch built-in {kind} {name}: {source}")]
    BuiltInFetch {
        /// Kind being fetched.
        kind: ResourceKind,
        /// Name being fetched.
        name: String,
        /// Client error.
        #[source]
        source: ClientError,
    },

    /// A fetch task panicked or was cancelled.
    #[error("built-in fetch task failed: {0}")]
    FetchTask(String),
}

/// Result type for ALZ library operations.
pub type AlzResult<T> = Result<T, AlzError>;
