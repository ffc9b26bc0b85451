//! Library sources and the file processor.
//!
//! A library is a flat collection of named JSON documents. Files are
//! classified purely by their (lower-cased) name prefix:
//!
//! | prefix                    | content                               |
//! |---------------------------|---------------------------------------|
//! | `archetype_definition_`   | archetype definition                  |
//! | `archetype_extension_`    | additive overlay on an archetype      |
//! | `archetype_exclusion_`    | subtractive overlay on an archetype   |
//! | `management_group_`       | management group in the hierarchy     |
//! | `policy_assignment_`      | policy assignment                     |
//! | `policy_definition_`      | policy definition                     |
//! | `policy_set_definition_`  | policy set definition                 |
//! | `role_definition_`        | role definition                       |
//!
//! Anything else is ignored.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::{AlzError, AlzResult};
use crate::resources::{
    PolicyAssignment, PolicyDefinition, PolicySetDefinition, ResourceKind, RoleDefinition,
};

const ARCHETYPE_DEFINITION_PREFIX: &str = "archetype_definition_";
const ARCHETYPE_EXTENSION_PREFIX: &str = "archetype_extension_";
const ARCHETYPE_EXCLUSION_PREFIX: &str = "archetype_exclusion_";
const MANAGEMENT_GROUP_PREFIX: &str = "management_group_";
const POLICY_ASSIGNMENT_PREFIX: &str = "policy_assignment_";
const POLICY_DEFINITION_PREFIX: &str = "policy_definition_";
const POLICY_SET_DEFINITION_PREFIX: &str = "policy_set_definition_";
const ROLE_DEFINITION_PREFIX: &str = "role_definition_";

const EXTENSION_KEY_PREFIX: &str = "extend_";
const EXCLUSION_KEY_PREFIX: &str = "exclude_";

// ─────────────────────────────────────────────────────────────────────────────
// Sources
// ─────────────────────────────────────────────────────────────────────────────

/// A named file from a library source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryFile {
    pub name: String,
    pub contents: Vec<u8>,
}

impl LibraryFile {
    #[must_use]
    pub fn new(name: impl Into<String>, contents: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            contents: contents.into(),
        }
    }
}

/// Provider of named library documents.
///
/// The processor only needs file names and bytes, so libraries can come
/// from disk, from data compiled into a binary, or from memory.
pub trait LibrarySource: Send + Sync {
    /// Human-readable description used in logs and errors.
    fn describe(&self) -> String;

    /// All files in the library.
    ///
    /// # Errors
    /// Returns `AlzError::LibraryIo` if the source cannot be read.
    fn files(&self) -> AlzResult<Vec<LibraryFile>>;
}

/// A library on disk. Subdirectories are walked recursively.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    #[must_use]
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }
}

impl LibrarySource for DirectorySource {
    fn describe(&self) -> String {
        self.root.display().to_string()
    }

    fn files(&self) -> AlzResult<Vec<LibraryFile>> {
        if !self.root.is_dir() {
            return Err(AlzError::LibraryIo {
                path: self.root.clone(),
                message: "not a directory".into(),
            });
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(&self.root).sort_by_file_name() {
            let entry = entry.map_err(|e| AlzError::LibraryIo {
                path: self.root.clone(),
                message: e.to_string(),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let contents = std::fs::read(entry.path()).map_err(|e| AlzError::LibraryIo {
                path: entry.path().to_path_buf(),
                message: e.to_string(),
            })?;
            files.push(LibraryFile::new(
                entry.file_name().to_string_lossy().into_owned(),
                contents,
            ));
        }
        Ok(files)
    }
}

/// An in-memory library.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    name: String,
    files: Vec<LibraryFile>,
}

impl MemorySource {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            files: Vec::new(),
        }
    }

    /// Builder: add a file.
    #[must_use]
    pub fn with_file(mut self, name: impl Into<String>, contents: impl Into<Vec<u8>>) -> Self {
        self.files.push(LibraryFile::new(name, contents));
        self
    }

    /// Builder: add a JSON document.
    #[must_use]
    pub fn with_json(self, name: impl Into<String>, document: &Value) -> Self {
        let contents = document.to_string().into_bytes();
        self.with_file(name, contents)
    }
}

impl LibrarySource for MemorySource {
    fn describe(&self) -> String {
        self.name.clone()
    }

    fn files(&self) -> AlzResult<Vec<LibraryFile>> {
        Ok(self.files.clone())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Processed results
// ─────────────────────────────────────────────────────────────────────────────

/// Per-assignment parameter overrides from `archetype_config.parameters`.
pub type ParameterOverrides = BTreeMap<String, BTreeMap<String, Value>>;

/// An archetype definition, extension or exclusion as read from a library.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LibArchetype {
    /// Archetype name (with any `extend_`/`exclude_` prefix removed).
    pub name: String,
    pub policy_assignments: Vec<String>,
    pub policy_definitions: Vec<String>,
    pub policy_set_definitions: Vec<String>,
    pub role_definitions: Vec<String>,
    /// Assignment name → parameter name → value.
    pub parameter_overrides: ParameterOverrides,
}

#[derive(Deserialize)]
struct LibArchetypeBody {
    #[serde(default)]
    policy_assignments: Vec<String>,
    #[serde(default)]
    policy_definitions: Vec<String>,
    #[serde(default)]
    policy_set_definitions: Vec<String>,
    #[serde(default)]
    role_definitions: Vec<String>,
    #[serde(default)]
    archetype_config: Option<LibArchetypeConfig>,
}

#[derive(Deserialize)]
struct LibArchetypeConfig {
    #[serde(default)]
    parameters: ParameterOverrides,
}

/// A management group declared in a library.
///
/// ```json
/// {
///   "name": "alz",
///   "display_name": "Azure Landing Zones",
///   "archetype": "root",
///   "is_root": true,
///   "children": ["platform", "landing-zones"]
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LibManagementGroup {
    #[serde(default)]
    pub name: String,
    /// Defaults to `name` when empty.
    #[serde(default)]
    pub display_name: String,
    pub archetype: String,
    #[serde(default)]
    pub is_root: bool,
    /// Names of child management groups, in order.
    #[serde(default)]
    pub children: Vec<String>,
}

/// Everything read from one library.
#[derive(Debug, Clone, Default)]
pub struct LibraryResult {
    pub policy_definitions: BTreeMap<String, PolicyDefinition>,
    pub policy_set_definitions: BTreeMap<String, PolicySetDefinition>,
    pub policy_assignments: BTreeMap<String, PolicyAssignment>,
    pub role_definitions: BTreeMap<String, RoleDefinition>,
    pub archetypes: BTreeMap<String, LibArchetype>,
    pub archetype_extensions: Vec<LibArchetype>,
    pub archetype_exclusions: Vec<LibArchetype>,
    pub management_groups: BTreeMap<String, LibManagementGroup>,
}

impl LibraryResult {
    /// Drop assignments, archetype and management group files, keeping only definitions.
    #[must_use]
    pub fn definitions_only(mut self) -> Self {
        self.policy_assignments.clear();
        self.archetypes.clear();
        self.archetype_extensions.clear();
        self.archetype_exclusions.clear();
        self.management_groups.clear();
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileKind {
    ArchetypeDefinition,
    ArchetypeExtension,
    ArchetypeExclusion,
    ManagementGroup,
    PolicyAssignment,
    PolicyDefinition,
    PolicySetDefinition,
    RoleDefinition,
}

impl FileKind {
    fn classify(file_name: &str) -> Option<Self> {
        let n = file_name.to_ascii_lowercase();
        if !n.ends_with(".json") {
            return None;
        }
        let kind = if n.starts_with(ARCHETYPE_DEFINITION_PREFIX) {
            Self::ArchetypeDefinition
        } else if n.starts_with(ARCHETYPE_EXTENSION_PREFIX) {
            Self::ArchetypeExtension
        } else if n.starts_with(ARCHETYPE_EXCLUSION_PREFIX) {
            Self::ArchetypeExclusion
        } else if n.starts_with(MANAGEMENT_GROUP_PREFIX) {
            Self::ManagementGroup
        } else if n.starts_with(POLICY_ASSIGNMENT_PREFIX) {
            Self::PolicyAssignment
        } else if n.starts_with(POLICY_DEFINITION_PREFIX) {
            Self::PolicyDefinition
        } else if n.starts_with(POLICY_SET_DEFINITION_PREFIX) {
            Self::PolicySetDefinition
        } else if n.starts_with(ROLE_DEFINITION_PREFIX) {
            Self::RoleDefinition
        } else {
            return None;
        };
        Some(kind)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Processing
// ─────────────────────────────────────────────────────────────────────────────

/// Read and classify every file of a library.
///
/// # Errors
/// Returns an error naming the file if a document cannot be parsed, lacks a
/// name, or duplicates a name already read from this library.
pub fn process_library(source: &dyn LibrarySource) -> AlzResult<LibraryResult> {
    let mut result = LibraryResult::default();
    for file in source.files()? {
        let Some(kind) = FileKind::classify(&file.name) else {
            debug!(file = %file.name, "Skipping unrecognised library file");
            continue;
        };
        process_file(&mut result, kind, &file)?;
    }
    info!(
        library = %source.describe(),
        policy_definitions = result.policy_definitions.len(),
        policy_set_definitions = result.policy_set_definitions.len(),
        policy_assignments = result.policy_assignments.len(),
        role_definitions = result.role_definitions.len(),
        archetypes = result.archetypes.len(),
        management_groups = result.management_groups.len(),
        "Library processed"
    );
    Ok(result)
}

fn process_file(result: &mut LibraryResult, kind: FileKind, file: &LibraryFile) -> AlzResult<()> {
    match kind {
        FileKind::PolicyDefinition => {
            let def: PolicyDefinition = parse(file)?;
            let name = require_name(&def.name, file)?;
            insert_unique(
                &mut result.policy_definitions,
                ResourceKind::PolicyDefinition,
                name,
                def,
                file,
            )
        }
        FileKind::PolicySetDefinition => {
            let def: PolicySetDefinition = parse(file)?;
            let name = require_name(&def.name, file)?;
            insert_unique(
                &mut result.policy_set_definitions,
                ResourceKind::PolicySetDefinition,
                name,
                def,
                file,
            )
        }
        FileKind::PolicyAssignment => {
            let pa: PolicyAssignment = parse(file)?;
            let name = require_name(&pa.name, file)?;
            insert_unique(
                &mut result.policy_assignments,
                ResourceKind::PolicyAssignment,
                name,
                pa,
                file,
            )
        }
        FileKind::RoleDefinition => {
            let rd: RoleDefinition = parse(file)?;
            let name = require_name(&rd.name, file)?;
            insert_unique(
                &mut result.role_definitions,
                ResourceKind::RoleDefinition,
                name,
                rd,
                file,
            )
        }
        FileKind::ArchetypeDefinition => {
            let la = parse_lib_archetype(file, None)?;
            let name = la.name.clone();
            insert_unique(&mut result.archetypes, ResourceKind::Archetype, name, la, file)
        }
        FileKind::ArchetypeExtension => {
            let la = parse_lib_archetype(file, Some(EXTENSION_KEY_PREFIX))?;
            result.archetype_extensions.push(la);
            Ok(())
        }
        FileKind::ArchetypeExclusion => {
            let la = parse_lib_archetype(file, Some(EXCLUSION_KEY_PREFIX))?;
            result.archetype_exclusions.push(la);
            Ok(())
        }
        FileKind::ManagementGroup => {
            let mut mg: LibManagementGroup = parse(file)?;
            let name = require_name(&mg.name, file)?;
            if mg.display_name.is_empty() {
                mg.display_name.clone_from(&name);
            }
            insert_unique(
                &mut result.management_groups,
                ResourceKind::ManagementGroup,
                name,
                mg,
                file,
            )
        }
    }
}

fn parse<T: DeserializeOwned>(file: &LibraryFile) -> AlzResult<T> {
    serde_json::from_slice(&file.contents).map_err(|source| AlzError::LibraryParse {
        file: file.name.clone(),
        source,
    })
}

fn require_name(name: &str, file: &LibraryFile) -> AlzResult<String> {
    if name.is_empty() {
        return Err(AlzError::InvalidLibraryFile {
            file: file.name.clone(),
            message: "resource name is empty or not present".into(),
        });
    }
    Ok(name.to_string())
}

fn insert_unique<T>(
    map: &mut BTreeMap<String, T>,
    kind: ResourceKind,
    name: String,
    value: T,
    file: &LibraryFile,
) -> AlzResult<()> {
    if map.contains_key(&name) {
        return Err(AlzError::DuplicateInLibrary {
            kind,
            name,
            file: file.name.clone(),
        });
    }
    map.insert(name, value);
    Ok(())
}

/// Archetype documents have a single top-level key whose name is the
/// archetype name, so the key cannot be modelled as a struct field.
fn parse_lib_archetype(file: &LibraryFile, key_prefix: Option<&str>) -> AlzResult<LibArchetype> {
    let document: BTreeMap<String, Value> = parse(file)?;
    let count = document.len();
    let mut entries = document.into_iter();
    let (Some((key, body)), None) = (entries.next(), entries.next()) else {
        return Err(AlzError::InvalidLibraryFile {
            file: file.name.clone(),
            message: format!("expected 1 top-level object, got {count}"),
        });
    };
    let body: LibArchetypeBody =
        serde_json::from_value(body).map_err(|source| AlzError::LibraryParse {
            file: file.name.clone(),
            source,
        })?;

    let name = match key_prefix {
        Some(prefix) => key.strip_prefix(prefix).unwrap_or(&key).to_string(),
        None => key,
    };
    if name.is_empty() {
        return Err(AlzError::InvalidLibraryFile {
            file: file.name.clone(),
            message: "archetype name is empty".into(),
        });
    }

    Ok(LibArchetype {
        name,
        policy_assignments: body.policy_assignments,
        policy_definitions: body.policy_definitions,
        policy_set_definitions: body.policy_set_definitions,
        role_definitions: body.role_definitions,
        parameter_overrides: body
            .archetype_config
            .map(|c| c.parameters)
            .unwrap_or_default(),
    })
}
