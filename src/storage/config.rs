//! Storage target configuration and the runner config file.
//!
//! ```yaml
//! target_storage:
//!   fsspec_class: LocalFileSystem
//!   fsspec_args: {auto_mkdir: true}
//!   root_path: /data/{job_name}/output
//! input_cache_storage:
//!   fsspec_class: MemoryFileSystem
//!   root_path: cache
//! ```

use super::filesystem::{FilesystemRegistry, FsArgs, ABSTRACT_FILESYSTEM};
use super::target::{construct_target, StorageTarget, TargetLibrary};
use super::StorageError;
use serde::{Deserialize, Serialize};
use serde_yaml_ng::Value;
use std::fmt;
use std::path::Path;

/// Placeholder in `root_path` replaced by the job name.
pub const JOB_NAME_PLACEHOLDER: &str = "{job_name}";

/// Which storage slot a config fills; selects the target class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageKind {
    /// Where baked data is written
    #[default]
    Target,
    /// Cache for input files during baking
    InputCache,
    /// Where input files are read from
    InputTarget,
}

impl StorageKind {
    /// Target class name in the external target library.
    pub fn target_class_name(self) -> &'static str {
        match self {
            Self::Target => "FSSpecTarget",
            Self::InputCache => "CacheFSSpecTarget",
            Self::InputTarget => "FSSpecInputTarget",
        }
    }
}

impl fmt::Display for StorageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Target => write!(f, "target_storage"),
            Self::InputCache => write!(f, "input_cache_storage"),
            Self::InputTarget => write!(f, "input_target_storage"),
        }
    }
}

/// Configuration for one storage target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StorageTargetConfig {
    /// Filesystem class to instantiate for this target
    #[serde(default = "default_fsspec_class")]
    pub fsspec_class: String,

    /// Arguments passed to the filesystem class
    #[serde(default)]
    pub fsspec_args: FsArgs,

    /// Root path for all storage; `{job_name}` is expanded
    #[serde(default)]
    pub root_path: String,

    /// Let running jobs assume a role when the target's kwargs are read
    #[serde(default)]
    pub enable_assume_role: bool,

    /// Arguments for the assume-role call (RoleArn, RoleSessionName, ...)
    #[serde(default)]
    pub assume_role_credential_kwargs: FsArgs,

    #[serde(skip)]
    pub kind: StorageKind,
}

fn default_fsspec_class() -> String {
    ABSTRACT_FILESYSTEM.to_string()
}

impl Default for StorageTargetConfig {
    fn default() -> Self {
        Self::new(StorageKind::default())
    }
}

impl StorageTargetConfig {
    /// Unconfigured storage for a slot.
    pub fn new(kind: StorageKind) -> Self {
        Self {
            fsspec_class: default_fsspec_class(),
            fsspec_args: FsArgs::new(),
            root_path: String::new(),
            enable_assume_role: false,
            assume_role_credential_kwargs: FsArgs::new(),
            kind,
        }
    }

    /// Name of the external target class to construct.
    pub fn target_class_name(&self) -> &'static str {
        self.kind.target_class_name()
    }

    /// True when neither a filesystem class nor a root path is set.
    ///
    /// Optional storage slots use this to mean "not configured".
    pub fn is_default(&self) -> bool {
        self.fsspec_class == ABSTRACT_FILESYSTEM && self.root_path.is_empty()
    }

    /// Root path with `{job_name}` expanded.
    pub fn root_path_for(&self, job_name: &str) -> String {
        expand_root_path(&self.root_path, job_name)
    }

    /// Sanitized representation: argument values are replaced by their type.
    pub fn describe(&self) -> String {
        let args = self
            .fsspec_args
            .iter()
            .map(|(k, v)| format!("{}=<{}>", k, arg_type_name(v)))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "{}({}({}), root_path=\"{}\")",
            self.target_class_name(),
            self.fsspec_class,
            args,
            self.root_path
        )
    }

    /// Construct this slot's target from `library`.
    pub fn get_forge_target(
        &self,
        job_name: &str,
        library: &TargetLibrary,
        filesystems: &FilesystemRegistry,
    ) -> Result<Box<dyn StorageTarget>, StorageError> {
        let class = library.get(self.target_class_name()).ok_or_else(|| {
            StorageError::UnsupportedStorageApi {
                class: self.target_class_name().to_string(),
                reason: "class not provided by the installed target library".to_string(),
            }
        })?;
        construct_target(self, job_name, class, filesystems)
    }
}

impl fmt::Display for StorageTargetConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

/// Type name shown in place of an argument value, in the vocabulary
/// operators see from the filesystem library (`str`, `dict`, `NoneType`).
pub fn arg_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "NoneType",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "int",
        Value::String(_) => "str",
        Value::Sequence(_) => "list",
        Value::Mapping(_) => "dict",
        Value::Tagged(tagged) => arg_type_name(&tagged.value),
    }
}

/// Substitute `{job_name}` in a root path template.
pub fn expand_root_path(template: &str, job_name: &str) -> String {
    template.replace(JOB_NAME_PLACEHOLDER, job_name)
}

// ============================================================================
// Runner config file
// ============================================================================

/// All storage slots of a runner config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunnerConfig {
    #[serde(default = "RunnerConfig::default_target")]
    pub target_storage: StorageTargetConfig,

    #[serde(default = "RunnerConfig::default_input_cache")]
    pub input_cache_storage: StorageTargetConfig,

    #[serde(default = "RunnerConfig::default_input_target")]
    pub input_target_storage: StorageTargetConfig,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            target_storage: Self::default_target(),
            input_cache_storage: Self::default_input_cache(),
            input_target_storage: Self::default_input_target(),
        }
    }
}

impl RunnerConfig {
    fn default_target() -> StorageTargetConfig {
        StorageTargetConfig::new(StorageKind::Target)
    }

    fn default_input_cache() -> StorageTargetConfig {
        StorageTargetConfig::new(StorageKind::InputCache)
    }

    fn default_input_target() -> StorageTargetConfig {
        StorageTargetConfig::new(StorageKind::InputTarget)
    }

    /// Slots in a fixed order.
    pub fn slots(&self) -> [&StorageTargetConfig; 3] {
        [
            &self.target_storage,
            &self.input_cache_storage,
            &self.input_target_storage,
        ]
    }

    fn stamp_kinds(mut self) -> Self {
        self.target_storage.kind = StorageKind::Target;
        self.input_cache_storage.kind = StorageKind::InputCache;
        self.input_target_storage.kind = StorageKind::InputTarget;
        self
    }
}

/// Parse a runner config from a YAML string.
pub fn parse_config(yaml: &str) -> Result<RunnerConfig, StorageError> {
    let config: RunnerConfig = serde_yaml_ng::from_str(yaml)
        .map_err(|e| StorageError::Config(format!("YAML parse error: {}", e)))?;
    Ok(config.stamp_kinds())
}

/// Parse a runner config file from disk.
pub fn parse_config_file(path: &Path) -> Result<RunnerConfig, StorageError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| StorageError::Config(format!("failed to read {}: {}", path.display(), e)))?;
    parse_config(&content)
}
