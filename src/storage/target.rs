//! Version-adaptive construction of external storage targets.
//!
//! The target library changed its constructor across releases:
//!
//! | release line     | extra keyword arguments                                             |
//! |------------------|---------------------------------------------------------------------|
//! | legacy           | none                                                                |
//! | fsspec-kwargs    | `fsspec_kwargs`                                                     |
//! | assume-role      | `_fsspec_kwargs`, `enable_assume_role`, `assume_role_credential_kwargs` |
//!
//! A [`TargetClass`] exposes its accepted parameters through a
//! [`TargetSignature`]; [`construct_target`] walks [`SHAPE_TABLE`] in order
//! and uses the first shape whose required parameter is accepted.

use super::config::StorageTargetConfig;
use super::filesystem::{FileSystem, FilesystemRegistry, FsArgs};
use super::StorageError;
use indexmap::IndexMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Parameter names a target class declares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetSignature {
    pub fields: Vec<String>,
}

impl TargetSignature {
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    pub fn accepts(&self, field: &str) -> bool {
        self.fields.iter().any(|f| f == field)
    }
}

/// Arguments handed to a target class constructor.
#[derive(Debug, Clone)]
pub struct TargetArgs {
    pub fs: Arc<dyn FileSystem>,
    pub root_path: String,
    /// Keyword arguments beyond `fs` and `root_path`, in call order.
    pub kwargs: IndexMap<&'static str, KwargValue>,
}

/// Value of an optional keyword argument.
#[derive(Debug, Clone, PartialEq)]
pub enum KwargValue {
    Args(FsArgs),
    Flag(bool),
}

impl TargetArgs {
    /// Keyword names, in call order.
    pub fn keywords(&self) -> Vec<&'static str> {
        self.kwargs.keys().copied().collect()
    }
}

/// A constructed storage target.
pub trait StorageTarget: fmt::Debug + Send + Sync {
    fn fs(&self) -> &Arc<dyn FileSystem>;

    fn root_path(&self) -> &str;

    /// Keyword arguments the target was constructed with.
    fn kwargs(&self) -> &IndexMap<&'static str, KwargValue>;

    /// Join a relative path onto the root.
    fn path(&self, relative: &str) -> String {
        let root = self.root_path().trim_end_matches('/');
        let relative = relative.trim_start_matches('/');
        if root.is_empty() {
            relative.to_string()
        } else if relative.is_empty() {
            root.to_string()
        } else {
            format!("{}/{}", root, relative)
        }
    }

    fn exists(&self, relative: &str) -> bool {
        self.fs().exists(&self.path(relative))
    }
}

/// An external target class whose constructor varies by release.
pub trait TargetClass: Send + Sync {
    fn name(&self) -> &str;

    /// Capability descriptor; `None` when the class cannot be introspected.
    fn signature(&self) -> Option<TargetSignature>;

    fn instantiate(&self, args: TargetArgs) -> Result<Box<dyn StorageTarget>, StorageError>;
}

// ============================================================================
// Shape selection
// ============================================================================

/// Constructor call shapes, newest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstructorShape {
    AssumeRole,
    FsspecKwargs,
    Basic,
}

/// Ordered `(required parameter, shape)` table; `None` always matches.
pub const SHAPE_TABLE: [(Option<&str>, ConstructorShape); 3] = [
    (Some("enable_assume_role"), ConstructorShape::AssumeRole),
    (Some("fsspec_kwargs"), ConstructorShape::FsspecKwargs),
    (None, ConstructorShape::Basic),
];

impl ConstructorShape {
    /// First shape in [`SHAPE_TABLE`] the signature supports.
    pub fn select(signature: &TargetSignature) -> Self {
        SHAPE_TABLE
            .iter()
            .find(|(required, _)| required.is_none_or(|field| signature.accepts(field)))
            .map(|(_, shape)| *shape)
            .unwrap_or(Self::Basic)
    }

    /// Build constructor arguments for this shape.
    pub fn build_args(
        self,
        config: &StorageTargetConfig,
        fs: Arc<dyn FileSystem>,
        root_path: String,
    ) -> TargetArgs {
        let mut kwargs = IndexMap::new();
        match self {
            Self::AssumeRole => {
                kwargs.insert("_fsspec_kwargs", KwargValue::Args(config.fsspec_args.clone()));
                kwargs.insert("enable_assume_role", KwargValue::Flag(config.enable_assume_role));
                kwargs.insert(
                    "assume_role_credential_kwargs",
                    KwargValue::Args(config.assume_role_credential_kwargs.clone()),
                );
            }
            Self::FsspecKwargs => {
                kwargs.insert("fsspec_kwargs", KwargValue::Args(config.fsspec_args.clone()));
            }
            Self::Basic => {}
        }
        TargetArgs {
            fs,
            root_path,
            kwargs,
        }
    }
}

impl fmt::Display for ConstructorShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AssumeRole => write!(f, "assume-role"),
            Self::FsspecKwargs => write!(f, "fsspec-kwargs"),
            Self::Basic => write!(f, "basic"),
        }
    }
}

/// Construct `class` from a storage config, adapting to its constructor.
pub fn construct_target(
    config: &StorageTargetConfig,
    job_name: &str,
    class: &dyn TargetClass,
    filesystems: &FilesystemRegistry,
) -> Result<Box<dyn StorageTarget>, StorageError> {
    let fs = filesystems.instantiate(&config.fsspec_class, &config.fsspec_args)?;
    let root_path = config.root_path_for(job_name);

    let signature = class
        .signature()
        .ok_or_else(|| StorageError::UnsupportedStorageApi {
            class: class.name().to_string(),
            reason: "constructor parameters cannot be introspected".to_string(),
        })?;
    debug!(class = class.name(), fields = ?signature.fields, "introspected target class");

    let shape = ConstructorShape::select(&signature);
    info!(class = class.name(), %shape, root_path = %root_path, "constructing storage target");
    class.instantiate(shape.build_args(config, fs, root_path))
}

// ============================================================================
// Built-in target library
// ============================================================================

/// Release line of the built-in target library.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum TargetApi {
    /// `(fs, root_path)` only
    Legacy,
    /// adds `fsspec_kwargs`
    FsspecKwargs,
    /// adds `_fsspec_kwargs`, `enable_assume_role`, `assume_role_credential_kwargs`
    #[default]
    AssumeRole,
}

impl TargetApi {
    /// Constructor parameters for this release line.
    pub fn signature(self) -> TargetSignature {
        let extra: &[&str] = match self {
            Self::Legacy => &[],
            Self::FsspecKwargs => &["fsspec_kwargs"],
            Self::AssumeRole => &[
                "_fsspec_kwargs",
                "enable_assume_role",
                "assume_role_credential_kwargs",
            ],
        };
        TargetSignature::new(["fs", "root_path"].iter().chain(extra).copied())
    }
}

/// A filesystem-backed target as built by [`FsTargetClass`].
#[derive(Debug)]
pub struct FsTarget {
    fs: Arc<dyn FileSystem>,
    root_path: String,
    kwargs: IndexMap<&'static str, KwargValue>,
}

impl StorageTarget for FsTarget {
    fn fs(&self) -> &Arc<dyn FileSystem> {
        &self.fs
    }

    fn root_path(&self) -> &str {
        &self.root_path
    }

    fn kwargs(&self) -> &IndexMap<&'static str, KwargValue> {
        &self.kwargs
    }
}

/// Built-in target class for a given release line.
///
/// Rejects keyword arguments outside its signature, like a real
/// constructor would.
#[derive(Debug, Clone)]
pub struct FsTargetClass {
    name: String,
    api: TargetApi,
}

impl FsTargetClass {
    pub fn new(name: &str, api: TargetApi) -> Self {
        Self {
            name: name.to_string(),
            api,
        }
    }
}

impl TargetClass for FsTargetClass {
    fn name(&self) -> &str {
        &self.name
    }

    fn signature(&self) -> Option<TargetSignature> {
        Some(self.api.signature())
    }

    fn instantiate(&self, args: TargetArgs) -> Result<Box<dyn StorageTarget>, StorageError> {
        let signature = self.api.signature();
        if let Some(keyword) = args.keywords().into_iter().find(|k| !signature.accepts(k)) {
            return Err(StorageError::UnexpectedKeyword {
                class: self.name.clone(),
                keyword: keyword.to_string(),
            });
        }
        Ok(Box::new(FsTarget {
            fs: args.fs,
            root_path: args.root_path,
            kwargs: args.kwargs,
        }))
    }
}

/// Target classes by name, standing in for an installed target library.
#[derive(Default)]
pub struct TargetLibrary {
    classes: IndexMap<String, Box<dyn TargetClass>>,
}

impl TargetLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// The three storage classes of a built-in release line.
    pub fn builtin(api: TargetApi) -> Self {
        let mut library = Self::new();
        for name in ["FSSpecTarget", "CacheFSSpecTarget", "FSSpecInputTarget"] {
            library.register(Box::new(FsTargetClass::new(name, api)));
        }
        library
    }

    pub fn register(&mut self, class: Box<dyn TargetClass>) {
        self.classes.insert(class.name().to_string(), class);
    }

    pub fn get(&self, name: &str) -> Option<&dyn TargetClass> {
        self.classes.get(name).map(|c| c.as_ref())
    }
}

impl fmt::Debug for TargetLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TargetLibrary")
            .field("classes", &self.classes.keys().collect::<Vec<_>>())
            .finish()
    }
}
