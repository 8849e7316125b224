//! Module loading for reference resolution.
//!
//! A module is a source unit addressed by a dotted id relative to the
//! feedstock directory. Loading yields a [`ModuleValue`] whose attributes
//! can be navigated. Nothing is cached: every load re-reads the unit.

use super::error::BoxError;
use super::parser::value_kind;
use indexmap::IndexMap;
use serde_yaml_ng::Value;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// File extensions tried, in order, when locating a module on disk.
pub const MODULE_EXTENSIONS: [&str; 4] = ["yaml", "yml", "json", "toml"];

// ============================================================================
// Values
// ============================================================================

/// A value reachable from a loaded module.
#[derive(Clone)]
pub enum ModuleValue {
    /// Plain data parsed from a file-backed module.
    Data(Value),

    /// Named attributes, e.g. a host-registered module.
    Namespace(IndexMap<String, ModuleValue>),

    /// An opaque host object, typically a runnable recipe.
    Object(Arc<dyn Any + Send + Sync>),
}

impl ModuleValue {
    /// Wrap a host object.
    pub fn object<T: Any + Send + Sync>(value: T) -> Self {
        Self::Object(Arc::new(value))
    }

    /// Build a namespace from `(name, value)` pairs, preserving order.
    pub fn namespace<I, K>(attrs: I) -> Self
    where
        I: IntoIterator<Item = (K, ModuleValue)>,
        K: Into<String>,
    {
        Self::Namespace(attrs.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Attribute access by name.
    pub fn attr(&self, name: &str) -> Option<ModuleValue> {
        match self {
            Self::Namespace(attrs) => attrs.get(name).cloned(),
            Self::Data(Value::Mapping(map)) => map.get(name).cloned().map(Self::Data),
            Self::Data(Value::Tagged(tagged)) => Self::Data(tagged.value.clone()).attr(name),
            _ => None,
        }
    }

    /// Whether this value is a mapping.
    pub fn is_mapping(&self) -> bool {
        matches!(self, Self::Namespace(_) | Self::Data(Value::Mapping(_)))
    }

    /// Mapping entries in their own iteration order.
    ///
    /// `None` when the value is not a mapping or has a non-string key.
    pub fn mapping_entries(&self) -> Option<Vec<(String, ModuleValue)>> {
        match self {
            Self::Namespace(attrs) => Some(
                attrs
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
            ),
            Self::Data(Value::Mapping(map)) => map
                .iter()
                .map(|(k, v)| k.as_str().map(|k| (k.to_string(), Self::Data(v.clone()))))
                .collect(),
            _ => None,
        }
    }

    /// Short kind name, for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Data(v) => value_kind(v),
            Self::Namespace(_) => "namespace",
            Self::Object(_) => "object",
        }
    }

    /// Downcast a host object.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            Self::Object(obj) => obj.downcast_ref::<T>(),
            _ => None,
        }
    }

    /// Borrow plain data.
    pub fn as_data(&self) -> Option<&Value> {
        match self {
            Self::Data(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Debug for ModuleValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Data(v) => f.debug_tuple("Data").field(v).finish(),
            Self::Namespace(attrs) => f.debug_map().entries(attrs.iter()).finish(),
            Self::Object(_) => write!(f, "<object>"),
        }
    }
}

impl From<Value> for ModuleValue {
    fn from(value: Value) -> Self {
        Self::Data(value)
    }
}

// ============================================================================
// Loaders
// ============================================================================

/// Failure to load a module.
#[derive(Debug)]
pub enum LoadError {
    /// No unit with this id exists under the base directory.
    NotFound,
    /// The unit exists but failed while loading.
    Init(BoxError),
}

/// Loads modules relative to a feedstock directory.
pub trait ModuleLoader {
    fn load(&self, base_dir: &Path, module_id: &str) -> Result<ModuleValue, LoadError>;
}

impl<L: ModuleLoader + ?Sized> ModuleLoader for &L {
    fn load(&self, base_dir: &Path, module_id: &str) -> Result<ModuleValue, LoadError> {
        (**self).load(base_dir, module_id)
    }
}

/// Loads YAML, JSON, or TOML modules from the feedstock directory.
///
/// Module id `pkg.recipe` maps to `<base>/pkg/recipe.<ext>`, trying
/// [`MODULE_EXTENSIONS`] in order. No global search path is consulted.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileModuleLoader;

impl FileModuleLoader {
    /// Candidate paths for a module id, or `None` if the id is not a valid
    /// relative module name.
    pub fn candidates(base_dir: &Path, module_id: &str) -> Option<Vec<PathBuf>> {
        let segments: Vec<&str> = module_id.split('.').collect();
        let valid = segments.iter().all(|s| {
            !s.is_empty()
                && *s != ".."
                && !s.contains(['/', '\\'])
                && !s.contains(char::is_whitespace)
        });
        if !valid {
            return None;
        }
        let mut stem = base_dir.to_path_buf();
        for segment in &segments {
            stem.push(segment);
        }
        Some(
            MODULE_EXTENSIONS
                .iter()
                .map(|ext| stem.with_extension(ext))
                .collect(),
        )
    }
}

impl ModuleLoader for FileModuleLoader {
    fn load(&self, base_dir: &Path, module_id: &str) -> Result<ModuleValue, LoadError> {
        let candidates = Self::candidates(base_dir, module_id).ok_or(LoadError::NotFound)?;
        let path = candidates
            .into_iter()
            .find(|p| p.is_file())
            .ok_or(LoadError::NotFound)?;

        debug!(module = module_id, path = %path.display(), "loading module");
        let content = std::fs::read_to_string(&path)
            .map_err(|e| LoadError::Init(format!("cannot read {}: {}", path.display(), e).into()))?;
        let value = parse_module(&path, &content).map_err(LoadError::Init)?;
        Ok(ModuleValue::Data(value))
    }
}

fn parse_module(path: &Path, content: &str) -> Result<Value, BoxError> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
    let parsed = match ext {
        "json" => serde_json::from_str::<Value>(content).map_err(|e| e.to_string()),
        "toml" => toml::from_str::<Value>(content).map_err(|e| e.to_string()),
        _ => serde_yaml_ng::from_str::<Value>(content).map_err(|e| e.to_string()),
    };
    parsed.map_err(|e| format!("module {} failed to load: {}", path.display(), e).into())
}

type ModuleFactory = Box<dyn Fn(&Path) -> Result<ModuleValue, BoxError> + Send + Sync>;

/// In-memory module registry.
///
/// Each registered factory runs on every load, so a module's
/// initialization is re-executed exactly as a fresh import would be.
#[derive(Default)]
pub struct StaticModuleLoader {
    modules: HashMap<String, ModuleFactory>,
}

impl StaticModuleLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module whose value is cloned on each load.
    pub fn with_module(mut self, module_id: &str, value: ModuleValue) -> Self {
        self.modules
            .insert(module_id.to_string(), Box::new(move |_| Ok(value.clone())));
        self
    }

    /// Register a module built by `factory` on each load.
    pub fn with_factory<F>(mut self, module_id: &str, factory: F) -> Self
    where
        F: Fn(&Path) -> Result<ModuleValue, BoxError> + Send + Sync + 'static,
    {
        self.modules.insert(module_id.to_string(), Box::new(factory));
        self
    }

    /// Registered module ids, sorted.
    pub fn module_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.modules.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

impl fmt::Debug for StaticModuleLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticModuleLoader")
            .field("modules", &self.module_ids())
            .finish()
    }
}

impl ModuleLoader for StaticModuleLoader {
    fn load(&self, base_dir: &Path, module_id: &str) -> Result<ModuleValue, LoadError> {
        let factory = self.modules.get(module_id).ok_or(LoadError::NotFound)?;
        debug!(module = module_id, "loading registered module");
        factory(base_dir).map_err(LoadError::Init)
    }
}
