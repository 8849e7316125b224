//! Filesystem abstraction used by storage targets.
//!
//! Backends are picked by class name and built from an argument mapping,
//! mirroring how the configuration names them.

use super::StorageError;
use indexmap::IndexMap;
use serde_yaml_ng::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::io::{self, Cursor, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Constructor arguments for a filesystem, keyed by name.
pub type FsArgs = IndexMap<String, Value>;

/// The unconfigured base filesystem class.
pub const ABSTRACT_FILESYSTEM: &str = "AbstractFileSystem";

/// Minimal capability set a storage target needs.
pub trait FileSystem: fmt::Debug + Send + Sync {
    /// Protocol name, e.g. `file` or `memory`.
    fn protocol(&self) -> &'static str;

    fn open_read(&self, path: &str) -> io::Result<Box<dyn Read + Send>>;

    fn open_write(&self, path: &str) -> io::Result<Box<dyn Write + Send>>;

    /// Entries directly under `path`, sorted.
    fn list(&self, path: &str) -> io::Result<Vec<String>>;

    fn exists(&self, path: &str) -> bool;
}

type FsConstructor = fn(&FsArgs) -> Result<Arc<dyn FileSystem>, StorageError>;

/// Filesystem classes available for instantiation, by name.
pub struct FilesystemRegistry {
    classes: HashMap<String, FsConstructor>,
}

impl FilesystemRegistry {
    /// An empty registry.
    pub fn empty() -> Self {
        Self {
            classes: HashMap::new(),
        }
    }

    /// Register a filesystem class.
    pub fn register(&mut self, name: &str, constructor: FsConstructor) {
        self.classes.insert(name.to_string(), constructor);
    }

    /// Instantiate `class` with `args`.
    pub fn instantiate(
        &self,
        class: &str,
        args: &FsArgs,
    ) -> Result<Arc<dyn FileSystem>, StorageError> {
        let constructor = self
            .classes
            .get(class)
            .ok_or_else(|| StorageError::UnknownFilesystem(class.to_string()))?;
        constructor(args)
    }
}

impl Default for FilesystemRegistry {
    /// Registry with `AbstractFileSystem`, `LocalFileSystem` and `MemoryFileSystem`.
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(ABSTRACT_FILESYSTEM, |args| {
            let fs: Arc<dyn FileSystem> = Arc::new(AbstractFileSystem::from_args(args));
            Ok(fs)
        });
        registry.register(LocalFileSystem::CLASS, |args| {
            let fs: Arc<dyn FileSystem> = Arc::new(LocalFileSystem::from_args(args)?);
            Ok(fs)
        });
        registry.register(MemoryFileSystem::CLASS, |args| {
            let fs: Arc<dyn FileSystem> = Arc::new(MemoryFileSystem::from_args(args)?);
            Ok(fs)
        });
        registry
    }
}

impl fmt::Debug for FilesystemRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.classes.keys().collect();
        names.sort();
        f.debug_struct("FilesystemRegistry").field("classes", &names).finish()
    }
}

fn reject_unknown_args(class: &str, args: &FsArgs, known: &[&str]) -> Result<(), StorageError> {
    match args.keys().find(|k| !known.contains(&k.as_str())) {
        Some(arg) => Err(StorageError::InvalidFilesystemArg {
            class: class.to_string(),
            arg: arg.clone(),
            reason: "unexpected argument".to_string(),
        }),
        None => Ok(()),
    }
}

// ============================================================================
// Abstract
// ============================================================================

/// The base filesystem an unset `fsspec_class` falls back to.
///
/// Constructs with any arguments; every I/O call is unsupported.
#[derive(Debug, Clone, Default)]
pub struct AbstractFileSystem {
    pub args: FsArgs,
}

impl AbstractFileSystem {
    pub fn from_args(args: &FsArgs) -> Self {
        Self { args: args.clone() }
    }

    fn unsupported(op: &str) -> io::Error {
        io::Error::new(
            io::ErrorKind::Unsupported,
            format!("{} does not implement {}", ABSTRACT_FILESYSTEM, op),
        )
    }
}

impl FileSystem for AbstractFileSystem {
    fn protocol(&self) -> &'static str {
        "abstract"
    }

    fn open_read(&self, _path: &str) -> io::Result<Box<dyn Read + Send>> {
        Err(Self::unsupported("open_read"))
    }

    fn open_write(&self, _path: &str) -> io::Result<Box<dyn Write + Send>> {
        Err(Self::unsupported("open_write"))
    }

    fn list(&self, _path: &str) -> io::Result<Vec<String>> {
        Err(Self::unsupported("list"))
    }

    fn exists(&self, _path: &str) -> bool {
        false
    }
}

// ============================================================================
// Local
// ============================================================================

/// Local disk filesystem. Paths are used as given.
#[derive(Debug, Clone, Default)]
pub struct LocalFileSystem {
    /// Create parent directories on write
    pub auto_mkdir: bool,
}

impl LocalFileSystem {
    pub const CLASS: &'static str = "LocalFileSystem";

    /// Accepts an optional boolean `auto_mkdir`.
    pub fn from_args(args: &FsArgs) -> Result<Self, StorageError> {
        reject_unknown_args(Self::CLASS, args, &["auto_mkdir"])?;
        let auto_mkdir = match args.get("auto_mkdir") {
            None => false,
            Some(Value::Bool(b)) => *b,
            Some(_) => {
                return Err(StorageError::InvalidFilesystemArg {
                    class: Self::CLASS.to_string(),
                    arg: "auto_mkdir".to_string(),
                    reason: "must be a boolean".to_string(),
                })
            }
        };
        Ok(Self { auto_mkdir })
    }
}

impl FileSystem for LocalFileSystem {
    fn protocol(&self) -> &'static str {
        "file"
    }

    fn open_read(&self, path: &str) -> io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(std::fs::File::open(path)?))
    }

    fn open_write(&self, path: &str) -> io::Result<Box<dyn Write + Send>> {
        let path = PathBuf::from(path);
        if self.auto_mkdir {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Ok(Box::new(std::fs::File::create(path)?))
    }

    fn list(&self, path: &str) -> io::Result<Vec<String>> {
        let mut entries = std::fs::read_dir(Path::new(path))?
            .map(|entry| entry.map(|e| e.path().to_string_lossy().into_owned()))
            .collect::<io::Result<Vec<_>>>()?;
        entries.sort();
        Ok(entries)
    }

    fn exists(&self, path: &str) -> bool {
        Path::new(path).exists()
    }
}

// ============================================================================
// Memory
// ============================================================================

type Store = Arc<Mutex<BTreeMap<String, Vec<u8>>>>;

/// In-process filesystem. Clones share the same store.
#[derive(Debug, Clone, Default)]
pub struct MemoryFileSystem {
    store: Store,
}

impl MemoryFileSystem {
    pub const CLASS: &'static str = "MemoryFileSystem";

    pub fn new() -> Self {
        Self::default()
    }

    /// Takes no arguments.
    pub fn from_args(args: &FsArgs) -> Result<Self, StorageError> {
        reject_unknown_args(Self::CLASS, args, &[])?;
        Ok(Self::new())
    }

    fn normalize(path: &str) -> String {
        format!("/{}", path.trim_matches('/'))
    }

    fn lock(&self) -> io::Result<std::sync::MutexGuard<'_, BTreeMap<String, Vec<u8>>>> {
        self.store
            .lock()
            .map_err(|_| io::Error::other("memory filesystem lock poisoned"))
    }
}

impl FileSystem for MemoryFileSystem {
    fn protocol(&self) -> &'static str {
        "memory"
    }

    fn open_read(&self, path: &str) -> io::Result<Box<dyn Read + Send>> {
        let key = Self::normalize(path);
        let data = self
            .lock()?
            .get(&key)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, key))?;
        Ok(Box::new(Cursor::new(data)))
    }

    fn open_write(&self, path: &str) -> io::Result<Box<dyn Write + Send>> {
        Ok(Box::new(MemoryWriter {
            key: Self::normalize(path),
            buf: Vec::new(),
            store: Arc::clone(&self.store),
        }))
    }

    fn list(&self, path: &str) -> io::Result<Vec<String>> {
        let dir = Self::normalize(path);
        let prefix = if dir == "/" { dir.clone() } else { format!("{}/", dir) };
        let mut children: Vec<String> = self
            .lock()?
            .keys()
            .filter_map(|k| k.strip_prefix(&prefix))
            .map(|rest| {
                let child = rest.split('/').next().unwrap_or(rest);
                format!("{}{}", prefix, child)
            })
            .collect();
        children.sort();
        children.dedup();
        Ok(children)
    }

    fn exists(&self, path: &str) -> bool {
        let key = Self::normalize(path);
        let prefix = format!("{}/", key.trim_end_matches('/'));
        self.lock()
            .map(|store| store.contains_key(&key) || store.keys().any(|k| k.starts_with(&prefix)))
            .unwrap_or(false)
    }
}

/// Buffers writes and commits them on flush and on drop.
struct MemoryWriter {
    key: String,
    buf: Vec<u8>,
    store: Store,
}

impl Write for MemoryWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut store = self
            .store
            .lock()
            .map_err(|_| io::Error::other("memory filesystem lock poisoned"))?;
        store.insert(self.key.clone(), self.buf.clone());
        Ok(())
    }
}

impl Drop for MemoryWriter {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}
