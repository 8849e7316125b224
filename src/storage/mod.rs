//! Storage targets: configuration, filesystems, and version-adaptive target construction.

pub mod config;
pub mod filesystem;
pub mod target;

pub use config::{expand_root_path, RunnerConfig, StorageKind, StorageTargetConfig};
pub use filesystem::{FileSystem, FilesystemRegistry, FsArgs};
pub use target::{
    construct_target, ConstructorShape, FsTargetClass, StorageTarget, TargetApi, TargetClass,
    TargetLibrary,
};

use thiserror::Error;

/// Errors raised while configuring or constructing storage targets.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("unsupported storage API for target class '{class}': {reason}")]
    UnsupportedStorageApi { class: String, reason: String },

    #[error("unknown filesystem class '{0}'")]
    UnknownFilesystem(String),

    #[error("invalid argument '{arg}' for {class}: {reason}")]
    InvalidFilesystemArg {
        class: String,
        arg: String,
        reason: String,
    },

    #[error("{class} got an unexpected keyword argument '{keyword}'")]
    UnexpectedKeyword { class: String, keyword: String },

    #[error("storage config error: {0}")]
    Config(String),
}
