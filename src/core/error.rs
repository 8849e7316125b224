//! Error taxonomy for feedstock loading, validation, and recipe resolution.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Boxed error raised by a module while it initializes.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result alias for feedstock operations.
pub type Result<T> = std::result::Result<T, FeedstockError>;

/// Why a reference string could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceErrorKind {
    /// No `:` separator, or an empty module id.
    MalformedReference,
    /// The module could not be located relative to the feedstock directory.
    ModuleNotFound { module: String },
    /// Attribute navigation stopped at this segment.
    AttributeNotFound { segment: String },
}

impl fmt::Display for ReferenceErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedReference => {
                write!(f, "malformed reference (expected '<module>:<attribute.path>')")
            }
            Self::ModuleNotFound { module } => write!(f, "module '{}' not found", module),
            Self::AttributeNotFound { segment } => {
                write!(f, "attribute '{}' not found", segment)
            }
        }
    }
}

/// Errors raised while reading a feedstock or resolving its recipes.
#[derive(Debug, Error)]
pub enum FeedstockError {
    #[error("invalid meta.yaml: field '{field}': {reason}")]
    Schema { field: String, reason: String },

    #[error("cannot resolve '{reference}': {kind}")]
    Reference {
        reference: String,
        kind: ReferenceErrorKind,
    },

    /// A module failed while loading; the cause is surfaced as-is.
    #[error(transparent)]
    ModuleInit(BoxError),

    #[error("'{reference}' resolved to {found}, expected a mapping of recipes")]
    TypeMismatch { reference: String, found: String },

    #[error("duplicate recipe id '{id}' (entries {first} and {second})")]
    DuplicateId {
        id: String,
        first: usize,
        second: usize,
    },

    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("YAML parse error in {}: {message}", path.display())]
    Yaml { path: PathBuf, message: String },
}

impl FeedstockError {
    pub(crate) fn schema(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Schema {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn reference(reference: &str, kind: ReferenceErrorKind) -> Self {
        Self::Reference {
            reference: reference.to_string(),
            kind,
        }
    }

    /// The reference error kind, if this is a resolution failure.
    pub fn reference_kind(&self) -> Option<&ReferenceErrorKind> {
        match self {
            Self::Reference { kind, .. } => Some(kind),
            _ => None,
        }
    }
}
