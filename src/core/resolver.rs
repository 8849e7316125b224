//! Reference resolution: `<module-id>:<attribute.path>` to a value.
//!
//! The module is loaded relative to the feedstock directory and the
//! attribute path is walked one segment at a time. Loading runs whatever the
//! feedstock author put in the module.

use super::error::{FeedstockError, ReferenceErrorKind, Result};
use super::loader::{LoadError, ModuleLoader, ModuleValue};
use std::fmt;
use std::path::Path;
use tracing::debug;

/// A parsed reference string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub module: String,
    pub path: Vec<String>,
}

impl Reference {
    /// Split on the first `:` and then split the attribute path on `.`.
    ///
    /// Empty path segments are kept; resolution reports them as missing
    /// attributes.
    pub fn parse(reference: &str) -> Result<Self> {
        let malformed =
            || FeedstockError::reference(reference, ReferenceErrorKind::MalformedReference);

        let (module, path) = reference.split_once(':').ok_or_else(malformed)?;
        if module.is_empty() {
            return Err(malformed());
        }
        let path: Vec<String> = path.split('.').map(str::to_string).collect();

        Ok(Self {
            module: module.to_string(),
            path,
        })
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.module, self.path.join("."))
    }
}

/// Resolve a reference string against modules under `base_dir`.
pub fn resolve_reference<L>(reference: &str, base_dir: &Path, loader: &L) -> Result<ModuleValue>
where
    L: ModuleLoader + ?Sized,
{
    let parsed = Reference::parse(reference)?;

    let mut current = loader
        .load(base_dir, &parsed.module)
        .map_err(|e| match e {
            LoadError::NotFound => FeedstockError::reference(
                reference,
                ReferenceErrorKind::ModuleNotFound {
                    module: parsed.module.clone(),
                },
            ),
            LoadError::Init(source) => FeedstockError::ModuleInit(source),
        })?;

    for segment in &parsed.path {
        current = current.attr(segment).ok_or_else(|| {
            FeedstockError::reference(
                reference,
                ReferenceErrorKind::AttributeNotFound {
                    segment: segment.clone(),
                },
            )
        })?;
    }

    debug!(reference, kind = current.kind(), "resolved reference");
    Ok(current)
}
