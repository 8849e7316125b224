//! Feedstock logic: meta.yaml schema, module loading, reference resolution, recipe expansion.

pub mod error;
pub mod feedstock;
pub mod loader;
pub mod parser;
pub mod recipe;
pub mod resolver;
pub mod types;

pub use error::{FeedstockError, ReferenceErrorKind};
pub use feedstock::Feedstock;
pub use loader::{FileModuleLoader, ModuleLoader, ModuleValue, StaticModuleLoader};
pub use recipe::ResolvedRecipeSet;
