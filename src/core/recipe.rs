//! Recipe set expansion: normalized metadata entries and resolved objects.
//!
//! List-shape recipes expand structurally without touching any module.
//! Dict-shape recipes always resolve their reference, so expanding them runs
//! module code even when the caller only wants to list ids.

use super::error::{FeedstockError, Result};
use super::loader::{ModuleLoader, ModuleValue};
use super::resolver::resolve_reference;
use super::types::{ExpandedRecipeEntry, RecipesSpec, DICT_VALUE_PLACEHOLDER};
use indexmap::IndexMap;
use std::path::Path;
use tracing::{info, warn};

/// Recipe id to resolved runnable object, in declaration order.
pub type ResolvedRecipeSet = IndexMap<String, ModuleValue>;

/// Expand a recipes spec into one metadata entry per concrete recipe.
pub fn expand_metadata<L>(
    spec: &RecipesSpec,
    base_dir: &Path,
    loader: &L,
) -> Result<Vec<ExpandedRecipeEntry>>
where
    L: ModuleLoader + ?Sized,
{
    match spec {
        RecipesSpec::List(entries) => Ok(entries.iter().map(ExpandedRecipeEntry::from).collect()),
        RecipesSpec::Dict { reference, .. } => Ok(resolve_mapping(reference, base_dir, loader)?
            .into_iter()
            .map(|(id, _)| ExpandedRecipeEntry {
                id,
                object: DICT_VALUE_PLACEHOLDER.to_string(),
            })
            .collect()),
    }
}

/// Resolve every recipe in the spec.
///
/// Fails on the first error; no partial set is returned.
pub fn resolve_all<L>(spec: &RecipesSpec, base_dir: &Path, loader: &L) -> Result<ResolvedRecipeSet>
where
    L: ModuleLoader + ?Sized,
{
    let mut recipes = ResolvedRecipeSet::new();

    match spec {
        RecipesSpec::List(entries) => {
            let mut positions: IndexMap<&str, usize> = IndexMap::new();
            for (i, entry) in entries.iter().enumerate() {
                let value = resolve_reference(&entry.object, base_dir, loader)?;
                if let Some(&first) = positions.get(entry.id.as_str()) {
                    warn!(id = %entry.id, first, second = i, "duplicate recipe id");
                    return Err(FeedstockError::DuplicateId {
                        id: entry.id.clone(),
                        first,
                        second: i,
                    });
                }
                positions.insert(&entry.id, i);
                recipes.insert(entry.id.clone(), value);
            }
        }
        RecipesSpec::Dict { reference, .. } => {
            recipes.extend(resolve_mapping(reference, base_dir, loader)?);
        }
    }

    info!(shape = spec.shape(), count = recipes.len(), "resolved recipes");
    Ok(recipes)
}

/// Resolve a dict-shape reference and require a string-keyed mapping.
fn resolve_mapping<L>(
    reference: &str,
    base_dir: &Path,
    loader: &L,
) -> Result<Vec<(String, ModuleValue)>>
where
    L: ModuleLoader + ?Sized,
{
    let value = resolve_reference(reference, base_dir, loader)?;
    value.mapping_entries().ok_or_else(|| FeedstockError::TypeMismatch {
        reference: reference.to_string(),
        found: if value.is_mapping() {
            "a mapping with non-string keys".to_string()
        } else {
            value.kind().to_string()
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ReferenceErrorKind;
    use crate::core::loader::StaticModuleLoader;
    use crate::core::types::RecipeEntry;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Debug, PartialEq)]
    struct Recipe(&'static str);

    fn entry(id: &str, object: &str) -> RecipeEntry {
        RecipeEntry {
            id: id.to_string(),
            object: object.to_string(),
        }
    }

    fn dict(reference: &str) -> RecipesSpec {
        RecipesSpec::Dict {
            key: "dict_object".to_string(),
            reference: reference.to_string(),
        }
    }

    fn loader() -> StaticModuleLoader {
        StaticModuleLoader::new().with_module(
            "m",
            ModuleValue::namespace([
                ("x", ModuleValue::object(Recipe("x"))),
                ("y", ModuleValue::object(Recipe("y"))),
                (
                    "recipes",
                    ModuleValue::namespace([
                        ("zulu", ModuleValue::object(Recipe("z"))),
                        ("alpha", ModuleValue::object(Recipe("a"))),
                    ]),
                ),
                ("empty", ModuleValue::namespace(Vec::<(String, ModuleValue)>::new())),
                ("scalar", ModuleValue::Data(serde_yaml_ng::Value::Bool(true))),
            ]),
        )
    }

    fn base() -> &'static Path {
        Path::new("/feedstock")
    }

    #[test]
    fn test_list_resolve_keys_match_declared_ids() {
        let spec = RecipesSpec::List(vec![entry("first", "m:x"), entry("second", "m:y")]);
        let recipes = resolve_all(&spec, base(), &loader()).unwrap();
        let ids: Vec<&str> = recipes.keys().map(String::as_str).collect();
        assert_eq!(ids, vec!["first", "second"]);
        assert_eq!(recipes["first"].downcast_ref::<Recipe>(), Some(&Recipe("x")));
    }

    #[test]
    fn test_list_duplicate_id() {
        let spec = RecipesSpec::List(vec![entry("a", "m:x"), entry("a", "m:y")]);
        match resolve_all(&spec, base(), &loader()).unwrap_err() {
            FeedstockError::DuplicateId { id, first, second } => {
                assert_eq!(id, "a");
                assert_eq!((first, second), (0, 1));
            }
            other => panic!("expected duplicate id, got {other:?}"),
        }
    }

    #[test]
    fn test_ids_are_case_sensitive() {
        let spec = RecipesSpec::List(vec![entry("a", "m:x"), entry("A", "m:y")]);
        assert_eq!(resolve_all(&spec, base(), &loader()).unwrap().len(), 2);
    }

    #[test]
    fn test_list_expand_does_not_load_modules() {
        let loads = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&loads);
        let loader = StaticModuleLoader::new().with_factory("m", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(ModuleValue::namespace([("x", ModuleValue::object(Recipe("x")))]))
        });
        let spec = RecipesSpec::List(vec![entry("sst", "m:x"), entry("broken", "nope")]);
        let expanded = expand_metadata(&spec, base(), &loader).unwrap();
        assert_eq!(loads.load(Ordering::SeqCst), 0);
        assert_eq!(expanded[1].object, "nope");
    }

    #[test]
    fn test_dict_resolve_keys_match_mapping() {
        let recipes = resolve_all(&dict("m:recipes"), base(), &loader()).unwrap();
        let ids: Vec<&str> = recipes.keys().map(String::as_str).collect();
        assert_eq!(ids, vec!["zulu", "alpha"]);
        assert_eq!(recipes["alpha"].downcast_ref::<Recipe>(), Some(&Recipe("a")));
    }

    #[test]
    fn test_dict_expand_uses_placeholder_in_mapping_order() {
        let expanded = expand_metadata(&dict("m:recipes"), base(), &loader()).unwrap();
        let ids: Vec<&str> = expanded.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["zulu", "alpha"]);
        assert!(expanded.iter().all(|e| e.object == DICT_VALUE_PLACEHOLDER));
    }

    #[test]
    fn test_dict_non_mapping_is_type_mismatch() {
        for spec in [dict("m:scalar"), dict("m:x")] {
            let err = resolve_all(&spec, base(), &loader()).unwrap_err();
            assert!(matches!(err, FeedstockError::TypeMismatch { .. }), "{err}");
            let err = expand_metadata(&spec, base(), &loader()).unwrap_err();
            assert!(matches!(err, FeedstockError::TypeMismatch { .. }), "{err}");
        }
    }

    #[test]
    fn test_dict_data_mapping_with_int_keys_is_type_mismatch() {
        let loader = StaticModuleLoader::new().with_module(
            "m",
            ModuleValue::Data(serde_yaml_ng::from_str("recipes:\n  1: a\n").unwrap()),
        );
        let err = resolve_all(&dict("m:recipes"), base(), &loader).unwrap_err();
        assert!(err.to_string().contains("non-string keys"));
    }

    #[test]
    fn test_empty_shapes_yield_empty_set() {
        assert!(resolve_all(&RecipesSpec::List(vec![]), base(), &loader())
            .unwrap()
            .is_empty());
        assert!(resolve_all(&dict("m:empty"), base(), &loader())
            .unwrap()
            .is_empty());
        assert!(expand_metadata(&dict("m:empty"), base(), &loader())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_dict_values_are_not_re_resolved() {
        let loader = StaticModuleLoader::new().with_module(
            "m",
            ModuleValue::Data(serde_yaml_ng::from_str("recipes:\n  a: 'm:other'\n").unwrap()),
        );
        let recipes = resolve_all(&dict("m:recipes"), base(), &loader).unwrap();
        let value = recipes["a"].as_data().and_then(serde_yaml_ng::Value::as_str);
        assert_eq!(value, Some("m:other"));
    }

    #[test]
    fn test_dict_resolves_reference_once_per_call() {
        let loads = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&loads);
        let loader = StaticModuleLoader::new().with_factory("m", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(ModuleValue::namespace([(
                "recipes",
                ModuleValue::namespace([
                    ("a", ModuleValue::object(Recipe("a"))),
                    ("b", ModuleValue::object(Recipe("b"))),
                ]),
            )]))
        });
        resolve_all(&dict("m:recipes"), base(), &loader).unwrap();
        assert_eq!(loads.load(Ordering::SeqCst), 1);
        expand_metadata(&dict("m:recipes"), base(), &loader).unwrap();
        assert_eq!(loads.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_first_error_aborts_resolution() {
        let spec = RecipesSpec::List(vec![
            entry("ok", "m:x"),
            entry("missing", "m:nope"),
            entry("never", "no-colon-here"),
        ]);
        let err = resolve_all(&spec, base(), &loader()).unwrap_err();
        assert_eq!(
            err.reference_kind(),
            Some(&ReferenceErrorKind::AttributeNotFound {
                segment: "nope".to_string()
            })
        );
    }
}
