//! Feedstock: a directory holding `meta.yaml` and the modules it references.

use super::error::Result;
use super::loader::{FileModuleLoader, ModuleLoader};
use super::parser;
use super::recipe::{self, ResolvedRecipeSet};
use super::types::{ExpandedMeta, ExpandedRecipeEntry, MetaDescriptor, RecipesSpec, META_FILE_NAME};
use std::path::{Path, PathBuf};
use tracing::debug;

/// A loaded and validated feedstock.
#[derive(Debug, Clone)]
pub struct Feedstock<L = FileModuleLoader> {
    dir: PathBuf,
    meta: MetaDescriptor,
    loader: L,
}

impl Feedstock {
    /// Open a feedstock directory, loading modules from disk.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        Self::with_loader(dir, FileModuleLoader)
    }
}

impl<L: ModuleLoader> Feedstock<L> {
    /// Open a feedstock directory with a custom module loader.
    pub fn with_loader(dir: impl Into<PathBuf>, loader: L) -> Result<Self> {
        let dir = dir.into();
        let meta = parser::parse_meta_file(&dir.join(META_FILE_NAME))?;
        debug!(
            feedstock = %dir.display(),
            shape = meta.recipes.shape(),
            "loaded meta.yaml"
        );
        Ok(Self { dir, meta, loader })
    }

    /// Build a feedstock from an already-validated descriptor.
    pub fn from_parts(dir: impl Into<PathBuf>, meta: MetaDescriptor, loader: L) -> Self {
        Self {
            dir: dir.into(),
            meta,
            loader,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn meta(&self) -> &MetaDescriptor {
        &self.meta
    }

    /// Expanded recipe entries.
    ///
    /// Dict-shape recipes resolve their reference, which loads the module.
    pub fn expanded_recipes(&self) -> Result<Vec<ExpandedRecipeEntry>> {
        recipe::expand_metadata(&self.meta.recipes, &self.dir, &self.loader)
    }

    /// The metadata with `recipes` expanded to one entry per recipe.
    pub fn get_expanded_meta(&self) -> Result<ExpandedMeta> {
        Ok(ExpandedMeta::new(&self.meta, self.expanded_recipes()?))
    }

    /// Resolve every recipe into its runnable object. Not cached.
    pub fn parse_recipes(&self) -> Result<ResolvedRecipeSet> {
        recipe::resolve_all(&self.meta.recipes, &self.dir, &self.loader)
    }

    /// Recipe ids, without loading modules for list-shape recipes.
    pub fn recipe_ids(&self) -> Result<Vec<String>> {
        match &self.meta.recipes {
            RecipesSpec::List(entries) => Ok(entries.iter().map(|e| e.id.clone()).collect()),
            RecipesSpec::Dict { .. } => Ok(self
                .expanded_recipes()?
                .into_iter()
                .map(|e| e.id)
                .collect()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::FeedstockError;
    use crate::core::loader::{ModuleValue, StaticModuleLoader};
    use crate::core::types::DICT_VALUE_PLACEHOLDER;

    #[derive(Debug, PartialEq)]
    struct Recipe;

    fn write_feedstock(meta: &str, module: &str) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(META_FILE_NAME), meta).unwrap();
        std::fs::write(dir.path().join("recipe.yaml"), module).unwrap();
        dir
    }

    #[test]
    fn test_scenario_list_shape() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(META_FILE_NAME),
            "recipes:\n  - id: sst\n    object: 'recipe:recipe'\n",
        )
        .unwrap();
        let loader = StaticModuleLoader::new().with_module(
            "recipe",
            ModuleValue::namespace([("recipe", ModuleValue::object(Recipe))]),
        );
        let feedstock = Feedstock::with_loader(dir.path(), loader).unwrap();

        let recipes = feedstock.parse_recipes().unwrap();
        assert_eq!(recipes.len(), 1);
        assert_eq!(recipes["sst"].downcast_ref::<Recipe>(), Some(&Recipe));

        let expanded = feedstock.get_expanded_meta().unwrap();
        assert_eq!(
            expanded.recipes,
            vec![ExpandedRecipeEntry {
                id: "sst".to_string(),
                object: "recipe:recipe".to_string(),
            }]
        );
    }

    #[test]
    fn test_scenario_dict_shape() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(META_FILE_NAME),
            "recipes:\n  dict_object: 'recipe:recipes'\n",
        )
        .unwrap();
        let loader = StaticModuleLoader::new().with_module(
            "recipe",
            ModuleValue::namespace([(
                "recipes",
                ModuleValue::namespace([("my_recipe", ModuleValue::object(Recipe))]),
            )]),
        );
        let feedstock = Feedstock::with_loader(dir.path(), loader).unwrap();

        let recipes = feedstock.parse_recipes().unwrap();
        assert_eq!(recipes.len(), 1);
        assert_eq!(recipes["my_recipe"].downcast_ref::<Recipe>(), Some(&Recipe));

        let expanded = feedstock.get_expanded_meta().unwrap();
        assert_eq!(
            expanded.recipes,
            vec![ExpandedRecipeEntry {
                id: "my_recipe".to_string(),
                object: DICT_VALUE_PLACEHOLDER.to_string(),
            }]
        );
    }

    #[test]
    fn test_file_feedstock_list_shape() {
        let dir = write_feedstock(
            r#"
title: NOAA OISST
recipes:
  - id: aws-noaa-sea-surface-temp-whoi
    object: 'recipe:recipe'
"#,
            "recipe:\n  target: zarr\n  inputs: [a.nc, b.nc]\n",
        );
        let feedstock = Feedstock::open(dir.path()).unwrap();
        assert_eq!(feedstock.meta().title.as_deref(), Some("NOAA OISST"));
        let recipes = feedstock.parse_recipes().unwrap();
        assert!(recipes["aws-noaa-sea-surface-temp-whoi"].is_mapping());
    }

    #[test]
    fn test_file_feedstock_dict_shape() {
        let dir = write_feedstock(
            "recipes:\n  dict_object: 'recipe:recipes'\n",
            "recipes:\n  daily: {freq: D}\n  monthly: {freq: M}\n",
        );
        let feedstock = Feedstock::open(dir.path()).unwrap();
        let expanded = feedstock.get_expanded_meta().unwrap();
        assert_eq!(expanded.recipe_ids(), vec!["daily", "monthly"]);
        assert!(expanded.recipes.iter().all(ExpandedRecipeEntry::is_dict_value));
        assert_eq!(feedstock.recipe_ids().unwrap(), vec!["daily", "monthly"]);
    }

    #[test]
    fn test_recipe_ids_list_shape_skips_modules() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(META_FILE_NAME),
            "recipes:\n  - id: a\n    object: 'gone:recipe'\n",
        )
        .unwrap();
        let feedstock = Feedstock::open(dir.path()).unwrap();
        assert_eq!(feedstock.recipe_ids().unwrap(), vec!["a"]);
        assert!(feedstock.parse_recipes().is_err());
    }

    #[test]
    fn test_missing_meta_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let err = Feedstock::open(dir.path()).unwrap_err();
        assert!(matches!(err, FeedstockError::Io { .. }));
    }

    #[test]
    fn test_invalid_meta_fails_before_resolution() {
        let dir = write_feedstock("recipes: 12\n", "recipe: {}\n");
        let err = Feedstock::open(dir.path()).unwrap_err();
        assert!(matches!(err, FeedstockError::Schema { .. }));
    }

    #[test]
    fn test_parse_recipes_is_fresh_each_call() {
        let dir = write_feedstock(
            "recipes:\n  - id: a\n    object: 'recipe:recipe'\n",
            "recipe: {version: 1}\n",
        );
        let feedstock = Feedstock::open(dir.path()).unwrap();
        let first = feedstock.parse_recipes().unwrap();
        std::fs::write(dir.path().join("recipe.yaml"), "recipe: {version: 2}\n").unwrap();
        let second = feedstock.parse_recipes().unwrap();
        let version = |set: &ResolvedRecipeSet| {
            set["a"]
                .attr("version")
                .and_then(|v| v.as_data().and_then(serde_yaml_ng::Value::as_u64))
        };
        assert_eq!(version(&first), Some(1));
        assert_eq!(version(&second), Some(2));
    }
}
