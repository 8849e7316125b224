//! Schema types for `meta.yaml` and the expanded metadata view.
//!
//! `recipes` is the only field the runner interprets. Everything else is
//! carried through untouched so `expand-meta` can re-emit it.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_yaml_ng::{Mapping, Value};
use std::fmt;

/// Sentinel `object` value for recipes expanded from a dict reference.
pub const DICT_VALUE_PLACEHOLDER: &str = "DICT_VALUE_PLACEHOLDER";

/// Name of the metadata document inside a feedstock directory.
pub const META_FILE_NAME: &str = "meta.yaml";

// ============================================================================
// meta.yaml
// ============================================================================

/// Validated contents of a feedstock's `meta.yaml`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetaDescriptor {
    /// Title for this dataset
    pub title: Option<String>,

    /// Description of the dataset
    pub description: Option<String>,

    /// Deployable recipe objects
    pub recipes: RecipesSpec,

    /// Provider, license, and similar provenance data
    pub provenance: Option<Mapping>,

    /// Feedstock maintainers (name, orcid, github, ...)
    pub maintainers: Vec<Mapping>,

    /// Top-level keys the runner does not interpret
    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

/// The two ways a feedstock can declare its recipes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecipesSpec {
    /// Each recipe is assigned to its own module attribute.
    ///
    /// ```yaml
    /// recipes:
    ///   - id: unique-identifier-for-recipe
    ///     object: "recipe:transforms"
    /// ```
    List(Vec<RecipeEntry>),

    /// Recipes are values of a single mapping attribute.
    ///
    /// ```yaml
    /// recipes:
    ///   dict_object: "recipe:name_of_recipes_dict"
    /// ```
    Dict { key: String, reference: String },
}

impl RecipesSpec {
    /// Shape name, for diagnostics.
    pub fn shape(&self) -> &'static str {
        match self {
            Self::List(_) => "list",
            Self::Dict { .. } => "dict",
        }
    }
}

impl Serialize for RecipesSpec {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::List(entries) => entries.serialize(serializer),
            Self::Dict { key, reference } => {
                let mut map = IndexMap::new();
                map.insert(key, reference);
                map.serialize(serializer)
            }
        }
    }
}

/// A list-shape recipe declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeEntry {
    pub id: String,
    pub object: String,
}

// ============================================================================
// Expanded view
// ============================================================================

/// One recipe in the expanded metadata view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpandedRecipeEntry {
    pub id: String,

    /// Original reference, or [`DICT_VALUE_PLACEHOLDER`] for dict-shape recipes
    pub object: String,
}

impl ExpandedRecipeEntry {
    /// Whether this entry came from a dict-shape declaration.
    pub fn is_dict_value(&self) -> bool {
        self.object == DICT_VALUE_PLACEHOLDER
    }
}

impl From<&RecipeEntry> for ExpandedRecipeEntry {
    fn from(entry: &RecipeEntry) -> Self {
        Self {
            id: entry.id.clone(),
            object: entry.object.clone(),
        }
    }
}

impl fmt::Display for ExpandedRecipeEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.id, self.object)
    }
}

/// `meta.yaml` with `recipes` replaced by one entry per concrete recipe.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExpandedMeta {
    pub title: Option<String>,
    pub description: Option<String>,
    pub recipes: Vec<ExpandedRecipeEntry>,
    pub provenance: Option<Mapping>,
    pub maintainers: Vec<Mapping>,
    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

impl ExpandedMeta {
    /// Combine a descriptor with its expanded recipe entries.
    pub fn new(meta: &MetaDescriptor, recipes: Vec<ExpandedRecipeEntry>) -> Self {
        Self {
            title: meta.title.clone(),
            description: meta.description.clone(),
            recipes,
            provenance: meta.provenance.clone(),
            maintainers: meta.maintainers.clone(),
            extra: meta.extra.clone(),
        }
    }

    /// Recipe ids in expansion order.
    pub fn recipe_ids(&self) -> Vec<&str> {
        self.recipes.iter().map(|r| r.id.as_str()).collect()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn list_meta() -> MetaDescriptor {
        MetaDescriptor {
            title: Some("SST".to_string()),
            description: None,
            recipes: RecipesSpec::List(vec![RecipeEntry {
                id: "sst".to_string(),
                object: "recipe:recipe".to_string(),
            }]),
            provenance: None,
            maintainers: vec![],
            extra: IndexMap::new(),
        }
    }

    #[test]
    fn test_recipes_spec_shape() {
        assert_eq!(list_meta().recipes.shape(), "list");
        let dict = RecipesSpec::Dict {
            key: "dict_object".to_string(),
            reference: "recipe:recipes".to_string(),
        };
        assert_eq!(dict.shape(), "dict");
    }

    #[test]
    fn test_dict_spec_serializes_as_single_key_mapping() {
        let dict = RecipesSpec::Dict {
            key: "dict_object".to_string(),
            reference: "recipe:recipes".to_string(),
        };
        let json = serde_json::to_string(&dict).unwrap();
        assert_eq!(json, r#"{"dict_object":"recipe:recipes"}"#);
    }

    #[test]
    fn test_list_spec_serializes_as_entries() {
        let json = serde_json::to_string(&list_meta().recipes).unwrap();
        assert_eq!(json, r#"[{"id":"sst","object":"recipe:recipe"}]"#);
    }

    #[test]
    fn test_expanded_meta_keeps_passthrough_fields() {
        let mut meta = list_meta();
        meta.extra.insert(
            "bakery".to_string(),
            Value::String("pangeo-ldeo-nsf-earthcube".to_string()),
        );
        let expanded = ExpandedMeta::new(
            &meta,
            vec![ExpandedRecipeEntry {
                id: "sst".to_string(),
                object: "recipe:recipe".to_string(),
            }],
        );
        assert_eq!(expanded.title.as_deref(), Some("SST"));
        assert_eq!(expanded.recipe_ids(), vec!["sst"]);
        let json = serde_json::to_value(&expanded).unwrap();
        assert_eq!(json["bakery"], "pangeo-ldeo-nsf-earthcube");
        assert_eq!(json["recipes"][0]["object"], "recipe:recipe");
    }

    #[test]
    fn test_placeholder_entry_detection() {
        let entry = ExpandedRecipeEntry {
            id: "my_recipe".to_string(),
            object: DICT_VALUE_PLACEHOLDER.to_string(),
        };
        assert!(entry.is_dict_value());
        assert_eq!(entry.to_string(), "my_recipe (DICT_VALUE_PLACEHOLDER)");
    }
}
