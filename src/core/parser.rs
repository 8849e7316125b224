//! `meta.yaml` parsing and validation.
//!
//! Only `recipes` is required. Its value must be exactly one of:
//! - a sequence of `{id, object}` mappings (list shape)
//! - a single-key mapping whose value is a reference string (dict shape)
//!
//! No coercion happens between the two. Other documented fields only have
//! their container shape checked; unknown keys pass through.

use super::error::{FeedstockError, Result};
use super::types::*;
use indexmap::IndexMap;
use serde_yaml_ng::{Mapping, Value};
use std::path::Path;

/// Keys with a documented meaning in `meta.yaml`.
const KNOWN_FIELDS: [&str; 5] = ["title", "description", "recipes", "provenance", "maintainers"];

/// Parse and validate a `meta.yaml` file from disk.
pub fn parse_meta_file(path: &Path) -> Result<MetaDescriptor> {
    let content = std::fs::read_to_string(path).map_err(|source| FeedstockError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let value: Value = serde_yaml_ng::from_str(&content).map_err(|e| FeedstockError::Yaml {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    validate_meta(&value)
}

/// Parse and validate a `meta.yaml` document from a string.
pub fn parse_meta(yaml: &str) -> Result<MetaDescriptor> {
    let value: Value = serde_yaml_ng::from_str(yaml).map_err(|e| FeedstockError::Yaml {
        path: META_FILE_NAME.into(),
        message: e.to_string(),
    })?;
    validate_meta(&value)
}

/// Validate a raw metadata document.
pub fn validate_meta(raw: &Value) -> Result<MetaDescriptor> {
    let root = raw
        .as_mapping()
        .ok_or_else(|| FeedstockError::schema("<root>", "document must be a mapping"))?;

    let recipes = root
        .get("recipes")
        .ok_or_else(|| FeedstockError::schema("recipes", "required field is missing"))?;

    let mut extra = IndexMap::new();
    for (key, value) in root {
        let name = key
            .as_str()
            .ok_or_else(|| FeedstockError::schema("<root>", "keys must be strings"))?;
        if !KNOWN_FIELDS.contains(&name) {
            extra.insert(name.to_string(), value.clone());
        }
    }

    Ok(MetaDescriptor {
        title: optional_string(root, "title")?,
        description: optional_string(root, "description")?,
        recipes: validate_recipes(recipes)?,
        provenance: optional_mapping(root, "provenance")?,
        maintainers: optional_mapping_list(root, "maintainers")?,
        extra,
    })
}

/// Validate the `recipes` field into one of the two shapes.
pub fn validate_recipes(value: &Value) -> Result<RecipesSpec> {
    match value {
        Value::Sequence(items) => {
            let mut entries = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                let field = format!("recipes[{}]", i);
                let map = item.as_mapping().ok_or_else(|| {
                    FeedstockError::schema(&field, "list entries must be {id, object} mappings")
                })?;
                if looks_like_wrapped_dict(map) {
                    return Err(FeedstockError::schema(
                        format!("{}.id", field),
                        "required field is missing; the dict form \
                         `recipes: {<key>: '<module>:<attribute>'}` must not be wrapped in a list",
                    ));
                }
                entries.push(RecipeEntry {
                    id: required_string(map, &field, "id")?,
                    object: required_string(map, &field, "object")?,
                });
            }
            Ok(RecipesSpec::List(entries))
        }
        Value::Mapping(map) => {
            if map.len() != 1 {
                return Err(FeedstockError::schema(
                    "recipes",
                    format!(
                        "dict form must have exactly one key mapping to a reference, found {}",
                        map.len()
                    ),
                ));
            }
            let (key, reference) = map
                .iter()
                .next()
                .ok_or_else(|| FeedstockError::schema("recipes", "empty mapping"))?;
            let key = key
                .as_str()
                .ok_or_else(|| FeedstockError::schema("recipes", "dict key must be a string"))?;
            let reference = reference.as_str().ok_or_else(|| {
                FeedstockError::schema(
                    format!("recipes.{}", key),
                    "value must be a '<module>:<attribute>' reference string",
                )
            })?;
            Ok(RecipesSpec::Dict {
                key: key.to_string(),
                reference: reference.to_string(),
            })
        }
        other => Err(FeedstockError::schema(
            "recipes",
            format!(
                "expected a list of {{id, object}} or a single-key mapping, got {}",
                value_kind(other)
            ),
        )),
    }
}

/// A lone `key: '<module>:<attr>'` entry, i.e. the dict form written as a list item.
fn looks_like_wrapped_dict(map: &Mapping) -> bool {
    map.len() == 1
        && !map.contains_key("id")
        && map.values().all(|v| v.as_str().is_some_and(|s| s.contains(':')))
}

fn required_string(map: &Mapping, parent: &str, key: &str) -> Result<String> {
    let field = format!("{}.{}", parent, key);
    match map.get(key) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(FeedstockError::schema(
            field,
            format!("must be a string, got {}", value_kind(other)),
        )),
        None => Err(FeedstockError::schema(field, "required field is missing")),
    }
}

fn optional_string(root: &Mapping, key: &str) -> Result<Option<String>> {
    match root.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(FeedstockError::schema(
            key,
            format!("must be a string, got {}", value_kind(other)),
        )),
    }
}

fn optional_mapping(root: &Mapping, key: &str) -> Result<Option<Mapping>> {
    match root.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Mapping(m)) => Ok(Some(m.clone())),
        Some(other) => Err(FeedstockError::schema(
            key,
            format!("must be a mapping, got {}", value_kind(other)),
        )),
    }
}

fn optional_mapping_list(root: &Mapping, key: &str) -> Result<Vec<Mapping>> {
    match root.get(key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Sequence(items)) => items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                item.as_mapping().cloned().ok_or_else(|| {
                    FeedstockError::schema(
                        format!("{}[{}]", key, i),
                        format!("must be a mapping, got {}", value_kind(item)),
                    )
                })
            })
            .collect(),
        Some(other) => Err(FeedstockError::schema(
            key,
            format!("must be a list of mappings, got {}", value_kind(other)),
        )),
    }
}

/// Human-readable kind of a YAML value.
pub fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "int",
        Value::String(_) => "string",
        Value::Sequence(_) => "sequence",
        Value::Mapping(_) => "mapping",
        Value::Tagged(_) => "tagged",
    }
}
