//! CLI subcommands for inspecting feedstocks and storage configs.

use crate::core::types::{RecipesSpec, META_FILE_NAME};
use crate::core::{parser, Feedstock};
use crate::storage::config::{self, StorageTargetConfig};
use crate::storage::{ConstructorShape, FilesystemRegistry, TargetApi, TargetLibrary};
use clap::Subcommand;
use std::path::{Path, PathBuf};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scaffold a new feedstock with a meta.yaml and a recipe module
    Init {
        /// Directory to initialize (default: current)
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Validate meta.yaml without loading any recipe module
    Validate {
        /// Feedstock directory
        #[arg(short, long, default_value = ".")]
        feedstock: PathBuf,
    },

    /// Print meta.yaml as JSON with recipes expanded to one entry each
    ExpandMeta {
        /// Feedstock directory
        #[arg(short, long, default_value = ".")]
        feedstock: PathBuf,
    },

    /// Resolve every recipe and list its id
    Recipes {
        /// Feedstock directory
        #[arg(short, long, default_value = ".")]
        feedstock: PathBuf,
    },

    /// Describe configured storage targets and construct them
    Storage {
        /// Runner config file
        #[arg(short, long, default_value = "runner.yaml")]
        config: PathBuf,

        /// Job name substituted for {job_name} in root paths
        #[arg(short, long)]
        job_name: String,

        /// Target library release line to construct against
        #[arg(long, value_enum, default_value_t = TargetApi::AssumeRole)]
        api: TargetApi,
    },
}

/// Dispatch a CLI command.
pub fn dispatch(cmd: Commands) -> Result<(), String> {
    match cmd {
        Commands::Init { path } => cmd_init(&path),
        Commands::Validate { feedstock } => cmd_validate(&feedstock),
        Commands::ExpandMeta { feedstock } => cmd_expand_meta(&feedstock),
        Commands::Recipes { feedstock } => cmd_recipes(&feedstock),
        Commands::Storage {
            config,
            job_name,
            api,
        } => cmd_storage(&config, &job_name, api),
    }
}

fn cmd_init(path: &Path) -> Result<(), String> {
    let meta_path = path.join(META_FILE_NAME);
    if meta_path.exists() {
        return Err(format!("{} already exists", meta_path.display()));
    }
    std::fs::create_dir_all(path)
        .map_err(|e| format!("cannot create {}: {}", path.display(), e))?;

    let meta = r#"title: "My dataset"
description: "Managed by feedstock-runner"
recipes:
  - id: my-recipe
    object: "recipe:recipe"
provenance:
  providers: []
  license: ""
maintainers: []
"#;
    let recipe = r#"recipe:
  inputs: []
  target: zarr
"#;
    let recipe_path = path.join("recipe.yaml");
    for (file, content) in [(&meta_path, meta), (&recipe_path, recipe)] {
        std::fs::write(file, content)
            .map_err(|e| format!("cannot write {}: {}", file.display(), e))?;
    }

    println!("Initialized feedstock at {}", path.display());
    println!("  Created: {}", meta_path.display());
    println!("  Created: {}", recipe_path.display());
    Ok(())
}

fn cmd_validate(feedstock: &Path) -> Result<(), String> {
    let meta = parser::parse_meta_file(&feedstock.join(META_FILE_NAME))
        .map_err(|e| e.to_string())?;
    let declared = match &meta.recipes {
        RecipesSpec::List(entries) => format!("{} recipes", entries.len()),
        RecipesSpec::Dict { reference, .. } => {
            format!("recipes from {}", reference)
        }
    };
    println!(
        "OK: {} ({})",
        meta.title.as_deref().unwrap_or("<untitled>"),
        declared
    );
    Ok(())
}

fn cmd_expand_meta(feedstock: &Path) -> Result<(), String> {
    println!("{}", expanded_meta_json(feedstock)?);
    Ok(())
}

/// Expanded metadata as pretty JSON.
fn expanded_meta_json(feedstock: &Path) -> Result<String, String> {
    let feedstock = Feedstock::open(feedstock).map_err(|e| e.to_string())?;
    let expanded = feedstock.get_expanded_meta().map_err(|e| e.to_string())?;
    serde_json::to_string_pretty(&expanded).map_err(|e| format!("serialize error: {}", e))
}

fn cmd_recipes(feedstock: &Path) -> Result<(), String> {
    for line in recipe_lines(feedstock)? {
        println!("{}", line);
    }
    Ok(())
}

fn recipe_lines(feedstock: &Path) -> Result<Vec<String>, String> {
    let feedstock = Feedstock::open(feedstock).map_err(|e| e.to_string())?;
    let recipes = feedstock.parse_recipes().map_err(|e| e.to_string())?;
    Ok(recipes
        .iter()
        .map(|(id, value)| format!("{}\t{}", id, value.kind()))
        .collect())
}

fn cmd_storage(config_path: &Path, job_name: &str, api: TargetApi) -> Result<(), String> {
    for line in storage_lines(config_path, job_name, api)? {
        println!("{}", line);
    }
    Ok(())
}

fn storage_lines(
    config_path: &Path,
    job_name: &str,
    api: TargetApi,
) -> Result<Vec<String>, String> {
    let config = config::parse_config_file(config_path).map_err(|e| e.to_string())?;
    let library = TargetLibrary::builtin(api);
    let filesystems = FilesystemRegistry::default();

    config
        .slots()
        .into_iter()
        .map(|slot| describe_slot(slot, job_name, &library, &filesystems))
        .collect()
}

fn describe_slot(
    slot: &StorageTargetConfig,
    job_name: &str,
    library: &TargetLibrary,
    filesystems: &FilesystemRegistry,
) -> Result<String, String> {
    if slot.is_default() {
        return Ok(format!("{}: (unconfigured)", slot.kind));
    }
    let target = slot
        .get_forge_target(job_name, library, filesystems)
        .map_err(|e| format!("{}: {}", slot.kind, e))?;
    let shape = library
        .get(slot.target_class_name())
        .and_then(|class| class.signature())
        .map(|signature| ConstructorShape::select(&signature));
    let shape = shape.map_or_else(|| "unknown".to_string(), |s| s.to_string());
    Ok(format!(
        "{}: {} -> {} ({} constructor)",
        slot.kind,
        slot,
        target.root_path(),
        shape
    ))
}
