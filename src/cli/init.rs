//! tally init command implementation
//!
//! Creates `.tally.toml` and the empty record store under the workspace root.

use std::path::{Path, PathBuf};

use crate::cli::resolve_root;
use crate::config::{Config, CONFIG_FILE};
use crate::error::{Error, Result};
use crate::output::{emit_success, HumanOutput, OutputOptions};
use crate::storage::Storage;

#[derive(serde::Serialize)]
struct InitReport {
    root: PathBuf,
    store_dir: PathBuf,
    created: InitCreated,
}

#[derive(serde::Serialize)]
struct InitCreated {
    config: bool,
    store: bool,
}

pub fn run(root: Option<PathBuf>, json: bool, quiet: bool) -> Result<()> {
    let root = resolve_root(root)?;
    if !root.is_dir() {
        return Err(Error::InvalidArgument(format!(
            "workspace root is not a directory: {}",
            root.display()
        )));
    }

    let (config, created_config) = ensure_config(&root)?;
    let storage = Storage::from_config(&root, &config);
    let created_store = !storage.is_initialized();
    storage.init()?;

    let report = InitReport {
        root: root.clone(),
        store_dir: storage.store_dir().to_path_buf(),
        created: InitCreated {
            config: created_config,
            store: created_store,
        },
    };

    let mut created_items = Vec::new();
    if created_config {
        created_items.push(CONFIG_FILE.to_string());
    }
    if created_store {
        created_items.push(format!("{}/", config.store.dir));
    }

    let header = if created_items.is_empty() {
        "tally init: nothing to do"
    } else {
        "tally init: initialized workspace"
    };

    let mut human = HumanOutput::new(header);
    human.push_summary("root", root.display().to_string());
    human.push_summary(
        "created",
        if created_items.is_empty() {
            "none".to_string()
        } else {
            created_items.join(", ")
        },
    );
    human.push_next_step("tally project add <name> --stage <id>");
    human.push_next_step("tally task add <title> --project <id>");

    emit_success(OutputOptions { json, quiet }, "init", &report, Some(&human))
}

/// Load the existing config strictly, or write the defaults.
fn ensure_config(root: &Path) -> Result<(Config, bool)> {
    let config_path = root.join(CONFIG_FILE);
    if config_path.exists() {
        if !config_path.is_file() {
            return Err(Error::InvalidConfig(format!(
                "{CONFIG_FILE} exists but is not a file: {}",
                config_path.display()
            )));
        }
        return Ok((Config::load(&config_path)?, false));
    }

    let config = Config::default();
    config.save(&config_path)?;
    Ok((config, true))
}
