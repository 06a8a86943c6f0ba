//! Builds a [`Registry`] from the config directory, the environment and the
//! document store.

use std::fs;
use std::path::Path;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use kvstore::DocDbRO;
use serde_json::{Map, Value};
use thiserror::Error;

use super::{Config, Registry, Template, CONFIGS, TEMPLATES};
use crate::settings::Settings;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Base64(#[from] base64::DecodeError),
    #[error(transparent)]
    DocDb(#[from] kvstore::DocDbError),
}

/// Loads templates and configs. Environment maps replace the corresponding
/// directory; document store entries are applied last and win. Documents that
/// fail to parse are logged and skipped.
pub fn load(settings: &Settings) -> Result<Registry, LoadError> {
    let mut registry = Registry::new();

    let templates = match &settings.templates_env {
        Some(encoded) => decode_env_map(encoded)?,
        None => read_dir(&settings.templates_dir())?,
    };
    for (name, doc) in templates {
        add_template(&mut registry, &name, doc);
    }

    let configs = match &settings.configs_env {
        Some(encoded) => decode_env_map(encoded)?,
        None => read_dir(&settings.config_dir)?,
    };
    for (name, doc) in configs {
        add_config(&mut registry, &name, doc);
    }

    if settings.docs_db.is_file() {
        let db = DocDbRO::open(&settings.docs_db)?;
        for (name, doc) in db.entries::<Value>(TEMPLATES)? {
            add_template(&mut registry, &name, doc);
        }
        for (name, doc) in db.entries::<Value>(CONFIGS)? {
            add_config(&mut registry, &name, doc);
        }
    }

    Ok(registry)
}

fn add_template(registry: &mut Registry, name: &str, doc: Value) {
    match Template::from_value(doc) {
        Ok(template) => {
            log::info!("Loaded template {name}");
            registry.insert_template(name, template);
        }
        Err(e) => log::error!("Invalid template {name}: {e}"),
    }
}

fn add_config(registry: &mut Registry, name: &str, doc: Value) {
    match Config::from_value(doc) {
        Ok(config) => {
            log::info!("Loaded config {name}");
            registry.insert_config(name, config);
        }
        Err(e) => log::error!("Invalid config {name}: {e}"),
    }
}

/// Base64 encoded JSON object of `name -> document`.
fn decode_env_map(encoded: &str) -> Result<Map<String, Value>, LoadError> {
    let bytes = STANDARD.decode(encoded.trim())?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// `*.json` files of a directory keyed by file stem. A missing directory is
/// empty.
fn read_dir(dir: &Path) -> Result<Map<String, Value>, LoadError> {
    let mut docs = Map::new();
    if !dir.is_dir() {
        log::debug!("{} not found", dir.display());
        return Ok(docs);
    }

    let mut paths: Vec<_> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "json"))
        .collect();
    paths.sort();

    for path in paths {
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let parsed = fs::read_to_string(&path)
            .map_err(LoadError::from)
            .and_then(|text| serde_json::from_str::<Value>(&text).map_err(LoadError::from));
        match parsed {
            Ok(doc) => {
                docs.insert(stem.to_owned(), doc);
            }
            Err(e) => log::error!("Failed to read {}: {e}", path.display()),
        }
    }
    Ok(docs)
}
