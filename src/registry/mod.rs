//! Data product configs and connection templates.
//!
//! A [`Registry`] is an immutable snapshot. Request handling reads a snapshot from
//! the shared [`RegistryHandle`]; reloading builds a new registry and swaps it in,
//! so a request never observes a half-loaded set of documents.

mod config;
pub mod loader;
mod template;

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use config::Config;
pub use template::{
    AuthConfig, ExtractionRule, GeneralConfig, InputSpec, Mode, OutputKeys, OutputNames,
    PluginDecl, QueryConfig, Template,
};

pub const CONFIGS: &str = "configs";
pub const TEMPLATES: &str = "templates";

/// A single value or a list of them, as accepted by several document fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T: Clone> OneOrMany<T> {
    pub fn to_vec(&self) -> Vec<T> {
        match self {
            OneOrMany::One(v) => vec![v.clone()],
            OneOrMany::Many(v) => v.clone(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Registry {
    configs: HashMap<String, Config>,
    templates: HashMap<String, Template>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, product_code: impl Into<String>, config: Config) -> Self {
        self.insert_config(product_code, config);
        self
    }

    pub fn with_template(mut self, name: impl Into<String>, template: Template) -> Self {
        self.insert_template(name, template);
        self
    }

    pub fn insert_config(&mut self, product_code: impl Into<String>, config: Config) {
        self.configs.insert(product_code.into(), config);
    }

    pub fn insert_template(&mut self, name: impl Into<String>, template: Template) {
        self.templates.insert(name.into(), template);
    }

    pub fn config(&self, product_code: &str) -> Option<&Config> {
        self.configs.get(product_code)
    }

    pub fn template(&self, name: &str) -> Option<&Template> {
        self.templates.get(name)
    }

    /// Generic document lookup by collection name.
    pub fn get_doc(&self, collection: &str, key: &str) -> Option<Value> {
        match collection {
            CONFIGS => self.config(key).and_then(|c| serde_json::to_value(c).ok()),
            TEMPLATES => self.template(key).and_then(|t| serde_json::to_value(t).ok()),
            _ => None,
        }
    }

    pub fn config_count(&self) -> usize {
        self.configs.len()
    }

    pub fn template_count(&self) -> usize {
        self.templates.len()
    }
}

/// Shared, swappable registry.
#[derive(Debug, Default)]
pub struct RegistryHandle(RwLock<Arc<Registry>>);

impl RegistryHandle {
    pub fn new(registry: Registry) -> Self {
        RegistryHandle(RwLock::new(Arc::new(registry)))
    }

    pub fn snapshot(&self) -> Arc<Registry> {
        self.0
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replaces the current registry, returning the previous one.
    pub fn swap(&self, registry: Registry) -> Arc<Registry> {
        let mut guard = self.0.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *guard, Arc::new(registry))
    }

    pub fn reload(&self, settings: &crate::settings::Settings) -> Result<(), loader::LoadError> {
        let registry = loader::load(settings)?;
        log::info!(
            "Registry reloaded: {} configs, {} templates",
            registry.config_count(),
            registry.template_count()
        );
        self.swap(registry);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn swap_keeps_old_snapshots_intact() {
        let handle = RegistryHandle::new(
            Registry::new().with_config("a", Config::from_value(json!({"template": "t1"})).unwrap()),
        );
        let before = handle.snapshot();

        handle.swap(
            Registry::new().with_config("a", Config::from_value(json!({"template": "t2"})).unwrap()),
        );

        assert_eq!(before.config("a").unwrap().template.as_deref(), Some("t1"));
        assert_eq!(
            handle.snapshot().config("a").unwrap().template.as_deref(),
            Some("t2")
        );
    }

    #[test]
    fn reload_swaps_in_loaded_documents() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("templates")).unwrap();
        std::fs::write(dir.path().join("templates/t.json"), r#"{"protocol": "rest"}"#).unwrap();
        std::fs::write(dir.path().join("default.json"), r#"{"template": "t"}"#).unwrap();
        let settings = crate::settings::Settings {
            config_dir: dir.path().to_path_buf(),
            docs_db: dir.path().join("docs.db"),
            ..Default::default()
        };

        let handle = RegistryHandle::default();
        let empty = handle.snapshot();
        handle.reload(&settings).unwrap();
        assert_eq!(empty.config_count(), 0);

        let first = handle.snapshot();
        assert_eq!(first.config("default").unwrap().template.as_deref(), Some("t"));
        assert_eq!(first.template_count(), 1);

        std::fs::write(dir.path().join("default.json"), r#"{"template": "t2"}"#).unwrap();
        handle.reload(&settings).unwrap();
        assert_eq!(first.config("default").unwrap().template.as_deref(), Some("t"));
        assert_eq!(
            handle.snapshot().config("default").unwrap().template.as_deref(),
            Some("t2")
        );
    }

    #[test]
    fn get_doc_by_collection() {
        let registry = Registry::new()
            .with_template("t", Template::from_value(json!({"protocol": "rest"})).unwrap());
        assert_eq!(registry.get_doc(TEMPLATES, "t").unwrap()["protocol"], "rest");
        assert!(registry.get_doc(CONFIGS, "t").is_none());
        assert!(registry.get_doc("other", "t").is_none());
    }

    #[test]
    fn one_or_many_accepts_both_shapes() {
        let one: OneOrMany<String> = serde_json::from_value(json!("rest")).unwrap();
        let many: OneOrMany<String> = serde_json::from_value(json!(["rest", "custom"])).unwrap();
        assert_eq!(one.to_vec(), vec!["rest"]);
        assert_eq!(many.to_vec(), vec!["rest", "custom"]);
    }
}
