//! Plugin extension points.
//!
//! A [`Plugin`] is a named descriptor carrying any subset of the pipeline hooks.
//! Templates list plugins by name; [`PluginRegistry::resolve`] turns that list
//! into a [`PluginChain`] with per-config options attached, and the chain folds
//! each capability over its plugins in declared order.

pub mod builtin;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::connector::Parameters;
use crate::error::ConnectorError;
use crate::protocols::RequestOptions;
use crate::registry::{Config, PluginDecl, Template};

pub type HookResult<T> = Result<T, ConnectorError>;

#[async_trait]
pub trait ParametersHook: Send + Sync {
    async fn parameters(&self, config: &Config, options: &Value, parameters: Parameters)
        -> HookResult<Parameters>;
}

#[async_trait]
pub trait TemplateHook: Send + Sync {
    async fn template(&self, config: &Config, options: &Value, template: Template)
        -> HookResult<Template>;
}

#[async_trait]
pub trait RequestHook: Send + Sync {
    async fn request(
        &self,
        template: &Template,
        options: &Value,
        request: RequestOptions,
    ) -> HookResult<RequestOptions>;
}

#[async_trait]
pub trait ResponseHook: Send + Sync {
    async fn response(&self, template: &Template, options: &Value, response: Value)
        -> HookResult<Value>;
}

/// Runs on each mapped record before it becomes measurements.
#[async_trait]
pub trait DataHook: Send + Sync {
    async fn data(
        &self,
        template: &Template,
        options: &Value,
        data: Map<String, Value>,
    ) -> HookResult<Map<String, Value>>;
}

#[async_trait]
pub trait OutputHook: Send + Sync {
    async fn output(&self, template: &Template, options: &Value, output: Value) -> HookResult<Value>;
}

/// Runs on each merged item id; `index` is the resource path index.
#[async_trait]
pub trait IdHook: Send + Sync {
    async fn id(&self, template: &Template, index: usize, options: &Value, id: Value)
        -> HookResult<Value>;
}

/// Returns `Some` to recover from an adapter error.
#[async_trait]
pub trait ErrorHook: Send + Sync {
    async fn on_error(
        &self,
        template: &Template,
        options: &Value,
        error: &ConnectorError,
    ) -> Option<Value>;
}

#[async_trait]
pub trait StreamHook: Send + Sync {
    async fn stream(&self, template: &Template, options: &Value, output: Value) -> HookResult<Value>;
}

#[derive(Clone, Default)]
pub struct Plugin {
    pub name: String,
    pub parameters: Option<Arc<dyn ParametersHook>>,
    pub template: Option<Arc<dyn TemplateHook>>,
    pub request: Option<Arc<dyn RequestHook>>,
    pub response: Option<Arc<dyn ResponseHook>>,
    pub data: Option<Arc<dyn DataHook>>,
    pub output: Option<Arc<dyn OutputHook>>,
    pub id: Option<Arc<dyn IdHook>>,
    pub on_error: Option<Arc<dyn ErrorHook>>,
    pub stream: Option<Arc<dyn StreamHook>>,
}

impl Plugin {
    pub fn new(name: impl Into<String>) -> Self {
        Plugin {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_parameters(mut self, hook: impl ParametersHook + 'static) -> Self {
        self.parameters = Some(Arc::new(hook));
        self
    }

    pub fn with_template(mut self, hook: impl TemplateHook + 'static) -> Self {
        self.template = Some(Arc::new(hook));
        self
    }

    pub fn with_request(mut self, hook: impl RequestHook + 'static) -> Self {
        self.request = Some(Arc::new(hook));
        self
    }

    pub fn with_response(mut self, hook: impl ResponseHook + 'static) -> Self {
        self.response = Some(Arc::new(hook));
        self
    }

    pub fn with_data(mut self, hook: impl DataHook + 'static) -> Self {
        self.data = Some(Arc::new(hook));
        self
    }

    pub fn with_output(mut self, hook: impl OutputHook + 'static) -> Self {
        self.output = Some(Arc::new(hook));
        self
    }

    pub fn with_id(mut self, hook: impl IdHook + 'static) -> Self {
        self.id = Some(Arc::new(hook));
        self
    }

    pub fn with_on_error(mut self, hook: impl ErrorHook + 'static) -> Self {
        self.on_error = Some(Arc::new(hook));
        self
    }

    pub fn with_stream(mut self, hook: impl StreamHook + 'static) -> Self {
        self.stream = Some(Arc::new(hook));
        self
    }

    fn capabilities(&self) -> Vec<&'static str> {
        [
            ("parameters", self.parameters.is_some()),
            ("template", self.template.is_some()),
            ("request", self.request.is_some()),
            ("response", self.response.is_some()),
            ("data", self.data.is_some()),
            ("output", self.output.is_some()),
            ("id", self.id.is_some()),
            ("onerror", self.on_error.is_some()),
            ("stream", self.stream.is_some()),
        ]
        .into_iter()
        .filter_map(|(name, present)| present.then_some(name))
        .collect()
    }
}

impl fmt::Debug for Plugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Plugin")
            .field("name", &self.name)
            .field("hooks", &self.capabilities())
            .finish()
    }
}

/// A plugin with the options of the config it was resolved for.
#[derive(Debug, Clone)]
pub struct ResolvedPlugin {
    pub plugin: Arc<Plugin>,
    pub options: Value,
}

/// Ordered plugins of one request.
#[derive(Clone, Default)]
pub struct PluginChain(Arc<Vec<ResolvedPlugin>>);

impl fmt::Debug for PluginChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.0.iter().map(|p| &p.plugin.name))
            .finish()
    }
}

impl PluginChain {
    pub fn new(plugins: Vec<ResolvedPlugin>) -> Self {
        PluginChain(Arc::new(plugins))
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResolvedPlugin> {
        self.0.iter()
    }

    pub async fn parameters(&self, config: &Config, mut parameters: Parameters) -> HookResult<Parameters> {
        for p in self.iter() {
            if let Some(hook) = &p.plugin.parameters {
                parameters = hook.parameters(config, &p.options, parameters).await?;
            }
        }
        Ok(parameters)
    }

    pub async fn template(&self, config: &Config, mut template: Template) -> HookResult<Template> {
        for p in self.iter() {
            if let Some(hook) = &p.plugin.template {
                template = hook.template(config, &p.options, template).await?;
            }
        }
        Ok(template)
    }

    pub async fn request(&self, template: &Template, mut request: RequestOptions) -> HookResult<RequestOptions> {
        for p in self.iter() {
            if let Some(hook) = &p.plugin.request {
                request = hook.request(template, &p.options, request).await?;
            }
        }
        Ok(request)
    }

    pub async fn response(&self, template: &Template, mut response: Value) -> HookResult<Value> {
        for p in self.iter() {
            if let Some(hook) = &p.plugin.response {
                response = hook.response(template, &p.options, response).await?;
            }
        }
        Ok(response)
    }

    pub async fn data(&self, template: &Template, mut data: Map<String, Value>) -> HookResult<Map<String, Value>> {
        for p in self.iter() {
            if let Some(hook) = &p.plugin.data {
                data = hook.data(template, &p.options, data).await?;
            }
        }
        Ok(data)
    }

    pub async fn output(&self, template: &Template, mut output: Value) -> HookResult<Value> {
        for p in self.iter() {
            if let Some(hook) = &p.plugin.output {
                output = hook.output(template, &p.options, output).await?;
            }
        }
        Ok(output)
    }

    pub async fn id(&self, template: &Template, index: usize, mut id: Value) -> HookResult<Value> {
        for p in self.iter() {
            if let Some(hook) = &p.plugin.id {
                id = hook.id(template, index, &p.options, id).await?;
            }
        }
        Ok(id)
    }

    /// First hook returning `Some` wins.
    pub async fn on_error(&self, template: &Template, error: &ConnectorError) -> Option<Value> {
        for p in self.iter() {
            if let Some(hook) = &p.plugin.on_error {
                if let Some(recovered) = hook.on_error(template, &p.options, error).await {
                    return Some(recovered);
                }
            }
        }
        None
    }

    /// Stream hooks with their options, in declared order.
    pub fn stream_hooks(&self) -> Vec<(Arc<dyn StreamHook>, Value)> {
        self.iter()
            .filter_map(|p| p.plugin.stream.clone().map(|h| (h, p.options.clone())))
            .collect()
    }
}

/// Process-wide plugins by name.
#[derive(Debug, Clone, Default)]
pub struct PluginRegistry(HashMap<String, Arc<Plugin>>);

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the built-in plugins.
    pub fn with_builtins() -> Self {
        builtin::all()
            .into_iter()
            .fold(Self::new(), |registry, plugin| registry.with(plugin))
    }

    pub fn with(mut self, plugin: Plugin) -> Self {
        self.register(plugin);
        self
    }

    pub fn register(&mut self, plugin: Plugin) {
        self.0.insert(plugin.name.clone(), Arc::new(plugin));
    }

    pub fn get(&self, name: &str) -> Option<&Arc<Plugin>> {
        self.0.get(name)
    }

    /// Resolves a template's plugin list. Any unknown name fails the whole
    /// resolution, listing every missing plugin.
    pub fn resolve(&self, decls: &[PluginDecl], config: &Config) -> HookResult<PluginChain> {
        let mut resolved = Vec::with_capacity(decls.len());
        let mut missing = Vec::new();

        for decl in decls {
            let Some(name) = decl.name() else {
                missing.push(serde_json::to_string(decl).unwrap_or_default());
                continue;
            };
            match self.get(name) {
                Some(plugin) => {
                    let options = config
                        .plugin_options(name)
                        .cloned()
                        .or_else(|| decl.inline_options())
                        .unwrap_or_else(|| Value::Object(Map::new()));
                    resolved.push(ResolvedPlugin {
                        plugin: plugin.clone(),
                        options,
                    });
                }
                None => missing.push(name.to_owned()),
            }
        }

        if !missing.is_empty() {
            return Err(ConnectorError::MissingPlugins(missing));
        }
        Ok(PluginChain::new(resolved))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Suffix(&'static str);

    #[async_trait]
    impl OutputHook for Suffix {
        async fn output(&self, _: &Template, options: &Value, output: Value) -> HookResult<Value> {
            let tag = options.get("tag").and_then(Value::as_str).unwrap_or(self.0);
            Ok(Value::String(format!("{}{}", output.as_str().unwrap_or_default(), tag)))
        }
    }

    struct Decline;

    #[async_trait]
    impl ErrorHook for Decline {
        async fn on_error(&self, _: &Template, _: &Value, _: &ConnectorError) -> Option<Value> {
            None
        }
    }

    struct Recover;

    #[async_trait]
    impl ErrorHook for Recover {
        async fn on_error(&self, _: &Template, _: &Value, _: &ConnectorError) -> Option<Value> {
            Some(json!("recovered"))
        }
    }

    fn decls(names: &[&str]) -> Vec<PluginDecl> {
        names.iter().map(|n| PluginDecl::Name(n.to_string())).collect()
    }

    #[tokio::test]
    async fn output_hooks_fold_in_declared_order() {
        let registry = PluginRegistry::new()
            .with(Plugin::new("a").with_output(Suffix("a")))
            .with(Plugin::new("b").with_output(Suffix("b")));
        let config = Config::from_value(json!({"plugins": {"b": {"tag": "B"}}})).unwrap();

        let chain = registry.resolve(&decls(&["b", "a"]), &config).unwrap();
        let out = chain.output(&Template::default(), json!("")).await.unwrap();
        assert_eq!(out, json!("Ba"));
    }

    #[test]
    fn missing_plugins_are_all_listed() {
        let registry = PluginRegistry::new().with(Plugin::new("a"));
        let err = registry
            .resolve(&decls(&["a", "x", "y"]), &Config::default())
            .unwrap_err();
        assert_eq!(err.http_status_code(), 500);
        assert_eq!(err.to_string(), "Missing required plugins: x,y");
    }

    #[test]
    fn options_default_to_empty_object() {
        let registry = PluginRegistry::new().with(Plugin::new("a"));
        let chain = registry.resolve(&decls(&["a"]), &Config::default()).unwrap();
        assert_eq!(chain.iter().next().unwrap().options, json!({}));
    }

    #[test]
    fn options_are_per_resolution() {
        let registry = PluginRegistry::new().with(Plugin::new("a"));
        let c1 = Config::from_value(json!({"plugins": {"a": {"n": 1}}})).unwrap();
        let c2 = Config::from_value(json!({"plugins": {"a": {"n": 2}}})).unwrap();
        let first = registry.resolve(&decls(&["a"]), &c1).unwrap();
        let second = registry.resolve(&decls(&["a"]), &c2).unwrap();
        assert_eq!(first.iter().next().unwrap().options, json!({"n": 1}));
        assert_eq!(second.iter().next().unwrap().options, json!({"n": 2}));
    }

    #[tokio::test]
    async fn first_recovering_error_hook_wins() {
        let registry = PluginRegistry::new()
            .with(Plugin::new("decline").with_on_error(Decline))
            .with(Plugin::new("recover").with_on_error(Recover));
        let chain = registry
            .resolve(&decls(&["decline", "recover"]), &Config::default())
            .unwrap();
        let err = ConnectorError::status(418, "teapot");
        assert_eq!(
            chain.on_error(&Template::default(), &err).await,
            Some(json!("recovered"))
        );

        let chain = registry.resolve(&decls(&["decline"]), &Config::default()).unwrap();
        assert_eq!(chain.on_error(&Template::default(), &err).await, None);
    }
}
