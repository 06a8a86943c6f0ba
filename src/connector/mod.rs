//! Request pipeline: validation, config lookup, parameter extraction,
//! placeholder resolution, temporal mode, plugin hooks, dispatch and output
//! composition.

pub mod credentials;
pub mod dispatch;
pub mod mode;
pub mod output;
mod parameters;
pub mod placeholders;
pub mod response;
pub mod validator;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;

use crate::constants::{defaults, request};
use crate::error::ConnectorError;
use crate::helpers::{json_path, parse_ts_or_now};
use crate::plugins::{Plugin, PluginRegistry};
use crate::protocols::{CustomProtocol, HookProtocol, ProtocolAdapter, Protocols, RestProtocol};
use crate::registry::{Config, Registry, RegistryHandle, Template};

pub use credentials::CredentialsProvider;
pub use output::{Composed, Harmonizer};
pub use parameters::Parameters;

use validator::{validate_parameters, RequiredFields};

/// Inbound broker request: the JSON body plus optional caller auth info handed
/// to the credentials provider.
#[derive(Debug, Clone, Default)]
pub struct BrokerRequest {
    pub body: Value,
    pub auth: Option<Value>,
}

impl From<Value> for BrokerRequest {
    fn from(body: Value) -> Self {
        BrokerRequest { body, auth: None }
    }
}

pub struct Connector {
    registry: Arc<RegistryHandle>,
    plugins: PluginRegistry,
    protocols: Protocols,
    hooks: Arc<HookProtocol>,
    credentials: Option<Arc<dyn CredentialsProvider>>,
    harmonizer: Option<Arc<dyn Harmonizer>>,
}

impl Connector {
    /// Connector with the built-in plugins and the `rest`, `custom` and `hook`
    /// protocols. `timeout` applies to every REST call.
    pub fn new(registry: Arc<RegistryHandle>, timeout: Duration) -> Self {
        let hooks = Arc::new(HookProtocol::new());
        let mut protocols = Protocols::new();
        protocols.insert("rest".into(), Arc::new(RestProtocol::new(timeout)));
        protocols.insert("custom".into(), Arc::new(CustomProtocol));
        protocols.insert("hook".into(), hooks.clone());

        Connector {
            registry,
            plugins: PluginRegistry::with_builtins(),
            protocols,
            hooks,
            credentials: None,
            harmonizer: None,
        }
    }

    pub fn with_protocol(mut self, name: impl Into<String>, adapter: impl ProtocolAdapter + 'static) -> Self {
        self.protocols.insert(name.into(), Arc::new(adapter));
        self
    }

    pub fn with_plugin(mut self, plugin: Plugin) -> Self {
        self.plugins.register(plugin);
        self
    }

    pub fn with_credentials(mut self, provider: impl CredentialsProvider + 'static) -> Self {
        self.credentials = Some(Arc::new(provider));
        self
    }

    pub fn with_harmonizer(mut self, harmonizer: impl Harmonizer + 'static) -> Self {
        self.harmonizer = Some(Arc::new(harmonizer));
        self
    }

    pub fn registry(&self) -> &Arc<RegistryHandle> {
        &self.registry
    }

    pub fn hooks(&self) -> &HookProtocol {
        &self.hooks
    }

    /// Runs the whole pipeline for one broker request.
    pub async fn get_data(&self, request: BrokerRequest) -> Result<Composed, ConnectorError> {
        let body = &request.body;
        RequiredFields::global().validate(body)?;

        let product_code = json_path::get_truthy(body, request::PRODUCT_CODE)
            .map(json_path::to_text)
            .unwrap_or_else(|| defaults::PRODUCT_CODE.to_owned());
        let (mut config, mut template) = lookup(&self.registry.snapshot(), &product_code)?;

        validate_parameters(body, &template)?;

        let timestamp = parse_ts_or_now(json_path::get_truthy(body, request::TIMESTAMP));
        let parameters = Parameters::extract(body, &template, timestamp);

        template.auth_config.template = config.template.clone();
        template.auth_config.product_code = Some(product_code.clone());
        template.product_code = Some(product_code.clone());
        config.product_code = Some(product_code.clone());

        if let Some(provider) = &self.credentials {
            config = credentials::attach_or_keep(
                provider.as_ref(),
                config,
                &product_code,
                request.auth.as_ref(),
            )
            .await;
        }

        let chain = self.plugins.resolve(&template.plugins, &config)?;
        let mut parameters = chain.parameters(&config, parameters).await?;

        let mut template = placeholders::resolve(&config, template, &mut parameters);
        template.timestamp = Some(timestamp);
        template.chain = chain.clone();
        let template = mode::interpret(template, parameters);

        let mut template = chain.template(&config, template).await?;
        if template.schema.is_none() {
            template.schema = config.schema.clone();
        }

        self.compose_output(template, None).await
    }

    /// Output envelope for a prepared template, dispatching unless `input`
    /// items are given.
    pub async fn compose_output(
        &self,
        template: Template,
        input: Option<Vec<Value>>,
    ) -> Result<Composed, ConnectorError> {
        output::compose(&self.protocols, self.harmonizer.as_deref(), template, input).await
    }

    /// Caches a pushed message. When the product's template has `stream` hooks,
    /// the output for the message is composed and folded through them.
    pub async fn receive_hook(
        &self,
        product_code: &str,
        topic: &str,
        message: Value,
    ) -> Result<Option<Composed>, ConnectorError> {
        self.hooks.store(product_code, topic, message.clone());

        let registry = self.registry.snapshot();
        let config = registry.config(product_code).cloned().unwrap_or_default();
        let Some(mut template) = config
            .template
            .as_deref()
            .and_then(|name| registry.template(name))
            .cloned()
        else {
            return Ok(None);
        };

        let chain = self.plugins.resolve(&template.plugins, &config)?;
        let streams = chain.stream_hooks();
        if streams.is_empty() {
            return Ok(None);
        }

        let id_key = template
            .general_config
            .hardware_id
            .as_ref()
            .and_then(|rule| rule.data_object_property.as_deref())
            .unwrap_or("id");
        let fallback = if topic.is_empty() { "latest" } else { topic };
        let id = message
            .get(id_key)
            .cloned()
            .unwrap_or_else(|| Value::String(fallback.to_owned()));
        template.auth_config.path = Some(Value::Array(vec![id]));
        template.auth_config.template = config.template.clone();
        template.auth_config.product_code = Some(product_code.to_owned());
        template.product_code = Some(product_code.to_owned());
        template.timestamp = Some(Utc::now());
        template.chain = chain;

        let mut composed = self.compose_output(template.clone(), None).await?;
        for (hook, options) in streams {
            composed.output = hook.stream(&template, &options, composed.output).await?;
        }
        Ok(Some(composed))
    }
}

/// Config for the product code (falling back to `default`) and its template.
fn lookup(registry: &Registry, product_code: &str) -> Result<(Config, Template), ConnectorError> {
    let config = registry
        .config(product_code)
        .or_else(|| registry.config(defaults::PRODUCT_CODE))
        .ok_or_else(|| ConnectorError::not_found("Data product config not found."))?;
    let name = config
        .template
        .as_deref()
        .ok_or_else(|| ConnectorError::not_found("Data product config template not defined."))?;
    let template = registry
        .template(name)
        .ok_or_else(|| ConnectorError::not_found("Data product config template not found."))?;
    Ok((config.clone(), template.clone()))
}
