//! Protocol adapters fetching raw data for resolved templates.

pub mod custom;
pub mod hook;
pub mod rest;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ConnectorError;
use crate::registry::Template;

pub use custom::CustomProtocol;
pub use hook::HookProtocol;
pub use rest::RestProtocol;

/// Outgoing request as seen by `request` hooks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestOptions {
    pub method: String,
    pub url: String,
    #[serde(default)]
    pub headers: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    /// Query entries, each an object of `name -> value`.
    #[serde(default)]
    pub query: Vec<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[async_trait]
pub trait ProtocolAdapter: Send + Sync {
    /// Fetches and normalizes data for every resource path.
    async fn get_data(&self, template: &Template, paths: &[Value]) -> Result<Vec<Value>, ConnectorError>;

    async fn push_data(&self, template: &Template, _paths: &[Value]) -> Result<Vec<Value>, ConnectorError> {
        Err(ConnectorError::status(
            501,
            format!("{}: write is not supported.", template.label()),
        ))
    }
}

pub type Protocols = HashMap<String, Arc<dyn ProtocolAdapter>>;

/// Routes an adapter failure through the template's `onerror` hooks. A
/// recovered value stands in for the adapter's items.
pub(crate) async fn recover(template: &Template, err: ConnectorError) -> Result<Vec<Value>, ConnectorError> {
    log::error!("{}: {}", template.label(), err);
    match template.chain.on_error(template, &err).await {
        Some(Value::Array(items)) => Ok(items),
        Some(Value::Null) => Ok(Vec::new()),
        Some(value) => Ok(vec![value]),
        None => Err(err),
    }
}
