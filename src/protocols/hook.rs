use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::{recover, ProtocolAdapter, RequestOptions};
use crate::connector::response;
use crate::error::ConnectorError;
use crate::helpers::json_path::to_text;
use crate::registry::Template;

const DEFAULT_ID_KEY: &str = "id";

/// Adapter serving the latest pushed messages.
///
/// Messages arrive through [`crate::connector::Connector::receive_hook`] and are
/// cached per product code and topic. A resource path selects every topic that
/// starts with it (anything after a `#` wildcard is ignored), or else the cached
/// message whose id field equals the path.
#[derive(Debug, Default)]
pub struct HookProtocol {
    messages: RwLock<HashMap<String, Map<String, Value>>>,
}

impl HookProtocol {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the cached message of `topic`.
    pub fn store(&self, product_code: &str, topic: &str, message: Value) {
        let mut messages = self.messages.write().unwrap_or_else(PoisonError::into_inner);
        messages
            .entry(product_code.to_owned())
            .or_default()
            .insert(topic.to_owned(), message);
    }

    pub fn messages(&self, product_code: &str) -> Map<String, Value> {
        self.messages
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(product_code)
            .cloned()
            .unwrap_or_default()
    }

    async fn collect(&self, template: &Template, paths: &[Value]) -> Result<Vec<Value>, ConnectorError> {
        let id_key = template
            .general_config
            .hardware_id
            .as_ref()
            .and_then(|rule| rule.data_object_property.clone())
            .unwrap_or_else(|| DEFAULT_ID_KEY.to_owned());
        let mut options = RequestOptions::default();
        options.extra.insert("id".into(), Value::String(id_key));
        let options = template.chain.request(template, options).await?;
        let id_key = options
            .extra
            .get("id")
            .map(to_text)
            .unwrap_or_else(|| DEFAULT_ID_KEY.to_owned());

        let product_code = template.product_code.as_deref().unwrap_or_default();
        let messages = self.messages(product_code);
        let mut items = Vec::new();

        for (index, path) in paths.iter().enumerate() {
            let path_text = to_text(path);
            let root = path_text.split('#').next().unwrap_or_default();
            let matching: Vec<_> = messages
                .iter()
                .filter(|(topic, _)| topic.starts_with(root))
                .collect();

            if matching.is_empty() {
                let found = messages
                    .values()
                    .flat_map(|m| match m {
                        Value::Array(list) => list.iter().collect::<Vec<_>>(),
                        other => vec![other],
                    })
                    .find(|m| m.get(&id_key) == Some(path));
                if let Some(message) = found {
                    items.extend(response::handle_data(template, path, index, message.clone()).await?);
                }
                continue;
            }

            for (topic, message) in matching {
                let tagged = tag(message, &id_key, topic);
                let topic = Value::String(topic.clone());
                items.extend(response::handle_data(template, &topic, index, tagged).await?);
            }
        }
        Ok(items)
    }
}

/// Puts the topic under the id key of each message, unless the message names
/// its own id.
fn tag(message: &Value, id_key: &str, topic: &str) -> Value {
    match message {
        Value::Array(list) => Value::Array(list.iter().map(|m| tag(m, id_key, topic)).collect()),
        Value::Object(fields) => {
            let mut tagged = Map::new();
            tagged.insert(id_key.to_owned(), Value::String(topic.to_owned()));
            tagged.extend(fields.iter().map(|(k, v)| (k.clone(), v.clone())));
            Value::Object(tagged)
        }
        other => {
            let mut tagged = Map::new();
            tagged.insert(id_key.to_owned(), Value::String(topic.to_owned()));
            tagged.insert("message".into(), other.clone());
            Value::Object(tagged)
        }
    }
}

#[async_trait]
impl ProtocolAdapter for HookProtocol {
    async fn get_data(&self, template: &Template, paths: &[Value]) -> Result<Vec<Value>, ConnectorError> {
        match self.collect(template, paths).await {
            Ok(items) => Ok(items),
            Err(err) => recover(template, err).await,
        }
    }
}
