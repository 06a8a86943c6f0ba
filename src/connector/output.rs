use async_trait::async_trait;
use itertools::Itertools;
use serde::Serialize;
use serde_json::{Map, Value};

use super::dispatch::dispatch;
use crate::error::ConnectorError;
use crate::protocols::Protocols;
use crate::registry::Template;

/// Finished output envelope and the key of its payload object.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Composed {
    pub output: Value,
    pub payload_key: String,
}

/// Schema harmonization applied when the template names a schema.
#[async_trait]
pub trait Harmonizer: Send + Sync {
    async fn handle_output(&self, template: &Template, output: Value) -> Result<Value, ConnectorError>;
}

/// Resource paths of `authConfig.path` as a deduplicated list.
pub fn resource_paths(template: &Template) -> Result<Vec<Value>, ConnectorError> {
    let paths = match &template.auth_config.path {
        None => return Err(ConnectorError::InsufficientResource),
        Some(Value::Array(paths)) => paths.clone(),
        Some(path) => vec![path.clone()],
    };
    Ok(paths.into_iter().unique_by(|p| p.to_string()).collect())
}

/// Builds the output envelope, dispatching to the protocol adapters unless
/// `input` items are given.
pub async fn compose(
    protocols: &Protocols,
    harmonizer: Option<&dyn Harmonizer>,
    mut template: Template,
    input: Option<Vec<Value>>,
) -> Result<Composed, ConnectorError> {
    template.output = template.output.with_defaults();
    let names = template.output.names();

    let items = match input {
        Some(items) => items,
        None => {
            let paths = resource_paths(&template)?;
            dispatch(protocols, &template, &paths).await?
        }
    };
    let items: Vec<Value> = items
        .into_iter()
        .flat_map(|item| match item {
            Value::Array(nested) => nested,
            other => vec![other],
        })
        .collect();

    let mut payload = Map::new();
    payload.insert(names.array.clone(), Value::Array(items));
    let mut output = Map::new();
    output.insert(names.context.clone(), Value::String(names.context_value.clone()));
    output.insert(names.object.clone(), Value::Object(payload));

    let mut output = template.chain.output(&template, Value::Object(output)).await?;
    if let (Some(harmonizer), Some(_)) = (harmonizer, &template.schema) {
        output = harmonizer.handle_output(&template, output).await?;
    }

    Ok(Composed {
        output,
        payload_key: names.object,
    })
}
