use async_trait::async_trait;
use serde_json::Value;

use super::{recover, ProtocolAdapter, RequestOptions};
use crate::connector::response;
use crate::error::ConnectorError;
use crate::registry::Template;

/// Adapter for data handed in through the resource paths themselves, either by
/// placeholder substitution or by plugins. Each path entry is the raw response.
#[derive(Debug, Clone, Default)]
pub struct CustomProtocol;

impl CustomProtocol {
    async fn collect(&self, template: &Template, paths: &[Value]) -> Result<Vec<Value>, ConnectorError> {
        template.chain.request(template, RequestOptions::default()).await?;
        let mut items = Vec::new();
        for (index, path) in paths.iter().enumerate() {
            items.extend(response::handle_data(template, path, index, path.clone()).await?);
        }
        Ok(items)
    }
}

#[async_trait]
impl ProtocolAdapter for CustomProtocol {
    async fn get_data(&self, template: &Template, paths: &[Value]) -> Result<Vec<Value>, ConnectorError> {
        match self.collect(template, paths).await {
            Ok(items) => Ok(items),
            Err(err) => recover(template, err).await,
        }
    }
}
