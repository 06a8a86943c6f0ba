use serde_json::Value;

use crate::error::ConnectorError;
use crate::protocols::Protocols;
use crate::registry::{OneOrMany, Template};

/// Runs the template against each declared protocol and concatenates the items.
///
/// Every protocol name is checked before any adapter is called. Each adapter
/// receives a copy of the template naming only its own protocol.
pub async fn dispatch(
    protocols: &Protocols,
    template: &Template,
    paths: &[Value],
) -> Result<Vec<Value>, ConnectorError> {
    if template.protocol.is_none() {
        return Err(ConnectorError::ProtocolNotDefined);
    }
    let names = template.protocols();
    let adapters = names
        .iter()
        .map(|name| {
            protocols
                .get(name)
                .map(|adapter| (name, adapter))
                .ok_or_else(|| ConnectorError::UnsupportedProtocol(name.clone()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let write = template.input.is_write();
    let mut items = Vec::new();
    for (name, adapter) in adapters {
        let mut single = template.clone();
        single.protocol = Some(OneOrMany::One(name.clone()));
        log::debug!(
            "{}: {} {} path(s) via {}",
            template.label(),
            if write { "writing" } else { "reading" },
            paths.len(),
            name
        );
        let result = if write {
            adapter.push_data(&single, paths).await?
        } else {
            adapter.get_data(&single, paths).await?
        };
        items.extend(result);
    }
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocols::ProtocolAdapter;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Arc;

    /// Echoes the protocol name and the path count.
    struct Echo;

    #[async_trait]
    impl ProtocolAdapter for Echo {
        async fn get_data(&self, template: &Template, paths: &[Value]) -> Result<Vec<Value>, ConnectorError> {
            Ok(vec![json!({"read": template.protocols(), "paths": paths.len()})])
        }

        async fn push_data(&self, template: &Template, _: &[Value]) -> Result<Vec<Value>, ConnectorError> {
            Ok(vec![json!({"write": template.protocols()})])
        }
    }

    fn protocols() -> Protocols {
        let mut protocols = Protocols::new();
        protocols.insert("a".into(), Arc::new(Echo) as Arc<dyn ProtocolAdapter>);
        protocols.insert("b".into(), Arc::new(Echo) as Arc<dyn ProtocolAdapter>);
        protocols
    }

    #[tokio::test]
    async fn fans_out_and_flattens() {
        let template = Template::from_value(json!({"protocol": ["a", "b"]})).unwrap();
        let items = dispatch(&protocols(), &template, &[json!("/x"), json!("/y")])
            .await
            .unwrap();
        assert_eq!(
            items,
            vec![
                json!({"read": ["a"], "paths": 2}),
                json!({"read": ["b"], "paths": 2})
            ]
        );
    }

    #[tokio::test]
    async fn write_input_pushes() {
        let template =
            Template::from_value(json!({"protocol": "a", "input": {"type": "write"}})).unwrap();
        let items = dispatch(&protocols(), &template, &[json!({})]).await.unwrap();
        assert_eq!(items, vec![json!({"write": ["a"]})]);
    }

    #[tokio::test]
    async fn protocol_errors() {
        let err = dispatch(&protocols(), &Template::default(), &[]).await.unwrap_err();
        assert_eq!(err.to_string(), "Connection protocol not defined.");
        assert_eq!(err.http_status_code(), 500);

        let template = Template::from_value(json!({"protocol": ["a", "ftp"]})).unwrap();
        let err = dispatch(&protocols(), &template, &[]).await.unwrap_err();
        assert_eq!(err.to_string(), "Connection protocol ftp is not supported.");
    }
}
