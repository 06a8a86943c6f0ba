use async_trait::async_trait;
use serde_json::Value;

use crate::helpers::parse_ts;
use crate::plugins::{HookResult, RequestHook};
use crate::protocols::RequestOptions;
use crate::registry::Template;

pub const NAME: &str = "millis";

/// Rewrites the start and end query values as epoch milliseconds, or as epoch
/// seconds with the option `"format": "seconds"`.
pub struct Millis;

fn convert(query: &mut [Value], key: &str, seconds: bool) {
    for entry in query.iter_mut() {
        let Some(value) = entry.get_mut(key) else {
            continue;
        };
        let Some(ts) = parse_ts(value) else {
            continue;
        };
        let millis = ts.timestamp_millis();
        *value = if seconds {
            Value::String((millis / 1000).to_string())
        } else {
            Value::from(millis)
        };
    }
}

#[async_trait]
impl RequestHook for Millis {
    async fn request(
        &self,
        template: &Template,
        options: &Value,
        mut request: RequestOptions,
    ) -> HookResult<RequestOptions> {
        let seconds = options.get("format").and_then(Value::as_str) == Some("seconds");
        if let Some(query) = &template.general_config.query {
            for key in [&query.start, &query.end].into_iter().flatten() {
                convert(&mut request.query, key, seconds);
            }
        }
        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request() -> RequestOptions {
        RequestOptions {
            query: vec![
                json!({"from": "2021-03-01T10:00:00.000Z"}),
                json!({"to": "2021-03-01T11:00:00.000Z"}),
                json!({"limit": 1}),
            ],
            ..Default::default()
        }
    }

    fn template() -> Template {
        Template::from_value(json!({
            "generalConfig": {"query": {"start": "from", "end": "to"}}
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn converts_to_millis() {
        let out = Millis.request(&template(), &json!({}), request()).await.unwrap();
        assert_eq!(
            out.query,
            vec![
                json!({"from": 1614592800000_i64}),
                json!({"to": 1614596400000_i64}),
                json!({"limit": 1})
            ]
        );
    }

    #[tokio::test]
    async fn converts_to_seconds() {
        let out = Millis
            .request(&template(), &json!({"format": "seconds"}), request())
            .await
            .unwrap();
        assert_eq!(out.query[0], json!({"from": "1614592800"}));
    }
}
