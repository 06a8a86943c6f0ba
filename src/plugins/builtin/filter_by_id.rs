use async_trait::async_trait;
use serde_json::Value;

use crate::helpers::json_path;
use crate::plugins::{HookResult, ResponseHook};
use crate::registry::{OneOrMany, Template};

pub const NAME: &str = "filter-by-id";

/// Keeps only the response objects whose hardware id was requested. Responses
/// pass through untouched when no ids were requested.
pub struct FilterById;

#[async_trait]
impl ResponseHook for FilterById {
    async fn response(
        &self,
        template: &Template,
        _options: &Value,
        mut response: Value,
    ) -> HookResult<Value> {
        let ids = template.parameters.id_values();
        if ids.is_empty() {
            return Ok(response);
        }
        let Some(id_key) = template
            .general_config
            .hardware_id
            .as_ref()
            .and_then(|rule| rule.data_object_property.as_deref())
        else {
            return Ok(response);
        };

        for path in template.data_objects.iter().flatten() {
            let OneOrMany::One(path) = path else { continue };
            let target = if path.is_empty() {
                Some(&mut response)
            } else {
                json_path::get_mut(&mut response, path)
            };
            if let Some(Value::Array(objects)) = target {
                objects.retain(|o| json_path::get(o, id_key).is_some_and(|id| ids.contains(id)));
            }
        }
        Ok(response)
    }
}
