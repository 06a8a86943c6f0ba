use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::Value;

use crate::helpers::json_path::to_text;
use crate::plugins::{HookResult, RequestHook};
use crate::protocols::RequestOptions;
use crate::registry::Template;

pub const NAME: &str = "basic";

/// Adds an HTTP Basic `Authorization` header built from
/// `authConfig.username` and `authConfig.password`.
pub struct BasicAuth;

#[async_trait]
impl RequestHook for BasicAuth {
    async fn request(
        &self,
        template: &Template,
        _options: &Value,
        mut request: RequestOptions,
    ) -> HookResult<RequestOptions> {
        let field = |k: &str| {
            template
                .auth_config
                .extra
                .get(k)
                .map(to_text)
                .unwrap_or_default()
        };
        let credentials = STANDARD.encode(format!("{}:{}", field("username"), field("password")));
        request.headers.insert(
            "Authorization".into(),
            Value::String(format!("Basic {credentials}")),
        );
        Ok(request)
    }
}
