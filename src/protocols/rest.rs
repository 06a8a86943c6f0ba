use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};
use ureq::tls::{TlsConfig, TlsProvider};
use ureq::Agent;
use url::Url;

use super::{ProtocolAdapter, RequestOptions};
use crate::connector::response;
use crate::error::ConnectorError;
use crate::helpers::{json_path::to_text, to_iso};
use crate::registry::Template;

/// Statuses returned to the caller without consulting `onerror` hooks.
const CONNECTION_ERRORS: [u16; 5] = [500, 502, 503, 504, 522];

/// HTTP adapter. Each resource path becomes one request against
/// `authConfig.url`, unless the path is an absolute URL itself.
#[derive(Clone)]
pub struct RestProtocol {
    agent: Agent,
}

impl RestProtocol {
    pub fn new(timeout: Duration) -> Self {
        let config = Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .tls_config(TlsConfig::builder().provider(TlsProvider::NativeTls).build())
            .build();
        RestProtocol {
            agent: Agent::new_with_config(config),
        }
    }

    async fn attempt(
        &self,
        template: &Template,
        options: &RequestOptions,
        path: &Value,
        index: usize,
    ) -> Result<Vec<Value>, ConnectorError> {
        let body = self.fetch(options).await?;
        response::handle_data(template, path, index, body).await
    }

    async fn fetch(&self, options: &RequestOptions) -> Result<Value, ConnectorError> {
        let url = compose_url(options)?;
        let agent = self.agent.clone();
        let request = options.clone();
        let outcome = tokio::task::spawn_blocking(move || execute(&agent, &request, url.as_str()))
            .await
            .map_err(|e| ConnectorError::Internal(e.to_string()))?;

        match outcome {
            Ok((status, body)) if (200..300).contains(&status) => Ok(parse_body(body)),
            Ok((status, body)) => {
                let translator_response = serde_json::from_str::<Value>(&body).ok();
                Err(ConnectorError::Status {
                    status,
                    message: if body.is_empty() {
                        format!("Request failed with status code {status}.")
                    } else {
                        body
                    },
                    translator_response,
                })
            }
            Err(ureq::Error::Timeout(_)) => Err(ConnectorError::timed_out()),
            Err(e) => Err(ConnectorError::Transport(e.to_string())),
        }
    }

    async fn request_data(
        &self,
        template: &Template,
        path: &Value,
        index: usize,
    ) -> Result<Vec<Value>, ConnectorError> {
        let path_text = to_text(path);
        if template.auth_config.url.is_none() && path_text.is_empty() {
            return Err(ConnectorError::status(500, "No url or path found in authConfig."));
        }
        let options = template
            .chain
            .request(template, request_options(template, &path_text))
            .await?;

        let err = match self.attempt(template, &options, path, index).await {
            Ok(items) => return Ok(items),
            Err(err) if err.http_status_code() == 404 => return Ok(Vec::new()),
            Err(err) => err,
        };

        handle_error(template, err).await?;

        match self.attempt(template, &options, path, index).await {
            Err(err) if matches!(err.http_status_code(), 400 | 404) => Ok(Vec::new()),
            other => other,
        }
    }
}

#[async_trait]
impl ProtocolAdapter for RestProtocol {
    async fn get_data(&self, template: &Template, paths: &[Value]) -> Result<Vec<Value>, ConnectorError> {
        let mut items = Vec::new();
        for (index, path) in paths.iter().enumerate() {
            items.extend(self.request_data(template, path, index).await?);
        }
        Ok(items)
    }

    /// Posts every path entry as a request body to `authConfig.url`.
    async fn push_data(&self, template: &Template, paths: &[Value]) -> Result<Vec<Value>, ConnectorError> {
        let mut results = Vec::new();
        for path in paths {
            let mut options = request_options(template, "");
            options.method = "POST".into();
            options.body = Some(path.clone());
            let options = template.chain.request(template, options).await?;
            results.push(self.fetch(&options).await?);
        }
        Ok(results)
    }
}

/// Initial request options, before `request` hooks run.
pub fn request_options(template: &Template, path: &str) -> RequestOptions {
    let auth = &template.auth_config;
    let url = if path.contains("://") {
        path.to_owned()
    } else {
        format!("{}{}", auth.url.as_deref().unwrap_or_default(), path)
    };

    let mut query = Vec::new();
    if let Some(q) = &template.general_config.query {
        let bounds = [
            (&q.start, template.parameters.start),
            (&q.end, template.parameters.end),
        ];
        for (name, ts) in bounds {
            if let (Some(name), Some(ts)) = (name, ts) {
                let mut entry = Map::new();
                entry.insert(name.clone(), Value::String(to_iso(&ts)));
                query.push(Value::Object(entry));
            }
        }
        query.extend(q.properties.iter().cloned());
    }

    RequestOptions {
        method: auth.method.clone().unwrap_or_else(|| "GET".into()),
        url,
        headers: auth
            .headers
            .as_ref()
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default(),
        body: auth.body.clone(),
        query,
        extra: Map::new(),
    }
}

fn compose_url(options: &RequestOptions) -> Result<Url, ConnectorError> {
    let mut url = Url::parse(&options.url)
        .map_err(|e| ConnectorError::Internal(format!("Invalid url {}: {e}", options.url)))?;
    let pairs: Vec<(String, String)> = options
        .query
        .iter()
        .filter_map(Value::as_object)
        .flat_map(|entry| entry.iter().map(|(k, v)| (k.clone(), to_text(v))))
        .collect();
    if !pairs.is_empty() {
        url.query_pairs_mut().extend_pairs(pairs);
    }
    Ok(url)
}

fn execute(agent: &Agent, options: &RequestOptions, url: &str) -> Result<(u16, String), ureq::Error> {
    let method = options.method.to_uppercase();
    let headers = options.headers.iter().map(|(k, v)| (k.as_str(), to_text(v)));

    let mut response = match method.as_str() {
        "GET" | "DELETE" | "HEAD" => {
            let mut request = match method.as_str() {
                "DELETE" => agent.delete(url),
                "HEAD" => agent.head(url),
                _ => agent.get(url),
            };
            for (k, v) in headers {
                request = request.header(k, v);
            }
            request.call()?
        }
        _ => {
            let mut request = match method.as_str() {
                "PUT" => agent.put(url),
                "PATCH" => agent.patch(url),
                _ => agent.post(url),
            };
            for (k, v) in headers {
                request = request.header(k, v);
            }
            match &options.body {
                Some(Value::String(s)) => request.send(s.as_bytes())?,
                Some(body) => request.send_json(body)?,
                None => request.send_empty()?,
            }
        }
    };

    let status = response.status().as_u16();
    let body = response.body_mut().read_to_string()?;
    Ok((status, body))
}

fn parse_body(body: String) -> Value {
    serde_json::from_str(&body).unwrap_or(Value::String(body))
}

/// Connection errors are returned as is. Anything else goes through the
/// `onerror` hooks; `Ok` means a hook recovered and the request may be retried.
async fn handle_error(template: &Template, err: ConnectorError) -> Result<(), ConnectorError> {
    let status = err.http_status_code();
    log::info!("{}: Response with status code {}", template.label(), status);

    if matches!(&err, ConnectorError::Status { status, .. } if CONNECTION_ERRORS.contains(status)) {
        return Err(err);
    }
    if template.chain.on_error(template, &err).await.is_some() {
        return Ok(());
    }
    Err(ConnectorError::Status {
        status,
        message: "Internal Server Error.".into(),
        translator_response: err.translator_response().cloned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::{ErrorHook, Plugin, PluginRegistry};
    use crate::registry::{Config, PluginDecl};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Recover(Arc<AtomicUsize>);

    #[async_trait]
    impl ErrorHook for Recover {
        async fn on_error(&self, _: &Template, _: &Value, _: &ConnectorError) -> Option<Value> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Some(Value::Null)
        }
    }

    fn template(url: &str) -> Template {
        Template::from_value(json!({
            "protocol": "rest",
            "authConfig": {"url": url},
            "generalConfig": {"hardwareId": {"dataObjectProperty": "id"}},
            "dataObjects": [""],
            "dataPropertyMappings": {"level": "level"}
        }))
        .unwrap()
    }

    fn with_recovery(mut template: Template) -> (Template, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let registry = PluginRegistry::new()
            .with(Plugin::new("recover").with_on_error(Recover(calls.clone())));
        template.chain = registry
            .resolve(&[PluginDecl::Name("recover".into())], &Config::default())
            .unwrap();
        (template, calls)
    }

    fn protocol() -> RestProtocol {
        RestProtocol::new(Duration::from_secs(5))
    }

    #[test]
    fn options_from_template() {
        let mut template = Template::from_value(json!({
            "authConfig": {
                "url": "https://api.example.com",
                "headers": {"x-key": "k"}
            },
            "generalConfig": {"query": {
                "start": "from",
                "end": "to",
                "properties": [{"limit": 1}]
            }}
        }))
        .unwrap();
        template.parameters.start = Some("2021-03-01T00:00:00Z".parse().unwrap());
        template.parameters.end = Some("2021-03-02T00:00:00Z".parse().unwrap());

        let options = request_options(&template, "/tanks/1");
        assert_eq!(options.method, "GET");
        assert_eq!(options.url, "https://api.example.com/tanks/1");
        assert_eq!(options.headers["x-key"], "k");
        assert_eq!(
            options.query,
            vec![
                json!({"from": "2021-03-01T00:00:00.000Z"}),
                json!({"to": "2021-03-02T00:00:00.000Z"}),
                json!({"limit": 1})
            ]
        );

        let url = compose_url(&options).unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.example.com/tanks/1?from=2021-03-01T00%3A00%3A00.000Z&to=2021-03-02T00%3A00%3A00.000Z&limit=1"
        );

        let absolute = request_options(&template, "http://other.example.com/x");
        assert_eq!(absolute.url, "http://other.example.com/x");
    }

    #[tokio::test]
    async fn missing_path_is_no_data() {
        let mut server = mockito::Server::new_async().await;
        let a = server
            .mock("GET", "/a")
            .with_body(r#"{"id": "a", "level": 1}"#)
            .create_async()
            .await;
        let b = server.mock("GET", "/b").with_status(404).create_async().await;
        let c = server
            .mock("GET", "/c")
            .with_body(r#"{"id": "c", "level": 3}"#)
            .create_async()
            .await;

        let items = protocol()
            .get_data(&template(&server.url()), &[json!("/a"), json!("/b"), json!("/c")])
            .await
            .unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0]["id"], "a");
        assert_eq!(items[1]["id"], "c");
        assert_eq!(items[1]["measurements"][0]["value"], 3);
        a.assert_async().await;
        b.assert_async().await;
        c.assert_async().await;
    }

    #[tokio::test]
    async fn unrecovered_error_is_reported() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/a")
            .with_status(401)
            .with_body(r#"{"reason": "denied"}"#)
            .create_async()
            .await;

        let err = protocol()
            .get_data(&template(&server.url()), &[json!("/a")])
            .await
            .unwrap_err();
        assert_eq!(err.http_status_code(), 401);
        assert_eq!(err.to_string(), "Internal Server Error.");
        assert_eq!(err.translator_response(), Some(&json!({"reason": "denied"})));
    }

    #[tokio::test]
    async fn connection_errors_skip_onerror() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/a")
            .with_status(503)
            .expect(1)
            .create_async()
            .await;
        let (template, calls) = with_recovery(template(&server.url()));

        let err = protocol().get_data(&template, &[json!("/a")]).await.unwrap_err();
        assert_eq!(err.http_status_code(), 503);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn recovered_error_is_retried_once() {
        let mut server = mockito::Server::new_async().await;
        let bad_request = server
            .mock("GET", "/a")
            .with_status(400)
            .expect(2)
            .create_async()
            .await;
        let unauthorized = server
            .mock("GET", "/b")
            .with_status(401)
            .expect(2)
            .create_async()
            .await;
        let (template, calls) = with_recovery(template(&server.url()));

        let items = protocol().get_data(&template, &[json!("/a")]).await.unwrap();
        assert!(items.is_empty());
        bad_request.assert_async().await;

        let err = protocol().get_data(&template, &[json!("/b")]).await.unwrap_err();
        assert_eq!(err.http_status_code(), 401);
        unauthorized.assert_async().await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn push_posts_each_entry() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .match_body(mockito::Matcher::PartialJson(json!({"level": 1})))
            .with_body(r#"{"ok": true}"#)
            .expect(1)
            .create_async()
            .await;

        let template = template(&format!("{}/", server.url()));
        let results = protocol()
            .push_data(&template, &[json!({"level": 1})])
            .await
            .unwrap();
        assert_eq!(results, vec![json!({"ok": true})]);
        mock.assert_async().await;
    }
}
