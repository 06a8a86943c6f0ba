use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::OneOrMany;
use crate::connector::Parameters;
use crate::constants::response;
use crate::plugins::PluginChain;

/// Temporal classification of a request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Latest,
    History,
    Prediction,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Latest => write!(f, "latest"),
            Mode::History => write!(f, "history"),
            Mode::Prediction => write!(f, "prediction"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthConfig {
    /// Resource path(s); a list after placeholder expansion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_code: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryConfig {
    /// Query parameter name carrying the range start.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
    /// Query entry added for `latest` requests, e.g. `{"limit": 1}`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<Value>,
    /// Extra query entries, each an object of `name -> value`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub properties: Vec<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Where to find a value for a response object: a property path inside the
/// object, or a segment index of the resource path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_object_property: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_index: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneralConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<QueryConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hardware_id: Option<ExtractionRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<ExtractionRule>,
    /// Constant fields appended to every record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include: Option<Map<String, Value>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Key-name overrides for the output envelope and measurement items.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputKeys {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub array: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

/// Output key names with defaults applied.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputNames {
    pub context_value: String,
    pub context: String,
    pub object: String,
    pub array: String,
    pub value: String,
    pub type_: String,
    pub data: String,
    pub id: String,
    pub timestamp: String,
}

fn non_empty(v: &Option<String>, default: &str) -> String {
    v.as_deref()
        .filter(|s| !s.is_empty())
        .unwrap_or(default)
        .to_owned()
}

impl OutputKeys {
    pub fn names(&self) -> OutputNames {
        OutputNames {
            context_value: non_empty(&self.context_value, response::CONTEXT_VALUE),
            context: non_empty(&self.context, response::CONTEXT),
            object: non_empty(&self.object, response::OBJECT),
            array: non_empty(&self.array, response::ARRAY),
            value: non_empty(&self.value, response::VALUE),
            type_: non_empty(&self.type_, response::TYPE),
            data: non_empty(&self.data, response::DATA),
            id: non_empty(&self.id, response::ID),
            timestamp: non_empty(&self.timestamp, response::TIMESTAMP),
        }
    }

    /// Every key filled in, missing ones from the defaults.
    pub fn with_defaults(&self) -> Self {
        let n = self.names();
        OutputKeys {
            context_value: Some(n.context_value),
            context: Some(n.context),
            object: Some(n.object),
            array: Some(n.array),
            value: Some(n.value),
            type_: Some(n.type_),
            data: Some(n.data),
            id: Some(n.id),
            timestamp: Some(n.timestamp),
        }
    }
}

/// Request parameter path overrides and required fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ids: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_types: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<Vec<String>>,
    /// `write` routes the request to the adapter's push operation.
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl InputSpec {
    pub fn is_write(&self) -> bool {
        self.type_.as_deref() == Some("write")
    }
}

/// Plugin reference in a template: a bare name or an inline object with `name`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PluginDecl {
    Name(String),
    Inline(Map<String, Value>),
}

impl PluginDecl {
    pub fn name(&self) -> Option<&str> {
        match self {
            PluginDecl::Name(n) => Some(n),
            PluginDecl::Inline(m) => m.get("name").and_then(Value::as_str),
        }
    }

    /// Inline fields other than `name`.
    pub fn inline_options(&self) -> Option<Value> {
        match self {
            PluginDecl::Name(_) => None,
            PluginDecl::Inline(m) => Some(Value::Object(
                m.iter()
                    .filter(|(k, _)| k.as_str() != "name")
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
            )),
        }
    }
}

/// Connection template shared by one or more configs.
///
/// The serialized fields form the document that placeholders are substituted
/// into. `mode`, `parameters`, `timestamp` and `chain` are per-request state set
/// while the request moves through the pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<OneOrMany<String>>,
    #[serde(default)]
    pub auth_config: AuthConfig,
    #[serde(default)]
    pub general_config: GeneralConfig,
    #[serde(default)]
    pub output: OutputKeys,
    #[serde(default)]
    pub input: InputSpec,
    /// Paths into the raw response; a nested list zips parallel arrays.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_objects: Option<Vec<OneOrMany<String>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_property_mappings: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub plugins: Vec<PluginDecl>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_code: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,

    #[serde(skip)]
    pub mode: Mode,
    #[serde(skip)]
    pub parameters: Parameters,
    #[serde(skip)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub chain: PluginChain,
}

impl Template {
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    pub fn protocols(&self) -> Vec<String> {
        self.protocol.as_ref().map(OneOrMany::to_vec).unwrap_or_default()
    }

    /// Name used to label log lines for this template.
    pub fn label(&self) -> &str {
        self.auth_config
            .template
            .as_deref()
            .or(self.product_code.as_deref())
            .unwrap_or("template")
    }
}

impl FromStr for Template {
    type Err = serde_json::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_str(s)
    }
}
