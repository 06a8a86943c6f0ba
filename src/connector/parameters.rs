use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::constants::request;
use crate::helpers::json_path;
use crate::registry::Template;

/// Keys owned by [`Parameters`] that caller-supplied extras never overwrite.
const CANONICAL: &[&str] = &[
    "ids",
    "start",
    "end",
    "dataTypes",
    "defaultStart",
    "startTime",
    "endTime",
];

/// Request parameters after extraction.
///
/// `ids` and `data_types` are always deduplicated lists. Extra caller fields
/// (for example `period` or `targetObject`) live in `extra` and serialize at the
/// top level next to the canonical keys.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Parameters {
    #[serde(default)]
    pub ids: Vec<Value>,
    #[serde(default, with = "iso_ts", skip_serializing_if = "Option::is_none")]
    pub start: Option<DateTime<Utc>>,
    #[serde(default, with = "iso_ts", skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub data_types: Vec<Value>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub default_start: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

mod iso_ts {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};
    use serde_json::Value;

    use crate::helpers::{parse_ts, to_iso};

    pub fn serialize<S: Serializer>(ts: &Option<DateTime<Utc>>, s: S) -> Result<S::Ok, S::Error> {
        match ts {
            Some(ts) => s.serialize_str(&to_iso(ts)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<DateTime<Utc>>, D::Error> {
        Ok(Option::<Value>::deserialize(d)?.as_ref().and_then(parse_ts))
    }
}

/// Falsy becomes `[]`, a scalar becomes `[x]`, duplicates are removed.
fn to_unique_list(value: Option<&Value>) -> Vec<Value> {
    let list = match value {
        Some(v) if !json_path::is_truthy(v) => Vec::new(),
        Some(Value::Array(a)) => a.clone(),
        Some(v) => vec![v.clone()],
        None => Vec::new(),
    };
    list.into_iter().unique_by(|v| v.to_string()).collect()
}

impl Parameters {
    /// Picks the supported parameters from a request body, honoring the
    /// template's path overrides. `end` defaults to the request timestamp.
    pub fn extract(body: &Value, template: &Template, timestamp: DateTime<Utc>) -> Self {
        let input = &template.input;
        let ids_path = input.ids.as_deref().unwrap_or(request::IDS);
        let start_path = input.start.as_deref().unwrap_or(request::START);
        let end_path = input.end.as_deref().unwrap_or(request::END);
        let types_path = input.data_types.as_deref().unwrap_or(request::DATA_TYPES);

        let extra = json_path::get(body, request::PARAMETERS)
            .and_then(Value::as_object)
            .map(|params| {
                params
                    .iter()
                    .filter(|(k, _)| !CANONICAL.contains(&k.as_str()))
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default();

        Parameters {
            ids: to_unique_list(json_path::get(body, ids_path)),
            start: json_path::get(body, start_path).and_then(crate::helpers::parse_ts),
            end: json_path::get(body, end_path)
                .and_then(crate::helpers::parse_ts)
                .or(Some(timestamp)),
            data_types: to_unique_list(json_path::get(body, types_path)),
            default_start: false,
            extra,
        }
    }

    /// Scalar ids become `{"id": x}` objects.
    pub fn normalize_ids(&mut self) {
        for id in self.ids.iter_mut() {
            if !id.is_object() && !id.is_array() {
                *id = json!({ "id": id.take() });
            }
        }
    }

    /// Plain id values, unwrapping `{"id": x}` objects.
    pub fn id_values(&self) -> Vec<Value> {
        self.ids
            .iter()
            .map(|id| id.get("id").cloned().unwrap_or_else(|| id.clone()))
            .collect()
    }

    /// JSON view used for placeholder lookups.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| Value::Object(Map::new()))
    }
}
