//! Normalizes raw adapter responses into measurement items.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::error::ConnectorError;
use crate::helpers::{json_path, parse_ts_or_now, to_iso};
use crate::registry::{ExtractionRule, OneOrMany, OutputNames, Template};

#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    pub type_: String,
    pub timestamp: DateTime<Utc>,
    pub value: Value,
}

/// Measurements of one hardware id.
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub id: Value,
    pub measurements: Vec<Measurement>,
}

impl Item {
    pub fn to_value(&self, names: &OutputNames) -> Value {
        let measurements = self
            .measurements
            .iter()
            .map(|m| {
                let mut obj = Map::new();
                obj.insert(names.type_.clone(), Value::String(m.type_.clone()));
                obj.insert(names.timestamp.clone(), Value::String(to_iso(&m.timestamp)));
                obj.insert(names.value.clone(), m.value.clone());
                Value::Object(obj)
            })
            .collect();
        let mut obj = Map::new();
        obj.insert(names.id.clone(), self.id.clone());
        obj.insert(names.data.clone(), Value::Array(measurements));
        Value::Object(obj)
    }
}

/// Pairs a key row with one or more value rows.
///
/// `[["a", "b"], [1, 2]]` gives `[{"a": 1, "b": 2}]`; when the second entry is a
/// list of rows, one object is produced per row.
pub fn map_arrays(arrays: &[Value]) -> Vec<Value> {
    let (Some(Value::Array(keys)), Some(Value::Array(values))) = (arrays.first(), arrays.get(1))
    else {
        return Vec::new();
    };
    let zip = |row: &Vec<Value>| {
        Value::Object(
            keys.iter()
                .zip(row.iter())
                .map(|(k, v)| (json_path::to_text(k), v.clone()))
                .collect(),
        )
    };
    if values.first().is_some_and(Value::is_array) {
        values.iter().filter_map(Value::as_array).map(zip).collect()
    } else {
        vec![zip(values)]
    }
}

fn extract(rule: Option<&ExtractionRule>, path: &str, object: &Value) -> Option<Value> {
    let rule = rule?;
    if let Some(property) = &rule.data_object_property {
        return json_path::get(object, property).cloned();
    }
    match rule.path_index {
        Some(i) if i > 0 => path.split('/').nth(i).map(|s| Value::String(s.to_owned())),
        _ => None,
    }
}

fn data_objects(data: &Value, paths: &[OneOrMany<String>]) -> Vec<Value> {
    let paths = if paths.is_empty() {
        vec![OneOrMany::One(String::new())]
    } else {
        paths.to_vec()
    };
    let mut objects = Vec::new();
    for path in &paths {
        let found = match path {
            OneOrMany::One(p) if p.is_empty() => data.clone(),
            OneOrMany::One(p) => json_path::get(data, p).cloned().unwrap_or(Value::Null),
            OneOrMany::Many(ps) => Value::Array(map_arrays(
                &ps.iter()
                    .map(|p| json_path::get(data, p).cloned().unwrap_or(Value::Null))
                    .collect::<Vec<_>>(),
            )),
        };
        match found {
            Value::Array(items) => objects.extend(items),
            other => objects.push(other),
        }
    }
    objects
}

/// Merges items sharing an id, keeping first-seen order. Later measurements are
/// placed before earlier ones, then each list is stably sorted by timestamp.
pub fn merge_items(items: Vec<Item>) -> Vec<Item> {
    let mut merged: Vec<Item> = Vec::new();
    for item in items {
        let key = json_path::to_text(&item.id);
        match merged.iter_mut().find(|m| json_path::to_text(&m.id) == key) {
            Some(existing) => {
                let mut measurements = item.measurements;
                measurements.append(&mut existing.measurements);
                existing.measurements = measurements;
            }
            None => merged.push(item),
        }
    }
    for item in merged.iter_mut() {
        item.measurements.sort_by_key(|m| m.timestamp);
    }
    merged
}

/// Turns one raw response into measurement items.
///
/// Misconfigured templates (no mappings or data objects) and empty responses
/// yield no items rather than an error.
pub async fn handle_data(
    template: &Template,
    path: &Value,
    index: usize,
    data: Value,
) -> Result<Vec<Value>, ConnectorError> {
    let chain = template.chain.clone();
    let data = chain.response(template, data).await?;

    let non_empty = match &data {
        Value::Object(m) => !m.is_empty(),
        Value::Array(a) => !a.is_empty(),
        _ => false,
    };
    if !non_empty {
        return Ok(Vec::new());
    }

    let (Some(mappings), Some(paths)) = (&template.data_property_mappings, &template.data_objects)
    else {
        log::error!(
            "{}: Configuration dataPropertyMappings or dataObjects missing.",
            template.label()
        );
        return Ok(Vec::new());
    };

    let path_text = json_path::to_text(path);
    let general = &template.general_config;
    let mut items = Vec::new();

    for object in data_objects(&data, paths) {
        let hardware_id = extract(general.hardware_id.as_ref(), &path_text, &object);
        let timestamp = parse_ts_or_now(
            extract(general.timestamp.as_ref(), &path_text, &object)
                .as_ref()
                .filter(|v| json_path::is_truthy(v)),
        );

        let mut record = Map::new();
        for (key, mapping) in mappings {
            match mapping.as_str() {
                Some("") => {
                    record.insert(key.clone(), object.clone());
                }
                Some(property) => {
                    if let Some(v) = json_path::get(&object, property).filter(|v| !v.is_null()) {
                        record.insert(key.clone(), v.clone());
                    }
                }
                None => {}
            }
        }
        if record.is_empty() {
            continue;
        }

        if let Some(include) = &general.include {
            for (k, v) in include {
                record.insert(k.clone(), v.clone());
            }
        }
        let record = chain.data(template, record).await?;

        items.push(Item {
            id: hardware_id.unwrap_or(Value::Null),
            measurements: record
                .into_iter()
                .map(|(type_, value)| Measurement {
                    type_,
                    timestamp,
                    value,
                })
                .collect(),
        });
    }

    let names = template.output.names();
    let mut out = Vec::new();
    for mut item in merge_items(items) {
        item.id = chain.id(template, index, item.id).await?;
        out.push(item.to_value(&names));
    }
    Ok(out)
}
