use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::OneOrMany;

/// Data product config: binds a template to static values, dynamic parameter
/// mappings and per-plugin options.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    #[serde(default, rename = "static", skip_serializing_if = "Map::is_empty")]
    pub static_params: Map<String, Value>,
    /// Template path -> placeholder path(s).
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub dynamic: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub plugins: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_code: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Config {
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    /// Dynamic mappings as `(template path, placeholders)` in declaration order.
    /// Entries that are neither a string nor a list of strings are ignored.
    pub fn dynamic_mappings(&self) -> Vec<(String, Vec<String>)> {
        self.dynamic
            .iter()
            .filter_map(|(path, v)| {
                serde_json::from_value::<OneOrMany<String>>(v.clone())
                    .ok()
                    .map(|p| (path.clone(), p.to_vec()))
            })
            .collect()
    }

    /// Options for a plugin, `{}` when the config does not mention it.
    pub fn plugin_options(&self, name: &str) -> Option<&Value> {
        self.plugins.get(name)
    }
}

impl FromStr for Config {
    type Err = serde_json::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_static_and_dynamic() {
        let config: Config = r#"{
            "template": "sensors",
            "static": {"url": "https://example.com", "apiKey": "k"},
            "dynamic": {"authConfig.path": "ids", "body.items": ["ids", "dataTypes"], "bad": 1},
            "plugins": {"millis": {"format": "seconds"}},
            "description": "kept"
        }"#
        .parse()
        .unwrap();

        assert_eq!(config.template.as_deref(), Some("sensors"));
        assert_eq!(config.static_params["apiKey"], "k");
        assert_eq!(
            config.dynamic_mappings(),
            vec![
                ("authConfig.path".to_string(), vec!["ids".to_string()]),
                (
                    "body.items".to_string(),
                    vec!["ids".to_string(), "dataTypes".to_string()]
                ),
            ]
        );
        assert_eq!(config.plugin_options("millis"), Some(&json!({"format": "seconds"})));
        assert_eq!(config.plugin_options("basic"), None);
        assert_eq!(config.extra["description"], "kept");
    }
}
