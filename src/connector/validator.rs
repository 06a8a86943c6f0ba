use itertools::Itertools;
use serde_json::Value;

use crate::constants::request;
use crate::error::ConnectorError;
use crate::helpers::json_path;
use crate::registry::Template;

/// Dotted request paths with a `required` flag each.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequiredFields(Vec<(String, bool)>);

impl RequiredFields {
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = (S, bool)>,
        S: Into<String>,
    {
        RequiredFields(fields.into_iter().map(|(p, r)| (p.into(), r)).collect())
    }

    /// Every path required, duplicates removed.
    pub fn required<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            paths
                .into_iter()
                .map(Into::into)
                .unique()
                .map(|p: String| (p, true)),
        )
    }

    /// `productCode`, `timestamp` and `parameters`.
    pub fn global() -> Self {
        Self::required(request::GLOBAL_REQUIRED.iter().copied())
    }

    /// Template-declared required paths, or `parameters.ids` by default.
    pub fn for_template(template: &Template) -> Self {
        match &template.input.required {
            Some(paths) => Self::required(paths.iter().cloned()),
            None => Self::required([request::IDS]),
        }
    }

    /// Required paths whose value is missing or falsy.
    pub fn missing(&self, target: &Value) -> Vec<String> {
        self.0
            .iter()
            .filter(|(path, required)| *required && json_path::get_truthy(target, path).is_none())
            .map(|(path, _)| path.clone())
            .collect()
    }

    pub fn validate(&self, target: &Value) -> Result<(), ConnectorError> {
        let missing = self.missing(target);
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ConnectorError::Validation(missing))
        }
    }
}

/// Validates a request against the template's required fields. With the default
/// requirement a request addressing `parameters.targetObject` is accepted too.
pub fn validate_parameters(body: &Value, template: &Template) -> Result<(), ConnectorError> {
    let fields = RequiredFields::for_template(template);
    match fields.validate(body) {
        Err(err) if template.input.required.is_none() => RequiredFields::required([request::TARGET_OBJECT])
            .validate(body)
            .map_err(|_| err),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_body_misses_every_global_field() {
        let err = RequiredFields::global().validate(&json!({})).unwrap_err();
        assert_eq!(err.http_status_code(), 422);
        assert_eq!(
            err.message(),
            json!({
                "productCode": ["Missing data for required field."],
                "timestamp": ["Missing data for required field."],
                "parameters": ["Missing data for required field."]
            })
        );
    }

    #[test]
    fn present_fields_are_not_reported() {
        let fields = RequiredFields::new([("a.b", true), ("c", true), ("d", false)]);
        assert_eq!(fields.missing(&json!({"a": {"b": 1}})), vec!["c".to_string()]);
        assert_eq!(fields.missing(&json!({"a": {"b": ""}, "c": "x"})), vec!["a.b".to_string()]);
    }

    #[test]
    fn target_object_satisfies_default_requirement() {
        let template = Template::default();
        assert!(validate_parameters(&json!({"parameters": {"ids": []}}), &template).is_ok());
        assert!(validate_parameters(
            &json!({"parameters": {"targetObject": {"id": "x"}}}),
            &template
        )
        .is_ok());

        let err = validate_parameters(&json!({"parameters": {}}), &template).unwrap_err();
        assert_eq!(err.message(), json!({"parameters.ids": ["Missing data for required field."]}));
    }

    #[test]
    fn template_required_fields_replace_default() {
        let template = Template::from_value(json!({
            "input": {"required": ["parameters.deviceId", "parameters.deviceId"]}
        }))
        .unwrap();
        let err = validate_parameters(&json!({"parameters": {"ids": ["a"]}}), &template).unwrap_err();
        assert_eq!(
            err.message(),
            json!({"parameters.deviceId": ["Missing data for required field."]})
        );
    }
}
