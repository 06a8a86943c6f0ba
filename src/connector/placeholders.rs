//! Placeholder substitution into templates.
//!
//! Template fragments are parsed into a small tree of literal and `${name}` token
//! segments and rendered against a binding scope. A string that is exactly one
//! token takes the bound value structurally when it is an object or array; in
//! every other case bound values are rendered as text.
//!
//! Dynamic mappings (`template path -> placeholder`) are applied first, in config
//! order. Static values are applied last, to every token in the whole template.

use serde_json::{Map, Value};

use crate::connector::Parameters;
use crate::helpers::{json_path, now_iso};
use crate::registry::{Config, Template};

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Lit(String),
    Token(String),
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Value(Value),
    Text(Vec<Segment>),
    Array(Vec<Node>),
    Object(Vec<(Vec<Segment>, Node)>),
}

fn parse_text(s: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut rest = s;
    while let Some(open) = rest.find("${") {
        let Some(close) = rest[open + 2..].find('}') else {
            break;
        };
        if open > 0 {
            segments.push(Segment::Lit(rest[..open].to_owned()));
        }
        segments.push(Segment::Token(rest[open + 2..open + 2 + close].to_owned()));
        rest = &rest[open + 2 + close + 1..];
    }
    if !rest.is_empty() || segments.is_empty() {
        segments.push(Segment::Lit(rest.to_owned()));
    }
    segments
}

impl Node {
    fn parse(value: &Value) -> Node {
        match value {
            Value::String(s) => Node::Text(parse_text(s)),
            Value::Array(a) => Node::Array(a.iter().map(Node::parse).collect()),
            Value::Object(m) => Node::Object(
                m.iter()
                    .map(|(k, v)| (parse_text(k), Node::parse(v)))
                    .collect(),
            ),
            other => Node::Value(other.clone()),
        }
    }

    /// The token name when the node is a string made of exactly one token.
    fn sole_token(&self) -> Option<&str> {
        match self {
            Node::Text(segs) => match segs.as_slice() {
                [Segment::Token(t)] => Some(t),
                _ => None,
            },
            _ => None,
        }
    }

    /// `None` means the value is dropped: an object member disappears, an array
    /// slot becomes `null`.
    fn render(&self, scope: &Scope) -> Option<Value> {
        match self {
            Node::Value(v) => Some(v.clone()),
            Node::Text(segs) => render_text(segs, scope),
            Node::Array(items) => Some(Value::Array(
                items
                    .iter()
                    .map(|n| n.render(scope).unwrap_or(Value::Null))
                    .collect(),
            )),
            Node::Object(members) => Some(Value::Object(
                members
                    .iter()
                    .filter_map(|(k, v)| v.render(scope).map(|v| (render_key(k, scope), v)))
                    .collect::<Map<_, _>>(),
            )),
        }
    }

    /// Renders a whole fragment, including the whole-object shortcuts of
    /// object scopes.
    fn render_root(&self, scope: &Scope) -> Option<Value> {
        if let (Some(token), Scope::Members { map, placeholder }) = (self.sole_token(), scope) {
            if !map.contains_key(token) {
                let whole = Value::Object((*map).clone());
                if token == "id" && !map.is_empty() {
                    return Some(whole);
                }
                if Some(token) == *placeholder {
                    return Some(whole);
                }
            }
        }
        self.render(scope)
    }
}

/// What a token resolves to.
enum Binding<'a> {
    Bound(&'a Value),
    /// Token stays as written.
    Unbound,
    /// Token is the one being substituted but has no value.
    Missing,
}

enum Scope<'a> {
    /// Each member of an object binds a token of the same name.
    Members {
        map: &'a Map<String, Value>,
        placeholder: Option<&'a str>,
    },
    /// One token bound to one (possibly missing) value.
    Single {
        name: &'a str,
        value: Option<&'a Value>,
    },
}

impl Scope<'_> {
    fn lookup(&self, token: &str) -> Binding<'_> {
        match self {
            Scope::Members { map, .. } => map.get(token).map_or(Binding::Unbound, Binding::Bound),
            Scope::Single { name, value } if *name == token => {
                (*value).map_or(Binding::Missing, Binding::Bound)
            }
            Scope::Single { .. } => Binding::Unbound,
        }
    }
}

fn is_structured(v: &Value) -> bool {
    v.is_object() || v.is_array()
}

fn render_text(segs: &[Segment], scope: &Scope) -> Option<Value> {
    if let [Segment::Token(t)] = segs {
        return match scope.lookup(t) {
            Binding::Bound(v) if is_structured(v) => Some(v.clone()),
            Binding::Bound(v) => Some(Value::String(json_path::to_text(v))),
            Binding::Missing => None,
            Binding::Unbound => Some(Value::String(format!("${{{t}}}"))),
        };
    }
    Some(Value::String(render_key(segs, scope)))
}

/// Text rendering: structured or missing values leave their token in place.
fn render_key(segs: &[Segment], scope: &Scope) -> String {
    segs.iter()
        .map(|s| match s {
            Segment::Lit(l) => l.clone(),
            Segment::Token(t) => match scope.lookup(t) {
                Binding::Bound(v) if !is_structured(v) => json_path::to_text(v),
                _ => format!("${{{t}}}"),
            },
        })
        .collect()
}

/// Substitutes one value into a template fragment.
fn replace(fragment: &Value, placeholder: &str, value: Option<&Value>) -> Option<Value> {
    let node = Node::parse(fragment);
    match value {
        Some(Value::Object(map)) => node.render_root(&Scope::Members {
            map,
            placeholder: Some(placeholder),
        }),
        value => node.render(&Scope::Single {
            name: placeholder,
            value,
        }),
    }
}

/// Zips the array-valued members of an object into one row per index. Shorter
/// arrays repeat their first element.
fn zip_rows(element: &Value) -> Vec<Value> {
    let Some(map) = element.as_object() else {
        return vec![element.clone()];
    };
    let rows = map
        .values()
        .filter_map(Value::as_array)
        .map(Vec::len)
        .max();
    let Some(rows) = rows else {
        return vec![element.clone()];
    };
    (0..rows.max(1))
        .map(|i| {
            Value::Object(
                map.iter()
                    .map(|(k, v)| {
                        let v = match v {
                            Value::Array(a) => a
                                .get(i)
                                .or_else(|| a.first())
                                .cloned()
                                .unwrap_or(Value::Null),
                            other => other.clone(),
                        };
                        (k.clone(), v)
                    })
                    .collect(),
            )
        })
        .collect()
}

fn write(doc: &mut Value, path: &str, value: Option<Value>) {
    match value {
        Some(v) => json_path::set(doc, path, v),
        None => {
            json_path::unset(doc, path);
        }
    }
}

/// Applies one `path -> placeholder` mapping to the template document.
fn apply_dynamic(doc: &mut Value, path: &str, placeholder: &str, params: &Value, config: &Config) {
    let Some(fragment) = json_path::get_truthy(doc, path).cloned() else {
        return;
    };

    // Broadcast over an array root: `ids.id` renders once per element of `ids`.
    let segs = json_path::segments(placeholder);
    if let [root, remainder @ ..] = segs.as_slice() {
        let indexed = remainder
            .first()
            .is_some_and(|s| s.parse::<usize>().is_ok());
        if let (Some(Value::Array(elements)), false, false) =
            (params.get(root), remainder.is_empty(), indexed)
        {
            let remainder = remainder.join(".");
            let rendered = elements
                .iter()
                .map(|e| {
                    replace(&fragment, placeholder, json_path::get(e, &remainder))
                        .unwrap_or(Value::Null)
                })
                .collect();
            json_path::set(doc, path, Value::Array(rendered));
            return;
        }
    }

    match json_path::get(params, placeholder) {
        Some(Value::Array(elements)) => {
            let rendered = elements
                .iter()
                .flat_map(zip_rows)
                .map(|row| replace(&fragment, placeholder, Some(&row)).unwrap_or(Value::Null))
                .collect();
            json_path::set(doc, path, Value::Array(rendered));
        }
        value => {
            let now;
            let value = match value {
                None if placeholder == "timestamp" => {
                    now = Value::String(now_iso());
                    Some(&now)
                }
                v => v,
            };
            let resolved = value.is_some_and(json_path::is_truthy);
            if resolved || !config.static_params.contains_key(placeholder) {
                write(doc, path, replace(&fragment, placeholder, value));
            }
        }
    }
}

/// Substitutes every `config.static` value into the whole document.
fn apply_static(doc: &Value, statics: &Map<String, Value>) -> Value {
    Node::parse(doc)
        .render_root(&Scope::Members {
            map: statics,
            placeholder: None,
        })
        .unwrap_or(Value::Null)
}

fn fits(doc: &Value) -> bool {
    serde_json::from_value::<Template>(doc.clone()).is_ok()
}

/// JSON pointer escaping of one object key.
fn escape(key: &str) -> String {
    key.replace('~', "~0").replace('/', "~1")
}

/// Moves the resolved value at `pointer` into `accepted` as far as the result
/// still deserializes as a template. A rejected object is settled member by
/// member; a rejected leaf keeps its unresolved template value.
fn settle(accepted: &mut Value, resolved: &Value, pointer: &str) {
    let mut candidate = accepted.clone();
    match candidate.pointer_mut(pointer) {
        Some(slot) => *slot = resolved.clone(),
        None => return,
    }
    if fits(&candidate) {
        *accepted = candidate;
        return;
    }

    let (Some(Value::Object(old)), Value::Object(new)) = (accepted.pointer(pointer), resolved) else {
        log::warn!("Resolved value at '{pointer}' does not fit the template; left unresolved");
        return;
    };

    let dropped: Vec<String> = old.keys().filter(|k| !new.contains_key(*k)).cloned().collect();
    for key in dropped {
        let mut candidate = accepted.clone();
        if let Some(Value::Object(members)) = candidate.pointer_mut(pointer) {
            members.shift_remove(&key);
        }
        if fits(&candidate) {
            *accepted = candidate;
        }
    }

    for (key, value) in new {
        let child = format!("{pointer}/{}", escape(key));
        if accepted.pointer(&child).is_some() {
            settle(accepted, value, &child);
            continue;
        }
        let mut candidate = accepted.clone();
        if let Some(Value::Object(members)) = candidate.pointer_mut(pointer) {
            members.insert(key.clone(), value.clone());
        }
        if fits(&candidate) {
            *accepted = candidate;
        } else {
            log::warn!("Resolved value at '{child}' does not fit the template; dropped");
        }
    }
}

/// Resolves the config's dynamic and static placeholders into the template.
///
/// Scalar ids in `parameters` are normalized to `{"id": x}` objects first.
/// Resolution never fails: a substitution that gives a typed field the wrong
/// shape (for example a per-id list in `authConfig.url`) is logged and that
/// field keeps its template value.
pub fn resolve(config: &Config, template: Template, parameters: &mut Parameters) -> Template {
    parameters.normalize_ids();

    let mappings = config.dynamic_mappings();
    if mappings.is_empty() && config.static_params.is_empty() {
        return template;
    }

    let original = match serde_json::to_value(&template) {
        Ok(doc) => doc,
        Err(e) => {
            log::warn!("{}: Template not resolvable: {e}", template.label());
            return template;
        }
    };
    let params = parameters.to_value();
    let mut doc = original.clone();
    for (path, placeholders) in &mappings {
        for placeholder in placeholders {
            apply_dynamic(&mut doc, path, placeholder, &params, config);
        }
    }
    if !config.static_params.is_empty() {
        doc = apply_static(&doc, &config.static_params);
    }

    let parsed = serde_json::from_value::<Template>(doc.clone()).or_else(|e| {
        log::warn!("{}: Resolved template rejected: {e}", template.label());
        let mut accepted = original;
        settle(&mut accepted, &doc, "");
        serde_json::from_value::<Template>(accepted)
    });
    let mut resolved = match parsed {
        Ok(resolved) => resolved,
        Err(e) => {
            log::warn!("{}: Placeholders left unresolved: {e}", template.label());
            return template;
        }
    };
    resolved.mode = template.mode;
    resolved.parameters = template.parameters;
    resolved.timestamp = template.timestamp;
    resolved.chain = template.chain;
    resolved
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(ids: Value) -> Parameters {
        Parameters {
            ids: ids.as_array().cloned().unwrap_or_default(),
            ..Default::default()
        }
    }

    fn resolve_value(config: Value, template: Value, mut p: Parameters) -> Value {
        let config = Config::from_value(config).unwrap();
        let template = Template::from_value(template).unwrap();
        let resolved = resolve(&config, template, &mut p);
        serde_json::to_value(resolved).unwrap()
    }

    #[test]
    fn parses_tokens_and_literals() {
        assert_eq!(
            parse_text("/a/${id}/b${x}"),
            vec![
                Segment::Lit("/a/".into()),
                Segment::Token("id".into()),
                Segment::Lit("/b".into()),
                Segment::Token("x".into()),
            ]
        );
        assert_eq!(parse_text("${open"), vec![Segment::Lit("${open".into())]);
        assert_eq!(parse_text(""), vec![Segment::Lit(String::new())]);
    }

    #[test]
    fn ids_expand_per_element() {
        let out = resolve_value(
            json!({"dynamic": {"authConfig.path": "ids"}}),
            json!({"authConfig": {"path": "${id}"}}),
            params(json!([{"id": "a"}, {"id": "b"}])),
        );
        assert_eq!(out["authConfig"]["path"], json!(["a", "b"]));
    }

    #[test]
    fn scalar_ids_are_normalized_before_expansion() {
        let out = resolve_value(
            json!({"dynamic": {"authConfig.path": "ids"}}),
            json!({"authConfig": {"path": "/devices/${id}/data"}}),
            params(json!(["a", "b"])),
        );
        assert_eq!(out["authConfig"]["path"], json!(["/devices/a/data", "/devices/b/data"]));
    }

    #[test]
    fn whole_id_object_replaces_id_token() {
        let out = resolve_value(
            json!({"dynamic": {"authConfig.path": "ids"}}),
            json!({"authConfig": {"path": "${id}"}}),
            params(json!([{"code": "x"}])),
        );
        assert_eq!(out["authConfig"]["path"], json!([{"code": "x"}]));
    }

    #[test]
    fn array_members_zip_into_rows() {
        let out = resolve_value(
            json!({"dynamic": {"body.rows": "ids"}}),
            json!({"body": {"rows": {"device": "${id}", "sensor": "${sensor}"}}}),
            params(json!([{"id": "d1", "sensor": ["s1", "s2", "s3"]}, {"id": "d2"}])),
        );
        assert_eq!(
            out["body"]["rows"],
            json!([
                {"device": "d1", "sensor": "s1"},
                {"device": "d1", "sensor": "s2"},
                {"device": "d1", "sensor": "s3"},
                {"device": "d2", "sensor": "${sensor}"}
            ])
        );
    }

    #[test]
    fn broadcast_over_array_root() {
        let out = resolve_value(
            json!({"dynamic": {"authConfig.path": "ids.code"}}),
            json!({"authConfig": {"path": "/x/${ids.code}"}}),
            params(json!([{"code": "a"}, {"code": "b"}])),
        );
        assert_eq!(out["authConfig"]["path"], json!(["/x/a", "/x/b"]));
    }

    #[test]
    fn scalar_substitution_and_missing_values() {
        let mut p = Parameters::default();
        p.extra.insert("unit".into(), json!("C"));
        let out = resolve_value(
            json!({"dynamic": {
                "authConfig.body.unit": "unit",
                "authConfig.body.gone": "absent",
                "authConfig.body.later": "apiKey"
            }, "static": {"apiKey": "secret"}}),
            json!({"authConfig": {"body": {
                "unit": "${unit}",
                "gone": "${absent}",
                "later": "${apiKey}"
            }}}),
            p,
        );
        assert_eq!(out["authConfig"]["body"], json!({"unit": "C", "later": "secret"}));
    }

    #[test]
    fn missing_timestamp_defaults_to_now() {
        let out = resolve_value(
            json!({"dynamic": {"authConfig.body.ts": "timestamp"}}),
            json!({"authConfig": {"body": {"ts": "${timestamp}"}}}),
            Parameters::default(),
        );
        let ts = out["authConfig"]["body"]["ts"].as_str().unwrap();
        assert!(crate::helpers::parse_ts(&json!(ts)).is_some());
    }

    #[test]
    fn statics_replace_tokens_everywhere() {
        let out = resolve_value(
            json!({"static": {"url": "https://api.example.com", "headers": {"x-key": "k"}, "n": 5}}),
            json!({"authConfig": {
                "url": "${url}",
                "headers": "${headers}",
                "path": ["/v${n}/a", "${other}"]
            }}),
            Parameters::default(),
        );
        assert_eq!(out["authConfig"]["url"], "https://api.example.com");
        assert_eq!(out["authConfig"]["headers"], json!({"x-key": "k"}));
        assert_eq!(out["authConfig"]["path"], json!(["/v5/a", "${other}"]));
    }

    #[test]
    fn expansion_into_typed_field_degrades() {
        let out = resolve_value(
            json!({"dynamic": {"authConfig.url": "ids", "authConfig.path": "ids"}}),
            json!({"protocol": "rest", "authConfig": {"url": "https://x/${id}", "path": "/${id}"}}),
            params(json!(["a", "b"])),
        );
        assert_eq!(out["authConfig"]["url"], "https://x/${id}");
        assert_eq!(out["authConfig"]["path"], json!(["/a", "/b"]));
        assert_eq!(out["protocol"], "rest");
    }

    #[test]
    fn rejected_static_leaf_keeps_other_substitutions() {
        let out = resolve_value(
            json!({"static": {"verb": {"name": "GET"}, "key": "k"}}),
            json!({"authConfig": {"headers": {"x-key": "${key}"}, "method": "${verb}"}}),
            Parameters::default(),
        );
        assert_eq!(out["authConfig"]["headers"]["x-key"], "k");
        assert_eq!(out["authConfig"]["method"], "${verb}");
    }

    #[test]
    fn no_dynamic_or_static_is_identity() {
        let template = Template::from_value(json!({
            "protocol": "rest",
            "authConfig": {"path": "${ids}", "url": "${url}"}
        }))
        .unwrap();
        let before = serde_json::to_value(&template).unwrap();
        let resolved = resolve(&Config::default(), template, &mut Parameters::default());
        assert_eq!(serde_json::to_value(resolved).unwrap(), before);
    }

    #[test]
    fn dates_render_as_iso() {
        let mut p = Parameters {
            start: Some("2021-03-01T10:00:00Z".parse().unwrap()),
            ..Default::default()
        };
        p.normalize_ids();
        let out = resolve_value(
            json!({"dynamic": {"authConfig.url": "start"}}),
            json!({"authConfig": {"url": "https://x/?from=${start}"}}),
            p,
        );
        assert_eq!(out["authConfig"]["url"], "https://x/?from=2021-03-01T10:00:00.000Z");
    }
}
