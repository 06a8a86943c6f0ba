//! Dotted-path access into JSON values.
//!
//! Paths look like `parameters.ids`, `data.0.value` or `data[0].value`. Numeric
//! segments index arrays; when writing, a numeric segment under a missing parent
//! creates an array, any other segment creates an object.

use serde_json::{Map, Value};

pub fn segments(path: &str) -> Vec<String> {
    path.replace('[', ".")
        .replace(']', "")
        .split('.')
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}

fn step<'a>(value: &'a Value, segment: &str) -> Option<&'a Value> {
    match value {
        Value::Object(map) => map.get(segment),
        Value::Array(arr) => segment.parse::<usize>().ok().and_then(|i| arr.get(i)),
        _ => None,
    }
}

fn step_mut<'a>(value: &'a mut Value, segment: &str) -> Option<&'a mut Value> {
    match value {
        Value::Object(map) => map.get_mut(segment),
        Value::Array(arr) => segment
            .parse::<usize>()
            .ok()
            .and_then(move |i| arr.get_mut(i)),
        _ => None,
    }
}

/// Value at `path`. An empty path yields `None`.
pub fn get<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let segs = segments(path);
    if segs.is_empty() {
        return None;
    }
    segs.iter().try_fold(value, |v, s| step(v, s))
}

pub fn get_mut<'a>(value: &'a mut Value, path: &str) -> Option<&'a mut Value> {
    let segs = segments(path);
    if segs.is_empty() {
        return None;
    }
    let mut current = value;
    for s in &segs {
        current = step_mut(current, s)?;
    }
    Some(current)
}

fn empty_container(next: &str) -> Value {
    if next.parse::<usize>().is_ok() {
        Value::Array(Vec::new())
    } else {
        Value::Object(Map::new())
    }
}

fn slot<'a>(current: &'a mut Value, segment: &str, next: Option<&str>) -> Option<&'a mut Value> {
    let fresh = || next.map(empty_container).unwrap_or(Value::Null);
    let index = segment.parse::<usize>().ok();
    if current.is_array() && index.is_none() {
        // Non-numeric key on an array: convert into an object keyed by index.
        if let Value::Array(arr) = current.take() {
            let map = arr
                .into_iter()
                .enumerate()
                .map(|(i, v)| (i.to_string(), v))
                .collect::<Map<_, _>>();
            *current = Value::Object(map);
        }
    } else if !current.is_object() && !current.is_array() {
        *current = Value::Object(Map::new());
    }
    match current {
        Value::Array(arr) => {
            let i = index?;
            if arr.len() <= i {
                arr.resize(i + 1, Value::Null);
            }
            let entry = &mut arr[i];
            if entry.is_null() && next.is_some() {
                *entry = fresh();
            }
            Some(entry)
        }
        Value::Object(map) => {
            let entry = map.entry(segment.to_owned()).or_insert_with(fresh);
            if next.is_some() && !entry.is_object() && !entry.is_array() {
                *entry = fresh();
            }
            Some(entry)
        }
        _ => None,
    }
}

/// Writes `new` at `path`, creating intermediate containers.
pub fn set(value: &mut Value, path: &str, new: Value) {
    let segs = segments(path);
    if segs.is_empty() {
        *value = new;
        return;
    }
    let mut current = value;
    for (i, s) in segs.iter().enumerate() {
        let next = segs.get(i + 1).map(String::as_str);
        match slot(current, s, next) {
            Some(v) => current = v,
            None => return,
        }
    }
    *current = new;
}

/// Removes the value at `path`. Array elements are replaced with `null` so that
/// sibling indices stay stable.
pub fn unset(value: &mut Value, path: &str) -> Option<Value> {
    let mut segs = segments(path);
    let last = segs.pop()?;
    let parent = if segs.is_empty() {
        value
    } else {
        get_mut(value, &segs.join("."))?
    };
    match parent {
        Value::Object(map) => map.shift_remove(&last),
        Value::Array(arr) => last
            .parse::<usize>()
            .ok()
            .and_then(|i| arr.get_mut(i))
            .map(Value::take),
        _ => None,
    }
}

/// JavaScript truthiness: `null`, `false`, `0`, `NaN` and `""` are falsy;
/// every array and object is truthy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Value at `path` when it is truthy.
pub fn get_truthy<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    get(value, path).filter(|v| is_truthy(v))
}

/// Renders a scalar the way string interpolation would.
pub fn to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_owned(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn get_walks_objects_and_arrays() {
        let v = json!({"a": {"b": [{"c": 1}, {"c": 2}]}});
        assert_eq!(get(&v, "a.b.1.c"), Some(&json!(2)));
        assert_eq!(get(&v, "a.b[0].c"), Some(&json!(1)));
        assert_eq!(get(&v, "a.x"), None);
        assert_eq!(get(&v, ""), None);
    }

    #[test]
    fn set_creates_intermediate_containers() {
        let mut v = json!({});
        set(&mut v, "authConfig.path.1.id", json!("b"));
        assert_eq!(v, json!({"authConfig": {"path": [null, {"id": "b"}]}}));

        set(&mut v, "authConfig.url", json!("http://x"));
        assert_eq!(v["authConfig"]["url"], "http://x");
    }

    #[test]
    fn unset_removes_members() {
        let mut v = json!({"parameters": {"ids": [1], "x": 2}});
        assert_eq!(unset(&mut v, "parameters.ids"), Some(json!([1])));
        assert_eq!(v, json!({"parameters": {"x": 2}}));
        assert_eq!(unset(&mut v, "parameters.ids"), None);
    }

    #[test]
    fn truthiness_follows_javascript() {
        assert!(!is_truthy(&json!(null)));
        assert!(!is_truthy(&json!("")));
        assert!(!is_truthy(&json!(0)));
        assert!(is_truthy(&json!([])));
        assert!(is_truthy(&json!({})));
        assert!(is_truthy(&json!("0")));
    }
}
