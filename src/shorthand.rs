use serde_json::{Map, Value};

/// Render an object as shorthand, without surrounding braces
pub fn to_shorthand(object: &Map<String, Value>) -> String {
    entries(object)
}

fn entries(object: &Map<String, Value>) -> String {
    object
        .iter()
        .map(|(key, value)| entry(&quote_key(key), value))
        .collect::<Vec<_>>()
        .join(", ")
}

fn entry(path: &str, value: &Value) -> String {
    match value {
        // A lone nested key collapses into a dotted path
        Value::Object(map) if map.len() == 1 => {
            let (key, inner) = map.iter().next().map(|(k, v)| (k.as_str(), v)).unwrap_or(("", value));
            entry(&format!("{}.{}", path, quote_key(key)), inner)
        }
        Value::Object(map) if !map.is_empty() => format!("{}{{{}}}", path, entries(map)),
        other => format!("{}: {}", path, scalar_or_list(other)),
    }
}

fn scalar_or_list(value: &Value) -> String {
    match value {
        Value::Array(items) => {
            let items: Vec<String> = items.iter().map(scalar_or_list).collect();
            format!("[{}]", items.join(", "))
        }
        Value::Object(map) => format!("{{{}}}", entries(map)),
        Value::String(s) => quote_value(s),
        other => other.to_string(),
    }
}

fn needs_quotes(s: &str) -> bool {
    s.is_empty()
        || s.trim() != s
        || matches!(s, "true" | "false" | "null")
        || s.parse::<f64>().is_ok()
        || s.contains([',', ':', '{', '}', '[', ']', '"', '\n'])
}

fn quote_value(s: &str) -> String {
    if needs_quotes(s) {
        Value::from(s).to_string()
    } else {
        s.to_string()
    }
}

fn quote_key(key: &str) -> String {
    if needs_quotes(key) || key.contains('.') {
        Value::from(key).to_string()
    } else {
        key.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn render(value: Value) -> String {
        match value {
            Value::Object(map) => to_shorthand(&map),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_flat_object() {
        assert_eq!(render(json!({"name": "widget", "size": 3, "on": true})), "name: widget, size: 3, on: true");
    }

    #[test]
    fn test_nested_objects() {
        assert_eq!(render(json!({"meta": {"tags": ["x", "y"]}})), "meta.tags: [x, y]");
        assert_eq!(render(json!({"dim": {"w": 1, "h": 2}})), "dim{w: 1, h: 2}");
        assert_eq!(render(json!({"empty": {}})), "empty: {}");
    }

    #[test]
    fn test_ambiguous_strings_are_quoted() {
        assert_eq!(
            render(json!({"a": "123", "b": "true", "c": "x, y", "d": ""})),
            r#"a: "123", b: "true", c: "x, y", d: """#
        );
    }

    #[test]
    fn test_objects_in_lists() {
        assert_eq!(render(json!({"items": [{"id": 1, "n": null}]})), "items: [{id: 1, n: null}]");
    }
}
