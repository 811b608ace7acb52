use serde_json::{Map, Value};

/// Which side of the exchange a schema describes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaMode {
    /// Request bodies and parameters: `readOnly` fields are hidden
    Write,
    /// Responses: `writeOnly` fields are hidden
    Read,
}

impl SchemaMode {
    fn hides(self, schema: &Value) -> bool {
        let flag = match self {
            SchemaMode::Write => "readOnly",
            SchemaMode::Read => "writeOnly",
        };
        schema.get(flag).and_then(Value::as_bool).unwrap_or(false)
    }
}

fn schema_type(schema: &Value) -> Option<&str> {
    match schema.get("type") {
        Some(Value::String(t)) => Some(t.as_str()),
        // 3.1 allows a list such as ["string", "null"]
        Some(Value::Array(types)) => types
            .iter()
            .filter_map(Value::as_str)
            .find(|t| *t != "null"),
        _ => {
            if schema.get("properties").is_some() || schema.get("additionalProperties").is_some() {
                Some("object")
            } else if schema.get("items").is_some() {
                Some("array")
            } else {
                None
            }
        }
    }
}

fn compact(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Render a schema as a compact tree, one property per line.
///
/// Nested lines are prefixed with `indent` plus two spaces per level;
/// required properties are marked with `*`.
pub fn render_schema(schema: &Value, indent: &str, mode: SchemaMode) -> String {
    if let Some(reference) = schema.get("$ref").and_then(Value::as_str) {
        let name = reference.rsplit('/').next().unwrap_or(reference);
        return format!("<recursive ref {}>", name);
    }

    for combinator in ["allOf", "oneOf", "anyOf"] {
        if let Some(Value::Array(options)) = schema.get(combinator) {
            if combinator == "allOf" {
                if let Some(merged) = merge_all_of(options) {
                    return render_schema(&merged, indent, mode);
                }
            }
            let inner = format!("{}  ", indent);
            let mut out = format!("{}{{\n", combinator);
            for option in options {
                out += &format!("{}{}\n", inner, render_schema(option, &inner, mode));
            }
            out += &format!("{}}}", indent);
            return out;
        }
    }

    match schema_type(schema) {
        Some("object") => render_object(schema, indent, mode),
        Some("array") => {
            let inner = format!("{}  ", indent);
            let items = schema
                .get("items")
                .map(|items| render_schema(items, &inner, mode))
                .unwrap_or_else(|| "<any>".to_string());
            format!("[\n{}{}\n{}]", inner, items, indent)
        }
        other => render_scalar(schema, other.unwrap_or("any")),
    }
}

fn render_object(schema: &Value, indent: &str, mode: SchemaMode) -> String {
    let properties = schema.get("properties").and_then(Value::as_object);
    let additional = schema.get("additionalProperties").filter(|v| v.is_object());

    if properties.map_or(true, Map::is_empty) && additional.is_none() {
        return render_scalar(schema, "object");
    }

    let required: Vec<&str> = schema
        .get("required")
        .and_then(Value::as_array)
        .map(|r| r.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    let inner = format!("{}  ", indent);
    let mut out = String::from("{\n");

    for (name, prop) in properties.into_iter().flatten() {
        if mode.hides(prop) {
            continue;
        }
        let marker = if required.contains(&name.as_str()) { "*" } else { "" };
        out += &format!(
            "{}{}{}: {}\n",
            inner,
            name,
            marker,
            render_schema(prop, &inner, mode)
        );
    }

    if let Some(additional) = additional {
        out += &format!("{}<any>: {}\n", inner, render_schema(additional, &inner, mode));
    }

    out += &format!("{}}}", indent);
    out
}

fn render_scalar(schema: &Value, typ: &str) -> String {
    let mut tags = vec![typ.to_string()];

    if schema.get("nullable").and_then(Value::as_bool) == Some(true) {
        tags.push("nullable:true".to_string());
    }
    if let Some(format) = schema.get("format").and_then(Value::as_str) {
        tags.push(format!("format:{}", format));
    }
    if let Some(Value::Array(values)) = schema.get("enum") {
        let values: Vec<String> = values.iter().map(compact).collect();
        tags.push(format!("enum:{}", values.join(",")));
    }
    for (key, tag) in [
        ("minimum", "min"),
        ("exclusiveMinimum", "exclusiveMin"),
        ("maximum", "max"),
        ("exclusiveMaximum", "exclusiveMax"),
        ("minLength", "minLen"),
        ("maxLength", "maxLen"),
        ("pattern", "pattern"),
        ("default", "default"),
    ] {
        if let Some(value) = schema.get(key) {
            tags.push(format!("{}:{}", tag, compact(value)));
        }
    }

    let mut out = format!("({})", tags.join(" "));
    if let Some(description) = schema.get("description").and_then(Value::as_str) {
        let description = description.trim();
        if !description.is_empty() {
            out.push(' ');
            out += &description.replace('\n', " ");
        }
    }
    out
}

/// Combine `allOf` members that are all plain objects into one schema
fn merge_all_of(options: &[Value]) -> Option<Value> {
    let mut properties = Map::new();
    let mut required = Vec::new();

    for option in options {
        if schema_type(option) != Some("object") {
            return None;
        }
        if let Some(props) = option.get("properties").and_then(Value::as_object) {
            properties.extend(props.clone());
        }
        if let Some(Value::Array(r)) = option.get("required") {
            required.extend(r.iter().cloned());
        }
    }

    let mut merged = Map::new();
    merged.insert("type".to_string(), Value::from("object"));
    merged.insert("properties".to_string(), Value::Object(properties));
    if !required.is_empty() {
        merged.insert("required".to_string(), Value::Array(required));
    }
    Some(Value::Object(merged))
}

/// Generate an example value that satisfies `schema`.
///
/// Declared examples and defaults win; otherwise a placeholder is built
/// from the type, honoring the hidden fields of `mode`.
pub fn gen_example(schema: &Value, mode: SchemaMode) -> Value {
    if let Some(example) = schema.get("example") {
        return example.clone();
    }
    if let Some(first) = schema.get("examples").and_then(Value::as_array).and_then(|e| e.first()) {
        return first.clone();
    }
    if let Some(default) = schema.get("default") {
        return default.clone();
    }
    if let Some(first) = schema.get("enum").and_then(Value::as_array).and_then(|e| e.first()) {
        return first.clone();
    }
    if schema.get("$ref").is_some() {
        return Value::Null;
    }

    if let Some(Value::Array(options)) = schema.get("allOf") {
        let mut merged = Map::new();
        for option in options {
            match gen_example(option, mode) {
                Value::Object(map) => merged.extend(map),
                other => return other,
            }
        }
        return Value::Object(merged);
    }
    for combinator in ["oneOf", "anyOf"] {
        if let Some(first) = schema.get(combinator).and_then(Value::as_array).and_then(|o| o.first()) {
            return gen_example(first, mode);
        }
    }

    match schema_type(schema) {
        Some("object") => {
            let mut example = Map::new();
            if let Some(props) = schema.get("properties").and_then(Value::as_object) {
                for (name, prop) in props {
                    if !mode.hides(prop) {
                        example.insert(name.clone(), gen_example(prop, mode));
                    }
                }
            }
            if let Some(additional) = schema.get("additionalProperties").filter(|v| v.is_object()) {
                example.insert("<any>".to_string(), gen_example(additional, mode));
            }
            Value::Object(example)
        }
        Some("array") => match schema.get("items") {
            Some(items) => Value::Array(vec![gen_example(items, mode)]),
            None => Value::Array(Vec::new()),
        },
        Some("string") => Value::from(string_example(schema)),
        Some("integer") => schema.get("minimum").cloned().unwrap_or_else(|| Value::from(0)),
        Some("number") => schema.get("minimum").cloned().unwrap_or_else(|| Value::from(0.5)),
        Some("boolean") => Value::Bool(true),
        _ => Value::Null,
    }
}

fn string_example(schema: &Value) -> &'static str {
    match schema.get("format").and_then(Value::as_str) {
        Some("date-time") => "2020-01-01T12:00:00Z",
        Some("date") => "2020-01-01",
        Some("time") => "12:00:00",
        Some("email") => "user@example.com",
        Some("uri") | Some("url") => "https://example.com/",
        Some("uuid") => "01234567-89ab-cdef-0123-456789abcdef",
        Some("ipv4") => "192.0.2.1",
        Some("ipv6") => "2001:db8::1",
        Some("hostname") => "example.com",
        _ => "string",
    }
}
