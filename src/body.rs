use serde_json::Number;

/// Decoded response body, independent of the wire format it came from.
///
/// Mappings keep their entries in document order and may carry non-string
/// keys, which some binary and YAML encodings allow.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Body {
    #[default]
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Seq(Vec<Body>),
    Map(Vec<(Body, Body)>),
}

impl Body {
    /// Build a mapping with string keys
    pub fn map<K: Into<String>>(entries: impl IntoIterator<Item = (K, Body)>) -> Self {
        Body::Map(
            entries
                .into_iter()
                .map(|(k, v)| (Body::String(k.into()), v))
                .collect(),
        )
    }

    /// Member of a mapping under a string key
    pub fn get(&self, key: &str) -> Option<&Body> {
        match self {
            Body::Map(entries) => entries
                .iter()
                .find(|(k, _)| matches!(k, Body::String(s) if s == key))
                .map(|(_, v)| v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Body::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_seq(&self) -> Option<&[Body]> {
        match self {
            Body::Seq(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&[(Body, Body)]> {
        match self {
            Body::Map(entries) => Some(entries),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Body::Null)
    }

    /// Text form of a scalar, used when a mapping key becomes a relation name
    pub fn key_string(&self) -> String {
        match self {
            Body::Null => "null".to_string(),
            Body::Bool(b) => b.to_string(),
            Body::Number(n) => n.to_string(),
            Body::String(s) => s.clone(),
            Body::Seq(_) | Body::Map(_) => String::new(),
        }
    }

    /// Get a value by a slash-separated path.
    /// For example, "user/name" would access the "name" field inside the "user" object,
    /// and "items/0" the first element of the "items" list.
    pub fn pointer(&self, path: &str) -> Option<&Body> {
        let mut current = self;

        for part in path.split('/').filter(|s| !s.is_empty()) {
            current = match current {
                Body::Map(_) => current.get(part)?,
                Body::Seq(items) => {
                    let index: usize = part.parse().ok()?;
                    items.get(index)?
                }
                _ => return None,
            };
        }

        Some(current)
    }
}

impl From<serde_json::Value> for Body {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;

        match value {
            Value::Null => Body::Null,
            Value::Bool(b) => Body::Bool(b),
            Value::Number(n) => Body::Number(n),
            Value::String(s) => Body::String(s),
            Value::Array(items) => Body::Seq(items.into_iter().map(Body::from).collect()),
            Value::Object(map) => Body::map(map.into_iter().map(|(k, v)| (k, Body::from(v)))),
        }
    }
}

impl From<serde_yaml::Value> for Body {
    fn from(value: serde_yaml::Value) -> Self {
        use serde_yaml::Value;

        match value {
            Value::Null => Body::Null,
            Value::Bool(b) => Body::Bool(b),
            Value::Number(n) => yaml_number(&n),
            Value::String(s) => Body::String(s),
            Value::Sequence(items) => Body::Seq(items.into_iter().map(Body::from).collect()),
            Value::Mapping(map) => Body::Map(
                map.into_iter()
                    .map(|(k, v)| (Body::from(k), Body::from(v)))
                    .collect(),
            ),
            Value::Tagged(tagged) => Body::from(tagged.value),
        }
    }
}

fn yaml_number(n: &serde_yaml::Number) -> Body {
    if let Some(i) = n.as_i64() {
        Body::Number(i.into())
    } else if let Some(u) = n.as_u64() {
        Body::Number(u.into())
    } else {
        n.as_f64()
            .and_then(Number::from_f64)
            .map(Body::Number)
            .unwrap_or(Body::Null)
    }
}

impl From<&str> for Body {
    fn from(s: &str) -> Self {
        Body::String(s.to_string())
    }
}

impl From<String> for Body {
    fn from(s: String) -> Self {
        Body::String(s)
    }
}
