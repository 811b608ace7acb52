use serde_json::Value;

/// Document encoding, picked from a file name or URL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Yaml,
    /// Unknown extension: try JSON, then YAML
    Auto,
}

impl Format {
    /// Guess the format from the extension of a path or URL
    pub fn from_location(location: &str) -> Self {
        let location = location.split(['?', '#']).next().unwrap_or(location);
        let lower = location.to_ascii_lowercase();
        if lower.ends_with(".json") {
            Format::Json
        } else if lower.ends_with(".yaml") || lower.ends_with(".yml") {
            Format::Yaml
        } else {
            Format::Auto
        }
    }
}

/// Decode a JSON or YAML document into a JSON value
pub fn parse_document(data: &[u8], format: Format) -> Result<Value, String> {
    match format {
        Format::Json => serde_json::from_slice(data).map_err(|e| e.to_string()),
        Format::Yaml => serde_yaml::from_slice(data).map_err(|e| e.to_string()),
        Format::Auto => serde_json::from_slice(data).or_else(|json_err| {
            serde_yaml::from_slice(data)
                .map_err(|yaml_err| format!("not JSON ({}) nor YAML ({})", json_err, yaml_err))
        }),
    }
}

/// Encode a value, as YAML for `.yaml` locations and as indented JSON otherwise
pub fn render_document(value: &Value, format: Format) -> Result<String, String> {
    match format {
        Format::Yaml => serde_yaml::to_string(value).map_err(|e| e.to_string()),
        Format::Json | Format::Auto => serde_json::to_string_pretty(value)
            .map(|s| s + "\n")
            .map_err(|e| e.to_string()),
    }
}
