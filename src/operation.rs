use crate::apiconfig::ApiAuth;
use crate::naming::kebab;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Parameter serialization style
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamStyle {
    /// Comma-separated values (`a,b,c`)
    #[default]
    Simple,
    /// Repeated or ampersand-separated query values (`x=a&x=b`)
    Form,
}

/// A compiled operation parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    /// Inferred type: a scalar such as `"string"`, or `"array[integer]"`
    #[serde(rename = "type")]
    pub param_type: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub style: ParamStyle,
    pub explode: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example: Option<Value>,
}

impl Param {
    /// Create a string parameter with default serialization
    pub fn new(name: impl Into<String>) -> Self {
        Param {
            param_type: "string".to_string(),
            name: name.into(),
            display_name: None,
            description: String::new(),
            style: ParamStyle::Simple,
            explode: false,
            default: None,
            example: None,
        }
    }

    /// Name used on the command line
    pub fn option_name(&self) -> String {
        kebab(self.display_name.as_deref().unwrap_or(&self.name))
    }

    /// Whether values are sent as a list
    pub fn is_array(&self) -> bool {
        self.param_type.starts_with("array")
    }
}

/// An executable command compiled from one OpenAPI path + method.
/// Built once and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    pub name: String,
    /// First tag of the operation, empty when untagged
    pub group: String,
    pub aliases: Vec<String>,
    pub short: String,
    pub long: String,
    /// Uppercase HTTP method
    pub method: String,
    /// Absolute URI with `{param}` placeholders
    pub uri_template: String,
    pub path_params: Vec<Param>,
    pub query_params: Vec<Param>,
    pub header_params: Vec<Param>,
    /// Request body media type, empty when the operation takes no body
    pub body_media_type: String,
    /// Short input examples for usage text
    pub examples: Vec<String>,
    /// Callable but not listed
    pub hidden: bool,
    pub deprecated: bool,
}

impl Operation {
    /// Whether this operation shows up in listings
    pub fn is_discoverable(&self) -> bool {
        !self.hidden
    }

    /// Whether `name` selects this operation, by name or alias
    pub fn answers_to(&self, name: &str) -> bool {
        self.name == name || self.aliases.iter().any(|a| a == name)
    }
}

/// A value asked for interactively when an API is first configured
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AutoConfigVar {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub example: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, rename = "enum", skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<Value>,
    /// Used only to build other values, never stored as an auth param
    #[serde(default)]
    pub exclude: bool,
}

/// Document-declared default setup applied when an API is first configured
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AutoConfig {
    pub headers: BTreeMap<String, String>,
    pub prompt: BTreeMap<String, AutoConfigVar>,
    pub auth: ApiAuth,
}

/// Everything compiled from an API's description documents
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Api {
    pub short: String,
    pub long: String,
    pub operations: Vec<Operation>,
    /// Supported auth schemes, by scheme name order
    pub auth: Vec<ApiAuth>,
    pub auto_config: Option<AutoConfig>,
}

impl Api {
    /// Operations that show up in listings
    pub fn discoverable(&self) -> impl Iterator<Item = &Operation> {
        self.operations.iter().filter(|op| op.is_discoverable())
    }

    /// Find an operation by name or alias, hidden ones included
    pub fn operation(&self, name: &str) -> Option<&Operation> {
        self.operations.iter().find(|op| op.answers_to(name))
    }

    /// Append another document's results; metadata of the first document wins
    pub fn merge(&mut self, other: Api) {
        if self.short.is_empty() {
            self.short = other.short;
        }
        if self.long.is_empty() {
            self.long = other.long;
        }
        self.operations.extend(other.operations);
        for auth in other.auth {
            if !self.auth.contains(&auth) {
                self.auth.push(auth);
            }
        }
        if self.auto_config.is_none() {
            self.auto_config = other.auto_config;
        }
    }
}
