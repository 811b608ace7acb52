use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while discovering, merging, querying or saving API configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file exists but could not be read
    #[error("unable to read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config file could not be written
    #[error("unable to write config {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config file or one of its entries could not be decoded
    #[error("invalid config {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },

    /// Two registered APIs share the same base URI
    #[error("multiple APIs configured with the same base URL {base}: '{first}' and '{second}'")]
    DuplicateBase {
        base: String,
        first: String,
        second: String,
    },

    /// No API registered under the requested name
    #[error("API '{name}' not found. Available APIs: {}", list_or_none(.available))]
    UnknownApi { name: String, available: Vec<String> },

    /// The requested profile is not declared by the API
    #[error("profile '{profile}' not found for API '{api}'. Available profiles: {}", list_or_none(.available))]
    UnknownProfile {
        profile: String,
        api: String,
        available: Vec<String>,
    },

    /// Neither an explicit directory nor the environment gives a config location
    #[error("unable to determine config directory (set it explicitly or define HOME)")]
    NoConfigDir,
}

/// Errors raised while loading and compiling an OpenAPI document
#[derive(Debug, Error)]
pub enum SpecError {
    /// Document could not be fetched from its location
    #[error("unable to fetch API description {location}: {source}")]
    Fetch {
        location: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Document is neither valid JSON nor valid YAML
    #[error("unable to parse API description {location}: {message}")]
    Parse { location: String, message: String },

    /// Missing or unrecognized `openapi` version marker
    #[error("unsupported API description {location}: {}", describe_version(.version))]
    UnsupportedDocument {
        location: String,
        version: Option<String>,
    },

    /// One or more references in the document could not be resolved
    #[error("failed to load the OpenAPI document {location}: {}", .errors.join("; "))]
    Resolution {
        location: String,
        errors: Vec<String>,
    },

    /// A base or server URL could not be parsed
    #[error("invalid URL {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// API has no spec files and none of the well-known locations answered
    #[error("no API description found for '{api}'")]
    NoDocument { api: String },
}

/// Error raised by one link strategy on a malformed link-bearing structure
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{strategy} links: {message}")]
pub struct LinkError {
    /// Name of the strategy that failed
    pub strategy: &'static str,
    /// What was wrong with the structure
    pub message: String,
}

impl LinkError {
    /// Create a new error scoped to the given strategy
    pub fn new(strategy: &'static str, message: impl Into<String>) -> Self {
        LinkError {
            strategy,
            message: message.into(),
        }
    }
}

/// Main error type of the crate
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Spec(#[from] SpecError),

    #[error(transparent)]
    Link(#[from] LinkError),
}

impl Error {
    /// Check if this error is a failed API-name or profile lookup.
    /// Such errors are reported to the caller and are not fatal.
    pub fn is_lookup(&self) -> bool {
        matches!(
            self,
            Error::Config(ConfigError::UnknownApi { .. })
                | Error::Config(ConfigError::UnknownProfile { .. })
        )
    }
}

/// Result type for this crate
pub type Result<T> = std::result::Result<T, Error>;

fn list_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "(none defined)".to_string()
    } else {
        items.join(", ")
    }
}

fn describe_version(version: &Option<String>) -> String {
    match version {
        Some(v) => format!("version marker '{}' is not OpenAPI 3", v),
        None => "missing 'openapi' version marker".to_string(),
    }
}
