//! # apinav - API description resolution for generic REST clients
//!
//! A Rust core for command-line REST clients that learn what an API can do
//! from declarative descriptions instead of hand-written bindings.
//!
//! ## Features
//!
//! - Layered API registry:
//!   - one global `apis.json` plus `.apinav.json` / `.apinav.yaml` files found
//!     walking up from the working directory, deep-merged root first
//!   - per-API profiles, URI-prefix lookup and write-back to the right file
//! - OpenAPI 3 compilation into an executable [`Operation`] model with merged
//!   parameters, input examples, grouped response docs and auth schemes
//! - Hypermedia link discovery over pluggable strategies (`Link` header, HAL,
//!   Siren, JSON:API and a shape-agnostic heuristic)
//!
//! ## Basic Usage
//!
//! ```no_run
//! use apinav::{Registry, Settings};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = Settings::from_env("apinav");
//!     settings.init_logging();
//!
//!     let mut registry = Registry::load(settings)?;
//!
//!     if let Some(api) = registry.api_for("https://api.example.com/widgets")? {
//!         for op in api.discoverable() {
//!             println!("{:8} {} {}", op.method, op.name, op.short);
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Following Links
//!
//! ```no_run
//! use apinav::{Body, LinkResolver, Response};
//! use reqwest::header::HeaderMap;
//! use serde_json::json;
//!
//! let body = Body::from(json!({"_links": {"next": {"href": "/widgets?page=2"}}}));
//! let mut response = Response::new(200, HeaderMap::new(), body);
//!
//! let base = url::Url::parse("https://api.example.com/widgets").unwrap();
//! response.parse_links(&LinkResolver::with_defaults(), Some(&base));
//! assert_eq!(response.link("next"), Some("https://api.example.com/widgets?page=2"));
//! ```

pub mod apiconfig;
pub mod body;
pub mod compiler;
pub mod error;
pub mod fetch;
pub mod format;
pub mod links;
pub mod naming;
pub mod operation;
pub mod refs;
pub mod registry;
pub mod response;
pub mod schema;
pub mod settings;
pub mod shorthand;
pub mod store;

// Re-export main types for convenience
pub use apiconfig::{ApiAuth, ApiConfig, ApiProfile, TlsConfig};
pub use body::Body;
pub use compiler::SpecCompiler;
pub use error::{ConfigError, Error, LinkError, Result, SpecError};
pub use fetch::{DefaultFetcher, DocumentFetcher, FsFetcher, HttpFetcher};
pub use links::{LinkResolution, LinkResolver, LinkStrategy, Links};
pub use operation::{Api, AutoConfig, AutoConfigVar, Operation, Param, ParamStyle};
pub use registry::Registry;
pub use response::Response;
pub use settings::Settings;
pub use store::{ConfigStore, SavePolicy, SaveTarget, SaveTargetPrompt};
