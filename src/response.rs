use crate::body::Body;
use crate::error::LinkError;
use crate::links::{LinkResolver, Links};
use reqwest::header::HeaderMap;
use url::Url;

/// Response represents a decoded API response and the navigation links
/// found in it.
///
/// Links are empty until [`Response::parse_links`] has run; follow-up
/// navigation should not be offered before that.
#[derive(Debug, Clone, Default)]
pub struct Response {
    /// HTTP status code
    pub status: u16,

    /// Response headers
    pub headers: HeaderMap,

    /// Decoded response body
    pub body: Body,

    /// Relation name to URIs, filled by `parse_links`
    pub links: Links,
}

impl Response {
    /// Create a response without links
    pub fn new(status: u16, headers: HeaderMap, body: Body) -> Self {
        Response {
            status,
            headers,
            body,
            links: Links::new(),
        }
    }

    /// Run the resolver's strategies and store the links found.
    ///
    /// Relative URIs are made absolute against `base` when given. Strategy
    /// failures are returned; links from the other strategies are kept.
    pub fn parse_links(&mut self, resolver: &LinkResolver, base: Option<&Url>) -> Vec<LinkError> {
        let resolution = resolver.resolve(&self.headers, &self.body);
        self.links = match base {
            Some(base) => resolution.links.resolve_against(base),
            None => resolution.links,
        };
        resolution.errors
    }

    /// Get a value from the body by a slash-separated path.
    /// For example, "user/name" would access the "name" field inside the "user" object.
    pub fn get(&self, path: &str) -> Option<&Body> {
        self.body.pointer(path)
    }

    /// Get a string value from the body by a slash-separated path
    pub fn get_string(&self, path: &str) -> Option<String> {
        self.get(path).and_then(Body::as_str).map(|s| s.to_string())
    }

    /// First URI discovered for a relation
    pub fn link(&self, rel: &str) -> Option<&str> {
        self.links.first(rel)
    }

    /// Check whether the status code is in the 2xx range
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}
