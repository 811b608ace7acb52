use crate::body::Body;
use crate::error::LinkError;
use indexmap::IndexMap;
use reqwest::header::{HeaderMap, LINK};
use tracing::debug;
use url::Url;

/// Relation name -> discovered URIs, both in discovery order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Links(IndexMap<String, Vec<String>>);

impl Links {
    pub fn new() -> Self {
        Links::default()
    }

    /// Append a URI to a relation
    pub fn add(&mut self, rel: impl Into<String>, uri: impl Into<String>) {
        self.0.entry(rel.into()).or_default().push(uri.into());
    }

    /// URIs for a relation
    pub fn get(&self, rel: &str) -> Option<&[String]> {
        self.0.get(rel).map(Vec::as_slice)
    }

    /// First URI for a relation
    pub fn first(&self, rel: &str) -> Option<&str> {
        self.get(rel).and_then(|uris| uris.first()).map(String::as_str)
    }

    pub fn contains(&self, rel: &str) -> bool {
        self.0.contains_key(rel)
    }

    /// Relation names in discovery order
    pub fn rels(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Append all links of `other`, keeping the order of both
    pub fn extend(&mut self, other: Links) {
        for (rel, uris) in other.0 {
            self.0.entry(rel).or_default().extend(uris);
        }
    }

    /// Resolve relative URIs against `base`; URIs that fail to resolve are kept as given
    pub fn resolve_against(&self, base: &Url) -> Links {
        let resolved = self
            .0
            .iter()
            .map(|(rel, uris)| {
                let uris = uris
                    .iter()
                    .map(|uri| base.join(uri).map(String::from).unwrap_or_else(|_| uri.clone()))
                    .collect();
                (rel.clone(), uris)
            })
            .collect();
        Links(resolved)
    }
}

/// One link format recognizer.
///
/// Returning empty links means the format was not found. An error means
/// the format was found but malformed.
pub trait LinkStrategy: Send + Sync {
    /// Short name used in logs and errors
    fn name(&self) -> &'static str;

    /// Extract links from response headers and the decoded body
    fn extract(&self, headers: &HeaderMap, body: &Body) -> Result<Links, LinkError>;
}

/// RFC 8288 `Link` header: `<uri>; rel="name", ...`
#[derive(Debug, Clone, Copy, Default)]
pub struct LinkHeaderStrategy;

/// HAL `_links` member
#[derive(Debug, Clone, Copy, Default)]
pub struct HalStrategy;

/// Siren `links` list of `{rel: [...], href}`
#[derive(Debug, Clone, Copy, Default)]
pub struct SirenStrategy;

/// JSON:API top-level and per-resource `links.self`
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonApiStrategy;

/// Shape-agnostic walk for `self` members at any depth
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicStrategy;

/// Split on `sep` outside of `<...>` and double quotes
fn split_outside(value: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut in_uri = false;
    let mut in_quotes = false;

    for (i, c) in value.char_indices() {
        match c {
            '<' if !in_quotes => in_uri = true,
            '>' if !in_quotes => in_uri = false,
            '"' if !in_uri => in_quotes = !in_quotes,
            c if c == sep && !in_uri && !in_quotes => {
                parts.push(&value[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&value[start..]);
    parts
}

impl LinkHeaderStrategy {
    const NAME: &'static str = "link-header";

    /// Parse one header value into `links`
    pub fn parse_value(value: &str, links: &mut Links) -> Result<(), LinkError> {
        for entry in split_outside(value, ',') {
            let entry = entry.trim();
            if entry.is_empty() {
                continue;
            }

            let uri = entry
                .strip_prefix('<')
                .and_then(|rest| rest.split_once('>'))
                .map(|(uri, _)| uri.trim())
                .ok_or_else(|| LinkError::new(Self::NAME, format!("missing <uri> in entry '{}'", entry)))?;

            let params = &entry[entry.find('>').map_or(entry.len(), |i| i + 1)..];
            for param in split_outside(params, ';') {
                let Some((key, val)) = param.split_once('=') else {
                    continue;
                };
                if !key.trim().eq_ignore_ascii_case("rel") {
                    continue;
                }
                for rel in val.trim().trim_matches('"').split_whitespace() {
                    links.add(rel, uri);
                }
            }
        }
        Ok(())
    }
}

impl LinkStrategy for LinkHeaderStrategy {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn extract(&self, headers: &HeaderMap, _body: &Body) -> Result<Links, LinkError> {
        let mut links = Links::new();
        for value in headers.get_all(LINK) {
            let value = value
                .to_str()
                .map_err(|_| LinkError::new(Self::NAME, "header is not valid text"))?;
            Self::parse_value(value, &mut links)?;
        }
        Ok(links)
    }
}

impl HalStrategy {
    const NAME: &'static str = "hal";

    fn href(rel: &str, link: &Body) -> Result<Option<String>, LinkError> {
        match link {
            Body::Map(_) => Ok(link.get("href").and_then(Body::as_str).map(str::to_string)),
            _ => Err(LinkError::new(Self::NAME, format!("link '{}' is not an object", rel))),
        }
    }

    fn extract_one(body: &Body, links: &mut Links) -> Result<(), LinkError> {
        let Some(hal) = body.get("_links") else {
            return Ok(());
        };
        let entries = hal
            .as_map()
            .ok_or_else(|| LinkError::new(Self::NAME, "_links is not an object"))?;

        for (key, value) in entries {
            let rel = key.key_string();
            if rel == "curies" {
                continue;
            }

            match value {
                Body::Null => {}
                Body::Seq(items) => {
                    for item in items {
                        if let Some(href) = Self::href(&rel, item)? {
                            links.add(rel.clone(), href);
                        }
                    }
                }
                _ => {
                    if let Some(href) = Self::href(&rel, value)? {
                        links.add(rel, href);
                    }
                }
            }
        }
        Ok(())
    }
}

impl LinkStrategy for HalStrategy {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn extract(&self, _headers: &HeaderMap, body: &Body) -> Result<Links, LinkError> {
        let mut links = Links::new();
        match body {
            Body::Seq(items) => {
                for item in items {
                    Self::extract_one(item, &mut links)?;
                }
            }
            _ => Self::extract_one(body, &mut links)?,
        }
        Ok(links)
    }
}

impl LinkStrategy for SirenStrategy {
    fn name(&self) -> &'static str {
        "siren"
    }

    fn extract(&self, _headers: &HeaderMap, body: &Body) -> Result<Links, LinkError> {
        let mut links = Links::new();
        // A `links` object rather than a list is JSON:API, not Siren
        let Some(entries) = body.get("links").and_then(Body::as_seq) else {
            return Ok(links);
        };

        for entry in entries {
            if entry.as_map().is_none() {
                return Err(LinkError::new(self.name(), "link entry is not an object"));
            }
            let Some(href) = entry.get("href").and_then(Body::as_str) else {
                continue;
            };
            let rels = match entry.get("rel") {
                Some(Body::Seq(rels)) => rels,
                Some(Body::Null) | None => continue,
                Some(_) => return Err(LinkError::new(self.name(), "rel is not a list")),
            };
            for rel in rels {
                links.add(rel.key_string(), href);
            }
        }
        Ok(links)
    }
}

impl JsonApiStrategy {
    fn self_link(links: &Body) -> Option<&str> {
        match links.get("self")? {
            Body::String(s) => Some(s.as_str()),
            link @ Body::Map(_) => link.get("href").and_then(Body::as_str),
            _ => None,
        }
    }
}

impl LinkStrategy for JsonApiStrategy {
    fn name(&self) -> &'static str {
        "json-api"
    }

    fn extract(&self, _headers: &HeaderMap, body: &Body) -> Result<Links, LinkError> {
        let mut links = Links::new();

        if let Some(top) = body.get("links").filter(|l| l.as_map().is_some()) {
            if let Some(uri) = Self::self_link(top) {
                links.add("self", uri);
            }
        }

        if let Some(data) = body.get("data").and_then(Body::as_seq) {
            for item in data {
                if let Some(uri) = item.get("links").and_then(Self::self_link) {
                    links.add("item", uri);
                }
            }
        }

        Ok(links)
    }
}

impl HeuristicStrategy {
    fn walk(key: &str, value: &Body, links: &mut Links) {
        match value {
            Body::Seq(items) => {
                let item_key = format!("{}-item", key);
                for item in items {
                    Self::walk(&item_key, item, links);
                }
            }
            Body::Map(entries) => {
                for (k, v) in entries {
                    if matches!(k, Body::String(s) if s == "self") {
                        if let Body::String(uri) = v {
                            let rel = if key.is_empty() { "self" } else { key };
                            links.add(rel, uri.as_str());
                        }
                        continue;
                    }
                    Self::walk(&k.key_string(), v, links);
                }
            }
            _ => {}
        }
    }
}

impl LinkStrategy for HeuristicStrategy {
    fn name(&self) -> &'static str {
        "heuristic"
    }

    fn extract(&self, _headers: &HeaderMap, body: &Body) -> Result<Links, LinkError> {
        let mut links = Links::new();
        if let Body::Map(_) = body {
            Self::walk("", body, &mut links);
        }
        Ok(links)
    }
}

/// Outcome of running every strategy on one response
#[derive(Debug, Clone, Default)]
pub struct LinkResolution {
    pub links: Links,
    /// One entry per failed strategy
    pub errors: Vec<LinkError>,
}

/// Ordered set of link strategies
pub struct LinkResolver {
    strategies: Vec<Box<dyn LinkStrategy>>,
}

impl Default for LinkResolver {
    fn default() -> Self {
        LinkResolver::with_defaults()
    }
}

impl std::fmt::Debug for LinkResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.strategies.iter().map(|s| s.name()))
            .finish()
    }
}

impl LinkResolver {
    /// Resolver with no strategies
    pub fn new() -> Self {
        LinkResolver { strategies: Vec::new() }
    }

    /// Resolver with the built-in strategies: header, HAL, heuristic, Siren, JSON:API
    pub fn with_defaults() -> Self {
        LinkResolver::new()
            .with(LinkHeaderStrategy)
            .with(HalStrategy)
            .with(HeuristicStrategy)
            .with(SirenStrategy)
            .with(JsonApiStrategy)
    }

    /// Append a strategy
    pub fn with(mut self, strategy: impl LinkStrategy + 'static) -> Self {
        self.register(strategy);
        self
    }

    /// Append a strategy
    pub fn register(&mut self, strategy: impl LinkStrategy + 'static) {
        self.strategies.push(Box::new(strategy));
    }

    /// Names of the registered strategies, in run order
    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Run every strategy and merge what they found
    pub fn resolve(&self, headers: &HeaderMap, body: &Body) -> LinkResolution {
        let mut resolution = LinkResolution::default();

        for strategy in &self.strategies {
            match strategy.extract(headers, body) {
                Ok(links) => resolution.links.extend(links),
                Err(err) => {
                    debug!(strategy = strategy.name(), error = %err, "link strategy failed");
                    resolution.errors.push(err);
                }
            }
        }

        resolution
    }
}
