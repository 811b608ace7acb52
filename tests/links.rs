use apinav::links::{HeuristicStrategy, LinkStrategy};
use apinav::{Body, LinkError, LinkResolver, Links, Response};
use reqwest::header::{HeaderMap, HeaderValue, LINK, LOCATION};
use serde_json::json;
use url::Url;

fn resolve(headers: HeaderMap, body: serde_json::Value) -> (Links, Vec<LinkError>) {
    let resolution = LinkResolver::with_defaults().resolve(&headers, &Body::from(body));
    (resolution.links, resolution.errors)
}

fn link_header(value: &'static str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(LINK, HeaderValue::from_static(value));
    headers
}

#[test]
fn test_header_links() {
    let (links, errors) = resolve(
        link_header(r#"</self>; rel="self", </foo>; rel="item", </bar>; rel="item""#),
        json!(null),
    );

    assert!(errors.is_empty());
    assert_eq!(links.get("self").unwrap(), ["/self"]);
    assert_eq!(links.get("item").unwrap(), ["/foo", "/bar"]);
}

#[test]
fn test_hal_skips_curies_and_null_links() {
    let (links, errors) = resolve(
        HeaderMap::new(),
        json!({
            "_links": {
                "curies": [{"name": "doc", "href": "/docs/{rel}", "templated": true}],
                "self": {"href": "/orders/1"},
                "next": null
            }
        }),
    );

    assert!(errors.is_empty());
    assert_eq!(links.rels().collect::<Vec<_>>(), ["self"]);
    assert_eq!(links.get("self").unwrap(), ["/orders/1"]);
}

#[test]
fn test_heuristic_nested_self() {
    let (links, _) = resolve(
        HeaderMap::new(),
        json!({
            "self": "/things",
            "things": [{"self": "/things/1"}, {"self": "/things/2"}]
        }),
    );

    assert_eq!(links.get("self").unwrap(), ["/things"]);
    assert_eq!(links.get("things-item").unwrap(), ["/things/1", "/things/2"]);
}

#[test]
fn test_siren() {
    let (links, errors) = resolve(
        HeaderMap::new(),
        json!({
            "properties": {"id": 42},
            "links": [
                {"rel": ["self"], "href": "/orders/42"},
                {"rel": ["next", "related"], "href": "/orders/43"}
            ]
        }),
    );

    assert!(errors.is_empty());
    assert_eq!(links.get("self").unwrap(), ["/orders/42"]);
    assert_eq!(links.get("next").unwrap(), ["/orders/43"]);
    assert_eq!(links.get("related").unwrap(), ["/orders/43"]);
}

#[test]
fn test_json_api() {
    let (links, errors) = resolve(
        HeaderMap::new(),
        json!({
            "links": {"self": "/articles"},
            "data": [
                {"id": "1", "links": {"self": "/articles/1"}},
                {"id": "2", "links": {"self": {"href": "/articles/2"}}}
            ]
        }),
    );

    assert!(errors.is_empty());
    assert_eq!(links.first("self"), Some("/articles"));
    assert_eq!(links.get("item").unwrap(), ["/articles/1", "/articles/2"]);
}

#[test]
fn test_strategies_contribute_in_order() {
    let (links, _) = resolve(
        link_header(r#"</from-header>; rel="self""#),
        json!({"_links": {"self": {"href": "/from-hal"}}}),
    );

    assert_eq!(links.get("self").unwrap(), ["/from-header", "/from-hal"]);
}

#[test]
fn test_malformed_header_keeps_body_links() {
    let (links, errors) = resolve(link_header("no brackets here"), json!({"self": "/x"}));

    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].strategy, "link-header");
    assert_eq!(links.first("self"), Some("/x"));
}

#[test]
fn test_yaml_body_with_integer_keys() {
    let yaml: serde_yaml::Value = serde_yaml::from_str("self: /root\n200:\n  self: /ok\n").unwrap();
    let resolution = LinkResolver::new().with(HeuristicStrategy).resolve(&HeaderMap::new(), &Body::from(yaml));

    assert_eq!(resolution.links.first("self"), Some("/root"));
    assert_eq!(resolution.links.first("200"), Some("/ok"));
}

struct LocationStrategy;

impl LinkStrategy for LocationStrategy {
    fn name(&self) -> &'static str {
        "location"
    }

    fn extract(&self, headers: &HeaderMap, _body: &Body) -> Result<Links, LinkError> {
        let mut links = Links::new();
        if let Some(value) = headers.get(LOCATION) {
            let uri = value
                .to_str()
                .map_err(|_| LinkError::new(self.name(), "header is not valid text"))?;
            links.add("created", uri);
        }
        Ok(links)
    }
}

#[test]
fn test_custom_strategy() {
    let resolver = LinkResolver::with_defaults().with(LocationStrategy);
    assert_eq!(
        resolver.strategy_names(),
        ["link-header", "hal", "heuristic", "siren", "json-api", "location"]
    );

    let mut headers = HeaderMap::new();
    headers.insert(LOCATION, HeaderValue::from_static("/widgets/7"));
    let mut response = Response::new(201, headers, Body::Null);

    let base = Url::parse("https://api.example.com/widgets").unwrap();
    let errors = response.parse_links(&resolver, Some(&base));

    assert!(errors.is_empty());
    assert_eq!(response.link("created"), Some("https://api.example.com/widgets/7"));
}

#[test]
fn test_resolve_against_keeps_absolute_uris() {
    let mut links = Links::new();
    links.add("next", "?page=2");
    links.add("other", "https://elsewhere.example.com/x");

    let base = Url::parse("https://api.example.com/items?page=1").unwrap();
    let resolved = links.resolve_against(&base);

    assert_eq!(resolved.first("next"), Some("https://api.example.com/items?page=2"));
    assert_eq!(resolved.first("other"), Some("https://elsewhere.example.com/x"));
}
