use apinav::{ConfigError, ConfigStore, DocumentFetcher, Error, FsFetcher, Registry, Settings, SpecError};
use serde_json::json;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const WIDGETS: &str = "\
openapi: 3.0.3
info:
  title: Widgets
  description: Widget service
paths:
  /widgets:
    get:
      operationId: listWidgets
      summary: List widgets
      responses:
        '200':
          description: ok
";

const GADGETS: &str = r#"{
  "openapi": "3.0.0",
  "info": {"title": "Gadgets"},
  "paths": {
    "/gadgets": {
      "get": {"operationId": "listGadgets", "responses": {"204": {"description": "empty"}}}
    }
  }
}"#;

/// Scratch config with two APIs; `widgets` has a staging profile and two spec files
fn setup() -> (TempDir, Settings) {
    let tmp = TempDir::new().unwrap();
    let spec = |name: &str, content: &str| {
        let path = tmp.path().join(name);
        fs::write(&path, content).unwrap();
        path.to_string_lossy().into_owned()
    };
    let widgets = spec("widgets.yaml", WIDGETS);
    let gadgets = spec("gadgets.json", GADGETS);

    let config = json!({
        "widgets": {
            "base": "https://api.example.com",
            "spec_files": [widgets, gadgets],
            "profiles": {"staging": {"base": "https://staging.example.com"}}
        },
        "other": {
            "base": "https://other.example.com",
            "spec_files": [tmp.path().join("missing.json").to_string_lossy()]
        }
    });
    write(&tmp.path().join("config/apis.json"), &config.to_string());

    let work = tmp.path().join("work");
    fs::create_dir_all(&work).unwrap();
    let settings = Settings::new("apinav")
        .with_config_dir(tmp.path().join("config"))
        .with_working_dir(work);
    (tmp, settings)
}

fn write(path: &Path, content: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn registry(settings: Settings) -> Registry {
    let store = ConfigStore::load(&settings).unwrap();
    Registry::with_parts(settings, store, Box::new(FsFetcher))
}

#[test]
fn test_compiles_on_first_use() {
    let (_tmp, settings) = setup();
    let mut registry = registry(settings);

    assert!(!registry.is_compiled("widgets"));
    let api = registry.api("widgets").unwrap();

    assert_eq!(api.short, "Widgets");
    assert_eq!(api.long, "Widget service");
    let names: Vec<&str> = api.operations.iter().map(|op| op.name.as_str()).collect();
    assert_eq!(names, ["list-widgets", "list-gadgets"]);
    assert_eq!(api.operations[1].uri_template, "https://api.example.com/gadgets");

    assert!(registry.is_compiled("widgets"));
    registry.invalidate("widgets");
    assert!(!registry.is_compiled("widgets"));
}

#[test]
fn test_profile_base() {
    let (_tmp, settings) = setup();
    let mut registry = registry(settings.with_profile("staging"));

    let api = registry.api("widgets").unwrap();
    assert_eq!(api.operations[0].uri_template, "https://staging.example.com/widgets");
}

#[test]
fn test_lookup_errors() {
    let (_tmp, settings) = setup();
    let mut registry = registry(settings.clone());

    let err = registry.api("nope").unwrap_err();
    assert!(err.is_lookup());
    assert!(err.to_string().contains("other, widgets"), "{}", err);

    let mut registry = self::registry(settings.with_profile("prod"));
    let err = registry.api("widgets").unwrap_err();
    assert!(err.is_lookup());
    assert!(matches!(err, Error::Config(ConfigError::UnknownProfile { .. })));
    assert!(!registry.is_compiled("widgets"));
}

#[test]
fn test_fetch_failure_is_not_a_lookup_error() {
    let (_tmp, settings) = setup();
    let mut registry = registry(settings);

    let err = registry.api("other").unwrap_err();
    assert!(!err.is_lookup());
    assert!(err.to_string().contains("missing.json"), "{}", err);
}

#[test]
fn test_find_and_api_for() {
    let (_tmp, settings) = setup();

    let mut registry = registry(settings.clone());
    assert_eq!(registry.find("https://other.example.com/x").unwrap().name, "other");
    assert!(registry.find("https://unknown.example.com/").is_none());

    let api = registry.api_for("https://api.example.com/widgets").unwrap().unwrap();
    assert_eq!(api.operations.len(), 2);
    assert!(registry.api_for("https://unknown.example.com/").unwrap().is_none());

    // The API filter excludes every other API
    let registry = self::registry(settings.with_api_name("widgets"));
    assert!(registry.find("https://other.example.com/x").is_none());
    assert!(registry.find("https://api.example.com/widgets").is_some());
}

#[test]
fn test_no_spec_files_and_nothing_discoverable() {
    let (tmp, settings) = setup();
    write(
        &tmp.path().join("work/.apinav.json"),
        r#"{"bare": {"base": "https://bare.invalid"}}"#,
    );
    let mut registry = registry(settings);

    let err = registry.api("bare").unwrap_err();
    assert!(err.to_string().contains("no API description found for 'bare'"), "{}", err);
}

/// Serves documents from memory; everything else is a fetch failure
struct MemoryFetcher(HashMap<&'static str, &'static str>);

impl DocumentFetcher for MemoryFetcher {
    fn fetch(&self, location: &str) -> Result<Vec<u8>, SpecError> {
        self.0
            .get(location)
            .map(|doc| doc.as_bytes().to_vec())
            .ok_or_else(|| SpecError::Fetch {
                location: location.to_string(),
                source: "no such document".into(),
            })
    }
}

fn discovering_registry(documents: HashMap<&'static str, &'static str>) -> (TempDir, Registry) {
    let (tmp, settings) = setup();
    write(
        &tmp.path().join("work/.apinav.json"),
        r#"{"svc": {"base": "https://svc.example.com"}}"#,
    );
    let store = ConfigStore::load(&settings).unwrap();
    let registry = Registry::with_parts(settings, store, Box::new(MemoryFetcher(documents)));
    (tmp, registry)
}

#[test]
fn test_discovery_tries_next_location_when_not_found() {
    let (_tmp, mut registry) = discovering_registry(HashMap::from([(
        "https://svc.example.com/openapi.yaml",
        "openapi: 3.0.3\ninfo:\n  title: Svc\npaths:\n  /ping:\n    get:\n      operationId: ping\n      responses:\n        '204':\n          description: pong\n",
    )]));

    let api = registry.api("svc").unwrap();
    assert_eq!(api.short, "Svc");
    assert_eq!(api.operations[0].name, "ping");
}

#[test]
fn test_discovered_document_errors_are_reported() {
    let (_tmp, mut registry) = discovering_registry(HashMap::from([(
        "https://svc.example.com/openapi.json",
        r##"{
            "openapi": "3.0.3",
            "paths": {"/ping": {"get": {"responses": {"200": {"$ref": "#/components/responses/Missing"}}}}}
        }"##,
    )]));

    let err = registry.api("svc").unwrap_err();
    let text = err.to_string();
    assert!(matches!(err, Error::Spec(SpecError::Resolution { .. })), "{}", text);
    assert!(text.contains("https://svc.example.com/openapi.json"), "{}", text);
    assert!(text.contains("#/components/responses/Missing"), "{}", text);
    assert!(!registry.is_compiled("svc"));
}

#[test]
fn test_discovered_unsupported_document_is_reported() {
    let (_tmp, mut registry) = discovering_registry(HashMap::from([(
        "https://svc.example.com/openapi.json",
        r#"{"swagger": "2.0", "paths": {}}"#,
    )]));

    let err = registry.api("svc").unwrap_err();
    assert!(matches!(err, Error::Spec(SpecError::UnsupportedDocument { .. })), "{}", err);
}
