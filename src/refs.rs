use crate::error::SpecError;
use crate::fetch::{join_location, DocumentFetcher};
use crate::format::{parse_document, Format};
use percent_encoding::percent_decode_str;
use serde_json::{Map, Value};
use std::borrow::Cow;
use std::collections::HashMap;

const REF_KEY: &str = "$ref";

/// Inline every reference of `document`, which was loaded from `location`.
///
/// References into other documents are fetched relative to the document
/// that contains them and inlined first; in-document pointers are then
/// dereferenced by `openapi_deref`, which also leaves recursive schemas
/// finite. All unresolvable references are reported together in one error.
pub fn resolve_document(
    document: Value,
    location: &str,
    fetcher: &dyn DocumentFetcher,
) -> Result<Value, SpecError> {
    let mut resolver = RefResolver::new(fetcher);
    let resolved = resolver.resolve(document, location);

    if resolver.errors.is_empty() {
        Ok(resolved)
    } else {
        Err(SpecError::Resolution {
            location: location.to_string(),
            errors: resolver.errors,
        })
    }
}

struct RefResolver<'a> {
    fetcher: &'a dyn DocumentFetcher,
    /// Fully resolved external documents by location
    documents: HashMap<String, Value>,
    /// Documents currently being resolved
    loading: Vec<String>,
    errors: Vec<String>,
}

fn decode_pointer(pointer: &str) -> Result<Cow<'_, str>, String> {
    percent_decode_str(pointer)
        .decode_utf8()
        .map_err(|e| format!("invalid pointer {}: {}", pointer, e))
}

impl<'a> RefResolver<'a> {
    fn new(fetcher: &'a dyn DocumentFetcher) -> Self {
        RefResolver {
            fetcher,
            documents: HashMap::new(),
            loading: Vec::new(),
            errors: Vec::new(),
        }
    }

    fn resolve(&mut self, document: Value, location: &str) -> Value {
        let failed_before = self.errors.len();
        let source = document.clone();

        self.loading.push(location.to_string());
        let inlined = self.inline(document, &source, location);
        self.loading.pop();

        if self.errors.len() > failed_before {
            return inlined;
        }

        match openapi_deref::resolve(&inlined) {
            Ok(resolved) => resolved.value,
            Err(e) => {
                self.errors.push(format!("unable to dereference {}: {:?}", location, e));
                inlined
            }
        }
    }

    /// Inline external references and check local ones against `source`
    fn inline(&mut self, value: Value, source: &Value, location: &str) -> Value {
        match value {
            Value::Object(map) => {
                let reference = match map.get(REF_KEY) {
                    Some(Value::String(reference)) => Some(reference.clone()),
                    _ => None,
                };
                match reference {
                    Some(reference) => self.inline_ref(map, &reference, source, location),
                    None => Value::Object(self.inline_members(map, source, location)),
                }
            }
            Value::Array(items) => Value::Array(
                items
                    .into_iter()
                    .map(|item| self.inline(item, source, location))
                    .collect(),
            ),
            other => other,
        }
    }

    fn inline_members(&mut self, map: Map<String, Value>, source: &Value, location: &str) -> Map<String, Value> {
        map.into_iter()
            .map(|(k, v)| {
                let v = if k == REF_KEY { v } else { self.inline(v, source, location) };
                (k, v)
            })
            .collect()
    }

    fn inline_ref(&mut self, mut node: Map<String, Value>, reference: &str, source: &Value, location: &str) -> Value {
        let (doc_part, pointer) = reference.split_once('#').unwrap_or((reference, ""));

        if doc_part.is_empty() {
            match decode_pointer(pointer) {
                Ok(decoded) if source.pointer(&decoded).is_some() => {
                    // Hand plain pointers to the dereferencer
                    if decoded != pointer {
                        node.insert(REF_KEY.to_string(), Value::String(format!("#{}", decoded)));
                    }
                }
                Ok(decoded) => self.errors.push(format!(
                    "unable to resolve {} in {}: {} not found",
                    reference,
                    location,
                    if decoded.is_empty() { "document root" } else { &*decoded }
                )),
                Err(message) => self
                    .errors
                    .push(format!("unable to resolve {} in {}: {}", reference, location, message)),
            }
            return Value::Object(self.inline_members(node, source, location));
        }

        let Some(target) = self.external(reference, doc_part, pointer, location) else {
            return Value::Object(node);
        };

        // Keys next to `$ref` override the referenced ones
        node.remove(REF_KEY);
        match target {
            Value::Object(mut target) if !node.is_empty() => {
                target.extend(self.inline_members(node, source, location));
                Value::Object(target)
            }
            other => other,
        }
    }

    /// Target of a reference into another document, resolved on first use.
    /// A document that refers back to one still being resolved is left alone.
    fn external(&mut self, reference: &str, doc_part: &str, pointer: &str, location: &str) -> Option<Value> {
        let fail = |message: String| format!("unable to resolve {} in {}: {}", reference, location, message);

        let target_location = match join_location(location, doc_part) {
            Ok(joined) => joined,
            Err(e) => {
                self.errors.push(fail(e.to_string()));
                return None;
            }
        };
        if self.loading.contains(&target_location) {
            return None;
        }

        if !self.documents.contains_key(&target_location) {
            let document = match self.load(&target_location) {
                Ok(document) => document,
                Err(message) => {
                    self.errors.push(fail(message));
                    return None;
                }
            };
            let resolved = self.resolve(document, &target_location);
            self.documents.insert(target_location.clone(), resolved);
        }

        let decoded = match decode_pointer(pointer) {
            Ok(decoded) => decoded,
            Err(message) => {
                self.errors.push(fail(message));
                return None;
            }
        };
        let target = self
            .documents
            .get(&target_location)
            .and_then(|document| document.pointer(&decoded))
            .cloned();
        if target.is_none() {
            self.errors
                .push(fail(format!("{} not found in {}", decoded, target_location)));
        }
        target
    }

    fn load(&self, location: &str) -> Result<Value, String> {
        let data = self.fetcher.fetch(location).map_err(|e| e.to_string())?;
        parse_document(&data, Format::from_location(location))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct MapFetcher(HashMap<&'static str, &'static str>);

    impl DocumentFetcher for MapFetcher {
        fn fetch(&self, location: &str) -> Result<Vec<u8>, SpecError> {
            self.0
                .get(location)
                .map(|s| s.as_bytes().to_vec())
                .ok_or_else(|| SpecError::Fetch {
                    location: location.to_string(),
                    source: "not found".into(),
                })
        }
    }

    fn no_docs() -> MapFetcher {
        MapFetcher(HashMap::new())
    }

    #[test]
    fn test_local_pointer() {
        let doc = json!({
            "paths": {"/pets": {"get": {"responses": {"200": {"$ref": "#/components/responses/Ok"}}}}},
            "components": {"responses": {"Ok": {"description": "fine"}}}
        });

        let resolved = resolve_document(doc, "/api.json", &no_docs()).unwrap();
        assert_eq!(
            resolved.pointer("/paths/~1pets/get/responses/200/description"),
            Some(&json!("fine"))
        );
    }

    #[test]
    fn test_escaped_pointer() {
        let doc = json!({
            "a": {"$ref": "#/paths/~1pets%7Bid%7D"},
            "paths": {"/pets{id}": {"x": 1}}
        });

        let resolved = resolve_document(doc, "/api.json", &no_docs()).unwrap();
        assert_eq!(resolved["a"], json!({"x": 1}));
    }

    #[test]
    fn test_recursive_schema_stays_finite() {
        let doc = json!({
            "defs": {"node": {
                "type": "object",
                "properties": {"child": {"$ref": "#/defs/node"}}
            }},
            "root": {"$ref": "#/defs/node"}
        });

        let resolved = resolve_document(doc, "/api.json", &no_docs()).unwrap();
        assert_eq!(resolved.pointer("/root/type"), Some(&json!("object")));
        assert!(resolved.pointer("/root/properties/child").is_some());
    }

    #[test]
    fn test_external_document() {
        let fetcher = MapFetcher(HashMap::from([(
            "/specs/schemas/pet.yaml",
            "Pet:\n  type: object\n  properties:\n    tag:\n      $ref: '#/Tag'\nTag:\n  type: string\n",
        )]));
        let doc = json!({"schema": {"$ref": "schemas/pet.yaml#/Pet"}});

        let resolved = resolve_document(doc, "/specs/openapi.json", &fetcher).unwrap();
        assert_eq!(
            resolved.pointer("/schema/properties/tag/type"),
            Some(&json!("string"))
        );
    }

    #[test]
    fn test_external_sibling_keys_override() {
        let fetcher = MapFetcher(HashMap::from([(
            "/specs/common.json",
            r#"{"Thing": {"type": "string", "description": "shared"}}"#,
        )]));
        let doc = json!({"a": {"$ref": "common.json#/Thing", "description": "local"}});

        let resolved = resolve_document(doc, "/specs/openapi.json", &fetcher).unwrap();
        assert_eq!(resolved["a"], json!({"type": "string", "description": "local"}));
    }

    #[test]
    fn test_external_document_shared_by_references() {
        let fetcher = MapFetcher(HashMap::from([(
            "/specs/common.json",
            r#"{"A": {"type": "string"}, "B": {"type": "integer"}}"#,
        )]));
        let doc = json!({
            "a": {"$ref": "common.json#/A"},
            "b": {"$ref": "common.json#/B"}
        });

        let resolved = resolve_document(doc, "/specs/openapi.json", &fetcher).unwrap();
        assert_eq!(resolved["a"]["type"], "string");
        assert_eq!(resolved["b"]["type"], "integer");
    }

    #[test]
    fn test_errors_are_collected() {
        let doc = json!({
            "a": {"$ref": "#/missing/one"},
            "b": {"$ref": "#/missing/two"},
            "c": {"$ref": "other.json#/x"}
        });

        let err = resolve_document(doc, "/api.json", &no_docs()).unwrap_err();
        match err {
            SpecError::Resolution { location, errors } => {
                assert_eq!(location, "/api.json");
                assert_eq!(errors.len(), 3);
                assert!(errors[0].contains("#/missing/one"));
                assert!(errors[2].contains("other.json#/x"));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }
}
