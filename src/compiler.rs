use crate::apiconfig::ApiAuth;
use crate::error::SpecError;
use crate::fetch::DocumentFetcher;
use crate::format::{parse_document, Format};
use crate::naming::{kebab, slug};
use crate::operation::{Api, AutoConfig, AutoConfigVar, Operation, Param, ParamStyle};
use crate::refs::resolve_document;
use crate::schema::{gen_example, render_schema, SchemaMode};
use crate::shorthand::to_shorthand;
use serde::Deserialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, warn};
use url::{Position, Url};

/// Change the CLI name of an operation or parameter
pub const EXT_NAME: &str = "x-cli-name";
/// Additional command aliases for an operation
pub const EXT_ALIASES: &str = "x-cli-aliases";
/// Change the description of an operation, parameter or response
pub const EXT_DESCRIPTION: &str = "x-cli-description";
/// Leave a path, operation or parameter out entirely
pub const EXT_IGNORE: &str = "x-cli-ignore";
/// Compile an operation but keep it out of listings
pub const EXT_HIDDEN: &str = "x-cli-hidden";
/// Document-level auto-configuration block
pub const EXT_CLI_CONFIG: &str = "x-cli-config";

/// Where to look for a description when an API lists no spec files
pub const LOCATION_HINTS: [&str; 4] = ["/openapi.json", "/openapi.yaml", "openapi.json", "openapi.yaml"];

const METHODS: [&str; 8] = ["get", "put", "post", "delete", "options", "head", "patch", "trace"];

/// Shorthand examples at or above this length are replaced by a file placeholder
const SHORTHAND_LIMIT: usize = 150;
const INPUT_PLACEHOLDER: &str = "<input.json";

/// Content hash of a response schema; all zeroes means no body or no schema
pub type ResponseKey = [u8; 32];
const NO_SCHEMA: ResponseKey = [0; 32];

/// Loads API descriptions and compiles them into [`Api`] models
pub struct SpecCompiler<'a> {
    fetcher: &'a dyn DocumentFetcher,
}

impl<'a> SpecCompiler<'a> {
    pub fn new(fetcher: &'a dyn DocumentFetcher) -> Self {
        SpecCompiler { fetcher }
    }

    /// Fetch and decode a document, then inline its references
    pub fn load(&self, location: &str) -> Result<Value, SpecError> {
        let data = self.fetcher.fetch(location)?;
        let document = parse_document(&data, Format::from_location(location)).map_err(|message| {
            SpecError::Parse {
                location: location.to_string(),
                message,
            }
        })?;

        check_version(&document, location)?;
        resolve_document(document, location, self.fetcher)
    }

    /// Load the document at `location` and compile it against `base`
    pub fn compile(&self, location: &str, base: &Url) -> Result<Api, SpecError> {
        let document = self.load(location)?;
        debug!(location, base = %base, "compiling API description");
        compile_document(&document, base)
    }
}

/// Require an `openapi: 3.x` marker
pub fn check_version(document: &Value, location: &str) -> Result<(), SpecError> {
    let version = match document.get("openapi").or_else(|| document.get("swagger")) {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    };

    match version {
        Some(v) if document.get("openapi").is_some() && (v == "3" || v.starts_with("3.")) => Ok(()),
        version => Err(SpecError::UnsupportedDocument {
            location: location.to_string(),
            version,
        }),
    }
}

/// Apply a configured operation base on top of the API base
pub fn entry_base(base: &str, operation_base: Option<&str>) -> Result<Url, SpecError> {
    let url = Url::parse(base).map_err(|source| SpecError::InvalidUrl {
        url: base.to_string(),
        source,
    })?;

    match operation_base.filter(|o| !o.is_empty()) {
        Some(operation_base) => url.join(operation_base).map_err(|source| SpecError::InvalidUrl {
            url: operation_base.to_string(),
            source,
        }),
        None => Ok(url),
    }
}

/// Path prefix that operation paths are appended to.
///
/// Server variables expand to their defaults, or to every combination of
/// their enumerated values. The path of the first expansion on the same
/// scheme and host as `base` wins; otherwise the base's own path is used.
pub fn base_path(base: &Url, servers: &[Value]) -> Result<String, SpecError> {
    let prefix = &base[..Position::BeforePath];

    for server in servers {
        let Some(server_url) = server.get("url").and_then(Value::as_str) else {
            continue;
        };

        if server_url.starts_with('/') {
            return Ok(server_url.to_string());
        }

        let mut endpoints = vec![server_url.to_string()];
        if let Some(variables) = server.get("variables").and_then(Value::as_object) {
            for (name, variable) in variables {
                let key = format!("{{{}}}", name);
                let choices: Vec<String> = variable
                    .get("enum")
                    .and_then(Value::as_array)
                    .map(|values| values.iter().map(scalar_text).collect())
                    .unwrap_or_default();

                if choices.is_empty() {
                    let default = variable.get("default").map(scalar_text).unwrap_or_default();
                    for endpoint in endpoints.iter_mut() {
                        *endpoint = endpoint.replace(&key, &default);
                    }
                } else {
                    let key = key.as_str();
                    endpoints = choices
                        .iter()
                        .flat_map(|choice| endpoints.iter().map(move |e| e.replace(key, choice)))
                        .collect();
                }
            }
        }

        for endpoint in &endpoints {
            if endpoint.starts_with(prefix) {
                let parsed = Url::parse(endpoint).map_err(|source| SpecError::InvalidUrl {
                    url: endpoint.clone(),
                    source,
                })?;
                return Ok(parsed.path().trim_end_matches('/').to_string());
            }
        }
    }

    Ok(base.path().to_string())
}

/// Compile a resolved document into an API model
pub fn compile_document(document: &Value, base: &Url) -> Result<Api, SpecError> {
    let servers = document
        .get("servers")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[]);
    let path_prefix = base_path(base, servers)?;
    let origin = &base[..Position::BeforePath];

    let mut operations = Vec::new();
    if let Some(paths) = document.get("paths").and_then(Value::as_object) {
        for (path, item) in paths {
            if path.starts_with("x-") || ext_bool(item, EXT_IGNORE) {
                continue;
            }

            let full_path = format!("{}{}", path_prefix.trim_end_matches('/'), path);
            let uri_template = format!("{}{}", origin, full_path);

            for method in METHODS {
                let Some(op) = item.get(method).filter(|o| o.is_object()) else {
                    continue;
                };
                if ext_bool(op, EXT_IGNORE) {
                    continue;
                }
                operations.push(compile_operation(method, &uri_template, &full_path, item, op));
            }
        }
    }

    let info = document.get("info");
    let short = info
        .and_then(|i| ext_str(i, EXT_NAME).or_else(|| str_field(i, "title")))
        .unwrap_or_default();
    let long = info
        .and_then(|i| ext_str(i, EXT_DESCRIPTION).or_else(|| str_field(i, "description")))
        .unwrap_or_default();

    Ok(Api {
        short: short.to_string(),
        long: long.to_string(),
        operations,
        auth: security_schemes(document),
        auto_config: auto_config(document),
    })
}

fn compile_operation(method: &str, uri_template: &str, full_path: &str, path_item: &Value, op: &Value) -> Operation {
    let mut path_params = Vec::new();
    let mut query_params = Vec::new();
    let mut header_params = Vec::new();
    let mut path_docs = Vec::new();
    let mut option_docs = Vec::new();
    let mut header_docs = Vec::new();

    for raw in merged_params(path_item, op) {
        if ext_bool(raw, EXT_IGNORE) {
            continue;
        }
        let param = compile_param(raw);
        let schema = raw.get("schema");

        match str_field(raw, "in") {
            Some("path") => {
                path_docs.push(format!("  {}: {}", param.option_name(), param_schema(&param, schema)));
                path_params.push(param);
            }
            Some("query") => {
                option_docs.push(format!("  --{}: {}", param.option_name(), param_schema(&param, schema)));
                query_params.push(param);
            }
            Some("header") => {
                header_docs.push(format!("  --{}: {}", param.option_name(), param_schema(&param, schema)));
                header_params.push(param);
            }
            _ => {}
        }
    }
    option_docs.extend(header_docs);

    let operation_id = str_field(op, "operationId").unwrap_or_default();
    let mut aliases = ext_strings(op, EXT_ALIASES);

    let mut name = kebab(operation_id);
    if name.is_empty() {
        name = kebab(&format!("{}-{}", method, full_path.trim_matches('/')));
    }
    match ext_str(op, EXT_NAME) {
        Some(explicit) => name = explicit.to_string(),
        None => {
            let legacy = slug(operation_id);
            if !legacy.is_empty() && legacy != name {
                aliases.push(legacy);
            }
        }
    }

    let mut long = ext_str(op, EXT_DESCRIPTION)
        .or_else(|| str_field(op, "description"))
        .unwrap_or_default()
        .to_string();

    if !path_docs.is_empty() {
        long += &format!("\n## Argument Schema:\n```schema\n{{\n{}\n}}\n```\n", path_docs.join("\n"));
    }
    if !option_docs.is_empty() {
        long += &format!("\n## Option Schema:\n```schema\n{{\n{}\n}}\n```\n", option_docs.join("\n"));
    }

    let mut body_media_type = String::new();
    let mut examples = Vec::new();
    if let Some(request) = op.get("requestBody").and_then(request_info) {
        long += &example_docs(&request.examples, &mut examples);
        if let Some(schema) = request.schema {
            long += &format!(
                "\n## Request Schema ({})\n\n```schema\n{}\n```\n",
                request.media_type,
                render_schema(schema, "", SchemaMode::Write)
            );
        }
        body_media_type = request.media_type;
    }

    if let Some(responses) = op.get("responses").and_then(Value::as_object) {
        long += &response_docs(responses);
    }

    let group = op
        .get("tags")
        .and_then(Value::as_array)
        .and_then(|tags| tags.first())
        .and_then(Value::as_str)
        .unwrap_or_default();

    Operation {
        name,
        group: group.to_string(),
        aliases,
        short: str_field(op, "summary").unwrap_or_default().to_string(),
        long: format!("{}\n", long.trim_matches('\n')),
        method: method.to_ascii_uppercase(),
        uri_template: uri_template.to_string(),
        path_params,
        query_params,
        header_params,
        body_media_type,
        examples,
        hidden: ext_bool(op, EXT_HIDDEN),
        deprecated: op.get("deprecated").and_then(Value::as_bool).unwrap_or(false),
    }
}

/// Operation parameters first, then path-level ones not overridden by name
fn merged_params<'v>(path_item: &'v Value, op: &'v Value) -> Vec<&'v Value> {
    let list = |node: &'v Value| {
        node.get("parameters")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    };

    let mut seen = HashSet::new();
    let mut merged = Vec::new();
    for p in list(op) {
        seen.insert(str_field(p, "name").unwrap_or_default());
        merged.push(p);
    }
    for p in list(path_item) {
        if !seen.contains(str_field(p, "name").unwrap_or_default()) {
            merged.push(p);
        }
    }
    merged
}

fn compile_param(raw: &Value) -> Param {
    let schema = raw.get("schema");

    let mut param_type = schema.and_then(first_type).unwrap_or("string").to_string();
    if param_type == "array" {
        if let Some(item_type) = schema.and_then(|s| s.get("items")).and_then(first_type) {
            param_type = format!("array[{}]", item_type);
        }
    }

    let default = schema.and_then(|s| s.get("default")).cloned();
    let example = raw
        .get("example")
        .or_else(|| schema.and_then(|s| s.get("example")))
        .cloned()
        .or_else(|| default.clone());

    Param {
        param_type,
        name: str_field(raw, "name").unwrap_or_default().to_string(),
        display_name: ext_str(raw, EXT_NAME).map(str::to_string),
        description: ext_str(raw, EXT_DESCRIPTION)
            .or_else(|| str_field(raw, "description"))
            .unwrap_or_default()
            .to_string(),
        style: match str_field(raw, "style") {
            Some("form") => ParamStyle::Form,
            _ => ParamStyle::Simple,
        },
        explode: raw.get("explode").and_then(Value::as_bool).unwrap_or(false),
        default,
        example,
    }
}

fn param_schema(param: &Param, schema: Option<&Value>) -> String {
    match schema {
        Some(schema) => render_schema(schema, "  ", SchemaMode::Write),
        None => format!("({}): {}", param.param_type, param.description),
    }
}

struct RequestInfo<'v> {
    media_type: String,
    schema: Option<&'v Value>,
    examples: Vec<Value>,
}

/// Pick the request media type (JSON, then YAML, then the first declared)
/// and gather its examples
fn request_info(body: &Value) -> Option<RequestInfo<'_>> {
    let content = body.get("content").and_then(Value::as_object)?;

    let (media_type, media) = ["json", "yaml"]
        .iter()
        .find_map(|short| content.iter().find(|(mt, _)| mt.contains(short)))
        .or_else(|| content.iter().next())?;

    let schema = media.get("schema");
    let mut examples = Vec::new();
    if let Some(example) = media.get("example") {
        examples.push(example.clone());
    }
    if let Some(named) = media.get("examples").and_then(Value::as_object) {
        let mut named: Vec<(&String, &Value)> = named.iter().collect();
        named.sort_by(|a, b| a.0.cmp(b.0));
        examples.extend(named.into_iter().filter_map(|(_, ex)| ex.get("value").cloned()));
    }
    if examples.is_empty() {
        if let Some(schema) = schema {
            examples.push(gen_example(schema, SchemaMode::Write));
        }
    }

    Some(RequestInfo {
        media_type: media_type.clone(),
        schema,
        examples,
    })
}

/// Input example section. Small object examples are also collected as
/// shorthand into `shorthand`; anything too large is replaced by a single
/// file placeholder there.
fn example_docs(examples: &[Value], shorthand: &mut Vec<String>) -> String {
    fn placeholder(shorthand: &mut Vec<String>) {
        if !shorthand.iter().any(|e| e == INPUT_PLACEHOLDER) {
            shorthand.push(INPUT_PLACEHOLDER.to_string());
        }
    }

    let mut out = String::new();
    for example in examples {
        let content = match example {
            Value::String(s) if s == INPUT_PLACEHOLDER => continue,
            Value::String(s) => {
                let s = s.trim_matches('\n');
                if s.len() < SHORTHAND_LIMIT {
                    format!("\n```\n{}\n```\n", s)
                } else {
                    placeholder(shorthand);
                    format!("\n```\n{}\n```\n", INPUT_PLACEHOLDER)
                }
            }
            Value::Object(map) => {
                let short = to_shorthand(map);
                if short.len() < SHORTHAND_LIMIT {
                    let block = format!("\n```\n{}\n```\n", short);
                    shorthand.push(short);
                    block
                } else {
                    placeholder(shorthand);
                    format!("\n```json\n{}\n```\n", pretty(example))
                }
            }
            other => format!("\n```json\n{}\n```\n", pretty(other)),
        };

        if out.is_empty() {
            out += "\n## Input Example\n";
        }
        out += &content;
    }
    out
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

struct ResponseEntry<'v> {
    code: &'v str,
    content_type: &'v str,
    response: &'v Value,
    schema: Option<&'v Value>,
}

/// Response sections, clustering codes whose schemas hash identically
fn response_docs(responses: &Map<String, Value>) -> String {
    let mut codes: Vec<(&String, &Value)> = responses.iter().filter(|(code, _)| !code.starts_with("x-")).collect();
    codes.sort_by(|a, b| a.0.cmp(b.0));

    let mut clusters: Vec<(ResponseKey, Vec<ResponseEntry<'_>>)> = Vec::new();

    for (code, response) in codes {
        match response.get("content").and_then(Value::as_object).filter(|c| !c.is_empty()) {
            Some(content) => {
                for (content_type, media) in content {
                    let schema = media.get("schema");
                    add_entry(
                        &mut clusters,
                        schema.map(schema_hash).unwrap_or(NO_SCHEMA),
                        ResponseEntry {
                            code,
                            content_type,
                            response,
                            schema,
                        },
                    );
                }
            }
            None => add_entry(
                &mut clusters,
                NO_SCHEMA,
                ResponseEntry {
                    code,
                    content_type: "",
                    response,
                    schema: None,
                },
            ),
        }
    }

    clusters.sort_by(|a, b| a.1[0].code.cmp(b.1[0].code));

    let mut out = String::new();
    for (key, entries) in &clusters {
        let first = &entries[0];
        let has_schema = *key != NO_SCHEMA;
        let content_type = if has_schema {
            format!(" ({})", first.content_type)
        } else {
            String::new()
        };

        if entries.len() == 1 {
            out += &format!("\n## Response {}{}\n", first.code, content_type);
            let description = ext_str(first.response, EXT_DESCRIPTION)
                .or_else(|| str_field(first.response, "description"))
                .unwrap_or_default();
            if !description.is_empty() {
                out += &format!("\n{}\n", description);
            } else if !has_schema {
                out += "\nResponse has no body\n";
            }
        } else {
            let mut codes: Vec<&str> = entries.iter().map(|e| e.code).collect();
            codes.dedup();
            out += &format!("\n## Responses {}{}\n", codes.join("/"), content_type);
            if !has_schema {
                out += "\nResponse has no body\n";
            }
        }

        if let Some(headers) = first.response.get("headers").and_then(Value::as_object).filter(|h| !h.is_empty()) {
            let mut names: Vec<&str> = headers.keys().map(String::as_str).collect();
            names.sort_unstable();
            out += &format!("\nHeaders: {}\n", names.join(", "));
        }

        if let Some(schema) = first.schema.filter(|_| has_schema) {
            out += &format!("\n```schema\n{}\n```\n", render_schema(schema, "", SchemaMode::Read));
        }
    }
    out
}

fn add_entry<'v>(clusters: &mut Vec<(ResponseKey, Vec<ResponseEntry<'v>>)>, key: ResponseKey, entry: ResponseEntry<'v>) {
    match clusters.iter_mut().find(|(k, _)| *k == key) {
        Some((_, entries)) => entries.push(entry),
        None => clusters.push((key, vec![entry])),
    }
}

/// SHA-256 of the schema serialized with sorted object keys, so that
/// equal schemas hash equally whatever their key order
pub fn schema_hash(schema: &Value) -> ResponseKey {
    let mut canonical = String::new();
    write_canonical(schema, &mut canonical);

    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hasher.finalize().into()
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (key, value)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::from(key.as_str()).to_string());
                out.push(':');
                write_canonical(value, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// Map the document's security schemes to auth identifiers, by scheme name
pub fn security_schemes(document: &Value) -> Vec<ApiAuth> {
    let Some(schemes) = document.pointer("/components/securitySchemes").and_then(Value::as_object) else {
        return Vec::new();
    };

    let mut schemes: Vec<(&String, &Value)> = schemes.iter().collect();
    schemes.sort_by(|a, b| a.0.cmp(b.0));

    let mut auth = Vec::new();
    for (name, scheme) in schemes {
        match str_field(scheme, "type") {
            Some("http") if is_basic(scheme) => {
                auth.push(ApiAuth::new("http-basic", [("username", ""), ("password", "")]));
            }
            Some("oauth2") => {
                if let Some(cc) = scheme.pointer("/flows/clientCredentials") {
                    auth.push(client_credentials(cc));
                }
                if let Some(ac) = scheme.pointer("/flows/authorizationCode") {
                    auth.push(authorization_code(ac));
                }
            }
            kind => debug!(scheme = %name, kind = kind.unwrap_or("none"), "skipping unsupported security scheme"),
        }
    }
    auth
}

fn is_basic(scheme: &Value) -> bool {
    str_field(scheme, "scheme").is_some_and(|s| s.eq_ignore_ascii_case("basic"))
}

fn client_credentials(flow: &Value) -> ApiAuth {
    ApiAuth::new(
        "oauth-client-credentials",
        [
            ("client_id", ""),
            ("client_secret", ""),
            ("token_url", str_field(flow, "tokenUrl").unwrap_or_default()),
        ],
    )
}

fn authorization_code(flow: &Value) -> ApiAuth {
    ApiAuth::new(
        "oauth-authorization-code",
        [
            ("client_id", ""),
            ("authorize_url", str_field(flow, "authorizationUrl").unwrap_or_default()),
            ("token_url", str_field(flow, "tokenUrl").unwrap_or_default()),
        ],
    )
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AutoConfigExt {
    security: String,
    headers: BTreeMap<String, String>,
    prompt: BTreeMap<String, AutoConfigVar>,
    params: BTreeMap<String, String>,
}

/// Compile the `x-cli-config` block, if any.
///
/// Auth params derived from the referenced scheme are overridden by the
/// block's explicit params. Authorization code is preferred over client
/// credentials when a scheme declares both flows.
pub fn auto_config(document: &Value) -> Option<AutoConfig> {
    let raw = document.get(EXT_CLI_CONFIG)?;
    let ext: AutoConfigExt = match serde_json::from_value(raw.clone()) {
        Ok(ext) => ext,
        Err(e) => {
            warn!(error = %e, "unable to decode {}", EXT_CLI_CONFIG);
            return None;
        }
    };

    let mut auth = ApiAuth::new(ext.security.clone(), std::iter::empty::<(String, String)>());
    let scheme = document
        .pointer("/components/securitySchemes")
        .and_then(|schemes| schemes.get(ext.security.as_str()));

    if let Some(scheme) = scheme {
        match str_field(scheme, "type") {
            Some("http") if is_basic(scheme) => auth.name = "http-basic".to_string(),
            Some("oauth2") => {
                if let Some(ac) = scheme.pointer("/flows/authorizationCode") {
                    auth = authorization_code(ac);
                } else if let Some(cc) = scheme.pointer("/flows/clientCredentials") {
                    auth = client_credentials(cc);
                }
            }
            _ => {}
        }
    }

    auth.params.extend(ext.params);

    Some(AutoConfig {
        headers: ext.headers,
        prompt: ext.prompt,
        auth,
    })
}

fn str_field<'v>(node: &'v Value, key: &str) -> Option<&'v str> {
    node.get(key).and_then(Value::as_str)
}

fn ext_str<'v>(node: &'v Value, key: &str) -> Option<&'v str> {
    str_field(node, key).filter(|s| !s.is_empty())
}

fn ext_bool(node: &Value, key: &str) -> bool {
    node.get(key).and_then(Value::as_bool).unwrap_or(false)
}

fn ext_strings(node: &Value, key: &str) -> Vec<String> {
    node.get(key)
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default()
}

/// First declared type; 3.1 documents may list several
fn first_type(schema: &Value) -> Option<&str> {
    match schema.get("type")? {
        Value::String(t) => Some(t.as_str()),
        Value::Array(types) => types.first().and_then(Value::as_str),
        _ => None,
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
