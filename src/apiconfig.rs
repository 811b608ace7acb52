use crate::error::ConfigError;
use crate::settings::DEFAULT_PROFILE;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Auth scheme identifier plus its parameters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiAuth {
    pub name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, String>,
}

impl ApiAuth {
    /// Create an auth entry with the given parameters
    pub fn new<I, K, V>(name: impl Into<String>, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        ApiAuth {
            name: name.into(),
            params: params.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }

    /// Merge a later layer: the name is replaced, params merge key by key
    pub fn merge(&mut self, source: ApiAuth) {
        self.name = source.name;
        merge_map(&mut self.params, source.params);
    }
}

/// Client certificate held on a PKCS#11 device
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pkcs11Config {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub path: String,
    #[serde(default)]
    pub label: String,
}

/// TLS setup for the HTTP client
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlsConfig {
    #[serde(rename = "insecure", default, skip_serializing_if = "is_false")]
    pub insecure_skip_verify: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cert: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_cert: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pkcs11: Option<Pkcs11Config>,
}

/// Account- or environment-specific variant of an API
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub query: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<ApiAuth>,
}

/// Configuration of one registered API
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Registry key; not serialized, the key of the enclosing map carries it
    #[serde(skip)]
    pub name: String,
    #[serde(default)]
    pub base: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_base: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub spec_files: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub profiles: BTreeMap<String, ApiProfile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<TlsConfig>,
}

fn is_false(v: &bool) -> bool {
    !*v
}

fn merge_map(dest: &mut BTreeMap<String, String>, source: BTreeMap<String, String>) {
    dest.extend(source);
}

fn merge_string(dest: &mut Option<String>, source: Option<String>) {
    if let Some(v) = source.filter(|v| !v.is_empty()) {
        *dest = Some(v);
    }
}

impl Pkcs11Config {
    pub fn merge(&mut self, source: Pkcs11Config) {
        if !source.path.is_empty() {
            self.path = source.path;
        }
        if !source.label.is_empty() {
            self.label = source.label;
        }
    }
}

impl TlsConfig {
    /// Merge a later layer; `insecure` can only be switched on
    pub fn merge(&mut self, source: TlsConfig) {
        self.insecure_skip_verify |= source.insecure_skip_verify;
        merge_string(&mut self.cert, source.cert);
        merge_string(&mut self.key, source.key);
        merge_string(&mut self.ca_cert, source.ca_cert);
        if let Some(pkcs11) = source.pkcs11 {
            self.pkcs11.get_or_insert_with(Pkcs11Config::default).merge(pkcs11);
        }
    }
}

impl ApiProfile {
    /// Merge a later layer into this profile
    pub fn merge(&mut self, source: ApiProfile) {
        merge_string(&mut self.base, source.base);
        merge_map(&mut self.headers, source.headers);
        merge_map(&mut self.query, source.query);
        if let Some(auth) = source.auth {
            self.auth.get_or_insert_with(ApiAuth::default).merge(auth);
        }
    }
}

impl ApiConfig {
    /// Create a config with only a base URI
    pub fn new(name: impl Into<String>, base: impl Into<String>) -> Self {
        ApiConfig {
            name: name.into(),
            base: base.into(),
            ..Default::default()
        }
    }

    /// Deep-merge a later (closer) layer into this config.
    ///
    /// Scalars are replaced when set in `source`, spec files are appended
    /// without duplicates, and profiles and TLS settings merge recursively.
    pub fn merge(&mut self, source: ApiConfig) {
        if !source.base.is_empty() {
            self.base = source.base;
        }
        merge_string(&mut self.operation_base, source.operation_base);

        for spec in source.spec_files {
            if !self.spec_files.contains(&spec) {
                self.spec_files.push(spec);
            }
        }

        for (name, profile) in source.profiles {
            self.profiles.entry(name).or_default().merge(profile);
        }

        if let Some(tls) = source.tls {
            self.tls.get_or_insert_with(TlsConfig::default).merge(tls);
        }
    }

    /// Get a declared profile
    pub fn profile(&self, name: &str) -> Option<&ApiProfile> {
        self.profiles.get(name)
    }

    /// Base URI in effect for the given profile
    pub fn effective_base(&self, profile: &str) -> &str {
        self.profile(profile)
            .and_then(|p| p.base.as_deref())
            .filter(|b| !b.is_empty())
            .unwrap_or(&self.base)
    }

    /// Check that `profile` can be used with this API.
    /// The default profile is always valid, even when undeclared.
    pub fn validate_profile(&self, profile: &str) -> Result<(), ConfigError> {
        if profile == DEFAULT_PROFILE || self.profiles.contains_key(profile) {
            return Ok(());
        }

        Err(ConfigError::UnknownProfile {
            profile: profile.to_string(),
            api: self.name.clone(),
            // BTreeMap keys are already sorted
            available: self.profiles.keys().cloned().collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_headers(base: &str, headers: &[(&str, &str)]) -> ApiConfig {
        let mut config = ApiConfig::new("foo", base);
        let profile = ApiProfile {
            headers: headers.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            ..Default::default()
        };
        config.profiles.insert(DEFAULT_PROFILE.to_string(), profile);
        config
    }

    #[test]
    fn test_merge_headers_and_base() {
        let mut global = with_headers("https://global.example.com", &[("a", "1")]);
        global.spec_files = vec!["/specs/a.yaml".to_string()];

        let mut local = with_headers("https://local.example.com", &[("b", "2")]);
        local.spec_files = vec!["/specs/a.yaml".to_string(), "/specs/b.yaml".to_string()];

        global.merge(local);

        assert_eq!(global.base, "https://local.example.com");
        let headers = &global.profiles[DEFAULT_PROFILE].headers;
        assert_eq!(headers.get("a").map(String::as_str), Some("1"));
        assert_eq!(headers.get("b").map(String::as_str), Some("2"));
        assert_eq!(global.spec_files, vec!["/specs/a.yaml", "/specs/b.yaml"]);
    }

    #[test]
    fn test_merge_keeps_unset_scalars() {
        let mut dest = ApiConfig::new("foo", "https://api.example.com");
        dest.operation_base = Some("/v1".to_string());

        dest.merge(ApiConfig::default());

        assert_eq!(dest.base, "https://api.example.com");
        assert_eq!(dest.operation_base.as_deref(), Some("/v1"));
    }

    #[test]
    fn test_merge_auth_params() {
        let mut dest = ApiProfile {
            auth: Some(ApiAuth::new("oauth-client-credentials", [("client_id", "abc"), ("token_url", "/t")])),
            ..Default::default()
        };
        dest.merge(ApiProfile {
            auth: Some(ApiAuth::new("oauth-client-credentials", [("client_secret", "s3cr3t")])),
            ..Default::default()
        });

        let auth = dest.auth.unwrap();
        assert_eq!(auth.params.len(), 3);
        assert_eq!(auth.params["client_id"], "abc");
        assert_eq!(auth.params["client_secret"], "s3cr3t");
    }

    #[test]
    fn test_merge_tls() {
        let mut dest = ApiConfig::new("foo", "https://a");
        dest.tls = Some(TlsConfig {
            insecure_skip_verify: true,
            cert: Some("a.pem".to_string()),
            ..Default::default()
        });

        let mut source = ApiConfig::default();
        source.tls = Some(TlsConfig {
            key: Some("a.key".to_string()),
            pkcs11: Some(Pkcs11Config {
                path: String::new(),
                label: "yubikey".to_string(),
            }),
            ..Default::default()
        });
        dest.merge(source);

        let tls = dest.tls.unwrap();
        assert!(tls.insecure_skip_verify);
        assert_eq!(tls.cert.as_deref(), Some("a.pem"));
        assert_eq!(tls.key.as_deref(), Some("a.key"));
        assert_eq!(tls.pkcs11.unwrap().label, "yubikey");
    }

    #[test]
    fn test_effective_base() {
        let mut config = ApiConfig::new("foo", "https://prod.example.com");
        config.profiles.insert(
            "staging".to_string(),
            ApiProfile {
                base: Some("https://staging.example.com".to_string()),
                ..Default::default()
            },
        );
        config.profiles.insert("other".to_string(), ApiProfile::default());

        assert_eq!(config.effective_base("staging"), "https://staging.example.com");
        assert_eq!(config.effective_base("other"), "https://prod.example.com");
        assert_eq!(config.effective_base(DEFAULT_PROFILE), "https://prod.example.com");
    }

    #[test]
    fn test_validate_profile() {
        let mut config = ApiConfig::new("foo", "https://a");
        config.profiles.insert("prod".to_string(), ApiProfile::default());

        assert!(config.validate_profile(DEFAULT_PROFILE).is_ok());
        assert!(config.validate_profile("prod").is_ok());

        let err = config.validate_profile("staging").unwrap_err();
        assert!(err.to_string().contains("prod"));
        assert!(err.to_string().contains("foo"));
    }

    #[test]
    fn test_serialization_skips_empty_fields() {
        let config = ApiConfig::new("foo", "https://api.example.com");
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(json, r#"{"base":"https://api.example.com"}"#);
    }

    #[test]
    fn test_tls_insecure_key() {
        let tls: TlsConfig = serde_json::from_str(r#"{"insecure": true, "ca_cert": "ca.pem"}"#).unwrap();
        assert!(tls.insecure_skip_verify);
        assert_eq!(tls.ca_cert.as_deref(), Some("ca.pem"));
    }
}
