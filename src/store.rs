use crate::apiconfig::ApiConfig;
use crate::error::ConfigError;
use crate::format::{parse_document, render_document, Format};
use crate::settings::{Settings, DEFAULT_PROFILE};
use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Reserved key pointing at the JSON schema of the file; never an API
pub const SCHEMA_KEY: &str = "$schema";

/// Schema marker written into a newly created global registry
pub const GLOBAL_SCHEMA: &str = "https://rest.sh/schemas/apis.json";

/// Where a configuration gets written back to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveTarget {
    Global,
    Local(PathBuf),
}

/// Interactive choice of a save target among several local sources
pub trait SaveTargetPrompt {
    /// Pick one of `candidates` (root-first order) or the global registry
    fn choose(&self, api: &str, candidates: &[PathBuf]) -> SaveTarget;
}

/// How to pick a save target when more than one local file contributed
#[derive(Clone, Copy)]
pub enum SavePolicy<'a> {
    /// Always the file closest to the working directory
    MostLocal,
    /// Ask the prompt
    Ask(&'a dyn SaveTargetPrompt),
}

/// Registry of named API configurations
#[derive(Debug, Clone)]
pub struct ConfigStore {
    global_path: PathBuf,
    apis: IndexMap<String, ApiConfig>,
    /// Local files that contributed to each API, root first
    sources: HashMap<String, Vec<PathBuf>>,
}

/// Find local config files from `start` up to the filesystem root.
///
/// At most one file per directory is taken, the first of `names` that
/// exists. The result is ordered root first so closer files merge last.
pub fn discover_local_configs(start: &Path, names: &[String]) -> Vec<PathBuf> {
    let mut found: Vec<PathBuf> = start
        .ancestors()
        .filter_map(|dir| names.iter().map(|n| dir.join(n)).find(|p| p.is_file()))
        .collect();
    found.reverse();
    found
}

/// Whether a spec file location is a URL rather than a path
pub fn is_url(location: &str) -> bool {
    location.starts_with("http://") || location.starts_with("https://")
}

fn read_entries(path: &Path) -> Result<Map<String, Value>, ConfigError> {
    let data = fs::read(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    if data.iter().all(u8::is_ascii_whitespace) {
        return Ok(Map::new());
    }

    let parse_err = |message: String| ConfigError::Parse {
        path: path.to_path_buf(),
        message,
    };

    match parse_document(&data, Format::from_location(&path.to_string_lossy())).map_err(parse_err)? {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        _ => Err(parse_err("expected a mapping of API names".to_string())),
    }
}

fn decode_entry(path: &Path, name: &str, value: Value) -> Result<ApiConfig, ConfigError> {
    let mut config: ApiConfig = serde_json::from_value(value).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        message: format!("API '{}': {}", name, e),
    })?;
    config.name = name.to_string();
    Ok(config)
}

fn write_entry(path: &Path, name: &str, config: &ApiConfig) -> Result<(), ConfigError> {
    let mut entries = if path.exists() { read_entries(path)? } else { Map::new() };

    let value = serde_json::to_value(config).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    entries.insert(name.to_string(), value);

    let rendered = render_document(&Value::Object(entries), Format::from_location(&path.to_string_lossy()))
        .map_err(|message| ConfigError::Parse {
            path: path.to_path_buf(),
            message,
        })?;

    fs::write(path, rendered).map_err(|source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    })
}

impl ConfigStore {
    /// Create an empty registry backed by the given global file
    pub fn new(global_path: impl Into<PathBuf>) -> Self {
        ConfigStore {
            global_path: global_path.into(),
            apis: IndexMap::new(),
            sources: HashMap::new(),
        }
    }

    /// Load the global registry, then merge every discovered local file.
    ///
    /// The global file is created with only a schema marker when missing.
    /// Any failure here leaves the process without a usable registry and is returned as is.
    pub fn load(settings: &Settings) -> Result<Self, ConfigError> {
        let mut store = ConfigStore::open_global(settings.global_config_path()?)?;

        for path in store.local_paths(settings) {
            debug!(path = %path.display(), "loading local config");
            store.merge_local(&path)?;
        }

        store.check_unique_bases()?;
        Ok(store)
    }

    /// Read (or create) the global registry file only
    pub fn open_global(global_path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let mut store = ConfigStore::new(global_path);
        let path = store.global_path.clone();

        if !path.exists() {
            if let Some(dir) = path.parent() {
                fs::create_dir_all(dir).map_err(|source| ConfigError::Write {
                    path: dir.to_path_buf(),
                    source,
                })?;
            }
            let mut marker = Map::new();
            marker.insert(SCHEMA_KEY.to_string(), Value::from(GLOBAL_SCHEMA));
            let rendered = render_document(&Value::Object(marker), Format::Json).map_err(|message| {
                ConfigError::Parse {
                    path: path.clone(),
                    message,
                }
            })?;
            fs::write(&path, rendered).map_err(|source| ConfigError::Write {
                path: path.clone(),
                source,
            })?;
        }

        for (name, value) in read_entries(&path)? {
            if name == SCHEMA_KEY {
                continue;
            }
            let config = decode_entry(&path, &name, value)?;
            store.apis.insert(name, config);
        }

        Ok(store)
    }

    fn local_paths(&self, settings: &Settings) -> Vec<PathBuf> {
        if let Some(ref path) = settings.local_config {
            if path.is_file() {
                return vec![path.clone()];
            }
            warn!(path = %path.display(), "specified config file does not exist");
        }

        let found = discover_local_configs(&settings.working_dir(), &settings.local_config_names());
        if !found.is_empty() {
            debug!(count = found.len(), "found local configs");
        }
        found
    }

    /// Merge one local config file into the registry.
    ///
    /// Relative spec file paths are resolved against the directory of
    /// `path`; URLs and absolute paths are kept as they are.
    pub fn merge_local(&mut self, path: &Path) -> Result<(), ConfigError> {
        let config_dir = path.parent().unwrap_or_else(|| Path::new(""));

        for (name, value) in read_entries(path)? {
            if name == SCHEMA_KEY {
                continue;
            }

            let mut local = decode_entry(path, &name, value)?;
            for spec in local.spec_files.iter_mut() {
                if !is_url(spec) && Path::new(spec.as_str()).is_relative() {
                    *spec = config_dir.join(spec.as_str()).to_string_lossy().into_owned();
                }
            }

            match self.apis.get_mut(&name) {
                Some(existing) => existing.merge(local),
                None => {
                    self.apis.insert(name.clone(), local);
                }
            }

            self.sources.entry(name).or_default().push(path.to_path_buf());
        }

        Ok(())
    }

    /// Fail if two APIs share an identical base URI
    pub fn check_unique_bases(&self) -> Result<(), ConfigError> {
        let mut seen: HashMap<&str, &str> = HashMap::new();
        for (name, config) in self.apis.iter().filter(|(_, c)| !c.base.is_empty()) {
            if let Some(first) = seen.insert(config.base.as_str(), name.as_str()) {
                return Err(ConfigError::DuplicateBase {
                    base: config.base.clone(),
                    first: first.to_string(),
                    second: name.clone(),
                });
            }
        }
        Ok(())
    }

    /// Path of the global registry file
    pub fn global_path(&self) -> &Path {
        &self.global_path
    }

    /// Registered API names, in registration order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.apis.keys().map(String::as_str)
    }

    /// Registered APIs, in registration order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ApiConfig)> {
        self.apis.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of registered APIs
    pub fn len(&self) -> usize {
        self.apis.len()
    }

    /// Whether no API is registered
    pub fn is_empty(&self) -> bool {
        self.apis.is_empty()
    }

    /// Get an API by name
    pub fn get(&self, name: &str) -> Result<&ApiConfig, ConfigError> {
        self.apis.get(name).ok_or_else(|| {
            let mut available: Vec<String> = self.apis.keys().cloned().collect();
            available.sort();
            ConfigError::UnknownApi {
                name: name.to_string(),
                available,
            }
        })
    }

    /// Local files that contributed to `name`, root first
    pub fn sources(&self, name: &str) -> &[PathBuf] {
        self.sources.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Add or replace an API, rejecting a base used by another API
    pub fn upsert(&mut self, name: &str, mut config: ApiConfig) -> Result<(), ConfigError> {
        if let Some((other, _)) = self
            .apis
            .iter()
            .find(|(other, existing)| {
                other.as_str() != name && !config.base.is_empty() && existing.base == config.base
            })
        {
            return Err(ConfigError::DuplicateBase {
                base: config.base,
                first: other.clone(),
                second: name.to_string(),
            });
        }

        config.name = name.to_string();
        self.apis.insert(name.to_string(), config);
        Ok(())
    }

    /// Find the API whose effective base prefixes `uri`.
    ///
    /// APIs are tried in registration order and the first match wins; there
    /// is no longest-prefix preference. With `api_name` set only that API is
    /// considered. Under a non-default profile, APIs that do not declare the
    /// profile are skipped.
    pub fn find(&self, uri: &str, api_name: Option<&str>, profile: &str) -> Option<&ApiConfig> {
        self.apis.iter().find_map(|(name, config)| {
            if api_name.is_some_and(|wanted| wanted != name.as_str()) {
                return None;
            }
            if profile != DEFAULT_PROFILE && config.profile(profile).is_none() {
                return None;
            }

            let base = config.effective_base(profile);
            (!base.is_empty() && uri.starts_with(base)).then_some(config)
        })
    }

    /// Pick where `name` would be saved under `policy`
    pub fn save_target(&self, name: &str, policy: SavePolicy<'_>) -> SaveTarget {
        match (self.sources(name), policy) {
            ([], _) => SaveTarget::Global,
            ([only], _) => SaveTarget::Local(only.clone()),
            ([.., last], SavePolicy::MostLocal) => SaveTarget::Local(last.clone()),
            (all, SavePolicy::Ask(prompt)) => prompt.choose(name, all),
        }
    }

    /// Write the current configuration of `name` back to disk.
    ///
    /// APIs that came from local files go to one of those files (chosen by
    /// `policy`), everything else to the global registry. No locking is done.
    pub fn save(&self, name: &str, policy: SavePolicy<'_>) -> Result<PathBuf, ConfigError> {
        let config = self.get(name)?;
        let path = match self.save_target(name, policy) {
            SaveTarget::Global => self.global_path.clone(),
            SaveTarget::Local(path) => path,
        };

        debug!(api = name, path = %path.display(), "saving API config");
        write_entry(&path, name, config)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apiconfig::ApiProfile;

    fn store_with(apis: &[(&str, &str)]) -> ConfigStore {
        let mut store = ConfigStore::new("/nonexistent/apis.json");
        for (name, base) in apis {
            store.upsert(name, ApiConfig::new(*name, *base)).unwrap();
        }
        store
    }

    #[test]
    fn test_find_first_registered_wins() {
        let store = store_with(&[("a", "https://x.io/a"), ("ab", "https://x.io/a/b")]);

        let found = store.find("https://x.io/a/b/x", None, DEFAULT_PROFILE).unwrap();
        assert_eq!(found.name, "a");

        let store = store_with(&[("ab", "https://x.io/a/b"), ("a", "https://x.io/a")]);
        let found = store.find("https://x.io/a/b/x", None, DEFAULT_PROFILE).unwrap();
        assert_eq!(found.name, "ab");
    }

    #[test]
    fn test_find_with_name_filter() {
        let store = store_with(&[("a", "https://x.io/a"), ("ab", "https://x.io/a/b")]);

        let found = store.find("https://x.io/a/b/x", Some("ab"), DEFAULT_PROFILE).unwrap();
        assert_eq!(found.name, "ab");
        assert!(store.find("https://y.io/", Some("ab"), DEFAULT_PROFILE).is_none());
    }

    #[test]
    fn test_find_uses_profile_base() {
        let mut config = ApiConfig::new("svc", "https://prod.example.com");
        config.profiles.insert(
            "staging".to_string(),
            ApiProfile {
                base: Some("https://staging.example.com".to_string()),
                ..Default::default()
            },
        );
        let mut store = ConfigStore::new("/nonexistent/apis.json");
        store.upsert("svc", config).unwrap();

        assert!(store.find("https://staging.example.com/items", None, "staging").is_some());
        assert!(store.find("https://prod.example.com/items", None, "staging").is_none());
        assert!(store.find("https://prod.example.com/items", None, "missing").is_none());
    }

    #[test]
    fn test_upsert_rejects_duplicate_base() {
        let mut store = store_with(&[("a", "https://x.io")]);
        let err = store.upsert("b", ApiConfig::new("b", "https://x.io")).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateBase { .. }));

        // Replacing the same API with the same base is fine
        store.upsert("a", ApiConfig::new("a", "https://x.io")).unwrap();
    }

    #[test]
    fn test_get_lists_available_sorted() {
        let store = store_with(&[("zeta", "https://z"), ("alpha", "https://a")]);
        match store.get("nope").unwrap_err() {
            ConfigError::UnknownApi { available, .. } => assert_eq!(available, vec!["alpha", "zeta"]),
            other => panic!("unexpected error {:?}", other),
        }
    }

    struct PickGlobal;

    impl SaveTargetPrompt for PickGlobal {
        fn choose(&self, _api: &str, _candidates: &[PathBuf]) -> SaveTarget {
            SaveTarget::Global
        }
    }

    #[test]
    fn test_save_target_policies() {
        let mut store = store_with(&[("a", "https://x.io")]);
        assert_eq!(store.save_target("a", SavePolicy::MostLocal), SaveTarget::Global);

        store.sources.insert("a".to_string(), vec![PathBuf::from("/root/.apinav.json")]);
        assert_eq!(
            store.save_target("a", SavePolicy::Ask(&PickGlobal)),
            SaveTarget::Local(PathBuf::from("/root/.apinav.json"))
        );

        store.sources.get_mut("a").unwrap().push(PathBuf::from("/root/proj/.apinav.yaml"));
        assert_eq!(
            store.save_target("a", SavePolicy::MostLocal),
            SaveTarget::Local(PathBuf::from("/root/proj/.apinav.yaml"))
        );
        assert_eq!(store.save_target("a", SavePolicy::Ask(&PickGlobal)), SaveTarget::Global);
    }
}
