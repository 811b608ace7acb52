use crate::apiconfig::ApiConfig;
use crate::compiler::{entry_base, SpecCompiler, LOCATION_HINTS};
use crate::error::{LinkError, Result, SpecError};
use crate::fetch::{DefaultFetcher, DocumentFetcher};
use crate::links::LinkResolver;
use crate::operation::Api;
use crate::response::Response;
use crate::settings::Settings;
use crate::store::ConfigStore;
use std::collections::HashMap;
use tracing::debug;
use url::Url;

/// Known APIs, their compiled operations and the link resolver.
///
/// Built once at startup and passed by reference; operations of an API are
/// compiled on first use and kept for the life of the registry.
pub struct Registry {
    settings: Settings,
    store: ConfigStore,
    resolver: LinkResolver,
    fetcher: Box<dyn DocumentFetcher>,
    compiled: HashMap<String, Api>,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("settings", &self.settings)
            .field("store", &self.store)
            .field("resolver", &self.resolver)
            .field("compiled", &self.compiled.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Registry {
    /// Load configuration for `settings` with the default fetcher and link strategies
    pub fn load(settings: Settings) -> Result<Self> {
        let store = ConfigStore::load(&settings)?;
        let fetcher = DefaultFetcher::new()?;
        Ok(Registry::with_parts(settings, store, Box::new(fetcher)))
    }

    /// Assemble a registry from already-built parts
    pub fn with_parts(settings: Settings, store: ConfigStore, fetcher: Box<dyn DocumentFetcher>) -> Self {
        Registry {
            settings,
            store,
            resolver: LinkResolver::with_defaults(),
            fetcher,
            compiled: HashMap::new(),
        }
    }

    /// Replace the link resolver
    pub fn with_resolver(mut self, resolver: LinkResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    /// Mutable access to the configuration. Cached operations of an API
    /// changed here stay as compiled; call [`Registry::invalidate`].
    pub fn store_mut(&mut self) -> &mut ConfigStore {
        &mut self.store
    }

    pub fn resolver(&self) -> &LinkResolver {
        &self.resolver
    }

    /// API serving `uri` under the active profile and API filter
    pub fn find(&self, uri: &str) -> Option<&ApiConfig> {
        self.store
            .find(uri, self.settings.api_name.as_deref(), &self.settings.profile)
    }

    /// Whether the operations of `name` are already compiled
    pub fn is_compiled(&self, name: &str) -> bool {
        self.compiled.contains_key(name)
    }

    /// Drop the compiled operations of `name`
    pub fn invalidate(&mut self, name: &str) {
        self.compiled.remove(name);
    }

    /// Compiled operations of `name`, compiling them on first use.
    ///
    /// The active profile must exist for the API. Operations of every spec
    /// file are merged in the configured order.
    pub fn api(&mut self, name: &str) -> Result<&Api> {
        if !self.compiled.contains_key(name) {
            let config = self.store.get(name)?;
            config.validate_profile(&self.settings.profile)?;

            let api = self.compile(config)?;
            debug!(api = name, operations = api.operations.len(), "compiled API");
            self.compiled.insert(name.to_string(), api);
        }

        Ok(&self.compiled[name])
    }

    /// Compiled operations of the API serving `uri`
    pub fn api_for(&mut self, uri: &str) -> Result<Option<&Api>> {
        let Some(name) = self.find(uri).map(|config| config.name.clone()) else {
            return Ok(None);
        };
        self.api(&name).map(Some)
    }

    /// Extract navigation links from a response to a request sent to `request_url`
    pub fn parse_links(&self, response: &mut Response, request_url: &Url) -> Vec<LinkError> {
        response.parse_links(&self.resolver, Some(request_url))
    }

    fn compile(&self, config: &ApiConfig) -> Result<Api> {
        let base = entry_base(
            config.effective_base(&self.settings.profile),
            config.operation_base.as_deref(),
        )?;
        let compiler = SpecCompiler::new(self.fetcher.as_ref());

        if config.spec_files.is_empty() {
            return self.discover(&compiler, config, &base);
        }

        let mut api = Api::default();
        for location in &config.spec_files {
            api.merge(compiler.compile(location, &base)?);
        }
        Ok(api)
    }

    /// Try the well-known description locations under the base.
    /// Only a location that cannot be fetched moves on to the next one.
    fn discover(&self, compiler: &SpecCompiler<'_>, config: &ApiConfig, base: &Url) -> Result<Api> {
        for hint in LOCATION_HINTS {
            let Ok(location) = base.join(hint) else {
                continue;
            };

            match compiler.compile(location.as_str(), base) {
                Ok(api) => return Ok(api),
                Err(e @ SpecError::Fetch { .. }) => {
                    debug!(api = %config.name, location = %location, error = %e, "no API description")
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(SpecError::NoDocument {
            api: config.name.clone(),
        }
        .into())
    }
}
