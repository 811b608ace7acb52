use crate::error::ConfigError;
use std::env;
use std::path::{Path, PathBuf};

/// Profile that every API accepts even when it does not declare it
pub const DEFAULT_PROFILE: &str = "default";

/// Name of the global registry file inside the config directory
pub const GLOBAL_CONFIG_FILE: &str = "apis.json";

/// Runtime settings that drive config discovery and API lookup
#[derive(Debug, Clone)]
pub struct Settings {
    /// Application name, used for directory and local file names
    pub app_name: String,
    /// Directory holding the global registry; derived from the environment when unset
    pub config_dir: Option<PathBuf>,
    /// Explicit local config file; replaces the directory walk when it exists
    pub local_config: Option<PathBuf>,
    /// Directory the walk starts from; the process working directory when unset
    pub working_dir: Option<PathBuf>,
    /// Active profile name
    pub profile: String,
    /// Restrict URI lookup to this API name
    pub api_name: Option<String>,
    /// Enable debug logging
    pub debug: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings::new("apinav")
    }
}

impl Settings {
    /// Create settings for the given application name
    pub fn new(app_name: impl Into<String>) -> Self {
        Settings {
            app_name: app_name.into(),
            config_dir: None,
            local_config: None,
            working_dir: None,
            profile: DEFAULT_PROFILE.to_string(),
            api_name: None,
            debug: false,
        }
    }

    /// Create settings for `app_name`, reading overrides from
    /// `<APP>_CONFIG_DIR`, `<APP>_CONFIG`, `<APP>_PROFILE`, `<APP>_API` and `<APP>_DEBUG`
    pub fn from_env(app_name: impl Into<String>) -> Self {
        let mut settings = Settings::new(app_name);
        let prefix = settings.env_prefix();
        let var = |suffix: &str| env::var(format!("{}_{}", prefix, suffix)).ok().filter(|v| !v.is_empty());

        if let Some(dir) = var("CONFIG_DIR") {
            settings.config_dir = Some(PathBuf::from(dir));
        }
        if let Some(path) = var("CONFIG") {
            settings.local_config = Some(PathBuf::from(path));
        }
        if let Some(profile) = var("PROFILE") {
            settings.profile = profile;
        }
        settings.api_name = var("API");
        settings.debug = matches!(var("DEBUG").as_deref(), Some("1") | Some("true"));
        settings
    }

    /// Set the config directory
    pub fn with_config_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config_dir = Some(dir.into());
        self
    }

    /// Set an explicit local config file
    pub fn with_local_config(mut self, path: impl Into<PathBuf>) -> Self {
        self.local_config = Some(path.into());
        self
    }

    /// Set the directory local config discovery starts from
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Set the active profile
    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = profile.into();
        self
    }

    /// Restrict lookups to one API
    pub fn with_api_name(mut self, name: impl Into<String>) -> Self {
        self.api_name = Some(name.into());
        self
    }

    /// Set debug mode
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    fn env_prefix(&self) -> String {
        self.app_name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
            .collect()
    }

    /// Directory holding the global registry
    pub fn config_dir(&self) -> Result<PathBuf, ConfigError> {
        if let Some(ref dir) = self.config_dir {
            return Ok(dir.clone());
        }

        if cfg!(windows) {
            if let Some(appdata) = env::var_os("APPDATA") {
                return Ok(Path::new(&appdata).join(&self.app_name));
            }
        }

        if let Some(xdg) = env::var_os("XDG_CONFIG_HOME").filter(|v| !v.is_empty()) {
            return Ok(Path::new(&xdg).join(&self.app_name));
        }

        env::var_os("HOME")
            .filter(|v| !v.is_empty())
            .map(|home| Path::new(&home).join(".config").join(&self.app_name))
            .ok_or(ConfigError::NoConfigDir)
    }

    /// Path of the global registry file
    pub fn global_config_path(&self) -> Result<PathBuf, ConfigError> {
        Ok(self.config_dir()?.join(GLOBAL_CONFIG_FILE))
    }

    /// Local config file names, in preference order
    pub fn local_config_names(&self) -> [String; 2] {
        [
            format!(".{}.json", self.app_name),
            format!(".{}.yaml", self.app_name),
        ]
    }

    /// Directory local config discovery starts from
    pub fn working_dir(&self) -> PathBuf {
        self.working_dir
            .clone()
            .or_else(|| env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Install a `tracing` subscriber honoring `RUST_LOG`, defaulting to
    /// `debug` for this crate when debug mode is on and `warn` otherwise.
    /// Does nothing if a global subscriber is already set.
    pub fn init_logging(&self) {
        let default = if self.debug { "apinav=debug" } else { "warn" };
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init();
    }
}
