//! Configuration with layered resolution using figment.
//!
//! Resolution order (highest priority last):
//! 1. User config: `~/.config/kernel-scope/config.toml` (XDG) or platform config dir
//! 2. Project config: `.kernel-scope.toml`
//! 3. Environment variables: `KERNEL_SCOPE_*` (nested keys split on `__`)
//!
//! Every field has a default, so an empty environment still loads.
//!
//! ```toml
//! [strategy]
//! kind = "preset"
//!
//! [kernel]
//! inject_non_public = true
//! inject_parent_private = false
//!
//! [log]
//! filter = "kernel_scope=debug"
//!
//! [demo]
//! requests = 8
//! ```

use std::ops::Deref;
use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::kernel::KernelSettings;

/// Project config file name, looked up in the working directory.
pub const PROJECT_CONFIG_FILE: &str = ".kernel-scope.toml";

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "KERNEL_SCOPE_";

/// Boxed wrapper for figment::Error to reduce Result size on the stack.
#[derive(Debug)]
pub struct ConfigError(Box<figment::Error>);

impl Deref for ConfigError {
    type Target = figment::Error;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.source()
    }
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self(Box::new(err))
    }
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub strategy: StrategyConfig,
    #[serde(default)]
    pub kernel: KernelSettings,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub demo: DemoConfig,
}

/// Which resolution strategy the application context installs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    /// Fresh kernel with non-public injection enabled.
    #[default]
    Default,
    /// Application modules plus the `[kernel]` settings.
    Preset,
}

/// Strategy selection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StrategyConfig {
    #[serde(default)]
    pub kind: StrategyKind,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// `tracing_subscriber` env-filter directive (e.g., "info", "kernel_scope=debug").
    #[serde(default = "default_filter")]
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
        }
    }
}

fn default_filter() -> String {
    "info".to_string()
}

/// Parameters for the `demo` command's simulated traffic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemoConfig {
    /// Number of concurrent requests.
    pub requests: usize,
    /// Controller resolutions per request.
    pub resolutions: usize,
    /// Pause between resolutions, in milliseconds.
    pub pause_ms: u64,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            requests: 4,
            resolutions: 3,
            pause_ms: 10,
        }
    }
}

impl Config {
    /// Load config with layered resolution (defaults → user → project → env).
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::user_config_path(), Path::new(PROJECT_CONFIG_FILE))
    }

    /// Load config from explicit user and project file locations.
    ///
    /// Missing files are skipped.
    pub fn load_from(user_config: &Path, project_config: &Path) -> Result<Self, ConfigError> {
        Figment::from(Serialized::defaults(Config::default()))
            // Layer 1: User config (lowest priority)
            .merge(Toml::file(user_config))
            // Layer 2: Project config
            .merge(Toml::file(project_config))
            // Layer 3: Environment variables (highest priority)
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(ConfigError::from)
    }

    /// User config path: ~/.config/kernel-scope/config.toml (XDG) or platform config dir.
    fn user_config_path() -> PathBuf {
        // Prefer XDG config location (~/.config) on all platforms
        if let Some(home) = dirs::home_dir() {
            let xdg_path = home.join(".config").join("kernel-scope").join("config.toml");
            if xdg_path.exists() {
                return xdg_path;
            }
        }
        // Fall back to platform-specific config dir
        dirs::config_dir()
            .map(|p| p.join("kernel-scope").join("config.toml"))
            .unwrap_or_default()
    }
}
