//! Configuration for prism, loaded from TOML.
//!
//! Every section and field has a default, so an empty file (or no file at all) is a
//! valid configuration:
//!
//! ```toml
//! [cache]
//! mode = "read-write"        # disabled | read-only | read-write
//! dir = ".prism-cache"       # omit for an in-memory backend
//! prefix = "prism"
//! format_version = 1
//!
//! [logging]
//! level = "info"             # a level or a full EnvFilter directive string
//! json = false
//! stderr = true
//!
//! [reflection]
//! builtin_hooks = true
//! ```

mod logging;

use std::path::{Path, PathBuf};

use prism_cache::PersistenceMode;
use serde::{Deserialize, Serialize};

pub use logging::{init_tracing, LoggingConfig};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PrismConfig {
    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub reflection: ReflectionConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    /// Overridden at runtime by `PRISM_PERSISTENCE` when set.
    #[serde(default)]
    pub mode: PersistenceMode,

    /// Directory for the on-disk backend. `None` keeps records in memory only.
    #[serde(default)]
    pub dir: Option<PathBuf>,

    #[serde(default = "CacheConfig::default_prefix")]
    pub prefix: String,

    /// Bump to orphan every record persisted by an older build.
    #[serde(default = "CacheConfig::default_format_version")]
    pub format_version: u32,
}

impl CacheConfig {
    fn default_prefix() -> String {
        "prism".to_owned()
    }

    fn default_format_version() -> u32 {
        1
    }

    /// The configured mode, with the environment override applied.
    pub fn effective_mode(&self) -> PersistenceMode {
        PersistenceMode::from_env_or(self.mode)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            mode: PersistenceMode::default(),
            dir: None,
            prefix: Self::default_prefix(),
            format_version: Self::default_format_version(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReflectionConfig {
    /// Register the built-in hooks ahead of user supplied ones.
    #[serde(default = "ReflectionConfig::default_builtin_hooks")]
    pub builtin_hooks: bool,
}

impl ReflectionConfig {
    fn default_builtin_hooks() -> bool {
        true
    }
}

impl Default for ReflectionConfig {
    fn default() -> Self {
        Self {
            builtin_hooks: Self::default_builtin_hooks(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse toml config: {0}")]
    Toml(String),
    #[error("invalid config value for `{field}`: {message}")]
    Invalid {
        field: &'static str,
        message: String,
    },
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        // `Display` embeds a snippet of the input; keep only the message.
        ConfigError::Toml(err.message().to_owned())
    }
}

impl PrismConfig {
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let mut config = Self::load_from_str(&text)?;
        config.resolve_relative_paths(path.parent());
        Ok(config)
    }

    pub fn load_from_str(text: &str) -> Result<Self, ConfigError> {
        let config: PrismConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache.prefix.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "cache.prefix",
                message: "must not be empty".to_owned(),
            });
        }
        if self.cache.format_version == 0 {
            return Err(ConfigError::Invalid {
                field: "cache.format_version",
                message: "must be at least 1".to_owned(),
            });
        }
        Ok(())
    }

    /// A relative `cache.dir` is relative to the directory holding the config file.
    fn resolve_relative_paths(&mut self, config_dir: Option<&Path>) {
        let (Some(dir), Some(base)) = (self.cache.dir.as_ref(), config_dir) else {
            return;
        };
        if dir.is_relative() {
            self.cache.dir = Some(base.join(dir));
        }
    }
}
