//! Layered configuration.
//!
//! Settings are merged from, lowest priority first:
//!
//! 1. Built-in defaults
//! 2. A TOML file: `--config PATH`, else `config.toml` in the platform
//!    config directory (`~/.config/dupelink/` on Linux)
//! 3. `DUPELINK_*` environment variables
//! 4. Command-line flags
//!
//! ```toml
//! distinguish = ["mtime", "u"]
//! min_size = 4096
//! one_file_system = true
//! strict = false
//! partial_hash_size = 16777216
//! ```

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cli::ScanArgs;
use crate::duplicates::{Criterion, MatchCriteria};
use crate::scanner::{WalkerConfig, PARTIAL_HASH_SIZE};

/// Prefix of environment variables read into the configuration.
pub const ENV_PREFIX: &str = "DUPELINK_";

/// Errors raised while loading the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An explicitly requested config file does not exist.
    #[error("config file not found: {0}")]
    NotFound(PathBuf),

    /// A layer could not be parsed into the configuration.
    #[error("invalid configuration: {0}")]
    Invalid(#[from] Box<figment::Error>),

    /// The merged values contradict each other.
    #[error("invalid size bounds: min_size {min} exceeds max_size {max}")]
    SizeBounds {
        /// Configured minimum size
        min: u64,
        /// Configured maximum size
        max: u64,
    },
}

impl From<figment::Error> for ConfigError {
    fn from(error: figment::Error) -> Self {
        Self::Invalid(Box::new(error))
    }
}

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Criteria that make otherwise identical files distinct
    pub distinguish: Vec<Criterion>,
    /// Smallest file size considered, inclusive
    pub min_size: Option<u64>,
    /// Largest file size considered, inclusive
    pub max_size: Option<u64>,
    /// Stay on the filesystem of each root
    pub one_file_system: bool,
    /// Abort a link when an attribute cannot be preserved
    pub strict: bool,
    /// Leading bytes covered by the partial hash
    pub partial_hash_size: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            distinguish: Vec::new(),
            min_size: None,
            max_size: None,
            one_file_system: false,
            strict: false,
            partial_hash_size: PARTIAL_HASH_SIZE,
        }
    }
}

impl Config {
    /// Load defaults, the config file and the environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotFound`] if `path` is given but missing, or
    /// [`ConfigError::Invalid`] if any layer fails to parse.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) if !path.is_file() => return Err(ConfigError::NotFound(path.to_path_buf())),
            Some(path) => Some(path.to_path_buf()),
            None => Self::default_path(),
        };

        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(file) = file {
            log::debug!("Reading configuration from {}", file.display());
            figment = figment.merge(Toml::file(file));
        }
        let config: Self = figment.merge(Env::prefixed(ENV_PREFIX)).extract()?;

        config.validate()?;
        Ok(config)
    }

    /// Default platform-specific config file path.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "dupelink").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Overlay the scan flags given on the command line.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::SizeBounds`] if the merged bounds are inverted.
    pub fn apply_scan_args(&mut self, args: &ScanArgs) -> Result<(), ConfigError> {
        if !args.distinguish.is_empty() {
            self.distinguish = args.criteria();
        }
        if args.min_size.is_some() {
            self.min_size = args.min_size;
        }
        if args.max_size.is_some() {
            self.max_size = args.max_size;
        }
        if let Some(size) = args.partial_hash_size {
            self.partial_hash_size = size;
        }
        self.one_file_system |= args.one_file_system;

        self.validate()
    }

    fn validate(&self) -> Result<(), ConfigError> {
        match (self.min_size, self.max_size) {
            (Some(min), Some(max)) if min > max => Err(ConfigError::SizeBounds { min, max }),
            _ => Ok(()),
        }
    }

    /// Matching criteria from the `distinguish` list.
    #[must_use]
    pub fn criteria(&self) -> MatchCriteria {
        MatchCriteria::from_criteria(&self.distinguish)
    }

    /// Walker settings.
    #[must_use]
    pub fn walker_config(&self) -> WalkerConfig {
        WalkerConfig::new(self.min_size, self.max_size, self.one_file_system)
    }
}
