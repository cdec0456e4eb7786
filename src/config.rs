//! Import configuration
//!
//! Built-in defaults, optionally overridden by a YAML file and then by the
//! positional command-line arguments.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{ImportError, ImportResult};
use crate::import::{CommitPolicy, LinkMode, ResetMode};
use crate::session::StoreUrl;

/// How to reach the graph database
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub url: String,
    pub username: String,
    pub password: String,
    pub pool_min: usize,
    pub pool_max: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: "plocal:databases/movielens".to_string(),
            username: "admin".to_string(),
            password: "admin".to_string(),
            pool_min: 1,
            pool_max: 5,
        }
    }
}

impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreConfig")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("pool_min", &self.pool_min)
            .field("pool_max", &self.pool_max)
            .finish()
    }
}

/// How the pipeline writes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportOptions {
    pub commit: CommitPolicy,
    pub link_mode: LinkMode,
    pub reset: ResetMode,
}

/// Everything an import run needs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    pub store: StoreConfig,
    pub dataset_path: PathBuf,
    pub import: ImportOptions,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            dataset_path: PathBuf::from("movielens"),
            import: ImportOptions::default(),
        }
    }
}

impl ImportConfig {
    pub fn from_yaml_str(yaml: &str) -> ImportResult<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> ImportResult<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|source| ImportError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&yaml)
    }

    /// Override settings from positional arguments, in order: URL, user
    /// name, password, pool min, pool max, dataset path. Missing trailing
    /// arguments keep their current value.
    pub fn apply_positional(&mut self, args: &[String]) -> ImportResult<()> {
        if args.len() > 6 {
            return Err(ImportError::Config(format!(
                "expected at most 6 positional arguments, got {}",
                args.len()
            )));
        }

        let mut args = args.iter();
        if let Some(url) = args.next() {
            self.store.url = url.clone();
        }
        if let Some(username) = args.next() {
            self.store.username = username.clone();
        }
        if let Some(password) = args.next() {
            self.store.password = password.clone();
        }
        if let Some(min) = args.next() {
            self.store.pool_min = parse_pool_size("pool min", min)?;
        }
        if let Some(max) = args.next() {
            self.store.pool_max = parse_pool_size("pool max", max)?;
        }
        if let Some(path) = args.next() {
            self.dataset_path = PathBuf::from(path);
        }
        Ok(())
    }

    pub fn validate(&self) -> ImportResult<()> {
        self.store
            .url
            .parse::<StoreUrl>()
            .map_err(|e| ImportError::Config(e.to_string()))?;
        if self.store.pool_min == 0 || self.store.pool_min > self.store.pool_max {
            return Err(ImportError::Config(format!(
                "pool bounds must satisfy 1 <= min <= max, got {}..{}",
                self.store.pool_min, self.store.pool_max
            )));
        }
        self.import.commit.validate().map_err(ImportError::Config)?;
        Ok(())
    }
}

fn parse_pool_size(name: &str, value: &str) -> ImportResult<usize> {
    value
        .parse()
        .map_err(|_| ImportError::Config(format!("{} must be a positive integer, got '{}'", name, value)))
}
