//! Configuration for tome.
//!
//! Values are layered: built-in defaults, then an optional TOML file, then
//! `TOME_`-prefixed environment variables (`__` separates nesting, so
//! `TOME_FETCH__MAX_RETRY=3` sets `fetch.max_retry`).
//!
//! Once loaded, the configuration lives inside [`Settings`], which lets any
//! component read or change values by dotted key and lets long-lived
//! components (the fetcher) observe changes as they happen.

pub mod error;
mod settings;

pub use crate::settings::{ScopedSettings, Settings, SettingsAccess};

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Semaphore;
use tracing::instrument;

const ENV_PREFIX: &str = "TOME_";
const DATABASE_FILENAME: &str = "tome.sqlite3";
const CONFIG_FILENAME: &str = "config.toml";
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                                      (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "tome")
}

/// Default location of the configuration file, if the platform has one.
pub fn default_config_path() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().join(CONFIG_FILENAME))
}

fn default_database_path() -> PathBuf {
    project_dirs()
        .map(|dirs| dirs.data_dir().join(DATABASE_FILENAME))
        .unwrap_or_else(|| PathBuf::from(DATABASE_FILENAME))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub fetch: FetchConfig,
    pub engine: EngineConfig,
    pub adapters: AdaptersConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

/// Settings for every HTTP request made on behalf of an adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Attempts per request before giving up.
    pub max_retry: u32,
    /// Per-attempt timeout.
    pub timeout_ms: u64,
    /// Requests allowed in flight at once, across all adapters.
    pub concurrency: usize,
    pub user_agent: String,
    /// Sent as the `Cookie` header when not empty.
    pub cookie: String,
}

/// Settings for the acquisition orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Retry rounds for failed chapters, and attempts per book when crawling.
    pub max_retry: u32,
    /// Pause between attempts at the same catalog entry.
    pub backoff_ms: u64,
    /// Catalog entries acquired concurrently.
    pub workers: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaptersConfig {
    /// Adapters loaded at startup.
    pub enabled: Vec<String>,
    /// Free-form options, keyed by adapter name.
    pub options: BTreeMap<String, serde_json::Value>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: default_database_path() }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_retry: 10,
            timeout_ms: 5000,
            concurrency: 100,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            cookie: String::new(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_retry: 5,
            backoff_ms: 500,
            workers: 4,
        }
    }
}

impl Default for AdaptersConfig {
    fn default() -> Self {
        Self {
            enabled: vec!["biquge".to_string()],
            options: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Load configuration from defaults, the given (or default) TOML file, and
    /// the environment.
    ///
    /// A missing file is not an error; a malformed one is.
    #[instrument(level = "debug")]
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path.map(Path::to_path_buf).or_else(default_config_path);
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = path {
            tracing::debug!(path = %path.display(), "Reading configuration file");
            figment = figment.merge(Toml::file(path));
        }
        Self::extract(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    fn extract(figment: Figment) -> Result<Self> {
        let config: Config = figment.extract().or_raise(|| ErrorKind::Load)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would stall or disable the engine.
    pub fn validate(&self) -> Result<()> {
        if self.fetch.max_retry == 0 {
            exn::bail!(ErrorKind::Invalid("fetch.max_retry"));
        }
        if self.fetch.timeout_ms == 0 {
            exn::bail!(ErrorKind::Invalid("fetch.timeout_ms"));
        }
        if !(1..=Semaphore::MAX_PERMITS).contains(&self.fetch.concurrency) {
            exn::bail!(ErrorKind::Invalid("fetch.concurrency"));
        }
        if self.engine.workers == 0 {
            exn::bail!(ErrorKind::Invalid("engine.workers"));
        }
        Ok(())
    }
}
