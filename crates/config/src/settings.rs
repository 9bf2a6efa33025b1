use crate::Config;
use crate::error::{ErrorKind, Result};
use exn::{OptionExt, ResultExt};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::watch;

/// Read and write configuration values by dotted key (`fetch.max_retry`).
pub trait SettingsAccess: Send + Sync {
    fn get(&self, key: &str) -> Option<Value>;

    fn set(&self, key: &str, value: Value) -> Result<()>;

    /// Typed read with a fallback for missing or mistyped values.
    fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> T
    where
        Self: Sized,
    {
        self.get(key).and_then(|v| serde_json::from_value(v).ok()).unwrap_or(default)
    }
}

/// Live, shared configuration.
///
/// Cloning is cheap; every clone sees the same values. Changes made through
/// [`set`](SettingsAccess::set) are validated as a whole and then published to
/// every receiver returned by [`subscribe`](Self::subscribe).
#[derive(Debug, Clone)]
pub struct Settings {
    tx: Arc<watch::Sender<Config>>,
}

impl Settings {
    pub fn new(config: Config) -> Self {
        Self {
            tx: Arc::new(watch::Sender::new(config)),
        }
    }

    /// Snapshot of the current configuration.
    pub fn current(&self) -> Config {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Config> {
        self.tx.subscribe()
    }

    /// View restricted to one adapter's options (`adapters.options.<name>`).
    pub fn scoped(&self, adapter: &str) -> ScopedSettings {
        ScopedSettings {
            settings: self.clone(),
            prefix: format!("adapters.options.{adapter}"),
        }
    }

    fn to_value(config: &Config) -> Result<Value> {
        serde_json::to_value(config).or_raise(|| ErrorKind::InvalidValue("configuration".to_string()))
    }

    fn lookup(config: &Config, key: &str) -> Option<Value> {
        let root = Self::to_value(config).ok()?;
        key.split('.').try_fold(&root, |node, part| node.get(part)).cloned()
    }

    /// `current` with `key` set to `value`, or `None` when nothing changes.
    fn with_value(current: &Config, key: &str, value: Value) -> Result<Option<Config>> {
        let mut root = Self::to_value(current)?;
        let (parents, leaf) = match key.rsplit_once('.') {
            Some((parents, leaf)) => (Some(parents), leaf),
            None => (None, key),
        };
        let mut node = &mut root;
        for part in parents.into_iter().flat_map(|p| p.split('.')) {
            let map = node.as_object_mut().ok_or_raise(|| ErrorKind::UnknownKey(key.to_string()))?;
            // Only free-form maps (adapter options) may grow new branches;
            // unknown struct fields are rejected by deserialization below.
            node = map.entry(part).or_insert_with(|| Value::Object(Map::new()));
        }
        let map = node.as_object_mut().ok_or_raise(|| ErrorKind::UnknownKey(key.to_string()))?;
        map.insert(leaf.to_string(), value);

        let config: Config = serde_json::from_value(root).or_raise(|| ErrorKind::InvalidValue(key.to_string()))?;
        if config == *current {
            // Either a no-op write or a key that deserialization ignored.
            if Self::lookup(current, key).is_none() {
                exn::bail!(ErrorKind::UnknownKey(key.to_string()));
            }
            return Ok(None);
        }
        config.validate().or_raise(|| ErrorKind::InvalidValue(key.to_string()))?;
        Ok(Some(config))
    }
}

impl SettingsAccess for Settings {
    fn get(&self, key: &str) -> Option<Value> {
        Self::lookup(&self.tx.borrow(), key)
    }

    fn set(&self, key: &str, value: Value) -> Result<()> {
        let mut outcome = Ok(());
        // The whole read-modify-write happens under the channel's write lock.
        self.tx.send_if_modified(|current| match Self::with_value(current, key, value) {
            Ok(Some(config)) => {
                *current = config;
                tracing::debug!(key, "Setting changed");
                true
            },
            Ok(None) => false,
            Err(err) => {
                outcome = Err(err);
                false
            },
        });
        outcome
    }
}

/// Settings as seen by one adapter: keys are relative to its option map.
#[derive(Debug, Clone)]
pub struct ScopedSettings {
    settings: Settings,
    prefix: String,
}

impl SettingsAccess for ScopedSettings {
    fn get(&self, key: &str) -> Option<Value> {
        self.settings.get(&format!("{}.{key}", self.prefix))
    }

    fn set(&self, key: &str, value: Value) -> Result<()> {
        self.settings.set(&format!("{}.{key}", self.prefix), value)
    }
}
