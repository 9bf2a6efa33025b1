use crate::Adapter;
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};
use tome_config::{ScopedSettings, Settings};
use tome_fetch::Fetcher;

/// What an adapter receives when it is instantiated.
#[derive(Clone)]
pub struct AdapterContext {
    pub fetcher: Fetcher,
    /// Settings rooted at `adapters.options.<name>`.
    pub settings: ScopedSettings,
}

pub type AdapterFactory = Box<dyn Fn(AdapterContext) -> Result<Arc<dyn Adapter>> + Send + Sync>;

/// Name-to-factory table plus the set of currently loaded adapters.
///
/// Factories are registered up front; loading instantiates one with a
/// context scoped to its name. Loaded adapters are shared (`Arc`) so an
/// unload never pulls an adapter out from under a running acquisition.
pub struct AdapterRegistry {
    fetcher: Fetcher,
    settings: Settings,
    factories: BTreeMap<String, AdapterFactory>,
    loaded: RwLock<BTreeMap<String, Arc<dyn Adapter>>>,
}

impl AdapterRegistry {
    /// Empty registry: nothing registered, nothing loaded.
    pub fn new(fetcher: Fetcher, settings: Settings) -> Self {
        Self {
            fetcher,
            settings,
            factories: BTreeMap::new(),
            loaded: RwLock::new(BTreeMap::new()),
        }
    }

    /// Registry with every adapter that ships with this crate registered.
    pub fn with_builtin(fetcher: Fetcher, settings: Settings) -> Self {
        let mut registry = Self::new(fetcher, settings);
        registry.register(crate::biquge::NAME, |ctx| Ok(Arc::new(crate::biquge::Biquge::new(ctx))));
        registry
    }

    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(AdapterContext) -> Result<Arc<dyn Adapter>> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Box::new(factory));
    }

    /// Names of every registered adapter, loaded or not.
    pub fn available(&self) -> Vec<String> {
        self.factories.keys().cloned().collect()
    }

    /// Instantiate (or return the already loaded) adapter called `name`.
    pub fn load(&self, name: &str) -> Result<Arc<dyn Adapter>> {
        if let Some(adapter) = self.get(name) {
            return Ok(adapter);
        }
        let Some(factory) = self.factories.get(name) else {
            exn::bail!(ErrorKind::UnknownAdapter(name.to_string()));
        };
        let ctx = AdapterContext {
            fetcher: self.fetcher.clone(),
            settings: self.settings.scoped(name),
        };
        let adapter = factory(ctx).or_raise(|| ErrorKind::Load(name.to_string()))?;
        tracing::info!(adapter = name, "Adapter loaded");
        let mut loaded = self.loaded.write().unwrap_or_else(PoisonError::into_inner);
        Ok(loaded.entry(name.to_string()).or_insert(adapter).clone())
    }

    /// Load every adapter listed in `adapters.enabled`. Failures are logged
    /// and skipped; the names that loaded are returned.
    pub fn load_enabled(&self) -> Vec<String> {
        let enabled = self.settings.current().adapters.enabled;
        enabled
            .into_iter()
            .filter(|name| match self.load(name) {
                Ok(_) => true,
                Err(err) => {
                    tracing::error!(adapter = %name, error = ?err, "Could not load adapter");
                    false
                },
            })
            .collect()
    }

    /// Returns `true` if the adapter was loaded.
    pub fn unload(&self, name: &str) -> bool {
        let removed = self.loaded.write().unwrap_or_else(PoisonError::into_inner).remove(name).is_some();
        if removed {
            tracing::info!(adapter = name, "Adapter unloaded");
        }
        removed
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Adapter>> {
        self.loaded.read().unwrap_or_else(PoisonError::into_inner).get(name).cloned()
    }

    /// Loaded adapters, ordered by name.
    pub fn loaded(&self) -> Vec<Arc<dyn Adapter>> {
        self.loaded.read().unwrap_or_else(PoisonError::into_inner).values().cloned().collect()
    }

    /// First loaded adapter (by name) whose [`check_url`](Adapter::check_url)
    /// accepts `url`.
    pub fn claiming(&self, url: &str) -> Result<Arc<dyn Adapter>> {
        match self.loaded().into_iter().find(|adapter| adapter.check_url(url)) {
            Some(adapter) => Ok(adapter),
            None => exn::bail!(ErrorKind::Unclaimed(url.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tome_config::{Config, SettingsAccess};

    struct Named(&'static str);

    #[async_trait]
    impl Adapter for Named {
        fn name(&self) -> &str {
            self.0
        }

        fn check_url(&self, url: &str) -> bool {
            url.contains(self.0)
        }
    }

    fn registry() -> AdapterRegistry {
        let settings = Settings::new(Config::default());
        let fetcher = Fetcher::with_reqwest(&settings).unwrap();
        let mut registry = AdapterRegistry::with_builtin(fetcher, settings);
        registry.register("alpha", |_| Ok(Arc::new(Named("alpha"))));
        registry.register("broken", |ctx| {
            exn::bail!(ErrorKind::InvalidLocator(ctx.settings.get_or("why", "no reason".to_string())))
        });
        registry
    }

    #[test]
    fn test_load_and_unload() {
        let registry = registry();
        assert_eq!(registry.available(), vec!["alpha", "biquge", "broken"]);
        assert!(registry.loaded().is_empty());
        let first = registry.load("alpha").unwrap();
        let second = registry.load("alpha").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.loaded().len(), 1);
        assert!(registry.unload("alpha"));
        assert!(!registry.unload("alpha"));
        assert!(registry.get("alpha").is_none());
    }

    #[test]
    fn test_unknown_and_failing_adapters() {
        let registry = registry();
        let err = registry.load("nope").err().unwrap();
        assert!(matches!(&*err, ErrorKind::UnknownAdapter(name) if name == "nope"));
        let err = registry.load("broken").err().unwrap();
        assert!(matches!(&*err, ErrorKind::Load(name) if name == "broken"));
        assert!(registry.loaded().is_empty());
    }

    #[test]
    fn test_load_enabled_uses_configuration() {
        let registry = registry();
        assert_eq!(registry.load_enabled(), vec!["biquge"]);
        assert_eq!(registry.get("biquge").unwrap().name(), "biquge");
    }

    #[test]
    fn test_claiming() {
        let registry = registry();
        registry.load("alpha").unwrap();
        registry.load("biquge").unwrap();
        assert_eq!(registry.claiming("https://www.xbiquge.so/book/1/").unwrap().name(), "biquge");
        assert_eq!(registry.claiming("https://alpha.test/1").unwrap().name(), "alpha");
        let err = registry.claiming("https://elsewhere.test/").err().unwrap();
        assert!(matches!(&*err, ErrorKind::Unclaimed(_)));
    }
}
