//! Process-wide definition cache.
//!
//! The cache stores file trees by name. A hit hands out a fresh
//! [`Definition`] over a clone of the cached tree so callers restrict and
//! fill their own copy. An optional tokio sweeper evicts entries that were
//! not touched since the previous sweep.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::{CacheConfig, EngineConfig};
use crate::definition::Definition;
use crate::fdt::TypeTree;

static GLOBAL: LazyLock<DefinitionCache> = LazyLock::new(DefinitionCache::new);

#[derive(Debug)]
struct CacheEntry {
    touched: Instant,
    tree: TypeTree,
    config: EngineConfig,
}

type CacheMap = Option<HashMap<String, CacheEntry>>;

/// Shared name → file tree store.
///
/// A disabled cache holds no map; lookups miss and stores are dropped.
#[derive(Debug, Clone, Default)]
pub struct DefinitionCache {
    map: Arc<Mutex<CacheMap>>,
}

impl DefinitionCache {
    /// Disabled cache.
    pub fn new() -> Self {
        Self {
            map: Arc::new(Mutex::new(None)),
        }
    }

    /// Enabled, empty cache.
    pub fn enabled() -> Self {
        let cache = Self::new();
        cache.enable();
        cache
    }

    /// The process-wide cache.
    pub fn global() -> &'static DefinitionCache {
        &GLOBAL
    }

    fn lock(&self) -> MutexGuard<'_, CacheMap> {
        self.map.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create the map if the cache is disabled.
    pub fn enable(&self) {
        let mut map = self.lock();
        if map.is_none() {
            *map = Some(HashMap::new());
            info!("definition cache enabled");
        }
    }

    /// Drop the map and all entries.
    pub fn disable(&self) {
        *self.lock() = None;
        info!("definition cache disabled");
    }

    /// Whether the cache holds a map.
    pub fn is_enabled(&self) -> bool {
        self.lock().is_some()
    }

    /// Number of cached definitions.
    pub fn len(&self) -> usize {
        self.lock().as_ref().map_or(0, HashMap::len)
    }

    /// Whether no definition is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fresh definition over the cached file tree of `key`.
    pub fn get(&self, key: &str) -> Option<Definition> {
        let (tree, config) = {
            let mut map = self.lock();
            let entry = map.as_mut()?.get_mut(key)?;
            entry.touched = Instant::now();
            (entry.tree.clone(), entry.config.clone())
        };
        debug!(key, "definition cache hit");
        Some(Definition::from_tree(tree, config))
    }

    /// Store the file tree of `definition` under `key`.
    pub fn put(&self, key: impl Into<String>, definition: &Definition) {
        let key = key.into();
        let mut map = self.lock();
        let Some(map) = map.as_mut() else {
            return;
        };
        debug!(key = %key, nodes = definition.file_tree().len(), "definition cached");
        map.insert(
            key,
            CacheEntry {
                touched: Instant::now(),
                tree: definition.file_tree().clone(),
                config: definition.config().clone(),
            },
        );
    }

    /// Remove `key`.
    pub fn remove(&self, key: &str) -> bool {
        self.lock()
            .as_mut()
            .is_some_and(|map| map.remove(key).is_some())
    }

    /// Evict entries last touched before `before`; returns the number removed.
    pub fn sweep(&self, before: Instant) -> usize {
        let mut map = self.lock();
        let Some(map) = map.as_mut() else {
            return 0;
        };
        let len = map.len();
        map.retain(|_, entry| entry.touched >= before);
        len - map.len()
    }

    /// Spawn the eviction sweeper on the current tokio runtime.
    ///
    /// Each tick evicts the entries not touched since the previous tick.
    pub fn start_sweeper(&self, interval: Duration) -> SweeperHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let cache = self.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            let mut previous = Instant::now();
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let now = Instant::now();
                        let removed = cache.sweep(previous);
                        if removed > 0 {
                            debug!(removed, remaining = cache.len(), "definition cache swept");
                        }
                        previous = now;
                    }
                    _ = shutdown_rx.changed() => {
                        break;
                    }
                }
            }
        });
        SweeperHandle {
            shutdown_tx,
            handle,
        }
    }

    /// Enable the global cache and start its sweeper when `config` asks for it.
    pub fn start_from_config(config: &EngineConfig) -> Option<SweeperHandle> {
        let CacheConfig {
            enabled,
            sweep_interval_secs,
        } = config.cache;
        if !enabled {
            return None;
        }
        let cache = Self::global();
        cache.enable();
        Some(cache.start_sweeper(Duration::from_secs(sweep_interval_secs.max(1))))
    }
}

/// Handle to a running sweeper task.
#[derive(Debug)]
pub struct SweeperHandle {
    shutdown_tx: watch::Sender<bool>,
    handle: tokio::task::JoinHandle<()>,
}

impl SweeperHandle {
    /// Signal the sweeper to stop.
    pub fn shutdown(&self) {
        if self.shutdown_tx.send(true).is_err() {
            debug!("definition cache sweeper already stopped");
        }
    }

    /// Wait for the sweeper to finish.
    pub async fn wait(self) {
        if let Err(error) = self.handle.await {
            warn!(%error, "definition cache sweeper failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fdt::AdaType;
    use crate::kind::FieldKind;

    fn definition() -> Definition {
        let mut def = Definition::new();
        def.append(AdaType::new(FieldKind::UInt4, "AA"));
        def.append(AdaType::with_length(FieldKind::String, "AB", 8));
        def
    }

    #[test]
    fn test_disabled_cache() {
        let cache = DefinitionCache::new();
        cache.put("file", &definition());
        assert!(cache.get("file").is_none());
        assert!(cache.is_empty());
        assert_eq!(cache.sweep(Instant::now()), 0);
    }

    #[test]
    fn test_hit_is_independent() {
        let cache = DefinitionCache::enabled();
        cache.put("db/11", &definition());
        let mut first = cache.get("db/11").unwrap();
        first.restrict_to_fields("AA").unwrap();
        assert!(first.search_type("AB").is_none());

        let second = cache.get("db/11").unwrap();
        assert!(second.search_type("AB").is_some());
        assert_eq!(second.active_tree().len(), second.file_tree().len());
        assert!(cache.get("db/12").is_none());
    }

    #[test]
    fn test_sweep_keeps_touched() {
        let cache = DefinitionCache::enabled();
        cache.put("old", &definition());
        cache.put("new", &definition());
        let mark = Instant::now();
        assert!(cache.get("new").is_some());
        assert_eq!(cache.sweep(mark), 1);
        assert!(cache.get("old").is_none());
        assert_eq!(cache.len(), 1);
        assert!(cache.remove("new"));
        cache.disable();
        assert!(!cache.is_enabled());
    }

    #[tokio::test]
    async fn test_sweeper_evicts_idle_entries() {
        let cache = DefinitionCache::enabled();
        cache.put("idle", &definition());
        let sweeper = cache.start_sweeper(Duration::from_millis(20));
        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(cache.is_empty());

        sweeper.shutdown();
        sweeper.wait().await;
        cache.put("late", &definition());
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_shutdown_after_sweeper_stopped() {
        let cache = DefinitionCache::enabled();
        let sweeper = cache.start_sweeper(Duration::from_secs(60));
        sweeper.shutdown();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(sweeper.handle.is_finished());
        sweeper.shutdown();
        sweeper.wait().await;
        assert!(cache.is_enabled());
    }
}
