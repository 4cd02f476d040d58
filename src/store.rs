//! Persistent index cache over a pluggable key-value backend.
//!
//! Two backend keys are used: `retrieval:indexes` holds a JSON object
//! mapping store key to serialized index, and `retrieval:lru` holds the
//! key order, most recent first. All mutation is read-modify-write under
//! one lock so concurrent saves cannot clobber each other.
//!
//! Store operations never surface errors to callers. When the backend
//! fails the store flips to an in-process map and keeps serving; cache
//! loss degrades performance, not correctness.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde_json::Value;
use tokio::sync::Mutex;

use crate::config::StoreConfig;
use crate::models::Index;

const INDEXES_KEY: &str = "retrieval:indexes";
const LRU_KEY: &str = "retrieval:lru";

/// Minimal async key-value surface the host must provide.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
    async fn remove(&self, key: &str) -> Result<()>;
}

/// In-memory backend, used in tests and as the no-persistence default.
#[derive(Default)]
pub struct MemoryBackend {
    map: Mutex<HashMap<String, String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.map.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.map.lock().await.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.map.lock().await.remove(key);
        Ok(())
    }
}

struct StoreState {
    /// Set after the first backend failure; all later traffic stays
    /// in-process.
    fallback: Option<HashMap<String, Index>>,
}

pub struct IndexStore {
    backend: Arc<dyn StorageBackend>,
    cfg: StoreConfig,
    state: Mutex<StoreState>,
}

impl IndexStore {
    pub fn new(backend: Arc<dyn StorageBackend>, cfg: StoreConfig) -> Self {
        Self {
            backend,
            cfg,
            state: Mutex::new(StoreState { fallback: None }),
        }
    }

    /// Load an index by store key. Expired or malformed entries read as
    /// misses; a malformed entry only hides itself, not its neighbors.
    pub async fn load(&self, key: &str) -> Option<Index> {
        let mut state = self.state.lock().await;
        if let Some(map) = &mut state.fallback {
            return match map.get(key) {
                Some(index) if !self.expired(index) => Some(index.clone()),
                // expired entries are removed here too, not just filtered
                Some(_) => {
                    map.remove(key);
                    None
                }
                None => None,
            };
        }

        let raw = match self.backend.get(INDEXES_KEY).await {
            Ok(raw) => raw,
            Err(err) => {
                self.enter_fallback(&mut state, &err);
                return None;
            }
        };

        let map: HashMap<String, Value> = raw
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default();
        let entry = map.get(key)?.clone();
        let index = match serde_json::from_value::<Index>(entry) {
            Ok(index) if !self.expired(&index) => index,
            // expired or unreadable: delete the entry, report a miss
            _ => {
                if let Err(err) = self.delete_inner(key).await {
                    self.enter_fallback(&mut state, &err);
                }
                return None;
            }
        };
        drop(state);
        self.touch(key).await;
        Some(index)
    }

    /// Save an index, promote its key to most-recent, and evict beyond
    /// `max_entries`.
    pub async fn save(&self, index: &Index) {
        let mut state = self.state.lock().await;
        if let Some(map) = &mut state.fallback {
            map.insert(index.key.clone(), index.clone());
            return;
        }

        if let Err(err) = self.save_inner(index).await {
            self.enter_fallback(&mut state, &err);
            if let Some(map) = &mut state.fallback {
                map.insert(index.key.clone(), index.clone());
            }
        }
    }

    /// Drop every entry older than the TTL. Returns how many were
    /// removed.
    pub async fn cleanup_expired(&self) -> usize {
        let mut state = self.state.lock().await;
        if let Some(map) = &mut state.fallback {
            let before = map.len();
            map.retain(|_, index| !self.expired(index));
            return before - map.len();
        }

        match self.cleanup_inner().await {
            Ok(n) => n,
            Err(err) => {
                self.enter_fallback(&mut state, &err);
                0
            }
        }
    }

    /// Remove a single entry, if present.
    pub async fn delete(&self, key: &str) {
        let mut state = self.state.lock().await;
        if let Some(map) = &mut state.fallback {
            map.remove(key);
            return;
        }
        if let Err(err) = self.delete_inner(key).await {
            self.enter_fallback(&mut state, &err);
        }
    }

    fn expired(&self, index: &Index) -> bool {
        let ttl = Duration::hours(i64::from(self.cfg.ttl_hours));
        Utc::now() - index.meta.created_at > ttl
    }

    fn enter_fallback(&self, state: &mut StoreState, err: &anyhow::Error) {
        eprintln!("Warning: index storage backend failed ({err}); continuing without persistence");
        state.fallback = Some(HashMap::new());
    }

    async fn read_map(&self) -> Result<HashMap<String, Value>> {
        Ok(self
            .backend
            .get(INDEXES_KEY)
            .await?
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default())
    }

    async fn read_lru(&self) -> Result<Vec<String>> {
        Ok(self
            .backend
            .get(LRU_KEY)
            .await?
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default())
    }

    async fn write_both(&self, map: &HashMap<String, Value>, lru: &[String]) -> Result<()> {
        self.backend
            .set(INDEXES_KEY, &serde_json::to_string(map)?)
            .await?;
        self.backend
            .set(LRU_KEY, &serde_json::to_string(lru)?)
            .await?;
        Ok(())
    }

    async fn save_inner(&self, index: &Index) -> Result<()> {
        let mut map = self.read_map().await?;
        let mut lru = self.read_lru().await?;

        map.insert(index.key.clone(), serde_json::to_value(index)?);
        lru.retain(|k| k != &index.key);
        lru.insert(0, index.key.clone());

        while lru.len() > self.cfg.max_entries {
            if let Some(old) = lru.pop() {
                map.remove(&old);
            }
        }
        // keys that lost their entry some other way don't count
        lru.retain(|k| map.contains_key(k));

        self.write_both(&map, &lru).await
    }

    async fn cleanup_inner(&self) -> Result<usize> {
        let mut map = self.read_map().await?;
        let mut lru = self.read_lru().await?;

        let before = map.len();
        map.retain(|_, value| {
            match serde_json::from_value::<Index>(value.clone()) {
                Ok(index) => !self.expired(&index),
                // malformed entries are dead weight, drop them too
                Err(_) => false,
            }
        });
        lru.retain(|k| map.contains_key(k));

        self.write_both(&map, &lru).await?;
        Ok(before - map.len())
    }

    async fn delete_inner(&self, key: &str) -> Result<()> {
        let mut map = self.read_map().await?;
        let mut lru = self.read_lru().await?;
        map.remove(key);
        lru.retain(|k| k != key);
        self.write_both(&map, &lru).await
    }

    /// Promote a key to most-recent after a hit.
    async fn touch(&self, key: &str) {
        let result = async {
            let mut lru = self.read_lru().await?;
            lru.retain(|k| k != key);
            lru.insert(0, key.to_string());
            self.backend
                .set(LRU_KEY, &serde_json::to_string(&lru)?)
                .await
        }
        .await;
        if let Err(err) = result {
            let mut state = self.state.lock().await;
            if state.fallback.is_none() {
                self.enter_fallback(&mut state, &err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::IndexMeta;

    fn index(key: &str) -> Index {
        Index {
            key: key.to_string(),
            meta: IndexMeta {
                url: None,
                title: Some(key.to_string()),
                language: None,
                created_at: Utc::now(),
                content_hash: "cafe0001".to_string(),
            },
            toc: Vec::new(),
            summaries: Vec::new(),
            sections: Vec::new(),
        }
    }

    fn store_with(max_entries: usize, ttl_hours: u32) -> (IndexStore, Arc<MemoryBackend>) {
        let backend = Arc::new(MemoryBackend::new());
        let store = IndexStore::new(
            backend.clone(),
            StoreConfig {
                max_entries,
                ttl_hours,
            },
        );
        (store, backend)
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let (store, _) = store_with(20, 168);
        store.save(&index("page:a")).await;
        let loaded = store.load("page:a").await.unwrap();
        assert_eq!(loaded.key, "page:a");
        assert!(store.load("page:missing").await.is_none());
    }

    #[tokio::test]
    async fn lru_evicts_oldest_beyond_capacity() {
        let (store, _) = store_with(2, 168);
        store.save(&index("a")).await;
        store.save(&index("b")).await;
        store.save(&index("c")).await;
        assert!(store.load("a").await.is_none());
        assert!(store.load("b").await.is_some());
        assert!(store.load("c").await.is_some());
    }

    #[tokio::test]
    async fn load_promotes_recency() {
        let (store, _) = store_with(2, 168);
        store.save(&index("a")).await;
        store.save(&index("b")).await;
        // hit "a" so "b" becomes the eviction candidate
        assert!(store.load("a").await.is_some());
        store.save(&index("c")).await;
        assert!(store.load("a").await.is_some());
        assert!(store.load("b").await.is_none());
    }

    #[tokio::test]
    async fn expired_entries_read_as_misses() {
        let (store, _) = store_with(20, 1);
        let mut stale = index("old");
        stale.meta.created_at = Utc::now() - Duration::hours(3);
        store.save(&stale).await;
        assert!(store.load("old").await.is_none());
    }

    #[tokio::test]
    async fn delete_removes_entry_and_lru_reference() {
        let (store, backend) = store_with(20, 168);
        store.save(&index("a")).await;
        store.save(&index("b")).await;
        store.delete("a").await;
        assert!(store.load("a").await.is_none());
        assert!(store.load("b").await.is_some());
        let lru = backend.get(LRU_KEY).await.unwrap().unwrap();
        assert!(!lru.contains("\"a\""));
    }

    #[tokio::test]
    async fn cleanup_removes_only_expired() {
        let (store, _) = store_with(20, 1);
        let mut stale = index("old");
        stale.meta.created_at = Utc::now() - Duration::hours(3);
        store.save(&stale).await;
        store.save(&index("fresh")).await;
        assert_eq!(store.cleanup_expired().await, 1);
        assert!(store.load("fresh").await.is_some());
    }

    #[tokio::test]
    async fn malformed_entry_hides_only_itself() {
        let (store, backend) = store_with(20, 168);
        store.save(&index("good")).await;

        // corrupt one entry in place
        let raw = backend.get(INDEXES_KEY).await.unwrap().unwrap();
        let mut map: HashMap<String, Value> = serde_json::from_str(&raw).unwrap();
        map.insert("bad".to_string(), Value::String("not an index".into()));
        backend
            .set(INDEXES_KEY, &serde_json::to_string(&map).unwrap())
            .await
            .unwrap();

        assert!(store.load("bad").await.is_none());
        assert!(store.load("good").await.is_some());
    }

    struct FailingBackend;

    #[async_trait]
    impl StorageBackend for FailingBackend {
        async fn get(&self, _key: &str) -> Result<Option<String>> {
            anyhow::bail!("backend offline")
        }
        async fn set(&self, _key: &str, _value: &str) -> Result<()> {
            anyhow::bail!("backend offline")
        }
        async fn remove(&self, _key: &str) -> Result<()> {
            anyhow::bail!("backend offline")
        }
    }

    #[tokio::test]
    async fn backend_failure_falls_back_in_process() {
        let store = IndexStore::new(
            Arc::new(FailingBackend),
            StoreConfig {
                max_entries: 20,
                ttl_hours: 168,
            },
        );
        store.save(&index("x")).await;
        // served from the fallback map, no error surfaced
        assert!(store.load("x").await.is_some());
    }

    #[tokio::test]
    async fn fallback_load_removes_expired_entries() {
        let store = IndexStore::new(
            Arc::new(FailingBackend),
            StoreConfig {
                max_entries: 20,
                ttl_hours: 1,
            },
        );
        // first save trips the fallback, then the stale entry lands there
        let mut stale = index("old");
        stale.meta.created_at = Utc::now() - Duration::hours(3);
        store.save(&stale).await;

        assert!(store.load("old").await.is_none());
        // already gone, so the sweep finds nothing left to drop
        assert_eq!(store.cleanup_expired().await, 0);
    }
}
