//! In-process key-value store. Backs tests and ephemeral sessions.
//!
//! A single lock guards the whole map so `multi_set` is atomic.

use async_trait::async_trait;
use parking_lot::RwLock;
use rewards_core::{KeyValueStore, RewardsError, RewardsResult};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    writes: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from existing entries, e.g. state written by an older session.
    pub fn with_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let store = Self::default();
        {
            let mut map = store.entries.write();
            for (k, v) in entries {
                map.insert(k.into(), v.into());
            }
        }
        store
    }

    /// Make every subsequent read fail until cleared.
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent write fail until cleared.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Successful write calls so far (`set` and `multi_set` each count once).
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    /// Copy of the raw entries.
    pub fn dump(&self) -> HashMap<String, String> {
        self.entries.read().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    fn check_writable(&self) -> RewardsResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            metrics::counter!("store.memory.write_failures").increment(1);
            return Err(RewardsError::StorageWrite(
                "memory store rejected write (injected failure)".into(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> RewardsResult<Option<String>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(RewardsError::StorageRead {
                key: key.to_string(),
                message: "memory store rejected read (injected failure)".into(),
            });
        }
        Ok(self.entries.read().get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> RewardsResult<()> {
        self.check_writable()?;
        self.entries.write().insert(key.to_string(), value);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn multi_set(&self, entries: Vec<(String, String)>) -> RewardsResult<()> {
        self.check_writable()?;
        let mut map = self.entries.write();
        for (key, value) in entries {
            map.insert(key, value);
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_set() {
        let store = MemoryStore::new();
        assert_eq!(store.get("a").await.unwrap(), None);
        store.set("a", "1".into()).await.unwrap();
        assert_eq!(store.get("a").await.unwrap().as_deref(), Some("1"));
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test]
    async fn test_multi_set_and_multi_get() {
        let store = MemoryStore::new();
        store
            .multi_set(vec![("a".into(), "1".into()), ("b".into(), "2".into())])
            .await
            .unwrap();
        let values = store.multi_get(&["a", "b", "c"]).await.unwrap();
        assert_eq!(values, vec![Some("1".into()), Some("2".into()), None]);
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test]
    async fn test_failed_multi_set_writes_nothing() {
        let store = MemoryStore::with_entries([("a", "old")]);
        store.fail_writes(true);
        let err = store
            .multi_set(vec![("a".into(), "new".into()), ("b".into(), "2".into())])
            .await
            .unwrap_err();
        assert!(err.is_storage_failure());
        assert_eq!(store.dump().get("a").map(String::as_str), Some("old"));
        assert!(!store.dump().contains_key("b"));
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_injected_read_failure() {
        let store = MemoryStore::with_entries([("a", "1")]);
        store.fail_reads(true);
        assert!(matches!(
            store.get("a").await,
            Err(RewardsError::StorageRead { .. })
        ));
        store.fail_reads(false);
        assert!(store.get("a").await.is_ok());
    }
}
