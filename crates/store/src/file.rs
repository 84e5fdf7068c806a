//! Durable key-value store persisted as one JSON object on disk.
//!
//! Every write serializes the full map to `<path>.tmp`, syncs it, and renames
//! it over `<path>`, so a crash leaves either the old map or the new one.

use async_trait::async_trait;
use rewards_core::{KeyValueStore, RewardsError, RewardsResult};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub struct FileStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileStore {
    /// Open (or lazily create) the store at `path`. A missing file is an
    /// empty store; an unreadable or corrupt one is logged and treated as empty.
    pub async fn open(path: impl Into<PathBuf>) -> RewardsResult<Self> {
        let path = path.into();

        let entries = match tokio::fs::read(&path).await {
            Ok(bytes) => match serde_json::from_slice::<BTreeMap<String, String>>(&bytes) {
                Ok(map) => map,
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "Store file is corrupt, starting empty"
                    );
                    metrics::counter!("store.file.corrupt").increment(1);
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                return Err(RewardsError::StorageRead {
                    key: path.display().to_string(),
                    message: e.to_string(),
                })
            }
        };

        info!(path = %path.display(), keys = entries.len(), "File store opened");

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    async fn persist(&self, map: &BTreeMap<String, String>) -> RewardsResult<()> {
        let json = serde_json::to_vec_pretty(map)?;
        let tmp = self.tmp_path();

        let write = async {
            let mut file = tokio::fs::File::create(&tmp).await?;
            file.write_all(&json).await?;
            file.sync_all().await?;
            drop(file);
            tokio::fs::rename(&tmp, &self.path).await?;
            Ok::<(), std::io::Error>(())
        };

        write.await.map_err(|e| {
            metrics::counter!("store.file.write_failures").increment(1);
            warn!(path = %self.path.display(), error = %e, "Store write failed");
            RewardsError::StorageWrite(format!("{}: {e}", self.path.display()))
        })?;

        debug!(path = %self.path.display(), bytes = json.len(), "Store flushed");
        Ok(())
    }

    async fn apply(&self, updates: Vec<(String, String)>) -> RewardsResult<()> {
        let mut entries = self.entries.lock().await;
        let mut next = entries.clone();
        for (key, value) in updates {
            next.insert(key, value);
        }
        self.persist(&next).await?;
        *entries = next;
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> RewardsResult<Option<String>> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> RewardsResult<()> {
        self.apply(vec![(key.to_string(), value)]).await
    }

    async fn multi_set(&self, entries: Vec<(String, String)>) -> RewardsResult<()> {
        self.apply(entries).await
    }
}
