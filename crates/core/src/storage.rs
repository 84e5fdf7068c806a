//! Persistent key-value store contract consumed by the rewards engine.
//!
//! Implementations live in `rewards-store`. Values are opaque strings; the
//! engine owns their encoding.

use crate::error::RewardsResult;
use async_trait::async_trait;

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> RewardsResult<Option<String>>;

    async fn multi_get(&self, keys: &[&str]) -> RewardsResult<Vec<Option<String>>> {
        let mut values = Vec::with_capacity(keys.len());
        for key in keys {
            values.push(self.get(key).await?);
        }
        Ok(values)
    }

    async fn set(&self, key: &str, value: String) -> RewardsResult<()>;

    /// Write every entry or none of them.
    async fn multi_set(&self, entries: Vec<(String, String)>) -> RewardsResult<()>;
}
