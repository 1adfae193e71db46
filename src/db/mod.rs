use dashmap::DashMap;
use serenity::async_trait;
use std::sync::Arc;

use crate::config::StorageConfig;

pub mod json_store;
pub mod models;
pub mod redis_store;
pub mod repo;

pub const ROLES_STORE: &str = "roles";
pub const HISTORY_STORE: &str = "history";

/// Whole-document key-value persistence. Good enough for a single writer.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// `Ok(None)` when nothing has been saved under `name` yet.
    async fn load(&self, name: &str) -> anyhow::Result<Option<String>>;
    async fn save(&self, name: &str, payload: &str) -> anyhow::Result<()>;
}

pub async fn open_store(config: &StorageConfig) -> anyhow::Result<Arc<dyn KvStore>> {
    let store: Arc<dyn KvStore> = match config {
        StorageConfig::Json { dir } => Arc::new(json_store::JsonFileStore::open(dir).await?),
        StorageConfig::Redis { url } => Arc::new(redis_store::RedisStore::open(url)?),
        StorageConfig::Memory => Arc::new(MemoryStore::default()),
    };
    Ok(store)
}

/// Process-local store; nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    docs: DashMap<String, String>,
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn load(&self, name: &str) -> anyhow::Result<Option<String>> {
        Ok(self.docs.get(name).map(|d| d.value().clone()))
    }

    async fn save(&self, name: &str, payload: &str) -> anyhow::Result<()> {
        self.docs.insert(name.to_string(), payload.to_string());
        Ok(())
    }
}
