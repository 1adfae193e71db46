use anyhow::Context;
use redis::AsyncCommands;
use serenity::async_trait;

use super::KvStore;

const KEY_PREFIX: &str = "giveaway_bot:";

fn key_for(name: &str) -> String { format!("{}{}", KEY_PREFIX, name) }

/// Stores each document as a plain string value under `giveaway_bot:<name>`.
pub struct RedisStore {
    client: redis::Client,
}

impl RedisStore {
    pub fn open(url: &str) -> anyhow::Result<Self> {
        let client = redis::Client::open(url).context("redis client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl KvStore for RedisStore {
    async fn load(&self, name: &str) -> anyhow::Result<Option<String>> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .context("redis connect")?;
        let v: Option<String> = conn.get(key_for(name)).await.context("redis GET store")?;
        Ok(v)
    }

    async fn save(&self, name: &str, payload: &str) -> anyhow::Result<()> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .context("redis connect")?;
        let _: () = conn.set(key_for(name), payload).await.context("redis SET store")?;
        Ok(())
    }
}
