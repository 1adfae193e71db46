use anyhow::Context;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::models::{HistoryBook, HistoryRecord, RoleBook};
use super::{KvStore, HISTORY_STORE, ROLES_STORE};
use crate::error::{GiveawayError, GiveawayResult};

/// Unreadable or corrupt documents load as empty instead of failing the command.
/// Only for queries; writers go through [`load_for_write`].
async fn load_or_default<T: DeserializeOwned + Default>(kv: &dyn KvStore, name: &str) -> T {
    let raw = match kv.load(name).await {
        Ok(Some(raw)) => raw,
        Ok(None) => return T::default(),
        Err(e) => {
            tracing::warn!("store `{name}` unreadable, treating as empty: {e:#}");
            return T::default();
        }
    };
    match serde_json::from_str(&raw) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!("store `{name}` is corrupt, treating as empty: {e}");
            T::default()
        }
    }
}

/// Load ahead of a read-modify-write. A failed read is an error: saving an empty
/// document on top of one we could not read would wipe it. A corrupt document is
/// copied aside under `<name>.corrupt-<uuid>` before starting over from empty.
async fn load_for_write<T: DeserializeOwned + Default>(kv: &dyn KvStore, name: &str) -> anyhow::Result<T> {
    let Some(raw) = kv.load(name).await.with_context(|| format!("load `{name}`"))? else {
        return Ok(T::default());
    };
    match serde_json::from_str(&raw) {
        Ok(v) => Ok(v),
        Err(e) => {
            let backup = format!("{name}.corrupt-{}", Uuid::new_v4());
            kv.save(&backup, &raw)
                .await
                .with_context(|| format!("back up corrupt `{name}`"))?;
            tracing::warn!("store `{name}` is corrupt ({e}), moved aside to `{backup}`");
            Ok(T::default())
        }
    }
}

async fn persist<T: Serialize>(kv: &dyn KvStore, name: &str, doc: &T) -> anyhow::Result<()> {
    let payload = serde_json::to_string_pretty(doc).with_context(|| format!("serialize `{name}`"))?;
    kv.save(name, &payload).await.with_context(|| format!("save `{name}`"))
}

/// Admin-managed roles, read-modify-written on every change.
pub struct RoleStore {
    kv: Arc<dyn KvStore>,
    write: Mutex<()>,
}

impl RoleStore {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv, write: Mutex::new(()) }
    }

    pub async fn snapshot(&self) -> RoleBook {
        load_or_default(self.kv.as_ref(), ROLES_STORE).await
    }

    /// `Ok(false)` when the member already held the role.
    pub async fn assign(&self, role: &str, member: u64) -> anyhow::Result<bool> {
        let _guard = self.write.lock().await;
        let mut book: RoleBook = load_for_write(self.kv.as_ref(), ROLES_STORE).await?;
        let added = book.assign(role, member);
        if added {
            persist(self.kv.as_ref(), ROLES_STORE, &book).await?;
        }
        Ok(added)
    }

    /// `Ok(false)` when the member did not hold the role.
    pub async fn remove(&self, role: &str, member: u64) -> anyhow::Result<bool> {
        let _guard = self.write.lock().await;
        let mut book: RoleBook = load_for_write(self.kv.as_ref(), ROLES_STORE).await?;
        let removed = book.remove(role, member);
        if removed {
            persist(self.kv.as_ref(), ROLES_STORE, &book).await?;
        }
        Ok(removed)
    }

    pub async fn members(&self, role: &str) -> BTreeSet<u64> {
        self.snapshot().await.members(role)
    }

    pub async fn roles_of(&self, member: u64) -> Vec<String> {
        self.snapshot().await.roles_of(member)
    }
}

/// Finished giveaways keyed by their result announcement id. Never expires.
pub struct HistoryStore {
    kv: Arc<dyn KvStore>,
    write: Mutex<()>,
}

impl HistoryStore {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv, write: Mutex::new(()) }
    }

    pub async fn get(&self, announcement_id: u64) -> Option<HistoryRecord> {
        let mut book: HistoryBook = load_or_default(self.kv.as_ref(), HISTORY_STORE).await;
        book.0.remove(&announcement_id)
    }

    pub async fn insert(&self, announcement_id: u64, record: HistoryRecord) -> anyhow::Result<()> {
        let _guard = self.write.lock().await;
        let mut book: HistoryBook = load_for_write(self.kv.as_ref(), HISTORY_STORE).await?;
        book.0.insert(announcement_id, record);
        persist(self.kv.as_ref(), HISTORY_STORE, &book).await
    }

    /// Runs `f` on the record and saves it only if `f` succeeds, so a failed
    /// update never leaves a half-written record behind.
    pub async fn update<T>(
        &self,
        announcement_id: u64,
        f: impl FnOnce(&mut HistoryRecord) -> GiveawayResult<T>,
    ) -> GiveawayResult<(T, HistoryRecord)> {
        let _guard = self.write.lock().await;
        let mut book: HistoryBook = load_for_write(self.kv.as_ref(), HISTORY_STORE).await?;
        let record = book.0.get_mut(&announcement_id).ok_or(GiveawayError::HistoryNotFound)?;
        let out = f(record)?;
        let updated = record.clone();
        persist(self.kv.as_ref(), HISTORY_STORE, &book).await?;
        Ok((out, updated))
    }
}
