#![allow(dead_code)]

use giveaway_bot::config::{Cadence, ServiceSettings};
use giveaway_bot::db::models::{GiveawayKey, Location, MessageRef};
use giveaway_bot::db::{KvStore, MemoryStore};
use giveaway_bot::giveaway::{GiveawayService, StartRequest};
use giveaway_bot::transport::{RenderOutcome, Transport};
use serenity::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const ADMIN: u64 = 1;
pub const KEY: GiveawayKey = GiveawayKey { chat_id: 500, thread_id: None };

#[derive(Debug, Clone)]
pub struct Sent {
    pub message: MessageRef,
    pub location: Location,
    pub text: String,
    pub with_button: bool,
}

#[derive(Debug, Clone)]
pub struct Edit {
    pub message: MessageRef,
    pub text: String,
    pub with_button: bool,
    pub failed: bool,
}

/// Records everything the service says; sends and edits can be made to fail on demand.
#[derive(Default)]
pub struct FakeTransport {
    next_id: AtomicU64,
    pub fail_sends: AtomicBool,
    pub fail_edits: AtomicBool,
    /// Applied to the next send only.
    send_delay: Mutex<Option<Duration>>,
    /// Applied to every edit while set.
    edit_delay: Mutex<Option<Duration>>,
    sent: Mutex<Vec<Sent>>,
    edits: Mutex<Vec<Edit>>,
    photos: Mutex<Vec<(Location, String, String)>>,
}

impl FakeTransport {
    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn edits(&self) -> Vec<Edit> {
        self.edits.lock().unwrap().clone()
    }

    pub fn photos(&self) -> Vec<(Location, String, String)> {
        self.photos.lock().unwrap().clone()
    }

    /// Plain messages, i.e. everything except live announcements.
    pub fn notices(&self) -> Vec<Sent> {
        self.sent().into_iter().filter(|s| !s.with_button).collect()
    }

    pub fn set_fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_edits(&self, fail: bool) {
        self.fail_edits.store(fail, Ordering::SeqCst);
    }

    pub fn delay_next_send(&self, delay: Duration) {
        *self.send_delay.lock().unwrap() = Some(delay);
    }

    pub fn set_edit_delay(&self, delay: Option<Duration>) {
        *self.edit_delay.lock().unwrap() = delay;
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn send_message(
        &self,
        location: Location,
        text: &str,
        join_button: Option<GiveawayKey>,
    ) -> anyhow::Result<MessageRef> {
        let delay = self.send_delay.lock().unwrap().take();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_sends.load(Ordering::SeqCst) {
            anyhow::bail!("send refused");
        }
        let message = MessageRef {
            channel_id: location.channel_id(),
            message_id: 1000 + self.next_id.fetch_add(1, Ordering::SeqCst),
        };
        self.sent.lock().unwrap().push(Sent {
            message,
            location,
            text: text.to_string(),
            with_button: join_button.is_some(),
        });
        Ok(message)
    }

    async fn edit_message(&self, message: MessageRef, text: &str, join_button: Option<GiveawayKey>) -> RenderOutcome {
        let delay = *self.edit_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let failed = self.fail_edits.load(Ordering::SeqCst);
        self.edits.lock().unwrap().push(Edit {
            message,
            text: text.to_string(),
            with_button: join_button.is_some(),
            failed,
        });
        if failed {
            RenderOutcome::Failed("edit refused".into())
        } else {
            RenderOutcome::Changed
        }
    }

    async fn send_photo(&self, location: Location, url: &str, caption: &str) -> anyhow::Result<MessageRef> {
        self.photos.lock().unwrap().push((location, url.to_string(), caption.to_string()));
        Ok(MessageRef { channel_id: location.channel_id(), message_id: 1 })
    }
}

/// In-memory store whose next loads or saves can be made to fail.
#[derive(Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    pub fail_loads: AtomicUsize,
    pub fail_saves: AtomicUsize,
}

impl FlakyStore {
    pub fn fail_next_loads(&self, n: usize) {
        self.fail_loads.store(n, Ordering::SeqCst);
    }

    pub fn fail_next_saves(&self, n: usize) {
        self.fail_saves.store(n, Ordering::SeqCst);
    }

    fn take_failure(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl KvStore for FlakyStore {
    async fn load(&self, name: &str) -> anyhow::Result<Option<String>> {
        if Self::take_failure(&self.fail_loads) {
            anyhow::bail!("connection reset while reading `{name}`");
        }
        self.inner.load(name).await
    }

    async fn save(&self, name: &str, payload: &str) -> anyhow::Result<()> {
        if Self::take_failure(&self.fail_saves) {
            anyhow::bail!("connection reset while writing `{name}`");
        }
        self.inner.save(name, payload).await
    }
}

pub fn settings() -> ServiceSettings {
    ServiceSettings {
        admin_ids: HashSet::from([ADMIN]),
        cadence: Cadence::default(),
        draw_pause: Duration::ZERO,
        ..ServiceSettings::default()
    }
}

pub fn service_with(settings: ServiceSettings) -> (Arc<GiveawayService>, Arc<FakeTransport>) {
    let transport = Arc::new(FakeTransport::default());
    let service = GiveawayService::new(transport.clone(), Arc::new(MemoryStore::default()), settings);
    (service, transport)
}

pub fn service_on_flaky_store() -> (Arc<GiveawayService>, Arc<FakeTransport>, Arc<FlakyStore>) {
    let transport = Arc::new(FakeTransport::default());
    let store = Arc::new(FlakyStore::default());
    let service = GiveawayService::new(transport.clone(), store.clone(), settings());
    (service, transport, store)
}

pub fn service() -> (Arc<GiveawayService>, Arc<FakeTransport>) {
    service_with(settings())
}

pub fn start_request(winners: i64, duration: &str, prize: &str, role: Option<&str>) -> StartRequest {
    StartRequest {
        key: KEY,
        requester_id: ADMIN,
        requester_mention: "<@1>".into(),
        winners,
        duration: duration.into(),
        role: role.map(str::to_string),
        prize: prize.into(),
    }
}

/// Moves the paused clock forward and lets every woken task run to completion.
pub async fn advance(secs: u64) {
    tokio::time::sleep(Duration::from_secs(secs)).await;
    settle().await;
}

/// Lets spawned work (such as the re-render after an entry) run without moving the clock.
pub async fn settle() {
    for _ in 0..50 {
        tokio::task::yield_now().await;
    }
}

pub async fn join_all(service: &Arc<GiveawayService>, ids: &[u64]) {
    for id in ids {
        service
            .participate(KEY, *id, &format!("user{id}"))
            .await
            .expect("participation accepted");
    }
}
