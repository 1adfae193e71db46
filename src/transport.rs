use anyhow::Context;
use dashmap::DashMap;
use serenity::all::{ChannelId, Colour, CreateEmbed, CreateMessage, EditMessage, Http, MessageId};
use serenity::async_trait;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::db::models::{GiveawayKey, Location, MessageRef};
use crate::ui::menus;

/// Result of re-rendering a message in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderOutcome {
    Changed,
    /// The message already shows this content; nothing was sent.
    Unchanged,
    Failed(String),
}

/// The chat platform as the giveaway logic sees it.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Posts `text`. With `join_button` set, the message carries the participate button for that giveaway.
    async fn send_message(
        &self,
        location: Location,
        text: &str,
        join_button: Option<GiveawayKey>,
    ) -> anyhow::Result<MessageRef>;

    async fn edit_message(&self, message: MessageRef, text: &str, join_button: Option<GiveawayKey>) -> RenderOutcome;

    async fn send_photo(&self, location: Location, url: &str, caption: &str) -> anyhow::Result<MessageRef>;
}

fn fingerprint(text: &str, join_button: Option<GiveawayKey>) -> u64 {
    let mut h = DefaultHasher::new();
    text.hash(&mut h);
    join_button.hash(&mut h);
    h.finish()
}

/// Last rendered content of every live announcement, so identical re-renders skip the HTTP call.
/// Only messages that carry the participate button are tracked; once a message is
/// rendered without it (drawing, ended, cancelled) it is dropped.
#[derive(Debug, Default)]
pub struct RenderCache {
    prints: DashMap<MessageRef, u64>,
}

impl RenderCache {
    pub fn is_unchanged(&self, message: MessageRef, text: &str, join_button: Option<GiveawayKey>) -> bool {
        join_button.is_some()
            && self.prints.get(&message).map_or(false, |p| *p == fingerprint(text, join_button))
    }

    pub fn record(&self, message: MessageRef, text: &str, join_button: Option<GiveawayKey>) {
        if join_button.is_some() {
            self.prints.insert(message, fingerprint(text, join_button));
        } else {
            self.forget(message);
        }
    }

    pub fn forget(&self, message: MessageRef) {
        self.prints.remove(&message);
    }

    pub fn len(&self) -> usize {
        self.prints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prints.is_empty()
    }
}

/// Discord over serenity's HTTP client. Live announcements are embeds with a
/// button row; plain results go out as message content so mentions ping.
pub struct SerenityTransport {
    http: Arc<Http>,
    last_render: RenderCache,
}

impl SerenityTransport {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http, last_render: RenderCache::default() }
    }

    fn announcement_embed(text: &str) -> CreateEmbed {
        CreateEmbed::new().description(text).colour(Colour::GOLD)
    }
}

#[async_trait]
impl Transport for SerenityTransport {
    async fn send_message(
        &self,
        location: Location,
        text: &str,
        join_button: Option<GiveawayKey>,
    ) -> anyhow::Result<MessageRef> {
        let builder = match join_button {
            Some(key) => CreateMessage::new()
                .embed(Self::announcement_embed(text))
                .components(vec![menus::join_button_row(key)]),
            None => CreateMessage::new().content(text),
        };
        let msg = ChannelId::new(location.channel_id())
            .send_message(&*self.http, builder)
            .await
            .context("send message")?;
        let sent = MessageRef { channel_id: msg.channel_id.get(), message_id: msg.id.get() };
        self.last_render.record(sent, text, join_button);
        Ok(sent)
    }

    async fn edit_message(&self, message: MessageRef, text: &str, join_button: Option<GiveawayKey>) -> RenderOutcome {
        if self.last_render.is_unchanged(message, text, join_button) {
            return RenderOutcome::Unchanged;
        }
        let components = join_button.map(|key| vec![menus::join_button_row(key)]).unwrap_or_default();
        let res = ChannelId::new(message.channel_id)
            .edit_message(
                &*self.http,
                MessageId::new(message.message_id),
                EditMessage::new().embed(Self::announcement_embed(text)).components(components),
            )
            .await;
        match res {
            Ok(_) => {
                self.last_render.record(message, text, join_button);
                RenderOutcome::Changed
            }
            Err(e) => {
                if join_button.is_none() {
                    self.last_render.forget(message);
                }
                RenderOutcome::Failed(e.to_string())
            }
        }
    }

    async fn send_photo(&self, location: Location, url: &str, caption: &str) -> anyhow::Result<MessageRef> {
        let msg = ChannelId::new(location.channel_id())
            .send_message(
                &*self.http,
                CreateMessage::new().embed(CreateEmbed::new().image(url).description(caption)),
            )
            .await
            .context("send photo")?;
        Ok(MessageRef { channel_id: msg.channel_id.get(), message_id: msg.id.get() })
    }
}
