//! Giveaway lifecycle.
//!
//! `start` puts a giveaway in the registry (Open) and arms its timers. The
//! transition timer moves it to FinalMinute and swaps the slow countdown for
//! the fast one. The draw timer claims it (Drawing), announces the winners,
//! records the history and removes it (closed). `cancel` removes it from
//! Open/FinalMinute without touching history.

pub mod registry;
pub mod selection;

use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::config::ServiceSettings;
use crate::db::models::{GiveawayKey, GiveawayState, HistoryRecord, MessageRef, Phase};
use crate::db::repo::{HistoryStore, RoleStore};
use crate::db::KvStore;
use crate::error::{GiveawayError, GiveawayResult};
use crate::tasks::{Scheduler, Tick, TimerSlot};
use crate::transport::{RenderOutcome, Transport};
use crate::ui::embeds;
use crate::utils::{normalize_role, parse_duration, sanitize_prize};

pub use registry::{GiveawayRegistry, JoinOutcome};

const HISTORY_ATTEMPTS: u32 = 3;
const HISTORY_RETRY_PAUSE: Duration = Duration::from_secs(1);

/// Arguments of the start command, already pulled out of the platform's payload.
#[derive(Debug, Clone)]
pub struct StartRequest {
    pub key: GiveawayKey,
    pub requester_id: u64,
    pub requester_mention: String,
    pub winners: i64,
    pub duration: String,
    pub role: Option<String>,
    pub prize: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartReceipt {
    pub announcement: MessageRef,
    pub end_time: DateTime<Utc>,
    pub prize: String,
}

pub struct GiveawayService {
    registry: GiveawayRegistry,
    scheduler: Scheduler,
    transport: Arc<dyn Transport>,
    roles: RoleStore,
    history: HistoryStore,
    settings: ServiceSettings,
}

impl GiveawayService {
    pub fn new(transport: Arc<dyn Transport>, store: Arc<dyn KvStore>, settings: ServiceSettings) -> Arc<Self> {
        Arc::new(Self {
            registry: GiveawayRegistry::new(),
            scheduler: Scheduler::new(),
            transport,
            roles: RoleStore::new(store.clone()),
            history: HistoryStore::new(store),
            settings,
        })
    }

    pub fn is_admin(&self, user_id: u64) -> bool {
        self.settings.admin_ids.contains(&user_id)
    }

    fn require_admin(&self, user_id: u64) -> GiveawayResult<()> {
        if self.is_admin(user_id) { Ok(()) } else { Err(GiveawayError::AdminOnly) }
    }

    pub fn registry(&self) -> &GiveawayRegistry {
        &self.registry
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn snapshot(&self, key: &GiveawayKey) -> Option<GiveawayState> {
        self.registry.get(key)
    }

    pub async fn history_record(&self, announcement_id: u64) -> Option<HistoryRecord> {
        self.history.get(announcement_id).await
    }

    /* ---------- lifecycle ---------- */

    pub async fn start(self: &Arc<Self>, req: StartRequest) -> GiveawayResult<StartReceipt> {
        self.require_admin(req.requester_id)?;
        if self.registry.is_live(&req.key) {
            return Err(GiveawayError::AlreadyRunning);
        }

        let winners_requested = u32::try_from(req.winners)
            .ok()
            .filter(|w| *w > 0)
            .ok_or(GiveawayError::InvalidWinnerCount)?;
        let token = req.duration.trim();
        let span = parse_duration(token).ok_or_else(|| GiveawayError::InvalidDuration(token.to_string()))?;
        let prize = sanitize_prize(&req.prize);
        if prize.is_empty() {
            return Err(GiveawayError::MissingPrize);
        }
        let required_role = match req.role.as_deref().map(normalize_role).filter(|r| !r.is_empty()) {
            Some(role) => {
                if !self.roles.snapshot().await.exists(&role) {
                    return Err(GiveawayError::UnknownRole(role));
                }
                Some(role)
            }
            None => None,
        };

        let now = Utc::now();
        let end_time = now
            .checked_add_signed(span)
            .ok_or_else(|| GiveawayError::InvalidDuration(token.to_string()))?;
        let until_end = span
            .to_std()
            .map_err(|_| GiveawayError::InvalidDuration(token.to_string()))?;
        // fixed before the announcement goes out so send latency does not push the draw back
        let deadline = Instant::now()
            .checked_add(until_end)
            .ok_or_else(|| GiveawayError::InvalidDuration(token.to_string()))?;

        let state = GiveawayState {
            prize: prize.clone(),
            end_time,
            organizer_id: req.requester_id,
            organizer: req.requester_mention,
            winners_requested,
            required_role,
            participants: Default::default(),
            announcement: None,
            location: req.key.location(),
            phase: Phase::Open,
        };
        self.registry.insert_new(req.key, state.clone())?;

        let text = embeds::render_live(&state, now, self.settings.display_tz);
        let announcement = match self.transport.send_message(state.location, &text, Some(req.key)).await {
            Ok(m) => m,
            Err(e) => {
                self.registry.remove(&req.key);
                error!(key = %req.key, "giveaway announcement failed, rolled back: {e:#}");
                return Err(GiveawayError::Transport(e.to_string()));
            }
        };
        if !self.registry.set_announcement(&req.key, announcement) {
            // cancelled while the announcement was in flight
            let _ = self.transport.edit_message(announcement, &embeds::render_cancelled(&state), None).await;
            return Err(GiveawayError::NoActiveGiveaway);
        }
        self.arm_timers(req.key, deadline);

        info!(key = %req.key, %prize, winners = winners_requested, %end_time, "giveaway started");
        Ok(StartReceipt { announcement, end_time, prize })
    }

    fn arm_timers(self: &Arc<Self>, key: GiveawayKey, deadline: Instant) {
        let cadence = self.settings.cadence;
        let until_end = deadline.saturating_duration_since(Instant::now());

        let svc = self.clone();
        self.scheduler.schedule_once(key, TimerSlot::Draw, until_end, async move {
            svc.draw(key).await;
        });

        if until_end > cadence.fast_only_threshold {
            self.start_countdown(key, TimerSlot::SlowRefresh, cadence.slow_interval, cadence.slow_interval);
            let svc = self.clone();
            let until_final = until_end.saturating_sub(cadence.final_phase);
            self.scheduler.schedule_once(key, TimerSlot::Transition, until_final, async move {
                svc.enter_final_minute(key);
            });
        } else {
            self.start_countdown(key, TimerSlot::FastRefresh, Duration::ZERO, cadence.fast_interval);
        }
    }

    fn start_countdown(self: &Arc<Self>, key: GiveawayKey, slot: TimerSlot, first_delay: Duration, every: Duration) {
        let svc = self.clone();
        self.scheduler.schedule_repeating(key, slot, first_delay, every, move || {
            let svc = svc.clone();
            async move { svc.refresh(key, slot).await }
        });
    }

    /// One countdown tick. A failed edit stops only the timer that made it.
    async fn refresh(&self, key: GiveawayKey, slot: TimerSlot) -> Tick {
        let Some(state) = self.registry.get(&key) else { return Tick::Stop; };
        if !state.phase.accepts_participants() {
            return Tick::Stop;
        }
        let Some(message) = state.announcement else { return Tick::Continue; };

        let text = embeds::render_live(&state, Utc::now(), self.settings.display_tz);
        match self.transport.edit_message(message, &text, Some(key)).await {
            RenderOutcome::Changed | RenderOutcome::Unchanged => Tick::Continue,
            RenderOutcome::Failed(e) => {
                warn!(%key, ?slot, "countdown refresh failed, stopping this timer: {e}");
                Tick::Stop
            }
        }
    }

    fn enter_final_minute(self: &Arc<Self>, key: GiveawayKey) {
        self.scheduler.release(&key, TimerSlot::Transition);
        if !self.registry.enter_final_minute(&key) {
            return;
        }
        self.scheduler.cancel(&key, TimerSlot::SlowRefresh);
        let fast = self.settings.cadence.fast_interval;
        self.start_countdown(key, TimerSlot::FastRefresh, Duration::ZERO, fast);
        info!(%key, "giveaway entered its final minute");
    }

    async fn draw(&self, key: GiveawayKey) {
        self.scheduler.release(&key, TimerSlot::Draw);
        let Some(state) = self.registry.begin_draw(&key) else { return; };
        self.scheduler.cancel_all(&key);

        if let Some(message) = state.announcement {
            let notice = embeds::render_drawing(&state.prize);
            if let RenderOutcome::Failed(e) = self.transport.edit_message(message, &notice, None).await {
                warn!(%key, "could not show the drawing notice: {e}");
            }
        }
        tokio::time::sleep(self.settings.draw_pause).await;

        let roles = self.roles.snapshot().await;
        let pool = selection::eligible_pool(
            &state.participants,
            state.required_role.as_deref(),
            &roles,
            &self.settings.admin_ids,
        );
        let winners = {
            let mut rng = rand::thread_rng();
            selection::draw_winners(&pool, state.winners_requested as usize, &mut rng).unwrap_or_default()
        };
        let named: Vec<(u64, String)> = winners
            .iter()
            .map(|id| (*id, state.participants.get(id).cloned().unwrap_or_default()))
            .collect();

        let text = embeds::render_result(&state.prize, &named);
        let result = match self.transport.send_message(state.location, &text, None).await {
            Ok(m) => m,
            Err(e) => {
                self.registry.remove(&key);
                error!(%key, "result announcement failed, giveaway dropped: {e:#}");
                let notice = embeds::render_unannounced(&state.prize);
                let _ = self.transport.send_message(state.location, &notice, None).await;
                return;
            }
        };

        if let Some(url) = &self.settings.result_image_url {
            let caption = embeds::render_photo_caption(&state.prize, winners.len());
            if let Err(e) = self.transport.send_photo(state.location, url, &caption).await {
                warn!(%key, "result photo failed: {e:#}");
            }
        }

        let record = HistoryRecord {
            prize: state.prize.clone(),
            participants: state.participants.clone(),
            winner_ids: winners.clone(),
            location: state.location,
        };
        if !self.record_history(key, result.message_id, record).await {
            let notice = embeds::render_unrecorded(&state.prize);
            if let Err(e) = self.transport.send_message(state.location, &notice, None).await {
                warn!(%key, "could not post the unrecorded-result notice: {e:#}");
            }
        }

        if let Some(message) = state.announcement {
            let ended = embeds::render_ended(&state, winners.len());
            if let RenderOutcome::Failed(e) = self.transport.edit_message(message, &ended, None).await {
                warn!(%key, "could not close the announcement: {e}");
            }
        }

        self.registry.remove(&key);
        info!(%key, participants = state.participants.len(), winners = ?winners, announcement = result.message_id, "giveaway drawn");
    }

    /// Saves the draw under its result announcement, retrying a few times.
    async fn record_history(&self, key: GiveawayKey, announcement_id: u64, record: HistoryRecord) -> bool {
        for attempt in 1..=HISTORY_ATTEMPTS {
            match self.history.insert(announcement_id, record.clone()).await {
                Ok(()) => return true,
                Err(e) if attempt < HISTORY_ATTEMPTS => {
                    warn!(%key, announcement = announcement_id, attempt, "history write failed, retrying: {e:#}");
                    tokio::time::sleep(HISTORY_RETRY_PAUSE * attempt).await;
                }
                Err(e) => {
                    error!(%key, announcement = announcement_id, "history write failed, result cannot be rerolled: {e:#}");
                }
            }
        }
        false
    }

    pub async fn cancel(&self, key: GiveawayKey, requester_id: u64) -> GiveawayResult<GiveawayState> {
        self.require_admin(requester_id)?;
        let state = self.registry.take_for_cancel(&key)?;
        self.scheduler.cancel_all(&key);

        if let Some(message) = state.announcement {
            let text = embeds::render_cancelled(&state);
            if let RenderOutcome::Failed(e) = self.transport.edit_message(message, &text, None).await {
                warn!(%key, "could not mark the announcement cancelled: {e}");
            }
        }
        info!(%key, prize = %state.prize, "giveaway cancelled");
        Ok(state)
    }

    /* ---------- participation ---------- */

    /// Records an entry. The announcement is re-rendered in the background so the
    /// caller can acknowledge the click without waiting on the chat.
    pub async fn participate(
        self: &Arc<Self>,
        key: GiveawayKey,
        user_id: u64,
        display_name: &str,
    ) -> GiveawayResult<JoinOutcome> {
        let state = self
            .registry
            .get(&key)
            .filter(|s| s.phase.accepts_participants())
            .ok_or(GiveawayError::NoActiveGiveaway)?;

        if let Some(role) = state.required_role.as_deref() {
            let roles = self.roles.snapshot().await;
            if !selection::is_eligible(user_id, Some(role), &roles, &self.settings.admin_ids) {
                return Err(GiveawayError::RoleRequired(role.to_string()));
            }
        }

        let outcome = self.registry.add_participant(&key, user_id, display_name.to_string())?;
        if outcome == JoinOutcome::Joined {
            let svc = self.clone();
            tokio::spawn(async move { svc.render_entries(key).await });
        }
        Ok(outcome)
    }

    async fn render_entries(&self, key: GiveawayKey) {
        let Some(current) = self.registry.get(&key).filter(|s| s.phase.accepts_participants()) else { return; };
        let Some(message) = current.announcement else { return; };
        let text = embeds::render_live(&current, Utc::now(), self.settings.display_tz);
        if let RenderOutcome::Failed(e) = self.transport.edit_message(message, &text, Some(key)).await {
            warn!(%key, "could not refresh after a new entry: {e}");
        }
    }

    /* ---------- reroll ---------- */

    /// Draws one more winner for a finished giveaway and announces it.
    /// The history is rolled back if the announcement cannot be sent.
    pub async fn reroll(&self, requester_id: u64, announcement_id: u64) -> GiveawayResult<u64> {
        self.require_admin(requester_id)?;

        let (winner, record) = self
            .history
            .update(announcement_id, |record| {
                let pick = {
                    let mut rng = rand::thread_rng();
                    selection::reroll_winner(record, &mut rng)
                };
                let pick = pick.ok_or(GiveawayError::NoEligibleParticipants)?;
                record.winner_ids.push(pick);
                Ok(pick)
            })
            .await?;

        let name = record.participants.get(&winner).cloned().unwrap_or_default();
        let text = embeds::render_reroll(&record.prize, winner, &name);
        if let Err(e) = self.transport.send_message(record.location, &text, None).await {
            error!(announcement = announcement_id, "reroll announcement failed, reverting: {e:#}");
            let revert = self
                .history
                .update(announcement_id, |r| {
                    if r.winner_ids.last() == Some(&winner) {
                        r.winner_ids.pop();
                    }
                    Ok(())
                })
                .await;
            if let Err(e) = revert {
                error!(announcement = announcement_id, "reroll revert failed: {e}");
            }
            return Err(GiveawayError::Transport(e.to_string()));
        }

        info!(announcement = announcement_id, winner, "giveaway rerolled");
        Ok(winner)
    }

    /* ---------- roles ---------- */

    pub async fn assign_role(&self, requester_id: u64, role: &str, member: u64) -> GiveawayResult<bool> {
        self.require_admin(requester_id)?;
        let role = normalize_role(role);
        if role.is_empty() {
            return Err(GiveawayError::UnknownRole(role));
        }
        let added = self.roles.assign(&role, member).await?;
        info!(%role, member, added, "role assigned");
        Ok(added)
    }

    pub async fn remove_role(&self, requester_id: u64, role: &str, member: u64) -> GiveawayResult<bool> {
        self.require_admin(requester_id)?;
        let role = normalize_role(role);
        let removed = self.roles.remove(&role, member).await?;
        info!(%role, member, removed, "role removed");
        Ok(removed)
    }

    pub async fn role_members(&self, requester_id: u64, role: &str) -> GiveawayResult<BTreeSet<u64>> {
        self.require_admin(requester_id)?;
        Ok(self.roles.members(role).await)
    }

    pub async fn roles_of(&self, member: u64) -> Vec<String> {
        self.roles.roles_of(member).await
    }
}
