use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::db::models::{GiveawayKey, GiveawayState, MessageRef, Phase};
use crate::error::{GiveawayError, GiveawayResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    Joined,
    AlreadyJoined,
}

/// Live giveaways, at most one per key.
///
/// Every method is a single read-modify-write under the map's shard lock,
/// so concurrent clicks and timer callbacks on one key never lose updates.
#[derive(Debug, Default)]
pub struct GiveawayRegistry {
    live: DashMap<GiveawayKey, GiveawayState>,
}

impl GiveawayRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_new(&self, key: GiveawayKey, state: GiveawayState) -> GiveawayResult<()> {
        match self.live.entry(key) {
            Entry::Occupied(_) => Err(GiveawayError::AlreadyRunning),
            Entry::Vacant(v) => {
                v.insert(state);
                Ok(())
            }
        }
    }

    pub fn get(&self, key: &GiveawayKey) -> Option<GiveawayState> {
        self.live.get(key).map(|s| s.value().clone())
    }

    pub fn is_live(&self, key: &GiveawayKey) -> bool {
        self.live.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    pub fn set_announcement(&self, key: &GiveawayKey, message: MessageRef) -> bool {
        match self.live.get_mut(key) {
            Some(mut s) => {
                s.announcement = Some(message);
                true
            }
            None => false,
        }
    }

    pub fn add_participant(&self, key: &GiveawayKey, id: u64, name: String) -> GiveawayResult<JoinOutcome> {
        let mut state = self.live.get_mut(key).ok_or(GiveawayError::NoActiveGiveaway)?;
        if !state.phase.accepts_participants() {
            return Err(GiveawayError::NoActiveGiveaway);
        }
        if state.participants.contains_key(&id) {
            return Ok(JoinOutcome::AlreadyJoined);
        }
        state.participants.insert(id, name);
        Ok(JoinOutcome::Joined)
    }

    /// Open -> FinalMinute. `false` if the giveaway is gone or already past it.
    pub fn enter_final_minute(&self, key: &GiveawayKey) -> bool {
        match self.live.get_mut(key) {
            Some(mut s) if s.phase == Phase::Open => {
                s.phase = Phase::FinalMinute;
                true
            }
            _ => false,
        }
    }

    /// Claims the draw. Only the first caller gets the snapshot, which rules out double draws.
    pub fn begin_draw(&self, key: &GiveawayKey) -> Option<GiveawayState> {
        let mut s = self.live.get_mut(key)?;
        if !s.phase.accepts_participants() {
            return None;
        }
        s.phase = Phase::Drawing;
        Some(s.value().clone())
    }

    /// Removes a giveaway that is not mid-draw.
    pub fn take_for_cancel(&self, key: &GiveawayKey) -> GiveawayResult<GiveawayState> {
        match self.live.entry(*key) {
            Entry::Vacant(_) => Err(GiveawayError::NoActiveGiveaway),
            Entry::Occupied(o) if o.get().phase == Phase::Drawing => Err(GiveawayError::DrawInProgress),
            Entry::Occupied(o) => Ok(o.remove()),
        }
    }

    pub fn remove(&self, key: &GiveawayKey) -> Option<GiveawayState> {
        self.live.remove(key).map(|(_, s)| s)
    }
}
