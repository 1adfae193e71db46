use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use crate::utils::normalize_role;

/// Participant id -> display name. An id appears at most once.
pub type Participants = HashMap<u64, String>;

/// Identifies one live giveaway: a channel plus an optional thread inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GiveawayKey {
    pub chat_id: u64,
    pub thread_id: Option<u64>,
}

impl GiveawayKey {
    pub fn new(chat_id: u64, thread_id: Option<u64>) -> Self {
        Self { chat_id, thread_id }
    }

    pub fn location(&self) -> Location {
        Location { chat_id: self.chat_id, thread_id: self.thread_id }
    }
}

impl fmt::Display for GiveawayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.thread_id {
            Some(thread) => write!(f, "{}/{}", self.chat_id, thread),
            None => write!(f, "{}", self.chat_id),
        }
    }
}

/// Where messages for a giveaway are posted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    pub chat_id: u64,
    #[serde(default)]
    pub thread_id: Option<u64>,
}

impl Location {
    /// Discord threads are channels of their own, so the thread wins when present.
    pub fn channel_id(&self) -> u64 {
        self.thread_id.unwrap_or(self.chat_id)
    }
}

/// Reference to a message the bot posted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageRef {
    pub channel_id: u64,
    pub message_id: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    /// Accepting participants, slow countdown (or fast for short giveaways).
    Open,
    /// Last minute, fast countdown. Cosmetic; eligibility rules are unchanged.
    FinalMinute,
    /// Timers stopped, winners being computed and announced.
    Drawing,
}

impl Phase {
    pub fn accepts_participants(self) -> bool {
        matches!(self, Phase::Open | Phase::FinalMinute)
    }
}

/// A live giveaway as held by the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GiveawayState {
    pub prize: String,
    pub end_time: DateTime<Utc>,
    pub organizer_id: u64,
    pub organizer: String,
    pub winners_requested: u32,
    pub required_role: Option<String>,
    pub participants: Participants,
    pub announcement: Option<MessageRef>,
    pub location: Location,
    pub phase: Phase,
}

/// A finished giveaway, addressable by its result announcement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub prize: String,
    pub participants: Participants,
    pub winner_ids: Vec<u64>,
    pub location: Location,
}

/// Persisted layout: `{ announcement_id: HistoryRecord }`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HistoryBook(pub HashMap<u64, HistoryRecord>);

/// Role name (lowercase) -> member ids. Persisted as `{ role: [member_id, ...] }`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleBook(pub BTreeMap<String, BTreeSet<u64>>);

impl RoleBook {
    /// Returns `true` if the member was not already in the role.
    pub fn assign(&mut self, role: &str, member: u64) -> bool {
        self.0.entry(normalize_role(role)).or_default().insert(member)
    }

    /// Returns `true` if the member was removed. Empty roles are pruned.
    pub fn remove(&mut self, role: &str, member: u64) -> bool {
        let role = normalize_role(role);
        let Some(members) = self.0.get_mut(&role) else { return false; };
        let removed = members.remove(&member);
        if members.is_empty() {
            self.0.remove(&role);
        }
        removed
    }

    pub fn members(&self, role: &str) -> BTreeSet<u64> {
        self.0.get(&normalize_role(role)).cloned().unwrap_or_default()
    }

    pub fn has_member(&self, role: &str, member: u64) -> bool {
        self.0.get(&normalize_role(role)).map_or(false, |m| m.contains(&member))
    }

    pub fn exists(&self, role: &str) -> bool {
        self.0.contains_key(&normalize_role(role))
    }

    pub fn roles_of(&self, member: u64) -> Vec<String> {
        self.0
            .iter()
            .filter(|(_, members)| members.contains(&member))
            .map(|(role, _)| role.clone())
            .collect()
    }
}
