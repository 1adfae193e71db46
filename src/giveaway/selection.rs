use rand::seq::{index, SliceRandom};
use rand::Rng;
use std::collections::HashSet;

use crate::db::models::{HistoryRecord, Participants, RoleBook};

/// Admins bypass role gating; without a required role everybody is eligible.
/// Participation and the draw both go through here so the rule is the same.
pub fn is_eligible(member: u64, required_role: Option<&str>, roles: &RoleBook, admins: &HashSet<u64>) -> bool {
    match required_role {
        None => true,
        Some(role) => admins.contains(&member) || roles.has_member(role, member),
    }
}

/// Participant ids allowed to win, sorted so a seeded rng draws reproducibly.
pub fn eligible_pool(
    participants: &Participants,
    required_role: Option<&str>,
    roles: &RoleBook,
    admins: &HashSet<u64>,
) -> Vec<u64> {
    let mut pool: Vec<u64> = participants
        .keys()
        .copied()
        .filter(|id| is_eligible(*id, required_role, roles, admins))
        .collect();
    pool.sort_unstable();
    pool
}

/// Draws `min(requested, pool.len())` distinct ids uniformly without replacement.
/// `None` when the pool is empty. Order is whatever the sampler returned.
pub fn draw_winners<R: Rng + ?Sized>(pool: &[u64], requested: usize, rng: &mut R) -> Option<Vec<u64>> {
    if pool.is_empty() {
        return None;
    }
    let k = requested.min(pool.len());
    Some(index::sample(rng, pool.len(), k).into_iter().map(|i| pool[i]).collect())
}

/// One extra winner from everybody in the record who has not won yet.
pub fn reroll_winner<R: Rng + ?Sized>(record: &HistoryRecord, rng: &mut R) -> Option<u64> {
    let already: HashSet<u64> = record.winner_ids.iter().copied().collect();
    let mut remaining: Vec<u64> = record
        .participants
        .keys()
        .copied()
        .filter(|id| !already.contains(id))
        .collect();
    remaining.sort_unstable();
    remaining.choose(rng).copied()
}
