use dashmap::DashMap;
use std::future::Future;
use std::time::Duration;
use tokio::task::AbortHandle;
use tokio::time::{interval_at, sleep, Instant, MissedTickBehavior};

use crate::db::models::GiveawayKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerSlot {
    Draw,
    SlowRefresh,
    FastRefresh,
    Transition,
}

/// What a repeating timer wants after a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    Continue,
    Stop,
}

/// Handles to every timer one giveaway owns.
#[derive(Debug, Default)]
struct TimerGroup {
    draw: Option<AbortHandle>,
    slow_refresh: Option<AbortHandle>,
    fast_refresh: Option<AbortHandle>,
    transition: Option<AbortHandle>,
}

impl TimerGroup {
    fn slot_mut(&mut self, slot: TimerSlot) -> &mut Option<AbortHandle> {
        match slot {
            TimerSlot::Draw => &mut self.draw,
            TimerSlot::SlowRefresh => &mut self.slow_refresh,
            TimerSlot::FastRefresh => &mut self.fast_refresh,
            TimerSlot::Transition => &mut self.transition,
        }
    }

    fn abort_all(&mut self) {
        for slot in [TimerSlot::Draw, TimerSlot::SlowRefresh, TimerSlot::FastRefresh, TimerSlot::Transition] {
            if let Some(h) = self.slot_mut(slot).take() {
                h.abort();
            }
        }
    }
}

/// Drives all one-shot and repeating timers of all giveaways.
///
/// Cancellation is best effort: a callback that already started keeps
/// running, so callbacks re-check the registry before acting.
#[derive(Debug, Default)]
pub struct Scheduler {
    groups: DashMap<GiveawayKey, TimerGroup>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule_once<F>(&self, key: GiveawayKey, slot: TimerSlot, delay: Duration, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        // the entry guard is held across spawn so the task cannot observe its group before it is installed
        let mut group = self.groups.entry(key).or_default();
        let handle = tokio::spawn(async move {
            sleep(delay).await;
            task.await;
        });
        if let Some(old) = group.slot_mut(slot).replace(handle.abort_handle()) {
            old.abort();
        }
    }

    /// Runs `tick` after `first_delay`, then every `every`, until it returns [`Tick::Stop`]
    /// or the slot is cancelled.
    pub fn schedule_repeating<F, Fut>(
        &self,
        key: GiveawayKey,
        slot: TimerSlot,
        first_delay: Duration,
        every: Duration,
        mut tick: F,
    ) where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Tick> + Send + 'static,
    {
        let mut group = self.groups.entry(key).or_default();
        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + first_delay, every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if tick().await == Tick::Stop {
                    break;
                }
            }
        });
        if let Some(old) = group.slot_mut(slot).replace(handle.abort_handle()) {
            old.abort();
        }
    }

    /// Aborts one timer. Returns whether a handle was present.
    pub fn cancel(&self, key: &GiveawayKey, slot: TimerSlot) -> bool {
        let Some(mut group) = self.groups.get_mut(key) else { return false; };
        match group.slot_mut(slot).take() {
            Some(h) => {
                h.abort();
                true
            }
            None => false,
        }
    }

    /// Forgets a handle without aborting it. A callback uses this on its own
    /// slot before tearing down the rest of the group.
    pub fn release(&self, key: &GiveawayKey, slot: TimerSlot) {
        if let Some(mut group) = self.groups.get_mut(key) {
            group.slot_mut(slot).take();
        }
    }

    pub fn cancel_all(&self, key: &GiveawayKey) {
        if let Some((_, mut group)) = self.groups.remove(key) {
            group.abort_all();
        }
    }

    /// Whether the slot holds a timer that has not finished yet.
    pub fn is_active(&self, key: &GiveawayKey, slot: TimerSlot) -> bool {
        self.groups
            .get_mut(key)
            .and_then(|mut g| g.slot_mut(slot).as_ref().map(|h| !h.is_finished()))
            .unwrap_or(false)
    }

    pub fn has_group(&self, key: &GiveawayKey) -> bool {
        self.groups.contains_key(key)
    }
}
