//! Process-local, time-bounded activity state.
//!
//! Each entry lives for a fixed TTL measured from creation. Updates never extend it.
//! Deadlines sit in a min-heap that [`EphemeralCache::sweep`] drains; a deadline whose entry
//! was deleted or replaced in the meantime is skipped. Entries past their deadline but not yet
//! swept read as absent.

pub mod scheduler;

use std::cmp::Reverse;
use std::collections::hash_map::Entry as MapEntry;
use std::collections::{BinaryHeap, HashMap};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::clock::Clock;
use crate::domain::ids::ContentId;

pub use scheduler::spawn_expiry_sweeper;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActivityCounter {
    pub id: ContentId,
    pub reply_count: u32,
    pub reaction_count: u32,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ThreadCounter {
    pub id: ContentId,
    pub message_count: u32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReactionCooldownMark {
    pub threshold_met: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EventDebounceMark;

struct Entry<V> {
    value: V,
    expires_at: DateTime<Utc>,
    generation: u64,
}

struct CacheInner<V> {
    entries: HashMap<ContentId, Entry<V>>,
    deadlines: BinaryHeap<Reverse<(DateTime<Utc>, u64, ContentId)>>,
    next_generation: u64,
}

impl<V> CacheInner<V> {
    fn live(&self, id: &ContentId, now: DateTime<Utc>) -> Option<&Entry<V>> {
        self.entries.get(id).filter(|entry| entry.expires_at > now)
    }

    fn live_mut(&mut self, id: &ContentId, now: DateTime<Utc>) -> Option<&mut Entry<V>> {
        self.entries.get_mut(id).filter(|entry| entry.expires_at > now)
    }

    fn insert(&mut self, id: ContentId, value: V, expires_at: DateTime<Utc>) -> &mut Entry<V> {
        let generation = self.next_generation;
        self.next_generation += 1;
        self.deadlines.push(Reverse((expires_at, generation, id.clone())));
        let entry = Entry { value, expires_at, generation };
        match self.entries.entry(id) {
            MapEntry::Occupied(mut slot) => {
                slot.insert(entry);
                slot.into_mut()
            }
            MapEntry::Vacant(slot) => slot.insert(entry),
        }
    }
}

/// Saturates instead of overflowing, so an oversized TTL means "never expires".
fn deadline(now: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
    now.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

pub struct EphemeralCache<V> {
    name: &'static str,
    ttl: Duration,
    clock: Arc<dyn Clock>,
    inner: Mutex<CacheInner<V>>,
}

impl<V: Clone> EphemeralCache<V> {
    pub fn new(name: &'static str, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            name,
            ttl,
            clock,
            inner: Mutex::new(CacheInner {
                entries: HashMap::new(),
                deadlines: BinaryHeap::new(),
                next_generation: 0,
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CacheInner<V>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, id: &ContentId) -> Option<V> {
        let now = self.clock.now();
        self.lock().live(id, now).map(|entry| entry.value.clone())
    }

    pub fn contains(&self, id: &ContentId) -> bool {
        let now = self.clock.now();
        self.lock().live(id, now).is_some()
    }

    /// Returns the live value, creating it with the cache TTL when absent.
    /// The flag is `true` when this call created the entry.
    pub fn get_or_create(&self, id: &ContentId, init: impl FnOnce() -> V) -> (V, bool) {
        self.upsert(id, init, |_| {})
    }

    /// Creates the entry from `create` when absent, otherwise applies `mutate` to it.
    /// Both happen under one lock so concurrent callers observe a single creation.
    pub fn upsert(
        &self,
        id: &ContentId,
        create: impl FnOnce() -> V,
        mutate: impl FnOnce(&mut V),
    ) -> (V, bool) {
        let now = self.clock.now();
        let mut inner = self.lock();
        if let Some(entry) = inner.live_mut(id, now) {
            mutate(&mut entry.value);
            return (entry.value.clone(), false);
        }
        let entry = inner.insert(id.clone(), create(), deadline(now, self.ttl));
        (entry.value.clone(), true)
    }

    /// Applies `mutate` to a live entry. Returns `None` when there is nothing to update.
    pub fn update<R>(&self, id: &ContentId, mutate: impl FnOnce(&mut V) -> R) -> Option<R> {
        let now = self.clock.now();
        self.lock().live_mut(id, now).map(|entry| mutate(&mut entry.value))
    }

    pub fn delete(&self, id: &ContentId) -> Option<V> {
        let now = self.clock.now();
        let removed = self.lock().entries.remove(id)?;
        (removed.expires_at > now).then_some(removed.value)
    }

    /// Moves a live entry's deadline to `ttl` from now. The previous deadline becomes a no-op.
    pub fn schedule_expiry(&self, id: &ContentId, ttl: Duration) -> bool {
        let now = self.clock.now();
        let mut inner = self.lock();
        let Some(entry) = inner.live_mut(id, now) else {
            return false;
        };
        let value = entry.value.clone();
        inner.insert(id.clone(), value, deadline(now, ttl));
        true
    }

    /// Removes every entry whose deadline is at or before `now`. Returns how many were removed.
    pub fn sweep(&self, now: DateTime<Utc>) -> usize {
        let mut inner = self.lock();
        let mut removed = 0;
        while let Some(Reverse((deadline, _, _))) = inner.deadlines.peek() {
            if *deadline > now {
                break;
            }
            let Some(Reverse((_, generation, id))) = inner.deadlines.pop() else {
                break;
            };
            let current = inner.entries.get(&id).map(|entry| entry.generation);
            if current == Some(generation) {
                inner.entries.remove(&id);
                removed += 1;
            }
        }
        removed
    }

    /// Live entries only.
    pub fn len(&self) -> usize {
        let now = self.clock.now();
        self.lock().entries.values().filter(|entry| entry.expires_at > now).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn pending_deadlines(&self) -> usize {
        self.lock().deadlines.len()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CacheTtls {
    pub counter: Duration,
    pub reaction_cooldown: Duration,
    pub event_debounce: Duration,
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self {
            counter: Duration::days(3),
            reaction_cooldown: Duration::hours(1),
            event_debounce: Duration::hours(1),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub messages: usize,
    pub threads: usize,
    pub reaction_cooldowns: usize,
    pub event_debounce: usize,
}

impl SweepReport {
    pub fn total(&self) -> usize {
        self.messages + self.threads + self.reaction_cooldowns + self.event_debounce
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub message_counters: usize,
    pub thread_counters: usize,
    pub reaction_cooldowns: usize,
    pub event_debounce: usize,
}

/// The four caches the promotion engine keeps, sharing one clock.
pub struct ActivityCaches {
    pub messages: EphemeralCache<ActivityCounter>,
    pub threads: EphemeralCache<ThreadCounter>,
    pub reaction_cooldowns: EphemeralCache<ReactionCooldownMark>,
    pub event_debounce: EphemeralCache<EventDebounceMark>,
    clock: Arc<dyn Clock>,
}

impl ActivityCaches {
    pub fn new(ttls: CacheTtls, clock: Arc<dyn Clock>) -> Self {
        Self {
            messages: EphemeralCache::new("message_activity", ttls.counter, clock.clone()),
            threads: EphemeralCache::new("thread_activity", ttls.counter, clock.clone()),
            reaction_cooldowns: EphemeralCache::new(
                "reaction_cooldown",
                ttls.reaction_cooldown,
                clock.clone(),
            ),
            event_debounce: EphemeralCache::new(
                "event_debounce",
                ttls.event_debounce,
                clock.clone(),
            ),
            clock,
        }
    }

    pub fn sweep(&self) -> SweepReport {
        let now = self.clock.now();
        SweepReport {
            messages: self.messages.sweep(now),
            threads: self.threads.sweep(now),
            reaction_cooldowns: self.reaction_cooldowns.sweep(now),
            event_debounce: self.event_debounce.sweep(now),
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            message_counters: self.messages.len(),
            thread_counters: self.threads.len(),
            reaction_cooldowns: self.reaction_cooldowns.len(),
            event_debounce: self.event_debounce.len(),
        }
    }
}
