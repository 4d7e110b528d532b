//! Bounded artifact → correspondent route table.
//!
//! Entries are evicted oldest-registration-first once `capacity` is reached,
//! and optionally expire `ttl` after registration. Re-registering a key
//! repoints it and refreshes its registration time.

use std::{
    collections::{HashMap, VecDeque},
    sync::Mutex,
    time::{Duration, Instant},
};

use crate::types::{ArtifactId, DeliveryTarget};

/// Default maximum number of live routes.
pub const DEFAULT_CAPACITY: usize = 10_000;

struct RouteEntry {
    target: DeliveryTarget,
    registered_at: Instant,
    seq: u64,
}

#[derive(Default)]
struct Inner {
    entries: HashMap<ArtifactId, RouteEntry>,
    /// Registration order. May hold stale `(id, seq)` pairs for keys that
    /// were overwritten; those are skipped on eviction.
    order: VecDeque<(ArtifactId, u64)>,
    next_seq: u64,
}

impl Inner {
    fn is_current(&self, id: ArtifactId, seq: u64) -> bool {
        self.entries.get(&id).is_some_and(|e| e.seq == seq)
    }

    fn evict_oldest(&mut self) -> Option<ArtifactId> {
        while let Some((id, seq)) = self.order.pop_front() {
            if self.is_current(id, seq) {
                self.entries.remove(&id);
                return Some(id);
            }
        }
        None
    }

    fn compact_order(&mut self) {
        let entries = &self.entries;
        self.order
            .retain(|(id, seq)| entries.get(id).is_some_and(|e| e.seq == *seq));
    }
}

/// Process-wide route state, shared behind the router.
///
/// Uses `std::sync::Mutex` because every operation is a synchronous map
/// access that is never held across an `.await`.
pub struct RouteTable {
    inner: Mutex<Inner>,
    capacity: usize,
    ttl: Option<Duration>,
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, None)
    }
}

impl RouteTable {
    /// Create an empty table. A `capacity` of zero is treated as one.
    #[must_use]
    pub fn new(capacity: usize, ttl: Option<Duration>) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            capacity: capacity.max(1),
            ttl,
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    /// Insert or repoint `id`. Returns the id evicted to make room, if any.
    pub fn insert(&self, id: ArtifactId, target: DeliveryTarget) -> Option<ArtifactId> {
        self.insert_at(id, target, Instant::now())
    }

    /// Look up the target registered for `id`. Expired entries are removed
    /// and reported as absent.
    #[must_use]
    pub fn get(&self, id: ArtifactId) -> Option<DeliveryTarget> {
        self.get_at(id, Instant::now())
    }

    /// Number of live entries (expired entries not yet swept included).
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry older than the TTL. Returns how many were removed.
    pub fn evict_expired(&self) -> usize {
        self.evict_expired_at(Instant::now())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn is_expired(&self, entry: &RouteEntry, now: Instant) -> bool {
        self.ttl
            .is_some_and(|ttl| now.saturating_duration_since(entry.registered_at) >= ttl)
    }

    pub(crate) fn insert_at(
        &self,
        id: ArtifactId,
        target: DeliveryTarget,
        now: Instant,
    ) -> Option<ArtifactId> {
        let mut inner = self.lock();
        let seq = inner.next_seq;
        inner.next_seq += 1;

        let replaced = inner
            .entries
            .insert(id, RouteEntry {
                target,
                registered_at: now,
                seq,
            })
            .is_some();
        inner.order.push_back((id, seq));

        let mut evicted = None;
        if !replaced && inner.entries.len() > self.capacity {
            evicted = inner.evict_oldest();
        }
        if inner.order.len() > self.capacity.saturating_mul(2) {
            inner.compact_order();
        }
        evicted
    }

    pub(crate) fn get_at(&self, id: ArtifactId, now: Instant) -> Option<DeliveryTarget> {
        let mut inner = self.lock();
        let entry = inner.entries.get(&id)?;
        let (target, expired) = (entry.target, self.is_expired(entry, now));
        if expired {
            inner.entries.remove(&id);
            return None;
        }
        Some(target)
    }

    pub(crate) fn evict_expired_at(&self, now: Instant) -> usize {
        if self.ttl.is_none() {
            return 0;
        }
        let mut inner = self.lock();
        let before = inner.entries.len();
        let expired: Vec<ArtifactId> = inner
            .entries
            .iter()
            .filter(|(_, e)| self.is_expired(e, now))
            .map(|(id, _)| *id)
            .collect();
        for id in expired {
            inner.entries.remove(&id);
        }
        inner.compact_order();
        before - inner.entries.len()
    }
}
