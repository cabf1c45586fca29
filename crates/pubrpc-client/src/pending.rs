//! Pending-request registry with timeout eviction.
//!
//! The registry preserves relative insertion order: re-adding an existing
//! identifier moves it to the most-recent position. That makes insertion
//! order a usable age proxy, so the eviction sweep can stop at the first
//! entry younger than the timeout instead of scanning everything.
//!
//! The sweep timer is lazy: it starts when the first entry is added and
//! stops when the registry empties, so an idle client does no background
//! work. Because every acknowledgement re-inserts its entry at the tail,
//! a remote that acks indefinitely can keep a request alive forever; there
//! is no cap on the total wait.

use crate::error::ClientError;
use crate::tracker::Tracker;
use parking_lot::Mutex;
use pubrpc_types::RequestId;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

struct Entry {
    tracker: Tracker,
    seq: u64,
    /// When this entry was (re-)inserted. Reset on every touch, so an
    /// acknowledged request gets a full timeout window again.
    inserted_at: Instant,
}

enum SweepState {
    Idle,
    Active { handle: JoinHandle<()> },
}

struct Inner {
    /// Entries keyed uniquely by identifier.
    entries: HashMap<RequestId, Entry>,
    /// Insertion order: sequence number to identifier, ascending = oldest.
    order: BTreeMap<u64, RequestId>,
    next_seq: u64,
    /// Bumped whenever the sweep stops or restarts; a running sweep task
    /// that observes a mismatch exits instead of racing its replacement.
    generation: u64,
    sweep: SweepState,
}

impl Inner {
    fn stop_sweep(&mut self) -> Option<JoinHandle<()>> {
        self.generation += 1;
        match std::mem::replace(&mut self.sweep, SweepState::Idle) {
            SweepState::Active { handle } => Some(handle),
            SweepState::Idle => None,
        }
    }
}

/// Registry mapping request identifiers to their trackers, with a lazy
/// periodic sweep that evicts entries older than the timeout.
pub struct PendingRequests {
    inner: Mutex<Inner>,
    timeout: Duration,
    sweep_interval: Duration,
}

impl PendingRequests {
    /// Create a registry. `sweep_interval` is normally derived from the
    /// timeout by [`ClientConfig::sweep_interval`](crate::config::ClientConfig::sweep_interval).
    pub fn new(timeout: Duration, sweep_interval: Duration) -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                order: BTreeMap::new(),
                next_seq: 0,
                generation: 0,
                sweep: SweepState::Idle,
            }),
            timeout,
            sweep_interval,
        })
    }

    /// Insert or re-insert an entry. Re-insertion moves the identifier to
    /// the most-recent position and restarts its eviction clock; the
    /// tracker itself keeps counting from creation (that age is what feeds
    /// round-trip stats).
    ///
    /// Starts the sweep if the registry was idle.
    pub fn add(self: &Arc<Self>, id: RequestId, tracker: Tracker) {
        let mut inner = self.inner.lock();
        if let Some(old) = inner.entries.remove(&id) {
            inner.order.remove(&old.seq);
        }
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.order.insert(seq, id.clone());
        inner.entries.insert(
            id,
            Entry {
                tracker,
                seq,
                inserted_at: Instant::now(),
            },
        );
        if matches!(inner.sweep, SweepState::Idle) {
            self.start_sweep(&mut inner);
        }
    }

    /// Remove an entry and hand its tracker back. Stops the sweep when the
    /// registry empties.
    pub fn remove(&self, id: &RequestId) -> Option<Tracker> {
        let (tracker, handle) = {
            let mut inner = self.inner.lock();
            let entry = inner.entries.remove(id)?;
            inner.order.remove(&entry.seq);
            let handle = if inner.entries.is_empty() {
                inner.stop_sweep()
            } else {
                None
            };
            (entry.tracker, handle)
        };
        if let Some(handle) = handle {
            handle.abort();
        }
        Some(tracker)
    }

    /// Move an entry to the most-recent position and restart its eviction
    /// clock without disturbing the tracker (acknowledgement handling).
    /// Returns false if the identifier is not tracked.
    pub fn touch(&self, id: &RequestId) -> bool {
        let mut inner = self.inner.lock();
        let Some(old_seq) = inner.entries.get(id).map(|e| e.seq) else {
            return false;
        };
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.order.remove(&old_seq);
        inner.order.insert(seq, id.clone());
        if let Some(entry) = inner.entries.get_mut(id) {
            entry.seq = seq;
            entry.inserted_at = Instant::now();
        }
        true
    }

    /// Non-mutating lookup: is the identifier tracked right now?
    pub fn contains(&self, id: &RequestId) -> bool {
        self.inner.lock().entries.contains_key(id)
    }

    /// Non-mutating lookup: elapsed time since the tracked request was
    /// created, if it is tracked.
    pub fn time_in_flight(&self, id: &RequestId) -> Option<Duration> {
        self.inner
            .lock()
            .entries
            .get(id)
            .map(|e| e.tracker.time_spent())
    }

    /// Number of tracked requests.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// True when no requests are tracked.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    /// True while the eviction sweep task is running.
    pub fn sweep_active(&self) -> bool {
        matches!(self.inner.lock().sweep, SweepState::Active { .. })
    }

    /// Remove every entry, stop the sweep, and return the orphaned
    /// trackers so the caller can fail them (used at client close).
    pub fn drain(&self) -> Vec<Tracker> {
        let (trackers, handle) = {
            let mut inner = self.inner.lock();
            inner.order.clear();
            let trackers = inner
                .entries
                .drain()
                .map(|(_, entry)| entry.tracker)
                .collect();
            let handle = inner.stop_sweep();
            (trackers, handle)
        };
        if let Some(handle) = handle {
            handle.abort();
        }
        trackers
    }

    fn start_sweep(self: &Arc<Self>, inner: &mut Inner) {
        inner.generation += 1;
        let generation = inner.generation;
        let registry = Arc::downgrade(self);
        let interval = self.sweep_interval;

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick of a tokio interval completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(registry) = registry.upgrade() else {
                    break;
                };
                if !registry.sweep_pass(generation) {
                    break;
                }
            }
        });

        debug!(generation, interval_ms = interval.as_millis() as u64, "Eviction sweep started");
        inner.sweep = SweepState::Active { handle };
    }

    /// One eviction pass. Walks entries in insertion order and stops at the
    /// first entry younger than the timeout: insertion order is only an age
    /// proxy, but re-insertion always moves an entry to the tail, so
    /// everything behind the first young entry is younger still.
    ///
    /// Returns false when this sweep task should exit (registry empty or a
    /// newer sweep has taken over).
    fn sweep_pass(&self, generation: u64) -> bool {
        let mut expired = Vec::new();
        let keep_running = {
            let mut inner = self.inner.lock();
            if inner.generation != generation {
                return false;
            }
            loop {
                let Some((&seq, id)) = inner.order.iter().next() else {
                    break;
                };
                let id = id.clone();
                let Some(entry) = inner.entries.get(&id) else {
                    inner.order.remove(&seq);
                    continue;
                };
                if entry.inserted_at.elapsed() < self.timeout {
                    break;
                }
                inner.order.remove(&seq);
                if let Some(entry) = inner.entries.remove(&id) {
                    expired.push((id, entry));
                }
            }
            if inner.entries.is_empty() {
                inner.stop_sweep();
                false
            } else {
                true
            }
        };

        // Trackers are completed outside the lock.
        for (id, entry) in expired {
            warn!(
                request_id = %id,
                elapsed_ms = entry.inserted_at.elapsed().as_millis() as u64,
                timeout_ms = self.timeout.as_millis() as u64,
                "Evicting expired pending request"
            );
            entry.tracker.cancel(ClientError::Timeout);
        }

        keep_running
    }
}
