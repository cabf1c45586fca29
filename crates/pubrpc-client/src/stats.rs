//! Send/receive statistics hooks.
//!
//! The engine reports traffic through [`StatsRecorder`]; the hooks are
//! side effects only and never influence control flow. [`ClientStats`] is
//! the default recorder: lock-free counters plus min/max round-trip times,
//! readable as a [`StatsSnapshot`].

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Passive observer of transport traffic.
pub trait StatsRecorder: Send + Sync {
    /// A frame of `bytes` length was handed to the transport.
    fn record_sent(&self, bytes: usize);

    /// A frame of `bytes` length arrived. `round_trip` is the matched
    /// tracker's elapsed time when this frame resolved a request, `None`
    /// for acks, notifications, chunks, and unmatched replies.
    fn record_received(&self, bytes: usize, round_trip: Option<Duration>);
}

/// Recorder that ignores everything.
#[derive(Debug, Default)]
pub struct NoopStats;

impl StatsRecorder for NoopStats {
    fn record_sent(&self, _bytes: usize) {}
    fn record_received(&self, _bytes: usize, _round_trip: Option<Duration>) {}
}

/// Default statistics: byte counters, completion count, round-trip bounds,
/// and last-activity timestamps.
#[derive(Debug)]
pub struct ClientStats {
    sent_bytes: AtomicU64,
    received_bytes: AtomicU64,
    requests_completed: AtomicU64,
    /// Microseconds; `u64::MAX` means "no sample yet".
    min_round_trip_us: AtomicU64,
    max_round_trip_us: AtomicU64,
    last_sent_at: Mutex<Option<Instant>>,
    last_received_at: Mutex<Option<Instant>>,
}

impl Default for ClientStats {
    fn default() -> Self {
        Self {
            sent_bytes: AtomicU64::new(0),
            received_bytes: AtomicU64::new(0),
            requests_completed: AtomicU64::new(0),
            min_round_trip_us: AtomicU64::new(u64::MAX),
            max_round_trip_us: AtomicU64::new(0),
            last_sent_at: Mutex::new(None),
            last_received_at: Mutex::new(None),
        }
    }
}

/// Point-in-time view of [`ClientStats`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub sent_bytes: u64,
    pub received_bytes: u64,
    pub requests_completed: u64,
    pub min_round_trip: Option<Duration>,
    pub max_round_trip: Option<Duration>,
    pub last_sent_at: Option<Instant>,
    pub last_received_at: Option<Instant>,
}

impl ClientStats {
    /// Read the current counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        let completed = self.requests_completed.load(Ordering::Relaxed);
        let min_us = self.min_round_trip_us.load(Ordering::Relaxed);
        StatsSnapshot {
            sent_bytes: self.sent_bytes.load(Ordering::Relaxed),
            received_bytes: self.received_bytes.load(Ordering::Relaxed),
            requests_completed: completed,
            min_round_trip: (min_us != u64::MAX).then(|| Duration::from_micros(min_us)),
            max_round_trip: (completed > 0)
                .then(|| Duration::from_micros(self.max_round_trip_us.load(Ordering::Relaxed))),
            last_sent_at: *self.last_sent_at.lock(),
            last_received_at: *self.last_received_at.lock(),
        }
    }
}

impl StatsRecorder for ClientStats {
    fn record_sent(&self, bytes: usize) {
        self.sent_bytes.fetch_add(bytes as u64, Ordering::Relaxed);
        *self.last_sent_at.lock() = Some(Instant::now());
    }

    fn record_received(&self, bytes: usize, round_trip: Option<Duration>) {
        self.received_bytes.fetch_add(bytes as u64, Ordering::Relaxed);
        *self.last_received_at.lock() = Some(Instant::now());

        if let Some(elapsed) = round_trip {
            let us = elapsed.as_micros() as u64;
            self.min_round_trip_us.fetch_min(us, Ordering::Relaxed);
            self.max_round_trip_us.fetch_max(us, Ordering::Relaxed);
            self.requests_completed.fetch_add(1, Ordering::Relaxed);
        }
    }
}
