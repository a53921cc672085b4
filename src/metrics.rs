//! Lock-free metrics counters
//!
//! Mutated only by the mining thread (single writer, §5), read by a
//! management interface via `snapshot()`. Modeled on the atomic counters in
//! the teacher's `FsyncState` (durable/written LSN tracked with
//! `AtomicU64` + `compare_exchange_weak`, no locking on the hot path).

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

/// Mining-loop and buffer health counters.
#[derive(Default)]
pub struct Metrics {
    active_transactions: AtomicU64,
    captured_dml: AtomicU64,
    committed_transactions: AtomicU64,
    rolled_back_transactions: AtomicU64,
    abandoned_transactions: AtomicU64,
    duplicate_commit_drops: AtomicU64,
    network_problems: AtomicU64,
    lag_millis: AtomicI64,
    current_batch_size: AtomicU64,
    current_sleep_millis: AtomicU64,
}

/// A point-in-time snapshot, safe to read without synchronizing with the
/// mining thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub active_transactions: u64,
    pub captured_dml: u64,
    pub committed_transactions: u64,
    pub rolled_back_transactions: u64,
    pub abandoned_transactions: u64,
    pub duplicate_commit_drops: u64,
    pub network_problems: u64,
    pub lag_millis: i64,
    pub current_batch_size: u64,
    pub current_sleep_millis: u64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_registered_dml(&self) {
        self.captured_dml.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_active_transactions(&self, count: u64) {
        self.active_transactions.store(count, Ordering::Relaxed);
    }

    pub fn record_committed_transaction(&self) {
        self.committed_transactions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rolled_back_transaction(&self) {
        self.rolled_back_transactions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_abandoned_transactions(&self, count: u64) {
        self.abandoned_transactions.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_duplicate_commit_drop(&self) {
        self.duplicate_commit_drops.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_network_problem(&self) {
        self.network_problems.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_lag_millis(&self, lag: i64) {
        self.lag_millis.store(lag, Ordering::Relaxed);
    }

    pub fn set_batch_size(&self, size: u64) {
        self.current_batch_size.store(size, Ordering::Relaxed);
    }

    pub fn set_sleep_millis(&self, sleep: u64) {
        self.current_sleep_millis.store(sleep, Ordering::Relaxed);
    }

    /// Snapshot every counter into a plain struct. Does not synchronize
    /// with the mining thread beyond the `Relaxed` loads themselves -
    /// counters may be mid-update, which is acceptable for a health display.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            active_transactions: self.active_transactions.load(Ordering::Relaxed),
            captured_dml: self.captured_dml.load(Ordering::Relaxed),
            committed_transactions: self.committed_transactions.load(Ordering::Relaxed),
            rolled_back_transactions: self.rolled_back_transactions.load(Ordering::Relaxed),
            abandoned_transactions: self.abandoned_transactions.load(Ordering::Relaxed),
            duplicate_commit_drops: self.duplicate_commit_drops.load(Ordering::Relaxed),
            network_problems: self.network_problems.load(Ordering::Relaxed),
            lag_millis: self.lag_millis.load(Ordering::Relaxed),
            current_batch_size: self.current_batch_size.load(Ordering::Relaxed),
            current_sleep_millis: self.current_sleep_millis.load(Ordering::Relaxed),
        }
    }
}
