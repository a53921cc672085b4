//! Transactional reorder/commit buffer (§3, §4.1)
//!
//! Owned exclusively by the mining thread - this is the "not thread-safe
//! core" half of the split described in §5. The only thing that crosses a
//! thread boundary is the emission of a committed transaction's callbacks,
//! handed off to `EmissionWorkerHandle` (see `worker.rs`). Completions come
//! back through a plain `mpsc::Receiver` that only this struct's methods
//! drain, which is the "mailbox of setter messages" the design note in §9
//! suggests instead of making `lastCommittedScn`/metrics atomic.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::AtomicBool;
use std::sync::{mpsc, Arc};

use crate::dispatch::CommitCallback;
use crate::error::Result;
use crate::metrics::Metrics;
use crate::offset::Offset;
use crate::scn::Scn;
use crate::transaction::{Transaction, TransactionId};

use super::worker::{EmissionOutcome, EmissionTask, EmissionWorkerHandle};


/// Stores open transactions and drives their admission, commit, rollback and
/// abandonment per §4.1.
pub struct TransactionalBuffer {
    transactions: HashMap<TransactionId, Transaction>,
    abandoned: HashSet<TransactionId>,
    rolled_back: HashSet<TransactionId>,
    largest_scn: Scn,
    last_committed_scn: Scn,
    scheduled_emissions: u64,
    completed_emissions: u64,
    worker: EmissionWorkerHandle,
    completion_rx: mpsc::Receiver<EmissionOutcome>,
    completion_tx: mpsc::Sender<EmissionOutcome>,
    metrics: Arc<Metrics>,
}

impl TransactionalBuffer {
    pub fn new(metrics: Arc<Metrics>, queue_capacity: usize, running: Arc<AtomicBool>) -> Self {
        let worker = EmissionWorkerHandle::new(queue_capacity, running);
        let (completion_tx, completion_rx) = mpsc::channel();
        Self {
            transactions: HashMap::new(),
            abandoned: HashSet::new(),
            rolled_back: HashSet::new(),
            largest_scn: Scn::ZERO,
            last_committed_scn: Scn::ZERO,
            scheduled_emissions: 0,
            completed_emissions: 0,
            worker,
            completion_rx,
            completion_tx,
            metrics,
        }
    }

    pub fn largest_scn(&self) -> Scn {
        self.largest_scn
    }

    pub fn last_committed_scn(&self) -> Scn {
        self.last_committed_scn
    }

    pub fn rolled_back_ids(&self) -> &HashSet<TransactionId> {
        &self.rolled_back
    }

    /// Register a DML against `txn_id` at `scn`, per §4.1's admission rule.
    /// `callback` already carries the table and redo SQL the parser and
    /// dispatcher need at commit time.
    pub fn register(&mut self, txn_id: TransactionId, scn: Scn, change_time_millis: u64, callback: CommitCallback) {
        self.drain_completions();

        if self.abandoned.contains(&txn_id) {
            log::warn!("dropping DML for abandoned transaction {txn_id} at SCN {scn}");
            return;
        }

        let txn = self.transactions.entry(txn_id.clone()).or_insert_with(|| Transaction::new(txn_id, scn));

        if txn.last_scn == scn && txn.has_redo_at(scn, &callback.redo_sql) {
            log::debug!("dropping duplicate redo at SCN {scn} for table {}", callback.table);
            return;
        }

        let redo_sql = callback.redo_sql.clone();
        txn.add_callback(scn, &redo_sql, callback);
        if scn > self.largest_scn {
            self.largest_scn = scn;
        }

        self.metrics.record_registered_dml();
        self.metrics.set_active_transactions(self.transactions.len() as u64);
        self.metrics.set_lag_millis(lag_millis(change_time_millis));
    }

    /// Commit `txn_id` at `commit_scn`, scheduling its callbacks on the
    /// emission worker. Returns `Ok(false)` for an unknown or already-emitted
    /// transaction (§4.1's at-least-once de-duplication guard), `Ok(true)`
    /// once the emission task is scheduled.
    pub fn commit(&mut self, txn_id: &str, commit_scn: Scn, offset: &Offset, commit_timestamp: u64) -> Result<bool> {
        self.drain_completions();

        let Some(txn) = self.transactions.get(txn_id) else {
            return Ok(false);
        };

        let already_emitted = offset.commit_scn.is_some_and(|c| c > commit_scn) || self.last_committed_scn > commit_scn;
        if already_emitted {
            log::warn!("dropping already-emitted transaction {txn_id} at commit SCN {commit_scn}");
            self.transactions.remove(txn_id);
            self.recompute_largest_scn();
            self.metrics.record_duplicate_commit_drop();
            return Ok(false);
        }

        let smallest_open_scn = self
            .transactions
            .iter()
            .filter(|(id, _)| id.as_str() != txn_id)
            .map(|(_, t)| t.first_scn)
            .min();

        let txn = self.transactions.remove(txn_id).expect("checked present above");
        self.recompute_largest_scn();

        self.worker.schedule(EmissionTask {
            commit_scn,
            commit_timestamp,
            smallest_open_scn,
            callbacks: txn.callbacks,
            completion_tx: self.completion_tx.clone(),
        })?;
        self.scheduled_emissions += 1;

        self.metrics.set_active_transactions(self.transactions.len() as u64);
        Ok(true)
    }

    /// Roll back `txn_id`, discarding its buffered callbacks. Returns `false`
    /// if it was never seen (already committed, abandoned, or unknown).
    pub fn rollback(&mut self, txn_id: &str) -> bool {
        self.drain_completions();

        if self.transactions.remove(txn_id).is_none() {
            return false;
        }
        self.rolled_back.insert(txn_id.to_string());
        self.abandoned.remove(txn_id);
        self.recompute_largest_scn();
        self.metrics.record_rolled_back_transaction();
        self.metrics.set_active_transactions(self.transactions.len() as u64);
        true
    }

    /// Move every transaction whose `first_scn <= threshold_scn` into
    /// `abandoned`, dropping it from the live map.
    pub fn abandon_long_transactions(&mut self, threshold_scn: Scn) {
        self.drain_completions();

        let stale: Vec<TransactionId> =
            self.transactions.iter().filter(|(_, t)| t.first_scn <= threshold_scn).map(|(id, _)| id.clone()).collect();

        if stale.is_empty() {
            return;
        }

        for id in &stale {
            self.transactions.remove(id);
            self.abandoned.insert(id.clone());
        }
        self.recompute_largest_scn();
        self.metrics.record_abandoned_transactions(stale.len() as u64);
        self.metrics.set_active_transactions(self.transactions.len() as u64);
        log::warn!("abandoned {} transaction(s) older than SCN {threshold_scn}", stale.len());
    }

    /// Explicit override used by the mining loop's Advance state to unpin the
    /// watermark during idle periods.
    pub fn reset_largest_scn(&mut self, value: Option<Scn>) {
        self.largest_scn = value.unwrap_or(Scn::ZERO);
    }

    /// True iff there are no live transactions and no emission task is still
    /// in flight.
    pub fn is_empty(&mut self) -> bool {
        self.drain_completions();
        self.transactions.is_empty() && self.pending_emissions() == 0
    }

    pub fn pending_emissions(&self) -> u64 {
        self.scheduled_emissions - self.completed_emissions
    }

    /// Shut down the emission worker, waiting briefly for in-flight work to
    /// drain, then clear all transaction state (§3 lifecycle, §5 close).
    pub fn close(&mut self) {
        self.worker.close();
        self.drain_completions();
        self.transactions.clear();
    }

    fn recompute_largest_scn(&mut self) {
        self.largest_scn = self.transactions.values().map(|t| t.last_scn).max().unwrap_or(Scn::ZERO);
    }

    fn drain_completions(&mut self) {
        while let Ok(outcome) = self.completion_rx.try_recv() {
            self.completed_emissions += 1;
            if outcome.success {
                if outcome.commit_scn > self.last_committed_scn {
                    self.last_committed_scn = outcome.commit_scn;
                }
                self.metrics.record_committed_transaction();
            }
        }
    }
}

fn lag_millis(change_time_millis: u64) -> i64 {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0);
    now.saturating_sub(change_time_millis as i64)
}
