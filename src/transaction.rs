//! Transaction record held by the transactional buffer
//!
//! Mirrors the shape of `Transaction` in the Granite WAL engine (begin LSN,
//! mutable state, an ordered undo/redo log) but keyed by an opaque database
//! transaction id and ordered by SCN instead of LSN.

use std::collections::HashMap;

use crate::dispatch::CommitCallback;
use crate::scn::Scn;

/// Opaque transaction id assigned by the database.
pub type TransactionId = String;

/// One DML's callback, paired with the SCN it was registered at so the
/// buffer can recompute `lastScn` after removal without re-scanning redo.
pub struct PendingCallback {
    pub scn: Scn,
    pub callback: CommitCallback,
}

/// A single in-flight transaction, owned exclusively by the buffer.
///
/// Invariant: `first_scn <= last_scn`; every call to `add_callback` is made
/// with an `scn >= last_scn`, since mining delivers rows in SCN order within
/// a transaction.
pub struct Transaction {
    pub id: TransactionId,
    /// SCN of the first observed DML. Immutable after creation.
    pub first_scn: Scn,
    /// SCN of the most recently added DML. Monotone non-decreasing.
    pub last_scn: Scn,
    /// Ordered commit callbacks, one per admitted DML, in mining order.
    pub callbacks: Vec<PendingCallback>,
    /// SCN -> ordered redo SQL strings recorded at that SCN; used for the
    /// within-SCN de-duplication check and debug dumps.
    pub redo_by_scn: HashMap<Scn, Vec<String>>,
}

impl Transaction {
    pub fn new(id: TransactionId, first_scn: Scn) -> Self {
        Self {
            id,
            first_scn,
            last_scn: first_scn,
            callbacks: Vec::new(),
            redo_by_scn: HashMap::new(),
        }
    }

    /// True if `redo_sql` was already recorded at exactly this SCN.
    pub fn has_redo_at(&self, scn: Scn, redo_sql: &str) -> bool {
        self.redo_by_scn.get(&scn).map(|entries| entries.iter().any(|s| s == redo_sql)).unwrap_or(false)
    }

    /// Record `sql` at `scn` for de-duplication bookkeeping and advance
    /// `last_scn`.
    ///
    /// Panics in debug builds if `scn < last_scn`, since mining order within
    /// a transaction must be SCN-ordered; release builds just clamp.
    fn record_redo_sql(&mut self, scn: Scn, sql: &str) {
        debug_assert!(scn >= self.last_scn, "redo delivered out of SCN order within a transaction");
        self.redo_by_scn.entry(scn).or_default().push(sql.to_string());
        if scn > self.last_scn {
            self.last_scn = scn;
        }
    }

    /// Append one DML's callback to this transaction, recording its redo SQL
    /// and advancing `last_scn`. Callers (the buffer) are responsible for the
    /// de-duplication check in §4.1 before calling this.
    pub fn add_callback(&mut self, scn: Scn, sql: &str, callback: CommitCallback) {
        self.record_redo_sql(scn, sql);
        self.callbacks.push(PendingCallback { scn, callback });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::test_support::{EchoParser, RecordingDispatcher};
    use std::sync::Arc;

    fn callback(table: &str, sql: &str) -> CommitCallback {
        CommitCallback::new(
            table.to_string(),
            sql.to_string(),
            Arc::new(EchoParser),
            Arc::new(RecordingDispatcher::default()),
        )
    }

    #[test]
    fn new_transaction_has_equal_first_and_last_scn() {
        let txn = Transaction::new("tx1".to_string(), Scn::new(5));
        assert_eq!(txn.first_scn, Scn::new(5));
        assert_eq!(txn.last_scn, Scn::new(5));
        assert!(txn.callbacks.is_empty());
    }

    #[test]
    fn add_callback_advances_last_scn() {
        let mut txn = Transaction::new("tx1".to_string(), Scn::new(1));
        txn.add_callback(Scn::new(10), "update t set x=1", callback("t", "update t set x=1"));
        assert_eq!(txn.last_scn, Scn::new(10));
        assert_eq!(txn.first_scn, Scn::new(1));
        assert_eq!(txn.callbacks.len(), 1);
    }

    #[test]
    fn has_redo_at_detects_exact_duplicates_only() {
        let mut txn = Transaction::new("tx1".to_string(), Scn::new(1));
        txn.add_callback(Scn::new(10), "x", callback("t", "x"));
        assert!(txn.has_redo_at(Scn::new(10), "x"));
        assert!(!txn.has_redo_at(Scn::new(10), "y"));
        assert!(!txn.has_redo_at(Scn::new(11), "x"));
    }

    #[test]
    fn redo_by_scn_keeps_distinct_entries_in_order() {
        let mut txn = Transaction::new("tx1".to_string(), Scn::new(1));
        txn.add_callback(Scn::new(10), "x", callback("t", "x"));
        txn.add_callback(Scn::new(10), "y", callback("t", "y"));
        let entries = txn.redo_by_scn.get(&Scn::new(10)).unwrap();
        assert_eq!(entries, &vec!["x".to_string(), "y".to_string()]);
    }
}
