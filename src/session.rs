//! Mining session collaborator contract
//!
//! `MiningSession` is the database driver/session collaborator (§1, §6):
//! session setup, supplemental-logging checks, and the actual LogMiner
//! fetch are all out of scope. The core only needs this trait shape to
//! drive its state machine and test doubles that implement it.

use crate::config::MiningStrategy;
use crate::error::Result;
use crate::scn::Scn;

/// One online or archived redo log file, as listed by the mining session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedoFile {
    pub name: String,
    pub first_change: Scn,
    /// The SCN at which this file's range ends. Equal to the database
    /// version's max-SCN sentinel for the current online redo log.
    pub next_change: Scn,
}

/// A single row returned by a mining fetch, already classified by operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MiningRow {
    Dml { txn_id: String, scn: Scn, table: String, sql_redo: String, change_time: u64 },
    Commit { txn_id: String, scn: Scn, timestamp: u64 },
    Rollback { txn_id: String },
}

/// The database driver/session collaborator. Implemented by the connector
/// host against the real Oracle session; out of scope here beyond the trait
/// shape and the in-memory test double in `mining::loop_driver`'s tests.
pub trait MiningSession {
    fn current_scn(&mut self) -> Result<Scn>;
    fn oldest_online_first_change(&mut self) -> Result<Scn>;
    fn list_online_logs(&mut self) -> Result<Vec<RedoFile>>;
    fn list_archived_logs(&mut self, first_change_after: Scn) -> Result<Vec<RedoFile>>;

    fn register_file(&mut self, file: &RedoFile) -> Result<()>;
    fn deregister_file(&mut self, file: &RedoFile) -> Result<()>;

    fn begin_mining(&mut self, start_scn: Scn, end_scn: Scn, strategy: MiningStrategy, continuous_mine: bool) -> Result<()>;
    fn end_mining(&mut self) -> Result<()>;

    /// Fetch the rows in `[start_scn, end_scn]`, SCN-ordered. A real
    /// implementation streams from the database; the core only ever
    /// consumes this as an iterator.
    fn fetch(&mut self, start_scn: Scn, end_scn: Scn) -> Result<Vec<MiningRow>>;
}
