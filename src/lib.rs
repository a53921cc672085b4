//! Transactional reorder/commit buffer and mining control loop for an
//! Oracle LogMiner-style CDC connector.
//!
//! This crate is the hard-engineering core of such a connector: buffering
//! interleaved per-transaction redo until commit, a log-file planner, the
//! Connect/Prepare/Mine/Advance/Recover state machine that drives a
//! `MiningSession` collaborator, and the adaptive controller that paces
//! mining against the database's head SCN. Parsing redo SQL, dispatching to
//! a downstream sink, the database session itself, and connector lifecycle
//! (CLI/env/exit codes) are out of scope - see the `dispatch` and `session`
//! modules for the collaborator traits a connector host implements.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod metrics;
pub mod mining;
pub mod offset;
pub mod scn;
pub mod session;
pub mod transaction;

pub use config::{MiningConfig, MiningStrategy};
pub use dispatch::{ChangeRecord, CommitCallback, DmlParser, EventDispatcher, SchemaProvider};
pub use error::{CdcError, Classification, Result};
pub use metrics::{Metrics, MetricsSnapshot};
pub use mining::{AdaptiveController, LogFilePlanner, MiningLoop, MiningLoopState, TransactionalBuffer};
pub use offset::Offset;
pub use scn::Scn;
pub use session::{MiningRow, MiningSession, RedoFile};
pub use transaction::{Transaction, TransactionId};
