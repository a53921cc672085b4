//! The mining core: transactional buffer, emission worker, log-file planner,
//! adaptive controller, and the mining-loop state machine that drives them.
//!
//! Mirrors the module layout of the teacher's `engines/granite` directory -
//! one file per concern, wired together by a top-level driver (there,
//! `GraniteEngine`; here, `MiningLoop`).

pub mod buffer;
pub mod controller;
pub mod logplan;
pub mod loop_driver;
pub mod worker;

pub use buffer::TransactionalBuffer;
pub use controller::AdaptiveController;
pub use logplan::LogFilePlanner;
pub use loop_driver::{MiningLoop, MiningLoopState};
