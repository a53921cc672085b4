//! Log-file planner (§4.3)
//!
//! Maps an offset SCN to the set of online + archived redo files that must
//! be registered with the mining session. Split into a pure planning
//! function (easy to test without a session) and a `LogFilePlanner` that
//! drives the session's register/deregister calls and remembers what's
//! currently registered so it can clear it before swapping in a new plan.

use std::collections::HashSet;

use crate::error::{CdcError, Result};
use crate::scn::Scn;
use crate::session::{MiningSession, RedoFile};

/// Pure planning step: given the offset, the online redo groups, and the
/// archived logs already filtered to the retention window, compute the
/// de-duplicated set of files to register.
///
/// `db_max_scn_sentinel` is the database version's open-ended sentinel
/// (e.g. `scn::MAX_SCN_19_6`); an online log whose `next_change` equals it
/// is the file currently being written and is always included.
pub fn plan_files(
    offset_scn: Scn,
    online_logs: &[RedoFile],
    archived_logs: &[RedoFile],
    db_max_scn_sentinel: Scn,
) -> Result<Vec<RedoFile>> {
    let mut seen_next_change: HashSet<Scn> = HashSet::new();
    let mut plan = Vec::new();

    for log in online_logs {
        if log.next_change >= offset_scn || log.next_change == db_max_scn_sentinel {
            if seen_next_change.insert(log.next_change) {
                plan.push(log.clone());
            }
        }
    }

    for log in archived_logs {
        let covers_offset = log.first_change <= offset_scn && offset_scn <= log.next_change;
        if covers_offset && seen_next_change.insert(log.next_change) {
            plan.push(log.clone());
        }
    }

    if plan.is_empty() {
        return Err(CdcError::EmptyLogPlan);
    }

    Ok(plan)
}

/// Drives a `MiningSession`'s register/deregister calls for the planned
/// file set, remembering what's registered so a later re-plan (e.g. on a
/// log switch, §4.4 Mine state) clears the old set first.
#[derive(Default)]
pub struct LogFilePlanner {
    registered: Vec<RedoFile>,
}

impl LogFilePlanner {
    pub fn new() -> Self {
        Self { registered: Vec::new() }
    }

    pub fn registered_files(&self) -> &[RedoFile] {
        &self.registered
    }

    /// Recompute the plan for `offset_scn` and swap it into the session:
    /// deregister whatever is currently registered, then register the new
    /// plan. Leaves `registered` empty (and returns the error) if planning
    /// fails, so a subsequent call starts clean.
    pub fn replan(
        &mut self,
        session: &mut dyn MiningSession,
        offset_scn: Scn,
        db_max_scn_sentinel: Scn,
    ) -> Result<()> {
        let online_logs = session.list_online_logs()?;
        let archived_logs = session.list_archived_logs(offset_scn)?;
        let plan = plan_files(offset_scn, &online_logs, &archived_logs, db_max_scn_sentinel)?;

        for file in self.registered.drain(..) {
            session.deregister_file(&file)?;
        }
        for file in &plan {
            session.register_file(file)?;
        }
        self.registered = plan;
        Ok(())
    }
}
