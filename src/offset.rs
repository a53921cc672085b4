//! Persisted offset
//!
//! The only durability invariants are that `scn` and `commit_scn` are
//! monotone non-decreasing across restarts. The connector host owns actually
//! writing this to durable storage; the core only reads and updates it.

use serde::{Deserialize, Serialize};

use crate::scn::Scn;

/// The durable position of the mining loop, read on `Prepare` and advanced
/// on `Advance` (§4.4).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offset {
    /// Inclusive lower bound the mining loop should resume from.
    pub scn: Scn,
    /// Highest commit SCN already emitted in a previous run, used by the
    /// buffer's at-least-once de-duplication guard (§4.1).
    pub commit_scn: Option<Scn>,
    /// Opaque downstream log-coordinate position (e.g. a Kafka/LCR offset),
    /// not interpreted by the core.
    pub lcr_position: Option<String>,
    /// Whether an initial snapshot has completed. Snapshotting itself is a
    /// non-goal (§1); the core only threads this flag through.
    pub snapshot_completed: bool,
}

impl Offset {
    pub fn new(scn: Scn) -> Self {
        Self { scn, commit_scn: None, lcr_position: None, snapshot_completed: false }
    }

    /// Advance `scn` to `new_scn`, refusing to move it backwards.
    pub fn advance_scn(&mut self, new_scn: Scn) {
        if new_scn > self.scn {
            self.scn = new_scn;
        }
    }

    /// Record a newly emitted commit, refusing to move `commit_scn` backwards.
    pub fn record_commit(&mut self, commit_scn: Scn) {
        match self.commit_scn {
            Some(existing) if existing >= commit_scn => {}
            _ => self.commit_scn = Some(commit_scn),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_scn_never_moves_backwards() {
        let mut offset = Offset::new(Scn::new(100));
        offset.advance_scn(Scn::new(50));
        assert_eq!(offset.scn, Scn::new(100));
        offset.advance_scn(Scn::new(200));
        assert_eq!(offset.scn, Scn::new(200));
    }

    #[test]
    fn record_commit_never_moves_backwards() {
        let mut offset = Offset::new(Scn::ZERO);
        offset.record_commit(Scn::new(10));
        assert_eq!(offset.commit_scn, Some(Scn::new(10)));
        offset.record_commit(Scn::new(5));
        assert_eq!(offset.commit_scn, Some(Scn::new(10)));
        offset.record_commit(Scn::new(20));
        assert_eq!(offset.commit_scn, Some(Scn::new(20)));
    }

    #[test]
    fn serializes_round_trip_through_json() {
        let offset = Offset {
            scn: Scn::new(42),
            commit_scn: Some(Scn::new(40)),
            lcr_position: Some("partition-3:offset-99".to_string()),
            snapshot_completed: true,
        };
        let json = serde_json::to_string(&offset).unwrap();
        let restored: Offset = serde_json::from_str(&json).unwrap();
        assert_eq!(offset, restored);
    }
}
