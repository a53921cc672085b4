//! Adaptive batch-size / sleep controller (§4.5)
//!
//! The only writer of `batch_size`/`sleep_millis` outside of an operator
//! mutating `MiningConfig` directly. Kept as a small struct with plain
//! integer state plus the config bounds, the way the teacher keeps
//! `GraniteConfig`'s tuning knobs as plain fields rather than wrapping them
//! in atomics - this state is only ever touched from the mining thread.

use crate::config::MiningConfig;
use crate::scn::Scn;

/// Current batch size and inter-poll sleep, adjusted every mining cycle
/// toward "keep up with head SCN without overloading the database".
pub struct AdaptiveController {
    batch_size: u64,
    sleep_millis: u64,
    min_batch_size: u64,
    max_batch_size: u64,
    batch_size_step: u64,
    default_batch_size: u64,
    min_sleep_millis: u64,
    max_sleep_millis: u64,
    sleep_millis_step: u64,
}

/// The window endpoint the controller picked for this cycle, per the §4.5
/// condition table.
pub struct ControllerDecision {
    pub end_scn: Scn,
}

impl AdaptiveController {
    pub fn new(config: &MiningConfig) -> Self {
        Self {
            batch_size: config.default_batch_size,
            sleep_millis: config.default_sleep_millis,
            min_batch_size: config.min_batch_size,
            max_batch_size: config.max_batch_size,
            batch_size_step: config.batch_size_step,
            default_batch_size: config.default_batch_size,
            min_sleep_millis: config.min_sleep_millis,
            max_sleep_millis: config.max_sleep_millis,
            sleep_millis_step: config.sleep_millis_step,
        }
    }

    pub fn batch_size(&self) -> u64 {
        self.batch_size
    }

    pub fn sleep_millis(&self) -> u64 {
        self.sleep_millis
    }

    /// Apply the §4.5 condition table for `current_scn` (C) against the
    /// tentative window end `start_scn + batch_size` (T), adjusting
    /// `batch_size`/`sleep_millis` and returning the chosen `end_scn`.
    pub fn decide(&mut self, start_scn: Scn, current_scn: Scn) -> ControllerDecision {
        let tentative_end = start_scn.saturating_add(self.batch_size);
        let default_batch = Scn::from(self.default_batch_size);

        let end_scn = if tentative_end > current_scn && tentative_end.saturating_sub_scn(current_scn) > default_batch {
            // far future: we asked for more than the DB has produced by a wide margin
            self.shrink_batch();
            current_scn
        } else if current_scn > tentative_end && current_scn.saturating_sub_scn(tentative_end) > default_batch {
            // behind: the DB is well ahead of our tentative window
            self.grow_batch();
            tentative_end
        } else if current_scn < tentative_end {
            // caught up: nothing new beyond the DB's current SCN yet
            self.slow_down();
            current_scn
        } else {
            // in window: DB has at least reached our tentative end
            self.speed_up();
            tentative_end
        };

        ControllerDecision { end_scn }
    }

    fn shrink_batch(&mut self) {
        self.batch_size = self.batch_size.saturating_sub(self.batch_size_step).max(self.min_batch_size);
    }

    fn grow_batch(&mut self) {
        self.batch_size = (self.batch_size + self.batch_size_step).min(self.max_batch_size);
    }

    fn slow_down(&mut self) {
        self.sleep_millis = (self.sleep_millis + self.sleep_millis_step).min(self.max_sleep_millis);
    }

    fn speed_up(&mut self) {
        self.sleep_millis = self.sleep_millis.saturating_sub(self.sleep_millis_step).max(self.min_sleep_millis);
    }
}

trait ScnDiff {
    /// Saturating difference as an `Scn`, used only to compare magnitudes
    /// against `default_batch_size` thresholds, never for durable SCN state.
    fn saturating_sub_scn(self, other: Scn) -> Scn;
}

impl ScnDiff for Scn {
    fn saturating_sub_scn(self, other: Scn) -> Scn {
        Scn::new(self.0.saturating_sub(other.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller() -> AdaptiveController {
        AdaptiveController::new(&MiningConfig::default())
    }

    #[test]
    fn far_future_shrinks_batch_and_caps_end_scn_at_current() {
        let mut controller = controller();
        let start = Scn::new(1_000_000);
        let current = Scn::new(1_000_000);
        let decision = controller.decide(start, current);
        // tentative_end = start + default_batch_size (100_000) = 1_100_000, far beyond current
        assert_eq!(decision.end_scn, current);
        assert!(controller.batch_size() < MiningConfig::default().default_batch_size);
    }

    #[test]
    fn behind_grows_batch_and_uses_tentative_end() {
        let mut controller = controller();
        let start = Scn::new(0);
        let current = Scn::new(10_000_000);
        let decision = controller.decide(start, current);
        let tentative_end = start.saturating_add(MiningConfig::default().default_batch_size);
        assert_eq!(decision.end_scn, tentative_end);
        assert!(controller.batch_size() > MiningConfig::default().default_batch_size);
    }

    #[test]
    fn caught_up_slows_down_and_caps_at_current_scn() {
        let mut controller = controller();
        let start = Scn::new(100);
        let current = Scn::new(150);
        let decision = controller.decide(start, current);
        assert_eq!(decision.end_scn, current);
        assert!(controller.sleep_millis() > MiningConfig::default().default_sleep_millis);
    }

    #[test]
    fn in_window_speeds_up_and_uses_tentative_end() {
        let mut controller = controller();
        let start = Scn::new(0);
        let current = Scn::new(MiningConfig::default().default_batch_size);
        let decision = controller.decide(start, current);
        assert_eq!(decision.end_scn, start.saturating_add(MiningConfig::default().default_batch_size));
        assert!(controller.sleep_millis() < MiningConfig::default().default_sleep_millis);
    }

    #[test]
    fn batch_size_never_crosses_configured_bounds() {
        let mut controller = controller();
        for _ in 0..1000 {
            controller.decide(Scn::new(1_000_000_000), Scn::new(0));
        }
        assert!(controller.batch_size() >= MiningConfig::default().min_batch_size);
    }
}
