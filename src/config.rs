//! Mining configuration
//!
//! Plain data plus named presets, the way the teacher's `GraniteConfig`
//! offers `synchronous()`/`high_throughput()` alongside a balanced default.

use serde::{Deserialize, Serialize};

/// Which dictionary strategy the mining session should use (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MiningStrategy {
    /// Use the already-online data dictionary. Skips DDL, reacts faster to
    /// log switches since there's no dictionary rebuild.
    OnlineCatalog,
    /// Mine the dictionary into redo on each log switch. Slower to react,
    /// but captures DDL.
    CatalogInRedo,
}

impl Default for MiningStrategy {
    fn default() -> Self {
        MiningStrategy::OnlineCatalog
    }
}

/// Configuration for the mining loop's batch sizing, polling cadence, and
/// transaction/archive retention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MiningConfig {
    pub strategy: MiningStrategy,
    /// If true, skip explicit log-file registration (Oracle <= 18c).
    pub continuous_mine: bool,

    /// Starting SCN-window batch size; adjusted at runtime by the adaptive
    /// controller (§4.5) between `min_batch_size` and `max_batch_size`.
    pub default_batch_size: u64,
    pub min_batch_size: u64,
    pub max_batch_size: u64,
    pub batch_size_step: u64,

    /// Starting inter-poll sleep; adjusted at runtime between
    /// `min_sleep_millis` and `max_sleep_millis`.
    pub default_sleep_millis: u64,
    pub min_sleep_millis: u64,
    pub max_sleep_millis: u64,
    pub sleep_millis_step: u64,

    /// Downstream queue shape (§6); not interpreted by the core beyond
    /// threading through to the connector host.
    pub max_queue_size: usize,
    pub poll_interval_millis: u64,

    /// Abandonment threshold (§4.1 `abandon_long_transactions`).
    pub transaction_retention_hours: u64,
    /// Archive-log inclusion window (§4.3 log-file planner).
    pub archive_log_retention_hours: u64,
}

impl Default for MiningConfig {
    fn default() -> Self {
        Self {
            strategy: MiningStrategy::OnlineCatalog,
            continuous_mine: false,
            default_batch_size: 100_000,
            min_batch_size: 1_000,
            max_batch_size: 1_000_000,
            batch_size_step: 10_000,
            default_sleep_millis: 1_000,
            min_sleep_millis: 100,
            max_sleep_millis: 5_000,
            sleep_millis_step: 200,
            max_queue_size: 10_000,
            poll_interval_millis: 500,
            transaction_retention_hours: 4,
            archive_log_retention_hours: 24,
        }
    }
}

impl MiningConfig {
    /// A config tuned to minimize database load at the cost of lag:
    /// smaller batches, longer sleeps, slower-growing controller steps.
    pub fn conservative() -> Self {
        Self {
            default_batch_size: 10_000,
            max_batch_size: 100_000,
            batch_size_step: 2_000,
            default_sleep_millis: 2_000,
            max_sleep_millis: 10_000,
            sleep_millis_step: 500,
            ..Default::default()
        }
    }

    /// A config tuned to chase the DB head as closely as possible: larger
    /// batches, shorter sleeps, captures DDL via `CatalogInRedo`.
    pub fn aggressive() -> Self {
        Self {
            strategy: MiningStrategy::CatalogInRedo,
            default_batch_size: 500_000,
            max_batch_size: 2_000_000,
            batch_size_step: 50_000,
            default_sleep_millis: 100,
            min_sleep_millis: 0,
            sleep_millis_step: 50,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_strategy_is_online_catalog() {
        assert_eq!(MiningConfig::default().strategy, MiningStrategy::OnlineCatalog);
    }

    #[test]
    fn conservative_sleeps_longer_than_default() {
        let conservative = MiningConfig::conservative();
        let default = MiningConfig::default();
        assert!(conservative.default_sleep_millis > default.default_sleep_millis);
        assert!(conservative.max_batch_size < default.max_batch_size);
    }

    #[test]
    fn aggressive_uses_catalog_in_redo_and_bigger_batches() {
        let aggressive = MiningConfig::aggressive();
        assert_eq!(aggressive.strategy, MiningStrategy::CatalogInRedo);
        assert!(aggressive.default_batch_size > MiningConfig::default().default_batch_size);
    }

    #[test]
    fn serializes_round_trip_through_json() {
        let config = MiningConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let restored: MiningConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, restored);
    }
}
