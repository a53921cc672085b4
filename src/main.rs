//! Minimal demo binary: wires a `MiningLoop` against an in-memory fake
//! session and runs it for a few cycles. Not a connector host - no CLI
//! flags, no env vars, no exit-code contract; a real deployment supplies
//! its own `MiningSession`, `DmlParser`, `EventDispatcher` and `SchemaProvider`
//! and drives `MiningLoop::run` from its own process lifecycle.

use std::collections::VecDeque;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use log::info;

use oracle_cdc_core::dispatch::{ChangeRecord, DmlParser, EventDispatcher, SchemaProvider};
use oracle_cdc_core::error::Result;
use oracle_cdc_core::scn::MAX_SCN_19_6;
use oracle_cdc_core::session::{MiningRow, MiningSession, RedoFile};
use oracle_cdc_core::{MiningConfig, MiningLoop, Metrics, Offset, Scn};

const DB_MAX_SCN_SENTINEL: Scn = MAX_SCN_19_6;

/// A single online redo log that never switches, with a scripted sequence
/// of mining fetches - enough to drive the state machine through a few
/// Mine/Advance cycles without a real database.
struct InMemorySession {
    current_scn: Scn,
    batches: VecDeque<Vec<MiningRow>>,
}

impl MiningSession for InMemorySession {
    fn current_scn(&mut self) -> Result<Scn> {
        Ok(self.current_scn)
    }

    fn oldest_online_first_change(&mut self) -> Result<Scn> {
        Ok(Scn::ZERO)
    }

    fn list_online_logs(&mut self) -> Result<Vec<RedoFile>> {
        Ok(vec![RedoFile { name: "demo_redo_01".to_string(), first_change: Scn::ZERO, next_change: DB_MAX_SCN_SENTINEL }])
    }

    fn list_archived_logs(&mut self, _first_change_after: Scn) -> Result<Vec<RedoFile>> {
        Ok(vec![])
    }

    fn register_file(&mut self, file: &RedoFile) -> Result<()> {
        info!("registered {}", file.name);
        Ok(())
    }

    fn deregister_file(&mut self, file: &RedoFile) -> Result<()> {
        info!("deregistered {}", file.name);
        Ok(())
    }

    fn begin_mining(
        &mut self,
        start_scn: Scn,
        end_scn: Scn,
        strategy: oracle_cdc_core::MiningStrategy,
        _continuous_mine: bool,
    ) -> Result<()> {
        info!("begin_mining [{start_scn}, {end_scn}] using {strategy:?}");
        Ok(())
    }

    fn end_mining(&mut self) -> Result<()> {
        Ok(())
    }

    fn fetch(&mut self, _start_scn: Scn, _end_scn: Scn) -> Result<Vec<MiningRow>> {
        Ok(self.batches.pop_front().unwrap_or_default())
    }
}

struct EchoParser;

impl DmlParser for EchoParser {
    fn parse(&self, table: &str, redo_sql: &str) -> Result<ChangeRecord> {
        Ok(ChangeRecord {
            table: table.to_string(),
            redo_sql: redo_sql.to_string(),
            commit_scn: Scn::ZERO,
            commit_timestamp: 0,
            smallest_open_scn: None,
            remaining_in_transaction: 0,
        })
    }
}

struct LoggingDispatcher;

impl EventDispatcher for LoggingDispatcher {
    fn dispatch(&self, record: ChangeRecord) -> Result<()> {
        info!("emitted {} @ commit SCN {}: {}", record.table, record.commit_scn, record.redo_sql);
        Ok(())
    }
}

struct AllTablesIncluded;

impl SchemaProvider for AllTablesIncluded {
    fn is_table_included(&self, _table: &str) -> bool {
        true
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let session = InMemorySession {
        current_scn: Scn::new(300),
        batches: VecDeque::from([
            vec![
                MiningRow::Dml {
                    txn_id: "tx1".to_string(),
                    scn: Scn::new(101),
                    table: "accounts".to_string(),
                    sql_redo: "update accounts set balance = balance - 50 where id = 1".to_string(),
                    change_time: 0,
                },
                MiningRow::Commit { txn_id: "tx1".to_string(), scn: Scn::new(102), timestamp: 0 },
            ],
            vec![],
        ]),
    };

    let mut mining_loop = MiningLoop::new(
        session,
        MiningConfig::conservative(),
        Offset::new(Scn::ZERO),
        Arc::new(EchoParser),
        Arc::new(LoggingDispatcher),
        Arc::new(AllTablesIncluded),
        Arc::new(Metrics::new()),
        Arc::new(AtomicBool::new(true)),
        DB_MAX_SCN_SENTINEL,
    );

    mining_loop.run(2)?;
    info!("demo run complete, offset now at SCN {}", mining_loop.offset().scn);
    Ok(())
}
