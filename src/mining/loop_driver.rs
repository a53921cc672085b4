//! Mining-loop state machine (§4.4)
//!
//! Drives a `MiningSession` through Connect -> Prepare -> Mine -> Advance ->
//! Mine ..., falling back to Recover on a transient fault (§7.1). Owns the
//! buffer, planner and controller and is the only thing that calls into
//! them - same "single owning driver" shape as the teacher's `GraniteEngine`
//! wiring its WAL worker, just with a state enum instead of an always-on
//! engine loop, since mining has explicit phases with different failure
//! handling at each one.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::config::MiningConfig;
use crate::dispatch::{CommitCallback, DmlParser, EventDispatcher, SchemaProvider};
use crate::error::{CdcError, Classification, Result};
use crate::metrics::Metrics;
use crate::offset::Offset;
use crate::scn::Scn;
use crate::session::{MiningRow, MiningSession};

use super::buffer::TransactionalBuffer;
use super::controller::AdaptiveController;
use super::logplan::LogFilePlanner;

/// Mining-loop phase, per §4.4.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MiningLoopState {
    Connect,
    Prepare,
    Mine,
    Advance,
    Recover,
}

/// Drives one `MiningSession` end to end. `endScn` is treated as inclusive
/// (a mining window is `[startScn, endScn]`) - see §9's design-note decision.
pub struct MiningLoop<S: MiningSession> {
    session: S,
    config: MiningConfig,
    buffer: TransactionalBuffer,
    planner: LogFilePlanner,
    controller: AdaptiveController,
    parser: Arc<dyn DmlParser>,
    dispatcher: Arc<dyn EventDispatcher>,
    schema: Arc<dyn SchemaProvider>,
    offset: Offset,
    start_scn: Scn,
    end_scn: Scn,
    state: MiningLoopState,
    running: Arc<AtomicBool>,
    db_max_scn_sentinel: Scn,
    last_online_file_names: Vec<String>,
    metrics: Arc<Metrics>,
}

impl<S: MiningSession> MiningLoop<S> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        session: S,
        config: MiningConfig,
        offset: Offset,
        parser: Arc<dyn DmlParser>,
        dispatcher: Arc<dyn EventDispatcher>,
        schema: Arc<dyn SchemaProvider>,
        metrics: Arc<Metrics>,
        running: Arc<AtomicBool>,
        db_max_scn_sentinel: Scn,
    ) -> Self {
        let controller = AdaptiveController::new(&config);
        let buffer = TransactionalBuffer::new(Arc::clone(&metrics), config.max_queue_size, Arc::clone(&running));
        let start_scn = offset.scn;
        Self {
            session,
            config,
            buffer,
            planner: LogFilePlanner::new(),
            controller,
            parser,
            dispatcher,
            schema,
            offset,
            start_scn,
            end_scn: start_scn,
            state: MiningLoopState::Connect,
            running,
            db_max_scn_sentinel,
            last_online_file_names: Vec::new(),
            metrics,
        }
    }

    pub fn state(&self) -> MiningLoopState {
        self.state
    }

    pub fn offset(&self) -> &Offset {
        &self.offset
    }

    pub fn buffer(&mut self) -> &mut TransactionalBuffer {
        &mut self.buffer
    }

    /// Run until `self.running` is cleared or `max_cycles` full Mine+Advance
    /// pairs have executed, restarting from Connect on a transient fault.
    /// Any fatal error propagates immediately.
    pub fn run(&mut self, max_cycles: usize) -> Result<()> {
        let mut cycles = 0;
        while self.running.load(Ordering::Relaxed) && cycles < max_cycles {
            match self.step() {
                Ok(()) => {
                    if self.state == MiningLoopState::Mine {
                        cycles += 1;
                    }
                }
                Err(err) => match err.classification() {
                    Classification::Transient => {
                        log::warn!("transient mining fault, restarting from Connect: {err}");
                        self.metrics.record_network_problem();
                        self.state = MiningLoopState::Recover;
                    }
                    _ => return Err(err),
                },
            }
        }
        Ok(())
    }

    /// Advance the state machine by exactly one phase.
    pub fn step(&mut self) -> Result<()> {
        match self.state {
            MiningLoopState::Connect | MiningLoopState::Recover => {
                self.on_connect();
                self.state = MiningLoopState::Prepare;
            }
            MiningLoopState::Prepare => {
                self.on_prepare()?;
                self.state = MiningLoopState::Mine;
            }
            MiningLoopState::Mine => {
                self.on_mine()?;
                self.state = MiningLoopState::Advance;
            }
            MiningLoopState::Advance => {
                self.on_advance();
                self.state = MiningLoopState::Mine;
            }
        }
        Ok(())
    }

    fn on_connect(&mut self) {
        log::info!("mining loop connecting (session setup is owned by the collaborator)");
    }

    fn on_prepare(&mut self) -> Result<()> {
        self.start_scn = self.offset.scn;
        self.end_scn = self.start_scn;

        if !self.config.continuous_mine {
            let oldest = self.session.oldest_online_first_change()?;
            if self.start_scn < oldest {
                return Err(CdcError::OffsetTooOld {
                    start_scn: self.start_scn.to_string(),
                    oldest_online: oldest.to_string(),
                });
            }
        }

        self.planner.replan(&mut self.session, self.start_scn, self.db_max_scn_sentinel)?;
        self.last_online_file_names = self.session.list_online_logs()?.into_iter().map(|f| f.name).collect();
        Ok(())
    }

    fn on_mine(&mut self) -> Result<()> {
        let current_scn = self.session.current_scn()?;
        let decision = self.controller.decide(self.start_scn, current_scn);
        self.end_scn = decision.end_scn;
        self.metrics.set_batch_size(self.controller.batch_size());
        self.metrics.set_sleep_millis(self.controller.sleep_millis());

        if self.controller.sleep_millis() > 0 {
            std::thread::sleep(Duration::from_millis(self.controller.sleep_millis()));
        }

        let online_now: Vec<String> = self.session.list_online_logs()?.into_iter().map(|f| f.name).collect();
        if online_now != self.last_online_file_names {
            log::info!("log switch detected, re-registering mining files");
            self.session.end_mining()?;
            let oldest = self.session.oldest_online_first_change()?;
            self.buffer.abandon_long_transactions(oldest);
            self.planner.replan(&mut self.session, self.start_scn, self.db_max_scn_sentinel)?;
            self.last_online_file_names = online_now;
        }

        self.session.begin_mining(self.start_scn, self.end_scn, self.config.strategy, self.config.continuous_mine)?;
        let rows = self.session.fetch(self.start_scn, self.end_scn)?;
        for row in rows {
            if !self.running.load(Ordering::Relaxed) {
                break;
            }
            self.dispatch_row(row)?;
        }
        self.session.end_mining()?;
        Ok(())
    }

    fn dispatch_row(&mut self, row: MiningRow) -> Result<()> {
        match row {
            MiningRow::Dml { txn_id, scn, table, sql_redo, change_time } => {
                if !self.schema.is_table_included(&table) {
                    return Ok(());
                }
                let callback = CommitCallback::new(table, sql_redo, Arc::clone(&self.parser), Arc::clone(&self.dispatcher));
                self.buffer.register(txn_id, scn, change_time, callback);
            }
            MiningRow::Commit { txn_id, scn, timestamp } => {
                if self.buffer.commit(&txn_id, scn, &self.offset, timestamp)? {
                    self.offset.record_commit(scn);
                }
            }
            MiningRow::Rollback { txn_id } => {
                self.buffer.rollback(&txn_id);
            }
        }
        Ok(())
    }

    fn on_advance(&mut self) {
        let next_start = if self.buffer.largest_scn().is_zero() { self.end_scn } else { self.buffer.largest_scn() };

        if next_start <= self.start_scn {
            self.buffer.reset_largest_scn(Some(self.end_scn));
        }
        self.start_scn = self.end_scn;

        if self.buffer.is_empty() {
            self.offset.advance_scn(self.end_scn);
            self.buffer.reset_largest_scn(None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::test_support::{EchoParser, RecordingDispatcher};
    use crate::scn::MAX_SCN_19_6;
    use crate::session::RedoFile;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct AllTablesIncluded;
    impl SchemaProvider for AllTablesIncluded {
        fn is_table_included(&self, _table: &str) -> bool {
            true
        }
    }

    /// A scripted `MiningSession`: a fixed sequence of `MiningRow` batches,
    /// one consumed per `fetch` call, with a single online redo file that
    /// can be swapped mid-script to simulate a log switch.
    struct ScriptedSession {
        current_scn: Scn,
        oldest_online: Scn,
        online_file: Mutex<String>,
        batches: VecDeque<Vec<MiningRow>>,
        registered: Vec<String>,
    }

    impl MiningSession for ScriptedSession {
        fn current_scn(&mut self) -> Result<Scn> {
            Ok(self.current_scn)
        }
        fn oldest_online_first_change(&mut self) -> Result<Scn> {
            Ok(self.oldest_online)
        }
        fn list_online_logs(&mut self) -> Result<Vec<RedoFile>> {
            let name = self.online_file.lock().unwrap().clone();
            Ok(vec![RedoFile { name, first_change: self.oldest_online, next_change: MAX_SCN_19_6 }])
        }
        fn list_archived_logs(&mut self, _first_change_after: Scn) -> Result<Vec<RedoFile>> {
            Ok(vec![])
        }
        fn register_file(&mut self, file: &RedoFile) -> Result<()> {
            self.registered.push(file.name.clone());
            Ok(())
        }
        fn deregister_file(&mut self, file: &RedoFile) -> Result<()> {
            self.registered.retain(|n| n != &file.name);
            Ok(())
        }
        fn begin_mining(&mut self, _start: Scn, _end: Scn, _strategy: crate::config::MiningStrategy, _continuous: bool) -> Result<()> {
            Ok(())
        }
        fn end_mining(&mut self) -> Result<()> {
            Ok(())
        }
        fn fetch(&mut self, _start: Scn, _end: Scn) -> Result<Vec<MiningRow>> {
            Ok(self.batches.pop_front().unwrap_or_default())
        }
    }

    fn new_loop(session: ScriptedSession) -> MiningLoop<ScriptedSession> {
        let config = MiningConfig { default_sleep_millis: 0, min_sleep_millis: 0, ..MiningConfig::default() };
        MiningLoop::new(
            session,
            config,
            Offset::new(Scn::ZERO),
            Arc::new(EchoParser),
            Arc::new(RecordingDispatcher::default()),
            Arc::new(AllTablesIncluded),
            Arc::new(Metrics::new()),
            Arc::new(AtomicBool::new(true)),
            MAX_SCN_19_6,
        )
    }

    #[test]
    fn s6_idle_tick_advances_offset_to_end_scn() {
        let session = ScriptedSession {
            current_scn: Scn::new(200),
            oldest_online: Scn::ZERO,
            online_file: Mutex::new("redo1".to_string()),
            batches: VecDeque::from([vec![]]),
            registered: vec![],
        };
        let mut mining_loop = new_loop(session);
        mining_loop.offset = Offset::new(Scn::new(100));
        mining_loop.start_scn = Scn::new(100);

        mining_loop.step().unwrap(); // Connect -> Prepare
        mining_loop.step().unwrap(); // Prepare -> Mine
        mining_loop.step().unwrap(); // Mine -> Advance
        mining_loop.step().unwrap(); // Advance -> Mine

        assert_eq!(mining_loop.offset().scn, Scn::new(200));
    }

    #[test]
    fn prepare_fails_fast_when_offset_precedes_oldest_online_redo() {
        let session = ScriptedSession {
            current_scn: Scn::new(1000),
            oldest_online: Scn::new(500),
            online_file: Mutex::new("redo1".to_string()),
            batches: VecDeque::new(),
            registered: vec![],
        };
        let mut mining_loop = new_loop(session);
        mining_loop.offset = Offset::new(Scn::new(10));
        mining_loop.start_scn = Scn::new(10);

        mining_loop.step().unwrap(); // Connect -> Prepare
        let err = mining_loop.step().unwrap_err();
        assert!(matches!(err, CdcError::OffsetTooOld { .. }));
    }

    #[test]
    fn log_switch_abandons_stale_transactions_and_replans() {
        let session = ScriptedSession {
            current_scn: Scn::new(200),
            oldest_online: Scn::ZERO,
            online_file: Mutex::new("redo1".to_string()),
            batches: VecDeque::from([vec![MiningRow::Dml {
                txn_id: "t1".to_string(),
                scn: Scn::new(1),
                table: "accounts".to_string(),
                sql_redo: "update accounts set x=1".to_string(),
                change_time: 0,
            }]]),
            registered: vec![],
        };
        let mut mining_loop = new_loop(session);

        mining_loop.step().unwrap(); // Connect -> Prepare
        mining_loop.step().unwrap(); // Prepare -> Mine (registers t1)
        assert!(mining_loop.buffer().pending_emissions() == 0);

        *mining_loop.session.online_file.lock().unwrap() = "redo2".to_string();
        mining_loop.session.batches.push_back(vec![]);
        mining_loop.step().unwrap(); // Advance -> Mine
        mining_loop.step().unwrap(); // Mine -> Advance (log switch this cycle)

        assert!(!mining_loop.buffer().rolled_back_ids().contains("t1"));
    }
}
