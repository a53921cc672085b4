//! Collaborator interfaces the buffer calls into at commit time
//!
//! `DmlParser`, `EventDispatcher` and `SchemaProvider` are out-of-scope
//! collaborators (§1): turning redo SQL into structured DML, handing
//! committed records to a downstream sink, and filtering tables. The buffer
//! only needs to know how to call them in order; it never interprets their
//! output. Per the design note in §9, the callback is a small struct holding
//! shared references plus the per-DML parameters captured at `register`
//! time, not an opaque closure.

use std::sync::Arc;

use crate::error::Result;
use crate::scn::Scn;

/// A structured change record produced by a `DmlParser` and handed to an
/// `EventDispatcher`. The real shape of this record (column images, op kind)
/// is out of scope; this is the minimal shell the core needs to compile and
/// test against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeRecord {
    pub table: String,
    pub redo_sql: String,
    pub commit_scn: Scn,
    pub commit_timestamp: u64,
    /// The smallest `first_scn` among transactions still open right after
    /// this commit, or `None` if this was the only open transaction. Lets
    /// the dispatcher's acknowledgement logic know how far behind the
    /// overall watermark still sits.
    pub smallest_open_scn: Option<Scn>,
    /// Transactions in the callback list count down from `len - 1` to `0`,
    /// so the last call is recognizable without storing the total length.
    pub remaining_in_transaction: usize,
}

/// Parses a redo SQL statement into a `ChangeRecord`. Implemented by the
/// connector host against the real schema catalog; out of scope here.
pub trait DmlParser: Send + Sync {
    fn parse(&self, table: &str, redo_sql: &str) -> Result<ChangeRecord>;
}

/// Accepts committed change records for delivery downstream. May block on
/// backpressure or fail; out of scope here beyond the trait shape.
pub trait EventDispatcher: Send + Sync {
    fn dispatch(&self, record: ChangeRecord) -> Result<()>;
}

/// Filters and resolves tables considered for mining. Out of scope here
/// beyond the trait shape the buffer and mining loop depend on.
pub trait SchemaProvider: Send + Sync {
    fn is_table_included(&self, table: &str) -> bool;
}

/// One DML's worth of callback state, captured at `register` time and fired
/// (in order) when its owning transaction commits.
///
/// Holds `Arc`s to the shared, read-only collaborators (parser, dispatcher)
/// rather than capturing an opaque closure, per §9's design note — this
/// keeps the emission worker's per-callback cost to a few `Arc` clones and
/// an owned `String` instead of a boxed closure's indirection.
pub struct CommitCallback {
    pub table: String,
    pub redo_sql: String,
    parser: Arc<dyn DmlParser>,
    dispatcher: Arc<dyn EventDispatcher>,
}

impl CommitCallback {
    pub fn new(
        table: String,
        redo_sql: String,
        parser: Arc<dyn DmlParser>,
        dispatcher: Arc<dyn EventDispatcher>,
    ) -> Self {
        Self { table, redo_sql, parser, dispatcher }
    }

    /// Parse and dispatch this DML at commit time. `commit_timestamp` and
    /// `commit_scn` come from the COMMIT marker; `smallest_open_scn` and
    /// `remaining` are computed by the buffer per §4.1.
    pub fn fire(
        &self,
        commit_timestamp: u64,
        smallest_open_scn: Option<Scn>,
        commit_scn: Scn,
        remaining: usize,
    ) -> Result<()> {
        let mut record = self.parser.parse(&self.table, &self.redo_sql)?;
        record.commit_scn = commit_scn;
        record.commit_timestamp = commit_timestamp;
        record.smallest_open_scn = smallest_open_scn;
        record.remaining_in_transaction = remaining;
        self.dispatcher.dispatch(record)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::sync::Mutex;

    /// A parser stub that wraps the redo SQL verbatim into a `ChangeRecord`.
    pub struct EchoParser;

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

    /// A dispatcher stub that records every dispatched record in order, for
    /// assertions, and can be told to fail on demand (mirrors the teacher's
    /// `TestConsumer::set_should_fail`).
    #[derive(Default)]
    pub struct RecordingDispatcher {
        pub received: Mutex<Vec<ChangeRecord>>,
        pub should_fail: std::sync::atomic::AtomicBool,
    }

    impl EventDispatcher for RecordingDispatcher {
        fn dispatch(&self, record: ChangeRecord) -> Result<()> {
            if self.should_fail.load(std::sync::atomic::Ordering::SeqCst) {
                return Err(crate::error::CdcError::Dispatch("dispatcher failing on demand".to_string()));
            }
            self.received.lock().unwrap().push(record);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn fire_parses_and_dispatches_with_commit_parameters() {
        let parser = Arc::new(EchoParser);
        let dispatcher = Arc::new(RecordingDispatcher::default());
        let cb = CommitCallback::new(
            "accounts".to_string(),
            "update accounts set balance=1".to_string(),
            parser,
            dispatcher.clone(),
        );

        cb.fire(1234, Some(Scn::new(5)), Scn::new(10), 2).unwrap();

        let received = dispatcher.received.lock().unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].commit_scn, Scn::new(10));
        assert_eq!(received[0].commit_timestamp, 1234);
        assert_eq!(received[0].smallest_open_scn, Some(Scn::new(5)));
        assert_eq!(received[0].remaining_in_transaction, 2);
    }

    #[test]
    fn fire_surfaces_dispatcher_failure() {
        let parser = Arc::new(EchoParser);
        let dispatcher = Arc::new(RecordingDispatcher::default());
        dispatcher.should_fail.store(true, std::sync::atomic::Ordering::SeqCst);
        let cb = CommitCallback::new("t".to_string(), "sql".to_string(), parser, dispatcher);

        let result = cb.fire(0, None, Scn::new(1), 0);
        assert!(result.is_err());
    }
}
