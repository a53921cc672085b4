//! Error types for the Oracle CDC core
//!
//! Defines a unified error type that can represent failures from every
//! component of the mining pipeline, plus the transient/fatal/recovered
//! classification the mining loop's Recover state depends on.

use std::fmt;
use std::io;

/// How the mining loop should react to an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Log and restart from Connect, preserving `start_scn`.
    Transient,
    /// Propagate out of the loop; the connector must be restarted externally.
    Fatal,
    /// Already handled locally (e.g. duplicate-commit drop); not an error to the caller.
    Recovered,
}

/// A fixed table of Oracle error prefixes that are known to be transient
/// network/session problems rather than data-integrity issues.
const TRANSIENT_ORA_PREFIXES: &[&str] = &["ORA-03135", "ORA-12543", "ORA-00604", "ORA-01089"];

/// Unified error type for Oracle CDC core operations.
#[derive(Debug)]
pub enum CdcError {
    /// I/O error (offset persistence, log file planning).
    Io(io::Error),
    /// The mining session or database collaborator reported a failure.
    Session(String),
    /// A commit callback (parser/dispatcher) failed.
    Dispatch(String),
    /// `startScn` has fallen out of the retrievable redo window (§7.2).
    OffsetTooOld { start_scn: String, oldest_online: String },
    /// The log-file planner found no file covering the offset (§7.3).
    EmptyLogPlan,
    /// The mining thread was interrupted; the interrupt flag should be restored.
    Interrupted,
    /// Anything else.
    Internal(String),
}

impl CdcError {
    /// Build a transient-network error from a raw Oracle error message, if it
    /// matches one of the known transient prefixes. Returns `None` otherwise,
    /// so callers can fall back to treating the message as fatal.
    pub fn classify_session_message(message: &str) -> Option<Self> {
        TRANSIENT_ORA_PREFIXES
            .iter()
            .find(|prefix| message.contains(*prefix))
            .map(|_| CdcError::Session(message.to_string()))
    }

    /// Classify this error for the mining loop's Recover/fatal split (§7).
    pub fn classification(&self) -> Classification {
        match self {
            CdcError::Session(msg) => {
                if TRANSIENT_ORA_PREFIXES.iter().any(|prefix| msg.contains(prefix)) {
                    Classification::Transient
                } else {
                    Classification::Fatal
                }
            }
            CdcError::Io(e) => match e.kind() {
                io::ErrorKind::ConnectionReset
                | io::ErrorKind::ConnectionAborted
                | io::ErrorKind::TimedOut
                | io::ErrorKind::WouldBlock => Classification::Transient,
                _ => Classification::Fatal,
            },
            CdcError::OffsetTooOld { .. } => Classification::Fatal,
            CdcError::EmptyLogPlan => Classification::Fatal,
            CdcError::Dispatch(_) => Classification::Fatal,
            CdcError::Interrupted => Classification::Recovered,
            CdcError::Internal(_) => Classification::Fatal,
        }
    }
}

impl fmt::Display for CdcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CdcError::Io(e) => write!(f, "{}", e),
            CdcError::Session(msg) => write!(f, "mining session error: {}", msg),
            CdcError::Dispatch(msg) => write!(f, "commit callback failed: {}", msg),
            CdcError::OffsetTooOld { start_scn, oldest_online } => write!(
                f,
                "offset {} is older than oldest online redo ({}); clean offset and re-snapshot",
                start_scn, oldest_online
            ),
            CdcError::EmptyLogPlan => {
                write!(f, "no redo log covers the requested offset; clean offset and re-snapshot")
            }
            CdcError::Interrupted => write!(f, "mining thread interrupted"),
            CdcError::Internal(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for CdcError {}

impl From<io::Error> for CdcError {
    fn from(e: io::Error) -> Self {
        CdcError::Io(e)
    }
}

impl From<serde_json::Error> for CdcError {
    fn from(e: serde_json::Error) -> Self {
        CdcError::Internal(e.to_string())
    }
}

/// Result type alias for Oracle CDC core operations.
pub type Result<T> = std::result::Result<T, CdcError>;
