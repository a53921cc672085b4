//! Dedicated single-threaded emission worker (§5)
//!
//! Modeled directly on the Granite engine's `GraniteWorkerHandle` /
//! `granite_worker_thread` pair: a `std::thread` fed by a bounded
//! `mpsc::sync_channel`, holding no buffer state of its own. Where the
//! Granite worker batches WAL writes and acks them through per-request
//! responder channels, this worker fires one transaction's commit callbacks
//! per message and reports completion through a shared outcome channel
//! instead of blocking the submitter - the mining thread must not stall on
//! downstream backpressure (§5 "suspension points").

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::error::{CdcError, Result};
use crate::scn::Scn;
use crate::transaction::PendingCallback;

/// One commit's worth of work for the emission worker: the ordered callbacks
/// of a transaction that just committed, plus the parameters §4.1 says each
/// callback receives.
pub struct EmissionTask {
    pub commit_scn: Scn,
    pub commit_timestamp: u64,
    pub smallest_open_scn: Option<Scn>,
    pub callbacks: Vec<PendingCallback>,
    pub completion_tx: mpsc::Sender<EmissionOutcome>,
}

/// Reported back after a task finishes, however it finishes. `success` is
/// false if a callback failed or the worker was told to stop mid-task; the
/// buffer only advances `lastCommittedScn` when it's true.
pub struct EmissionOutcome {
    pub commit_scn: Scn,
    pub success: bool,
}

enum WorkerMessage {
    Emit(EmissionTask),
    Shutdown,
}

/// Handle to the emission worker thread.
pub struct EmissionWorkerHandle {
    sender: mpsc::SyncSender<WorkerMessage>,
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl EmissionWorkerHandle {
    /// Spawn the worker thread. `running` is shared with the mining loop and
    /// polled between callbacks (§5 cancellation); dropping it to `false`
    /// causes any in-flight task to abort cleanly.
    pub fn new(queue_capacity: usize, running: Arc<AtomicBool>) -> Self {
        let (tx, rx) = mpsc::sync_channel(queue_capacity.max(1));
        let worker_running = Arc::clone(&running);
        let thread = thread::spawn(move || emission_worker_thread(rx, worker_running));
        Self { sender: tx, running, thread: Some(thread) }
    }

    /// Enqueue a task. Blocks if the queue is full, applying the same
    /// backpressure the dispatcher itself would apply.
    pub fn schedule(&self, task: EmissionTask) -> Result<()> {
        self.sender
            .send(WorkerMessage::Emit(task))
            .map_err(|e| CdcError::Internal(format!("emission worker unavailable: {e}")))
    }

    /// Signal shutdown, wait up to one second for the worker to drain its
    /// queue and exit, then detach. A `JoinHandle` can't be force-killed in
    /// safe Rust, so "force-terminated" (§5) means: stop waiting and let the
    /// thread finish on its own time while we move on.
    pub fn close(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        let _ = self.sender.send(WorkerMessage::Shutdown);

        let Some(handle) = self.thread.take() else { return };
        let (done_tx, done_rx) = mpsc::channel();
        thread::spawn(move || {
            let _ = handle.join();
            let _ = done_tx.send(());
        });
        if done_rx.recv_timeout(Duration::from_secs(1)).is_err() {
            log::warn!("emission worker did not shut down within 1s; detaching");
        }
    }
}

impl Drop for EmissionWorkerHandle {
    fn drop(&mut self) {
        if self.thread.is_some() {
            self.close();
        }
    }
}

fn emission_worker_thread(rx: mpsc::Receiver<WorkerMessage>, running: Arc<AtomicBool>) {
    loop {
        match rx.recv() {
            Ok(WorkerMessage::Emit(task)) => process_task(task, &running),
            Ok(WorkerMessage::Shutdown) => {
                log::info!("emission worker shutting down (shutdown message)");
                break;
            }
            Err(_) => {
                log::info!("emission worker shutting down (channel closed)");
                break;
            }
        }
    }
}

fn process_task(task: EmissionTask, running: &Arc<AtomicBool>) {
    let total = task.callbacks.len();
    let mut success = true;

    for (index, pending) in task.callbacks.into_iter().enumerate() {
        if !running.load(Ordering::Relaxed) {
            log::warn!("emission worker stopping mid-transaction at commit {}", task.commit_scn);
            success = false;
            break;
        }

        let remaining = total - 1 - index;
        if let Err(err) = pending.callback.fire(task.commit_timestamp, task.smallest_open_scn, task.commit_scn, remaining) {
            log::error!("emission callback failed for commit {}: {}", task.commit_scn, err);
            success = false;
            break;
        }
    }

    let _ = task.completion_tx.send(EmissionOutcome { commit_scn: task.commit_scn, success });
}
