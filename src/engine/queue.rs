// src/engine/queue.rs

//! Sequential task queue: one test process at a time, in enumeration order.
//!
//! The queue owns process spawning with `tokio::process::Command`. Each
//! started task gets a small waiter future that observes the child's exit
//! (never a blocking wait) and reports back to the runtime as a
//! [`RuntimeEvent::TaskCompleted`]. Spawn failures take the same reporting
//! path, so every enqueued task produces exactly one completion event.

use std::collections::VecDeque;
use std::os::unix::process::ExitStatusExt;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};

use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::engine::runtime::RuntimeEvent;

/// One external executable's single invocation within a round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub path: PathBuf,
}

/// Result of one task. Health is signalled solely by exit status: 0 passes,
/// anything else fails, including signal termination and a process that
/// could not be started at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    Success,
    Failed(i32),
    Signaled(i32),
    SpawnFailed,
}

impl TaskOutcome {
    pub fn is_success(self) -> bool {
        matches!(self, TaskOutcome::Success)
    }

    /// Decode a wait status.
    pub fn from_status(status: ExitStatus) -> Self {
        if status.success() {
            TaskOutcome::Success
        } else if let Some(sig) = status.signal() {
            TaskOutcome::Signaled(sig)
        } else {
            TaskOutcome::Failed(status.code().unwrap_or(-1))
        }
    }
}

/// Queue of tasks for the current round, with the running-task cap fixed
/// at 1.
///
/// Invariants:
/// - at most one task is running at any instant
/// - [`TaskQueue::on_task_complete`] reports the round drained exactly once,
///   only when nothing is pending and nothing runs.
pub struct TaskQueue {
    pending: VecDeque<Task>,
    running: bool,
    events_tx: mpsc::Sender<RuntimeEvent>,
}

impl TaskQueue {
    pub fn new(events_tx: mpsc::Sender<RuntimeEvent>) -> Self {
        Self {
            pending: VecDeque::new(),
            running: false,
            events_tx,
        }
    }

    pub fn is_idle(&self) -> bool {
        !self.running && self.pending.is_empty()
    }

    /// Append a task; if nothing is running, start it right away.
    pub fn enqueue(&mut self, task: Task) {
        self.pending.push_back(task);
        if !self.running {
            self.start_next();
        }
    }

    /// Clear the running slot after a completion event and advance.
    ///
    /// Returns true when the round has drained: no pending tasks remain and
    /// the last running task has reported. The caller makes the
    /// stroke/no-stroke decision on that signal.
    pub fn on_task_complete(&mut self) -> bool {
        self.running = false;
        if self.pending.is_empty() {
            true
        } else {
            self.start_next();
            false
        }
    }

    fn start_next(&mut self) {
        let Some(task) = self.pending.pop_front() else {
            return;
        };
        self.running = true;
        self.start(task);
    }

    /// Spawn the task's process with no arguments and all stdio discarded
    /// (test programs must not pollute the daemon's diagnostics).
    ///
    /// Completion is always reported through `events_tx`, whether the
    /// process ran, failed, or never started.
    fn start(&mut self, task: Task) {
        debug!(path = %task.path.display(), "starting test process");

        let mut cmd = Command::new(&task.path);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        let events_tx = self.events_tx.clone();

        match cmd.spawn() {
            Ok(mut child) => {
                tokio::spawn(async move {
                    let outcome = match child.wait().await {
                        Ok(status) => TaskOutcome::from_status(status),
                        Err(err) => {
                            warn!(
                                path = %task.path.display(),
                                error = %err,
                                "waiting for test process"
                            );
                            TaskOutcome::Failed(-1)
                        }
                    };
                    let _ = events_tx
                        .send(RuntimeEvent::TaskCompleted { task, outcome })
                        .await;
                });
            }
            Err(err) => {
                // The executable may have vanished between enumeration and
                // spawn. The task is failed without a process; the queue
                // advances when the event comes back around.
                warn!(
                    path = %task.path.display(),
                    error = %err,
                    "failed to spawn test process"
                );
                tokio::spawn(async move {
                    let _ = events_tx
                        .send(RuntimeEvent::TaskCompleted {
                            task,
                            outcome: TaskOutcome::SpawnFailed,
                        })
                        .await;
                });
            }
        }
    }
}
