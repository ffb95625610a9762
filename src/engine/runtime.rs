// src/engine/runtime.rs

//! The round scheduler: a single-threaded event loop with two event sources,
//! the round timer and test-process completion notifications (plus
//! shutdown).
//!
//! Round lifecycle per firing:
//! reset round state → enumerate the test directory → enqueue each
//! executable → the queue runs them one at a time → every completion folds
//! into the round's success flag → once the queue drains, stroke the
//! watchdog iff the round still succeeds, then rearm the timer so rounds
//! keep a roughly fixed cadence.
//!
//! There is deliberately no per-task timeout: a test that never exits stalls
//! every future round, the watchdog goes unfed, and the hardware resets the
//! board. Fail closed.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::device::Watchdog;
use crate::discover;
use crate::engine::queue::{Task, TaskOutcome, TaskQueue};
use crate::engine::round::{RoundState, next_interval};

/// Events sent into the runtime.
///
/// - the timer task sends `RoundDue`
/// - the task queue's waiters send `TaskCompleted`
/// - Ctrl-C handling sends `ShutdownRequested`
#[derive(Debug)]
pub enum RuntimeEvent {
    RoundDue,
    TaskCompleted { task: Task, outcome: TaskOutcome },
    ShutdownRequested,
}

/// Options that influence how the runtime behaves.
#[derive(Debug, Clone)]
pub struct RuntimeOptions {
    /// Directory holding the health-check executables.
    pub test_dir: PathBuf,

    /// Desired time between successive watchdog strokes.
    pub keepalive: Duration,

    /// Disable the hardware timer when the runtime exits. The default is to
    /// leave it armed, so a daemon that dies still resets the board.
    pub disable_on_exit: bool,

    /// Run a single round, then exit instead of rearming the timer.
    pub once: bool,
}

/// The main orchestration runtime.
///
/// Owns the watchdog handle, the task queue, and the current round's state.
/// All mutation happens from this single event-loop context; there is
/// nothing to lock.
pub struct Runtime {
    options: RuntimeOptions,
    watchdog: Box<dyn Watchdog>,
    queue: TaskQueue,

    /// Bookkeeping for the round in flight; `None` while idle between
    /// rounds.
    round: Option<RoundState>,

    /// Kept so the timer task can be handed a sender when rearming.
    events_tx: mpsc::Sender<RuntimeEvent>,
    events_rx: mpsc::Receiver<RuntimeEvent>,
}

impl Runtime {
    pub fn new(
        options: RuntimeOptions,
        watchdog: Box<dyn Watchdog>,
        events_tx: mpsc::Sender<RuntimeEvent>,
        events_rx: mpsc::Receiver<RuntimeEvent>,
    ) -> Self {
        Self {
            options,
            watchdog,
            queue: TaskQueue::new(events_tx.clone()),
            round: None,
            events_tx,
            events_rx,
        }
    }

    /// Main event loop. The first round fires immediately; every later round
    /// is scheduled by its predecessor's completion.
    pub async fn run(mut self) -> Result<()> {
        info!(
            test_dir = %self.options.test_dir.display(),
            keepalive_ms = self.options.keepalive.as_millis() as u64,
            "watchdogd runtime started"
        );

        let mut keep_running = self.trigger_round();

        while keep_running {
            let Some(event) = self.events_rx.recv().await else {
                break;
            };
            debug!(?event, "runtime received event");

            keep_running = match event {
                RuntimeEvent::RoundDue => self.trigger_round(),
                RuntimeEvent::TaskCompleted { task, outcome } => {
                    self.handle_task_completion(task, outcome)
                }
                RuntimeEvent::ShutdownRequested => {
                    info!("shutdown requested, stopping runtime");
                    false
                }
            };
        }

        self.shutdown();
        info!("watchdogd runtime exiting");
        Ok(())
    }

    /// Start a new round: reset state, enumerate, enqueue.
    ///
    /// Zero discovered tests is a vacuous pass: stroke immediately and rearm
    /// with the full keepalive interval. Otherwise scheduling is deferred
    /// until the queue drains. Returns false when the runtime should stop.
    fn trigger_round(&mut self) -> bool {
        if self.round.is_some() {
            // The timer is only rearmed after a round completes, so this
            // means an event producer misbehaved. Drop the firing.
            warn!("round due while the previous round is still running; ignoring");
            return true;
        }

        let mut round = RoundState::begin();
        let tests = discover::discover_tests(&self.options.test_dir);

        if tests.is_empty() {
            // Fail open: an empty (or missing) test directory counts as a
            // pass.
            warn!(
                test_dir = %self.options.test_dir.display(),
                "no tests discovered; vacuous pass, stroking watchdog"
            );
            self.stroke();

            if self.options.once {
                info!("single round complete (--once)");
                return false;
            }
            self.schedule_next_round(self.options.keepalive);
            return true;
        }

        for path in tests {
            round.record_enqueued();
            self.queue.enqueue(Task { path });
        }

        info!(num_tests = round.num_tests(), "round started");
        self.round = Some(round);
        true
    }

    /// Fold a task completion into the round; when the queue drains, make
    /// the stroke/no-stroke decision and rearm the timer.
    ///
    /// The decision is made strictly after the last task's exit has been
    /// processed. Returns false when the runtime should stop.
    fn handle_task_completion(&mut self, task: Task, outcome: TaskOutcome) -> bool {
        match outcome {
            TaskOutcome::Success => {
                debug!(path = %task.path.display(), "test passed");
            }
            TaskOutcome::Failed(code) => {
                warn!(path = %task.path.display(), exit_code = code, "test failed");
            }
            TaskOutcome::Signaled(sig) => {
                warn!(path = %task.path.display(), signal = sig, "test terminated by signal");
            }
            TaskOutcome::SpawnFailed => {
                warn!(path = %task.path.display(), "test could not be started");
            }
        }

        let Some(mut round) = self.round.take() else {
            warn!(path = %task.path.display(), "task completion with no round in flight");
            return true;
        };
        round.record_outcome(outcome);

        if !self.queue.on_task_complete() {
            self.round = Some(round);
            return true;
        }

        // Queue drained: every task in the round has reported.
        debug!("all tasks complete");

        if round.succeeded() {
            info!(num_tests = round.num_tests(), "round succeeded, stroking watchdog");
            self.stroke();
        } else {
            warn!(
                num_tests = round.num_tests(),
                "round failed, withholding watchdog stroke"
            );
        }

        if self.options.once {
            info!("single round complete (--once)");
            return false;
        }

        let delay = next_interval(round.elapsed(), self.options.keepalive);
        self.schedule_next_round(delay);
        true
    }

    fn stroke(&mut self) {
        if let Err(err) = self.watchdog.stroke() {
            warn!(error = %err, "failed to stroke watchdog");
        }
    }

    /// Rearm the round timer: a detached sleep task that sends `RoundDue`.
    fn schedule_next_round(&self, delay: Duration) {
        debug!(delay_ms = delay.as_millis() as u64, "next round scheduled");

        let events_tx = self.events_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = events_tx.send(RuntimeEvent::RoundDue).await;
        });
    }

    fn shutdown(&mut self) {
        if !self.options.disable_on_exit {
            return;
        }
        match self.watchdog.disable() {
            Ok(()) => info!("watchdog disabled on exit"),
            Err(err) => warn!(error = %err, "failed to disable watchdog on exit"),
        }
    }
}
