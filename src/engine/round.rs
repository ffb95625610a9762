// src/engine/round.rs

//! Per-round bookkeeping and cadence arithmetic.

use std::time::{Duration, Instant};

use crate::engine::queue::TaskOutcome;

/// State for one health-check round, created at round start and discarded
/// once the stroke/no-stroke decision has been made.
///
/// `succeeded` starts true and only ever transitions to false; task
/// completions may fail the round but nothing can un-fail it.
#[derive(Debug)]
pub struct RoundState {
    started_at: Instant,
    num_tests: usize,
    succeeded: bool,
}

impl RoundState {
    /// Begin a fresh round at the current monotonic instant.
    pub fn begin() -> Self {
        Self {
            started_at: Instant::now(),
            num_tests: 0,
            succeeded: true,
        }
    }

    /// Count one enqueued task.
    pub fn record_enqueued(&mut self) {
        self.num_tests += 1;
    }

    pub fn num_tests(&self) -> usize {
        self.num_tests
    }

    pub fn succeeded(&self) -> bool {
        self.succeeded
    }

    /// Fold one task outcome into the round.
    pub fn record_outcome(&mut self, outcome: TaskOutcome) {
        if !outcome.is_success() {
            self.succeeded = false;
        }
    }

    /// Monotonic time spent in this round so far.
    ///
    /// `None` when the clock reading is unusable (the current instant is not
    /// after the recorded start); callers fall back to the full interval.
    pub fn elapsed(&self) -> Option<Duration> {
        Instant::now().checked_duration_since(self.started_at)
    }
}

/// Delay before the next round so that rounds keep a roughly fixed cadence
/// despite variable round duration.
///
/// Returns `max(0, desired - elapsed)`. An overrunning round schedules the
/// next one immediately, never with a negative delay. An unreadable clock
/// (`elapsed == None`) fails safe to the full `desired` interval: neither a
/// tight failure loop nor a guessed value.
pub fn next_interval(elapsed: Option<Duration>, desired: Duration) -> Duration {
    match elapsed {
        Some(spent) => desired.saturating_sub(spent),
        None => desired,
    }
}
