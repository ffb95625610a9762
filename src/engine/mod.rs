// src/engine/mod.rs

//! Orchestration engine for watchdogd.
//!
//! This module ties together:
//! - per-round state and the cadence arithmetic ([`round`])
//! - the sequential task queue that runs one test process at a time
//!   ([`queue`])
//! - the main runtime event loop that reacts to:
//!   - the round timer firing
//!   - test-process completion events
//!   - shutdown signals

pub mod queue;
pub mod round;
pub mod runtime;

pub use queue::{Task, TaskOutcome, TaskQueue};
pub use round::{RoundState, next_interval};
pub use runtime::{Runtime, RuntimeEvent, RuntimeOptions};
