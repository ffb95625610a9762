// src/lib.rs

pub mod cli;
pub mod device;
pub mod discover;
pub mod engine;
pub mod logging;

use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::cli::CliArgs;
use crate::device::{NullWatchdog, Watchdog, WatchdogDevice};
use crate::engine::{Runtime, RuntimeEvent, RuntimeOptions};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - watchdog device open/configure (fatal on open failure unless
///   `--no-watchdog`)
/// - the round runtime and its event channel
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let keepalive = Duration::from_secs(u64::from(args.keepalive_secs()));
    let watchdog = open_watchdog(&args, keepalive)?;

    let (events_tx, events_rx) = mpsc::channel::<RuntimeEvent>(16);

    // Ctrl-C → graceful shutdown. The runtime honours --disable-on-exit on
    // the way out.
    {
        let tx = events_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            let _ = tx.send(RuntimeEvent::ShutdownRequested).await;
        });
    }

    let options = RuntimeOptions {
        test_dir: args.test_dir.clone(),
        keepalive,
        disable_on_exit: args.disable_on_exit,
        once: args.once,
    };

    let runtime = Runtime::new(options, watchdog, events_tx, events_rx);
    runtime.run().await
}

/// Open and configure the hardware watchdog, or hand back the no-op
/// stand-in when `--no-watchdog` was given.
///
/// Open failure is fatal: running unprotected would defeat the daemon's
/// purpose. A rejected timeout is not fatal; the hardware keeps whatever
/// value it holds and we warn the operator.
fn open_watchdog(args: &CliArgs, keepalive: Duration) -> Result<Box<dyn Watchdog>> {
    if args.no_watchdog {
        info!("running without watchdog hardware (--no-watchdog)");
        return Ok(Box::new(NullWatchdog));
    }

    let mut dev = WatchdogDevice::open(&args.device)
        .with_context(|| format!("watchdog device not enabled at {}", args.device.display()))?;

    if let Err(err) = dev.set_timeout(args.watchdog_timeout) {
        warn!(
            error = %err,
            requested_secs = args.watchdog_timeout,
            "unable to set watchdog timeout, continuing with the hardware's value"
        );
    }

    // The keepalive interval must stay below the hardware countdown, or the
    // board resets between strokes. Operator misconfiguration, not fatal.
    match dev.query_timeout() {
        Ok(actual_secs) => {
            let timeout_ms = u128::from(actual_secs) * 1000;
            if timeout_ms <= keepalive.as_millis() {
                warn!(
                    watchdog_secs = actual_secs,
                    keepalive_ms = keepalive.as_millis() as u64,
                    "watchdog counter is not greater than the keepalive interval; \
                     the watchdog will probably trigger"
                );
            }
        }
        Err(err) => {
            warn!(error = %err, "error while getting watchdog timeout");
        }
    }

    Ok(Box::new(dev))
}
