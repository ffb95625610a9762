//! End-to-end round behaviour, driven through the real runtime with a
//! recording watchdog in place of the hardware device.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::mpsc;

use watchdogd::device::{DeviceError, Watchdog};
use watchdogd::engine::{Runtime, RuntimeEvent, RuntimeOptions};

/// Counts strokes and disables instead of talking to hardware.
#[derive(Default)]
struct RecordingWatchdog {
    strokes: Arc<AtomicUsize>,
    disables: Arc<AtomicUsize>,
}

impl Watchdog for RecordingWatchdog {
    fn stroke(&mut self) -> Result<(), DeviceError> {
        self.strokes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn disable(&mut self) -> Result<(), DeviceError> {
        self.disables.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Run exactly one round against `test_dir` and return the stroke count.
async fn strokes_after_one_round(test_dir: &Path) -> usize {
    let strokes = Arc::new(AtomicUsize::new(0));
    let watchdog = RecordingWatchdog {
        strokes: Arc::clone(&strokes),
        ..Default::default()
    };

    let (events_tx, events_rx) = mpsc::channel(16);
    let options = RuntimeOptions {
        test_dir: test_dir.to_path_buf(),
        keepalive: Duration::from_secs(30),
        disable_on_exit: false,
        once: true,
    };

    Runtime::new(options, Box::new(watchdog), events_tx, events_rx)
        .run()
        .await
        .unwrap();

    strokes.load(Ordering::SeqCst)
}

#[tokio::test]
async fn all_tests_passing_strokes_the_watchdog_once() {
    let tmp = tempfile::tempdir().unwrap();
    write_script(tmp.path(), "10-net", "exit 0");
    write_script(tmp.path(), "20-disk", "exit 0");
    write_script(tmp.path(), "30-app", "exit 0");

    assert_eq!(strokes_after_one_round(tmp.path()).await, 1);
}

#[tokio::test]
async fn one_failing_test_withholds_the_stroke() {
    let tmp = tempfile::tempdir().unwrap();
    write_script(tmp.path(), "10-ok", "exit 0");
    write_script(tmp.path(), "20-broken", "exit 1");

    assert_eq!(strokes_after_one_round(tmp.path()).await, 0);
}

#[tokio::test]
async fn empty_test_directory_is_a_vacuous_pass() {
    let tmp = tempfile::tempdir().unwrap();
    assert_eq!(strokes_after_one_round(tmp.path()).await, 1);
}

#[tokio::test]
async fn missing_test_directory_is_also_a_vacuous_pass() {
    // Fail-open by design: indistinguishable from "no tests configured".
    let tmp = tempfile::tempdir().unwrap();
    let gone = tmp.path().join("nonexistent");
    assert_eq!(strokes_after_one_round(&gone).await, 1);
}

#[tokio::test]
async fn unstartable_test_fails_the_round_without_blocking_later_tests() {
    let tmp = tempfile::tempdir().unwrap();

    // Executable bit set, but not something exec() accepts; the spawn fails
    // the way a binary that vanished between enumeration and spawn would.
    let garbage = tmp.path().join("10-garbage");
    fs::write(&garbage, b"\x7f not an executable\n").unwrap();
    fs::set_permissions(&garbage, fs::Permissions::from_mode(0o755)).unwrap();

    let marker = tmp.path().join("marker");
    write_script(
        tmp.path(),
        "20-still-runs",
        &format!("touch {}\nexit 0", marker.display()),
    );

    assert_eq!(strokes_after_one_round(tmp.path()).await, 0);
    assert!(marker.exists(), "later tests must still run in order");
}

#[tokio::test]
async fn tests_run_sequentially_in_enumeration_order() {
    let tmp = tempfile::tempdir().unwrap();
    let log = tmp.path().join("order.log");

    for name in ["10-first", "20-second", "30-third"] {
        write_script(
            tmp.path(),
            name,
            &format!("echo {name} >> {}\nexit 0", log.display()),
        );
    }

    assert_eq!(strokes_after_one_round(tmp.path()).await, 1);

    let contents = fs::read_to_string(&log).unwrap();
    let order: Vec<&str> = contents.lines().collect();
    assert_eq!(order, vec!["10-first", "20-second", "30-third"]);
}

#[tokio::test]
async fn timer_rearms_and_rounds_keep_striking_until_shutdown() {
    let tmp = tempfile::tempdir().unwrap();
    write_script(tmp.path(), "10-ok", "exit 0");

    let strokes = Arc::new(AtomicUsize::new(0));
    let watchdog = RecordingWatchdog {
        strokes: Arc::clone(&strokes),
        ..Default::default()
    };

    let (events_tx, events_rx) = mpsc::channel(16);
    let options = RuntimeOptions {
        test_dir: tmp.path().to_path_buf(),
        keepalive: Duration::from_millis(50),
        disable_on_exit: false,
        once: false,
    };

    let runtime = Runtime::new(options, Box::new(watchdog), events_tx.clone(), events_rx);
    let handle = tokio::spawn(runtime.run());

    tokio::time::sleep(Duration::from_millis(600)).await;
    events_tx
        .send(RuntimeEvent::ShutdownRequested)
        .await
        .unwrap();
    handle.await.unwrap().unwrap();

    assert!(
        strokes.load(Ordering::SeqCst) >= 3,
        "expected several rounds in 600ms at a 50ms keepalive, got {}",
        strokes.load(Ordering::SeqCst)
    );
}

#[tokio::test]
async fn disable_on_exit_disables_exactly_once() {
    let tmp = tempfile::tempdir().unwrap();
    write_script(tmp.path(), "10-ok", "exit 0");

    let disables = Arc::new(AtomicUsize::new(0));
    let watchdog = RecordingWatchdog {
        disables: Arc::clone(&disables),
        ..Default::default()
    };

    let (events_tx, events_rx) = mpsc::channel(16);
    let options = RuntimeOptions {
        test_dir: tmp.path().to_path_buf(),
        keepalive: Duration::from_secs(30),
        disable_on_exit: true,
        once: true,
    };

    Runtime::new(options, Box::new(watchdog), events_tx, events_rx)
        .run()
        .await
        .unwrap();

    assert_eq!(disables.load(Ordering::SeqCst), 1);
}
