// src/discover.rs

//! Test-executable discovery.
//!
//! Enumerates the test directory with a shell-style glob and keeps only
//! regular files with the owner-execute bit set. Order is the glob crate's
//! native alphabetical order, which is also the order the tasks will run in.

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

/// Enumerate the health-check executables under `dir`.
///
/// A missing or unreadable directory yields an empty list, never an error.
/// Callers treat an empty round as a vacuous pass, so a bad `--test-dir`
/// silently keeps the watchdog fed; the warn here is the operator's only
/// hint.
pub fn discover_tests(dir: &Path) -> Vec<PathBuf> {
    let pattern = format!("{}/*", dir.display());

    let entries = match glob::glob(&pattern) {
        Ok(entries) => entries,
        Err(err) => {
            warn!(pattern = %pattern, error = %err, "invalid test directory pattern");
            return Vec::new();
        }
    };

    let mut tests = Vec::new();
    for entry in entries {
        match entry {
            Ok(path) => {
                if is_executable_file(&path) {
                    debug!(path = %path.display(), "discovered test");
                    tests.push(path);
                } else {
                    debug!(path = %path.display(), "skipping non-executable entry");
                }
            }
            Err(err) => {
                debug!(error = %err, "unreadable entry during enumeration");
            }
        }
    }

    tests
}

/// Regular file with the owner-execute permission bit.
fn is_executable_file(path: &Path) -> bool {
    match std::fs::metadata(path) {
        Ok(meta) => meta.is_file() && meta.permissions().mode() & 0o100 != 0,
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn write_file(dir: &Path, name: &str, mode: u32) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, "#!/bin/sh\nexit 0\n").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(mode)).unwrap();
        path
    }

    #[test]
    fn keeps_only_owner_executable_regular_files() {
        let tmp = tempfile::tempdir().unwrap();
        let exe = write_file(tmp.path(), "check", 0o755);
        write_file(tmp.path(), "notes.txt", 0o644);
        fs::create_dir(tmp.path().join("subdir")).unwrap();

        let tests = discover_tests(tmp.path());
        assert_eq!(tests, vec![exe]);
    }

    #[test]
    fn results_come_back_in_alphabetical_order() {
        let tmp = tempfile::tempdir().unwrap();
        let c = write_file(tmp.path(), "30-last", 0o755);
        let a = write_file(tmp.path(), "10-first", 0o755);
        let b = write_file(tmp.path(), "20-middle", 0o755);

        let tests = discover_tests(tmp.path());
        assert_eq!(tests, vec![a, b, c]);
    }

    #[test]
    fn missing_directory_yields_an_empty_list() {
        let tmp = tempfile::tempdir().unwrap();
        let gone = tmp.path().join("does-not-exist");
        assert!(discover_tests(&gone).is_empty());
    }

    #[test]
    fn owner_execute_bit_alone_is_enough() {
        let tmp = tempfile::tempdir().unwrap();
        let exe = write_file(tmp.path(), "check", 0o700);
        assert_eq!(discover_tests(tmp.path()), vec![exe]);
    }
}
