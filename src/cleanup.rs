//! Scratch artifact cleanup.
//!
//! Every file the harness creates for a run (router configs, router logs) is
//! registered with a [`CleanupManager`] before it is written, along with any
//! directory created to hold them. Cleanup runs at most once per manager,
//! whichever path triggers it first: normal completion after every router was
//! stopped, or an error or panic unwinding through a [`CleanupGuard`].
//!
//! Cleanup never runs while routers are still alive: an external interrupt
//! only wakes the control thread (see [`crate::timing::install_interrupt_hook`]),
//! which stops every router before removing what they may still be writing.

use log::{info, warn};
use serde::Serialize;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// What a cleanup pass did with each path
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanupSummary {
    pub removed: Vec<PathBuf>,
    pub missing: Vec<PathBuf>,
    pub failed: Vec<CleanupFailure>,
}

/// A path that could not be deleted
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CleanupFailure {
    pub path: PathBuf,
    pub reason: String,
}

impl CleanupSummary {
    fn record(&mut self, path: &Path, result: io::Result<()>) {
        match result {
            Ok(()) => self.removed.push(path.to_path_buf()),
            Err(e) if e.kind() == ErrorKind::NotFound => self.missing.push(path.to_path_buf()),
            Err(e) => {
                warn!("Failed to remove {}: {}", path.display(), e);
                self.failed.push(CleanupFailure {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                });
            }
        }
    }
}

/// Delete every path, best effort.
///
/// A missing file is not an error. Failures are logged and returned in the
/// summary, never raised.
pub fn remove_artifacts<P: AsRef<Path>>(paths: &[P]) -> CleanupSummary {
    let mut summary = CleanupSummary::default();
    for path in paths {
        let path = path.as_ref();
        summary.record(path, std::fs::remove_file(path));
    }
    summary
}

/// Remove directories created by the harness, innermost first.
///
/// Only empty directories are removed; anything left inside is reported as a failure.
fn remove_directories(dirs: &[PathBuf], summary: &mut CleanupSummary) {
    for dir in dirs.iter().rev() {
        summary.record(dir, std::fs::remove_dir(dir));
    }
}

#[derive(Debug, Default)]
struct State {
    artifacts: Vec<PathBuf>,
    directories: Vec<PathBuf>,
    done: bool,
}

/// Shared registry of scratch artifacts with a one-shot cleanup
#[derive(Debug, Clone, Default)]
pub struct CleanupManager {
    state: Arc<Mutex<State>>,
}

impl CleanupManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Record a file to delete at teardown.
    ///
    /// Returns false if cleanup already ran; the path is then removed right
    /// away so a late writer cannot leak it.
    pub fn register(&self, path: impl Into<PathBuf>) -> bool {
        let path = path.into();
        let mut state = self.lock();
        if state.done {
            drop(state);
            let late = remove_artifacts(&[&path]);
            if !late.removed.is_empty() {
                info!("Removed late artifact {}", path.display());
            }
            return false;
        }
        if !state.artifacts.contains(&path) {
            state.artifacts.push(path);
        }
        true
    }

    /// Record a directory the harness is about to create.
    ///
    /// Register parents before children; directories are removed in reverse
    /// order, after every file.
    pub fn register_dir(&self, dir: impl Into<PathBuf>) -> bool {
        let dir = dir.into();
        let mut state = self.lock();
        if state.done {
            drop(state);
            let _ = std::fs::remove_dir(&dir);
            return false;
        }
        if !state.directories.contains(&dir) {
            state.directories.push(dir);
        }
        true
    }

    /// Files registered so far
    pub fn registered(&self) -> Vec<PathBuf> {
        self.lock().artifacts.clone()
    }

    pub fn has_run(&self) -> bool {
        self.lock().done
    }

    /// Delete every registered file, then every registered directory.
    ///
    /// Only the first call does any work; later or concurrent calls return
    /// `None`.
    pub fn run(&self) -> Option<CleanupSummary> {
        let (artifacts, directories) = {
            let mut state = self.lock();
            if state.done {
                return None;
            }
            state.done = true;
            (
                std::mem::take(&mut state.artifacts),
                std::mem::take(&mut state.directories),
            )
        };

        let mut summary = remove_artifacts(&artifacts);
        remove_directories(&directories, &mut summary);
        info!(
            "Cleanup: {} removed, {} already absent, {} failed",
            summary.removed.len(),
            summary.missing.len(),
            summary.failed.len()
        );
        Some(summary)
    }

    /// Guard that runs cleanup when dropped
    pub fn guard(&self) -> CleanupGuard {
        CleanupGuard {
            manager: self.clone(),
        }
    }
}

/// Runs [`CleanupManager::run`] on drop, covering early returns and panics.
///
/// Drop it only after the processes writing the registered files are gone.
#[must_use = "cleanup runs when the guard is dropped"]
pub struct CleanupGuard {
    manager: CleanupManager,
}

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        if self.manager.run().is_some() {
            warn!("Cleanup ran from an unwinding or early-exit path");
        }
    }
}
