//! Configuration file generation.
//!
//! Serializes a [`ConfigurationDescriptor`] to pretty JSON and writes it so that
//! a reader never sees a partially written file: the document goes to a
//! temporary file in the target directory first and is then renamed over the
//! final path.

use crate::descriptor::ConfigurationDescriptor;
use log::debug;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// A descriptor could not be persisted to its target path
#[derive(Debug, thiserror::Error)]
#[error("failed to write router config {}: {reason}", path.display())]
pub struct ConfigWriteError {
    pub path: PathBuf,
    pub reason: String,
}

impl ConfigWriteError {
    fn new(path: &Path, reason: impl ToString) -> Self {
        Self {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// Directories [`write_descriptor`] would have to create for `path`, outermost first
pub fn missing_dirs(path: &Path) -> Vec<PathBuf> {
    let mut missing: Vec<PathBuf> = parent_dir(path)
        .ancestors()
        .take_while(|dir| !dir.as_os_str().is_empty() && !dir.exists())
        .map(Path::to_path_buf)
        .collect();
    missing.reverse();
    missing
}

/// Write `descriptor` to `path`, replacing any existing file.
///
/// The parent directory is created if missing; see [`missing_dirs`] to learn
/// beforehand which directories that adds. Fails with [`ConfigWriteError`]
/// when the directory cannot be created or written to.
pub fn write_descriptor(descriptor: &ConfigurationDescriptor, path: &Path) -> Result<(), ConfigWriteError> {
    let dir = parent_dir(path);

    std::fs::create_dir_all(dir).map_err(|e| ConfigWriteError::new(path, e))?;

    let json = serde_json::to_string_pretty(descriptor).map_err(|e| ConfigWriteError::new(path, e))?;

    let mut staged = NamedTempFile::new_in(dir).map_err(|e| ConfigWriteError::new(path, e))?;
    staged
        .write_all(json.as_bytes())
        .and_then(|_| staged.flush())
        .map_err(|e| ConfigWriteError::new(path, e))?;
    staged
        .persist(path)
        .map_err(|e| ConfigWriteError::new(path, e.error))?;

    debug!("Wrote router config {} ({} bytes)", path.display(), json.len());
    Ok(())
}

/// Read a descriptor back from disk
pub fn read_descriptor(path: &Path) -> color_eyre::eyre::Result<ConfigurationDescriptor> {
    use color_eyre::eyre::WrapErr;

    let content = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("Failed to read router config '{}'", path.display()))?;
    let descriptor = serde_json::from_str(&content)
        .wrap_err_with(|| format!("Failed to parse router config '{}'", path.display()))?;
    Ok(descriptor)
}
