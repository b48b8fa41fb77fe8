//! Filesystem function loading.
//!
//! The daemon reads function definitions from `*.json` files in a directory
//! at startup. Each file holds one function declaration.

use amber_relay_workflow::Function;
use std::fmt;
use std::path::{Path, PathBuf};

/// Errors from loading function definitions off disk.
#[derive(Debug)]
pub enum FsLoadError {
    /// A directory or file could not be read.
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// A file did not parse as a function declaration.
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl fmt::Display for FsLoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read {}: {source}", path.display())
            }
            Self::Parse { path, source } => {
                write!(f, "failed to parse {}: {source}", path.display())
            }
        }
    }
}

impl std::error::Error for FsLoadError {}

/// Loads every `*.json` function declaration in `dir`, sorted by function
/// ID. Other files are ignored.
///
/// # Errors
///
/// Returns an [`FsLoadError`] for an unreadable directory or file, or for a
/// JSON file that is not a function declaration.
pub fn load_functions(dir: impl AsRef<Path>) -> Result<Vec<Function>, FsLoadError> {
    let dir = dir.as_ref();
    let entries = std::fs::read_dir(dir).map_err(|source| FsLoadError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut functions = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| FsLoadError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
            continue;
        }

        let contents = std::fs::read(&path).map_err(|source| FsLoadError::Io {
            path: path.clone(),
            source,
        })?;
        let function: Function =
            serde_json::from_slice(&contents).map_err(|source| FsLoadError::Parse {
                path: path.clone(),
                source,
            })?;

        tracing::debug!(function = %function.id, path = %path.display(), "loaded function");
        functions.push(function);
    }

    functions.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(functions)
}
