//! Workspace directory helpers.
//!
//! Every artifact path is resolved against a single workspace root. The root is
//! the process working directory unless `CANOPY_HOME` points elsewhere, which
//! lets CI jobs and tests run the stages against a scratch directory.

use std::{
    path::{Path, PathBuf},
    sync::{LazyLock, Mutex},
};

use thiserror::Error;

/// Environment variable that overrides the workspace root.
pub const HOME_ENV_VAR: &str = "CANOPY_HOME";

static ROOT_OVERRIDE: LazyLock<Mutex<Option<PathBuf>>> = LazyLock::new(|| Mutex::new(None));

/// Errors that can occur while resolving or preparing workspace directories.
#[derive(Debug, Error)]
pub enum AppDirError {
    /// The process working directory could not be determined.
    #[error("Failed to resolve the current working directory: {0}")]
    NoWorkingDir(std::io::Error),
    /// Failed to create a workspace directory.
    #[error("Failed to create directory at {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Return the workspace root that relative artifact paths are joined onto.
pub fn workspace_root() -> Result<PathBuf, AppDirError> {
    if let Some(path) = ROOT_OVERRIDE.lock().ok().and_then(|guard| guard.clone()) {
        return Ok(path);
    }
    if let Ok(path) = std::env::var(HOME_ENV_VAR)
        && !path.trim().is_empty()
    {
        return Ok(PathBuf::from(path));
    }
    std::env::current_dir().map_err(AppDirError::NoWorkingDir)
}

/// Create `path` (and its parents) if missing, returning it for chaining.
pub fn ensure_dir(path: &Path) -> Result<PathBuf, AppDirError> {
    std::fs::create_dir_all(path).map_err(|source| AppDirError::CreateDir {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(path.to_path_buf())
}

/// Create the parent directory of a file path if it has one.
pub fn ensure_parent(path: &Path) -> Result<(), AppDirError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => ensure_dir(parent).map(|_| ()),
        _ => Ok(()),
    }
}

#[cfg(test)]
fn set_root_override(path: PathBuf) {
    let mut guard = ROOT_OVERRIDE
        .lock()
        .expect("root override mutex poisoned");
    *guard = Some(path);
}

#[cfg(test)]
fn clear_root_override() {
    let mut guard = ROOT_OVERRIDE
        .lock()
        .expect("root override mutex poisoned");
    *guard = None;
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    struct OverrideGuard;

    impl OverrideGuard {
        fn set(path: PathBuf) -> Self {
            set_root_override(path);
            Self
        }
    }

    impl Drop for OverrideGuard {
        fn drop(&mut self) {
            clear_root_override();
        }
    }

    #[test]
    fn uses_override_for_root_dir() {
        let base = tempdir().unwrap();
        let _guard = OverrideGuard::set(base.path().to_path_buf());
        assert_eq!(workspace_root().unwrap(), base.path());
    }

    #[test]
    fn ensure_parent_creates_nested_directories() {
        let base = tempdir().unwrap();
        let file = base.path().join("a").join("b").join("file.json");
        ensure_parent(&file).unwrap();
        assert!(base.path().join("a").join("b").is_dir());
    }

    #[test]
    fn ensure_parent_accepts_bare_file_names() {
        ensure_parent(Path::new("report.json")).unwrap();
    }
}
