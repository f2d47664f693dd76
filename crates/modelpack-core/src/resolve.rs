//! Filesystem-existence based path detection for configuration values.
//!
//! A string counts as a path only if it names something that exists on
//! disk. Extension and key name are never consulted.

use std::path::{Path, PathBuf};

/// Decides whether a configuration value denotes an existing path.
#[derive(Debug, Clone, Default)]
pub struct PathResolver {
    fallback_dir: Option<PathBuf>,
}

impl PathResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Retry relative candidates against `dir` when they do not exist
    /// relative to the document's own directory.
    pub fn with_fallback_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.fallback_dir = Some(dir.into());
        self
    }

    pub fn fallback_dir(&self) -> Option<&Path> {
        self.fallback_dir.as_deref()
    }

    /// Resolve `candidate` to its canonical absolute form, or `None` if it
    /// does not name an existing file or directory.
    pub fn resolve(&self, base_dir: &Path, candidate: &str) -> Option<PathBuf> {
        if candidate.is_empty() || candidate.contains('\0') {
            return None;
        }

        let raw = Path::new(candidate);
        if raw.is_absolute() {
            return canonicalize_existing(raw);
        }

        canonicalize_existing(&base_dir.join(raw)).or_else(|| {
            self.fallback_dir
                .as_ref()
                .and_then(|dir| canonicalize_existing(&dir.join(raw)))
        })
    }
}

/// Resolve without a fallback directory.
pub fn resolve_path(base_dir: &Path, candidate: &str) -> Option<PathBuf> {
    PathResolver::default().resolve(base_dir, candidate)
}

// canonicalize() fails for anything that does not exist, which is exactly
// the existence check we want.
fn canonicalize_existing(path: &Path) -> Option<PathBuf> {
    std::fs::canonicalize(path).ok()
}
