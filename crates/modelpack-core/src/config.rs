//! Pack configuration.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Base directory name used when the caller does not pick one.
pub const DEFAULT_BASE_DIRNAME: &str = "model";

/// On-disk container format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArchiveFormat {
    /// tar stream compressed with gzip.
    #[default]
    TarGz,
    /// Uncompressed tar stream.
    Tar,
}

impl ArchiveFormat {
    /// `.tar` selects plain tar; everything else is gzip-compressed.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("tar") => Self::Tar,
            _ => Self::TarGz,
        }
    }
}

impl FromStr for ArchiveFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tgz" | "tar.gz" | "targz" => Ok(Self::TarGz),
            "tar" => Ok(Self::Tar),
            other => Err(format!("unknown archive format '{other}' (expected tgz or tar)")),
        }
    }
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TarGz => f.write_str("tgz"),
            Self::Tar => f.write_str("tar"),
        }
    }
}

/// Settings for one pack call.
#[derive(Debug, Clone)]
pub struct PackConfig {
    /// Top-level directory of every archive member.
    pub base_dirname: String,
    /// Replace an existing file at the output path.
    pub overwrite: bool,
    /// Container format; inferred from the output path when `None`.
    pub format: Option<ArchiveFormat>,
    /// Extra directory for resolving relative path references.
    pub fallback_dir: Option<PathBuf>,
}

impl Default for PackConfig {
    fn default() -> Self {
        Self {
            base_dirname: DEFAULT_BASE_DIRNAME.to_string(),
            overwrite: false,
            format: None,
            fallback_dir: None,
        }
    }
}

impl PackConfig {
    pub fn with_base_dirname(mut self, dirname: impl Into<String>) -> Self {
        self.base_dirname = dirname.into();
        self
    }

    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn with_format(mut self, format: ArchiveFormat) -> Self {
        self.format = Some(format);
        self
    }

    pub fn with_fallback_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.fallback_dir = Some(dir.into());
        self
    }

    pub fn format_for(&self, outpath: &Path) -> ArchiveFormat {
        self.format
            .unwrap_or_else(|| ArchiveFormat::from_path(outpath))
    }
}
