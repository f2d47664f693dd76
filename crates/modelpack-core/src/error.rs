//! Error types for pack and unpack operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for pack operations.
pub type PackResult<T> = Result<T, PackError>;

/// Result type for unpack operations.
pub type UnpackResult<T> = Result<T, UnpackError>;

/// Errors that can occur while building a model archive.
///
/// Every variant is fatal. Nothing is left at the output path when one is
/// returned.
#[derive(Debug, Error)]
pub enum PackError {
    /// A declared role points at a path that does not exist (or is not a file).
    #[error("missing source file for role '{role}': {}", .path.display())]
    MissingSourceFile { role: String, path: PathBuf },

    /// Two different sources were assigned the same target name.
    #[error("name collision on '{target}': roles '{first_role}' and '{second_role}'")]
    NameCollision {
        target: String,
        first_role: String,
        second_role: String,
    },

    /// A configuration document could not be parsed into a YAML tree.
    #[error("unreadable document for role '{role}' ({}): {source}", .path.display())]
    UnreadableDocument {
        role: String,
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// The archive could not be written (or moved into place).
    #[error("failed to write archive {}: {source}", .path.display())]
    OutputWriteFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Output path already exists and overwrite was not requested.
    #[error("output already exists: {}", .path.display())]
    AmbiguousOverwrite { path: PathBuf },

    /// Role string cannot be used as an archive member name.
    #[error("invalid role '{role}': {reason}")]
    InvalidRole { role: String, reason: String },

    /// Base directory name is not a single safe path component.
    #[error("invalid base dirname '{dirname}': {reason}")]
    InvalidDirname { dirname: String, reason: String },
}

impl PackError {
    /// Returns true for errors caused by the caller's arguments rather than
    /// by the state of the filesystem.
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            Self::AmbiguousOverwrite { .. }
                | Self::InvalidRole { .. }
                | Self::InvalidDirname { .. }
                | Self::NameCollision { .. }
        )
    }

    /// Suggested exit code for CLI.
    pub fn exit_code(&self) -> i32 {
        if self.is_usage_error() {
            2
        } else {
            1
        }
    }
}

/// Errors that can occur while extracting a model archive.
#[derive(Debug, Error)]
pub enum UnpackError {
    /// Archive could not be opened or decoded.
    #[error("failed to read archive {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// No manifest member was found.
    #[error("archive has no manifest ({name})")]
    MissingManifest { name: String },

    /// Manifest is present but malformed or inconsistent.
    #[error("invalid manifest: {reason}")]
    InvalidManifest { reason: String },

    /// Member path escapes the base directory or is not a regular file.
    #[error("unsafe archive member '{member}': {reason}")]
    UnsafeMember { member: String, reason: String },

    /// Member present in the archive but not recorded in the manifest.
    #[error("unexpected archive member '{member}'")]
    UnexpectedMember { member: String },

    /// Member recorded in the manifest but absent from the archive.
    #[error("archive member '{member}' listed in manifest but missing")]
    MissingMember { member: String },

    /// Member content does not match the manifest checksum.
    #[error("integrity mismatch for '{member}': expected {expected}, got {actual}")]
    IntegrityMismatch {
        member: String,
        expected: String,
        actual: String,
    },

    /// Extraction target already exists.
    #[error("destination already exists: {}", .path.display())]
    DestinationExists { path: PathBuf },

    /// An extracted configuration document could not be parsed.
    #[error("unreadable document '{member}': {source}")]
    UnreadableDocument {
        member: String,
        #[source]
        source: serde_yaml::Error,
    },

    /// Writing extracted content failed.
    #[error("failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl UnpackError {
    /// Suggested exit code for CLI.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::DestinationExists { .. } => 2,
            _ => 1,
        }
    }
}
