//! Portable model archives.
//!
//! A model archive is a deterministic tar.gz (or plain tar) containing:
//! - rewritten configuration documents, whose references to packed files
//!   point at archive-relative names
//! - verbatim binary artifacts
//! - `<base_dirname>/meta.yaml`: roles, target names, options, checksums
//!
//! Every member lives under a single base directory.
//!
//! # Example
//!
//! ```no_run
//! use modelpack_core::{pack, unpack, PackConfig, PackRequest};
//! use std::path::Path;
//!
//! let request = PackRequest::new("bundle.tar.gz")
//!     .yaml_file("asr/config.yaml", "/tmp/cfg.yaml")
//!     .file("asr/pretrain.pth", "/tmp/model.pth")
//!     .option("lang=en");
//! pack(&request, PackConfig::default().with_base_dirname("bundle")).unwrap();
//!
//! let model = unpack(Path::new("bundle.tar.gz"), Path::new("/srv/models")).unwrap();
//! println!("{:?}", model.path_of("asr/pretrain.pth"));
//! ```

pub mod builder;
pub mod config;
pub mod error;
pub mod layout;
pub mod manifest;
pub mod request;
pub mod resolve;
pub mod rewrite;
pub mod unpack;

mod tar_write;

// Convenience re-exports
pub use builder::{pack, ArchiveBuilder, PackSummary};
pub use config::{ArchiveFormat, PackConfig, DEFAULT_BASE_DIRNAME};
pub use error::{PackError, PackResult, UnpackError, UnpackResult};
pub use layout::{ArchiveLayout, ArchiveMember, MemberKind, MANIFEST_NAME};
pub use manifest::{FileMeta, Manifest, RoleBinding, FORMAT_VERSION};
pub use request::{PackRequest, SourceMapping};
pub use resolve::{resolve_path, PathResolver};
pub use rewrite::{map_strings, rewrite_document, DocumentRewriter, FileTargets, Rewritten};
pub use unpack::{unpack, UnpackedModel};
