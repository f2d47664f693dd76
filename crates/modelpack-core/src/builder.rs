//! Archive materialization.
//!
//! Validation, layout and document rewriting all happen before the first
//! archive byte is written. The archive is assembled in a temporary file
//! next to the output path and only renamed into place once complete.

use crate::config::PackConfig;
use crate::error::{PackError, PackResult};
use crate::layout::{ArchiveLayout, MemberKind};
use crate::manifest::{FileMeta, Manifest};
use crate::request::{PackRequest, SourceMapping};
use crate::resolve::PathResolver;
use crate::rewrite::DocumentRewriter;
use crate::tar_write::{HashingReader, SizedReader, TarSink};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// Outcome of a successful pack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackSummary {
    pub outpath: PathBuf,
    pub manifest: Manifest,
    /// Archive member paths in write order, manifest last.
    pub members: Vec<String>,
    /// Path references replaced across all documents.
    pub rewritten_references: usize,
}

/// A document after rewriting, ready to be written.
struct PreparedDocument {
    archive_path: String,
    target: String,
    bytes: Vec<u8>,
}

/// Writes model archives.
///
/// # Example
///
/// ```no_run
/// use modelpack_core::{ArchiveBuilder, PackConfig, PackRequest};
///
/// let request = PackRequest::new("model.tar.gz")
///     .yaml_file("asr/config.yaml", "exp/asr/config.yaml")
///     .file("asr/pretrain.pth", "exp/asr/valid.acc.best.pth")
///     .option("lang=en");
///
/// let summary = ArchiveBuilder::new(PackConfig::default())
///     .build(&request)
///     .unwrap();
/// println!("wrote {} members", summary.members.len());
/// ```
#[derive(Debug, Clone, Default)]
pub struct ArchiveBuilder {
    config: PackConfig,
}

impl ArchiveBuilder {
    pub fn new(config: PackConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PackConfig {
        &self.config
    }

    pub fn build(&self, request: &PackRequest) -> PackResult<PackSummary> {
        let outpath = &request.outpath;
        if !self.config.overwrite && fs::symlink_metadata(outpath).is_ok() {
            return Err(PackError::AmbiguousOverwrite {
                path: outpath.clone(),
            });
        }

        let layout = self.plan(request)?;
        let (documents, rewritten_references) = self.prepare_documents(&layout)?;
        let (members, manifest) = self.write_archive(request, &layout, &documents)?;

        info!(
            outpath = %outpath.display(),
            members = members.len(),
            rewritten = rewritten_references,
            "packed model archive"
        );
        Ok(PackSummary {
            outpath: outpath.clone(),
            manifest,
            members,
            rewritten_references,
        })
    }

    /// Validate every source and assign target names: documents first,
    /// then binaries, each in declaration order.
    fn plan(&self, request: &PackRequest) -> PackResult<ArchiveLayout> {
        let yaml_files = canonical_sources(&request.yaml_files)?;
        let files = canonical_sources(&request.files)?;

        let mut layout = ArchiveLayout::new(&self.config.base_dirname)?;
        for (role, source) in &yaml_files {
            layout.assign(role, source, MemberKind::Document)?;
        }
        for (role, source) in &files {
            layout.assign(role, source, MemberKind::Binary)?;
        }
        Ok(layout)
    }

    fn prepare_documents(
        &self,
        layout: &ArchiveLayout,
    ) -> PackResult<(Vec<PreparedDocument>, usize)> {
        let mut resolver = PathResolver::new();
        if let Some(dir) = &self.config.fallback_dir {
            resolver = resolver.with_fallback_dir(dir);
        }
        let rewriter = DocumentRewriter::new(&resolver, layout.file_targets());

        let mut documents = Vec::new();
        let mut total = 0;
        for member in layout.members() {
            if member.kind != MemberKind::Document {
                continue;
            }
            let missing = || PackError::MissingSourceFile {
                role: member.role.clone(),
                path: member.source.clone(),
            };
            let raw = fs::read(&member.source).map_err(|_| missing())?;
            let document: serde_yaml::Value =
                serde_yaml::from_slice(&raw).map_err(|source| PackError::UnreadableDocument {
                    role: member.role.clone(),
                    path: member.source.clone(),
                    source,
                })?;

            let base_dir = member.source.parent().ok_or_else(missing)?;
            let rewritten = rewriter.rewrite(&document, base_dir);
            debug!(
                role = member.role.as_str(),
                replaced = rewritten.replaced,
                "rewrote document"
            );
            total += rewritten.replaced;

            let bytes = serde_yaml::to_string(&rewritten.document)
                .map_err(|source| PackError::UnreadableDocument {
                    role: member.role.clone(),
                    path: member.source.clone(),
                    source,
                })?
                .into_bytes();
            documents.push(PreparedDocument {
                archive_path: layout.member_path(&member.target),
                target: member.target.clone(),
                bytes,
            });
        }
        Ok((documents, total))
    }

    fn write_archive(
        &self,
        request: &PackRequest,
        layout: &ArchiveLayout,
        documents: &[PreparedDocument],
    ) -> PackResult<(Vec<String>, Manifest)> {
        let outpath = &request.outpath;
        let write_failure = |source: io::Error| PackError::OutputWriteFailure {
            path: outpath.clone(),
            source,
        };

        let parent = match outpath.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        // Dropping the temp file removes it, so every early return below
        // leaves nothing behind.
        let mut tmp = tempfile::Builder::new()
            .prefix(".modelpack-")
            .suffix(".partial")
            .tempfile_in(parent)
            .map_err(write_failure)?;

        let mut members = Vec::new();
        let mut checksums = BTreeMap::new();
        let format = self.config.format_for(outpath);
        let mut sink = TarSink::new(BufWriter::new(tmp.as_file_mut()), format);

        for doc in documents {
            sink.append_bytes(&doc.archive_path, &doc.bytes)
                .map_err(write_failure)?;
            checksums.insert(
                doc.target.clone(),
                FileMeta::from_digest(Sha256::digest(&doc.bytes), doc.bytes.len() as u64),
            );
            debug!(member = doc.archive_path.as_str(), "wrote document");
            members.push(doc.archive_path.clone());
        }

        for member in layout.members() {
            if member.kind != MemberKind::Binary {
                continue;
            }
            let archive_path = layout.member_path(&member.target);
            let meta = stream_binary(&mut sink, &archive_path, &member.source).map_err(
                |source| {
                    if member.source.exists() {
                        write_failure(source)
                    } else {
                        PackError::MissingSourceFile {
                            role: member.role.clone(),
                            path: member.source.clone(),
                        }
                    }
                },
            )?;
            debug!(
                member = archive_path.as_str(),
                bytes = meta.bytes,
                "copied binary"
            );
            checksums.insert(member.target.clone(), meta);
            members.push(archive_path);
        }

        let manifest = Manifest::from_layout(layout, &request.options, checksums);
        let manifest_yaml = manifest
            .to_yaml()
            .map_err(|e| write_failure(io::Error::other(e)))?;
        let manifest_path = layout.manifest_path();
        sink.append_bytes(&manifest_path, manifest_yaml.as_bytes())
            .map_err(write_failure)?;
        members.push(manifest_path);

        let writer = sink.finish().map_err(write_failure)?;
        writer
            .into_inner()
            .map_err(|e| write_failure(e.into_error()))?;

        tmp.as_file().sync_all().map_err(write_failure)?;
        self.persist(tmp, outpath)?;
        Ok((members, manifest))
    }

    fn persist(&self, tmp: NamedTempFile, outpath: &Path) -> PackResult<()> {
        let result = if self.config.overwrite {
            tmp.persist(outpath)
        } else {
            tmp.persist_noclobber(outpath)
        };
        result.map(|_| ()).map_err(|e| {
            if e.error.kind() == io::ErrorKind::AlreadyExists {
                PackError::AmbiguousOverwrite {
                    path: outpath.to_path_buf(),
                }
            } else {
                PackError::OutputWriteFailure {
                    path: outpath.to_path_buf(),
                    source: e.error,
                }
            }
        })
    }
}

/// Pack with the given configuration.
pub fn pack(request: &PackRequest, config: PackConfig) -> PackResult<PackSummary> {
    ArchiveBuilder::new(config).build(request)
}

/// Every declared path must be an existing regular file. Returns canonical
/// paths in declaration order.
fn canonical_sources(mapping: &SourceMapping) -> PackResult<Vec<(String, PathBuf)>> {
    mapping
        .iter()
        .map(|(role, path)| {
            let missing = || PackError::MissingSourceFile {
                role: role.to_string(),
                path: path.to_path_buf(),
            };
            let canonical = fs::canonicalize(path).map_err(|_| missing())?;
            if !canonical.is_file() {
                return Err(missing());
            }
            Ok((role.to_string(), canonical))
        })
        .collect()
}

/// Stream one binary into the archive in bounded chunks.
fn stream_binary<W: io::Write>(
    sink: &mut TarSink<W>,
    archive_path: &str,
    source: &Path,
) -> io::Result<FileMeta> {
    let file = File::open(source)?;
    let size = file.metadata()?.len();
    let mut reader = HashingReader::new(SizedReader::new(file, size));
    sink.append_reader(archive_path, size, &mut reader)?;
    let (sized, meta) = reader.into_parts();
    sized.ensure_exhausted()?;
    Ok(meta)
}
