//! Archive extraction.
//!
//! Members are extracted into a staging directory inside `outdir`, checked
//! against the manifest, and configuration documents get their
//! archive-relative references replaced with absolute extracted paths.
//! Only then is the base directory moved to its final location.

use crate::error::{UnpackError, UnpackResult};
use crate::layout::MANIFEST_NAME;
use crate::manifest::{FileMeta, Manifest, RoleBinding, FORMAT_VERSION};
use crate::rewrite::map_strings;
use crate::tar_write::HashingReader;
use flate2::read::GzDecoder;
use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info};

/// Upper bound for the manifest member.
const MAX_MANIFEST_BYTES: u64 = 1024 * 1024;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Result of a successful unpack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnpackedModel {
    /// `<outdir>/<base_dirname>`, absolute.
    pub root: PathBuf,
    pub manifest: Manifest,
    /// Document role -> extracted path, manifest order.
    pub yaml_files: Vec<(String, PathBuf)>,
    /// Binary role -> extracted path, manifest order.
    pub files: Vec<(String, PathBuf)>,
}

impl UnpackedModel {
    pub fn options(&self) -> &[String] {
        &self.manifest.options
    }

    pub fn path_of(&self, role: &str) -> Option<&Path> {
        self.yaml_files
            .iter()
            .chain(&self.files)
            .find(|(r, _)| r == role)
            .map(|(_, p)| p.as_path())
    }
}

/// Extract `archive` under `outdir`.
pub fn unpack(archive: &Path, outdir: &Path) -> UnpackResult<UnpackedModel> {
    let read_err = |source: io::Error| UnpackError::Read {
        path: archive.to_path_buf(),
        source,
    };
    let write_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source: io::Error| UnpackError::Write { path, source }
    };

    fs::create_dir_all(outdir).map_err(write_err(outdir))?;
    let outdir = fs::canonicalize(outdir).map_err(write_err(outdir))?;

    let staging = tempfile::Builder::new()
        .prefix(".modelpack-unpack-")
        .tempdir_in(&outdir)
        .map_err(write_err(&outdir))?;

    let file = File::open(archive).map_err(read_err)?;
    let mut buffered = BufReader::new(file);
    let is_gzip = buffered.fill_buf().map_err(read_err)?.starts_with(&GZIP_MAGIC);
    let reader: Box<dyn Read> = if is_gzip {
        Box::new(GzDecoder::new(buffered))
    } else {
        Box::new(buffered)
    };

    let extracted = extract_members(reader, staging.path(), &read_err)?;
    let manifest = verify_members(&extracted)?;

    let base = &manifest.base_dirname;
    let staged_root = staging.path().join(base);
    fs::create_dir_all(&staged_root).map_err(write_err(&staged_root))?;
    let root = outdir.join(base);
    if fs::symlink_metadata(&root).is_ok() {
        return Err(UnpackError::DestinationExists { path: root });
    }

    let absolute: BTreeMap<&str, String> = manifest
        .checksums
        .keys()
        .map(|target| {
            let path = root.join(target);
            (target.as_str(), path.to_string_lossy().into_owned())
        })
        .collect();
    for binding in &manifest.yaml_files {
        relocate_document(&staged_root, &binding.target, &absolute)?;
    }

    fs::rename(&staged_root, &root).map_err(write_err(&root))?;

    let bind = |bindings: &[RoleBinding]| -> Vec<(String, PathBuf)> {
        bindings
            .iter()
            .map(|b| (b.role.clone(), root.join(&b.target)))
            .collect()
    };
    let yaml_files = bind(&manifest.yaml_files);
    let files = bind(&manifest.files);

    info!(
        archive = %archive.display(),
        root = %root.display(),
        members = manifest.checksums.len(),
        "unpacked model archive"
    );
    Ok(UnpackedModel {
        root,
        manifest,
        yaml_files,
        files,
    })
}

/// What the archive actually contained.
struct Extracted {
    base_dirname: Option<String>,
    manifest: Option<Vec<u8>>,
    members: BTreeMap<String, FileMeta>,
}

fn extract_members<R: Read>(
    reader: R,
    staging: &Path,
    read_err: &dyn Fn(io::Error) -> UnpackError,
) -> UnpackResult<Extracted> {
    let mut archive = tar::Archive::new(reader);
    let mut extracted = Extracted {
        base_dirname: None,
        manifest: None,
        members: BTreeMap::new(),
    };
    let mut seen = BTreeSet::new();

    for entry in archive.entries().map_err(read_err)? {
        let mut entry = entry.map_err(read_err)?;
        let raw_path = entry.path().map_err(read_err)?.into_owned();
        let name = raw_path.to_string_lossy().into_owned();
        let unsafe_member = |reason: &str| UnpackError::UnsafeMember {
            member: name.clone(),
            reason: reason.to_string(),
        };

        let entry_type = entry.header().entry_type();
        if entry_type.is_dir() {
            continue;
        }
        if !entry_type.is_file() {
            return Err(unsafe_member("not a regular file"));
        }

        let mut parts = Vec::new();
        for component in raw_path.components() {
            match component {
                Component::Normal(part) => match part.to_str() {
                    Some(part) => parts.push(part.to_string()),
                    None => return Err(unsafe_member("path is not valid UTF-8")),
                },
                Component::CurDir => {}
                _ => return Err(unsafe_member("path escapes the archive root")),
            }
        }
        if parts.len() < 2 {
            return Err(unsafe_member("member is outside the base directory"));
        }

        let base = parts.remove(0);
        if *extracted.base_dirname.get_or_insert_with(|| base.clone()) != base {
            return Err(unsafe_member("member is outside the base directory"));
        }

        let target = parts.join("/");
        if !seen.insert(target.clone()) {
            return Err(unsafe_member("duplicate member"));
        }

        if target == MANIFEST_NAME {
            let mut content = Vec::new();
            (&mut entry)
                .take(MAX_MANIFEST_BYTES + 1)
                .read_to_end(&mut content)
                .map_err(read_err)?;
            if content.len() as u64 > MAX_MANIFEST_BYTES {
                return Err(UnpackError::InvalidManifest {
                    reason: format!("manifest exceeds {MAX_MANIFEST_BYTES} bytes"),
                });
            }
            extracted.manifest = Some(content);
            continue;
        }

        let dest = parts.iter().fold(staging.join(&base), |p, part| p.join(part));
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|source| UnpackError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let mut out = File::create(&dest).map_err(|source| UnpackError::Write {
            path: dest.clone(),
            source,
        })?;
        let mut hashing = HashingReader::new(&mut entry);
        io::copy(&mut hashing, &mut out).map_err(|source| UnpackError::Write {
            path: dest.clone(),
            source,
        })?;
        let (_, meta) = hashing.into_parts();
        debug!(member = name.as_str(), bytes = meta.bytes, "extracted member");
        extracted.members.insert(target, meta);
    }

    Ok(extracted)
}

/// Cross-check the extracted members against the manifest.
fn verify_members(extracted: &Extracted) -> UnpackResult<Manifest> {
    let base = extracted.base_dirname.as_deref().unwrap_or("");
    let raw = extracted
        .manifest
        .as_deref()
        .ok_or_else(|| UnpackError::MissingManifest {
            name: format!("{base}/{MANIFEST_NAME}"),
        })?;
    let text = std::str::from_utf8(raw).map_err(|e| UnpackError::InvalidManifest {
        reason: e.to_string(),
    })?;
    let manifest = Manifest::from_yaml(text).map_err(|e| UnpackError::InvalidManifest {
        reason: e.to_string(),
    })?;

    if manifest.format_version != FORMAT_VERSION {
        return Err(UnpackError::InvalidManifest {
            reason: format!("unsupported format_version {}", manifest.format_version),
        });
    }
    if manifest.base_dirname != base {
        return Err(UnpackError::InvalidManifest {
            reason: format!(
                "base_dirname '{}' does not match archive root '{}'",
                manifest.base_dirname, base
            ),
        });
    }

    for binding in manifest.yaml_files.iter().chain(&manifest.files) {
        if !manifest.checksums.contains_key(&binding.target) {
            return Err(UnpackError::InvalidManifest {
                reason: format!(
                    "role '{}' bound to unlisted target '{}'",
                    binding.role, binding.target
                ),
            });
        }
    }

    for (target, expected) in &manifest.checksums {
        let member = format!("{base}/{target}");
        let actual = extracted
            .members
            .get(target)
            .ok_or_else(|| UnpackError::MissingMember {
                member: member.clone(),
            })?;
        if actual.bytes != expected.bytes {
            return Err(UnpackError::IntegrityMismatch {
                member,
                expected: format!("{} bytes", expected.bytes),
                actual: format!("{} bytes", actual.bytes),
            });
        }
        if actual.sha256 != expected.sha256 {
            return Err(UnpackError::IntegrityMismatch {
                member,
                expected: expected.sha256.clone(),
                actual: actual.sha256.clone(),
            });
        }
    }

    if let Some(target) = extracted
        .members
        .keys()
        .find(|t| !manifest.checksums.contains_key(*t))
    {
        return Err(UnpackError::UnexpectedMember {
            member: format!("{base}/{target}"),
        });
    }

    Ok(manifest)
}

/// Replace target names inside a staged document with absolute paths.
fn relocate_document(
    staged_root: &Path,
    target: &str,
    absolute: &BTreeMap<&str, String>,
) -> UnpackResult<()> {
    let path = target
        .split('/')
        .fold(staged_root.to_path_buf(), |p, part| p.join(part));
    let raw = fs::read(&path).map_err(|source| UnpackError::Write {
        path: path.clone(),
        source,
    })?;
    let document: serde_yaml::Value =
        serde_yaml::from_slice(&raw).map_err(|source| UnpackError::UnreadableDocument {
            member: target.to_string(),
            source,
        })?;

    let relocated = map_strings(&document, &mut |value: &str| {
        absolute.get(value).cloned()
    });
    if relocated == document {
        return Ok(());
    }

    let text = serde_yaml::to_string(&relocated).map_err(|source| {
        UnpackError::UnreadableDocument {
            member: target.to_string(),
            source,
        }
    })?;
    fs::write(&path, text).map_err(|source| UnpackError::Write { path, source })
}
