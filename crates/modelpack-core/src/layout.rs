//! Archive member naming.
//!
//! Target names derive from role strings, are forward-slash separated,
//! relative to the base directory and never escape it.

use crate::error::{PackError, PackResult};
use crate::rewrite::FileTargets;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Fixed name of the manifest member inside the base directory.
pub const MANIFEST_NAME: &str = "meta.yaml";

/// What a member holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberKind {
    /// Configuration document, written after rewriting.
    Document,
    /// Binary artifact, copied verbatim.
    Binary,
}

/// One member of the archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveMember {
    /// First role that claimed this target.
    pub role: String,
    pub kind: MemberKind,
    /// Canonical source path.
    pub source: PathBuf,
    /// Name relative to the base directory.
    pub target: String,
}

/// A role and the target it was bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub role: String,
    pub kind: MemberKind,
    pub target: String,
}

/// Assigns unique, deterministic target names to declared roles.
///
/// Callers assign document roles first, then binary roles, each in
/// declaration order.
#[derive(Debug, Clone)]
pub struct ArchiveLayout {
    base_dirname: String,
    members: Vec<ArchiveMember>,
    by_target: BTreeMap<String, usize>,
    assignments: Vec<Assignment>,
    file_targets: FileTargets,
}

impl ArchiveLayout {
    pub fn new(base_dirname: &str) -> PackResult<Self> {
        validate_dirname(base_dirname)?;
        Ok(Self {
            base_dirname: base_dirname.to_string(),
            members: Vec::new(),
            by_target: BTreeMap::new(),
            assignments: Vec::new(),
            file_targets: FileTargets::new(),
        })
    }

    /// Bind `role` to a target name. `source` must already be canonical.
    pub fn assign(&mut self, role: &str, source: &Path, kind: MemberKind) -> PackResult<String> {
        let target = normalize_role(role)?;

        if target == MANIFEST_NAME || nests(MANIFEST_NAME, &target) {
            return Err(PackError::NameCollision {
                target,
                first_role: MANIFEST_NAME.to_string(),
                second_role: role.to_string(),
            });
        }

        // A member cannot be both a file and the parent directory of another.
        if let Some(existing) = self
            .members
            .iter()
            .find(|m| nests(&m.target, &target) || nests(&target, &m.target))
        {
            return Err(PackError::NameCollision {
                target,
                first_role: existing.role.clone(),
                second_role: role.to_string(),
            });
        }

        match self.by_target.get(&target) {
            Some(&idx) => {
                let existing = &self.members[idx];
                if existing.source != source || existing.kind != kind {
                    return Err(PackError::NameCollision {
                        target,
                        first_role: existing.role.clone(),
                        second_role: role.to_string(),
                    });
                }
            }
            None => {
                self.by_target.insert(target.clone(), self.members.len());
                self.members.push(ArchiveMember {
                    role: role.to_string(),
                    kind,
                    source: source.to_path_buf(),
                    target: target.clone(),
                });
            }
        }

        // First declaration wins so every reference maps to one member.
        self.file_targets
            .entry(source.to_path_buf())
            .or_insert_with(|| target.clone());

        self.assignments.push(Assignment {
            role: role.to_string(),
            kind,
            target: target.clone(),
        });
        Ok(target)
    }

    pub fn base_dirname(&self) -> &str {
        &self.base_dirname
    }

    /// Unique members in assignment order.
    pub fn members(&self) -> &[ArchiveMember] {
        &self.members
    }

    /// Every role binding in assignment order, including shared targets.
    pub fn assignments(&self) -> &[Assignment] {
        &self.assignments
    }

    pub fn file_targets(&self) -> &FileTargets {
        &self.file_targets
    }

    /// Full path of a target inside the archive.
    pub fn member_path(&self, target: &str) -> String {
        format!("{}/{}", self.base_dirname, target)
    }

    pub fn manifest_path(&self) -> String {
        self.member_path(MANIFEST_NAME)
    }
}

/// True when `inner` lies below `outer` as a path, e.g. `asr` and `asr/x.pth`.
fn nests(outer: &str, inner: &str) -> bool {
    inner
        .strip_prefix(outer)
        .is_some_and(|rest| rest.starts_with('/'))
}

/// Normalize a role string into a safe relative target name.
pub fn normalize_role(role: &str) -> PackResult<String> {
    let invalid = |reason: &str| PackError::InvalidRole {
        role: role.to_string(),
        reason: reason.to_string(),
    };

    if role.contains('\0') {
        return Err(invalid("contains NUL byte"));
    }

    let unified = role.replace('\\', "/");
    if unified.starts_with('/') {
        return Err(invalid("absolute paths are not allowed"));
    }

    let mut parts: Vec<&str> = Vec::new();
    for part in unified.split('/') {
        match part {
            "" | "." => continue,
            ".." => return Err(invalid("parent directory components are not allowed")),
            p if parts.is_empty() && p.ends_with(':') => {
                return Err(invalid("drive prefixes are not allowed"))
            }
            p => parts.push(p),
        }
    }

    if parts.is_empty() {
        return Err(invalid("role is empty"));
    }
    Ok(parts.join("/"))
}

/// The base directory name must be one plain path component.
pub fn validate_dirname(dirname: &str) -> PackResult<()> {
    let reason = if dirname.is_empty() {
        Some("must not be empty")
    } else if dirname == "." || dirname == ".." {
        Some("must not be a relative directory marker")
    } else if dirname.contains(&['/', '\\', '\0'][..]) {
        Some("must be a single path component")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(PackError::InvalidDirname {
            dirname: dirname.to_string(),
            reason: reason.to_string(),
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_is_preferred_target() {
        let mut layout = ArchiveLayout::new("bundle").unwrap();
        let target = layout
            .assign(
                "asr/pretrain.pth",
                Path::new("/src/model.pth"),
                MemberKind::Binary,
            )
            .unwrap();
        assert_eq!(target, "asr/pretrain.pth");
        assert_eq!(layout.member_path(&target), "bundle/asr/pretrain.pth");
        assert_eq!(layout.manifest_path(), "bundle/meta.yaml");
    }

    #[test]
    fn test_normalize_role() {
        assert_eq!(normalize_role("asr/config.yaml").unwrap(), "asr/config.yaml");
        assert_eq!(normalize_role("./asr//config.yaml").unwrap(), "asr/config.yaml");
        assert_eq!(normalize_role("asr\\config.yaml").unwrap(), "asr/config.yaml");

        for bad in ["", ".", "/etc/passwd", "../x", "a/../../x", "C:/x", "a\0b"] {
            assert!(
                matches!(normalize_role(bad), Err(PackError::InvalidRole { .. })),
                "expected rejection for {bad:?}"
            );
        }
    }

    #[test]
    fn test_nested_targets_collide() {
        let mut layout = ArchiveLayout::new("bundle").unwrap();
        layout
            .assign("asr", Path::new("/src/a.pth"), MemberKind::Binary)
            .unwrap();
        let err = layout
            .assign("asr/pretrain.pth", Path::new("/src/b.pth"), MemberKind::Binary)
            .unwrap_err();
        match err {
            PackError::NameCollision {
                target,
                first_role,
                second_role,
            } => {
                assert_eq!(target, "asr/pretrain.pth");
                assert_eq!(first_role, "asr");
                assert_eq!(second_role, "asr/pretrain.pth");
            }
            other => panic!("unexpected error: {other:?}"),
        }

        // The other order, and below the manifest name.
        let mut layout = ArchiveLayout::new("bundle").unwrap();
        layout
            .assign("lm/config.yaml", Path::new("/src/lm.yaml"), MemberKind::Document)
            .unwrap();
        assert!(layout
            .assign("lm", Path::new("/src/lm.pth"), MemberKind::Binary)
            .is_err());
        assert!(layout
            .assign("meta.yaml/x", Path::new("/src/x"), MemberKind::Binary)
            .is_err());

        // Sibling names sharing a string prefix are fine.
        assert!(layout
            .assign("lm.pth", Path::new("/src/lm.pth"), MemberKind::Binary)
            .is_ok());
        assert!(layout
            .assign("lm/config.yaml.bak", Path::new("/src/bak"), MemberKind::Binary)
            .is_ok());
    }

    #[test]
    fn test_collision_between_distinct_sources() {
        let mut layout = ArchiveLayout::new("bundle").unwrap();
        layout
            .assign("model.pth", Path::new("/a/model.pth"), MemberKind::Binary)
            .unwrap();
        let err = layout
            .assign("./model.pth", Path::new("/b/model.pth"), MemberKind::Binary)
            .unwrap_err();
        match err {
            PackError::NameCollision {
                target,
                first_role,
                second_role,
            } => {
                assert_eq!(target, "model.pth");
                assert_eq!(first_role, "model.pth");
                assert_eq!(second_role, "./model.pth");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_collision_across_kinds() {
        let mut layout = ArchiveLayout::new("bundle").unwrap();
        layout
            .assign("config.yaml", Path::new("/a/c.yaml"), MemberKind::Document)
            .unwrap();
        assert!(matches!(
            layout.assign("config.yaml", Path::new("/a/c.yaml"), MemberKind::Binary),
            Err(PackError::NameCollision { .. })
        ));
    }

    #[test]
    fn test_manifest_name_is_reserved() {
        let mut layout = ArchiveLayout::new("bundle").unwrap();
        assert!(matches!(
            layout.assign("meta.yaml", Path::new("/a/meta.yaml"), MemberKind::Document),
            Err(PackError::NameCollision { .. })
        ));
    }

    #[test]
    fn test_same_source_under_equivalent_roles_shares_member() {
        let mut layout = ArchiveLayout::new("bundle").unwrap();
        let src = Path::new("/a/model.pth");
        layout.assign("x/model.pth", src, MemberKind::Binary).unwrap();
        layout.assign("./x/model.pth", src, MemberKind::Binary).unwrap();

        assert_eq!(layout.members().len(), 1);
        assert_eq!(layout.assignments().len(), 2);
    }

    #[test]
    fn test_first_declared_target_wins_for_references() {
        let mut layout = ArchiveLayout::new("bundle").unwrap();
        let src = Path::new("/a/model.pth");
        layout.assign("asr/pretrain.pth", src, MemberKind::Binary).unwrap();
        layout.assign("lm/pretrain.pth", src, MemberKind::Binary).unwrap();

        assert_eq!(layout.members().len(), 2);
        assert_eq!(
            layout.file_targets().get(src).map(String::as_str),
            Some("asr/pretrain.pth")
        );
    }

    #[test]
    fn test_invalid_dirname() {
        for bad in ["", ".", "..", "a/b", "a\\b"] {
            assert!(matches!(
                ArchiveLayout::new(bad),
                Err(PackError::InvalidDirname { .. })
            ));
        }
    }
}
