//! Archive manifest (last member in the archive).
//!
//! Contract: format_version 1, stored as YAML at `<base_dirname>/meta.yaml`.

use crate::layout::{ArchiveLayout, MemberKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Current manifest format version.
pub const FORMAT_VERSION: u32 = 1;

/// Archive manifest.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Manifest {
    /// Format version (always 1 for v1 contract)
    pub format_version: u32,
    /// Top-level directory every member lives under
    pub base_dirname: String,
    /// Free-form options, in declaration order
    #[serde(default)]
    pub options: Vec<String>,
    /// Configuration document roles
    #[serde(default)]
    pub yaml_files: Vec<RoleBinding>,
    /// Binary file roles
    #[serde(default)]
    pub files: Vec<RoleBinding>,
    /// Integrity data for every member except the manifest
    #[serde(default)]
    pub checksums: BTreeMap<String, FileMeta>,
}

/// A role and its target name relative to the base directory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoleBinding {
    pub role: String,
    pub target: String,
}

/// Member metadata within the archive.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileMeta {
    /// SHA-256 hash with prefix
    pub sha256: String,
    /// Size in bytes
    pub bytes: u64,
}

impl Manifest {
    /// Summarize a finished layout.
    pub fn from_layout(
        layout: &ArchiveLayout,
        options: &[String],
        checksums: BTreeMap<String, FileMeta>,
    ) -> Self {
        let bindings = |kind: MemberKind| -> Vec<RoleBinding> {
            layout
                .assignments()
                .iter()
                .filter(|a| a.kind == kind)
                .map(|a| RoleBinding {
                    role: a.role.clone(),
                    target: a.target.clone(),
                })
                .collect()
        };

        Self {
            format_version: FORMAT_VERSION,
            base_dirname: layout.base_dirname().to_string(),
            options: options.to_vec(),
            yaml_files: bindings(MemberKind::Document),
            files: bindings(MemberKind::Binary),
            checksums,
        }
    }

    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }

    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(text)
    }

    /// Target bound to `role`, searching documents then binaries.
    pub fn target_of(&self, role: &str) -> Option<&str> {
        self.yaml_files
            .iter()
            .chain(&self.files)
            .find(|b| b.role == role)
            .map(|b| b.target.as_str())
    }
}

impl FileMeta {
    pub fn from_digest(digest: impl AsRef<[u8]>, bytes: u64) -> Self {
        Self {
            sha256: format!("sha256:{}", hex::encode(digest)),
            bytes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_from_layout_keeps_declaration_order() {
        let mut layout = ArchiveLayout::new("bundle").unwrap();
        layout
            .assign("lm/config.yaml", Path::new("/s/lm.yaml"), MemberKind::Document)
            .unwrap();
        layout
            .assign("asr/config.yaml", Path::new("/s/asr.yaml"), MemberKind::Document)
            .unwrap();
        layout
            .assign("asr/pretrain.pth", Path::new("/s/asr.pth"), MemberKind::Binary)
            .unwrap();

        let manifest = Manifest::from_layout(&layout, &["lang=en".to_string()], BTreeMap::new());

        assert_eq!(manifest.format_version, FORMAT_VERSION);
        assert_eq!(manifest.base_dirname, "bundle");
        assert_eq!(manifest.options, vec!["lang=en"]);
        let roles: Vec<&str> = manifest.yaml_files.iter().map(|b| b.role.as_str()).collect();
        assert_eq!(roles, vec!["lm/config.yaml", "asr/config.yaml"]);
        assert_eq!(manifest.files.len(), 1);
        assert_eq!(manifest.target_of("asr/pretrain.pth"), Some("asr/pretrain.pth"));
        assert_eq!(manifest.target_of("enh/model.pth"), None);
    }

    #[test]
    fn test_yaml_shape() {
        let manifest = Manifest {
            format_version: 1,
            base_dirname: "bundle".into(),
            options: vec!["lang=en".into()],
            yaml_files: vec![RoleBinding {
                role: "config.yaml".into(),
                target: "config.yaml".into(),
            }],
            files: vec![],
            checksums: BTreeMap::new(),
        };
        let text = manifest.to_yaml().unwrap();
        assert!(text.contains("base_dirname: bundle"), "{text}");
        assert!(text.contains("- lang=en"), "{text}");
        assert_eq!(Manifest::from_yaml(&text).unwrap(), manifest);
    }

    #[test]
    fn test_missing_optional_sections_default() {
        let manifest = Manifest::from_yaml("format_version: 1\nbase_dirname: m\n").unwrap();
        assert!(manifest.options.is_empty());
        assert!(manifest.yaml_files.is_empty());
        assert!(manifest.checksums.is_empty());
    }
}
