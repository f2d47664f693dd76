//! Configuration document rewriting.
//!
//! Walks a YAML tree and replaces every string scalar that resolves to a
//! packed file with that file's archive-relative target name. Any string
//! under any key qualifies; mapping keys themselves are never touched.

use crate::resolve::PathResolver;
use serde_yaml::value::TaggedValue;
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Canonical source path -> archive-relative target name.
pub type FileTargets = BTreeMap<PathBuf, String>;

/// Result of rewriting one document.
#[derive(Debug, Clone, PartialEq)]
pub struct Rewritten {
    pub document: Value,
    /// Number of string scalars that were replaced.
    pub replaced: usize,
}

/// Rewrites path references inside configuration documents.
pub struct DocumentRewriter<'a> {
    resolver: &'a PathResolver,
    targets: &'a FileTargets,
}

impl<'a> DocumentRewriter<'a> {
    pub fn new(resolver: &'a PathResolver, targets: &'a FileTargets) -> Self {
        Self { resolver, targets }
    }

    /// Produce a rewritten copy of `document`. `base_dir` is the directory
    /// containing the document; relative values resolve against it.
    pub fn rewrite(&self, document: &Value, base_dir: &Path) -> Rewritten {
        let mut replaced = 0;
        let document = map_strings(document, &mut |value: &str| {
            let canonical = self.resolver.resolve(base_dir, value)?;
            let target = self.targets.get(&canonical)?;
            debug!(from = value, to = target.as_str(), "rewrote path reference");
            replaced += 1;
            Some(target.clone())
        });
        Rewritten { document, replaced }
    }
}

/// Rewrite `document` with a resolver that has no fallback directory.
pub fn rewrite_document(document: &Value, base_dir: &Path, targets: &FileTargets) -> Value {
    let resolver = PathResolver::default();
    DocumentRewriter::new(&resolver, targets)
        .rewrite(document, base_dir)
        .document
}

/// Rebuild `value`, replacing each string scalar for which `replace`
/// returns `Some`. Mapping order, sequence order and tags are preserved.
pub fn map_strings<F>(value: &Value, replace: &mut F) -> Value
where
    F: FnMut(&str) -> Option<String>,
{
    match value {
        Value::String(s) => match replace(s) {
            Some(new) => Value::String(new),
            None => value.clone(),
        },
        Value::Sequence(items) => {
            Value::Sequence(items.iter().map(|v| map_strings(v, replace)).collect())
        }
        Value::Mapping(map) => Value::Mapping(
            map.iter()
                .map(|(k, v)| (k.clone(), map_strings(v, replace)))
                .collect(),
        ),
        Value::Tagged(tagged) => Value::Tagged(Box::new(TaggedValue {
            tag: tagged.tag.clone(),
            value: map_strings(&tagged.value, replace),
        })),
        Value::Null | Value::Bool(_) | Value::Number(_) => value.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::fs;
    use tempfile::{tempdir, TempDir};

    fn fixture() -> (TempDir, FileTargets) {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("exp")).unwrap();
        fs::write(dir.path().join("exp/model.pth"), b"weights").unwrap();
        fs::write(dir.path().join("exp/stats.npz"), b"stats").unwrap();

        let mut targets = FileTargets::new();
        targets.insert(
            fs::canonicalize(dir.path().join("exp/model.pth")).unwrap(),
            "asr/pretrain.pth".to_string(),
        );
        targets.insert(
            fs::canonicalize(dir.path().join("exp/stats.npz")).unwrap(),
            "asr/feats_stats.npz".to_string(),
        );
        (dir, targets)
    }

    #[test]
    fn test_rewrites_nested_references_and_keeps_order() {
        let (dir, targets) = fixture();
        let abs = dir.path().join("exp/model.pth");
        let doc: Value = serde_yaml::from_str(&format!(
            "zeta: 1\n\
             model_file: {}\n\
             normalize_conf:\n  stats_file: exp/stats.npz\n\
             extra:\n  - exp/model.pth\n  - keep me\n\
             alpha: true\n",
            abs.display()
        ))
        .unwrap();

        let resolver = PathResolver::new();
        let out = DocumentRewriter::new(&resolver, &targets).rewrite(&doc, dir.path());

        assert_eq!(out.replaced, 3);
        let map = out.document.as_mapping().unwrap();
        let keys: Vec<&str> = map.keys().map(|k| k.as_str().unwrap()).collect();
        assert_eq!(
            keys,
            vec!["zeta", "model_file", "normalize_conf", "extra", "alpha"]
        );
        assert_eq!(out.document["model_file"], "asr/pretrain.pth");
        assert_eq!(
            out.document["normalize_conf"]["stats_file"],
            "asr/feats_stats.npz"
        );
        assert_eq!(out.document["extra"][0], "asr/pretrain.pth");
        assert_eq!(out.document["extra"][1], "keep me");
        assert_eq!(out.document["alpha"], true);
    }

    #[test]
    fn test_existing_but_unpacked_paths_are_left_alone() {
        let (dir, targets) = fixture();
        fs::write(dir.path().join("exp/other.txt"), b"x").unwrap();
        let doc: Value = serde_yaml::from_str("vocab: exp/other.txt\n").unwrap();

        let out = rewrite_document(&doc, dir.path(), &targets);
        assert_eq!(out, doc);
    }

    #[test]
    fn test_keys_are_never_rewritten() {
        let (dir, targets) = fixture();
        let doc: Value = serde_yaml::from_str("exp/model.pth: exp/model.pth\n").unwrap();

        let out = rewrite_document(&doc, dir.path(), &targets);
        let (k, v) = out.as_mapping().unwrap().iter().next().unwrap();
        assert_eq!(k, "exp/model.pth");
        assert_eq!(v, "asr/pretrain.pth");
    }

    #[test]
    fn test_tagged_values_keep_their_tag() {
        let (dir, targets) = fixture();
        let doc: Value = serde_yaml::from_str("init: !path exp/model.pth\n").unwrap();

        let out = rewrite_document(&doc, dir.path(), &targets);
        match &out["init"] {
            Value::Tagged(tagged) => {
                assert_eq!(tagged.tag, "path");
                assert_eq!(tagged.value, "asr/pretrain.pth");
            }
            other => panic!("expected tagged value, got {other:?}"),
        }
    }

    #[test]
    fn test_input_document_is_not_mutated() {
        let (dir, targets) = fixture();
        let doc: Value = serde_yaml::from_str("model_file: exp/model.pth\n").unwrap();
        let before = doc.clone();
        let _ = rewrite_document(&doc, dir.path(), &targets);
        assert_eq!(doc, before);
    }

    proptest! {
        #[test]
        fn prop_non_path_strings_are_preserved(
            values in proptest::collection::vec("[a-z0-9 =:_-]{0,24}", 0..8)
        ) {
            let (dir, targets) = fixture();
            let doc = Value::Sequence(values.iter().cloned().map(Value::String).collect());
            let out = rewrite_document(&doc, dir.path(), &targets);
            prop_assert_eq!(out, doc);
        }
    }
}
