//! Inputs of a pack call.

use std::path::{Path, PathBuf};

/// Ordered role -> path mapping. Absent optional roles are simply not
/// inserted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceMapping {
    entries: Vec<(String, PathBuf)>,
}

impl SourceMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace `role`. A replaced role keeps its original position.
    pub fn insert(&mut self, role: impl Into<String>, path: impl Into<PathBuf>) {
        let role = role.into();
        let path = path.into();
        match self.entries.iter_mut().find(|(r, _)| *r == role) {
            Some(entry) => entry.1 = path,
            None => self.entries.push((role, path)),
        }
    }

    pub fn with(mut self, role: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.insert(role, path);
        self
    }

    pub fn get(&self, role: &str) -> Option<&Path> {
        self.entries
            .iter()
            .find(|(r, _)| r == role)
            .map(|(_, p)| p.as_path())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.entries.iter().map(|(r, p)| (r.as_str(), p.as_path()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<R, P> FromIterator<(R, P)> for SourceMapping
where
    R: Into<String>,
    P: Into<PathBuf>,
{
    fn from_iter<I: IntoIterator<Item = (R, P)>>(iter: I) -> Self {
        let mut mapping = Self::new();
        for (role, path) in iter {
            mapping.insert(role, path);
        }
        mapping
    }
}

/// Everything one pack call needs besides its configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackRequest {
    /// Configuration document roles.
    pub yaml_files: SourceMapping,
    /// Binary file roles.
    pub files: SourceMapping,
    /// Free-form option strings recorded in the manifest.
    pub options: Vec<String>,
    pub outpath: PathBuf,
}

impl PackRequest {
    pub fn new(outpath: impl Into<PathBuf>) -> Self {
        Self {
            yaml_files: SourceMapping::new(),
            files: SourceMapping::new(),
            options: Vec::new(),
            outpath: outpath.into(),
        }
    }

    pub fn yaml_file(mut self, role: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.yaml_files.insert(role, path);
        self
    }

    pub fn file(mut self, role: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.files.insert(role, path);
        self
    }

    pub fn option(mut self, option: impl Into<String>) -> Self {
        self.options.push(option.into());
        self
    }
}
