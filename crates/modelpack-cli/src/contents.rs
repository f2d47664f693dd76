//! Per-family content specifications.
//!
//! Each model family declares which configuration-document roles and which
//! binary-file roles an archive of that family may carry. The packing
//! engine never branches on the family; it only receives the role sets.

/// Roles one model family packs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentSpec {
    pub family: &'static str,
    pub yaml_files: &'static [&'static str],
    pub files: &'static [&'static str],
}

pub const ASR: ContentSpec = ContentSpec {
    family: "asr",
    yaml_files: &["asr/config.yaml", "lm/config.yaml"],
    files: &["asr/pretrain.pth", "lm/pretrain.pth"],
};

pub const TTS: ContentSpec = ContentSpec {
    family: "tts",
    yaml_files: &["config.yaml"],
    files: &["pretrain.pth"],
};

pub const ENH: ContentSpec = ContentSpec {
    family: "enh",
    yaml_files: &["train_config.yaml"],
    files: &["model_file.pth"],
};

impl ContentSpec {
    pub fn has_yaml_role(&self, role: &str) -> bool {
        self.yaml_files.contains(&role)
    }

    pub fn has_file_role(&self, role: &str) -> bool {
        self.files.contains(&role)
    }
}
