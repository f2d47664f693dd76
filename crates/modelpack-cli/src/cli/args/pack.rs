//! Pack and unpack command arguments.

use std::path::PathBuf;

use clap::Args;
use modelpack_core::{ArchiveFormat, DEFAULT_BASE_DIRNAME};

#[derive(Args, Debug, Clone)]
pub struct PackArgs {
    /// Output archive path (.tar.gz / .tgz, or .tar for uncompressed)
    #[arg(long)]
    pub outpath: PathBuf,

    /// Configuration document as ROLE=PATH (repeatable)
    #[arg(long = "yaml-file", value_name = "ROLE=PATH", value_parser = parse_role_path)]
    pub yaml_files: Vec<(String, PathBuf)>,

    /// Binary file as ROLE=PATH (repeatable)
    #[arg(long = "file", value_name = "ROLE=PATH", value_parser = parse_role_path)]
    pub files: Vec<(String, PathBuf)>,

    /// Free-form option recorded in the archive manifest (repeatable)
    #[arg(long = "option")]
    pub options: Vec<String>,

    /// Base dirname in archived file
    #[arg(long, env = "MODELPACK_DIRNAME", default_value = DEFAULT_BASE_DIRNAME)]
    pub dirname: String,

    /// Archive format (tgz or tar); inferred from --outpath when omitted
    #[arg(long)]
    pub format: Option<ArchiveFormat>,

    /// Replace --outpath if it already exists
    #[arg(long)]
    pub force: bool,
}

#[derive(Args, Debug, Clone)]
pub struct UnpackArgs {
    /// Archive produced by a pack command
    pub archive: PathBuf,

    /// Directory to extract into
    pub outdir: PathBuf,
}

fn parse_role_path(value: &str) -> Result<(String, PathBuf), String> {
    let (role, path) = value
        .split_once('=')
        .ok_or_else(|| format!("expected ROLE=PATH, got '{value}'"))?;
    if role.is_empty() || path.is_empty() {
        return Err(format!("expected ROLE=PATH, got '{value}'"));
    }
    Ok((role.to_string(), PathBuf::from(path)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_role_path() {
        assert_eq!(
            parse_role_path("asr/config.yaml=exp/asr/config.yaml").unwrap(),
            (
                "asr/config.yaml".to_string(),
                PathBuf::from("exp/asr/config.yaml")
            )
        );
        // Only the first '=' separates.
        assert_eq!(
            parse_role_path("pretrain.pth=a=b.pth").unwrap().1,
            PathBuf::from("a=b.pth")
        );
        assert!(parse_role_path("pretrain.pth").is_err());
        assert!(parse_role_path("=x").is_err());
        assert!(parse_role_path("x=").is_err());
    }
}
