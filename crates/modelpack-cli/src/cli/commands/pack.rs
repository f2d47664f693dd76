use super::super::args::PackArgs;
use crate::contents::ContentSpec;
use crate::exit_codes;
use anyhow::Context;
use modelpack_core::{pack, PackConfig, PackRequest};
use std::path::PathBuf;
use tracing::debug;

pub fn run(spec: &ContentSpec, args: PackArgs) -> anyhow::Result<i32> {
    let request = match build_request(spec, &args) {
        Ok(request) => request,
        Err(msg) => {
            eprintln!("error: {msg}");
            return Ok(exit_codes::CONFIG_ERROR);
        }
    };

    debug!(
        family = spec.family,
        yaml_files = request.yaml_files.len(),
        files = request.files.len(),
        "pack request"
    );

    let cwd = std::env::current_dir().context("failed to resolve working directory")?;
    let mut config = PackConfig::default()
        .with_base_dirname(args.dirname)
        .with_overwrite(args.force)
        .with_fallback_dir(cwd);
    if let Some(format) = args.format {
        config = config.with_format(format);
    }

    match pack(&request, config) {
        Ok(summary) => {
            println!("Generate: {}", summary.outpath.display());
            Ok(exit_codes::SUCCESS)
        }
        Err(e) => {
            eprintln!("error: {e}");
            Ok(e.exit_code())
        }
    }
}

/// Checks every supplied role against the family table and orders the
/// request by the table, not by argument order.
fn build_request(spec: &ContentSpec, args: &PackArgs) -> Result<PackRequest, String> {
    for (role, _) in &args.yaml_files {
        if !spec.has_yaml_role(role) {
            return Err(unknown_role(spec, "--yaml-file", role, spec.yaml_files));
        }
    }
    for (role, _) in &args.files {
        if !spec.has_file_role(role) {
            return Err(unknown_role(spec, "--file", role, spec.files));
        }
    }

    let mut request = PackRequest::new(&args.outpath);
    for role in spec.yaml_files {
        if let Some(path) = last_for(&args.yaml_files, role) {
            request = request.yaml_file(*role, path);
        }
    }
    for role in spec.files {
        if let Some(path) = last_for(&args.files, role) {
            request = request.file(*role, path);
        }
    }
    for option in &args.options {
        request = request.option(option.as_str());
    }
    Ok(request)
}

fn last_for(pairs: &[(String, PathBuf)], role: &str) -> Option<PathBuf> {
    pairs
        .iter()
        .rev()
        .find(|(r, _)| r == role)
        .map(|(_, path)| path.clone())
}

fn unknown_role(spec: &ContentSpec, flag: &str, role: &str, known: &[&str]) -> String {
    format!(
        "unknown {flag} role '{role}' for {} (expected one of: {})",
        spec.family,
        known.join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contents::ASR;

    fn args(yaml_files: &[(&str, &str)], files: &[(&str, &str)]) -> PackArgs {
        let pairs = |items: &[(&str, &str)]| -> Vec<(String, PathBuf)> {
            items
                .iter()
                .map(|(r, p)| (r.to_string(), PathBuf::from(p)))
                .collect()
        };
        PackArgs {
            outpath: PathBuf::from("out.tgz"),
            yaml_files: pairs(yaml_files),
            files: pairs(files),
            options: vec!["lang=en".to_string()],
            dirname: "model".to_string(),
            format: None,
            force: false,
        }
    }

    #[test]
    fn test_request_follows_table_order() {
        let a = args(
            &[("lm/config.yaml", "lm.yaml"), ("asr/config.yaml", "asr.yaml")],
            &[("asr/pretrain.pth", "asr.pth")],
        );
        let request = build_request(&ASR, &a).unwrap();
        let roles: Vec<&str> = request.yaml_files.iter().map(|(r, _)| r).collect();
        assert_eq!(roles, vec!["asr/config.yaml", "lm/config.yaml"]);
        assert_eq!(request.options, vec!["lang=en".to_string()]);
    }

    #[test]
    fn test_repeated_role_keeps_last() {
        let a = args(&[], &[("asr/pretrain.pth", "a.pth"), ("asr/pretrain.pth", "b.pth")]);
        let request = build_request(&ASR, &a).unwrap();
        assert_eq!(
            request.files.get("asr/pretrain.pth"),
            Some(std::path::Path::new("b.pth"))
        );
    }

    #[test]
    fn test_role_in_wrong_group_is_rejected() {
        let a = args(&[("asr/pretrain.pth", "a.pth")], &[]);
        let err = build_request(&ASR, &a).unwrap_err();
        assert!(err.contains("--yaml-file"), "{err}");
        assert!(err.contains("asr/config.yaml"), "{err}");
    }
}
