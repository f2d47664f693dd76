//! Exit codes for the `modelpack` binary.
//! These codes are part of the public contract.

pub const SUCCESS: i32 = 0;
pub const PACK_FAILED: i32 = 1; // Source, document or archive I/O failure
pub const CONFIG_ERROR: i32 = 2; // Bad arguments, name collision, existing output
pub const INTERNAL_ERROR: i32 = CONFIG_ERROR; // Unexpected failure outside pack/unpack

#[cfg(test)]
mod tests {
    use super::*;
    use modelpack_core::{PackError, UnpackError};
    use std::path::PathBuf;

    #[test]
    fn test_library_codes_match_contract() {
        let missing = PackError::MissingSourceFile {
            role: "pretrain.pth".into(),
            path: PathBuf::from("/nope"),
        };
        assert_eq!(missing.exit_code(), PACK_FAILED);

        let exists = PackError::AmbiguousOverwrite {
            path: PathBuf::from("model.tgz"),
        };
        assert_eq!(exists.exit_code(), CONFIG_ERROR);

        let bad = UnpackError::MissingManifest {
            name: "model/meta.yaml".into(),
        };
        assert_eq!(bad.exit_code(), PACK_FAILED);
        assert_ne!(INTERNAL_ERROR, SUCCESS);
        assert_ne!(INTERNAL_ERROR, PACK_FAILED);
    }
}
