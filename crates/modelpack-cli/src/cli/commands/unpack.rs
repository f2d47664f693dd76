use super::super::args::UnpackArgs;
use crate::exit_codes;
use modelpack_core::unpack;

pub fn run(args: UnpackArgs) -> anyhow::Result<i32> {
    match unpack(&args.archive, &args.outdir) {
        Ok(model) => {
            for (role, path) in model.yaml_files.iter().chain(&model.files) {
                println!("{role}: {}", path.display());
            }
            Ok(exit_codes::SUCCESS)
        }
        Err(e) => {
            eprintln!("error: {e}");
            Ok(e.exit_code())
        }
    }
}
