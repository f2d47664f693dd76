use super::super::args::*;
use crate::contents;
use crate::exit_codes::SUCCESS;

pub fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    match cli.cmd {
        Command::Asr(args) => super::pack::run(&contents::ASR, args),
        Command::Tts(args) => super::pack::run(&contents::TTS, args),
        Command::Enh(args) => super::pack::run(&contents::ENH, args),
        Command::Unpack(args) => super::unpack::run(args),
        Command::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(SUCCESS)
        }
    }
}
