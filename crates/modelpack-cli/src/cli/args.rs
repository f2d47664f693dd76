use clap::{Parser, Subcommand};

pub mod pack;
pub use pack::*;

#[derive(Parser)]
#[command(
    name = "modelpack",
    version,
    about = "Pack input files to archive format. If external file paths are written in the \
             input yaml files, they are rewritten to the archived name"
)]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Pack a speech recognition model (asr + optional lm)
    Asr(PackArgs),
    /// Pack a text-to-speech model
    Tts(PackArgs),
    /// Pack a speech enhancement model
    Enh(PackArgs),
    /// Extract an archive and point its configs at the extracted files
    Unpack(UnpackArgs),
    Version,
}
