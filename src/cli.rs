use clap::{Args, Parser, Subcommand, ValueHint};
use std::path::PathBuf;

/// castkit main parser
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Activate debug output
    #[arg(short, long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Episode commands
    Episode {
        #[command(subcommand)]
        command: EpisodeCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum EpisodeCommands {
    /// Export an episode into a final video file
    Export(ExportArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ExportArgs {
    /// Directory of the episode to export
    #[arg(long, value_hint = ValueHint::DirPath)]
    pub dir: PathBuf,

    /// Project configuration file
    #[arg(
        short = 'c',
        long = "config",
        default_value = crate::config::PROJECT_CONFIG_BASENAME,
        value_hint = ValueHint::FilePath
    )]
    pub config: PathBuf,

    /// Path template for the exported video files
    #[arg(long)]
    pub output_dir: Option<String>,

    /// Overwrite existing exported artifacts
    #[arg(long)]
    pub overwrite: bool,

    /// Only export segments whose filename matches this pattern
    #[arg(long)]
    pub match_segment: Option<String>,

    /// API key for the voice synthesis service
    #[arg(long)]
    pub tts_api_key: Option<String>,

    /// Restrict TTS selection to the preset with this id
    #[arg(long)]
    pub tts_preset: Option<String>,
}
