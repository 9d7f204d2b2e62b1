mod assets;
mod callout;
mod cli;
mod config;
mod content;
mod episode;
mod exec;
mod ffmpeg;
mod layout;
mod runner;
mod timing;
mod tts;
mod ui;

use clap::Parser;

use crate::cli::{Cli, Commands, EpisodeCommands};
use crate::episode::{EpisodeExporter, ExportOptions};

fn main() {
    let cli = Cli::parse();

    if cli.debug {
        eprintln!("Debug mode is on");
    }

    let result = match cli.command {
        Commands::Episode { command } => match command {
            EpisodeCommands::Export(args) => export_episode(args),
        },
    };

    if let Err(err) = result {
        ui::error("error", format!("{err:#}"));
        std::process::exit(1);
    }
}

fn export_episode(args: cli::ExportArgs) -> anyhow::Result<()> {
    let options = ExportOptions {
        episode_dir: args.dir,
        project_config_path: args.config,
        output_dir: args.output_dir,
        overwrite: args.overwrite,
        match_segment: args.match_segment,
        tts_api_key: args.tts_api_key,
        tts_preset: args.tts_preset,
    };

    let mut exporter = EpisodeExporter::new(options)?;
    exporter.export()
}
