use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "harvest",
    about = "Transcript Harvester - Collect English transcripts for a list of YouTube videos",
    version,
    long_about = "Resolves each video of a list through manual, generated, translated and original-language captions, optionally falling back to local speech-to-text. Finished transcripts are detected on disk, so interrupted runs can simply be restarted."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable progress indicators
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Acquire transcripts for every video in a list file
    Run {
        /// List file with one `Title | URL` or bare URL per line
        #[arg(value_name = "LIST")]
        list: PathBuf,

        /// Output directory for transcripts
        #[arg(short, long, value_name = "DIR")]
        out: Option<PathBuf>,

        /// Only process the first N lines of the list
        #[arg(short, long, value_name = "N")]
        limit: Option<usize>,

        /// Fall back to speech-to-text when a video has no captions
        #[arg(long, conflicts_with = "no_audio")]
        audio: bool,

        /// Captions only, even if the configuration enables audio
        #[arg(long)]
        no_audio: bool,

        /// Configuration file (defaults to ./harvest.yaml or the user config)
        #[arg(short, long, value_name = "FILE", env = "HARVEST_CONFIG")]
        config: Option<PathBuf>,
    },

    /// Show or create the configuration file
    Config {
        /// Show current configuration
        #[arg(short, long)]
        show: bool,

        /// Configuration file (defaults to ./harvest.yaml or the user config)
        #[arg(short, long, value_name = "FILE", env = "HARVEST_CONFIG")]
        config: Option<PathBuf>,
    },

    /// Check that the external tools used by the audio fallback are installed
    Check {
        /// Configuration file (defaults to ./harvest.yaml or the user config)
        #[arg(short, long, value_name = "FILE", env = "HARVEST_CONFIG")]
        config: Option<PathBuf>,
    },
}

impl Commands {
    /// Tri-state audio override from `--audio` / `--no-audio`
    pub fn audio_override(audio: bool, no_audio: bool) -> Option<bool> {
        match (audio, no_audio) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        }
    }
}
