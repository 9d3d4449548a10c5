use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "media-metadata")]
#[command(version = "1.0")]
#[command(about = "Media inspection, audio quality and transcription metadata extractor", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Extract one metadata row per file of a directory
    Extract {
        /// Directory with the raw media files
        #[arg(short = 'i', long = "input")]
        input: PathBuf,

        /// Directory where the metadata table is written
        #[arg(short = 'o', long = "output")]
        output: PathBuf,

        /// TOML configuration file
        #[arg(short = 'c', long)]
        config: Option<PathBuf>,

        /// Transcription language ("en" selects the English-only model)
        #[arg(short = 'l', long)]
        language: Option<String>,

        /// Skip speech transcription
        #[arg(long)]
        no_transcribe: bool,

        /// Skip raw video frame decoding (a full decode of every video file)
        #[arg(long)]
        no_video: bool,

        /// Speaker id written on every row
        #[arg(short = 's', long)]
        speaker: Option<String>,

        /// Worker threads (1 = sequential, 0 = all cores)
        #[arg(short = 'j', long)]
        jobs: Option<usize>,
    },

    /// Add per-id media counts and durations to a companion table
    Merge {
        /// Table receiving the counts, e.g. processed questionnaires
        #[arg(short = 'p', long)]
        primary: PathBuf,

        /// Metadata table produced by `extract`
        #[arg(short = 'm', long)]
        media: PathBuf,

        /// Output CSV file path
        #[arg(short = 'o', long)]
        output: PathBuf,

        /// TOML configuration file
        #[arg(short = 'c', long)]
        config: Option<PathBuf>,
    },
}
