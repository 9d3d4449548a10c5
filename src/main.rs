use clap::Parser;
use std::path::Path;
use media_metadata_extractor::{
    merge,
    utils::reporting::Reporter,
    BatchDriver, PipelineConfig, Table,
};
use media_metadata_extractor::cli::commands::{Cli, Commands};

fn load_config(path: Option<&Path>) -> media_metadata_extractor::Result<PipelineConfig> {
    match path {
        Some(path) => {
            println!("Loading configuration from {}", path.display());
            PipelineConfig::from_file(path)
        }
        None => Ok(PipelineConfig::default()),
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Extract { input, output, config, language, no_transcribe, no_video, speaker, jobs } => {
            println!("=== Starting Metadata Extraction ===");

            let mut config = match load_config(config.as_deref()) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("Error loading configuration: {}", e);
                    std::process::exit(1);
                }
            };
            if let Some(language) = language {
                config.transcription.language = language;
            }
            if no_transcribe {
                config.transcription.enabled = false;
            }
            if no_video {
                config.decode_video = false;
            }
            if let Some(jobs) = jobs {
                config.jobs = jobs;
            }
            if speaker.is_some() {
                config.speaker = speaker;
            }
            if let Err(e) = config.validate() {
                eprintln!("Invalid configuration: {}", e);
                std::process::exit(1);
            }

            println!("Input directory: {}", input.display());
            println!("Output directory: {}", output.display());
            println!(
                "Transcription: {}",
                if config.transcription.enabled {
                    config.transcription.language.as_str()
                } else {
                    "disabled"
                }
            );

            let mut driver = BatchDriver::new(config);
            match driver.run(&input, &output) {
                Ok(table) => println!(
                    "\nMetadata for {} files saved to: {}",
                    table.len(),
                    output.join(&driver.config().output_file_name).display()
                ),
                Err(e) => {
                    eprintln!("Error processing directory: {}", e);
                    std::process::exit(1);
                }
            }

            println!("\n=== Metadata Extraction Complete ===");
        }

        Commands::Merge { primary, media, output, config } => {
            println!("=== Starting Merge ===");

            let config = match load_config(config.as_deref()) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("Error loading configuration: {}", e);
                    std::process::exit(1);
                }
            };

            let result = Table::read_csv(&primary)
                .and_then(|primary| Ok((primary, Table::read_csv(&media)?)))
                .and_then(|(primary, media)| merge(&primary, &media, &config.merge));

            match result {
                Ok(merged) => match Reporter::new().write_table(&merged, &output) {
                    Ok(_) => println!("Merged table saved to: {}", output.display()),
                    Err(e) => {
                        eprintln!("Error writing merged table: {}", e);
                        std::process::exit(1);
                    }
                },
                Err(e) => {
                    eprintln!("Error merging tables: {}", e);
                    std::process::exit(1);
                }
            }

            println!("\n=== Merge Complete ===");
        }
    }
}
