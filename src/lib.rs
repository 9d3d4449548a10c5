pub mod audio;
pub mod cli;
pub mod config;
pub mod media;
pub mod metadata;
pub mod pipeline;
pub mod transcribe;
pub mod utils;
pub mod video;

#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Probe error: {0}")]
    Probe(String),
    #[error("Decode error: {0}")]
    Decode(String),
    #[error("Quality computation error: {0}")]
    Quality(#[from] audio::quality::QualityError),
    #[error("Transcription error: {0}")]
    Transcription(#[from] transcribe::TranscriptionError),
    #[error("Table error: {0}")]
    Table(String),
}

pub type Result<T> = std::result::Result<T, MediaError>;

// Re-exports for convenience
pub use audio::decoder::{AudioDecoder, DecodedAudio};
pub use audio::quality::{AudioQualityAnalyzer, QualityMetrics, QualitySettings};
pub use config::PipelineConfig;
pub use media::classify::{classify, is_multimedia, Modality};
pub use media::file::MediaFile;
pub use media::probe::{
    AudioStream, FfprobeBackend, MediaProbe, ProbeReport, ProbeResult, StreamDescriptor,
    VideoStream,
};
pub use metadata::record::{aggregate, MetadataRecord, MetadataValue};
pub use metadata::table::Table;
pub use pipeline::batch::BatchDriver;
pub use pipeline::merge::{merge, MergeOptions};
pub use transcribe::{SpeechToText, TranscriptionError, TranscriptionResult};
pub use video::decoder::{DecodedVideo, VideoDecoder};
