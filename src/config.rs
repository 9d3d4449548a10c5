use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::audio::quality::QualitySettings;
use crate::media::probe::DEFAULT_MIN_CONFIDENCE;
use crate::pipeline::merge::MergeOptions;
use crate::{MediaError, Result};

pub const DEFAULT_OUTPUT_FILE: &str = "metadata_all_videos.csv";

/// Pipeline settings. Every field has a default, so a TOML file only needs to
/// list what it changes.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub min_probe_confidence: u32,
    /// Decodes the video stream frame by frame to check it is readable. Frames
    /// are streamed and never held together, but a long high-resolution input
    /// still costs a full decode.
    pub decode_video: bool,
    /// Written as `speaker_id` on every row when the whole batch comes from
    /// one speaker.
    pub speaker: Option<String>,
    /// 1 processes files sequentially, 0 uses every core.
    pub jobs: usize,
    pub output_file_name: String,
    pub analysis: QualitySettings,
    pub transcription: TranscriptionConfig,
    pub backends: BackendConfig,
    pub merge: MergeOptions,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TranscriptionConfig {
    pub enabled: bool,
    pub language: String,
    pub binary: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub ffprobe: PathBuf,
    pub ffmpeg: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            min_probe_confidence: DEFAULT_MIN_CONFIDENCE,
            decode_video: true,
            speaker: None,
            jobs: 1,
            output_file_name: DEFAULT_OUTPUT_FILE.to_string(),
            analysis: QualitySettings::default(),
            transcription: TranscriptionConfig::default(),
            backends: BackendConfig::default(),
            merge: MergeOptions::default(),
        }
    }
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            language: "es".to_string(),
            binary: PathBuf::from("whisper"),
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            ffprobe: PathBuf::from("ffprobe"),
            ffmpeg: PathBuf::from("ffmpeg"),
        }
    }
}

impl PipelineConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            MediaError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(contents).map_err(|e| MediaError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let analysis = &self.analysis;
        if !(analysis.window_size_s > 0.0) || !(analysis.hop_size_s > 0.0) {
            return Err(MediaError::Config(
                "analysis window and hop sizes must be positive".into(),
            ));
        }
        if !(0.0..=100.0).contains(&analysis.snr_percentile) {
            return Err(MediaError::Config(format!(
                "snr_percentile {} is outside [0, 100]",
                analysis.snr_percentile
            )));
        }
        if analysis.zcr_frame_length == 0 || analysis.zcr_hop_length == 0 {
            return Err(MediaError::Config(
                "zero-crossing frame and hop lengths must be positive".into(),
            ));
        }
        if self.min_probe_confidence > 100 {
            return Err(MediaError::Config(format!(
                "min_probe_confidence {} is outside [0, 100]",
                self.min_probe_confidence
            )));
        }
        if self.speaker.as_deref().map_or(false, |s| s.trim().is_empty()) {
            return Err(MediaError::Config("speaker is empty".into()));
        }
        if self.output_file_name.trim().is_empty() {
            return Err(MediaError::Config("output_file_name is empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_file_gives_defaults() {
        let config = PipelineConfig::from_toml_str("").unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(config.analysis.snr_percentile, 95.0);
        assert_eq!(config.output_file_name, "metadata_all_videos.csv");
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let config = PipelineConfig::from_toml_str(
            r#"
            jobs = 4

            [analysis]
            snr_percentile = 90.0

            [transcription]
            language = "en"

            [backends]
            ffmpeg = "/opt/ffmpeg/bin/ffmpeg"
            "#,
        )
        .unwrap();

        assert_eq!(config.jobs, 4);
        assert_eq!(config.analysis.snr_percentile, 90.0);
        assert_eq!(config.analysis.window_size_s, 0.025);
        assert_eq!(config.transcription.language, "en");
        assert!(config.transcription.enabled);
        assert_eq!(config.backends.ffmpeg, PathBuf::from("/opt/ffmpeg/bin/ffmpeg"));
        assert_eq!(config.backends.ffprobe, PathBuf::from("ffprobe"));
    }

    #[test]
    fn rejects_out_of_range_values() {
        let err = PipelineConfig::from_toml_str("[analysis]\nsnr_percentile = 150.0").unwrap_err();
        assert!(matches!(err, MediaError::Config(_)));

        let err = PipelineConfig::from_toml_str("[analysis]\nhop_size_s = 0.0").unwrap_err();
        assert!(matches!(err, MediaError::Config(_)));
    }

    #[test]
    fn speaker_is_optional_but_not_blank() {
        assert_eq!(PipelineConfig::default().speaker, None);

        let config = PipelineConfig::from_toml_str("speaker = \"S01\"").unwrap();
        assert_eq!(config.speaker.as_deref(), Some("S01"));

        let err = PipelineConfig::from_toml_str("speaker = \"  \"").unwrap_err();
        assert!(matches!(err, MediaError::Config(_)));
    }

    #[test]
    fn rejects_malformed_toml() {
        assert!(PipelineConfig::from_toml_str("jobs = \"many\"").is_err());
    }
}
