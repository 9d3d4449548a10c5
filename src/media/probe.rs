//! Container probing through `ffprobe`.
//!
//! The backend's JSON report is reduced to a [`ProbeReport`]. Anything that
//! prevents a report from being produced (missing binary, non-zero exit,
//! malformed output) becomes [`ProbeResult::ProbeFailed`] rather than an error,
//! so callers can always continue with the identity of the file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde::Deserialize;

use crate::{MediaError, Result};

/// Confidence at or below which a probe is considered unreliable.
pub const DEFAULT_MIN_CONFIDENCE: u32 = 80;

#[derive(Debug, Clone, PartialEq)]
pub enum ProbeResult {
    Probed(ProbeReport),
    ProbeFailed { reason: String },
}

impl ProbeResult {
    pub fn report(&self) -> Option<&ProbeReport> {
        match self {
            ProbeResult::Probed(report) => Some(report),
            ProbeResult::ProbeFailed { .. } => None,
        }
    }

    /// `true` for failed probes as well as for reports whose confidence does
    /// not exceed `min_confidence`.
    pub fn is_low_confidence(&self, min_confidence: u32) -> bool {
        self.report()
            .map_or(true, |r| r.probe_confidence <= min_confidence)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProbeReport {
    pub file_path: Option<String>,
    pub container_format: String,
    pub container_long_name: Option<String>,
    pub size_bytes: Option<u64>,
    pub probe_confidence: u32,
    pub duration_s: Option<f64>,
    pub bit_rate: Option<u64>,
    pub creation_time: Option<String>,
    pub streams: Vec<StreamDescriptor>,
    pub tags: BTreeMap<String, String>,
}

impl ProbeReport {
    /// The audio stream used for metadata and decoding. When a container holds
    /// several audio streams the last one listed is returned.
    pub fn audio_stream(&self) -> Option<&AudioStream> {
        self.streams.iter().rev().find_map(|s| match s {
            StreamDescriptor::Audio(audio) => Some(audio),
            _ => None,
        })
    }

    /// Same "last one wins" rule as [`ProbeReport::audio_stream`].
    pub fn video_stream(&self) -> Option<&VideoStream> {
        self.streams.iter().rev().find_map(|s| match s {
            StreamDescriptor::Video(video) => Some(video),
            _ => None,
        })
    }

    /// Position of [`ProbeReport::audio_stream`] among the audio streams, as
    /// addressed by `ffmpeg -map 0:a:<n>`.
    pub fn audio_stream_ordinal(&self) -> Option<usize> {
        self.streams
            .iter()
            .filter(|s| matches!(s, StreamDescriptor::Audio(_)))
            .count()
            .checked_sub(1)
    }

    /// Position of [`ProbeReport::video_stream`] among the video streams.
    pub fn video_stream_ordinal(&self) -> Option<usize> {
        self.streams
            .iter()
            .filter(|s| matches!(s, StreamDescriptor::Video(_)))
            .count()
            .checked_sub(1)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StreamDescriptor {
    Audio(AudioStream),
    Video(VideoStream),
    Other {
        codec_type: String,
        codec_name: Option<String>,
    },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AudioStream {
    pub codec_name: Option<String>,
    pub codec_long_name: Option<String>,
    pub sample_rate: Option<u32>,
    pub channels: Option<u16>,
    pub bits_per_sample: Option<u32>,
    pub initial_padding: Option<i64>,
    pub duration_s: Option<f64>,
    pub bit_rate: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VideoStream {
    pub codec_name: Option<String>,
    pub codec_long_name: Option<String>,
    pub codec_tag_string: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub pixel_format: Option<String>,
    pub color_range: Option<String>,
    pub color_space: Option<String>,
    pub color_transfer: Option<String>,
    pub color_primaries: Option<String>,
    pub chroma_location: Option<String>,
    pub field_order: Option<String>,
    pub nal_length_size: Option<i64>,
    pub avg_frame_rate: Option<String>,
    pub duration_s: Option<f64>,
    pub bit_rate: Option<u64>,
    pub bits_per_raw_sample: Option<u32>,
    pub frame_count: Option<u64>,
    pub extradata_size: Option<u64>,
}

pub trait MediaProbe: Send + Sync {
    fn name(&self) -> &'static str;

    fn probe(&self, path: &Path) -> ProbeResult;
}

pub struct FfprobeBackend {
    binary: PathBuf,
}

impl FfprobeBackend {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn run(&self, path: &Path) -> Result<ProbeReport> {
        let output = Command::new(&self.binary)
            .args(["-v", "quiet", "-print_format", "json", "-show_format", "-show_streams"])
            .arg(path)
            .output()
            .map_err(|e| {
                MediaError::Probe(format!("failed to run {}: {}", self.binary.display(), e))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(MediaError::Probe(format!(
                "{} exited with code {}: {}",
                self.binary.display(),
                output.status.code().unwrap_or(-1),
                stderr.trim()
            )));
        }

        parse_ffprobe_json(&output.stdout)
    }
}

impl Default for FfprobeBackend {
    fn default() -> Self {
        Self::new("ffprobe")
    }
}

impl MediaProbe for FfprobeBackend {
    fn name(&self) -> &'static str {
        "ffprobe"
    }

    fn probe(&self, path: &Path) -> ProbeResult {
        log::debug!("Probing file: {}", path.display());
        match self.run(path) {
            Ok(report) => ProbeResult::Probed(report),
            Err(e) => ProbeResult::ProbeFailed {
                reason: e.to_string(),
            },
        }
    }
}

/// Parse the output of `ffprobe -print_format json -show_format -show_streams`.
pub fn parse_ffprobe_json(bytes: &[u8]) -> Result<ProbeReport> {
    let raw: RawProbe = serde_json::from_slice(bytes)?;
    let format = raw
        .format
        .ok_or_else(|| MediaError::Probe("no format section in probe output".into()))?;

    let creation_time = format.tags.get("creation_time").cloned();
    let streams = raw.streams.into_iter().map(RawStream::into_descriptor).collect();

    Ok(ProbeReport {
        file_path: format.filename,
        container_format: format.format_name.unwrap_or_else(|| "unknown".to_string()),
        container_long_name: format.format_long_name,
        size_bytes: format.size.as_ref().and_then(Loose::as_u64),
        probe_confidence: format
            .probe_score
            .as_ref()
            .and_then(Loose::as_u64)
            .map_or(0, |score| score.min(100) as u32),
        duration_s: format.duration.as_ref().and_then(Loose::as_f64),
        bit_rate: format.bit_rate.as_ref().and_then(Loose::as_u64),
        creation_time,
        streams,
        tags: format.tags,
    })
}

#[derive(Debug, Deserialize)]
struct RawProbe {
    format: Option<RawFormat>,
    #[serde(default)]
    streams: Vec<RawStream>,
}

#[derive(Debug, Deserialize)]
struct RawFormat {
    filename: Option<String>,
    format_name: Option<String>,
    format_long_name: Option<String>,
    size: Option<Loose>,
    duration: Option<Loose>,
    bit_rate: Option<Loose>,
    probe_score: Option<Loose>,
    #[serde(default)]
    tags: BTreeMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    codec_long_name: Option<String>,
    codec_tag_string: Option<String>,
    sample_rate: Option<Loose>,
    channels: Option<Loose>,
    bits_per_sample: Option<Loose>,
    initial_padding: Option<Loose>,
    width: Option<Loose>,
    height: Option<Loose>,
    pix_fmt: Option<String>,
    color_range: Option<String>,
    color_space: Option<String>,
    color_transfer: Option<String>,
    color_primaries: Option<String>,
    chroma_location: Option<String>,
    field_order: Option<String>,
    nal_length_size: Option<Loose>,
    avg_frame_rate: Option<String>,
    duration: Option<Loose>,
    bit_rate: Option<Loose>,
    bits_per_raw_sample: Option<Loose>,
    nb_frames: Option<Loose>,
    extradata_size: Option<Loose>,
}

impl RawStream {
    fn into_descriptor(self) -> StreamDescriptor {
        let u32_of = |v: &Option<Loose>| v.as_ref().and_then(Loose::as_u64).map(|n| n as u32);
        let u64_of = |v: &Option<Loose>| v.as_ref().and_then(Loose::as_u64);
        let i64_of = |v: &Option<Loose>| v.as_ref().and_then(Loose::as_i64);
        let f64_of = |v: &Option<Loose>| v.as_ref().and_then(Loose::as_f64);

        match self.codec_type.as_deref() {
            Some("audio") => StreamDescriptor::Audio(AudioStream {
                sample_rate: u32_of(&self.sample_rate),
                channels: u64_of(&self.channels).map(|n| n as u16),
                bits_per_sample: u32_of(&self.bits_per_sample),
                initial_padding: i64_of(&self.initial_padding),
                duration_s: f64_of(&self.duration),
                bit_rate: u64_of(&self.bit_rate),
                codec_name: self.codec_name,
                codec_long_name: self.codec_long_name,
            }),
            Some("video") => StreamDescriptor::Video(VideoStream {
                width: u32_of(&self.width),
                height: u32_of(&self.height),
                nal_length_size: i64_of(&self.nal_length_size),
                duration_s: f64_of(&self.duration),
                bit_rate: u64_of(&self.bit_rate),
                bits_per_raw_sample: u32_of(&self.bits_per_raw_sample),
                frame_count: u64_of(&self.nb_frames),
                extradata_size: u64_of(&self.extradata_size),
                codec_name: self.codec_name,
                codec_long_name: self.codec_long_name,
                codec_tag_string: self.codec_tag_string,
                pixel_format: self.pix_fmt,
                color_range: self.color_range,
                color_space: self.color_space,
                color_transfer: self.color_transfer,
                color_primaries: self.color_primaries,
                chroma_location: self.chroma_location,
                field_order: self.field_order,
                avg_frame_rate: self.avg_frame_rate,
            }),
            other => StreamDescriptor::Other {
                codec_type: other.unwrap_or("unknown").to_string(),
                codec_name: self.codec_name,
            },
        }
    }
}

/// ffprobe prints most numbers as strings ("44100", "12.480000") and a few as
/// JSON numbers; accept both.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Loose {
    Int(i64),
    Float(f64),
    Text(String),
}

impl Loose {
    fn as_f64(&self) -> Option<f64> {
        match self {
            Loose::Int(n) => Some(*n as f64),
            Loose::Float(f) => Some(*f),
            Loose::Text(s) => s.trim().parse().ok(),
        }
    }

    fn as_i64(&self) -> Option<i64> {
        if let Loose::Int(n) = self {
            return Some(*n);
        }
        if let Loose::Text(s) = self {
            if let Ok(n) = s.trim().parse::<i64>() {
                return Some(n);
            }
        }
        self.as_f64()
            .filter(|f| f.is_finite() && f.fract() == 0.0)
            .map(|f| f as i64)
    }

    fn as_u64(&self) -> Option<u64> {
        self.as_i64().and_then(|n| u64::try_from(n).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MP4_REPORT: &str = r#"{
        "streams": [
            {
                "index": 0,
                "codec_name": "h264",
                "codec_long_name": "H.264 / AVC / MPEG-4 AVC / MPEG-4 part 10",
                "codec_type": "video",
                "codec_tag_string": "avc1",
                "width": 640,
                "height": 360,
                "pix_fmt": "yuv420p",
                "color_space": "bt709",
                "nal_length_size": "4",
                "avg_frame_rate": "25/1",
                "duration": "2.000000",
                "bit_rate": "350000",
                "bits_per_raw_sample": "8",
                "nb_frames": "50",
                "extradata_size": 46
            },
            {
                "index": 1,
                "codec_name": "aac",
                "codec_type": "audio",
                "sample_rate": "44100",
                "channels": 2,
                "bits_per_sample": 0,
                "initial_padding": 0,
                "duration": "2.020000",
                "bit_rate": "128000"
            },
            {
                "index": 2,
                "codec_type": "data",
                "codec_name": "bin_data"
            }
        ],
        "format": {
            "filename": "/data/raw/P1_interview.mp4",
            "format_name": "mov,mp4,m4a,3gp,3g2,mj2",
            "size": "104857",
            "duration": "2.020000",
            "bit_rate": "415000",
            "probe_score": 100,
            "tags": { "creation_time": "2024-03-01T10:00:00.000000Z" }
        }
    }"#;

    #[test]
    fn parses_container_and_streams() {
        let report = parse_ffprobe_json(MP4_REPORT.as_bytes()).unwrap();

        assert_eq!(report.container_format, "mov,mp4,m4a,3gp,3g2,mj2");
        assert_eq!(report.size_bytes, Some(104_857));
        assert_eq!(report.probe_confidence, 100);
        assert_eq!(report.creation_time.as_deref(), Some("2024-03-01T10:00:00.000000Z"));
        assert_eq!(report.streams.len(), 3);

        let video = report.video_stream().unwrap();
        assert_eq!(video.width, Some(640));
        assert_eq!(video.height, Some(360));
        assert_eq!(video.nal_length_size, Some(4));
        assert_eq!(video.frame_count, Some(50));

        let audio = report.audio_stream().unwrap();
        assert_eq!(audio.sample_rate, Some(44_100));
        assert_eq!(audio.channels, Some(2));
        assert_eq!(audio.duration_s, Some(2.02));

        assert!(matches!(
            &report.streams[2],
            StreamDescriptor::Other { codec_type, .. } if codec_type == "data"
        ));
    }

    #[test]
    fn last_stream_of_a_type_wins() {
        let json = r#"{
            "streams": [
                { "codec_type": "audio", "codec_name": "aac", "sample_rate": "48000" },
                { "codec_type": "audio", "codec_name": "opus", "sample_rate": "16000" }
            ],
            "format": { "format_name": "matroska,webm", "probe_score": 100 }
        }"#;

        let report = parse_ffprobe_json(json.as_bytes()).unwrap();
        let audio = report.audio_stream().unwrap();
        assert_eq!(audio.codec_name.as_deref(), Some("opus"));
        assert_eq!(audio.sample_rate, Some(16_000));
    }

    #[test]
    fn ordinals_point_at_the_selected_streams() {
        let report = ProbeReport {
            streams: vec![
                StreamDescriptor::Video(VideoStream {
                    width: Some(1920),
                    height: Some(1080),
                    ..Default::default()
                }),
                StreamDescriptor::Audio(AudioStream::default()),
                StreamDescriptor::Video(VideoStream {
                    width: Some(320),
                    height: Some(240),
                    ..Default::default()
                }),
            ],
            ..Default::default()
        };

        assert_eq!(report.video_stream_ordinal(), Some(1));
        assert_eq!(report.video_stream().and_then(|v| v.width), Some(320));
        assert_eq!(report.audio_stream_ordinal(), Some(0));
        assert_eq!(ProbeReport::default().audio_stream_ordinal(), None);
    }

    #[test]
    fn missing_format_section_is_an_error() {
        let err = parse_ffprobe_json(br#"{ "streams": [] }"#).unwrap_err();
        assert!(matches!(err, MediaError::Probe(_)));
    }

    #[test]
    fn malformed_output_is_an_error() {
        assert!(parse_ffprobe_json(b"not json").is_err());
    }

    #[test]
    fn low_confidence_covers_failures_and_threshold() {
        let failed = ProbeResult::ProbeFailed {
            reason: "boom".into(),
        };
        assert!(failed.is_low_confidence(DEFAULT_MIN_CONFIDENCE));

        let at_threshold = ProbeResult::Probed(ProbeReport {
            probe_confidence: 80,
            ..Default::default()
        });
        assert!(at_threshold.is_low_confidence(DEFAULT_MIN_CONFIDENCE));

        let confident = ProbeResult::Probed(ProbeReport {
            probe_confidence: 81,
            ..Default::default()
        });
        assert!(!confident.is_low_confidence(DEFAULT_MIN_CONFIDENCE));
    }

    #[test]
    fn missing_binary_yields_probe_failed() {
        let backend = FfprobeBackend::new("/nonexistent/ffprobe-binary");
        let result = backend.probe(Path::new("whatever.wav"));
        assert!(matches!(result, ProbeResult::ProbeFailed { .. }));
    }

    fn ffprobe_available() -> bool {
        Command::new("ffprobe").arg("-version").output().is_ok()
    }

    #[test]
    fn ffprobe_reports_wav_stream() {
        if !ffprobe_available() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("P1_tone.wav");
        let samples = 8_000u32;
        let mut wav = Vec::new();
        wav.extend_from_slice(b"RIFF");
        wav.extend_from_slice(&(36 + samples * 2).to_le_bytes());
        wav.extend_from_slice(b"WAVEfmt ");
        wav.extend_from_slice(&16u32.to_le_bytes());
        wav.extend_from_slice(&1u16.to_le_bytes());
        wav.extend_from_slice(&1u16.to_le_bytes());
        wav.extend_from_slice(&8_000u32.to_le_bytes());
        wav.extend_from_slice(&16_000u32.to_le_bytes());
        wav.extend_from_slice(&2u16.to_le_bytes());
        wav.extend_from_slice(&16u16.to_le_bytes());
        wav.extend_from_slice(b"data");
        wav.extend_from_slice(&(samples * 2).to_le_bytes());
        wav.resize(wav.len() + (samples * 2) as usize, 0);
        std::fs::write(&path, wav).unwrap();

        let result = FfprobeBackend::default().probe(&path);
        let report = result.report().expect("wav should probe");
        assert_eq!(report.container_format, "wav");
        assert!(!result.is_low_confidence(DEFAULT_MIN_CONFIDENCE));

        let audio = report.audio_stream().unwrap();
        assert_eq!(audio.sample_rate, Some(8_000));
        assert_eq!(audio.channels, Some(1));
    }

    #[test]
    fn ffprobe_text_file_is_low_confidence() {
        if !ffprobe_available() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c.dummy");
        std::fs::write(&path, b"not media at all").unwrap();

        let result = FfprobeBackend::default().probe(&path);
        assert!(result.is_low_confidence(DEFAULT_MIN_CONFIDENCE));
    }
}
