use std::fmt;
use std::path::Path;

use crate::audio::quality::QualityMetrics;
use crate::media::probe::{AudioStream, ProbeResult, VideoStream};
use crate::metadata::identity::{file_id_of, participant_id};
use crate::metadata::table::Table;
use crate::transcribe::TranscriptionResult;

pub const AUDIO_PREFIX: &str = "audio-";
pub const VIDEO_PREFIX: &str = "video-";

#[derive(Debug, Clone, PartialEq)]
pub enum MetadataValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Null,
}

impl MetadataValue {
    pub fn is_null(&self) -> bool {
        matches!(self, MetadataValue::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetadataValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric view; text cells read back from CSV are parsed.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetadataValue::Integer(n) => Some(*n as f64),
            MetadataValue::Float(f) => Some(*f),
            MetadataValue::Text(s) => s.trim().parse().ok(),
            MetadataValue::Null => None,
        }
    }
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataValue::Text(s) => write!(f, "{}", s),
            MetadataValue::Integer(n) => write!(f, "{}", n),
            MetadataValue::Float(v) if v.is_finite() => write!(f, "{}", v),
            MetadataValue::Float(_) | MetadataValue::Null => Ok(()),
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        MetadataValue::Text(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        MetadataValue::Text(value)
    }
}

impl From<i64> for MetadataValue {
    fn from(value: i64) -> Self {
        MetadataValue::Integer(value)
    }
}

impl From<u64> for MetadataValue {
    fn from(value: u64) -> Self {
        i64::try_from(value).map_or(MetadataValue::Float(value as f64), MetadataValue::Integer)
    }
}

impl From<u32> for MetadataValue {
    fn from(value: u32) -> Self {
        MetadataValue::Integer(value.into())
    }
}

impl From<u16> for MetadataValue {
    fn from(value: u16) -> Self {
        MetadataValue::Integer(value.into())
    }
}

impl From<f64> for MetadataValue {
    fn from(value: f64) -> Self {
        MetadataValue::Float(value)
    }
}

impl<T: Into<MetadataValue>> From<Option<T>> for MetadataValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(MetadataValue::Null, Into::into)
    }
}

/// Flat key/value summary of one media file. Keys keep their insertion order,
/// which becomes the column order of the exported table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataRecord {
    fields: Vec<(String, MetadataValue)>,
}

impl MetadataRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite in place.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<MetadataValue>) {
        let key = key.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&MetadataValue> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MetadataValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn file_id(&self) -> Option<&str> {
        self.get("file_id").and_then(MetadataValue::as_str)
    }

    pub fn id(&self) -> Option<&str> {
        self.get("id").and_then(MetadataValue::as_str)
    }

    pub fn set_speaker(&mut self, speaker: impl Into<String>) {
        self.set("speaker_id", speaker.into());
    }

    pub fn as_row(&self) -> Table {
        let mut table = Table::new();
        table.push(self.clone());
        table
    }

    fn set_prefixed(&mut self, prefix: &str, key: &str, value: impl Into<MetadataValue>) {
        self.set(format!("{}{}", prefix, key), value);
    }

    fn extend_audio(&mut self, stream: &AudioStream) {
        let p = AUDIO_PREFIX;
        self.set_prefixed(p, "codec_name", stream.codec_name.clone());
        self.set_prefixed(p, "codec_long_name", stream.codec_long_name.clone());
        self.set_prefixed(p, "sample_rate", stream.sample_rate);
        self.set_prefixed(p, "channels", stream.channels);
        self.set_prefixed(p, "bits_per_sample", stream.bits_per_sample);
        self.set_prefixed(p, "initial_padding", stream.initial_padding);
        self.set_prefixed(p, "duration_s", stream.duration_s);
        self.set_prefixed(p, "bit_rate", stream.bit_rate);
    }

    fn extend_video(&mut self, stream: &VideoStream) {
        let p = VIDEO_PREFIX;
        self.set_prefixed(p, "codec_name", stream.codec_name.clone());
        self.set_prefixed(p, "codec_long_name", stream.codec_long_name.clone());
        self.set_prefixed(p, "codec_tag_string", stream.codec_tag_string.clone());
        self.set_prefixed(p, "width", stream.width);
        self.set_prefixed(p, "height", stream.height);
        self.set_prefixed(p, "pixel_format", stream.pixel_format.clone());
        self.set_prefixed(p, "color_range", stream.color_range.clone());
        self.set_prefixed(p, "color_space", stream.color_space.clone());
        self.set_prefixed(p, "color_transfer", stream.color_transfer.clone());
        self.set_prefixed(p, "color_primaries", stream.color_primaries.clone());
        self.set_prefixed(p, "chroma_location", stream.chroma_location.clone());
        self.set_prefixed(p, "field_order", stream.field_order.clone());
        self.set_prefixed(p, "nal_length_size", stream.nal_length_size);
        self.set_prefixed(p, "avg_frame_rate", stream.avg_frame_rate.clone());
        self.set_prefixed(p, "duration_s", stream.duration_s);
        self.set_prefixed(p, "bit_rate", stream.bit_rate);
        self.set_prefixed(p, "bits_per_raw_sample", stream.bits_per_raw_sample);
        self.set_prefixed(p, "frame_count", stream.frame_count);
        self.set_prefixed(p, "extradata_size", stream.extradata_size);
    }

    fn extend_quality(&mut self, quality: &QualityMetrics) {
        let p = AUDIO_PREFIX;
        self.set_prefixed(p, "snr_db", quality.snr_db);
        self.set_prefixed(p, "zcr_max", quality.zcr_max);
        self.set_prefixed(p, "zcr_min", quality.zcr_min);
        self.set_prefixed(p, "zcr_avg", quality.zcr_avg);
    }
}

/// Combine the independent results of each step into one record.
///
/// Identity fields come first and are always present. Container and stream
/// fields follow only when the probe succeeded; quality and transcription
/// fields only when those steps produced a result.
pub fn aggregate(
    source: &Path,
    probe: &ProbeResult,
    quality: Option<&QualityMetrics>,
    transcription: Option<&TranscriptionResult>,
) -> MetadataRecord {
    let mut record = MetadataRecord::new();

    let file_id = file_id_of(source);
    let id = participant_id(&file_id);
    record.set("file_id", file_id);
    record.set("id", id);

    if let Some(report) = probe.report() {
        record.set(
            "file_path",
            report
                .file_path
                .clone()
                .unwrap_or_else(|| source.display().to_string()),
        );
        record.set("date_created", report.creation_time.clone());
        record.set("format_name", report.container_format.clone());
        record.set("size_bytes", report.size_bytes);
        record.set("probe_confidence", report.probe_confidence);

        if let Some(audio) = report.audio_stream() {
            record.extend_audio(audio);
        }
        if let Some(video) = report.video_stream() {
            record.extend_video(video);
        }
    }

    if let Some(quality) = quality {
        record.extend_quality(quality);
    }

    if let Some(transcription) = transcription {
        record.set("transcription", transcription.text.clone());
        record.set("transcription_language", transcription.language.clone());
    }

    record
}
