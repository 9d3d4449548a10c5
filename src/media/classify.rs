use std::fmt;

use crate::media::probe::{ProbeResult, StreamDescriptor};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Modality {
    NotMedia,
    AudioOnly,
    VideoOnly,
    AudioAndVideo,
}

impl Modality {
    fn from_capabilities(audio: bool, video: bool) -> Self {
        match (audio, video) {
            (true, true) => Modality::AudioAndVideo,
            (true, false) => Modality::AudioOnly,
            (false, true) => Modality::VideoOnly,
            (false, false) => Modality::NotMedia,
        }
    }

    pub fn has_audio(self) -> bool {
        matches!(self, Modality::AudioOnly | Modality::AudioAndVideo)
    }

    pub fn has_video(self) -> bool {
        matches!(self, Modality::VideoOnly | Modality::AudioAndVideo)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Modality::NotMedia => "not_media",
            Modality::AudioOnly => "audio",
            Modality::VideoOnly => "video",
            Modality::AudioAndVideo => "audio_video",
        }
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Decide what a probed file carries.
///
/// Failed probes and probes whose confidence does not exceed `min_confidence`
/// are `NotMedia`, as are confident probes that list no audio or video stream.
/// Audio and video capabilities are independent: a file listing both stream
/// types is `AudioAndVideo`.
pub fn classify(probe: &ProbeResult, min_confidence: u32) -> Modality {
    let Some(report) = probe.report() else {
        return Modality::NotMedia;
    };
    if report.probe_confidence <= min_confidence {
        return Modality::NotMedia;
    }

    let mut audio = false;
    let mut video = false;
    for stream in &report.streams {
        match stream {
            StreamDescriptor::Audio(_) => audio = true,
            StreamDescriptor::Video(_) => video = true,
            StreamDescriptor::Other { .. } => {}
        }
    }

    Modality::from_capabilities(audio, video)
}

/// A file counts as multimedia once the probe is confident and lists at least
/// one stream of any type, including subtitle and data streams.
pub fn is_multimedia(probe: &ProbeResult, min_confidence: u32) -> bool {
    probe
        .report()
        .map_or(false, |r| r.probe_confidence > min_confidence && !r.streams.is_empty())
}
