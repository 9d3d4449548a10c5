use std::path::{Path, PathBuf};

use crate::media::classify::{classify, is_multimedia, Modality};
use crate::media::probe::{MediaProbe, ProbeResult};
use crate::metadata::identity::{file_id_of, participant_id};

/// One input file. The probe runs once, when the file is opened, and its
/// result is kept for everything that follows.
#[derive(Debug, Clone)]
pub struct MediaFile {
    path: PathBuf,
    destination: PathBuf,
    probe: ProbeResult,
    modality: Modality,
    multimedia: bool,
}

impl MediaFile {
    pub fn open(
        path: impl Into<PathBuf>,
        destination: impl Into<PathBuf>,
        prober: &dyn MediaProbe,
        min_confidence: u32,
    ) -> Self {
        let path = path.into();
        let probe = prober.probe(&path);
        Self::from_probe(path, destination, probe, min_confidence)
    }

    pub fn from_probe(
        path: impl Into<PathBuf>,
        destination: impl Into<PathBuf>,
        probe: ProbeResult,
        min_confidence: u32,
    ) -> Self {
        let modality = classify(&probe, min_confidence);
        let multimedia = is_multimedia(&probe, min_confidence);
        Self {
            path: path.into(),
            destination: destination.into(),
            probe,
            modality,
            multimedia,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    pub fn probe(&self) -> &ProbeResult {
        &self.probe
    }

    pub fn modality(&self) -> Modality {
        self.modality
    }

    pub fn file_id(&self) -> String {
        file_id_of(&self.path)
    }

    pub fn id(&self) -> String {
        participant_id(&self.file_id())
    }

    pub fn is_multimedia(&self) -> bool {
        self.multimedia
    }

    pub fn is_audio(&self) -> bool {
        self.modality.has_audio()
    }

    pub fn is_video(&self) -> bool {
        self.modality.has_video()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::probe::{AudioStream, ProbeReport, StreamDescriptor, VideoStream};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingProbe {
        calls: AtomicUsize,
        result: ProbeResult,
    }

    impl MediaProbe for CountingProbe {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn probe(&self, _path: &Path) -> ProbeResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result.clone()
        }
    }

    fn probed(confidence: u32, streams: Vec<StreamDescriptor>) -> ProbeResult {
        ProbeResult::Probed(ProbeReport {
            container_format: "mov,mp4".into(),
            probe_confidence: confidence,
            streams,
            ..Default::default()
        })
    }

    #[test]
    fn probe_runs_once_per_file() {
        let prober = CountingProbe {
            calls: AtomicUsize::new(0),
            result: probed(100, vec![StreamDescriptor::Video(VideoStream::default())]),
        };
        let file = MediaFile::open("/raw/b.mp4", "/processed", &prober, 80);

        assert!(file.is_multimedia());
        assert!(file.is_video());
        assert!(!file.is_audio());
        assert_eq!(prober.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn predicates_follow_classification() {
        let audio = MediaFile::from_probe(
            "/raw/a.wav",
            "/processed",
            probed(100, vec![StreamDescriptor::Audio(AudioStream::default())]),
            80,
        );
        assert!(audio.is_multimedia() && audio.is_audio() && !audio.is_video());

        let both = MediaFile::from_probe(
            "/raw/P3_clip.mp4",
            "/processed",
            probed(
                100,
                vec![
                    StreamDescriptor::Video(VideoStream::default()),
                    StreamDescriptor::Audio(AudioStream::default()),
                ],
            ),
            80,
        );
        assert!(both.is_audio() && both.is_video());
        assert_eq!(both.id(), "P3");

        let low = MediaFile::from_probe(
            "/raw/x.bin",
            "/processed",
            probed(50, vec![StreamDescriptor::Audio(AudioStream::default())]),
            80,
        );
        assert!(!low.is_multimedia() && !low.is_audio() && !low.is_video());
    }

    #[test]
    fn subtitle_only_file_is_multimedia_without_audio_or_video() {
        let subtitles = MediaFile::from_probe(
            "/raw/P2_captions.mkv",
            "/processed",
            probed(
                100,
                vec![StreamDescriptor::Other {
                    codec_type: "subtitle".into(),
                    codec_name: Some("subrip".into()),
                }],
            ),
            80,
        );
        assert!(subtitles.is_multimedia());
        assert!(!subtitles.is_audio());
        assert!(!subtitles.is_video());
        assert_eq!(subtitles.modality(), Modality::NotMedia);
    }

    #[test]
    fn identity_survives_failed_probe() {
        let dummy = MediaFile::from_probe(
            "/raw/c.dummy",
            "/processed",
            ProbeResult::ProbeFailed {
                reason: "Invalid data".into(),
            },
            80,
        );
        assert!(!dummy.is_multimedia());
        assert_eq!(dummy.file_id(), "c");
        assert_eq!(dummy.destination(), Path::new("/processed"));
    }
}
