use std::path::Path;
use std::sync::atomic::Ordering;
use log::Level;

use crate::audio::decoder::AudioDecoder;
use crate::audio::quality::{AudioQualityAnalyzer, QualityMetrics};
use crate::config::PipelineConfig;
use crate::media::file::MediaFile;
use crate::media::probe::{FfprobeBackend, MediaProbe, ProbeResult};
use crate::metadata::identity::{check_file_id, IdCheck};
use crate::metadata::record::{aggregate, MetadataRecord};
use crate::metadata::table::Table;
use crate::transcribe::{EngineCache, SpeechToText, TranscriptionResult};
use crate::utils::file_ops::{collect_input_files, FileManager};
use crate::utils::parallel::ParallelProcessor;
use crate::utils::reporting::{log_step, Reporter};
use crate::video::decoder::VideoDecoder;
use crate::Result;

/// Drives every file of a directory through probe, classification, decoding,
/// quality analysis and transcription, and collects one row per file.
///
/// Failures stay local to the file they happen in: the step is logged and
/// skipped, and the row is built from whatever the other steps produced.
pub struct BatchDriver {
    config: PipelineConfig,
    prober: Box<dyn MediaProbe>,
    audio_decoder: AudioDecoder,
    video_decoder: VideoDecoder,
    analyzer: AudioQualityAnalyzer,
    engines: EngineCache,
}

impl ParallelProcessor for BatchDriver {}

impl BatchDriver {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            prober: Box::new(FfprobeBackend::new(&config.backends.ffprobe)),
            audio_decoder: AudioDecoder::new(&config.backends.ffmpeg),
            video_decoder: VideoDecoder::new(&config.backends.ffmpeg),
            analyzer: AudioQualityAnalyzer::new(config.analysis.clone()),
            engines: EngineCache::whisper(&config.transcription.binary),
            config,
        }
    }

    pub fn with_prober(mut self, prober: impl MediaProbe + 'static) -> Self {
        self.prober = Box::new(prober);
        self
    }

    pub fn with_engines(mut self, engines: EngineCache) -> Self {
        self.engines = engines;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Process every regular file directly inside `input_dir` and write the
    /// resulting table to `output_dir`.
    pub fn run(&mut self, input_dir: impl AsRef<Path>, output_dir: impl AsRef<Path>) -> Result<Table> {
        let input_dir = input_dir.as_ref();
        let output_dir = output_dir.as_ref();

        println!("Scanning directory: {}", input_dir.display());
        let files = collect_input_files(input_dir)?;
        println!("Found {} files", files.len());

        let manager = FileManager::new(output_dir);
        manager.ensure_output_dir()?;

        let engine = if self.config.transcription.enabled {
            Some(self.engines.resolve(&self.config.transcription.language))
        } else {
            None
        };

        let progress = Self::get_progress_counter();
        let total_files = files.len();
        let this = &*self;

        let records = Self::process_in_order(&files, this.config.jobs, |path| {
            let record = this.process_file(path, output_dir, engine.as_deref());

            let processed = progress.fetch_add(1, Ordering::SeqCst) + 1;
            if processed % 10 == 0 || processed == total_files {
                println!(
                    "Progress: {}/{} files ({:.1}%)",
                    processed,
                    total_files,
                    (processed as f64 / total_files as f64) * 100.0
                );
            }

            record
        })?;

        let table = Table::from_records(records);

        let reporter = Reporter::new();
        let output_path = manager.output_path(&self.config.output_file_name);
        reporter.write_table(&table, &output_path)?;
        reporter.summarize(&table);

        Ok(table)
    }

    /// Build the record of a single file. Never fails: every step that cannot
    /// complete is logged and left out of the record.
    pub fn process_file(
        &self,
        path: &Path,
        destination: &Path,
        transcriber: Option<&dyn SpeechToText>,
    ) -> MetadataRecord {
        let media = MediaFile::open(
            path,
            destination,
            self.prober.as_ref(),
            self.config.min_probe_confidence,
        );
        self.log_probe(&media);

        if let IdCheck::NeedsCorrection { reason } = check_file_id(&media.file_id()) {
            log_step(Level::Warn, "Identity", "CheckFileId", path, reason);
        }

        let quality = if media.is_audio() {
            self.analyze_audio(&media)
        } else {
            None
        };

        if media.is_video() && self.config.decode_video {
            self.decode_video(&media);
        }

        let transcription = match transcriber {
            Some(engine) if media.is_audio() => self.transcribe(&media, engine),
            _ => None,
        };

        let mut record = aggregate(
            media.path(),
            media.probe(),
            quality.as_ref(),
            transcription.as_ref(),
        );
        if let Some(speaker) = &self.config.speaker {
            record.set_speaker(speaker.clone());
        }
        log_step(
            Level::Info,
            "Batch Driver",
            "GetMetadata",
            path,
            format!("record with {} fields", record.len()),
        );
        record
    }

    fn log_probe(&self, media: &MediaFile) {
        let min_confidence = self.config.min_probe_confidence;
        match media.probe() {
            ProbeResult::ProbeFailed { reason } => {
                log_step(Level::Error, "Probe", "ProbeFile", media.path(), reason);
            }
            ProbeResult::Probed(report) if report.probe_confidence <= min_confidence => {
                log_step(
                    Level::Warn,
                    "Probe",
                    "ProbeFile",
                    media.path(),
                    format!(
                        "probe confidence {}% is at or below {}%, review the file",
                        report.probe_confidence, min_confidence
                    ),
                );
            }
            ProbeResult::Probed(report) => {
                log_step(
                    Level::Info,
                    "Probe",
                    "ProbeFile",
                    media.path(),
                    format!(
                        "probed with confidence {}%, classified as {}",
                        report.probe_confidence,
                        media.modality()
                    ),
                );
            }
        }
    }

    fn analyze_audio(&self, media: &MediaFile) -> Option<QualityMetrics> {
        let report = media.probe().report();
        let stream = report.and_then(|r| r.audio_stream());
        let ordinal = report.and_then(|r| r.audio_stream_ordinal());
        match self.audio_decoder.decode(media.path(), stream, ordinal) {
            Ok(audio) => {
                let metrics = self.analyzer.analyze_decoded(&audio);
                log_step(
                    Level::Info,
                    "Audio Quality",
                    "CalculateAudioQuality",
                    media.path(),
                    format!(
                        "{:.2}s at {} Hz, snr_db={:?}, zcr_avg={:?}",
                        audio.duration_secs(),
                        audio.sample_rate(),
                        metrics.snr_db,
                        metrics.zcr_avg
                    ),
                );
                Some(metrics)
            }
            Err(e) => {
                log_step(Level::Error, "Signal Decoder", "DecodeAudio", media.path(), e);
                None
            }
        }
    }

    fn decode_video(&self, media: &MediaFile) {
        let report = media.probe().report();
        let ordinal = report.and_then(|r| r.video_stream_ordinal());
        let dimensions = report
            .and_then(|r| r.video_stream())
            .and_then(|v| Some((v.width?, v.height?)));

        let Some((width, height)) = dimensions else {
            log_step(
                Level::Error,
                "Signal Decoder",
                "DecodeVideo",
                media.path(),
                "video stream has no dimensions",
            );
            return;
        };

        let decoded = self
            .video_decoder
            .for_each_frame(media.path(), ordinal, width, height, |_| {});
        match decoded {
            Ok(frame_count) => log_step(
                Level::Info,
                "Signal Decoder",
                "DecodeVideo",
                media.path(),
                format!("{} frames of {}x{}", frame_count, width, height),
            ),
            Err(e) => log_step(Level::Error, "Signal Decoder", "DecodeVideo", media.path(), e),
        }
    }

    fn transcribe(&self, media: &MediaFile, engine: &dyn SpeechToText) -> Option<TranscriptionResult> {
        match engine.transcribe(media.path(), &self.config.transcription.language) {
            Ok(result) => {
                log_step(
                    Level::Info,
                    "Transcriber",
                    "Transcribe",
                    media.path(),
                    format!("transcription successful ({})", result.language),
                );
                Some(result)
            }
            Err(e) => {
                log_step(Level::Error, "Transcriber", "Transcribe", media.path(), e);
                None
            }
        }
    }
}
