use std::fmt::Display;
use std::path::Path;
use crate::metadata::record::MetadataRecord;
use crate::metadata::table::Table;
use crate::Result;

/// One audit line per pipeline step: module, action, file and outcome.
pub fn log_step(level: log::Level, module: &str, action: &str, path: &Path, message: impl Display) {
    log::log!(level, "{} - {} - {} - {}", module, action, path.display(), message);
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub files: usize,
    pub probed: usize,
    pub with_audio: usize,
    pub with_video: usize,
    pub with_quality: usize,
    pub transcribed: usize,
}

pub struct Reporter;

impl Reporter {
    pub fn new() -> Self {
        Self
    }

    pub fn write_table(&self, table: &Table, output_path: impl AsRef<Path>) -> Result<()> {
        let output_path_ref = output_path.as_ref();
        table.write_csv(output_path_ref)?;
        log::info!(
            "Metadata table with {} rows and {} columns written to {}",
            table.len(),
            table.columns().len(),
            output_path_ref.display()
        );
        Ok(())
    }

    pub fn summarize(&self, table: &Table) -> BatchSummary {
        let has = |row: &MetadataRecord, key: &str| row.get(key).map_or(false, |v| !v.is_null());

        let mut summary = BatchSummary {
            files: table.len(),
            ..Default::default()
        };
        for row in table.rows() {
            summary.probed += has(row, "probe_confidence") as usize;
            summary.with_audio += has(row, "audio-codec_name") as usize;
            summary.with_video += has(row, "video-codec_name") as usize;
            summary.with_quality += (has(row, "audio-snr_db") || has(row, "audio-zcr_avg")) as usize;
            summary.transcribed += has(row, "transcription") as usize;
        }

        println!("\nMetadata Extraction Summary:");
        println!("Total files: {}", summary.files);
        println!("Probed successfully: {}", summary.probed);
        println!("With audio stream: {}", summary.with_audio);
        println!("With video stream: {}", summary.with_video);
        println!("With quality metrics: {}", summary.with_quality);
        println!("Transcribed: {}", summary.transcribed);

        summary
    }
}

impl Default for Reporter {
    fn default() -> Self {
        Self::new()
    }
}
