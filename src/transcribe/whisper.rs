use std::path::{Path, PathBuf};
use std::process::Command;

use serde::Deserialize;

use super::{model_for_language, SpeechToText, TranscriptionError, TranscriptionResult};

/// Runs the `whisper` command-line tool. The tool picks a GPU on its own when
/// one is available.
pub struct WhisperCli {
    binary: PathBuf,
    model: String,
}

#[derive(Debug, Deserialize)]
struct WhisperJson {
    text: String,
    language: Option<String>,
}

impl WhisperCli {
    pub fn new(binary: impl Into<PathBuf>, model: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            model: model.into(),
        }
    }

    pub fn for_language(binary: impl Into<PathBuf>, language: &str) -> Self {
        Self::new(binary, model_for_language(language))
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

impl SpeechToText for WhisperCli {
    fn name(&self) -> &str {
        &self.model
    }

    fn transcribe(
        &self,
        path: &Path,
        language: &str,
    ) -> Result<TranscriptionResult, TranscriptionError> {
        if !path.is_file() {
            return Err(TranscriptionError::AudioUnreadable(format!(
                "{} is not a readable file",
                path.display()
            )));
        }

        let scratch = tempfile::tempdir()
            .map_err(|e| TranscriptionError::TranscriptionFailed(format!("scratch dir: {}", e)))?;

        log::debug!("Transcribing {} with whisper model '{}'", path.display(), self.model);

        let output = Command::new(&self.binary)
            .arg(path)
            .args(["--model", &self.model])
            .args(["--output_format", "json"])
            .arg("--output_dir")
            .arg(scratch.path())
            .args(["--verbose", "False"])
            .output()
            .map_err(|e| {
                TranscriptionError::ModelLoadFailed(format!(
                    "failed to run {}: {}",
                    self.binary.display(),
                    e
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TranscriptionError::TranscriptionFailed(format!(
                "{} exited with code {}: {}",
                self.binary.display(),
                output.status.code().unwrap_or(-1),
                stderr.lines().last().unwrap_or("unknown error")
            )));
        }

        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let json_path = scratch.path().join(format!("{}.json", stem));
        let contents = std::fs::read(&json_path).map_err(|e| {
            TranscriptionError::MalformedOutput(format!("{}: {}", json_path.display(), e))
        })?;

        parse_whisper_json(&contents, language)
    }
}

/// The detected language is reported when present; otherwise the requested
/// one is assumed.
fn parse_whisper_json(
    bytes: &[u8],
    requested_language: &str,
) -> Result<TranscriptionResult, TranscriptionError> {
    let parsed: WhisperJson = serde_json::from_slice(bytes)
        .map_err(|e| TranscriptionError::MalformedOutput(e.to_string()))?;

    Ok(TranscriptionResult {
        text: parsed.text.trim().to_string(),
        language: parsed
            .language
            .unwrap_or_else(|| requested_language.to_string()),
    })
}
