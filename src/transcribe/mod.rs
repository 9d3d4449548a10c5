use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

pub mod whisper;

pub use whisper::WhisperCli;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptionResult {
    pub text: String,
    pub language: String,
}

#[derive(Debug, thiserror::Error)]
pub enum TranscriptionError {
    #[error("audio could not be read: {0}")]
    AudioUnreadable(String),
    #[error("model loading failed: {0}")]
    ModelLoadFailed(String),
    #[error("transcription failed: {0}")]
    TranscriptionFailed(String),
    #[error("malformed backend output: {0}")]
    MalformedOutput(String),
}

pub trait SpeechToText: Send + Sync {
    fn name(&self) -> &str;

    fn transcribe(
        &self,
        path: &Path,
        language: &str,
    ) -> Result<TranscriptionResult, TranscriptionError>;
}

/// English gets the lightweight English-only model, everything else the
/// large multilingual one.
pub fn model_for_language(language: &str) -> &'static str {
    if language == "en" {
        "base.en"
    } else {
        "large"
    }
}

type EngineFactory = Box<dyn Fn(&str) -> Arc<dyn SpeechToText> + Send + Sync>;

/// Resolves one engine per language and keeps it for the rest of the run.
pub struct EngineCache {
    factory: EngineFactory,
    engines: HashMap<String, Arc<dyn SpeechToText>>,
}

impl EngineCache {
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn(&str) -> Arc<dyn SpeechToText> + Send + Sync + 'static,
    {
        Self {
            factory: Box::new(factory),
            engines: HashMap::new(),
        }
    }

    pub fn whisper(binary: impl Into<std::path::PathBuf>) -> Self {
        let binary = binary.into();
        Self::new(move |language| Arc::new(WhisperCli::for_language(binary.clone(), language)))
    }

    pub fn resolve(&mut self, language: &str) -> Arc<dyn SpeechToText> {
        let factory = &self.factory;
        self.engines
            .entry(language.to_string())
            .or_insert_with(|| {
                log::info!("Loading transcription engine for language '{}'", language);
                factory(language)
            })
            .clone()
    }

    pub fn len(&self) -> usize {
        self.engines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.engines.is_empty()
    }
}
