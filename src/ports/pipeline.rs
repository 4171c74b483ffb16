use std::path::PathBuf;

use async_trait::async_trait;

use crate::domain::{AudioSample, DomainError, Language};

/// A generated speech file: where the adapter saved it, plus the service
/// URL it was fetched from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechArtifact {
    pub path: PathBuf,
    pub url: String,
}

/// Port for the three remote pipeline calls.
///
/// Each method is one request/response exchange. Implementations report
/// service rejections, transport failures, and malformed responses as
/// `DomainError`s; they never retry.
#[async_trait]
pub trait PipelineClient: Send + Sync {
    /// `POST /transcribe` with the audio sample; returns the transcript.
    async fn transcribe(&self, sample: &AudioSample) -> Result<String, DomainError>;

    /// `POST /translate`; returns the translated text.
    async fn translate(&self, text: &str, target_lang: Language) -> Result<String, DomainError>;

    /// `POST /text-to-speech`, then download the generated audio.
    async fn synthesize(&self, text: &str, lang: Language) -> Result<SpeechArtifact, DomainError>;
}
