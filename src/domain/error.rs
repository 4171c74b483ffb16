use thiserror::Error;

use crate::domain::pipeline::PipelineCall;

/// Domain-level errors for voicerelay.
///
/// Every failure a user can hit falls into one of three families:
/// device/permission errors, transport or parse errors, and errors the
/// pipeline service reported itself. All of them surface as a single
/// alert line; none of them abort the session.
#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Microphone unavailable: {message}")]
    AudioDevice { message: String },

    #[error("Already recording")]
    AlreadyRecording,

    #[error("Not currently recording")]
    NotRecording,

    #[error("Request failed: {0}")]
    HttpRequest(String),

    /// The service answered with `success: false`. The message is shown
    /// verbatim; the service controls its wording.
    #[error("{message}")]
    ServiceRejected {
        call: PipelineCall,
        message: String,
    },

    #[error("Malformed {call} response: {message}")]
    InvalidResponse {
        call: PipelineCall,
        message: String,
    },

    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    #[error("File too large: {size} bytes (limit {limit})")]
    SampleTooLarge { size: u64, limit: u64 },

    #[error("No audio sample available - record or load a file first")]
    MissingSample,

    #[error("Nothing to translate - transcribe some audio first")]
    MissingTranscript,

    #[error("No translation available - translate the transcript first")]
    MissingTranslation,

    #[error("Audio encoding error: {0}")]
    Encode(String),
}

impl From<std::io::Error> for DomainError {
    fn from(err: std::io::Error) -> Self {
        DomainError::Io(err.to_string())
    }
}

impl From<toml::de::Error> for DomainError {
    fn from(err: toml::de::Error) -> Self {
        DomainError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for DomainError {
    fn from(err: toml::ser::Error) -> Self {
        DomainError::Config(err.to_string())
    }
}

impl From<hound::Error> for DomainError {
    fn from(err: hound::Error) -> Self {
        DomainError::Encode(err.to_string())
    }
}
