use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::DomainError;

/// The three remote calls a session can make, in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineCall {
    Transcribe,
    Translate,
    Synthesize,
}

impl PipelineCall {
    /// Generic user-facing failure message, used when the service rejects
    /// a call without supplying its own error text.
    pub fn generic_error(&self) -> &'static str {
        match self {
            PipelineCall::Transcribe => "Transcription failed",
            PipelineCall::Translate => "Translation failed",
            PipelineCall::Synthesize => "Text-to-Speech failed",
        }
    }

    /// Endpoint path relative to the service base URL.
    pub fn endpoint(&self) -> &'static str {
        match self {
            PipelineCall::Transcribe => "transcribe",
            PipelineCall::Translate => "translate",
            PipelineCall::Synthesize => "text-to-speech",
        }
    }
}

impl fmt::Display for PipelineCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.endpoint())
    }
}

/// JSON body for `POST /translate`.
#[derive(Debug, Serialize)]
pub struct TranslateRequest<'a> {
    pub text: &'a str,
    pub target_lang: &'a str,
}

/// JSON body for `POST /text-to-speech`.
#[derive(Debug, Serialize)]
pub struct SpeechRequest<'a> {
    pub text: &'a str,
    pub lang: &'a str,
}

/// Response envelope shared by all three endpoints.
///
/// `success` defaults to false so that error bodies the service sends with
/// non-2xx statuses (which carry only an `error` field) resolve to a
/// service rejection rather than a parse failure.
#[derive(Debug, Deserialize)]
pub struct TranscribeResponse {
    #[serde(default)]
    pub success: bool,
    pub transcription: Option<String>,
    pub text: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TranslateResponse {
    #[serde(default)]
    pub success: bool,
    pub translated_text: Option<String>,
    pub text: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SpeechResponse {
    #[serde(default)]
    pub success: bool,
    pub audio_url: Option<String>,
    pub filename: Option<String>,
    pub error: Option<String>,
}

impl TranscribeResponse {
    pub fn into_text(self) -> Result<String, DomainError> {
        check_success(PipelineCall::Transcribe, self.success, self.error)?;
        resolve_text_field(
            PipelineCall::Transcribe,
            "transcription",
            self.transcription,
            self.text,
        )
    }
}

impl TranslateResponse {
    pub fn into_text(self) -> Result<String, DomainError> {
        check_success(PipelineCall::Translate, self.success, self.error)?;
        resolve_text_field(
            PipelineCall::Translate,
            "translated_text",
            self.translated_text,
            self.text,
        )
    }
}

impl SpeechResponse {
    /// Returns `(audio_url, filename)` on success. The filename is the
    /// service's suggestion for the saved artifact; it may be absent.
    pub fn into_artifact(self) -> Result<(String, Option<String>), DomainError> {
        check_success(PipelineCall::Synthesize, self.success, self.error)?;
        let url = self.audio_url.ok_or_else(|| DomainError::InvalidResponse {
            call: PipelineCall::Synthesize,
            message: "success response is missing `audio_url`".to_string(),
        })?;
        Ok((url, self.filename))
    }
}

fn check_success(
    call: PipelineCall,
    success: bool,
    error: Option<String>,
) -> Result<(), DomainError> {
    if success {
        return Ok(());
    }
    let message = error
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| call.generic_error().to_string());
    Err(DomainError::ServiceRejected { call, message })
}

/// Resolve the result payload of a successful response.
///
/// Older deployments of the service put the payload in a bare `text`
/// field instead of the documented one. That alias is a compatibility
/// shim for an unstable contract, not a feature: it is accepted, logged,
/// and should go away once the contract settles. A successful response
/// carrying neither field is malformed.
fn resolve_text_field(
    call: PipelineCall,
    primary_name: &'static str,
    primary: Option<String>,
    legacy: Option<String>,
) -> Result<String, DomainError> {
    if let Some(value) = primary {
        return Ok(value);
    }
    if let Some(value) = legacy {
        warn!(
            %call,
            field = primary_name,
            "service used legacy `text` field instead of the documented one; contract needs clarification"
        );
        return Ok(value);
    }
    Err(DomainError::InvalidResponse {
        call,
        message: format!("success response is missing `{primary_name}`"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transcribe_success_uses_primary_field() {
        let resp: TranscribeResponse =
            serde_json::from_str(r#"{"success":true,"transcription":"hello"}"#).unwrap();
        assert_eq!(resp.into_text().unwrap(), "hello");
    }

    #[test]
    fn transcribe_success_falls_back_to_legacy_text() {
        let resp: TranscribeResponse =
            serde_json::from_str(r#"{"success":true,"text":"hello"}"#).unwrap();
        assert_eq!(resp.into_text().unwrap(), "hello");
    }

    #[test]
    fn transcribe_success_without_payload_is_a_parse_error() {
        let resp: TranscribeResponse = serde_json::from_str(r#"{"success":true}"#).unwrap();
        assert!(matches!(
            resp.into_text().unwrap_err(),
            DomainError::InvalidResponse { .. }
        ));
    }

    #[test]
    fn rejected_call_carries_service_message_verbatim() {
        let resp: TranscribeResponse =
            serde_json::from_str(r#"{"success":false,"error":"model unavailable"}"#).unwrap();
        let err = resp.into_text().unwrap_err();
        assert_eq!(err.to_string(), "model unavailable");
    }

    #[test]
    fn rejected_call_without_message_gets_generic_text() {
        let resp: TranslateResponse = serde_json::from_str(r#"{"success":false}"#).unwrap();
        assert_eq!(resp.into_text().unwrap_err().to_string(), "Translation failed");
    }

    #[test]
    fn error_body_without_success_flag_is_a_rejection() {
        // The service sends `{"error": "..."}` with non-2xx statuses.
        let resp: TranslateResponse =
            serde_json::from_str(r#"{"error":"Unsupported language"}"#).unwrap();
        let err = resp.into_text().unwrap_err();
        assert_eq!(err.to_string(), "Unsupported language");
    }

    #[test]
    fn translate_prefers_translated_text_over_legacy() {
        let resp: TranslateResponse = serde_json::from_str(
            r#"{"success":true,"translated_text":"bonjour","text":"stale"}"#,
        )
        .unwrap();
        assert_eq!(resp.into_text().unwrap(), "bonjour");
    }

    #[test]
    fn speech_success_yields_url_and_filename() {
        let resp: SpeechResponse = serde_json::from_str(
            r#"{"success":true,"audio_url":"/download/tts_1.mp3","filename":"tts_1.mp3"}"#,
        )
        .unwrap();
        let (url, filename) = resp.into_artifact().unwrap();
        assert_eq!(url, "/download/tts_1.mp3");
        assert_eq!(filename.as_deref(), Some("tts_1.mp3"));
    }

    #[test]
    fn speech_success_without_url_is_malformed() {
        let resp: SpeechResponse = serde_json::from_str(r#"{"success":true}"#).unwrap();
        assert!(matches!(
            resp.into_artifact().unwrap_err(),
            DomainError::InvalidResponse { .. }
        ));
    }
}
