use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::de::DeserializeOwned;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};
use url::Url;

use crate::domain::config::ServiceConfig;
use crate::domain::pipeline::{
    SpeechRequest, SpeechResponse, TranscribeResponse, TranslateRequest, TranslateResponse,
};
use crate::domain::{AudioSample, DomainError, Language, PipelineCall};
use crate::ports::{PipelineClient, SpeechArtifact};

/// reqwest-based client for the three pipeline endpoints.
///
/// The service wraps every answer in the same envelope, including error
/// bodies sent with non-2xx statuses, so responses are read as text
/// first and decoded from there: a JSON body always wins over the status
/// line, and only an undecodable body is reported as a transport error.
pub struct HttpPipelineClient {
    client: Client,
    base_url: Url,
    speech_dir: PathBuf,
}

impl HttpPipelineClient {
    pub fn new(config: &ServiceConfig, speech_dir: PathBuf) -> Result<Self, DomainError> {
        let client = Client::builder()
            .use_rustls_tls()
            .user_agent(format!("voicerelay/{}", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| DomainError::HttpRequest(format!("Failed to create HTTP client: {}", e)))?;

        let base_url = normalize_base_url(&config.base_url)?;

        info!(base_url = %base_url, "Pipeline client initialized");

        Ok(Self {
            client,
            base_url,
            speech_dir,
        })
    }

    fn endpoint(&self, call: PipelineCall) -> Result<Url, DomainError> {
        self.base_url
            .join(call.endpoint())
            .map_err(|e| DomainError::HttpRequest(format!("Invalid endpoint URL: {}", e)))
    }

    /// Decode one envelope response. A parseable JSON body takes
    /// precedence over the HTTP status so service-reported errors keep
    /// their original wording.
    async fn decode<R: DeserializeOwned>(
        call: PipelineCall,
        response: reqwest::Response,
    ) -> Result<R, DomainError> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| DomainError::HttpRequest(e.to_string()))?;

        serde_json::from_str(&body).map_err(|e| {
            if status.is_success() {
                DomainError::InvalidResponse {
                    call,
                    message: e.to_string(),
                }
            } else {
                DomainError::HttpRequest(format!("HTTP {} for /{}", status, call.endpoint()))
            }
        })
    }

    async fn download_speech(
        &self,
        audio_url: &str,
        file_name: &str,
    ) -> Result<PathBuf, DomainError> {
        // The service hands back a path like `/download/tts_<id>.mp3`;
        // resolve it against the base URL.
        let url = self
            .base_url
            .join(audio_url)
            .map_err(|e| DomainError::HttpRequest(format!("Invalid audio URL: {}", e)))?;

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| DomainError::HttpRequest(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DomainError::HttpRequest(format!(
                "HTTP {} for {}",
                status, url
            )));
        }

        tokio::fs::create_dir_all(&self.speech_dir).await?;

        let path = self.speech_dir.join(file_name);
        // Write to a temp file first, then rename, so a failed download
        // never leaves a truncated artifact behind.
        let temp_path = path.with_extension("download");

        let mut file = tokio::fs::File::create(&temp_path).await?;
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(c) => c,
                Err(e) => {
                    drop(file);
                    let _ = tokio::fs::remove_file(&temp_path).await;
                    return Err(DomainError::HttpRequest(e.to_string()));
                }
            };
            if let Err(e) = file.write_all(&chunk).await {
                drop(file);
                let _ = tokio::fs::remove_file(&temp_path).await;
                return Err(DomainError::Io(e.to_string()));
            }
        }

        file.flush().await?;
        drop(file);
        tokio::fs::rename(&temp_path, &path).await?;

        info!(path = ?path, "Speech artifact saved");
        Ok(path)
    }
}

/// Parse the configured base URL and guarantee a trailing slash so
/// `Url::join` appends endpoint paths instead of replacing them.
fn normalize_base_url(base: &str) -> Result<Url, DomainError> {
    let trimmed = base.trim();
    let with_slash = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{}/", trimmed)
    };
    Url::parse(&with_slash).map_err(|e| DomainError::Config(format!("Invalid base URL: {}", e)))
}

#[async_trait]
impl PipelineClient for HttpPipelineClient {
    async fn transcribe(&self, sample: &AudioSample) -> Result<String, DomainError> {
        let call = PipelineCall::Transcribe;
        let url = self.endpoint(call)?;

        debug!(bytes = sample.len(), file = sample.file_name(), "Uploading audio for transcription");

        let part = Part::bytes(sample.bytes().to_vec()).file_name(sample.file_name().to_string());
        let form = Form::new().part("audio", part);

        let response = self
            .client
            .post(url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| DomainError::HttpRequest(e.to_string()))?;

        let envelope: TranscribeResponse = Self::decode(call, response).await?;
        envelope.into_text()
    }

    async fn translate(&self, text: &str, target_lang: Language) -> Result<String, DomainError> {
        let call = PipelineCall::Translate;
        let url = self.endpoint(call)?;

        let body = TranslateRequest {
            text,
            target_lang: target_lang.code(),
        };

        let response = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| DomainError::HttpRequest(e.to_string()))?;

        let envelope: TranslateResponse = Self::decode(call, response).await?;
        envelope.into_text()
    }

    async fn synthesize(&self, text: &str, lang: Language) -> Result<SpeechArtifact, DomainError> {
        let call = PipelineCall::Synthesize;
        let url = self.endpoint(call)?;

        let body = SpeechRequest {
            text,
            lang: lang.code(),
        };

        let response = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| DomainError::HttpRequest(e.to_string()))?;

        let envelope: SpeechResponse = Self::decode(call, response).await?;
        let (audio_url, filename) = envelope.into_artifact()?;

        let file_name = filename
            .filter(|f| is_plain_file_name(f))
            .unwrap_or_else(|| format!("speech_{}.mp3", lang.code()));

        let path = self.download_speech(&audio_url, &file_name).await?;
        Ok(SpeechArtifact {
            path,
            url: audio_url,
        })
    }
}

/// Reject service-supplied filenames that could escape the output dir.
fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && !name.contains('/')
        && !name.contains('\\')
        && name != "."
        && name != ".."
        && Path::new(name).file_name().is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_gets_trailing_slash() {
        let url = normalize_base_url("http://localhost:5001").unwrap();
        assert_eq!(url.as_str(), "http://localhost:5001/");
    }

    #[test]
    fn endpoints_resolve_relative_to_base() {
        let client = HttpPipelineClient::new(
            &ServiceConfig {
                base_url: "http://localhost:5001".to_string(),
                timeout_secs: 5,
            },
            PathBuf::from("/tmp/speech"),
        )
        .unwrap();

        assert_eq!(
            client.endpoint(PipelineCall::Transcribe).unwrap().as_str(),
            "http://localhost:5001/transcribe"
        );
        assert_eq!(
            client.endpoint(PipelineCall::Synthesize).unwrap().as_str(),
            "http://localhost:5001/text-to-speech"
        );
    }

    #[test]
    fn absolute_audio_path_resolves_against_base() {
        let base = normalize_base_url("http://localhost:5001/api").unwrap();
        let resolved = base.join("/download/tts_1.mp3").unwrap();
        assert_eq!(resolved.as_str(), "http://localhost:5001/download/tts_1.mp3");
    }

    #[test]
    fn invalid_base_url_is_a_config_error() {
        assert!(matches!(
            normalize_base_url("not a url"),
            Err(DomainError::Config(_))
        ));
    }

    #[test]
    fn suspicious_filenames_are_rejected() {
        assert!(is_plain_file_name("tts_1.mp3"));
        assert!(!is_plain_file_name("../../etc/passwd"));
        assert!(!is_plain_file_name("a/b.mp3"));
        assert!(!is_plain_file_name(""));
    }
}
