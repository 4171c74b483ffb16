use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{info, warn};

use crate::domain::{
    AudioSample, CaptureState, DomainError, InputDevice, Language, Session, SessionStage,
    SpeechOutput,
};
use crate::ports::{AudioCapture, PipelineClient};

/// Which text a speech request reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeechSource {
    /// The transcript, spoken in its original language.
    Original,
    /// The translation, spoken in the session's target language.
    Translated,
}

/// Summary of a finished capture, for display.
#[derive(Debug, Clone)]
pub struct CaptureSummary {
    pub duration_secs: f32,
    pub samples: usize,
}

/// Read-only view of the session for status output.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub stage: SessionStage,
    pub has_sample: bool,
    pub sample_name: Option<String>,
    pub sample_bytes: usize,
    pub transcript: String,
    pub translation: String,
    pub target_language: String,
    pub speech_path: Option<String>,
}

/// Orchestrates one session: owns the `Session` state and drives the
/// capture and pipeline ports.
///
/// Every pipeline call follows the same contract: check preconditions,
/// enter a busy stage, make exactly one request, apply the result to the
/// session only on success, and leave the busy stage no matter what.
/// State is mutated only from these methods, so a failed call can never
/// leave a half-applied session behind.
pub struct SessionController {
    session: RwLock<Session>,
    capture: Arc<dyn AudioCapture>,
    pipeline: Arc<dyn PipelineClient>,
    default_language: Language,
}

impl SessionController {
    pub fn new(
        capture: Arc<dyn AudioCapture>,
        pipeline: Arc<dyn PipelineClient>,
        default_language: Language,
    ) -> Self {
        Self {
            session: RwLock::new(Session::new(default_language)),
            capture,
            pipeline,
            default_language,
        }
    }

    /// Start microphone capture. On denial or device failure the session
    /// stays idle with no sample.
    pub async fn start_capture(&self) -> Result<(), DomainError> {
        self.capture.start_recording().await?;
        self.session.write().set_stage(SessionStage::Recording);
        Ok(())
    }

    /// Stop capture, release the device, and install the recording as
    /// the session's sample, replacing any prior one.
    pub async fn stop_capture(&self) -> Result<CaptureSummary, DomainError> {
        let result = self.capture.stop_recording().await;
        // The device is released either way; the session is no longer
        // recording even if draining failed.
        self.session.write().set_stage(SessionStage::Idle);

        let buffer = result?;
        let summary = CaptureSummary {
            duration_secs: buffer.duration_secs(),
            samples: buffer.len(),
        };
        if buffer.is_empty() {
            warn!("Capture produced no audio");
        }

        let sample = AudioSample::from_pcm(&buffer)?;
        self.session.write().set_sample(sample);
        info!(
            duration_secs = summary.duration_secs,
            "Capture installed as session sample"
        );
        Ok(summary)
    }

    /// Load an audio file as the session's sample, replacing any prior
    /// one. A failed load (bad type, too large, unreadable) keeps the
    /// existing sample.
    pub fn load_file(&self, path: &Path) -> Result<usize, DomainError> {
        let sample = AudioSample::from_file(path)?;
        let size = sample.len();
        self.session.write().set_sample(sample);
        info!(path = ?path, bytes = size, "File installed as session sample");
        Ok(size)
    }

    /// Send the sample for transcription. On success the new transcript
    /// supersedes all derived state: the translation and any generated
    /// speech are cleared.
    pub async fn transcribe(&self) -> Result<String, DomainError> {
        let sample = {
            let session = self.session.read();
            session.sample().cloned().ok_or(DomainError::MissingSample)?
        };

        self.set_stage(SessionStage::Transcribing);
        let result = self.pipeline.transcribe(&sample).await;
        self.set_stage(SessionStage::Idle);

        let transcript = result?;
        self.session.write().complete_transcribe(transcript.clone());
        info!(chars = transcript.len(), "Transcription stored");
        Ok(transcript)
    }

    /// Translate the transcript. `language` overrides the session's
    /// target; the target is updated only when the call succeeds.
    pub async fn translate(&self, language: Option<Language>) -> Result<String, DomainError> {
        let (text, target) = {
            let session = self.session.read();
            if !session.has_transcript() {
                return Err(DomainError::MissingTranscript);
            }
            (
                session.transcript().to_string(),
                language.unwrap_or_else(|| session.target_language()),
            )
        };

        self.set_stage(SessionStage::Translating);
        let result = self.pipeline.translate(&text, target).await;
        self.set_stage(SessionStage::Idle);

        let translation = result?;
        self.session
            .write()
            .complete_translate(translation.clone(), target);
        info!(target = %target, "Translation stored");
        Ok(translation)
    }

    /// Generate speech from the transcript or the translation. The new
    /// artifact replaces the previous one.
    pub async fn synthesize(&self, source: SpeechSource) -> Result<SpeechOutput, DomainError> {
        let (text, language) = {
            let session = self.session.read();
            match source {
                SpeechSource::Original => {
                    if !session.has_transcript() {
                        return Err(DomainError::MissingTranscript);
                    }
                    (session.transcript().to_string(), Language::default())
                }
                SpeechSource::Translated => {
                    if !session.has_translation() {
                        return Err(DomainError::MissingTranslation);
                    }
                    (session.translation().to_string(), session.target_language())
                }
            }
        };

        self.set_stage(SessionStage::Synthesizing);
        let result = self.pipeline.synthesize(&text, language).await;
        self.set_stage(SessionStage::Idle);

        let artifact = result?;
        let output = SpeechOutput {
            path: artifact.path,
            url: artifact.url,
            language,
        };
        self.session.write().complete_synthesis(output.clone());
        info!(path = ?output.path, lang = %language, "Speech artifact stored");
        Ok(output)
    }

    pub fn set_target_language(&self, language: Language) {
        self.session.write().set_target_language(language);
    }

    /// Discard all session state: the analog of the page reload. If a
    /// recording is in flight the microphone is released first.
    pub async fn reset(&self) {
        if self.capture.state() == CaptureState::Recording {
            let _ = self.capture.stop_recording().await;
        }
        self.session.write().reset(self.default_language);
        info!("Session reset");
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let session = self.session.read();
        SessionSnapshot {
            stage: session.stage(),
            has_sample: session.has_sample(),
            sample_name: session.sample().map(|s| s.file_name().to_string()),
            sample_bytes: session.sample().map(|s| s.len()).unwrap_or(0),
            transcript: session.transcript().to_string(),
            translation: session.translation().to_string(),
            target_language: session.target_language().code().to_string(),
            speech_path: session
                .speech_output()
                .map(|o| o.path.display().to_string()),
        }
    }

    pub fn is_recording(&self) -> bool {
        self.session.read().is_recording()
    }

    pub fn target_language(&self) -> Language {
        self.session.read().target_language()
    }

    pub fn list_input_devices(&self) -> Result<Vec<InputDevice>, DomainError> {
        self.capture.list_input_devices()
    }

    pub fn select_input_device(&self, device_id: Option<&str>) -> Result<(), DomainError> {
        self.capture.select_input_device(device_id)
    }

    pub fn current_level(&self) -> f32 {
        self.capture.current_level()
    }

    pub fn current_duration(&self) -> f32 {
        self.capture.current_duration()
    }

    fn set_stage(&self, stage: SessionStage) {
        self.session.write().set_stage(stage);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use crate::domain::sample::MAX_SAMPLE_BYTES;
    use crate::domain::{PcmBuffer, PipelineCall};
    use crate::ports::SpeechArtifact;

    struct FakeCapture {
        state: Mutex<CaptureState>,
        releases: AtomicUsize,
    }

    impl FakeCapture {
        fn new() -> Self {
            Self {
                state: Mutex::new(CaptureState::Idle),
                releases: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl AudioCapture for FakeCapture {
        async fn start_recording(&self) -> Result<(), DomainError> {
            let mut state = self.state.lock();
            if !state.can_start() {
                return Err(DomainError::AlreadyRecording);
            }
            *state = CaptureState::Recording;
            Ok(())
        }

        async fn stop_recording(&self) -> Result<PcmBuffer, DomainError> {
            let mut state = self.state.lock();
            if !state.can_stop() {
                return Err(DomainError::NotRecording);
            }
            *state = CaptureState::Idle;
            self.releases.fetch_add(1, Ordering::SeqCst);
            Ok(PcmBuffer::new(vec![0i16; 1600], 16_000))
        }

        fn state(&self) -> CaptureState {
            *self.state.lock()
        }

        fn list_input_devices(&self) -> Result<Vec<InputDevice>, DomainError> {
            Ok(vec![])
        }

        fn select_input_device(&self, _device_id: Option<&str>) -> Result<(), DomainError> {
            Ok(())
        }

        fn current_duration(&self) -> f32 {
            0.0
        }

        fn current_level(&self) -> f32 {
            0.0
        }
    }

    #[derive(Default)]
    struct FakePipeline {
        transcriptions: Mutex<VecDeque<Result<String, DomainError>>>,
        translations: Mutex<VecDeque<Result<String, DomainError>>>,
        syntheses: Mutex<VecDeque<Result<SpeechArtifact, DomainError>>>,
        calls: AtomicUsize,
    }

    impl FakePipeline {
        fn will_transcribe(self, result: Result<String, DomainError>) -> Self {
            self.transcriptions.lock().push_back(result);
            self
        }

        fn will_translate(self, result: Result<String, DomainError>) -> Self {
            self.translations.lock().push_back(result);
            self
        }

        fn will_synthesize(self, result: Result<SpeechArtifact, DomainError>) -> Self {
            self.syntheses.lock().push_back(result);
            self
        }
    }

    #[async_trait]
    impl PipelineClient for FakePipeline {
        async fn transcribe(&self, _sample: &AudioSample) -> Result<String, DomainError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.transcriptions
                .lock()
                .pop_front()
                .expect("unexpected transcribe call")
        }

        async fn translate(
            &self,
            _text: &str,
            _target_lang: Language,
        ) -> Result<String, DomainError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.translations
                .lock()
                .pop_front()
                .expect("unexpected translate call")
        }

        async fn synthesize(
            &self,
            _text: &str,
            _lang: Language,
        ) -> Result<SpeechArtifact, DomainError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.syntheses
                .lock()
                .pop_front()
                .expect("unexpected synthesize call")
        }
    }

    fn controller(pipeline: FakePipeline) -> (SessionController, Arc<FakeCapture>) {
        let capture = Arc::new(FakeCapture::new());
        let controller = SessionController::new(
            Arc::clone(&capture) as Arc<dyn AudioCapture>,
            Arc::new(pipeline),
            Language::default(),
        );
        (controller, capture)
    }

    fn artifact(name: &str) -> SpeechArtifact {
        SpeechArtifact {
            path: std::path::PathBuf::from(format!("/tmp/{name}")),
            url: format!("/download/{name}"),
        }
    }

    fn rejection(call: PipelineCall, message: &str) -> DomainError {
        DomainError::ServiceRejected {
            call,
            message: message.to_string(),
        }
    }

    #[tokio::test]
    async fn start_stop_yields_one_sample_and_one_release() {
        let (controller, capture) = controller(FakePipeline::default());

        controller.start_capture().await.unwrap();
        assert!(controller.is_recording());

        let summary = controller.stop_capture().await.unwrap();
        assert!(!controller.is_recording());
        assert_eq!(summary.samples, 1600);
        assert!(controller.snapshot().has_sample);
        assert_eq!(capture.releases.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stop_without_start_is_an_error() {
        let (controller, capture) = controller(FakePipeline::default());
        assert!(matches!(
            controller.stop_capture().await.unwrap_err(),
            DomainError::NotRecording
        ));
        assert!(!controller.snapshot().has_sample);
        assert_eq!(capture.releases.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn repeated_captures_replace_the_sample() {
        let (controller, capture) = controller(FakePipeline::default());

        for _ in 0..3 {
            controller.start_capture().await.unwrap();
            controller.stop_capture().await.unwrap();
        }

        let snapshot = controller.snapshot();
        assert!(snapshot.has_sample);
        assert_eq!(snapshot.sample_name.as_deref(), Some("recording.wav"));
        assert_eq!(capture.releases.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn loading_a_file_replaces_the_captured_sample() {
        let (controller, _) = controller(FakePipeline::default());
        controller.start_capture().await.unwrap();
        controller.stop_capture().await.unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.wav");
        std::fs::write(&path, b"RIFF fake wav").unwrap();

        controller.load_file(&path).unwrap();
        let snapshot = controller.snapshot();
        assert_eq!(snapshot.sample_name.as_deref(), Some("clip.wav"));
        assert_eq!(snapshot.sample_bytes, 13);
    }

    #[tokio::test]
    async fn failed_file_load_keeps_the_prior_sample() {
        let (controller, _) = controller(FakePipeline::default());
        controller.start_capture().await.unwrap();
        controller.stop_capture().await.unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, b"not audio").unwrap();

        assert!(controller.load_file(&path).is_err());
        let snapshot = controller.snapshot();
        assert_eq!(snapshot.sample_name.as_deref(), Some("recording.wav"));
    }

    #[tokio::test]
    async fn oversized_file_load_keeps_the_prior_sample() {
        let (controller, _) = controller(FakePipeline::default());
        controller.start_capture().await.unwrap();
        controller.stop_capture().await.unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.wav");
        let file = std::fs::File::create(&path).unwrap();
        file.set_len(MAX_SAMPLE_BYTES + 1).unwrap();

        assert!(matches!(
            controller.load_file(&path).unwrap_err(),
            DomainError::SampleTooLarge { .. }
        ));
        let snapshot = controller.snapshot();
        assert_eq!(snapshot.sample_name.as_deref(), Some("recording.wav"));
    }

    #[tokio::test]
    async fn transcribe_without_sample_makes_no_request() {
        let pipeline = FakePipeline::default();
        let (controller, _) = controller(pipeline);

        assert!(matches!(
            controller.transcribe().await.unwrap_err(),
            DomainError::MissingSample
        ));
    }

    #[tokio::test]
    async fn successful_transcribe_stores_exact_text() {
        let pipeline = FakePipeline::default().will_transcribe(Ok("hello".to_string()));
        let (controller, _) = controller(pipeline);
        controller.start_capture().await.unwrap();
        controller.stop_capture().await.unwrap();

        let text = controller.transcribe().await.unwrap();
        assert_eq!(text, "hello");

        let snapshot = controller.snapshot();
        assert_eq!(snapshot.transcript, "hello");
        assert_eq!(snapshot.stage, SessionStage::Idle);
    }

    #[tokio::test]
    async fn failed_transcribe_leaves_session_untouched_and_reports_verbatim() {
        let pipeline = FakePipeline::default()
            .will_transcribe(Ok("hello".to_string()))
            .will_translate(Ok("bonjour".to_string()))
            .will_transcribe(Err(rejection(PipelineCall::Transcribe, "model unavailable")));
        let (controller, _) = controller(pipeline);
        controller.start_capture().await.unwrap();
        controller.stop_capture().await.unwrap();

        controller.transcribe().await.unwrap();
        controller
            .translate(Some(Language::from_code("fr").unwrap()))
            .await
            .unwrap();

        let err = controller.transcribe().await.unwrap_err();
        assert_eq!(err.to_string(), "model unavailable");

        let snapshot = controller.snapshot();
        assert_eq!(snapshot.transcript, "hello");
        assert_eq!(snapshot.translation, "bonjour");
        assert_eq!(snapshot.stage, SessionStage::Idle);
    }

    #[tokio::test]
    async fn successful_transcribe_clears_downstream_state() {
        let pipeline = FakePipeline::default()
            .will_transcribe(Ok("first".to_string()))
            .will_translate(Ok("premier".to_string()))
            .will_synthesize(Ok(artifact("tts_1.mp3")))
            .will_transcribe(Ok("second".to_string()));
        let (controller, _) = controller(pipeline);
        controller.start_capture().await.unwrap();
        controller.stop_capture().await.unwrap();

        controller.transcribe().await.unwrap();
        controller
            .translate(Some(Language::from_code("fr").unwrap()))
            .await
            .unwrap();
        controller.synthesize(SpeechSource::Translated).await.unwrap();

        controller.transcribe().await.unwrap();
        let snapshot = controller.snapshot();
        assert_eq!(snapshot.transcript, "second");
        assert!(snapshot.translation.is_empty());
        assert!(snapshot.speech_path.is_none());
    }

    #[tokio::test]
    async fn translate_without_transcript_makes_no_request() {
        let (controller, _) = controller(FakePipeline::default());
        assert!(matches!(
            controller.translate(None).await.unwrap_err(),
            DomainError::MissingTranscript
        ));
    }

    #[tokio::test]
    async fn translate_updates_target_language_on_success() {
        let pipeline = FakePipeline::default()
            .will_transcribe(Ok("hello".to_string()))
            .will_translate(Ok("bonjour".to_string()));
        let (controller, _) = controller(pipeline);
        controller.start_capture().await.unwrap();
        controller.stop_capture().await.unwrap();
        controller.transcribe().await.unwrap();

        let text = controller
            .translate(Some(Language::from_code("fr").unwrap()))
            .await
            .unwrap();
        assert_eq!(text, "bonjour");
        assert_eq!(controller.target_language().code(), "fr");
    }

    #[tokio::test]
    async fn successful_translate_clears_stale_speech() {
        let pipeline = FakePipeline::default()
            .will_transcribe(Ok("hello".to_string()))
            .will_translate(Ok("bonjour".to_string()))
            .will_synthesize(Ok(artifact("tts_1.mp3")))
            .will_translate(Ok("hallo".to_string()));
        let (controller, _) = controller(pipeline);
        controller.start_capture().await.unwrap();
        controller.stop_capture().await.unwrap();
        controller.transcribe().await.unwrap();
        controller
            .translate(Some(Language::from_code("fr").unwrap()))
            .await
            .unwrap();
        controller.synthesize(SpeechSource::Translated).await.unwrap();

        controller
            .translate(Some(Language::from_code("de").unwrap()))
            .await
            .unwrap();
        let snapshot = controller.snapshot();
        assert_eq!(snapshot.translation, "hallo");
        assert!(snapshot.speech_path.is_none());
    }

    #[tokio::test]
    async fn failed_translate_keeps_previous_target_language() {
        let pipeline = FakePipeline::default()
            .will_transcribe(Ok("hello".to_string()))
            .will_translate(Err(rejection(PipelineCall::Translate, "Unsupported language")));
        let (controller, _) = controller(pipeline);
        controller.start_capture().await.unwrap();
        controller.stop_capture().await.unwrap();
        controller.transcribe().await.unwrap();

        let err = controller
            .translate(Some(Language::from_code("de").unwrap()))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Unsupported language");
        assert_eq!(controller.target_language().code(), "en");
        assert!(controller.snapshot().translation.is_empty());
    }

    #[tokio::test]
    async fn translated_speech_requires_a_translation() {
        let pipeline = FakePipeline::default().will_transcribe(Ok("hello".to_string()));
        let (controller, _) = controller(pipeline);
        controller.start_capture().await.unwrap();
        controller.stop_capture().await.unwrap();
        controller.transcribe().await.unwrap();

        assert!(matches!(
            controller
                .synthesize(SpeechSource::Translated)
                .await
                .unwrap_err(),
            DomainError::MissingTranslation
        ));
    }

    #[tokio::test]
    async fn new_synthesis_replaces_the_previous_artifact() {
        let pipeline = FakePipeline::default()
            .will_transcribe(Ok("hello".to_string()))
            .will_synthesize(Ok(artifact("tts_1.mp3")))
            .will_synthesize(Ok(artifact("tts_2.mp3")));
        let (controller, _) = controller(pipeline);
        controller.start_capture().await.unwrap();
        controller.stop_capture().await.unwrap();
        controller.transcribe().await.unwrap();

        controller.synthesize(SpeechSource::Original).await.unwrap();
        let output = controller.synthesize(SpeechSource::Original).await.unwrap();
        assert!(output.path.ends_with("tts_2.mp3"));
        assert_eq!(
            controller.snapshot().speech_path.as_deref(),
            Some("/tmp/tts_2.mp3")
        );
    }

    #[tokio::test]
    async fn reset_returns_to_the_initial_state() {
        let pipeline = FakePipeline::default()
            .will_transcribe(Ok("hello".to_string()))
            .will_translate(Ok("bonjour".to_string()));
        let (controller, capture) = controller(pipeline);
        controller.start_capture().await.unwrap();
        controller.stop_capture().await.unwrap();
        controller.transcribe().await.unwrap();
        controller
            .translate(Some(Language::from_code("fr").unwrap()))
            .await
            .unwrap();

        controller.reset().await;
        let snapshot = controller.snapshot();
        assert!(!snapshot.has_sample);
        assert!(snapshot.transcript.is_empty());
        assert!(snapshot.translation.is_empty());
        assert_eq!(snapshot.target_language, "en");
        assert_eq!(snapshot.stage, SessionStage::Idle);
        assert_eq!(capture.releases.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn reset_while_recording_releases_the_microphone() {
        let (controller, capture) = controller(FakePipeline::default());
        controller.start_capture().await.unwrap();

        controller.reset().await;
        assert!(!controller.is_recording());
        assert_eq!(capture.state(), CaptureState::Idle);
        assert_eq!(capture.releases.load(Ordering::SeqCst), 1);
    }
}
