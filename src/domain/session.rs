use std::path::PathBuf;

use crate::domain::sample::AudioSample;
use crate::domain::Language;

/// What the session is currently doing. Busy stages correspond to one
/// in-flight pipeline call; the CLI shows a call-specific message while
/// one is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStage {
    Idle,
    Recording,
    Transcribing,
    Translating,
    Synthesizing,
}

impl SessionStage {
    pub fn is_busy(&self) -> bool {
        !matches!(self, SessionStage::Idle | SessionStage::Recording)
    }

    pub fn label(&self) -> &'static str {
        match self {
            SessionStage::Idle => "idle",
            SessionStage::Recording => "recording",
            SessionStage::Transcribing => "transcribing",
            SessionStage::Translating => "translating",
            SessionStage::Synthesizing => "generating speech",
        }
    }
}

/// The last generated speech artifact: where it was saved and the service
/// URL it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechOutput {
    pub path: PathBuf,
    pub url: String,
    pub language: Language,
}

/// In-memory state for one interactive run.
///
/// Mutations happen only through these methods, and every pipeline-call
/// mutation is applied atomically on success: a failed call leaves the
/// session exactly as it was before the call started.
#[derive(Debug, Default)]
pub struct Session {
    sample: Option<AudioSample>,
    transcript: String,
    translation: String,
    target_language: Language,
    speech_output: Option<SpeechOutput>,
    stage: SessionStage,
}

impl Default for SessionStage {
    fn default() -> Self {
        SessionStage::Idle
    }
}

impl Session {
    pub fn new(target_language: Language) -> Self {
        Self {
            target_language,
            ..Self::default()
        }
    }

    /// Install a new audio sample, replacing any prior one. Both the
    /// capture and upload paths land here.
    pub fn set_sample(&mut self, sample: AudioSample) {
        self.sample = Some(sample);
    }

    /// A successful transcribe supersedes everything derived from the
    /// previous transcript: the translation and any generated speech are
    /// cleared along with storing the new text.
    pub fn complete_transcribe(&mut self, transcript: String) {
        self.transcript = transcript;
        self.translation.clear();
        self.speech_output = None;
    }

    /// A successful translate stores the text, remembers the language it
    /// was translated into, and clears speech generated from the
    /// superseded translation.
    pub fn complete_translate(&mut self, translation: String, language: Language) {
        self.translation = translation;
        self.target_language = language;
        self.speech_output = None;
    }

    /// A successful synthesis replaces the previous artifact; there is
    /// never more than one.
    pub fn complete_synthesis(&mut self, output: SpeechOutput) {
        self.speech_output = Some(output);
    }

    pub fn set_stage(&mut self, stage: SessionStage) {
        self.stage = stage;
    }

    pub fn set_target_language(&mut self, language: Language) {
        self.target_language = language;
    }

    /// Discard everything: the analog of reloading the page. The target
    /// language reverts to the configured default passed in.
    pub fn reset(&mut self, target_language: Language) {
        *self = Session::new(target_language);
    }

    pub fn sample(&self) -> Option<&AudioSample> {
        self.sample.as_ref()
    }

    pub fn transcript(&self) -> &str {
        &self.transcript
    }

    pub fn translation(&self) -> &str {
        &self.translation
    }

    pub fn target_language(&self) -> Language {
        self.target_language
    }

    pub fn speech_output(&self) -> Option<&SpeechOutput> {
        self.speech_output.as_ref()
    }

    pub fn stage(&self) -> SessionStage {
        self.stage
    }

    pub fn is_recording(&self) -> bool {
        self.stage == SessionStage::Recording
    }

    pub fn has_sample(&self) -> bool {
        self.sample.is_some()
    }

    pub fn has_transcript(&self) -> bool {
        !self.transcript.is_empty()
    }

    pub fn has_translation(&self) -> bool {
        !self.translation.is_empty()
    }
}
