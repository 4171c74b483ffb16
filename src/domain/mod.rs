pub mod audio;
pub mod config;
pub mod error;
pub mod language;
pub mod pipeline;
pub mod sample;
pub mod session;

pub use audio::{AtomicCaptureState, CaptureConfig, CaptureState, InputDevice, PcmBuffer};
pub use config::AppConfig;
pub use error::DomainError;
pub use language::Language;
pub use pipeline::PipelineCall;
pub use sample::AudioSample;
pub use session::{Session, SessionStage, SpeechOutput};
