pub mod audio;
pub mod config;
pub mod pipeline;

pub use audio::AudioCapture;
pub use config::ConfigStore;
pub use pipeline::{PipelineClient, SpeechArtifact};
