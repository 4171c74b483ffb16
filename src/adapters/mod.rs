mod audio_cpal;
mod config_store;
mod http_pipeline;

pub use audio_cpal::CpalCapture;
pub use config_store::TomlConfigStore;
pub use http_pipeline::HttpPipelineClient;
