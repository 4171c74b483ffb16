mod controller;
mod waveform;

pub use controller::{CaptureSummary, SessionController, SessionSnapshot, SpeechSource};
pub use waveform::{Waveform, BAR_COUNT, FRAME_INTERVAL};
