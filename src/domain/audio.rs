use std::sync::atomic::{AtomicU8, Ordering};

use serde::{Deserialize, Serialize};

/// Microphone capture state machine.
///
/// Transitions:
/// - Idle -> Recording (start)
/// - Recording -> Idle (stop, returns the buffered PCM)
///
/// The device is held exclusively between start and stop, and released
/// unconditionally on stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CaptureState {
    /// Ready to record, no device held.
    Idle = 0,
    /// Actively capturing from the microphone.
    Recording = 1,
}

impl CaptureState {
    #[must_use]
    pub fn can_start(&self) -> bool {
        matches!(self, CaptureState::Idle)
    }

    #[must_use]
    pub fn can_stop(&self) -> bool {
        matches!(self, CaptureState::Recording)
    }
}

impl From<u8> for CaptureState {
    fn from(value: u8) -> Self {
        match value {
            1 => CaptureState::Recording,
            _ => CaptureState::Idle,
        }
    }
}

impl From<CaptureState> for u8 {
    fn from(state: CaptureState) -> Self {
        state as u8
    }
}

/// Atomic wrapper for CaptureState for lock-free reads from the audio
/// callback and the UI side.
#[derive(Debug)]
pub struct AtomicCaptureState(AtomicU8);

impl AtomicCaptureState {
    pub fn new(state: CaptureState) -> Self {
        Self(AtomicU8::new(state.into()))
    }

    pub fn load(&self) -> CaptureState {
        self.0.load(Ordering::Acquire).into()
    }

    pub fn store(&self, state: CaptureState) {
        self.0.store(state.into(), Ordering::Release);
    }
}

impl Default for AtomicCaptureState {
    fn default() -> Self {
        Self::new(CaptureState::Idle)
    }
}

/// Capture configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Maximum recording duration in seconds (ring buffer size).
    pub buffer_duration_secs: u32,
    /// Target sample rate in Hz for the uploaded sample.
    pub sample_rate: u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            buffer_duration_secs: 120,
            sample_rate: 16_000,
        }
    }
}

impl CaptureConfig {
    /// Ring buffer capacity in samples.
    pub fn buffer_capacity(&self) -> usize {
        self.buffer_duration_secs as usize * self.sample_rate as usize
    }
}

/// An input audio device.
#[derive(Debug, Clone)]
pub struct InputDevice {
    /// Unique device identifier.
    pub id: String,
    /// Human-readable device name.
    pub name: String,
    /// Whether this is the system default input.
    pub is_default: bool,
}

/// Raw PCM captured from the microphone: 16-bit mono at a known rate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PcmBuffer {
    samples: Vec<i16>,
    sample_rate: u32,
}

impl PcmBuffer {
    pub fn new(samples: Vec<i16>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_secs(&self) -> f32 {
        self.samples.len() as f32 / self.sample_rate as f32
    }
}
