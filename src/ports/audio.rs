use async_trait::async_trait;

use crate::domain::{CaptureState, DomainError, InputDevice, PcmBuffer};

/// Port for microphone capture.
///
/// Implementations own the platform audio stream. The device is acquired
/// on `start_recording` and released unconditionally by `stop_recording`,
/// which drains everything buffered since the start into one PCM buffer.
#[async_trait]
pub trait AudioCapture: Send + Sync {
    /// Start capturing from the selected input device.
    ///
    /// Fails if already recording or no device is available; a denied or
    /// missing microphone leaves the capture idle with no sample.
    async fn start_recording(&self) -> Result<(), DomainError>;

    /// Stop capturing, release the device, and return the buffered PCM
    /// (16-bit mono at the configured rate).
    async fn stop_recording(&self) -> Result<PcmBuffer, DomainError>;

    /// Current capture state.
    fn state(&self) -> CaptureState;

    /// List available input devices.
    fn list_input_devices(&self) -> Result<Vec<InputDevice>, DomainError>;

    /// Select an input device by ID, or the system default if None.
    fn select_input_device(&self, device_id: Option<&str>) -> Result<(), DomainError>;

    /// Current recording duration in seconds (0.0 when idle).
    fn current_duration(&self) -> f32;

    /// Current RMS input level in 0.0..=1.0 (0.0 when idle).
    fn current_level(&self) -> f32;
}
