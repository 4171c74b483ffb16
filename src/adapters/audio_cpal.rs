use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, StreamConfig};
use parking_lot::{Mutex, RwLock};
use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::HeapRb;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::domain::{
    AtomicCaptureState, CaptureConfig, CaptureState, DomainError, InputDevice, PcmBuffer,
};
use crate::ports::AudioCapture;

type RingProducer = ringbuf::HeapProd<i16>;
type RingConsumer = ringbuf::HeapCons<i16>;

/// Commands sent to the audio thread.
enum CaptureCommand {
    Start {
        reply: oneshot::Sender<Result<(), DomainError>>,
    },
    Stop {
        reply: oneshot::Sender<Result<Vec<i16>, DomainError>>,
    },
    Shutdown,
}

fn find_device(selected_device_id: Option<&str>) -> Result<Device, DomainError> {
    let host = cpal::default_host();

    if let Some(id) = selected_device_id {
        let devices = host.input_devices().map_err(|e| DomainError::AudioDevice {
            message: format!("Failed to enumerate devices: {}", e),
        })?;

        for device in devices {
            if let Ok(name) = device.name() {
                if name == id {
                    return Ok(device);
                }
            }
        }
        warn!(device_id = %id, "Selected device not found, falling back to default");
    }

    host.default_input_device()
        .ok_or_else(|| DomainError::AudioDevice {
            message: "No default input device available".to_string(),
        })
}

/// Downmix interleaved frames to mono by averaging channels.
fn downmix(data: &[i16], channels: usize) -> Vec<i16> {
    if channels <= 1 {
        return data.to_vec();
    }
    data.chunks(channels)
        .map(|frame| {
            let sum: i32 = frame.iter().map(|&s| s as i32).sum();
            (sum / channels as i32) as i16
        })
        .collect()
}

/// Linear-interpolation resampler. Good enough for speech headed into a
/// transcription model; not for music.
fn resample(samples: &[i16], from_rate: u32, to_rate: u32) -> Vec<i16> {
    if from_rate == to_rate || samples.is_empty() {
        return samples.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let output_len = (samples.len() as f64 / ratio).ceil() as usize;
    let mut output = Vec::with_capacity(output_len);

    for i in 0..output_len {
        let src_pos = i as f64 * ratio;
        let src_idx = src_pos.floor() as usize;
        let frac = src_pos.fract();

        let sample = if src_idx + 1 < samples.len() {
            let s0 = samples[src_idx] as f64;
            let s1 = samples[src_idx + 1] as f64;
            (s0 + (s1 - s0) * frac) as i16
        } else if src_idx < samples.len() {
            samples[src_idx]
        } else {
            0
        };
        output.push(sample);
    }
    output
}

fn calculate_rms(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f64 = samples.iter().map(|&s| (s as f64).powi(2)).sum();
    let rms = (sum_squares / samples.len() as f64).sqrt();
    (rms / 32767.0).min(1.0) as f32
}

#[allow(clippy::too_many_arguments)]
fn process_input(
    data: &[i16],
    channels: usize,
    device_rate: u32,
    target_rate: u32,
    producer: &mut RingProducer,
    level_window: &mut Vec<i16>,
    samples_per_update: usize,
    current_level: &AtomicU32,
) {
    let mono = downmix(data, channels);
    let resampled = resample(&mono, device_rate, target_rate);

    let _ = producer.push_slice(&resampled);

    level_window.extend_from_slice(&resampled);
    if level_window.len() >= samples_per_update {
        let level = calculate_rms(level_window);
        current_level.store(level.to_bits(), Ordering::Relaxed);
        level_window.clear();
    }
}

fn build_stream(
    device: &Device,
    config: &StreamConfig,
    sample_format: SampleFormat,
    target_rate: u32,
    mut producer: RingProducer,
    current_level: Arc<AtomicU32>,
) -> Result<Stream, DomainError> {
    let channels = config.channels as usize;
    let device_rate = config.sample_rate.0;
    // Update the level readout roughly ten times a second.
    let samples_per_update = (target_rate / 10) as usize;
    let mut level_window = Vec::with_capacity(samples_per_update);

    let err_fn = |err| error!(?err, "Audio stream error");

    let stream = match sample_format {
        SampleFormat::I16 => device.build_input_stream(
            config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                process_input(
                    data,
                    channels,
                    device_rate,
                    target_rate,
                    &mut producer,
                    &mut level_window,
                    samples_per_update,
                    &current_level,
                );
            },
            err_fn,
            None,
        ),
        SampleFormat::F32 => device.build_input_stream(
            config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                let i16_data: Vec<i16> = data
                    .iter()
                    .map(|&s| (s.clamp(-1.0, 1.0) * 32767.0) as i16)
                    .collect();
                process_input(
                    &i16_data,
                    channels,
                    device_rate,
                    target_rate,
                    &mut producer,
                    &mut level_window,
                    samples_per_update,
                    &current_level,
                );
            },
            err_fn,
            None,
        ),
        _ => {
            return Err(DomainError::AudioDevice {
                message: format!("Unsupported sample format: {:?}", sample_format),
            });
        }
    }
    .map_err(|e| DomainError::AudioDevice {
        message: format!("Failed to build stream: {}", e),
    })?;

    Ok(stream)
}

/// Audio thread runner. The cpal `Stream` is not `Send`, so it lives here
/// and is driven over a command channel.
fn capture_thread_main(
    config: CaptureConfig,
    selected_device_id: Arc<RwLock<Option<String>>>,
    state: Arc<AtomicCaptureState>,
    current_level: Arc<AtomicU32>,
    mut cmd_rx: mpsc::Receiver<CaptureCommand>,
) {
    let mut stream: Option<Stream> = None;
    let mut ring_consumer: Option<RingConsumer> = None;

    while let Some(cmd) = cmd_rx.blocking_recv() {
        match cmd {
            CaptureCommand::Start { reply } => {
                let result = (|| -> Result<(), DomainError> {
                    if !state.load().can_start() {
                        return Err(DomainError::AlreadyRecording);
                    }

                    let device_id = selected_device_id.read().clone();
                    let device = find_device(device_id.as_deref())?;
                    let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());

                    let supported =
                        device
                            .default_input_config()
                            .map_err(|e| DomainError::AudioDevice {
                                message: format!("Failed to get default config: {}", e),
                            })?;
                    let stream_config = StreamConfig {
                        channels: supported.channels(),
                        sample_rate: supported.sample_rate(),
                        buffer_size: cpal::BufferSize::Default,
                    };

                    let ring = HeapRb::<i16>::new(config.buffer_capacity());
                    let (producer, consumer) = ring.split();

                    let new_stream = build_stream(
                        &device,
                        &stream_config,
                        supported.sample_format(),
                        config.sample_rate,
                        producer,
                        Arc::clone(&current_level),
                    )?;

                    new_stream.play().map_err(|e| DomainError::AudioDevice {
                        message: format!("Failed to start stream: {}", e),
                    })?;

                    stream = Some(new_stream);
                    ring_consumer = Some(consumer);
                    state.store(CaptureState::Recording);

                    info!(device = %device_name, "Recording started");
                    Ok(())
                })();
                let _ = reply.send(result);
            }
            CaptureCommand::Stop { reply } => {
                let result = (|| -> Result<Vec<i16>, DomainError> {
                    if !state.load().can_stop() {
                        return Err(DomainError::NotRecording);
                    }

                    // Dropping the stream releases the device.
                    stream.take();

                    let mut consumer = ring_consumer.take().ok_or(DomainError::NotRecording)?;
                    let available = consumer.occupied_len();
                    let mut samples = vec![0i16; available];
                    let read = consumer.pop_slice(&mut samples);
                    samples.truncate(read);

                    current_level.store(0f32.to_bits(), Ordering::Relaxed);
                    state.store(CaptureState::Idle);

                    info!(samples = samples.len(), "Recording stopped");
                    Ok(samples)
                })();
                let _ = reply.send(result);
            }
            CaptureCommand::Shutdown => break,
        }
    }
    debug!("Capture thread shutting down");
}

/// cpal-based microphone capture.
///
/// A dedicated thread owns the stream; `start_recording` and
/// `stop_recording` round-trip through its command channel.
pub struct CpalCapture {
    config: CaptureConfig,
    state: Arc<AtomicCaptureState>,
    current_level: Arc<AtomicU32>,
    selected_device_id: Arc<RwLock<Option<String>>>,
    recording_start: Mutex<Option<Instant>>,
    cmd_tx: mpsc::Sender<CaptureCommand>,
    thread_handle: Mutex<Option<JoinHandle<()>>>,
}

impl CpalCapture {
    pub fn new(config: CaptureConfig) -> Result<Self, DomainError> {
        let state = Arc::new(AtomicCaptureState::default());
        let current_level = Arc::new(AtomicU32::new(0));
        let selected_device_id = Arc::new(RwLock::new(None));

        let (cmd_tx, cmd_rx) = mpsc::channel(16);

        let thread_config = config.clone();
        let thread_device_id = Arc::clone(&selected_device_id);
        let thread_state = Arc::clone(&state);
        let thread_level = Arc::clone(&current_level);

        let thread_handle = thread::Builder::new()
            .name("audio-capture".to_string())
            .spawn(move || {
                capture_thread_main(
                    thread_config,
                    thread_device_id,
                    thread_state,
                    thread_level,
                    cmd_rx,
                )
            })
            .map_err(|e| DomainError::AudioDevice {
                message: format!("Failed to spawn audio thread: {}", e),
            })?;

        info!(
            buffer_duration = config.buffer_duration_secs,
            sample_rate = config.sample_rate,
            "CpalCapture initialized"
        );

        Ok(Self {
            config,
            state,
            current_level,
            selected_device_id,
            recording_start: Mutex::new(None),
            cmd_tx,
            thread_handle: Mutex::new(Some(thread_handle)),
        })
    }

    fn list_devices_internal(&self) -> Result<Vec<InputDevice>, DomainError> {
        let host = cpal::default_host();
        let default_name = host.default_input_device().and_then(|d| d.name().ok());

        let devices = host.input_devices().map_err(|e| DomainError::AudioDevice {
            message: format!("Failed to enumerate devices: {}", e),
        })?;

        let mut result = Vec::new();
        let mut name_counts: std::collections::HashMap<String, usize> =
            std::collections::HashMap::new();

        for device in devices {
            if let Ok(name) = device.name() {
                // Disambiguate duplicate device names with an index suffix.
                let count = name_counts.entry(name.clone()).or_insert(0);
                let id = if *count == 0 {
                    name.clone()
                } else {
                    format!("{}:{}", name, count)
                };
                *count += 1;

                result.push(InputDevice {
                    id,
                    name: name.clone(),
                    is_default: Some(&name) == default_name.as_ref(),
                });
            }
        }

        debug!(count = result.len(), "Listed input devices");
        Ok(result)
    }
}

impl Drop for CpalCapture {
    fn drop(&mut self) {
        // try_send: Drop may run inside the async runtime, where blocking
        // on the channel would panic. Only join once the thread was told
        // to stop; otherwise it ends with the process.
        if self.cmd_tx.try_send(CaptureCommand::Shutdown).is_ok() {
            if let Some(handle) = self.thread_handle.lock().take() {
                let _ = handle.join();
            }
        }
    }
}

#[async_trait]
impl AudioCapture for CpalCapture {
    async fn start_recording(&self) -> Result<(), DomainError> {
        let (reply_tx, reply_rx) = oneshot::channel();

        self.cmd_tx
            .send(CaptureCommand::Start { reply: reply_tx })
            .await
            .map_err(|_| DomainError::AudioDevice {
                message: "Audio thread not running".to_string(),
            })?;

        reply_rx.await.map_err(|_| DomainError::AudioDevice {
            message: "Audio thread did not respond".to_string(),
        })??;

        *self.recording_start.lock() = Some(Instant::now());
        Ok(())
    }

    async fn stop_recording(&self) -> Result<PcmBuffer, DomainError> {
        let (reply_tx, reply_rx) = oneshot::channel();

        self.cmd_tx
            .send(CaptureCommand::Stop { reply: reply_tx })
            .await
            .map_err(|_| DomainError::AudioDevice {
                message: "Audio thread not running".to_string(),
            })?;

        let samples = reply_rx.await.map_err(|_| DomainError::AudioDevice {
            message: "Audio thread did not respond".to_string(),
        })??;

        let duration = self
            .recording_start
            .lock()
            .take()
            .map(|t| t.elapsed().as_secs_f32())
            .unwrap_or(0.0);

        let buffer = PcmBuffer::new(samples, self.config.sample_rate);
        info!(
            duration_secs = duration,
            samples = buffer.len(),
            "Capture drained"
        );
        Ok(buffer)
    }

    fn state(&self) -> CaptureState {
        self.state.load()
    }

    fn list_input_devices(&self) -> Result<Vec<InputDevice>, DomainError> {
        self.list_devices_internal()
    }

    fn select_input_device(&self, device_id: Option<&str>) -> Result<(), DomainError> {
        if let Some(id) = device_id {
            let devices = self.list_devices_internal()?;
            if !devices.iter().any(|d| d.id == id) {
                return Err(DomainError::AudioDevice {
                    message: format!("Device not found: {}", id),
                });
            }
        }

        *self.selected_device_id.write() = device_id.map(String::from);
        info!(device_id = ?device_id, "Input device selected");
        Ok(())
    }

    fn current_duration(&self) -> f32 {
        self.recording_start
            .lock()
            .as_ref()
            .map(|t| t.elapsed().as_secs_f32())
            .unwrap_or(0.0)
    }

    fn current_level(&self) -> f32 {
        f32::from_bits(self.current_level.load(Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rms_of_silence_is_zero() {
        assert_eq!(calculate_rms(&[]), 0.0);
        assert_eq!(calculate_rms(&[0, 0, 0]), 0.0);
    }

    #[test]
    fn rms_of_full_scale_is_one() {
        let max_rms = calculate_rms(&[32767, 32767, 32767]);
        assert!((max_rms - 1.0).abs() < 0.001);
    }

    #[test]
    fn downmix_averages_stereo_frames() {
        let stereo = vec![100, 300, -200, 200];
        assert_eq!(downmix(&stereo, 2), vec![200, 0]);
    }

    #[test]
    fn downmix_passes_mono_through() {
        let mono = vec![1, 2, 3];
        assert_eq!(downmix(&mono, 1), mono);
    }

    #[test]
    fn resample_same_rate_is_identity() {
        let samples = vec![100, 200, 300, 400];
        assert_eq!(resample(&samples, 48000, 48000), samples);
    }

    #[test]
    fn resample_downsample_shrinks() {
        let samples: Vec<i16> = (0..48).map(|i| i * 100).collect();
        let result = resample(&samples, 48000, 16000);
        assert!(result.len() >= 15 && result.len() <= 17);
    }

    #[test]
    fn resample_upsample_grows() {
        let samples = vec![0, 1000, 2000, 3000];
        let result = resample(&samples, 8000, 16000);
        assert!(result.len() >= 7 && result.len() <= 9);
    }
}
