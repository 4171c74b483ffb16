use std::fs;
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use crate::domain::audio::PcmBuffer;
use crate::domain::DomainError;

/// Upload size cap enforced by the service (20 MB). Checked client-side
/// so an oversized file fails fast instead of after the upload.
pub const MAX_SAMPLE_BYTES: u64 = 20 * 1024 * 1024;

/// File extensions the service accepts for uploads.
pub const ALLOWED_EXTENSIONS: &[&str] = &["mp3", "wav", "m4a", "ogg", "webm"];

/// Where a sample came from. Purely informational; both paths produce the
/// same kind of sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleOrigin {
    Capture,
    Upload,
}

/// An owned audio sample ready for upload: either a WAV-encoded
/// microphone capture or the raw bytes of a user-supplied file.
///
/// The byte buffer is shared, not copied, when the sample is handed to a
/// pipeline call.
#[derive(Debug, Clone)]
pub struct AudioSample {
    bytes: Arc<Vec<u8>>,
    file_name: String,
    origin: SampleOrigin,
}

impl AudioSample {
    /// Encode captured PCM as an in-memory WAV file.
    pub fn from_pcm(buffer: &PcmBuffer) -> Result<Self, DomainError> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: buffer.sample_rate(),
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut bytes = Vec::new();
        {
            let mut writer = hound::WavWriter::new(Cursor::new(&mut bytes), spec)?;
            for &sample in buffer.samples() {
                writer.write_sample(sample)?;
            }
            writer.finalize()?;
        }

        Ok(Self {
            bytes: Arc::new(bytes),
            file_name: "recording.wav".to_string(),
            origin: SampleOrigin::Capture,
        })
    }

    /// Load an audio file from disk, validating extension and size
    /// against the service's upload rules.
    pub fn from_file(path: &Path) -> Result<Self, DomainError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
            return Err(DomainError::UnsupportedFileType(
                path.display().to_string(),
            ));
        }

        let size = fs::metadata(path)?.len();
        if size > MAX_SAMPLE_BYTES {
            return Err(DomainError::SampleTooLarge {
                size,
                limit: MAX_SAMPLE_BYTES,
            });
        }

        let bytes = fs::read(path)?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload.wav")
            .to_string();

        Ok(Self {
            bytes: Arc::new(bytes),
            file_name,
            origin: SampleOrigin::Upload,
        })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn origin(&self) -> SampleOrigin {
        self.origin
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}
