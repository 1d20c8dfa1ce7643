//! Audio types and error definitions

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use tracing::info;

/// A finished recording: mono 16-bit PCM at the device's native rate.
#[derive(Debug, Clone)]
pub struct RecordedAudio {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
}

/// Handle for controlling audio capture from outside the capture thread
///
/// Stopping the capture yields everything recorded since it started.
pub struct AudioCaptureHandle {
    pub(super) is_capturing: Arc<AtomicBool>,
    pub(super) samples: Arc<Mutex<Vec<i16>>>,
    pub(super) sample_rate: Arc<AtomicU32>,
    pub(super) thread_handle: Option<JoinHandle<()>>,
}

impl AudioCaptureHandle {
    /// Stop capturing and collect the recorded samples.
    pub fn stop(mut self) -> RecordedAudio {
        self.is_capturing.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }

        let samples = self
            .samples
            .lock()
            .map(|mut buf| std::mem::take(&mut *buf))
            .unwrap_or_default();
        let sample_rate = self.sample_rate.load(Ordering::SeqCst);

        info!(
            samples = samples.len(),
            sample_rate, "Audio capture stopped"
        );
        RecordedAudio {
            samples,
            sample_rate,
        }
    }
}

/// Errors that can occur during audio capture
#[derive(Debug, thiserror::Error)]
pub enum AudioCaptureError {
    #[error("No audio input device found")]
    NoInputDevice,

    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),

    #[error("Audio stream error: {0}")]
    StreamError(#[from] cpal::BuildStreamError),

    #[error("Audio play error: {0}")]
    PlayError(#[from] cpal::PlayStreamError),

    #[error("Default config error: {0}")]
    DefaultConfigError(#[from] cpal::DefaultStreamConfigError),
}
