//! Audio capture module using cpal for cross-platform microphone access
//!
//! Captures audio from the default input device into an in-memory
//! buffer, downmixed to mono PCM. The finished recording is resampled
//! to the transcription service's expected rate and packed into a WAV
//! container only once capture stops.

mod types;

pub use types::{AudioCaptureError, AudioCaptureHandle, RecordedAudio};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SampleFormat;
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use tracing::{error, info};

/// Sample rate expected by the transcription service (16kHz)
pub const TARGET_SAMPLE_RATE: u32 = 16_000;

/// Resampler input chunk size in frames
const RESAMPLE_CHUNK: usize = 1024;

/// Start audio capture on a dedicated thread
///
/// Initializes the default audio input device and begins accumulating
/// mono samples at the device's native rate. Call
/// [`AudioCaptureHandle::stop`] to end the capture and collect them.
pub(crate) fn start_capture() -> Result<AudioCaptureHandle, AudioCaptureError> {
    let is_capturing = Arc::new(AtomicBool::new(true));
    let samples = Arc::new(Mutex::new(Vec::new()));
    let sample_rate = Arc::new(AtomicU32::new(0));

    let thread_is_capturing = is_capturing.clone();
    let thread_samples = samples.clone();
    let thread_sample_rate = sample_rate.clone();

    let thread_handle = thread::spawn(move || {
        if let Err(e) = run_capture(thread_is_capturing, thread_samples, thread_sample_rate) {
            error!("Audio capture error: {}", e);
        }
    });

    Ok(AudioCaptureHandle {
        is_capturing,
        samples,
        sample_rate,
        thread_handle: Some(thread_handle),
    })
}

/// Run audio capture on the current thread (blocking)
fn run_capture(
    is_capturing: Arc<AtomicBool>,
    samples: Arc<Mutex<Vec<i16>>>,
    sample_rate_out: Arc<AtomicU32>,
) -> Result<(), AudioCaptureError> {
    let host = cpal::default_host();

    let device = host
        .default_input_device()
        .ok_or(AudioCaptureError::NoInputDevice)?;

    let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
    info!("Using audio input device: {}", device_name);

    let supported_config = device.default_input_config()?;
    let sample_format = supported_config.sample_format();
    let config: cpal::StreamConfig = supported_config.into();
    let channels = config.channels as usize;
    let sample_rate = config.sample_rate.0;
    sample_rate_out.store(sample_rate, Ordering::SeqCst);

    info!("Audio config: {} channels, {} Hz", channels, sample_rate);

    let err_callback = |err| {
        error!("Audio stream error: {}", err);
    };

    let stream = match sample_format {
        SampleFormat::I16 => {
            let is_capturing_cb = is_capturing.clone();
            let samples_cb = samples.clone();
            device.build_input_stream(
                &config,
                move |data: &[i16], _| {
                    if !is_capturing_cb.load(Ordering::SeqCst) {
                        return;
                    }
                    let mono = downmix(data, channels);
                    if let Ok(mut buf) = samples_cb.lock() {
                        buf.extend(mono);
                    }
                },
                err_callback,
                None,
            )?
        }
        SampleFormat::F32 => {
            let is_capturing_cb = is_capturing.clone();
            let samples_cb = samples.clone();
            device.build_input_stream(
                &config,
                move |data: &[f32], _| {
                    if !is_capturing_cb.load(Ordering::SeqCst) {
                        return;
                    }
                    let as_i16: Vec<i16> = data
                        .iter()
                        .map(|&s| (s.clamp(-1.0, 1.0) * 32767.0) as i16)
                        .collect();
                    let mono = downmix(&as_i16, channels);
                    if let Ok(mut buf) = samples_cb.lock() {
                        buf.extend(mono);
                    }
                },
                err_callback,
                None,
            )?
        }
        other => {
            return Err(AudioCaptureError::UnsupportedFormat(format!("{:?}", other)));
        }
    };

    stream.play()?;
    info!("Audio capture started");

    // Keep the stream alive until capture is stopped
    while is_capturing.load(Ordering::SeqCst) {
        thread::sleep(std::time::Duration::from_millis(100));
    }

    drop(stream);
    Ok(())
}

/// Convert interleaved samples to mono by averaging channels
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

/// Resample a finished recording to [`TARGET_SAMPLE_RATE`].
///
/// Recordings already at the target rate pass through unchanged. The
/// final partial chunk is zero-padded, which adds at most a fraction
/// of a second of silence at the tail.
pub(crate) fn resample_to_target(audio: &RecordedAudio) -> Vec<i16> {
    if audio.sample_rate == TARGET_SAMPLE_RATE
        || audio.sample_rate == 0
        || audio.samples.is_empty()
    {
        return audio.samples.clone();
    }

    info!(
        "Resampling recording: {} Hz -> {} Hz",
        audio.sample_rate, TARGET_SAMPLE_RATE
    );

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let mut resampler = match SincFixedIn::<f32>::new(
        TARGET_SAMPLE_RATE as f64 / audio.sample_rate as f64,
        2.0,
        params,
        RESAMPLE_CHUNK,
        1, // mono
    ) {
        Ok(resampler) => resampler,
        Err(e) => {
            error!("Failed to create resampler: {}", e);
            return audio.samples.clone();
        }
    };

    let mut input: Vec<f32> = audio
        .samples
        .iter()
        .map(|&s| s as f32 / 32768.0)
        .collect();
    let pad = (RESAMPLE_CHUNK - input.len() % RESAMPLE_CHUNK) % RESAMPLE_CHUNK;
    input.extend(std::iter::repeat(0.0).take(pad));

    let mut output = Vec::with_capacity(input.len());
    for chunk in input.chunks(RESAMPLE_CHUNK) {
        match resampler.process(&[chunk.to_vec()], None) {
            Ok(resampled) => {
                output.extend(
                    resampled[0]
                        .iter()
                        .map(|&s| (s.clamp(-1.0, 1.0) * 32767.0) as i16),
                );
            }
            Err(e) => {
                error!("Resampling error: {}", e);
            }
        }
    }
    output
}

/// Encode mono 16-bit PCM samples as a WAV container.
pub(crate) fn encode_wav(samples: &[i16], sample_rate: u32) -> Vec<u8> {
    let data_len = (samples.len() * 2) as u32;
    let byte_rate = sample_rate * 2;

    let mut wav = Vec::with_capacity(44 + samples.len() * 2);
    wav.extend_from_slice(b"RIFF");
    wav.extend_from_slice(&(36 + data_len).to_le_bytes());
    wav.extend_from_slice(b"WAVE");
    wav.extend_from_slice(b"fmt ");
    wav.extend_from_slice(&16u32.to_le_bytes()); // fmt chunk size
    wav.extend_from_slice(&1u16.to_le_bytes()); // PCM
    wav.extend_from_slice(&1u16.to_le_bytes()); // mono
    wav.extend_from_slice(&sample_rate.to_le_bytes());
    wav.extend_from_slice(&byte_rate.to_le_bytes());
    wav.extend_from_slice(&2u16.to_le_bytes()); // block align
    wav.extend_from_slice(&16u16.to_le_bytes()); // bits per sample
    wav.extend_from_slice(b"data");
    wav.extend_from_slice(&data_len.to_le_bytes());
    for sample in samples {
        wav.extend_from_slice(&sample.to_le_bytes());
    }
    wav
}
