//! Microphone capture
//!
//! Opens the default input device at whatever rate and channel count it
//! prefers. The capture thread converts what it drains to 16 kHz mono.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use cpal::Stream;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tokio::sync::mpsc;

use super::resample::AudioConverter;
use crate::{Error, Result};

/// Sample rate handed to segmentation and STT
pub const SAMPLE_RATE: u32 = 16000;

/// Interval between buffer drains on the capture thread
const DRAIN_INTERVAL: Duration = Duration::from_millis(100);

/// Whether the host exposes a default input device
#[must_use]
pub fn input_available() -> bool {
    cpal::default_host().default_input_device().is_some()
}

/// A running input stream on the default device
///
/// Stops when dropped. The stream handle is not `Send`, so the capture
/// lives on the thread that opened it.
pub struct AudioCapture {
    _stream: Stream,
    buffer: Arc<Mutex<Vec<f32>>>,
    source_rate: u32,
    channels: usize,
}

impl AudioCapture {
    /// Open the default input device and start capturing
    ///
    /// # Errors
    ///
    /// Returns error if there is no input device or the stream cannot start
    pub fn open() -> Result<Self> {
        let device = cpal::default_host()
            .default_input_device()
            .ok_or_else(|| Error::Audio("no input device available".to_string()))?;

        let supported = device
            .default_input_config()
            .map_err(|e| Error::Audio(e.to_string()))?;
        let source_rate = supported.sample_rate().0;
        let channels = usize::from(supported.channels());

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            source_rate,
            channels,
            "opening audio capture"
        );

        let buffer = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&buffer);

        let stream = device
            .build_input_stream(
                &supported.config(),
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if let Ok(mut buf) = sink.lock() {
                        buf.extend_from_slice(data);
                    }
                },
                |err| {
                    tracing::error!(error = %err, "audio capture error");
                },
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))?;

        stream.play().map_err(|e| Error::Audio(e.to_string()))?;

        Ok(Self {
            _stream: stream,
            buffer,
            source_rate,
            channels,
        })
    }

    /// Device sample rate
    #[must_use]
    pub const fn source_rate(&self) -> u32 {
        self.source_rate
    }

    /// Device channel count
    #[must_use]
    pub const fn channels(&self) -> usize {
        self.channels
    }

    /// Take the interleaved device samples captured since the last call
    #[must_use]
    pub fn drain(&self) -> Vec<f32> {
        self.buffer
            .lock()
            .map(|mut buf| std::mem::take(&mut *buf))
            .unwrap_or_default()
    }
}

/// Run capture on a dedicated thread, forwarding roughly 100 ms chunks of
/// 16 kHz mono
///
/// The thread exits when `stop` is set or the receiver is dropped. Open
/// and conversion failures are reported as the thread's result.
pub fn spawn_capture_thread(
    stop: Arc<AtomicBool>,
    chunks: mpsc::Sender<Vec<f32>>,
) -> std::thread::JoinHandle<Result<()>> {
    std::thread::spawn(move || {
        let capture = AudioCapture::open()?;
        let mut converter = AudioConverter::new(capture.source_rate(), capture.channels())?;
        tracing::debug!("audio capture started");

        while !stop.load(Ordering::SeqCst) {
            std::thread::sleep(DRAIN_INTERVAL);
            let samples = converter.process(&capture.drain())?;
            if samples.is_empty() {
                continue;
            }
            if chunks.blocking_send(samples).is_err() {
                break;
            }
        }

        tracing::debug!("audio capture stopped");
        Ok(())
    })
}

/// Root-mean-square energy of a block of samples
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

/// Encode mono samples as a 16-bit PCM WAV upload
///
/// # Errors
///
/// Returns error if WAV encoding fails
pub fn samples_to_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let audio_err = |e: hound::Error| Error::Audio(e.to_string());

    let mut cursor = std::io::Cursor::new(Vec::with_capacity(44 + samples.len() * 2));
    let mut writer = hound::WavWriter::new(&mut cursor, spec).map_err(audio_err)?;
    for &sample in samples {
        #[allow(clippy::cast_possible_truncation)]
        let pcm = (sample.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16;
        writer.write_sample(pcm).map_err(audio_err)?;
    }
    writer.finalize().map_err(audio_err)?;

    Ok(cursor.into_inner())
}
