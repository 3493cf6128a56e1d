//! Audio playback to speakers

use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, StreamConfig};

use crate::{Error, Result};

/// Sample rate assumed when the decoder reports none (common TTS output)
const DEFAULT_SAMPLE_RATE: u32 = 24000;

/// Interval between completion/cancellation checks
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Whether the host exposes a default output device
#[must_use]
pub fn output_available() -> bool {
    cpal::default_host().default_output_device().is_some()
}

/// Decoded mono PCM
#[derive(Debug, Clone, PartialEq)]
pub struct Pcm {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

/// Decode MP3 bytes and play them on the default output device
///
/// Blocks until playback finishes or `cancel` is set.
///
/// # Errors
///
/// Returns error if decoding fails or no output device is usable
pub fn play_mp3_blocking(mp3_data: &[u8], cancel: &AtomicBool) -> Result<()> {
    let pcm = decode_mp3(mp3_data)?;
    play_blocking(pcm, cancel)
}

/// Play mono PCM on the default output device
///
/// # Errors
///
/// Returns error if no output device or stream config is usable
pub fn play_blocking(pcm: Pcm, cancel: &AtomicBool) -> Result<()> {
    if pcm.samples.is_empty() {
        return Ok(());
    }

    let device = cpal::default_host()
        .default_output_device()
        .ok_or_else(|| Error::Audio("no output device available".to_string()))?;

    let rate = SampleRate(pcm.sample_rate);
    let supported_config = device
        .supported_output_configs()
        .map_err(|e| Error::Audio(e.to_string()))?
        .filter(|c| c.min_sample_rate() <= rate && c.max_sample_rate() >= rate)
        .min_by_key(|c| c.channels())
        .ok_or_else(|| Error::Audio("no suitable output config found".to_string()))?;

    let config: StreamConfig = supported_config.with_sample_rate(rate).config();
    let channels = usize::from(config.channels);

    let total = pcm.samples.len();
    let samples = Arc::new(pcm.samples);
    let position = Arc::new(AtomicUsize::new(0));

    let stream_samples = Arc::clone(&samples);
    let stream_position = Arc::clone(&position);

    let stream = device
        .build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                let mut pos = stream_position.load(Ordering::Relaxed);
                for frame in data.chunks_mut(channels) {
                    let sample = stream_samples.get(pos).copied().unwrap_or(0.0);
                    frame.fill(sample);
                    if pos < stream_samples.len() {
                        pos += 1;
                    }
                }
                stream_position.store(pos, Ordering::Relaxed);
            },
            |err| {
                tracing::error!(error = %err, "audio playback error");
            },
            None,
        )
        .map_err(|e| Error::Audio(e.to_string()))?;

    stream.play().map_err(|e| Error::Audio(e.to_string()))?;

    let duration_ms = (total as u64 * 1000) / u64::from(pcm.sample_rate);
    let deadline = Instant::now() + Duration::from_millis(duration_ms + 500);

    while position.load(Ordering::Relaxed) < total && Instant::now() < deadline {
        if cancel.load(Ordering::SeqCst) {
            tracing::debug!("playback cancelled");
            return Ok(());
        }
        std::thread::sleep(POLL_INTERVAL);
    }

    // Let the device drain its last buffer
    std::thread::sleep(Duration::from_millis(100));
    drop(stream);

    tracing::debug!(samples = total, "playback complete");
    Ok(())
}

/// Decode MP3 bytes to mono f32 samples
///
/// # Errors
///
/// Returns error on a corrupt stream
pub fn decode_mp3(mp3_data: &[u8]) -> Result<Pcm> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(mp3_data));
    let mut samples = Vec::new();
    let mut sample_rate = None;

    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                sample_rate.get_or_insert(frame.sample_rate);
                if frame.channels == 2 {
                    samples.extend(frame.data.chunks(2).map(|chunk| {
                        let left = f32::from(chunk[0]) / 32768.0;
                        let right = f32::from(chunk.get(1).copied().unwrap_or(chunk[0])) / 32768.0;
                        f32::midpoint(left, right)
                    }));
                } else {
                    samples.extend(frame.data.iter().map(|&s| f32::from(s) / 32768.0));
                }
            }
            Err(minimp3::Error::Eof) => break,
            Err(e) => return Err(Error::Audio(format!("MP3 decode error: {e}"))),
        }
    }

    let sample_rate = sample_rate
        .and_then(|r| u32::try_from(r).ok())
        .unwrap_or(DEFAULT_SAMPLE_RATE);

    Ok(Pcm {
        samples,
        sample_rate,
    })
}
