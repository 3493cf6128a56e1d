//! Conversion of captured device audio to 16 kHz mono

use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

use super::capture::SAMPLE_RATE;
use crate::{Error, Result};

/// Input frames handed to the resampler per call
const CHUNK_FRAMES: usize = 1024;

/// Downmixes interleaved device audio and resamples it to [`SAMPLE_RATE`]
///
/// Input that does not fill a resampler chunk is held until the next call.
pub struct AudioConverter {
    channels: usize,
    resampler: Option<SincFixedIn<f32>>,
    pending: Vec<f32>,
}

impl AudioConverter {
    /// Create a converter for a device running at `source_rate` with
    /// `channels` interleaved channels
    ///
    /// # Errors
    ///
    /// Returns error if the resampler rejects the rate pair
    pub fn new(source_rate: u32, channels: usize) -> Result<Self> {
        let resampler = if source_rate == SAMPLE_RATE {
            None
        } else {
            let params = SincInterpolationParameters {
                sinc_len: 256,
                f_cutoff: 0.95,
                interpolation: SincInterpolationType::Linear,
                oversampling_factor: 256,
                window: WindowFunction::BlackmanHarris2,
            };
            let ratio = f64::from(SAMPLE_RATE) / f64::from(source_rate);
            let resampler = SincFixedIn::new(ratio, 2.0, params, CHUNK_FRAMES, 1)
                .map_err(|e| Error::Audio(format!("resampler init failed: {e}")))?;
            Some(resampler)
        };

        tracing::debug!(
            source_rate,
            channels,
            resampling = resampler.is_some(),
            "audio converter ready"
        );

        Ok(Self {
            channels: channels.max(1),
            resampler,
            pending: Vec::new(),
        })
    }

    /// Convert a block of interleaved samples
    ///
    /// # Errors
    ///
    /// Returns error if resampling fails
    pub fn process(&mut self, interleaved: &[f32]) -> Result<Vec<f32>> {
        let mono = downmix(interleaved, self.channels);
        let Some(resampler) = self.resampler.as_mut() else {
            return Ok(mono);
        };

        self.pending.extend(mono);
        let mut out = Vec::new();
        loop {
            let needed = resampler.input_frames_next();
            if self.pending.len() < needed {
                break;
            }
            let chunk: Vec<f32> = self.pending.drain(..needed).collect();
            let waves = resampler
                .process(&[chunk], None)
                .map_err(|e| Error::Audio(format!("resample failed: {e}")))?;
            if let Some(wave) = waves.into_iter().next() {
                out.extend(wave);
            }
        }

        Ok(out)
    }
}

/// Average interleaved frames down to one channel
fn downmix(data: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return data.to_vec();
    }
    #[allow(clippy::cast_precision_loss)]
    let scale = 1.0 / channels as f32;
    data.chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() * scale)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::voice::rms;

    #[allow(clippy::cast_precision_loss)]
    fn tone(freq: f32, rate: u32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| {
                let t = i as f32 / rate as f32;
                0.5 * (2.0 * std::f32::consts::PI * freq).mul_add(t, 0.3).sin()
            })
            .collect()
    }

    /// Feed 100 ms device blocks, as the capture thread does
    fn convert(converter: &mut AudioConverter, input: &[f32], block: usize) -> Vec<f32> {
        let mut out = Vec::new();
        for chunk in input.chunks(block) {
            out.extend(converter.process(chunk).unwrap());
        }
        out
    }

    #[test]
    fn test_downmix_averages_frames() {
        assert_eq!(downmix(&[0.25, 0.75, -1.0, 1.0], 2), vec![0.5, 0.0]);
        assert_eq!(downmix(&[0.1, 0.2], 1), vec![0.1, 0.2]);
    }

    #[test]
    fn test_matching_rate_only_downmixes() {
        let mut converter = AudioConverter::new(SAMPLE_RATE, 2).unwrap();
        let out = converter.process(&[0.25, 0.75, 0.5, 0.5, -1.0, 1.0]).unwrap();
        assert_eq!(out, vec![0.5, 0.5, 0.0]);
    }

    #[test]
    fn test_output_rate_is_sixteen_khz() {
        let mut converter = AudioConverter::new(48_000, 1).unwrap();
        let out = convert(&mut converter, &tone(1_000.0, 48_000, 48_000), 4_800);

        // One second in, minus input still held for the next chunk
        assert!(out.len() > 15_000 && out.len() <= 16_000, "{}", out.len());
    }

    #[test]
    fn test_speech_band_tone_passes() {
        let mut converter = AudioConverter::new(48_000, 1).unwrap();
        let out = convert(&mut converter, &tone(1_000.0, 48_000, 48_000), 4_800);

        let level = rms(&out[512..]);
        assert!((level - 0.354).abs() < 0.03, "{level}");
    }

    #[test]
    fn test_tone_above_nyquist_does_not_alias() {
        let mut converter = AudioConverter::new(48_000, 1).unwrap();
        let out = convert(&mut converter, &tone(12_000.0, 48_000, 48_000), 4_800);

        // 12 kHz cannot be represented at 16 kHz and must not fold to 4 kHz
        assert!(rms(&out[512..]) < 0.01, "{}", rms(&out[512..]));
    }

    #[test]
    fn test_stereo_device_is_downmixed_before_resampling() {
        let mono = tone(1_000.0, 44_100, 44_100);
        let stereo: Vec<f32> = mono.iter().flat_map(|&s| [s, s]).collect();

        let mut converter = AudioConverter::new(44_100, 2).unwrap();
        let out = convert(&mut converter, &stereo, 8_820);

        assert!(out.len() > 15_000 && out.len() <= 16_000, "{}", out.len());
        assert!((rms(&out[512..]) - 0.354).abs() < 0.03);
    }
}
