//! Energy-based speech segmentation for the microphone recognizer

use super::capture::{SAMPLE_RATE, rms};

/// Minimum audio energy threshold to consider speech
const ENERGY_THRESHOLD: f32 = 0.03;

/// Minimum duration of speech worth transcribing (0.3 seconds)
const MIN_SPEECH_SAMPLES: usize = 4800;

/// Silence that closes a segment (0.5 seconds)
const SILENCE_SAMPLES: usize = 8000;

/// Silence before any speech that ends recognition (8 seconds)
const NO_SPEECH_SAMPLES: usize = SAMPLE_RATE as usize * 8;

/// What a chunk of audio meant for the current utterance
#[derive(Debug, Clone, PartialEq)]
pub enum Activity {
    /// Nothing heard yet
    Waiting,
    /// Speech in progress
    Voiced,
    /// Pause inside a segment, not yet long enough to close it
    Pause,
    /// A voiced segment followed by enough silence; ready to transcribe
    Segment(Vec<f32>),
    /// No speech at all within the allowed time
    NoSpeech,
}

/// Splits a sample stream into voiced segments
#[derive(Debug, Default)]
pub struct SegmentDetector {
    speech_buffer: Vec<f32>,
    voiced_samples: usize,
    silence_counter: usize,
    waited: usize,
    heard_speech: bool,
}

impl SegmentDetector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk of samples
    pub fn process(&mut self, samples: &[f32]) -> Activity {
        let is_speech = rms(samples) > ENERGY_THRESHOLD;

        if self.speech_buffer.is_empty() {
            if !is_speech {
                self.waited += samples.len();
                if !self.heard_speech && self.waited > NO_SPEECH_SAMPLES {
                    tracing::debug!("no speech before timeout");
                    return Activity::NoSpeech;
                }
                return Activity::Waiting;
            }
            tracing::trace!("speech detected");
        }

        self.speech_buffer.extend_from_slice(samples);

        if is_speech {
            self.heard_speech = true;
            self.voiced_samples += samples.len();
            self.silence_counter = 0;
            return Activity::Voiced;
        }

        self.silence_counter += samples.len();
        if self.silence_counter <= SILENCE_SAMPLES {
            return Activity::Pause;
        }

        let segment = std::mem::take(&mut self.speech_buffer);
        let voiced = std::mem::take(&mut self.voiced_samples);
        self.silence_counter = 0;
        self.waited = 0;

        if voiced < MIN_SPEECH_SAMPLES {
            tracing::trace!(voiced, "segment too short, discarded");
            return Activity::Waiting;
        }

        tracing::debug!(samples = segment.len(), "speech segment complete");
        Activity::Segment(segment)
    }

    /// Whether any speech has been heard since creation
    #[must_use]
    pub const fn heard_speech(&self) -> bool {
        self.heard_speech
    }
}
