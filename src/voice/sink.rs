//! Speech synthesis sink contract

use std::fmt;

/// Prosody applied to synthesized speech
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeechProfile {
    /// Speaking rate multiplier (1.0 = normal)
    pub rate: f32,
    /// Pitch multiplier (1.0 = normal)
    pub pitch: f32,
}

impl Default for SpeechProfile {
    fn default() -> Self {
        Self {
            rate: 0.95,
            pitch: 1.2,
        }
    }
}

/// Completion notifier for one utterance
///
/// Consumed when playback finishes; dropping it without calling
/// [`SpeechDone::finish`] reports nothing.
pub struct SpeechDone {
    notify: Option<Box<dyn FnOnce() + Send>>,
}

impl SpeechDone {
    pub fn new(notify: impl FnOnce() + Send + 'static) -> Self {
        Self {
            notify: Some(Box::new(notify)),
        }
    }

    /// A notifier that reports nowhere
    #[must_use]
    pub fn ignore() -> Self {
        Self { notify: None }
    }

    pub fn finish(mut self) {
        if let Some(notify) = self.notify.take() {
            notify();
        }
    }
}

impl fmt::Debug for SpeechDone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpeechDone")
            .field("pending", &self.notify.is_some())
            .finish()
    }
}

/// Text-to-speech output; at most one utterance is audible at a time
pub trait SpeechSink: Send {
    /// Whether a synthesis capability exists
    fn is_available(&self) -> bool;

    /// Cancel any current utterance and speak `text`
    ///
    /// Returns `false` when no synthesis capability exists. `done` is
    /// finished once the utterance has been played out.
    fn speak(&mut self, text: &str, done: SpeechDone) -> bool;

    /// Cancel the current utterance; returns `false` without a capability
    fn stop(&mut self) -> bool;
}
