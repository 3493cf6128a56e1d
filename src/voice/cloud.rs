//! Hosted speech synthesis played on the default output device

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use super::playback;
use super::sink::{SpeechDone, SpeechSink};
use super::tts::TextToSpeech;

/// Speaks through a hosted TTS endpoint
pub struct CloudSpeechSink {
    tts: Option<Arc<TextToSpeech>>,
    output: bool,
    cancel: Option<Arc<AtomicBool>>,
}

impl CloudSpeechSink {
    /// Create a sink; it is unavailable without a TTS client or an output device
    #[must_use]
    pub fn new(tts: Option<TextToSpeech>) -> Self {
        let output = playback::output_available();
        if !output {
            tracing::warn!("no audio output device found");
        }
        Self {
            tts: tts.map(Arc::new),
            output,
            cancel: None,
        }
    }

    fn cancel_current(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel.store(true, Ordering::SeqCst);
        }
    }
}

impl SpeechSink for CloudSpeechSink {
    fn is_available(&self) -> bool {
        self.tts.is_some() && self.output
    }

    fn speak(&mut self, text: &str, done: SpeechDone) -> bool {
        if !self.is_available() {
            return false;
        }
        let Some(tts) = self.tts.clone() else {
            return false;
        };

        self.cancel_current();
        let cancel = Arc::new(AtomicBool::new(false));
        self.cancel = Some(Arc::clone(&cancel));

        let text = text.to_string();
        tokio::spawn(async move {
            let audio = match tts.synthesize(&text).await {
                Ok(audio) => audio,
                Err(e) => {
                    tracing::error!(error = %e, "speech synthesis failed");
                    if !cancel.load(Ordering::SeqCst) {
                        done.finish();
                    }
                    return;
                }
            };

            if cancel.load(Ordering::SeqCst) {
                tracing::debug!("utterance preempted before playback");
                return;
            }

            let flag = Arc::clone(&cancel);
            let played =
                tokio::task::spawn_blocking(move || playback::play_mp3_blocking(&audio, &flag))
                    .await;

            match played {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::error!(error = %e, "speech playback failed"),
                Err(e) => tracing::error!(error = %e, "playback task failed"),
            }

            if !cancel.load(Ordering::SeqCst) {
                done.finish();
            }
        });

        true
    }

    fn stop(&mut self) -> bool {
        if !self.is_available() {
            return false;
        }
        self.cancel_current();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_without_tts() {
        let mut sink = CloudSpeechSink::new(None);
        assert!(!sink.is_available());
        assert!(!sink.speak("你好", SpeechDone::ignore()));
        assert!(!sink.stop());
    }
}
