//! User-facing session text

use crate::voice::RecognitionError;

pub const LISTENING: &str = "Listening...";
pub const ASKING: &str = "Asking Mr. Learning...";

/// Spoken reply when a question contains a banned word
pub const REFUSAL: &str = "Sorry, that's not a good question!";

pub const RECOGNITION_UNAVAILABLE: &str = "This device doesn't support voice recognition.";
pub const START_FAILED: &str = "Couldn't start listening. Please try again.";
pub const PERMISSION_DENIED: &str = "Please allow microphone access to use voice input.";

/// Shown in place of the answer while no synthesizer exists
pub const SYNTHESIS_UNAVAILABLE: &str = "Cantonese voice not supported on this device";

/// Feedback for a recognizer error
#[must_use]
pub const fn recognition_error(kind: RecognitionError) -> &'static str {
    match kind {
        RecognitionError::PermissionDenied => PERMISSION_DENIED,
        RecognitionError::NoSpeech => "No speech detected. Please try again.",
        RecognitionError::AudioCapture => "No microphone detected. Please connect a microphone.",
        RecognitionError::Network => "Network error. Please check your connection.",
        RecognitionError::Other => "Couldn't hear you, try again!",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_each_error_kind_has_distinct_text() {
        let kinds = [
            RecognitionError::PermissionDenied,
            RecognitionError::NoSpeech,
            RecognitionError::AudioCapture,
            RecognitionError::Network,
            RecognitionError::Other,
        ];
        let mut texts: Vec<_> = kinds.iter().map(|k| recognition_error(*k)).collect();
        texts.sort_unstable();
        texts.dedup();
        assert_eq!(texts.len(), kinds.len());
    }
}
