//! Speech recognition source contract

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

/// Recognizer error kinds surfaced to the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecognitionError {
    /// Microphone access refused
    PermissionDenied,
    /// Recognizer timed out without hearing speech
    NoSpeech,
    /// No microphone hardware, or the device failed
    AudioCapture,
    /// Recognition service unreachable
    Network,
    /// Anything else
    Other,
}

impl fmt::Display for RecognitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            Self::PermissionDenied => "permission-denied",
            Self::NoSpeech => "no-speech",
            Self::AudioCapture => "audio-capture",
            Self::Network => "network",
            Self::Other => "other",
        };
        f.write_str(kind)
    }
}

/// Microphone permission could not be obtained
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("microphone permission denied: {0}")]
pub struct PermissionError(pub String);

/// One recognition result batch
///
/// `finalized` holds segments the recognizer has frozen since the previous
/// update; `interim` is the provisional text still being revised.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecognitionUpdate {
    pub finalized: Vec<String>,
    pub interim: String,
}

impl RecognitionUpdate {
    #[must_use]
    pub fn interim(text: impl Into<String>) -> Self {
        Self {
            finalized: Vec::new(),
            interim: text.into(),
        }
    }

    #[must_use]
    pub fn finalized(text: impl Into<String>) -> Self {
        Self {
            finalized: vec![text.into()],
            interim: String::new(),
        }
    }

    /// Speech is still in progress
    #[must_use]
    pub fn has_interim(&self) -> bool {
        !self.interim.is_empty()
    }
}

/// Lifecycle and result events emitted by a recognizer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceEvent {
    Started,
    Ended,
    Update(RecognitionUpdate),
    Error(RecognitionError),
}

/// Event registration handed to a source when recognition starts
#[derive(Clone)]
pub struct SourceEvents {
    emit: Arc<dyn Fn(SourceEvent) + Send + Sync>,
}

impl SourceEvents {
    pub fn new(emit: impl Fn(SourceEvent) + Send + Sync + 'static) -> Self {
        Self {
            emit: Arc::new(emit),
        }
    }

    pub fn started(&self) {
        (self.emit)(SourceEvent::Started);
    }

    pub fn ended(&self) {
        (self.emit)(SourceEvent::Ended);
    }

    pub fn update(&self, update: RecognitionUpdate) {
        (self.emit)(SourceEvent::Update(update));
    }

    pub fn error(&self, kind: RecognitionError) {
        (self.emit)(SourceEvent::Error(kind));
    }
}

impl fmt::Debug for SourceEvents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceEvents").finish_non_exhaustive()
    }
}

/// Continuous speech recognizer running in interim-results mode, one
/// utterance per start
#[async_trait]
pub trait SpeechSource: Send {
    /// Whether a recognition capability exists at all
    fn is_available(&self) -> bool;

    /// Obtain microphone access
    async fn request_permission(&mut self) -> Result<(), PermissionError>;

    /// Begin recognizing, reporting through `events`; returns whether
    /// recognition actually began
    fn start(&mut self, events: SourceEvents) -> bool;

    /// Stop recognizing; returns whether a running recognition was stopped
    fn stop(&mut self) -> bool;
}
