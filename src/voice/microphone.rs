//! Microphone recognizer: capture, energy segmentation and hosted STT

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::activity::{Activity, SegmentDetector};
use super::capture::{self, SAMPLE_RATE};
use super::source::{
    PermissionError, RecognitionError, RecognitionUpdate, SourceEvents, SpeechSource,
};
use super::stt::SpeechToText;
use crate::Error;

/// Interim text reported while speech is heard but not yet transcribed
pub const PENDING_INTERIM: &str = "…";

/// Chunks buffered between the capture thread and the recognizer task
const CHUNK_QUEUE: usize = 64;

/// One running recognition
struct ActiveRecognition {
    stop: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

/// Recognizes speech from the default input device
pub struct MicrophoneSource {
    stt: Option<Arc<SpeechToText>>,
    active: Option<ActiveRecognition>,
}

impl MicrophoneSource {
    /// Create a recognizer; without a transcription client it reports
    /// itself unavailable
    #[must_use]
    pub fn new(stt: Option<SpeechToText>) -> Self {
        Self {
            stt: stt.map(Arc::new),
            active: None,
        }
    }

    /// Running and not asked to stop
    fn is_running(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|a| !a.stop.load(Ordering::SeqCst) && !a.task.is_finished())
    }
}

#[async_trait]
impl SpeechSource for MicrophoneSource {
    fn is_available(&self) -> bool {
        self.stt.is_some()
    }

    async fn request_permission(&mut self) -> Result<(), PermissionError> {
        let available = tokio::task::spawn_blocking(capture::input_available)
            .await
            .unwrap_or(false);

        if available {
            Ok(())
        } else {
            Err(PermissionError("no input device available".to_string()))
        }
    }

    fn start(&mut self, events: SourceEvents) -> bool {
        let Some(stt) = self.stt.clone() else {
            return false;
        };
        if self.is_running() {
            tracing::debug!("recognition already running");
            return false;
        }

        // A stopping run still owns the input stream until its task ends
        let previous = self
            .active
            .take()
            .map(|a| a.task)
            .filter(|task| !task.is_finished());

        let stop = Arc::new(AtomicBool::new(false));
        let task = tokio::spawn(run(previous, stt, events, Arc::clone(&stop)));
        self.active = Some(ActiveRecognition { stop, task });

        tracing::info!("microphone recognition started");
        true
    }

    fn stop(&mut self) -> bool {
        if !self.is_running() {
            return false;
        }
        if let Some(active) = &self.active {
            active.stop.store(true, Ordering::SeqCst);
        }
        tracing::info!("microphone recognition stopping");
        true
    }
}

impl Drop for MicrophoneSource {
    fn drop(&mut self) {
        if let Some(active) = self.active.take() {
            active.stop.store(true, Ordering::SeqCst);
            active.task.abort();
        }
    }
}

/// Wait out the previous run, then capture and recognize
async fn run(
    previous: Option<JoinHandle<()>>,
    stt: Arc<SpeechToText>,
    events: SourceEvents,
    stop: Arc<AtomicBool>,
) {
    if let Some(previous) = previous {
        let _ = previous.await;
    }

    let (tx, rx) = mpsc::channel(CHUNK_QUEUE);
    let capture = capture::spawn_capture_thread(Arc::clone(&stop), tx);
    recognize(rx, capture, stt, events, stop).await;
}

/// Recognition loop: segments audio and transcribes each segment
async fn recognize(
    mut chunks: mpsc::Receiver<Vec<f32>>,
    capture: std::thread::JoinHandle<crate::Result<()>>,
    stt: Arc<SpeechToText>,
    events: SourceEvents,
    stop: Arc<AtomicBool>,
) {
    events.started();

    let (done_tx, mut done_rx) = mpsc::channel::<crate::Result<String>>(8);
    let mut detector = SegmentDetector::new();
    let mut in_flight = 0usize;
    let mut transcribed_any = false;

    let failure = loop {
        tokio::select! {
            chunk = chunks.recv() => {
                let Some(samples) = chunk else {
                    break capture_failure(capture).await;
                };
                if stop.load(Ordering::SeqCst) {
                    continue;
                }

                match detector.process(&samples) {
                    Activity::Voiced => events.update(RecognitionUpdate::interim(PENDING_INTERIM)),
                    Activity::Segment(segment) => {
                        in_flight += 1;
                        events.update(RecognitionUpdate::interim(PENDING_INTERIM));
                        spawn_transcription(&stt, segment, done_tx.clone());
                    }
                    Activity::NoSpeech if in_flight == 0 && !transcribed_any => {
                        break Some(RecognitionError::NoSpeech);
                    }
                    Activity::Waiting | Activity::Pause | Activity::NoSpeech => {
                        // Keep the silence timer alive while a transcription is pending
                        if in_flight > 0 {
                            events.update(RecognitionUpdate::interim(PENDING_INTERIM));
                        }
                    }
                }
            }
            Some(result) = done_rx.recv() => {
                in_flight = in_flight.saturating_sub(1);
                match result {
                    Ok(text) if !text.is_empty() => {
                        transcribed_any = true;
                        events.update(RecognitionUpdate::finalized(text));
                    }
                    Ok(_) => {
                        tracing::debug!("segment contained no words");
                        if in_flight == 0 && !transcribed_any {
                            break Some(RecognitionError::NoSpeech);
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "transcription failed");
                        break Some(map_stt_error(&e));
                    }
                }
            }
        }
    };

    stop.store(true, Ordering::SeqCst);
    if let Some(kind) = failure {
        events.error(kind);
    }
    events.ended();
    tracing::debug!("microphone recognition ended");
}

fn spawn_transcription(
    stt: &Arc<SpeechToText>,
    segment: Vec<f32>,
    done: mpsc::Sender<crate::Result<String>>,
) {
    let stt = Arc::clone(stt);
    tokio::spawn(async move {
        let result = match capture::samples_to_wav(&segment, SAMPLE_RATE) {
            Ok(wav) => stt.transcribe(wav).await,
            Err(e) => Err(e),
        };
        let _ = done.send(result).await;
    });
}

/// Classify the end of the capture thread
async fn capture_failure(
    capture: std::thread::JoinHandle<crate::Result<()>>,
) -> Option<RecognitionError> {
    match tokio::task::spawn_blocking(move || capture.join()).await {
        Ok(Ok(Ok(()))) => None,
        Ok(Ok(Err(e))) => {
            tracing::error!(error = %e, "audio capture failed");
            Some(RecognitionError::AudioCapture)
        }
        Ok(Err(_)) | Err(_) => {
            tracing::error!("audio capture thread panicked");
            Some(RecognitionError::AudioCapture)
        }
    }
}

/// Map a transcription failure to a recognizer error kind
#[must_use]
pub fn map_stt_error(error: &Error) -> RecognitionError {
    match error {
        Error::Http(_) | Error::Stt(_) => RecognitionError::Network,
        Error::Audio(_) => RecognitionError::AudioCapture,
        _ => RecognitionError::Other,
    }
}
