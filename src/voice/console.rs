//! Typed-text stand-in for the recognizer

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;

use super::source::{
    PermissionError, RecognitionError, RecognitionUpdate, SourceEvents, SpeechSource,
};

/// Recognizes one typed line per start
///
/// Lines arrive over a channel so the caller owns the terminal. Each line
/// is reported as interim text, then as a final segment, then recognition
/// ends naturally. A blank line counts as no speech.
pub struct ConsoleSource {
    lines: Arc<Mutex<mpsc::Receiver<String>>>,
    active: Option<(JoinHandle<()>, SourceEvents)>,
}

impl ConsoleSource {
    #[must_use]
    pub fn new(lines: mpsc::Receiver<String>) -> Self {
        Self {
            lines: Arc::new(Mutex::new(lines)),
            active: None,
        }
    }

    /// A source together with the sender that feeds it
    #[must_use]
    pub fn channel() -> (Self, mpsc::Sender<String>) {
        let (tx, rx) = mpsc::channel(8);
        (Self::new(rx), tx)
    }
}

#[async_trait]
impl SpeechSource for ConsoleSource {
    fn is_available(&self) -> bool {
        true
    }

    async fn request_permission(&mut self) -> Result<(), PermissionError> {
        Ok(())
    }

    fn start(&mut self, events: SourceEvents) -> bool {
        if self.active.as_ref().is_some_and(|(task, _)| !task.is_finished()) {
            return false;
        }

        let lines = Arc::clone(&self.lines);
        let task_events = events.clone();
        let task = tokio::spawn(async move {
            task_events.started();

            let line = lines.lock().await.recv().await;
            match line.map(|l| l.trim().to_string()) {
                Some(text) if !text.is_empty() => {
                    tracing::debug!(text = %text, "typed utterance");
                    task_events.update(RecognitionUpdate::interim(text.clone()));
                    task_events.update(RecognitionUpdate::finalized(text));
                }
                Some(_) => task_events.error(RecognitionError::NoSpeech),
                None => {
                    tracing::debug!("console input closed");
                    task_events.error(RecognitionError::AudioCapture);
                }
            }
            task_events.ended();
        });

        self.active = Some((task, events));
        true
    }

    fn stop(&mut self) -> bool {
        let Some((task, events)) = self.active.take() else {
            return false;
        };
        if task.is_finished() {
            return false;
        }
        task.abort();
        events.ended();
        true
    }
}
