//! Listening session controller
//!
//! One task owns every piece of mutable session state and consumes a single
//! event channel. Toggles from the UI, recognizer callbacks, timer expiries,
//! answer arrivals and speech completions all become events on that channel, so
//! transitions run to completion one at a time. The UI observes a
//! [`SessionView`] published on a watch channel.
//!
//! Every utterance carries a generation token. Events tagged with an older
//! generation (late recognizer callbacks, silence timers of an abandoned
//! utterance, answers to a superseded question) are dropped.

pub mod messages;

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use crate::answer::AnswerProvider;
use crate::config::SessionConfig;
use crate::filter;
use crate::history::HistoryEntry;
use crate::settings::SharedSettings;
use crate::voice::{SourceEvent, SourceEvents, SpeechDone, SpeechSink, SpeechSource};
use crate::{Error, Result};

/// Exclusive session state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Waiting for the child to start talking
    #[default]
    Idle,
    /// Recognizer running, accumulating the utterance
    Listening,
    /// Question sent, waiting for the answer
    Processing,
    /// Reply being spoken
    Speaking,
}

impl SessionState {
    /// Human-readable description of the state
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Listening => "listening",
            Self::Processing => "asking",
            Self::Speaking => "speaking",
        }
    }
}

/// What the UI shows
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionView {
    pub state: SessionState,
    /// Status or error line
    pub feedback: Option<String>,
    /// Last reply (or a temporary notice in its place)
    pub answer: Option<String>,
}

impl SessionView {
    #[must_use]
    pub fn is_listening(&self) -> bool {
        self.state == SessionState::Listening
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.state == SessionState::Processing
    }
}

/// Outcome of a single question
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Question contained a banned word; the refusal is the reply
    Refused,
    /// Reply from the answer provider
    Answer(String),
}

impl Reply {
    /// Text to display and speak
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::Refused => messages::REFUSAL,
            Self::Answer(answer) => answer,
        }
    }
}

/// Filter, ask and record one question outside a listening session
///
/// Refused questions never reach the provider and leave no history.
pub async fn answer_once(
    question: &str,
    settings: &SharedSettings,
    answers: &dyn AnswerProvider,
) -> Reply {
    if is_banned(question, settings) {
        tracing::info!("question refused by content filter");
        return Reply::Refused;
    }

    let answer = answers.ask(question).await;
    if let Err(e) = settings.record(HistoryEntry::now(question, answer.clone())) {
        tracing::warn!(error = %e, "failed to record history entry");
    }
    Reply::Answer(answer)
}

fn is_banned(question: &str, settings: &SharedSettings) -> bool {
    let banned = settings.banned_words().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "banned word list unavailable, filtering nothing");
        Vec::new()
    });
    filter::check(question, &banned)
}

/// Events consumed by the controller task
#[derive(Debug)]
enum SessionEvent {
    Toggle(Option<oneshot::Sender<()>>),
    Source {
        utterance: u64,
        event: SourceEvent,
    },
    SilenceElapsed {
        utterance: u64,
    },
    Answered {
        utterance: u64,
        question: String,
        answer: String,
    },
    SpeechFinished {
        speech: u64,
    },
    NoticeExpired {
        speech: u64,
        answer: String,
    },
    Shutdown,
}

/// Cloneable handle for driving a running session
#[derive(Debug, Clone)]
pub struct SessionHandle {
    events: mpsc::UnboundedSender<SessionEvent>,
    view: watch::Receiver<SessionView>,
}

impl SessionHandle {
    /// Toggle listening and wait until the controller has handled it
    ///
    /// # Errors
    ///
    /// Returns error if the controller has shut down
    pub async fn toggle(&self) -> Result<()> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.send(SessionEvent::Toggle(Some(ack_tx)))?;
        ack_rx
            .await
            .map_err(|_| Error::Voice("session controller stopped".to_string()))
    }

    /// Current view
    #[must_use]
    pub fn view(&self) -> SessionView {
        self.view.borrow().clone()
    }

    /// Receiver that observes every published view
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionView> {
        self.view.clone()
    }

    /// Wait until the published view satisfies `predicate`
    ///
    /// # Errors
    ///
    /// Returns error if the controller stops first
    pub async fn wait_for(&self, predicate: impl FnMut(&SessionView) -> bool) -> Result<SessionView> {
        let mut view = self.view.clone();
        let seen = view
            .wait_for(predicate)
            .await
            .map_err(|_| Error::Voice("session controller stopped".to_string()))?
            .clone();
        Ok(seen)
    }

    /// Stop the controller, its recognizer and any speech
    pub fn shutdown(&self) {
        let _ = self.events.send(SessionEvent::Shutdown);
    }

    fn send(&self, event: SessionEvent) -> Result<()> {
        self.events
            .send(event)
            .map_err(|_| Error::Voice("session controller stopped".to_string()))
    }
}

/// Owns the session state machine
pub struct SessionController {
    source: Box<dyn SpeechSource>,
    sink: Box<dyn SpeechSink>,
    answers: Arc<dyn AnswerProvider>,
    settings: SharedSettings,
    config: SessionConfig,

    events_tx: mpsc::UnboundedSender<SessionEvent>,
    events_rx: mpsc::UnboundedReceiver<SessionEvent>,
    view_tx: watch::Sender<SessionView>,
    view: SessionView,

    /// Token of the current utterance
    generation: u64,
    /// Token of the utterance being spoken
    speech: u64,
    /// Finalized segments of the current utterance
    transcript: String,
    silence_timer: Option<JoinHandle<()>>,
    source_ended: bool,
}

impl SessionController {
    /// Create a controller and the handle that drives it
    pub fn new(
        source: Box<dyn SpeechSource>,
        sink: Box<dyn SpeechSink>,
        answers: Arc<dyn AnswerProvider>,
        settings: SharedSettings,
        config: SessionConfig,
    ) -> (Self, SessionHandle) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (view_tx, view_rx) = watch::channel(SessionView::default());

        let handle = SessionHandle {
            events: events_tx.clone(),
            view: view_rx,
        };

        let controller = Self {
            source,
            sink,
            answers,
            settings,
            config,
            events_tx,
            events_rx,
            view_tx,
            view: SessionView::default(),
            generation: 0,
            speech: 0,
            transcript: String::new(),
            silence_timer: None,
            source_ended: false,
        };

        (controller, handle)
    }

    /// Spawn a controller on the current runtime
    pub fn spawn(
        source: Box<dyn SpeechSource>,
        sink: Box<dyn SpeechSink>,
        answers: Arc<dyn AnswerProvider>,
        settings: SharedSettings,
        config: SessionConfig,
    ) -> (SessionHandle, JoinHandle<()>) {
        let (controller, handle) = Self::new(source, sink, answers, settings, config);
        let task = tokio::spawn(controller.run());
        (handle, task)
    }

    /// Process events until shutdown
    pub async fn run(mut self) {
        tracing::debug!("session controller started");

        while let Some(event) = self.events_rx.recv().await {
            match event {
                SessionEvent::Toggle(ack) => {
                    self.toggle().await;
                    if let Some(ack) = ack {
                        let _ = ack.send(());
                    }
                }
                SessionEvent::Source { utterance, event } => self.on_source(utterance, event),
                SessionEvent::SilenceElapsed { utterance } => self.on_silence(utterance),
                SessionEvent::Answered {
                    utterance,
                    question,
                    answer,
                } => self.on_answer(utterance, question, answer),
                SessionEvent::SpeechFinished { speech } => self.on_speech_finished(speech),
                SessionEvent::NoticeExpired { speech, answer } => {
                    self.on_notice_expired(speech, &answer);
                }
                SessionEvent::Shutdown => break,
            }
        }

        self.cancel_silence_timer();
        self.source.stop();
        self.sink.stop();
        tracing::debug!("session controller stopped");
    }

    async fn toggle(&mut self) {
        match self.view.state {
            SessionState::Idle => self.start_listening().await,
            SessionState::Listening => self.stop_listening(),
            SessionState::Processing | SessionState::Speaking => {
                tracing::info!(state = self.view.state.description(), "interrupted by new question");
                self.sink.stop();
                self.generation += 1;
                self.view.state = SessionState::Idle;
                self.start_listening().await;
            }
        }
    }

    async fn start_listening(&mut self) {
        if !self.source.is_available() {
            tracing::warn!("speech recognition unavailable");
            self.view.feedback = Some(messages::RECOGNITION_UNAVAILABLE.to_string());
            self.publish();
            return;
        }

        if let Err(e) = self.source.request_permission().await {
            tracing::warn!(error = %e, "microphone permission not granted");
            self.view.feedback = Some(messages::PERMISSION_DENIED.to_string());
            self.publish();
            return;
        }

        self.generation += 1;
        self.transcript.clear();
        self.source_ended = false;

        let utterance = self.generation;
        let tx = self.events_tx.clone();
        let events = SourceEvents::new(move |event| {
            let _ = tx.send(SessionEvent::Source { utterance, event });
        });

        if self.source.start(events) {
            tracing::info!(utterance, "listening");
            self.view.state = SessionState::Listening;
            self.view.feedback = Some(messages::LISTENING.to_string());
            self.view.answer = None;
        } else {
            tracing::warn!("recognizer failed to start");
            self.view.feedback = Some(messages::START_FAILED.to_string());
        }
        self.publish();
    }

    fn stop_listening(&mut self) {
        tracing::info!(utterance = self.generation, "listening stopped by user");
        self.cancel_silence_timer();
        self.source.stop();
        // Late callbacks from the stopped recognizer become stale
        self.generation += 1;
        self.transcript.clear();
        self.view.state = SessionState::Idle;
        self.view.feedback = None;
        self.publish();
    }

    fn is_current_utterance(&self, utterance: u64) -> bool {
        utterance == self.generation && self.view.state == SessionState::Listening
    }

    fn on_source(&mut self, utterance: u64, event: SourceEvent) {
        if !self.is_current_utterance(utterance) {
            tracing::trace!(utterance, ?event, "stale recognizer event");
            return;
        }

        match event {
            SourceEvent::Started => tracing::debug!(utterance, "recognizer started"),
            SourceEvent::Update(update) => {
                for segment in &update.finalized {
                    self.transcript.push_str(segment);
                }
                if update.has_interim() {
                    self.restart_silence_timer();
                }
            }
            SourceEvent::Ended => {
                self.source_ended = true;
                if self.silence_timer.is_some() {
                    tracing::debug!(utterance, "recognizer ended, awaiting silence timer");
                } else {
                    tracing::debug!(utterance, "recognizer ended without pending speech");
                    self.transcript.clear();
                    self.view.state = SessionState::Idle;
                    self.view.feedback = None;
                    self.publish();
                }
            }
            SourceEvent::Error(kind) => {
                tracing::warn!(utterance, error = %kind, "recognition error");
                self.cancel_silence_timer();
                self.transcript.clear();
                self.view.state = SessionState::Idle;
                self.view.feedback = Some(messages::recognition_error(kind).to_string());
                self.publish();
            }
        }
    }

    fn restart_silence_timer(&mut self) {
        self.cancel_silence_timer();

        let utterance = self.generation;
        let timeout = self.config.silence_timeout;
        let tx = self.events_tx.clone();
        self.silence_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let _ = tx.send(SessionEvent::SilenceElapsed { utterance });
        }));
    }

    fn cancel_silence_timer(&mut self) {
        if let Some(timer) = self.silence_timer.take() {
            timer.abort();
        }
    }

    fn on_silence(&mut self, utterance: u64) {
        if !self.is_current_utterance(utterance) {
            tracing::trace!(utterance, "stale silence timer");
            return;
        }
        self.silence_timer = None;

        if !self.source_ended {
            self.source.stop();
        }

        let question = std::mem::take(&mut self.transcript).trim().to_string();
        if question.is_empty() {
            tracing::debug!(utterance, "silence with nothing finalized");
            self.view.state = SessionState::Idle;
            self.view.feedback = None;
            self.publish();
            return;
        }

        tracing::info!(utterance, question = %question, "utterance complete");
        self.on_question(question);
    }

    fn on_question(&mut self, question: String) {
        if is_banned(&question, &self.settings) {
            tracing::info!("question refused by content filter");
            self.view.feedback = None;
            self.view.answer = Some(messages::REFUSAL.to_string());
            self.speak(messages::REFUSAL.to_string());
            self.publish();
            return;
        }

        self.view.state = SessionState::Processing;
        self.view.feedback = Some(messages::ASKING.to_string());
        self.publish();

        let utterance = self.generation;
        let answers = Arc::clone(&self.answers);
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let answer = answers.ask(&question).await;
            let _ = tx.send(SessionEvent::Answered {
                utterance,
                question,
                answer,
            });
        });
    }

    fn on_answer(&mut self, utterance: u64, question: String, answer: String) {
        if utterance != self.generation || self.view.state != SessionState::Processing {
            tracing::debug!(utterance, "discarding stale answer");
            return;
        }

        if let Err(e) = self.settings.record(HistoryEntry::now(question, answer.clone())) {
            tracing::warn!(error = %e, "failed to record history entry");
        }

        self.view.feedback = None;
        self.view.answer = Some(answer.clone());
        self.speak(answer);
        self.publish();
    }

    /// Speak `text`; sets the state to `Speaking`, or to `Idle` with a
    /// temporary notice when no synthesizer exists
    fn speak(&mut self, text: String) {
        self.speech += 1;
        let speech = self.speech;

        let tx = self.events_tx.clone();
        let done = SpeechDone::new(move || {
            let _ = tx.send(SessionEvent::SpeechFinished { speech });
        });

        if self.sink.speak(&text, done) {
            self.view.state = SessionState::Speaking;
            return;
        }

        tracing::warn!("speech synthesis unavailable");
        self.view.state = SessionState::Idle;
        self.view.answer = Some(messages::SYNTHESIS_UNAVAILABLE.to_string());

        let notice = self.config.notice_duration;
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(notice).await;
            let _ = tx.send(SessionEvent::NoticeExpired { speech, answer: text });
        });
    }

    fn on_speech_finished(&mut self, speech: u64) {
        if speech != self.speech || self.view.state != SessionState::Speaking {
            tracing::trace!(speech, "stale speech completion");
            return;
        }
        self.view.state = SessionState::Idle;
        self.publish();
    }

    fn on_notice_expired(&mut self, speech: u64, answer: &str) {
        if speech != self.speech
            || self.view.answer.as_deref() != Some(messages::SYNTHESIS_UNAVAILABLE)
        {
            return;
        }
        self.view.answer = Some(answer.to_string());
        self.publish();
    }

    fn publish(&self) {
        self.view_tx.send_replace(self.view.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_view_flags_follow_state() {
        let mut view = SessionView::default();
        assert!(!view.is_listening());
        assert!(!view.is_loading());

        view.state = SessionState::Listening;
        assert!(view.is_listening());
        assert!(!view.is_loading());

        view.state = SessionState::Processing;
        assert!(!view.is_listening());
        assert!(view.is_loading());
    }

    #[test]
    fn test_reply_text() {
        assert_eq!(Reply::Refused.text(), messages::REFUSAL);
        assert_eq!(Reply::Answer("月亮".to_string()).text(), "月亮");
    }
}
