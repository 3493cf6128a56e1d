//! Shared test utilities

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use mr_learning::config::SessionConfig;
use mr_learning::voice::{
    PermissionError, RecognitionError, RecognitionUpdate, SourceEvent, SourceEvents, SpeechDone,
    SpeechSink, SpeechSource,
};
use mr_learning::{
    AnswerProvider, SessionController, SessionHandle, SharedSettings, SqliteStore, db,
};

/// Settings over an in-memory database
#[must_use]
pub fn memory_settings() -> SharedSettings {
    let pool = db::init_memory().expect("failed to init test db");
    SharedSettings::load(Arc::new(SqliteStore::new(pool))).expect("failed to load settings")
}

/// What the scripted recognizer has been asked to do
#[derive(Default)]
struct SourceLog {
    events: Option<SourceEvents>,
    starts: usize,
    stops: usize,
}

/// Recognizer double driven by the test through a [`SourceControl`]
pub struct ScriptedSource {
    log: Arc<Mutex<SourceLog>>,
    available: bool,
    permission: bool,
    start_ok: bool,
}

impl ScriptedSource {
    #[must_use]
    pub fn new() -> (Self, SourceControl) {
        let log = Arc::new(Mutex::new(SourceLog::default()));
        let source = Self {
            log: Arc::clone(&log),
            available: true,
            permission: true,
            start_ok: true,
        };
        (source, SourceControl { log })
    }

    #[must_use]
    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    #[must_use]
    pub fn without_permission(mut self) -> Self {
        self.permission = false;
        self
    }

    #[must_use]
    pub fn failing_start(mut self) -> Self {
        self.start_ok = false;
        self
    }
}

#[async_trait]
impl SpeechSource for ScriptedSource {
    fn is_available(&self) -> bool {
        self.available
    }

    async fn request_permission(&mut self) -> Result<(), PermissionError> {
        if self.permission {
            Ok(())
        } else {
            Err(PermissionError("denied by test".to_string()))
        }
    }

    fn start(&mut self, events: SourceEvents) -> bool {
        let mut log = self.log.lock().unwrap();
        log.starts += 1;
        if !self.start_ok {
            return false;
        }
        events.started();
        log.events = Some(events);
        true
    }

    fn stop(&mut self) -> bool {
        let mut log = self.log.lock().unwrap();
        log.stops += 1;
        log.events.is_some()
    }
}

/// Test-side handle that plays the recognizer's part
#[derive(Clone)]
pub struct SourceControl {
    log: Arc<Mutex<SourceLog>>,
}

impl SourceControl {
    /// Event registration of the most recent start
    #[must_use]
    pub fn events(&self) -> SourceEvents {
        self.log
            .lock()
            .unwrap()
            .events
            .clone()
            .expect("recognizer was never started")
    }

    pub fn emit(&self, event: SourceEvent) {
        let events = self.events();
        match event {
            SourceEvent::Started => events.started(),
            SourceEvent::Ended => events.ended(),
            SourceEvent::Update(update) => events.update(update),
            SourceEvent::Error(kind) => events.error(kind),
        }
    }

    /// A finalized segment plus trailing interim text, as a recognizer
    /// reports the end of a phrase
    pub fn say(&self, text: &str) {
        self.emit(SourceEvent::Update(RecognitionUpdate {
            finalized: vec![text.to_string()],
            interim: text.to_string(),
        }));
    }

    pub fn interim(&self, text: &str) {
        self.emit(SourceEvent::Update(RecognitionUpdate::interim(text)));
    }

    pub fn ended(&self) {
        self.emit(SourceEvent::Ended);
    }

    pub fn error(&self, kind: RecognitionError) {
        self.emit(SourceEvent::Error(kind));
    }

    #[must_use]
    pub fn starts(&self) -> usize {
        self.log.lock().unwrap().starts
    }

    #[must_use]
    pub fn stops(&self) -> usize {
        self.log.lock().unwrap().stops
    }
}

/// Synthesizer double that records every utterance and finishes at once
pub struct RecordingSink {
    spoken: Arc<Mutex<Vec<String>>>,
    stops: Arc<Mutex<usize>>,
    available: bool,
}

impl RecordingSink {
    #[must_use]
    pub fn new() -> (Self, Arc<Mutex<Vec<String>>>) {
        let spoken = Arc::new(Mutex::new(Vec::new()));
        let sink = Self {
            spoken: Arc::clone(&spoken),
            stops: Arc::new(Mutex::new(0)),
            available: true,
        };
        (sink, spoken)
    }

    #[must_use]
    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }
}

impl SpeechSink for RecordingSink {
    fn is_available(&self) -> bool {
        self.available
    }

    fn speak(&mut self, text: &str, done: SpeechDone) -> bool {
        if !self.available {
            return false;
        }
        self.spoken.lock().unwrap().push(text.to_string());
        done.finish();
        true
    }

    fn stop(&mut self) -> bool {
        *self.stops.lock().unwrap() += 1;
        self.available
    }
}

/// Answer provider double that records questions
pub struct CountingProvider {
    asked: Arc<Mutex<Vec<String>>>,
    answer: String,
    delay: Duration,
}

impl CountingProvider {
    #[must_use]
    pub fn new(answer: &str) -> (Self, Arc<Mutex<Vec<String>>>) {
        let asked = Arc::new(Mutex::new(Vec::new()));
        let provider = Self {
            asked: Arc::clone(&asked),
            answer: answer.to_string(),
            delay: Duration::ZERO,
        };
        (provider, asked)
    }

    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl AnswerProvider for CountingProvider {
    async fn ask(&self, question: &str) -> String {
        self.asked.lock().unwrap().push(question.to_string());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.answer.clone()
    }
}

/// A running controller wired to test doubles
pub struct Harness {
    pub handle: SessionHandle,
    pub source: SourceControl,
    pub spoken: Arc<Mutex<Vec<String>>>,
    pub asked: Arc<Mutex<Vec<String>>>,
    pub settings: SharedSettings,
}

impl Harness {
    /// Spawn a controller with the default 1.5 s silence timeout
    #[must_use]
    pub fn spawn(
        (source, control): (ScriptedSource, SourceControl),
        (sink, spoken): (RecordingSink, Arc<Mutex<Vec<String>>>),
        (provider, asked): (CountingProvider, Arc<Mutex<Vec<String>>>),
    ) -> Self {
        let settings = memory_settings();
        let (handle, _task) = SessionController::spawn(
            Box::new(source),
            Box::new(sink),
            Arc::new(provider),
            settings.clone(),
            SessionConfig::default(),
        );
        Self {
            handle,
            source: control,
            spoken,
            asked,
            settings,
        }
    }

    /// Controller with a working recognizer, synthesizer and provider
    #[must_use]
    pub fn standard(answer: &str) -> Self {
        Self::spawn(
            ScriptedSource::new(),
            RecordingSink::new(),
            CountingProvider::new(answer),
        )
    }

    #[must_use]
    pub fn asked(&self) -> Vec<String> {
        self.asked.lock().unwrap().clone()
    }

    #[must_use]
    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap().clone()
    }

    #[must_use]
    pub fn history_len(&self) -> usize {
        self.settings.lock().unwrap().history().len()
    }
}
