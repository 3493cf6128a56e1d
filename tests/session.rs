//! Session controller integration tests
//!
//! Drive the controller with scripted recognizer events on a paused clock.

use std::time::Duration;

use mr_learning::session::messages;
use mr_learning::voice::RecognitionError;
use mr_learning::{FALLBACK_ANSWERS, SessionState};

mod common;

use common::{CountingProvider, Harness, RecordingSink, ScriptedSource};

const ANSWER: &str = "月亮係圍住地球轉嘅衛星。";

async fn advance(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

#[tokio::test(start_paused = true)]
async fn test_toggle_enters_listening() {
    let h = Harness::standard(ANSWER);

    h.handle.toggle().await.unwrap();

    let view = h.handle.view();
    assert_eq!(view.state, SessionState::Listening);
    assert!(view.is_listening());
    assert_eq!(view.feedback.as_deref(), Some(messages::LISTENING));
    assert_eq!(h.source.starts(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_silence_timer_delivers_final_transcript() {
    let h = Harness::standard(ANSWER);
    h.handle.toggle().await.unwrap();

    h.source.say("What is the moon?");

    advance(1400).await;
    assert!(h.asked().is_empty());
    assert_eq!(h.source.stops(), 0);
    assert!(h.handle.view().is_listening());

    advance(200).await;
    assert_eq!(h.asked(), vec!["What is the moon?".to_string()]);
    assert_eq!(h.source.stops(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_interim_results_reset_the_timer() {
    let h = Harness::standard(ANSWER);
    h.handle.toggle().await.unwrap();

    h.source.say("What is");
    advance(1000).await;
    h.source.say(" the moon?");
    advance(1000).await;
    assert!(h.asked().is_empty());

    advance(600).await;
    assert_eq!(h.asked(), vec!["What is the moon?".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_clean_question_is_answered_recorded_and_spoken() {
    let h = Harness::standard(ANSWER);
    h.handle.toggle().await.unwrap();

    h.source.say("What is the moon?");
    advance(1600).await;
    let view = h
        .handle
        .wait_for(|v| v.state == SessionState::Idle)
        .await
        .unwrap();

    assert_eq!(view.answer.as_deref(), Some(ANSWER));
    assert_eq!(view.feedback, None);
    assert_eq!(h.spoken(), vec![ANSWER.to_string()]);

    let settings = h.settings.lock().unwrap();
    let history = settings.history().entries();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].question, "What is the moon?");
    assert_eq!(history[0].answer, ANSWER);
}

#[tokio::test(start_paused = true)]
async fn test_banned_question_is_refused_without_asking() {
    let h = Harness::standard(ANSWER);
    h.settings.lock().unwrap().add_banned_word("moon").unwrap();

    h.handle.toggle().await.unwrap();
    h.source.say("What is the MOON made of?");
    advance(1600).await;

    let view = h
        .handle
        .wait_for(|v| v.state == SessionState::Idle)
        .await
        .unwrap();
    assert_eq!(view.answer.as_deref(), Some(messages::REFUSAL));
    assert!(h.asked().is_empty());
    assert_eq!(h.spoken(), vec![messages::REFUSAL.to_string()]);
    assert_eq!(h.history_len(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_processing_shows_asking_feedback() {
    let (provider, asked) = CountingProvider::new(ANSWER);
    let h = Harness::spawn(
        ScriptedSource::new(),
        RecordingSink::new(),
        (provider.with_delay(Duration::from_secs(2)), asked),
    );
    h.handle.toggle().await.unwrap();

    h.source.say("Why is the sky blue?");
    advance(1600).await;

    let view = h.handle.view();
    assert_eq!(view.state, SessionState::Processing);
    assert!(view.is_loading());
    assert_eq!(view.feedback.as_deref(), Some(messages::ASKING));

    advance(2000).await;
    assert_eq!(h.handle.view().answer.as_deref(), Some(ANSWER));
}

#[tokio::test(start_paused = true)]
async fn test_natural_end_with_pending_timer_still_delivers() {
    let h = Harness::standard(ANSWER);
    h.handle.toggle().await.unwrap();

    h.source.say("What is a rainbow?");
    advance(100).await;
    h.source.ended();
    advance(100).await;
    assert!(h.handle.view().is_listening());

    advance(1500).await;
    assert_eq!(h.asked(), vec!["What is a rainbow?".to_string()]);
    // The recognizer had already ended on its own
    assert_eq!(h.source.stops(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_natural_end_without_timer_returns_idle() {
    let h = Harness::standard(ANSWER);
    h.handle.toggle().await.unwrap();

    h.source.ended();
    let view = h
        .handle
        .wait_for(|v| v.state == SessionState::Idle)
        .await
        .unwrap();

    assert_eq!(view.feedback, None);
    advance(3000).await;
    assert!(h.asked().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_silence_with_only_interim_text_asks_nothing() {
    let h = Harness::standard(ANSWER);
    h.handle.toggle().await.unwrap();

    h.source.interim("um");
    advance(1600).await;

    assert_eq!(h.handle.view().state, SessionState::Idle);
    assert!(h.asked().is_empty());
    assert_eq!(h.source.stops(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_manual_stop_discards_utterance() {
    let h = Harness::standard(ANSWER);
    h.handle.toggle().await.unwrap();

    h.source.say("What is the sun?");
    advance(500).await;
    h.handle.toggle().await.unwrap();

    assert_eq!(h.handle.view().state, SessionState::Idle);
    assert_eq!(h.source.stops(), 1);

    advance(3000).await;
    assert!(h.asked().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_events_from_previous_utterance_are_ignored() {
    let h = Harness::standard(ANSWER);
    h.handle.toggle().await.unwrap();
    let stale = h.source.events();

    h.handle.toggle().await.unwrap();
    h.handle.toggle().await.unwrap();
    assert_eq!(h.source.starts(), 2);

    stale.update(mr_learning::voice::RecognitionUpdate {
        finalized: vec!["old question".to_string()],
        interim: "old".to_string(),
    });
    stale.error(RecognitionError::Network);
    advance(3000).await;

    let view = h.handle.view();
    assert!(view.is_listening());
    assert_eq!(view.feedback.as_deref(), Some(messages::LISTENING));
    assert!(h.asked().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_answer_for_abandoned_question_is_discarded() {
    let (provider, asked) = CountingProvider::new(ANSWER);
    let h = Harness::spawn(
        ScriptedSource::new(),
        RecordingSink::new(),
        (provider.with_delay(Duration::from_secs(5)), asked),
    );
    h.handle.toggle().await.unwrap();
    h.source.say("What is the moon?");
    advance(1600).await;
    assert_eq!(h.handle.view().state, SessionState::Processing);

    // A new question interrupts the pending one
    h.handle.toggle().await.unwrap();
    assert!(h.handle.view().is_listening());

    advance(10_000).await;
    assert_eq!(h.asked().len(), 1);
    assert_eq!(h.history_len(), 0);
    assert!(h.spoken().is_empty());
    assert_eq!(h.handle.view().answer, None);
}

#[tokio::test(start_paused = true)]
async fn test_recognition_errors_become_feedback() {
    let cases = [
        (
            RecognitionError::PermissionDenied,
            "Please allow microphone access to use voice input.",
        ),
        (
            RecognitionError::NoSpeech,
            "No speech detected. Please try again.",
        ),
        (
            RecognitionError::AudioCapture,
            "No microphone detected. Please connect a microphone.",
        ),
        (
            RecognitionError::Network,
            "Network error. Please check your connection.",
        ),
        (RecognitionError::Other, "Couldn't hear you, try again!"),
    ];

    for (kind, text) in cases {
        let h = Harness::standard(ANSWER);
        h.handle.toggle().await.unwrap();
        h.source.say("half a question");
        h.source.error(kind);

        let view = h
            .handle
            .wait_for(|v| v.state == SessionState::Idle)
            .await
            .unwrap();
        assert_eq!(view.feedback.as_deref(), Some(text));

        advance(2000).await;
        assert!(h.asked().is_empty());
    }
}

#[tokio::test(start_paused = true)]
async fn test_unavailable_recognizer_is_never_started() {
    let (source, control) = ScriptedSource::new();
    let h = Harness::spawn(
        (source.unavailable(), control),
        RecordingSink::new(),
        CountingProvider::new(ANSWER),
    );

    h.handle.toggle().await.unwrap();

    let view = h.handle.view();
    assert_eq!(view.state, SessionState::Idle);
    assert_eq!(view.feedback.as_deref(), Some(messages::RECOGNITION_UNAVAILABLE));
    assert_eq!(h.source.starts(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_permission_denied_stays_idle() {
    let (source, control) = ScriptedSource::new();
    let h = Harness::spawn(
        (source.without_permission(), control),
        RecordingSink::new(),
        CountingProvider::new(ANSWER),
    );

    h.handle.toggle().await.unwrap();

    let view = h.handle.view();
    assert_eq!(view.state, SessionState::Idle);
    assert_eq!(view.feedback.as_deref(), Some(messages::PERMISSION_DENIED));
    assert_eq!(h.source.starts(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_failed_start_reports_feedback() {
    let (source, control) = ScriptedSource::new();
    let h = Harness::spawn(
        (source.failing_start(), control),
        RecordingSink::new(),
        CountingProvider::new(ANSWER),
    );

    h.handle.toggle().await.unwrap();

    let view = h.handle.view();
    assert_eq!(view.state, SessionState::Idle);
    assert_eq!(view.feedback.as_deref(), Some(messages::START_FAILED));
}

#[tokio::test(start_paused = true)]
async fn test_missing_synthesizer_shows_notice_then_answer() {
    let (sink, spoken) = RecordingSink::new();
    let h = Harness::spawn(
        ScriptedSource::new(),
        (sink.unavailable(), spoken),
        CountingProvider::new(ANSWER),
    );
    h.handle.toggle().await.unwrap();
    h.source.say("What is the moon?");
    advance(1600).await;

    let view = h.handle.view();
    assert_eq!(view.state, SessionState::Idle);
    assert_eq!(view.answer.as_deref(), Some(messages::SYNTHESIS_UNAVAILABLE));
    assert_eq!(h.history_len(), 1);

    advance(2800).await;
    assert_eq!(
        h.handle.view().answer.as_deref(),
        Some(messages::SYNTHESIS_UNAVAILABLE)
    );

    advance(200).await;
    assert_eq!(h.handle.view().answer.as_deref(), Some(ANSWER));
}

#[tokio::test(start_paused = true)]
async fn test_new_listening_clears_previous_answer() {
    let h = Harness::standard(ANSWER);
    h.handle.toggle().await.unwrap();
    h.source.say("What is the moon?");
    advance(1600).await;
    h.handle
        .wait_for(|v| v.state == SessionState::Idle)
        .await
        .unwrap();
    assert!(h.handle.view().answer.is_some());

    h.handle.toggle().await.unwrap();
    assert_eq!(h.handle.view().answer, None);
}

#[test]
fn test_fallback_answers_are_non_empty() {
    for answer in FALLBACK_ANSWERS {
        assert!(!answer.trim().is_empty());
    }
}
