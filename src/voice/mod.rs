//! Voice processing module
//!
//! Speech recognition sources and speech synthesis sinks behind one
//! interface each, plus the audio plumbing they share. Microphone input is
//! segmented locally and transcribed by a hosted STT API; output is spoken
//! by the platform synthesizer or a hosted TTS API.

mod activity;
mod capture;
mod cloud;
mod console;
mod microphone;
mod playback;
mod resample;
mod select;
mod sink;
mod source;
mod stt;
mod system;
mod tts;

pub use activity::{Activity, SegmentDetector};
pub use capture::{
    AudioCapture, SAMPLE_RATE, input_available, rms, samples_to_wav, spawn_capture_thread,
};
pub use cloud::CloudSpeechSink;
pub use console::ConsoleSource;
pub use microphone::{MicrophoneSource, PENDING_INTERIM, map_stt_error};
pub use playback::{Pcm, decode_mp3, output_available, play_mp3_blocking};
pub use resample::AudioConverter;
pub use select::{LocaleProfile, Voice, select_voice};
pub use sink::{SpeechDone, SpeechProfile, SpeechSink};
pub use source::{
    PermissionError, RecognitionError, RecognitionUpdate, SourceEvent, SourceEvents,
    SpeechSource,
};
pub use stt::SpeechToText;
pub use system::{Synthesizer, SystemSpeechSink};
pub use tts::TextToSpeech;
