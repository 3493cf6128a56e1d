//! Configuration management for Mr. Learning

pub mod file;

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use self::file::ConfigFile;
use crate::voice::{LocaleProfile, SpeechProfile};

/// Default chat-completions endpoint
pub const DEFAULT_ANSWER_URL: &str = "https://api.x.ai/v1/chat/completions";

/// Default answer model
pub const DEFAULT_MODEL: &str = "grok-3";

/// Default hosted transcription endpoint
pub const DEFAULT_STT_URL: &str = "https://api.openai.com/v1/audio/transcriptions";

/// Default hosted speech endpoint
pub const DEFAULT_TTS_URL: &str = "https://api.openai.com/v1/audio/speech";

/// Default quiet period before a question is sent
pub const DEFAULT_SILENCE_MS: u64 = 1500;

/// Default duration of the synthesis-unavailable notice
pub const DEFAULT_NOTICE_MS: u64 = 3000;

/// Native speaking rate, on a scale where 0.5 is the platform's normal speed
pub const NATIVE_SPEECH_RATE: f32 = 0.5;

/// Normal speed on the native rate scale
const NATIVE_NORMAL_RATE: f32 = 0.5;

/// Mr. Learning runtime configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to data directory (settings database)
    pub data_dir: PathBuf,

    /// Chat-completion answer service
    pub answer: AnswerConfig,

    /// Listening session timing
    pub session: SessionConfig,

    /// Recognition and synthesis configuration
    pub voice: VoiceConfig,
}

/// Chat-completion service configuration
#[derive(Debug, Clone)]
pub struct AnswerConfig {
    pub endpoint: String,
    /// Without a key every question is answered from the fallback set
    pub api_key: Option<SecretString>,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f64,
}

/// Session timing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Quiet period after the last recognition activity
    pub silence_timeout: Duration,
    /// How long the synthesis-unavailable notice replaces the answer
    pub notice_duration: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            silence_timeout: Duration::from_millis(DEFAULT_SILENCE_MS),
            notice_duration: Duration::from_millis(DEFAULT_NOTICE_MS),
        }
    }
}

/// Voice processing configuration
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    /// Target locale for recognition and synthesis
    pub locale: LocaleProfile,

    /// Prosody for hosted synthesis
    pub speech: SpeechProfile,

    /// Prosody for the platform synthesizer
    pub native_speech: SpeechProfile,

    /// Hosted speech-to-text
    pub stt: SttConfig,

    /// Hosted text-to-speech
    pub tts: TtsConfig,
}

/// Hosted transcription configuration
#[derive(Debug, Clone)]
pub struct SttConfig {
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<SecretString>,
}

/// Hosted speech synthesis configuration
#[derive(Debug, Clone)]
pub struct TtsConfig {
    pub endpoint: String,
    pub model: String,
    pub voice: String,
    pub api_key: Option<SecretString>,
}

impl Config {
    /// Load configuration from the config file and the environment
    #[must_use]
    pub fn load() -> Self {
        let fc = file::load_config_file();
        Self::from_sources(fc, |key| std::env::var(key).ok())
    }

    /// Build configuration from a parsed file and an environment lookup
    ///
    /// Precedence: environment, then file, then built-in defaults.
    pub fn from_sources(fc: ConfigFile, env: impl Fn(&str) -> Option<String>) -> Self {
        let answer_key = env("MR_LEARNING_API_KEY")
            .or_else(|| env("XAI_API_KEY"))
            .or(fc.api_keys.answer)
            .filter(|k| !k.is_empty())
            .map(SecretString::from);

        let answer = AnswerConfig {
            endpoint: env("MR_LEARNING_API_URL")
                .or(fc.answer.endpoint)
                .unwrap_or_else(|| DEFAULT_ANSWER_URL.to_string()),
            api_key: answer_key,
            model: env("MR_LEARNING_MODEL")
                .or(fc.answer.model)
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            max_tokens: fc.answer.max_tokens.unwrap_or(150),
            temperature: fc.answer.temperature.unwrap_or(0.7),
        };

        let silence_ms = env("MR_LEARNING_SILENCE_MS")
            .and_then(|v| {
                v.parse::<u64>()
                    .map_err(|e| {
                        tracing::warn!(value = %v, error = %e, "invalid MR_LEARNING_SILENCE_MS");
                    })
                    .ok()
            })
            .or(fc.session.silence_ms)
            .unwrap_or(DEFAULT_SILENCE_MS);

        let session = SessionConfig {
            silence_timeout: Duration::from_millis(silence_ms),
            notice_duration: Duration::from_millis(
                fc.session.notice_ms.unwrap_or(DEFAULT_NOTICE_MS),
            ),
        };

        let openai_key = env("OPENAI_API_KEY")
            .or(fc.api_keys.openai)
            .filter(|k| !k.is_empty())
            .map(SecretString::from);

        let default_speech = SpeechProfile::default();
        let voice = VoiceConfig {
            locale: fc.voice.locale.unwrap_or_default(),
            speech: SpeechProfile {
                rate: fc.voice.rate.unwrap_or(default_speech.rate),
                pitch: fc.voice.pitch.unwrap_or(default_speech.pitch),
            },
            native_speech: SpeechProfile {
                rate: NATIVE_SPEECH_RATE / NATIVE_NORMAL_RATE,
                pitch: fc.voice.pitch.unwrap_or(default_speech.pitch),
            },
            stt: SttConfig {
                endpoint: env("MR_LEARNING_STT_URL")
                    .or(fc.voice.stt_url)
                    .unwrap_or_else(|| DEFAULT_STT_URL.to_string()),
                model: fc.voice.stt_model.unwrap_or_else(|| "whisper-1".to_string()),
                api_key: openai_key.clone(),
            },
            tts: TtsConfig {
                endpoint: fc.voice.tts_url.unwrap_or_else(|| DEFAULT_TTS_URL.to_string()),
                model: fc.voice.tts_model.unwrap_or_else(|| "tts-1".to_string()),
                voice: fc.voice.tts_voice.unwrap_or_else(|| "alloy".to_string()),
                api_key: openai_key,
            },
        };

        // Determine data directory (~/.local/share/mr-learning on Linux)
        let data_dir = env("MR_LEARNING_DATA_DIR")
            .or(fc.data_dir)
            .map(PathBuf::from)
            .unwrap_or_else(default_data_dir);

        Self {
            data_dir,
            answer,
            session,
            voice,
        }
    }

    /// Path of the settings database
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("mr-learning.db")
    }
}

fn default_data_dir() -> PathBuf {
    directories::BaseDirs::new()
        .map_or_else(|| PathBuf::from("."), |d| d.data_dir().join("mr-learning"))
}
