//! TOML configuration file loading
//!
//! Supports `~/.config/mr-learning/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::voice::LocaleProfile;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct ConfigFile {
    /// Where the settings database lives
    pub data_dir: Option<String>,

    /// Chat-completion answer service
    #[serde(default)]
    pub answer: AnswerFileConfig,

    /// Listening session timing
    #[serde(default)]
    pub session: SessionFileConfig,

    /// Voice/audio configuration
    #[serde(default)]
    pub voice: VoiceFileConfig,

    /// API keys for external services
    #[serde(default)]
    pub api_keys: ApiKeysFileConfig,
}

/// Answer service configuration
#[derive(Debug, Default, Deserialize)]
pub struct AnswerFileConfig {
    /// Chat-completions endpoint URL
    pub endpoint: Option<String>,

    /// Model identifier (e.g. "grok-3")
    pub model: Option<String>,

    pub max_tokens: Option<u32>,
    pub temperature: Option<f64>,
}

/// Session timing configuration
#[derive(Debug, Default, Deserialize)]
pub struct SessionFileConfig {
    /// Quiet period after the last speech before the question is sent
    pub silence_ms: Option<u64>,

    /// How long the "voice not supported" notice stays up
    pub notice_ms: Option<u64>,
}

/// Voice processing configuration
#[derive(Debug, Default, Deserialize)]
pub struct VoiceFileConfig {
    /// Locale override; omitted fields keep the Cantonese defaults
    pub locale: Option<LocaleProfile>,

    /// Hosted transcription endpoint
    pub stt_url: Option<String>,

    /// STT model (e.g. "whisper-1")
    pub stt_model: Option<String>,

    /// Hosted speech endpoint
    pub tts_url: Option<String>,

    /// TTS model (e.g. "tts-1")
    pub tts_model: Option<String>,

    /// TTS voice identifier (e.g. "alloy")
    pub tts_voice: Option<String>,

    /// Speaking rate multiplier
    pub rate: Option<f32>,

    /// Pitch multiplier
    pub pitch: Option<f32>,
}

/// API keys configuration
#[derive(Debug, Default, Deserialize)]
pub struct ApiKeysFileConfig {
    /// Chat-completion service key
    pub answer: Option<String>,
    /// Key for hosted STT/TTS
    pub openai: Option<String>,
}

/// Load the TOML config file from the standard path
///
/// Returns `ConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> ConfigFile {
    config_file_path().map_or_else(ConfigFile::default, |path| load_config_file_from(&path))
}

/// Load a TOML config file from an explicit path
pub fn load_config_file_from(path: &Path) -> ConfigFile {
    if !path.exists() {
        return ConfigFile::default();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                ConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            ConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/mr-learning/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("mr-learning").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_default() {
        let config = load_config_file_from(Path::new("/nonexistent/mr-learning.toml"));
        assert!(config.answer.model.is_none());
        assert!(config.voice.locale.is_none());
    }

    #[test]
    fn test_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[answer]
model = "grok-3-mini"

[session]
silence_ms = 2000

[voice]
tts_voice = "nova"
"#,
        )
        .unwrap();

        let config = load_config_file_from(&path);
        assert_eq!(config.answer.model.as_deref(), Some("grok-3-mini"));
        assert!(config.answer.endpoint.is_none());
        assert_eq!(config.session.silence_ms, Some(2000));
        assert_eq!(config.voice.tts_voice.as_deref(), Some("nova"));
    }

    #[test]
    fn test_malformed_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[answer\nmodel = ").unwrap();

        let config = load_config_file_from(&path);
        assert!(config.answer.model.is_none());
    }
}
