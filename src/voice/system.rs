//! Platform speech synthesizer driven as a child process

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tokio::sync::oneshot;

use super::select::{LocaleProfile, Voice, select_voice};
use super::sink::{SpeechDone, SpeechProfile, SpeechSink};
use crate::{Error, Result};

/// Speaking rate of the synthesizers at a 1.0 multiplier, in words per minute
const BASE_WORDS_PER_MINUTE: f32 = 175.0;

/// espeak pitch at a 1.0 multiplier (range 0-99)
const BASE_ESPEAK_PITCH: f32 = 50.0;

/// Supported synthesizer programs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Synthesizer {
    /// macOS `say`
    Say,
    /// `espeak-ng`
    EspeakNg,
    /// Legacy `espeak`
    Espeak,
}

impl Synthesizer {
    const fn program(self) -> &'static str {
        match self {
            Self::Say => "say",
            Self::EspeakNg => "espeak-ng",
            Self::Espeak => "espeak",
        }
    }

    /// Locate the first installed synthesizer
    #[must_use]
    pub fn detect() -> Option<(Self, PathBuf)> {
        [Self::Say, Self::EspeakNg, Self::Espeak]
            .into_iter()
            .find_map(|s| which::which(s.program()).ok().map(|path| (s, path)))
    }

    /// Arguments that list installed voices
    const fn list_args(self) -> &'static [&'static str] {
        match self {
            Self::Say => &["-v", "?"],
            Self::EspeakNg | Self::Espeak => &["--voices"],
        }
    }

    /// Parse the voice listing printed by [`Self::list_args`]
    #[must_use]
    pub fn parse_voices(self, listing: &str) -> Vec<Voice> {
        match self {
            Self::Say => parse_say_voices(listing),
            Self::EspeakNg | Self::Espeak => parse_espeak_voices(listing),
        }
    }

    /// Command-line arguments to speak `text`
    #[must_use]
    pub fn speak_args(self, text: &str, voice: Option<&Voice>, profile: SpeechProfile) -> Vec<String> {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let wpm = (BASE_WORDS_PER_MINUTE * profile.rate).round().max(1.0) as u32;
        let mut args = Vec::new();

        match self {
            Self::Say => {
                if let Some(voice) = voice {
                    args.extend(["-v".to_string(), voice.name.clone()]);
                }
                args.extend(["-r".to_string(), wpm.to_string()]);
            }
            Self::EspeakNg | Self::Espeak => {
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let pitch = (BASE_ESPEAK_PITCH * profile.pitch).round().clamp(0.0, 99.0) as u32;
                if let Some(voice) = voice {
                    args.extend(["-v".to_string(), voice.locale.clone()]);
                }
                args.extend([
                    "-s".to_string(),
                    wpm.to_string(),
                    "-p".to_string(),
                    pitch.to_string(),
                ]);
            }
        }

        args.push("--".to_string());
        args.push(text.to_string());
        args
    }
}

/// Parse `say -v '?'` output: `Name   locale   # sample text`
fn parse_say_voices(listing: &str) -> Vec<Voice> {
    listing
        .lines()
        .filter_map(|line| {
            let head = line.split('#').next()?.trim_end();
            let (name, locale) = head.rsplit_once(char::is_whitespace)?;
            let name = name.trim();
            if name.is_empty() || locale.is_empty() {
                return None;
            }
            let voice = Voice::new(name, locale);
            Some(if name.contains("(Enhanced)") || name.contains("(Premium)") {
                voice.enhanced()
            } else {
                voice
            })
        })
        .collect()
}

/// Parse `espeak-ng --voices` output
///
/// Columns: `Pty Language Age/Gender VoiceName File Other Languages`
fn parse_espeak_voices(listing: &str) -> Vec<Voice> {
    listing
        .lines()
        .skip_while(|line| !line.trim_start().starts_with("Pty"))
        .skip(1)
        .filter_map(|line| {
            let mut columns = line.split_whitespace();
            let _priority = columns.next()?;
            let locale = columns.next()?;
            let _age_gender = columns.next()?;
            let name = columns.next()?;
            Some(Voice::new(name.replace('_', " "), locale))
        })
        .collect()
}

/// Speaks through the platform synthesizer
pub struct SystemSpeechSink {
    synthesizer: Option<(Synthesizer, PathBuf)>,
    voice: Option<Voice>,
    profile: SpeechProfile,
    current: Option<oneshot::Sender<()>>,
}

impl SystemSpeechSink {
    /// Detect the installed synthesizer and pick a voice for `locale`
    pub async fn detect(locale: &LocaleProfile, profile: SpeechProfile) -> Self {
        let synthesizer = Synthesizer::detect();
        let mut sink = Self {
            synthesizer,
            voice: None,
            profile,
            current: None,
        };

        if sink.synthesizer.is_none() {
            tracing::warn!("no speech synthesizer found (tried say, espeak-ng, espeak)");
            return sink;
        }

        match sink.voices().await {
            Ok(voices) => {
                sink.voice = select_voice(&voices, locale).cloned();
                tracing::info!(
                    voices = voices.len(),
                    selected = sink.voice.as_ref().map_or("platform default", |v| v.name.as_str()),
                    "speech synthesizer ready"
                );
            }
            Err(e) => tracing::warn!(error = %e, "failed to list synthesizer voices"),
        }

        sink
    }

    /// Voices offered by the synthesizer
    ///
    /// # Errors
    ///
    /// Returns error if no synthesizer exists or listing fails
    pub async fn voices(&self) -> Result<Vec<Voice>> {
        let (synthesizer, path) = self
            .synthesizer
            .as_ref()
            .ok_or_else(|| Error::Tts("no speech synthesizer available".to_string()))?;

        let output = Command::new(path)
            .args(synthesizer.list_args())
            .stdin(Stdio::null())
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Tts(format!("voice listing failed: {stderr}")));
        }

        Ok(synthesizer.parse_voices(&String::from_utf8_lossy(&output.stdout)))
    }

    /// The voice chosen for the locale, if any
    #[must_use]
    pub const fn selected_voice(&self) -> Option<&Voice> {
        self.voice.as_ref()
    }

    fn cancel_current(&mut self) -> bool {
        self.current.take().is_some_and(|cancel| cancel.send(()).is_ok())
    }
}

impl SpeechSink for SystemSpeechSink {
    fn is_available(&self) -> bool {
        self.synthesizer.is_some()
    }

    fn speak(&mut self, text: &str, done: SpeechDone) -> bool {
        let Some((synthesizer, path)) = self.synthesizer.clone() else {
            return false;
        };

        if self.cancel_current() {
            tracing::debug!("preempted previous utterance");
        }

        let args = synthesizer.speak_args(text, self.voice.as_ref(), self.profile);
        let child = match spawn_utterance(&path, &args) {
            Ok(child) => child,
            Err(e) => {
                tracing::error!(error = %e, program = synthesizer.program(), "failed to spawn synthesizer");
                done.finish();
                return true;
            }
        };

        let (cancel_tx, cancel_rx) = oneshot::channel();
        self.current = Some(cancel_tx);

        tokio::spawn(run_utterance(child, cancel_rx, done));

        true
    }

    fn stop(&mut self) -> bool {
        if self.synthesizer.is_none() {
            return false;
        }
        self.cancel_current();
        true
    }
}

fn spawn_utterance(path: &Path, args: &[String]) -> std::io::Result<Child> {
    Command::new(path)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
}

/// Wait for the synthesizer to finish or be cancelled
///
/// Its stderr is read alongside so a chatty synthesizer cannot stall on a
/// full pipe; the text is logged when it exits with an error.
async fn run_utterance(mut child: Child, cancel: oneshot::Receiver<()>, done: SpeechDone) {
    let stderr = child.stderr.take().map(|mut pipe| {
        tokio::spawn(async move {
            let mut bytes = Vec::new();
            let _ = pipe.read_to_end(&mut bytes).await;
            String::from_utf8_lossy(&bytes).into_owned()
        })
    });

    tokio::select! {
        status = child.wait() => {
            match status {
                Ok(status) if status.success() => tracing::debug!("utterance finished"),
                Ok(status) => {
                    let stderr = match stderr {
                        Some(reader) => reader.await.unwrap_or_default(),
                        None => String::new(),
                    };
                    tracing::warn!(%status, stderr = stderr.trim(), "synthesizer exited with error");
                }
                Err(e) => tracing::warn!(error = %e, "failed to wait for synthesizer"),
            }
            done.finish();
        }
        _ = cancel => {
            if let Err(e) = child.kill().await {
                tracing::debug!(error = %e, "synthesizer already exited");
            }
        }
    }
}
