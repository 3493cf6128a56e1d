use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, oneshot, watch};
use tracing_subscriber::EnvFilter;

use mr_learning::config::Config;
use mr_learning::parent::PIN_UPDATED;
use mr_learning::session::{self, messages};
use mr_learning::voice::{
    CloudSpeechSink, ConsoleSource, MicrophoneSource, SpeechDone, SpeechSink, SpeechSource,
    SpeechToText, SystemSpeechSink, TextToSpeech, rms, spawn_capture_thread,
};
use mr_learning::{
    AnswerProvider, ChatCompletionsProvider, ParentError, ParentGate, SessionController,
    SessionState, SessionView, SharedSettings, SqliteStore, db,
};

/// Longest wait for a one-shot answer to finish speaking
const SPEECH_WAIT: Duration = Duration::from_secs(60);

/// Mr. Learning - ask a question out loud, hear the answer in Cantonese
#[derive(Parser)]
#[command(name = "mr-learning", version, about)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Type questions instead of speaking them
    #[arg(long, env = "MR_LEARNING_TEXT")]
    text: bool,

    /// Speak answers with the hosted TTS voice instead of the system synthesizer
    #[arg(long, env = "MR_LEARNING_CLOUD_VOICE")]
    cloud_voice: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Ask one question, print and speak the answer
    Ask {
        /// The question
        #[arg(required = true, num_args = 1.., trailing_var_arg = true)]
        question: Vec<String>,
    },
    /// List synthesizer voices and show the one selected
    Voices,
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Parent dashboard
    Parent {
        /// Parent PIN (prompted when omitted)
        #[arg(long)]
        pin: Option<String>,

        #[command(subcommand)]
        action: ParentAction,
    },
}

#[derive(Subcommand)]
enum ParentAction {
    /// Manage banned words
    Banned {
        #[command(subcommand)]
        action: BannedAction,
    },
    /// Change the PIN
    Pin {
        /// New four-digit PIN
        new: String,
        /// The new PIN again
        confirm: String,
    },
    /// Show recent questions
    History {
        /// Number of entries to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },
    /// Delete all question history
    ClearHistory,
}

#[derive(Subcommand)]
enum BannedAction {
    /// Show the banned words
    List,
    /// Ban a word
    Add { word: String },
    /// Unban a word
    Remove { word: String },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,mr_learning=info",
        1 => "info,mr_learning=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

#[allow(clippy::future_not_send)]
async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load();
    tracing::debug!(?config, "loaded configuration");

    if let Some(cmd) = cli.command {
        return match cmd {
            Command::Ask { question } => ask(&config, cli.cloud_voice, &question.join(" ")).await,
            Command::Voices => voices(&config).await,
            Command::TestMic { duration } => test_mic(duration).await,
            Command::Parent { pin, action } => parent(&config, pin, action),
        };
    }

    let settings = load_settings(&config)?;
    let answers: Arc<dyn AnswerProvider> = Arc::new(ChatCompletionsProvider::new(&config.answer));
    let sink = speech_sink(&config, cli.cloud_voice).await;

    if cli.text {
        let (source, lines) = ConsoleSource::channel();
        let (handle, task) =
            SessionController::spawn(Box::new(source), sink, answers, settings, config.session);
        tokio::spawn(print_views(handle.subscribe()));

        println!("Mr. Learning is ready. Type a question and press Enter (Ctrl-D to quit).");
        let mut stdin = BufReader::new(tokio::io::stdin()).lines();
        loop {
            let line = tokio::select! {
                line = stdin.next_line() => line?,
                _ = tokio::signal::ctrl_c() => None,
            };
            let Some(line) = line else { break };

            handle.toggle().await?;
            if !handle.view().is_listening() {
                continue;
            }
            lines.send(line).await?;
            handle.wait_for(|v| !v.is_listening()).await?;
        }

        handle.shutdown();
        task.await?;
    } else {
        let source = microphone_source(&config);
        let (handle, task) =
            SessionController::spawn(source, sink, answers, settings, config.session);
        tokio::spawn(print_views(handle.subscribe()));

        println!("Mr. Learning is ready. Press Enter to start or stop listening (Ctrl-D to quit).");
        let mut stdin = BufReader::new(tokio::io::stdin()).lines();
        loop {
            let line = tokio::select! {
                line = stdin.next_line() => line?,
                _ = tokio::signal::ctrl_c() => None,
            };
            if line.is_none() {
                break;
            }
            handle.toggle().await?;
        }

        handle.shutdown();
        task.await?;
    }

    tracing::info!("goodbye");
    Ok(())
}

fn load_settings(config: &Config) -> anyhow::Result<SharedSettings> {
    let pool = db::init(&config.database_path())?;
    let store = Arc::new(SqliteStore::new(pool));
    Ok(SharedSettings::load(store)?)
}

fn microphone_source(config: &Config) -> Box<dyn SpeechSource> {
    let language = config.voice.locale.synthesis_language();
    let stt = SpeechToText::new(&config.voice.stt, language)
        .map_err(|e| tracing::warn!(error = %e, "speech recognition disabled"))
        .ok();
    Box::new(MicrophoneSource::new(stt))
}

async fn speech_sink(config: &Config, cloud: bool) -> Box<dyn SpeechSink> {
    if cloud {
        let tts = TextToSpeech::new(&config.voice.tts, config.voice.speech.rate)
            .map_err(|e| tracing::warn!(error = %e, "hosted voice disabled"))
            .ok();
        Box::new(CloudSpeechSink::new(tts))
    } else {
        Box::new(SystemSpeechSink::detect(&config.voice.locale, config.voice.native_speech).await)
    }
}

/// Print feedback and answers as the session publishes them
async fn print_views(mut views: watch::Receiver<SessionView>) {
    let mut last = views.borrow().clone();
    while views.changed().await.is_ok() {
        let current = views.borrow_and_update().clone();

        if current.state != last.state {
            tracing::debug!(state = current.state.description(), "session state");
        }
        if current.feedback != last.feedback {
            if let Some(feedback) = &current.feedback {
                println!("  {feedback}");
            }
        }
        if current.answer != last.answer {
            if let Some(answer) = &current.answer {
                println!("\nMr. Learning: {answer}\n");
            }
        }
        if current.state == SessionState::Idle && last.state == SessionState::Listening {
            println!("  (stopped listening)");
        }

        last = current;
    }
}

/// Ask one question outside a listening session
async fn ask(config: &Config, cloud: bool, question: &str) -> anyhow::Result<()> {
    let settings = load_settings(config)?;
    let answers = ChatCompletionsProvider::new(&config.answer);

    println!("{}", messages::ASKING);
    let reply = session::answer_once(question, &settings, &answers).await;
    println!("\nMr. Learning: {}\n", reply.text());

    let mut sink = speech_sink(config, cloud).await;
    let (done_tx, done_rx) = oneshot::channel();
    let done = SpeechDone::new(move || {
        let _ = done_tx.send(());
    });

    if sink.speak(reply.text(), done) {
        if tokio::time::timeout(SPEECH_WAIT, done_rx).await.is_err() {
            tracing::warn!("gave up waiting for speech to finish");
            sink.stop();
        }
    } else {
        println!("  {}", messages::SYNTHESIS_UNAVAILABLE);
    }

    Ok(())
}

/// List synthesizer voices
async fn voices(config: &Config) -> anyhow::Result<()> {
    let sink = SystemSpeechSink::detect(&config.voice.locale, config.voice.native_speech).await;
    if !sink.is_available() {
        println!("{}", messages::SYNTHESIS_UNAVAILABLE);
        return Ok(());
    }

    let selected = sink.selected_voice();
    for voice in sink.voices().await? {
        let marker = if selected == Some(&voice) { "*" } else { " " };
        let quality = if voice.enhanced { " (enhanced)" } else { "" };
        println!("{marker} {:<30} {}{quality}", voice.name, voice.locale);
    }

    match selected {
        Some(voice) => println!("\nSelected: {} ({})", voice.name, voice.locale),
        None => println!("\nNo voice for {}; using the platform default", config.voice.locale.synthesis),
    }
    Ok(())
}

/// Test microphone input
async fn test_mic(duration: u64) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let stop = Arc::new(AtomicBool::new(false));
    let (tx, mut rx) = mpsc::channel(64);
    let capture = spawn_capture_thread(Arc::clone(&stop), tx);
    println!("---");

    for i in 0..duration {
        tokio::time::sleep(Duration::from_secs(1)).await;

        let mut samples = Vec::new();
        while let Ok(chunk) = rx.try_recv() {
            samples.extend(chunk);
        }
        if samples.is_empty() && capture.is_finished() {
            break;
        }

        let energy = rms(&samples);
        let peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);

        // Visual meter
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let meter_len = (energy * 100.0).min(50.0) as usize;
        let meter: String = "#".repeat(meter_len) + &" ".repeat(50 - meter_len);

        println!(
            "[{:2}s] RMS: {:.4} | Peak: {:.4} | [{}]",
            i + 1,
            energy,
            peak,
            meter
        );
    }

    stop.store(true, Ordering::SeqCst);
    drop(rx);
    match tokio::task::spawn_blocking(move || capture.join()).await? {
        Ok(result) => result?,
        Err(_) => anyhow::bail!("capture thread panicked"),
    }

    println!("\n---");
    println!("If you saw movement in the meter, your mic is working!");
    Ok(())
}

/// Run a parent dashboard action behind the PIN gate
fn parent(config: &Config, pin: Option<String>, action: ParentAction) -> anyhow::Result<()> {
    let settings = load_settings(config)?;
    let mut gate = ParentGate::new(settings);

    if let Some(pin) = pin {
        gate.unlock(&pin)?;
    } else {
        loop {
            let entered = dialoguer::Password::new()
                .with_prompt("Parent PIN")
                .interact()?;
            match gate.unlock(&entered) {
                Ok(()) => break,
                Err(ParentError::PinMismatch) => println!("{}", ParentError::PinMismatch),
                Err(e) => return Err(e.into()),
            }
        }
    }

    match action {
        ParentAction::Banned { action } => match action {
            BannedAction::List => {
                let words = gate.banned_words()?;
                if words.is_empty() {
                    println!("No banned words");
                }
                for word in words {
                    println!("{word}");
                }
            }
            BannedAction::Add { word } => {
                if gate.add_banned_word(&word)? {
                    println!("Banned \"{}\"", word.trim());
                } else {
                    println!("Nothing to add");
                }
            }
            BannedAction::Remove { word } => {
                if gate.remove_banned_word(&word)? {
                    println!("Removed \"{}\"", word.trim());
                } else {
                    println!("\"{word}\" is not banned");
                }
            }
        },
        ParentAction::Pin { new, confirm } => {
            gate.change_pin(&new, &confirm)?;
            println!("{PIN_UPDATED}");
        }
        ParentAction::History { limit } => {
            let history = gate.history()?;
            if history.is_empty() {
                println!("No questions yet");
            }
            for entry in history.iter().take(limit) {
                println!("[{}]", entry.timestamp);
                println!("  Q: {}", entry.question);
                println!("  A: {}\n", entry.answer);
            }
        }
        ParentAction::ClearHistory => {
            gate.clear_history()?;
            println!("History cleared");
        }
    }

    gate.lock();
    Ok(())
}
