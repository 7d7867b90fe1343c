//! med-assistant: spoken medication reminders and voice commands.

mod assistant;
mod config;
mod due;
mod error;
mod interpreter;
mod medication;
mod notifier;
mod scheduler;
mod speech;
mod store;

use clap::{Parser, Subcommand};
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::assistant::Assistant;
use crate::config::Config;
use crate::due::{find_due, Clock, SystemClock};
use crate::notifier::Notifier;
use crate::speech::listener::{MicrophoneListener, UnavailableListener};
use crate::speech::recorder::AudioRecorder;
use crate::speech::transcriber::WhisperTranscriber;
use crate::speech::tts::{EspeakSpeaker, LogSpeaker};
use crate::speech::{SpeechInput, SpeechOutput};
use crate::store::MedicationStore;

#[derive(Parser, Debug)]
#[command(name = "med-assistant", about = "Spoken medication reminders")]
struct Args {
    /// Path to config.yaml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose (debug) logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Cmd>,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Run reminders in the foreground; press Enter to give a voice command
    Run,
    /// Show scheduled medications
    List,
    /// Schedule a medication
    Add {
        #[arg(long)]
        name: String,
        /// 24-hour HH:MM
        #[arg(long)]
        time: String,
        #[arg(long)]
        dose: String,
    },
    /// Remove every medication with this time and name
    Remove {
        #[arg(long)]
        time: String,
        #[arg(long)]
        name: String,
    },
    /// Say whether anything is due right now
    Check,
    /// Listen for a single voice command
    Listen,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Initialize logging (suppress noisy whisper internals)
    let filter = if args.verbose {
        EnvFilter::new("debug,whisper_rs=info")
    } else {
        EnvFilter::new("info,whisper_rs=warn")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = Config::load(args.config.as_deref());
    let command = args.command.unwrap_or(Cmd::Run);
    let needs_listener = matches!(command, Cmd::Run | Cmd::Listen);

    let assistant = Arc::new(build_assistant(&config, needs_listener).await);

    match command {
        Cmd::Run => run(assistant, &config).await?,
        Cmd::List => print_list(&assistant)?,
        Cmd::Add { name, time, dose } => {
            assistant.add(&name, &time, &dose).await?;
            println!("Added {name} at {time} ({dose})");
        }
        Cmd::Remove { time, name } => {
            let removed = assistant.remove(&time, &name).await?;
            println!("Removed {removed} medication(s)");
        }
        Cmd::Check => {
            let now = SystemClock.now();
            let records = assistant.list()?;
            match find_due(&records, &now) {
                Some(record) => println!("{}", record.reminder_text()),
                None => println!("{}", interpreter::NOTHING_DUE),
            }
        }
        Cmd::Listen => {
            let command = assistant.run_voice_command().await;
            println!("{command}");
        }
    }

    Ok(())
}

async fn build_assistant(config: &Config, needs_listener: bool) -> Assistant {
    let store = Arc::new(MedicationStore::new(config.store.path.clone()));
    info!("Medication file: {}", store.path().display());

    let speech: Arc<dyn SpeechOutput> = if config.speech.enabled {
        let mut speaker = EspeakSpeaker::new(&config.speech);
        if let Err(e) = speaker.open_output() {
            warn!("{e}");
            info!("Continuing without audio output");
        }
        Arc::new(speaker)
    } else {
        Arc::new(LogSpeaker)
    };

    let listener: Arc<dyn SpeechInput> = if needs_listener {
        // Load Whisper model (blocking, takes a few seconds)
        info!("Loading Whisper model...");
        let loaded = tokio::task::spawn_blocking({
            let whisper_config = config.whisper.clone();
            move || WhisperTranscriber::load(&whisper_config)
        })
        .await
        .map_err(|e| e.to_string())
        .and_then(|r| r);

        match loaded {
            Ok(transcriber) => Arc::new(MicrophoneListener::new(
                AudioRecorder::new(config.listen.clone()),
                transcriber,
            )),
            Err(e) => {
                warn!("Voice commands disabled: {e}");
                Arc::new(UnavailableListener::new(e))
            }
        }
    } else {
        Arc::new(UnavailableListener::new("not loaded for this command"))
    };

    Assistant::new(
        store,
        speech,
        listener,
        Arc::new(SystemClock),
        Arc::new(Notifier::new(config.feedback.notifications)),
    )
}

fn print_list(assistant: &Assistant) -> Result<(), error::StoreError> {
    let records = assistant.list()?;
    if records.is_empty() {
        println!("No medications scheduled.");
        return Ok(());
    }
    println!("{:<6} Medication", "Time");
    for record in &records {
        println!("{}", record.display_row());
    }
    Ok(())
}

async fn run(assistant: Arc<Assistant>, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let cancel = CancellationToken::new();
    let scheduler = Arc::new(assistant.scheduler(config.scheduler.interval()));
    let reminders = scheduler.spawn(cancel.clone());

    // Reprint the list whenever a voice command changes it
    let mut revisions = assistant.store().subscribe();
    let watcher = tokio::spawn({
        let assistant = assistant.clone();
        let cancel = cancel.clone();
        async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    changed = revisions.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        if let Err(e) = print_list(&assistant) {
                            warn!("Failed to list medications: {e}");
                        }
                    }
                }
            }
        }
    });

    print_list(&assistant)?;
    println!("Press Enter to give a voice command, Ctrl-C to quit.");

    let mut lines = spawn_line_reader(BufReader::new(std::io::stdin()));
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                break;
            }
            line = lines.recv() => {
                if line.is_none() {
                    // stdin closed: keep reminding until Ctrl-C
                    tokio::signal::ctrl_c().await?;
                    break;
                }
                assistant.trigger_voice_command();
            }
        }
    }

    cancel.cancel();
    reminders.await?;
    watcher.await?;
    Ok(())
}

/// Read lines on a plain OS thread so a pending read never holds up runtime
/// shutdown. The channel closes at EOF or on the first read error.
fn spawn_line_reader<R>(reader: R) -> mpsc::UnboundedReceiver<String>
where
    R: BufRead + Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in reader.lines() {
            match line {
                Ok(line) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!("Failed to read stdin: {e}");
                    break;
                }
            }
        }
    });
    rx
}
