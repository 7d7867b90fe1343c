//! Text-to-speech: espeak-ng synthesis → rodio playback.
//!
//! Pipeline:
//! 1. Text → WAV bytes (`espeak-ng --stdout`, voice + rate from config)
//! 2. WAV → rodio Decoder → Sink at the configured volume
//! 3. Block (off the async runtime) until the sink drains
//!
//! One speak lock serializes all callers so reminders and voice-command
//! replies never talk over each other.

use std::io::Cursor;
use std::time::Instant;

use async_trait::async_trait;
use rodio::{Decoder, OutputStream, OutputStreamBuilder, Sink};
use tokio::process::Command;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};

use super::SpeechOutput;
use crate::config::SpeechConfig;

pub struct EspeakSpeaker {
    program: String,
    voice: String,
    rate: u32,
    volume: f32,

    // Audio output (kept alive for process lifetime)
    output_stream: Option<OutputStream>,

    speak_lock: AsyncMutex<()>,
}

impl EspeakSpeaker {
    pub fn new(config: &SpeechConfig) -> Self {
        Self {
            program: config.program.clone(),
            voice: config.voice.clone(),
            rate: config.rate,
            volume: config.volume.clamp(0.0, 1.0),
            output_stream: None,
            speak_lock: AsyncMutex::new(()),
        }
    }

    /// Open the default audio output device. Without it, speech is only logged.
    pub fn open_output(&mut self) -> Result<(), String> {
        if self.output_stream.is_some() {
            return Ok(());
        }
        let stream = OutputStreamBuilder::open_default_stream()
            .map_err(|e| format!("Failed to open audio output: {e}"))?;
        self.output_stream = Some(stream);
        info!(
            "Speech output ready ({} voice {}, {} wpm)",
            self.program, self.voice, self.rate
        );
        Ok(())
    }

    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, String> {
        let output = Command::new(&self.program)
            .arg("--stdout")
            .arg("-v")
            .arg(&self.voice)
            .arg("-s")
            .arg(self.rate.to_string())
            .arg(text)
            .output()
            .await
            .map_err(|e| format!("Failed to run {}: {e}", self.program))?;

        if !output.status.success() {
            return Err(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }
        if output.stdout.is_empty() {
            return Err(format!("{} produced no audio", self.program));
        }
        Ok(output.stdout)
    }

    async fn play(&self, stream: &OutputStream, wav: Vec<u8>) -> Result<(), String> {
        let source =
            Decoder::new(Cursor::new(wav)).map_err(|e| format!("Failed to decode speech audio: {e}"))?;

        // rodio 0.21: Sink::connect_new takes &Mixer
        let sink = Sink::connect_new(stream.mixer());
        sink.set_volume(self.volume);
        sink.append(source);

        tokio::task::spawn_blocking(move || sink.sleep_until_end())
            .await
            .map_err(|e| format!("Playback task failed: {e}"))
    }
}

#[async_trait]
impl SpeechOutput for EspeakSpeaker {
    async fn speak(&self, text: &str) {
        let _guard = self.speak_lock.lock().await;

        let Some(stream) = &self.output_stream else {
            info!("(no audio output) {text}");
            return;
        };

        let t0 = Instant::now();
        let wav = match self.synthesize(text).await {
            Ok(wav) => wav,
            Err(e) => {
                warn!("Speech synthesis failed: {e}");
                return;
            }
        };
        let gen_ms = t0.elapsed().as_millis();

        if let Err(e) = self.play(stream, wav).await {
            warn!("Speech playback failed: {e}");
            return;
        }
        debug!(
            "Spoke \"{text}\" (gen={gen_ms}ms, total={}ms)",
            t0.elapsed().as_millis()
        );
    }
}

/// Used when speech is disabled in config: every phrase goes to the log.
pub struct LogSpeaker;

#[async_trait]
impl SpeechOutput for LogSpeaker {
    async fn speak(&self, text: &str) {
        info!("(speech disabled) {text}");
    }
}
