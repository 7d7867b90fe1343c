//! Voice capture behind the `SpeechInput` port.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::recorder::AudioRecorder;
use super::transcriber::{is_non_speech, WhisperTranscriber};
use super::SpeechInput;
use crate::error::RecognitionError;

/// Microphone capture (cpal) followed by local Whisper transcription.
pub struct MicrophoneListener {
    recorder: Arc<AudioRecorder>,
    transcriber: WhisperTranscriber,
}

impl MicrophoneListener {
    pub fn new(recorder: AudioRecorder, transcriber: WhisperTranscriber) -> Self {
        Self {
            recorder: Arc::new(recorder),
            transcriber,
        }
    }
}

#[async_trait]
impl SpeechInput for MicrophoneListener {
    async fn listen(&self) -> Result<String, RecognitionError> {
        let recorder = Arc::clone(&self.recorder);
        let samples = tokio::task::spawn_blocking(move || recorder.capture())
            .await
            .map_err(|e| RecognitionError::Device(format!("Capture task failed: {e}")))??;

        if samples.is_empty() {
            return Err(RecognitionError::Unintelligible);
        }
        debug!(
            "Transcribing {:.1}s of audio",
            samples.len() as f64 / self.recorder.sample_rate() as f64
        );

        let transcriber = self.transcriber.clone();
        let text = tokio::task::spawn_blocking(move || transcriber.transcribe(&samples))
            .await
            .map_err(|e| RecognitionError::Service(format!("Transcription task failed: {e}")))?
            .map_err(RecognitionError::Service)?;

        if is_non_speech(&text) {
            return Err(RecognitionError::Unintelligible);
        }
        Ok(text.trim().to_lowercase())
    }
}

/// Stands in when no recognizer could be loaded; every capture fails.
pub struct UnavailableListener {
    reason: String,
}

impl UnavailableListener {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl SpeechInput for UnavailableListener {
    async fn listen(&self) -> Result<String, RecognitionError> {
        Err(RecognitionError::Unavailable(self.reason.clone()))
    }
}
