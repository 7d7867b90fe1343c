//! Speech ports: text-to-speech output and voice capture input.
//!
//! Components:
//! - `tts`: espeak-ng synthesis + rodio playback, serialized behind one lock
//! - `recorder`: cpal microphone capture with speech-start timeout
//! - `transcriber`: whisper-rs speech recognition
//! - `listener`: recorder + transcriber behind the `SpeechInput` port

pub mod listener;
pub mod recorder;
pub mod transcriber;
pub mod tts;

use async_trait::async_trait;

use crate::error::RecognitionError;

/// Speaks text aloud. Completes once playback has finished; failures are
/// logged by the implementation and never surfaced.
#[async_trait]
pub trait SpeechOutput: Send + Sync {
    async fn speak(&self, text: &str);
}

/// Captures one utterance and returns its lowercased transcript.
#[async_trait]
pub trait SpeechInput: Send + Sync {
    async fn listen(&self) -> Result<String, RecognitionError>;
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::{SpeechInput, SpeechOutput};
    use crate::due::Clock;
    use crate::error::RecognitionError;

    /// Records every phrase instead of playing it.
    #[derive(Default)]
    pub struct RecordingSpeaker {
        spoken: Mutex<Vec<String>>,
    }

    impl RecordingSpeaker {
        pub fn spoken(&self) -> Vec<String> {
            self.spoken.lock().unwrap().clone()
        }

        pub fn last(&self) -> Option<String> {
            self.spoken.lock().unwrap().last().cloned()
        }
    }

    #[async_trait]
    impl SpeechOutput for RecordingSpeaker {
        async fn speak(&self, text: &str) {
            self.spoken.lock().unwrap().push(text.to_string());
        }
    }

    /// Replays canned capture results in order.
    #[derive(Default)]
    pub struct ScriptedListener {
        script: Mutex<VecDeque<Result<String, RecognitionError>>>,
    }

    impl ScriptedListener {
        pub fn new(script: impl IntoIterator<Item = Result<String, RecognitionError>>) -> Self {
            Self {
                script: Mutex::new(script.into_iter().collect()),
            }
        }
    }

    #[async_trait]
    impl SpeechInput for ScriptedListener {
        async fn listen(&self) -> Result<String, RecognitionError> {
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(RecognitionError::Timeout(5.0)))
        }
    }

    /// Clock pinned to one `HH:MM`.
    pub struct FixedClock(pub Mutex<String>);

    impl FixedClock {
        pub fn at(time: &str) -> Self {
            Self(Mutex::new(time.to_string()))
        }

        pub fn set(&self, time: &str) {
            *self.0.lock().unwrap() = time.to_string();
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> String {
            self.0.lock().unwrap().clone()
        }
    }
}
