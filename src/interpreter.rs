//! Voice command dispatch.
//!
//! Recognized text is matched by substring, first match wins:
//! "medicine" → "add" → "time" → "doctor" → not recognized.

use std::sync::Arc;

use tracing::{info, warn};

use crate::due::{find_due, Clock};
use crate::medication::voice_default_record;
use crate::notifier::Notifier;
use crate::speech::SpeechOutput;
use crate::store::MedicationStore;

pub const NOTHING_DUE: &str = "No medicine due now.";
pub const ADDING_DEFAULT: &str = "Adding default medicine aspirin.";
pub const ASK_CALL_DOCTOR: &str = "Do you want me to call the doctor?";
pub const NOT_RECOGNIZED: &str = "Command not recognized.";
const READ_FAILED: &str = "Sorry, I could not read your medication list.";
const ADD_FAILED: &str = "Sorry, I could not add the medicine.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    DueMedicine,
    AddDefault,
    TellTime,
    CallDoctor,
    Unrecognized,
}

impl Command {
    pub fn parse(text: &str) -> Self {
        let text = text.to_lowercase();
        if text.contains("medicine") {
            Self::DueMedicine
        } else if text.contains("add") {
            Self::AddDefault
        } else if text.contains("time") {
            Self::TellTime
        } else if text.contains("doctor") {
            Self::CallDoctor
        } else {
            Self::Unrecognized
        }
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DueMedicine => write!(f, "DUE_MEDICINE"),
            Self::AddDefault => write!(f, "ADD_DEFAULT"),
            Self::TellTime => write!(f, "TELL_TIME"),
            Self::CallDoctor => write!(f, "CALL_DOCTOR"),
            Self::Unrecognized => write!(f, "UNRECOGNIZED"),
        }
    }
}

pub struct CommandInterpreter {
    store: Arc<MedicationStore>,
    speech: Arc<dyn SpeechOutput>,
    clock: Arc<dyn Clock>,
    notifier: Arc<Notifier>,
}

impl CommandInterpreter {
    pub fn new(
        store: Arc<MedicationStore>,
        speech: Arc<dyn SpeechOutput>,
        clock: Arc<dyn Clock>,
        notifier: Arc<Notifier>,
    ) -> Self {
        Self {
            store,
            speech,
            clock,
            notifier,
        }
    }

    /// Run the action for `text` and return which command it was.
    pub async fn interpret(&self, text: &str) -> Command {
        let command = Command::parse(text);
        info!("Voice command {command}: \"{text}\"");

        match command {
            Command::DueMedicine => {
                let now = self.clock.now();
                let reply = match self.store.load() {
                    Ok(records) => find_due(&records, &now)
                        .map(|r| r.reminder_text())
                        .unwrap_or_else(|| NOTHING_DUE.to_string()),
                    Err(e) => {
                        warn!("Due check failed: {e}");
                        self.notifier.error(&e.to_string());
                        READ_FAILED.to_string()
                    }
                };
                self.speech.speak(&reply).await;
            }
            Command::AddDefault => match self.store.add(voice_default_record()) {
                Ok(()) => self.speech.speak(ADDING_DEFAULT).await,
                Err(e) => {
                    warn!("Voice add failed: {e}");
                    self.notifier.error(&e.to_string());
                    self.speech.speak(ADD_FAILED).await;
                }
            },
            Command::TellTime => {
                let reply = format!("The time is {}.", self.clock.now());
                self.speech.speak(&reply).await;
            }
            Command::CallDoctor => self.speech.speak(ASK_CALL_DOCTOR).await,
            Command::Unrecognized => self.speech.speak(NOT_RECOGNIZED).await,
        }

        command
    }
}
