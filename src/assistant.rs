//! The assistant context: one explicitly constructed owner of the store,
//! speech ports, clock and notifier, handed to every front-end action and
//! background task.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::due::Clock;
use crate::error::StoreError;
use crate::interpreter::{Command, CommandInterpreter};
use crate::medication::MedicationRecord;
use crate::notifier::Notifier;
use crate::scheduler::ReminderScheduler;
use crate::speech::{SpeechInput, SpeechOutput};
use crate::store::MedicationStore;

pub const LISTENING: &str = "Listening...";
pub const NOT_UNDERSTOOD: &str = "Sorry, I could not understand.";
pub const ADDED: &str = "New medicine added.";
pub const REMOVED: &str = "Medication removed.";
pub const NOTHING_REMOVED: &str = "No matching medication found.";

pub struct Assistant {
    store: Arc<MedicationStore>,
    speech: Arc<dyn SpeechOutput>,
    listener: Arc<dyn SpeechInput>,
    clock: Arc<dyn Clock>,
    notifier: Arc<Notifier>,
    interpreter: CommandInterpreter,
}

impl Assistant {
    pub fn new(
        store: Arc<MedicationStore>,
        speech: Arc<dyn SpeechOutput>,
        listener: Arc<dyn SpeechInput>,
        clock: Arc<dyn Clock>,
        notifier: Arc<Notifier>,
    ) -> Self {
        let interpreter = CommandInterpreter::new(
            store.clone(),
            speech.clone(),
            clock.clone(),
            notifier.clone(),
        );
        Self {
            store,
            speech,
            listener,
            clock,
            notifier,
            interpreter,
        }
    }

    pub fn store(&self) -> &Arc<MedicationStore> {
        &self.store
    }

    pub fn list(&self) -> Result<Vec<MedicationRecord>, StoreError> {
        self.store.list()
    }

    /// Add a medication entered by the user. Validation errors come back
    /// unchanged so the user can correct the input.
    pub async fn add(&self, name: &str, time: &str, dose: &str) -> Result<(), StoreError> {
        let record = MedicationRecord::from_input(name, time, dose)?;
        self.store.add(record)?;
        self.speech.speak(ADDED).await;
        Ok(())
    }

    pub async fn remove(&self, time: &str, name: &str) -> Result<usize, StoreError> {
        let removed = self.store.remove(time.trim(), name.trim())?;
        let reply = if removed == 0 { NOTHING_REMOVED } else { REMOVED };
        self.speech.speak(reply).await;
        Ok(removed)
    }

    /// Capture one utterance. Any recognition failure is logged, apologized
    /// for out loud, and collapsed into an empty transcript.
    pub async fn listen_for_command(&self) -> String {
        self.speech.speak(LISTENING).await;
        match self.listener.listen().await {
            Ok(text) => {
                info!("Heard: \"{text}\"");
                text
            }
            Err(e) => {
                warn!("Voice capture failed: {e}");
                self.speech.speak(NOT_UNDERSTOOD).await;
                String::new()
            }
        }
    }

    /// Listen, then act on what was heard.
    pub async fn run_voice_command(&self) -> Command {
        let text = self.listen_for_command().await;
        self.interpreter.interpret(&text).await
    }

    /// Run one voice command on its own task.
    pub fn trigger_voice_command(self: &Arc<Self>) -> JoinHandle<Command> {
        let assistant = Arc::clone(self);
        tokio::spawn(async move { assistant.run_voice_command().await })
    }

    pub fn scheduler(&self, interval: Duration) -> ReminderScheduler {
        ReminderScheduler::new(
            self.store.clone(),
            self.speech.clone(),
            self.clock.clone(),
            self.notifier.clone(),
            interval,
        )
    }
}
