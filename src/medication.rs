//! Medication records as stored in the backing JSON file.

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// One scheduled dose. `(name, time)` is the only identity a record has.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MedicationRecord {
    pub name: String,
    pub time: String,
    pub dose: String,
}

impl MedicationRecord {
    pub fn new(name: impl Into<String>, time: impl Into<String>, dose: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            time: time.into(),
            dose: dose.into(),
        }
    }

    /// Build a record from user input, trimming whitespace and rejecting
    /// empty fields or times that are not `HH:MM`.
    pub fn from_input(name: &str, time: &str, dose: &str) -> Result<Self, ValidationError> {
        let record = Self::new(name.trim(), time.trim(), dose.trim());
        record.validate()?;
        Ok(record)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::MissingField("name"));
        }
        if self.time.trim().is_empty() {
            return Err(ValidationError::MissingField("time"));
        }
        if self.dose.trim().is_empty() {
            return Err(ValidationError::MissingField("dose"));
        }
        if !is_valid_time(&self.time) {
            return Err(ValidationError::InvalidTime(self.time.clone()));
        }
        Ok(())
    }

    pub fn matches(&self, time: &str, name: &str) -> bool {
        self.time == time && self.name == name
    }

    /// Spoken reminder for this dose.
    pub fn reminder_text(&self) -> String {
        format!("Reminder: Take {} of {} now.", self.dose, self.name)
    }

    /// Row as shown by the front end: time, then "name (dose)".
    pub fn display_row(&self) -> String {
        format!("{:<6} {} ({})", self.time, self.name, self.dose)
    }
}

/// Records written to a fresh medication file.
pub fn seed_records() -> Vec<MedicationRecord> {
    vec![
        MedicationRecord::new("Paracetamol", "08:00", "1 tablet"),
        MedicationRecord::new("Ibuprofen", "14:00", "2 tablets"),
    ]
}

/// Record appended by the "add" voice command.
pub fn voice_default_record() -> MedicationRecord {
    MedicationRecord::new("Aspirin", "18:00", "1 tablet")
}

/// Strict 24-hour `HH:MM`: two-digit hour and minute.
pub fn is_valid_time(time: &str) -> bool {
    let bytes = time.as_bytes();
    let shape_ok = bytes.len() == 5
        && bytes.iter().enumerate().all(|(i, b)| {
            if i == 2 {
                *b == b':'
            } else {
                b.is_ascii_digit()
            }
        });
    // chrono skips inner whitespace, so the shape check has to come first
    shape_ok && NaiveTime::parse_from_str(time, "%H:%M").is_ok()
}
