//! Desktop notifications via notify-rust (D-Bus).
//!
//! Mirrors spoken reminders and surfaces storage failures that happen in
//! background tasks, where there is no terminal to print to.

use notify_rust::{Notification, Urgency};
use tracing::{debug, warn};

pub struct Notifier {
    enabled: bool,
}

impl Notifier {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn reminder(&self, body: &str) {
        self.show("Medication reminder", body, Urgency::Critical);
    }

    pub fn error(&self, body: &str) {
        self.show("Medical assistant", body, Urgency::Normal);
    }

    fn show(&self, summary: &str, body: &str, urgency: Urgency) {
        if !self.enabled {
            return;
        }

        debug!("Notification: {summary}");

        if let Err(e) = Notification::new()
            .summary(summary)
            .body(body)
            .icon("appointment-soon")
            .urgency(urgency)
            .timeout(10000)
            .show()
        {
            warn!("Failed to show notification: {e}");
        }
    }
}
