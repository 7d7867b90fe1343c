//! Background reminder loop.
//!
//! Checks the medication list once per interval and speaks the first dose
//! due in the current minute. A failed check is logged and skipped; the
//! loop only ends when its cancellation token fires.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::due::{find_due, Clock};
use crate::notifier::Notifier;
use crate::speech::SpeechOutput;
use crate::store::MedicationStore;

pub struct ReminderScheduler {
    store: Arc<MedicationStore>,
    speech: Arc<dyn SpeechOutput>,
    clock: Arc<dyn Clock>,
    notifier: Arc<Notifier>,
    interval: Duration,
    count: AtomicU32,
}

impl ReminderScheduler {
    pub fn new(
        store: Arc<MedicationStore>,
        speech: Arc<dyn SpeechOutput>,
        clock: Arc<dyn Clock>,
        notifier: Arc<Notifier>,
        interval: Duration,
    ) -> Self {
        Self {
            store,
            speech,
            clock,
            notifier,
            interval,
            count: AtomicU32::new(0),
        }
    }

    pub fn reminder_count(&self) -> u32 {
        self.count.load(Ordering::Relaxed)
    }

    /// One check. Returns the reminder spoken, if any.
    pub async fn tick(&self) -> Option<String> {
        let now = self.clock.now();
        let records = match self.store.load() {
            Ok(records) => records,
            Err(e) => {
                warn!("Reminder check at {now} skipped: {e}");
                return None;
            }
        };

        let Some(due) = find_due(&records, &now) else {
            debug!("Nothing due at {now}");
            return None;
        };

        let text = due.reminder_text();
        let n = self.count.fetch_add(1, Ordering::Relaxed) + 1;
        info!("Reminder #{n} at {now}: {text}");
        self.notifier.reminder(&text);
        self.speech.speak(&text).await;
        Some(text)
    }

    /// Start the loop. The first check runs immediately; each later one
    /// runs a full interval after the previous check finished.
    pub fn spawn(self: Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        info!("Reminder scheduler started (every {}s)", self.interval.as_secs());
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = self.tick() => {}
                }
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(self.interval) => {}
                }
            }
            info!(
                "Reminder scheduler stopped after {} reminder(s)",
                self.reminder_count()
            );
        })
    }
}
