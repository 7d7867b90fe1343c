//! Due-time evaluation.
//!
//! A dose is due only during the exact minute it is scheduled: `time` must
//! equal the current `HH:MM` string. A poll that misses the minute misses
//! the reminder.

use chrono::Local;

use crate::medication::MedicationRecord;

/// Source of the current wall-clock time as `HH:MM`.
pub trait Clock: Send + Sync {
    fn now(&self) -> String;
}

/// Local system time.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> String {
        Local::now().format("%H:%M").to_string()
    }
}

/// First record, in list order, scheduled for `now`.
pub fn find_due<'a>(records: &'a [MedicationRecord], now: &str) -> Option<&'a MedicationRecord> {
    records.iter().find(|r| r.time == now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::medication::{is_valid_time, seed_records};

    #[test]
    fn nothing_due_between_doses() {
        assert_eq!(find_due(&seed_records(), "09:00"), None);
        assert_eq!(find_due(&[], "08:00"), None);
    }

    #[test]
    fn matching_minute_is_due() {
        let records = seed_records();
        let due = find_due(&records, "14:00").unwrap();
        assert_eq!(due.name, "Ibuprofen");
    }

    #[test]
    fn first_match_wins() {
        let records = vec![
            MedicationRecord::new("A", "08:00", "1"),
            MedicationRecord::new("B", "12:00", "1"),
            MedicationRecord::new("C", "12:00", "2"),
        ];
        assert_eq!(find_due(&records, "12:00").unwrap().name, "B");
    }

    #[test]
    fn no_window_around_the_minute() {
        let records = seed_records();
        assert_eq!(find_due(&records, "08:01"), None);
        assert_eq!(find_due(&records, "07:59"), None);
    }

    #[test]
    fn system_clock_formats_hh_mm() {
        assert!(is_valid_time(&SystemClock.now()));
    }
}
