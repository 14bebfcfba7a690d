//! The completed-workout read model.

use crate::record::{SessionRecord, SessionRow};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// Completed workouts, newest first.
///
/// Every mutation re-sorts by date, descending. Records sharing a date keep
/// their relative order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sessions {
    records: Vec<SessionRecord>,
}

impl Sessions {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the list from `sessions` rows.
    pub fn from_rows(rows: impl IntoIterator<Item = SessionRow>) -> Self {
        let mut sessions = Self {
            records: rows.into_iter().map(SessionRow::into_record).collect(),
        };
        sessions.sort();
        sessions
    }

    /// Inserts or replaces the record keyed by `(workout_id, date)`.
    ///
    /// Returns true if an existing record was replaced.
    pub fn upsert(&mut self, record: SessionRecord) -> bool {
        let existing = self
            .records
            .iter_mut()
            .find(|r| r.workout_id == record.workout_id && r.date == record.date);

        let replaced = match existing {
            Some(slot) => {
                *slot = record;
                true
            }
            None => {
                self.records.insert(0, record);
                false
            }
        };
        self.sort();
        replaced
    }

    fn sort(&mut self) {
        self.records.sort_by(|a, b| b.date.cmp(&a.date));
    }

    /// Records, newest first.
    pub fn as_slice(&self) -> &[SessionRecord] {
        &self.records
    }

    /// Iterates records, newest first.
    pub fn iter(&self) -> std::slice::Iter<'_, SessionRecord> {
        self.records.iter()
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if there are no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Most recent session of a workout template.
    pub fn last_for(&self, workout_id: &str) -> Option<&SessionRecord> {
        self.records.iter().find(|r| r.workout_id == workout_id)
    }

    /// Sessions in the ISO week (Monday to Sunday) containing `day`.
    pub fn in_week_of(&self, day: NaiveDate) -> Vec<&SessionRecord> {
        let week = day.iso_week();
        self.records
            .iter()
            .filter(|r| r.date.iso_week() == week)
            .collect()
    }

    /// Discards every record.
    pub fn clear(&mut self) {
        self.records.clear();
    }
}

impl<'a> IntoIterator for &'a Sessions {
    type Item = &'a SessionRecord;
    type IntoIter = std::slice::Iter<'a, SessionRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
