//! The set history read model.

use crate::record::{SetEntry, SetRow};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Logged sets, grouped by exercise and day.
///
/// # Invariants
///
/// - The position of an entry in its day sequence is its set index
/// - Sequences have no gaps: sparse writes and deletions are compacted
/// - Days without sets and exercises without days are pruned
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct History {
    exercises: BTreeMap<String, BTreeMap<NaiveDate, Vec<SetEntry>>>,
}

/// What a [`History::remove`] took out, and what moved as a result.
#[derive(Debug, Clone, PartialEq)]
pub struct SetRemoval {
    /// The removed entry.
    pub removed: SetEntry,
    /// Entries now occupying `set_index..`, in order.
    pub shifted: Vec<SetEntry>,
    /// Length of the day sequence before the removal.
    pub previous_len: u32,
}

impl History {
    /// Creates an empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a history from flat `sets` rows.
    ///
    /// Rows are ordered by set index within each day; gaps left by the
    /// remote table are compacted away.
    pub fn from_rows(rows: impl IntoIterator<Item = SetRow>) -> Self {
        let mut sparse: BTreeMap<String, BTreeMap<NaiveDate, BTreeMap<u32, SetEntry>>> =
            BTreeMap::new();
        for row in rows {
            let entry = row.entry();
            sparse
                .entry(row.exercise_id)
                .or_default()
                .entry(row.date)
                .or_default()
                .insert(row.set_index, entry);
        }

        let exercises = sparse
            .into_iter()
            .map(|(exercise, days)| {
                let days = days
                    .into_iter()
                    .map(|(date, sets)| (date, sets.into_values().collect()))
                    .collect();
                (exercise, days)
            })
            .collect();
        Self { exercises }
    }

    /// Returns true if no sets are recorded.
    pub fn is_empty(&self) -> bool {
        self.exercises.is_empty()
    }

    /// Total number of logged sets.
    pub fn set_count(&self) -> usize {
        self.exercises
            .values()
            .flat_map(|days| days.values())
            .map(Vec::len)
            .sum()
    }

    /// Exercise identifiers with at least one set, in sorted order.
    pub fn exercise_ids(&self) -> impl Iterator<Item = &str> {
        self.exercises.keys().map(String::as_str)
    }

    /// All days of one exercise, oldest first.
    pub fn days(&self, exercise_id: &str) -> impl Iterator<Item = (NaiveDate, &[SetEntry])> {
        self.exercises
            .get(exercise_id)
            .into_iter()
            .flat_map(|days| days.iter().map(|(date, sets)| (*date, sets.as_slice())))
    }

    /// Sets of one exercise on one day.
    pub fn sets_on(&self, exercise_id: &str, date: NaiveDate) -> &[SetEntry] {
        self.exercises
            .get(exercise_id)
            .and_then(|days| days.get(&date))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// A single set, if present.
    pub fn get(&self, exercise_id: &str, date: NaiveDate, set_index: usize) -> Option<&SetEntry> {
        self.sets_on(exercise_id, date).get(set_index)
    }

    /// Today's sets for an exercise.
    pub fn today_log(&self, exercise_id: &str, today: NaiveDate) -> &[SetEntry] {
        self.sets_on(exercise_id, today)
    }

    /// Sets from the most recent day before `today`, used to prefill inputs.
    pub fn previous_log(&self, exercise_id: &str, today: NaiveDate) -> &[SetEntry] {
        self.exercises
            .get(exercise_id)
            .and_then(|days| days.range(..today).next_back())
            .map(|(_, sets)| sets.as_slice())
            .unwrap_or(&[])
    }

    /// Writes `entry` at `set_index`, growing the day as needed.
    ///
    /// Positions between the current end and `set_index` are not filled
    /// with placeholders; the entry is compacted down to the first free
    /// position instead. Returns the index the entry ends up at.
    pub fn upsert(
        &mut self,
        exercise_id: &str,
        date: NaiveDate,
        set_index: usize,
        entry: SetEntry,
    ) -> usize {
        let sets = self
            .exercises
            .entry(exercise_id.to_string())
            .or_default()
            .entry(date)
            .or_default();

        if set_index < sets.len() {
            sets[set_index] = entry;
            set_index
        } else {
            sets.push(entry);
            sets.len() - 1
        }
    }

    /// Removes the set at `set_index` and shifts later sets down by one.
    ///
    /// Returns `None` if there is no set at that position.
    pub fn remove(
        &mut self,
        exercise_id: &str,
        date: NaiveDate,
        set_index: usize,
    ) -> Option<SetRemoval> {
        let days = self.exercises.get_mut(exercise_id)?;
        let sets = days.get_mut(&date)?;
        if set_index >= sets.len() {
            return None;
        }

        let previous_len = sets.len() as u32;
        let removed = sets.remove(set_index);
        let shifted = sets[set_index..].to_vec();

        if sets.is_empty() {
            days.remove(&date);
        }
        if days.is_empty() {
            self.exercises.remove(exercise_id);
        }

        Some(SetRemoval {
            removed,
            shifted,
            previous_len,
        })
    }

    /// Discards every recorded set.
    pub fn clear(&mut self) {
        self.exercises.clear();
    }
}
