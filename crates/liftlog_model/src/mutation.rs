//! Typed payloads of queued writes.

use crate::error::{ModelError, ModelResult};
use crate::record::{SessionRow, SetEntry, SetRow, UserId};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;

/// Tag of a queued write, as persisted in the `action` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum QueueAction {
    /// Upsert of one set.
    LogSet,
    /// Removal of one set, with re-indexing of the rest of the day.
    DeleteSet,
    /// Upsert of one completed workout.
    FinishWorkout,
}

impl QueueAction {
    /// The persisted tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueAction::LogSet => "logSet",
            QueueAction::DeleteSet => "deleteSet",
            QueueAction::FinishWorkout => "finishWorkout",
        }
    }
}

impl fmt::Display for QueueAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The record a queued write addresses, for deduplication.
///
/// Targets carry the owner and the day, so writes of different users or
/// different days never share a key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyTarget {
    /// A set position of an exercise on a day.
    Set {
        /// Owner of the set.
        user_id: Option<UserId>,
        /// Exercise identifier.
        exercise_id: String,
        /// Day of the set.
        date: NaiveDate,
        /// Set position.
        set_index: u32,
    },
    /// A workout on a day.
    Session {
        /// Owner of the workout.
        user_id: Option<UserId>,
        /// Workout identifier.
        workout_id: String,
        /// Day of the workout.
        date: NaiveDate,
    },
}

/// Deduplication key of a queued write: at most one queued item per key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueueKey {
    /// The write's action.
    pub action: QueueAction,
    /// The record it addresses.
    pub target: KeyTarget,
}

/// Arguments of a `logSet` write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogSetPayload {
    /// Owner at the time of the write.
    pub user_id: Option<UserId>,
    /// Exercise identifier.
    pub exercise_id: String,
    /// Day the set belongs to.
    pub date: NaiveDate,
    /// Position the set occupies.
    pub set_index: u32,
    /// Weight moved.
    pub weight: f64,
    /// Repetitions performed.
    pub reps: u32,
}

impl LogSetPayload {
    /// The `sets` row to upsert.
    pub fn row(&self) -> SetRow {
        SetRow {
            user_id: self.user_id.clone(),
            exercise_id: self.exercise_id.clone(),
            date: self.date,
            set_index: self.set_index,
            weight: self.weight,
            reps: self.reps,
            completed: true,
        }
    }
}

/// Arguments of a `deleteSet` write.
///
/// Besides the removed position, the payload carries the sets that moved
/// down to fill the gap, so that replay can mirror the re-indexing on the
/// remote table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteSetPayload {
    /// Owner at the time of the write.
    pub user_id: Option<UserId>,
    /// Exercise identifier.
    pub exercise_id: String,
    /// Day the set belonged to.
    pub date: NaiveDate,
    /// Removed position.
    pub set_index: u32,
    /// Sets now occupying `set_index..`, in order.
    #[serde(default)]
    pub shifted: Vec<SetEntry>,
    /// Day length before the removal.
    pub previous_len: u32,
}

impl DeleteSetPayload {
    /// Rows to upsert so the remote positions match the read model.
    pub fn shifted_rows(&self) -> Vec<SetRow> {
        self.shifted
            .iter()
            .zip(self.set_index..)
            .map(|(entry, set_index)| SetRow {
                user_id: self.user_id.clone(),
                exercise_id: self.exercise_id.clone(),
                date: self.date,
                set_index,
                weight: entry.weight,
                reps: entry.reps,
                completed: entry.completed,
            })
            .collect()
    }

    /// Remote positions that no longer hold a set after the re-indexing.
    pub fn stale_indices(&self) -> Range<u32> {
        let first_stale = self.set_index + self.shifted.len() as u32;
        first_stale..self.previous_len.max(first_stale + 1)
    }
}

/// Arguments of a `finishWorkout` write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinishWorkoutPayload {
    /// Owner at the time of the write.
    pub user_id: Option<UserId>,
    /// Workout identifier.
    pub workout_id: String,
    /// Display title.
    pub title: String,
    /// Day of the workout.
    pub date: NaiveDate,
    /// Duration in seconds.
    pub duration_seconds: u32,
}

impl FinishWorkoutPayload {
    /// The `sessions` row to upsert.
    pub fn row(&self) -> SessionRow {
        SessionRow {
            user_id: self.user_id.clone(),
            workout_id: self.workout_id.clone(),
            title: self.title.clone(),
            date: self.date,
            duration: self.duration_seconds,
        }
    }
}

/// Positions of one exercise-day a set write touches.
struct SetSpan<'a> {
    user_id: Option<&'a UserId>,
    exercise_id: &'a str,
    date: NaiveDate,
    positions: Range<u32>,
}

impl SetSpan<'_> {
    fn intersects(&self, other: &SetSpan<'_>) -> bool {
        self.user_id == other.user_id
            && self.exercise_id == other.exercise_id
            && self.date == other.date
            && self.positions.start < other.positions.end
            && other.positions.start < self.positions.end
    }
}

/// A write awaiting remote application.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    /// Upsert one set.
    LogSet(LogSetPayload),
    /// Remove one set and re-index the day.
    DeleteSet(DeleteSetPayload),
    /// Upsert one completed workout.
    FinishWorkout(FinishWorkoutPayload),
}

impl Mutation {
    /// The action tag.
    pub fn action(&self) -> QueueAction {
        match self {
            Mutation::LogSet(_) => QueueAction::LogSet,
            Mutation::DeleteSet(_) => QueueAction::DeleteSet,
            Mutation::FinishWorkout(_) => QueueAction::FinishWorkout,
        }
    }

    /// Deduplication key.
    ///
    /// Set writes are keyed by owner, exercise, day and position; workout
    /// writes by owner, workout and day.
    pub fn key(&self) -> QueueKey {
        let target = match self {
            Mutation::LogSet(p) => KeyTarget::Set {
                user_id: p.user_id.clone(),
                exercise_id: p.exercise_id.clone(),
                date: p.date,
                set_index: p.set_index,
            },
            Mutation::DeleteSet(p) => KeyTarget::Set {
                user_id: p.user_id.clone(),
                exercise_id: p.exercise_id.clone(),
                date: p.date,
                set_index: p.set_index,
            },
            Mutation::FinishWorkout(p) => KeyTarget::Session {
                user_id: p.user_id.clone(),
                workout_id: p.workout_id.clone(),
                date: p.date,
            },
        };
        QueueKey {
            action: self.action(),
            target,
        }
    }

    /// Owner the write was made under.
    pub fn owner(&self) -> Option<&UserId> {
        match self {
            Mutation::LogSet(p) => p.user_id.as_ref(),
            Mutation::DeleteSet(p) => p.user_id.as_ref(),
            Mutation::FinishWorkout(p) => p.user_id.as_ref(),
        }
    }

    /// Day the write applies to.
    pub fn date(&self) -> NaiveDate {
        match self {
            Mutation::LogSet(p) => p.date,
            Mutation::DeleteSet(p) => p.date,
            Mutation::FinishWorkout(p) => p.date,
        }
    }

    /// Returns true if replaying both writes in a different order could
    /// leave a different remote state.
    ///
    /// Set writes overlap when they touch the same owner, exercise and day
    /// and their position ranges intersect; a deletion touches its position
    /// and every position after it. Workout writes overlap on equal keys.
    pub fn overlaps(&self, other: &Mutation) -> bool {
        match (self, other) {
            (Mutation::FinishWorkout(a), Mutation::FinishWorkout(b)) => {
                a.user_id == b.user_id && a.workout_id == b.workout_id && a.date == b.date
            }
            (Mutation::FinishWorkout(_), _) | (_, Mutation::FinishWorkout(_)) => false,
            _ => match (self.set_span(), other.set_span()) {
                (Some(a), Some(b)) => a.intersects(&b),
                _ => false,
            },
        }
    }

    fn set_span(&self) -> Option<SetSpan<'_>> {
        match self {
            Mutation::LogSet(p) => Some(SetSpan {
                user_id: p.user_id.as_ref(),
                exercise_id: &p.exercise_id,
                date: p.date,
                positions: p.set_index..p.set_index.saturating_add(1),
            }),
            Mutation::DeleteSet(p) => Some(SetSpan {
                user_id: p.user_id.as_ref(),
                exercise_id: &p.exercise_id,
                date: p.date,
                positions: p.set_index..u32::MAX,
            }),
            Mutation::FinishWorkout(_) => None,
        }
    }

    /// Folds an older queued write with the same key into this one.
    ///
    /// Only deletions carry state across: the replacement must still clear
    /// every remote position the evicted deletion would have cleared.
    pub fn supersede(&mut self, older: &Mutation) {
        if self.key() != older.key() {
            return;
        }
        if let (Mutation::DeleteSet(newer), Mutation::DeleteSet(older)) = (self, older) {
            newer.previous_len = newer.previous_len.max(older.previous_len);
        }
    }

    /// Encodes the payload for the persisted `data` field.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be represented as JSON.
    pub fn to_data(&self) -> ModelResult<serde_json::Value> {
        let value = match self {
            Mutation::LogSet(p) => serde_json::to_value(p)?,
            Mutation::DeleteSet(p) => serde_json::to_value(p)?,
            Mutation::FinishWorkout(p) => serde_json::to_value(p)?,
        };
        Ok(value)
    }

    /// Decodes a persisted `data` field for the given action.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::MalformedPayload`] if `data` does not match
    /// the shape `action` requires.
    pub fn from_data(action: QueueAction, data: serde_json::Value) -> ModelResult<Self> {
        let malformed = |source| ModelError::MalformedPayload {
            action: action.as_str(),
            source,
        };
        let mutation = match action {
            QueueAction::LogSet => Mutation::LogSet(serde_json::from_value(data).map_err(malformed)?),
            QueueAction::DeleteSet => {
                Mutation::DeleteSet(serde_json::from_value(data).map_err(malformed)?)
            }
            QueueAction::FinishWorkout => {
                Mutation::FinishWorkout(serde_json::from_value(data).map_err(malformed)?)
            }
        };
        Ok(mutation)
    }
}
