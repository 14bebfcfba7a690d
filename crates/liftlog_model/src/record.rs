//! Records and remote table rows.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// An opaque user identifier supplied by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Wraps an identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// One logged set as held in the read model.
///
/// The exercise, day and position are implied by where the entry sits in
/// [`crate::History`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SetEntry {
    /// Weight moved, non-negative.
    pub weight: f64,
    /// Repetitions performed.
    pub reps: u32,
    /// Always true once logged.
    pub completed: bool,
}

impl SetEntry {
    /// Creates a completed set.
    pub fn new(weight: f64, reps: u32) -> Self {
        Self {
            weight,
            reps,
            completed: true,
        }
    }

    /// Weight times reps.
    pub fn volume(&self) -> f64 {
        self.weight * f64::from(self.reps)
    }
}

/// The uniqueness constraint a row is upserted against.
///
/// Anonymous rows carry no owner column in their key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConflictKey(&'static [&'static str]);

impl ConflictKey {
    /// Key of an owned `sets` row.
    pub const SETS_OWNED: Self = Self(&["user_id", "exercise_id", "date", "set_index"]);
    /// Key of an anonymous `sets` row.
    pub const SETS_ANONYMOUS: Self = Self(&["exercise_id", "date", "set_index"]);
    /// Key of an owned `sessions` row.
    pub const SESSIONS_OWNED: Self = Self(&["user_id", "workout_id", "date"]);
    /// Key of an anonymous `sessions` row.
    pub const SESSIONS_ANONYMOUS: Self = Self(&["workout_id", "date"]);

    /// Column names making up the key.
    pub fn columns(&self) -> &'static [&'static str] {
        self.0
    }

    /// Comma-joined column list, as used by `on_conflict=` query parameters.
    pub fn to_query(&self) -> String {
        self.0.join(",")
    }
}

/// A row of the remote `sets` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetRow {
    /// Owner, or `None` for anonymous scope.
    pub user_id: Option<UserId>,
    /// Exercise identifier.
    pub exercise_id: String,
    /// Day the set was logged.
    pub date: NaiveDate,
    /// Position within the exercise-day.
    pub set_index: u32,
    /// Weight moved.
    pub weight: f64,
    /// Repetitions performed.
    pub reps: u32,
    /// Completion flag.
    #[serde(default = "completed_default")]
    pub completed: bool,
}

fn completed_default() -> bool {
    true
}

impl SetRow {
    /// Returns the uniqueness constraint for this row's scope.
    pub fn conflict_key(&self) -> ConflictKey {
        if self.user_id.is_some() {
            ConflictKey::SETS_OWNED
        } else {
            ConflictKey::SETS_ANONYMOUS
        }
    }

    /// Returns true if both rows address the same logical record.
    pub fn same_key(&self, other: &SetRow) -> bool {
        self.user_id == other.user_id
            && self.exercise_id == other.exercise_id
            && self.date == other.date
            && self.set_index == other.set_index
    }

    /// The read-model entry carried by this row.
    pub fn entry(&self) -> SetEntry {
        SetEntry {
            weight: self.weight,
            reps: self.reps,
            completed: self.completed,
        }
    }
}

/// One completed workout as held in the read model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Workout template identifier.
    pub workout_id: String,
    /// Display title.
    pub title: String,
    /// Day the workout was finished.
    pub date: NaiveDate,
    /// Length of the workout.
    pub duration_seconds: u32,
}

/// A row of the remote `sessions` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRow {
    /// Owner, or `None` for anonymous scope.
    pub user_id: Option<UserId>,
    /// Workout template identifier.
    pub workout_id: String,
    /// Display title.
    pub title: String,
    /// Day the workout was finished.
    pub date: NaiveDate,
    /// Duration in seconds.
    pub duration: u32,
}

impl SessionRow {
    /// Returns the uniqueness constraint for this row's scope.
    pub fn conflict_key(&self) -> ConflictKey {
        if self.user_id.is_some() {
            ConflictKey::SESSIONS_OWNED
        } else {
            ConflictKey::SESSIONS_ANONYMOUS
        }
    }

    /// Returns true if both rows address the same logical record.
    pub fn same_key(&self, other: &SessionRow) -> bool {
        self.user_id == other.user_id
            && self.workout_id == other.workout_id
            && self.date == other.date
    }

    /// Builds a row from a read-model record.
    pub fn from_record(user_id: Option<UserId>, record: &SessionRecord) -> Self {
        Self {
            user_id,
            workout_id: record.workout_id.clone(),
            title: record.title.clone(),
            date: record.date,
            duration: record.duration_seconds,
        }
    }

    /// The read-model record carried by this row.
    pub fn into_record(self) -> SessionRecord {
        SessionRecord {
            workout_id: self.workout_id,
            title: self.title,
            date: self.date,
            duration_seconds: self.duration,
        }
    }
}
