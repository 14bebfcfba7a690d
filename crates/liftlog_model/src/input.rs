//! Validation of user-entered set values.

use crate::error::{ModelError, ModelResult};
use crate::record::SetEntry;

/// Weight and reps as typed into a set row, validated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SetInput {
    /// Weight moved, finite and non-negative.
    pub weight: f64,
    /// Repetitions performed.
    pub reps: u32,
}

impl SetInput {
    /// Parses raw field values.
    ///
    /// Weight accepts either `.` or `,` as the decimal separator. Both
    /// fields tolerate surrounding whitespace.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvalidWeight`] or [`ModelError::InvalidReps`]
    /// if a field is empty, not a number, negative, or (for weight) not
    /// finite.
    pub fn parse(weight: &str, reps: &str) -> ModelResult<Self> {
        let weight_value = weight
            .trim()
            .replace(',', ".")
            .parse::<f64>()
            .ok()
            .filter(|w| w.is_finite() && *w >= 0.0)
            .ok_or_else(|| ModelError::InvalidWeight(weight.to_string()))?;

        let reps_value = reps
            .trim()
            .parse::<u32>()
            .map_err(|_| ModelError::InvalidReps(reps.to_string()))?;

        Ok(Self {
            weight: weight_value,
            reps: reps_value,
        })
    }

    /// The completed read-model entry for this input.
    pub fn entry(&self) -> SetEntry {
        SetEntry::new(self.weight, self.reps)
    }
}
