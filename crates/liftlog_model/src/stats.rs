//! Progress statistics derived from the read model.

use crate::history::History;
use crate::record::SetEntry;
use chrono::NaiveDate;

/// Best performance and progression of one exercise.
#[derive(Debug, Clone, PartialEq)]
pub struct ExerciseStats {
    /// Exercise identifier.
    pub exercise_id: String,
    /// Heaviest weight ever logged, 0 if none.
    pub max_weight: f64,
    /// The first set that reached `max_weight`.
    pub best_set: Option<SetEntry>,
    /// Heaviest weight per day, oldest first. Days topping out at 0 are skipped.
    pub progression: Vec<(NaiveDate, f64)>,
}

impl ExerciseStats {
    /// Computes statistics for one exercise.
    pub fn compute(history: &History, exercise_id: &str) -> Self {
        let mut max_weight = 0.0;
        let mut best_set = None;
        let mut progression = Vec::new();

        for (date, sets) in history.days(exercise_id) {
            let mut day_max = 0.0_f64;
            for set in sets {
                day_max = day_max.max(set.weight);
                if set.weight > max_weight {
                    max_weight = set.weight;
                    best_set = Some(*set);
                }
            }
            if day_max > 0.0 {
                progression.push((date, day_max));
            }
        }

        Self {
            exercise_id: exercise_id.to_string(),
            max_weight,
            best_set,
            progression,
        }
    }
}

/// Statistics for every exercise in the history, heaviest first.
pub fn rank_by_max_weight(history: &History) -> Vec<ExerciseStats> {
    let mut stats: Vec<_> = history
        .exercise_ids()
        .map(|id| ExerciseStats::compute(history, id))
        .collect();
    stats.sort_by(|a, b| b.max_weight.total_cmp(&a.max_weight));
    stats
}

/// Total weight × reps logged on `date` across the given exercises.
pub fn day_volume<'a>(
    history: &History,
    exercise_ids: impl IntoIterator<Item = &'a str>,
    date: NaiveDate,
) -> f64 {
    exercise_ids
        .into_iter()
        .flat_map(|id| history.sets_on(id, date))
        .map(SetEntry::volume)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 7, d).unwrap()
    }

    fn sample() -> History {
        let mut history = History::new();
        history.upsert("bench", day(1), 0, SetEntry::new(60.0, 8));
        history.upsert("bench", day(1), 1, SetEntry::new(65.0, 5));
        history.upsert("bench", day(8), 0, SetEntry::new(65.0, 6));
        history.upsert("squat", day(2), 0, SetEntry::new(100.0, 5));
        history.upsert("plank", day(2), 0, SetEntry::new(0.0, 60));
        history
    }

    #[test]
    fn compute_tracks_first_best_set() {
        let stats = ExerciseStats::compute(&sample(), "bench");
        assert_eq!(stats.max_weight, 65.0);
        assert_eq!(stats.best_set, Some(SetEntry::new(65.0, 5)));
        assert_eq!(stats.progression, vec![(day(1), 65.0), (day(8), 65.0)]);
    }

    #[test]
    fn bodyweight_exercise_has_no_progression() {
        let stats = ExerciseStats::compute(&sample(), "plank");
        assert_eq!(stats.max_weight, 0.0);
        assert!(stats.best_set.is_none());
        assert!(stats.progression.is_empty());
    }

    #[test]
    fn ranking_is_heaviest_first() {
        let ranked: Vec<_> = rank_by_max_weight(&sample())
            .into_iter()
            .map(|s| s.exercise_id)
            .collect();
        assert_eq!(ranked, vec!["squat", "bench", "plank"]);
    }

    #[test]
    fn volume_sums_selected_exercises() {
        let history = sample();
        assert_eq!(day_volume(&history, ["bench"], day(1)), 60.0 * 8.0 + 65.0 * 5.0);
        assert_eq!(day_volume(&history, ["bench", "squat"], day(2)), 500.0);
        assert_eq!(day_volume(&history, ["missing"], day(1)), 0.0);
    }
}
