//! Property-based test generators using proptest.
//!
//! Provides strategies for user input, remote rows, and sequences of
//! engine operations interleaved with connectivity changes, clock moves and
//! identity switches.

use crate::fixtures::{test_day, TestHarness};
use chrono::{Days, Duration, NaiveDate};
use liftlog_model::{SessionRow, SetInput, SetRow, UserId};
use proptest::prelude::*;

/// Strategy for exercise identifiers drawn from a small pool, so that
/// generated operations collide often.
pub fn exercise_id_strategy() -> impl Strategy<Value = String> {
    prop::sample::select(vec!["squat", "bench", "deadlift"]).prop_map(str::to_string)
}

/// Strategy for workout identifiers drawn from a small pool.
pub fn workout_id_strategy() -> impl Strategy<Value = String> {
    prop::sample::select(vec!["push", "pull", "legs"]).prop_map(str::to_string)
}

/// Strategy for plate-loadable weights (multiples of 2.5 kg).
pub fn weight_strategy() -> impl Strategy<Value = f64> {
    (0u32..=200).prop_map(|steps| f64::from(steps) * 2.5)
}

/// Strategy for validated set input.
pub fn set_input_strategy() -> impl Strategy<Value = SetInput> {
    (weight_strategy(), 0u32..=30).prop_map(|(weight, reps)| SetInput { weight, reps })
}

/// Strategy for days within a few weeks of [`test_day`].
pub fn day_strategy() -> impl Strategy<Value = NaiveDate> {
    (0u64..28).prop_map(|back| test_day() - Days::new(back))
}

/// Strategy for raw weight field text, valid or not.
pub fn weight_text_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        weight_strategy().prop_map(|w| w.to_string()),
        weight_strategy().prop_map(|w| w.to_string().replace('.', ",")),
        Just(String::new()),
        Just("-5".to_string()),
        "[a-z]{1,6}",
    ]
}

/// Strategy for remote `sets` rows, possibly sparse, of at most two owners.
pub fn set_row_strategy() -> impl Strategy<Value = SetRow> {
    (
        prop::option::of(prop::sample::select(vec!["a", "b"])),
        exercise_id_strategy(),
        day_strategy(),
        0u32..6,
        set_input_strategy(),
    )
        .prop_map(|(user, exercise_id, date, set_index, input)| SetRow {
            user_id: user.map(UserId::from),
            exercise_id,
            date,
            set_index,
            weight: input.weight,
            reps: input.reps,
            completed: true,
        })
}

/// Strategy for remote `sessions` rows of at most two owners.
pub fn session_row_strategy() -> impl Strategy<Value = SessionRow> {
    (
        prop::option::of(prop::sample::select(vec!["a", "b"])),
        workout_id_strategy(),
        day_strategy(),
        60u32..7200,
    )
        .prop_map(|(user, workout_id, date, duration)| SessionRow {
            user_id: user.map(UserId::from),
            title: workout_id.to_uppercase(),
            workout_id,
            date,
            duration,
        })
}

/// One step of a generated engine session.
#[derive(Debug, Clone)]
pub enum EngineOp {
    /// Log a set today.
    LogSet {
        /// Exercise identifier.
        exercise_id: String,
        /// Requested position, possibly past the end.
        set_index: usize,
        /// Validated input.
        input: SetInput,
    },
    /// Delete a set today, possibly a missing one.
    DeleteSet {
        /// Exercise identifier.
        exercise_id: String,
        /// Position to delete.
        set_index: usize,
    },
    /// Finish a workout on some recent day.
    FinishWorkout {
        /// Workout identifier.
        workout_id: String,
        /// Day of the workout.
        date: NaiveDate,
        /// Duration in seconds.
        duration_seconds: u32,
    },
    /// Lose connectivity.
    GoOffline,
    /// Regain connectivity, draining the queue.
    GoOnline,
    /// Drain explicitly.
    Sync,
    /// Move the clock forward, possibly past midnight.
    AdvanceClock {
        /// Hours to move forward.
        hours: u32,
    },
    /// Sign in a user that has not been signed in before.
    SwitchUser,
}

/// Prefix of the users [`EngineOp::SwitchUser`] signs in.
pub const SWITCH_USER_PREFIX: &str = "lifter-";

/// Strategy for a single [`EngineOp`], weighted towards set writes.
pub fn engine_op_strategy() -> impl Strategy<Value = EngineOp> {
    prop_oneof![
        5 => (exercise_id_strategy(), 0usize..5, set_input_strategy()).prop_map(
            |(exercise_id, set_index, input)| EngineOp::LogSet {
                exercise_id,
                set_index,
                input,
            }
        ),
        3 => (exercise_id_strategy(), 0usize..5).prop_map(|(exercise_id, set_index)| {
            EngineOp::DeleteSet {
                exercise_id,
                set_index,
            }
        }),
        2 => (workout_id_strategy(), day_strategy(), 60u32..7200).prop_map(
            |(workout_id, date, duration_seconds)| EngineOp::FinishWorkout {
                workout_id,
                date,
                duration_seconds,
            }
        ),
        1 => Just(EngineOp::GoOffline),
        1 => Just(EngineOp::GoOnline),
        1 => Just(EngineOp::Sync),
        1 => (1u32..30).prop_map(|hours| EngineOp::AdvanceClock { hours }),
        1 => Just(EngineOp::SwitchUser),
    ]
}

/// Strategy for a sequence of engine operations.
pub fn engine_ops_strategy(max_len: usize) -> impl Strategy<Value = Vec<EngineOp>> {
    prop::collection::vec(engine_op_strategy(), 0..max_len)
}

/// Applies `op` to the harness.
pub fn apply_op(harness: &TestHarness, op: &EngineOp) {
    match op {
        EngineOp::LogSet {
            exercise_id,
            set_index,
            input,
        } => {
            harness
                .engine
                .log_set_input(exercise_id, *set_index, *input)
                .expect("generated set index is in range");
        }
        EngineOp::DeleteSet {
            exercise_id,
            set_index,
        } => {
            harness.engine.delete_set(exercise_id, *set_index);
        }
        EngineOp::FinishWorkout {
            workout_id,
            date,
            duration_seconds,
        } => {
            let title = workout_id.to_uppercase();
            harness
                .engine
                .finish_workout(workout_id, &title, *duration_seconds, Some(*date));
        }
        EngineOp::GoOffline => harness.set_online(false),
        EngineOp::GoOnline => harness.set_online(true),
        EngineOp::Sync => {
            harness.engine.sync_queue();
        }
        EngineOp::AdvanceClock { hours } => {
            harness.clock.advance(Duration::hours(i64::from(*hours)));
        }
        EngineOp::SwitchUser => {
            let next = harness
                .engine
                .user_scope()
                .and_then(|user| {
                    user.as_str()
                        .strip_prefix(SWITCH_USER_PREFIX)?
                        .parse::<u32>()
                        .ok()
                })
                .map_or(1, |n| n + 1);
            harness.sign_in(&format!("{SWITCH_USER_PREFIX}{next}"));
        }
    }
}
