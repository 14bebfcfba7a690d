//! # LiftLog Model
//!
//! Records, read model and queued mutation types for LiftLog.
//!
//! This crate provides:
//! - [`SetRow`] / [`SessionRow`] - rows of the remote `sets` and `sessions` tables
//! - [`History`] - exercise → day → ordered sets, with gap-free re-indexing
//! - [`Sessions`] - completed workouts, newest first
//! - [`Mutation`] - the typed payload of a queued write
//! - [`SetInput`] - validation of user-entered weight and reps
//! - Read-model statistics (best set, progression, weekly sessions)
//!
//! This is a pure data crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod history;
mod input;
mod mutation;
mod record;
mod sessions;
pub mod stats;

pub use error::{ModelError, ModelResult};
pub use history::{History, SetRemoval};
pub use input::SetInput;
pub use mutation::{
    DeleteSetPayload, FinishWorkoutPayload, KeyTarget, LogSetPayload, Mutation, QueueAction,
    QueueKey,
};
pub use record::{ConflictKey, SessionRecord, SessionRow, SetEntry, SetRow, UserId};
pub use sessions::Sessions;
