//! Remote store abstraction.

use crate::error::{SyncError, SyncResult};
use chrono::NaiveDate;
use liftlog_model::{ConflictKey, SessionRow, SetRow, UserId};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

/// Row-level access to the remote `sets` and `sessions` tables.
///
/// Owner filters follow the row scoping rule: `Some(user)` selects rows
/// owned by `user`, `None` selects anonymous rows only.
pub trait RemoteGateway: Send + Sync {
    /// Inserts or replaces a set row, resolving conflicts on `key`.
    fn upsert_set(&self, row: &SetRow, key: ConflictKey) -> SyncResult<()>;

    /// Deletes the set row at the given position. Missing rows are not an
    /// error.
    fn delete_set(
        &self,
        exercise_id: &str,
        date: NaiveDate,
        set_index: u32,
        owner: Option<&UserId>,
    ) -> SyncResult<()>;

    /// Inserts or replaces a session row, resolving conflicts on `key`.
    fn upsert_session(&self, row: &SessionRow, key: ConflictKey) -> SyncResult<()>;

    /// Returns all set rows of `owner`.
    fn select_sets(&self, owner: Option<&UserId>) -> SyncResult<Vec<SetRow>>;

    /// Returns all session rows of `owner`.
    fn select_sessions(&self, owner: Option<&UserId>) -> SyncResult<Vec<SessionRow>>;
}

impl<G: RemoteGateway + ?Sized> RemoteGateway for std::sync::Arc<G> {
    fn upsert_set(&self, row: &SetRow, key: ConflictKey) -> SyncResult<()> {
        (**self).upsert_set(row, key)
    }

    fn delete_set(
        &self,
        exercise_id: &str,
        date: NaiveDate,
        set_index: u32,
        owner: Option<&UserId>,
    ) -> SyncResult<()> {
        (**self).delete_set(exercise_id, date, set_index, owner)
    }

    fn upsert_session(&self, row: &SessionRow, key: ConflictKey) -> SyncResult<()> {
        (**self).upsert_session(row, key)
    }

    fn select_sets(&self, owner: Option<&UserId>) -> SyncResult<Vec<SetRow>> {
        (**self).select_sets(owner)
    }

    fn select_sessions(&self, owner: Option<&UserId>) -> SyncResult<Vec<SessionRow>> {
        (**self).select_sessions(owner)
    }
}

/// A call observed by [`MemoryGateway`].
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayCall {
    /// `upsert_set` with the row and conflict target.
    UpsertSet(SetRow, ConflictKey),
    /// `delete_set` with exercise, day, position and owner.
    DeleteSet(String, NaiveDate, u32, Option<UserId>),
    /// `upsert_session` with the row and conflict target.
    UpsertSession(SessionRow, ConflictKey),
    /// `select_sets` with the owner filter.
    SelectSets(Option<UserId>),
    /// `select_sessions` with the owner filter.
    SelectSessions(Option<UserId>),
}

/// An in-memory remote store.
///
/// Rows are unique on their key columns including the owner, as the remote
/// uniqueness constraints are. Every call is recorded, including calls that
/// fail while the store is unavailable.
#[derive(Debug)]
pub struct MemoryGateway {
    sets: RwLock<Vec<SetRow>>,
    sessions: RwLock<Vec<SessionRow>>,
    calls: RwLock<Vec<GatewayCall>>,
    available: AtomicBool,
}

impl MemoryGateway {
    /// Creates an empty, reachable store.
    pub fn new() -> Self {
        Self {
            sets: RwLock::new(Vec::new()),
            sessions: RwLock::new(Vec::new()),
            calls: RwLock::new(Vec::new()),
            available: AtomicBool::new(true),
        }
    }

    /// Makes every call succeed (`true`) or fail with a retryable error.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Seeds a set row without recording a call.
    pub fn insert_set(&self, row: SetRow) {
        upsert_by(&mut *self.sets.write(), row, SetRow::same_key);
    }

    /// Seeds a session row without recording a call.
    pub fn insert_session(&self, row: SessionRow) {
        upsert_by(&mut *self.sessions.write(), row, SessionRow::same_key);
    }

    /// All stored set rows.
    pub fn sets(&self) -> Vec<SetRow> {
        self.sets.read().clone()
    }

    /// All stored session rows.
    pub fn sessions(&self) -> Vec<SessionRow> {
        self.sessions.read().clone()
    }

    /// Calls observed so far.
    pub fn calls(&self) -> Vec<GatewayCall> {
        self.calls.read().clone()
    }

    /// Number of write calls (upserts and deletes) observed so far.
    pub fn write_count(&self) -> usize {
        self.calls
            .read()
            .iter()
            .filter(|c| {
                !matches!(c, GatewayCall::SelectSets(_) | GatewayCall::SelectSessions(_))
            })
            .count()
    }

    /// Forgets observed calls.
    pub fn clear_calls(&self) {
        self.calls.write().clear();
    }

    fn record(&self, call: GatewayCall) -> SyncResult<()> {
        self.calls.write().push(call);
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(SyncError::remote_retryable("remote store unavailable"))
        }
    }
}

impl Default for MemoryGateway {
    fn default() -> Self {
        Self::new()
    }
}

fn upsert_by<T>(rows: &mut Vec<T>, row: T, same: impl Fn(&T, &T) -> bool) {
    match rows.iter_mut().find(|r| same(r, &row)) {
        Some(slot) => *slot = row,
        None => rows.push(row),
    }
}

impl RemoteGateway for MemoryGateway {
    fn upsert_set(&self, row: &SetRow, key: ConflictKey) -> SyncResult<()> {
        self.record(GatewayCall::UpsertSet(row.clone(), key))?;
        upsert_by(&mut *self.sets.write(), row.clone(), SetRow::same_key);
        Ok(())
    }

    fn delete_set(
        &self,
        exercise_id: &str,
        date: NaiveDate,
        set_index: u32,
        owner: Option<&UserId>,
    ) -> SyncResult<()> {
        self.record(GatewayCall::DeleteSet(
            exercise_id.to_string(),
            date,
            set_index,
            owner.cloned(),
        ))?;
        self.sets.write().retain(|r| {
            !(r.exercise_id == exercise_id
                && r.date == date
                && r.set_index == set_index
                && r.user_id.as_ref() == owner)
        });
        Ok(())
    }

    fn upsert_session(&self, row: &SessionRow, key: ConflictKey) -> SyncResult<()> {
        self.record(GatewayCall::UpsertSession(row.clone(), key))?;
        upsert_by(&mut *self.sessions.write(), row.clone(), SessionRow::same_key);
        Ok(())
    }

    fn select_sets(&self, owner: Option<&UserId>) -> SyncResult<Vec<SetRow>> {
        self.record(GatewayCall::SelectSets(owner.cloned()))?;
        Ok(self
            .sets
            .read()
            .iter()
            .filter(|r| r.user_id.as_ref() == owner)
            .cloned()
            .collect())
    }

    fn select_sessions(&self, owner: Option<&UserId>) -> SyncResult<Vec<SessionRow>> {
        self.record(GatewayCall::SelectSessions(owner.cloned()))?;
        Ok(self
            .sessions
            .read()
            .iter()
            .filter(|r| r.user_id.as_ref() == owner)
            .cloned()
            .collect())
    }
}
