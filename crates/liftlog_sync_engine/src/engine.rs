//! The write-through synchronization engine.

use crate::clock::{Clock, SystemClock};
use crate::config::SyncConfig;
use crate::connectivity::{Connectivity, ConnectivityEvent};
use crate::error::SyncResult;
use crate::feed::EventFeed;
use crate::gateway::RemoteGateway;
use crate::identity::{IdentityEvent, IdentityProvider};
use crate::queue::{QueueItem, SyncQueue};
use crate::state::{DrainReport, Lifecycle, SyncEvent, SyncSnapshot, SyncStats, SyncStatus};
use chrono::NaiveDate;
use liftlog_model::{
    DeleteSetPayload, FinishWorkoutPayload, History, LogSetPayload, ModelError, Mutation,
    SessionRecord, Sessions, SetInput, UserId,
};
use liftlog_storage::KeyValueStore;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, info, warn};

/// The in-memory read model of one identity.
#[derive(Debug, Clone, Default)]
pub(crate) struct ReadModel {
    pub(crate) history: History,
    pub(crate) sessions: Sessions,
}

/// Applies writes optimistically to the read model and mirrors them to the
/// remote store, queueing whatever cannot be mirrored right away.
///
/// Every mutation updates the read model before any remote call is made,
/// and never reports a remote failure to its caller: failures surface
/// through [`SyncEngine::sync_status`], [`SyncEngine::queue_length`] and the
/// event feed.
///
/// A write goes straight to the remote store only when the device is online
/// and no queued write overlaps it; otherwise it is queued behind the
/// overlapping writes so replay cannot reorder them.
pub struct SyncEngine<G: RemoteGateway> {
    pub(crate) config: SyncConfig,
    pub(crate) gateway: G,
    pub(crate) queue: SyncQueue,
    pub(crate) connectivity: Arc<dyn Connectivity>,
    pub(crate) identity: Arc<dyn IdentityProvider>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) model: RwLock<ReadModel>,
    pub(crate) scope: RwLock<Option<UserId>>,
    pub(crate) lifecycle: RwLock<Lifecycle>,
    online: AtomicBool,
    status: RwLock<SyncStatus>,
    stats: RwLock<SyncStats>,
    events: EventFeed<SyncEvent>,
    /// Serializes local mutations.
    writes: Mutex<()>,
    /// Serializes queue drains.
    drains: Mutex<()>,
    /// Serializes initialization and reset.
    pub(crate) transitions: Mutex<()>,
}

impl<G: RemoteGateway> SyncEngine<G> {
    /// Creates an engine.
    ///
    /// The persisted queue under `config.queue_key` is re-read from `store`,
    /// so writes queued by a previous process are replayed on the next
    /// drain.
    pub fn new(
        config: SyncConfig,
        gateway: G,
        store: Arc<dyn KeyValueStore>,
        connectivity: Arc<dyn Connectivity>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        let queue = SyncQueue::open(store, config.queue_key.clone());
        let online = connectivity.is_online();

        Self {
            config,
            gateway,
            queue,
            connectivity,
            identity,
            clock: Arc::new(SystemClock),
            model: RwLock::new(ReadModel::default()),
            scope: RwLock::new(None),
            lifecycle: RwLock::new(Lifecycle::Uninitialized),
            online: AtomicBool::new(online),
            status: RwLock::new(SyncStatus::Idle),
            stats: RwLock::new(SyncStats::default()),
            events: EventFeed::new(),
            writes: Mutex::new(()),
            drains: Mutex::new(()),
            transitions: Mutex::new(()),
        }
    }

    /// Replaces the clock used for "today" and queue timestamps.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// The engine configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// The remote gateway.
    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    // === Read model ===

    /// Snapshot of the set history.
    pub fn history(&self) -> History {
        self.model.read().history.clone()
    }

    /// Snapshot of completed workouts, newest first.
    pub fn sessions(&self) -> Sessions {
        self.model.read().sessions.clone()
    }

    /// Runs `f` against the read model without cloning it.
    pub fn read<R>(&self, f: impl FnOnce(&History, &Sessions) -> R) -> R {
        let model = self.model.read();
        f(&model.history, &model.sessions)
    }

    /// The calendar day writes are currently stamped with.
    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    /// Current sync status.
    pub fn sync_status(&self) -> SyncStatus {
        *self.status.read()
    }

    /// Number of queued writes.
    pub fn queue_length(&self) -> usize {
        self.queue.len()
    }

    /// Queued writes, oldest first.
    pub fn queued(&self) -> Vec<QueueItem> {
        self.queue.list()
    }

    /// Mirrored connectivity.
    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// The identity the read model belongs to.
    pub fn user_scope(&self) -> Option<UserId> {
        self.scope.read().clone()
    }

    /// Current initialization state.
    pub fn lifecycle(&self) -> Lifecycle {
        *self.lifecycle.read()
    }

    /// Activity counters.
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    /// State for a sync indicator.
    pub fn snapshot(&self) -> SyncSnapshot {
        SyncSnapshot {
            online: self.is_online(),
            status: self.sync_status(),
            queue_length: self.queue_length(),
        }
    }

    /// Engine events.
    pub fn events(&self) -> &EventFeed<SyncEvent> {
        &self.events
    }

    // === Mutations ===

    /// Records a set of today's workout from raw user input.
    ///
    /// `weight` accepts a decimal comma. The entry is compacted down to the
    /// first free position if `set_index` is past the end of the day.
    ///
    /// # Errors
    ///
    /// Returns [`crate::SyncError::InvalidInput`] if either field does not
    /// parse or `set_index` is out of range; nothing is changed in that case.
    pub fn log_set(
        &self,
        exercise_id: &str,
        set_index: usize,
        weight: &str,
        reps: &str,
    ) -> SyncResult<()> {
        let input = SetInput::parse(weight, reps)?;
        self.log_set_input(exercise_id, set_index, input)?;
        Ok(())
    }

    /// Records an already validated set of today's workout.
    ///
    /// Returns the position the set ends up at.
    ///
    /// # Errors
    ///
    /// Returns [`crate::SyncError::InvalidInput`] if `set_index` does not
    /// fit a remote set position; nothing is changed in that case.
    pub fn log_set_input(
        &self,
        exercise_id: &str,
        set_index: usize,
        input: SetInput,
    ) -> SyncResult<usize> {
        let requested = set_position(set_index)?;
        let _writes = self.writes.lock();
        let date = self.clock.today();
        let entry = input.entry();

        let index = self
            .model
            .write()
            .history
            .upsert(exercise_id, date, set_index, entry);

        let mutation = Mutation::LogSet(LogSetPayload {
            user_id: self.user_scope(),
            exercise_id: exercise_id.to_string(),
            date,
            // Compaction only moves an entry down.
            set_index: u32::try_from(index).unwrap_or(requested),
            weight: entry.weight,
            reps: entry.reps,
        });
        self.write_through(mutation);
        Ok(index)
    }

    /// Removes a set of today's workout, shifting later sets down.
    ///
    /// Returns false, and does nothing else, if there is no such set. An
    /// index beyond the range [`SyncEngine::log_set`] accepts never names
    /// a set.
    pub fn delete_set(&self, exercise_id: &str, set_index: usize) -> bool {
        let Ok(position) = set_position(set_index) else {
            debug!(exercise_id, set_index, "set index out of range");
            return false;
        };
        let _writes = self.writes.lock();
        let date = self.clock.today();

        let Some(removal) = self
            .model
            .write()
            .history
            .remove(exercise_id, date, set_index)
        else {
            debug!(exercise_id, set_index, "no set to delete");
            return false;
        };

        let mutation = Mutation::DeleteSet(DeleteSetPayload {
            user_id: self.user_scope(),
            exercise_id: exercise_id.to_string(),
            date,
            set_index: position,
            shifted: removal.shifted,
            previous_len: removal.previous_len,
        });
        self.write_through(mutation);
        true
    }

    /// Records a completed workout, on `date` or today.
    ///
    /// Finishing the same workout twice on one day replaces the first record.
    pub fn finish_workout(
        &self,
        workout_id: &str,
        title: &str,
        duration_seconds: u32,
        date: Option<NaiveDate>,
    ) {
        let _writes = self.writes.lock();
        let date = date.unwrap_or_else(|| self.clock.today());

        self.model.write().sessions.upsert(SessionRecord {
            workout_id: workout_id.to_string(),
            title: title.to_string(),
            date,
            duration_seconds,
        });

        let mutation = Mutation::FinishWorkout(FinishWorkoutPayload {
            user_id: self.user_scope(),
            workout_id: workout_id.to_string(),
            title: title.to_string(),
            date,
            duration_seconds,
        });
        self.write_through(mutation);
    }

    fn write_through(&self, mutation: Mutation) {
        if self.is_online() && !self.queue.overlaps(&mutation) {
            match self.apply_remote(&mutation) {
                Ok(()) => {
                    self.stats.write().direct_writes += 1;
                    debug!(action = %mutation.action(), "write applied remotely");
                    return;
                }
                Err(e) => {
                    warn!(action = %mutation.action(), error = %e, "remote write failed; queueing");
                    self.stats.write().last_error = Some(e.to_string());
                    self.set_status(SyncStatus::Error);
                }
            }
        }

        let action = mutation.action();
        let item = self.queue.append(mutation, self.clock.now());
        self.stats.write().enqueued += 1;
        debug!(id = %item.id, %action, queued = self.queue.len(), "write queued");
        self.events.emit(SyncEvent::Enqueued {
            id: item.id,
            action,
        });
    }

    fn apply_remote(&self, mutation: &Mutation) -> SyncResult<()> {
        match mutation {
            Mutation::LogSet(p) => {
                let row = p.row();
                self.gateway.upsert_set(&row, row.conflict_key())
            }
            Mutation::DeleteSet(p) => {
                for row in p.shifted_rows() {
                    self.gateway.upsert_set(&row, row.conflict_key())?;
                }
                for stale in p.stale_indices() {
                    self.gateway.delete_set(
                        &p.exercise_id,
                        p.date,
                        stale,
                        p.user_id.as_ref(),
                    )?;
                }
                Ok(())
            }
            Mutation::FinishWorkout(p) => {
                let row = p.row();
                self.gateway.upsert_session(&row, row.conflict_key())
            }
        }
    }

    // === Queue drain ===

    /// Replays queued writes, oldest first.
    ///
    /// Does nothing while offline. A write that fails is kept with its retry
    /// count raised, and dropped once the count reaches the configured
    /// maximum; every drop is announced with [`SyncEvent::Dropped`]. The
    /// status ends as [`SyncStatus::Synced`] if the queue is empty afterwards
    /// and [`SyncStatus::Error`] otherwise.
    ///
    /// Concurrent calls run one after the other.
    pub fn sync_queue(&self) -> DrainReport {
        let mut report = DrainReport::default();
        if !self.is_online() {
            debug!("offline; skipping queue drain");
            return report;
        }

        let _drain = self.drains.lock();
        let pending = self.queue.list();
        if pending.is_empty() {
            self.set_status(SyncStatus::Synced);
            return report;
        }

        info!(count = pending.len(), "draining sync queue");
        self.set_status(SyncStatus::Syncing);
        let max_retries = self.config.retry.max_attempts;

        for mut item in pending {
            if !self.is_online() {
                debug!("went offline; stopping queue drain");
                break;
            }
            if !self.queue.contains(&item.id) {
                report.skipped += 1;
                continue;
            }

            match self.apply_remote(&item.mutation) {
                Ok(()) => {
                    self.queue.remove(&item.id);
                    report.replayed += 1;
                    self.events.emit(SyncEvent::Replayed {
                        id: item.id,
                        action: item.mutation.action(),
                    });
                }
                Err(e) => {
                    item.retries += 1;
                    self.stats.write().last_error = Some(e.to_string());

                    if item.retries >= max_retries {
                        self.queue.remove(&item.id);
                        warn!(
                            id = %item.id,
                            action = %item.action(),
                            retries = item.retries,
                            error = %e,
                            "dropping queued write after exhausting retries"
                        );
                        report.dropped.push(item.clone());
                        self.events.emit(SyncEvent::Dropped {
                            item,
                            error: e.to_string(),
                        });
                    } else {
                        debug!(id = %item.id, retries = item.retries, error = %e, "replay failed");
                        self.queue.update(&item);
                    }
                }
            }
        }

        report.retained = self.queue.len();
        {
            let mut stats = self.stats.write();
            stats.drains += 1;
            stats.replayed += report.replayed as u64;
            stats.dropped += report.dropped.len() as u64;
            stats.last_sync = Some(self.clock.now());
        }

        let status = if report.is_clean() {
            SyncStatus::Synced
        } else {
            SyncStatus::Error
        };
        self.set_status(status);
        info!(
            replayed = report.replayed,
            retained = report.retained,
            dropped = report.dropped.len(),
            "queue drain finished"
        );
        report
    }

    // === Signals ===

    /// Reacts to a connectivity transition: going online drains the queue,
    /// going offline only updates the mirrored flag.
    pub fn handle_connectivity(&self, event: ConnectivityEvent) -> Option<DrainReport> {
        match event {
            ConnectivityEvent::Online => {
                self.online.store(true, Ordering::SeqCst);
                Some(self.sync_queue())
            }
            ConnectivityEvent::Offline => {
                self.online.store(false, Ordering::SeqCst);
                None
            }
        }
    }

    /// Re-reads connectivity from the oracle without draining.
    pub fn refresh_connectivity(&self) -> bool {
        let online = self.connectivity.is_online();
        self.online.store(online, Ordering::SeqCst);
        online
    }

    pub(crate) fn set_status(&self, status: SyncStatus) {
        let changed = {
            let mut current = self.status.write();
            let changed = *current != status;
            *current = status;
            changed
        };
        if changed {
            self.events.emit(SyncEvent::StatusChanged(status));
        }
    }

    pub(crate) fn set_lifecycle(&self, lifecycle: Lifecycle) {
        let changed = {
            let mut current = self.lifecycle.write();
            let changed = *current != lifecycle;
            *current = lifecycle;
            changed
        };
        if changed {
            self.events.emit(SyncEvent::LifecycleChanged(lifecycle));
        }
    }

    pub(crate) fn record_error(&self, message: String) {
        self.stats.write().last_error = Some(message);
    }
}

impl<G: RemoteGateway + 'static> SyncEngine<G> {
    /// Subscribes `engine` to its connectivity oracle and identity provider,
    /// handling their events synchronously on the emitting thread.
    ///
    /// The subscriptions end once the engine is dropped. Use
    /// [`crate::SyncDriver`] to handle signals on a background thread
    /// instead.
    pub fn attach(engine: &Arc<Self>) {
        let weak: Weak<Self> = Arc::downgrade(engine);
        engine
            .connectivity
            .watch(Box::new(move |event: &ConnectivityEvent| {
                match weak.upgrade() {
                    Some(engine) => {
                        engine.handle_connectivity(*event);
                        true
                    }
                    None => false,
                }
            }));

        let weak: Weak<Self> = Arc::downgrade(engine);
        engine
            .identity
            .watch(Box::new(move |event: &IdentityEvent| match weak.upgrade() {
                Some(engine) => {
                    if let Err(e) = engine.handle_identity_event(event) {
                        warn!(error = %e, "initialization after identity change failed");
                    }
                    true
                }
                None => false,
            }));
    }
}

impl<G: RemoteGateway> std::fmt::Debug for SyncEngine<G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("lifecycle", &self.lifecycle())
            .field("status", &self.sync_status())
            .field("online", &self.is_online())
            .field("queue_length", &self.queue_length())
            .finish()
    }
}

fn set_position(index: usize) -> SyncResult<u32> {
    u32::try_from(index).map_err(|_| ModelError::SetIndexOutOfRange(index).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::connectivity::NetworkMonitor;
    use crate::gateway::{GatewayCall, MemoryGateway};
    use crate::identity::AuthSession;
    use crate::SyncError;
    use liftlog_model::{ConflictKey, SetEntry};
    use liftlog_storage::InMemoryStore;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 9, 16).unwrap()
    }

    struct Fixture {
        engine: SyncEngine<Arc<MemoryGateway>>,
        gateway: Arc<MemoryGateway>,
    }

    fn fixture(online: bool) -> Fixture {
        let gateway = Arc::new(MemoryGateway::new());
        let engine = SyncEngine::new(
            SyncConfig::default(),
            Arc::clone(&gateway),
            Arc::new(InMemoryStore::new()),
            Arc::new(NetworkMonitor::new(online)),
            Arc::new(AuthSession::new()),
        )
        .with_clock(Arc::new(ManualClock::at_day(today())));
        Fixture { engine, gateway }
    }

    #[test]
    fn log_set_online_writes_through() {
        let f = fixture(true);
        f.engine.log_set("squat", 0, "100", "5").unwrap();

        assert_eq!(f.engine.queue_length(), 0);
        assert_eq!(f.gateway.sets().len(), 1);
        assert_eq!(
            f.engine.history().sets_on("squat", today()),
            &[SetEntry::new(100.0, 5)]
        );
        assert_eq!(f.engine.stats().direct_writes, 1);
    }

    #[test]
    fn log_set_is_idempotent() {
        let f = fixture(true);
        f.engine.log_set("squat", 0, "100", "5").unwrap();
        f.engine.log_set("squat", 0, "100", "5").unwrap();

        assert_eq!(f.engine.history().sets_on("squat", today()).len(), 1);
        assert_eq!(f.gateway.sets().len(), 1);
    }

    #[test]
    fn invalid_input_changes_nothing() {
        let f = fixture(false);
        let err = f.engine.log_set("squat", 0, "heavy", "5").unwrap_err();

        assert!(matches!(err, SyncError::InvalidInput(_)));
        assert!(f.engine.history().is_empty());
        assert_eq!(f.engine.queue_length(), 0);
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn out_of_range_index_is_rejected() {
        let f = fixture(true);
        let beyond = u32::MAX as usize + 1;

        let err = f.engine.log_set("squat", beyond, "60", "8").unwrap_err();
        assert!(matches!(
            err,
            SyncError::InvalidInput(ModelError::SetIndexOutOfRange(_))
        ));
        assert!(f.engine.history().is_empty());
        assert!(f.gateway.calls().is_empty());

        f.engine.log_set("squat", 0, "60", "8").unwrap();
        assert!(!f.engine.delete_set("squat", beyond));
        assert_eq!(f.engine.history().sets_on("squat", today()).len(), 1);
        assert_eq!(f.engine.queue_length(), 0);
    }

    #[test]
    fn past_end_index_is_compacted() {
        let f = fixture(true);
        f.engine.log_set("squat", 3, "60", "8").unwrap();

        assert_eq!(f.engine.history().sets_on("squat", today()).len(), 1);
        assert_eq!(f.gateway.sets()[0].set_index, 0);
    }

    #[test]
    fn offline_writes_are_queued() {
        let f = fixture(false);
        f.engine.log_set("squat", 0, "100", "5").unwrap();
        f.engine.finish_workout("legs", "Leg Day", 3000, None);

        assert_eq!(f.engine.queue_length(), 2);
        assert_eq!(f.gateway.write_count(), 0);
        assert_eq!(f.engine.sessions().len(), 1);
    }

    #[test]
    fn failed_direct_write_is_queued_with_error_status() {
        let f = fixture(true);
        f.gateway.set_available(false);

        f.engine.finish_workout("legs", "Leg Day", 3000, None);

        assert_eq!(f.engine.queue_length(), 1);
        assert_eq!(f.engine.sync_status(), SyncStatus::Error);
        assert!(f.engine.stats().last_error.is_some());
    }

    #[test]
    fn overlapping_write_queues_behind_pending_one() {
        let f = fixture(true);
        f.gateway.set_available(false);
        f.engine.log_set("squat", 0, "100", "5").unwrap();
        f.gateway.set_available(true);
        f.gateway.clear_calls();

        f.engine.log_set("squat", 0, "105", "5").unwrap();
        f.engine.log_set("bench", 0, "80", "5").unwrap();

        // squat is deduplicated in the queue, bench goes straight through.
        assert_eq!(f.engine.queue_length(), 1);
        assert_eq!(f.gateway.write_count(), 1);

        f.engine.sync_queue();
        let squat: Vec<_> = f
            .gateway
            .sets()
            .into_iter()
            .filter(|r| r.exercise_id == "squat")
            .collect();
        assert_eq!(squat.len(), 1);
        assert_eq!(squat[0].weight, 105.0);
    }

    #[test]
    fn delete_reindexes_remote_rows() {
        let f = fixture(true);
        for (i, w) in ["60", "70", "80"].iter().enumerate() {
            f.engine.log_set("squat", i, w, "5").unwrap();
        }

        assert!(f.engine.delete_set("squat", 1));

        let local = f.engine.history();
        assert_eq!(
            local.sets_on("squat", today()),
            &[SetEntry::new(60.0, 5), SetEntry::new(80.0, 5)]
        );

        let mut remote = f.gateway.sets();
        remote.sort_by_key(|r| r.set_index);
        let weights: Vec<_> = remote.iter().map(|r| (r.set_index, r.weight)).collect();
        assert_eq!(weights, vec![(0, 60.0), (1, 80.0)]);
    }

    #[test]
    fn deleting_missing_set_is_noop() {
        let f = fixture(false);
        assert!(!f.engine.delete_set("squat", 0));
        assert_eq!(f.engine.queue_length(), 0);
    }

    #[test]
    fn drain_is_noop_offline() {
        let f = fixture(false);
        f.engine.log_set("squat", 0, "100", "5").unwrap();

        let report = f.engine.sync_queue();
        assert_eq!(report, DrainReport::default());
        assert_eq!(f.engine.queue_length(), 1);
        assert_eq!(f.engine.sync_status(), SyncStatus::Idle);
    }

    #[test]
    fn retries_exhaust_after_three_failures() {
        let f = fixture(false);
        let events = f.engine.events().subscribe();
        f.engine.log_set("squat", 0, "100", "5").unwrap();
        f.gateway.set_available(false);

        let first = f.engine.handle_connectivity(ConnectivityEvent::Online).unwrap();
        assert_eq!(first.retained, 1);
        assert_eq!(f.engine.sync_status(), SyncStatus::Error);
        assert_eq!(f.engine.queued()[0].retries, 1);
        f.engine.sync_queue();
        assert_eq!(f.engine.queued()[0].retries, 2);

        let last = f.engine.sync_queue();
        assert_eq!(last.dropped.len(), 1);
        assert_eq!(last.dropped[0].retries, 3);
        assert_eq!(f.engine.queue_length(), 0);
        assert_eq!(f.engine.sync_status(), SyncStatus::Synced);
        assert_eq!(f.engine.stats().dropped, 1);

        let dropped = events
            .try_iter()
            .filter(|e| matches!(e, SyncEvent::Dropped { .. }))
            .count();
        assert_eq!(dropped, 1);

        f.gateway.clear_calls();
        f.engine.sync_queue();
        assert_eq!(f.gateway.write_count(), 0);
    }

    #[test]
    fn coming_online_drains() {
        let f = fixture(false);
        f.engine.log_set("squat", 0, "100", "5").unwrap();
        f.engine.delete_set("squat", 0);
        f.engine.finish_workout("legs", "Leg Day", 3000, None);
        assert_eq!(f.engine.queue_length(), 3);

        let report = f.engine.handle_connectivity(ConnectivityEvent::Online).unwrap();

        assert_eq!(report.replayed, 3);
        assert_eq!(f.engine.queue_length(), 0);
        assert_eq!(f.engine.sync_status(), SyncStatus::Synced);
        assert!(f.gateway.sets().is_empty());
        assert_eq!(f.gateway.sessions().len(), 1);
    }

    #[test]
    fn anonymous_writes_use_anonymous_conflict_key() {
        let f = fixture(true);
        f.engine.log_set("squat", 0, "100", "5").unwrap();

        let calls = f.gateway.calls();
        assert!(matches!(
            &calls[0],
            GatewayCall::UpsertSet(row, ConflictKey::SETS_ANONYMOUS) if row.user_id.is_none()
        ));
    }

    #[test]
    fn attach_follows_connectivity() {
        let gateway = Arc::new(MemoryGateway::new());
        let monitor = Arc::new(NetworkMonitor::new(false));
        let engine = Arc::new(SyncEngine::new(
            SyncConfig::default(),
            Arc::clone(&gateway),
            Arc::new(InMemoryStore::new()),
            Arc::clone(&monitor) as Arc<dyn Connectivity>,
            Arc::new(AuthSession::new()),
        ));
        SyncEngine::attach(&engine);

        engine.finish_workout("legs", "Leg Day", 60, Some(today()));
        assert_eq!(engine.queue_length(), 1);

        monitor.set_online(true);
        assert!(engine.is_online());
        assert_eq!(engine.queue_length(), 0);
        assert_eq!(gateway.sessions().len(), 1);
    }
}
