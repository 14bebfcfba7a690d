//! Test fixtures and engine helpers.
//!
//! Provides a fully wired sync engine over in-memory collaborators and a
//! gateway wrapper for failure injection.

use chrono::NaiveDate;
use liftlog_model::{ConflictKey, SessionRow, SetRow, UserId};
use liftlog_storage::{FileStore, InMemoryStore, KeyValueStore};
use liftlog_sync_engine::{
    AuthSession, Clock, Connectivity, IdentityProvider, ManualClock, MemoryGateway,
    NetworkMonitor, RemoteGateway, SyncConfig, SyncEngine, SyncError, SyncResult,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

/// The day test engines consider "today".
pub fn test_day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 3).expect("valid date")
}

/// A gateway wrapper that fails calls on demand.
///
/// Failures are retryable remote errors and are decided before the inner
/// gateway is called, so a failed call leaves the inner store untouched.
#[derive(Debug)]
pub struct FlakyGateway<G> {
    inner: G,
    failing: AtomicBool,
    fail_next: AtomicUsize,
    failing_exercise: Mutex<Option<String>>,
}

impl<G: RemoteGateway> FlakyGateway<G> {
    /// Wraps `inner`, initially passing every call through.
    pub fn new(inner: G) -> Self {
        Self {
            inner,
            failing: AtomicBool::new(false),
            fail_next: AtomicUsize::new(0),
            failing_exercise: Mutex::new(None),
        }
    }

    /// The wrapped gateway.
    pub fn inner(&self) -> &G {
        &self.inner
    }

    /// Fails every call while `failing` is true.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Fails the next `calls` calls.
    pub fn fail_next(&self, calls: usize) {
        self.fail_next.store(calls, Ordering::SeqCst);
    }

    /// Fails every set write for `exercise_id`, or none with `None`.
    pub fn fail_exercise(&self, exercise_id: Option<&str>) {
        *self.failing_exercise.lock() = exercise_id.map(str::to_string);
    }

    fn check(&self, exercise_id: Option<&str>) -> SyncResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SyncError::remote_retryable("injected failure"));
        }
        let consumed = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if consumed {
            return Err(SyncError::remote_retryable("injected failure"));
        }
        let failing_exercise = self.failing_exercise.lock();
        if let (Some(target), Some(exercise)) = (failing_exercise.as_deref(), exercise_id) {
            if target == exercise {
                return Err(SyncError::Rejected {
                    status: 409,
                    message: format!("injected rejection for {exercise}"),
                });
            }
        }
        Ok(())
    }
}

impl<G: RemoteGateway> RemoteGateway for FlakyGateway<G> {
    fn upsert_set(&self, row: &SetRow, key: ConflictKey) -> SyncResult<()> {
        self.check(Some(&row.exercise_id))?;
        self.inner.upsert_set(row, key)
    }

    fn delete_set(
        &self,
        exercise_id: &str,
        date: NaiveDate,
        set_index: u32,
        owner: Option<&UserId>,
    ) -> SyncResult<()> {
        self.check(Some(exercise_id))?;
        self.inner.delete_set(exercise_id, date, set_index, owner)
    }

    fn upsert_session(&self, row: &SessionRow, key: ConflictKey) -> SyncResult<()> {
        self.check(None)?;
        self.inner.upsert_session(row, key)
    }

    fn select_sets(&self, owner: Option<&UserId>) -> SyncResult<Vec<SetRow>> {
        self.check(None)?;
        self.inner.select_sets(owner)
    }

    fn select_sessions(&self, owner: Option<&UserId>) -> SyncResult<Vec<SessionRow>> {
        self.check(None)?;
        self.inner.select_sessions(owner)
    }
}

/// The gateway type used by [`TestHarness`].
pub type TestGateway = Arc<FlakyGateway<Arc<MemoryGateway>>>;

/// A sync engine wired to in-memory collaborators.
///
/// The engine is attached to `network` and `auth`, so flipping either
/// drives the engine synchronously on the calling thread.
pub struct TestHarness {
    /// The engine under test.
    pub engine: Arc<SyncEngine<TestGateway>>,
    /// Failure-injecting gateway the engine talks to.
    pub gateway: TestGateway,
    /// The remote tables behind `gateway`.
    pub remote: Arc<MemoryGateway>,
    /// Connectivity oracle.
    pub network: Arc<NetworkMonitor>,
    /// Identity provider.
    pub auth: Arc<AuthSession>,
    /// Clock, frozen at [`test_day`].
    pub clock: Arc<ManualClock>,
    /// Durable store holding the queue.
    pub store: Arc<dyn KeyValueStore>,
    config: SyncConfig,
    _temp_dir: Option<Arc<TempDir>>,
}

impl TestHarness {
    /// An online, signed-out harness over an in-memory store.
    pub fn online() -> Self {
        Self::with_store(Arc::new(InMemoryStore::new()), true)
    }

    /// An offline, signed-out harness over an in-memory store.
    pub fn offline() -> Self {
        Self::with_store(Arc::new(InMemoryStore::new()), false)
    }

    /// A harness whose queue lives in a temporary directory.
    pub fn file_backed(online: bool) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = FileStore::open(temp_dir.path()).expect("Failed to open file store");
        let mut harness = Self::with_store(Arc::new(store), online);
        harness._temp_dir = Some(Arc::new(temp_dir));
        harness
    }

    /// A harness over `store`.
    pub fn with_store(store: Arc<dyn KeyValueStore>, online: bool) -> Self {
        Self::build(
            SyncConfig::default(),
            store,
            Arc::new(MemoryGateway::new()),
            Arc::new(NetworkMonitor::new(online)),
            Arc::new(AuthSession::new()),
            Arc::new(ManualClock::at_day(test_day())),
            None,
        )
    }

    /// A harness using `config`.
    pub fn with_config(config: SyncConfig, online: bool) -> Self {
        Self::build(
            config,
            Arc::new(InMemoryStore::new()),
            Arc::new(MemoryGateway::new()),
            Arc::new(NetworkMonitor::new(online)),
            Arc::new(AuthSession::new()),
            Arc::new(ManualClock::at_day(test_day())),
            None,
        )
    }

    fn build(
        config: SyncConfig,
        store: Arc<dyn KeyValueStore>,
        remote: Arc<MemoryGateway>,
        network: Arc<NetworkMonitor>,
        auth: Arc<AuthSession>,
        clock: Arc<ManualClock>,
        temp_dir: Option<Arc<TempDir>>,
    ) -> Self {
        let gateway = Arc::new(FlakyGateway::new(Arc::clone(&remote)));
        let engine = Arc::new(
            SyncEngine::new(
                config.clone(),
                Arc::clone(&gateway),
                Arc::clone(&store),
                Arc::clone(&network) as Arc<dyn Connectivity>,
                Arc::clone(&auth) as Arc<dyn IdentityProvider>,
            )
            .with_clock(Arc::clone(&clock) as Arc<dyn Clock>),
        );
        SyncEngine::attach(&engine);

        Self {
            engine,
            gateway,
            remote,
            network,
            auth,
            clock,
            store,
            config,
            _temp_dir: temp_dir,
        }
    }

    /// Simulates a process restart: a new engine over the same durable
    /// store, remote tables, oracle, identity provider and clock.
    ///
    /// The new engine starts uninitialized, as a freshly launched process.
    /// Drop the original harness before driving signals, or both engines
    /// will react to them.
    pub fn restart(&self) -> Self {
        Self::build(
            self.config.clone(),
            Arc::clone(&self.store),
            Arc::clone(&self.remote),
            Arc::clone(&self.network),
            Arc::clone(&self.auth),
            Arc::clone(&self.clock),
            self._temp_dir.clone(),
        )
    }

    /// Signs `user` in, initializing the engine.
    pub fn sign_in(&self, user: &str) {
        self.auth.sign_in(UserId::new(user));
    }

    /// Signs the current user out, resetting the engine.
    pub fn sign_out(&self) {
        self.auth.sign_out();
    }

    /// Goes online (draining the queue) or offline.
    pub fn set_online(&self, online: bool) {
        self.network.set_online(online);
    }
}

impl std::ops::Deref for TestHarness {
    type Target = SyncEngine<TestGateway>;

    fn deref(&self) -> &Self::Target {
        &self.engine
    }
}

/// Builds a set row for seeding remote tables.
pub fn set_row(
    user: Option<&str>,
    exercise_id: &str,
    date: NaiveDate,
    set_index: u32,
    weight: f64,
    reps: u32,
) -> SetRow {
    SetRow {
        user_id: user.map(UserId::from),
        exercise_id: exercise_id.to_string(),
        date,
        set_index,
        weight,
        reps,
        completed: true,
    }
}

/// Builds a session row for seeding remote tables.
pub fn session_row(
    user: Option<&str>,
    workout_id: &str,
    date: NaiveDate,
    duration: u32,
) -> SessionRow {
    SessionRow {
        user_id: user.map(UserId::from),
        workout_id: workout_id.to_string(),
        title: workout_id.to_string(),
        date,
        duration,
    }
}
