//! Identity-scoped initialization of the read model.
//!
//! The read model always belongs to exactly one identity. Switching identity
//! discards it before anything of the new identity is fetched, and the
//! fetched model is installed in a single write, so readers observe either
//! the empty model or the complete new one.

use crate::engine::{ReadModel, SyncEngine};
use crate::error::SyncResult;
use crate::gateway::RemoteGateway;
use crate::identity::IdentityEvent;
use crate::state::{Lifecycle, SyncStatus};
use liftlog_model::{History, Sessions, UserId};
use tracing::{debug, info, warn};

impl<G: RemoteGateway> SyncEngine<G> {
    /// Loads the read model of the current identity and drains the queue.
    ///
    /// - Already ready for the current identity: nothing happens.
    /// - No identity: the engine is reset and stays uninitialized.
    /// - Otherwise the current model is discarded, the identity's sets and
    ///   sessions are fetched, and the queue is drained if online.
    ///
    /// # Errors
    ///
    /// Returns the fetch error; the engine is left in [`Lifecycle::Error`]
    /// with an empty read model.
    pub fn init(&self) -> SyncResult<()> {
        let _transition = self.transitions.lock();
        let Some(user) = self.identity.current_user() else {
            debug!("no identity; staying uninitialized");
            self.reset_locked();
            return Ok(());
        };

        if self.lifecycle() == Lifecycle::Ready && self.user_scope().as_ref() == Some(&user) {
            return Ok(());
        }

        if self.lifecycle() != Lifecycle::Uninitialized {
            info!(user = %user, "identity changed; discarding read model");
        }
        self.reset_locked();

        info!(user = %user, "loading read model");
        *self.scope.write() = Some(user.clone());
        self.set_lifecycle(Lifecycle::Loading);

        let loaded = self
            .fetch_history(Some(&user))
            .and_then(|history| Ok((history, self.fetch_sessions(Some(&user))?)));
        let (history, sessions) = match loaded {
            Ok(loaded) => loaded,
            Err(e) => {
                warn!(user = %user, error = %e, "failed to load read model");
                self.record_error(e.to_string());
                self.set_lifecycle(Lifecycle::Error);
                return Err(e);
            }
        };

        debug!(
            sets = history.set_count(),
            sessions = sessions.len(),
            "installing read model"
        );
        *self.model.write() = ReadModel { history, sessions };

        if self.is_online() {
            self.sync_queue();
        }
        self.set_lifecycle(Lifecycle::Ready);
        Ok(())
    }

    /// Discards the read model and forgets the identity.
    ///
    /// Queued writes are kept; each carries the identity it was made under.
    pub fn reset(&self) {
        let _transition = self.transitions.lock();
        self.reset_locked();
    }

    fn reset_locked(&self) {
        *self.model.write() = ReadModel::default();
        *self.scope.write() = None;
        self.set_lifecycle(Lifecycle::Uninitialized);
        self.set_status(SyncStatus::Idle);
    }

    /// Reacts to an identity change: sign-in (or a switch) initializes,
    /// sign-out resets.
    ///
    /// # Errors
    ///
    /// Propagates [`SyncEngine::init`] failures.
    pub fn handle_identity_event(&self, event: &IdentityEvent) -> SyncResult<()> {
        match event {
            IdentityEvent::SignedIn(user) => {
                debug!(user = %user, "sign-in observed");
                self.init()
            }
            IdentityEvent::SignedOut => {
                info!("signed out; resetting");
                self.reset();
                Ok(())
            }
        }
    }

    /// Replaces the set history with the remote rows of the current scope.
    ///
    /// # Errors
    ///
    /// Returns the gateway error; the history is left untouched.
    pub fn load_history(&self) -> SyncResult<()> {
        let history = self.fetch_history(self.user_scope().as_ref())?;
        self.model.write().history = history;
        Ok(())
    }

    /// Replaces the completed workouts with the remote rows of the current
    /// scope.
    ///
    /// # Errors
    ///
    /// Returns the gateway error; the sessions are left untouched.
    pub fn load_sessions(&self) -> SyncResult<()> {
        let sessions = self.fetch_sessions(self.user_scope().as_ref())?;
        self.model.write().sessions = sessions;
        Ok(())
    }

    fn fetch_history(&self, owner: Option<&UserId>) -> SyncResult<History> {
        let rows = self.gateway.select_sets(owner)?;
        // Rows of other owners never enter the model.
        let rows = rows.into_iter().filter(|r| r.user_id.as_ref() == owner);
        Ok(History::from_rows(rows))
    }

    fn fetch_sessions(&self, owner: Option<&UserId>) -> SyncResult<Sessions> {
        let rows = self.gateway.select_sessions(owner)?;
        let rows = rows.into_iter().filter(|r| r.user_id.as_ref() == owner);
        Ok(Sessions::from_rows(rows))
    }
}

#[cfg(test)]
mod tests {
    use crate::clock::ManualClock;
    use crate::config::SyncConfig;
    use crate::connectivity::NetworkMonitor;
    use crate::engine::SyncEngine;
    use crate::gateway::MemoryGateway;
    use crate::identity::{AuthSession, IdentityEvent};
    use crate::state::{Lifecycle, SyncStatus};
    use chrono::NaiveDate;
    use liftlog_model::{SessionRow, SetRow, UserId};
    use liftlog_storage::InMemoryStore;
    use std::sync::Arc;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 10, d).unwrap()
    }

    fn set(user: Option<&str>, exercise: &str, index: u32) -> SetRow {
        SetRow {
            user_id: user.map(UserId::from),
            exercise_id: exercise.into(),
            date: day(1),
            set_index: index,
            weight: 40.0,
            reps: 12,
            completed: true,
        }
    }

    fn session(user: Option<&str>, workout: &str, d: u32) -> SessionRow {
        SessionRow {
            user_id: user.map(UserId::from),
            workout_id: workout.into(),
            title: workout.to_uppercase(),
            date: day(d),
            duration: 1800,
        }
    }

    fn engine(
        auth: &Arc<AuthSession>,
        gateway: &Arc<MemoryGateway>,
    ) -> SyncEngine<Arc<MemoryGateway>> {
        SyncEngine::new(
            SyncConfig::default(),
            Arc::clone(gateway),
            Arc::new(InMemoryStore::new()),
            Arc::new(NetworkMonitor::new(true)),
            Arc::clone(auth) as Arc<dyn crate::identity::IdentityProvider>,
        )
        .with_clock(Arc::new(ManualClock::at_day(day(2))))
    }

    #[test]
    fn init_without_identity_stays_uninitialized() {
        let auth = Arc::new(AuthSession::new());
        let gateway = Arc::new(MemoryGateway::new());
        let engine = engine(&auth, &gateway);

        engine.init().unwrap();

        assert_eq!(engine.lifecycle(), Lifecycle::Uninitialized);
        assert!(gateway.calls().is_empty());
    }

    #[test]
    fn init_loads_owned_rows_only() {
        let auth = Arc::new(AuthSession::signed_in(UserId::new("a")));
        let gateway = Arc::new(MemoryGateway::new());
        gateway.insert_set(set(Some("a"), "squat", 0));
        gateway.insert_set(set(Some("b"), "bench", 0));
        gateway.insert_set(set(None, "row", 0));
        gateway.insert_session(session(Some("a"), "legs", 1));
        gateway.insert_session(session(Some("a"), "push", 3));

        let engine = engine(&auth, &gateway);
        engine.init().unwrap();

        assert_eq!(engine.lifecycle(), Lifecycle::Ready);
        assert_eq!(engine.user_scope(), Some(UserId::new("a")));
        let history = engine.history();
        assert_eq!(history.exercise_ids().collect::<Vec<_>>(), vec!["squat"]);
        let sessions = engine.sessions();
        assert_eq!(sessions.as_slice()[0].workout_id, "push");
        assert_eq!(engine.sync_status(), SyncStatus::Synced);
    }

    #[test]
    fn init_is_idempotent_for_same_identity() {
        let auth = Arc::new(AuthSession::signed_in(UserId::new("a")));
        let gateway = Arc::new(MemoryGateway::new());
        let engine = engine(&auth, &gateway);

        engine.init().unwrap();
        let calls = gateway.calls().len();
        engine.init().unwrap();

        assert_eq!(gateway.calls().len(), calls);
    }

    #[test]
    fn switching_identity_replaces_model() {
        let auth = Arc::new(AuthSession::signed_in(UserId::new("a")));
        let gateway = Arc::new(MemoryGateway::new());
        gateway.insert_set(set(Some("a"), "squat", 0));
        gateway.insert_set(set(Some("b"), "bench", 0));

        let engine = engine(&auth, &gateway);
        engine.init().unwrap();

        auth.sign_in(UserId::new("b"));
        engine
            .handle_identity_event(&IdentityEvent::SignedIn(UserId::new("b")))
            .unwrap();

        let history = engine.history();
        assert_eq!(history.exercise_ids().collect::<Vec<_>>(), vec!["bench"]);
        assert_eq!(engine.user_scope(), Some(UserId::new("b")));
    }

    #[test]
    fn failed_load_surfaces_error() {
        let auth = Arc::new(AuthSession::signed_in(UserId::new("a")));
        let gateway = Arc::new(MemoryGateway::new());
        gateway.insert_set(set(Some("a"), "squat", 0));
        gateway.set_available(false);

        let engine = engine(&auth, &gateway);
        assert!(engine.init().is_err());
        assert_eq!(engine.lifecycle(), Lifecycle::Error);
        assert!(engine.history().is_empty());

        gateway.set_available(true);
        engine.init().unwrap();
        assert_eq!(engine.lifecycle(), Lifecycle::Ready);
        assert_eq!(engine.history().set_count(), 1);
    }

    #[test]
    fn sign_out_resets_but_keeps_queue() {
        let auth = Arc::new(AuthSession::signed_in(UserId::new("a")));
        let gateway = Arc::new(MemoryGateway::new());
        let engine = engine(&auth, &gateway);
        engine.init().unwrap();

        gateway.set_available(false);
        engine.finish_workout("legs", "Legs", 60, None);
        assert_eq!(engine.queue_length(), 1);

        engine
            .handle_identity_event(&IdentityEvent::SignedOut)
            .unwrap();

        assert_eq!(engine.lifecycle(), Lifecycle::Uninitialized);
        assert_eq!(engine.user_scope(), None);
        assert!(engine.sessions().is_empty());
        assert_eq!(engine.queue_length(), 1);
        assert_eq!(engine.sync_status(), SyncStatus::Idle);
    }

    #[test]
    fn anonymous_reload_selects_null_owner() {
        let auth = Arc::new(AuthSession::new());
        let gateway = Arc::new(MemoryGateway::new());
        gateway.insert_set(set(None, "row", 0));
        gateway.insert_set(set(Some("a"), "squat", 0));
        let engine = engine(&auth, &gateway);

        engine.load_history().unwrap();

        assert_eq!(
            engine.history().exercise_ids().collect::<Vec<_>>(),
            vec!["row"]
        );
    }
}
