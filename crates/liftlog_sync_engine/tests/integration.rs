//! Integration tests for the sync engine against in-memory collaborators.

use liftlog_model::{QueueAction, SetEntry, UserId};
use liftlog_storage::{FileStore, KeyValueStore};
use liftlog_sync_engine::{
    GatewayCall, Lifecycle, SyncConfig, SyncEvent, SyncStatus, DEFAULT_QUEUE_KEY,
};
use liftlog_testkit::prelude::*;
use std::sync::Arc;

#[test]
fn log_set_is_idempotent() {
    init_tracing();
    let h = TestHarness::online();

    h.log_set("squat", 0, "50", "10").unwrap();
    h.log_set("squat", 0, "50", "10").unwrap();

    assert_eq!(
        h.history().sets_on("squat", test_day()),
        &[SetEntry::new(50.0, 10)]
    );
    assert_eq!(h.remote.sets().len(), 1);
}

#[test]
fn delete_reindexes_later_sets() {
    let h = TestHarness::online();
    h.log_set("squat", 0, "50", "10").unwrap();
    h.log_set("squat", 1, "55", "8").unwrap();
    h.log_set("squat", 2, "60", "6").unwrap();

    h.delete_set("squat", 1);

    assert_eq!(
        h.history().sets_on("squat", test_day()),
        &[SetEntry::new(50.0, 10), SetEntry::new(60.0, 6)]
    );
    let mut remote: Vec<_> = h
        .remote
        .sets()
        .into_iter()
        .map(|r| (r.set_index, r.weight))
        .collect();
    remote.sort_by_key(|(i, _)| *i);
    assert_eq!(remote, vec![(0, 50.0), (1, 60.0)]);
}

#[test]
fn delete_replay_mirrors_reindexing() {
    let h = TestHarness::online();
    for (i, w) in ["50", "55", "60", "65"].iter().enumerate() {
        h.log_set("bench", i, w, "5").unwrap();
    }

    h.set_online(false);
    h.delete_set("bench", 0);
    h.delete_set("bench", 0);
    assert_eq!(h.queue_length(), 1);

    h.set_online(true);

    let mut remote: Vec<_> = h
        .remote
        .sets()
        .into_iter()
        .map(|r| (r.set_index, r.weight))
        .collect();
    remote.sort_by_key(|(i, _)| *i);
    assert_eq!(remote, vec![(0, 60.0), (1, 65.0)]);
}

#[test]
fn offline_writes_for_same_key_deduplicate() {
    let h = TestHarness::offline();

    h.log_set("squat", 0, "50", "10").unwrap();
    h.log_set("squat", 0, "55", "10").unwrap();

    let queued = h.queued();
    assert_eq!(queued.len(), 1);
    assert_eq!(queued[0].action(), QueueAction::LogSet);
    match &queued[0].mutation {
        liftlog_model::Mutation::LogSet(p) => assert_eq!(p.weight, 55.0),
        other => panic!("unexpected mutation {other:?}"),
    }
}

#[test]
fn queued_sets_of_different_days_both_replay() {
    let h = TestHarness::offline();
    h.log_set("squat", 0, "100", "5").unwrap();
    h.clock.advance(chrono::Duration::days(1));
    h.log_set("squat", 0, "110", "5").unwrap();
    assert_eq!(h.queue_length(), 2);

    h.set_online(true);

    let next_day = test_day().succ_opt().unwrap();
    let mut remote: Vec<_> = h
        .remote
        .sets()
        .into_iter()
        .map(|r| (r.date, r.weight))
        .collect();
    remote.sort_by_key(|(date, _)| *date);
    assert_eq!(remote, vec![(test_day(), 100.0), (next_day, 110.0)]);
    assert_eq!(h.sync_status(), SyncStatus::Synced);
}

#[test]
fn queued_sets_of_different_users_both_replay() {
    let h = TestHarness::offline();
    h.sign_in("a");
    h.log_set("squat", 0, "50", "5").unwrap();
    h.sign_out();
    h.sign_in("b");
    h.log_set("squat", 0, "60", "5").unwrap();
    assert_eq!(h.queue_length(), 2);

    h.set_online(true);

    let mut remote: Vec<_> = h
        .remote
        .sets()
        .into_iter()
        .map(|r| (r.user_id, r.weight))
        .collect();
    remote.sort_by(|a, b| a.0.cmp(&b.0));
    assert_eq!(
        remote,
        vec![(Some(UserId::new("a")), 50.0), (Some(UserId::new("b")), 60.0)]
    );
    assert_eq!(h.history().sets_on("squat", test_day()), &[SetEntry::new(60.0, 5)]);
}

#[test]
fn sets_around_midnight_land_on_separate_days() {
    let h = TestHarness::offline();
    let day = test_day();
    let next_day = day.succ_opt().unwrap();

    h.clock.set(day.and_hms_opt(23, 59, 0).unwrap().and_utc());
    h.log_set("bench", 0, "60", "8").unwrap();
    h.clock.set(next_day.and_hms_opt(0, 1, 0).unwrap().and_utc());
    h.log_set("bench", 0, "62.5", "8").unwrap();

    let history = h.history();
    assert_eq!(history.sets_on("bench", day), &[SetEntry::new(60.0, 8)]);
    assert_eq!(history.sets_on("bench", next_day), &[SetEntry::new(62.5, 8)]);

    h.set_online(true);

    assert_eq!(h.queue_length(), 0);
    let mut remote: Vec<_> = h
        .remote
        .sets()
        .into_iter()
        .map(|r| (r.date, r.set_index, r.weight))
        .collect();
    remote.sort_by_key(|(date, index, _)| (*date, *index));
    assert_eq!(remote, vec![(day, 0, 60.0), (next_day, 0, 62.5)]);
}

#[test]
fn retries_exhaust_on_third_failure() {
    let h = TestHarness::offline();
    let events = h.events().subscribe();
    h.log_set("squat", 0, "50", "10").unwrap();
    h.gateway.set_failing(true);

    h.set_online(true);
    assert_eq!(h.queued()[0].retries, 1);
    assert_eq!(h.sync_status(), SyncStatus::Error);

    h.sync_queue();
    assert_eq!(h.queued()[0].retries, 2);

    let report = h.sync_queue();
    assert_eq!(report.dropped.len(), 1);
    assert_eq!(h.queue_length(), 0);
    assert_eq!(h.sync_status(), SyncStatus::Synced);

    let dropped: Vec<_> = events
        .try_iter()
        .filter_map(|e| match e {
            SyncEvent::Dropped { item, .. } => Some(item),
            _ => None,
        })
        .collect();
    assert_eq!(dropped.len(), 1);
    assert_eq!(dropped[0].retries, 3);

    h.gateway.set_failing(false);
    h.remote.clear_calls();
    h.sync_queue();
    assert_eq!(h.remote.write_count(), 0);
    assert!(h.remote.sets().is_empty());
}

#[test]
fn max_retries_is_configurable() {
    let h = TestHarness::with_config(SyncConfig::new().with_max_retries(1), false);
    h.finish_workout("legs", "Legs", 60, None);
    h.gateway.set_failing(true);

    h.set_online(true);

    assert_eq!(h.queue_length(), 0);
    assert_eq!(h.stats().dropped, 1);
}

#[test]
fn identity_switch_isolates_read_model() {
    let h = TestHarness::online();
    h.remote.insert_set(set_row(Some("a"), "squat", test_day(), 0, 100.0, 5));
    h.remote.insert_set(set_row(Some("b"), "bench", test_day(), 0, 70.0, 8));
    h.remote.insert_session(session_row(Some("a"), "legs", test_day(), 3000));

    h.sign_in("a");
    assert_eq!(h.lifecycle(), Lifecycle::Ready);
    assert_eq!(h.history().set_count(), 1);
    assert_eq!(h.sessions().len(), 1);

    let observed = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let sink = Arc::clone(&observed);
    let engine = Arc::clone(&h.engine);
    h.events().watch(Box::new(move |event| {
        if let SyncEvent::LifecycleChanged(Lifecycle::Loading) = event {
            sink.lock().push((engine.history().set_count(), engine.sessions().len()));
        }
        true
    }));

    h.sign_in("b");

    // While B's data loads, nothing of A is visible.
    assert_eq!(*observed.lock(), vec![(0, 0)]);
    assert_eq!(h.user_scope(), Some(UserId::new("b")));
    assert_eq!(
        h.history().exercise_ids().collect::<Vec<_>>(),
        vec!["bench"]
    );
    assert!(h.sessions().is_empty());
}

#[test]
fn offline_mutations_replay_on_reconnect() {
    let h = TestHarness::offline();

    h.log_set("squat", 0, "100", "5").unwrap();
    h.log_set("bench", 0, "80", "5").unwrap();
    h.delete_set("bench", 0);
    h.finish_workout("push", "Push", 2400, None);

    let actions: Vec<_> = h.queued().iter().map(|i| i.action()).collect();
    assert_eq!(
        actions,
        vec![
            QueueAction::LogSet,
            QueueAction::LogSet,
            QueueAction::DeleteSet,
            QueueAction::FinishWorkout
        ]
    );

    h.set_online(true);

    assert_eq!(h.queue_length(), 0);
    assert_eq!(h.sync_status(), SyncStatus::Synced);
    assert_eq!(h.remote.sets().len(), 1);
    assert_eq!(h.remote.sessions().len(), 1);
}

#[test]
fn three_queued_mutations_drain_to_synced() {
    let h = TestHarness::offline();
    h.log_set("squat", 0, "100", "5").unwrap();
    h.delete_set("squat", 0);
    h.finish_workout("legs", "Legs", 3600, None);
    assert_eq!(h.queue_length(), 3);

    h.set_online(true);

    assert_eq!(h.queue_length(), 0);
    assert_eq!(h.sync_status(), SyncStatus::Synced);
}

#[test]
fn sessions_sorted_by_date_descending() {
    let h = TestHarness::online();
    let day = test_day();

    h.finish_workout("a", "A", 60, Some(day - chrono::Days::new(3)));
    h.finish_workout("b", "B", 60, Some(day));
    h.finish_workout("c", "C", 60, Some(day - chrono::Days::new(1)));
    h.finish_workout("a", "A again", 90, Some(day - chrono::Days::new(3)));

    let sessions = h.sessions();
    let ids: Vec<_> = sessions.iter().map(|s| s.workout_id.as_str()).collect();
    assert_eq!(ids, vec!["b", "c", "a"]);
    assert_eq!(sessions.as_slice()[2].title, "A again");
}

#[test]
fn queue_survives_restart_on_disk() {
    let h = TestHarness::file_backed(false);
    h.log_set("squat", 0, "100", "5").unwrap();
    h.finish_workout("legs", "Legs", 3600, None);
    let queued = h.queued();

    let restarted = h.restart();
    drop(h);
    assert_eq!(restarted.queued(), queued);

    restarted.set_online(true);
    assert_eq!(restarted.queue_length(), 0);
    assert_eq!(restarted.remote.sessions().len(), 1);

    let reopened = restarted.restart();
    assert_eq!(reopened.queue_length(), 0);
}

#[test]
fn queue_is_persisted_under_fixed_key() {
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::open(dir.path()).unwrap());
    let h = TestHarness::with_store(Arc::clone(&store), false);

    h.finish_workout("legs", "Legs", 3600, None);

    let blob = store.get(DEFAULT_QUEUE_KEY).unwrap().unwrap();
    let value: serde_json::Value = serde_json::from_slice(&blob).unwrap();
    assert_eq!(value[0]["action"], "finishWorkout");
    assert_eq!(value[0]["data"]["workoutId"], "legs");
}

#[test]
fn anonymous_scope_reads_null_owner_rows_only() {
    let h = TestHarness::online();
    h.remote.insert_set(set_row(None, "row", test_day(), 0, 40.0, 12));
    h.remote.insert_set(set_row(Some("a"), "squat", test_day(), 0, 100.0, 5));

    h.load_history().unwrap();

    assert_eq!(h.history().exercise_ids().collect::<Vec<_>>(), vec!["row"]);
    assert!(h
        .remote
        .calls()
        .contains(&GatewayCall::SelectSets(None)));
}

#[test]
fn queued_writes_keep_their_owner_across_sign_out() {
    let h = TestHarness::online();
    h.sign_in("a");
    h.set_online(false);
    h.log_set("squat", 0, "100", "5").unwrap();

    h.sign_out();
    assert!(h.history().is_empty());
    assert_eq!(h.queue_length(), 1);

    h.set_online(true);

    let rows = h.remote.sets();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].user_id, Some(UserId::new("a")));
}

#[test]
fn failing_exercise_does_not_block_others() {
    let h = TestHarness::offline();
    h.log_set("bench", 0, "80", "5").unwrap();
    h.log_set("squat", 0, "100", "5").unwrap();
    h.gateway.fail_exercise(Some("bench"));

    h.set_online(true);

    assert_eq!(h.queue_length(), 1);
    assert_eq!(h.sync_status(), SyncStatus::Error);
    assert_eq!(h.remote.sets().len(), 1);
    assert_eq!(h.remote.sets()[0].exercise_id, "squat");
    assert!(h.snapshot().can_sync());
}
