//! Observable engine state.

use crate::queue::QueueItem;
use chrono::{DateTime, Utc};
use liftlog_model::QueueAction;

/// Outcome of the most recent remote activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncStatus {
    /// Nothing attempted since the last reset.
    #[default]
    Idle,
    /// A queue drain is in progress.
    Syncing,
    /// The last drain left the queue empty.
    Synced,
    /// A remote write failed, or the last drain left writes behind.
    Error,
}

/// Initialization state of the read model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Lifecycle {
    /// No identity has been loaded.
    #[default]
    Uninitialized,
    /// The read model of an identity is being fetched.
    Loading,
    /// The read model reflects the recorded identity.
    Ready,
    /// Fetching the read model failed.
    Error,
}

/// Something an observer of the engine may want to react to.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// [`SyncStatus`] changed.
    StatusChanged(SyncStatus),
    /// [`Lifecycle`] changed.
    LifecycleChanged(Lifecycle),
    /// A write could not be applied remotely and was queued.
    Enqueued {
        /// Queue item id.
        id: String,
        /// The write's action.
        action: QueueAction,
    },
    /// A queued write was applied remotely and removed from the queue.
    Replayed {
        /// Queue item id.
        id: String,
        /// The write's action.
        action: QueueAction,
    },
    /// A queued write exhausted its retries and was discarded without ever
    /// reaching the remote store.
    Dropped {
        /// The discarded item, with its final retry count.
        item: QueueItem,
        /// The last replay error.
        error: String,
    },
}

/// Counters about sync activity since the engine was created.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncStats {
    /// Writes applied remotely without queueing.
    pub direct_writes: u64,
    /// Writes queued.
    pub enqueued: u64,
    /// Queue drains completed.
    pub drains: u64,
    /// Queued writes replayed successfully.
    pub replayed: u64,
    /// Queued writes dropped after exhausting retries.
    pub dropped: u64,
    /// End of the last drain.
    pub last_sync: Option<DateTime<Utc>>,
    /// Last remote error message.
    pub last_error: Option<String>,
}

/// Result of one queue drain.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DrainReport {
    /// Items replayed and removed.
    pub replayed: usize,
    /// Items still queued afterwards.
    pub retained: usize,
    /// Items dropped for exhausting retries.
    pub dropped: Vec<QueueItem>,
    /// Items superseded by a newer write while the drain ran.
    pub skipped: usize,
}

impl DrainReport {
    /// Returns true if the queue was empty after the drain.
    pub fn is_clean(&self) -> bool {
        self.retained == 0
    }
}

/// What a sync indicator needs to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncSnapshot {
    /// Mirrored connectivity.
    pub online: bool,
    /// Current status.
    pub status: SyncStatus,
    /// Number of queued writes.
    pub queue_length: usize,
}

impl SyncSnapshot {
    /// Returns true if a manual drain could make progress right now.
    pub fn can_sync(&self) -> bool {
        self.online && self.queue_length > 0 && self.status != SyncStatus::Syncing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_sync_availability() {
        let mut snapshot = SyncSnapshot {
            online: true,
            status: SyncStatus::Error,
            queue_length: 2,
        };
        assert!(snapshot.can_sync());

        snapshot.status = SyncStatus::Syncing;
        assert!(!snapshot.can_sync());

        snapshot.status = SyncStatus::Synced;
        snapshot.queue_length = 0;
        assert!(!snapshot.can_sync());

        snapshot.queue_length = 1;
        snapshot.online = false;
        assert!(!snapshot.can_sync());
    }
}
