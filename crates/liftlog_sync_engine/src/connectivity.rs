//! Device connectivity signal.

use crate::feed::{EventFeed, Listener};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::info;

/// A change of network reachability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityEvent {
    /// The device regained network access.
    Online,
    /// The device lost network access.
    Offline,
}

/// A source of online/offline state and transitions.
pub trait Connectivity: Send + Sync {
    /// Current reachability.
    fn is_online(&self) -> bool;

    /// Registers a callback for future transitions.
    fn watch(&self, listener: Listener<ConnectivityEvent>);
}

/// Connectivity state driven by the host platform.
///
/// The platform calls [`NetworkMonitor::set_online`] whenever its network
/// callback fires; listeners only hear about actual transitions.
#[derive(Debug)]
pub struct NetworkMonitor {
    online: AtomicBool,
    feed: EventFeed<ConnectivityEvent>,
}

impl NetworkMonitor {
    /// Creates a monitor with the given initial state.
    pub fn new(online: bool) -> Self {
        Self {
            online: AtomicBool::new(online),
            feed: EventFeed::new(),
        }
    }

    /// Records the platform's reachability, notifying on change.
    pub fn set_online(&self, online: bool) {
        let was_online = self.online.swap(online, Ordering::SeqCst);
        if was_online == online {
            return;
        }

        let event = if online {
            ConnectivityEvent::Online
        } else {
            ConnectivityEvent::Offline
        };
        info!(?event, "connectivity changed");
        self.feed.emit(event);
    }
}

impl Default for NetworkMonitor {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Connectivity for NetworkMonitor {
    fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    fn watch(&self, listener: Listener<ConnectivityEvent>) {
        self.feed.watch(listener);
    }
}

impl<C: Connectivity + ?Sized> Connectivity for std::sync::Arc<C> {
    fn is_online(&self) -> bool {
        (**self).is_online()
    }

    fn watch(&self, listener: Listener<ConnectivityEvent>) {
        (**self).watch(listener)
    }
}
