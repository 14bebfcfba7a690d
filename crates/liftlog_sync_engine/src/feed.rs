//! Event distribution to observers.
//!
//! An [`EventFeed`] delivers every emitted event to two kinds of observers:
//! - channel subscribers created by [`EventFeed::subscribe`], polled by
//!   their owner on any thread
//! - listener callbacks registered with [`EventFeed::watch`], invoked
//!   synchronously on the emitting thread
//!
//! Subscribers whose receiver was dropped, and listeners that return
//! `false`, are removed on the next emission.

use parking_lot::Mutex;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;

/// A callback invoked for each event. Returning `false` unregisters it.
pub type Listener<E> = Box<dyn Fn(&E) -> bool + Send + Sync>;

/// A thread-safe fan-out of events.
pub struct EventFeed<E> {
    subscribers: Mutex<Vec<Sender<E>>>,
    listeners: Mutex<Vec<(u64, Arc<dyn Fn(&E) -> bool + Send + Sync>)>>,
    next_listener: Mutex<u64>,
}

impl<E: Clone> EventFeed<E> {
    /// Creates a feed with no observers.
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
            listeners: Mutex::new(Vec::new()),
            next_listener: Mutex::new(0),
        }
    }

    /// Returns a receiver of all future events.
    pub fn subscribe(&self) -> Receiver<E> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.lock().push(tx);
        rx
    }

    /// Registers a callback for all future events.
    pub fn watch(&self, listener: Listener<E>) {
        let id = {
            let mut next = self.next_listener.lock();
            *next += 1;
            *next
        };
        self.listeners.lock().push((id, Arc::from(listener)));
    }

    /// Delivers `event` to every observer.
    pub fn emit(&self, event: E) {
        // Listeners run without the lock held so they may emit or register.
        let listeners: Vec<_> = self.listeners.lock().clone();
        let finished: Vec<u64> = listeners
            .iter()
            .filter(|(_, listener)| !listener(&event))
            .map(|(id, _)| *id)
            .collect();
        if !finished.is_empty() {
            self.listeners
                .lock()
                .retain(|(id, _)| !finished.contains(id));
        }

        self.subscribers
            .lock()
            .retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Number of registered observers, subscribers and listeners combined.
    pub fn observer_count(&self) -> usize {
        self.subscribers.lock().len() + self.listeners.lock().len()
    }
}

impl<E: Clone> Default for EventFeed<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> std::fmt::Debug for EventFeed<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventFeed")
            .field("subscribers", &self.subscribers.lock().len())
            .field("listeners", &self.listeners.lock().len())
            .finish()
    }
}
