//! Background thread that feeds signals to a [`SyncEngine`].
//!
//! The driver owns one worker thread. Connectivity and identity events are
//! forwarded to it over a channel, so oracle and identity callbacks return
//! immediately and never block on remote calls. With a sync interval
//! configured, the worker also drains a non-empty queue periodically,
//! stretching the interval with [`crate::RetryConfig::backoff`] while drains
//! keep leaving writes behind.

use crate::connectivity::ConnectivityEvent;
use crate::engine::SyncEngine;
use crate::error::{SyncError, SyncResult};
use crate::gateway::RemoteGateway;
use crate::identity::IdentityEvent;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Wait used when no periodic drain is configured.
const IDLE_WAIT: Duration = Duration::from_secs(3600);

enum DriverMessage {
    Connectivity(ConnectivityEvent),
    Identity(IdentityEvent),
    SyncNow,
    Shutdown,
}

/// Handle to the background sync worker. Dropping it stops the worker.
pub struct SyncDriver {
    sender: Sender<DriverMessage>,
    handle: Option<JoinHandle<()>>,
}

impl SyncDriver {
    /// Starts a worker for `engine` and subscribes it to the engine's
    /// connectivity oracle and identity provider.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Config`] if the thread cannot be spawned.
    pub fn spawn<G: RemoteGateway + 'static>(engine: Arc<SyncEngine<G>>) -> SyncResult<Self> {
        let (sender, receiver) = mpsc::channel();

        let forward = Sender::clone(&sender);
        engine.connectivity.watch(Box::new(move |event: &ConnectivityEvent| {
            forward.send(DriverMessage::Connectivity(*event)).is_ok()
        }));
        let forward = Sender::clone(&sender);
        engine.identity.watch(Box::new(move |event: &IdentityEvent| {
            forward.send(DriverMessage::Identity(event.clone())).is_ok()
        }));

        let handle = thread::Builder::new()
            .name("liftlog-sync".into())
            .spawn(move || run(&engine, &receiver))
            .map_err(|e| SyncError::Config(format!("failed to spawn sync worker: {e}")))?;

        Ok(Self {
            sender,
            handle: Some(handle),
        })
    }

    /// Asks the worker to drain the queue now.
    pub fn sync_now(&self) {
        let _ = self.sender.send(DriverMessage::SyncNow);
    }

    /// Stops the worker and waits for it to finish its current step.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = self.sender.send(DriverMessage::Shutdown);
            if handle.join().is_err() {
                warn!("sync worker panicked");
            }
        }
    }
}

impl Drop for SyncDriver {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run<G: RemoteGateway>(engine: &SyncEngine<G>, receiver: &mpsc::Receiver<DriverMessage>) {
    info!("sync worker started");
    let interval = engine.config().sync_interval;
    let mut failures = 0u32;

    loop {
        let wait = match interval {
            Some(base) => engine.config().retry.backoff(base, failures),
            None => IDLE_WAIT,
        };

        match receiver.recv_timeout(wait) {
            Ok(DriverMessage::Connectivity(event)) => {
                if let Some(report) = engine.handle_connectivity(event) {
                    failures = next_failures(failures, report.is_clean());
                }
            }
            Ok(DriverMessage::Identity(event)) => {
                if let Err(e) = engine.handle_identity_event(&event) {
                    warn!(error = %e, "initialization after identity change failed");
                }
            }
            Ok(DriverMessage::SyncNow) => {
                let report = engine.sync_queue();
                failures = next_failures(failures, report.is_clean());
            }
            Ok(DriverMessage::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {
                if interval.is_none() || engine.queue_length() == 0 || !engine.is_online() {
                    continue;
                }
                debug!(queued = engine.queue_length(), "periodic queue drain");
                let report = engine.sync_queue();
                failures = next_failures(failures, report.is_clean());
            }
        }
    }
    info!("sync worker stopped");
}

fn next_failures(failures: u32, clean: bool) -> u32 {
    if clean {
        0
    } else {
        failures.saturating_add(1)
    }
}
