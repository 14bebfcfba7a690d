//! # LiftLog Sync Engine
//!
//! Offline-capable write-through synchronization for LiftLog.
//!
//! This crate provides:
//! - Optimistic mutations of the workout read model (log set, delete set,
//!   finish workout)
//! - A durable, deduplicating queue of writes the remote store has not seen
//! - Queue replay with retry counting and a give-up threshold
//! - Identity-scoped loading of the read model
//! - Connectivity and identity signals, and a background driver for them
//! - In-memory and PostgREST-style HTTP gateways to the remote store
//!
//! ## Architecture
//!
//! Every mutation follows the same path:
//! 1. Apply to the in-memory read model
//! 2. Try the remote write, if online and nothing overlapping is queued
//! 3. On failure (or offline), queue the write; a newer write for the same
//!    key replaces the queued one
//!
//! The queue is drained when the device comes online, on an explicit
//! [`SyncEngine::sync_queue`], and optionally on a fixed interval.
//!
//! ## Key Invariants
//!
//! - Callers never see a remote failure from a mutation
//! - At most one queued write per action and key
//! - A queued write is dropped after the configured number of failed
//!   replays, and the drop is published as [`SyncEvent::Dropped`]
//! - The read model never mixes the data of two identities

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod clock;
mod config;
mod connectivity;
mod driver;
mod engine;
mod error;
mod feed;
mod gateway;
mod identity;
mod lifecycle;
mod queue;
mod rest;
mod state;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{
    RemoteConfig, RetryConfig, SyncConfig, DEFAULT_QUEUE_KEY, ENV_REMOTE_ANON_KEY,
    ENV_REMOTE_URL, ENV_SYNC_INTERVAL_SECS,
};
pub use connectivity::{Connectivity, ConnectivityEvent, NetworkMonitor};
pub use driver::SyncDriver;
pub use engine::SyncEngine;
pub use error::{SyncError, SyncResult};
pub use feed::{EventFeed, Listener};
pub use gateway::{GatewayCall, MemoryGateway, RemoteGateway};
pub use identity::{AuthSession, IdentityEvent, IdentityProvider};
pub use queue::{QueueItem, SyncQueue};
pub use rest::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RestGateway};
pub use state::{DrainReport, Lifecycle, SyncEvent, SyncSnapshot, SyncStats, SyncStatus};
