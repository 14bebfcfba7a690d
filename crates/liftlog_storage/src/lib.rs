//! # LiftLog Storage
//!
//! Durable key-value storage for LiftLog.
//!
//! Stores are **opaque byte stores**: a value is whatever bytes the caller
//! wrote under a key, and a write always replaces the whole value. The sync
//! engine keeps its pending-mutation queue here so it survives restarts.
//!
//! ## Available Stores
//!
//! - [`InMemoryStore`] - For testing and ephemeral sessions
//! - [`FileStore`] - One file per key inside a directory
//!
//! ## Example
//!
//! ```rust
//! use liftlog_storage::{KeyValueStore, InMemoryStore};
//!
//! let store = InMemoryStore::new();
//! store.set("queue", b"[]").unwrap();
//! assert_eq!(store.get("queue").unwrap().as_deref(), Some(&b"[]"[..]));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod file;
mod memory;
mod store;

pub use error::{StorageError, StorageResult};
pub use file::FileStore;
pub use memory::InMemoryStore;
pub use store::KeyValueStore;
