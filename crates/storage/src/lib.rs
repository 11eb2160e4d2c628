//! Key-value storage contract and backends.
//!
//! Handlers and extensions persist through the [`KvStore`] trait; the
//! process wires in either the in-memory backend or the JSON-file backend
//! under the data directory.

pub mod file;
pub mod kv;
pub mod memory;

pub use {file::FileStore, kv::{KvStore, StorageError}, memory::MemoryStore};
