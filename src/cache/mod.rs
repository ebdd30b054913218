//! Caching for secondary reference data.
//!
//! - `SessionStore` is the host's session-scoped key/value storage
//! - `TtlCache` layers expiry and self-healing on top of it
//! - `ReferenceData` serves active users and handlers cache-first

mod reference;
mod storage;
mod ttl;

pub use reference::{ReferenceData, ReferenceSnapshot};
pub use storage::{SessionStore, SqliteSessionStore};
pub use ttl::TtlCache;

#[cfg(test)]
pub use storage::MemoryStore;
