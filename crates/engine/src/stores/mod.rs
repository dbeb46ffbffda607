//! In-memory state storage modules.
//!
//! Stores manage runtime state that doesn't belong in the database:
//! - `KeyedLocks` - per-scope serialization of locate-or-create

pub mod key_locks;

pub use key_locks::KeyedLocks;
