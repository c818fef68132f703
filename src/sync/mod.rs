//! # Concurrency Primitives
//!
//! Process-wide admission-control building blocks: a keyed asynchronous
//! mutex and a single-flight lookup cache built on top of it. Both are
//! shared by every concurrent execution in the process.

pub mod keyed_lock;
pub mod lookup_cache;

pub use keyed_lock::{KeyedLock, KeyedLockGuard};
pub use lookup_cache::LookupCache;
