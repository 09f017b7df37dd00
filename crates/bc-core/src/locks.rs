//! One mutex per key alias.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

/// Serializes work against a single key alias while letting different
/// aliases proceed in parallel.
///
/// Locks are not reentrant: code running inside [`AliasLocks::with_alias`]
/// must not take the same alias again.
#[derive(Default)]
pub struct AliasLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl AliasLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` while holding the lock for `alias`.
    pub fn with_alias<T>(&self, alias: &str, f: impl FnOnce() -> T) -> T {
        let lock = self
            .locks
            .lock()
            .entry(alias.to_string())
            .or_default()
            .clone();
        let _guard = lock.lock();
        f()
    }
}
