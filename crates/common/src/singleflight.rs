//! Keyed single-flight lock.
//!
//! At most one in-flight operation per key. Insertion precedes invocation,
//! so a task can never re-acquire its own key; removal happens on completion
//! through a drop guard, whatever the outcome.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Mutex;

/// A set of currently-held string keys, shared across requests.
#[derive(Debug, Default)]
pub struct SingleFlight {
    held: Mutex<HashSet<String>>,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `fut` if `key` is free, returning its output; `None` when another
    /// holder is already in flight for the same key.
    pub async fn try_run<F>(&self, key: &str, fut: F) -> Option<F::Output>
    where
        F: Future,
    {
        {
            let mut held = self.held.lock().unwrap_or_else(|e| e.into_inner());
            if !held.insert(key.to_string()) {
                return None;
            }
        }
        let _guard = KeyGuard { owner: self, key };
        Some(fut.await)
    }

    /// Number of keys currently held.
    pub fn in_flight(&self) -> usize {
        self.held.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

struct KeyGuard<'a> {
    owner: &'a SingleFlight,
    key: &'a str,
}

impl Drop for KeyGuard<'_> {
    fn drop(&mut self) {
        self.owner
            .held
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(self.key);
    }
}
