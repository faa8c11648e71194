//! Best-effort object deletion after the primary work of an operation.
//!
//! Deletes are collected into a [`Cleanup`] batch while an operation runs
//! and executed once its outcome is settled. A failed delete never fails the
//! operation: it becomes a [`CleanupWarning`] in the operation's result and a
//! `warn!` in the log.

use futures::future::join_all;
use photostack_store::ObjectStore;
use serde::Serialize;
use tracing::{debug, warn};

/// A delete that did not go through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupWarning {
    /// The key that may still exist.
    pub key: String,
    /// Why the delete failed.
    pub message: String,
}

/// An ordered set of keys to delete.
#[derive(Debug, Default)]
pub(crate) struct Cleanup {
    keys: Vec<String>,
}

impl Cleanup {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Queue a key; duplicates are ignored.
    pub(crate) fn push(&mut self, key: impl Into<String>) {
        let key = key.into();
        if !self.keys.contains(&key) {
            self.keys.push(key);
        }
    }

    pub(crate) fn extend<I>(&mut self, keys: I)
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        for key in keys {
            self.push(key);
        }
    }

    /// Delete every queued key independently and report the failures.
    pub(crate) async fn run(self, store: &dyn ObjectStore) -> Vec<CleanupWarning> {
        if self.keys.is_empty() {
            return Vec::new();
        }
        debug!(count = self.keys.len(), "running cleanup");

        let results = join_all(self.keys.iter().map(|key| store.delete(key))).await;
        self.keys
            .into_iter()
            .zip(results)
            .filter_map(|(key, result)| {
                result.err().map(|e| {
                    warn!(key = %key, error = %e, "cleanup delete failed");
                    CleanupWarning {
                        key,
                        message: e.to_string(),
                    }
                })
            })
            .collect()
    }
}
