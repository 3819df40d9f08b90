//! Document store access.
//!
//! The managed document store is the sole arbiter of consistency for
//! history and profile counters. The client only appends, merges profile
//! fields, and listens. `MemoryDocumentStore` is the in-process
//! implementation used by the binary and the tests; a hosted backend plugs
//! in behind the same trait.

pub mod local_cache;
pub mod memory;

use std::future::Future;

use chrono::{DateTime, Utc};
use futures_util::future::BoxFuture;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::models::{Demographics, HistoryEntry, NewHistoryEntry, UserProfile};
use crate::subscription::ListenerEvent;

pub use local_cache::{CacheError, CachedProfile, ProfileCache};
pub use memory::MemoryDocumentStore;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("Document store unavailable: {0}")]
    Unavailable(String),
    #[error("Permission denied for user {0}")]
    PermissionDenied(String),
    #[error("Internal lock error")]
    LockPoisoned,
}

/// Profile fields bumped after a successful triage.
#[derive(Debug, Clone, PartialEq)]
pub struct TriageVisit {
    pub risk_level: String,
    pub at: DateTime<Utc>,
}

/// Remote per-user document store.
pub trait DocumentStore: Send + Sync {
    /// Read the profile document. `Ok(None)` when it was never written.
    fn load_profile<'a>(&'a self, uid: &'a str)
        -> BoxFuture<'a, Result<Option<UserProfile>, StoreError>>;

    /// Merge age and gender into the profile document.
    fn save_demographics<'a>(
        &'a self,
        uid: &'a str,
        demographics: Demographics,
    ) -> BoxFuture<'a, Result<(), StoreError>>;

    /// Increment `sessionCount` and set `lastTriageDate`/`lastRiskLevel`.
    /// Returns the new session count.
    fn record_visit<'a>(
        &'a self,
        uid: &'a str,
        visit: TriageVisit,
    ) -> BoxFuture<'a, Result<u32, StoreError>>;

    /// Append to the user's history. The store assigns id and timestamp.
    fn append_history<'a>(
        &'a self,
        uid: &'a str,
        entry: NewHistoryEntry,
    ) -> BoxFuture<'a, Result<HistoryEntry, StoreError>>;

    /// Live history, newest first.
    fn watch_history(
        &self,
        uid: &str,
    ) -> Result<watch::Receiver<ListenerEvent<Vec<HistoryEntry>>>, StoreError>;

    /// Live profile document.
    fn watch_profile(
        &self,
        uid: &str,
    ) -> Result<watch::Receiver<ListenerEvent<UserProfile>>, StoreError>;
}

// ═══════════════════════════════════════════════════════════
// PendingWrite — fire-and-forget with an observable outcome
// ═══════════════════════════════════════════════════════════

/// A remote write running in the background.
///
/// Dropping the handle accepts eventual consistency: the write still runs
/// and a failure is still logged. Awaiting `outcome()` reports it.
pub struct PendingWrite<T = ()> {
    label: &'static str,
    handle: JoinHandle<Result<T, StoreError>>,
}

impl<T: Send + 'static> PendingWrite<T> {
    pub fn spawn<Fut>(label: &'static str, write: Fut) -> Self
    where
        Fut: Future<Output = Result<T, StoreError>> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            let outcome = write.await;
            if let Err(ref e) = outcome {
                tracing::warn!(label, error = %e, "Background write failed");
            }
            outcome
        });
        Self { label, handle }
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    /// Wait for the write to finish.
    pub async fn outcome(self) -> Result<T, StoreError> {
        match self.handle.await {
            Ok(outcome) => outcome,
            Err(e) => Err(StoreError::Unavailable(format!("write task aborted: {e}"))),
        }
    }
}

impl<T> std::fmt::Debug for PendingWrite<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingWrite")
            .field("label", &self.label)
            .field("finished", &self.handle.is_finished())
            .finish()
    }
}
