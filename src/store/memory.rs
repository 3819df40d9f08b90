//! In-process document store with live listeners.
//!
//! Each user owns a profile document, an append-only history list and one
//! `watch` channel per listener kind. Writes publish a fresh snapshot to
//! every listener of that user.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use futures_util::future::BoxFuture;
use tokio::sync::watch;
use uuid::Uuid;

use super::{DocumentStore, StoreError, TriageVisit};
use crate::models::history::sort_newest_first;
use crate::models::{Demographics, HistoryEntry, NewHistoryEntry, UserProfile};
use crate::subscription::{ListenerError, ListenerEvent};

struct UserDocs {
    profile: Option<UserProfile>,
    history: Vec<HistoryEntry>,
    history_tx: watch::Sender<ListenerEvent<Vec<HistoryEntry>>>,
    profile_tx: watch::Sender<ListenerEvent<UserProfile>>,
}

impl UserDocs {
    fn new() -> Self {
        let (history_tx, _) = watch::channel(Ok(Vec::new()));
        let (profile_tx, _) = watch::channel(Ok(UserProfile::default()));
        Self {
            profile: None,
            history: Vec::new(),
            history_tx,
            profile_tx,
        }
    }

    fn publish_history(&self) {
        self.history_tx.send_replace(Ok(self.history.clone()));
    }

    fn publish_profile(&self) {
        self.profile_tx
            .send_replace(Ok(self.profile.clone().unwrap_or_default()));
    }
}

/// In-memory `DocumentStore`.
pub struct MemoryDocumentStore {
    users: Mutex<HashMap<String, UserDocs>>,
    available: AtomicBool,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self {
            users: Mutex::new(HashMap::new()),
            available: AtomicBool::new(true),
        }
    }

    /// Simulate a network partition: while unavailable, every read and
    /// write fails with `StoreError::Unavailable`. Listeners stay attached.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Push a listener error to every history and profile listener of `uid`.
    pub fn fail_listeners(&self, uid: &str, reason: &str) -> Result<(), StoreError> {
        let mut users = self.lock()?;
        let docs = users.entry(uid.to_string()).or_insert_with(UserDocs::new);
        docs.history_tx
            .send_replace(Err(ListenerError(reason.to_string())));
        docs.profile_tx
            .send_replace(Err(ListenerError(reason.to_string())));
        Ok(())
    }

    /// Number of history entries stored for `uid`.
    pub fn history_len(&self, uid: &str) -> usize {
        self.lock()
            .map(|users| users.get(uid).map(|d| d.history.len()).unwrap_or(0))
            .unwrap_or(0)
    }

    /// Number of live listeners (history + profile) attached for `uid`.
    pub fn listener_count(&self, uid: &str) -> usize {
        self.lock()
            .map(|users| {
                users
                    .get(uid)
                    .map(|d| d.history_tx.receiver_count() + d.profile_tx.receiver_count())
                    .unwrap_or(0)
            })
            .unwrap_or(0)
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, UserDocs>>, StoreError> {
        self.users.lock().map_err(|_| StoreError::LockPoisoned)
    }

    fn ensure_available(&self) -> Result<(), StoreError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("store offline".into()))
        }
    }

    fn load_profile_sync(&self, uid: &str) -> Result<Option<UserProfile>, StoreError> {
        self.ensure_available()?;
        Ok(self.lock()?.get(uid).and_then(|d| d.profile.clone()))
    }

    fn save_demographics_sync(&self, uid: &str, demographics: Demographics) -> Result<(), StoreError> {
        self.ensure_available()?;
        let mut users = self.lock()?;
        let docs = users.entry(uid.to_string()).or_insert_with(UserDocs::new);
        let profile = docs.profile.get_or_insert_with(UserProfile::default);
        profile.age = Some(demographics.age);
        profile.gender = Some(demographics.gender);
        docs.publish_profile();
        Ok(())
    }

    fn record_visit_sync(&self, uid: &str, visit: TriageVisit) -> Result<u32, StoreError> {
        self.ensure_available()?;
        let mut users = self.lock()?;
        let docs = users.entry(uid.to_string()).or_insert_with(UserDocs::new);
        let profile = docs.profile.get_or_insert_with(UserProfile::default);
        profile.session_count = profile.session_count.saturating_add(1);
        profile.last_triage_date = Some(visit.at);
        profile.last_risk_level = Some(visit.risk_level);
        let count = profile.session_count;
        docs.publish_profile();
        Ok(count)
    }

    fn append_history_sync(&self, uid: &str, entry: NewHistoryEntry) -> Result<HistoryEntry, StoreError> {
        self.ensure_available()?;
        let mut users = self.lock()?;
        let docs = users.entry(uid.to_string()).or_insert_with(UserDocs::new);
        let stored = entry.into_entry(Uuid::new_v4(), Utc::now());
        docs.history.push(stored.clone());
        sort_newest_first(&mut docs.history);
        docs.publish_history();
        Ok(stored)
    }
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentStore for MemoryDocumentStore {
    fn load_profile<'a>(
        &'a self,
        uid: &'a str,
    ) -> BoxFuture<'a, Result<Option<UserProfile>, StoreError>> {
        Box::pin(async move { self.load_profile_sync(uid) })
    }

    fn save_demographics<'a>(
        &'a self,
        uid: &'a str,
        demographics: Demographics,
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(async move { self.save_demographics_sync(uid, demographics) })
    }

    fn record_visit<'a>(
        &'a self,
        uid: &'a str,
        visit: TriageVisit,
    ) -> BoxFuture<'a, Result<u32, StoreError>> {
        Box::pin(async move { self.record_visit_sync(uid, visit) })
    }

    fn append_history<'a>(
        &'a self,
        uid: &'a str,
        entry: NewHistoryEntry,
    ) -> BoxFuture<'a, Result<HistoryEntry, StoreError>> {
        Box::pin(async move { self.append_history_sync(uid, entry) })
    }

    fn watch_history(
        &self,
        uid: &str,
    ) -> Result<watch::Receiver<ListenerEvent<Vec<HistoryEntry>>>, StoreError> {
        self.ensure_available()?;
        let mut users = self.lock()?;
        let docs = users.entry(uid.to_string()).or_insert_with(UserDocs::new);
        Ok(docs.history_tx.subscribe())
    }

    fn watch_profile(
        &self,
        uid: &str,
    ) -> Result<watch::Receiver<ListenerEvent<UserProfile>>, StoreError> {
        self.ensure_available()?;
        let mut users = self.lock()?;
        let docs = users.entry(uid.to_string()).or_insert_with(UserDocs::new);
        Ok(docs.profile_tx.subscribe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Gender;

    fn entry(risk: &str) -> NewHistoryEntry {
        NewHistoryEntry {
            symptoms: vec!["Cough".into()],
            conditions: vec![],
            risk_level: risk.into(),
            department: "Pulmonology".into(),
            summary: "Persistent cough".into(),
            recommended_action: "Book a visit".into(),
            urgency_score: 4,
        }
    }

    #[tokio::test]
    async fn profile_absent_until_written() {
        let store = MemoryDocumentStore::new();
        assert_eq!(store.load_profile("u1").await.unwrap(), None);

        store
            .save_demographics("u1", Demographics { age: 29, gender: Gender::Female })
            .await
            .unwrap();
        let profile = store.load_profile("u1").await.unwrap().unwrap();
        assert_eq!(profile.age, Some(29));
        assert_eq!(profile.session_count, 0);
    }

    #[tokio::test]
    async fn record_visit_increments_counter() {
        let store = MemoryDocumentStore::new();
        let at = Utc::now();
        let first = store
            .record_visit("u1", TriageVisit { risk_level: "Low".into(), at })
            .await
            .unwrap();
        let second = store
            .record_visit("u1", TriageVisit { risk_level: "High".into(), at })
            .await
            .unwrap();
        assert_eq!((first, second), (1, 2));

        let profile = store.load_profile("u1").await.unwrap().unwrap();
        assert_eq!(profile.last_risk_level.as_deref(), Some("High"));
        assert_eq!(profile.last_triage_date, Some(at));
    }

    #[tokio::test]
    async fn history_is_per_user_and_append_only() {
        let store = MemoryDocumentStore::new();
        store.append_history("u1", entry("Low")).await.unwrap();
        store.append_history("u1", entry("High")).await.unwrap();
        store.append_history("u2", entry("Low")).await.unwrap();
        assert_eq!(store.history_len("u1"), 2);
        assert_eq!(store.history_len("u2"), 1);
    }

    #[tokio::test]
    async fn history_listener_sees_new_entries_newest_first() {
        let store = MemoryDocumentStore::new();
        let mut rx = store.watch_history("u1").unwrap();
        assert!(rx.borrow().as_ref().unwrap().is_empty());

        store.append_history("u1", entry("Low")).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        store.append_history("u1", entry("High")).await.unwrap();

        rx.changed().await.unwrap();
        let snapshot = rx.borrow_and_update().clone().unwrap();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].risk_level, "High");
        assert!(snapshot[0].timestamp >= snapshot[1].timestamp);
    }

    #[tokio::test]
    async fn unavailable_store_fails_reads_and_writes() {
        let store = MemoryDocumentStore::new();
        store.set_available(false);
        assert!(matches!(
            store.load_profile("u1").await,
            Err(StoreError::Unavailable(_))
        ));
        assert!(store.append_history("u1", entry("Low")).await.is_err());
        assert!(store.watch_history("u1").is_err());

        store.set_available(true);
        assert!(store.load_profile("u1").await.is_ok());
    }

    #[tokio::test]
    async fn listener_count_tracks_receivers() {
        let store = MemoryDocumentStore::new();
        let history = store.watch_history("u1").unwrap();
        let profile = store.watch_profile("u1").unwrap();
        assert_eq!(store.listener_count("u1"), 2);
        drop(history);
        drop(profile);
        assert_eq!(store.listener_count("u1"), 0);
    }

    #[tokio::test]
    async fn fail_listeners_pushes_error() {
        let store = MemoryDocumentStore::new();
        let mut rx = store.watch_profile("u1").unwrap();
        store.fail_listeners("u1", "permission denied").unwrap();
        rx.changed().await.unwrap();
        assert!(rx.borrow().is_err());
    }
}
