//! Application context shared by every operation and API handler.
//!
//! Bundles configuration, client state, the triage service client, the
//! document store, the local profile cache and the mounted dashboard feed.

use std::sync::{Arc, Mutex};

use crate::config::AppConfig;
use crate::core_state::{CoreError, CoreState};
use crate::dashboard::{DashboardFeed, DashboardView};
use crate::store::{CacheError, DocumentStore, MemoryDocumentStore, ProfileCache};
use crate::triage_api::{ApiClientError, HttpTriageApi, TriageApi};

#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error("Triage service client: {0}")]
    Api(#[from] ApiClientError),
    #[error("Profile cache: {0}")]
    Cache(#[from] CacheError),
}

pub struct AppContext {
    pub config: AppConfig,
    pub state: Arc<CoreState>,
    pub api: Arc<dyn TriageApi>,
    pub store: Arc<dyn DocumentStore>,
    pub cache: Arc<ProfileCache>,
    dashboard: Mutex<Option<DashboardFeed>>,
}

impl AppContext {
    pub fn new(
        config: AppConfig,
        api: Arc<dyn TriageApi>,
        store: Arc<dyn DocumentStore>,
        cache: Arc<ProfileCache>,
    ) -> Self {
        Self {
            config,
            state: Arc::new(CoreState::new()),
            api,
            store,
            cache,
            dashboard: Mutex::new(None),
        }
    }

    /// Wire the production services for `config`.
    ///
    /// An unusable cache file degrades to an in-memory cache.
    pub fn from_config(config: AppConfig) -> Result<Self, ContextError> {
        let api = HttpTriageApi::new(&config.api_base_url)?;
        let cache = match ProfileCache::open(&config.profile_cache_path()) {
            Ok(cache) => cache,
            Err(e) => {
                tracing::warn!(error = %e, "Profile cache unavailable, using in-memory cache");
                ProfileCache::open_in_memory()?
            }
        };
        Ok(Self::new(
            config,
            Arc::new(api),
            Arc::new(MemoryDocumentStore::new()),
            Arc::new(cache),
        ))
    }

    // ── Dashboard feed ──────────────────────────────────────

    /// Install `feed` as the mounted dashboard. A previously mounted feed is
    /// torn down first. A feed whose session already ended is dropped and
    /// `CoreError::SessionChanged` returned.
    pub fn mount_dashboard(&self, feed: DashboardFeed) -> Result<(), CoreError> {
        let ticket = feed.ticket().clone();
        let previous = self.state.with_session(&ticket, || {
            Ok(self
                .dashboard
                .lock()
                .map_err(|_| CoreError::LockPoisoned)?
                .replace(feed))
        })?;
        if let Some(mut previous) = previous {
            previous.teardown();
        }
        Ok(())
    }

    /// Uid the mounted dashboard belongs to.
    pub fn dashboard_uid(&self) -> Result<Option<String>, CoreError> {
        let guard = self.dashboard.lock().map_err(|_| CoreError::LockPoisoned)?;
        Ok(guard.as_ref().map(|feed| feed.uid().to_string()))
    }

    /// Tear down the mounted dashboard, if any. Returns whether one was
    /// mounted.
    pub fn unmount_dashboard(&self) -> Result<bool, CoreError> {
        let feed = self
            .dashboard
            .lock()
            .map_err(|_| CoreError::LockPoisoned)?
            .take();
        Ok(match feed {
            Some(mut feed) => {
                feed.teardown();
                true
            }
            None => false,
        })
    }

    pub fn dashboard_view(&self) -> Result<Option<DashboardView>, CoreError> {
        let guard = self.dashboard.lock().map_err(|_| CoreError::LockPoisoned)?;
        match guard.as_ref() {
            Some(feed) => feed.view().map(Some),
            None => Ok(None),
        }
    }

    pub fn has_dashboard(&self) -> bool {
        self.dashboard
            .lock()
            .map(|d| d.is_some())
            .unwrap_or(false)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::core_state::UserIdentity;
    use crate::triage_api::MockTriageApi;

    pub const TEST_UID: &str = "patient-1";

    /// Handles the tests keep alongside the context.
    pub struct Harness {
        pub ctx: AppContext,
        pub api: Arc<MockTriageApi>,
        pub store: Arc<MemoryDocumentStore>,
    }

    pub fn identity() -> UserIdentity {
        UserIdentity {
            uid: TEST_UID.into(),
            display_name: Some("Asha Rao".into()),
            email: Some("asha@example.org".into()),
            photo_url: None,
        }
    }

    pub fn harness(api: MockTriageApi) -> Harness {
        let api = Arc::new(api);
        let store = Arc::new(MemoryDocumentStore::new());
        let cache = Arc::new(ProfileCache::open_in_memory().unwrap());
        let ctx = AppContext::new(
            AppConfig::default(),
            api.clone(),
            store.clone(),
            cache,
        );
        Harness { ctx, api, store }
    }

    pub fn signed_in_harness(api: MockTriageApi) -> Harness {
        let h = harness(api);
        h.ctx.state.sign_in(identity()).unwrap();
        h
    }

    pub fn test_context(api: MockTriageApi) -> AppContext {
        harness(api).ctx
    }

    pub fn signed_in_context(api: MockTriageApi) -> AppContext {
        signed_in_harness(api).ctx
    }

    #[tokio::test]
    async fn from_config_uses_data_dir_cache() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig {
            data_dir: dir.path().to_path_buf(),
            ..AppConfig::default()
        };
        let ctx = AppContext::from_config(config).unwrap();
        assert!(ctx.config.profile_cache_path().exists());
        assert!(!ctx.state.is_auth_resolved());
    }

    #[tokio::test]
    async fn mount_replaces_and_unmount_tears_down() {
        let h = signed_in_harness(MockTriageApi::new());
        let store: Arc<dyn DocumentStore> = h.store.clone();

        let ticket = h.ctx.state.current_session().unwrap();
        let feed = DashboardFeed::mount(&store, h.ctx.state.clone(), ticket).unwrap();
        h.ctx.mount_dashboard(feed).unwrap();
        assert!(h.ctx.has_dashboard());
        assert_eq!(h.ctx.dashboard_uid().unwrap().as_deref(), Some(TEST_UID));
        assert!(h.ctx.dashboard_view().unwrap().is_some());

        assert!(h.ctx.unmount_dashboard().unwrap());
        assert!(!h.ctx.unmount_dashboard().unwrap());
        assert!(h.ctx.dashboard_view().unwrap().is_none());
    }

    #[tokio::test]
    async fn feed_of_ended_session_is_not_mounted() {
        let h = signed_in_harness(MockTriageApi::new());
        let store: Arc<dyn DocumentStore> = h.store.clone();
        let ticket = h.ctx.state.current_session().unwrap();
        let feed = DashboardFeed::mount(&store, h.ctx.state.clone(), ticket).unwrap();

        h.ctx.state.sign_out().unwrap();
        let err = h.ctx.mount_dashboard(feed).unwrap_err();
        assert!(matches!(err, CoreError::SessionChanged));
        assert!(!h.ctx.has_dashboard());

        tokio::time::sleep(std::time::Duration::from_millis(30)).await;
        assert_eq!(h.store.listener_count(TEST_UID), 0);
    }
}
