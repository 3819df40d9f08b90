//! Session lifecycle driven by identity provider events.
//!
//! Sign-in stores the identity, restores demographics and the session
//! counter (remote profile first, then the local cache, then defaults) and
//! mounts the dashboard feed. Sign-out tears the feed down and clears every
//! piece of derived client state.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::watch;

use crate::context::AppContext;
use crate::core_state::{AuthStatus, CoreError, UserIdentity};
use crate::dashboard::DashboardFeed;
use crate::models::Demographics;
use crate::store::CachedProfile;
use crate::subscription::Subscription;

/// What the identity provider reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    /// No report yet.
    Unresolved,
    SignedOut,
    SignedIn(UserIdentity),
}

/// Where restored profile fields came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RestoreSource {
    Remote,
    LocalCache,
    Defaults,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RestoredProfile {
    pub source: RestoreSource,
    pub demographics: Option<Demographics>,
    pub session_count: u32,
}

impl RestoredProfile {
    fn defaults() -> Self {
        Self {
            source: RestoreSource::Defaults,
            demographics: None,
            session_count: 0,
        }
    }
}

/// Session screen payload.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub loading: bool,
    pub auth: AuthStatus,
    pub demographics: Option<Demographics>,
    pub session_count: u32,
    pub submitting: bool,
    pub has_result: bool,
}

pub fn session_view(ctx: &AppContext) -> Result<SessionView, CoreError> {
    Ok(SessionView {
        loading: !ctx.state.is_auth_resolved(),
        auth: ctx.state.auth_status()?,
        demographics: ctx.state.demographics()?,
        session_count: ctx.state.session_count()?,
        submitting: ctx.state.is_submitting(),
        has_result: ctx.state.last_result()?.is_some(),
    })
}

// ═══════════════════════════════════════════
// Restore
// ═══════════════════════════════════════════

/// Load profile fields for `uid`. Never fails: every failure falls through
/// to the next source.
pub async fn restore_profile(ctx: &AppContext, uid: &str) -> RestoredProfile {
    match ctx.store.load_profile(uid).await {
        Ok(Some(profile)) => {
            let restored = RestoredProfile {
                source: RestoreSource::Remote,
                demographics: profile.demographics(),
                session_count: profile.session_count,
            };
            let cached = CachedProfile {
                demographics: restored.demographics,
                session_count: restored.session_count,
                updated_at: Utc::now(),
            };
            if let Err(e) = ctx.cache.save(uid, &cached) {
                tracing::warn!(error = %e, "Could not refresh profile cache");
            }
            restored
        }
        Ok(None) => {
            tracing::debug!(uid, "No remote profile yet, using defaults");
            RestoredProfile::defaults()
        }
        Err(e) => {
            tracing::debug!(uid, error = %e, "Remote profile unavailable, trying local cache");
            match ctx.cache.load(uid) {
                Ok(Some(cached)) => RestoredProfile {
                    source: RestoreSource::LocalCache,
                    demographics: cached.demographics,
                    session_count: cached.session_count,
                },
                Ok(None) => RestoredProfile::defaults(),
                Err(e) => {
                    tracing::debug!(uid, error = %e, "Local cache unavailable, using defaults");
                    RestoredProfile::defaults()
                }
            }
        }
    }
}

// ═══════════════════════════════════════════
// Auth events
// ═══════════════════════════════════════════

/// Sign `user` in, restore their profile and mount their dashboard.
///
/// Fails with `CoreError::SessionChanged` when a sign-out or another
/// sign-in lands while the profile is being restored; nothing from this
/// call is applied then.
pub async fn sign_in(ctx: &AppContext, user: UserIdentity) -> Result<RestoredProfile, CoreError> {
    let ticket = ctx.state.sign_in(user)?;
    if ctx.dashboard_uid()?.is_some_and(|uid| uid != ticket.uid) {
        ctx.unmount_dashboard()?;
    }
    tracing::info!(uid = %ticket.uid, "Signed in");

    let restored = restore_profile(ctx, &ticket.uid).await;
    ctx.state.with_session(&ticket, || {
        ctx.state.set_demographics(restored.demographics)?;
        ctx.state.set_session_count(restored.session_count)
    })?;

    match DashboardFeed::mount(&ctx.store, Arc::clone(&ctx.state), ticket) {
        Ok(feed) => ctx.mount_dashboard(feed)?,
        Err(e) => tracing::warn!(error = %e, "Dashboard listeners unavailable"),
    }
    Ok(restored)
}

pub fn sign_out(ctx: &AppContext) -> Result<(), CoreError> {
    // State first: a sign-in still mounting sees the ended session.
    ctx.state.sign_out()?;
    ctx.unmount_dashboard()?;
    Ok(())
}

/// Apply one identity provider event.
pub async fn apply_auth_event(
    ctx: &AppContext,
    event: AuthEvent,
) -> Result<Option<RestoredProfile>, CoreError> {
    match event {
        AuthEvent::Unresolved => Ok(None),
        AuthEvent::SignedOut => sign_out(ctx).map(|_| None),
        AuthEvent::SignedIn(user) => sign_in(ctx, user).await.map(Some),
    }
}

// ═══════════════════════════════════════════
// Identity provider bridge
// ═══════════════════════════════════════════

/// Source of identity events.
pub trait IdentityProvider: Send + Sync {
    fn events(&self) -> watch::Receiver<AuthEvent>;
}

/// Identity provider fed by the web shell.
pub struct SharedIdentity {
    tx: watch::Sender<AuthEvent>,
}

impl SharedIdentity {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(AuthEvent::Unresolved);
        Self { tx }
    }

    pub fn publish(&self, event: AuthEvent) {
        self.tx.send_replace(event);
    }
}

impl Default for SharedIdentity {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityProvider for SharedIdentity {
    fn events(&self) -> watch::Receiver<AuthEvent> {
        self.tx.subscribe()
    }
}

/// Apply every event of `provider` to `ctx`, in order.
pub fn watch_identity(ctx: Arc<AppContext>, provider: &dyn IdentityProvider) -> Subscription {
    Subscription::watch_async("identity", provider.events(), move |event| {
        let ctx = Arc::clone(&ctx);
        async move {
            if let Err(e) = apply_auth_event(&ctx, event).await {
                tracing::warn!(error = %e, "Could not apply identity event");
            }
        }
    })
}
