//! Client application state.
//!
//! `CoreState` is the single explicit state object of the client: identity,
//! demographics, session counter, last triage result, chat transcript and
//! the in-flight submission flag. It is shared behind `Arc` through
//! `AppContext`; every mutation goes through a typed method.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::chat::ChatMessage;
use crate::models::{Demographics, TriageResult};

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Internal lock error")]
    LockPoisoned,
    #[error("No user is signed in")]
    NotSignedIn,
    #[error("The session ended before the operation completed")]
    SessionChanged,
}

/// Identity as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub uid: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub photo_url: Option<String>,
}

/// Authentication state of the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "user", rename_all = "snake_case")]
pub enum AuthStatus {
    /// The identity provider has not reported yet. Nothing renders.
    Resolving,
    SignedOut,
    SignedIn(UserIdentity),
}

/// One sign-in of one user. Goes stale on sign-out and on a switch to
/// another user; work started under a stale ticket must not touch state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionTicket {
    pub uid: String,
    generation: u64,
}

// ═══════════════════════════════════════════════════════════
// CoreState
// ═══════════════════════════════════════════════════════════

pub struct CoreState {
    auth: RwLock<AuthStatus>,
    /// Bumped under the `auth` write lock.
    generation: AtomicU64,
    demographics: RwLock<Option<Demographics>>,
    session_count: RwLock<u32>,
    last_result: RwLock<Option<TriageResult>>,
    chat: RwLock<Vec<ChatMessage>>,
    submitting: AtomicBool,
}

impl CoreState {
    pub fn new() -> Self {
        Self {
            auth: RwLock::new(AuthStatus::Resolving),
            generation: AtomicU64::new(0),
            demographics: RwLock::new(None),
            session_count: RwLock::new(0),
            last_result: RwLock::new(None),
            chat: RwLock::new(Vec::new()),
            submitting: AtomicBool::new(false),
        }
    }

    // ── Identity ────────────────────────────────────────────

    pub fn auth_status(&self) -> Result<AuthStatus, CoreError> {
        Ok(self.auth.read().map_err(|_| CoreError::LockPoisoned)?.clone())
    }

    /// `false` until the identity provider reported once.
    pub fn is_auth_resolved(&self) -> bool {
        self.auth
            .read()
            .map(|a| *a != AuthStatus::Resolving)
            .unwrap_or(false)
    }

    pub fn current_user(&self) -> Result<Option<UserIdentity>, CoreError> {
        match &*self.auth.read().map_err(|_| CoreError::LockPoisoned)? {
            AuthStatus::SignedIn(user) => Ok(Some(user.clone())),
            _ => Ok(None),
        }
    }

    /// Uid of the signed-in user, or `CoreError::NotSignedIn`.
    pub fn require_uid(&self) -> Result<String, CoreError> {
        self.current_user()?
            .map(|u| u.uid)
            .ok_or(CoreError::NotSignedIn)
    }

    /// Ticket of the signed-in user, or `CoreError::NotSignedIn`.
    pub fn current_session(&self) -> Result<SessionTicket, CoreError> {
        match &*self.auth.read().map_err(|_| CoreError::LockPoisoned)? {
            AuthStatus::SignedIn(user) => Ok(SessionTicket {
                uid: user.uid.clone(),
                generation: self.generation.load(Ordering::SeqCst),
            }),
            _ => Err(CoreError::NotSignedIn),
        }
    }

    /// Sign `user` in. Switching from another user (or from nobody) starts a
    /// new session with empty derived state; the same user keeps theirs.
    pub fn sign_in(&self, user: UserIdentity) -> Result<SessionTicket, CoreError> {
        let mut auth = self.auth.write().map_err(|_| CoreError::LockPoisoned)?;
        let same_user = matches!(&*auth, AuthStatus::SignedIn(current) if current.uid == user.uid);
        if !same_user {
            self.clear_derived()?;
            self.generation.fetch_add(1, Ordering::SeqCst);
        }
        let ticket = SessionTicket {
            uid: user.uid.clone(),
            generation: self.generation.load(Ordering::SeqCst),
        };
        *auth = AuthStatus::SignedIn(user);
        Ok(ticket)
    }

    /// Sign out and drop every piece of derived client state.
    pub fn sign_out(&self) -> Result<(), CoreError> {
        let mut auth = self.auth.write().map_err(|_| CoreError::LockPoisoned)?;
        *auth = AuthStatus::SignedOut;
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.clear_derived()?;
        tracing::info!("Signed out, client state cleared");
        Ok(())
    }

    /// Run `apply` only while `ticket` is still the current session.
    ///
    /// Sign-in and sign-out wait for `apply` to finish, so nothing it
    /// writes can outlive the session. `apply` must not read `auth`.
    pub fn with_session<T>(
        &self,
        ticket: &SessionTicket,
        apply: impl FnOnce() -> Result<T, CoreError>,
    ) -> Result<T, CoreError> {
        let auth = self.auth.read().map_err(|_| CoreError::LockPoisoned)?;
        let current = matches!(&*auth, AuthStatus::SignedIn(user) if user.uid == ticket.uid)
            && self.generation.load(Ordering::SeqCst) == ticket.generation;
        if !current {
            return Err(CoreError::SessionChanged);
        }
        apply()
    }

    fn clear_derived(&self) -> Result<(), CoreError> {
        *self.demographics.write().map_err(|_| CoreError::LockPoisoned)? = None;
        *self.session_count.write().map_err(|_| CoreError::LockPoisoned)? = 0;
        *self.last_result.write().map_err(|_| CoreError::LockPoisoned)? = None;
        self.chat.write().map_err(|_| CoreError::LockPoisoned)?.clear();
        Ok(())
    }

    // ── Demographics & session counter ──────────────────────

    pub fn demographics(&self) -> Result<Option<Demographics>, CoreError> {
        Ok(*self.demographics.read().map_err(|_| CoreError::LockPoisoned)?)
    }

    pub fn set_demographics(&self, demographics: Option<Demographics>) -> Result<(), CoreError> {
        *self.demographics.write().map_err(|_| CoreError::LockPoisoned)? = demographics;
        Ok(())
    }

    pub fn session_count(&self) -> Result<u32, CoreError> {
        Ok(*self.session_count.read().map_err(|_| CoreError::LockPoisoned)?)
    }

    pub fn set_session_count(&self, count: u32) -> Result<(), CoreError> {
        *self.session_count.write().map_err(|_| CoreError::LockPoisoned)? = count;
        Ok(())
    }

    // ── Triage result ───────────────────────────────────────

    pub fn last_result(&self) -> Result<Option<TriageResult>, CoreError> {
        Ok(self
            .last_result
            .read()
            .map_err(|_| CoreError::LockPoisoned)?
            .clone())
    }

    pub fn set_result(&self, result: TriageResult) -> Result<(), CoreError> {
        *self.last_result.write().map_err(|_| CoreError::LockPoisoned)? = Some(result);
        Ok(())
    }

    // ── Chat transcript ─────────────────────────────────────

    pub fn chat_transcript(&self) -> Result<Vec<ChatMessage>, CoreError> {
        Ok(self.chat.read().map_err(|_| CoreError::LockPoisoned)?.clone())
    }

    pub fn push_chat(&self, message: ChatMessage) -> Result<(), CoreError> {
        self.chat
            .write()
            .map_err(|_| CoreError::LockPoisoned)?
            .push(message);
        Ok(())
    }

    // ── In-flight submission ────────────────────────────────

    /// Is a triage submission currently in flight?
    pub fn is_submitting(&self) -> bool {
        self.submitting.load(Ordering::SeqCst)
    }

    /// Mark a submission as in flight. Returns `None` if one already is.
    ///
    /// The flag is cleared when the returned guard drops.
    pub fn begin_submission(&self) -> Option<SubmissionGuard<'_>> {
        self.submitting
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| SubmissionGuard { state: self })
    }
}

impl Default for CoreState {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII guard for the in-flight submission flag.
pub struct SubmissionGuard<'a> {
    state: &'a CoreState,
}

impl Drop for SubmissionGuard<'_> {
    fn drop(&mut self) {
        self.state.submitting.store(false, Ordering::SeqCst);
    }
}
