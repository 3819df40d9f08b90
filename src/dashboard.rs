//! Live triage history dashboard.
//!
//! A mounted `DashboardFeed` holds two store listeners for one user: the
//! history list and the profile document (for the session counter). Both
//! are torn down together, exactly once.

use std::sync::{Arc, RwLock};

use serde::Serialize;

use crate::core_state::{CoreError, CoreState, SessionTicket};
use crate::models::history::sort_newest_first;
use crate::models::{HistoryEntry, UserProfile};
use crate::result_view::{clamp_urgency, RiskTone, UrgencyBand};
use crate::store::{DocumentStore, StoreError};
use crate::subscription::Subscription;

/// Guidance shown instead of an empty timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmptyState {
    pub title: &'static str,
    pub message: &'static str,
    pub call_to_action: &'static str,
}

pub const EMPTY_HISTORY: EmptyState = EmptyState {
    title: "No triage history yet",
    message: "Your assessments will appear here after your first symptom check.",
    call_to_action: "Start a new triage",
};

/// One timeline row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineItem {
    #[serde(flatten)]
    pub entry: HistoryEntry,
    pub tone: RiskTone,
    pub urgency_band: UrgencyBand,
}

impl TimelineItem {
    fn from_entry(entry: HistoryEntry) -> Self {
        Self {
            tone: RiskTone::for_label(&entry.risk_level),
            urgency_band: UrgencyBand::for_score(clamp_urgency(entry.urgency_score)),
            entry,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardView {
    /// No history snapshot delivered yet.
    pub loading: bool,
    pub session_count: u32,
    pub entries: Vec<TimelineItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub empty_state: Option<EmptyState>,
}

/// Build the view from the latest snapshots. Entries are ordered newest
/// first regardless of delivery order.
pub fn build_view(history: Option<&[HistoryEntry]>, session_count: u32) -> DashboardView {
    let Some(history) = history else {
        return DashboardView {
            loading: true,
            session_count,
            entries: Vec::new(),
            empty_state: None,
        };
    };

    let mut entries = history.to_vec();
    sort_newest_first(&mut entries);
    let empty_state = entries.is_empty().then_some(EMPTY_HISTORY);
    DashboardView {
        loading: false,
        session_count,
        entries: entries.into_iter().map(TimelineItem::from_entry).collect(),
        empty_state,
    }
}

#[derive(Default)]
struct Snapshot {
    history: Option<Vec<HistoryEntry>>,
    session_count: u32,
}

/// Mounted dashboard for one session.
pub struct DashboardFeed {
    ticket: SessionTicket,
    snapshot: Arc<RwLock<Snapshot>>,
    history_sub: Subscription,
    profile_sub: Subscription,
}

impl DashboardFeed {
    /// Subscribe to the history and profile of `ticket`'s user. Session
    /// counter changes are mirrored into `state` while the session lasts.
    pub fn mount(
        store: &Arc<dyn DocumentStore>,
        state: Arc<CoreState>,
        ticket: SessionTicket,
    ) -> Result<Self, StoreError> {
        let uid = ticket.uid.as_str();
        let history_rx = store.watch_history(uid)?;
        let profile_rx = store.watch_profile(uid)?;
        let snapshot = Arc::new(RwLock::new(Snapshot::default()));

        let sink = Arc::clone(&snapshot);
        let history_sub = Subscription::listen("dashboard_history", history_rx, move |entries: Vec<HistoryEntry>| {
            if let Ok(mut snap) = sink.write() {
                snap.history = Some(entries);
            }
        });

        let sink = Arc::clone(&snapshot);
        let session = ticket.clone();
        let profile_sub = Subscription::listen("dashboard_profile", profile_rx, move |profile: UserProfile| {
            if let Ok(mut snap) = sink.write() {
                snap.session_count = profile.session_count;
            }
            // The store's counter wins over the locally restored one.
            if profile.session_count > 0 {
                match state.with_session(&session, || state.set_session_count(profile.session_count)) {
                    Ok(()) => {}
                    Err(CoreError::SessionChanged) => {
                        tracing::debug!("Session ended, session count not mirrored");
                    }
                    Err(e) => tracing::warn!(error = %e, "Could not mirror session count"),
                }
            }
        });

        tracing::info!(uid, "Dashboard mounted");
        Ok(Self {
            ticket,
            snapshot,
            history_sub,
            profile_sub,
        })
    }

    pub fn uid(&self) -> &str {
        &self.ticket.uid
    }

    pub fn ticket(&self) -> &SessionTicket {
        &self.ticket
    }

    pub fn is_active(&self) -> bool {
        self.history_sub.is_active() && self.profile_sub.is_active()
    }

    pub fn view(&self) -> Result<DashboardView, CoreError> {
        let snap = self.snapshot.read().map_err(|_| CoreError::LockPoisoned)?;
        Ok(build_view(snap.history.as_deref(), snap.session_count))
    }

    /// Unsubscribe both listeners. Returns `true` only on the first call.
    pub fn teardown(&mut self) -> bool {
        let history = self.history_sub.unsubscribe();
        let profile = self.profile_sub.unsubscribe();
        if history || profile {
            tracing::info!(uid = %self.ticket.uid, "Dashboard torn down");
        }
        history || profile
    }
}
