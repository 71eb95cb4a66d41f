//! Notification events, sinks and per-user preferences.
//!
//! The engine treats delivery as fire-and-forget: a failed notification is
//! logged and reported as a warning on the operation's outcome, never as an
//! error. [`NotificationDispatcher`] layers user preferences and a bounded
//! retry queue over any transport.

mod dispatcher;

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::SinkError;

pub use dispatcher::{NotificationDispatcher, PendingDelivery, RetryQueue, RetrySummary};

/// What a notification is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationEvent {
    /// A request is waiting on the recipient's decision.
    ApprovalRequested,
    /// The recipient's request was fully approved.
    RequestApproved,
    /// The recipient's request was rejected.
    RequestRejected,
    /// A request the recipient was approving was cancelled.
    RequestCancelled,
    /// A comp-off work log is waiting on the recipient's verification.
    WorkLogSubmitted,
    /// The recipient's work log was verified and credited.
    WorkLogVerified,
    /// The recipient's work log was rejected.
    WorkLogRejected,
}

impl NotificationEvent {
    /// The event's wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationEvent::ApprovalRequested => "approval_requested",
            NotificationEvent::RequestApproved => "request_approved",
            NotificationEvent::RequestRejected => "request_rejected",
            NotificationEvent::RequestCancelled => "request_cancelled",
            NotificationEvent::WorkLogSubmitted => "work_log_submitted",
            NotificationEvent::WorkLogVerified => "work_log_verified",
            NotificationEvent::WorkLogRejected => "work_log_rejected",
        }
    }
}

impl fmt::Display for NotificationEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Delivers notifications to users.
pub trait NotificationSink: Send + Sync {
    /// Delivers one notification.
    fn notify(
        &self,
        user_id: &str,
        event: NotificationEvent,
        payload: &serde_json::Value,
    ) -> Result<(), SinkError>;
}

/// Sends a notification, downgrading a failure to a warning.
pub fn notify_best_effort(
    sink: &dyn NotificationSink,
    user_id: &str,
    event: NotificationEvent,
    payload: &serde_json::Value,
    warnings: &mut Vec<String>,
) {
    if let Err(e) = sink.notify(user_id, event, payload) {
        warn!(user_id = %user_id, event = %event, error = %e, "Notification not delivered");
        warnings.push(format!("{} notification to '{}' failed: {}", event, user_id, e));
    }
}

/// Per-user notification preferences.
pub trait PreferenceStore: Send + Sync {
    /// Returns true if the user wants this kind of notification.
    fn is_enabled(&self, user_id: &str, event: NotificationEvent) -> bool;
}

/// Preferences held in memory; everything is enabled unless opted out.
#[derive(Debug, Default)]
pub struct InMemoryPreferences {
    disabled: Mutex<HashMap<String, HashSet<NotificationEvent>>>,
}

impl InMemoryPreferences {
    /// Creates preferences with everything enabled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Opts a user out of an event.
    pub fn disable(&self, user_id: &str, event: NotificationEvent) {
        self.disabled
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(user_id.to_string())
            .or_default()
            .insert(event);
    }

    /// Opts a user back in to an event.
    pub fn enable(&self, user_id: &str, event: NotificationEvent) {
        if let Some(events) = self
            .disabled
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(user_id)
        {
            events.remove(&event);
        }
    }
}

impl PreferenceStore for InMemoryPreferences {
    fn is_enabled(&self, user_id: &str, event: NotificationEvent) -> bool {
        !self
            .disabled
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(user_id)
            .is_some_and(|events| events.contains(&event))
    }
}

/// A delivered notification captured by [`RecordingNotifier`].
#[derive(Debug, Clone, PartialEq)]
pub struct SentNotification {
    /// Recipient.
    pub user_id: String,
    /// Event kind.
    pub event: NotificationEvent,
    /// Event payload.
    pub payload: serde_json::Value,
}

/// A sink that records deliveries in memory and can be made to fail.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<SentNotification>>,
    failing: AtomicBool,
}

impl RecordingNotifier {
    /// Creates a notifier with nothing sent.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every delivered notification, in order.
    pub fn sent(&self) -> Vec<SentNotification> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Deliveries to one user.
    pub fn sent_to(&self, user_id: &str) -> Vec<SentNotification> {
        self.sent()
            .into_iter()
            .filter(|n| n.user_id == user_id)
            .collect()
    }

    /// Makes subsequent deliveries fail until switched back.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl NotificationSink for RecordingNotifier {
    fn notify(
        &self,
        user_id: &str,
        event: NotificationEvent,
        payload: &serde_json::Value,
    ) -> Result<(), SinkError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SinkError::new("notification", "transport unavailable"));
        }
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(SentNotification {
                user_id: user_id.to_string(),
                event,
                payload: payload.clone(),
            });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_failed_delivery_becomes_warning() {
        let notifier = RecordingNotifier::new();
        notifier.set_failing(true);
        let mut warnings = Vec::new();

        notify_best_effort(
            &notifier,
            "mgr_001",
            NotificationEvent::ApprovalRequested,
            &json!({}),
            &mut warnings,
        );

        assert!(notifier.sent().is_empty());
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].starts_with("approval_requested notification to 'mgr_001'"));
    }

    #[test]
    fn test_preferences_default_to_enabled() {
        let preferences = InMemoryPreferences::new();
        assert!(preferences.is_enabled("emp_001", NotificationEvent::RequestApproved));

        preferences.disable("emp_001", NotificationEvent::RequestApproved);
        assert!(!preferences.is_enabled("emp_001", NotificationEvent::RequestApproved));
        assert!(preferences.is_enabled("emp_001", NotificationEvent::RequestRejected));

        preferences.enable("emp_001", NotificationEvent::RequestApproved);
        assert!(preferences.is_enabled("emp_001", NotificationEvent::RequestApproved));
    }

    #[test]
    fn test_event_serde_name_matches_display() {
        let json = serde_json::to_string(&NotificationEvent::WorkLogVerified).unwrap();
        assert_eq!(json, "\"work_log_verified\"");
    }
}
