//! Preference-aware delivery with a bounded retry queue.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use super::{NotificationEvent, NotificationSink, PreferenceStore};
use crate::config::NotificationSettings;
use crate::error::SinkError;
use crate::store::Clock;

/// A delivery waiting for another attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingDelivery {
    /// Recipient.
    pub user_id: String,
    /// Event kind.
    pub event: NotificationEvent,
    /// Event payload.
    pub payload: serde_json::Value,
    /// Attempts made so far.
    pub attempts: u32,
    /// Earliest time of the next attempt.
    pub next_attempt_at: DateTime<Utc>,
}

/// A FIFO of failed deliveries with a fixed capacity.
///
/// Pushing onto a full queue drops the oldest entry.
#[derive(Debug)]
pub struct RetryQueue {
    capacity: usize,
    entries: VecDeque<PendingDelivery>,
    dropped: u64,
}

impl RetryQueue {
    /// Creates an empty queue. A zero capacity is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
            dropped: 0,
        }
    }

    /// Appends a delivery, evicting the oldest when full.
    pub fn push(&mut self, delivery: PendingDelivery) {
        if self.entries.len() == self.capacity {
            if let Some(evicted) = self.entries.pop_front() {
                self.dropped += 1;
                warn!(
                    user_id = %evicted.user_id,
                    event = %evicted.event,
                    "Retry queue full, dropping oldest notification"
                );
            }
        }
        self.entries.push_back(delivery);
    }

    /// Removes and returns every delivery due at `now`, oldest first.
    pub fn take_due(&mut self, now: DateTime<Utc>) -> Vec<PendingDelivery> {
        let (due, waiting): (VecDeque<_>, VecDeque<_>) = self
            .entries
            .drain(..)
            .partition(|delivery| delivery.next_attempt_at <= now);
        self.entries = waiting;
        due.into()
    }

    /// Number of queued deliveries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of deliveries evicted by overflow.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

/// Counts from one [`NotificationDispatcher::retry_due`] pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RetrySummary {
    /// Deliveries that succeeded.
    pub delivered: usize,
    /// Deliveries that failed and were queued again.
    pub requeued: usize,
    /// Deliveries that ran out of attempts.
    pub abandoned: usize,
}

/// A [`NotificationSink`] that honours user preferences and retries failed
/// deliveries.
///
/// Failures are queued with linear backoff (`attempts * backoff_seconds`)
/// measured against the injected clock, so `notify` itself never fails.
pub struct NotificationDispatcher {
    transport: Arc<dyn NotificationSink>,
    preferences: Arc<dyn PreferenceStore>,
    clock: Arc<dyn Clock>,
    settings: NotificationSettings,
    queue: Mutex<RetryQueue>,
}

impl NotificationDispatcher {
    /// Creates a dispatcher over a transport.
    pub fn new(
        transport: Arc<dyn NotificationSink>,
        preferences: Arc<dyn PreferenceStore>,
        clock: Arc<dyn Clock>,
        settings: NotificationSettings,
    ) -> Self {
        let queue = Mutex::new(RetryQueue::new(settings.retry_capacity));
        Self {
            transport,
            preferences,
            clock,
            settings,
            queue,
        }
    }

    /// Number of deliveries waiting for a retry.
    pub fn pending(&self) -> usize {
        self.queue().len()
    }

    /// Number of deliveries lost to queue overflow.
    pub fn dropped(&self) -> u64 {
        self.queue().dropped()
    }

    /// Retries every queued delivery that is due.
    pub fn retry_due(&self) -> RetrySummary {
        let now = self.clock.now();
        let due = self.queue().take_due(now);
        let mut summary = RetrySummary::default();

        for mut delivery in due {
            match self
                .transport
                .notify(&delivery.user_id, delivery.event, &delivery.payload)
            {
                Ok(()) => summary.delivered += 1,
                Err(e) => {
                    delivery.attempts += 1;
                    if delivery.attempts >= self.settings.max_attempts {
                        warn!(
                            user_id = %delivery.user_id,
                            event = %delivery.event,
                            attempts = delivery.attempts,
                            error = %e,
                            "Abandoning notification"
                        );
                        summary.abandoned += 1;
                    } else {
                        delivery.next_attempt_at = self.next_attempt(now, delivery.attempts);
                        self.queue().push(delivery);
                        summary.requeued += 1;
                    }
                }
            }
        }

        if summary != RetrySummary::default() {
            info!(
                delivered = summary.delivered,
                requeued = summary.requeued,
                abandoned = summary.abandoned,
                "Notification retry pass finished"
            );
        }
        summary
    }

    /// Saturates at the latest representable instant.
    fn next_attempt(&self, now: DateTime<Utc>, attempts: u32) -> DateTime<Utc> {
        self.settings
            .backoff_seconds
            .checked_mul(i64::from(attempts))
            .and_then(Duration::try_seconds)
            .and_then(|backoff| now.checked_add_signed(backoff))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    fn queue(&self) -> std::sync::MutexGuard<'_, RetryQueue> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl NotificationSink for NotificationDispatcher {
    fn notify(
        &self,
        user_id: &str,
        event: NotificationEvent,
        payload: &serde_json::Value,
    ) -> Result<(), SinkError> {
        if !self.preferences.is_enabled(user_id, event) {
            debug!(user_id = %user_id, event = %event, "Notification suppressed by preference");
            return Ok(());
        }

        if let Err(e) = self.transport.notify(user_id, event, payload) {
            if self.settings.max_attempts <= 1 {
                return Err(e);
            }
            warn!(user_id = %user_id, event = %event, error = %e, "Queueing notification for retry");
            self.queue().push(PendingDelivery {
                user_id: user_id.to_string(),
                event,
                payload: payload.clone(),
                attempts: 1,
                next_attempt_at: self.next_attempt(self.clock.now(), 1),
            });
        }
        Ok(())
    }
}
