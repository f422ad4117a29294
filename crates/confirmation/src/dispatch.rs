//! Dispatch state of a confirmation.
//!
//! The transitions are pure: the caller reports each attempt's outcome and
//! timing, and the result moves PENDING -> SENT, PENDING -> RETRY -> (SENT |
//! FAILED), or straight to FAILED when no further attempt is allowed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use promise_core::calendar;
use promise_core::{Channel, OrderId};

use crate::confirmation::Confirmation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DispatchStatus {
    /// No attempt made yet
    Pending,
    /// Delivered (terminal)
    Sent,
    /// Last attempt failed, another one is allowed
    Retry,
    /// Attempts exhausted or aborted (terminal)
    Failed,
}

impl DispatchStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, DispatchStatus::Sent | DispatchStatus::Failed)
    }
}

/// Record of one send attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchAttempt {
    pub attempt: u32,
    #[serde(with = "calendar::timestamp")]
    pub started_at: DateTime<Utc>,
    #[serde(with = "calendar::timestamp")]
    pub finished_at: DateTime<Utc>,
    pub success: bool,
    pub error: Option<String>,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchResult {
    pub confirmation_number: String,
    pub order_id: OrderId,
    pub channel: Channel,
    pub status: DispatchStatus,
    /// Attempts actually made.
    pub attempt_count: u32,
    pub history: Vec<DispatchAttempt>,
    #[serde(with = "calendar::timestamp::option")]
    pub sent_at: Option<DateTime<Utc>>,
    pub receipt_confirmed: bool,
    pub notes: Vec<String>,
}

impl DispatchResult {
    pub fn pending(confirmation: &Confirmation, channel: Channel) -> Self {
        Self {
            confirmation_number: confirmation.confirmation_number.clone(),
            order_id: confirmation.order_id.clone(),
            channel,
            status: DispatchStatus::Pending,
            attempt_count: 0,
            history: Vec::new(),
            sent_at: None,
            receipt_confirmed: false,
            notes: Vec::new(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Record a successful attempt.
    pub fn record_success(
        &mut self,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        acknowledged: bool,
    ) {
        self.push_attempt(started_at, finished_at, None);
        self.status = DispatchStatus::Sent;
        self.sent_at = Some(finished_at);
        self.receipt_confirmed = acknowledged;
        self.notes.push(format!(
            "Sent via {} on attempt {}",
            self.channel, self.attempt_count
        ));
    }

    /// Record a failed attempt. `max_attempts` bounds the total number of
    /// attempts, the first one included.
    pub fn record_failure(
        &mut self,
        error: impl Into<String>,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        max_attempts: u32,
    ) {
        let error = error.into();
        self.push_attempt(started_at, finished_at, Some(error.clone()));
        if self.attempt_count < max_attempts {
            self.status = DispatchStatus::Retry;
            self.notes.push(format!(
                "Attempt {} via {} failed: {error}; will retry",
                self.attempt_count, self.channel
            ));
        } else {
            self.status = DispatchStatus::Failed;
            self.notes.push(format!(
                "Attempt {} via {} failed: {error}; giving up",
                self.attempt_count, self.channel
            ));
        }
    }

    /// Abort before the next attempt (batch cancelled or deadline passed).
    pub fn abort(&mut self, reason: impl Into<String>) {
        if self.is_terminal() {
            return;
        }
        self.status = DispatchStatus::Failed;
        self.notes.push(format!(
            "Aborted after {} attempts: {}",
            self.attempt_count,
            reason.into()
        ));
    }

    fn push_attempt(
        &mut self,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        error: Option<String>,
    ) {
        self.attempt_count += 1;
        self.history.push(DispatchAttempt {
            attempt: self.attempt_count,
            started_at,
            finished_at,
            success: error.is_none(),
            error,
            duration_ms: (finished_at - started_at).num_milliseconds().max(0) as u64,
        });
    }
}
