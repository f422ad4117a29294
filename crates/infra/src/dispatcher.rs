//! Confirmation dispatch with bounded retries.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use promise_confirmation::{Confirmation, DispatchResult};
use promise_core::{CancelSignal, Clock, PipelineConfig, Priority};

use crate::retry::RetryPolicy;
use crate::transport::Transport;

const CANCEL_POLL: Duration = Duration::from_millis(10);

/// Sends confirmations over the channel their priority maps to.
///
/// Each confirmation gets at most `max_attempts` sends. The result always ends
/// in a terminal state: SENT, or FAILED once retries are exhausted or the
/// batch is cancelled between attempts.
pub struct Dispatcher {
    config: Arc<PipelineConfig>,
    policy: RetryPolicy,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    pub fn new(config: Arc<PipelineConfig>, clock: Arc<dyn Clock>) -> Self {
        let policy = RetryPolicy::from_config(&config);
        Self {
            config,
            policy,
            clock,
        }
    }

    pub fn dispatch(
        &self,
        confirmation: &Confirmation,
        priority: Priority,
        transport: &dyn Transport,
        cancel: &CancelSignal,
    ) -> DispatchResult {
        let channel = self.config.channel_for(priority);
        let mut result = DispatchResult::pending(confirmation, channel);

        loop {
            if cancel.is_cancelled() {
                result.abort("batch cancelled");
                warn!(
                    confirmation = %result.confirmation_number,
                    attempts = result.attempt_count,
                    "dispatch cancelled"
                );
                return result;
            }

            let started = self.clock.now();
            let outcome = transport.send(confirmation, channel);
            let finished = self.clock.now();

            match outcome {
                Ok(receipt) => {
                    result.record_success(started, finished, receipt.acknowledged);
                    info!(
                        confirmation = %result.confirmation_number,
                        channel = %channel,
                        attempts = result.attempt_count,
                        "confirmation sent"
                    );
                    return result;
                }
                Err(error) => {
                    result.record_failure(error.to_string(), started, finished, self.policy.max_attempts);
                    if result.is_terminal() {
                        warn!(
                            confirmation = %result.confirmation_number,
                            channel = %channel,
                            attempts = result.attempt_count,
                            error = %error,
                            "dispatch failed, retries exhausted"
                        );
                        return result;
                    }
                    let delay = self.policy.delay_for_attempt(result.attempt_count);
                    warn!(
                        confirmation = %result.confirmation_number,
                        attempt = result.attempt_count,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "dispatch attempt failed, retrying"
                    );
                    wait(delay, cancel);
                }
            }
        }
    }
}

// Sleep for `delay`, waking early when the batch is cancelled.
fn wait(delay: Duration, cancel: &CancelSignal) {
    let until = Instant::now() + delay;
    loop {
        let now = Instant::now();
        if now >= until || cancel.is_cancelled() {
            break;
        }
        thread::sleep(CANCEL_POLL.min(until - now));
    }
    debug!(delay_ms = delay.as_millis() as u64, "retry backoff elapsed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{ScriptedTransport, SendReceipt, TransportError};
    use chrono::{NaiveDate, TimeZone, Utc};
    use promise_confirmation::{DispatchStatus, compose};
    use promise_core::{Channel, FixedClock};
    use promise_fulfillment::{Shipment, ShipmentStatus, SplitDecision, SplitReason};
    use promise_sales::OrderLine;

    fn confirmation() -> Confirmation {
        let date = NaiveDate::from_ymd_opt(2026, 11, 2).unwrap();
        let line = OrderLine::new("SO-1", "001", "WIDGET-A", 5, date);
        let decision = SplitDecision {
            order_id: line.order_id.clone(),
            line_id: line.line_id.clone(),
            item: line.item.clone(),
            total_quantity: 5,
            shipments: vec![Shipment {
                quantity: 5,
                ship_date: date,
                delivery_date: date,
                carrier: "UPS".to_string(),
                status: ShipmentStatus::Complete,
            }],
            split_reason: SplitReason::None,
            notes: Vec::new(),
        };
        compose(&[line], &[decision], issued_at()).remove(0)
    }

    fn issued_at() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 9, 30, 0).unwrap()
    }

    fn dispatcher(max_attempts: u32) -> Dispatcher {
        let config = Arc::new(PipelineConfig::default().with_retry(max_attempts, 0));
        Dispatcher::new(config, Arc::new(FixedClock(issued_at())))
    }

    #[test]
    fn first_attempt_success() {
        let transport = ScriptedTransport::always_ok();
        let result = dispatcher(3).dispatch(&confirmation(), Priority::Normal, &transport, &CancelSignal::new());
        assert_eq!(result.status, DispatchStatus::Sent);
        assert_eq!(result.attempt_count, 1);
        assert!(result.receipt_confirmed);
        assert_eq!(result.sent_at, Some(issued_at()));
    }

    #[test]
    fn retries_until_success() {
        let transport = ScriptedTransport::new(
            [
                Err(TransportError::Timeout { timeout_ms: 100 }),
                Err(TransportError::Rejected("busy".into())),
            ],
            Ok(SendReceipt::default()),
        );
        let result = dispatcher(3).dispatch(&confirmation(), Priority::Normal, &transport, &CancelSignal::new());
        assert_eq!(result.status, DispatchStatus::Sent);
        assert_eq!(result.attempt_count, 3);
        assert_eq!(result.history.len(), 3);
        assert!(!result.history[0].success);
        assert!(result.history[2].success);
        assert!(!result.receipt_confirmed);
    }

    #[test]
    fn gives_up_after_max_attempts() {
        let transport = ScriptedTransport::always_failing();
        let result = dispatcher(4).dispatch(&confirmation(), Priority::Normal, &transport, &CancelSignal::new());
        assert_eq!(result.status, DispatchStatus::Failed);
        assert_eq!(result.attempt_count, 4);
        assert_eq!(transport.calls().len(), 4);
        assert!(result.sent_at.is_none());
    }

    #[test]
    fn channel_follows_priority() {
        let transport = ScriptedTransport::always_ok();
        let d = dispatcher(1);
        let signal = CancelSignal::new();
        let urgent = d.dispatch(&confirmation(), Priority::Urgent, &transport, &signal);
        let normal = d.dispatch(&confirmation(), Priority::Normal, &transport, &signal);
        let low = d.dispatch(&confirmation(), Priority::Low, &transport, &signal);
        assert_eq!(urgent.channel, Channel::Api);
        assert_eq!(normal.channel, Channel::Email);
        assert_eq!(low.channel, Channel::Edi);
    }

    #[test]
    fn cancelled_before_first_attempt_sends_nothing() {
        let transport = ScriptedTransport::always_ok();
        let signal = CancelSignal::new();
        signal.cancel();
        let result = dispatcher(3).dispatch(&confirmation(), Priority::Normal, &transport, &signal);
        assert_eq!(result.status, DispatchStatus::Failed);
        assert_eq!(result.attempt_count, 0);
        assert!(transport.calls().is_empty());
    }
}
