//! Confirmation transport seam (email gateway, customer API, EDI).

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use thiserror::Error;

use promise_confirmation::Confirmation;
use promise_core::Channel;

/// Outcome of a successful send.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendReceipt {
    /// The receiving side confirmed receipt.
    pub acknowledged: bool,
    /// Carrier/gateway message reference, when one is returned.
    pub reference: Option<String>,
}

impl SendReceipt {
    pub fn acknowledged() -> Self {
        Self {
            acknowledged: true,
            reference: None,
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("channel {0} unavailable")]
    Unavailable(Channel),

    #[error("message rejected: {0}")]
    Rejected(String),

    #[error("send timed out after {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },
}

/// Sends a confirmation over a channel. Each call is one attempt; retries are
/// the dispatcher's business.
pub trait Transport: Send + Sync {
    fn send(&self, confirmation: &Confirmation, channel: Channel)
    -> Result<SendReceipt, TransportError>;
}

impl<T> Transport for Arc<T>
where
    T: Transport + ?Sized,
{
    fn send(
        &self,
        confirmation: &Confirmation,
        channel: Channel,
    ) -> Result<SendReceipt, TransportError> {
        (**self).send(confirmation, channel)
    }
}

/// Transport test double with scripted outcomes.
///
/// Outcomes are consumed in call order; once the script runs out every call
/// gets the fallback outcome. Every call is recorded.
#[derive(Debug)]
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Result<SendReceipt, TransportError>>>,
    fallback: Result<SendReceipt, TransportError>,
    calls: Mutex<Vec<(String, Channel)>>,
}

impl ScriptedTransport {
    pub fn new(
        script: impl IntoIterator<Item = Result<SendReceipt, TransportError>>,
        fallback: Result<SendReceipt, TransportError>,
    ) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            fallback,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn always_ok() -> Self {
        Self::new([], Ok(SendReceipt::acknowledged()))
    }

    pub fn always_failing() -> Self {
        Self::new([], Err(TransportError::Rejected("gateway down".to_string())))
    }

    /// `(confirmation number, channel)` for every call, in order.
    pub fn calls(&self) -> Vec<(String, Channel)> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

impl Transport for ScriptedTransport {
    fn send(
        &self,
        confirmation: &Confirmation,
        channel: Channel,
    ) -> Result<SendReceipt, TransportError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((confirmation.confirmation_number.clone(), channel));
        }
        let next = self.script.lock().ok().and_then(|mut s| s.pop_front());
        next.unwrap_or_else(|| self.fallback.clone())
    }
}
