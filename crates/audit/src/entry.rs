use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use uuid::Uuid;

use promise_confirmation::{Confirmation, DispatchResult};
use promise_core::calendar;
use promise_core::{ItemCode, LineKey, OrderId};
use promise_fulfillment::{AtpResult, ScheduleResult, SplitDecision};
use promise_sales::OrderLine;

/// Pipeline stage an entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    Ingestion,
    SupplyFetch,
    Availability,
    Scheduling,
    Split,
    Composition,
    Dispatch,
    Batch,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Ingestion => "INGESTION",
            Stage::SupplyFetch => "SUPPLY_FETCH",
            Stage::Availability => "AVAILABILITY",
            Stage::Scheduling => "SCHEDULING",
            Stage::Split => "SPLIT",
            Stage::Composition => "COMPOSITION",
            Stage::Dispatch => "DISPATCH",
            Stage::Batch => "BATCH",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuditStatus {
    Success,
    Failure,
    Cancelled,
}

/// Counts reported at the end of a stage or batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageSummary {
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Everything that can be captured as an entry's input or output.
///
/// The set is closed: each variant has a fixed JSON shape
/// `{"kind": ..., "data": ...}`, with dates as `YYYY-MM-DD` and timestamps in
/// the fixed audit format.
#[derive(Debug, Clone, Copy)]
pub enum AuditSnapshot<'a> {
    None,
    OrderLine(&'a OrderLine),
    Line(&'a LineKey),
    Items(&'a [ItemCode]),
    Atp(&'a AtpResult),
    Schedule(&'a ScheduleResult),
    Split(&'a SplitDecision),
    Splits(&'a [SplitDecision]),
    Confirmation(&'a Confirmation),
    Dispatch(&'a DispatchResult),
    Error(&'a str),
    Summary(StageSummary),
}

impl AuditSnapshot<'_> {
    pub fn kind(&self) -> &'static str {
        match self {
            AuditSnapshot::None => "none",
            AuditSnapshot::OrderLine(_) => "order_line",
            AuditSnapshot::Line(_) => "line",
            AuditSnapshot::Items(_) => "items",
            AuditSnapshot::Atp(_) => "atp_result",
            AuditSnapshot::Schedule(_) => "schedule",
            AuditSnapshot::Split(_) => "split_decision",
            AuditSnapshot::Splits(_) => "split_decisions",
            AuditSnapshot::Confirmation(_) => "confirmation",
            AuditSnapshot::Dispatch(_) => "dispatch_result",
            AuditSnapshot::Error(_) => "error",
            AuditSnapshot::Summary(_) => "summary",
        }
    }

    /// Copy the snapshot into an owned JSON value.
    pub fn to_value(&self) -> serde_json::Result<Value> {
        let data = match self {
            AuditSnapshot::None => return Ok(Value::Null),
            AuditSnapshot::OrderLine(line) => serde_json::to_value(line)?,
            AuditSnapshot::Line(key) => serde_json::to_value(key)?,
            AuditSnapshot::Items(items) => serde_json::to_value(items)?,
            AuditSnapshot::Atp(atp) => serde_json::to_value(atp)?,
            AuditSnapshot::Schedule(schedule) => serde_json::to_value(schedule)?,
            AuditSnapshot::Split(decision) => serde_json::to_value(decision)?,
            AuditSnapshot::Splits(decisions) => serde_json::to_value(decisions)?,
            AuditSnapshot::Confirmation(confirmation) => serde_json::to_value(confirmation)?,
            AuditSnapshot::Dispatch(result) => serde_json::to_value(result)?,
            AuditSnapshot::Error(message) => Value::String((*message).to_string()),
            AuditSnapshot::Summary(summary) => serde_json::to_value(summary)?,
        };
        Ok(json!({ "kind": self.kind(), "data": data }))
    }
}

/// An entry waiting to be appended.
#[derive(Debug, Clone)]
pub struct AuditRecord<'a> {
    pub order_id: Option<&'a OrderId>,
    pub stage: Stage,
    pub action: String,
    pub input: AuditSnapshot<'a>,
    pub output: AuditSnapshot<'a>,
    pub status: AuditStatus,
    pub duration_ms: u64,
}

impl<'a> AuditRecord<'a> {
    pub fn new(stage: Stage, action: impl Into<String>) -> Self {
        Self {
            order_id: None,
            stage,
            action: action.into(),
            input: AuditSnapshot::None,
            output: AuditSnapshot::None,
            status: AuditStatus::Success,
            duration_ms: 0,
        }
    }

    pub fn order(mut self, order_id: &'a OrderId) -> Self {
        self.order_id = Some(order_id);
        self
    }

    pub fn input(mut self, snapshot: AuditSnapshot<'a>) -> Self {
        self.input = snapshot;
        self
    }

    pub fn output(mut self, snapshot: AuditSnapshot<'a>) -> Self {
        self.output = snapshot;
        self
    }

    pub fn status(mut self, status: AuditStatus) -> Self {
        self.status = status;
        self
    }

    pub fn elapsed(mut self, elapsed: Duration) -> Self {
        self.duration_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        self
    }
}

/// Immutable ledger entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    /// Strictly increasing within a ledger, starting at 1.
    pub sequence: u64,
    pub entry_id: Uuid,
    #[serde(with = "calendar::timestamp")]
    pub recorded_at: DateTime<Utc>,
    pub order_id: Option<OrderId>,
    pub stage: Stage,
    pub action: String,
    pub input: Value,
    pub output: Value,
    pub status: AuditStatus,
    pub duration_ms: u64,
}
