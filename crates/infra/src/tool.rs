//! JSON tool adapter.
//!
//! Translates JSON requests into pipeline calls and returns JSON summaries.
//! Holds no pipeline logic of its own.

use std::time::Duration;

use anyhow::Context;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use promise_audit::Stage;
use promise_confirmation::DispatchStatus;
use promise_core::{CancelSignal, Channel, LineId, OrderId};
use promise_fulfillment::AtpResult;
use promise_sales::OrderLine;

use crate::pipeline::{BatchReport, OrderPipeline};

#[derive(Debug, Deserialize)]
struct LinesRequest {
    order_lines: Vec<OrderLine>,
    /// Time budget for the whole batch.
    #[serde(default)]
    deadline_ms: Option<u64>,
}

impl LinesRequest {
    fn parse(raw: &str) -> anyhow::Result<Self> {
        serde_json::from_str(raw).context("request must be {\"order_lines\": [...]}")
    }

    fn cancel_signal(&self) -> CancelSignal {
        match self.deadline_ms {
            Some(ms) => CancelSignal::with_deadline(Duration::from_millis(ms)),
            None => CancelSignal::new(),
        }
    }
}

#[derive(Debug, Serialize)]
struct FailureView {
    order_id: OrderId,
    line_id: LineId,
    stage: Stage,
    error: String,
}

#[derive(Debug, Serialize)]
struct AvailabilityResponse<'a> {
    results: &'a [AtpResult],
    failures: Vec<FailureView>,
}

#[derive(Debug, Serialize)]
struct ConfirmationView {
    order_id: OrderId,
    confirmation_number: String,
    total_lines: usize,
    total_shipments: usize,
    final_delivery_date: Option<NaiveDate>,
    channel: Option<Channel>,
    dispatch_status: Option<DispatchStatus>,
    attempts: u32,
}

#[derive(Debug, Serialize)]
struct ConfirmResponse {
    confirmations: Vec<ConfirmationView>,
    failures: Vec<FailureView>,
}

fn failures(report: &BatchReport) -> Vec<FailureView> {
    report
        .failures
        .iter()
        .map(|f| FailureView {
            order_id: f.key.order_id.clone(),
            line_id: f.key.line_id.clone(),
            stage: f.stage,
            error: f.error.to_string(),
        })
        .collect()
}

/// `{"order_lines": [...]}` → ATP results and per-line failures.
pub fn check_availability(pipeline: &OrderPipeline, request: &str) -> anyhow::Result<String> {
    let request = LinesRequest::parse(request)?;
    let cancel = request.cancel_signal();
    let report = pipeline.check_availability(request.order_lines, &cancel);

    let response = AvailabilityResponse {
        results: &report.atp_results,
        failures: failures(&report),
    };
    serde_json::to_string_pretty(&response).context("could not encode availability response")
}

/// `{"order_lines": [...]}` → one entry per confirmation with its dispatch
/// outcome, plus per-line failures.
pub fn confirm_orders(pipeline: &OrderPipeline, request: &str) -> anyhow::Result<String> {
    let request = LinesRequest::parse(request)?;
    let cancel = request.cancel_signal();
    let report = pipeline.run(request.order_lines, &cancel);

    let confirmations = report
        .confirmations
        .iter()
        .map(|c| {
            let dispatch = report.dispatch_for(&c.order_id);
            ConfirmationView {
                order_id: c.order_id.clone(),
                confirmation_number: c.confirmation_number.clone(),
                total_lines: c.total_lines,
                total_shipments: c.total_shipments,
                final_delivery_date: c.final_delivery_date(),
                channel: dispatch.map(|d| d.channel),
                dispatch_status: dispatch.map(|d| d.status),
                attempts: dispatch.map_or(0, |d| d.attempt_count),
            }
        })
        .collect();

    let response = ConfirmResponse {
        confirmations,
        failures: failures(&report),
    };
    serde_json::to_string_pretty(&response).context("could not encode confirmation response")
}

/// The pipeline's audit ledger as JSON.
pub fn export_audit_log(pipeline: &OrderPipeline) -> anyhow::Result<String> {
    pipeline
        .ledger()
        .export()
        .context("could not export audit ledger")
}
