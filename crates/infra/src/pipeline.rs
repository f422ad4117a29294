//! Batch orchestration.
//!
//! `OrderPipeline` drives a batch of order lines through ingestion, supply
//! fetch, availability, scheduling, split planning, composition and dispatch.
//! Stages run in strict order; inside a stage, lines (or orders) run on the
//! bounded worker pool and are joined back by `LineKey`. A line that fails a
//! stage is reported once and skipped by every later stage; the rest of the
//! batch carries on.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, error, info, warn};

use promise_audit::{
    AuditLedger, AuditRecord, AuditSnapshot, AuditStatus, InMemoryAuditLedger, Stage, StageSummary,
};
use promise_confirmation::{Confirmation, DispatchResult, DispatchStatus, compose_order};
use promise_core::{
    CancelSignal, Clock, DomainError, DomainResult, ItemCode, LineKey, OrderId, PipelineConfig,
    Priority, SystemClock, config::MAX_PLANNING_DAYS,
};
use promise_fulfillment::{
    AtpResult, AvailabilityEngine, DeliveryScheduler, LineRng, ScheduleResult, SplitDecision,
    SplitPlanner, SupplyReservations, SupplySnapshot,
};
use promise_inventory::InventorySnapshot;
use promise_purchasing::PurchaseOrder;
use promise_sales::{CustomerRef, OrderLine, group_by_order, validate_batch};

use crate::dispatcher::Dispatcher;
use crate::pool::map_bounded;
use crate::provider::{DataError, DataProvider, fetch_with_timeout};
use crate::transport::Transport;

/// Why a line left the batch early.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LineError {
    #[error("rejected at ingestion: {0}")]
    Validation(DomainError),

    #[error("supply data unavailable: {0}")]
    DataUnavailable(DataError),

    /// A fulfillment stage broke a domain rule or met an inconsistent
    /// configuration for this line.
    #[error("{0}")]
    Invariant(DomainError),

    #[error("audit write failed: {0}")]
    Audit(String),

    #[error("cancelled before completion")]
    Cancelled,
}

impl LineError {
    fn audit_status(&self) -> AuditStatus {
        match self {
            LineError::Cancelled => AuditStatus::Cancelled,
            _ => AuditStatus::Failure,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LineFailure {
    pub key: LineKey,
    /// Stage the line failed in.
    pub stage: Stage,
    pub error: LineError,
}

/// Everything a batch produced.
///
/// Per-line results keep input order. A line cancelled at composition keeps
/// its ATP, schedule and split results but gets no confirmation.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub atp_results: Vec<AtpResult>,
    pub schedules: Vec<ScheduleResult>,
    pub split_decisions: Vec<SplitDecision>,
    pub confirmations: Vec<Confirmation>,
    pub dispatches: Vec<DispatchResult>,
    pub failures: Vec<LineFailure>,
}

impl BatchReport {
    pub fn failure_for(&self, key: &LineKey) -> Option<&LineError> {
        self.failures.iter().find(|f| &f.key == key).map(|f| &f.error)
    }

    pub fn atp_for(&self, key: &LineKey) -> Option<&AtpResult> {
        self.atp_results.iter().find(|r| &r.key() == key)
    }

    pub fn split_for(&self, key: &LineKey) -> Option<&SplitDecision> {
        self.split_decisions.iter().find(|d| &d.key() == key)
    }

    pub fn confirmation_for(&self, order_id: &OrderId) -> Option<&Confirmation> {
        self.confirmations.iter().find(|c| &c.order_id == order_id)
    }

    pub fn dispatch_for(&self, order_id: &OrderId) -> Option<&DispatchResult> {
        self.dispatches.iter().find(|d| &d.order_id == order_id)
    }

    /// Dispatches that ended SENT.
    pub fn sent(&self) -> usize {
        self.dispatches
            .iter()
            .filter(|d| d.status == DispatchStatus::Sent)
            .count()
    }
}

#[derive(Debug, Default)]
struct ItemSupply {
    inventory: Vec<InventorySnapshot>,
    purchase_orders: Vec<PurchaseOrder>,
    lead_time: Option<u32>,
}

/// Customer and priority of an order, taken from its first submitted line
/// whether or not that line survives the batch.
#[derive(Debug, Clone)]
struct OrderHead {
    customer: CustomerRef,
    priority: Priority,
}

impl OrderHead {
    fn of(lines: &[OrderLine]) -> HashMap<OrderId, OrderHead> {
        let mut heads = HashMap::new();
        for line in lines {
            heads.entry(line.order_id.clone()).or_insert_with(|| OrderHead {
                customer: line.customer.clone(),
                priority: line.priority,
            });
        }
        heads
    }
}

pub struct OrderPipeline {
    config: Arc<PipelineConfig>,
    provider: Arc<dyn DataProvider>,
    transport: Arc<dyn Transport>,
    ledger: Arc<dyn AuditLedger>,
    clock: Arc<dyn Clock>,
    engine: AvailabilityEngine,
    scheduler: DeliveryScheduler,
    planner: SplitPlanner,
    dispatcher: Dispatcher,
}

impl std::fmt::Debug for OrderPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderPipeline")
            .field("config", &self.config)
            .field("dispatcher", &self.dispatcher)
            .finish_non_exhaustive()
    }
}

impl OrderPipeline {
    /// Build a pipeline over the given collaborators.
    ///
    /// Uses an in-memory ledger and the system clock until replaced.
    pub fn new(
        config: PipelineConfig,
        provider: Arc<dyn DataProvider>,
        transport: Arc<dyn Transport>,
    ) -> DomainResult<Self> {
        config.validate()?;
        let config = Arc::new(config);
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        Ok(Self {
            engine: AvailabilityEngine::new(Arc::clone(&config)),
            scheduler: DeliveryScheduler::new(Arc::clone(&config)),
            planner: SplitPlanner::new(Arc::clone(&config)),
            dispatcher: Dispatcher::new(Arc::clone(&config), Arc::clone(&clock)),
            ledger: Arc::new(InMemoryAuditLedger::new()),
            provider,
            transport,
            clock,
            config,
        })
    }

    pub fn with_ledger(mut self, ledger: Arc<dyn AuditLedger>) -> Self {
        self.ledger = ledger;
        self
    }

    /// Replace the clock used for "today" and for confirmation and dispatch
    /// timestamps.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.dispatcher = Dispatcher::new(Arc::clone(&self.config), Arc::clone(&clock));
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn ledger(&self) -> &Arc<dyn AuditLedger> {
        &self.ledger
    }

    /// Run a batch through every stage.
    pub fn run(&self, lines: Vec<OrderLine>, cancel: &CancelSignal) -> BatchReport {
        let started = Instant::now();
        let submitted = lines.len();
        let mut report = BatchReport::default();
        info!(lines = submitted, "batch started");

        let heads = OrderHead::of(&lines);
        let promised = self.promise(lines, cancel, &mut report);
        let scheduled = self.schedule_stage(&promised, cancel, &mut report);
        let decided = self.split_stage(scheduled, cancel, &mut report);
        let priorities = self.compose_stage(&decided, &heads, cancel, &mut report);
        report.dispatches = self.dispatch_stage(&report.confirmations, &priorities, cancel);

        self.finish(submitted, started, cancel, &report);
        report
    }

    /// Ingest, fetch supply and compute ATP, then stop.
    pub fn check_availability(&self, lines: Vec<OrderLine>, cancel: &CancelSignal) -> BatchReport {
        let started = Instant::now();
        let submitted = lines.len();
        let mut report = BatchReport::default();
        info!(lines = submitted, "availability check started");

        self.promise(lines, cancel, &mut report);

        self.finish(submitted, started, cancel, &report);
        report
    }

    fn workers(&self) -> usize {
        self.config.worker_threads.max(1)
    }

    fn promise(
        &self,
        lines: Vec<OrderLine>,
        cancel: &CancelSignal,
        report: &mut BatchReport,
    ) -> Vec<(OrderLine, AtpResult)> {
        let accepted = self.ingest(lines, report);
        let (ready, snapshot) = self.fetch_supply(accepted, cancel, report);
        self.availability_stage(ready, &snapshot, cancel, report)
    }

    fn ingest(&self, lines: Vec<OrderLine>, report: &mut BatchReport) -> Vec<OrderLine> {
        let started = Instant::now();
        let submitted = lines.len();
        let (accepted, rejected) = validate_batch(lines);

        for (key, error) in rejected {
            self.fail(report, key, Stage::Ingestion, LineError::Validation(error));
        }

        let mut admitted = Vec::with_capacity(accepted.len());
        for line in accepted {
            let recorded = self.record_line(
                &line.order_id,
                Stage::Ingestion,
                "accept_line",
                AuditSnapshot::OrderLine(&line),
                AuditSnapshot::None,
                Duration::ZERO,
            );
            match recorded {
                Ok(()) => admitted.push(line),
                Err(error) => self.fail(report, line.key(), Stage::Ingestion, error),
            }
        }

        self.stage_done(
            Stage::Ingestion,
            summary(submitted, admitted.len()),
            started,
        );
        admitted
    }

    fn fetch_supply(
        &self,
        lines: Vec<OrderLine>,
        cancel: &CancelSignal,
        report: &mut BatchReport,
    ) -> (Vec<OrderLine>, SupplySnapshot) {
        let started = Instant::now();
        let items: Vec<ItemCode> = {
            let mut seen = HashSet::new();
            lines
                .iter()
                .filter(|line| seen.insert(&line.item))
                .map(|line| line.item.clone())
                .collect()
        };

        let fetched = map_bounded(&items, self.workers(), |item| {
            if cancel.is_cancelled() {
                return Err(LineError::Cancelled);
            }
            let item_started = Instant::now();
            let supply = self.fetch_item(item).map_err(LineError::DataUnavailable)?;
            debug!(
                item = %item,
                inventory_rows = supply.inventory.len(),
                purchase_orders = supply.purchase_orders.len(),
                lead_time = ?supply.lead_time,
                "supply fetched"
            );
            self.record(
                AuditRecord::new(Stage::SupplyFetch, "fetch_supply")
                    .input(AuditSnapshot::Items(std::slice::from_ref(item)))
                    .elapsed(item_started.elapsed()),
            )?;
            Ok(supply)
        });

        let fetched_items = items.len();
        let mut snapshot = SupplySnapshot::new(self.clock.today());
        let mut failed: HashMap<ItemCode, LineError> = HashMap::new();
        for (item, outcome) in items.into_iter().zip(fetched) {
            match outcome {
                Ok(supply) => {
                    snapshot.inventory.extend(supply.inventory);
                    snapshot.purchase_orders.extend(supply.purchase_orders);
                    if let Some(days) = supply.lead_time {
                        snapshot.lead_times.insert(item, days);
                    }
                }
                Err(error) => {
                    if error != LineError::Cancelled {
                        warn!(item = %item, error = %error, "supply fetch failed");
                    }
                    failed.insert(item, error);
                }
            }
        }

        let mut ready = Vec::with_capacity(lines.len());
        for line in lines {
            match failed.get(&line.item) {
                Some(error) => self.fail(report, line.key(), Stage::SupplyFetch, error.clone()),
                None => ready.push(line),
            }
        }

        self.stage_done(
            Stage::SupplyFetch,
            summary(fetched_items, fetched_items - failed.len()),
            started,
        );
        (ready, snapshot)
    }

    fn fetch_item(&self, item: &ItemCode) -> Result<ItemSupply, DataError> {
        let timeout = Duration::from_millis(self.config.fetch_timeout_ms);

        let provider = Arc::clone(&self.provider);
        let query = vec![item.clone()];
        let inventory = fetch_with_timeout("fetch_inventory", timeout, move || {
            provider.fetch_inventory(&query)
        })?;

        let provider = Arc::clone(&self.provider);
        let query = vec![item.clone()];
        let purchase_orders = fetch_with_timeout("fetch_open_purchase_orders", timeout, move || {
            provider.fetch_open_purchase_orders(&query)
        })?;

        let provider = Arc::clone(&self.provider);
        let query = item.clone();
        let lead_time = fetch_with_timeout("fetch_lead_time", timeout, move || {
            provider.fetch_lead_time(&query)
        })?;
        if let Some(days) = lead_time.filter(|days| *days > MAX_PLANNING_DAYS) {
            return Err(DataError::Unavailable(format!(
                "lead time of {days} days for {item} exceeds {MAX_PLANNING_DAYS}"
            )));
        }

        Ok(ItemSupply {
            inventory,
            purchase_orders,
            lead_time,
        })
    }

    fn availability_stage(
        &self,
        lines: Vec<OrderLine>,
        snapshot: &SupplySnapshot,
        cancel: &CancelSignal,
        report: &mut BatchReport,
    ) -> Vec<(OrderLine, AtpResult)> {
        let started = Instant::now();
        let outcomes: Vec<Result<AtpResult, LineError>> = if self.config.reserve_supply_across_lines
        {
            // Earlier lines claim supply first, so this stays sequential.
            let mut book = SupplyReservations::new();
            lines
                .iter()
                .map(|line| {
                    self.atp_line(line, cancel, || {
                        self.engine.compute_reserving(line, snapshot, &mut book)
                    })
                })
                .collect()
        } else {
            map_bounded(&lines, self.workers(), |line| {
                self.atp_line(line, cancel, || self.engine.compute(line, snapshot))
            })
        };

        let processed = lines.len();
        let mut promised = Vec::with_capacity(processed);
        for (line, outcome) in lines.into_iter().zip(outcomes) {
            match outcome {
                Ok(atp) => {
                    report.atp_results.push(atp.clone());
                    promised.push((line, atp));
                }
                Err(error) => self.fail(report, line.key(), Stage::Availability, error),
            }
        }

        self.stage_done(
            Stage::Availability,
            summary(processed, promised.len()),
            started,
        );
        promised
    }

    fn atp_line(
        &self,
        line: &OrderLine,
        cancel: &CancelSignal,
        compute: impl FnOnce() -> AtpResult,
    ) -> Result<AtpResult, LineError> {
        if cancel.is_cancelled() {
            return Err(LineError::Cancelled);
        }
        let started = Instant::now();
        let atp = compute();
        debug!(
            order_id = %line.order_id,
            line_id = %line.line_id,
            status = ?atp.status,
            source = ?atp.source,
            available = atp.available_quantity,
            "availability computed"
        );
        self.record_line(
            &line.order_id,
            Stage::Availability,
            "compute_atp",
            AuditSnapshot::OrderLine(line),
            AuditSnapshot::Atp(&atp),
            started.elapsed(),
        )?;
        Ok(atp)
    }

    fn schedule_stage<'a>(
        &self,
        promised: &'a [(OrderLine, AtpResult)],
        cancel: &CancelSignal,
        report: &mut BatchReport,
    ) -> Vec<(&'a OrderLine, &'a AtpResult, ScheduleResult)> {
        let started = Instant::now();
        let rng = LineRng::new(self.config.schedule_seed);

        let outcomes = map_bounded(promised, self.workers(), |(line, atp)| {
            if cancel.is_cancelled() {
                return Err(LineError::Cancelled);
            }
            let line_started = Instant::now();
            let schedule = self
                .scheduler
                .schedule_line(atp, line, &rng)
                .map_err(LineError::Invariant)?;
            debug!(
                order_id = %line.order_id,
                line_id = %line.line_id,
                carrier = %schedule.carrier,
                ship_date = %schedule.ship_date,
                delivery_date = %schedule.delivery_date,
                "delivery scheduled"
            );
            self.record_line(
                &line.order_id,
                Stage::Scheduling,
                "schedule_delivery",
                AuditSnapshot::Atp(atp),
                AuditSnapshot::Schedule(&schedule),
                line_started.elapsed(),
            )?;
            Ok(schedule)
        });

        let mut scheduled = Vec::with_capacity(promised.len());
        for ((line, atp), outcome) in promised.iter().zip(outcomes) {
            match outcome {
                Ok(schedule) => {
                    report.schedules.push(schedule.clone());
                    scheduled.push((line, atp, schedule));
                }
                Err(error) => self.fail(report, line.key(), Stage::Scheduling, error),
            }
        }

        self.stage_done(
            Stage::Scheduling,
            summary(promised.len(), scheduled.len()),
            started,
        );
        scheduled
    }

    fn split_stage<'a>(
        &self,
        scheduled: Vec<(&'a OrderLine, &'a AtpResult, ScheduleResult)>,
        cancel: &CancelSignal,
        report: &mut BatchReport,
    ) -> Vec<(&'a OrderLine, SplitDecision)> {
        let started = Instant::now();

        let outcomes = map_bounded(&scheduled, self.workers(), |(line, atp, schedule)| {
            if cancel.is_cancelled() {
                return Err(LineError::Cancelled);
            }
            let line_started = Instant::now();
            let decision = self
                .planner
                .plan(atp, schedule, line)
                .map_err(LineError::Invariant)?;
            Ok((decision, line_started.elapsed()))
        });

        let mut planned = Vec::with_capacity(scheduled.len());
        for ((line, _, schedule), outcome) in scheduled.iter().zip(outcomes) {
            match outcome {
                Ok((decision, elapsed)) => planned.push((*line, schedule, decision, elapsed)),
                Err(error) => self.fail(report, line.key(), Stage::Split, error),
            }
        }

        // Shipment cap across each order's lines.
        let mut groups: Vec<(OrderId, Vec<usize>)> = Vec::new();
        let mut index: HashMap<OrderId, usize> = HashMap::new();
        for (i, (line, ..)) in planned.iter().enumerate() {
            let g = *index.entry(line.order_id.clone()).or_insert_with(|| {
                groups.push((line.order_id.clone(), Vec::new()));
                groups.len() - 1
            });
            groups[g].1.push(i);
        }

        let mut capped_out = HashSet::new();
        for (order_id, members) in &groups {
            let mut batch: Vec<SplitDecision> =
                members.iter().map(|&i| planned[i].2.clone()).collect();
            match self.planner.cap_order(&mut batch) {
                Ok(()) => {
                    for (&i, decision) in members.iter().zip(batch) {
                        planned[i].2 = decision;
                    }
                }
                Err(error) => {
                    warn!(order_id = %order_id, error = %error, "order shipment cap failed");
                    for &i in members {
                        let key = planned[i].0.key();
                        self.fail(report, key, Stage::Split, LineError::Invariant(error.clone()));
                        capped_out.insert(i);
                    }
                }
            }
        }

        let mut decided = Vec::with_capacity(planned.len());
        for (i, (line, schedule, decision, elapsed)) in planned.into_iter().enumerate() {
            if capped_out.contains(&i) {
                continue;
            }
            debug!(
                order_id = %line.order_id,
                line_id = %line.line_id,
                shipments = decision.shipments.len(),
                reason = ?decision.split_reason,
                "shipments planned"
            );
            let recorded = self.record_line(
                &line.order_id,
                Stage::Split,
                "plan_shipments",
                AuditSnapshot::Schedule(schedule),
                AuditSnapshot::Split(&decision),
                elapsed,
            );
            match recorded {
                Ok(()) => {
                    report.split_decisions.push(decision.clone());
                    decided.push((line, decision));
                }
                Err(error) => self.fail(report, line.key(), Stage::Split, error),
            }
        }

        self.stage_done(
            Stage::Split,
            summary(scheduled.len(), decided.len()),
            started,
        );
        decided
    }

    /// Compose one confirmation per order. Returns each composed order's
    /// dispatch priority, taken from its first line.
    fn compose_stage(
        &self,
        decided: &[(&OrderLine, SplitDecision)],
        heads: &HashMap<OrderId, OrderHead>,
        cancel: &CancelSignal,
        report: &mut BatchReport,
    ) -> HashMap<OrderId, Priority> {
        let started = Instant::now();
        let lines: Vec<OrderLine> = decided.iter().map(|(line, _)| (*line).clone()).collect();
        let by_key: HashMap<LineKey, &SplitDecision> =
            decided.iter().map(|(line, d)| (line.key(), d)).collect();
        let issued_at = self.clock.now();

        let groups = group_by_order(&lines);
        let orders = groups.len();
        let mut priorities = HashMap::new();
        for (order_id, order_lines) in groups {
            if cancel.is_cancelled() {
                for line in &order_lines {
                    self.fail(report, line.key(), Stage::Composition, LineError::Cancelled);
                }
                continue;
            }

            let order_started = Instant::now();
            let head = heads.get(&order_id);
            let planned: Vec<(&OrderLine, &SplitDecision)> = order_lines
                .iter()
                .filter_map(|line| by_key.get(&line.key()).map(|d| (*line, *d)))
                .collect();
            let customer = head.map(|h| h.customer.clone()).unwrap_or_default();
            let Some(confirmation) = compose_order(order_id, customer, &planned, issued_at) else {
                continue;
            };

            let order_decisions: Vec<SplitDecision> =
                planned.iter().map(|(_, d)| (*d).clone()).collect();
            let recorded = self.record_line(
                &confirmation.order_id,
                Stage::Composition,
                "compose_confirmation",
                AuditSnapshot::Splits(&order_decisions),
                AuditSnapshot::Confirmation(&confirmation),
                order_started.elapsed(),
            );
            match recorded {
                Ok(()) => {
                    debug!(
                        order_id = %confirmation.order_id,
                        confirmation = %confirmation.confirmation_number,
                        shipments = confirmation.total_shipments,
                        "confirmation composed"
                    );
                    let priority = head.map(|h| h.priority).unwrap_or_default();
                    priorities.insert(confirmation.order_id.clone(), priority);
                    report.confirmations.push(confirmation);
                }
                Err(error) => {
                    for line in &order_lines {
                        self.fail(report, line.key(), Stage::Composition, error.clone());
                    }
                }
            }
        }

        self.stage_done(
            Stage::Composition,
            summary(orders, report.confirmations.len()),
            started,
        );
        priorities
    }

    fn dispatch_stage(
        &self,
        confirmations: &[Confirmation],
        priorities: &HashMap<OrderId, Priority>,
        cancel: &CancelSignal,
    ) -> Vec<DispatchResult> {
        let started = Instant::now();

        let dispatches = map_bounded(confirmations, self.workers(), |confirmation| {
            let priority = priorities
                .get(&confirmation.order_id)
                .copied()
                .unwrap_or_default();
            let sent_started = Instant::now();
            let result =
                self.dispatcher
                    .dispatch(confirmation, priority, self.transport.as_ref(), cancel);
            let status = match result.status {
                DispatchStatus::Sent => AuditStatus::Success,
                _ if cancel.is_cancelled() => AuditStatus::Cancelled,
                _ => AuditStatus::Failure,
            };
            // The send already happened; a ledger failure is only logged.
            self.record(
                AuditRecord::new(Stage::Dispatch, "dispatch_confirmation")
                    .order(&confirmation.order_id)
                    .input(AuditSnapshot::Confirmation(confirmation))
                    .output(AuditSnapshot::Dispatch(&result))
                    .status(status)
                    .elapsed(sent_started.elapsed()),
            )
            .ok();
            result
        });

        let sent = dispatches
            .iter()
            .filter(|d| d.status == DispatchStatus::Sent)
            .count();
        self.stage_done(Stage::Dispatch, summary(dispatches.len(), sent), started);
        dispatches
    }

    fn finish(&self, submitted: usize, started: Instant, cancel: &CancelSignal, report: &BatchReport) {
        let failed = report.failures.len();
        let totals = summary(submitted, submitted.saturating_sub(failed));
        let status = if cancel.is_cancelled() {
            AuditStatus::Cancelled
        } else {
            AuditStatus::Success
        };
        self.record(
            AuditRecord::new(Stage::Batch, "batch_complete")
                .output(AuditSnapshot::Summary(totals))
                .status(status)
                .elapsed(started.elapsed()),
        )
        .ok();

        info!(
            lines = submitted,
            succeeded = totals.succeeded,
            failed,
            confirmations = report.confirmations.len(),
            sent = report.sent(),
            cancelled = cancel.is_cancelled(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "batch complete"
        );
    }

    fn fail(&self, report: &mut BatchReport, key: LineKey, stage: Stage, error: LineError) {
        let message = error.to_string();
        match error {
            LineError::Cancelled => debug!(
                order_id = %key.order_id,
                line_id = %key.line_id,
                stage = stage.as_str(),
                "order line cancelled"
            ),
            _ => warn!(
                order_id = %key.order_id,
                line_id = %key.line_id,
                stage = stage.as_str(),
                error = %message,
                "order line failed"
            ),
        }
        self.record(
            AuditRecord::new(stage, "line_failed")
                .order(&key.order_id)
                .input(AuditSnapshot::Line(&key))
                .output(AuditSnapshot::Error(&message))
                .status(error.audit_status()),
        )
        .ok();
        report.failures.push(LineFailure { key, stage, error });
    }

    fn stage_done(&self, stage: Stage, summary: StageSummary, started: Instant) {
        let elapsed = started.elapsed();
        info!(
            stage = stage.as_str(),
            processed = summary.processed,
            succeeded = summary.succeeded,
            failed = summary.failed,
            elapsed_ms = elapsed.as_millis() as u64,
            "stage complete"
        );
        self.record(
            AuditRecord::new(stage, "stage_complete")
                .output(AuditSnapshot::Summary(summary))
                .elapsed(elapsed),
        )
        .ok();
    }

    fn record_line(
        &self,
        order_id: &OrderId,
        stage: Stage,
        action: &str,
        input: AuditSnapshot<'_>,
        output: AuditSnapshot<'_>,
        elapsed: Duration,
    ) -> Result<(), LineError> {
        self.record(
            AuditRecord::new(stage, action)
                .order(order_id)
                .input(input)
                .output(output)
                .elapsed(elapsed),
        )
    }

    fn record(&self, record: AuditRecord<'_>) -> Result<(), LineError> {
        let stage = record.stage;
        self.ledger.record(record).map(|_| ()).map_err(|e| {
            error!(stage = stage.as_str(), error = %e, "audit append failed");
            LineError::Audit(e.to_string())
        })
    }
}

fn summary(processed: usize, succeeded: usize) -> StageSummary {
    StageSummary {
        processed,
        succeeded,
        failed: processed.saturating_sub(succeeded),
    }
}
