//! Split-shipment planning.
//!
//! Turns one line's availability and schedule into an ordered list of physical
//! shipments. Whatever the rules and limits do to the plan, shipment
//! quantities always add up to the line's requested quantity.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use promise_core::calendar::add_days;
use promise_core::{DomainError, DomainResult, ItemCode, LineId, LineKey, OrderId, PipelineConfig};
use promise_sales::OrderLine;

use crate::availability::{AtpResult, AtpStatus};
use crate::schedule::ScheduleResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShipmentStatus {
    #[serde(rename = "COMPLETE")]
    Complete,
    #[serde(rename = "PARTIAL_1")]
    Partial1,
    #[serde(rename = "PARTIAL_2")]
    Partial2,
    #[serde(rename = "BACKORDER")]
    Backorder,
}

impl ShipmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShipmentStatus::Complete => "COMPLETE",
            ShipmentStatus::Partial1 => "PARTIAL_1",
            ShipmentStatus::Partial2 => "PARTIAL_2",
            ShipmentStatus::Backorder => "BACKORDER",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SplitReason {
    None,
    PartialAvailability,
    Backorder,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shipment {
    pub quantity: i64,
    pub ship_date: NaiveDate,
    pub delivery_date: NaiveDate,
    pub carrier: String,
    pub status: ShipmentStatus,
}

impl Shipment {
    // Absorbing a shipment keeps the later dates: nothing ships before all of
    // its units exist.
    fn absorb(&mut self, other: &Shipment) {
        self.quantity += other.quantity;
        self.ship_date = self.ship_date.max(other.ship_date);
        self.delivery_date = self.delivery_date.max(other.delivery_date);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitDecision {
    pub order_id: OrderId,
    pub line_id: LineId,
    pub item: ItemCode,
    pub total_quantity: i64,
    pub shipments: Vec<Shipment>,
    pub split_reason: SplitReason,
    pub notes: Vec<String>,
}

impl SplitDecision {
    pub fn key(&self) -> LineKey {
        LineKey::new(self.order_id.clone(), self.line_id.clone())
    }

    pub fn shipped_quantity(&self) -> i64 {
        self.shipments.iter().map(|s| s.quantity).sum()
    }

    pub fn is_split(&self) -> bool {
        self.shipments.len() > 1
    }

    fn check_quantities(&self) -> DomainResult<()> {
        let shipped = self.shipped_quantity();
        if shipped != self.total_quantity {
            return Err(DomainError::invariant(format!(
                "line {} ships {} units but {} were requested",
                self.key(),
                shipped,
                self.total_quantity
            )));
        }
        Ok(())
    }

    /// Merge shipments from index `from` onwards into the one before it.
    fn merge_tail(&mut self, from: usize) {
        if from == 0 || from >= self.shipments.len() {
            return;
        }
        let tail: Vec<Shipment> = self.shipments.drain(from..).collect();
        let keep = &mut self.shipments[from - 1];
        for shipment in &tail {
            keep.absorb(shipment);
        }
        self.settle_single();
    }

    // A plan that collapsed to one shipment ships the line complete.
    fn settle_single(&mut self) {
        if let [only] = self.shipments.as_mut_slice() {
            if only.status != ShipmentStatus::Backorder {
                only.status = ShipmentStatus::Complete;
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct SplitPlanner {
    config: Arc<PipelineConfig>,
}

impl SplitPlanner {
    pub fn new(config: Arc<PipelineConfig>) -> Self {
        Self { config }
    }

    /// Plan the shipments for one line.
    ///
    /// Rules, first match wins: fully available ships once; partial stock
    /// (when the line accepts partials) ships now plus the remainder one lead
    /// time later; backorders ship once when supply arrives; anything else
    /// ships once on the scheduled dates. The per-shipment minimum and the
    /// split cap are applied afterwards.
    pub fn plan(
        &self,
        atp: &AtpResult,
        schedule: &ScheduleResult,
        line: &OrderLine,
    ) -> DomainResult<SplitDecision> {
        let total = atp.requested_quantity;
        let single = |quantity, ship_date, delivery_date, status| Shipment {
            quantity,
            ship_date,
            delivery_date,
            carrier: schedule.carrier.clone(),
            status,
        };

        let mut notes = Vec::new();
        let (shipments, split_reason) = if atp.status == AtpStatus::Available
            && atp.available_quantity == total
        {
            notes.push("No split required - full quantity available".to_string());
            (
                vec![single(
                    total,
                    schedule.ship_date,
                    schedule.delivery_date,
                    ShipmentStatus::Complete,
                )],
                SplitReason::None,
            )
        } else if atp.status == AtpStatus::Partial && line.allow_partial {
            let remaining = total - atp.available_quantity;
            let later_ship = add_days(schedule.ship_date, self.config.default_lead_time_days);
            notes.push(format!(
                "Split into 2 shipments: {} + {} units",
                atp.available_quantity, remaining
            ));
            (
                vec![
                    single(
                        atp.available_quantity,
                        schedule.ship_date,
                        schedule.delivery_date,
                        ShipmentStatus::Partial1,
                    ),
                    single(
                        remaining,
                        later_ship,
                        add_days(later_ship, schedule.transit_days),
                        ShipmentStatus::Partial2,
                    ),
                ],
                SplitReason::PartialAvailability,
            )
        } else if atp.status == AtpStatus::Backorder {
            notes.push(format!(
                "Backordered - single shipment on {}",
                atp.earliest_available_date
            ));
            (
                vec![single(
                    total,
                    atp.earliest_available_date,
                    add_days(atp.earliest_available_date, schedule.transit_days),
                    ShipmentStatus::Backorder,
                )],
                SplitReason::Backorder,
            )
        } else {
            (
                vec![single(
                    total,
                    schedule.ship_date,
                    schedule.delivery_date,
                    ShipmentStatus::Complete,
                )],
                SplitReason::None,
            )
        };

        let mut decision = SplitDecision {
            order_id: atp.order_id.clone(),
            line_id: atp.line_id.clone(),
            item: atp.item.clone(),
            total_quantity: total,
            shipments,
            split_reason,
            notes,
        };
        self.fold_small_shipments(&mut decision);
        if decision.shipments.len() > self.config.max_splits_per_order {
            decision.merge_tail(self.config.max_splits_per_order);
            decision.notes.push(format!(
                "Capped at {} shipments",
                self.config.max_splits_per_order
            ));
        }
        decision.check_quantities()?;
        Ok(decision)
    }

    /// Cap the number of shipments across all lines of one order.
    ///
    /// Split lines are collapsed to a single shipment, last line first, until
    /// the order fits `max_splits_per_order` or no split line remains (an
    /// order with more lines than the cap still ships each line once).
    pub fn cap_order(&self, decisions: &mut [SplitDecision]) -> DomainResult<()> {
        let cap = self.config.max_splits_per_order;
        let mut count: usize = decisions.iter().map(|d| d.shipments.len()).sum();

        for decision in decisions.iter_mut().rev() {
            if count <= cap {
                break;
            }
            if decision.is_split() {
                let before = decision.shipments.len();
                decision.merge_tail(1);
                count -= before - 1;
                decision
                    .notes
                    .push(format!("Merged into one shipment to keep the order within {cap} shipments"));
                decision.check_quantities()?;
            }
        }
        Ok(())
    }

    fn fold_small_shipments(&self, decision: &mut SplitDecision) {
        let min = self.config.min_split_quantity;
        while decision.shipments.len() > 1 {
            let Some(i) = decision.shipments.iter().position(|s| s.quantity < min) else {
                break;
            };
            let small = decision.shipments.remove(i);
            let target = if i < decision.shipments.len() { i } else { i - 1 };
            decision.shipments[target].absorb(&small);
            decision.notes.push(format!(
                "Shipment of {} units is below the minimum of {} and was folded into a neighbour",
                small.quantity, min
            ));
        }
        decision.settle_single();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::availability::SupplySource;
    use proptest::prelude::*;

    fn day(n: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 11, n).unwrap()
    }

    fn atp(line_id: &str, requested: i64, available: i64, status: AtpStatus) -> AtpResult {
        AtpResult {
            order_id: OrderId::new("SO-1"),
            line_id: LineId::new(line_id),
            item: ItemCode::new("WIDGET-A"),
            requested_quantity: requested,
            requested_date: day(5),
            available_quantity: available,
            earliest_available_date: day(4),
            status,
            source: SupplySource::Stock,
            supplying_po: None,
            notes: Vec::new(),
        }
    }

    fn schedule(atp: &AtpResult) -> ScheduleResult {
        ScheduleResult {
            order_id: atp.order_id.clone(),
            line_id: atp.line_id.clone(),
            item: atp.item.clone(),
            quantity: atp.available_quantity,
            carrier: "UPS".to_string(),
            transit_days: 2,
            ship_date: atp.earliest_available_date,
            delivery_date: add_days(atp.earliest_available_date, 2),
            meets_customer_window: true,
            notes: Vec::new(),
        }
    }

    fn line(line_id: &str, qty: i64) -> OrderLine {
        OrderLine::new("SO-1", line_id, "WIDGET-A", qty, day(5))
    }

    fn planner(config: PipelineConfig) -> SplitPlanner {
        SplitPlanner::new(Arc::new(config))
    }

    fn plan(planner: &SplitPlanner, atp: &AtpResult) -> SplitDecision {
        planner
            .plan(atp, &schedule(atp), &line(atp.line_id.as_str(), atp.requested_quantity))
            .unwrap()
    }

    #[test]
    fn full_availability_ships_once() {
        let d = plan(&planner(PipelineConfig::default()), &atp("001", 50, 50, AtpStatus::Available));
        assert_eq!(d.split_reason, SplitReason::None);
        assert_eq!(d.shipments.len(), 1);
        assert_eq!(d.shipments[0].status, ShipmentStatus::Complete);
        assert_eq!(d.shipments[0].delivery_date, day(6));
    }

    #[test]
    fn partial_availability_ships_twice() {
        let d = plan(&planner(PipelineConfig::default()), &atp("001", 120, 80, AtpStatus::Partial));
        assert_eq!(d.split_reason, SplitReason::PartialAvailability);
        assert_eq!(d.shipments.len(), 2);

        let (first, second) = (&d.shipments[0], &d.shipments[1]);
        assert_eq!((first.quantity, first.status), (80, ShipmentStatus::Partial1));
        assert_eq!((second.quantity, second.status), (40, ShipmentStatus::Partial2));
        assert_eq!(second.ship_date, add_days(day(4), 14));
        assert_eq!(second.delivery_date, add_days(day(4), 16));
    }

    #[test]
    fn partial_without_customer_consent_falls_back_to_one_shipment() {
        let a = atp("001", 120, 80, AtpStatus::Partial);
        let d = planner(PipelineConfig::default())
            .plan(&a, &schedule(&a), &line("001", 120).with_partial(false))
            .unwrap();
        assert_eq!(d.split_reason, SplitReason::None);
        assert_eq!(d.shipments.len(), 1);
        assert_eq!(d.shipments[0].quantity, 120);
    }

    #[test]
    fn backorder_ships_when_supply_arrives() {
        let mut a = atp("001", 30, 30, AtpStatus::Backorder);
        a.earliest_available_date = day(20);
        let d = plan(&planner(PipelineConfig::default()), &a);
        assert_eq!(d.split_reason, SplitReason::Backorder);
        assert_eq!(d.shipments[0].status, ShipmentStatus::Backorder);
        assert_eq!(d.shipments[0].ship_date, day(20));
        assert_eq!(d.shipments[0].delivery_date, day(22));
    }

    #[test]
    fn small_shipments_fold_into_a_neighbour() {
        let config = PipelineConfig::default().with_split_limits(3, 10);
        let d = plan(&planner(config), &atp("001", 100, 95, AtpStatus::Partial));

        assert_eq!(d.shipments.len(), 1);
        assert_eq!(d.shipments[0].quantity, 100);
        assert_eq!(d.shipments[0].status, ShipmentStatus::Complete);
        // the merged shipment waits for the later units
        assert_eq!(d.shipments[0].ship_date, add_days(day(4), 14));
    }

    #[test]
    fn split_cap_of_one_merges_partials() {
        let config = PipelineConfig::default().with_split_limits(1, 0);
        let d = plan(&planner(config), &atp("001", 120, 80, AtpStatus::Partial));
        assert_eq!(d.shipments.len(), 1);
        assert_eq!(d.shipments[0].quantity, 120);
    }

    #[test]
    fn order_cap_collapses_the_last_split_lines_first() {
        let p = planner(PipelineConfig::default().with_split_limits(3, 0));
        let mut decisions = vec![
            plan(&p, &atp("001", 120, 80, AtpStatus::Partial)),
            plan(&p, &atp("002", 60, 20, AtpStatus::Partial)),
        ];
        p.cap_order(&mut decisions).unwrap();

        assert_eq!(decisions[0].shipments.len(), 2);
        assert_eq!(decisions[1].shipments.len(), 1);
        assert_eq!(decisions[1].shipped_quantity(), 60);
    }

    #[test]
    fn order_with_more_lines_than_the_cap_ships_each_line_once() {
        let p = planner(PipelineConfig::default().with_split_limits(1, 0));
        let mut decisions: Vec<SplitDecision> = ["001", "002", "003"]
            .iter()
            .map(|id| plan(&p, &atp(id, 10, 10, AtpStatus::Available)))
            .collect();
        p.cap_order(&mut decisions).unwrap();
        assert!(decisions.iter().all(|d| d.shipments.len() == 1));
    }

    proptest! {
        /// Property: shipment quantities always sum to the requested quantity.
        #[test]
        fn quantities_are_conserved(
            requested in 1i64..1_000,
            available_pct in 0i64..=100,
            status in prop_oneof![
                Just(AtpStatus::Available),
                Just(AtpStatus::Partial),
                Just(AtpStatus::Backorder),
            ],
            max_splits in 1usize..4,
            min_qty in 0i64..50,
        ) {
            let available = requested * available_pct / 100;
            let p = planner(PipelineConfig::default().with_split_limits(max_splits, min_qty));
            let d = plan(&p, &atp("001", requested, available, status));

            prop_assert_eq!(d.shipped_quantity(), requested);
            prop_assert!(d.shipments.len() <= max_splits);
            prop_assert!(!d.shipments.is_empty());
        }
    }
}
