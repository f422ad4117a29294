use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use promise_core::calendar::{self, COMPACT_TIMESTAMP_FORMAT};
use promise_core::{ItemCode, LineId, LineKey, OrderId};
use promise_fulfillment::{ShipmentStatus, SplitDecision};
use promise_sales::{CustomerRef, OrderLine, group_by_order};

use crate::document::{TERMS, render};

/// One shipment as it appears on the confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipmentDetail {
    pub line_id: LineId,
    pub item: ItemCode,
    pub quantity: i64,
    pub ship_date: NaiveDate,
    pub delivery_date: NaiveDate,
    pub carrier: String,
    pub status: ShipmentStatus,
}

/// Customer-facing confirmation for one order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Confirmation {
    pub order_id: OrderId,
    pub customer: CustomerRef,
    pub confirmation_number: String,
    #[serde(with = "calendar::timestamp")]
    pub issued_at: DateTime<Utc>,
    pub total_lines: usize,
    pub total_shipments: usize,
    pub shipment_details: Vec<ShipmentDetail>,
    pub terms: String,
    pub document: String,
    pub notes: Vec<String>,
}

impl Confirmation {
    pub fn total_quantity(&self) -> i64 {
        self.shipment_details.iter().map(|s| s.quantity).sum()
    }

    /// Latest promised delivery across all shipments.
    pub fn final_delivery_date(&self) -> Option<NaiveDate> {
        self.shipment_details.iter().map(|s| s.delivery_date).max()
    }
}

/// `CNF-{order}-{yyyymmddHHMMSS}`.
pub fn confirmation_number(order_id: &OrderId, issued_at: DateTime<Utc>) -> String {
    format!(
        "CNF-{}-{}",
        order_id,
        issued_at.format(COMPACT_TIMESTAMP_FORMAT)
    )
}

/// Build one confirmation per order.
///
/// Orders appear in the order their first line appears in `lines`; shipment
/// details follow line order, then shipment order within a line. Customer
/// fields come from the order's first line. Lines with no split decision are
/// left off (an order with none at all gets no confirmation).
pub fn compose(
    lines: &[OrderLine],
    decisions: &[SplitDecision],
    issued_at: DateTime<Utc>,
) -> Vec<Confirmation> {
    let by_key: HashMap<LineKey, &SplitDecision> =
        decisions.iter().map(|d| (d.key(), d)).collect();

    group_by_order(lines)
        .into_iter()
        .filter_map(|(order_id, order_lines)| {
            let customer = order_lines.first()?.customer.clone();
            let planned: Vec<(&OrderLine, &SplitDecision)> = order_lines
                .iter()
                .filter_map(|line| by_key.get(&line.key()).map(|d| (*line, *d)))
                .collect();

            let mut confirmation = compose_order(order_id, customer, &planned, issued_at)?;
            let skipped = order_lines.len() - planned.len();
            if skipped > 0 {
                confirmation
                    .notes
                    .push(format!("{skipped} lines had no shipment plan and were left off"));
            }
            Some(confirmation)
        })
        .collect()
}

/// Confirmation for a single order over its planned lines, in the given order.
///
/// `None` when nothing was planned.
pub fn compose_order(
    order_id: OrderId,
    customer: CustomerRef,
    planned: &[(&OrderLine, &SplitDecision)],
    issued_at: DateTime<Utc>,
) -> Option<Confirmation> {
    if planned.is_empty() {
        return None;
    }

    let shipment_details: Vec<ShipmentDetail> = planned
        .iter()
        .flat_map(|&(_, decision)| {
            decision.shipments.iter().map(move |s| ShipmentDetail {
                line_id: decision.line_id.clone(),
                item: decision.item.clone(),
                quantity: s.quantity,
                ship_date: s.ship_date,
                delivery_date: s.delivery_date,
                carrier: s.carrier.clone(),
                status: s.status,
            })
        })
        .collect();

    let confirmation_number = confirmation_number(&order_id, issued_at);
    let document = render(
        &order_id,
        &confirmation_number,
        &customer,
        issued_at,
        &shipment_details,
    );
    let notes = vec![format!(
        "Generated confirmation for {} lines, {} shipments",
        planned.len(),
        shipment_details.len()
    )];

    Some(Confirmation {
        order_id,
        customer,
        confirmation_number,
        issued_at,
        total_lines: planned.len(),
        total_shipments: shipment_details.len(),
        shipment_details,
        terms: TERMS.to_string(),
        document,
        notes,
    })
}
