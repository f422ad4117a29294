//! Availability-to-promise (ATP) engine.
//!
//! For one order line, decides how much can be promised and from when, looking
//! first at stock above safety level, then at inbound purchase orders, and
//! finally at future production.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use promise_core::calendar::add_days;
use promise_core::{ItemCode, LineId, LineKey, OrderId, PipelineConfig};
use promise_inventory::{InventorySnapshot, StockPosition, matching_rows};
use promise_purchasing::{PurchaseOrder, PurchaseOrderId, inbound_supply};
use promise_sales::OrderLine;

use crate::reservation::SupplyReservations;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AtpStatus {
    Available,
    Partial,
    Backorder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SupplySource {
    Stock,
    InboundPo,
    FutureProduction,
}

/// Availability decision for one order line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AtpResult {
    pub order_id: OrderId,
    pub line_id: LineId,
    pub item: ItemCode,
    pub requested_quantity: i64,
    pub requested_date: NaiveDate,
    /// Never exceeds `requested_quantity`.
    pub available_quantity: i64,
    pub earliest_available_date: NaiveDate,
    pub status: AtpStatus,
    pub source: SupplySource,
    /// Purchase order whose arrival completes the quantity (INBOUND_PO only).
    pub supplying_po: Option<PurchaseOrderId>,
    pub notes: Vec<String>,
}

impl AtpResult {
    pub fn key(&self) -> LineKey {
        LineKey::new(self.order_id.clone(), self.line_id.clone())
    }

    pub fn shortfall(&self) -> i64 {
        self.requested_quantity - self.available_quantity
    }

    pub fn is_fully_available(&self) -> bool {
        self.status == AtpStatus::Available && self.available_quantity == self.requested_quantity
    }
}

/// Supply data one batch is evaluated against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplySnapshot {
    /// Reference date ("today") for buffer arithmetic.
    pub as_of: NaiveDate,
    #[serde(default)]
    pub inventory: Vec<InventorySnapshot>,
    #[serde(default)]
    pub purchase_orders: Vec<PurchaseOrder>,
    /// Item-specific production/replenishment lead times in days.
    #[serde(default)]
    pub lead_times: HashMap<ItemCode, u32>,
}

impl SupplySnapshot {
    pub fn new(as_of: NaiveDate) -> Self {
        Self {
            as_of,
            inventory: Vec::new(),
            purchase_orders: Vec::new(),
            lead_times: HashMap::new(),
        }
    }

    pub fn with_inventory(mut self, rows: impl IntoIterator<Item = InventorySnapshot>) -> Self {
        self.inventory.extend(rows);
        self
    }

    pub fn with_purchase_orders(mut self, orders: impl IntoIterator<Item = PurchaseOrder>) -> Self {
        self.purchase_orders.extend(orders);
        self
    }

    pub fn with_lead_time(mut self, item: impl Into<ItemCode>, days: u32) -> Self {
        self.lead_times.insert(item.into(), days);
        self
    }

    pub fn lead_time_for(&self, item: &ItemCode) -> Option<u32> {
        self.lead_times.get(item).copied()
    }
}

/// Supply a result draws on: stock units and units per purchase order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Allocation {
    pub stock_units: i64,
    pub inbound: Vec<(PurchaseOrderId, i64)>,
}

/// Availability engine. Stateless apart from its configuration.
#[derive(Debug, Clone)]
pub struct AvailabilityEngine {
    config: Arc<PipelineConfig>,
}

impl AvailabilityEngine {
    pub fn new(config: Arc<PipelineConfig>) -> Self {
        Self { config }
    }

    /// Evaluate a line against the full snapshot (no cross-line reservation).
    ///
    /// Deterministic: the same line, snapshot and configuration always give
    /// the same result.
    pub fn compute(&self, line: &OrderLine, snapshot: &SupplySnapshot) -> AtpResult {
        self.evaluate(line, snapshot, &SupplyReservations::default()).0
    }

    /// Evaluate a line against what earlier lines left over, then reserve the
    /// supply this line was promised.
    pub fn compute_reserving(
        &self,
        line: &OrderLine,
        snapshot: &SupplySnapshot,
        book: &mut SupplyReservations,
    ) -> AtpResult {
        let (result, allocation, free_rows) = self.evaluate(line, snapshot, book);
        book.reserve_stock(&free_rows, allocation.stock_units);
        for (po, units) in &allocation.inbound {
            book.reserve_inbound(po, *units);
        }
        result
    }

    /// Evaluate lines in order, reserving across lines when configured.
    pub fn compute_all(&self, lines: &[OrderLine], snapshot: &SupplySnapshot) -> Vec<AtpResult> {
        if self.config.reserve_supply_across_lines {
            let mut book = SupplyReservations::new();
            lines
                .iter()
                .map(|line| self.compute_reserving(line, snapshot, &mut book))
                .collect()
        } else {
            lines.iter().map(|line| self.compute(line, snapshot)).collect()
        }
    }

    fn evaluate(
        &self,
        line: &OrderLine,
        snapshot: &SupplySnapshot,
        book: &SupplyReservations,
    ) -> (AtpResult, Allocation, Vec<(usize, i64)>) {
        let config = &self.config;
        let location = line.ship_from.as_ref();
        let requested = line.quantity;
        let buffers = config.total_buffer_days();

        let rows: Vec<(usize, &InventorySnapshot)> =
            matching_rows(&snapshot.inventory, &line.item, location).collect();
        let free_rows: Vec<(usize, i64)> = rows
            .iter()
            .map(|(i, row)| (*i, row.on_hand_qty.saturating_sub(book.stock_consumed(*i))))
            .collect();

        let base = StockPosition::of(rows.iter().map(|(_, row)| *row), config.default_safety_stock);
        let reserved = rows
            .iter()
            .fold(0i64, |acc, (i, _)| acc.saturating_add(book.stock_consumed(*i)));
        let position = StockPosition {
            on_hand: base.on_hand.saturating_sub(reserved),
            ..base
        };
        let available_stock = position.available();

        let mut notes = vec![format!(
            "On-hand: {}, Safety stock: {}, Available: {}",
            position.on_hand, position.safety_stock, available_stock
        )];
        if reserved > 0 {
            notes.push(format!("{reserved} units already promised to earlier lines"));
        }

        let result = |available_quantity: i64,
                      earliest_available_date: NaiveDate,
                      status: AtpStatus,
                      source: SupplySource,
                      supplying_po: Option<PurchaseOrderId>,
                      notes: Vec<String>| AtpResult {
            order_id: line.order_id.clone(),
            line_id: line.line_id.clone(),
            item: line.item.clone(),
            requested_quantity: requested,
            requested_date: line.requested_date,
            available_quantity,
            earliest_available_date,
            status,
            source,
            supplying_po,
            notes,
        };

        let stock_ready = line.requested_date.max(add_days(snapshot.as_of, buffers));

        if available_stock >= requested {
            notes.push("Full quantity available from stock".to_string());
            let allocation = Allocation {
                stock_units: requested,
                inbound: Vec::new(),
            };
            return (
                result(requested, stock_ready, AtpStatus::Available, SupplySource::Stock, None, notes),
                allocation,
                free_rows,
            );
        }

        if config.allow_partial_ship && line.allow_partial && available_stock > 0 {
            notes.push(format!(
                "Partial quantity {} available, short {} units",
                available_stock,
                requested - available_stock
            ));
            let allocation = Allocation {
                stock_units: available_stock,
                inbound: Vec::new(),
            };
            return (
                result(available_stock, stock_ready, AtpStatus::Partial, SupplySource::Stock, None, notes),
                allocation,
                free_rows,
            );
        }

        let inbound = inbound_supply(
            &snapshot.purchase_orders,
            &line.item,
            location,
            config.consider_unconfirmed_pos,
        );
        let mut accumulated = available_stock;
        let mut drawn: Vec<(PurchaseOrderId, i64)> = Vec::new();
        for po in inbound {
            let remaining = po.quantity.saturating_sub(book.inbound_consumed(&po.id));
            if remaining <= 0 {
                continue;
            }
            drawn.push((po.id.clone(), remaining.min(requested.saturating_sub(accumulated))));
            accumulated = accumulated.saturating_add(remaining);

            if accumulated >= requested {
                let po_ready = add_days(po.expected_delivery_date, buffers);
                let status = if po_ready <= line.requested_date {
                    AtpStatus::Available
                } else {
                    AtpStatus::Backorder
                };
                notes.push(format!(
                    "Available from PO {} (expected {})",
                    po.id, po.expected_delivery_date
                ));
                let allocation = Allocation {
                    stock_units: available_stock,
                    inbound: drawn,
                };
                return (
                    result(
                        requested,
                        line.requested_date.max(po_ready),
                        status,
                        SupplySource::InboundPo,
                        Some(po.id.clone()),
                        notes,
                    ),
                    allocation,
                    free_rows,
                );
            }
        }

        let lead_time = snapshot
            .lead_time_for(&line.item)
            .unwrap_or(config.default_lead_time_days);
        notes.push(format!(
            "No stock or inbound supply; lead time {} days plus {} buffer days",
            lead_time, buffers
        ));
        (
            result(
                requested,
                add_days(snapshot.as_of, lead_time.saturating_add(buffers)),
                AtpStatus::Backorder,
                SupplySource::FutureProduction,
                None,
                notes,
            ),
            Allocation::default(),
            free_rows,
        )
    }
}
