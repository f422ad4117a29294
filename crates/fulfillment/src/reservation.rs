//! Cross-line supply reservations.
//!
//! Without reservations every line of a batch sees the full snapshot, so two
//! lines can be promised the same units. The reservation book records what
//! earlier lines consumed: stock per inventory row (by index in the snapshot)
//! and inbound units per purchase order.

use std::collections::HashMap;

use promise_purchasing::PurchaseOrderId;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SupplyReservations {
    stock: HashMap<usize, i64>,
    inbound: HashMap<PurchaseOrderId, i64>,
}

impl SupplyReservations {
    pub fn new() -> Self {
        Self::default()
    }

    /// On-hand units already promised from inventory row `row`.
    pub fn stock_consumed(&self, row: usize) -> i64 {
        self.stock.get(&row).copied().unwrap_or(0)
    }

    /// Units already promised from purchase order `po`.
    pub fn inbound_consumed(&self, po: &PurchaseOrderId) -> i64 {
        self.inbound.get(po).copied().unwrap_or(0)
    }

    /// Consume `units` of on-hand from `rows` (row index, free on-hand), in order.
    ///
    /// Returns the units that could not be placed (zero when the caller only
    /// reserves what the rows actually hold).
    pub fn reserve_stock(&mut self, rows: &[(usize, i64)], units: i64) -> i64 {
        let mut remaining = units.max(0);
        for &(row, free) in rows {
            if remaining == 0 {
                break;
            }
            let take = remaining.min(free.max(0));
            if take > 0 {
                *self.stock.entry(row).or_insert(0) += take;
                remaining -= take;
            }
        }
        remaining
    }

    pub fn reserve_inbound(&mut self, po: &PurchaseOrderId, units: i64) {
        if units > 0 {
            *self.inbound.entry(po.clone()).or_insert(0) += units;
        }
    }
}
