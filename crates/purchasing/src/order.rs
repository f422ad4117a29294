use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use promise_core::{ItemCode, LocationCode};

/// Purchase order number as issued by the ERP (e.g. `PO-1001`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PurchaseOrderId(pub String);

impl PurchaseOrderId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for PurchaseOrderId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// An open purchase order line: inbound supply expected at a location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrder {
    pub id: PurchaseOrderId,
    pub item: ItemCode,
    pub quantity: i64,
    pub expected_delivery_date: NaiveDate,
    pub location: LocationCode,
    /// Supplier confirmed the delivery date.
    #[serde(default)]
    pub confirmed: bool,
}

impl PurchaseOrder {
    pub fn new(
        id: impl Into<String>,
        item: impl Into<ItemCode>,
        quantity: i64,
        expected_delivery_date: NaiveDate,
        location: impl Into<LocationCode>,
        confirmed: bool,
    ) -> Self {
        Self {
            id: PurchaseOrderId::new(id),
            item: item.into(),
            quantity,
            expected_delivery_date,
            location: location.into(),
            confirmed,
        }
    }
}

/// Purchase orders that can supply `item` (at `location`, when given), ordered
/// by expected delivery date.
///
/// Unconfirmed orders are skipped unless `include_unconfirmed`. The sort is
/// stable, so orders arriving the same day keep their input order.
pub fn inbound_supply<'a>(
    orders: &'a [PurchaseOrder],
    item: &ItemCode,
    location: Option<&LocationCode>,
    include_unconfirmed: bool,
) -> Vec<&'a PurchaseOrder> {
    let mut supply: Vec<&PurchaseOrder> = orders
        .iter()
        .filter(|po| po.item == *item)
        .filter(|po| location.is_none_or(|loc| po.location == *loc))
        .filter(|po| include_unconfirmed || po.confirmed)
        .collect();
    supply.sort_by_key(|po| po.expected_delivery_date);
    supply
}
