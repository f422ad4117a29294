use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use promise_core::{ItemCode, LocationCode};

/// One inventory row as reported by the ERP.
///
/// Several rows may exist for the same item (and even the same location); they
/// are additive, not alternatives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventorySnapshot {
    pub item: ItemCode,
    pub location: LocationCode,
    pub on_hand_qty: i64,
    /// Safety stock held back from promising. `None` means the ERP did not
    /// report one and the configured default applies.
    #[serde(default)]
    pub safety_stock_qty: Option<i64>,
    pub last_updated: DateTime<Utc>,
}

impl InventorySnapshot {
    pub fn new(
        item: impl Into<ItemCode>,
        location: impl Into<LocationCode>,
        on_hand_qty: i64,
        safety_stock_qty: i64,
        last_updated: DateTime<Utc>,
    ) -> Self {
        Self {
            item: item.into(),
            location: location.into(),
            on_hand_qty,
            safety_stock_qty: Some(safety_stock_qty),
            last_updated,
        }
    }

    pub fn effective_safety_stock(&self, default_safety_stock: i64) -> i64 {
        self.safety_stock_qty.unwrap_or(default_safety_stock)
    }

    /// Whether this row can serve `item`, optionally restricted to `location`.
    pub fn serves(&self, item: &ItemCode, location: Option<&LocationCode>) -> bool {
        self.item == *item && location.is_none_or(|loc| self.location == *loc)
    }
}

/// Rows serving `item` (and `location`, when given), with their index in `rows`.
pub fn matching_rows<'a>(
    rows: &'a [InventorySnapshot],
    item: &'a ItemCode,
    location: Option<&'a LocationCode>,
) -> impl Iterator<Item = (usize, &'a InventorySnapshot)> + 'a {
    rows.iter()
        .enumerate()
        .filter(move |(_, row)| row.serves(item, location))
}

/// Aggregated stock over a set of inventory rows.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockPosition {
    pub on_hand: i64,
    pub safety_stock: i64,
}

impl StockPosition {
    pub fn of<'a>(
        rows: impl IntoIterator<Item = &'a InventorySnapshot>,
        default_safety_stock: i64,
    ) -> Self {
        rows.into_iter().fold(Self::default(), |acc, row| Self {
            on_hand: acc.on_hand.saturating_add(row.on_hand_qty),
            safety_stock: acc
                .safety_stock
                .saturating_add(row.effective_safety_stock(default_safety_stock)),
        })
    }

    /// Promisable stock: on-hand above safety stock, never negative.
    pub fn available(&self) -> i64 {
        self.on_hand.saturating_sub(self.safety_stock).max(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn row(item: &str, location: &str, on_hand: i64, safety: i64) -> InventorySnapshot {
        InventorySnapshot::new(item, location, on_hand, safety, Utc::now())
    }

    #[test]
    fn rows_for_the_same_item_are_additive() {
        let rows = vec![
            row("WIDGET-A", "MAIN", 60, 10),
            row("WIDGET-A", "EAST", 40, 10),
            row("WIDGET-B", "MAIN", 500, 0),
        ];
        let item = ItemCode::from("WIDGET-A");
        let position = StockPosition::of(matching_rows(&rows, &item, None).map(|(_, r)| r), 0);
        assert_eq!(position.on_hand, 100);
        assert_eq!(position.safety_stock, 20);
        assert_eq!(position.available(), 80);
    }

    #[test]
    fn location_filter_restricts_rows() {
        let rows = vec![row("WIDGET-A", "MAIN", 60, 10), row("WIDGET-A", "EAST", 40, 10)];
        let item = ItemCode::from("WIDGET-A");
        let east = LocationCode::from("EAST");
        let indices: Vec<usize> = matching_rows(&rows, &item, Some(&east)).map(|(i, _)| i).collect();
        assert_eq!(indices, vec![1]);
    }

    #[test]
    fn missing_safety_stock_uses_default() {
        let mut r = row("WIDGET-C", "MAIN", 5, 0);
        r.safety_stock_qty = None;
        let position = StockPosition::of([&r], 15);
        assert_eq!(position.safety_stock, 15);
        assert_eq!(position.available(), 0);
    }

    proptest! {
        /// Property: available stock is never negative and never exceeds on-hand.
        #[test]
        fn available_is_bounded(
            rows in prop::collection::vec((0i64..10_000, 0i64..10_000), 0..8)
        ) {
            let snapshots: Vec<InventorySnapshot> = rows
                .iter()
                .map(|(on_hand, safety)| row("X", "MAIN", *on_hand, *safety))
                .collect();
            let position = StockPosition::of(&snapshots, 0);
            prop_assert!(position.available() >= 0);
            prop_assert!(position.available() <= position.on_hand.max(0));
        }
    }
}
