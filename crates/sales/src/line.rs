use std::collections::{HashMap, HashSet};

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use promise_core::{DomainError, DomainResult, ItemCode, LineId, LineKey, LocationCode, OrderId, Priority};

/// Customer identity carried on every line of an order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerRef {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
}

impl CustomerRef {
    pub fn new(id: impl Into<String>, name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            email: email.into(),
        }
    }
}

/// Time-of-day delivery window requested by the customer (e.g. 08:00–17:00).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl DeliveryWindow {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }
}

fn default_allow_partial() -> bool {
    true
}

/// A requested order line. Immutable input to the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub order_id: OrderId,
    pub line_id: LineId,
    pub item: ItemCode,
    pub quantity: i64,
    pub requested_date: NaiveDate,
    #[serde(default)]
    pub ship_from: Option<LocationCode>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub customer: CustomerRef,
    #[serde(default)]
    pub delivery_window: Option<DeliveryWindow>,
    /// Customer accepts partial shipments for this line.
    #[serde(default = "default_allow_partial")]
    pub allow_partial: bool,
}

impl OrderLine {
    pub fn new(
        order_id: impl Into<OrderId>,
        line_id: impl Into<LineId>,
        item: impl Into<ItemCode>,
        quantity: i64,
        requested_date: NaiveDate,
    ) -> Self {
        Self {
            order_id: order_id.into(),
            line_id: line_id.into(),
            item: item.into(),
            quantity,
            requested_date,
            ship_from: None,
            priority: Priority::Normal,
            customer: CustomerRef::default(),
            delivery_window: None,
            allow_partial: true,
        }
    }

    pub fn ship_from(mut self, location: impl Into<LocationCode>) -> Self {
        self.ship_from = Some(location.into());
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_customer(mut self, customer: CustomerRef) -> Self {
        self.customer = customer;
        self
    }

    pub fn with_window(mut self, window: DeliveryWindow) -> Self {
        self.delivery_window = Some(window);
        self
    }

    pub fn with_partial(mut self, allow: bool) -> Self {
        self.allow_partial = allow;
        self
    }

    pub fn key(&self) -> LineKey {
        LineKey::new(self.order_id.clone(), self.line_id.clone())
    }

    /// Ingestion checks; a line failing these never enters the pipeline.
    pub fn validate(&self) -> DomainResult<()> {
        if self.order_id.is_blank() {
            return Err(DomainError::validation("order id cannot be blank"));
        }
        if self.line_id.is_blank() {
            return Err(DomainError::validation("line id cannot be blank"));
        }
        if self.item.is_blank() {
            return Err(DomainError::validation("item code is required"));
        }
        if self.quantity <= 0 {
            return Err(DomainError::validation(format!(
                "quantity must be positive (got {})",
                self.quantity
            )));
        }
        if self.ship_from.as_ref().is_some_and(LocationCode::is_blank) {
            return Err(DomainError::validation("ship-from location cannot be blank"));
        }
        if let Some(window) = self.delivery_window {
            if window.start >= window.end {
                return Err(DomainError::validation("delivery window must start before it ends"));
            }
        }
        Ok(())
    }
}

/// Validate a batch: returns accepted lines (input order) and rejected lines
/// with their reason. A repeated (order, line) key rejects the later copy.
pub fn validate_batch(lines: Vec<OrderLine>) -> (Vec<OrderLine>, Vec<(LineKey, DomainError)>) {
    let mut seen = HashSet::new();
    let mut accepted = Vec::with_capacity(lines.len());
    let mut rejected = Vec::new();

    for line in lines {
        let key = line.key();
        if let Err(e) = line.validate() {
            rejected.push((key, e));
            continue;
        }
        if !seen.insert(key.clone()) {
            rejected.push((
                key.clone(),
                DomainError::conflict(format!("duplicate order line {key}")),
            ));
            continue;
        }
        accepted.push(line);
    }

    (accepted, rejected)
}

/// Group lines by order id, preserving first-seen order of orders and lines.
pub fn group_by_order(lines: &[OrderLine]) -> Vec<(OrderId, Vec<&OrderLine>)> {
    let mut index: HashMap<&OrderId, usize> = HashMap::new();
    let mut groups: Vec<(OrderId, Vec<&OrderLine>)> = Vec::new();

    for line in lines {
        match index.get(&line.order_id) {
            Some(&i) => groups[i].1.push(line),
            None => {
                index.insert(&line.order_id, groups.len());
                groups.push((line.order_id.clone(), vec![line]));
            }
        }
    }

    groups
}
