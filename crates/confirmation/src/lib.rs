//! Order confirmations (pure domain logic, no IO).
//!
//! Aggregates the shipment plans of every line of an order into one
//! customer-facing confirmation with a generated number and a rendered
//! document, and tracks the dispatch state of each confirmation.

pub mod confirmation;
pub mod dispatch;
pub mod document;

pub use confirmation::{Confirmation, ShipmentDetail, compose, compose_order, confirmation_number};
pub use dispatch::{DispatchAttempt, DispatchResult, DispatchStatus};
pub use document::{TERMS, render};
