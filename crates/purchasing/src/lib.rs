//! Purchasing domain module (open purchase orders as inbound supply).
//!
//! This crate contains the inbound side of availability, implemented purely as
//! deterministic domain logic (no IO, no HTTP, no storage).

pub mod order;

pub use order::{PurchaseOrder, PurchaseOrderId, inbound_supply};
