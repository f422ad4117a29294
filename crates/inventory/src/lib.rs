//! Inventory snapshots and stock positions.
//!
//! This crate contains the on-hand side of availability, implemented purely as
//! deterministic domain logic (no IO, no HTTP, no storage).

pub mod snapshot;

pub use snapshot::{InventorySnapshot, StockPosition, matching_rows};
