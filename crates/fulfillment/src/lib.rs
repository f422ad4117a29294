//! Fulfillment decisions: availability-to-promise, delivery scheduling and
//! split-shipment planning.
//!
//! Everything here is pure and deterministic given its inputs (supply
//! snapshot, reference date, configuration and the per-line random source).

pub mod availability;
pub mod reservation;
pub mod schedule;
pub mod split;

pub use availability::{
    Allocation, AtpResult, AtpStatus, AvailabilityEngine, SupplySnapshot, SupplySource,
};
pub use reservation::SupplyReservations;
pub use schedule::{DeliveryScheduler, LineRng, ScheduleResult};
pub use split::{Shipment, ShipmentStatus, SplitDecision, SplitPlanner, SplitReason};
