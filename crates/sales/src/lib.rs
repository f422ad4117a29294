//! Sales domain module (requested order lines).
//!
//! Order lines are the immutable input of the promise pipeline. This crate
//! owns their shape, ingestion validation and per-order grouping.

pub mod line;

pub use line::{CustomerRef, DeliveryWindow, OrderLine, group_by_order, validate_batch};
