//! `promise-core`: shared building blocks for the order promise pipeline.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! identifiers, the domain error model, configuration, the business calendar,
//! the clock seam and the cancellation signal.

pub mod calendar;
pub mod cancel;
pub mod clock;
pub mod config;
pub mod error;
pub mod id;

pub use cancel::CancelSignal;
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{BackoffStrategy, CarrierConfig, Channel, PipelineConfig, Priority};
pub use error::{DomainError, DomainResult};
pub use id::{ItemCode, LineId, LineKey, LocationCode, OrderId};
