//! Infrastructure layer: collaborator seams, worker pool, dispatch and batch
//! orchestration.
//!
//! This is the only crate that spawns threads or talks to the outside world
//! (supply data provider, confirmation transport). Domain decisions are
//! delegated to the pure crates.

pub mod dispatcher;
pub mod pipeline;
pub mod pool;
pub mod provider;
pub mod retry;
pub mod tool;
pub mod transport;

pub use dispatcher::Dispatcher;
pub use pipeline::{BatchReport, LineError, LineFailure, OrderPipeline};
pub use pool::map_bounded;
pub use provider::{DataError, DataProvider, InMemoryDataProvider, fetch_with_timeout};
pub use retry::RetryPolicy;
pub use transport::{ScriptedTransport, SendReceipt, Transport, TransportError};
