//! Vista - asynchronous stats recording.
//!
//! Vista lets instrumented code record numeric measurements, tagged with
//! key/value context, without waiting for them to be aggregated. Values are
//! handed to a single-consumer event queue and folded, in submission order,
//! into every view registered for their measurement.
//!
//! # Features
//!
//! - **Fire-and-forget recording**: `record` only enqueues
//! - **Distribution views**: count, mean, range, explicit buckets and percentiles
//! - **Interval views**: count and sum over trailing time windows
//! - **Tag grouping**: one aggregate per combination of a view's tag keys
//!
//! # Architecture
//!
//! - `core`: Descriptors, tags, errors and configuration
//! - `queue`: Single-consumer event queue
//! - `stats`: Views, the view registry and the `StatsManager` facade
//! - `cli`: Command-line interface
//!
//! # Example
//!
//! ```no_run
//! use vista_lib::core::{MeasurementMap, Tags};
//! use vista_lib::stats::{presets, StatsManager};
//!
//! fn main() -> vista_lib::Result<()> {
//!     let manager = StatsManager::new();
//!     manager.register_view(presets::rpc_client_roundtrip_latency_view())?;
//!
//!     let tags = Tags::from_pairs([(presets::RPC_METHOD, "GetUser")])?;
//!     manager.record(tags, MeasurementMap::of(presets::rpc_client_roundtrip_latency(), 12.5))?;
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod cli;
pub mod core;
pub mod queue;
pub mod stats;

// Re-export core types for convenience
pub use crate::core::{Config, Result, StatsError};
pub use crate::stats::StatsManager;
