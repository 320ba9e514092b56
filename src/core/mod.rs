//! Core domain types for vista.
//!
//! Descriptors, tags and measurement maps that flow through the recording
//! path, plus configuration, errors and time sourcing.

pub mod clock;
pub mod config;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{Config, ConfigBuilder, RegistrationPolicy};
pub use error::{Result, StatsError};
pub use types::{
    AggregationDescriptor, BasicUnit, IntervalLength, MeasurementDescriptor, MeasurementMap,
    MeasurementUnit, TagKey, TagValue, Tags, ViewDescriptor, ViewKind,
};
