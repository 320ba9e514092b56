//! Views, their aggregations and the recording facade.

pub mod distribution;
pub mod interval;
pub mod manager;
pub mod presets;
pub mod registry;
pub mod view;

pub use distribution::{Distribution, DistributionSnapshot};
pub use interval::{IntervalAggregation, IntervalSnapshot};
pub use manager::StatsManager;
pub use registry::{ViewRegistry, ViewSet};
pub use view::{DistributionView, IntervalView, View, ViewSnapshot};
