//! Preset measurement and view accepted under the default registration policy.

use crate::core::types::{
    AggregationDescriptor, MeasurementDescriptor, MeasurementUnit, TagKey, ViewDescriptor,
};
use once_cell::sync::Lazy;

/// Tag key carrying the RPC method name
pub const RPC_METHOD: &str = "method";

/// Bucket boundaries (ms) for RPC latency distributions
pub const RPC_MILLIS_BUCKET_BOUNDARIES: &[f64] = &[
    0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 8.0, 10.0, 13.0, 16.0, 20.0, 25.0, 30.0, 40.0, 50.0, 65.0,
    80.0, 100.0, 130.0, 160.0, 200.0, 250.0, 300.0, 400.0, 500.0, 650.0, 800.0, 1000.0, 2000.0,
    5000.0, 10000.0, 20000.0, 50000.0, 100000.0,
];

static RPC_CLIENT_ROUNDTRIP_LATENCY: Lazy<MeasurementDescriptor> = Lazy::new(|| {
    MeasurementDescriptor::new(
        "/rpc/client/roundtrip_latency",
        "RPC roundtrip latency msec",
        MeasurementUnit::millis(),
    )
});

static RPC_CLIENT_ROUNDTRIP_LATENCY_VIEW: Lazy<ViewDescriptor> = Lazy::new(|| {
    ViewDescriptor::new(
        "/rpc/client/roundtrip_latency/distribution_cumulative",
        "Latency distribution",
        RPC_CLIENT_ROUNDTRIP_LATENCY.clone(),
        AggregationDescriptor::distribution(RPC_MILLIS_BUCKET_BOUNDARIES.to_vec()),
        vec![TagKey::from_static(RPC_METHOD)],
    )
});

/// Client-side RPC round-trip latency in milliseconds
pub fn rpc_client_roundtrip_latency() -> &'static MeasurementDescriptor {
    &RPC_CLIENT_ROUNDTRIP_LATENCY
}

/// Cumulative distribution of [`rpc_client_roundtrip_latency`] grouped by method
pub fn rpc_client_roundtrip_latency_view() -> &'static ViewDescriptor {
    &RPC_CLIENT_ROUNDTRIP_LATENCY_VIEW
}
