//! Distribution accumulator.
//!
//! Tracks count, sum, mean and sum of squared deviations (Welford), the value
//! range, counts per explicit bucket, and a CKMS quantile estimate.
//! Mutated only by the queue consumer.

use quantiles::ckms::CKMS;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// CKMS error bound for quantile estimates
const QUANTILE_ERROR: f64 = 0.001;

/// Running distribution of recorded values
pub struct Distribution {
    count: u64,
    sum: f64,
    mean: f64,
    sum_of_squared_deviations: f64,
    min: f64,
    max: f64,
    bucket_boundaries: Arc<[f64]>,
    bucket_counts: Vec<u64>,
    quantiles: CKMS<f64>,
}

/// One bucket of a distribution: `[lower, upper)`, unbounded where `None`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BucketCount {
    pub lower: Option<f64>,
    pub upper: Option<f64>,
    pub count: u64,
}

/// Read-only copy of a [`Distribution`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistributionSnapshot {
    pub count: u64,
    pub sum: f64,
    pub mean: f64,
    pub sum_of_squared_deviations: f64,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub buckets: Vec<BucketCount>,
    pub p50: Option<f64>,
    pub p95: Option<f64>,
    pub p99: Option<f64>,
}

impl Distribution {
    /// Creates an empty distribution. `bucket_boundaries` must be strictly increasing.
    pub fn new(bucket_boundaries: Arc<[f64]>) -> Self {
        let buckets = bucket_boundaries.len() + 1;
        Self {
            count: 0,
            sum: 0.0,
            mean: 0.0,
            sum_of_squared_deviations: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            bucket_boundaries,
            bucket_counts: vec![0; buckets],
            quantiles: CKMS::new(QUANTILE_ERROR),
        }
    }

    /// Adds a finite value
    pub fn add(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;

        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.sum_of_squared_deviations += delta * (value - self.mean);

        self.min = self.min.min(value);
        self.max = self.max.max(value);

        // First bucket whose upper boundary is greater than the value
        let idx = self.bucket_boundaries.partition_point(|b| *b <= value);
        self.bucket_counts[idx] += 1;

        self.quantiles.insert(value);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn sum(&self) -> f64 {
        self.sum
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    pub fn min(&self) -> Option<f64> {
        (self.count > 0).then_some(self.min)
    }

    pub fn max(&self) -> Option<f64> {
        (self.count > 0).then_some(self.max)
    }

    /// Population variance, zero when empty
    pub fn variance(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum_of_squared_deviations / self.count as f64
        }
    }

    pub fn bucket_counts(&self) -> &[u64] {
        &self.bucket_counts
    }

    /// Estimated value at quantile `q` in `[0, 1]`
    pub fn quantile(&self, q: f64) -> Option<f64> {
        self.quantiles.query(q).map(|(_, value)| value)
    }

    pub fn snapshot(&self) -> DistributionSnapshot {
        let buckets = self
            .bucket_counts
            .iter()
            .enumerate()
            .map(|(i, &count)| BucketCount {
                lower: i.checked_sub(1).map(|j| self.bucket_boundaries[j]),
                upper: self.bucket_boundaries.get(i).copied(),
                count,
            })
            .collect();

        DistributionSnapshot {
            count: self.count,
            sum: self.sum,
            mean: self.mean,
            sum_of_squared_deviations: self.sum_of_squared_deviations,
            min: self.min(),
            max: self.max(),
            buckets,
            p50: self.quantile(0.5),
            p95: self.quantile(0.95),
            p99: self.quantile(0.99),
        }
    }
}

impl fmt::Debug for Distribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Distribution")
            .field("count", &self.count)
            .field("sum", &self.sum)
            .field("mean", &self.mean)
            .field("min", &self.min())
            .field("max", &self.max())
            .field("bucket_counts", &self.bucket_counts)
            .finish()
    }
}
