//! Trailing-window accumulator for interval views.
//!
//! Each configured interval of length `L` is a ring of `n` sub-buckets of width
//! `L / n`. A value recorded at `t` lands in sub-bucket `floor(t / width)`; a
//! slot is reset when a newer sub-bucket reuses it. A window read at `now`
//! covers the `n` most recent sub-buckets, the current partial one included.

use serde::Serialize;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Copy, Default)]
struct Bucket {
    index: Option<u128>,
    count: u64,
    sum: f64,
}

#[derive(Debug, Clone)]
struct Window {
    length: Duration,
    width_nanos: u128,
    buckets: Vec<Bucket>,
}

/// Count and sum over one trailing window
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindowSnapshot {
    #[serde(with = "humantime_serde")]
    pub length: Duration,
    pub count: u64,
    pub sum: f64,
    pub mean: Option<f64>,
}

/// Read-only copy of an [`IntervalAggregation`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntervalSnapshot {
    pub windows: Vec<WindowSnapshot>,
}

/// Per-interval sliding windows
#[derive(Debug, Clone)]
pub struct IntervalAggregation {
    windows: Vec<Window>,
}

fn nanos_since_epoch(at: SystemTime) -> u128 {
    at.duration_since(UNIX_EPOCH).unwrap_or_default().as_nanos()
}

impl Window {
    fn new(length: Duration, sub_intervals: u32) -> Self {
        let width_nanos = (length.as_nanos() / u128::from(sub_intervals)).max(1);
        Self {
            length,
            width_nanos,
            buckets: vec![Bucket::default(); sub_intervals as usize],
        }
    }

    fn slot(&self, index: u128) -> usize {
        // Remainder is below buckets.len(), which came from a u32
        (index % self.buckets.len() as u128) as usize
    }

    fn add(&mut self, value: f64, at: SystemTime) {
        let index = nanos_since_epoch(at) / self.width_nanos;
        let slot = self.slot(index);
        let bucket = &mut self.buckets[slot];

        match bucket.index {
            Some(current) if current == index => {},
            // Slot already tracks a newer sub-interval; the value has aged out
            Some(current) if current > index => return,
            _ => {
                *bucket = Bucket {
                    index: Some(index),
                    count: 0,
                    sum: 0.0,
                };
            },
        }

        bucket.count += 1;
        bucket.sum += value;
    }

    fn snapshot(&self, now: SystemTime) -> WindowSnapshot {
        let newest = nanos_since_epoch(now) / self.width_nanos;
        let oldest = newest.saturating_sub(self.buckets.len() as u128 - 1);

        let (count, sum) = self
            .buckets
            .iter()
            .filter(|b| b.index.is_some_and(|i| i >= oldest && i <= newest))
            .fold((0u64, 0.0f64), |(count, sum), b| (count + b.count, sum + b.sum));

        WindowSnapshot {
            length: self.length,
            count,
            sum,
            mean: (count > 0).then(|| sum / count as f64),
        }
    }
}

impl IntervalAggregation {
    /// Creates empty windows; `sub_intervals` of zero is treated as one
    pub fn new(intervals: &[Duration], sub_intervals: u32) -> Self {
        let sub_intervals = sub_intervals.max(1);
        Self {
            windows: intervals
                .iter()
                .map(|length| Window::new(*length, sub_intervals))
                .collect(),
        }
    }

    /// Adds a finite value recorded at `at`
    pub fn add(&mut self, value: f64, at: SystemTime) {
        for window in &mut self.windows {
            window.add(value, at);
        }
    }

    /// Totals of every window as of `now`
    pub fn snapshot(&self, now: SystemTime) -> IntervalSnapshot {
        IntervalSnapshot {
            windows: self.windows.iter().map(|w| w.snapshot(now)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(secs: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(1_700_000_000 + secs)
    }

    #[test]
    fn test_values_within_window() {
        let mut agg = IntervalAggregation::new(&[Duration::from_secs(60)], 4);
        agg.add(10.0, t(0));
        agg.add(20.0, t(10));
        agg.add(30.0, t(20));

        let snapshot = agg.snapshot(t(20));
        assert_eq!(snapshot.windows.len(), 1);
        assert_eq!(snapshot.windows[0].count, 3);
        assert_eq!(snapshot.windows[0].sum, 60.0);
        assert_eq!(snapshot.windows[0].mean, Some(20.0));
    }

    #[test]
    fn test_old_values_expire() {
        let mut agg = IntervalAggregation::new(&[Duration::from_secs(60)], 4);
        agg.add(10.0, t(0));
        agg.add(20.0, t(70));

        let snapshot = agg.snapshot(t(70));
        assert_eq!(snapshot.windows[0].count, 1);
        assert_eq!(snapshot.windows[0].sum, 20.0);

        let later = agg.snapshot(t(500));
        assert_eq!(later.windows[0].count, 0);
        assert_eq!(later.windows[0].mean, None);
    }

    #[test]
    fn test_slot_reuse_resets_bucket() {
        // 4 sub-buckets of 15s: t=0 and t=60 share a slot
        let mut agg = IntervalAggregation::new(&[Duration::from_secs(60)], 4);
        agg.add(1.0, t(0));
        agg.add(2.0, t(60));
        agg.add(4.0, t(1));

        let snapshot = agg.snapshot(t(60));
        assert_eq!(snapshot.windows[0].count, 1);
        assert_eq!(snapshot.windows[0].sum, 2.0);
    }

    #[test]
    fn test_multiple_intervals() {
        let mut agg = IntervalAggregation::new(
            &[Duration::from_secs(60), Duration::from_secs(3600)],
            4,
        );
        agg.add(5.0, t(0));
        agg.add(7.0, t(600));

        let snapshot = agg.snapshot(t(600));
        assert_eq!(snapshot.windows[0].count, 1);
        assert_eq!(snapshot.windows[1].count, 2);
        assert_eq!(snapshot.windows[1].sum, 12.0);
    }
}
