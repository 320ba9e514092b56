//! Live views and kind dispatch.
//!
//! A [`View`] is the runtime state of one [`ViewDescriptor`]. The set of kinds
//! is closed: [`View::create`] matches every [`AggregationDescriptor`] variant,
//! so a new kind does not compile until it is handled here.
//!
//! Values are grouped by the view's tag keys. Only the queue consumer writes
//! (`record` is crate-private); readers on other threads take the read side of
//! an uncontended lock.

use crate::core::types::{AggregationDescriptor, TagValue, Tags, ViewDescriptor, ViewKind};
use crate::stats::distribution::{Distribution, DistributionSnapshot};
use crate::stats::interval::{IntervalAggregation, IntervalSnapshot};
use ahash::AHashMap;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// Values of a view's tag keys, in tag-key order
type TagGroup = Vec<Option<TagValue>>;

/// Live aggregation bound to one view descriptor
#[derive(Debug)]
pub enum View {
    Distribution(DistributionView),
    Interval(IntervalView),
}

/// Distribution-backed view
#[derive(Debug)]
pub struct DistributionView {
    descriptor: ViewDescriptor,
    bucket_boundaries: Arc<[f64]>,
    start: SystemTime,
    end: Mutex<SystemTime>,
    groups: RwLock<AHashMap<TagGroup, Distribution>>,
}

/// Interval-backed view
#[derive(Debug)]
pub struct IntervalView {
    descriptor: ViewDescriptor,
    intervals: Vec<Duration>,
    sub_intervals: u32,
    start: SystemTime,
    groups: RwLock<AHashMap<TagGroup, IntervalAggregation>>,
}

/// Aggregate of one tag group
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupSnapshot<T> {
    pub tags: Tags,
    #[serde(flatten)]
    pub aggregate: T,
}

/// Read-only copy of a distribution view
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistributionViewSnapshot {
    pub view: String,
    #[serde(with = "humantime_serde")]
    pub start: SystemTime,
    #[serde(with = "humantime_serde")]
    pub end: SystemTime,
    pub groups: Vec<GroupSnapshot<DistributionSnapshot>>,
}

/// Read-only copy of an interval view
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntervalViewSnapshot {
    pub view: String,
    #[serde(with = "humantime_serde")]
    pub as_of: SystemTime,
    pub groups: Vec<GroupSnapshot<IntervalSnapshot>>,
}

/// Read-only copy of any view
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ViewSnapshot {
    Distribution(DistributionViewSnapshot),
    Interval(IntervalViewSnapshot),
}

fn tag_group(descriptor: &ViewDescriptor, tags: &Tags) -> TagGroup {
    descriptor
        .tag_keys()
        .iter()
        .map(|key| tags.get(key.as_str()).cloned())
        .collect()
}

fn group_tags(descriptor: &ViewDescriptor, group: &TagGroup) -> Tags {
    descriptor
        .tag_keys()
        .iter()
        .zip(group)
        .filter_map(|(key, value)| value.as_ref().map(|v| (key.clone(), v.clone())))
        .collect()
}

impl View {
    /// Instantiates the view matching the descriptor's kind
    pub fn create(descriptor: &ViewDescriptor, now: SystemTime) -> Self {
        match descriptor.aggregation() {
            AggregationDescriptor::Distribution { bucket_boundaries } => {
                View::Distribution(DistributionView::new(descriptor.clone(), bucket_boundaries, now))
            },
            AggregationDescriptor::Interval {
                intervals,
                sub_intervals,
            } => View::Interval(IntervalView::new(
                descriptor.clone(),
                intervals.iter().map(|i| i.0).collect(),
                *sub_intervals,
                now,
            )),
        }
    }

    pub fn descriptor(&self) -> &ViewDescriptor {
        match self {
            View::Distribution(view) => &view.descriptor,
            View::Interval(view) => &view.descriptor,
        }
    }

    pub fn kind(&self) -> ViewKind {
        match self {
            View::Distribution(_) => ViewKind::Distribution,
            View::Interval(_) => ViewKind::Interval,
        }
    }

    /// When the view was created
    pub fn start(&self) -> SystemTime {
        match self {
            View::Distribution(view) => view.start,
            View::Interval(view) => view.start,
        }
    }

    pub fn as_distribution(&self) -> Option<&DistributionView> {
        match self {
            View::Distribution(view) => Some(view),
            View::Interval(_) => None,
        }
    }

    pub fn as_interval(&self) -> Option<&IntervalView> {
        match self {
            View::Interval(view) => Some(view),
            View::Distribution(_) => None,
        }
    }

    /// Folds one value into the group selected by `tags`
    pub(crate) fn record(&self, tags: &Tags, value: f64, at: SystemTime) {
        match self {
            View::Distribution(view) => view.record(tags, value),
            View::Interval(view) => view.record(tags, value, at),
        }
    }

    /// Reads the current state; distribution views also move their end timestamp to `now`
    pub fn snapshot(&self, now: SystemTime) -> ViewSnapshot {
        match self {
            View::Distribution(view) => ViewSnapshot::Distribution(view.snapshot(now)),
            View::Interval(view) => ViewSnapshot::Interval(view.snapshot(now)),
        }
    }
}

impl DistributionView {
    fn new(descriptor: ViewDescriptor, bucket_boundaries: &[f64], now: SystemTime) -> Self {
        Self {
            descriptor,
            bucket_boundaries: Arc::from(bucket_boundaries),
            start: now,
            end: Mutex::new(now),
            groups: RwLock::new(AHashMap::new()),
        }
    }

    fn record(&self, tags: &Tags, value: f64) {
        let group = tag_group(&self.descriptor, tags);
        self.groups
            .write()
            .entry(group)
            .or_insert_with(|| Distribution::new(Arc::clone(&self.bucket_boundaries)))
            .add(value);
    }

    pub fn descriptor(&self) -> &ViewDescriptor {
        &self.descriptor
    }

    pub fn start(&self) -> SystemTime {
        self.start
    }

    /// End timestamp as of the last snapshot
    pub fn end(&self) -> SystemTime {
        *self.end.lock()
    }

    /// Number of values recorded across all tag groups
    pub fn total_count(&self) -> u64 {
        self.groups.read().values().map(Distribution::count).sum()
    }

    /// Aggregate of the group `tags` falls into
    pub fn distribution_for(&self, tags: &Tags) -> Option<DistributionSnapshot> {
        let group = tag_group(&self.descriptor, tags);
        self.groups.read().get(&group).map(Distribution::snapshot)
    }

    pub fn snapshot(&self, now: SystemTime) -> DistributionViewSnapshot {
        let end = {
            let mut end = self.end.lock();
            *end = (*end).max(now);
            *end
        };

        let mut groups: Vec<_> = self
            .groups
            .read()
            .iter()
            .map(|(group, dist)| GroupSnapshot {
                tags: group_tags(&self.descriptor, group),
                aggregate: dist.snapshot(),
            })
            .collect();
        groups.sort_by(|a, b| a.tags.iter().cmp(b.tags.iter()));

        DistributionViewSnapshot {
            view: self.descriptor.name().to_string(),
            start: self.start,
            end,
            groups,
        }
    }
}

impl IntervalView {
    fn new(
        descriptor: ViewDescriptor,
        intervals: Vec<Duration>,
        sub_intervals: u32,
        now: SystemTime,
    ) -> Self {
        Self {
            descriptor,
            intervals,
            sub_intervals,
            start: now,
            groups: RwLock::new(AHashMap::new()),
        }
    }

    fn record(&self, tags: &Tags, value: f64, at: SystemTime) {
        let group = tag_group(&self.descriptor, tags);
        self.groups
            .write()
            .entry(group)
            .or_insert_with(|| IntervalAggregation::new(&self.intervals, self.sub_intervals))
            .add(value, at);
    }

    pub fn descriptor(&self) -> &ViewDescriptor {
        &self.descriptor
    }

    pub fn start(&self) -> SystemTime {
        self.start
    }

    /// Windows of the group `tags` falls into, as of `now`
    pub fn interval_for(&self, tags: &Tags, now: SystemTime) -> Option<IntervalSnapshot> {
        let group = tag_group(&self.descriptor, tags);
        self.groups.read().get(&group).map(|agg| agg.snapshot(now))
    }

    pub fn snapshot(&self, now: SystemTime) -> IntervalViewSnapshot {
        let mut groups: Vec<_> = self
            .groups
            .read()
            .iter()
            .map(|(group, agg)| GroupSnapshot {
                tags: group_tags(&self.descriptor, group),
                aggregate: agg.snapshot(now),
            })
            .collect();
        groups.sort_by(|a, b| a.tags.iter().cmp(b.tags.iter()));

        IntervalViewSnapshot {
            view: self.descriptor.name().to_string(),
            as_of: now,
            groups,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{MeasurementDescriptor, MeasurementUnit, TagKey};
    use std::time::UNIX_EPOCH;

    fn now() -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(1_700_000_000)
    }

    fn descriptor(aggregation: AggregationDescriptor) -> ViewDescriptor {
        ViewDescriptor::new(
            "latency.view",
            "",
            MeasurementDescriptor::new("latency_ms", "", MeasurementUnit::millis()),
            aggregation,
            vec![TagKey::new("method").unwrap()],
        )
    }

    #[test]
    fn test_dispatch_matches_kind() {
        let dist = View::create(&descriptor(AggregationDescriptor::distribution(vec![1.0])), now());
        assert_eq!(dist.kind(), ViewKind::Distribution);
        assert!(dist.as_distribution().is_some());
        assert!(dist.as_interval().is_none());

        let interval = View::create(
            &descriptor(AggregationDescriptor::interval(vec![Duration::from_secs(60)])),
            now(),
        );
        assert_eq!(interval.kind(), ViewKind::Interval);
        assert!(interval.as_interval().is_some());
        assert_eq!(interval.start(), now());
    }

    #[test]
    fn test_distribution_view_groups_by_tag_keys() {
        let view = View::create(&descriptor(AggregationDescriptor::distribution(vec![])), now());
        let get = Tags::from_pairs([("method", "GET"), ("host", "a")]).unwrap();
        let get_other_host = Tags::from_pairs([("method", "GET"), ("host", "b")]).unwrap();
        let post = Tags::from_pairs([("method", "POST")]).unwrap();

        view.record(&get, 1.0, now());
        view.record(&get_other_host, 2.0, now());
        view.record(&post, 3.0, now());
        view.record(&Tags::new(), 4.0, now());

        let dist = view.as_distribution().unwrap();
        assert_eq!(dist.total_count(), 4);
        assert_eq!(dist.distribution_for(&get).unwrap().count, 2);
        assert_eq!(dist.distribution_for(&post).unwrap().sum, 3.0);

        let snapshot = dist.snapshot(now());
        assert_eq!(snapshot.groups.len(), 3);
        assert!(snapshot.groups[0].tags.is_empty());
        assert_eq!(
            snapshot.groups[1].tags.get("method").map(TagValue::as_str),
            Some("GET")
        );
    }

    #[test]
    fn test_snapshot_moves_end_timestamp() {
        let view = View::create(&descriptor(AggregationDescriptor::distribution(vec![])), now());
        let dist = view.as_distribution().unwrap();
        assert_eq!(dist.end(), now());

        let later = now() + Duration::from_secs(30);
        let snapshot = dist.snapshot(later);
        assert_eq!(snapshot.start, now());
        assert_eq!(snapshot.end, later);
        assert_eq!(dist.end(), later);
    }

    #[test]
    fn test_interval_view_records_at_event_time() {
        let view = View::create(
            &descriptor(AggregationDescriptor::interval(vec![Duration::from_secs(60)])),
            now(),
        );
        let tags = Tags::from_pairs([("method", "GET")]).unwrap();
        view.record(&tags, 10.0, now());
        view.record(&tags, 30.0, now() + Duration::from_secs(5));

        let interval = view.as_interval().unwrap();
        let windows = interval.interval_for(&tags, now() + Duration::from_secs(5)).unwrap();
        assert_eq!(windows.windows[0].count, 2);
        assert_eq!(windows.windows[0].mean, Some(20.0));

        let expired = interval.interval_for(&tags, now() + Duration::from_secs(600)).unwrap();
        assert_eq!(expired.windows[0].count, 0);
    }

    #[test]
    fn test_snapshot_serializes_with_kind() {
        let view = View::create(&descriptor(AggregationDescriptor::distribution(vec![10.0])), now());
        view.record(&Tags::new(), 5.0, now());
        let json = serde_json::to_value(view.snapshot(now())).unwrap();
        assert_eq!(json["kind"], "distribution");
        assert_eq!(json["view"], "latency.view");
        assert_eq!(json["groups"][0]["count"], 1);
    }
}
