use crate::core::error::{Result, StatsError};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Maximum length of a tag key or tag value
pub const MAX_TAG_LENGTH: usize = 255;

/// Default number of sub-buckets an interval window is split into
pub const DEFAULT_SUB_INTERVALS: u32 = 4;

/// Base units a measurement can be expressed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BasicUnit {
    Scalar,
    Bits,
    Bytes,
    Seconds,
    Cores,
}

impl BasicUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            BasicUnit::Scalar => "1",
            BasicUnit::Bits => "bit",
            BasicUnit::Bytes => "By",
            BasicUnit::Seconds => "s",
            BasicUnit::Cores => "cores",
        }
    }
}

/// Unit of a measurement: `10^power10 * product(numerators) / product(denominators)`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MeasurementUnit {
    #[serde(default)]
    pub power10: i32,
    #[serde(default)]
    pub numerators: Vec<BasicUnit>,
    #[serde(default)]
    pub denominators: Vec<BasicUnit>,
}

impl MeasurementUnit {
    pub fn new(power10: i32, numerators: Vec<BasicUnit>, denominators: Vec<BasicUnit>) -> Self {
        Self {
            power10,
            numerators,
            denominators,
        }
    }

    /// Dimensionless unit
    pub fn scalar() -> Self {
        Self::new(0, vec![BasicUnit::Scalar], Vec::new())
    }

    /// Milliseconds
    pub fn millis() -> Self {
        Self::new(-3, vec![BasicUnit::Seconds], Vec::new())
    }
}

impl fmt::Display for MeasurementUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.power10 != 0 {
            write!(f, "10^{}", self.power10)?;
        }
        let join = |units: &[BasicUnit]| {
            units.iter().map(BasicUnit::as_str).collect::<Vec<_>>().join(".")
        };
        if !self.numerators.is_empty() {
            if self.power10 != 0 {
                write!(f, ".")?;
            }
            write!(f, "{}", join(&self.numerators))?;
        }
        if !self.denominators.is_empty() {
            write!(f, "/{}", join(&self.denominators))?;
        }
        Ok(())
    }
}

/// A named, unit-typed quantity that can be measured.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MeasurementDescriptor {
    name: String,
    #[serde(default)]
    description: String,
    unit: MeasurementUnit,
}

impl MeasurementDescriptor {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        unit: MeasurementUnit,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            unit,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn unit(&self) -> &MeasurementUnit {
        &self.unit
    }
}

fn validate_tag_text(kind: &str, text: &str) -> Result<()> {
    if text.len() > MAX_TAG_LENGTH {
        return Err(StatsError::invalid_tag(format!(
            "{} cannot exceed {} characters, got {}",
            kind,
            MAX_TAG_LENGTH,
            text.len()
        )));
    }
    if let Some(c) = text.chars().find(|c| !(' '..='~').contains(c)) {
        return Err(StatsError::invalid_tag(format!(
            "{} contains non-printable character {:?}",
            kind, c
        )));
    }
    Ok(())
}

/// Key of a tag
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TagKey(String);

/// Value of a tag
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TagValue(String);

impl TagKey {
    /// Creates a new TagKey after validation
    pub fn new(key: impl Into<String>) -> Result<Self> {
        let key = key.into();
        if key.is_empty() {
            return Err(StatsError::invalid_tag("TagKey cannot be empty"));
        }
        validate_tag_text("TagKey", &key)?;
        Ok(TagKey(key))
    }

    /// Key known to be valid at compile time
    pub(crate) fn from_static(key: &'static str) -> Self {
        debug_assert!(TagKey::new(key).is_ok(), "invalid static tag key {:?}", key);
        TagKey(key.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TagValue {
    /// Creates a new TagValue after validation
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        validate_tag_text("TagValue", &value)?;
        Ok(TagValue(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for TagKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for TagKey {
    type Error = StatsError;

    fn try_from(key: String) -> Result<Self> {
        TagKey::new(key)
    }
}

impl TryFrom<String> for TagValue {
    type Error = StatsError;

    fn try_from(value: String) -> Result<Self> {
        TagValue::new(value)
    }
}

impl From<TagKey> for String {
    fn from(key: TagKey) -> Self {
        key.0
    }
}

impl From<TagValue> for String {
    fn from(value: TagValue) -> Self {
        value.0
    }
}

impl fmt::Display for TagKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for TagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Key/value context captured for one `record` call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tags(BTreeMap<TagKey, TagValue>);

impl Tags {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds tags from string pairs, validating every key and value
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut tags = Self::new();
        for (key, value) in pairs {
            tags.insert(TagKey::new(key)?, TagValue::new(value)?);
        }
        Ok(tags)
    }

    /// Inserts a tag, replacing any previous value for the key
    pub fn insert(&mut self, key: TagKey, value: TagValue) -> Option<TagValue> {
        self.0.insert(key, value)
    }

    pub fn get(&self, key: &str) -> Option<&TagValue> {
        self.0.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TagKey, &TagValue)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(TagKey, TagValue)> for Tags {
    fn from_iter<T: IntoIterator<Item = (TagKey, TagValue)>>(iter: T) -> Self {
        Tags(iter.into_iter().collect())
    }
}

/// One recorded value
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    pub descriptor: MeasurementDescriptor,
    pub value: f64,
}

/// Values submitted by one `record` call, at most one per measurement name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeasurementMap {
    measurements: Vec<Measurement>,
}

impl MeasurementMap {
    pub fn builder() -> MeasurementMapBuilder {
        MeasurementMapBuilder::default()
    }

    /// Map holding a single value
    pub fn of(descriptor: &MeasurementDescriptor, value: f64) -> Self {
        Self::builder().put(descriptor, value).build()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Measurement> {
        self.measurements.iter()
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.measurements
            .iter()
            .find(|m| m.descriptor.name() == name)
            .map(|m| m.value)
    }

    pub fn len(&self) -> usize {
        self.measurements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.measurements.is_empty()
    }
}

impl<'a> IntoIterator for &'a MeasurementMap {
    type Item = &'a Measurement;
    type IntoIter = std::slice::Iter<'a, Measurement>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Builder for [`MeasurementMap`]
#[derive(Debug, Default)]
pub struct MeasurementMapBuilder {
    measurements: Vec<Measurement>,
}

impl MeasurementMapBuilder {
    /// Adds a value; a later value for the same measurement name replaces the earlier one
    pub fn put(mut self, descriptor: &MeasurementDescriptor, value: f64) -> Self {
        match self
            .measurements
            .iter_mut()
            .find(|m| m.descriptor.name() == descriptor.name())
        {
            Some(existing) => {
                existing.descriptor = descriptor.clone();
                existing.value = value;
            },
            None => self.measurements.push(Measurement {
                descriptor: descriptor.clone(),
                value,
            }),
        }
        self
    }

    pub fn build(self) -> MeasurementMap {
        MeasurementMap {
            measurements: self.measurements,
        }
    }
}

/// Length of one trailing window of an interval view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IntervalLength(#[serde(with = "humantime_serde")] pub Duration);

impl From<Duration> for IntervalLength {
    fn from(duration: Duration) -> Self {
        IntervalLength(duration)
    }
}

/// Kind of a view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewKind {
    Distribution,
    Interval,
}

impl fmt::Display for ViewKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViewKind::Distribution => write!(f, "distribution"),
            ViewKind::Interval => write!(f, "interval"),
        }
    }
}

/// Kind-specific parameters of a view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum AggregationDescriptor {
    /// Distribution with explicit bucket boundaries
    Distribution {
        #[serde(default)]
        bucket_boundaries: Vec<f64>,
    },
    /// Trailing time windows
    Interval {
        intervals: Vec<IntervalLength>,
        #[serde(default = "default_sub_intervals")]
        sub_intervals: u32,
    },
}

fn default_sub_intervals() -> u32 {
    DEFAULT_SUB_INTERVALS
}

impl AggregationDescriptor {
    pub fn distribution(bucket_boundaries: Vec<f64>) -> Self {
        AggregationDescriptor::Distribution { bucket_boundaries }
    }

    pub fn interval(intervals: Vec<Duration>) -> Self {
        AggregationDescriptor::Interval {
            intervals: intervals.into_iter().map(IntervalLength).collect(),
            sub_intervals: DEFAULT_SUB_INTERVALS,
        }
    }

    pub fn kind(&self) -> ViewKind {
        match self {
            AggregationDescriptor::Distribution { .. } => ViewKind::Distribution,
            AggregationDescriptor::Interval { .. } => ViewKind::Interval,
        }
    }
}

/// A named aggregation over exactly one measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewDescriptor {
    name: String,
    #[serde(default)]
    description: String,
    measurement: MeasurementDescriptor,
    #[serde(default)]
    tag_keys: Vec<TagKey>,
    aggregation: AggregationDescriptor,
}

impl ViewDescriptor {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        measurement: MeasurementDescriptor,
        aggregation: AggregationDescriptor,
        tag_keys: Vec<TagKey>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            measurement,
            tag_keys,
            aggregation,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn measurement(&self) -> &MeasurementDescriptor {
        &self.measurement
    }

    pub fn tag_keys(&self) -> &[TagKey] {
        &self.tag_keys
    }

    pub fn aggregation(&self) -> &AggregationDescriptor {
        &self.aggregation
    }

    pub fn kind(&self) -> ViewKind {
        self.aggregation.kind()
    }

    /// Checks the structural parameters a view needs to be instantiated
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(StatsError::invalid_descriptor("view name cannot be empty"));
        }
        if self.measurement.name().is_empty() {
            return Err(StatsError::invalid_descriptor(format!(
                "view {} has a measurement with an empty name",
                self.name
            )));
        }

        match &self.aggregation {
            AggregationDescriptor::Distribution { bucket_boundaries } => {
                if bucket_boundaries.iter().any(|b| !b.is_finite()) {
                    return Err(StatsError::invalid_descriptor(format!(
                        "view {} has a non-finite bucket boundary",
                        self.name
                    )));
                }
                if bucket_boundaries.windows(2).any(|w| w[0] >= w[1]) {
                    return Err(StatsError::invalid_descriptor(format!(
                        "view {} bucket boundaries must be strictly increasing",
                        self.name
                    )));
                }
            },
            AggregationDescriptor::Interval {
                intervals,
                sub_intervals,
            } => {
                if intervals.is_empty() {
                    return Err(StatsError::invalid_descriptor(format!(
                        "view {} needs at least one interval",
                        self.name
                    )));
                }
                if *sub_intervals == 0 {
                    return Err(StatsError::invalid_descriptor(format!(
                        "view {} sub_intervals must be greater than 0",
                        self.name
                    )));
                }
                if let Some(bad) = intervals
                    .iter()
                    .find(|i| i.0.as_nanos() < u128::from(*sub_intervals))
                {
                    return Err(StatsError::invalid_descriptor(format!(
                        "view {} interval {:?} is too short for {} sub-intervals",
                        self.name, bad.0, sub_intervals
                    )));
                }
            },
        }

        Ok(())
    }
}

impl fmt::Display for ViewDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} over {})", self.name, self.kind(), self.measurement.name())
    }
}
