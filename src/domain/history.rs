//! Weather/telemetry history owned by the engine
//!
//! Records are kept ordered by timestamp in a bounded window. A record
//! without an actual value is a pending prediction and is ignored by
//! training until its ground truth arrives.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

/// Loosely-typed numeric snapshot as delivered by the host (weather
/// service attributes or sensor states).
///
/// Values may be JSON numbers or numeric strings; anything else reads as
/// missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot(BTreeMap<String, Value>);

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// Finite numeric value for `key`, if present and parseable
    pub fn number(&self, key: &str) -> Option<f64> {
        let value = match self.0.get(key)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }?;
        value.is_finite().then_some(value)
    }

    pub fn number_or(&self, key: &str, default: f64) -> f64 {
        self.number(key).unwrap_or(default)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, f64)> for Snapshot {
    fn from_iter<I: IntoIterator<Item = (K, f64)>>(iter: I) -> Self {
        let mut snapshot = Snapshot::new();
        for (key, value) in iter {
            snapshot.insert(key, value);
        }
        snapshot
    }
}

/// One forecast interval: what was predicted, what happened, and the
/// conditions at the time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub timestamp: DateTime<Utc>,
    pub predicted_value: f64,
    pub actual_value: Option<f64>,
    pub weather: Snapshot,
    pub sensors: Snapshot,
}

impl HistoryRecord {
    pub fn new(timestamp: DateTime<Utc>, predicted_value: f64, weather: Snapshot, sensors: Snapshot) -> Self {
        Self {
            timestamp,
            predicted_value: predicted_value.max(0.0),
            actual_value: None,
            weather,
            sensors,
        }
    }

    pub fn with_actual(mut self, actual: f64) -> Self {
        self.actual_value = Some(actual.max(0.0));
        self
    }

    /// Usable ground truth; non-finite values count as missing
    pub fn actual(&self) -> Option<f64> {
        self.actual_value.filter(|v| v.is_finite())
    }

    pub fn is_pending(&self) -> bool {
        self.actual().is_none()
    }
}

/// Bounded, time-ordered history buffer.
#[derive(Debug, Clone)]
pub struct HistoryBuffer {
    records: Vec<HistoryRecord>,
    max_records: usize,
    max_age: Duration,
}

impl HistoryBuffer {
    pub fn new(max_records: usize, max_age: Duration) -> Self {
        Self {
            records: Vec::new(),
            max_records: max_records.max(1),
            max_age,
        }
    }

    /// Insert a record, keeping timestamp order, then evict oldest-first.
    pub fn push(&mut self, record: HistoryRecord) {
        let idx = self
            .records
            .partition_point(|r| r.timestamp <= record.timestamp);
        self.records.insert(idx, record);
        self.evict();
    }

    /// Attach ground truth to the record at `timestamp`.
    ///
    /// Returns false when no such record is held.
    pub fn record_actual(&mut self, timestamp: DateTime<Utc>, actual: f64) -> bool {
        let idx = self.records.partition_point(|r| r.timestamp < timestamp);
        match self.records.get_mut(idx) {
            Some(record) if record.timestamp == timestamp => {
                record.actual_value = Some(actual.max(0.0));
                true
            }
            _ => false,
        }
    }

    fn evict(&mut self) {
        let over_count = self.records.len().saturating_sub(self.max_records);
        let too_old = match self.records.last() {
            Some(newest) => {
                let cutoff = newest.timestamp - self.max_age;
                self.records.partition_point(|r| r.timestamp < cutoff)
            }
            None => 0,
        };
        let evicted = over_count.max(too_old);
        if evicted > 0 {
            self.records.drain(..evicted);
            debug!(evicted, retained = self.records.len(), "history window trimmed");
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &HistoryRecord> {
        self.records.iter()
    }

    /// Number of records with usable ground truth
    pub fn eligible_count(&self) -> usize {
        self.records.iter().filter(|r| !r.is_pending()).count()
    }

    /// Ordered view of the whole window
    pub fn as_slice(&self) -> &[HistoryRecord] {
        &self.records
    }

    /// Owned, ordered copy of the whole window
    pub fn to_vec(&self) -> Vec<HistoryRecord> {
        self.records.clone()
    }
}
