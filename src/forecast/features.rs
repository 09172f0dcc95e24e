//! Feature engineering for the production model
//!
//! Turns raw weather, sensor and time inputs plus the history window into a
//! fixed-length feature vector. The schema is an enum-indexed array so the
//! trained weight vector always lines up with the extracted features.

use chrono::{DateTime, Datelike, Duration, Timelike, Utc};
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::ops::{Index, IndexMut};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::config::FeatureConfig;
use crate::domain::{HistoryRecord, Snapshot};

pub const FEATURE_COUNT: usize = 27;

/// Snapshot keys read by the extractor
pub mod keys {
    pub const TEMPERATURE: &str = "temperature";
    pub const HUMIDITY: &str = "humidity";
    pub const CLOUDINESS: &str = "cloudiness";
    pub const CLOUD_COVER: &str = "cloud_cover";
    pub const WIND_SPEED: &str = "wind_speed";
    pub const PRODUCTION_LAST_HOUR: &str = "production_last_hour";
}

/// Every feature the engine knows, in weight order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, EnumString, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum Feature {
    // Base
    Temperature,
    Humidity,
    Cloudiness,
    WindSpeed,
    HourOfDay,
    SeasonalFactor,
    WeatherTrend,
    ProductionLastHour,
    // Polynomial
    TemperatureSq,
    CloudinessSq,
    HourOfDaySq,
    SeasonalFactorSq,
    // Interaction
    CloudinessXHour,
    TemperatureXSeasonal,
    HumidityXCloudiness,
    WindXHour,
    WeatherTrendXSeasonal,
    // Time series
    #[strum(serialize = "production_same_hour_1d")]
    ProductionSameHour1d,
    #[strum(serialize = "production_same_hour_7d")]
    ProductionSameHour7d,
    #[strum(serialize = "rolling_mean_3d")]
    RollingMean3d,
    #[strum(serialize = "rolling_std_3d")]
    RollingStd3d,
    #[strum(serialize = "rolling_mean_7d")]
    RollingMean7d,
    #[strum(serialize = "rolling_std_7d")]
    RollingStd7d,
    #[strum(serialize = "trend_slope_48h")]
    TrendSlope48h,
    WeatherStability,
    HourEfficiency,
    SeasonalDeviation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureGroup {
    Base,
    Polynomial,
    Interaction,
    TimeSeries,
}

impl Feature {
    pub const ALL: [Feature; FEATURE_COUNT] = [
        Feature::Temperature,
        Feature::Humidity,
        Feature::Cloudiness,
        Feature::WindSpeed,
        Feature::HourOfDay,
        Feature::SeasonalFactor,
        Feature::WeatherTrend,
        Feature::ProductionLastHour,
        Feature::TemperatureSq,
        Feature::CloudinessSq,
        Feature::HourOfDaySq,
        Feature::SeasonalFactorSq,
        Feature::CloudinessXHour,
        Feature::TemperatureXSeasonal,
        Feature::HumidityXCloudiness,
        Feature::WindXHour,
        Feature::WeatherTrendXSeasonal,
        Feature::ProductionSameHour1d,
        Feature::ProductionSameHour7d,
        Feature::RollingMean3d,
        Feature::RollingStd3d,
        Feature::RollingMean7d,
        Feature::RollingStd7d,
        Feature::TrendSlope48h,
        Feature::WeatherStability,
        Feature::HourEfficiency,
        Feature::SeasonalDeviation,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        self.into()
    }

    pub fn group(self) -> FeatureGroup {
        match self.index() {
            0..=7 => FeatureGroup::Base,
            8..=11 => FeatureGroup::Polynomial,
            12..=16 => FeatureGroup::Interaction,
            _ => FeatureGroup::TimeSeries,
        }
    }

    /// Value used when the input cannot be derived
    pub fn neutral_value(self) -> f64 {
        match self {
            Feature::WeatherStability => 0.5,
            _ => 0.0,
        }
    }
}

/// Ordered feature values, one slot per [`Feature`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector {
    values: [f64; FEATURE_COUNT],
}

impl FeatureVector {
    pub fn from_array(values: [f64; FEATURE_COUNT]) -> Self {
        Self { values }
    }

    /// Every slot at its neutral default
    pub fn neutral() -> Self {
        let mut values = [0.0; FEATURE_COUNT];
        for feature in Feature::ALL {
            values[feature.index()] = feature.neutral_value();
        }
        Self { values }
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    pub fn iter(&self) -> impl Iterator<Item = (Feature, f64)> + '_ {
        Feature::ALL.iter().map(move |f| (*f, self.values[f.index()]))
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        name.parse::<Feature>().ok().map(|f| self[f])
    }

    pub fn len(&self) -> usize {
        FEATURE_COUNT
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn is_finite(&self) -> bool {
        self.values.iter().all(|v| v.is_finite())
    }
}

impl Default for FeatureVector {
    fn default() -> Self {
        Self::neutral()
    }
}

impl Index<Feature> for FeatureVector {
    type Output = f64;

    fn index(&self, feature: Feature) -> &f64 {
        &self.values[feature.index()]
    }
}

impl IndexMut<Feature> for FeatureVector {
    fn index_mut(&mut self, feature: Feature) -> &mut f64 {
        &mut self.values[feature.index()]
    }
}

impl Serialize for FeatureVector {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(FEATURE_COUNT))?;
        for (feature, value) in self.iter() {
            map.serialize_entry(feature.name(), &value)?;
        }
        map.end()
    }
}

/// Seasonal factor in [0, 1], peaking around the June solstice
pub fn seasonal_factor(day_of_year: u32) -> f64 {
    0.5 + 0.5 * (2.0 * std::f64::consts::PI * (day_of_year as f64 - 80.0) / 365.0).sin()
}

/// "Good conditions" score in [0, 1] combining cloud and wind
pub fn weather_trend(cloudiness: f64, wind_speed: f64) -> f64 {
    let cloud_score = (100.0 - cloudiness.clamp(0.0, 100.0)) / 100.0;
    let wind_factor = 1.0 - (wind_speed.max(0.0) / 30.0).min(1.0);
    cloud_score * 0.7 + wind_factor * 0.3
}

/// Fractional hour of day, e.g. 13.5 for 13:30
pub fn fractional_hour(ts: DateTime<Utc>) -> f64 {
    ts.hour() as f64 + ts.minute() as f64 / 60.0
}

/// Weather inputs after defaults and sensor overrides
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Conditions {
    pub temperature: f64,
    pub humidity: f64,
    pub cloudiness: f64,
    pub wind_speed: f64,
    pub production_last_hour: f64,
}

/// Derived statistics over the history window
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeSeriesFeatures {
    pub same_hour_1d: f64,
    pub same_hour_7d: f64,
    pub rolling_mean_3d: f64,
    pub rolling_std_3d: f64,
    pub rolling_mean_7d: f64,
    pub rolling_std_7d: f64,
    pub trend_slope_48h: f64,
    pub weather_stability: f64,
    pub hour_efficiency: f64,
    pub seasonal_deviation: f64,
}

impl TimeSeriesFeatures {
    pub fn neutral() -> Self {
        Self {
            same_hour_1d: 0.0,
            same_hour_7d: 0.0,
            rolling_mean_3d: 0.0,
            rolling_std_3d: 0.0,
            rolling_mean_7d: 0.0,
            rolling_std_7d: 0.0,
            trend_slope_48h: 0.0,
            weather_stability: Feature::WeatherStability.neutral_value(),
            hour_efficiency: 0.0,
            seasonal_deviation: 0.0,
        }
    }
}

const TREND_SAMPLES: usize = 48;
const HOURLY_SAMPLES_7D: usize = 168;
const SAME_HOUR_SAMPLES: usize = 7;

/// Feature extractor over weather, sensors and history
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    config: FeatureConfig,
}

impl FeatureExtractor {
    pub fn new(config: FeatureConfig) -> Self {
        Self { config }
    }

    /// Build the full feature vector for the interval starting at `now`.
    ///
    /// `history` must be ordered by timestamp; only records strictly before
    /// `now` are looked at. Never fails: missing or invalid inputs fall
    /// back to configured defaults.
    pub fn extract(
        &self,
        now: DateTime<Utc>,
        weather: &Snapshot,
        sensors: &Snapshot,
        history: &[HistoryRecord],
    ) -> FeatureVector {
        let conditions = self.conditions(weather, sensors);
        let ts = self.time_series(now, history);
        compose(now, &conditions, &ts)
    }

    /// Resolve weather inputs; a valid local sensor reading wins over the
    /// weather service.
    pub fn conditions(&self, weather: &Snapshot, sensors: &Snapshot) -> Conditions {
        let pick = |key: &str, default: f64| {
            sensors
                .number(key)
                .or_else(|| weather.number(key))
                .unwrap_or(default)
        };

        let cloudiness = weather
            .number(keys::CLOUDINESS)
            .or_else(|| weather.number(keys::CLOUD_COVER))
            .unwrap_or(self.config.default_cloudiness_percent);

        Conditions {
            temperature: pick(keys::TEMPERATURE, self.config.default_temperature_c),
            humidity: pick(keys::HUMIDITY, self.config.default_humidity_percent).clamp(0.0, 100.0),
            cloudiness: cloudiness.clamp(0.0, 100.0),
            wind_speed: pick(keys::WIND_SPEED, self.config.default_wind_speed_ms).max(0.0),
            production_last_hour: sensors.number_or(keys::PRODUCTION_LAST_HOUR, 0.0).max(0.0),
        }
    }

    /// Time-series features; neutral until the history spans the
    /// configured minimum number of days.
    pub fn time_series(&self, now: DateTime<Utc>, history: &[HistoryRecord]) -> TimeSeriesFeatures {
        let past = &history[..history.partition_point(|r| r.timestamp < now)];
        let observed: Vec<(DateTime<Utc>, f64)> = past
            .iter()
            .filter_map(|r| r.actual().map(|v| (r.timestamp, v)))
            .collect();

        let span_ok = observed
            .first()
            .is_some_and(|(first, _)| now - *first >= Duration::days(self.config.min_history_days));
        if !span_ok {
            return TimeSeriesFeatures::neutral();
        }

        let same_hour_1d = value_near(&observed, now - Duration::days(1)).unwrap_or(0.0);
        let same_hour_7d = value_near(&observed, now - Duration::days(7)).unwrap_or(0.0);

        // Sparse history (daily totals) still yields a coarse 3-day figure
        let window_3d = values_since(&observed, now - Duration::hours(72));
        let (rolling_mean_3d, rolling_std_3d) = mean_std(&window_3d);

        let window_7d = values_since(&observed, now - Duration::hours(168));
        let (rolling_mean_7d, rolling_std_7d) = if window_7d.len() >= HOURLY_SAMPLES_7D {
            mean_std(window_7d)
        } else {
            (rolling_mean_3d, rolling_std_3d)
        };

        let trend_slope_48h = if observed.len() >= TREND_SAMPLES {
            let tail: Vec<f64> = observed[observed.len() - TREND_SAMPLES..]
                .iter()
                .map(|(_, v)| *v)
                .collect();
            linear_slope(&tail)
        } else {
            0.0
        };

        let day_ago = now - Duration::hours(24);
        let cloud_24h: Vec<f64> = past[past.partition_point(|r| r.timestamp < day_ago)..]
            .iter()
            .filter_map(|r| r.weather.number(keys::CLOUDINESS).or_else(|| r.weather.number(keys::CLOUD_COVER)))
            .collect();
        let weather_stability = if cloud_24h.len() >= 2 {
            let (_, std) = mean_std(&cloud_24h);
            (1.0 - std / 50.0).max(0.0)
        } else {
            Feature::WeatherStability.neutral_value()
        };

        let hour = now.hour();
        let same_hour: Vec<f64> = observed
            .iter()
            .rev()
            .filter(|(ts, _)| ts.hour() == hour)
            .take(SAME_HOUR_SAMPLES)
            .map(|(_, v)| *v)
            .collect();
        let hour_efficiency = if same_hour.is_empty() {
            0.0
        } else {
            same_hour.iter().sum::<f64>() / same_hour.len() as f64
        };

        let seasonal_deviation = (same_hour_1d - rolling_mean_7d) / rolling_mean_7d.max(1.0);

        TimeSeriesFeatures {
            same_hour_1d,
            same_hour_7d,
            rolling_mean_3d,
            rolling_std_3d,
            rolling_mean_7d,
            rolling_std_7d,
            trend_slope_48h,
            weather_stability,
            hour_efficiency,
            seasonal_deviation,
        }
    }
}

/// Assemble base, polynomial, interaction and time-series slots
pub fn compose(now: DateTime<Utc>, c: &Conditions, ts: &TimeSeriesFeatures) -> FeatureVector {
    let hour = fractional_hour(now);
    let seasonal = seasonal_factor(now.ordinal());
    let trend = weather_trend(c.cloudiness, c.wind_speed);

    let mut fv = FeatureVector::neutral();
    fv[Feature::Temperature] = c.temperature;
    fv[Feature::Humidity] = c.humidity;
    fv[Feature::Cloudiness] = c.cloudiness;
    fv[Feature::WindSpeed] = c.wind_speed;
    fv[Feature::HourOfDay] = hour;
    fv[Feature::SeasonalFactor] = seasonal;
    fv[Feature::WeatherTrend] = trend;
    fv[Feature::ProductionLastHour] = c.production_last_hour;

    fv[Feature::TemperatureSq] = c.temperature.powi(2);
    fv[Feature::CloudinessSq] = c.cloudiness.powi(2);
    fv[Feature::HourOfDaySq] = hour.powi(2);
    fv[Feature::SeasonalFactorSq] = seasonal.powi(2);

    fv[Feature::CloudinessXHour] = c.cloudiness * hour;
    fv[Feature::TemperatureXSeasonal] = c.temperature * seasonal;
    fv[Feature::HumidityXCloudiness] = c.humidity * c.cloudiness;
    fv[Feature::WindXHour] = c.wind_speed * hour;
    fv[Feature::WeatherTrendXSeasonal] = trend * seasonal;

    fv[Feature::ProductionSameHour1d] = ts.same_hour_1d;
    fv[Feature::ProductionSameHour7d] = ts.same_hour_7d;
    fv[Feature::RollingMean3d] = ts.rolling_mean_3d;
    fv[Feature::RollingStd3d] = ts.rolling_std_3d;
    fv[Feature::RollingMean7d] = ts.rolling_mean_7d;
    fv[Feature::RollingStd7d] = ts.rolling_std_7d;
    fv[Feature::TrendSlope48h] = ts.trend_slope_48h;
    fv[Feature::WeatherStability] = ts.weather_stability;
    fv[Feature::HourEfficiency] = ts.hour_efficiency;
    fv[Feature::SeasonalDeviation] = ts.seasonal_deviation;
    fv
}

/// Observed value closest to `target`, within half an hour
fn value_near(observed: &[(DateTime<Utc>, f64)], target: DateTime<Utc>) -> Option<f64> {
    let tolerance = Duration::minutes(30);
    let start = observed.partition_point(|(ts, _)| *ts < target - tolerance);
    observed[start..]
        .iter()
        .take_while(|(ts, _)| *ts <= target + tolerance)
        .min_by_key(|(ts, _)| (*ts - target).num_seconds().abs())
        .map(|(_, v)| *v)
}

/// Values at or after `since`; `observed` is ordered by time
fn values_since(observed: &[(DateTime<Utc>, f64)], since: DateTime<Utc>) -> Vec<f64> {
    let start = observed.partition_point(|(ts, _)| *ts < since);
    observed[start..].iter().map(|(_, v)| *v).collect()
}

/// Population mean and standard deviation; (0, 0) for an empty slice
pub fn mean_std(values: impl AsRef<[f64]>) -> (f64, f64) {
    let values = values.as_ref();
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}

/// Least-squares slope of value against sample index
pub fn linear_slope(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean_x = (n - 1.0) / 2.0;
    let mean_y = values.iter().sum::<f64>() / n;
    let (num, den) = values
        .iter()
        .enumerate()
        .fold((0.0, 0.0), |(num, den), (i, y)| {
            let dx = i as f64 - mean_x;
            (num + dx * (y - mean_y), den + dx * dx)
        });
    if den.abs() < 1e-12 {
        0.0
    } else {
        num / den
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;
    use std::collections::HashSet;
    use strum::IntoEnumIterator;

    fn extractor() -> FeatureExtractor {
        FeatureExtractor::new(FeatureConfig::default())
    }

    fn hourly_history(start: DateTime<Utc>, hours: i64, value: impl Fn(i64) -> f64) -> Vec<HistoryRecord> {
        (0..hours)
            .map(|h| {
                let ts = start + Duration::hours(h);
                let weather = Snapshot::new().with(keys::CLOUDINESS, 40.0);
                HistoryRecord::new(ts, 0.0, weather, Snapshot::new()).with_actual(value(h))
            })
            .collect()
    }

    #[test]
    fn test_schema_is_complete_and_ordered() {
        assert_eq!(Feature::iter().count(), FEATURE_COUNT);
        for (i, feature) in Feature::ALL.iter().enumerate() {
            assert_eq!(feature.index(), i);
        }
        let names: HashSet<_> = Feature::ALL.iter().map(|f| f.name()).collect();
        assert_eq!(names.len(), FEATURE_COUNT);
        assert_eq!(Feature::CloudinessXHour.name(), "cloudiness_x_hour");
        assert_eq!(Feature::TrendSlope48h.name(), "trend_slope_48h");
        assert_eq!("rolling_mean_7d".parse::<Feature>().unwrap(), Feature::RollingMean7d);
    }

    #[test]
    fn test_feature_groups() {
        let count = |g| Feature::ALL.iter().filter(|f| f.group() == g).count();
        assert_eq!(count(FeatureGroup::Base), 8);
        assert_eq!(count(FeatureGroup::Polynomial), 4);
        assert_eq!(count(FeatureGroup::Interaction), 5);
        assert_eq!(count(FeatureGroup::TimeSeries), 10);
    }

    #[test]
    fn test_seasonal_factor_range() {
        assert!((seasonal_factor(80) - 0.5).abs() < 1e-9);
        assert!(seasonal_factor(172) > 0.99);
        assert!(seasonal_factor(355) < 0.01);
    }

    #[test]
    fn test_weather_trend() {
        assert!((weather_trend(0.0, 0.0) - 1.0).abs() < 1e-12);
        assert!((weather_trend(100.0, 30.0)).abs() < 1e-12);
        assert!((weather_trend(50.0, 15.0) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_missing_inputs_use_defaults() {
        let now = Utc.with_ymd_and_hms(2024, 6, 21, 12, 30, 0).unwrap();
        let weather = Snapshot::new().with(keys::TEMPERATURE, "sensor unavailable");
        let fv = extractor().extract(now, &weather, &Snapshot::new(), &[]);

        assert_eq!(fv[Feature::Temperature], 15.0);
        assert_eq!(fv[Feature::Humidity], 60.0);
        assert_eq!(fv[Feature::Cloudiness], 50.0);
        assert_eq!(fv[Feature::WindSpeed], 5.0);
        assert_eq!(fv[Feature::HourOfDay], 12.5);
        assert_eq!(fv[Feature::HumidityXCloudiness], 3000.0);
        assert_eq!(fv[Feature::WeatherStability], 0.5);
        assert_eq!(fv[Feature::ProductionSameHour1d], 0.0);
        assert!(fv.is_finite());
    }

    #[test]
    fn test_sensor_overrides_weather() {
        let weather = Snapshot::new()
            .with(keys::TEMPERATURE, 18.0)
            .with(keys::CLOUD_COVER, 130.0);
        let sensors = Snapshot::new()
            .with(keys::TEMPERATURE, 24.5)
            .with(keys::PRODUCTION_LAST_HOUR, 1.2);
        let c = extractor().conditions(&weather, &sensors);

        assert_eq!(c.temperature, 24.5);
        assert_eq!(c.cloudiness, 100.0);
        assert_eq!(c.production_last_hour, 1.2);
    }

    #[test]
    fn test_time_series_neutral_with_short_history() {
        let start = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let history = hourly_history(start, 24 * 3, |_| 2.0);
        let now = start + Duration::days(3);
        assert_eq!(extractor().time_series(now, &history), TimeSeriesFeatures::neutral());
    }

    #[test]
    fn test_time_series_hourly_history() {
        let start = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        // value equals the sample index, so the trend slope is exactly 1
        let history = hourly_history(start, 24 * 10, |h| h as f64);
        let now = start + Duration::days(10);
        let ts = extractor().time_series(now, &history);

        let idx_of = |t: DateTime<Utc>| (t - start).num_hours() as f64;
        assert_eq!(ts.same_hour_1d, idx_of(now - Duration::days(1)));
        assert_eq!(ts.same_hour_7d, idx_of(now - Duration::days(7)));
        assert!((ts.trend_slope_48h - 1.0).abs() < 1e-9);
        // constant cloudiness -> perfectly stable
        assert_eq!(ts.weather_stability, 1.0);

        // last 72 samples are 168..=239
        assert!((ts.rolling_mean_3d - 203.5).abs() < 1e-9);
        // last 168 samples are 72..=239
        assert!((ts.rolling_mean_7d - 155.5).abs() < 1e-9);

        let expected_eff = (1..=7).map(|d| idx_of(now - Duration::days(d))).sum::<f64>() / 7.0;
        assert!((ts.hour_efficiency - expected_eff).abs() < 1e-9);

        let expected_dev = (ts.same_hour_1d - ts.rolling_mean_7d) / ts.rolling_mean_7d;
        assert!((ts.seasonal_deviation - expected_dev).abs() < 1e-9);
    }

    #[test]
    fn test_seven_day_window_falls_back_to_three_day() {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        // daily records only: far fewer than 168 samples per week
        let history: Vec<_> = (0..20)
            .map(|d| {
                HistoryRecord::new(start + Duration::days(d), 0.0, Snapshot::new(), Snapshot::new())
                    .with_actual(d as f64)
            })
            .collect();
        let now = start + Duration::days(20);
        let ts = extractor().time_series(now, &history);

        assert_eq!(ts.rolling_mean_7d, ts.rolling_mean_3d);
        assert_eq!(ts.rolling_std_7d, ts.rolling_std_3d);
        assert_eq!(ts.same_hour_1d, 19.0);
        assert_eq!(ts.trend_slope_48h, 0.0);
    }

    #[test]
    fn test_future_and_pending_records_ignored() {
        let start = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let mut history = hourly_history(start, 24 * 8, |_| 1.0);
        let now = start + Duration::days(8);
        history.push(
            HistoryRecord::new(now + Duration::hours(1), 0.0, Snapshot::new(), Snapshot::new())
                .with_actual(500.0),
        );
        history[24 * 7].actual_value = None;
        let ts = extractor().time_series(now, &history);
        assert_eq!(ts.rolling_mean_3d, 1.0);
        assert_eq!(ts.rolling_std_3d, 0.0);
    }

    #[test]
    fn test_linear_slope_and_stats() {
        assert_eq!(linear_slope(&[5.0]), 0.0);
        assert!((linear_slope(&[1.0, 3.0, 5.0]) - 2.0).abs() < 1e-12);
        assert_eq!(mean_std(Vec::<f64>::new()), (0.0, 0.0));
        let (mean, std) = mean_std([2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert_eq!(mean, 5.0);
        assert_eq!(std, 2.0);
    }

    #[test]
    fn test_vector_lookup_by_name() {
        let mut fv = FeatureVector::neutral();
        fv[Feature::Cloudiness] = 42.0;
        assert_eq!(fv.get("cloudiness"), Some(42.0));
        assert_eq!(fv.get("nonexistent"), None);

        let json = serde_json::to_value(fv).unwrap();
        let map = json.as_object().unwrap();
        assert_eq!(map.len(), FEATURE_COUNT);
        assert_eq!(map["weather_stability"], 0.5);
    }

    proptest! {
        #[test]
        fn prop_vector_complete_and_finite(
            temp in -40.0f64..50.0,
            humidity in -20.0f64..150.0,
            cloud in -50.0f64..200.0,
            wind in -5.0f64..80.0,
            minutes in 0i64..(365 * 24 * 60),
        ) {
            let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(minutes);
            let weather = Snapshot::new()
                .with(keys::TEMPERATURE, temp)
                .with(keys::HUMIDITY, humidity)
                .with(keys::CLOUDINESS, cloud)
                .with(keys::WIND_SPEED, wind);
            let fv = extractor().extract(now, &weather, &Snapshot::new(), &[]);

            prop_assert_eq!(fv.iter().count(), FEATURE_COUNT);
            let names: Vec<_> = fv.iter().map(|(f, _)| f.name()).collect();
            let expected: Vec<_> = Feature::ALL.iter().map(|f| f.name()).collect();
            prop_assert_eq!(names, expected);
            prop_assert!(fv.is_finite());
            prop_assert!((0.0..=100.0).contains(&fv[Feature::Cloudiness]));
            prop_assert!((0.0..=1.0).contains(&fv[Feature::WeatherTrend]));
        }
    }
}
