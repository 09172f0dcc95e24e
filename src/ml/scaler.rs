//! Feature standardization stored alongside the model

use crate::error::{ForecastError, ForecastResult};
use crate::forecast::{FeatureVector, FEATURE_COUNT};

/// Columns with a standard deviation below this are only centred
const MIN_STD: f64 = 1e-8;

/// Z-score scaler over the fixed feature schema
#[derive(Debug, Clone, PartialEq)]
pub struct StandardScaler {
    means: [f64; FEATURE_COUNT],
    stds: [f64; FEATURE_COUNT],
}

impl StandardScaler {
    /// Scaler that leaves values unchanged
    pub fn identity() -> Self {
        Self {
            means: [0.0; FEATURE_COUNT],
            stds: [1.0; FEATURE_COUNT],
        }
    }

    /// Fit column means and population standard deviations
    pub fn fit(rows: &[FeatureVector]) -> Self {
        if rows.is_empty() {
            return Self::identity();
        }
        let n = rows.len() as f64;
        let mut means = [0.0; FEATURE_COUNT];
        let mut stds = [0.0; FEATURE_COUNT];

        for row in rows {
            for (i, v) in row.as_slice().iter().enumerate() {
                means[i] += v;
            }
        }
        means.iter_mut().for_each(|m| *m /= n);

        for row in rows {
            for (i, v) in row.as_slice().iter().enumerate() {
                stds[i] += (v - means[i]).powi(2);
            }
        }
        for s in stds.iter_mut() {
            let std = (*s / n).sqrt();
            *s = if std > MIN_STD { std } else { 1.0 };
        }

        Self { means, stds }
    }

    pub fn from_parts(means: [f64; FEATURE_COUNT], stds: [f64; FEATURE_COUNT]) -> ForecastResult<Self> {
        if means.iter().any(|m| !m.is_finite()) {
            return Err(ForecastError::Configuration("scaler mean is not finite".into()));
        }
        if stds.iter().any(|s| !s.is_finite() || *s <= 0.0) {
            return Err(ForecastError::Configuration(
                "scaler standard deviation must be positive and finite".into(),
            ));
        }
        Ok(Self { means, stds })
    }

    pub fn transform(&self, features: &FeatureVector) -> [f64; FEATURE_COUNT] {
        let mut out = [0.0; FEATURE_COUNT];
        for (i, v) in features.as_slice().iter().enumerate() {
            out[i] = (v - self.means[i]) / self.stds[i];
        }
        out
    }

    pub fn means(&self) -> &[f64; FEATURE_COUNT] {
        &self.means
    }

    pub fn stds(&self) -> &[f64; FEATURE_COUNT] {
        &self.stds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forecast::Feature;

    fn row(cloud: f64, temp: f64) -> FeatureVector {
        let mut fv = FeatureVector::neutral();
        fv[Feature::Cloudiness] = cloud;
        fv[Feature::Temperature] = temp;
        fv
    }

    #[test]
    fn test_fit_and_transform() {
        let rows = vec![row(0.0, 10.0), row(50.0, 10.0), row(100.0, 10.0)];
        let scaler = StandardScaler::fit(&rows);

        let c = Feature::Cloudiness.index();
        let t = Feature::Temperature.index();
        assert_eq!(scaler.means()[c], 50.0);
        // constant column is centred but not divided by zero
        assert_eq!(scaler.stds()[t], 1.0);

        let scaled = scaler.transform(&rows[2]);
        assert!((scaled[c] - 50.0 / (5000.0f64 / 3.0).sqrt()).abs() < 1e-9);
        assert_eq!(scaled[t], 0.0);
    }

    #[test]
    fn test_identity_is_noop() {
        let fv = row(42.0, 21.0);
        let scaled = StandardScaler::identity().transform(&fv);
        assert_eq!(&scaled[..], fv.as_slice());
    }

    #[test]
    fn test_from_parts_rejects_bad_std() {
        let mut stds = [1.0; FEATURE_COUNT];
        stds[3] = 0.0;
        assert!(StandardScaler::from_parts([0.0; FEATURE_COUNT], stds).is_err());

        let mut means = [0.0; FEATURE_COUNT];
        means[0] = f64::NAN;
        assert!(StandardScaler::from_parts(means, [1.0; FEATURE_COUNT]).is_err());
    }
}
