//! Threshold bucketing of continuous intake features into state bins.
//!
//! A feature with `k` strictly increasing thresholds produces bins `0..=k`:
//! values below the first threshold land in bin 0, a value equal to a
//! threshold belongs to the bin above it, and everything at or past the last
//! threshold lands in bin `k`.

use crate::config::BinConfig;
use crate::error::{RecommenderError, RecommenderResult};
use crate::types::{DiscretizedState, Feature, PatientProfile};
use tracing::debug;

/// Bin index of `value` against ascending `thresholds`.
///
/// Total over `f64`: every input maps to exactly one bin in `0..=thresholds.len()`.
/// NaN compares false against every threshold and lands in bin 0.
pub fn categorize(value: f64, thresholds: &[f64]) -> usize {
    let mut bin = 0;
    for &boundary in thresholds {
        if value >= boundary {
            bin += 1;
        } else {
            break;
        }
    }
    bin
}

/// Validated bin boundaries for one feature.
#[derive(Debug, Clone, PartialEq)]
pub struct Thresholds(Vec<f64>);

impl Thresholds {
    /// Boundaries must be non-empty, finite and strictly increasing.
    pub fn new(boundaries: Vec<f64>) -> RecommenderResult<Self> {
        if boundaries.is_empty() {
            return Err(RecommenderError::Config(
                "thresholds must contain at least one boundary".to_string(),
            ));
        }
        if let Some(bad) = boundaries.iter().find(|b| !b.is_finite()) {
            return Err(RecommenderError::Config(format!(
                "threshold {bad} is not a finite number"
            )));
        }
        if let Some(pair) = boundaries.windows(2).find(|w| w[0] >= w[1]) {
            return Err(RecommenderError::Config(format!(
                "thresholds must be strictly increasing, found {} followed by {}",
                pair[0], pair[1]
            )));
        }
        Ok(Self(boundaries))
    }

    pub fn categorize(&self, value: f64) -> usize {
        categorize(value, &self.0)
    }

    /// Number of bins these thresholds can produce.
    pub fn bin_count(&self) -> usize {
        self.0.len() + 1
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }
}

/// Maps a [`PatientProfile`] to its [`DiscretizedState`].
#[derive(Debug, Clone)]
pub struct FeatureDiscretizer {
    age: Thresholds,
    bmi: Thresholds,
    wbc: Thresholds,
    sodium: Thresholds,
    hemoglobin: Thresholds,
    potassium: Thresholds,
}

impl FeatureDiscretizer {
    /// Number of state positions: gender plus the six continuous features.
    pub const STATE_DIMS: usize = 1 + Feature::ALL.len();

    pub fn from_config(bins: &BinConfig) -> RecommenderResult<Self> {
        let build = |feature: Feature, values: &[f64]| {
            Thresholds::new(values.to_vec()).map_err(|e| match e {
                RecommenderError::Config(msg) => {
                    RecommenderError::Config(format!("bins.{feature}: {msg}"))
                }
                other => other,
            })
        };

        Ok(Self {
            age: build(Feature::Age, &bins.age)?,
            bmi: build(Feature::Bmi, &bins.bmi)?,
            wbc: build(Feature::Wbc, &bins.wbc)?,
            sodium: build(Feature::Sodium, &bins.sodium)?,
            hemoglobin: build(Feature::Hemoglobin, &bins.hemoglobin)?,
            potassium: build(Feature::Potassium, &bins.potassium)?,
        })
    }

    pub fn thresholds(&self, feature: Feature) -> &Thresholds {
        match feature {
            Feature::Age => &self.age,
            Feature::Bmi => &self.bmi,
            Feature::Wbc => &self.wbc,
            Feature::Sodium => &self.sodium,
            Feature::Hemoglobin => &self.hemoglobin,
            Feature::Potassium => &self.potassium,
        }
    }

    pub fn discretize(&self, profile: &PatientProfile) -> DiscretizedState {
        let mut bins = Vec::with_capacity(Self::STATE_DIMS);
        bins.push(profile.gender.bin());
        for feature in Feature::ALL {
            bins.push(self.thresholds(feature).categorize(profile.value(feature)));
        }

        let state = DiscretizedState(bins);
        debug!(state = %state, "Discretized patient profile");
        state
    }

    /// Bins each state position can take, in state order.
    pub fn cardinalities(&self) -> Vec<usize> {
        let mut dims = Vec::with_capacity(Self::STATE_DIMS);
        dims.push(2);
        dims.extend(Feature::ALL.iter().map(|&f| self.thresholds(f).bin_count()));
        dims
    }
}

impl Default for FeatureDiscretizer {
    fn default() -> Self {
        let bins = BinConfig::default();
        let t = |v: &[f64]| Thresholds(v.to_vec());
        Self {
            age: t(&bins.age),
            bmi: t(&bins.bmi),
            wbc: t(&bins.wbc),
            sodium: t(&bins.sodium),
            hemoglobin: t(&bins.hemoglobin),
            potassium: t(&bins.potassium),
        }
    }
}
