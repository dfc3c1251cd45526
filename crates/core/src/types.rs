use crate::error::{RecommenderError, RecommenderResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

/// Binary patient category. Bypasses threshold discretization.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Female,
    Male,
}

impl Gender {
    /// Fixed categorical encoding used as the first state position.
    pub fn bin(self) -> usize {
        match self {
            Gender::Female => 0,
            Gender::Male => 1,
        }
    }
}

impl std::str::FromStr for Gender {
    type Err = RecommenderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "female" | "f" => Ok(Gender::Female),
            "male" | "m" => Ok(Gender::Male),
            other => Err(RecommenderError::Validation(format!(
                "unknown gender '{other}' (expected 'female' or 'male')"
            ))),
        }
    }
}

/// Continuous intake features, in state-tuple order (after gender).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    Age,
    Bmi,
    Wbc,
    Sodium,
    Hemoglobin,
    Potassium,
}

impl Feature {
    pub const ALL: [Feature; 6] = [
        Feature::Age,
        Feature::Bmi,
        Feature::Wbc,
        Feature::Sodium,
        Feature::Hemoglobin,
        Feature::Potassium,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Feature::Age => "age",
            Feature::Bmi => "bmi",
            Feature::Wbc => "wbc",
            Feature::Sodium => "sodium",
            Feature::Hemoglobin => "hemoglobin",
            Feature::Potassium => "potassium",
        }
    }

    /// Inclusive range accepted at the intake boundary.
    pub fn valid_range(self) -> (f64, f64) {
        match self {
            Feature::Age => (1.0, 100.0),
            Feature::Bmi => (10.0, 60.0),
            Feature::Wbc => (0.0, 30.0),
            Feature::Sodium => (120.0, 160.0),
            Feature::Hemoglobin => (5.0, 20.0),
            Feature::Potassium => (2.0, 6.5),
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Raw patient intake values as submitted by the form or API caller.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct PatientProfile {
    pub gender: Gender,
    /// Years, 1–100.
    pub age: f64,
    /// kg/m², 10–60.
    pub bmi: f64,
    /// White blood cell count (10⁹/L), 0–30.
    pub wbc: f64,
    /// Serum sodium (mmol/L), 120–160.
    pub sodium: f64,
    /// Hemoglobin (g/dL), 5–20.
    pub hemoglobin: f64,
    /// Serum potassium (mmol/L), 2–6.5.
    pub potassium: f64,
}

impl PatientProfile {
    pub fn value(&self, feature: Feature) -> f64 {
        match feature {
            Feature::Age => self.age,
            Feature::Bmi => self.bmi,
            Feature::Wbc => self.wbc,
            Feature::Sodium => self.sodium,
            Feature::Hemoglobin => self.hemoglobin,
            Feature::Potassium => self.potassium,
        }
    }

    /// Reject non-finite values and values outside the documented intake ranges.
    pub fn validate(&self) -> RecommenderResult<()> {
        for feature in Feature::ALL {
            let value = self.value(feature);
            let (min, max) = feature.valid_range();
            if !value.is_finite() {
                return Err(RecommenderError::Validation(format!(
                    "{feature} must be a finite number"
                )));
            }
            if value < min || value > max {
                return Err(RecommenderError::Validation(format!(
                    "{feature} = {value} is outside the accepted range [{min}, {max}]"
                )));
            }
        }
        Ok(())
    }
}

/// Tuple of bin indices, one per state position: gender, then [`Feature::ALL`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct DiscretizedState(pub Vec<usize>);

impl DiscretizedState {
    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for DiscretizedState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, bin) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{bin}")?;
        }
        f.write_str(")")
    }
}

/// Outcome of a table lookup: the chosen action and the values behind it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub action_index: usize,
    pub action: String,
    /// `(label, value)` for every action, in table order.
    pub action_values: Vec<(String, f64)>,
    pub state: DiscretizedState,
}

impl Decision {
    pub fn values(&self) -> Vec<f64> {
        self.action_values.iter().map(|(_, v)| *v).collect()
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Recommended Treatment: {}", self.action)?;
        writeln!(f)?;
        writeln!(f, "Q-values for each action:")?;
        for (label, value) in &self.action_values {
            writeln!(f, "  {label}: {value:.4}")?;
        }
        writeln!(f)?;
        write!(f, "Discretized State: {}", self.state)
    }
}
