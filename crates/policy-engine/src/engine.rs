//! Recommendation engine. Discretizes a patient profile and resolves it
//! against the decision table.

use crate::table::PolicyTable;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use surgirec_core::config::AppConfig;
use surgirec_core::discretizer::FeatureDiscretizer;
use surgirec_core::error::RecommenderResult;
use surgirec_core::lookup::PolicyLookup;
use surgirec_core::types::{Decision, DiscretizedState, PatientProfile};
use tracing::{debug, info, warn};

/// Stateless engine over an immutable, shareable decision table.
#[derive(Clone)]
pub struct PolicyEngine {
    lookup: Arc<dyn PolicyLookup>,
    discretizer: FeatureDiscretizer,
    loaded_at: DateTime<Utc>,
}

impl PolicyEngine {
    /// Validate the configuration and load the table it points at.
    pub fn new(config: &AppConfig) -> anyhow::Result<Self> {
        config.validate()?;
        let discretizer = FeatureDiscretizer::from_config(&config.bins)?;
        let table = PolicyTable::load(
            &config.policy.table_path,
            FeatureDiscretizer::STATE_DIMS,
            &config.policy.actions,
        )?;

        for (axis, len, bins) in table.narrow_axes(&discretizer.cardinalities()) {
            warn!(
                axis,
                table_bins = len,
                discretizer_bins = bins,
                "Policy table is narrower than the discretizer on this axis; \
                 states in the upper bins will be reported as invalid"
            );
        }

        info!(shape = ?table.shape(), "Policy engine initialized");

        Ok(Self::with_lookup(Arc::new(table), discretizer))
    }

    pub fn with_lookup(lookup: Arc<dyn PolicyLookup>, discretizer: FeatureDiscretizer) -> Self {
        Self {
            lookup,
            discretizer,
            loaded_at: Utc::now(),
        }
    }

    /// Recommend a treatment for `profile`.
    ///
    /// Fails with `Validation` for out-of-range intake values and with
    /// `Lookup` when the discretized state does not fit the table.
    pub fn recommend(&self, profile: &PatientProfile) -> RecommenderResult<Decision> {
        profile.validate()?;
        let state = self.discretize(profile);
        let decision = self.lookup.decide(&state)?;

        debug!(
            state = %decision.state,
            action = %decision.action,
            "Recommendation computed"
        );
        Ok(decision)
    }

    pub fn discretize(&self, profile: &PatientProfile) -> DiscretizedState {
        self.discretizer.discretize(profile)
    }

    pub fn lookup(&self) -> &dyn PolicyLookup {
        self.lookup.as_ref()
    }

    pub fn discretizer(&self) -> &FeatureDiscretizer {
        &self.discretizer
    }

    /// When the table was attached to this engine.
    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }
}
