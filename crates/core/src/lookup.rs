//! Decision-table lookup abstraction.
//!
//! The recommendation engine and the HTTP layer only depend on
//! [`PolicyLookup`], so any immutable table representation can back them.

use crate::types::{Decision, DiscretizedState};
use thiserror::Error;

/// Read-only decision table indexed by a [`DiscretizedState`].
pub trait PolicyLookup: Send + Sync {
    /// Resolve the action values at `state` and pick the best action.
    fn decide(&self, state: &DiscretizedState) -> Result<Decision, LookupError>;

    /// Ordered action labels, one per entry of the action axis.
    fn action_labels(&self) -> &[String];

    /// Full table shape, action axis last.
    fn shape(&self) -> &[usize];

    /// Number of state positions the table is indexed by.
    fn state_dims(&self) -> usize {
        self.shape().len().saturating_sub(1)
    }
}

/// Errors that can occur while indexing the decision table.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    /// A bin index falls outside the table's extent along its axis.
    #[error("invalid state {state}: bin {index} on axis {axis} exceeds the {len} bins the table holds")]
    OutOfRange {
        state: DiscretizedState,
        axis: usize,
        index: usize,
        len: usize,
    },

    /// The state tuple does not have one entry per table state axis.
    #[error("invalid state {state}: expected {expected} positions, got {got}")]
    DimensionMismatch {
        state: DiscretizedState,
        expected: usize,
        got: usize,
    },
}

impl LookupError {
    /// The state that failed to resolve.
    pub fn state(&self) -> &DiscretizedState {
        match self {
            LookupError::OutOfRange { state, .. } => state,
            LookupError::DimensionMismatch { state, .. } => state,
        }
    }
}

/// Index of the largest value; ties go to the lowest index.
///
/// NaN entries never win. Returns `None` for an empty slice or all-NaN input.
pub fn argmax(values: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &v) in values.iter().enumerate() {
        if v.is_nan() {
            continue;
        }
        match best {
            Some((_, current)) if v <= current => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}
