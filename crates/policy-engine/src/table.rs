//! Pre-trained decision table loaded from a NumPy `.npy` artifact.
//!
//! The table is read once, validated, and never mutated afterwards. Axis `i`
//! (for `i < ndim - 1`) is indexed by state position `i`; the last axis holds
//! one value per action.

use ndarray::{ArrayD, Axis};
use ndarray_npy::{ReadNpyError, ReadNpyExt};
use std::path::Path;
use surgirec_core::error::{RecommenderError, RecommenderResult};
use surgirec_core::lookup::{argmax, LookupError, PolicyLookup};
use surgirec_core::types::{Decision, DiscretizedState};
use tracing::{debug, info};

/// Immutable action-value table.
#[derive(Debug, Clone)]
pub struct PolicyTable {
    values: ArrayD<f64>,
    shape: Vec<usize>,
    actions: Vec<String>,
}

impl PolicyTable {
    /// Read and validate the table at `path`.
    ///
    /// The whole file is read into memory and the handle closed before
    /// decoding. Accepts float64 or float32 element types.
    pub fn load(
        path: impl AsRef<Path>,
        state_dims: usize,
        actions: &[String],
    ) -> RecommenderResult<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| {
            RecommenderError::ModelLoad(format!(
                "cannot read policy table '{}': {e}",
                path.display()
            ))
        })?;

        let values = decode_npy(&bytes).map_err(|msg| {
            RecommenderError::ModelLoad(format!("policy table '{}': {msg}", path.display()))
        })?;

        let table = Self::from_array(values, state_dims, actions).map_err(|e| match e {
            RecommenderError::ModelLoad(msg) => {
                RecommenderError::ModelLoad(format!("policy table '{}': {msg}", path.display()))
            }
            other => other,
        })?;

        info!(
            path = %path.display(),
            shape = ?table.shape,
            actions = ?table.actions,
            "Policy table loaded"
        );
        Ok(table)
    }

    /// Wrap an in-memory array, applying the same checks as [`PolicyTable::load`].
    pub fn from_array(
        values: ArrayD<f64>,
        state_dims: usize,
        actions: &[String],
    ) -> RecommenderResult<Self> {
        let shape = values.shape().to_vec();

        if shape.len() != state_dims + 1 {
            return Err(RecommenderError::ModelLoad(format!(
                "shape {shape:?} has {} dimensions, expected {} state axes plus 1 action axis",
                shape.len(),
                state_dims
            )));
        }
        let action_axis = shape[state_dims];
        if action_axis != actions.len() {
            return Err(RecommenderError::ModelLoad(format!(
                "action axis holds {action_axis} entries but {} action labels are configured",
                actions.len()
            )));
        }
        if let Some(axis) = shape.iter().position(|&len| len == 0) {
            return Err(RecommenderError::ModelLoad(format!(
                "shape {shape:?} has an empty axis {axis}"
            )));
        }
        if let Some(v) = values.iter().find(|v| !v.is_finite()) {
            return Err(RecommenderError::ModelLoad(format!(
                "table contains a non-finite value ({v})"
            )));
        }

        Ok(Self {
            values,
            shape,
            actions: actions.to_vec(),
        })
    }

    /// Axes along which the table holds fewer bins than the discretizer can
    /// produce, as `(axis, table_len, bins)`. States landing past the table's
    /// extent on these axes resolve to [`LookupError::OutOfRange`].
    pub fn narrow_axes(&self, cardinalities: &[usize]) -> Vec<(usize, usize, usize)> {
        self.shape
            .iter()
            .zip(cardinalities)
            .enumerate()
            .filter_map(|(axis, (&len, &bins))| (len < bins).then_some((axis, len, bins)))
            .collect()
    }
}

impl PolicyLookup for PolicyTable {
    fn decide(&self, state: &DiscretizedState) -> Result<Decision, LookupError> {
        let expected = self.state_dims();
        if state.len() != expected {
            return Err(LookupError::DimensionMismatch {
                state: state.clone(),
                expected,
                got: state.len(),
            });
        }

        let mut view = self.values.view();
        for (axis, &index) in state.as_slice().iter().enumerate() {
            let len = self.shape[axis];
            if index >= len {
                return Err(LookupError::OutOfRange {
                    state: state.clone(),
                    axis,
                    index,
                    len,
                });
            }
            view = view.index_axis_move(Axis(0), index);
        }

        let values: Vec<f64> = view.iter().copied().collect();
        // Values are finite and the action axis is non-empty after validation.
        let action_index = argmax(&values).unwrap_or(0);

        debug!(state = %state, action_index, values = ?values, "Resolved policy table entry");

        Ok(Decision {
            action_index,
            action: self.actions[action_index].clone(),
            action_values: self.actions.iter().cloned().zip(values).collect(),
            state: state.clone(),
        })
    }

    fn action_labels(&self) -> &[String] {
        &self.actions
    }

    fn shape(&self) -> &[usize] {
        &self.shape
    }
}

fn decode_npy(bytes: &[u8]) -> Result<ArrayD<f64>, String> {
    match ArrayD::<f64>::read_npy(bytes) {
        Ok(values) => Ok(values),
        Err(ReadNpyError::WrongDescriptor(_)) => {
            let narrow = ArrayD::<f32>::read_npy(bytes).map_err(|e| {
                format!("unsupported element type, expected float64 or float32 ({e})")
            })?;
            debug!("Widening float32 policy table to float64");
            Ok(narrow.mapv(f64::from))
        }
        Err(e) => Err(format!("malformed .npy data ({e})")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{ArrayD, IxDyn};

    fn actions() -> Vec<String> {
        vec!["Open Surgery".to_string(), "Laparoscopy".to_string()]
    }

    /// 2 state axes of 3 bins each, 2 actions.
    fn small_table() -> PolicyTable {
        let mut values = ArrayD::<f64>::zeros(IxDyn(&[3, 3, 2]));
        values[IxDyn(&[0, 0, 0])] = 0.2;
        values[IxDyn(&[0, 0, 1])] = 0.8;
        values[IxDyn(&[1, 2, 0])] = 0.5;
        values[IxDyn(&[1, 2, 1])] = 0.5;
        values[IxDyn(&[2, 1, 0])] = 1.5;
        values[IxDyn(&[2, 1, 1])] = -0.5;
        PolicyTable::from_array(values, 2, &actions()).unwrap()
    }

    #[test]
    fn test_decide_picks_max() {
        let table = small_table();
        let decision = table.decide(&DiscretizedState(vec![0, 0])).unwrap();
        assert_eq!(decision.action_index, 1);
        assert_eq!(decision.action, "Laparoscopy");
        assert_eq!(decision.values(), vec![0.2, 0.8]);

        let decision = table.decide(&DiscretizedState(vec![2, 1])).unwrap();
        assert_eq!(decision.action, "Open Surgery");
    }

    #[test]
    fn test_decide_tie_prefers_first_action() {
        let table = small_table();
        let decision = table.decide(&DiscretizedState(vec![1, 2])).unwrap();
        assert_eq!(decision.action_index, 0);
        assert_eq!(decision.values(), vec![0.5, 0.5]);
    }

    #[test]
    fn test_decide_out_of_range() {
        let table = small_table();
        let err = table.decide(&DiscretizedState(vec![1, 3])).unwrap_err();
        assert_eq!(
            err,
            LookupError::OutOfRange {
                state: DiscretizedState(vec![1, 3]),
                axis: 1,
                index: 3,
                len: 3,
            }
        );
    }

    #[test]
    fn test_decide_wrong_length() {
        let table = small_table();
        let err = table.decide(&DiscretizedState(vec![0, 0, 0])).unwrap_err();
        assert!(matches!(
            err,
            LookupError::DimensionMismatch { expected: 2, got: 3, .. }
        ));
    }

    #[test]
    fn test_decide_is_repeatable() {
        let table = small_table();
        let state = DiscretizedState(vec![2, 1]);
        assert_eq!(table.decide(&state).unwrap(), table.decide(&state).unwrap());
    }

    #[test]
    fn test_from_array_shape_checks() {
        let wrong_ndim = ArrayD::<f64>::zeros(IxDyn(&[3, 2]));
        assert!(PolicyTable::from_array(wrong_ndim, 2, &actions()).is_err());

        let wrong_actions = ArrayD::<f64>::zeros(IxDyn(&[3, 3, 3]));
        let err = PolicyTable::from_array(wrong_actions, 2, &actions()).unwrap_err();
        assert!(err.to_string().contains("action axis holds 3 entries"));

        let empty_axis = ArrayD::<f64>::zeros(IxDyn(&[3, 0, 2]));
        assert!(PolicyTable::from_array(empty_axis, 2, &actions()).is_err());

        let mut nan = ArrayD::<f64>::zeros(IxDyn(&[1, 1, 2]));
        nan[IxDyn(&[0, 0, 1])] = f64::NAN;
        assert!(PolicyTable::from_array(nan, 2, &actions()).is_err());
    }

    #[test]
    fn test_narrow_axes() {
        let table = small_table();
        assert_eq!(table.narrow_axes(&[3, 4]), vec![(1, 3, 4)]);
        assert!(table.narrow_axes(&[2, 3]).is_empty());
        assert_eq!(table.state_dims(), 2);
    }
}
