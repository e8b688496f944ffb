// ============================================================
// Layer 3 — Artifact Descriptors
// ============================================================
// Plain descriptions of what flows between the layers:
//   - DataDesc:   name + shape + layout of a bound input/label
//   - ParamRole:  `arg` (learned) or `aux` (running state)
//   - ModuleSummary: shapes of a bound module
//   - Prediction: one batch of softmax outputs with its labels

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::constants::{ARG_ROLE, AUX_ROLE, LAYOUT_BATCH_MAJOR};

/// Shape descriptor of one named input or label tensor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataDesc {
    pub name:   String,
    pub shape:  Vec<usize>,
    pub layout: String,
}

impl DataDesc {
    /// Batch-major descriptor.
    pub fn new(name: impl Into<String>, shape: Vec<usize>) -> Self {
        Self {
            name:   name.into(),
            shape,
            layout: LAYOUT_BATCH_MAJOR.to_string(),
        }
    }

    /// Leading (batch) dimension, 0 for a scalar.
    pub fn batch_size(&self) -> usize {
        self.shape.first().copied().unwrap_or(0)
    }
}

impl fmt::Display for DataDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:?} ({})", self.name, self.shape, self.layout)
    }
}

/// Which bucket of the parameter file a tensor belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamRole {
    /// Learned weight
    Arg,
    /// Auxiliary state such as batch-norm running statistics
    Aux,
}

impl ParamRole {
    pub fn as_str(self) -> &'static str {
        match self {
            ParamRole::Arg => ARG_ROLE,
            ParamRole::Aux => AUX_ROLE,
        }
    }

    pub fn parse(role: &str) -> Option<Self> {
        match role {
            ARG_ROLE => Some(ParamRole::Arg),
            AUX_ROLE => Some(ParamRole::Aux),
            _        => None,
        }
    }
}

impl fmt::Display for ParamRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a bound module looks like, for logging and reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleSummary {
    pub data_shapes:  Vec<DataDesc>,
    pub label_shapes: Vec<DataDesc>,
    pub output_name:  String,
    pub output_shape: Vec<usize>,
    pub num_params:   usize,
    pub for_training: bool,
}

/// Forward output of one batch, flattened for metric updates.
///
/// `probs` holds `classes` values per label position, row-major
/// in the same order as `labels`.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub labels:  Vec<i64>,
    pub probs:   Vec<f32>,
    pub classes: usize,
}
