// ============================================================
// Layer 5 — Graph Description
// ============================================================
// The model symbol file: a JSON list of named nodes, each one
// an op reading from data inputs or earlier nodes. The graph
// only names its parameters; the tensors come from the params
// file and are attached when the module is bound.
//
// Example (symbol.json):
//   {
//     "data_names":  ["source", "target"],
//     "label_names": ["target_label"],
//     "nodes": [
//       {"name": "src_embed", "op": "embedding", "input": "source", "weight": "source_embed_weight"},
//       {"name": "src_ctx",   "op": "mean_pool", "input": "src_embed"},
//       {"name": "tgt_embed", "op": "embedding", "input": "target", "weight": "target_embed_weight"},
//       {"name": "hidden",    "op": "add", "lhs": "tgt_embed", "rhs": "src_ctx"},
//       {"name": "logits",    "op": "fully_connected", "input": "hidden",
//        "weight": "output_weight", "bias": "output_bias"},
//       {"name": "softmax",   "op": "softmax_output", "input": "logits", "label": "target_label"}
//     ],
//     "output": "softmax"
//   }

use serde::{Deserialize, Serialize};
use std::{collections::HashSet, fs, path::Path};

use crate::domain::artifact::ParamRole;
use crate::domain::constants::{OUTPUT_SUFFIX, SOURCE_NAME, TARGET_LABEL_NAME, TARGET_NAME};
use crate::domain::error::{ExportError, Result};

fn default_data_names() -> Vec<String> {
    vec![SOURCE_NAME.to_string(), TARGET_NAME.to_string()]
}

fn default_label_names() -> Vec<String> {
    vec![TARGET_LABEL_NAME.to_string()]
}

fn default_eps() -> f64 { 1e-5 }

/// Elementwise non-linearity of an `activation` node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActType {
    Relu,
    Tanh,
    Sigmoid,
}

/// Operation of a graph node and the names it reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Op {
    /// ids [B, T] → [B, T, D] through an arg weight [V, D]
    Embedding { input: String, weight: String },

    /// [B, T, D] → [B, 1, D]
    MeanPool { input: String },

    /// Elementwise sum; `rhs` may have time length 1
    Add { lhs: String, rhs: String },

    /// [B, T, D] → [B, T, H] through weight [H, D] and optional bias [H]
    FullyConnected {
        input:  String,
        weight: String,
        #[serde(default)]
        bias:   Option<String>,
    },

    Activation { input: String, act_type: ActType },

    /// Inference-mode normalisation over the last axis
    BatchNorm {
        input:       String,
        gamma:       String,
        beta:        String,
        moving_mean: String,
        moving_var:  String,
        #[serde(default = "default_eps")]
        eps:         f64,
    },

    /// Softmax over classes, scored against `label`
    SoftmaxOutput { input: String, label: String },
}

impl Op {
    /// Names of the values this op reads.
    pub fn inputs(&self) -> Vec<&str> {
        match self {
            Op::Embedding { input, .. }
            | Op::MeanPool { input }
            | Op::FullyConnected { input, .. }
            | Op::Activation { input, .. }
            | Op::BatchNorm { input, .. }
            | Op::SoftmaxOutput { input, .. } => vec![input.as_str()],
            Op::Add { lhs, rhs } => vec![lhs.as_str(), rhs.as_str()],
        }
    }

    /// Parameters this op needs, with the role bucket each lives in.
    pub fn params(&self) -> Vec<(ParamRole, &str)> {
        match self {
            Op::Embedding { weight, .. } => vec![(ParamRole::Arg, weight.as_str())],
            Op::FullyConnected { weight, bias, .. } => {
                let mut p = vec![(ParamRole::Arg, weight.as_str())];
                if let Some(bias) = bias {
                    p.push((ParamRole::Arg, bias.as_str()));
                }
                p
            }
            Op::BatchNorm { gamma, beta, moving_mean, moving_var, .. } => vec![
                (ParamRole::Arg, gamma.as_str()),
                (ParamRole::Arg, beta.as_str()),
                (ParamRole::Aux, moving_mean.as_str()),
                (ParamRole::Aux, moving_var.as_str()),
            ],
            Op::MeanPool { .. }
            | Op::Add { .. }
            | Op::Activation { .. }
            | Op::SoftmaxOutput { .. } => Vec::new(),
        }
    }
}

/// One named node of the graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub name: String,
    #[serde(flatten)]
    pub op:   Op,
}

/// A validated computation graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    #[serde(default = "default_data_names")]
    pub data_names:  Vec<String>,
    #[serde(default = "default_label_names")]
    pub label_names: Vec<String>,
    pub nodes:       Vec<Node>,
    /// Name of the `softmax_output` node whose output is scored
    pub output:      String,
}

impl Graph {
    /// Read and validate a symbol file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|e| ExportError::io(path, e))?;
        let graph = Self::from_json(&json).map_err(|e| match e {
            ExportError::Format(msg) => {
                ExportError::format(format!("symbol '{}': {msg}", path.display()))
            }
            other => other,
        })?;

        tracing::debug!(
            "Graph '{}': {} nodes, inputs {:?}, output '{}'",
            path.display(),
            graph.nodes.len(),
            graph.data_names,
            graph.output_name()
        );
        Ok(graph)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let graph: Graph = serde_json::from_str(json)
            .map_err(|e| ExportError::format(format!("invalid graph JSON: {e}")))?;
        graph.validate()?;
        Ok(graph)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| ExportError::format(format!("cannot encode graph: {e}")))
    }

    /// Name resolution checks; shapes are checked when binding.
    pub fn validate(&self) -> Result<()> {
        if self.data_names.is_empty() {
            return Err(ExportError::format("graph declares no data inputs"));
        }

        let mut defined: HashSet<&str> = HashSet::new();
        for name in self.data_names.iter().chain(&self.label_names) {
            if !defined.insert(name.as_str()) {
                return Err(ExportError::format(format!("input '{name}' declared twice")));
            }
        }

        for node in &self.nodes {
            for input in node.op.inputs() {
                if !defined.contains(input) || self.label_names.iter().any(|l| l == input) {
                    return Err(ExportError::format(format!(
                        "node '{}' reads '{input}', which is not a data input or an earlier node",
                        node.name
                    )));
                }
            }
            if let Op::SoftmaxOutput { label, .. } = &node.op {
                if !self.label_names.contains(label) {
                    return Err(ExportError::format(format!(
                        "node '{}' scores against undeclared label '{label}'", node.name
                    )));
                }
            }
            if !defined.insert(node.name.as_str()) {
                return Err(ExportError::format(format!(
                    "node name '{}' is used twice", node.name
                )));
            }
        }

        match self.output_node() {
            Some(Node { op: Op::SoftmaxOutput { .. }, .. }) => Ok(()),
            Some(_) => Err(ExportError::format(format!(
                "output node '{}' is not a softmax_output", self.output
            ))),
            None => Err(ExportError::format(format!(
                "output node '{}' does not exist", self.output
            ))),
        }
    }

    fn output_node(&self) -> Option<&Node> {
        self.nodes.iter().find(|n| n.name == self.output)
    }

    /// Name the output is exposed under, e.g. `softmax_output`.
    pub fn output_name(&self) -> String {
        format!("{}{}", self.output, OUTPUT_SUFFIX)
    }

    /// Label the output node is scored against.
    pub fn output_label(&self) -> &str {
        match self.output_node() {
            Some(Node { op: Op::SoftmaxOutput { label, .. }, .. }) => label.as_str(),
            // validate() guarantees a softmax output; fall back to the first label
            _ => self.label_names.first().map_or(TARGET_LABEL_NAME, String::as_str),
        }
    }

    /// Every parameter the graph needs, in node order.
    pub fn params(&self) -> Vec<(ParamRole, &str)> {
        self.nodes.iter().flat_map(|n| n.op.params()).collect()
    }
}
