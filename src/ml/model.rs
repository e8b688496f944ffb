// ============================================================
// Layer 5 — Module Binding and Forward Pass
// ============================================================
// Binding turns a Graph + ParamSet + input descriptors into a
// runnable BoundModule:
//
//   1. Every data input gets a shape from its descriptor
//   2. Nodes are walked in order; each op's output shape is
//      inferred and checked against its parameters' shapes
//   3. Parameters are moved onto the device as burn tensors
//      (batch norm is folded into one scale and one shift)
//
// Any disagreement between shapes is a ShapeMismatch, a
// parameter absent from its role bucket is NotFound.
//
// The forward pass is inference only: no autodiff backend, no
// parameter updates. Batches may be shorter than the bound
// batch size, sequence lengths must match exactly.

use burn::{
    prelude::*,
    tensor::{activation, module::embedding, ElementConversion},
};
use std::collections::{HashMap, HashSet};

use crate::data::batcher::ValidationBatch;
use crate::domain::artifact::{DataDesc, ModuleSummary, ParamRole};
use crate::domain::error::{ExportError, Result};
use crate::infra::params::ParamSet;
use crate::ml::graph::{ActType, Graph, Op};

/// Where a node reads its value from during binding.
#[derive(Debug, Clone, Copy)]
enum Slot {
    /// Index into the graph's data inputs (token ids)
    Data(usize),
    /// Index of an earlier node (hidden states)
    Node(usize),
}

/// An op with its parameters resolved to device tensors.
/// `usize` fields index node outputs, except Embedding's `input`
/// which indexes the batch inputs.
#[derive(Debug, Clone)]
enum BoundOp<B: Backend> {
    Embedding { input: usize, weight: Tensor<B, 2>, vocab: usize },
    MeanPool { input: usize },
    Add { lhs: usize, rhs: usize },
    FullyConnected { input: usize, weight_t: Tensor<B, 2>, bias: Option<Tensor<B, 1>> },
    Activation { input: usize, act: ActType },
    BatchNorm { input: usize, scale: Tensor<B, 1>, shift: Tensor<B, 1> },
    SoftmaxOutput { input: usize },
}

#[derive(Debug, Clone)]
struct BoundNode<B: Backend> {
    name:  String,
    op:    BoundOp<B>,
    /// Inferred output shape at the bound batch size
    shape: [usize; 3],
}

/// A graph bound to concrete shapes and parameter values.
#[derive(Debug, Clone)]
pub struct BoundModule<B: Backend> {
    data_shapes:  Vec<DataDesc>,
    label_shapes: Vec<DataDesc>,
    input_names:  Vec<String>,
    input_shapes: Vec<[usize; 2]>,
    nodes:        Vec<BoundNode<B>>,
    output:       usize,
    output_name:  String,
    for_training: bool,
    num_params:   usize,
}

impl<B: Backend> BoundModule<B> {
    /// Bind `graph` for the given descriptors and parameters.
    pub fn bind(
        graph:        &Graph,
        data_shapes:  &[DataDesc],
        label_shapes: &[DataDesc],
        params:       &ParamSet,
        for_training: bool,
        device:       &B::Device,
    ) -> Result<Self> {
        // ── Data inputs ──────────────────────────────────────────────────────
        let mut input_shapes = Vec::with_capacity(graph.data_names.len());
        for name in &graph.data_names {
            let desc = data_shapes.iter().find(|d| &d.name == name).ok_or_else(|| {
                ExportError::shape_mismatch(format!("no data descriptor for graph input '{name}'"))
            })?;
            input_shapes.push(id_shape(desc)?);
        }
        let batch = input_shapes[0][0];
        if let Some((name, shape)) = graph
            .data_names
            .iter()
            .zip(&input_shapes)
            .find(|(_, s)| s[0] != batch)
        {
            return Err(ExportError::shape_mismatch(format!(
                "input '{name}' has batch size {} but '{}' has {batch}",
                shape[0], graph.data_names[0]
            )));
        }

        let label_name = graph.output_label();
        let label_desc = label_shapes.iter().find(|d| d.name == label_name).ok_or_else(|| {
            ExportError::shape_mismatch(format!("no label descriptor for '{label_name}'"))
        })?;
        let label_shape = id_shape(label_desc)?;

        // ── Nodes ────────────────────────────────────────────────────────────
        let mut slots: HashMap<&str, Slot> = graph
            .data_names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.as_str(), Slot::Data(i)))
            .collect();
        let mut nodes: Vec<BoundNode<B>> = Vec::with_capacity(graph.nodes.len());

        for node in &graph.nodes {
            let name = node.name.as_str();
            let slot = |input: &str| {
                slots.get(input).copied().ok_or_else(|| {
                    ExportError::format(format!("node '{name}' reads unknown value '{input}'"))
                })
            };
            // Hidden-state input: its node index and shape
            let hidden = |input: &str| -> Result<(usize, [usize; 3])> {
                match slot(input)? {
                    Slot::Node(i) => Ok((i, nodes[i].shape)),
                    Slot::Data(_) => Err(ExportError::shape_mismatch(format!(
                        "node '{name}' expects hidden states but '{input}' holds token ids"
                    ))),
                }
            };

            let (op, shape) = match &node.op {
                Op::Embedding { input, weight } => {
                    let Slot::Data(i) = slot(input)? else {
                        return Err(ExportError::shape_mismatch(format!(
                            "embedding '{name}' needs token ids, '{input}' holds hidden states"
                        )));
                    };
                    let (weight, [vocab, dim]) = matrix::<B>(params, weight, device)?;
                    let [b, t] = input_shapes[i];
                    (BoundOp::Embedding { input: i, weight, vocab }, [b, t, dim])
                }

                Op::MeanPool { input } => {
                    let (i, [b, _, d]) = hidden(input)?;
                    (BoundOp::MeanPool { input: i }, [b, 1, d])
                }

                Op::Add { lhs, rhs } => {
                    let (l, ls) = hidden(lhs)?;
                    let (r, rs) = hidden(rhs)?;
                    if ls[0] != rs[0] || ls[2] != rs[2] || (rs[1] != ls[1] && rs[1] != 1) {
                        return Err(ExportError::shape_mismatch(format!(
                            "add '{name}': cannot broadcast {rs:?} onto {ls:?}"
                        )));
                    }
                    (BoundOp::Add { lhs: l, rhs: r }, ls)
                }

                Op::FullyConnected { input, weight, bias } => {
                    let (i, [b, t, d]) = hidden(input)?;
                    let (weight, [h, d_in]) = matrix::<B>(params, weight, device)?;
                    if d_in != d {
                        return Err(ExportError::shape_mismatch(format!(
                            "fully_connected '{name}': weight expects {d_in} features, input has {d}"
                        )));
                    }
                    let bias = bias
                        .as_deref()
                        .map(|bias| vector::<B>(params, ParamRole::Arg, bias, h, device))
                        .transpose()?;
                    let weight_t = weight.transpose();
                    (BoundOp::FullyConnected { input: i, weight_t, bias }, [b, t, h])
                }

                Op::Activation { input, act_type } => {
                    let (i, shape) = hidden(input)?;
                    (BoundOp::Activation { input: i, act: *act_type }, shape)
                }

                Op::BatchNorm { input, gamma, beta, moving_mean, moving_var, eps } => {
                    let (i, shape) = hidden(input)?;
                    let d     = shape[2];
                    let gamma = vector::<B>(params, ParamRole::Arg, gamma, d, device)?;
                    let beta  = vector::<B>(params, ParamRole::Arg, beta, d, device)?;
                    let mean  = vector::<B>(params, ParamRole::Aux, moving_mean, d, device)?;
                    let var   = vector::<B>(params, ParamRole::Aux, moving_var, d, device)?;

                    // y = (x - mean) / sqrt(var + eps) * gamma + beta = x * scale + shift
                    let scale = gamma.div(var.add_scalar(*eps).sqrt());
                    let shift = beta.sub(mean.mul(scale.clone()));
                    (BoundOp::BatchNorm { input: i, scale, shift }, shape)
                }

                Op::SoftmaxOutput { input, label } => {
                    let (i, [b, t, v]) = hidden(input)?;
                    if label == label_name && label_shape != [b, t] {
                        return Err(ExportError::shape_mismatch(format!(
                            "softmax '{name}' produces [{b}, {t}, {v}] but label '{label}' is {:?}",
                            label_shape
                        )));
                    }
                    (BoundOp::SoftmaxOutput { input: i }, [b, t, v])
                }
            };

            slots.insert(name, Slot::Node(nodes.len()));
            nodes.push(BoundNode { name: node.name.clone(), op, shape });
        }

        let output = nodes
            .iter()
            .position(|n| n.name == graph.output)
            .ok_or_else(|| ExportError::format(format!("output node '{}' missing", graph.output)))?;

        let used: HashSet<(ParamRole, &str)> = graph.params().into_iter().collect();
        if params.len() > used.len() {
            tracing::debug!(
                "{} parameter(s) in the params file are not used by the graph",
                params.len() - used.len()
            );
        }

        Ok(Self {
            data_shapes:  data_shapes.to_vec(),
            label_shapes: label_shapes.to_vec(),
            input_names:  graph.data_names.clone(),
            input_shapes,
            nodes,
            output,
            output_name:  graph.output_name(),
            for_training,
            num_params:   used.len(),
        })
    }

    /// Run the graph on one batch and return the output probabilities
    /// with shape [batch, time, classes].
    pub fn forward(&self, batch: &ValidationBatch<B>) -> Result<Tensor<B, 3>> {
        if batch.inputs.len() != self.input_shapes.len() {
            return Err(ExportError::shape_mismatch(format!(
                "batch has {} inputs, module was bound with {}",
                batch.inputs.len(), self.input_shapes.len()
            )));
        }
        for (name, (ids, [bound_b, bound_t])) in self
            .input_names
            .iter()
            .zip(batch.inputs.iter().zip(&self.input_shapes))
        {
            let [b, t] = ids.dims();
            if t != *bound_t || b > *bound_b || b != batch.batch_size() {
                return Err(ExportError::shape_mismatch(format!(
                    "input '{name}' is [{b}, {t}] but the module was bound for [{bound_b}, {bound_t}]"
                )));
            }
        }

        let mut outputs: Vec<Tensor<B, 3>> = Vec::with_capacity(self.nodes.len());
        for node in &self.nodes {
            let out = match &node.op {
                BoundOp::Embedding { input, weight, vocab } => {
                    let ids = batch.inputs[*input].clone();
                    check_ids(&ids, *vocab, &node.name)?;
                    embedding(weight.clone(), ids)
                }

                BoundOp::MeanPool { input } => outputs[*input].clone().mean_dim(1),

                BoundOp::Add { lhs, rhs } => {
                    let lhs  = outputs[*lhs].clone();
                    let dims = lhs.dims();
                    lhs + outputs[*rhs].clone().expand(dims)
                }

                BoundOp::FullyConnected { input, weight_t, bias } => {
                    let [b, t, d] = outputs[*input].dims();
                    let h = weight_t.dims()[1];
                    let y = outputs[*input]
                        .clone()
                        .reshape([b * t, d])
                        .matmul(weight_t.clone());
                    let y = match bias {
                        Some(bias) => y + bias.clone().unsqueeze::<2>().expand([b * t, h]),
                        None       => y,
                    };
                    y.reshape([b, t, h])
                }

                BoundOp::Activation { input, act } => {
                    let x = outputs[*input].clone();
                    match act {
                        ActType::Relu    => activation::relu(x),
                        ActType::Tanh    => activation::tanh(x),
                        ActType::Sigmoid => activation::sigmoid(x),
                    }
                }

                BoundOp::BatchNorm { input, scale, shift } => {
                    let x    = outputs[*input].clone();
                    let dims = x.dims();
                    let d    = dims[2];
                    x * scale.clone().reshape([1, 1, d]).expand(dims)
                        + shift.clone().reshape([1, 1, d]).expand(dims)
                }

                BoundOp::SoftmaxOutput { input } => activation::softmax(outputs[*input].clone(), 2),
            };
            outputs.push(out);
        }

        outputs
            .into_iter()
            .nth(self.output)
            .ok_or_else(|| ExportError::backend("graph produced no output"))
    }

    pub fn output_name(&self) -> &str { &self.output_name }

    /// Output shape at the bound batch size: [batch, time, classes].
    pub fn output_shape(&self) -> [usize; 3] { self.nodes[self.output].shape }

    pub fn classes(&self) -> usize { self.output_shape()[2] }

    pub fn for_training(&self) -> bool { self.for_training }

    /// Number of distinct parameters the graph consumed.
    pub fn num_params(&self) -> usize { self.num_params }

    pub fn summary(&self) -> ModuleSummary {
        ModuleSummary {
            data_shapes:  self.data_shapes.clone(),
            label_shapes: self.label_shapes.clone(),
            output_name:  self.output_name.clone(),
            output_shape: self.output_shape().to_vec(),
            num_params:   self.num_params,
            for_training: self.for_training,
        }
    }
}

/// Batch and time dims of an id descriptor ([B, T] or [B, T, 1]).
fn id_shape(desc: &DataDesc) -> Result<[usize; 2]> {
    match desc.shape.as_slice() {
        &[b, t] | &[b, t, 1] => Ok([b, t]),
        other => Err(ExportError::shape_mismatch(format!(
            "'{}' must be [batch, length] or [batch, length, 1], got {other:?}",
            desc.name
        ))),
    }
}

/// Fetch a rank-2 `arg` parameter as a device tensor.
fn matrix<B: Backend>(
    params: &ParamSet,
    name:   &str,
    device: &B::Device,
) -> Result<(Tensor<B, 2>, [usize; 2])> {
    let data = params.require(ParamRole::Arg, name)?;
    match data.shape.as_slice() {
        &[rows, cols] => Ok((Tensor::from_data(data.clone(), device), [rows, cols])),
        other => Err(ExportError::shape_mismatch(format!(
            "parameter '{name}' must be a matrix, got shape {other:?}"
        ))),
    }
}

/// Fetch a parameter that must be a vector of length `len`.
fn vector<B: Backend>(
    params: &ParamSet,
    role:   ParamRole,
    name:   &str,
    len:    usize,
    device: &B::Device,
) -> Result<Tensor<B, 1>> {
    let data = params.require(role, name)?;
    if data.shape != [len] {
        return Err(ExportError::shape_mismatch(format!(
            "parameter '{role}:{name}' must have shape [{len}], got {:?}",
            data.shape
        )));
    }
    Ok(Tensor::from_data(data.clone(), device))
}

/// Token ids must index inside the embedding table.
fn check_ids<B: Backend>(ids: &Tensor<B, 2, Int>, vocab: usize, node: &str) -> Result<()> {
    if ids.dims().iter().any(|&d| d == 0) {
        return Ok(());
    }
    let max = ids.clone().max().into_scalar().elem::<i64>();
    if max < 0 || max as usize >= vocab {
        return Err(ExportError::shape_mismatch(format!(
            "embedding '{node}' has {vocab} rows but the batch holds token id {max}"
        )));
    }
    Ok(())
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::TensorData;

    type TestBackend = NdArray;

    const SEQ2SEQ: &str = r#"{
        "nodes": [
            {"name": "src_embed", "op": "embedding", "input": "source", "weight": "src_w"},
            {"name": "src_ctx",   "op": "mean_pool", "input": "src_embed"},
            {"name": "tgt_embed", "op": "embedding", "input": "target", "weight": "tgt_w"},
            {"name": "hidden",    "op": "add", "lhs": "tgt_embed", "rhs": "src_ctx"},
            {"name": "act",       "op": "activation", "input": "hidden", "act_type": "tanh"},
            {"name": "logits",    "op": "fully_connected", "input": "act", "weight": "out_w", "bias": "out_b"},
            {"name": "softmax",   "op": "softmax_output", "input": "logits", "label": "target_label"}
        ],
        "output": "softmax"
    }"#;

    fn ramp(len: usize, shape: Vec<usize>) -> TensorData {
        TensorData::new((0..len).map(|v| v as f32 * 0.1).collect::<Vec<f32>>(), shape)
    }

    fn seq2seq_params() -> ParamSet {
        let mut params = ParamSet::default();
        params.arg.insert("src_w".into(), ramp(8, vec![4, 2]));
        params.arg.insert("tgt_w".into(), ramp(8, vec![4, 2]));
        params.arg.insert("out_w".into(), ramp(10, vec![5, 2]));
        params.arg.insert("out_b".into(), ramp(5, vec![5]));
        params
    }

    fn descs(batch: usize, len: usize) -> (Vec<DataDesc>, Vec<DataDesc>) {
        (
            vec![
                DataDesc::new("source", vec![batch, len, 1]),
                DataDesc::new("target", vec![batch, len]),
            ],
            vec![DataDesc::new("target_label", vec![batch, len])],
        )
    }

    fn batch(rows: &[&[i32]], inputs: usize) -> ValidationBatch<TestBackend> {
        let device = Default::default();
        let b = rows.len();
        let t = rows[0].len();
        let flat: Vec<i32> = rows.iter().flat_map(|r| r.iter().copied()).collect();
        let ids = Tensor::<TestBackend, 1, Int>::from_ints(flat.as_slice(), &device).reshape([b, t]);
        ValidationBatch {
            inputs:      vec![ids; inputs],
            labels:      flat.iter().map(|&x| x as i64).collect(),
            label_shape: [b, t],
        }
    }

    #[test]
    fn test_bind_infers_output_shape() {
        let graph = Graph::from_json(SEQ2SEQ).unwrap();
        let (data, label) = descs(4, 3);
        let module = BoundModule::<TestBackend>::bind(
            &graph, &data, &label, &seq2seq_params(), false, &Default::default(),
        )
        .unwrap();

        assert_eq!(module.output_shape(), [4, 3, 5]);
        assert_eq!(module.classes(), 5);
        assert_eq!(module.output_name(), "softmax_output");
        assert_eq!(module.num_params(), 4);
        assert!(!module.for_training());
    }

    #[test]
    fn test_forward_rows_are_distributions() {
        let graph = Graph::from_json(SEQ2SEQ).unwrap();
        let (data, label) = descs(4, 3);
        let module = BoundModule::<TestBackend>::bind(
            &graph, &data, &label, &seq2seq_params(), false, &Default::default(),
        )
        .unwrap();

        // A short batch is accepted
        let out = module.forward(&batch(&[&[1, 2, 3], &[0, 0, 1]], 2)).unwrap();
        assert_eq!(out.dims(), [2, 3, 5]);

        let probs = out.into_data().convert::<f32>().to_vec::<f32>().unwrap();
        for row in probs.chunks(5) {
            let sum: f32 = row.iter().sum();
            assert!((sum - 1.0).abs() < 1e-5, "row sums to {sum}");
        }
    }

    #[test]
    fn test_missing_parameter_is_not_found() {
        let graph = Graph::from_json(SEQ2SEQ).unwrap();
        let (data, label) = descs(4, 3);
        let mut params = seq2seq_params();
        params.arg.remove("out_b");

        let err = BoundModule::<TestBackend>::bind(
            &graph, &data, &label, &params, false, &Default::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ExportError::NotFound(_)));
    }

    #[test]
    fn test_weight_width_mismatch_is_shape_error() {
        let graph = Graph::from_json(SEQ2SEQ).unwrap();
        let (data, label) = descs(4, 3);
        let mut params = seq2seq_params();
        params.arg.insert("out_w".into(), ramp(15, vec![5, 3]));

        let err = BoundModule::<TestBackend>::bind(
            &graph, &data, &label, &params, false, &Default::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ExportError::ShapeMismatch(_)));
    }

    #[test]
    fn test_label_shape_must_match_output() {
        let graph = Graph::from_json(SEQ2SEQ).unwrap();
        let (data, _) = descs(4, 3);
        let label = vec![DataDesc::new("target_label", vec![4, 7])];

        let err = BoundModule::<TestBackend>::bind(
            &graph, &data, &label, &seq2seq_params(), false, &Default::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ExportError::ShapeMismatch(_)));
    }

    #[test]
    fn test_forward_rejects_other_sequence_length() {
        let graph = Graph::from_json(SEQ2SEQ).unwrap();
        let (data, label) = descs(4, 3);
        let module = BoundModule::<TestBackend>::bind(
            &graph, &data, &label, &seq2seq_params(), false, &Default::default(),
        )
        .unwrap();

        let err = module.forward(&batch(&[&[1, 2]], 2)).unwrap_err();
        assert!(matches!(err, ExportError::ShapeMismatch(_)));
    }

    #[test]
    fn test_out_of_vocabulary_id_is_rejected() {
        let graph = Graph::from_json(SEQ2SEQ).unwrap();
        let (data, label) = descs(4, 3);
        let module = BoundModule::<TestBackend>::bind(
            &graph, &data, &label, &seq2seq_params(), false, &Default::default(),
        )
        .unwrap();

        let err = module.forward(&batch(&[&[1, 2, 9]], 2)).unwrap_err();
        assert!(matches!(err, ExportError::ShapeMismatch(_)));
    }

    #[test]
    fn test_batch_norm_uses_running_statistics() {
        let graph = Graph::from_json(
            r#"{
                "data_names": ["target"],
                "nodes": [
                    {"name": "emb", "op": "embedding", "input": "target", "weight": "w"},
                    {"name": "bn",  "op": "batch_norm", "input": "emb", "gamma": "g", "beta": "b",
                     "moving_mean": "mean", "moving_var": "var", "eps": 0.0},
                    {"name": "softmax", "op": "softmax_output", "input": "bn", "label": "target_label"}
                ],
                "output": "softmax"
            }"#,
        )
        .unwrap();

        // (x - 1) / 2 * 2 + 0 = x - 1, softmax is shift invariant
        let ln3 = 3.0f32.ln();
        let mut params = ParamSet::default();
        params.arg.insert("w".into(), TensorData::new(vec![0.0, ln3, ln3, 0.0], vec![2, 2]));
        params.arg.insert("g".into(), TensorData::new(vec![2.0f32, 2.0], vec![2]));
        params.arg.insert("b".into(), TensorData::new(vec![0.0f32, 0.0], vec![2]));
        params.aux.insert("mean".into(), TensorData::new(vec![1.0f32, 1.0], vec![2]));
        params.aux.insert("var".into(), TensorData::new(vec![4.0f32, 4.0], vec![2]));

        let data  = vec![DataDesc::new("target", vec![1, 2])];
        let label = vec![DataDesc::new("target_label", vec![1, 2])];
        let module = BoundModule::<TestBackend>::bind(
            &graph, &data, &label, &params, false, &Default::default(),
        )
        .unwrap();

        let probs = module
            .forward(&batch(&[&[0, 1]], 1))
            .unwrap()
            .into_data()
            .convert::<f32>()
            .to_vec::<f32>()
            .unwrap();
        let expected = [0.25, 0.75, 0.75, 0.25];
        for (p, e) in probs.iter().zip(expected) {
            assert!((p - e).abs() < 1e-5, "{probs:?}");
        }
    }

    #[test]
    fn test_aux_statistic_under_arg_is_not_found() {
        let graph = Graph::from_json(
            r#"{
                "data_names": ["target"],
                "nodes": [
                    {"name": "emb", "op": "embedding", "input": "target", "weight": "w"},
                    {"name": "bn",  "op": "batch_norm", "input": "emb", "gamma": "g", "beta": "b",
                     "moving_mean": "mean", "moving_var": "var"},
                    {"name": "softmax", "op": "softmax_output", "input": "bn", "label": "target_label"}
                ],
                "output": "softmax"
            }"#,
        )
        .unwrap();
        let mut params = ParamSet::default();
        for name in ["g", "b", "mean", "var"] {
            params.arg.insert(name.into(), TensorData::new(vec![1.0f32, 1.0], vec![2]));
        }
        params.arg.insert("w".into(), TensorData::new(vec![0.0f32; 4], vec![2, 2]));

        let data  = vec![DataDesc::new("target", vec![1, 2])];
        let label = vec![DataDesc::new("target_label", vec![1, 2])];
        let err = BoundModule::<TestBackend>::bind(
            &graph, &data, &label, &params, false, &Default::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ExportError::NotFound(_)));
    }
}
