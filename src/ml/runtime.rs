// ============================================================
// Layer 5 — Tensor Runtime Capability
// ============================================================
// The use cases never touch burn directly. They talk to a
// TensorRuntime, which can:
//
//   load_graph     — read a symbol file
//   load_params    — read and split a params file
//   bind           — attach shapes and parameters to a graph
//   forward        — run one batch, hand back probabilities
//   batch_iterate  — turn data/label dictionaries into batches
//
// BurnRuntime<B> implements it for any burn backend; the CLI
// picks NdArray (CPU) or Wgpu at startup.
//
// Reference: Rust Book §10.2 (Traits), §19.3 (Associated Types)

use burn::prelude::*;
use std::path::Path;

use crate::data::batcher::{ValidationBatch, ValidationBatcher, ValidationBatches};
use crate::data::dataset::ValidationDataset;
use crate::data::tensor_dict::NamedTensors;
use crate::domain::artifact::{DataDesc, ModuleSummary, Prediction};
use crate::domain::error::{ExportError, Result};
use crate::domain::traits::BatchSource;
use crate::infra::params::ParamSet;
use crate::ml::graph::Graph;
use crate::ml::model::BoundModule;

// ─── TensorRuntime ────────────────────────────────────────────────────────────
/// Everything the binder and scorer need from a tensor library.
pub trait TensorRuntime {
    type Module;
    type Batch;
    type Batches: BatchSource<Item = Self::Batch>;

    fn load_graph(&self, path: &Path) -> Result<Graph> {
        Graph::load(path)
    }

    fn load_params(&self, path: &Path) -> Result<ParamSet> {
        ParamSet::load(path)
    }

    fn bind(
        &self,
        graph:        &Graph,
        data_shapes:  &[DataDesc],
        label_shapes: &[DataDesc],
        params:       &ParamSet,
        for_training: bool,
    ) -> Result<Self::Module>;

    fn summary(&self, module: &Self::Module) -> ModuleSummary;

    fn forward(&self, module: &Self::Module, batch: &Self::Batch) -> Result<Prediction>;

    /// Batches over the graph's data inputs and output label,
    /// in file order. The last batch may be short.
    fn batch_iterate(
        &self,
        graph:      &Graph,
        data:       &NamedTensors,
        label:      &NamedTensors,
        batch_size: usize,
    ) -> Result<Self::Batches>;
}

// ─── BurnRuntime ──────────────────────────────────────────────────────────────
/// TensorRuntime over a burn backend on one device.
#[derive(Debug, Clone)]
pub struct BurnRuntime<B: Backend> {
    device: B::Device,
}

impl<B: Backend> BurnRuntime<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }
}

impl<B: Backend> Default for BurnRuntime<B> {
    fn default() -> Self {
        Self::new(B::Device::default())
    }
}

impl<B: Backend> TensorRuntime for BurnRuntime<B> {
    type Module  = BoundModule<B>;
    type Batch   = ValidationBatch<B>;
    type Batches = ValidationBatches<B>;

    fn bind(
        &self,
        graph:        &Graph,
        data_shapes:  &[DataDesc],
        label_shapes: &[DataDesc],
        params:       &ParamSet,
        for_training: bool,
    ) -> Result<Self::Module> {
        BoundModule::bind(graph, data_shapes, label_shapes, params, for_training, &self.device)
    }

    fn summary(&self, module: &Self::Module) -> ModuleSummary {
        module.summary()
    }

    fn forward(&self, module: &Self::Module, batch: &Self::Batch) -> Result<Prediction> {
        let output = module.forward(batch)?;
        let [b, t, classes] = output.dims();
        if batch.label_shape != [b, t] {
            return Err(ExportError::shape_mismatch(format!(
                "output is [{b}, {t}, {classes}] but labels are {:?}",
                batch.label_shape
            )));
        }

        let probs = output
            .into_data()
            .convert::<f32>()
            .to_vec::<f32>()
            .map_err(|e| ExportError::backend(format!("cannot read output tensor: {e:?}")))?;

        Ok(Prediction { labels: batch.labels.clone(), probs, classes })
    }

    fn batch_iterate(
        &self,
        graph:      &Graph,
        data:       &NamedTensors,
        label:      &NamedTensors,
        batch_size: usize,
    ) -> Result<Self::Batches> {
        if batch_size == 0 {
            return Err(ExportError::invalid_argument("batch size must be at least 1"));
        }
        let dataset = ValidationDataset::from_dicts(
            data, label, &graph.data_names, graph.output_label(),
        )?;
        tracing::debug!("Validation set: {} examples", dataset.sample_count());

        let batcher = ValidationBatcher::new(self.device.clone());
        Ok(ValidationBatches::new(dataset, batcher, batch_size))
    }
}
