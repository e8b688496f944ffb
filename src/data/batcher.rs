// ============================================================
// Layer 4 — Validation Batcher
// ============================================================
// Implements Burn's Batcher trait to turn a Vec<ValidationSample>
// into id tensors, and walks a ValidationDataset in order,
// handing out one batch at a time.
//
// How batching works here:
//   Input:  Vec of N samples, each with one id row per input
//   Output: ValidationBatch with one [N, len] Int tensor per
//           input, plus the flattened label ids for the metric
//
// Batching policy:
//   - no shuffling, examples keep their file order
//   - the final batch is SHORT when the example count is not a
//     multiple of the batch size (it is never padded)
//
// Reference: Burn Book §4 (Batcher)

use burn::{
    data::{dataloader::batcher::Batcher, dataset::Dataset},
    prelude::*,
};

use crate::data::dataset::{ValidationDataset, ValidationSample};
use crate::domain::artifact::DataDesc;
use crate::domain::traits::BatchSource;

// ─── ValidationBatch ──────────────────────────────────────────────────────────
/// A batch ready for the forward pass.
#[derive(Debug, Clone)]
pub struct ValidationBatch<B: Backend> {
    /// Token ids per data input, shape [batch_size, len], graph order
    pub inputs: Vec<Tensor<B, 2, Int>>,

    /// Label ids flattened row-major, batch_size * label_len values
    pub labels: Vec<i64>,

    /// Shape of the label block: [batch_size, label_len]
    pub label_shape: [usize; 2],
}

impl<B: Backend> ValidationBatch<B> {
    pub fn batch_size(&self) -> usize {
        self.label_shape[0]
    }
}

// ─── ValidationBatcher ────────────────────────────────────────────────────────
/// Holds the target device so tensors are created on it.
#[derive(Clone, Debug)]
pub struct ValidationBatcher<B: Backend> {
    pub device: B::Device,
}

impl<B: Backend> ValidationBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }
}

impl<B: Backend> Batcher<ValidationSample, ValidationBatch<B>> for ValidationBatcher<B> {
    /// Stack the samples' id rows into one tensor per input.
    /// All rows of an input share one length (the dataset checked it).
    fn batch(&self, items: Vec<ValidationSample>) -> ValidationBatch<B> {
        let batch_size = items.len();
        let num_inputs = items.first().map_or(0, |s| s.inputs.len());

        let inputs = (0..num_inputs)
            .map(|i| {
                let seq_len = items[0].inputs[i].len();
                let flat: Vec<i32> = items
                    .iter()
                    .flat_map(|s| s.inputs[i].iter().copied())
                    .collect();
                Tensor::<B, 1, Int>::from_ints(flat.as_slice(), &self.device)
                    .reshape([batch_size, seq_len])
            })
            .collect();

        let label_len = items.first().map_or(0, |s| s.label.len());
        let labels = items
            .iter()
            .flat_map(|s| s.label.iter().map(|&x| x as i64))
            .collect();

        ValidationBatch {
            inputs,
            labels,
            label_shape: [batch_size, label_len],
        }
    }
}

// ─── ValidationBatches ────────────────────────────────────────────────────────
/// Ordered, single-pass iterator over the batches of a dataset.
pub struct ValidationBatches<B: Backend> {
    dataset:       ValidationDataset,
    batcher:       ValidationBatcher<B>,
    batch_size:    usize,
    cursor:        usize,
    provide_data:  Vec<DataDesc>,
    provide_label: Vec<DataDesc>,
}

impl<B: Backend> ValidationBatches<B> {
    /// `batch_size` must be at least 1.
    pub fn new(dataset: ValidationDataset, batcher: ValidationBatcher<B>, batch_size: usize) -> Self {
        let batch_size    = batch_size.max(1);
        let provide_data  = dataset.provide_data(batch_size);
        let provide_label = dataset.provide_label(batch_size);
        Self { dataset, batcher, batch_size, cursor: 0, provide_data, provide_label }
    }

    /// Number of batches this iterator yields in total.
    pub fn num_batches(&self) -> usize {
        self.dataset.len().div_ceil(self.batch_size)
    }
}

impl<B: Backend> Iterator for ValidationBatches<B> {
    type Item = ValidationBatch<B>;

    fn next(&mut self) -> Option<Self::Item> {
        let end = (self.cursor + self.batch_size).min(self.dataset.len());
        if self.cursor >= end {
            return None;
        }
        let items: Vec<ValidationSample> = (self.cursor..end)
            .filter_map(|i| self.dataset.get(i))
            .collect();
        self.cursor = end;
        Some(self.batcher.batch(items))
    }
}

impl<B: Backend> BatchSource for ValidationBatches<B> {
    fn provide_data(&self) -> &[DataDesc] {
        &self.provide_data
    }

    fn provide_label(&self) -> &[DataDesc] {
        &self.provide_label
    }

    fn num_examples(&self) -> usize {
        self.dataset.len()
    }
}
