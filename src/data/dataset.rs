use burn::data::dataset::Dataset;
use burn::tensor::TensorData;
use serde::{Deserialize, Serialize};

use crate::data::tensor_dict::{f32_values, NamedTensors};
use crate::domain::artifact::DataDesc;
use crate::domain::error::{ExportError, Result};

/// One sentence pair of an exported validation set.
/// `inputs` holds one id row per graph data name, in graph order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationSample {
    pub inputs: Vec<Vec<i32>>,
    pub label:  Vec<i32>,
}

/// Rows of the `.data` / `.label` dictionaries, one sample per example.
pub struct ValidationDataset {
    samples:    Vec<ValidationSample>,
    data_names: Vec<String>,
    input_lens: Vec<usize>,
    label_name: String,
    label_len:  usize,
}

impl ValidationDataset {
    /// Slice the data/label dictionaries into per-example samples.
    ///
    /// Every named tensor must have the same number of rows.
    pub fn from_dicts(
        data:       &NamedTensors,
        label:      &NamedTensors,
        data_names: &[String],
        label_name: &str,
    ) -> Result<Self> {
        let mut columns    = Vec::with_capacity(data_names.len());
        let mut input_lens = Vec::with_capacity(data_names.len());
        for name in data_names {
            let (rows, len) = token_rows(data.require(name)?, name)?;
            columns.push(rows);
            input_lens.push(len);
        }
        let (labels, label_len) = token_rows(label.require(label_name)?, label_name)?;

        let n = labels.len();
        for (name, rows) in data_names.iter().zip(&columns) {
            if rows.len() != n {
                return Err(ExportError::shape_mismatch(format!(
                    "'{name}' has {} examples but '{label_name}' has {n}",
                    rows.len()
                )));
            }
        }

        // Transpose column-wise rows into per-example samples
        let mut columns: Vec<_> = columns.into_iter().map(Vec::into_iter).collect();
        let samples = labels
            .into_iter()
            .map(|label| ValidationSample {
                inputs: columns.iter_mut().filter_map(|col| col.next()).collect(),
                label,
            })
            .collect();

        Ok(Self {
            samples,
            data_names: data_names.to_vec(),
            input_lens,
            label_name: label_name.to_string(),
            label_len,
        })
    }

    pub fn sample_count(&self) -> usize { self.samples.len() }

    /// Input descriptors for batches of `batch_size` examples.
    pub fn provide_data(&self, batch_size: usize) -> Vec<DataDesc> {
        self.data_names
            .iter()
            .zip(&self.input_lens)
            .map(|(name, &len)| DataDesc::new(name.as_str(), vec![batch_size, len]))
            .collect()
    }

    /// Label descriptor for batches of `batch_size` examples.
    pub fn provide_label(&self, batch_size: usize) -> Vec<DataDesc> {
        vec![DataDesc::new(self.label_name.as_str(), vec![batch_size, self.label_len])]
    }
}

impl Dataset<ValidationSample> for ValidationDataset {
    fn get(&self, index: usize) -> Option<ValidationSample> {
        self.samples.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}

/// Split an id tensor of shape [N, T] (or [N, T, 1]) into N rows.
fn token_rows(tensor: &TensorData, name: &str) -> Result<(Vec<Vec<i32>>, usize)> {
    let (n, len) = match tensor.shape.as_slice() {
        &[n, len]    => (n, len),
        &[n, len, 1] => (n, len),
        other => {
            return Err(ExportError::shape_mismatch(format!(
                "'{name}' must be [examples, length] or [examples, length, 1], got {other:?}"
            )))
        }
    };

    let values = f32_values(tensor)?;
    if let Some(bad) = values
        .iter()
        .find(|v| **v < 0.0 || v.fract() != 0.0 || **v > i32::MAX as f32)
    {
        return Err(ExportError::format(format!(
            "'{name}' holds {bad}, which is not a token id"
        )));
    }

    let rows = (0..n)
        .map(|i| values[i * len..(i + 1) * len].iter().map(|&v| v as i32).collect())
        .collect();
    Ok((rows, len))
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::constants::{SOURCE_NAME, TARGET_LABEL_NAME, TARGET_NAME};

    fn names() -> Vec<String> {
        vec![SOURCE_NAME.to_string(), TARGET_NAME.to_string()]
    }

    fn dicts(label_rows: usize) -> (NamedTensors, NamedTensors) {
        let mut data = NamedTensors::new();
        data.insert(SOURCE_NAME, TensorData::new(vec![1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0], vec![2, 3, 1]));
        data.insert(TARGET_NAME, TensorData::new(vec![1.0f32, 7.0, 1.0, 8.0], vec![2, 2]));
        let mut label = NamedTensors::new();
        let values: Vec<f32> = (0..label_rows * 2).map(|v| v as f32).collect();
        label.insert(TARGET_LABEL_NAME, TensorData::new(values, vec![label_rows, 2]));
        (data, label)
    }

    #[test]
    fn test_rows_are_split_per_example() {
        let (data, label) = dicts(2);
        let ds = ValidationDataset::from_dicts(&data, &label, &names(), TARGET_LABEL_NAME).unwrap();

        assert_eq!(ds.len(), 2);
        let second = ds.get(1).unwrap();
        assert_eq!(second.inputs, vec![vec![4, 5, 6], vec![1, 8]]);
        assert_eq!(second.label, vec![2, 3]);

        let descs = ds.provide_data(64);
        assert_eq!(descs[0].shape, vec![64, 3]);
        assert_eq!(ds.provide_label(64)[0].shape, vec![64, 2]);
    }

    #[test]
    fn test_row_count_mismatch_is_shape_error() {
        let (data, label) = dicts(3);
        let err = ValidationDataset::from_dicts(&data, &label, &names(), TARGET_LABEL_NAME);
        assert!(matches!(err, Err(ExportError::ShapeMismatch(_))));
    }

    #[test]
    fn test_fractional_ids_are_rejected() {
        let (mut data, label) = dicts(2);
        data.insert(TARGET_NAME, TensorData::new(vec![1.5f32, 7.0, 1.0, 8.0], vec![2, 2]));
        let err = ValidationDataset::from_dicts(&data, &label, &names(), TARGET_LABEL_NAME);
        assert!(matches!(err, Err(ExportError::Format(_))));
    }

    #[test]
    fn test_missing_label_tensor_is_not_found() {
        let (data, _) = dicts(2);
        let err = ValidationDataset::from_dicts(&data, &NamedTensors::new(), &names(), TARGET_LABEL_NAME);
        assert!(matches!(err, Err(ExportError::NotFound(_))));
    }
}
