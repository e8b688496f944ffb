// ============================================================
// Layer 4 — Parallel Dataset Shard
// ============================================================
// A bucketed parallel corpus as written by the training data
// preparation step. Each bucket groups sentence pairs of
// similar length and holds three tensors:
//
//   source.<i>  — [N, S] or [N, S, factors] source token ids
//   target.<i>  — [N, T] decoder input ids
//   label.<i>   — [N, T] decoder output ids (target shifted by one)
//
// Without bucketing the shard has exactly one bucket, index 0,
// holding every example.

use burn::tensor::TensorData;
use std::{collections::BTreeMap, path::Path};

use crate::data::tensor_dict::NamedTensors;
use crate::domain::constants::{SHARD_LABEL_PREFIX, SHARD_SOURCE_PREFIX, SHARD_TARGET_PREFIX};
use crate::domain::error::{ExportError, Result};

/// Source, target and label tensors of one length bucket.
#[derive(Debug, Clone)]
pub struct Bucket<'a> {
    pub source: &'a TensorData,
    pub target: &'a TensorData,
    pub label:  &'a TensorData,
}

/// Parallel source/target/label tensors split into length buckets.
#[derive(Debug, Clone, Default)]
pub struct ParallelDataSet {
    pub source: Vec<TensorData>,
    pub target: Vec<TensorData>,
    pub label:  Vec<TensorData>,
}

impl ParallelDataSet {
    /// Build a dataset; all three bucket lists must be equally long.
    pub fn new(
        source: Vec<TensorData>,
        target: Vec<TensorData>,
        label:  Vec<TensorData>,
    ) -> Result<Self> {
        if source.len() != target.len() || target.len() != label.len() {
            return Err(ExportError::format(format!(
                "bucket lists differ in length: {} source, {} target, {} label",
                source.len(), target.len(), label.len()
            )));
        }
        Ok(Self { source, target, label })
    }

    pub fn num_buckets(&self) -> usize {
        self.source.len()
    }

    /// Borrow bucket `index`; a missing bucket is `NotFound`.
    pub fn bucket(&self, index: usize) -> Result<Bucket<'_>> {
        if index >= self.num_buckets() {
            return Err(ExportError::not_found(format!(
                "bucket {index} requested but the shard has {} bucket(s)",
                self.num_buckets()
            )));
        }
        Ok(Bucket {
            source: &self.source[index],
            target: &self.target[index],
            label:  &self.label[index],
        })
    }

    /// Load a shard written by `save`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let dict = NamedTensors::load(path)?;

        let mut source = BTreeMap::new();
        let mut target = BTreeMap::new();
        let mut label  = BTreeMap::new();

        for (name, tensor) in dict {
            let (prefix, index) = parse_shard_key(&name)?;
            let lists = match prefix {
                SHARD_SOURCE_PREFIX => &mut source,
                SHARD_TARGET_PREFIX => &mut target,
                _                   => &mut label,
            };
            lists.insert(index, tensor);
        }

        let dataset = Self::new(
            contiguous(source, SHARD_SOURCE_PREFIX)?,
            contiguous(target, SHARD_TARGET_PREFIX)?,
            contiguous(label,  SHARD_LABEL_PREFIX)?,
        )?;

        tracing::debug!(
            "Shard '{}' holds {} bucket(s)",
            path.display(),
            dataset.num_buckets()
        );
        Ok(dataset)
    }

    /// Write the shard as a single tensor container.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut dict = NamedTensors::new();
        for (prefix, list) in [
            (SHARD_SOURCE_PREFIX, &self.source),
            (SHARD_TARGET_PREFIX, &self.target),
            (SHARD_LABEL_PREFIX,  &self.label),
        ] {
            for (i, tensor) in list.iter().enumerate() {
                dict.insert(format!("{prefix}.{i}"), tensor.clone());
            }
        }
        dict.save(path)
    }
}

/// Split `source.3` into (`source`, 3).
fn parse_shard_key(name: &str) -> Result<(&str, usize)> {
    let bad = || ExportError::format(format!(
        "unexpected tensor '{name}' in shard, expected <source|target|label>.<bucket>"
    ));

    let (prefix, index) = name.split_once('.').ok_or_else(bad)?;
    if ![SHARD_SOURCE_PREFIX, SHARD_TARGET_PREFIX, SHARD_LABEL_PREFIX].contains(&prefix) {
        return Err(bad());
    }
    let index = index.parse::<usize>().map_err(|_| bad())?;
    Ok((prefix, index))
}

/// Turn an index → tensor map into a list, rejecting gaps.
fn contiguous(map: BTreeMap<usize, TensorData>, prefix: &str) -> Result<Vec<TensorData>> {
    let mut out = Vec::with_capacity(map.len());
    for (expected, (index, tensor)) in map.into_iter().enumerate() {
        if index != expected {
            return Err(ExportError::format(format!(
                "shard is missing bucket {expected} of '{prefix}'"
            )));
        }
        out.push(tensor);
    }
    Ok(out)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn ids(values: &[f32], rows: usize) -> TensorData {
        TensorData::new(values.to_vec(), vec![rows, values.len() / rows])
    }

    #[test]
    fn test_single_bucket_roundtrip() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("shard.00000");

        let shard = ParallelDataSet::new(
            vec![ids(&[3.0, 4.0, 5.0, 6.0], 2)],
            vec![ids(&[2.0, 7.0, 2.0, 8.0], 2)],
            vec![ids(&[7.0, 0.0, 8.0, 0.0], 2)],
        ).unwrap();
        shard.save(&path).unwrap();

        let back = ParallelDataSet::load(&path).unwrap();
        assert_eq!(back.num_buckets(), 1);
        assert_eq!(back.bucket(0).unwrap().label.shape, vec![2, 2]);
    }

    #[test]
    fn test_empty_shard_has_no_bucket_zero() {
        let shard = ParallelDataSet::default();
        assert!(matches!(shard.bucket(0), Err(ExportError::NotFound(_))));
    }

    #[test]
    fn test_uneven_bucket_lists_are_rejected() {
        let err = ParallelDataSet::new(vec![ids(&[1.0], 1)], vec![], vec![]).unwrap_err();
        assert!(matches!(err, ExportError::Format(_)));
    }

    #[test]
    fn test_gap_in_bucket_indices_is_rejected() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("shard");

        let mut dict = NamedTensors::new();
        for prefix in ["source", "target", "label"] {
            dict.insert(format!("{prefix}.1"), ids(&[1.0], 1));
        }
        dict.save(&path).unwrap();

        assert!(matches!(ParallelDataSet::load(&path), Err(ExportError::Format(_))));
    }

    #[test]
    fn test_foreign_tensor_name_is_rejected() {
        assert!(parse_shard_key("weights.0").is_err());
        assert!(parse_shard_key("source").is_err());
        assert_eq!(parse_shard_key("label.12").unwrap(), ("label", 12));
    }
}
