// ============================================================
// Layer 4 — Named Tensor Dictionary
// ============================================================
// A mapping from names to dense tensors, persisted as a
// safetensors container. This is the on-disk format of:
//
//   <prefix>.data    — {source, target}
//   <prefix>.label   — {target_label}
//   params file      — {arg:<name>, aux:<name>, ...}
//   dataset shards   — {source.<i>, target.<i>, label.<i>}
//
// In memory every tensor is burn `TensorData` with f32 values.
// Token ids are stored as floats as well, the same way the
// training framework writes them. On load, integer and f64
// containers are accepted and widened/narrowed to f32.

use burn::tensor::TensorData;
use safetensors::{tensor::TensorView, Dtype, SafeTensors};
use std::{
    collections::{btree_map, BTreeMap},
    fs,
    path::Path,
};

use crate::domain::error::{ExportError, Result};

/// Ordered name → tensor mapping.
#[derive(Debug, Clone, Default)]
pub struct NamedTensors {
    tensors: BTreeMap<String, TensorData>,
}

impl NamedTensors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a tensor, returning the one previously stored under `name`.
    pub fn insert(&mut self, name: impl Into<String>, tensor: TensorData) -> Option<TensorData> {
        self.tensors.insert(name.into(), tensor)
    }

    pub fn get(&self, name: &str) -> Option<&TensorData> {
        self.tensors.get(name)
    }

    /// Like `get`, but a missing name is a `NotFound` error.
    pub fn require(&self, name: &str) -> Result<&TensorData> {
        self.tensors.get(name).ok_or_else(|| {
            ExportError::not_found(format!(
                "no tensor named '{name}' (available: {})",
                self.names().collect::<Vec<_>>().join(", ")
            ))
        })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tensors.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TensorData)> {
        self.tensors.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }

    /// Read a safetensors file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path  = path.as_ref();
        let bytes = fs::read(path).map_err(|e| ExportError::io(path, e))?;
        let dict  = Self::from_bytes(&bytes).map_err(|e| match e {
            ExportError::Format(msg) => {
                ExportError::format(format!("'{}': {msg}", path.display()))
            }
            other => other,
        })?;

        tracing::debug!("Loaded {} tensors from '{}'", dict.len(), path.display());
        Ok(dict)
    }

    /// Write all tensors as f32 to a safetensors file, replacing it.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path  = path.as_ref();
        let bytes = self.to_bytes()?;
        fs::write(path, bytes).map_err(|e| ExportError::write(path, e))?;

        tracing::debug!("Wrote {} tensors to '{}'", self.len(), path.display());
        Ok(())
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let st = SafeTensors::deserialize(bytes)
            .map_err(|e| ExportError::format(format!("not a tensor container: {e}")))?;

        let mut tensors = BTreeMap::new();
        for (name, view) in st.tensors() {
            let values = decode_f32(view.dtype(), view.data())
                .map_err(|e| ExportError::format(format!("tensor '{name}': {e}")))?;
            tensors.insert(name, TensorData::new(values, view.shape().to_vec()));
        }
        Ok(Self { tensors })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        // Encoded buffers must outlive the views that borrow them.
        let mut encoded = Vec::with_capacity(self.tensors.len());
        for (name, data) in &self.tensors {
            let bytes: Vec<u8> = f32_values(data)?
                .iter()
                .flat_map(|v| v.to_le_bytes())
                .collect();
            encoded.push((name.as_str(), data.shape.clone(), bytes));
        }

        let mut views = Vec::with_capacity(encoded.len());
        for (name, shape, bytes) in &encoded {
            let view = TensorView::new(Dtype::F32, shape.clone(), bytes)
                .map_err(|e| ExportError::backend(format!("tensor '{name}': {e}")))?;
            views.push((*name, view));
        }

        safetensors::serialize(views.iter().map(|(name, view)| (*name, view)), &None)
            .map_err(|e| ExportError::backend(format!("cannot encode tensors: {e}")))
    }
}

impl IntoIterator for NamedTensors {
    type Item     = (String, TensorData);
    type IntoIter = btree_map::IntoIter<String, TensorData>;

    fn into_iter(self) -> Self::IntoIter {
        self.tensors.into_iter()
    }
}

impl FromIterator<(String, TensorData)> for NamedTensors {
    fn from_iter<I: IntoIterator<Item = (String, TensorData)>>(iter: I) -> Self {
        Self { tensors: iter.into_iter().collect() }
    }
}

/// Values of a tensor as f32, whatever element type it holds.
pub fn f32_values(data: &TensorData) -> Result<Vec<f32>> {
    data.clone()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| ExportError::backend(format!("cannot read tensor values: {e:?}")))
}

fn decode_f32(dtype: Dtype, raw: &[u8]) -> std::result::Result<Vec<f32>, String> {
    let values = match dtype {
        Dtype::F32 => raw
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect(),
        Dtype::F64 => raw
            .chunks_exact(8)
            .map(|b| f64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]) as f32)
            .collect(),
        Dtype::I32 => raw
            .chunks_exact(4)
            .map(|b| i32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f32)
            .collect(),
        Dtype::U32 => raw
            .chunks_exact(4)
            .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f32)
            .collect(),
        Dtype::I64 => raw
            .chunks_exact(8)
            .map(|b| i64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]) as f32)
            .collect(),
        Dtype::U8 => raw.iter().map(|&b| b as f32).collect(),
        other => return Err(format!("unsupported element type {other:?}")),
    };
    Ok(values)
}
