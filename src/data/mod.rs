// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything between tensor files on disk and id batches in
// memory.
//
//   dataset shard (.safetensors)
//       │
//       ▼
//   ParallelDataSet      → bucket 0 → <prefix>.data / .label
//       │
//       ▼
//   NamedTensors         → str → tensor dictionaries
//       │
//       ▼
//   ValidationDataset    → implements Burn's Dataset trait
//       │
//       ▼
//   ValidationBatcher    → stacks samples into id tensors
//       │
//       ▼
//   ValidationBatches    → ordered batches for the scorer
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

/// Named tensor dictionaries in safetensors containers
pub mod tensor_dict;

/// Bucketed parallel dataset shards
pub mod shard;

/// Implements Burn's Dataset trait for exported validation data
pub mod dataset;

/// Implements Burn's Batcher trait and the ordered batch iterator
pub mod batcher;
