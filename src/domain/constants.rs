// ============================================================
// Layer 3 — Shared Contract Constants
// ============================================================
// Names that producer and consumer binaries must agree on.
// export-validation-data writes tensors under these names and
// score-model / run-model look them up again, so they live in
// one place instead of being repeated as string literals.

/// Name of the source-side input tensor (token ids).
pub const SOURCE_NAME: &str = "source";

/// Name of the target-side input tensor (shifted token ids).
pub const TARGET_NAME: &str = "target";

/// Name of the label tensor the softmax output is scored against.
pub const TARGET_LABEL_NAME: &str = "target_label";

/// Name of the final softmax node in a translation graph.
pub const SOFTMAX_NAME: &str = "softmax";

/// Output name produced by the softmax node (`<node>_output`).
pub const SOFTMAX_OUTPUT_NAME: &str = "softmax_output";

/// Suffix a node name gets when it is exposed as a graph output.
pub const OUTPUT_SUFFIX: &str = "_output";

/// Padding token id. Label positions holding it are not scored.
pub const PAD_ID: i64 = 0;

/// File suffix of an exported data dictionary.
pub const DATA_SUFFIX: &str = ".data";

/// File suffix of an exported label dictionary.
pub const LABEL_SUFFIX: &str = ".label";

/// Batch-major layout tag for bound data descriptors.
pub const LAYOUT_BATCH_MAJOR: &str = "NTC";

/// Placeholder (source, target) lengths used by the model binder.
pub const DEFAULT_BUCKET_KEY: (usize, usize) = (100, 100);

/// Number of source factors the model binder assumes.
pub const NUM_SOURCE_FACTORS: usize = 1;

/// Default number of sentences per batch for binder and scorer.
pub const DEFAULT_BATCH_SIZE: usize = 64;

/// Parameter key role for learned weights.
pub const ARG_ROLE: &str = "arg";

/// Parameter key role for auxiliary state (e.g. batch-norm statistics).
pub const AUX_ROLE: &str = "aux";

/// Separator between role and tensor name in a parameter key.
pub const PARAM_KEY_SEPARATOR: char = ':';

/// Metric registry key for token accuracy.
pub const ACCURACY: &str = "accuracy";

/// Metric registry key for perplexity.
pub const PERPLEXITY: &str = "perplexity";

/// Tensor-name prefixes used inside a dataset shard file.
pub const SHARD_SOURCE_PREFIX: &str = "source";
pub const SHARD_TARGET_PREFIX: &str = "target";
pub const SHARD_LABEL_PREFIX: &str = "label";
