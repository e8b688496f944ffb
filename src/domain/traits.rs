// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The scorer only needs to know two things about a batch
// iterator besides the batches themselves: the shapes it will
// produce, so a module can be bound before the first batch
// arrives. Any iterator that can report them is a BatchSource.
//
// The tensor runtime capability trait lives in `ml::runtime`
// because its signatures carry runtime types.

use crate::domain::artifact::DataDesc;

// ─── BatchSource ──────────────────────────────────────────────────────────────
/// A finite, ordered sequence of batches with known shapes.
///
/// Implementations:
///   - ValidationBatches → batches of an exported validation set
pub trait BatchSource: Iterator {
    /// Descriptors of the data inputs at full batch size.
    fn provide_data(&self) -> &[DataDesc];

    /// Descriptors of the labels at full batch size.
    fn provide_label(&self) -> &[DataDesc];

    /// Number of examples behind all batches.
    fn num_examples(&self) -> usize;
}
