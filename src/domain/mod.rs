// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Pure Rust structs, enums and traits shared by every binary.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O
//   - Only plain Rust structs, enums, and traits
//
// Reference: Rust Book §5 (Structs), §10 (Traits)

// Contract strings and defaults shared by producer and consumer binaries
pub mod constants;

// Error taxonomy and crate-wide Result alias
pub mod error;

// Data descriptors, parameter roles and batch predictions
pub mod artifact;

// Metric registry, configuration and accumulators
pub mod metric;

// Core abstractions (traits) that other layers implement
pub mod traits;
