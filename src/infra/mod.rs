// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Persistence of the model-side artifacts:
//
//   params.rs       — Parameter files
//                     Loads a `<role>:<name>` keyed tensor
//                     dictionary and splits it into arg/aux
//                     mappings; saves the joined form back.
//
//   metric_store.rs — Metric configuration
//                     Writes and reads a metric's constructor
//                     arguments as a flat JSON object.
//
// Reference: Rust Book §7 (Modules)
//            Rust Book §9 (Error Handling)

/// Parameter file loading and role splitting
pub mod params;

/// Metric configuration JSON
pub mod metric_store;
