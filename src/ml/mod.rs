// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// This layer contains the burn specific code for running a
// trained graph. The application layer reaches it only through
// the TensorRuntime trait.
//
// What's in this layer:
//
//   graph.rs    — The symbol file
//                 Named nodes (embedding, mean_pool, add,
//                 fully_connected, activation, batch_norm,
//                 softmax_output) and their parameter names
//
//   model.rs    — Binding and the forward pass
//                 Infers every node's shape from the input
//                 descriptors, checks parameters against it,
//                 then evaluates the graph on a batch
//
//   runtime.rs  — The TensorRuntime trait and its burn
//                 implementation, generic over the backend
//
// Reference: Burn Book §3 (Building Blocks)

/// Graph description (symbol JSON)
pub mod graph;

/// Bound module: shape inference and forward pass
pub mod model;

/// Runtime capability trait and the burn-backed runtime
pub mod runtime;
