#![recursion_limit = "256"]

// ============================================================
// nmt_export — NMT artifact export and re-scoring
// ============================================================
// Layers, top to bottom:
//
//   cli          — Layer 1: clap arguments, logging, dispatch
//   application  — Layer 2: one use case per binary
//   domain       — Layer 3: constants, errors, metrics, traits
//   data         — Layer 4: tensor dictionaries, shards, batching
//   ml           — Layer 5: graph, binding, burn runtime
//   infra        — Layer 6: parameter and metric config files

pub mod cli;
pub mod application;
pub mod domain;
pub mod data;
pub mod ml;
pub mod infra;
