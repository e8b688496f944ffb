// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// One use case per binary. Each owns a config struct built by
// the CLI layer and coordinates the lower layers:
//
//   export_metric_use_case  — metric registry → metric JSON
//   export_data_use_case    — dataset shard → .data / .label
//   bind_use_case           — symbol + params → bound module
//   score_use_case          — bound module + validation set
//                             → metric values
//
// Rules for this layer:
//   - No tensor math here (that's Layer 5)
//   - No printing here (that's Layer 1)
//   - Only workflow coordination
//
// Reference: Rust Book §7 (Module System)

pub mod export_metric_use_case;

pub mod export_data_use_case;

// The model binding smoke check
pub mod bind_use_case;

// The re-scoring workflow
pub mod score_use_case;
