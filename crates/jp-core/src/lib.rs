//! JSONPrune Core Library
//!
//! This crate provides the tree pruning engine behind the JSONPrune scriptlets
//! (`json-prune`, `json-prune-fetch-response`, `evaldata-prune`, ...).
//!
//! # Architecture
//!
//! Rules arrive as parsed [`PathDescriptor`]s (see `jp-compiler`). The engine
//! walks a `serde_json::Value` along each descriptor without mutating it,
//! collects deletion targets, and applies them in one batch afterwards.
//! Nothing here can fail: malformed input degrades to "no match".
//!
//! # Modules
//!
//! - `types`: Path descriptors, segments, match payloads, compiled rules
//! - `value`: Locations and helpers over JSON values
//! - `batch`: Deferred deletion batch
//! - `engine`: Traversal, required-path gate and pruning
//! - `stack`: Call-stack gate

pub mod batch;
pub mod engine;
pub mod stack;
pub mod types;
pub mod value;

// Re-export commonly used types
pub use batch::{DeletionBatch, DeletionTarget};
pub use engine::{find_targets, matches_path, prune, prune_in_place, required_paths_present};
pub use stack::{stack_gate, PatternStackMatcher, StackMatcher};
pub use types::{CompiledRule, MatchValue, PathDescriptor, PatternError, PruneOutcome, Segment};
pub use value::{normalized_path, Location, PathElement};
