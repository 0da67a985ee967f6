//! JSONPrune Rule Compiler
//!
//! This crate parses path strings and scriptlet filters into the structures
//! the `jp-core` engine consumes, and provides the call-site adapters.

pub mod parser;
pub mod adapter;
pub mod rules;

pub use adapter::{prune, PruneError, Pruner};
pub use parser::{compile_rule, parse_match_value, parse_paths};
pub use rules::{
    parse_rule_file, parse_scriptlet_filters, RequestInfo, RequestPattern, RuleSet, ScriptletKind,
    ScriptletRule,
};
