//! Call-site adapters
//!
//! The interceptors (`JSON.parse`, `fetch`/XHR response bodies, `eval` data,
//! function arguments) hand raw rule strings and the intercepted value to
//! these adapters, which own parsing and call into the engine.

use serde_json::Value;

use jp_core::engine;
use jp_core::stack::{stack_gate, PatternStackMatcher, StackMatcher};
use jp_core::types::{CompiledRule, PruneOutcome};

use crate::parser::compile_rule;

/// Error type for adapters that have to decode their input.
#[derive(Debug, thiserror::Error)]
pub enum PruneError {
    #[error("Body is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("Invalid rule file: {0}")]
    InvalidRules(String),
}

/// Inbound adapter contract: prune `value` with raw rule strings.
///
/// Uses [`PatternStackMatcher`] for the stack gate. The value comes back
/// untouched when a gate fails or nothing matched.
pub fn prune(
    value: Value,
    prune_paths: &str,
    required_paths: &str,
    stack_pattern: &str,
    stack_trace: &str,
) -> Value {
    let rule = compile_rule(prune_paths, required_paths, stack_pattern);
    let pruner: Pruner = Pruner::default();
    pruner.apply(value, &rule, stack_trace).value
}

/// Applies compiled rules on behalf of one call site.
pub struct Pruner<M = PatternStackMatcher> {
    matcher: M,
    hostname: String,
}

impl Default for Pruner<PatternStackMatcher> {
    fn default() -> Self {
        Self::new(PatternStackMatcher)
    }
}

impl<M: StackMatcher> Pruner<M> {
    pub fn new(matcher: M) -> Self {
        Self {
            matcher,
            hostname: String::new(),
        }
    }

    /// Host identifier used in diagnostics.
    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = hostname.into();
        self
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// Prune a value with `rule`.
    ///
    /// A rule without prune paths is a logging rule: the value is reported
    /// together with the hostname and returned untouched.
    pub fn apply(&self, value: Value, rule: &CompiledRule, stack_trace: &str) -> PruneOutcome {
        if rule.prune_paths.is_empty() {
            if engine::required_paths_present(&value, &rule.required_paths) {
                log::info!("{}: {}", self.hostname, value);
            }
            return PruneOutcome::unchanged(value);
        }

        let stack_ok = stack_gate(&self.matcher, rule.stack_pattern.as_deref(), stack_trace);
        let outcome = engine::prune(value, &rule.prune_paths, &rule.required_paths, stack_ok);
        if outcome.changed {
            log::debug!("{}: pruned value", self.hostname);
        }
        outcome
    }

    /// Response-body sanitizer for `fetch` and XHR.
    ///
    /// Returns `Ok(None)` when the body is left as is, and the re-serialized
    /// body when something was removed.
    pub fn apply_text(
        &self,
        text: &str,
        rule: &CompiledRule,
        stack_trace: &str,
    ) -> Result<Option<String>, PruneError> {
        let value: Value = serde_json::from_str(text)?;
        let outcome = self.apply(value, rule, stack_trace);
        if !outcome.changed {
            return Ok(None);
        }
        Ok(Some(serde_json::to_string(&outcome.value)?))
    }

    /// Argument sanitizer for intercepted function calls. Object and array
    /// arguments are pruned in place; primitives are skipped.
    pub fn apply_arguments(&self, args: &mut [Value], rule: &CompiledRule, stack_trace: &str) -> bool {
        let mut changed = false;
        for arg in args.iter_mut() {
            if !(arg.is_object() || arg.is_array()) {
                continue;
            }
            let outcome = self.apply(std::mem::take(arg), rule, stack_trace);
            *arg = outcome.value;
            changed |= outcome.changed;
        }
        changed
    }
}
