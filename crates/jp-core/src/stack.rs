//! Call-stack gate
//!
//! Pruning can be restricted to call sites whose captured stack trace
//! matches a pattern. The engine only sees the resulting boolean; the
//! matcher itself sits behind [`StackMatcher`] so a host can plug in its own.

use crate::types::{build_regex, regex_literal};

/// Predicate over a captured stack trace.
pub trait StackMatcher {
    fn matches(&self, pattern: &str, stack_trace: &str) -> bool;
}

/// Default matcher: `/regex/flags` patterns are tested as regular
/// expressions, anything else as a plain substring.
///
/// An empty pattern and an invalid regex both pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct PatternStackMatcher;

impl StackMatcher for PatternStackMatcher {
    fn matches(&self, pattern: &str, stack_trace: &str) -> bool {
        if pattern.is_empty() {
            return true;
        }

        match regex_literal(pattern) {
            Ok(Some((body, flags))) => match build_regex(body, flags) {
                Ok(re) => re.is_match(stack_trace),
                Err(e) => {
                    log::warn!("Ignoring invalid stack pattern: {e}");
                    true
                }
            },
            _ => stack_trace.contains(pattern),
        }
    }
}

impl<F> StackMatcher for F
where
    F: Fn(&str, &str) -> bool,
{
    fn matches(&self, pattern: &str, stack_trace: &str) -> bool {
        self(pattern, stack_trace)
    }
}

/// Resolve the stack gate for one call. `None` means no constraint.
pub fn stack_gate<M: StackMatcher + ?Sized>(
    matcher: &M,
    pattern: Option<&str>,
    stack_trace: &str,
) -> bool {
    match pattern {
        Some(pattern) if !pattern.is_empty() => matcher.matches(pattern, stack_trace),
        _ => true,
    }
}
