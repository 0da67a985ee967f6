//! Pruning Engine
//!
//! Walks a JSON tree along parsed path descriptors. Matching is read-only:
//! every hit is recorded in a [`DeletionBatch`] and the batch is applied once
//! all descriptors have been evaluated.
//!
//! # Semantics
//!
//! - `Literal` descends into an own key (or decimal array index).
//! - `*` fans out over every child of an object or array, `[]` over array
//!   elements only.
//! - `{-}` / `[-]` evaluate the rest of the path against each child of an
//!   object / array and delete the child itself when the rest matches. A
//!   container of the other kind is a silent non-match.
//! - `[=]` compares the value reached so far with the descriptor payload and
//!   deletes the property holding it.
//! - Running out of segments is an existence match on the last property.

use serde_json::Value;

use crate::batch::DeletionBatch;
use crate::types::{MatchValue, PathDescriptor, PruneOutcome, Segment};
use crate::value::{child, children, Location, PathElement};

// =============================================================================
// Entry points
// =============================================================================

/// Prune `root` and hand it back together with the `changed` flag.
///
/// Nothing is removed unless every required descriptor matches somewhere in
/// the document and the stack gate (`stack_ok`) passed.
pub fn prune(
    mut root: Value,
    prune_paths: &[PathDescriptor],
    required_paths: &[PathDescriptor],
    stack_ok: bool,
) -> PruneOutcome {
    let changed = prune_in_place(&mut root, prune_paths, required_paths, stack_ok);
    PruneOutcome {
        value: root,
        changed,
    }
}

/// Same as [`prune`] on a borrowed tree. Returns whether anything was removed.
pub fn prune_in_place(
    root: &mut Value,
    prune_paths: &[PathDescriptor],
    required_paths: &[PathDescriptor],
    stack_ok: bool,
) -> bool {
    if prune_paths.is_empty() {
        return false;
    }

    if !required_paths_present(root, required_paths) {
        log::debug!("Required paths missing, leaving value untouched");
        return false;
    }

    if !stack_ok {
        log::debug!("Stack gate closed, leaving value untouched");
        return false;
    }

    let mut batch = DeletionBatch::new();
    for descriptor in prune_paths {
        schedule_path(root, descriptor, &mut batch);
    }

    if batch.is_empty() {
        return false;
    }

    let removed = batch.apply(root);
    log::debug!("Pruned {removed} node(s)");
    removed > 0
}

/// `true` when every descriptor matches at least one location. An empty list
/// is vacuously satisfied.
pub fn required_paths_present(root: &Value, required_paths: &[PathDescriptor]) -> bool {
    required_paths.iter().all(|descriptor| matches_path(root, descriptor))
}

/// Does at least one location in `root` satisfy the whole descriptor,
/// including its trailing `[=]` test?
pub fn matches_path(root: &Value, descriptor: &PathDescriptor) -> bool {
    evaluate(root, &descriptor.segments, descriptor.match_value.as_ref())
}

/// Locations the descriptor would remove from `root`, in traversal order.
pub fn find_targets(root: &Value, descriptor: &PathDescriptor) -> Vec<Location> {
    let mut batch = DeletionBatch::new();
    schedule_path(root, descriptor, &mut batch);
    batch.targets().iter().map(|t| t.location()).collect()
}

/// Record every location `descriptor` targets in `root`.
pub fn schedule_path(root: &Value, descriptor: &PathDescriptor, batch: &mut DeletionBatch) {
    let mut walker = Walker {
        match_value: descriptor.match_value.as_ref(),
        location: Vec::new(),
        batch,
    };
    walker.walk(root, &descriptor.segments);
}

// =============================================================================
// Deletion walk
// =============================================================================

struct Walker<'d, 'b> {
    match_value: Option<&'d MatchValue>,
    location: Location,
    batch: &'b mut DeletionBatch,
}

impl Walker<'_, '_> {
    fn walk(&mut self, value: &Value, segments: &[Segment]) {
        let Some((segment, rest)) = segments.split_first() else {
            self.batch.schedule(&self.location);
            return;
        };

        match segment {
            Segment::Literal(name) => {
                if let Some((element, next)) = child(value, name) {
                    self.descend(element, next, rest);
                }
            }
            Segment::Wildcard => {
                for (element, next) in children(value) {
                    self.descend(element, next, rest);
                }
            }
            Segment::ArrayWildcard => {
                if value.is_array() {
                    for (element, next) in children(value) {
                        self.descend(element, next, rest);
                    }
                }
            }
            Segment::ObjectDeleteMarker => {
                if value.is_object() {
                    self.schedule_matching_children(value, rest);
                }
            }
            Segment::ArrayDeleteMarker => {
                if value.is_array() {
                    self.schedule_matching_children(value, rest);
                }
            }
            Segment::EqualityMarker => {
                if self.match_value.is_some_and(|m| m.matches(value)) {
                    self.batch.schedule(&self.location);
                }
            }
        }
    }

    fn descend(&mut self, element: PathElement, next: &Value, rest: &[Segment]) {
        self.location.push(element);
        self.walk(next, rest);
        self.location.pop();
    }

    fn schedule_matching_children(&mut self, container: &Value, rest: &[Segment]) {
        for (element, next) in children(container) {
            if evaluate(next, rest, self.match_value) {
                self.location.push(element);
                self.batch.schedule(&self.location);
                self.location.pop();
            }
        }
    }
}

// =============================================================================
// Existence / equality evaluator
// =============================================================================

fn evaluate(value: &Value, segments: &[Segment], match_value: Option<&MatchValue>) -> bool {
    let Some((segment, rest)) = segments.split_first() else {
        return true;
    };

    match segment {
        Segment::Literal(name) => {
            child(value, name).is_some_and(|(_, next)| evaluate(next, rest, match_value))
        }
        Segment::Wildcard => children(value)
            .into_iter()
            .any(|(_, next)| evaluate(next, rest, match_value)),
        Segment::ArrayWildcard | Segment::ArrayDeleteMarker => {
            value.is_array()
                && children(value)
                    .into_iter()
                    .any(|(_, next)| evaluate(next, rest, match_value))
        }
        Segment::ObjectDeleteMarker => {
            value.is_object()
                && children(value)
                    .into_iter()
                    .any(|(_, next)| evaluate(next, rest, match_value))
        }
        Segment::EqualityMarker => match_value.is_some_and(|m| m.matches(value)),
    }
}
