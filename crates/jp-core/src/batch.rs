//! Deferred deletions
//!
//! Traversal only records `(owner, key)` pairs; the batch applies them once
//! the read phase is over.

use serde_json::Value;

use crate::value::{remove_at, Location, PathElement};

/// One scheduled removal: `key` inside the container found at `owner`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DeletionTarget {
    pub owner: Location,
    pub key: PathElement,
}

impl DeletionTarget {
    /// Full location of the removed node.
    pub fn location(&self) -> Location {
        let mut location = self.owner.clone();
        location.push(self.key.clone());
        location
    }
}

/// Arena of scheduled removals.
#[derive(Debug, Default)]
pub struct DeletionBatch {
    targets: Vec<DeletionTarget>,
}

impl DeletionBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule removal of the node at `location`. The root has no owner and
    /// cannot be scheduled.
    pub fn schedule(&mut self, location: &[PathElement]) {
        if let Some((key, owner)) = location.split_last() {
            self.targets.push(DeletionTarget {
                owner: owner.to_vec(),
                key: key.clone(),
            });
        }
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn targets(&self) -> &[DeletionTarget] {
        &self.targets
    }

    /// Apply every scheduled removal and return how many took effect.
    ///
    /// Targets are deduplicated and applied in descending location order:
    /// descendants go before their ancestors and higher array indices before
    /// lower ones, so no removal shifts a target that is still pending.
    pub fn apply(mut self, root: &mut Value) -> usize {
        self.targets
            .sort_by_cached_key(|t| std::cmp::Reverse(t.location()));
        self.targets.dedup();

        let mut removed = 0;
        for target in &self.targets {
            if remove_at(root, &target.owner, &target.key) {
                removed += 1;
            } else {
                log::trace!("Deletion target already gone: {:?}", target.location());
            }
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn name(s: &str) -> PathElement {
        PathElement::Name(s.to_string())
    }

    #[test]
    fn root_is_never_scheduled() {
        let mut batch = DeletionBatch::new();
        batch.schedule(&[]);
        assert!(batch.is_empty());
    }

    #[test]
    fn array_removals_do_not_shift_pending_targets() {
        let mut doc = json!({"list": ["a", "b", "c", "d"]});
        let mut batch = DeletionBatch::new();
        batch.schedule(&[name("list"), PathElement::Index(0)]);
        batch.schedule(&[name("list"), PathElement::Index(2)]);
        assert_eq!(batch.apply(&mut doc), 2);
        assert_eq!(doc, json!({"list": ["b", "d"]}));
    }

    #[test]
    fn descendant_removed_before_shifting_sibling() {
        let mut doc = json!({"list": [{"x": 1}, {"x": 2, "y": 3}]});
        let mut batch = DeletionBatch::new();
        batch.schedule(&[name("list"), PathElement::Index(0)]);
        batch.schedule(&[name("list"), PathElement::Index(1), name("x")]);
        assert_eq!(batch.apply(&mut doc), 2);
        assert_eq!(doc, json!({"list": [{"y": 3}]}));
    }

    #[test]
    fn duplicate_targets_count_once() {
        let mut doc = json!({"a": 1, "b": 2});
        let mut batch = DeletionBatch::new();
        batch.schedule(&[name("a")]);
        batch.schedule(&[name("a")]);
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.apply(&mut doc), 1);
        assert_eq!(doc, json!({"b": 2}));
    }
}
