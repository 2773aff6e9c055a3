//! Semantic token diff
//!
//! Compares two resolved snapshot collections and reports added, removed,
//! and changed tokens with the kind of change (value, type, metadata). The
//! failure gate turns a diff into a CI verdict; report rendering lives with
//! the host.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::model::{canonical_string, TokenSet};

/// What changed about a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Value,
    Type,
    Metadata,
}

/// One changed token with its change kinds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangedToken {
    pub pointer: String,
    pub kinds: Vec<ChangeKind>,
}

/// A semantic diff between two snapshot collections.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenDiff {
    /// Pointers present only in `after`.
    pub added: Vec<String>,

    /// Pointers present only in `before`.
    pub removed: Vec<String>,

    /// Pointers present in both with differing content.
    pub changed: Vec<ChangedToken>,
}

impl TokenDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }

    pub fn change_count(&self) -> usize {
        self.added.len() + self.removed.len() + self.changed.len()
    }
}

/// Compute the semantic diff between two token sets.
pub fn diff(before: &TokenSet, after: &TokenSet) -> TokenDiff {
    let before_pointers: BTreeSet<&str> = before.pointers().collect();
    let after_pointers: BTreeSet<&str> = after.pointers().collect();

    let added = after_pointers
        .difference(&before_pointers)
        .map(|p| p.to_string())
        .collect();
    let removed = before_pointers
        .difference(&after_pointers)
        .map(|p| p.to_string())
        .collect();

    let mut changed = Vec::new();
    for pointer in before_pointers.intersection(&after_pointers) {
        let old = before
            .get(&crate::model::JsonPointer::parse(pointer))
            .expect("pointer came from this set");
        let new = after
            .get(&crate::model::JsonPointer::parse(pointer))
            .expect("pointer came from this set");

        let mut kinds = Vec::new();
        let old_value = old.value().map(|v| canonical_string(&v));
        let new_value = new.value().map(|v| canonical_string(&v));
        if old_value != new_value {
            kinds.push(ChangeKind::Value);
        }
        if old.token_type != new.token_type {
            kinds.push(ChangeKind::Type);
        }
        let old_metadata = old
            .metadata
            .as_ref()
            .map(|m| canonical_string(&m.to_canonical_value()));
        let new_metadata = new
            .metadata
            .as_ref()
            .map(|m| canonical_string(&m.to_canonical_value()));
        if old_metadata != new_metadata {
            kinds.push(ChangeKind::Metadata);
        }

        if !kinds.is_empty() {
            changed.push(ChangedToken {
                pointer: pointer.to_string(),
                kinds,
            });
        }
    }

    TokenDiff {
        added,
        removed,
        changed,
    }
}

/// CI failure gate over a diff.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DiffGate {
    /// Fail when tokens disappeared.
    pub fail_on_removed: bool,

    /// Fail when token values changed.
    pub fail_on_value_change: bool,

    /// Fail when token types changed.
    pub fail_on_type_change: bool,
}

impl Default for DiffGate {
    fn default() -> Self {
        Self {
            fail_on_removed: true,
            fail_on_value_change: false,
            fail_on_type_change: true,
        }
    }
}

impl DiffGate {
    /// True when the diff violates the gate.
    pub fn fails(&self, diff: &TokenDiff) -> bool {
        if self.fail_on_removed && !diff.removed.is_empty() {
            return true;
        }
        diff.changed.iter().any(|change| {
            (self.fail_on_value_change && change.kinds.contains(&ChangeKind::Value))
                || (self.fail_on_type_change && change.kinds.contains(&ChangeKind::Type))
        })
    }
}
