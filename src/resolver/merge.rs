//! Layered override merging
//!
//! After every source is parsed, snapshots sharing a pointer collapse to a
//! single terminal: the one from the highest `layerIndex` (plan order breaks
//! a same-index tie, later source wins). Metadata is shallow-merged with
//! override precedence; overridden snapshots that were deprecated with a
//! `supersededBy` pointer contribute to the winner's supersede chain.

use std::collections::BTreeMap;

use crate::model::{TokenSet, TokenSnapshot};

/// Merge per-source token sets (in plan order) into one terminal set.
pub fn merge_layers(sets: Vec<TokenSet>) -> TokenSet {
    let mut merged: BTreeMap<String, TokenSnapshot> = BTreeMap::new();

    for set in sets {
        for snapshot in set.into_snapshots() {
            match merged.remove(&snapshot.id) {
                None => {
                    merged.insert(snapshot.id.clone(), snapshot);
                }
                Some(existing) => {
                    let winner = override_snapshot(existing, snapshot);
                    merged.insert(winner.id.clone(), winner);
                }
            }
        }
    }

    let mut out = TokenSet::new();
    for (_, mut snapshot) in merged {
        snapshot.mark_merged();
        out.insert(snapshot);
    }
    out
}

/// Collapse two snapshots at the same pointer. Sets arrive in plan order, so
/// `incoming` is from an equal or higher layer and wins unless it is from a
/// strictly lower layer (it never is, given plan ordering).
fn override_snapshot(existing: TokenSnapshot, incoming: TokenSnapshot) -> TokenSnapshot {
    let (loser, mut winner) = if incoming.provenance.layer_index >= existing.provenance.layer_index
    {
        (existing, incoming)
    } else {
        (incoming, existing)
    };

    // Shallow metadata merge, winner's fields taking precedence.
    winner.metadata = match (&loser.metadata, &winner.metadata) {
        (Some(base), Some(overlay)) => Some(base.merged_with(overlay)),
        (Some(base), None) => Some(base.clone()),
        (None, overlay) => overlay.clone(),
    };

    let mut displaced = loser.overridden_layers.clone();
    displaced.push(loser.provenance.layer.clone());
    displaced.extend(winner.overridden_layers.drain(..));
    winner.overridden_layers = displaced;

    // Only supersede-marked snapshots join the applied-alias chain.
    let is_supersede_target = loser
        .metadata
        .as_ref()
        .and_then(|m| m.deprecation.as_ref())
        .map(|d| d.superseded_by.is_some())
        .unwrap_or(false);
    if is_supersede_target {
        let mut chain = loser.applied_aliases.clone();
        chain.push(loser.id.clone());
        chain.extend(winner.applied_aliases.drain(..));
        winner.applied_aliases = chain;
    }

    winner
}
