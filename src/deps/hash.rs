//! Snapshot content hashing
//!
//! Hashes are computed over canonical JSON renderings (sorted keys, shortest
//! numbers) so two snapshots that differ only in object-key insertion order
//! hash identically. The hashed fields are: encoded pointer, resolved value
//! (raw when unresolved), metadata, source context, and the sorted reference
//! list.

use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::model::{canonical_string, TokenSnapshot};

/// Field separator inside the hash input; never appears in canonical JSON.
const SEP: u8 = 0x1f;

/// Content hash of one snapshot.
pub fn snapshot_hash(snapshot: &TokenSnapshot, context: Option<&Value>) -> String {
    let mut hasher = Sha256::new();

    hasher.update(snapshot.id.as_bytes());
    hasher.update([SEP]);

    match snapshot.value() {
        Some(value) => hasher.update(canonical_string(&value).as_bytes()),
        None => hasher.update(canonical_string(&snapshot.raw()).as_bytes()),
    }
    hasher.update([SEP]);

    match &snapshot.metadata {
        Some(metadata) => {
            hasher.update(canonical_string(&metadata.to_canonical_value()).as_bytes())
        }
        None => hasher.update(b"null".as_slice()),
    }
    hasher.update([SEP]);

    match context {
        Some(context) => hasher.update(canonical_string(context).as_bytes()),
        None => hasher.update(b"null".as_slice()),
    }
    hasher.update([SEP]);

    for reference in sorted_references(snapshot) {
        hasher.update(reference.as_bytes());
        hasher.update([SEP]);
    }

    hex::encode(hasher.finalize())
}

/// References rendered as `<uri>#/<pointer>` strings, sorted. Internal
/// references drop the URI so they line up with dependency-snapshot keys.
pub fn sorted_references(snapshot: &TokenSnapshot) -> Vec<String> {
    let mut references: Vec<String> = snapshot
        .references
        .iter()
        .map(|reference| {
            if reference.external {
                format!("{}{}", reference.uri, reference.pointer)
            } else {
                reference.pointer.encoded().to_string()
            }
        })
        .collect();
    references.sort();
    references.dedup();
    references
}
