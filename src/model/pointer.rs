//! RFC-6901 JSON pointers with canonical encoding
//!
//! Every token in the engine is addressed by a JSON pointer within its owning
//! document. Pointers arrive in several spellings (`#/color/primary`,
//! `/color/primary`, `color/primary`) and with `~0`/`~1` escapes; this module
//! normalizes all of them into one canonical form so that pointer identity,
//! ordering, and hashing agree with decoded-segment equality everywhere.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// A decoded, canonically encoded JSON pointer.
///
/// The canonical encoding always carries the `#/` prefix and re-applies the
/// RFC-6901 escapes (`~` → `~0`, `/` → `~1`) per segment. Equality, ordering,
/// and hashing all operate on the canonical encoding, which is injective over
/// decoded segments, so they agree with segment-wise comparison.
#[derive(Debug, Clone)]
pub struct JsonPointer {
    segments: Vec<String>,
    encoded: String,
}

impl JsonPointer {
    /// The root pointer (`#/`), addressing the whole document.
    pub fn root() -> Self {
        Self::from_segments(Vec::new())
    }

    /// Build a pointer from already-decoded segments.
    pub fn from_segments(segments: Vec<String>) -> Self {
        let encoded = encode_segments(&segments);
        Self { segments, encoded }
    }

    /// Parse a pointer from any accepted spelling.
    ///
    /// Accepts `#/a/b`, `/a/b`, and `a/b`; `#` and the empty string both
    /// denote the root. Escapes are decoded segment by segment.
    pub fn parse(input: &str) -> Self {
        let trimmed = input
            .strip_prefix("#/")
            .or_else(|| input.strip_prefix('#'))
            .or_else(|| input.strip_prefix('/'))
            .unwrap_or(input);

        if trimmed.is_empty() {
            return Self::root();
        }

        let segments = trimmed.split('/').map(decode_segment).collect();
        Self::from_segments(segments)
    }

    /// Decoded path segments in order.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Canonical encoded form, always prefixed with `#/`.
    pub fn encoded(&self) -> &str {
        &self.encoded
    }

    /// Number of segments.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// True for the root pointer.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Last segment, if any.
    pub fn leaf(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// Pointer with one additional segment appended.
    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment.into());
        Self::from_segments(segments)
    }

    /// Pointer with the last segment removed, or `None` at the root.
    pub fn parent(&self) -> Option<Self> {
        if self.segments.is_empty() {
            return None;
        }
        let mut segments = self.segments.clone();
        segments.pop();
        Some(Self::from_segments(segments))
    }

    /// True when `prefix` is a (possibly equal) leading subsequence.
    pub fn starts_with(&self, prefix: &JsonPointer) -> bool {
        self.segments.len() >= prefix.segments.len()
            && self.segments[..prefix.segments.len()] == prefix.segments[..]
    }

    /// Concatenate `other`'s segments onto this pointer.
    pub fn join(&self, other: &JsonPointer) -> Self {
        let mut segments = self.segments.clone();
        segments.extend(other.segments.iter().cloned());
        Self::from_segments(segments)
    }
}

fn decode_segment(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c == '~' {
            match chars.next() {
                Some('0') => out.push('~'),
                Some('1') => out.push('/'),
                Some(other) => {
                    // Dangling escape: keep both characters verbatim.
                    out.push('~');
                    out.push(other);
                }
                None => out.push('~'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn encode_segment(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}

fn encode_segments(segments: &[String]) -> String {
    if segments.is_empty() {
        return "#/".to_string();
    }
    let mut out = String::from("#");
    for segment in segments {
        out.push('/');
        out.push_str(&encode_segment(segment));
    }
    out
}

impl PartialEq for JsonPointer {
    fn eq(&self, other: &Self) -> bool {
        self.encoded == other.encoded
    }
}

impl Eq for JsonPointer {}

impl PartialOrd for JsonPointer {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for JsonPointer {
    fn cmp(&self, other: &Self) -> Ordering {
        self.encoded.cmp(&other.encoded)
    }
}

impl Hash for JsonPointer {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.encoded.hash(state);
    }
}

impl fmt::Display for JsonPointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encoded)
    }
}

impl From<&str> for JsonPointer {
    fn from(value: &str) -> Self {
        Self::parse(value)
    }
}

impl Serialize for JsonPointer {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.encoded)
    }
}

impl<'de> Deserialize<'de> for JsonPointer {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse(&raw))
    }
}

/// A pointer qualified by the URI of its owning document.
///
/// Used for cross-document references; the `Display` form is the
/// `<uri>#/<pointer>` spelling the dependency tracker sorts and hashes.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DocumentPointer {
    /// Owning document URI (relative file path or absolute URI).
    pub uri: String,

    /// Pointer within the document.
    pub pointer: JsonPointer,
}

impl DocumentPointer {
    pub fn new(uri: impl Into<String>, pointer: JsonPointer) -> Self {
        Self {
            uri: uri.into(),
            pointer,
        }
    }
}

impl fmt::Display for DocumentPointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.uri, self.pointer)
    }
}
