//! Resolved token snapshots and per-source token sets
//!
//! A `TokenSnapshot` is the atomic unit the whole pipeline trades in: created
//! by the parser, rewritten once during alias resolution, then frozen before
//! transforms, formatters, and policies see it. Downstream components receive
//! deep clones of `value`/`raw`, never the resolver-owned instances.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

use super::pointer::JsonPointer;
use super::value::deep_clone;

/// Recognized token type tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TokenType {
    Color,
    Dimension,
    Typography,
    Gradient,
    Shadow,
    Border,
    Image,
    String,
    Number,
    CubicBezier,
    Transition,
    FontFamily,
    Duration,
    StrokeStyle,
}

impl TokenType {
    /// Parse a `$type` tag. Unknown tags return `None` and the token keeps an
    /// untyped snapshot rather than failing the parse.
    pub fn parse(tag: &str) -> Option<Self> {
        Some(match tag {
            "color" => Self::Color,
            "dimension" => Self::Dimension,
            "typography" => Self::Typography,
            "gradient" => Self::Gradient,
            "shadow" => Self::Shadow,
            "border" => Self::Border,
            "image" => Self::Image,
            "string" => Self::String,
            "number" => Self::Number,
            "cubicBezier" => Self::CubicBezier,
            "transition" => Self::Transition,
            "fontFamily" => Self::FontFamily,
            "duration" => Self::Duration,
            "strokeStyle" => Self::StrokeStyle,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Color => "color",
            Self::Dimension => "dimension",
            Self::Typography => "typography",
            Self::Gradient => "gradient",
            Self::Shadow => "shadow",
            Self::Border => "border",
            Self::Image => "image",
            Self::String => "string",
            Self::Number => "number",
            Self::CubicBezier => "cubicBezier",
            Self::Transition => "transition",
            Self::FontFamily => "fontFamily",
            Self::Duration => "duration",
            Self::StrokeStyle => "strokeStyle",
        }
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a snapshot came from: source, layer, and document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    /// Source id from the configuration.
    pub source_id: String,

    /// Layer name the source belongs to.
    pub layer: String,

    /// Layer position; higher indexes override lower ones.
    pub layer_index: usize,

    /// URI of the owning document.
    pub uri: String,

    /// Pointer prefix assigned to the source by its template.
    pub pointer_prefix: JsonPointer,
}

/// A direct `$ref` target recorded on the referencing snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenReference {
    /// Target document URI.
    pub uri: String,

    /// Target pointer within that document.
    pub pointer: JsonPointer,

    /// True when the target lives in a different document.
    pub external: bool,
}

/// One hop in an alias chain, from the aliasing token to the terminal value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionStep {
    pub uri: String,
    pub pointer: JsonPointer,
}

/// Deprecation details attached to a token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeprecationRecord {
    /// Human-readable reason, if the document supplied one.
    pub reason: Option<String>,

    /// Pointer to the replacement token.
    pub superseded_by: Option<String>,
}

/// Source location of a token within its document, line/column based.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSpan {
    pub line: usize,
    pub column: usize,
}

/// Optional metadata block carried on a snapshot.
///
/// Extensions are deep-cloned at construction; the map handed back by
/// [`TokenMetadata::extensions`] is a clone as well, so no caller can mutate
/// the stored record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenMetadata {
    pub description: Option<String>,

    /// Extension payloads keyed by reverse-DNS strings.
    extensions: BTreeMap<String, Value>,

    pub source: Option<SourceSpan>,

    pub deprecation: Option<DeprecationRecord>,

    pub usage_count: Option<u64>,

    pub tags: Vec<String>,

    pub author: Option<String>,

    pub hash: Option<String>,

    pub last_modified: Option<DateTime<Utc>>,

    pub last_used: Option<DateTime<Utc>>,
}

impl TokenMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an extension payload, deep-cloning the value.
    pub fn set_extension(&mut self, key: impl Into<String>, value: &Value) {
        self.extensions.insert(key.into(), deep_clone(value));
    }

    /// Clone of one extension payload.
    pub fn extension(&self, key: &str) -> Option<Value> {
        self.extensions.get(key).map(deep_clone)
    }

    /// Clone of the whole extensions map.
    pub fn extensions(&self) -> BTreeMap<String, Value> {
        self.extensions
            .iter()
            .map(|(k, v)| (k.clone(), deep_clone(v)))
            .collect()
    }

    pub fn has_extensions(&self) -> bool {
        !self.extensions.is_empty()
    }

    /// Shallow-merge `overlay` on top of this record, overlay fields winning.
    /// Used by layer merging; extension keys are merged individually.
    pub fn merged_with(&self, overlay: &TokenMetadata) -> TokenMetadata {
        let mut extensions = self.extensions.clone();
        for (key, value) in &overlay.extensions {
            extensions.insert(key.clone(), deep_clone(value));
        }
        TokenMetadata {
            description: overlay.description.clone().or_else(|| self.description.clone()),
            extensions,
            source: overlay.source.or(self.source),
            deprecation: overlay
                .deprecation
                .clone()
                .or_else(|| self.deprecation.clone()),
            usage_count: overlay.usage_count.or(self.usage_count),
            tags: if overlay.tags.is_empty() {
                self.tags.clone()
            } else {
                overlay.tags.clone()
            },
            author: overlay.author.clone().or_else(|| self.author.clone()),
            hash: overlay.hash.clone().or_else(|| self.hash.clone()),
            last_modified: overlay.last_modified.or(self.last_modified),
            last_used: overlay.last_used.or(self.last_used),
        }
    }

    /// Canonicalizable view used by dependency hashing.
    pub fn to_canonical_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Per-snapshot lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SnapshotState {
    Planned,
    Parsed,
    Merged,
    Resolved,
    Failed,
}

/// A fully resolved token with provenance, metadata, and reference lists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenSnapshot {
    /// Stable identifier: the canonical pointer string within the owning
    /// document.
    pub id: String,

    /// Canonical pointer.
    pub pointer: JsonPointer,

    /// Decoded path segments.
    pub path: Vec<String>,

    /// Type tag, when the document declared or inherited one.
    pub token_type: Option<TokenType>,

    /// Fully substituted value; `None` while unresolved or failed.
    value: Option<Value>,

    /// Pre-resolution literal from the document.
    raw: Value,

    /// Token description (`$description`).
    pub description: Option<String>,

    /// Optional metadata block.
    pub metadata: Option<TokenMetadata>,

    /// Source/layer/document provenance.
    pub provenance: Provenance,

    /// Direct `$ref` targets.
    pub references: Vec<TokenReference>,

    /// Ordered alias trace from this token to the terminal value.
    pub resolution_path: Vec<ResolutionStep>,

    /// Deprecation supersede chain applied during layer merging.
    pub applied_aliases: Vec<String>,

    /// Layers whose snapshot at this pointer was displaced during merging.
    pub overridden_layers: Vec<String>,

    /// Lifecycle state.
    pub state: SnapshotState,
}

impl TokenSnapshot {
    /// Create a freshly parsed snapshot. `value` starts unset and is filled
    /// in by alias resolution (or directly for literal tokens).
    pub fn parsed(pointer: JsonPointer, raw: Value, provenance: Provenance) -> Self {
        let path = pointer.segments().to_vec();
        Self {
            id: pointer.encoded().to_string(),
            pointer,
            path,
            token_type: None,
            value: None,
            raw,
            description: None,
            metadata: None,
            provenance,
            references: Vec::new(),
            resolution_path: Vec::new(),
            applied_aliases: Vec::new(),
            overridden_layers: Vec::new(),
            state: SnapshotState::Parsed,
        }
    }

    /// Deep clone of the resolved value.
    pub fn value(&self) -> Option<Value> {
        self.value.as_ref().map(deep_clone)
    }

    /// Whether a resolved value is present.
    pub fn is_resolved(&self) -> bool {
        self.value.is_some() && self.state == SnapshotState::Resolved
    }

    /// Deep clone of the raw document literal.
    pub fn raw(&self) -> Value {
        deep_clone(&self.raw)
    }

    /// Borrow the raw literal without cloning. Engine-internal; callers must
    /// not hold the reference across a mutation of the owning set.
    pub(crate) fn raw_ref(&self) -> &Value {
        &self.raw
    }

    /// Rewrite the resolved value. Only the resolver calls this; snapshots
    /// are immutable once they leave the resolution stage.
    pub(crate) fn set_value(&mut self, value: Value) {
        self.value = Some(value);
        self.state = SnapshotState::Resolved;
    }

    /// Mark the snapshot failed; `raw` is retained, `value` stays unset.
    pub(crate) fn mark_failed(&mut self) {
        self.value = None;
        self.state = SnapshotState::Failed;
    }

    pub(crate) fn mark_merged(&mut self) {
        self.state = SnapshotState::Merged;
    }
}

/// Ordered pointer → snapshot mapping produced by parsing one source.
///
/// The `BTreeMap` keyed on canonical pointer strings keeps iteration in
/// lexicographic encoded-pointer order, which is the exposure order every
/// downstream stage relies on.
#[derive(Debug, Clone, Default)]
pub struct TokenSet {
    tokens: BTreeMap<String, TokenSnapshot>,
}

impl TokenSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, snapshot: TokenSnapshot) {
        self.tokens.insert(snapshot.id.clone(), snapshot);
    }

    pub fn get(&self, pointer: &JsonPointer) -> Option<&TokenSnapshot> {
        self.tokens.get(pointer.encoded())
    }

    pub fn get_mut(&mut self, pointer: &JsonPointer) -> Option<&mut TokenSnapshot> {
        self.tokens.get_mut(pointer.encoded())
    }

    pub fn remove(&mut self, pointer: &JsonPointer) -> Option<TokenSnapshot> {
        self.tokens.remove(pointer.encoded())
    }

    pub fn contains(&self, pointer: &JsonPointer) -> bool {
        self.tokens.contains_key(pointer.encoded())
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Snapshots in lexicographic pointer order.
    pub fn iter(&self) -> impl Iterator<Item = &TokenSnapshot> {
        self.tokens.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut TokenSnapshot> {
        self.tokens.values_mut()
    }

    pub fn into_snapshots(self) -> Vec<TokenSnapshot> {
        self.tokens.into_values().collect()
    }

    /// Pointers in lexicographic order.
    pub fn pointers(&self) -> impl Iterator<Item = &str> {
        self.tokens.keys().map(String::as_str)
    }
}

impl FromIterator<TokenSnapshot> for TokenSet {
    fn from_iter<T: IntoIterator<Item = TokenSnapshot>>(iter: T) -> Self {
        let mut set = Self::new();
        for snapshot in iter {
            set.insert(snapshot);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn provenance() -> Provenance {
        Provenance {
            source_id: "base".into(),
            layer: "base".into(),
            layer_index: 0,
            uri: "tokens.json".into(),
            pointer_prefix: JsonPointer::root(),
        }
    }

    #[test]
    fn token_type_tags_round_trip() {
        for tag in [
            "color",
            "dimension",
            "typography",
            "gradient",
            "shadow",
            "border",
            "image",
            "string",
            "number",
            "cubicBezier",
            "transition",
            "fontFamily",
            "duration",
            "strokeStyle",
        ] {
            let parsed = TokenType::parse(tag).expect(tag);
            assert_eq!(parsed.as_str(), tag);
        }
        assert!(TokenType::parse("wavelength").is_none());
    }

    #[test]
    fn value_reads_are_clones() {
        let mut snapshot = TokenSnapshot::parsed(
            JsonPointer::parse("#/color/primary"),
            json!({"$value": "#FFFFFF"}),
            provenance(),
        );
        snapshot.set_value(json!({"hex": "#FFFFFF"}));

        let mut read = snapshot.value().unwrap();
        read["hex"] = json!("#000000");
        // The stored value is untouched.
        assert_eq!(snapshot.value().unwrap()["hex"], json!("#FFFFFF"));
    }

    #[test]
    fn failed_snapshot_retains_raw_only() {
        let mut snapshot = TokenSnapshot::parsed(
            JsonPointer::parse("#/broken"),
            json!({"$ref": "#/missing"}),
            provenance(),
        );
        snapshot.mark_failed();
        assert!(snapshot.value().is_none());
        assert_eq!(snapshot.raw(), json!({"$ref": "#/missing"}));
        assert_eq!(snapshot.state, SnapshotState::Failed);
    }

    #[test]
    fn extensions_are_immutable_from_outside() {
        let mut metadata = TokenMetadata::new();
        let payload = json!({"owner": "design-systems"});
        metadata.set_extension("com.example.governance", &payload);

        let mut leaked = metadata.extension("com.example.governance").unwrap();
        leaked["owner"] = json!("someone-else");
        assert_eq!(
            metadata.extension("com.example.governance").unwrap()["owner"],
            json!("design-systems")
        );
    }

    #[test]
    fn metadata_merge_prefers_overlay() {
        let mut base = TokenMetadata::new();
        base.description = Some("base".into());
        base.tags = vec!["core".into()];
        base.set_extension("com.example.a", &json!(1));

        let mut overlay = TokenMetadata::new();
        overlay.description = Some("brand".into());
        overlay.set_extension("com.example.b", &json!(2));

        let merged = base.merged_with(&overlay);
        assert_eq!(merged.description.as_deref(), Some("brand"));
        assert_eq!(merged.tags, vec!["core".to_string()]);
        assert_eq!(merged.extension("com.example.a").unwrap(), json!(1));
        assert_eq!(merged.extension("com.example.b").unwrap(), json!(2));
    }

    #[test]
    fn token_set_iterates_in_pointer_order() {
        let mut set = TokenSet::new();
        for pointer in ["#/spacing/lg", "#/color/primary", "#/color/accent"] {
            set.insert(TokenSnapshot::parsed(
                JsonPointer::parse(pointer),
                json!(null),
                provenance(),
            ));
        }
        let order: Vec<&str> = set.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(
            order,
            vec!["#/color/accent", "#/color/primary", "#/spacing/lg"]
        );
    }
}
