//! Transform engine - pure, selective value transforms
//!
//! Transforms are registered trait objects selected per snapshot by type,
//! pointer pattern, and tag. They are deterministic and side-effect free:
//! given the same snapshot and options they always produce the same payload,
//! which is what makes the content-addressed payload cache sound.

pub mod android;
pub mod color;
pub mod dimension;
pub mod ios;
pub mod web;

use regex::Regex;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use crate::config::TransformSettings;
use crate::diagnostics::{codes, Diagnostic};
use crate::error::TransformExecutionError;
use crate::model::{canonical_bytes, JsonPointer, TokenSet, TokenSnapshot, TokenType};
use crate::resolver::ResolvedPlan;

/// Canonical group order; applicable transforms sort by `(group, name)` with
/// groups ranked by this list (unknown groups sort after, alphabetically).
pub const GROUP_ORDER: &[&str] = &[
    "web/base",
    "web/css",
    "ios/swiftui",
    "android/material",
    "android/compose",
];

fn group_rank(group: &str) -> usize {
    GROUP_ORDER
        .iter()
        .position(|g| *g == group)
        .unwrap_or(GROUP_ORDER.len())
}

/// Snapshot selector for a transform.
#[derive(Debug, Clone, Default)]
pub struct TransformSelector {
    /// Token types this transform applies to; empty means all.
    pub types: Vec<TokenType>,

    /// Optional pointer regexes, matched against the encoded pointer.
    pub pointer_patterns: Option<Vec<String>>,

    /// Optional required tags; a snapshot must carry all of them.
    pub tags: Option<Vec<String>>,
}

impl TransformSelector {
    pub fn for_types(types: &[TokenType]) -> Self {
        Self {
            types: types.to_vec(),
            pointer_patterns: None,
            tags: None,
        }
    }

    pub fn matches(&self, snapshot: &TokenSnapshot) -> bool {
        if !self.types.is_empty() {
            match snapshot.token_type {
                Some(token_type) if self.types.contains(&token_type) => {}
                _ => return false,
            }
        }

        if let Some(patterns) = &self.pointer_patterns {
            let matched = patterns.iter().any(|pattern| {
                Regex::new(pattern)
                    .map(|re| re.is_match(&snapshot.id))
                    .unwrap_or(false)
            });
            if !matched {
                return false;
            }
        }

        if let Some(required) = &self.tags {
            let tags = snapshot
                .metadata
                .as_ref()
                .map(|m| m.tags.clone())
                .unwrap_or_default();
            if !required.iter().all(|tag| tags.contains(tag)) {
                return false;
            }
        }

        true
    }
}

/// Everything a transform may consume.
pub struct TransformContext<'a> {
    pub snapshot: &'a TokenSnapshot,

    /// Deep clone of the resolved value.
    pub resolved: Value,

    /// Deep clone of the raw document literal.
    pub raw: Value,

    /// Options from the configuration entry, if any.
    pub options: Option<&'a Value>,

    tokens: &'a TokenSet,
}

impl<'a> TransformContext<'a> {
    /// Resolve another token's value, for cross-token lookups such as
    /// referenced colors.
    pub fn lookup(&self, pointer: &JsonPointer) -> Option<Value> {
        self.tokens.get(pointer).and_then(|snapshot| snapshot.value())
    }
}

/// A pure transform attaching a named payload to matching snapshots.
pub trait Transform: Send + Sync {
    /// Unique transform name, e.g. `color/hex`.
    fn name(&self) -> &'static str;

    /// Group membership, e.g. `web/base`.
    fn group(&self) -> &'static str;

    fn selector(&self) -> TransformSelector;

    /// Produce a payload, or `None` when the snapshot yields nothing for
    /// this transform. Errors become `TRANSFORM_FAILED` diagnostics.
    fn run(&self, ctx: &TransformContext) -> anyhow::Result<Option<Value>>;
}

/// Content-addressed payload cache port; the dependency tracker supplies the
/// persistent implementation.
pub trait PayloadCache: Send + Sync {
    fn get(&self, key: &str) -> Option<Value>;
    fn put(&self, key: &str, value: &Value);
}

/// Registry of compiled-in transforms.
pub struct TransformRegistry {
    transforms: Vec<Arc<dyn Transform>>,
}

impl Default for TransformRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl TransformRegistry {
    pub fn empty() -> Self {
        Self {
            transforms: Vec::new(),
        }
    }

    /// Registry preloaded with every built-in transform.
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(color::HexTransform));
        registry.register(Arc::new(color::RgbTransform));
        registry.register(Arc::new(color::OklchTransform));
        registry.register(Arc::new(dimension::RemTransform));
        registry.register(Arc::new(web::CssValueTransform));
        registry.register(Arc::new(ios::SwiftUiColorTransform));
        registry.register(Arc::new(ios::SwiftUiDimensionTransform));
        registry.register(Arc::new(ios::SwiftUiFontTransform));
        registry.register(Arc::new(android::MaterialColorTransform));
        registry.register(Arc::new(android::MaterialDimenTransform));
        registry.register(Arc::new(android::ComposeColorTransform));
        registry.register(Arc::new(android::ComposeDimensionTransform));
        registry
    }

    pub fn register(&mut self, transform: Arc<dyn Transform>) {
        self.transforms.push(transform);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Transform>> {
        self.transforms
            .iter()
            .find(|t| t.name() == name)
            .cloned()
    }

    pub fn group(&self, group: &str) -> Vec<Arc<dyn Transform>> {
        self.transforms
            .iter()
            .filter(|t| t.group() == group)
            .cloned()
            .collect()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.transforms.iter().map(|t| t.name()).collect()
    }
}

/// Output of one transform stage run.
#[derive(Debug, Clone, Default)]
pub struct TransformRun {
    /// `pointer → transform name → payload`, both levels sorted.
    pub outputs: BTreeMap<String, BTreeMap<String, Value>>,

    pub diagnostics: Vec<Diagnostic>,

    pub duration_ms: u64,

    /// Payload cache hits observed during the run.
    pub cache_hits: usize,
}

impl TransformRun {
    /// Payloads attached to one snapshot.
    pub fn for_pointer(&self, pointer: &str) -> Option<&BTreeMap<String, Value>> {
        self.outputs.get(pointer)
    }
}

/// The transform engine: settings + registry in, ordered payloads out.
pub struct TransformEngine {
    registry: TransformRegistry,
}

impl Default for TransformEngine {
    fn default() -> Self {
        Self::new(TransformRegistry::with_builtins())
    }
}

impl TransformEngine {
    pub fn new(registry: TransformRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &TransformRegistry {
        &self.registry
    }

    /// Run every enabled transform over the resolved plan.
    ///
    /// Settings entries name either a transform or a whole group. Unknown
    /// names are a configuration error and abort before any snapshot is
    /// touched.
    pub fn execute(
        &self,
        plan: &ResolvedPlan,
        settings: &TransformSettings,
        cache: Option<&dyn PayloadCache>,
    ) -> Result<TransformRun, TransformExecutionError> {
        let start = Instant::now();
        let enabled = self.enabled_transforms(settings)?;

        let mut run = TransformRun::default();

        for snapshot in plan.tokens.iter() {
            if !snapshot.is_resolved() {
                // Failed snapshots are excluded from transforms.
                continue;
            }

            let mut applicable: Vec<&EnabledTransform> = enabled
                .iter()
                .filter(|e| e.transform.selector().matches(snapshot))
                .collect();
            applicable.sort_by_key(|e| {
                (
                    group_rank(e.transform.group()),
                    e.transform.group(),
                    e.transform.name(),
                )
            });

            if applicable.is_empty() {
                continue;
            }

            let mut payloads = BTreeMap::new();
            for entry in applicable {
                let transform = &entry.transform;
                let cache_key = payload_cache_key(
                    &snapshot.id,
                    transform.name(),
                    transform.group(),
                    &entry.options_hash,
                );

                if let Some(cache) = cache {
                    if let Some(hit) = cache.get(&cache_key) {
                        run.cache_hits += 1;
                        payloads.insert(transform.name().to_string(), hit);
                        continue;
                    }
                }

                let ctx = TransformContext {
                    snapshot,
                    resolved: snapshot.value().unwrap_or(Value::Null),
                    raw: snapshot.raw(),
                    options: entry.options.as_ref(),
                    tokens: &plan.tokens,
                };

                match transform.run(&ctx) {
                    Ok(Some(payload)) => {
                        if let Some(cache) = cache {
                            cache.put(&cache_key, &payload);
                        }
                        payloads.insert(transform.name().to_string(), payload);
                    }
                    Ok(None) => {}
                    Err(err) => {
                        run.diagnostics.push(
                            Diagnostic::error(
                                codes::TRANSFORM_FAILED,
                                format!("transform '{}' failed: {err:#}", transform.name()),
                            )
                            .with_pointer(snapshot.pointer.clone())
                            .with_uri(snapshot.provenance.uri.clone()),
                        );
                    }
                }
            }

            if !payloads.is_empty() {
                run.outputs.insert(snapshot.id.clone(), payloads);
            }
        }

        run.duration_ms = start.elapsed().as_millis() as u64;
        tracing::debug!(
            snapshots = run.outputs.len(),
            diagnostics = run.diagnostics.len(),
            cache_hits = run.cache_hits,
            duration_ms = run.duration_ms,
            "transform stage complete"
        );
        Ok(run)
    }

    fn enabled_transforms(
        &self,
        settings: &TransformSettings,
    ) -> Result<Vec<EnabledTransform>, TransformExecutionError> {
        let mut enabled = Vec::new();
        for entry in &settings.entries {
            if let Some(transform) = self.registry.get(&entry.name) {
                enabled.push(EnabledTransform::new(transform, entry.options.clone()));
                continue;
            }
            // A settings entry may name a whole group for bulk enablement.
            let group = self.registry.group(&entry.name);
            if group.is_empty() {
                return Err(TransformExecutionError {
                    transform: entry.name.clone(),
                    message: "unknown transform or group".to_string(),
                });
            }
            for transform in group {
                enabled.push(EnabledTransform::new(transform, entry.options.clone()));
            }
        }
        // Deduplicate by name, first configuration wins.
        let mut seen = std::collections::HashSet::new();
        enabled.retain(|e| seen.insert(e.transform.name()));
        Ok(enabled)
    }
}

struct EnabledTransform {
    transform: Arc<dyn Transform>,
    options: Option<Value>,
    options_hash: String,
}

impl EnabledTransform {
    fn new(transform: Arc<dyn Transform>, options: Option<Value>) -> Self {
        let options_hash = options_digest(options.as_ref());
        Self {
            transform,
            options,
            options_hash,
        }
    }
}

/// Hex digest of canonicalized options.
pub fn options_digest(options: Option<&Value>) -> String {
    let bytes = match options {
        Some(value) => canonical_bytes(value),
        None => b"null".to_vec(),
    };
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    hex::encode(hasher.finalize())
}

/// Cache key for one `(pointer, transform, group, options)` execution.
pub fn payload_cache_key(pointer: &str, name: &str, group: &str, options_hash: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(pointer.as_bytes());
    hasher.update([0u8]);
    hasher.update(name.as_bytes());
    hasher.update([0u8]);
    hasher.update(group.as_bytes());
    hasher.update([0u8]);
    hasher.update(options_hash.as_bytes());
    hex::encode(hasher.finalize())
}
