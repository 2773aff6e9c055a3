//! Alias resolution
//!
//! Follows `$ref` chains across the merged token set and across external
//! documents, recording every hop, until a terminal literal is reached or a
//! cycle is found. Cycles are detected with an explicit visited chain keyed
//! by canonical node identity; each distinct cycle produces exactly one
//! `CYCLE_DETECTED` diagnostic and leaves every member's value undefined.

use serde_json::Value;
use std::collections::{HashMap, HashSet};

use crate::diagnostics::{codes, Diagnostic, RelatedInformation};
use crate::document::{DocumentCache, DocumentLoader};
use crate::model::{JsonPointer, ResolutionStep, TokenReference, TokenSet};

use super::flatten::split_reference;

#[derive(Debug, Clone)]
enum Memo {
    Resolved {
        value: Value,
        path: Vec<ResolutionStep>,
    },
    Failed,
}

/// Identity of a node on a resolution chain.
///
/// Internal nodes live in the merged pointer space; external nodes are keyed
/// by their document URI.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum NodeKey {
    Merged(String),
    External(String, String),
}

struct AliasResolver<'a> {
    tokens: &'a TokenSet,
    cache: &'a DocumentCache,
    loader: &'a dyn DocumentLoader,
    memo: HashMap<NodeKey, Memo>,
    cycle_members: HashSet<NodeKey>,
    diagnostics: Vec<Diagnostic>,
}

struct NodeOutcome {
    value: Option<Value>,
    path: Vec<ResolutionStep>,
    /// Direct refs discovered inside this node's literal value.
    nested_refs: Vec<TokenReference>,
}

/// Resolve every snapshot in the merged set in place, returning the
/// diagnostics produced along the way.
pub fn resolve_aliases(
    tokens: &mut TokenSet,
    cache: &DocumentCache,
    loader: &dyn DocumentLoader,
) -> Vec<Diagnostic> {
    let pointers: Vec<String> = tokens.pointers().map(String::from).collect();

    // Phase 1: compute outcomes against an immutable view of the set.
    let mut resolver = AliasResolver {
        tokens,
        cache,
        loader,
        memo: HashMap::new(),
        cycle_members: HashSet::new(),
        diagnostics: Vec::new(),
    };
    let mut outcomes: Vec<(String, NodeOutcome)> = Vec::with_capacity(pointers.len());
    for pointer in pointers {
        let outcome = resolver.resolve_merged(&JsonPointer::parse(&pointer), &mut Vec::new());
        outcomes.push((pointer, outcome));
    }
    let diagnostics = resolver.diagnostics;

    // Phase 2: apply outcomes to the snapshots.
    for (pointer, outcome) in outcomes {
        let pointer = JsonPointer::parse(&pointer);
        if let Some(snapshot) = tokens.get_mut(&pointer) {
            let is_alias = snapshot
                .raw_ref()
                .as_object()
                .map(|m| m.contains_key("$ref"))
                .unwrap_or(false);

            match outcome.value {
                Some(value) => snapshot.set_value(value),
                None => snapshot.mark_failed(),
            }
            // Literal tokens keep an empty trace; alias chains record every
            // hop from the alias to the terminal.
            if is_alias && outcome.path.len() > 1 {
                snapshot.resolution_path = outcome.path;
            }
            for reference in outcome.nested_refs {
                if !snapshot.references.contains(&reference) {
                    snapshot.references.push(reference);
                }
            }
        }
    }

    diagnostics
}

impl<'a> AliasResolver<'a> {
    /// Resolve a pointer in the merged set, tracking the active chain.
    fn resolve_merged(
        &mut self,
        pointer: &JsonPointer,
        chain: &mut Vec<NodeKey>,
    ) -> NodeOutcome {
        let key = NodeKey::Merged(pointer.encoded().to_string());
        if let Some(outcome) = self.check_memo_and_cycles(&key, chain) {
            return outcome;
        }

        let snapshot = match self.tokens.get(pointer) {
            Some(snapshot) => snapshot,
            None => {
                self.diagnostics.push(
                    Diagnostic::error(
                        codes::UNKNOWN_REFERENCE,
                        format!("no token at pointer {pointer}"),
                    )
                    .with_pointer(pointer.clone()),
                );
                self.memo.insert(key, Memo::Failed);
                return failed();
            }
        };

        let own_uri = snapshot.provenance.uri.clone();
        let raw = snapshot.raw_ref().clone();
        let step = ResolutionStep {
            uri: own_uri.clone(),
            pointer: pointer.clone(),
        };

        chain.push(key.clone());
        let outcome = self.resolve_raw(&raw, &own_uri, step, chain);
        chain.pop();

        self.memoize(&key, &outcome);
        outcome
    }

    /// Resolve a node inside an external document.
    fn resolve_external(
        &mut self,
        uri: &str,
        pointer: &JsonPointer,
        chain: &mut Vec<NodeKey>,
    ) -> NodeOutcome {
        let key = NodeKey::External(uri.to_string(), pointer.encoded().to_string());
        if let Some(outcome) = self.check_memo_and_cycles(&key, chain) {
            return outcome;
        }

        if uri.contains("://") && !uri.starts_with("file://") {
            self.diagnostics.push(
                Diagnostic::error(
                    codes::UNSUPPORTED_LOCATION,
                    format!("external reference to unsupported location '{uri}'"),
                )
                .with_pointer(pointer.clone())
                .with_uri(uri),
            );
            self.memo.insert(key, Memo::Failed);
            return failed();
        }

        let document = match self.cache.get(uri) {
            Some(document) => Ok(document),
            None => self.cache.load(uri, self.loader).map(|(doc, _)| doc),
        };
        let document = match document {
            Ok(document) => document,
            Err(err) => {
                self.diagnostics.push(
                    Diagnostic::error(
                        codes::DOCUMENT_LOAD_FAILED,
                        format!("failed to load referenced document: {err:#}"),
                    )
                    .with_pointer(pointer.clone())
                    .with_uri(uri),
                );
                self.memo.insert(key, Memo::Failed);
                return failed();
            }
        };

        let node = match navigate(&document.content, pointer) {
            Some(node) => node.clone(),
            None => {
                self.diagnostics.push(
                    Diagnostic::error(
                        codes::UNKNOWN_REFERENCE,
                        format!("no token at {pointer} in '{uri}'"),
                    )
                    .with_pointer(pointer.clone())
                    .with_uri(uri),
                );
                self.memo.insert(key, Memo::Failed);
                return failed();
            }
        };

        // External token nodes carry `$value`/`$ref`; a plain JSON node is
        // taken as a literal.
        let raw = match node.as_object() {
            Some(map) if map.contains_key("$ref") => {
                serde_json::json!({ "$ref": map.get("$ref").cloned().unwrap_or(Value::Null) })
            }
            Some(map) if map.contains_key("$value") => {
                map.get("$value").cloned().unwrap_or(Value::Null)
            }
            _ => node.clone(),
        };

        let step = ResolutionStep {
            uri: uri.to_string(),
            pointer: pointer.clone(),
        };

        chain.push(key.clone());
        let outcome = self.resolve_raw(&raw, uri, step, chain);
        chain.pop();

        self.memoize(&key, &outcome);
        outcome
    }

    /// Resolve a raw literal: follow a top-level `$ref`, otherwise
    /// substitute any nested refs inside the value.
    fn resolve_raw(
        &mut self,
        raw: &Value,
        own_uri: &str,
        step: ResolutionStep,
        chain: &mut Vec<NodeKey>,
    ) -> NodeOutcome {
        if let Some(target) = raw
            .as_object()
            .and_then(|m| m.get("$ref"))
            .and_then(Value::as_str)
        {
            let (target_uri, target_pointer) = split_reference(target, own_uri);
            let downstream = if self.is_internal(&target_uri, own_uri) {
                self.resolve_merged(&target_pointer, chain)
            } else {
                self.resolve_external(&target_uri, &target_pointer, chain)
            };

            let mut path = vec![step];
            path.extend(downstream.path);
            return NodeOutcome {
                value: downstream.value,
                path,
                nested_refs: Vec::new(),
            };
        }

        // Literal value: substitute nested `{"$ref": ...}` objects so the
        // resolved value is fully substituted.
        let mut nested_refs = Vec::new();
        let value = self.substitute_nested(raw, own_uri, chain, &mut nested_refs);
        match value {
            Some(value) => NodeOutcome {
                value: Some(value),
                path: vec![step],
                nested_refs,
            },
            None => NodeOutcome {
                value: None,
                path: vec![step],
                nested_refs,
            },
        }
    }

    fn substitute_nested(
        &mut self,
        value: &Value,
        own_uri: &str,
        chain: &mut Vec<NodeKey>,
        nested_refs: &mut Vec<TokenReference>,
    ) -> Option<Value> {
        match value {
            Value::Object(map) => {
                if map.len() == 1 {
                    if let Some(target) = map.get("$ref").and_then(Value::as_str) {
                        let (target_uri, target_pointer) = split_reference(target, own_uri);
                        nested_refs.push(TokenReference {
                            external: target_uri != own_uri,
                            uri: target_uri.clone(),
                            pointer: target_pointer.clone(),
                        });
                        let downstream = if self.is_internal(&target_uri, own_uri) {
                            self.resolve_merged(&target_pointer, chain)
                        } else {
                            self.resolve_external(&target_uri, &target_pointer, chain)
                        };
                        return downstream.value;
                    }
                }
                let mut out = serde_json::Map::with_capacity(map.len());
                for (key, child) in map {
                    let substituted =
                        self.substitute_nested(child, own_uri, chain, nested_refs)?;
                    out.insert(key.clone(), substituted);
                }
                Some(Value::Object(out))
            }
            Value::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(self.substitute_nested(item, own_uri, chain, nested_refs)?);
                }
                Some(Value::Array(out))
            }
            other => Some(other.clone()),
        }
    }

    /// A reference resolves in the merged space when it targets the same
    /// document it was written in (including the bare `#/...` spelling) or a
    /// document that contributed to the merged set.
    fn is_internal(&self, target_uri: &str, own_uri: &str) -> bool {
        target_uri == own_uri
    }

    /// Memo hit or cycle detection; returns `Some` when the caller should
    /// short-circuit.
    fn check_memo_and_cycles(
        &mut self,
        key: &NodeKey,
        chain: &[NodeKey],
    ) -> Option<NodeOutcome> {
        if let Some(memo) = self.memo.get(key) {
            return Some(match memo {
                Memo::Resolved { value, path } => NodeOutcome {
                    value: Some(value.clone()),
                    path: path.clone(),
                    nested_refs: Vec::new(),
                },
                Memo::Failed => failed(),
            });
        }

        if let Some(position) = chain.iter().position(|k| k == key) {
            let members: Vec<NodeKey> = chain[position..].to_vec();
            // One diagnostic per distinct cycle: skip if any member was
            // already reported.
            let already_reported = members.iter().any(|m| self.cycle_members.contains(m));
            if !already_reported {
                let rendered: Vec<String> = members.iter().map(describe_key).collect();
                let anchor = match key {
                    NodeKey::Merged(pointer) | NodeKey::External(_, pointer) => pointer,
                };
                let mut diagnostic = Diagnostic::error(
                    codes::CYCLE_DETECTED,
                    format!("alias cycle: {} -> {}", rendered.join(" -> "), describe_key(key)),
                )
                .with_pointer(JsonPointer::parse(anchor));
                for member in &members {
                    diagnostic = diagnostic.with_related(RelatedInformation {
                        message: "participates in cycle".to_string(),
                        pointer: Some(JsonPointer::parse(match member {
                            NodeKey::Merged(p) | NodeKey::External(_, p) => p,
                        })),
                        uri: match member {
                            NodeKey::External(uri, _) => Some(uri.clone()),
                            NodeKey::Merged(_) => None,
                        },
                    });
                }
                self.diagnostics.push(diagnostic);
            }
            for member in members {
                self.cycle_members.insert(member.clone());
                self.memo.insert(member, Memo::Failed);
            }
            return Some(failed());
        }

        None
    }

    fn memoize(&mut self, key: &NodeKey, outcome: &NodeOutcome) {
        // Cycle members were already memoized as failed; keep that verdict.
        if self.cycle_members.contains(key) {
            return;
        }
        let memo = match &outcome.value {
            Some(value) => Memo::Resolved {
                value: value.clone(),
                path: outcome.path.clone(),
            },
            None => Memo::Failed,
        };
        self.memo.insert(key.clone(), memo);
    }
}

fn failed() -> NodeOutcome {
    NodeOutcome {
        value: None,
        path: Vec::new(),
        nested_refs: Vec::new(),
    }
}

fn describe_key(key: &NodeKey) -> String {
    match key {
        NodeKey::Merged(pointer) => pointer.clone(),
        NodeKey::External(uri, pointer) => format!("{uri}{pointer}"),
    }
}

/// Navigate a JSON document by decoded pointer segments.
fn navigate<'v>(root: &'v Value, pointer: &JsonPointer) -> Option<&'v Value> {
    let mut current = root;
    for segment in pointer.segments() {
        match current {
            Value::Object(map) => current = map.get(segment)?,
            Value::Array(items) => {
                let index: usize = segment.parse().ok()?;
                current = items.get(index)?;
            }
            _ => return None,
        }
    }
    Some(current)
}
