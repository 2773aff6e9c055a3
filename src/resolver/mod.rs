//! Parser + resolver: documents in, resolved snapshots out
//!
//! Per source: load (inline, virtual, or through the document cache), flatten
//! into a per-source token set, then merge layers and resolve aliases across
//! the whole plan. Recoverable problems become diagnostics on the resolved
//! plan; only a required source that cannot be loaded aborts the run.

pub mod alias;
pub mod flatten;
pub mod merge;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde_json::Value;

use crate::diagnostics::{codes, Diagnostic};
use crate::document::{CacheStatus, DocumentCache, DocumentLoader};
use crate::model::{JsonPointer, TokenSet};
use crate::planner::{SourcePlan, SourcePlanEntry};

pub use alias::resolve_aliases;
pub use flatten::flatten_document;
pub use merge::merge_layers;

/// One parsed source with its own diagnostics and cache status.
#[derive(Debug, Clone)]
pub struct ResolvedSource {
    pub entry: SourcePlanEntry,

    /// Per-source token set, pre-merge.
    pub tokens: TokenSet,

    pub diagnostics: Vec<Diagnostic>,

    pub cache_status: CacheStatus,
}

/// The fully merged and resolved plan.
#[derive(Debug, Clone)]
pub struct ResolvedPlan {
    /// Parsed sources in plan order.
    pub sources: Vec<ResolvedSource>,

    /// Merged, alias-resolved snapshots in lexicographic pointer order.
    pub tokens: TokenSet,

    /// Aggregate diagnostics: per-source parse issues plus resolution issues.
    pub diagnostics: Vec<Diagnostic>,

    /// Wall-clock completion time.
    pub timestamp: DateTime<Utc>,

    /// Time spent loading and flattening sources.
    pub parse_ms: u64,

    /// Time spent merging layers and resolving aliases.
    pub resolve_ms: u64,
}

impl ResolvedPlan {
    /// Lazily resolve a pointer to its value, if the snapshot resolved.
    pub fn resolve_pointer(&self, pointer: &JsonPointer) -> Option<Value> {
        self.tokens.get(pointer).and_then(|snapshot| snapshot.value())
    }

    /// Count of snapshots that resolved successfully.
    pub fn resolved_count(&self) -> usize {
        self.tokens.iter().filter(|s| s.is_resolved()).count()
    }
}

/// Resolve an entire source plan with the default worker-pool width.
pub fn resolve(
    plan: &SourcePlan,
    cache: &DocumentCache,
    loader: &dyn DocumentLoader,
) -> Result<ResolvedPlan> {
    resolve_with_concurrency(plan, cache, loader, num_cpus::get())
}

type ParsedSource = (TokenSet, Vec<Diagnostic>, CacheStatus);

/// Resolve a source plan, loading and flattening independent sources on a
/// bounded worker pool. Output ordering is independent of the pool: results
/// are collected in plan order before merging.
pub fn resolve_with_concurrency(
    plan: &SourcePlan,
    cache: &DocumentCache,
    loader: &dyn DocumentLoader,
    workers: usize,
) -> Result<ResolvedPlan> {
    let parse_start = std::time::Instant::now();

    let parsed: Vec<Result<ParsedSource>> = if workers <= 1 || plan.entries.len() <= 1 {
        plan.entries
            .iter()
            .map(|entry| parse_entry(entry, cache, loader))
            .collect()
    } else {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers.min(plan.entries.len()))
            .build()
            .context("failed to build source worker pool")?;
        pool.install(|| {
            plan.entries
                .par_iter()
                .map(|entry| parse_entry(entry, cache, loader))
                .collect()
        })
    };

    let mut sources = Vec::with_capacity(plan.entries.len());
    let mut diagnostics = Vec::new();
    let mut sets = Vec::with_capacity(plan.entries.len());

    for (entry, outcome) in plan.entries.iter().zip(parsed) {
        match outcome {
            Ok((tokens, source_diagnostics, cache_status)) => {
                tracing::debug!(
                    source = %entry.id,
                    uri = %entry.uri,
                    tokens = tokens.len(),
                    cache_status = ?cache_status,
                    "parsed source"
                );
                diagnostics.extend(source_diagnostics.iter().cloned());
                sets.push(tokens.clone());
                sources.push(ResolvedSource {
                    entry: entry.clone(),
                    tokens,
                    diagnostics: source_diagnostics,
                    cache_status,
                });
            }
            Err(err) => {
                if entry.required {
                    return Err(err).with_context(|| {
                        format!("failed to load required source '{}'", entry.id)
                    });
                }
                let diagnostic = Diagnostic::error(
                    codes::DOCUMENT_LOAD_FAILED,
                    format!("optional source '{}' failed to load: {err:#}", entry.id),
                )
                .with_uri(entry.uri.clone());
                diagnostics.push(diagnostic.clone());
                sources.push(ResolvedSource {
                    entry: entry.clone(),
                    tokens: TokenSet::new(),
                    diagnostics: vec![diagnostic],
                    cache_status: CacheStatus::Miss,
                });
            }
        }
    }

    let parse_ms = parse_start.elapsed().as_millis() as u64;

    let resolve_start = std::time::Instant::now();
    let mut merged = merge_layers(sets);
    let resolution_diagnostics = resolve_aliases(&mut merged, cache, loader);
    diagnostics.extend(resolution_diagnostics);
    let resolve_ms = resolve_start.elapsed().as_millis() as u64;

    Ok(ResolvedPlan {
        sources,
        tokens: merged,
        diagnostics,
        timestamp: Utc::now(),
        parse_ms,
        resolve_ms,
    })
}

fn parse_entry(
    entry: &SourcePlanEntry,
    cache: &DocumentCache,
    loader: &dyn DocumentLoader,
) -> Result<ParsedSource> {
    let (document, cache_status) = match &entry.document {
        Some(document) => cache.insert_parsed(&entry.uri, document.clone()),
        None => cache.load(&entry.uri, loader)?,
    };
    let (tokens, diagnostics) = flatten_document(&document, entry);
    Ok((tokens, diagnostics, cache_status))
}
