//! # DTIFx Engine - Deterministic Design-Token Build & Audit
//!
//! The engine takes a declarative configuration of layered DTIF token
//! sources and produces, deterministically:
//! - a fully resolved set of token snapshots (layer overrides applied,
//!   aliases followed across documents, cycles diagnosed),
//! - transform payloads attached per snapshot (CSS, SwiftUI, Android
//!   Material and Compose representations),
//! - formatter artifacts written to disk (CSS variables, Swift structs,
//!   Android resources, Kotlin objects, JSON snapshots, JS/TS modules, and
//!   a browsable HTML documentation bundle),
//! - an incremental dependency snapshot enabling watch-mode reuse,
//! - a governance policy summary with multi-format audit reports.
//!
//! ## Architecture Overview
//!
//! Six cooperating components behind narrow contracts, sequenced by the
//! runtime orchestrator:
//!
//! - **Source Planner**: expands the configuration into a deterministic,
//!   fully validated parse order before any document is touched
//! - **Parser + Resolver**: loads DTIF documents through the shared
//!   document cache, flattens them, merges layers, resolves aliases
//! - **Transform Engine**: selector-driven pure transforms with a
//!   content-addressed payload cache
//! - **Formatter Engine**: per-platform formatters emitting relative-path
//!   artifacts, resolved and written by the artifact writer
//! - **Policy Engine**: declarative governance rules with a multi-format
//!   audit reporter
//! - **Dependency Tracker**: canonical-JSON content hashing, persisted
//!   dependency snapshots, changed/removed evaluation for incremental runs
//!
//! ## Quick Start - Build
//!
//! ```rust,no_run
//! use dtifx_engine::{
//!     CancellationToken, EngineConfig, FormatterInstanceConfig, SourceConfig, TokenEngine,
//!     TransformEntry,
//! };
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = EngineConfig::new()
//!         .with_layer("base")
//!         .with_source(SourceConfig::inline(
//!             "base-tokens",
//!             "base",
//!             json!({"color": {"primary": {"$type": "color", "$value": "#336699"}}}),
//!         ))
//!         .with_transform(TransformEntry::named("css/value"))
//!         .with_formatter(FormatterInstanceConfig::named("css"));
//!
//!     let engine = TokenEngine::new(".");
//!     let report = engine.build(&config, &CancellationToken::new()).await?;
//!     println!("{} artifacts written", report.format.artifact_count());
//!     Ok(())
//! }
//! ```
//!
//! ## Quick Start - Watch Mode
//!
//! ```rust,no_run
//! use dtifx_engine::{EngineConfig, TokenEngine, WatchDriver, WatchOptions};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let engine = Arc::new(TokenEngine::new("."));
//!     let config = EngineConfig::new(); // host-parsed configuration
//!     let mut handle = WatchDriver::start(engine, config, WatchOptions::default())?;
//!     while let Some(event) = handle.next_event().await {
//!         println!("rebuild: {event:?}");
//!     }
//!     Ok(())
//! }
//! ```

// Leaf layer: token model and shared diagnostics
pub mod diagnostics;
pub mod model;

// Configuration and typed errors
pub mod config;
pub mod error;

// Pipeline stages
pub mod deps;
pub mod document;
pub mod format;
pub mod planner;
pub mod policy;
pub mod resolver;
pub mod transform;

// Diff workflow boundary
pub mod diff;

// Runtime orchestration
pub mod runtime;

// ========================================================================
// Primary Public API
// ========================================================================

pub use config::{
    AuditConfig, DependencyConfig, EngineConfig, FormatterInstanceConfig, LayerConfig,
    PointerTemplate, PolicyEntry, ReportConfig, SourceConfig, SourceKind, TransformEntry,
    TransformSettings,
};
pub use diagnostics::{Diagnostic, Severity};
pub use document::{CacheStatus, DocumentCache, DocumentLoader, FsDocumentLoader};
pub use error::{EngineError, EngineResult};
pub use model::{JsonPointer, TokenSet, TokenSnapshot, TokenType};
pub use planner::{SourcePlan, SourcePlanEntry};
pub use resolver::{ResolvedPlan, ResolvedSource};
pub use runtime::{
    AuditReport, BuildReport, CancellationToken, EventSubscriber, LifecycleBus, Stage,
    StageEvent, StageEventKind, TokenEngine, WatchDriver, WatchHandle, WatchOptions,
};

/// Engine version, from the crate manifest.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
