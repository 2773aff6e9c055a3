//! Runtime orchestrator
//!
//! Sequences planning → resolution → transformation → (audit) → formatting →
//! write → dependencies, publishing stage events to the lifecycle bus and
//! aggregating monotonic timings. A cancellation token short-circuits between
//! stages; in-flight artifact writes finish to avoid truncation.

pub mod events;
pub mod watch;

use parking_lot::RwLock;
use serde_json::json;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::deps::{DependencyDelta, DependencySnapshot, DependencyStore, TransformCache};
use crate::document::{DocumentCache, DocumentLoader, FsDocumentLoader};
use crate::error::{EngineError, EngineResult};
use crate::format::{ArtifactWriter, FormatRun, FormatterEngine};
use crate::planner::{self, SourcePlan};
use crate::policy::{AuditReportOutput, AuditReporter, PolicyEngine, PolicyReport};
use crate::resolver::{self, ResolvedPlan};
use crate::transform::{PayloadCache, TransformEngine, TransformRun};

pub use events::{
    EventSubscriber, LifecycleBus, Stage, StageEvent, StageEventKind, SubscriptionId,
};
pub use watch::{WatchDriver, WatchHandle, WatchOptions};

/// Cooperative cancellation token checked between stages and at I/O
/// suspension points.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Monotonic stage timings for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageTimings {
    pub plan_ms: u64,
    pub parse_ms: u64,
    pub resolve_ms: u64,
    pub transform_ms: u64,
    pub format_ms: u64,
    pub dependency_ms: u64,
    pub total_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audit_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_with_audit_ms: Option<u64>,
}

/// Run identity: the previous run's label and this run's.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunContext {
    pub previous: Option<String>,
    pub next: String,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub duration_ms: u64,
}

/// Dependency-stage outcome.
#[derive(Debug, Clone)]
pub struct DependencyOutcome {
    pub snapshot: DependencySnapshot,
    pub delta: DependencyDelta,
    pub cache_path: PathBuf,
}

/// Everything a build run produces.
#[derive(Debug)]
pub struct BuildReport {
    pub run: RunContext,
    pub plan: SourcePlan,
    pub resolved: ResolvedPlan,
    pub transforms: TransformRun,
    pub format: FormatRun,
    /// `execution id → absolute paths` written to disk.
    pub written: BTreeMap<String, Vec<PathBuf>>,
    pub dependencies: Option<DependencyOutcome>,
    pub timings: StageTimings,
}

/// A build run plus policy evaluation and rendered reports.
#[derive(Debug)]
pub struct AuditReport {
    pub build: BuildReport,
    pub policy: PolicyReport,
    pub rendered: Option<AuditReportOutput>,
}

impl AuditReport {
    /// Audit verdict for CI exit codes.
    pub fn failed(&self) -> bool {
        self.rendered
            .as_ref()
            .map(|output| output.failed)
            .unwrap_or(self.policy.summary.errors > 0)
    }
}

/// The runtime: caches, engines, and the lifecycle bus wired together.
pub struct TokenEngine {
    config_dir: PathBuf,
    documents: Arc<DocumentCache>,
    loader: Arc<dyn DocumentLoader>,
    bus: Arc<LifecycleBus>,
    transforms: TransformEngine,
    formatters: FormatterEngine,
    policies: PolicyEngine,
    reporter: AuditReporter,
    last_run: RwLock<Option<String>>,
    internal_subscription: RwLock<Option<SubscriptionId>>,
}

impl TokenEngine {
    /// Create a runtime rooted at the configuration directory, with the
    /// built-in transform/formatter/policy registries and an internal
    /// stage-logging subscriber (removed again by [`TokenEngine::dispose`]).
    pub fn new(config_dir: impl Into<PathBuf>) -> Self {
        let config_dir = config_dir.into();
        let bus = Arc::new(LifecycleBus::new());
        let internal = bus.subscribe(Arc::new(LoggingSubscriber));

        Self {
            loader: Arc::new(FsDocumentLoader::new(config_dir.clone())),
            config_dir,
            documents: Arc::new(DocumentCache::new()),
            bus,
            transforms: TransformEngine::default(),
            formatters: FormatterEngine::default(),
            policies: PolicyEngine::default(),
            reporter: AuditReporter::new(),
            last_run: RwLock::new(None),
            internal_subscription: RwLock::new(Some(internal)),
        }
    }

    /// Substitute the document loader (tests, virtual filesystems).
    pub fn with_document_loader(mut self, loader: Arc<dyn DocumentLoader>) -> Self {
        self.loader = loader;
        self
    }

    pub fn with_transform_engine(mut self, transforms: TransformEngine) -> Self {
        self.transforms = transforms;
        self
    }

    pub fn with_formatter_engine(mut self, formatters: FormatterEngine) -> Self {
        self.formatters = formatters;
        self
    }

    pub fn with_policy_engine(mut self, policies: PolicyEngine) -> Self {
        self.policies = policies;
        self
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn document_cache(&self) -> &Arc<DocumentCache> {
        &self.documents
    }

    pub fn subscribe(&self, subscriber: Arc<dyn EventSubscriber>) -> SubscriptionId {
        self.bus.subscribe(subscriber)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.bus.unsubscribe(id)
    }

    /// Remove the internally registered listeners. Safe to call repeatedly;
    /// only the first call has an effect.
    pub fn dispose(&self) {
        if let Some(id) = self.internal_subscription.write().take() {
            self.bus.unsubscribe(id);
            tracing::debug!("runtime disposed, internal listeners unsubscribed");
        }
    }

    /// Run the build pipeline: plan, resolve, transform, format, write,
    /// track dependencies.
    pub async fn build(
        &self,
        config: &EngineConfig,
        cancel: &CancellationToken,
    ) -> EngineResult<BuildReport> {
        self.run_pipeline(config, cancel, None).await
    }

    /// Run the audit pipeline: the build stages plus policy evaluation and
    /// report rendering.
    pub async fn audit(
        &self,
        config: &EngineConfig,
        cancel: &CancellationToken,
    ) -> EngineResult<AuditReport> {
        let mut policy_slot = None;
        let build = self
            .run_pipeline(config, cancel, Some(&mut policy_slot))
            .await?;
        let policy = policy_slot.expect("audit pipeline always evaluates policies");

        let rendered = config
            .audit
            .as_ref()
            .and_then(|audit| audit.report.as_ref())
            .map(|report_config| self.reporter.report(&policy, report_config));

        Ok(AuditReport {
            build,
            policy,
            rendered,
        })
    }

    async fn run_pipeline(
        &self,
        config: &EngineConfig,
        cancel: &CancellationToken,
        mut audit_slot: Option<&mut Option<PolicyReport>>,
    ) -> EngineResult<BuildReport> {
        let run_start = Instant::now();
        let started_at = chrono::Utc::now();
        let mut timings = StageTimings::default();

        let previous = self.last_run.read().clone();
        let next = Uuid::new_v4().to_string();

        tracing::info!(
            run = %next,
            previous = previous.as_deref().unwrap_or("-"),
            "🚀 starting token build"
        );

        // ---- planning -------------------------------------------------
        self.check_cancel(cancel)?;
        let stage_start = Instant::now();
        self.publish(StageEvent::start(Stage::Planning))?;
        let plan = match planner::plan(config, &self.config_dir) {
            Ok(plan) => plan,
            Err(err) => {
                self.publish(StageEvent::error(Stage::Planning, err.to_string()))?;
                return Err(err.into());
            }
        };
        timings.plan_ms = stage_start.elapsed().as_millis() as u64;
        self.publish(StageEvent::complete(
            Stage::Planning,
            Some(json!({"entries": plan.entries.len(), "issues": plan.issues.len()})),
        ))?;

        // ---- resolution -----------------------------------------------
        self.check_cancel(cancel)?;
        self.publish(StageEvent::start(Stage::Resolution))?;
        let workers = config.concurrency.unwrap_or_else(num_cpus::get).max(1);
        let resolved = match resolver::resolve_with_concurrency(
            &plan,
            &self.documents,
            self.loader.as_ref(),
            workers,
        ) {
            Ok(resolved) => resolved,
            Err(err) => {
                self.publish(StageEvent::error(Stage::Resolution, format!("{err:#}")))?;
                return Err(EngineError::Other(err));
            }
        };
        timings.parse_ms = resolved.parse_ms;
        timings.resolve_ms = resolved.resolve_ms;
        self.publish(StageEvent::complete(
            Stage::Resolution,
            Some(json!({
                "tokens": resolved.tokens.len(),
                "resolved": resolved.resolved_count(),
                "diagnostics": resolved.diagnostics.len(),
            })),
        ))?;

        // ---- transformation -------------------------------------------
        self.check_cancel(cancel)?;
        let stage_start = Instant::now();
        self.publish(StageEvent::start(Stage::Transformation))?;
        let payload_cache = self.transform_cache(config);
        let transforms = match self.transforms.execute(
            &resolved,
            &config.transforms,
            payload_cache.as_ref().map(|c| c as &dyn PayloadCache),
        ) {
            Ok(transforms) => transforms,
            Err(err) => {
                self.publish(StageEvent::error(Stage::Transformation, err.to_string()))?;
                return Err(err.into());
            }
        };
        timings.transform_ms = stage_start.elapsed().as_millis() as u64;
        self.publish(StageEvent::complete(
            Stage::Transformation,
            Some(json!({
                "snapshots": transforms.outputs.len(),
                "cacheHits": transforms.cache_hits,
            })),
        ))?;

        // ---- audit (policy evaluation) --------------------------------
        if let Some(slot) = audit_slot.as_deref_mut() {
            self.check_cancel(cancel)?;
            let stage_start = Instant::now();
            self.publish(StageEvent::start(Stage::Audit))?;
            let audit_config = config.audit.clone().unwrap_or_default();
            let policy = match self.policies.evaluate(&resolved, &audit_config) {
                Ok(policy) => policy,
                Err(err) => {
                    self.publish(StageEvent::error(Stage::Audit, err.to_string()))?;
                    return Err(err.into());
                }
            };
            timings.audit_ms = Some(stage_start.elapsed().as_millis() as u64);
            self.publish(StageEvent::complete(
                Stage::Audit,
                Some(json!({
                    "policies": policy.summary.policy_count,
                    "violations": policy.summary.violation_count,
                })),
            ))?;
            *slot = Some(policy);
        }

        // ---- formatting + write ---------------------------------------
        self.check_cancel(cancel)?;
        let stage_start = Instant::now();
        self.publish(StageEvent::start(Stage::Formatting))?;
        let format = match self.formatters.execute(
            &resolved,
            &transforms,
            &config.formatters,
            Some(&self.config_dir),
        ) {
            Ok(format) => format,
            Err(err) => {
                self.publish(StageEvent::error(Stage::Formatting, err.to_string()))?;
                return Err(err.into());
            }
        };

        let out_dir = self.config_dir.join(config.effective_out_dir());
        let writer = ArtifactWriter::new(out_dir);
        let written = match writer.write(&format.executions).await {
            Ok(written) => written,
            Err(err) => {
                self.publish(StageEvent::error(Stage::Formatting, err.to_string()))?;
                return Err(err.into());
            }
        };
        timings.format_ms = stage_start.elapsed().as_millis() as u64;
        self.publish(StageEvent::complete(
            Stage::Formatting,
            Some(json!({
                "executions": format.executions.len(),
                "artifacts": format.artifact_count(),
            })),
        ))?;

        // ---- dependencies ---------------------------------------------
        self.check_cancel(cancel)?;
        let stage_start = Instant::now();
        let dependencies = if config.dependencies.is_some() {
            self.publish(StageEvent::start(Stage::Dependencies))?;
            let cache_path = self.dependency_cache_path(config);
            let store = DependencyStore::new(&cache_path);
            let snapshot = DependencySnapshot::capture(&resolved);

            let outcome = async {
                let delta = store.evaluate(&snapshot).await?;
                store.commit(&snapshot).await?;
                Ok::<_, crate::error::DependencyCacheError>(delta)
            }
            .await;

            match outcome {
                Ok(delta) => {
                    self.publish(StageEvent::complete(
                        Stage::Dependencies,
                        Some(json!({
                            "entries": snapshot.entries.len(),
                            "changed": delta.changed.len(),
                            "removed": delta.removed.len(),
                        })),
                    ))?;
                    Some(DependencyOutcome {
                        snapshot,
                        delta,
                        cache_path,
                    })
                }
                Err(err) => {
                    self.publish(StageEvent::error(Stage::Dependencies, err.to_string()))?;
                    return Err(err.into());
                }
            }
        } else {
            None
        };
        timings.dependency_ms = stage_start.elapsed().as_millis() as u64;

        timings.total_ms = run_start.elapsed().as_millis() as u64;
        if let Some(audit_ms) = timings.audit_ms {
            let without_audit = timings.total_ms.saturating_sub(audit_ms);
            timings.total_with_audit_ms = Some(timings.total_ms);
            timings.total_ms = without_audit;
        }

        *self.last_run.write() = Some(next.clone());

        tracing::info!(
            run = %next,
            tokens = resolved.tokens.len(),
            artifacts = format.artifact_count(),
            total_ms = timings.total_ms,
            "🏁 token build complete"
        );

        Ok(BuildReport {
            run: RunContext {
                previous,
                next,
                started_at,
                duration_ms: run_start.elapsed().as_millis() as u64,
            },
            plan,
            resolved,
            transforms,
            format,
            written,
            dependencies,
            timings,
        })
    }

    fn check_cancel(&self, cancel: &CancellationToken) -> EngineResult<()> {
        if cancel.is_cancelled() {
            tracing::warn!("⏹️  run cancelled between stages");
            return Err(EngineError::Cancelled);
        }
        Ok(())
    }

    fn publish(&self, event: StageEvent) -> EngineResult<()> {
        self.bus.publish(&event).map_err(|err| EngineError::Subscriber {
            stage: event.stage.as_str().to_string(),
            message: format!("{err:#}"),
        })
    }

    fn dependency_cache_path(&self, config: &EngineConfig) -> PathBuf {
        let relative = config
            .dependencies
            .as_ref()
            .and_then(|deps| deps.cache_path.clone())
            .unwrap_or_else(|| PathBuf::from(".dtifx/deps.json"));
        if relative.is_absolute() {
            relative
        } else {
            self.config_dir.join(relative)
        }
    }

    fn transform_cache(&self, config: &EngineConfig) -> Option<TransformCache> {
        let dependencies = config.dependencies.as_ref()?;
        let dir = self
            .dependency_cache_path(config)
            .parent()
            .map(|parent| parent.join("transforms"))?;
        let ttl_ms = dependencies
            .strategy
            .options
            .as_ref()
            .and_then(|options| options.get("ttlMs"))
            .and_then(serde_json::Value::as_u64);
        let cache = TransformCache::new(dir);
        Some(match ttl_ms {
            Some(ttl) => cache.with_ttl(std::time::Duration::from_millis(ttl)),
            None => cache,
        })
    }
}

impl Drop for TokenEngine {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Internal subscriber logging stage progress in the runtime's voice.
struct LoggingSubscriber;

impl EventSubscriber for LoggingSubscriber {
    fn on_event(&self, event: &StageEvent) -> anyhow::Result<()> {
        match event.kind {
            StageEventKind::Start => {
                tracing::debug!(stage = %event.stage, "▶️  stage started")
            }
            StageEventKind::Complete => {
                tracing::debug!(stage = %event.stage, attributes = ?event.attributes, "✅ stage complete")
            }
            StageEventKind::Error => {
                tracing::error!(stage = %event.stage, error = ?event.error, "❌ stage failed")
            }
        }
        Ok(())
    }
}
