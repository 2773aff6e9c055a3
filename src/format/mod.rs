//! Formatter engine - snapshots in, file artifacts out
//!
//! Formatters are registered trait objects, planned into instances from the
//! configuration, fed pointer-sorted `FormatterToken` records filtered by
//! their selector, and expected to return relative-path artifacts. The engine
//! enforces per-execution path uniqueness; the artifact writer resolves the
//! paths against the output directory.

pub mod android;
pub mod css;
pub mod docs;
mod ident;
pub mod js;
pub mod json;
pub mod swiftui;
pub mod writer;

use regex::Regex;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use crate::config::FormatterInstanceConfig;
use crate::error::FormatterRegistryError;
use crate::model::{TokenMetadata, TokenSnapshot, TokenType};
use crate::resolver::ResolvedPlan;
use crate::transform::TransformRun;

pub use writer::ArtifactWriter;

/// Token selector for a formatter.
#[derive(Debug, Clone, Default)]
pub struct FormatterSelector {
    /// Token types; empty means all.
    pub types: Vec<TokenType>,

    /// When set, `FormatterToken::transforms` is filtered to these names.
    pub transforms: Option<Vec<String>>,

    /// Optional pointer regexes.
    pub pointer_patterns: Option<Vec<String>>,
}

impl FormatterSelector {
    pub fn for_types(types: &[TokenType]) -> Self {
        Self {
            types: types.to_vec(),
            transforms: None,
            pointer_patterns: None,
        }
    }

    fn matches(&self, snapshot: &TokenSnapshot) -> bool {
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
        true
    }
}

/// One snapshot as seen by a formatter.
#[derive(Debug, Clone)]
pub struct FormatterToken {
    pub snapshot: TokenSnapshot,

    /// Canonical pointer string.
    pub pointer: String,

    /// Deep clone of the resolved value.
    pub value: Value,

    /// Deep clone of the raw literal.
    pub raw: Value,

    pub metadata: Option<TokenMetadata>,

    /// Transform payloads, filtered to the selector's transform list.
    pub transforms: BTreeMap<String, Value>,
}

impl FormatterToken {
    /// Payload of one transform, if attached.
    pub fn transform(&self, name: &str) -> Option<&Value> {
        self.transforms.get(name)
    }
}

/// Artifact contents: UTF-8 text or raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactContents {
    Text(String),
    Binary(Vec<u8>),
}

impl ArtifactContents {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Text(text) => text.as_bytes(),
            Self::Binary(bytes) => bytes,
        }
    }
}

/// One file produced by a formatter, with a path relative to the formatter's
/// output directory.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub path: String,
    pub contents: ArtifactContents,
    pub metadata: Option<Value>,
}

impl Artifact {
    pub fn text(path: impl Into<String>, contents: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            contents: ArtifactContents::Text(contents.into()),
            metadata: None,
        }
    }

    pub fn binary(path: impl Into<String>, contents: Vec<u8>) -> Self {
        Self {
            path: path.into(),
            contents: ArtifactContents::Binary(contents),
            metadata: None,
        }
    }
}

/// Input handed to a formatter run.
pub struct FormatterInput {
    /// Pointer-sorted, selector-filtered tokens.
    pub tokens: Vec<FormatterToken>,

    /// Instance options from the configuration.
    pub options: Option<Value>,

    /// Instance id, for artifact metadata.
    pub instance_id: String,

    /// Configuration directory, for formatters that embed local media.
    pub config_dir: Option<PathBuf>,
}

/// A formatter mapping selected snapshots to artifacts.
pub trait Formatter: Send + Sync {
    fn name(&self) -> &'static str;

    fn selector(&self) -> FormatterSelector;

    fn run(&self, input: &FormatterInput) -> anyhow::Result<Vec<Artifact>>;
}

/// A planned formatter instance.
#[derive(Debug, Clone)]
pub struct FormatterPlan {
    /// Instance id; defaults to `<name>#<index>`.
    pub id: String,

    pub name: String,

    /// Output subdirectory under the engine's out dir.
    pub output: Option<String>,

    pub options: Option<Value>,
}

/// One formatter execution: plan, id, and produced artifacts.
#[derive(Debug, Clone)]
pub struct FormatterExecution {
    pub execution_id: String,
    pub plan: FormatterPlan,
    pub artifacts: Vec<Artifact>,
}

/// Registry of compiled-in formatters.
pub struct FormatterRegistry {
    formatters: Vec<Arc<dyn Formatter>>,
}

impl Default for FormatterRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl FormatterRegistry {
    pub fn empty() -> Self {
        Self {
            formatters: Vec::new(),
        }
    }

    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(css::CssVariablesFormatter));
        registry.register(Arc::new(swiftui::SwiftUiFormatter));
        registry.register(Arc::new(android::AndroidResourcesFormatter));
        registry.register(Arc::new(android::ComposeFormatter));
        registry.register(Arc::new(json::JsonSnapshotFormatter));
        registry.register(Arc::new(js::JsModuleFormatter));
        registry.register(Arc::new(docs::HtmlDocsFormatter));
        registry
    }

    pub fn register(&mut self, formatter: Arc<dyn Formatter>) {
        self.formatters.push(formatter);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Formatter>> {
        self.formatters
            .iter()
            .find(|f| f.name() == name)
            .cloned()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.formatters.iter().map(|f| f.name()).collect()
    }
}

/// Output of the formatting stage.
#[derive(Debug, Clone, Default)]
pub struct FormatRun {
    pub executions: Vec<FormatterExecution>,
    pub duration_ms: u64,
}

impl FormatRun {
    pub fn artifact_count(&self) -> usize {
        self.executions.iter().map(|e| e.artifacts.len()).sum()
    }
}

/// The formatter engine.
pub struct FormatterEngine {
    registry: FormatterRegistry,
}

impl Default for FormatterEngine {
    fn default() -> Self {
        Self::new(FormatterRegistry::with_builtins())
    }
}

impl FormatterEngine {
    pub fn new(registry: FormatterRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &FormatterRegistry {
        &self.registry
    }

    /// Plan formatter instances, assigning default ids.
    pub fn plan_instances(
        &self,
        instances: &[FormatterInstanceConfig],
    ) -> Result<Vec<(FormatterPlan, Arc<dyn Formatter>)>, FormatterRegistryError> {
        let mut plans = Vec::with_capacity(instances.len());
        for (index, instance) in instances.iter().enumerate() {
            let formatter = self.registry.get(&instance.name).ok_or_else(|| {
                FormatterRegistryError::UnknownFormatter {
                    name: instance.name.clone(),
                }
            })?;
            let id = instance
                .id
                .clone()
                .unwrap_or_else(|| format!("{}#{index}", instance.name));
            plans.push((
                FormatterPlan {
                    id,
                    name: instance.name.clone(),
                    output: instance.output.clone(),
                    options: instance.options.clone(),
                },
                formatter,
            ));
        }
        Ok(plans)
    }

    /// Run every configured formatter instance over the resolved plan.
    pub fn execute(
        &self,
        plan: &ResolvedPlan,
        transforms: &TransformRun,
        instances: &[FormatterInstanceConfig],
        config_dir: Option<&std::path::Path>,
    ) -> Result<FormatRun, FormatterRegistryError> {
        let start = Instant::now();
        let planned = self.plan_instances(instances)?;
        let mut executions = Vec::with_capacity(planned.len());

        for (instance_plan, formatter) in planned {
            let selector = formatter.selector();
            let tokens = assemble_tokens(plan, transforms, &selector);

            let input = FormatterInput {
                tokens,
                options: instance_plan.options.clone(),
                instance_id: instance_plan.id.clone(),
                config_dir: config_dir.map(PathBuf::from),
            };

            let execution_id = Uuid::new_v4().to_string();
            let artifacts = formatter.run(&input).map_err(|err| {
                FormatterRegistryError::ExecutionFailed {
                    name: instance_plan.name.clone(),
                    message: format!("{err:#}"),
                }
            })?;

            // A duplicate path from a single execution is a contract error.
            let mut seen = HashSet::new();
            for artifact in &artifacts {
                if !seen.insert(artifact.path.clone()) {
                    return Err(FormatterRegistryError::DuplicateArtifactPath {
                        execution_id,
                        path: artifact.path.clone(),
                    });
                }
            }

            tracing::debug!(
                formatter = %instance_plan.name,
                instance = %instance_plan.id,
                artifacts = artifacts.len(),
                "formatter execution complete"
            );

            executions.push(FormatterExecution {
                execution_id,
                plan: instance_plan,
                artifacts,
            });
        }

        Ok(FormatRun {
            executions,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }
}

/// Assemble selector-filtered formatter tokens in pointer order.
fn assemble_tokens(
    plan: &ResolvedPlan,
    transforms: &TransformRun,
    selector: &FormatterSelector,
) -> Vec<FormatterToken> {
    let mut tokens = Vec::new();
    for snapshot in plan.tokens.iter() {
        if !snapshot.is_resolved() || !selector.matches(snapshot) {
            continue;
        }
        let value = match snapshot.value() {
            Some(value) => value,
            None => continue,
        };

        let all_payloads = transforms
            .for_pointer(&snapshot.id)
            .cloned()
            .unwrap_or_default();
        let filtered: BTreeMap<String, Value> = match &selector.transforms {
            Some(names) => all_payloads
                .into_iter()
                .filter(|(name, _)| names.contains(name))
                .collect(),
            None => all_payloads,
        };

        tokens.push(FormatterToken {
            pointer: snapshot.id.clone(),
            value,
            raw: snapshot.raw(),
            metadata: snapshot.metadata.clone(),
            transforms: filtered,
            snapshot: snapshot.clone(),
        });
    }
    tokens
}
