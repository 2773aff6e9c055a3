//! Engine configuration
//!
//! The engine never reads a configuration file itself: hosts parse whatever
//! format they support (JSON, TOML) into these structs via serde, or build
//! them programmatically with the `with_*` helpers, and hand the result to
//! the runtime together with the directory the configuration was loaded from.
//! Virtual sources carry a producer closure and therefore bypass serde.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::diagnostics::Severity;
use crate::model::JsonPointer;

/// Complete engine input.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// Ordered layer list; position determines `layerIndex`.
    pub layers: Vec<LayerConfig>,

    /// Sources assigned to layers.
    pub sources: Vec<SourceConfig>,

    /// Transform enablement and options.
    pub transforms: TransformSettings,

    /// Formatter instances to run.
    pub formatters: Vec<FormatterInstanceConfig>,

    /// Incremental rebuild strategy and cache location.
    pub dependencies: Option<DependencyConfig>,

    /// Governance policies for audit runs.
    pub audit: Option<AuditConfig>,

    /// Output directory relative to the configuration directory.
    pub out_dir: Option<PathBuf>,

    /// Bounded worker-pool width for source loading; defaults to the
    /// detected parallelism.
    pub concurrency: Option<usize>,
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_layer(mut self, name: impl Into<String>) -> Self {
        self.layers.push(LayerConfig { name: name.into() });
        self
    }

    pub fn with_source(mut self, source: SourceConfig) -> Self {
        self.sources.push(source);
        self
    }

    pub fn with_transform(mut self, entry: TransformEntry) -> Self {
        self.transforms.entries.push(entry);
        self
    }

    pub fn with_formatter(mut self, formatter: FormatterInstanceConfig) -> Self {
        self.formatters.push(formatter);
        self
    }

    pub fn with_dependencies(mut self, dependencies: DependencyConfig) -> Self {
        self.dependencies = Some(dependencies);
        self
    }

    pub fn with_audit(mut self, audit: AuditConfig) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn with_out_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.out_dir = Some(dir.into());
        self
    }

    pub fn with_concurrency(mut self, workers: usize) -> Self {
        self.concurrency = Some(workers);
        self
    }

    /// Effective output directory (`dist` when unset).
    pub fn effective_out_dir(&self) -> PathBuf {
        self.out_dir.clone().unwrap_or_else(|| PathBuf::from("dist"))
    }
}

/// A named, ordered bucket of sources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerConfig {
    pub name: String,
}

/// Pointer template rendered into each source's pointer prefix.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PointerTemplate {
    /// Base pointer, e.g. `#/` or `#/brand`.
    pub base: String,

    /// Additional decoded segments appended to the base.
    pub segments: Vec<String>,
}

impl PointerTemplate {
    pub fn root() -> Self {
        Self {
            base: "#/".to_string(),
            segments: Vec::new(),
        }
    }

    /// Render the template into a canonical pointer.
    pub fn render(&self) -> JsonPointer {
        let base = JsonPointer::parse(&self.base);
        base.join(&JsonPointer::from_segments(self.segments.clone()))
    }
}

/// Producer closure for virtual sources.
///
/// Producers run during planning; a failing producer surfaces as a planning
/// issue, never at load time.
#[derive(Clone)]
pub struct DocumentProducer(Arc<dyn Fn() -> anyhow::Result<Value> + Send + Sync>);

impl DocumentProducer {
    pub fn new(producer: impl Fn() -> anyhow::Result<Value> + Send + Sync + 'static) -> Self {
        Self(Arc::new(producer))
    }

    pub fn produce(&self) -> anyhow::Result<Value> {
        (self.0)()
    }
}

impl fmt::Debug for DocumentProducer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DocumentProducer(<closure>)")
    }
}

/// Kind-specific source payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SourceKind {
    /// Glob patterns expanded relative to the configuration directory.
    File { patterns: Vec<String> },

    /// A DTIF document inlined into the configuration.
    Inline { document: Value },

    /// A producer invoked during planning.
    #[serde(skip)]
    Virtual { producer: DocumentProducer },
}

impl SourceKind {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::File { .. } => "file",
            Self::Inline { .. } => "inline",
            Self::Virtual { .. } => "virtual",
        }
    }
}

/// One source entry from the configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceConfig {
    pub id: String,

    /// Layer this source belongs to; must name a configured layer.
    pub layer: String,

    #[serde(default = "PointerTemplate::root")]
    pub pointer_template: PointerTemplate,

    #[serde(flatten)]
    pub kind: SourceKind,

    /// Opaque context merged into dependency hashing.
    #[serde(default)]
    pub context: Option<Value>,

    /// When true, an empty glob expansion or a load failure is fatal.
    #[serde(default = "default_required")]
    pub required: bool,
}

fn default_required() -> bool {
    true
}

impl SourceConfig {
    pub fn file(
        id: impl Into<String>,
        layer: impl Into<String>,
        patterns: Vec<String>,
    ) -> Self {
        Self {
            id: id.into(),
            layer: layer.into(),
            pointer_template: PointerTemplate::root(),
            kind: SourceKind::File { patterns },
            context: None,
            required: true,
        }
    }

    pub fn inline(id: impl Into<String>, layer: impl Into<String>, document: Value) -> Self {
        Self {
            id: id.into(),
            layer: layer.into(),
            pointer_template: PointerTemplate::root(),
            kind: SourceKind::Inline { document },
            context: None,
            required: true,
        }
    }

    pub fn virtual_source(
        id: impl Into<String>,
        layer: impl Into<String>,
        producer: DocumentProducer,
    ) -> Self {
        Self {
            id: id.into(),
            layer: layer.into(),
            pointer_template: PointerTemplate::root(),
            kind: SourceKind::Virtual { producer },
            context: None,
            required: true,
        }
    }

    pub fn with_pointer_template(mut self, template: PointerTemplate) -> Self {
        self.pointer_template = template;
        self
    }

    pub fn with_context(mut self, context: Value) -> Self {
        self.context = Some(context);
        self
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }
}

/// Transform enablement.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformSettings {
    pub entries: Vec<TransformEntry>,
}

/// One enabled transform (or whole group when `name` is a group id).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformEntry {
    pub name: String,

    #[serde(default)]
    pub group: Option<String>,

    #[serde(default)]
    pub options: Option<Value>,
}

impl TransformEntry {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            group: None,
            options: None,
        }
    }

    pub fn with_options(mut self, options: Value) -> Self {
        self.options = Some(options);
        self
    }
}

/// One formatter instance from the configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormatterInstanceConfig {
    /// Stable id; defaults to `<name>#<index>` during planning.
    #[serde(default)]
    pub id: Option<String>,

    pub name: String,

    #[serde(default)]
    pub options: Option<Value>,

    /// Output subdirectory relative to the engine's out dir.
    #[serde(default)]
    pub output: Option<String>,
}

impl FormatterInstanceConfig {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            options: None,
            output: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_options(mut self, options: Value) -> Self {
        self.options = Some(options);
        self
    }

    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = Some(output.into());
        self
    }
}

/// Incremental rebuild configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyConfig {
    pub strategy: DependencyStrategy,

    /// Dependency snapshot location relative to the configuration directory.
    #[serde(default)]
    pub cache_path: Option<PathBuf>,
}

/// Named dependency strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyStrategy {
    pub name: DependencyStrategyName,

    #[serde(default)]
    pub options: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyStrategyName {
    Snapshot,
    Graph,
}

impl DependencyConfig {
    pub fn snapshot(cache_path: impl Into<PathBuf>) -> Self {
        Self {
            strategy: DependencyStrategy {
                name: DependencyStrategyName::Snapshot,
                options: None,
            },
            cache_path: Some(cache_path.into()),
        }
    }
}

/// Governance audit configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuditConfig {
    pub policies: Vec<PolicyEntry>,

    /// Report rendering configuration.
    pub report: Option<ReportConfig>,
}

impl AuditConfig {
    pub fn with_policy(mut self, entry: PolicyEntry) -> Self {
        self.policies.push(entry);
        self
    }
}

/// One enabled policy rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyEntry {
    pub name: String,

    #[serde(default)]
    pub options: Option<Value>,
}

impl PolicyEntry {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            options: None,
        }
    }

    pub fn with_options(mut self, options: Value) -> Self {
        self.options = Some(options);
        self
    }
}

/// Audit report rendering configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReportConfig {
    /// Requested output formats; duplicates collapse to their first
    /// occurrence.
    pub formats: Vec<String>,

    /// Violations at or above this severity fail the audit.
    pub fail_on: Option<Severity>,
}
