//! Source planner - expands configuration into a deterministic parse order
//!
//! Planning validates everything it can before any document is touched:
//! layer references, duplicate `(layer, id)` pairs, glob expansions, and
//! virtual producers all either succeed here or surface as issues. Only a
//! plan with zero `validation` issues reaches the resolver.

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::path::Path;
use std::time::Instant;
use walkdir::WalkDir;

use crate::config::{EngineConfig, SourceConfig, SourceKind};
use crate::error::SourcePlanningError;
use crate::model::JsonPointer;

/// Issue kind; `validation` issues are fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueKind {
    Validation,
    Missing,
    Io,
}

/// One planning issue, attributed to a source.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanIssue {
    pub kind: IssueKind,
    pub source_id: String,
    pub uri: Option<String>,
    pub pointer_prefix: Option<String>,
    pub message: String,
}

/// One planned source ready to parse.
#[derive(Debug, Clone)]
pub struct SourcePlanEntry {
    /// Source id from the configuration.
    pub id: String,

    /// Layer name.
    pub layer: String,

    /// Layer position; assigned from layer declaration order.
    pub layer_index: usize,

    /// Rendered pointer prefix.
    pub pointer_prefix: JsonPointer,

    /// Document URI: a config-relative path for file sources, a synthetic
    /// `inline:`/`virtual:` URI otherwise.
    pub uri: String,

    /// Opaque context carried into dependency hashing.
    pub context: Option<Value>,

    /// Inlined document for inline and virtual sources.
    pub document: Option<Value>,

    /// Whether a load failure for this entry is fatal.
    pub required: bool,
}

/// Ordered source plan.
#[derive(Debug, Clone, Default)]
pub struct SourcePlan {
    /// Entries sorted by `(layer_index, declaration order)`.
    pub entries: Vec<SourcePlanEntry>,

    /// Non-fatal issues observed during planning.
    pub issues: Vec<PlanIssue>,

    pub duration_ms: u64,
}

/// Expand the configuration into a total parse order.
///
/// Glob patterns are expanded relative to `config_dir`, one entry per match.
/// Virtual producers run here; a producer failure is a planning issue, never
/// a load-time one. Returns a typed error when any `validation` issue exists.
pub fn plan(config: &EngineConfig, config_dir: &Path) -> Result<SourcePlan, SourcePlanningError> {
    let start = Instant::now();
    let mut entries = Vec::new();
    let mut issues = Vec::new();

    let mut seen: HashSet<(String, String)> = HashSet::new();

    for source in &config.sources {
        let layer_index = match config.layers.iter().position(|l| l.name == source.layer) {
            Some(index) => index,
            None => {
                issues.push(issue(
                    IssueKind::Validation,
                    source,
                    None,
                    format!("source references unknown layer '{}'", source.layer),
                ));
                continue;
            }
        };

        if !seen.insert((source.layer.clone(), source.id.clone())) {
            issues.push(issue(
                IssueKind::Validation,
                source,
                None,
                format!(
                    "duplicate source id '{}' in layer '{}'",
                    source.id, source.layer
                ),
            ));
            continue;
        }

        let pointer_prefix = source.pointer_template.render();

        match &source.kind {
            SourceKind::File { patterns } => {
                expand_file_source(
                    source,
                    patterns,
                    config_dir,
                    layer_index,
                    &pointer_prefix,
                    &mut entries,
                    &mut issues,
                );
            }
            SourceKind::Inline { document } => {
                entries.push(SourcePlanEntry {
                    id: source.id.clone(),
                    layer: source.layer.clone(),
                    layer_index,
                    pointer_prefix: pointer_prefix.clone(),
                    uri: format!("inline:{}", source.id),
                    context: source.context.clone(),
                    document: Some(document.clone()),
                    required: source.required,
                });
            }
            SourceKind::Virtual { producer } => match producer.produce() {
                Ok(document) => {
                    entries.push(SourcePlanEntry {
                        id: source.id.clone(),
                        layer: source.layer.clone(),
                        layer_index,
                        pointer_prefix: pointer_prefix.clone(),
                        uri: format!("virtual:{}", source.id),
                        context: source.context.clone(),
                        document: Some(document),
                        required: source.required,
                    });
                }
                Err(err) => {
                    issues.push(issue(
                        IssueKind::Validation,
                        source,
                        None,
                        format!("virtual producer failed: {err:#}"),
                    ));
                }
            },
        }
    }

    // Stable sort keeps declaration order within a layer.
    entries.sort_by_key(|entry| entry.layer_index);

    let fatal: Vec<PlanIssue> = issues
        .iter()
        .filter(|i| i.kind == IssueKind::Validation)
        .cloned()
        .collect();
    if !fatal.is_empty() {
        tracing::error!(
            issues = fatal.len(),
            "source planning failed before any document was loaded"
        );
        return Err(SourcePlanningError { issues: fatal });
    }

    let duration_ms = start.elapsed().as_millis() as u64;
    tracing::debug!(
        entries = entries.len(),
        issues = issues.len(),
        duration_ms,
        "source plan ready"
    );

    Ok(SourcePlan {
        entries,
        issues,
        duration_ms,
    })
}

fn expand_file_source(
    source: &SourceConfig,
    patterns: &[String],
    config_dir: &Path,
    layer_index: usize,
    pointer_prefix: &JsonPointer,
    entries: &mut Vec<SourcePlanEntry>,
    issues: &mut Vec<PlanIssue>,
) {
    let glob_set = match build_glob_set(patterns) {
        Ok(set) => set,
        Err(err) => {
            issues.push(issue(
                IssueKind::Validation,
                source,
                None,
                format!("invalid glob pattern: {err}"),
            ));
            return;
        }
    };

    let mut matches = Vec::new();
    for entry in WalkDir::new(config_dir).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                // Upgrade to fatal only when the source insists on input.
                let kind = if source.required {
                    IssueKind::Validation
                } else {
                    IssueKind::Io
                };
                issues.push(issue(
                    kind,
                    source,
                    None,
                    format!("glob expansion failed: {err}"),
                ));
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = match entry.path().strip_prefix(config_dir) {
            Ok(path) => path,
            Err(_) => continue,
        };
        let candidate = relative.to_string_lossy().replace('\\', "/");
        if glob_set.is_match(&candidate) {
            matches.push(candidate);
        }
    }

    // Deterministic expansion order regardless of directory walk order.
    matches.sort();

    if matches.is_empty() {
        let kind = if source.required {
            IssueKind::Validation
        } else {
            IssueKind::Missing
        };
        issues.push(issue(
            kind,
            source,
            None,
            format!("glob patterns {:?} matched no files", patterns),
        ));
        return;
    }

    for uri in matches {
        entries.push(SourcePlanEntry {
            id: source.id.clone(),
            layer: source.layer.clone(),
            layer_index,
            pointer_prefix: pointer_prefix.clone(),
            uri,
            context: source.context.clone(),
            document: None,
            required: source.required,
        });
    }
}

fn build_glob_set(patterns: &[String]) -> Result<GlobSet, globset::Error> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    builder.build()
}

fn issue(
    kind: IssueKind,
    source: &SourceConfig,
    uri: Option<String>,
    message: String,
) -> PlanIssue {
    PlanIssue {
        kind,
        source_id: source.id.clone(),
        uri,
        pointer_prefix: Some(source.pointer_template.render().encoded().to_string()),
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DocumentProducer, PointerTemplate};
    use serde_json::json;
    use tempfile::TempDir;

    fn two_layer_config() -> EngineConfig {
        EngineConfig::new().with_layer("base").with_layer("brand")
    }

    #[test]
    fn inline_sources_plan_in_layer_order() {
        let config = two_layer_config()
            .with_source(SourceConfig::inline("brand-tokens", "brand", json!({})))
            .with_source(SourceConfig::inline("base-tokens", "base", json!({})));

        let plan = plan(&config, Path::new(".")).unwrap();
        let ids: Vec<&str> = plan.entries.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["base-tokens", "brand-tokens"]);
        assert_eq!(plan.entries[0].layer_index, 0);
        assert_eq!(plan.entries[1].layer_index, 1);
    }

    #[test]
    fn duplicate_layer_id_pair_is_fatal() {
        let config = two_layer_config()
            .with_source(SourceConfig::inline("tokens", "base", json!({})))
            .with_source(SourceConfig::inline("tokens", "base", json!({})));

        let err = plan(&config, Path::new(".")).unwrap_err();
        assert_eq!(err.issues.len(), 1);
        assert!(err.issues[0].message.contains("duplicate source id"));
    }

    #[test]
    fn same_id_in_different_layers_is_allowed() {
        let config = two_layer_config()
            .with_source(SourceConfig::inline("tokens", "base", json!({})))
            .with_source(SourceConfig::inline("tokens", "brand", json!({})));

        let plan = plan(&config, Path::new(".")).unwrap();
        assert_eq!(plan.entries.len(), 2);
    }

    #[test]
    fn unknown_layer_is_fatal() {
        let config = EngineConfig::new()
            .with_layer("base")
            .with_source(SourceConfig::inline("tokens", "missing", json!({})));

        let err = plan(&config, Path::new(".")).unwrap_err();
        assert!(err.issues[0].message.contains("unknown layer"));
    }

    #[test]
    fn glob_expansion_yields_one_entry_per_match_sorted() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("tokens")).unwrap();
        std::fs::write(dir.path().join("tokens/b.json"), "{}").unwrap();
        std::fs::write(dir.path().join("tokens/a.json"), "{}").unwrap();
        std::fs::write(dir.path().join("tokens/readme.md"), "").unwrap();

        let config = EngineConfig::new().with_layer("base").with_source(
            SourceConfig::file("core", "base", vec!["tokens/*.json".to_string()]),
        );

        let plan = plan(&config, dir.path()).unwrap();
        let uris: Vec<&str> = plan.entries.iter().map(|e| e.uri.as_str()).collect();
        assert_eq!(uris, vec!["tokens/a.json", "tokens/b.json"]);
    }

    #[test]
    fn empty_required_glob_is_fatal() {
        let dir = TempDir::new().unwrap();
        let config = EngineConfig::new().with_layer("base").with_source(
            SourceConfig::file("core", "base", vec!["tokens/*.json".to_string()]),
        );

        let err = plan(&config, dir.path()).unwrap_err();
        assert!(err.issues[0].message.contains("matched no files"));
    }

    #[test]
    fn empty_optional_glob_records_missing_issue() {
        let dir = TempDir::new().unwrap();
        let config = EngineConfig::new().with_layer("base").with_source(
            SourceConfig::file("core", "base", vec!["tokens/*.json".to_string()]).optional(),
        );

        let plan = plan(&config, dir.path()).unwrap();
        assert!(plan.entries.is_empty());
        assert_eq!(plan.issues[0].kind, IssueKind::Missing);
    }

    #[test]
    fn virtual_producer_failure_surfaces_at_planning() {
        let config = EngineConfig::new().with_layer("base").with_source(
            SourceConfig::virtual_source(
                "gen",
                "base",
                DocumentProducer::new(|| anyhow::bail!("backend offline")),
            ),
        );

        let err = plan(&config, Path::new(".")).unwrap_err();
        assert!(err.issues[0].message.contains("backend offline"));
    }

    #[test]
    fn pointer_prefix_is_rendered_from_template() {
        let config = EngineConfig::new().with_layer("base").with_source(
            SourceConfig::inline("tokens", "base", json!({})).with_pointer_template(
                PointerTemplate {
                    base: "#/brand".to_string(),
                    segments: vec!["web".to_string()],
                },
            ),
        );

        let plan = plan(&config, Path::new(".")).unwrap();
        assert_eq!(plan.entries[0].pointer_prefix.encoded(), "#/brand/web");
    }
}
