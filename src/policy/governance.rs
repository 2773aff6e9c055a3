//! Built-in governance rules

use serde_json::Value;

use crate::diagnostics::Severity;
use crate::model::TokenSnapshot;

use super::{PolicyHandler, PolicyInput, PolicyRule, PolicyViolation};

/// Default extension key governance metadata lives under.
pub const DEFAULT_EXTENSION_KEY: &str = "org.dtifx.governance";

fn parse_severity(options: Option<&Value>, default: Severity) -> anyhow::Result<Severity> {
    match options.and_then(|o| o.get("severity")) {
        None => Ok(default),
        Some(value) => {
            let raw = value
                .as_str()
                .ok_or_else(|| anyhow::anyhow!("severity must be a string"))?;
            match raw {
                "error" => Ok(Severity::Error),
                "warn" | "warning" => Ok(Severity::Warn),
                "info" => Ok(Severity::Info),
                other => anyhow::bail!("unknown severity '{other}'"),
            }
        }
    }
}

fn extension_key(options: Option<&Value>) -> String {
    options
        .and_then(|o| o.get("extension"))
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_EXTENSION_KEY)
        .to_string()
}

fn governance_field(snapshot: &TokenSnapshot, extension: &str, field: &str) -> Option<Value> {
    snapshot
        .metadata
        .as_ref()?
        .extension(extension)?
        .get(field)
        .cloned()
}

/// `governance.requireOwner` - every token must name a non-empty owner in
/// its governance extension.
pub struct RequireOwnerRule;

impl PolicyRule for RequireOwnerRule {
    fn name(&self) -> &'static str {
        "governance.requireOwner"
    }

    fn setup(&self, options: Option<&Value>) -> anyhow::Result<Box<dyn PolicyHandler>> {
        Ok(Box::new(RequireOwnerHandler {
            extension: extension_key(options),
            field: options
                .and_then(|o| o.get("field"))
                .and_then(Value::as_str)
                .unwrap_or("owner")
                .to_string(),
            severity: parse_severity(options, Severity::Error)?,
        }))
    }
}

struct RequireOwnerHandler {
    extension: String,
    field: String,
    severity: Severity,
}

impl PolicyHandler for RequireOwnerHandler {
    fn evaluate(&self, input: &PolicyInput) -> anyhow::Result<Vec<PolicyViolation>> {
        let mut violations = Vec::new();
        for snapshot in input.snapshots() {
            let owner = governance_field(snapshot, &self.extension, &self.field);
            let present = owner
                .as_ref()
                .and_then(Value::as_str)
                .map(|s| !s.trim().is_empty())
                .unwrap_or(false);
            if !present {
                violations.push(
                    PolicyViolation::new(
                        "governance.requireOwner",
                        snapshot.id.clone(),
                        self.severity,
                        format!(
                            "token has no '{}' entry under extension '{}'",
                            self.field, self.extension
                        ),
                    )
                    .with_details(serde_json::json!({"extension": self.extension})),
                );
            }
        }
        Ok(violations)
    }
}

/// `governance.requireTag` - tokens must declare all of the listed tags.
pub struct RequireTagRule;

impl PolicyRule for RequireTagRule {
    fn name(&self) -> &'static str {
        "governance.requireTag"
    }

    fn setup(&self, options: Option<&Value>) -> anyhow::Result<Box<dyn PolicyHandler>> {
        let tags: Vec<String> = options
            .and_then(|o| o.get("tags"))
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();
        if tags.is_empty() {
            anyhow::bail!("requireTag needs a non-empty 'tags' list");
        }
        Ok(Box::new(RequireTagHandler {
            tags,
            severity: parse_severity(options, Severity::Error)?,
        }))
    }
}

struct RequireTagHandler {
    tags: Vec<String>,
    severity: Severity,
}

impl PolicyHandler for RequireTagHandler {
    fn evaluate(&self, input: &PolicyInput) -> anyhow::Result<Vec<PolicyViolation>> {
        let mut violations = Vec::new();
        for snapshot in input.snapshots() {
            let declared = snapshot
                .metadata
                .as_ref()
                .map(|m| m.tags.clone())
                .unwrap_or_default();
            let missing: Vec<&String> =
                self.tags.iter().filter(|t| !declared.contains(t)).collect();
            if !missing.is_empty() {
                violations.push(
                    PolicyViolation::new(
                        "governance.requireTag",
                        snapshot.id.clone(),
                        self.severity,
                        format!("token is missing required tags: {missing:?}"),
                    )
                    .with_details(serde_json::json!({"missingTags": missing})),
                );
            }
        }
        Ok(violations)
    }
}

/// `governance.deprecationHasReplacement` - deprecated tokens must point at
/// a replacement.
pub struct DeprecationHasReplacementRule;

impl PolicyRule for DeprecationHasReplacementRule {
    fn name(&self) -> &'static str {
        "governance.deprecationHasReplacement"
    }

    fn setup(&self, options: Option<&Value>) -> anyhow::Result<Box<dyn PolicyHandler>> {
        Ok(Box::new(DeprecationHandler {
            severity: parse_severity(options, Severity::Error)?,
        }))
    }
}

struct DeprecationHandler {
    severity: Severity,
}

impl PolicyHandler for DeprecationHandler {
    fn evaluate(&self, input: &PolicyInput) -> anyhow::Result<Vec<PolicyViolation>> {
        let mut violations = Vec::new();
        for snapshot in input.snapshots() {
            let deprecation = snapshot
                .metadata
                .as_ref()
                .and_then(|m| m.deprecation.as_ref());
            if let Some(deprecation) = deprecation {
                if deprecation.superseded_by.is_none() {
                    violations.push(PolicyViolation::new(
                        "governance.deprecationHasReplacement",
                        snapshot.id.clone(),
                        self.severity,
                        "deprecated token has no supersededBy pointer",
                    ));
                }
            }
        }
        Ok(violations)
    }
}

/// `governance.requireOverrideApproval` - overriding tokens must carry
/// enough approvals in their governance extension.
pub struct RequireOverrideApprovalRule;

impl PolicyRule for RequireOverrideApprovalRule {
    fn name(&self) -> &'static str {
        "governance.requireOverrideApproval"
    }

    fn setup(&self, options: Option<&Value>) -> anyhow::Result<Box<dyn PolicyHandler>> {
        let minimum = options
            .and_then(|o| o.get("minimumApprovals"))
            .and_then(Value::as_u64)
            .unwrap_or(1) as usize;
        Ok(Box::new(OverrideApprovalHandler {
            extension: extension_key(options),
            minimum,
            severity: parse_severity(options, Severity::Error)?,
        }))
    }
}

struct OverrideApprovalHandler {
    extension: String,
    minimum: usize,
    severity: Severity,
}

impl PolicyHandler for OverrideApprovalHandler {
    fn evaluate(&self, input: &PolicyInput) -> anyhow::Result<Vec<PolicyViolation>> {
        let mut violations = Vec::new();
        for snapshot in input.snapshots() {
            if snapshot.overridden_layers.is_empty() {
                continue;
            }
            let approvals = governance_field(snapshot, &self.extension, "approvedBy")
                .and_then(|v| v.as_array().map(|a| a.len()))
                .unwrap_or(0);
            if approvals < self.minimum {
                violations.push(
                    PolicyViolation::new(
                        "governance.requireOverrideApproval",
                        snapshot.id.clone(),
                        self.severity,
                        format!(
                            "override of {:?} has {approvals} approval(s), {} required",
                            snapshot.overridden_layers, self.minimum
                        ),
                    )
                    .with_details(serde_json::json!({
                        "approvals": approvals,
                        "minimumApprovals": self.minimum,
                        "overriddenLayers": snapshot.overridden_layers,
                    })),
                );
            }
        }
        Ok(violations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AuditConfig, EngineConfig, PolicyEntry, SourceConfig};
    use crate::document::DocumentCache;
    use crate::planner;
    use crate::policy::PolicyEngine;
    use crate::resolver::{self, ResolvedPlan};
    use serde_json::json;
    use std::path::Path;

    struct NoLoader;
    impl crate::document::DocumentLoader for NoLoader {
        fn load(&self, uri: &str) -> anyhow::Result<String> {
            anyhow::bail!("unexpected load of {uri}")
        }
    }

    fn resolve_layers(layers: Vec<(&str, Value)>) -> ResolvedPlan {
        let mut config = EngineConfig::new();
        for (layer, _) in &layers {
            config = config.with_layer(*layer);
        }
        for (layer, document) in layers {
            config = config.with_source(SourceConfig::inline(
                format!("{layer}-tokens"),
                layer,
                document,
            ));
        }
        let plan = planner::plan(&config, Path::new(".")).unwrap();
        resolver::resolve(&plan, &DocumentCache::new(), &NoLoader).unwrap()
    }

    fn audit(name: &str, options: Value) -> AuditConfig {
        AuditConfig::default().with_policy(PolicyEntry::named(name).with_options(options))
    }

    #[test]
    fn require_owner_flags_unowned_tokens() {
        let plan = resolve_layers(vec![(
            "base",
            json!({
                "owned": {
                    "$type": "number",
                    "$value": 1,
                    "$extensions": {"org.dtifx.governance": {"owner": "design-systems"}}
                },
                "orphan": {"$type": "number", "$value": 2}
            }),
        )]);

        let report = PolicyEngine::default()
            .evaluate(&plan, &audit("governance.requireOwner", json!({})))
            .unwrap();
        assert_eq!(report.violations.len(), 1);
        assert_eq!(report.violations[0].pointer, "#/orphan");
    }

    #[test]
    fn require_tag_reports_missing_tags() {
        let plan = resolve_layers(vec![(
            "base",
            json!({
                "x": {"$type": "number", "$value": 1, "$tags": ["core"]}
            }),
        )]);

        let report = PolicyEngine::default()
            .evaluate(
                &plan,
                &audit("governance.requireTag", json!({"tags": ["core", "reviewed"]})),
            )
            .unwrap();
        assert_eq!(report.violations.len(), 1);
        let details = report.violations[0].details.as_ref().unwrap();
        assert_eq!(details["missingTags"], json!(["reviewed"]));
    }

    #[test]
    fn require_tag_rejects_empty_tag_list() {
        let plan = resolve_layers(vec![("base", json!({}))]);
        let err = PolicyEngine::default()
            .evaluate(&plan, &audit("governance.requireTag", json!({"tags": []})))
            .unwrap_err();
        assert_eq!(err.rule, "governance.requireTag");
    }

    #[test]
    fn deprecation_without_replacement_is_flagged() {
        let plan = resolve_layers(vec![(
            "base",
            json!({
                "ok": {"$type": "number", "$value": 1,
                        "$deprecated": {"supersededBy": "#/new"}},
                "bad": {"$type": "number", "$value": 2, "$deprecated": true}
            }),
        )]);

        let report = PolicyEngine::default()
            .evaluate(
                &plan,
                &audit("governance.deprecationHasReplacement", json!({})),
            )
            .unwrap();
        assert_eq!(report.violations.len(), 1);
        assert_eq!(report.violations[0].pointer, "#/bad");
    }

    #[test]
    fn override_without_approvals_is_flagged() {
        let plan = resolve_layers(vec![
            ("base", json!({"x": {"$type": "number", "$value": 1}})),
            ("brand", json!({"x": {"$type": "number", "$value": 2}})),
        ]);

        let report = PolicyEngine::default()
            .evaluate(
                &plan,
                &audit(
                    "governance.requireOverrideApproval",
                    json!({"minimumApprovals": 2}),
                ),
            )
            .unwrap();
        assert_eq!(report.violations.len(), 1);
        let details = report.violations[0].details.as_ref().unwrap();
        assert_eq!(details["minimumApprovals"], json!(2));
    }

    #[test]
    fn approved_override_passes() {
        let plan = resolve_layers(vec![
            ("base", json!({"x": {"$type": "number", "$value": 1}})),
            (
                "brand",
                json!({"x": {
                    "$type": "number",
                    "$value": 2,
                    "$extensions": {"org.dtifx.governance": {"approvedBy": ["lead", "qa"]}}
                }}),
            ),
        ]);

        let report = PolicyEngine::default()
            .evaluate(
                &plan,
                &audit(
                    "governance.requireOverrideApproval",
                    json!({"minimumApprovals": 2}),
                ),
            )
            .unwrap();
        assert!(report.violations.is_empty());
    }
}
