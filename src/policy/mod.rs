//! Policy engine - declarative governance over resolved snapshots
//!
//! Rules are registered by name, configured through `setup` (fatal on
//! failure), and evaluated in configuration order; violations come back in
//! snapshot order. A handler that errors at runtime is captured as a
//! violation of that rule rather than aborting the audit.

pub mod contrast;
pub mod governance;
pub mod report;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use crate::config::AuditConfig;
use crate::diagnostics::Severity;
use crate::error::PolicyConfigurationError;
use crate::model::{JsonPointer, TokenSnapshot};
use crate::resolver::ResolvedPlan;

pub use report::{AuditReportOutput, AuditReporter, RenderedReport};

/// One governance violation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyViolation {
    pub policy_name: String,

    /// Canonical pointer of the offending snapshot.
    pub pointer: String,

    pub severity: Severity,

    pub message: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl PolicyViolation {
    pub fn new(
        policy_name: impl Into<String>,
        pointer: impl Into<String>,
        severity: Severity,
        message: impl Into<String>,
    ) -> Self {
        Self {
            policy_name: policy_name.into(),
            pointer: pointer.into(),
            severity,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// Snapshot access handed to rule handlers.
pub struct PolicyInput<'a> {
    plan: &'a ResolvedPlan,
}

impl<'a> PolicyInput<'a> {
    /// Snapshots in lexicographic pointer order.
    pub fn snapshots(&self) -> impl Iterator<Item = &'a TokenSnapshot> {
        self.plan.tokens.iter()
    }

    /// Pointer-indexed accessor.
    pub fn get(&self, pointer: &JsonPointer) -> Option<&'a TokenSnapshot> {
        self.plan.tokens.get(pointer)
    }

    pub fn token_count(&self) -> usize {
        self.plan.tokens.len()
    }
}

/// A configured rule ready to evaluate.
pub trait PolicyHandler: Send + Sync {
    fn evaluate(&self, input: &PolicyInput) -> anyhow::Result<Vec<PolicyViolation>>;
}

/// A registered rule: name plus a setup step that validates options.
pub trait PolicyRule: Send + Sync {
    fn name(&self) -> &'static str;

    /// Validate options and build the handler. Errors here are fatal.
    fn setup(&self, options: Option<&Value>) -> anyhow::Result<Box<dyn PolicyHandler>>;
}

/// Registry of compiled-in rules.
pub struct PolicyRegistry {
    rules: Vec<Arc<dyn PolicyRule>>,
}

impl Default for PolicyRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl PolicyRegistry {
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(governance::RequireOwnerRule));
        registry.register(Arc::new(governance::RequireTagRule));
        registry.register(Arc::new(governance::DeprecationHasReplacementRule));
        registry.register(Arc::new(governance::RequireOverrideApprovalRule));
        registry.register(Arc::new(contrast::WcagContrastRule));
        registry
    }

    pub fn register(&mut self, rule: Arc<dyn PolicyRule>) {
        self.rules.push(rule);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn PolicyRule>> {
        self.rules.iter().find(|r| r.name() == name).cloned()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name()).collect()
    }
}

/// Aggregated audit counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicySummary {
    pub policy_count: usize,
    pub violation_count: usize,
    pub errors: usize,
    pub warnings: usize,
    pub infos: usize,
    pub token_count: usize,
}

impl PolicySummary {
    /// Highest severity present, if any violations exist.
    pub fn highest_severity(&self) -> Option<Severity> {
        if self.errors > 0 {
            Some(Severity::Error)
        } else if self.warnings > 0 {
            Some(Severity::Warn)
        } else if self.infos > 0 {
            Some(Severity::Info)
        } else {
            None
        }
    }
}

/// Result of one audit pass.
#[derive(Debug, Clone, Default)]
pub struct PolicyReport {
    /// Violations in rule-then-snapshot order.
    pub violations: Vec<PolicyViolation>,

    pub summary: PolicySummary,

    pub duration_ms: u64,
}

/// The policy engine.
pub struct PolicyEngine {
    registry: PolicyRegistry,
}

impl Default for PolicyEngine {
    fn default() -> Self {
        Self::new(PolicyRegistry::with_builtins())
    }
}

impl PolicyEngine {
    pub fn new(registry: PolicyRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &PolicyRegistry {
        &self.registry
    }

    /// Evaluate every configured policy over the resolved plan.
    pub fn evaluate(
        &self,
        plan: &ResolvedPlan,
        audit: &AuditConfig,
    ) -> Result<PolicyReport, PolicyConfigurationError> {
        let start = Instant::now();
        let input = PolicyInput { plan };

        // Setup first: any configuration failure aborts before evaluation.
        let mut handlers = Vec::with_capacity(audit.policies.len());
        for entry in &audit.policies {
            let rule = self.registry.get(&entry.name).ok_or_else(|| {
                PolicyConfigurationError {
                    rule: entry.name.clone(),
                    message: "unknown policy rule".to_string(),
                }
            })?;
            let handler = rule.setup(entry.options.as_ref()).map_err(|err| {
                PolicyConfigurationError {
                    rule: entry.name.clone(),
                    message: format!("{err:#}"),
                }
            })?;
            handlers.push((entry.name.clone(), handler));
        }

        let mut violations = Vec::new();
        for (name, handler) in &handlers {
            match handler.evaluate(&input) {
                Ok(mut rule_violations) => violations.append(&mut rule_violations),
                Err(err) => {
                    // Runtime failures are captured, not thrown.
                    violations.push(PolicyViolation::new(
                        name.clone(),
                        "#/",
                        Severity::Error,
                        format!("policy handler failed: {err:#}"),
                    ));
                }
            }
        }

        let mut severity_counts: BTreeMap<Severity, usize> = BTreeMap::new();
        for violation in &violations {
            *severity_counts.entry(violation.severity).or_default() += 1;
        }

        let summary = PolicySummary {
            policy_count: handlers.len(),
            violation_count: violations.len(),
            errors: severity_counts.get(&Severity::Error).copied().unwrap_or(0),
            warnings: severity_counts.get(&Severity::Warn).copied().unwrap_or(0),
            infos: severity_counts.get(&Severity::Info).copied().unwrap_or(0),
            token_count: input.token_count(),
        };

        tracing::debug!(
            policies = summary.policy_count,
            violations = summary.violation_count,
            errors = summary.errors,
            "policy evaluation complete"
        );

        Ok(PolicyReport {
            violations,
            summary,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EngineConfig, PolicyEntry, SourceConfig};
    use crate::document::DocumentCache;
    use crate::planner;
    use crate::resolver;
    use serde_json::json;
    use std::path::Path;

    struct NoLoader;
    impl crate::document::DocumentLoader for NoLoader {
        fn load(&self, uri: &str) -> anyhow::Result<String> {
            anyhow::bail!("unexpected load of {uri}")
        }
    }

    fn resolved_plan(document: Value) -> ResolvedPlan {
        let config = EngineConfig::new()
            .with_layer("base")
            .with_source(SourceConfig::inline("tokens", "base", document));
        let plan = planner::plan(&config, Path::new(".")).unwrap();
        resolver::resolve(&plan, &DocumentCache::new(), &NoLoader).unwrap()
    }

    struct PanickyRule;
    impl PolicyRule for PanickyRule {
        fn name(&self) -> &'static str {
            "test.panicky"
        }
        fn setup(&self, _options: Option<&Value>) -> anyhow::Result<Box<dyn PolicyHandler>> {
            Ok(Box::new(PanickyHandler))
        }
    }
    struct PanickyHandler;
    impl PolicyHandler for PanickyHandler {
        fn evaluate(&self, _input: &PolicyInput) -> anyhow::Result<Vec<PolicyViolation>> {
            anyhow::bail!("handler exploded")
        }
    }

    struct BrokenSetupRule;
    impl PolicyRule for BrokenSetupRule {
        fn name(&self) -> &'static str {
            "test.brokenSetup"
        }
        fn setup(&self, _options: Option<&Value>) -> anyhow::Result<Box<dyn PolicyHandler>> {
            anyhow::bail!("bad options")
        }
    }

    #[test]
    fn unknown_rule_is_a_configuration_error() {
        let plan = resolved_plan(json!({}));
        let engine = PolicyEngine::default();
        let audit = AuditConfig::default().with_policy(PolicyEntry::named("governance.psychic"));
        let err = engine.evaluate(&plan, &audit).unwrap_err();
        assert_eq!(err.rule, "governance.psychic");
    }

    #[test]
    fn setup_failure_aborts_with_the_rule_name() {
        let plan = resolved_plan(json!({}));
        let mut registry = PolicyRegistry::empty();
        registry.register(Arc::new(BrokenSetupRule));
        let engine = PolicyEngine::new(registry);
        let audit = AuditConfig::default().with_policy(PolicyEntry::named("test.brokenSetup"));
        let err = engine.evaluate(&plan, &audit).unwrap_err();
        assert_eq!(err.rule, "test.brokenSetup");
        assert!(err.message.contains("bad options"));
    }

    #[test]
    fn handler_runtime_error_is_captured_as_a_violation() {
        let plan = resolved_plan(json!({"x": {"$type": "number", "$value": 1}}));
        let mut registry = PolicyRegistry::empty();
        registry.register(Arc::new(PanickyRule));
        let engine = PolicyEngine::new(registry);
        let audit = AuditConfig::default().with_policy(PolicyEntry::named("test.panicky"));

        let report = engine.evaluate(&plan, &audit).unwrap();
        assert_eq!(report.violations.len(), 1);
        assert!(report.violations[0].message.contains("handler exploded"));
        assert_eq!(report.summary.errors, 1);
    }

    #[test]
    fn summary_counts_severities_and_tokens() {
        let plan = resolved_plan(json!({
            "a": {"$type": "number", "$value": 1},
            "b": {"$type": "number", "$value": 2}
        }));
        let engine = PolicyEngine::default();
        let audit = AuditConfig::default().with_policy(
            PolicyEntry::named("governance.requireOwner")
                .with_options(json!({"severity": "warn"})),
        );

        let report = engine.evaluate(&plan, &audit).unwrap();
        assert_eq!(report.summary.policy_count, 1);
        assert_eq!(report.summary.token_count, 2);
        assert_eq!(report.summary.warnings, 2);
        assert_eq!(report.summary.highest_severity(), Some(Severity::Warn));
    }
}
