//! Incremental rebuild and audit workflow scenarios.

use dtifx_engine::deps::{DependencySnapshot, DependencyStore};
use dtifx_engine::{
    AuditConfig, CancellationToken, DependencyConfig, EngineConfig, PolicyEntry, ReportConfig,
    SourceConfig, TokenEngine,
};
use serde_json::json;
use tempfile::TempDir;

fn tokens_config(value: i64) -> EngineConfig {
    EngineConfig::new()
        .with_layer("base")
        .with_source(SourceConfig::inline(
            "tokens",
            "base",
            json!({"tokens": {"a": {"$type": "number", "$value": value},
                               "b": {"$type": "number", "$value": 99}}}),
        ))
        .with_dependencies(DependencyConfig::snapshot(".dtifx/deps.json"))
}

#[tokio::test]
async fn mutated_token_is_the_only_changed_pointer() {
    let dir = TempDir::new().unwrap();
    let engine = TokenEngine::new(dir.path());

    // Initial commit of S0.
    let first = engine
        .build(&tokens_config(1), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(first.dependencies.as_ref().unwrap().delta.changed.len(), 2);

    // Second run with #/tokens/a mutated.
    let second = engine
        .build(&tokens_config(2), &CancellationToken::new())
        .await
        .unwrap();
    let delta = &second.dependencies.as_ref().unwrap().delta;
    assert_eq!(
        delta.changed.iter().collect::<Vec<_>>(),
        vec!["#/tokens/a"]
    );
    assert!(delta.removed.is_empty());

    // After the commit, an identical run reports empty sets.
    let third = engine
        .build(&tokens_config(2), &CancellationToken::new())
        .await
        .unwrap();
    assert!(third.dependencies.as_ref().unwrap().delta.is_empty());
}

#[tokio::test]
async fn removed_tokens_are_reported_on_the_next_run() {
    let dir = TempDir::new().unwrap();
    let engine = TokenEngine::new(dir.path());

    engine
        .build(&tokens_config(1), &CancellationToken::new())
        .await
        .unwrap();

    let shrunk = EngineConfig::new()
        .with_layer("base")
        .with_source(SourceConfig::inline(
            "tokens",
            "base",
            json!({"tokens": {"a": {"$type": "number", "$value": 1}}}),
        ))
        .with_dependencies(DependencyConfig::snapshot(".dtifx/deps.json"));

    let report = engine
        .build(&shrunk, &CancellationToken::new())
        .await
        .unwrap();
    let delta = &report.dependencies.as_ref().unwrap().delta;
    assert_eq!(delta.removed.iter().collect::<Vec<_>>(), vec!["#/tokens/b"]);
}

#[tokio::test]
async fn alias_dependents_change_when_their_target_changes() {
    let dir = TempDir::new().unwrap();
    let store = DependencyStore::new(dir.path().join("deps.json"));

    let config = |hex: &str| {
        EngineConfig::new()
            .with_layer("base")
            .with_source(SourceConfig::inline(
                "tokens",
                "base",
                json!({
                    "color": {
                        "base": {"$type": "color", "$value": hex},
                        "panel": {"$type": "shadow", "$value": {
                            "offsetX": {"value": 0, "unit": "px"},
                            "offsetY": {"value": 2, "unit": "px"},
                            "blur": {"value": 4, "unit": "px"},
                            "color": {"$ref": "#/color/base"}
                        }}
                    }
                }),
            ))
    };

    let engine = TokenEngine::new(dir.path());
    let first = engine
        .build(&config("#111111"), &CancellationToken::new())
        .await
        .unwrap();
    let snapshot = DependencySnapshot::capture(&first.resolved);
    store.commit(&snapshot).await.unwrap();

    let second = engine
        .build(&config("#222222"), &CancellationToken::new())
        .await
        .unwrap();
    let current = DependencySnapshot::capture(&second.resolved);
    let delta = store.evaluate(&current).await.unwrap();

    assert!(delta.changed.contains("#/color/base"));
    // The shadow's resolved value embeds the referenced color, and its
    // dependency edge reinforces the propagation.
    assert!(delta.changed.contains("#/color/panel"));
}

#[tokio::test]
async fn contrast_audit_reports_the_expected_violation() {
    let dir = TempDir::new().unwrap();
    let engine = TokenEngine::new(dir.path());

    let config = EngineConfig::new()
        .with_layer("base")
        .with_source(SourceConfig::inline(
            "tokens",
            "base",
            json!({
                "color": {
                    "fg": {"$type": "color", "$value": {"colorSpace": "srgb", "components": [0, 0, 0]}},
                    "bg": {"$type": "color", "$value": {"colorSpace": "srgb", "components": [0.5, 0.5, 0.5]}}
                }
            }),
        ))
        .with_audit(
            AuditConfig::default()
                .with_policy(PolicyEntry::named("governance.wcagContrast").with_options(
                    json!({"pairs": [{
                        "foreground": "#/color/fg",
                        "background": "#/color/bg",
                        "minimum": 7.0
                    }]}),
                )),
        );

    let report = engine
        .audit(&config, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.policy.summary.violation_count, 1);
    let violation = &report.policy.violations[0];
    assert_eq!(violation.policy_name, "governance.wcagContrast");
    let details = violation.details.as_ref().unwrap();
    assert_eq!(details["reason"], json!("contrast-below-threshold"));
    assert!(details["ratio"].as_f64().unwrap() < 7.0);
    assert!(report.failed());
}

#[tokio::test]
async fn audit_report_formats_dedupe_and_render() {
    let dir = TempDir::new().unwrap();
    let engine = TokenEngine::new(dir.path());

    let config = EngineConfig::new()
        .with_layer("base")
        .with_source(SourceConfig::inline(
            "tokens",
            "base",
            json!({"x": {"$type": "number", "$value": 1}}),
        ))
        .with_audit(AuditConfig {
            policies: vec![PolicyEntry::named("governance.requireOwner")],
            report: Some(ReportConfig {
                formats: vec![
                    "markdown".into(),
                    "html".into(),
                    "human".into(),
                    "markdown".into(),
                ],
                fail_on: None,
            }),
        });

    let report = engine
        .audit(&config, &CancellationToken::new())
        .await
        .unwrap();
    let rendered = report.rendered.as_ref().unwrap();

    let formats: Vec<&str> = rendered
        .rendered
        .iter()
        .map(|r| r.format.as_str())
        .collect();
    assert_eq!(formats, vec!["markdown", "html", "human"]);
    assert!(rendered.failed);
}
