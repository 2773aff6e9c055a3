//! End-to-end pipeline scenarios against the public API.

use std::sync::Arc;

use dtifx_engine::{
    CancellationToken, EngineConfig, FormatterInstanceConfig, JsonPointer, SourceConfig,
    TokenEngine, TransformEntry,
};
use serde_json::json;
use tempfile::TempDir;

fn base_brand_config() -> EngineConfig {
    EngineConfig::new()
        .with_layer("base")
        .with_layer("brand")
        .with_source(SourceConfig::inline(
            "base-tokens",
            "base",
            json!({"color": {"primary": {
                "$type": "color",
                "$value": {"colorSpace": "srgb", "components": [0.1, 0.2, 0.3]}
            }}}),
        ))
        .with_source(SourceConfig::inline(
            "brand-tokens",
            "brand",
            json!({"color": {"primary": {
                "$type": "color",
                "$value": {"colorSpace": "srgb", "components": [0.5, 0.5, 0.5]}
            }}}),
        ))
}

#[tokio::test]
async fn two_layer_override_keeps_the_brand_value() {
    let dir = TempDir::new().unwrap();
    let engine = TokenEngine::new(dir.path());

    let report = engine
        .build(&base_brand_config(), &CancellationToken::new())
        .await
        .unwrap();

    let snapshot = report
        .resolved
        .tokens
        .get(&JsonPointer::parse("#/color/primary"))
        .expect("merged snapshot");
    assert_eq!(snapshot.provenance.layer, "brand");
    assert_eq!(snapshot.provenance.layer_index, 1);
    assert_eq!(
        snapshot.value().unwrap()["components"],
        json!([0.5, 0.5, 0.5])
    );
    // Exactly one terminal snapshot survives the merge.
    assert_eq!(report.resolved.tokens.len(), 1);
}

#[tokio::test]
async fn alias_across_documents_resolves_with_provenance() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("A.json"),
        json!({"color": {"alias": {"$ref": "B.json#/color/base"}}}).to_string(),
    )
    .unwrap();
    std::fs::write(
        dir.path().join("B.json"),
        json!({"color": {"base": {
            "$type": "color",
            "$value": {"colorSpace": "srgb", "components": [0.1, 0.2, 0.3], "hex": "#1A334C"}
        }}})
        .to_string(),
    )
    .unwrap();

    let config = EngineConfig::new().with_layer("base").with_source(
        SourceConfig::file("a-tokens", "base", vec!["A.json".to_string()]),
    );

    let engine = TokenEngine::new(dir.path());
    let report = engine
        .build(&config, &CancellationToken::new())
        .await
        .unwrap();
    assert!(report.resolved.diagnostics.is_empty(), "{:?}", report.resolved.diagnostics);

    let alias = report
        .resolved
        .tokens
        .get(&JsonPointer::parse("#/color/alias"))
        .unwrap();
    assert_eq!(alias.value().unwrap()["hex"], json!("#1A334C"));

    assert_eq!(alias.references.len(), 1);
    assert!(alias.references[0].external);
    assert_eq!(alias.references[0].uri, "B.json");
    assert_eq!(
        alias.references[0].pointer,
        JsonPointer::parse("#/color/base")
    );

    assert_eq!(alias.resolution_path.len(), 2);
    assert_eq!(
        alias.resolution_path[1].pointer,
        JsonPointer::parse("#/color/base")
    );
    assert_eq!(alias.resolution_path[1].uri, "B.json");
}

#[tokio::test]
async fn identical_inputs_produce_identical_artifacts() {
    let config = base_brand_config()
        .with_transform(TransformEntry::named("css/value"))
        .with_formatter(FormatterInstanceConfig::named("css"))
        .with_formatter(FormatterInstanceConfig::named("json"));

    let dir_a = TempDir::new().unwrap();
    let engine_a = TokenEngine::new(dir_a.path());
    let report_a = engine_a
        .build(&config, &CancellationToken::new())
        .await
        .unwrap();

    let dir_b = TempDir::new().unwrap();
    let engine_b = TokenEngine::new(dir_b.path());
    let report_b = engine_b
        .build(&config, &CancellationToken::new())
        .await
        .unwrap();

    let bytes = |report: &dtifx_engine::BuildReport| -> Vec<Vec<u8>> {
        report
            .written
            .values()
            .flatten()
            .map(|path| std::fs::read(path).unwrap())
            .collect()
    };
    assert_eq!(bytes(&report_a), bytes(&report_b));
}

#[tokio::test]
async fn higher_layer_addition_changes_only_the_overridden_pointers() {
    let dir = TempDir::new().unwrap();
    let engine = TokenEngine::new(dir.path());

    let base_only = EngineConfig::new()
        .with_layer("base")
        .with_source(SourceConfig::inline(
            "base-tokens",
            "base",
            json!({
                "color": {
                    "primary": {"$type": "color", "$value": "#111111"},
                    "accent": {"$type": "color", "$value": "#222222"}
                }
            }),
        ));

    let with_override = EngineConfig::new()
        .with_layer("base")
        .with_layer("brand")
        .with_source(SourceConfig::inline(
            "base-tokens",
            "base",
            json!({
                "color": {
                    "primary": {"$type": "color", "$value": "#111111"},
                    "accent": {"$type": "color", "$value": "#222222"}
                }
            }),
        ))
        .with_source(SourceConfig::inline(
            "brand-tokens",
            "brand",
            json!({"color": {"primary": {"$type": "color", "$value": "#333333"}}}),
        ));

    let before = engine
        .build(&base_only, &CancellationToken::new())
        .await
        .unwrap();
    let after = engine
        .build(&with_override, &CancellationToken::new())
        .await
        .unwrap();

    let accent_before = before
        .resolved
        .tokens
        .get(&JsonPointer::parse("#/color/accent"))
        .unwrap();
    let accent_after = after
        .resolved
        .tokens
        .get(&JsonPointer::parse("#/color/accent"))
        .unwrap();
    assert_eq!(accent_before.value(), accent_after.value());
    assert_eq!(accent_before.provenance.layer, accent_after.provenance.layer);

    let primary_after = after
        .resolved
        .tokens
        .get(&JsonPointer::parse("#/color/primary"))
        .unwrap();
    assert_eq!(primary_after.value().unwrap(), json!("#333333"));
}

#[tokio::test]
async fn json_formatter_round_trips_byte_identically() {
    let dir = TempDir::new().unwrap();
    let engine = TokenEngine::new(dir.path());

    let config = base_brand_config()
        .with_formatter(FormatterInstanceConfig::named("json").with_output("snapshot"));
    let report = engine
        .build(&config, &CancellationToken::new())
        .await
        .unwrap();
    let first_path = report.written.values().next().unwrap()[0].clone();
    let first_bytes = std::fs::read(&first_path).unwrap();

    // Feed the emitted document back in as the only source.
    let document: serde_json::Value =
        serde_json::from_slice(&first_bytes).expect("emitted snapshot parses");
    let round_trip_config = EngineConfig::new()
        .with_layer("base")
        .with_source(SourceConfig::inline("round-trip", "base", document))
        .with_formatter(FormatterInstanceConfig::named("json").with_output("snapshot2"));

    let second = engine
        .build(&round_trip_config, &CancellationToken::new())
        .await
        .unwrap();
    let second_path = second.written.values().next().unwrap()[0].clone();
    let second_bytes = std::fs::read(&second_path).unwrap();

    assert_eq!(first_bytes, second_bytes);
}

#[tokio::test]
async fn alias_cycles_terminate_with_one_diagnostic_per_cycle() {
    let dir = TempDir::new().unwrap();
    let engine = TokenEngine::new(dir.path());

    let config = EngineConfig::new()
        .with_layer("base")
        .with_source(SourceConfig::inline(
            "cyclic",
            "base",
            json!({
                "a": {"$ref": "#/b"},
                "b": {"$ref": "#/a"},
                "ok": {"$type": "number", "$value": 7}
            }),
        ));

    let report = engine
        .build(&config, &CancellationToken::new())
        .await
        .unwrap();

    let cycles = report
        .resolved
        .diagnostics
        .iter()
        .filter(|d| d.code == "CYCLE_DETECTED")
        .count();
    assert_eq!(cycles, 1);

    // The run completed and the healthy token still resolved.
    let ok = report
        .resolved
        .tokens
        .get(&JsonPointer::parse("#/ok"))
        .unwrap();
    assert_eq!(ok.value().unwrap(), json!(7));
}

#[tokio::test]
async fn multi_platform_build_writes_every_formatter_output() {
    let dir = TempDir::new().unwrap();
    let engine = TokenEngine::new(dir.path());

    let config = EngineConfig::new()
        .with_layer("base")
        .with_source(SourceConfig::inline(
            "tokens",
            "base",
            json!({
                "color": {"primary": {"$type": "color", "$value": "#336699"}},
                "spacing": {"md": {"$type": "dimension", "$value": {"value": 16, "unit": "px"}}}
            }),
        ))
        .with_transform(TransformEntry::named("web/base"))
        .with_transform(TransformEntry::named("css/value"))
        .with_transform(TransformEntry::named("ios/swiftui"))
        .with_transform(TransformEntry::named("android/material"))
        .with_transform(TransformEntry::named("android/compose"))
        .with_formatter(FormatterInstanceConfig::named("css"))
        .with_formatter(FormatterInstanceConfig::named("swiftui"))
        .with_formatter(FormatterInstanceConfig::named("android-resources"))
        .with_formatter(FormatterInstanceConfig::named("compose"))
        .with_formatter(FormatterInstanceConfig::named("js-module"))
        .with_formatter(FormatterInstanceConfig::named("html-docs"));

    let report = engine
        .build(&config, &CancellationToken::new())
        .await
        .unwrap();

    // Six executions, all with artifacts on disk.
    assert_eq!(report.format.executions.len(), 6);
    assert_eq!(report.written.len(), 6);
    let all_paths: Vec<String> = report
        .written
        .values()
        .flatten()
        .map(|p| p.display().to_string())
        .collect();
    assert!(all_paths.iter().any(|p| p.ends_with("tokens.css")));
    assert!(all_paths.iter().any(|p| p.ends_with("DesignTokens.swift")));
    assert!(all_paths.iter().any(|p| p.ends_with("colors.xml")));
    assert!(all_paths.iter().any(|p| p.ends_with("DesignTokens.kt")));
    assert!(all_paths.iter().any(|p| p.ends_with("tokens.d.ts")));
    assert!(all_paths.iter().any(|p| p.ends_with("index.html")));
}

#[tokio::test]
async fn engine_is_shareable_across_tasks() {
    let dir = TempDir::new().unwrap();
    let engine = Arc::new(TokenEngine::new(dir.path()));
    let config = base_brand_config();

    let engine2 = engine.clone();
    let config2 = config.clone();
    let handle = tokio::spawn(async move {
        engine2
            .build(&config2, &CancellationToken::new())
            .await
            .map(|report| report.resolved.tokens.len())
    });

    let local = engine
        .build(&config, &CancellationToken::new())
        .await
        .unwrap();
    let remote = handle.await.unwrap().unwrap();
    assert_eq!(local.resolved.tokens.len(), remote);
}
