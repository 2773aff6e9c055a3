//! DTIF document flattening
//!
//! Walks a parsed document tree and produces one snapshot per token node. A
//! node is a token when it carries `$value` or `$ref`; everything else is a
//! group. `$type` inherits downward through groups until a token or a more
//! specific tag overrides it.

use serde_json::Value;

use crate::diagnostics::{codes, Diagnostic};
use crate::document::DtifDocument;
use crate::model::{
    DeprecationRecord, JsonPointer, Provenance, TokenMetadata, TokenReference, TokenSet,
    TokenSnapshot, TokenType,
};
use crate::planner::SourcePlanEntry;

/// Flatten one document into a per-source token set.
pub fn flatten_document(
    document: &DtifDocument,
    entry: &SourcePlanEntry,
) -> (TokenSet, Vec<Diagnostic>) {
    let mut tokens = TokenSet::new();
    let mut diagnostics = Vec::new();

    let provenance = Provenance {
        source_id: entry.id.clone(),
        layer: entry.layer.clone(),
        layer_index: entry.layer_index,
        uri: document.uri.clone(),
        pointer_prefix: entry.pointer_prefix.clone(),
    };

    walk(
        &document.content,
        entry.pointer_prefix.clone(),
        None,
        &provenance,
        &document.uri,
        &mut tokens,
        &mut diagnostics,
    );

    (tokens, diagnostics)
}

fn walk(
    node: &Value,
    pointer: JsonPointer,
    inherited_type: Option<TokenType>,
    provenance: &Provenance,
    uri: &str,
    tokens: &mut TokenSet,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let map = match node.as_object() {
        Some(map) => map,
        None => {
            // A bare scalar outside a token node has no meaning in DTIF.
            if !pointer.is_empty() {
                diagnostics.push(
                    Diagnostic::warn(
                        codes::MALFORMED_TOKEN,
                        "expected an object node; scalar found outside a token",
                    )
                    .with_pointer(pointer)
                    .with_uri(uri),
                );
            }
            return;
        }
    };

    let declared_type = match map.get("$type").and_then(Value::as_str) {
        Some(tag) => match TokenType::parse(tag) {
            Some(parsed) => Some(parsed),
            None => {
                diagnostics.push(
                    Diagnostic::warn(codes::UNKNOWN_TYPE, format!("unknown token type '{tag}'"))
                        .with_pointer(pointer.clone())
                        .with_uri(uri),
                );
                None
            }
        },
        None => None,
    };
    let effective_type = declared_type.or(inherited_type);

    let is_token = map.contains_key("$value") || map.contains_key("$ref");
    if is_token {
        let snapshot = build_token(map, pointer, effective_type, provenance, uri, diagnostics);
        tokens.insert(snapshot);
        return;
    }

    for (key, child) in map {
        if key.starts_with('$') {
            continue;
        }
        walk(
            child,
            pointer.child(key.clone()),
            effective_type,
            provenance,
            uri,
            tokens,
            diagnostics,
        );
    }
}

fn build_token(
    map: &serde_json::Map<String, Value>,
    pointer: JsonPointer,
    token_type: Option<TokenType>,
    provenance: &Provenance,
    uri: &str,
    diagnostics: &mut Vec<Diagnostic>,
) -> TokenSnapshot {
    // Alias tokens keep the whole `$ref` object as their raw literal so the
    // pre-resolution form survives on the snapshot.
    let raw = if let Some(reference) = map.get("$ref") {
        serde_json::json!({ "$ref": reference.clone() })
    } else {
        map.get("$value").cloned().unwrap_or(Value::Null)
    };

    let mut snapshot = TokenSnapshot::parsed(pointer.clone(), raw, provenance.clone());
    snapshot.token_type = token_type;
    snapshot.description = map.get("$description").and_then(Value::as_str).map(String::from);

    if let Some(reference) = map.get("$ref") {
        match reference.as_str() {
            Some(target) => {
                let (target_uri, target_pointer) = split_reference(target, uri);
                snapshot.references.push(TokenReference {
                    external: target_uri != uri,
                    uri: target_uri,
                    pointer: target_pointer,
                });
            }
            None => {
                diagnostics.push(
                    Diagnostic::error(codes::MALFORMED_TOKEN, "$ref must be a string pointer")
                        .with_pointer(pointer.clone())
                        .with_uri(uri),
                );
            }
        }
    }

    let metadata = build_metadata(map, uri, &pointer, diagnostics);
    if let Some(metadata) = metadata {
        snapshot.metadata = Some(metadata);
    }

    snapshot
}

fn build_metadata(
    map: &serde_json::Map<String, Value>,
    uri: &str,
    pointer: &JsonPointer,
    diagnostics: &mut Vec<Diagnostic>,
) -> Option<TokenMetadata> {
    let description = map.get("$description").and_then(Value::as_str);
    let extensions = map.get("$extensions");
    let deprecated = map.get("$deprecated");
    let tags = map.get("$tags");
    let author = map.get("$author").and_then(Value::as_str);

    if description.is_none()
        && extensions.is_none()
        && deprecated.is_none()
        && tags.is_none()
        && author.is_none()
    {
        return None;
    }

    let mut metadata = TokenMetadata::new();
    metadata.description = description.map(String::from);
    metadata.author = author.map(String::from);

    if let Some(extensions) = extensions {
        match extensions.as_object() {
            Some(entries) => {
                for (key, value) in entries {
                    metadata.set_extension(key.clone(), value);
                }
            }
            None => {
                diagnostics.push(
                    Diagnostic::warn(codes::MALFORMED_TOKEN, "$extensions must be an object")
                        .with_pointer(pointer.clone())
                        .with_uri(uri),
                );
            }
        }
    }

    if let Some(tags) = tags.and_then(Value::as_array) {
        metadata.tags = tags
            .iter()
            .filter_map(Value::as_str)
            .map(String::from)
            .collect();
    }

    if let Some(deprecated) = deprecated {
        metadata.deprecation = Some(parse_deprecation(deprecated));
    }

    Some(metadata)
}

fn parse_deprecation(value: &Value) -> DeprecationRecord {
    match value {
        Value::Bool(_) => DeprecationRecord::default(),
        Value::String(reason) => DeprecationRecord {
            reason: Some(reason.clone()),
            superseded_by: None,
        },
        Value::Object(map) => DeprecationRecord {
            reason: map.get("reason").and_then(Value::as_str).map(String::from),
            superseded_by: map
                .get("supersededBy")
                .and_then(Value::as_str)
                .map(|p| JsonPointer::parse(p).encoded().to_string()),
        },
        _ => DeprecationRecord::default(),
    }
}

/// Split a `$ref` target into `(document uri, pointer)`.
///
/// `B.json#/color/base` is external; `#/color/base` stays in `own_uri`.
pub fn split_reference(target: &str, own_uri: &str) -> (String, JsonPointer) {
    match target.split_once('#') {
        Some((uri, pointer)) if !uri.is_empty() => {
            (uri.to_string(), JsonPointer::parse(pointer))
        }
        Some((_, pointer)) => (own_uri.to_string(), JsonPointer::parse(pointer)),
        None => (own_uri.to_string(), JsonPointer::parse(target)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry() -> SourcePlanEntry {
        SourcePlanEntry {
            id: "base".into(),
            layer: "base".into(),
            layer_index: 0,
            pointer_prefix: JsonPointer::root(),
            uri: "tokens.json".into(),
            context: None,
            document: None,
            required: true,
        }
    }

    fn document(content: Value) -> DtifDocument {
        DtifDocument {
            uri: "tokens.json".into(),
            content,
            content_hash: "test".into(),
        }
    }

    #[test]
    fn flattens_nested_groups() {
        let doc = document(json!({
            "color": {
                "primary": {"$type": "color", "$value": "#336699"},
                "accent": {"$type": "color", "$value": "#FF0000"}
            },
            "spacing": {
                "md": {"$type": "dimension", "$value": {"value": 16, "unit": "px"}}
            }
        }));

        let (tokens, diagnostics) = flatten_document(&doc, &entry());
        assert!(diagnostics.is_empty());
        let ids: Vec<&str> = tokens.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(
            ids,
            vec!["#/color/accent", "#/color/primary", "#/spacing/md"]
        );
    }

    #[test]
    fn type_inherits_from_groups() {
        let doc = document(json!({
            "color": {
                "$type": "color",
                "primary": {"$value": "#336699"},
                "special": {"$type": "gradient", "$value": []}
            }
        }));

        let (tokens, _) = flatten_document(&doc, &entry());
        let primary = tokens.get(&JsonPointer::parse("#/color/primary")).unwrap();
        assert_eq!(primary.token_type, Some(TokenType::Color));
        let special = tokens.get(&JsonPointer::parse("#/color/special")).unwrap();
        assert_eq!(special.token_type, Some(TokenType::Gradient));
    }

    #[test]
    fn alias_records_reference_and_keeps_ref_raw() {
        let doc = document(json!({
            "color": {
                "alias": {"$ref": "B.json#/color/base"},
                "local": {"$ref": "#/color/alias"}
            }
        }));

        let (tokens, _) = flatten_document(&doc, &entry());
        let alias = tokens.get(&JsonPointer::parse("#/color/alias")).unwrap();
        assert_eq!(alias.references.len(), 1);
        assert!(alias.references[0].external);
        assert_eq!(alias.references[0].uri, "B.json");
        assert_eq!(alias.raw(), json!({"$ref": "B.json#/color/base"}));

        let local = tokens.get(&JsonPointer::parse("#/color/local")).unwrap();
        assert!(!local.references[0].external);
        assert_eq!(local.references[0].uri, "tokens.json");
    }

    #[test]
    fn pointer_prefix_is_applied() {
        let mut e = entry();
        e.pointer_prefix = JsonPointer::parse("#/brand");
        let doc = document(json!({
            "color": {"primary": {"$type": "color", "$value": "#fff"}}
        }));

        let (tokens, _) = flatten_document(&doc, &e);
        assert!(tokens.contains(&JsonPointer::parse("#/brand/color/primary")));
    }

    #[test]
    fn unknown_type_keeps_token_untyped_with_warning() {
        let doc = document(json!({
            "x": {"$type": "wavelength", "$value": 42}
        }));

        let (tokens, diagnostics) = flatten_document(&doc, &entry());
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].code, codes::UNKNOWN_TYPE);
        let token = tokens.get(&JsonPointer::parse("#/x")).unwrap();
        assert_eq!(token.token_type, None);
    }

    #[test]
    fn metadata_extensions_and_deprecation() {
        let doc = document(json!({
            "old": {
                "$type": "color",
                "$value": "#000",
                "$description": "legacy ink",
                "$extensions": {"com.example.governance": {"owner": "core"}},
                "$deprecated": {"reason": "renamed", "supersededBy": "#/ink"}
            }
        }));

        let (tokens, _) = flatten_document(&doc, &entry());
        let token = tokens.get(&JsonPointer::parse("#/old")).unwrap();
        let metadata = token.metadata.as_ref().unwrap();
        assert_eq!(metadata.description.as_deref(), Some("legacy ink"));
        assert!(metadata.extension("com.example.governance").is_some());
        let deprecation = metadata.deprecation.as_ref().unwrap();
        assert_eq!(deprecation.superseded_by.as_deref(), Some("#/ink"));
    }
}
