//! JSON snapshot formatter
//!
//! Re-serializes the resolved token set as a DTIF document: aliases are
//! inlined to their terminal values, metadata is carried back onto the token
//! nodes. Loading the emitted document as a source and formatting it again
//! produces identical bytes.

use serde_json::{Map, Value};

use crate::model::JsonPointer;

use super::{Artifact, Formatter, FormatterInput, FormatterSelector};

pub struct JsonSnapshotFormatter;

impl Formatter for JsonSnapshotFormatter {
    fn name(&self) -> &'static str {
        "json"
    }

    fn selector(&self) -> FormatterSelector {
        FormatterSelector::default()
    }

    fn run(&self, input: &FormatterInput) -> anyhow::Result<Vec<Artifact>> {
        let file_name = input
            .options
            .as_ref()
            .and_then(|o| o.get("fileName"))
            .and_then(Value::as_str)
            .unwrap_or("tokens.json");

        let mut root = Map::new();
        for token in &input.tokens {
            let node = token_node(token);
            insert_at(
                &mut root,
                JsonPointer::parse(&token.pointer).segments(),
                node,
            );
        }

        let mut contents = serde_json::to_string_pretty(&Value::Object(root))?;
        contents.push('\n');
        Ok(vec![Artifact::text(file_name, contents)])
    }
}

fn token_node(token: &super::FormatterToken) -> Value {
    let mut node = Map::new();
    if let Some(token_type) = token.snapshot.token_type {
        node.insert("$type".to_string(), Value::String(token_type.as_str().into()));
    }
    node.insert("$value".to_string(), token.value.clone());
    if let Some(description) = &token.snapshot.description {
        node.insert(
            "$description".to_string(),
            Value::String(description.clone()),
        );
    }
    if let Some(metadata) = &token.metadata {
        if metadata.has_extensions() {
            let extensions: Map<String, Value> = metadata.extensions().into_iter().collect();
            node.insert("$extensions".to_string(), Value::Object(extensions));
        }
        if !metadata.tags.is_empty() {
            node.insert(
                "$tags".to_string(),
                Value::Array(
                    metadata
                        .tags
                        .iter()
                        .map(|t| Value::String(t.clone()))
                        .collect(),
                ),
            );
        }
        if let Some(deprecation) = &metadata.deprecation {
            let mut record = Map::new();
            if let Some(reason) = &deprecation.reason {
                record.insert("reason".to_string(), Value::String(reason.clone()));
            }
            if let Some(superseded_by) = &deprecation.superseded_by {
                record.insert(
                    "supersededBy".to_string(),
                    Value::String(superseded_by.clone()),
                );
            }
            node.insert(
                "$deprecated".to_string(),
                if record.is_empty() {
                    Value::Bool(true)
                } else {
                    Value::Object(record)
                },
            );
        }
    }
    Value::Object(node)
}

fn insert_at(root: &mut Map<String, Value>, segments: &[String], node: Value) {
    match segments {
        [] => {}
        [leaf] => {
            root.insert(leaf.clone(), node);
        }
        [head, rest @ ..] => {
            let child = root
                .entry(head.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            if let Value::Object(map) = child {
                insert_at(map, rest, node);
            }
        }
    }
}
