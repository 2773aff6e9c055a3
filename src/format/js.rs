//! JS/TS module formatter
//!
//! Collapses the selected snapshots into a nested object keyed by decoded
//! pointer segments. Options:
//! - `language`: `js` (default, emits a module plus a sibling `.d.ts`) or
//!   `ts` (single module with an `as const` annotation)
//! - `rootPointer`: subtree exposed through the `tokens` named export
//!   (default `#/`)
//! - `moduleName`: artifact base name (default `tokens`)

use serde_json::{Map, Value};

use crate::model::JsonPointer;

use super::ident::JS_KEYWORDS;
use super::{Artifact, Formatter, FormatterInput, FormatterSelector};

pub struct JsModuleFormatter;

impl Formatter for JsModuleFormatter {
    fn name(&self) -> &'static str {
        "js-module"
    }

    fn selector(&self) -> FormatterSelector {
        FormatterSelector::default()
    }

    fn run(&self, input: &FormatterInput) -> anyhow::Result<Vec<Artifact>> {
        let options = input.options.as_ref();
        let language = options
            .and_then(|o| o.get("language"))
            .and_then(Value::as_str)
            .unwrap_or("js");
        let module_name = options
            .and_then(|o| o.get("moduleName"))
            .and_then(Value::as_str)
            .unwrap_or("tokens");
        let root_pointer = options
            .and_then(|o| o.get("rootPointer"))
            .and_then(Value::as_str)
            .map(JsonPointer::parse)
            .unwrap_or_else(JsonPointer::root);

        let mut tree = Map::new();
        for token in &input.tokens {
            let pointer = JsonPointer::parse(&token.pointer);
            if !pointer.starts_with(&root_pointer) {
                continue;
            }
            let relative = &pointer.segments()[root_pointer.len()..];
            if relative.is_empty() {
                continue;
            }
            insert_at(&mut tree, relative, token.value.clone());
        }
        let tree = Value::Object(tree);

        match language {
            "ts" => {
                let mut contents = String::new();
                contents.push_str("export const tokens = ");
                contents.push_str(&render_value(&tree, 0, false));
                contents.push_str(" as const;\n\nexport default tokens;\n");
                Ok(vec![Artifact::text(format!("{module_name}.ts"), contents)])
            }
            _ => {
                let mut module = String::new();
                module.push_str("export const tokens = ");
                module.push_str(&render_value(&tree, 0, false));
                module.push_str(";\n\nexport default tokens;\n");

                let mut dts = String::new();
                dts.push_str("export declare const tokens: ");
                dts.push_str(&render_value(&tree, 0, true));
                dts.push_str(";\n\nexport default tokens;\n");

                Ok(vec![
                    Artifact::text(format!("{module_name}.js"), module),
                    Artifact::text(format!("{module_name}.d.ts"), dts),
                ])
            }
        }
    }
}

fn insert_at(root: &mut Map<String, Value>, segments: &[String], value: Value) {
    match segments {
        [] => {}
        [leaf] => {
            root.insert(leaf.clone(), value);
        }
        [head, rest @ ..] => {
            let child = root
                .entry(head.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            if let Value::Object(map) = child {
                insert_at(map, rest, value);
            }
        }
    }
}

fn is_identifier(key: &str) -> bool {
    !key.is_empty()
        && !JS_KEYWORDS.contains(&key)
        && key
            .chars()
            .next()
            .map(|c| c.is_ascii_alphabetic() || c == '_' || c == '$')
            .unwrap_or(false)
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

/// Render a JSON value as a JS object literal (or a `.d.ts` literal type
/// when `readonly` is set).
fn render_value(value: &Value, depth: usize, readonly: bool) -> String {
    let indent = "  ".repeat(depth);
    let child_indent = "  ".repeat(depth + 1);
    match value {
        Value::Object(map) if map.is_empty() => "{}".to_string(),
        Value::Object(map) => {
            let mut out = String::from("{\n");
            let mut entries = Vec::with_capacity(map.len());
            for (key, child) in map {
                let rendered_key = if is_identifier(key) {
                    key.clone()
                } else {
                    format!("\"{}\"", key.replace('"', "\\\""))
                };
                let prefix = if readonly { "readonly " } else { "" };
                entries.push(format!(
                    "{child_indent}{prefix}{rendered_key}: {}",
                    render_value(child, depth + 1, readonly)
                ));
            }
            out.push_str(&entries.join(",\n"));
            out.push('\n');
            out.push_str(&indent);
            out.push('}');
            out
        }
        Value::Array(items) if items.is_empty() => "[]".to_string(),
        Value::Array(items) => {
            let rendered: Vec<String> = items
                .iter()
                .map(|item| format!("{child_indent}{}", render_value(item, depth + 1, readonly)))
                .collect();
            format!("[\n{}\n{indent}]", rendered.join(",\n"))
        }
        scalar => serde_json::to_string(scalar).unwrap_or_else(|_| "null".to_string()),
    }
}
