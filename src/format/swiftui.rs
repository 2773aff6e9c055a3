//! SwiftUI formatter
//!
//! Emits one Swift struct of `static let` properties. Identifiers come from
//! pointer segments in camelCase, reserved words are prefixed, and collisions
//! pick up numeric suffixes. Options:
//! - `structName`: emitted type name (default `DesignTokens`)
//! - `fileName`: artifact path (default `<structName>.swift`)
//! - `accessLevel`: `public` (default) or `internal`

use serde_json::Value;

use crate::model::{Rgb, TokenType};
use crate::transform::color::trim_float;
use crate::transform::dimension::parse_dimension;

use super::ident::{camel_case, IdentAllocator, SWIFT_KEYWORDS};
use super::{Artifact, Formatter, FormatterInput, FormatterSelector};

pub struct SwiftUiFormatter;

impl Formatter for SwiftUiFormatter {
    fn name(&self) -> &'static str {
        "swiftui"
    }

    fn selector(&self) -> FormatterSelector {
        FormatterSelector {
            types: vec![
                TokenType::Color,
                TokenType::Dimension,
                TokenType::Typography,
                TokenType::Number,
                TokenType::String,
                TokenType::Duration,
            ],
            transforms: Some(vec![
                "swiftui/color".to_string(),
                "swiftui/dimension".to_string(),
                "swiftui/font".to_string(),
            ]),
            pointer_patterns: None,
        }
    }

    fn run(&self, input: &FormatterInput) -> anyhow::Result<Vec<Artifact>> {
        let options = input.options.as_ref();
        let struct_name = options
            .and_then(|o| o.get("structName"))
            .and_then(Value::as_str)
            .unwrap_or("DesignTokens");
        let access = options
            .and_then(|o| o.get("accessLevel"))
            .and_then(Value::as_str)
            .unwrap_or("public");
        let default_file = format!("{struct_name}.swift");
        let file_name = options
            .and_then(|o| o.get("fileName"))
            .and_then(Value::as_str)
            .unwrap_or(&default_file);

        let mut allocator = IdentAllocator::new(SWIFT_KEYWORDS, "token");
        let mut properties = Vec::new();

        for token in &input.tokens {
            let rendered = match render_property(token) {
                Some(rendered) => rendered,
                None => continue,
            };
            let ident = allocator.allocate(camel_case(token.snapshot.pointer.segments()));
            if let Some(description) = token.snapshot.description.as_deref() {
                properties.push(format!("    /// {description}"));
            }
            properties.push(format!(
                "    {access} static let {ident}: {} = {}",
                rendered.0, rendered.1
            ));
        }

        let mut contents = String::new();
        contents.push_str("import SwiftUI\n\n");
        contents.push_str(&format!("{access} struct {struct_name} {{\n"));
        for line in &properties {
            contents.push_str(line);
            contents.push('\n');
        }
        contents.push_str("}\n");

        Ok(vec![Artifact::text(file_name, contents)])
    }
}

/// `(swift type, initializer expression)` for one token.
fn render_property(token: &super::FormatterToken) -> Option<(&'static str, String)> {
    let token_type = token.snapshot.token_type?;
    match token_type {
        TokenType::Color => {
            let expression = token
                .transform("swiftui/color")
                .and_then(Value::as_str)
                .map(String::from)
                .or_else(|| swift_color(&token.value))?;
            Some(("Color", expression))
        }
        TokenType::Dimension => {
            let expression = token
                .transform("swiftui/dimension")
                .and_then(Value::as_str)
                .map(String::from)
                .or_else(|| {
                    parse_dimension(&token.value)
                        .map(|(magnitude, _)| format!("CGFloat({})", trim_float(magnitude, 4)))
                })?;
            Some(("CGFloat", expression))
        }
        TokenType::Typography => {
            let expression = token
                .transform("swiftui/font")
                .and_then(Value::as_str)
                .map(String::from)?;
            Some(("Font", expression))
        }
        TokenType::Number => token
            .value
            .as_f64()
            .map(|n| ("Double", trim_float(n, 6))),
        TokenType::Duration => duration_seconds(&token.value)
            .map(|seconds| ("TimeInterval", trim_float(seconds, 6))),
        TokenType::String => token
            .value
            .as_str()
            .map(|s| ("String", format!("\"{}\"", s.replace('"', "\\\"")))),
        _ => None,
    }
}

fn swift_color(value: &Value) -> Option<String> {
    let rgb = Rgb::from_token_value(value)?;
    Some(match rgb.alpha {
        Some(alpha) if alpha < 1.0 => format!(
            "Color(red: {}, green: {}, blue: {}, opacity: {})",
            trim_float(rgb.r, 6),
            trim_float(rgb.g, 6),
            trim_float(rgb.b, 6),
            trim_float(alpha, 6)
        ),
        _ => format!(
            "Color(red: {}, green: {}, blue: {})",
            trim_float(rgb.r, 6),
            trim_float(rgb.g, 6),
            trim_float(rgb.b, 6)
        ),
    })
}

fn duration_seconds(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().map(|ms| ms / 1000.0),
        Value::Object(map) => {
            let magnitude = map.get("value").and_then(Value::as_f64)?;
            let unit = map.get("unit").and_then(Value::as_str).unwrap_or("ms");
            Some(match unit {
                "s" => magnitude,
                _ => magnitude / 1000.0,
            })
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{ArtifactContents, FormatterToken};
    use crate::model::{JsonPointer, Provenance, TokenSnapshot};
    use serde_json::json;
    use std::collections::BTreeMap;

    fn token(pointer: &str, token_type: TokenType, value: Value) -> FormatterToken {
        let mut snapshot = TokenSnapshot::parsed(
            JsonPointer::parse(pointer),
            value.clone(),
            Provenance {
                source_id: "s".into(),
                layer: "base".into(),
                layer_index: 0,
                uri: "t.json".into(),
                pointer_prefix: JsonPointer::root(),
            },
        );
        snapshot.token_type = Some(token_type);
        FormatterToken {
            pointer: pointer.to_string(),
            value,
            raw: json!({}),
            metadata: None,
            transforms: BTreeMap::new(),
            snapshot,
        }
    }

    fn render(tokens: Vec<FormatterToken>, options: Option<Value>) -> String {
        let input = FormatterInput {
            tokens,
            options,
            instance_id: "swiftui#0".into(),
            config_dir: None,
        };
        let artifacts = SwiftUiFormatter.run(&input).unwrap();
        match &artifacts[0].contents {
            ArtifactContents::Text(text) => text.clone(),
            _ => panic!("expected text artifact"),
        }
    }

    #[test]
    fn emits_struct_with_static_lets() {
        let swift = render(
            vec![
                token("#/color/primary", TokenType::Color, json!("#FF0000")),
                token(
                    "#/spacing/md",
                    TokenType::Dimension,
                    json!({"value": 16, "unit": "px"}),
                ),
            ],
            None,
        );
        assert!(swift.contains("import SwiftUI"));
        assert!(swift.contains("public struct DesignTokens {"));
        assert!(swift
            .contains("public static let colorPrimary: Color = Color(red: 1, green: 0, blue: 0)"));
        assert!(swift.contains("public static let spacingMd: CGFloat = CGFloat(16)"));
    }

    #[test]
    fn reserved_word_segments_are_prefixed() {
        let swift = render(
            vec![token("#/default", TokenType::Number, json!(1))],
            None,
        );
        assert!(swift.contains("static let tokenDefault: Double = 1"));
    }

    #[test]
    fn colliding_identifiers_get_numeric_suffixes() {
        let swift = render(
            vec![
                token("#/color/primary", TokenType::Color, json!("#000000")),
                token("#/color-primary", TokenType::Color, json!("#FFFFFF")),
            ],
            None,
        );
        assert!(swift.contains("colorPrimary:"));
        assert!(swift.contains("colorPrimary2:"));
    }

    #[test]
    fn struct_name_option_renames_type_and_file() {
        let input = FormatterInput {
            tokens: vec![],
            options: Some(json!({"structName": "BrandTokens", "accessLevel": "internal"})),
            instance_id: "swiftui#0".into(),
            config_dir: None,
        };
        let artifacts = SwiftUiFormatter.run(&input).unwrap();
        assert_eq!(artifacts[0].path, "BrandTokens.swift");
        match &artifacts[0].contents {
            ArtifactContents::Text(text) => {
                assert!(text.contains("internal struct BrandTokens {"))
            }
            _ => panic!("expected text artifact"),
        }
    }
}
