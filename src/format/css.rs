//! CSS custom-property formatter
//!
//! Collapses every selected token into one `:root { ... }` declaration block
//! per instance. Options:
//! - `selector`: declaration block selector (default `:root`)
//! - `colorFormat`: `hex` (default) or `oklch`
//! - `rem`: convert pixel dimensions to rem (`basePx` sets the root size)
//! - `fileName`: artifact path (default `tokens.css`)

use serde_json::Value;

use crate::model::JsonPointer;
use crate::transform::web::css_value;

use super::{Artifact, Formatter, FormatterInput, FormatterSelector};

pub struct CssVariablesFormatter;

impl Formatter for CssVariablesFormatter {
    fn name(&self) -> &'static str {
        "css"
    }

    fn selector(&self) -> FormatterSelector {
        FormatterSelector {
            types: Vec::new(),
            transforms: Some(vec!["css/value".to_string()]),
            pointer_patterns: None,
        }
    }

    fn run(&self, input: &FormatterInput) -> anyhow::Result<Vec<Artifact>> {
        let options = input.options.as_ref();
        let selector = option_str(options, "selector").unwrap_or(":root");
        let oklch = option_str(options, "colorFormat") == Some("oklch");
        let rem = options
            .and_then(|o| o.get("rem"))
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let base_px = options
            .and_then(|o| o.get("basePx"))
            .and_then(Value::as_f64)
            .unwrap_or(16.0);
        let file_name = option_str(options, "fileName").unwrap_or("tokens.css");

        let mut lines = Vec::new();
        for token in &input.tokens {
            let token_type = match token.snapshot.token_type {
                Some(token_type) => token_type,
                None => continue,
            };

            // Typography cannot collapse into one value; it expands into a
            // variable per property instead.
            let mut declarations = Vec::new();
            if token_type == crate::model::TokenType::Typography {
                expand_typography(&token.pointer, &token.value, oklch, &mut declarations);
            } else {
                // Prefer the attached transform payload; fall back to direct
                // rendering so the formatter works without the transform
                // stage.
                let mut rendered = token
                    .transform("css/value")
                    .and_then(Value::as_str)
                    .map(String::from)
                    .or_else(|| css_value(token_type, &token.value, oklch));

                if rem && token_type == crate::model::TokenType::Dimension {
                    rendered = rem_value(&token.value, base_px).or(rendered);
                }

                if let Some(rendered) = rendered {
                    declarations.push(format!(
                        "  {}: {rendered};",
                        variable_name(&token.pointer)
                    ));
                }
            }

            if declarations.is_empty() {
                continue;
            }
            if let Some(description) = token.snapshot.description.as_deref() {
                lines.push(format!("  /* {description} */"));
            }
            lines.append(&mut declarations);
        }

        let mut contents = String::new();
        contents.push_str(selector);
        contents.push_str(" {\n");
        for line in &lines {
            contents.push_str(line);
            contents.push('\n');
        }
        contents.push_str("}\n");

        Ok(vec![Artifact::text(file_name, contents)])
    }
}

fn option_str<'a>(options: Option<&'a Value>, key: &str) -> Option<&'a str> {
    options.and_then(|o| o.get(key)).and_then(Value::as_str)
}

/// `#/color/primary` → `--color-primary`.
fn variable_name(pointer: &str) -> String {
    let decoded = JsonPointer::parse(pointer);
    let mut name = String::from("--");
    for (i, segment) in decoded.segments().iter().enumerate() {
        if i > 0 {
            name.push('-');
        }
        for c in segment.chars() {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                name.extend(c.to_lowercase());
            } else {
                name.push('-');
            }
        }
    }
    name
}

/// Expand a typography token into one variable per property:
/// `--type-body-font-family`, `--type-body-font-size`, and so on.
fn expand_typography(pointer: &str, value: &Value, oklch: bool, lines: &mut Vec<String>) {
    use crate::model::TokenType;

    let map = match value.as_object() {
        Some(map) => map,
        None => return,
    };
    let base = variable_name(pointer);

    const PROPERTIES: &[(&str, &str, TokenType)] = &[
        ("fontFamily", "font-family", TokenType::FontFamily),
        ("fontSize", "font-size", TokenType::Dimension),
        ("fontWeight", "font-weight", TokenType::Number),
        ("lineHeight", "line-height", TokenType::Number),
        ("letterSpacing", "letter-spacing", TokenType::Dimension),
        ("color", "color", TokenType::Color),
    ];

    for (key, suffix, token_type) in PROPERTIES {
        let Some(property) = map.get(*key) else {
            continue;
        };
        // fontWeight may be a keyword string rather than a number.
        let rendered = css_value(*token_type, property, oklch)
            .or_else(|| property.as_str().map(String::from));
        if let Some(rendered) = rendered {
            lines.push(format!("  {base}-{suffix}: {rendered};"));
        }
    }
}

fn rem_value(value: &Value, base_px: f64) -> Option<String> {
    let (magnitude, unit) = crate::transform::dimension::parse_dimension(value)?;
    if unit != "px" {
        return None;
    }
    Some(format!(
        "{}rem",
        crate::transform::color::trim_float(magnitude / base_px, 4)
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::FormatterToken;
    use crate::model::{JsonPointer, Provenance, TokenSnapshot, TokenType};
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

    fn run_with(tokens: Vec<FormatterToken>, options: Option<Value>) -> String {
        let input = FormatterInput {
            tokens,
            options,
            instance_id: "css#0".into(),
            config_dir: None,
        };
        let artifacts = CssVariablesFormatter.run(&input).unwrap();
        assert_eq!(artifacts.len(), 1);
        match &artifacts[0].contents {
            super::super::ArtifactContents::Text(text) => text.clone(),
            _ => panic!("expected text artifact"),
        }
    }

    #[test]
    fn emits_root_block_with_variables() {
        let css = run_with(
            vec![
                token("#/color/primary", TokenType::Color, json!("#336699")),
                token(
                    "#/spacing/md",
                    TokenType::Dimension,
                    json!({"value": 16, "unit": "px"}),
                ),
            ],
            None,
        );
        assert!(css.starts_with(":root {\n"));
        assert!(css.contains("  --color-primary: #336699;\n"));
        assert!(css.contains("  --spacing-md: 16px;\n"));
        assert!(css.ends_with("}\n"));
    }

    #[test]
    fn oklch_option_switches_color_rendering() {
        let css = run_with(
            vec![token("#/color/primary", TokenType::Color, json!("#FFFFFF"))],
            Some(json!({"colorFormat": "oklch"})),
        );
        assert!(css.contains("oklch("), "{css}");
    }

    #[test]
    fn rem_option_converts_px_dimensions() {
        let css = run_with(
            vec![token(
                "#/spacing/lg",
                TokenType::Dimension,
                json!({"value": 24, "unit": "px"}),
            )],
            Some(json!({"rem": true})),
        );
        assert!(css.contains("--spacing-lg: 1.5rem;"), "{css}");
    }

    #[test]
    fn custom_selector_and_file_name() {
        let input = FormatterInput {
            tokens: vec![token("#/x", TokenType::Number, json!(4))],
            options: Some(json!({"selector": ".theme-dark", "fileName": "dark.css"})),
            instance_id: "css#0".into(),
            config_dir: None,
        };
        let artifacts = CssVariablesFormatter.run(&input).unwrap();
        assert_eq!(artifacts[0].path, "dark.css");
        match &artifacts[0].contents {
            super::super::ArtifactContents::Text(text) => {
                assert!(text.starts_with(".theme-dark {"))
            }
            _ => panic!("expected text artifact"),
        }
    }

    #[test]
    fn typography_expands_into_per_property_variables() {
        let css = run_with(
            vec![token(
                "#/type/body",
                TokenType::Typography,
                json!({
                    "fontFamily": ["Inter", "sans-serif"],
                    "fontSize": {"value": 16, "unit": "px"},
                    "fontWeight": 400,
                    "lineHeight": 1.5
                }),
            )],
            None,
        );
        assert!(css.contains("  --type-body-font-family: Inter, sans-serif;"));
        assert!(css.contains("  --type-body-font-size: 16px;"));
        assert!(css.contains("  --type-body-font-weight: 400;"));
        assert!(css.contains("  --type-body-line-height: 1.5;"));
    }

    #[test]
    fn transform_payload_takes_precedence() {
        let mut t = token("#/color/primary", TokenType::Color, json!("#336699"));
        t.transforms
            .insert("css/value".to_string(), json!("var(--brand-primary)"));
        let css = run_with(vec![t], None);
        assert!(css.contains("--color-primary: var(--brand-primary);"));
    }
}
