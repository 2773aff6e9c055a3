//! Android formatters: XML resources and Compose Kotlin objects
//!
//! `android-resources` emits `res/values/colors.xml` and
//! `res/values/dimens.xml` with snake_case resource names. `compose` emits a
//! Kotlin object with PascalCase vals covering colors, dimensions, gradients,
//! and shadows.

use serde_json::Value;

use crate::model::{Rgb, TokenType};
use crate::transform::color::trim_float;
use crate::transform::dimension::parse_dimension;

use super::ident::{pascal_case, snake_case, IdentAllocator, KOTLIN_KEYWORDS};
use super::{Artifact, Formatter, FormatterInput, FormatterSelector, FormatterToken};

fn android_hex(value: &Value) -> Option<String> {
    let rgb = Rgb::from_token_value(value)?;
    let to_byte = |c: f64| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
    let alpha = to_byte(rgb.alpha.unwrap_or(1.0));
    Some(format!(
        "#{alpha:02X}{:02X}{:02X}{:02X}",
        to_byte(rgb.r),
        to_byte(rgb.g),
        to_byte(rgb.b)
    ))
}

fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// `android-resources` - colors.xml and dimens.xml.
pub struct AndroidResourcesFormatter;

impl Formatter for AndroidResourcesFormatter {
    fn name(&self) -> &'static str {
        "android-resources"
    }

    fn selector(&self) -> FormatterSelector {
        FormatterSelector {
            types: vec![TokenType::Color, TokenType::Dimension],
            transforms: Some(vec![
                "android/color-hex".to_string(),
                "android/dimen".to_string(),
            ]),
            pointer_patterns: None,
        }
    }

    fn run(&self, input: &FormatterInput) -> anyhow::Result<Vec<Artifact>> {
        let mut color_names = IdentAllocator::new(&[], "res");
        let mut dimen_names = IdentAllocator::new(&[], "res");
        let mut colors = Vec::new();
        let mut dimens = Vec::new();

        for token in &input.tokens {
            match token.snapshot.token_type {
                Some(TokenType::Color) => {
                    let rendered = token
                        .transform("android/color-hex")
                        .and_then(Value::as_str)
                        .map(String::from)
                        .or_else(|| android_hex(&token.value));
                    if let Some(rendered) = rendered {
                        let name =
                            color_names.allocate(snake_case(token.snapshot.pointer.segments()));
                        colors.push(format!(
                            "    <color name=\"{name}\">{}</color>",
                            escape_xml(&rendered)
                        ));
                    }
                }
                Some(TokenType::Dimension) => {
                    let rendered = token
                        .transform("android/dimen")
                        .and_then(Value::as_str)
                        .map(String::from)
                        .or_else(|| {
                            parse_dimension(&token.value)
                                .map(|(magnitude, _)| format!("{}dp", trim_float(magnitude, 4)))
                        });
                    if let Some(rendered) = rendered {
                        let name =
                            dimen_names.allocate(snake_case(token.snapshot.pointer.segments()));
                        dimens.push(format!(
                            "    <dimen name=\"{name}\">{}</dimen>",
                            escape_xml(&rendered)
                        ));
                    }
                }
                _ => {}
            }
        }

        let mut artifacts = Vec::new();
        if !colors.is_empty() {
            artifacts.push(Artifact::text(
                "res/values/colors.xml",
                resource_file(&colors),
            ));
        }
        if !dimens.is_empty() {
            artifacts.push(Artifact::text(
                "res/values/dimens.xml",
                resource_file(&dimens),
            ));
        }
        Ok(artifacts)
    }
}

fn resource_file(entries: &[String]) -> String {
    let mut out = String::from("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<resources>\n");
    for entry in entries {
        out.push_str(entry);
        out.push('\n');
    }
    out.push_str("</resources>\n");
    out
}

/// `compose` - Kotlin object with Compose value types.
pub struct ComposeFormatter;

impl Formatter for ComposeFormatter {
    fn name(&self) -> &'static str {
        "compose"
    }

    fn selector(&self) -> FormatterSelector {
        FormatterSelector {
            types: vec![
                TokenType::Color,
                TokenType::Dimension,
                TokenType::Gradient,
                TokenType::Shadow,
                TokenType::Number,
            ],
            transforms: Some(vec![
                "compose/color".to_string(),
                "compose/dimension".to_string(),
            ]),
            pointer_patterns: None,
        }
    }

    fn run(&self, input: &FormatterInput) -> anyhow::Result<Vec<Artifact>> {
        let options = input.options.as_ref();
        let package = options
            .and_then(|o| o.get("package"))
            .and_then(Value::as_str)
            .unwrap_or("com.dtifx.tokens");
        let object_name = options
            .and_then(|o| o.get("objectName"))
            .and_then(Value::as_str)
            .unwrap_or("DesignTokens");
        let default_file = format!("{object_name}.kt");
        let file_name = options
            .and_then(|o| o.get("fileName"))
            .and_then(Value::as_str)
            .unwrap_or(&default_file);

        let mut allocator = IdentAllocator::new(KOTLIN_KEYWORDS, "token");
        let mut vals = Vec::new();
        let mut needs_brush = false;

        for token in &input.tokens {
            let rendered = render_compose_val(token, &mut needs_brush);
            if let Some((kotlin_type, expression)) = rendered {
                let ident = allocator.allocate(pascal_case(token.snapshot.pointer.segments()));
                vals.push(format!("    val {ident}: {kotlin_type} = {expression}"));
            }
        }

        let mut contents = String::new();
        contents.push_str(&format!("package {package}\n\n"));
        contents.push_str("import androidx.compose.ui.graphics.Color\n");
        if needs_brush {
            contents.push_str("import androidx.compose.ui.graphics.Brush\n");
        }
        contents.push_str("import androidx.compose.ui.unit.Dp\n");
        contents.push_str("import androidx.compose.ui.unit.dp\n");
        contents.push_str("import androidx.compose.ui.unit.sp\n\n");
        contents.push_str(&format!("object {object_name} {{\n"));
        for val in &vals {
            contents.push_str(val);
            contents.push('\n');
        }
        contents.push_str("}\n");

        Ok(vec![Artifact::text(file_name, contents)])
    }
}

fn render_compose_val(
    token: &FormatterToken,
    needs_brush: &mut bool,
) -> Option<(&'static str, String)> {
    match token.snapshot.token_type? {
        TokenType::Color => {
            let expression = token
                .transform("compose/color")
                .and_then(Value::as_str)
                .map(String::from)
                .or_else(|| compose_color(&token.value))?;
            Some(("Color", expression))
        }
        TokenType::Dimension => {
            let expression = token
                .transform("compose/dimension")
                .and_then(Value::as_str)
                .map(String::from)
                .or_else(|| {
                    parse_dimension(&token.value)
                        .map(|(magnitude, _)| format!("{}.dp", trim_float(magnitude, 4)))
                })?;
            Some(("Dp", expression))
        }
        TokenType::Number => token
            .value
            .as_f64()
            .map(|n| ("Float", format!("{}f", trim_float(n, 6)))),
        TokenType::Gradient => {
            let stops = token.value.get("stops")?.as_array()?;
            let colors: Vec<String> = stops
                .iter()
                .filter_map(|stop| compose_color(stop.get("color")?))
                .collect();
            if colors.len() != stops.len() || colors.is_empty() {
                return None;
            }
            *needs_brush = true;
            Some((
                "Brush",
                format!("Brush.linearGradient(listOf({}))", colors.join(", ")),
            ))
        }
        TokenType::Shadow => {
            // Compose has no shadow value type; expose the color and blur so
            // call sites can feed Modifier.shadow.
            let map = token.value.as_object()?;
            let color = compose_color(map.get("color")?)?;
            let blur = map
                .get("blur")
                .and_then(parse_dimension_ref)
                .map(|(magnitude, _)| format!("{}.dp", trim_float(magnitude, 4)))
                .unwrap_or_else(|| "0.dp".to_string());
            Some((
                "Pair<Color, Dp>",
                format!("Pair({color}, {blur})"),
            ))
        }
        _ => None,
    }
}

fn parse_dimension_ref(value: &Value) -> Option<(f64, String)> {
    parse_dimension(value)
}

fn compose_color(value: &Value) -> Option<String> {
    let rgb = Rgb::from_token_value(value)?;
    let to_byte = |c: f64| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
    let alpha = to_byte(rgb.alpha.unwrap_or(1.0));
    Some(format!(
        "Color(0x{alpha:02X}{:02X}{:02X}{:02X})",
        to_byte(rgb.r),
        to_byte(rgb.g),
        to_byte(rgb.b)
    ))
}
