//! CSS value rendering (`web/css` group)
//!
//! `css/value` turns any resolvable token type into a single CSS value
//! string. Composite types that cannot collapse into one value (typography)
//! yield nothing here and are expanded by the formatters instead.

use serde_json::{json, Value};

use crate::model::{Rgb, TokenType};

use super::color::trim_float;
use super::dimension::parse_dimension;
use super::{Transform, TransformContext, TransformSelector};

/// `css/value` - one CSS value string per token.
pub struct CssValueTransform;

impl Transform for CssValueTransform {
    fn name(&self) -> &'static str {
        "css/value"
    }

    fn group(&self) -> &'static str {
        "web/css"
    }

    fn selector(&self) -> TransformSelector {
        // All types; unsupported ones simply return nothing.
        TransformSelector::default()
    }

    fn run(&self, ctx: &TransformContext) -> anyhow::Result<Option<Value>> {
        let token_type = match ctx.snapshot.token_type {
            Some(token_type) => token_type,
            None => return Ok(None),
        };
        let use_oklch = ctx
            .options
            .and_then(|o| o.get("colorFormat"))
            .and_then(Value::as_str)
            .map(|format| format == "oklch")
            .unwrap_or(false);
        Ok(css_value(token_type, &ctx.resolved, use_oklch).map(|s| json!(s)))
    }
}

/// Render one token value as a CSS value string.
pub fn css_value(token_type: TokenType, value: &Value, oklch: bool) -> Option<String> {
    match token_type {
        TokenType::Color => css_color(value, oklch),
        TokenType::Dimension => css_dimension(value),
        TokenType::Duration => css_duration(value),
        TokenType::Number => value.as_f64().map(|n| trim_float(n, 6)),
        TokenType::String | TokenType::StrokeStyle => {
            value.as_str().map(String::from)
        }
        TokenType::FontFamily => css_font_family(value),
        TokenType::CubicBezier => css_cubic_bezier(value),
        TokenType::Shadow => css_shadow(value, oklch),
        TokenType::Gradient => css_gradient(value, oklch),
        TokenType::Border => css_border(value, oklch),
        TokenType::Transition => css_transition(value),
        TokenType::Image => value
            .as_str()
            .map(|uri| format!("url(\"{uri}\")")),
        // Typography cannot collapse into a single CSS value.
        TokenType::Typography => None,
    }
}

pub(crate) fn css_color(value: &Value, oklch: bool) -> Option<String> {
    let rgb = Rgb::from_token_value(value)?;
    if oklch {
        let lch = rgb.to_oklch();
        let rendered = match rgb.alpha {
            Some(alpha) if alpha < 1.0 => format!(
                "oklch({} {} {} / {})",
                trim_float(lch.l, 4),
                trim_float(lch.c, 4),
                trim_float(lch.h, 2),
                trim_float(alpha, 4)
            ),
            _ => format!(
                "oklch({} {} {})",
                trim_float(lch.l, 4),
                trim_float(lch.c, 4),
                trim_float(lch.h, 2)
            ),
        };
        Some(rendered)
    } else {
        Some(rgb.to_hex())
    }
}

pub(crate) fn css_dimension(value: &Value) -> Option<String> {
    let (magnitude, unit) = parse_dimension(value)?;
    Some(format!("{}{unit}", trim_float(magnitude, 4)))
}

fn css_duration(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => n.as_f64().map(|ms| format!("{}ms", trim_float(ms, 4))),
        Value::Object(map) => {
            let magnitude = map.get("value").and_then(Value::as_f64)?;
            let unit = map.get("unit").and_then(Value::as_str).unwrap_or("ms");
            Some(format!("{}{unit}", trim_float(magnitude, 4)))
        }
        _ => None,
    }
}

fn css_font_family(value: &Value) -> Option<String> {
    const GENERIC: &[&str] = &[
        "serif",
        "sans-serif",
        "monospace",
        "cursive",
        "fantasy",
        "system-ui",
    ];
    let quote = |name: &str| {
        if GENERIC.contains(&name) || !name.contains(' ') {
            name.to_string()
        } else {
            format!("\"{name}\"")
        }
    };
    match value {
        Value::String(name) => Some(quote(name)),
        Value::Array(names) => {
            let rendered: Vec<String> = names
                .iter()
                .filter_map(Value::as_str)
                .map(quote)
                .collect();
            if rendered.is_empty() {
                None
            } else {
                Some(rendered.join(", "))
            }
        }
        _ => None,
    }
}

fn css_cubic_bezier(value: &Value) -> Option<String> {
    let points = value.as_array()?;
    if points.len() != 4 {
        return None;
    }
    let rendered: Vec<String> = points
        .iter()
        .filter_map(Value::as_f64)
        .map(|p| trim_float(p, 4))
        .collect();
    if rendered.len() != 4 {
        return None;
    }
    Some(format!("cubic-bezier({})", rendered.join(", ")))
}

fn css_shadow(value: &Value, oklch: bool) -> Option<String> {
    match value {
        Value::Array(layers) => {
            let rendered: Vec<String> = layers
                .iter()
                .filter_map(|layer| css_shadow_layer(layer, oklch))
                .collect();
            if rendered.len() == layers.len() {
                Some(rendered.join(", "))
            } else {
                None
            }
        }
        single => css_shadow_layer(single, oklch),
    }
}

fn css_shadow_layer(value: &Value, oklch: bool) -> Option<String> {
    let map = value.as_object()?;
    let offset_x = css_dimension(map.get("offsetX")?)?;
    let offset_y = css_dimension(map.get("offsetY")?)?;
    let blur = map
        .get("blur")
        .and_then(css_dimension)
        .unwrap_or_else(|| "0px".to_string());
    let spread = map.get("spread").and_then(css_dimension);
    let color = css_color(map.get("color")?, oklch)?;
    let inset = map
        .get("inset")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    let mut parts = Vec::new();
    if inset {
        parts.push("inset".to_string());
    }
    parts.push(offset_x);
    parts.push(offset_y);
    parts.push(blur);
    if let Some(spread) = spread {
        parts.push(spread);
    }
    parts.push(color);
    Some(parts.join(" "))
}

fn css_gradient(value: &Value, oklch: bool) -> Option<String> {
    let map = value.as_object()?;
    let stops = map.get("stops").and_then(Value::as_array)?;
    let angle = map
        .get("angle")
        .and_then(Value::as_f64)
        .map(|deg| format!("{}deg", trim_float(deg, 2)))
        .unwrap_or_else(|| "180deg".to_string());

    let rendered: Vec<String> = stops
        .iter()
        .filter_map(|stop| {
            let stop = stop.as_object()?;
            let color = css_color(stop.get("color")?, oklch)?;
            let position = stop
                .get("position")
                .and_then(Value::as_f64)
                .map(|p| format!(" {}%", trim_float(p * 100.0, 2)))
                .unwrap_or_default();
            Some(format!("{color}{position}"))
        })
        .collect();

    if rendered.len() != stops.len() || rendered.is_empty() {
        return None;
    }
    Some(format!("linear-gradient({angle}, {})", rendered.join(", ")))
}

fn css_border(value: &Value, oklch: bool) -> Option<String> {
    let map = value.as_object()?;
    let width = css_dimension(map.get("width")?)?;
    let style = map.get("style").and_then(Value::as_str).unwrap_or("solid");
    let color = css_color(map.get("color")?, oklch)?;
    Some(format!("{width} {style} {color}"))
}

fn css_transition(value: &Value) -> Option<String> {
    let map = value.as_object()?;
    let duration = css_duration(map.get("duration")?)?;
    let timing = map
        .get("timingFunction")
        .and_then(css_cubic_bezier)
        .unwrap_or_else(|| "ease".to_string());
    let delay = map.get("delay").and_then(css_duration);

    match delay {
        Some(delay) => Some(format!("{duration} {timing} {delay}")),
        None => Some(format!("{duration} {timing}")),
    }
}
