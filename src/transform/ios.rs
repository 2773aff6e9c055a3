//! SwiftUI transforms (`ios/swiftui` group)

use serde_json::{json, Value};

use crate::model::{Rgb, TokenType};

use super::color::trim_float;
use super::dimension::parse_dimension;
use super::{Transform, TransformContext, TransformSelector};

/// `swiftui/color` - `Color(red:green:blue:)` initializer expression.
pub struct SwiftUiColorTransform;

impl Transform for SwiftUiColorTransform {
    fn name(&self) -> &'static str {
        "swiftui/color"
    }

    fn group(&self) -> &'static str {
        "ios/swiftui"
    }

    fn selector(&self) -> TransformSelector {
        TransformSelector::for_types(&[TokenType::Color])
    }

    fn run(&self, ctx: &TransformContext) -> anyhow::Result<Option<Value>> {
        let rgb = match Rgb::from_token_value(&ctx.resolved) {
            Some(rgb) => rgb,
            None => return Ok(None),
        };
        let rendered = match rgb.alpha {
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
        };
        Ok(Some(json!(rendered)))
    }
}

/// `swiftui/dimension` - `CGFloat` literal in points.
pub struct SwiftUiDimensionTransform;

impl Transform for SwiftUiDimensionTransform {
    fn name(&self) -> &'static str {
        "swiftui/dimension"
    }

    fn group(&self) -> &'static str {
        "ios/swiftui"
    }

    fn selector(&self) -> TransformSelector {
        TransformSelector::for_types(&[TokenType::Dimension])
    }

    fn run(&self, ctx: &TransformContext) -> anyhow::Result<Option<Value>> {
        let (magnitude, _unit) = match parse_dimension(&ctx.resolved) {
            Some(parsed) => parsed,
            None => return Ok(None),
        };
        Ok(Some(json!(format!(
            "CGFloat({})",
            trim_float(magnitude, 4)
        ))))
    }
}

/// `swiftui/font` - `Font.custom(...)` expression from a typography token.
pub struct SwiftUiFontTransform;

impl Transform for SwiftUiFontTransform {
    fn name(&self) -> &'static str {
        "swiftui/font"
    }

    fn group(&self) -> &'static str {
        "ios/swiftui"
    }

    fn selector(&self) -> TransformSelector {
        TransformSelector::for_types(&[TokenType::Typography])
    }

    fn run(&self, ctx: &TransformContext) -> anyhow::Result<Option<Value>> {
        let map = match ctx.resolved.as_object() {
            Some(map) => map,
            None => return Ok(None),
        };
        let family = map
            .get("fontFamily")
            .and_then(|f| match f {
                Value::String(name) => Some(name.clone()),
                Value::Array(names) => names.first().and_then(Value::as_str).map(String::from),
                _ => None,
            });
        let family = match family {
            Some(family) => family,
            None => return Ok(None),
        };
        let size = map
            .get("fontSize")
            .and_then(parse_size)
            .unwrap_or(17.0);

        Ok(Some(json!(format!(
            "Font.custom(\"{family}\", size: {})",
            trim_float(size, 4)
        ))))
    }
}

fn parse_size(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        other => parse_dimension(other).map(|(magnitude, _)| magnitude),
    }
}
