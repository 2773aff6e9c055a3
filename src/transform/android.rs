//! Android transforms (`android/material` and `android/compose` groups)

use serde_json::{json, Value};

use crate::model::{Rgb, TokenType};

use super::color::trim_float;
use super::dimension::parse_dimension;
use super::{Transform, TransformContext, TransformSelector};

fn argb_bytes(rgb: &Rgb) -> (u8, u8, u8, u8) {
    let to_byte = |c: f64| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
    let alpha = rgb.alpha.unwrap_or(1.0);
    (to_byte(alpha), to_byte(rgb.r), to_byte(rgb.g), to_byte(rgb.b))
}

/// `android/color-hex` - `#AARRGGBB` resource notation.
pub struct MaterialColorTransform;

impl Transform for MaterialColorTransform {
    fn name(&self) -> &'static str {
        "android/color-hex"
    }

    fn group(&self) -> &'static str {
        "android/material"
    }

    fn selector(&self) -> TransformSelector {
        TransformSelector::for_types(&[TokenType::Color])
    }

    fn run(&self, ctx: &TransformContext) -> anyhow::Result<Option<Value>> {
        let rgb = match Rgb::from_token_value(&ctx.resolved) {
            Some(rgb) => rgb,
            None => return Ok(None),
        };
        let (a, r, g, b) = argb_bytes(&rgb);
        Ok(Some(json!(format!("#{a:02X}{r:02X}{g:02X}{b:02X}"))))
    }
}

/// `android/dimen` - `dp` resource value (px taken as dp 1:1).
pub struct MaterialDimenTransform;

impl Transform for MaterialDimenTransform {
    fn name(&self) -> &'static str {
        "android/dimen"
    }

    fn group(&self) -> &'static str {
        "android/material"
    }

    fn selector(&self) -> TransformSelector {
        TransformSelector::for_types(&[TokenType::Dimension])
    }

    fn run(&self, ctx: &TransformContext) -> anyhow::Result<Option<Value>> {
        let (magnitude, unit) = match parse_dimension(&ctx.resolved) {
            Some(parsed) => parsed,
            None => return Ok(None),
        };
        let suffix = match unit.as_str() {
            "px" | "dp" => "dp",
            "sp" => "sp",
            other => other,
        };
        Ok(Some(json!(format!("{}{suffix}", trim_float(magnitude, 4)))))
    }
}

/// `compose/color` - `Color(0xAARRGGBB)` Kotlin expression.
pub struct ComposeColorTransform;

impl Transform for ComposeColorTransform {
    fn name(&self) -> &'static str {
        "compose/color"
    }

    fn group(&self) -> &'static str {
        "android/compose"
    }

    fn selector(&self) -> TransformSelector {
        TransformSelector::for_types(&[TokenType::Color])
    }

    fn run(&self, ctx: &TransformContext) -> anyhow::Result<Option<Value>> {
        let rgb = match Rgb::from_token_value(&ctx.resolved) {
            Some(rgb) => rgb,
            None => return Ok(None),
        };
        let (a, r, g, b) = argb_bytes(&rgb);
        Ok(Some(json!(format!("Color(0x{a:02X}{r:02X}{g:02X}{b:02X})"))))
    }
}

/// `compose/dimension` - `Dp` extension literal.
pub struct ComposeDimensionTransform;

impl Transform for ComposeDimensionTransform {
    fn name(&self) -> &'static str {
        "compose/dimension"
    }

    fn group(&self) -> &'static str {
        "android/compose"
    }

    fn selector(&self) -> TransformSelector {
        TransformSelector::for_types(&[TokenType::Dimension])
    }

    fn run(&self, ctx: &TransformContext) -> anyhow::Result<Option<Value>> {
        let (magnitude, unit) = match parse_dimension(&ctx.resolved) {
            Some(parsed) => parsed,
            None => return Ok(None),
        };
        let suffix = if unit == "sp" { "sp" } else { "dp" };
        Ok(Some(json!(format!("{}.{suffix}", trim_float(magnitude, 4)))))
    }
}
