//! Color transforms (`web/base` group)

use serde_json::{json, Value};

use crate::model::Rgb;

use super::{Transform, TransformContext, TransformSelector};
use crate::model::TokenType;

/// `color/hex` - uppercase sRGB hex string.
pub struct HexTransform;

impl Transform for HexTransform {
    fn name(&self) -> &'static str {
        "color/hex"
    }

    fn group(&self) -> &'static str {
        "web/base"
    }

    fn selector(&self) -> TransformSelector {
        TransformSelector::for_types(&[TokenType::Color])
    }

    fn run(&self, ctx: &TransformContext) -> anyhow::Result<Option<Value>> {
        Ok(Rgb::from_token_value(&ctx.resolved).map(|rgb| json!(rgb.to_hex())))
    }
}

/// `color/rgb` - modern `rgb()` functional notation.
pub struct RgbTransform;

impl Transform for RgbTransform {
    fn name(&self) -> &'static str {
        "color/rgb"
    }

    fn group(&self) -> &'static str {
        "web/base"
    }

    fn selector(&self) -> TransformSelector {
        TransformSelector::for_types(&[TokenType::Color])
    }

    fn run(&self, ctx: &TransformContext) -> anyhow::Result<Option<Value>> {
        let rgb = match Rgb::from_token_value(&ctx.resolved) {
            Some(rgb) => rgb,
            None => return Ok(None),
        };
        let r = (rgb.r.clamp(0.0, 1.0) * 255.0).round() as u8;
        let g = (rgb.g.clamp(0.0, 1.0) * 255.0).round() as u8;
        let b = (rgb.b.clamp(0.0, 1.0) * 255.0).round() as u8;
        let rendered = match rgb.alpha {
            Some(alpha) if alpha < 1.0 => {
                format!("rgb({r} {g} {b} / {})", trim_float(alpha, 4))
            }
            _ => format!("rgb({r} {g} {b})"),
        };
        Ok(Some(json!(rendered)))
    }
}

/// `color/oklch` - CSS `oklch()` notation.
pub struct OklchTransform;

impl Transform for OklchTransform {
    fn name(&self) -> &'static str {
        "color/oklch"
    }

    fn group(&self) -> &'static str {
        "web/base"
    }

    fn selector(&self) -> TransformSelector {
        TransformSelector::for_types(&[TokenType::Color])
    }

    fn run(&self, ctx: &TransformContext) -> anyhow::Result<Option<Value>> {
        let rgb = match Rgb::from_token_value(&ctx.resolved) {
            Some(rgb) => rgb,
            None => return Ok(None),
        };
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
        Ok(Some(json!(rendered)))
    }
}

/// Render a float with at most `places` decimals, trailing zeros trimmed.
pub(crate) fn trim_float(value: f64, places: usize) -> String {
    let rendered = format!("{value:.places$}");
    let trimmed = rendered.trim_end_matches('0').trim_end_matches('.');
    if trimmed.is_empty() || trimmed == "-" {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}
