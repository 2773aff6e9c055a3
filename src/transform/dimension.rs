//! Dimension transforms (`web/base` group)

use serde_json::{json, Value};

use crate::model::TokenType;

use super::color::trim_float;
use super::{Transform, TransformContext, TransformSelector};

/// Extract `(value, unit)` from a dimension token value.
///
/// Accepts the structured form `{"value": 16, "unit": "px"}` and bare
/// numbers, which are treated as pixels.
pub fn parse_dimension(value: &Value) -> Option<(f64, String)> {
    match value {
        Value::Number(n) => n.as_f64().map(|v| (v, "px".to_string())),
        Value::Object(map) => {
            let magnitude = map.get("value").and_then(Value::as_f64)?;
            let unit = map
                .get("unit")
                .and_then(Value::as_str)
                .unwrap_or("px")
                .to_string();
            Some((magnitude, unit))
        }
        _ => None,
    }
}

/// `dimension/rem` - convert pixel dimensions to rem.
///
/// Options: `{"basePx": 16}` overrides the root font size. Non-pixel units
/// pass through unchanged.
pub struct RemTransform;

impl Transform for RemTransform {
    fn name(&self) -> &'static str {
        "dimension/rem"
    }

    fn group(&self) -> &'static str {
        "web/base"
    }

    fn selector(&self) -> TransformSelector {
        TransformSelector::for_types(&[TokenType::Dimension])
    }

    fn run(&self, ctx: &TransformContext) -> anyhow::Result<Option<Value>> {
        let (magnitude, unit) = match parse_dimension(&ctx.resolved) {
            Some(parsed) => parsed,
            None => return Ok(None),
        };

        if unit != "px" {
            return Ok(Some(json!(format!(
                "{}{unit}",
                trim_float(magnitude, 4)
            ))));
        }

        let base = ctx
            .options
            .and_then(|o| o.get("basePx"))
            .and_then(Value::as_f64)
            .unwrap_or(16.0);
        Ok(Some(json!(format!(
            "{}rem",
            trim_float(magnitude / base, 4)
        ))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{JsonPointer, Provenance, TokenSet, TokenSnapshot};
    use serde_json::json;

    fn dimension_snapshot() -> TokenSnapshot {
        let mut snapshot = TokenSnapshot::parsed(
            JsonPointer::parse("#/spacing/md"),
            json!({}),
            Provenance {
                source_id: "s".into(),
                layer: "base".into(),
                layer_index: 0,
                uri: "t.json".into(),
                pointer_prefix: JsonPointer::root(),
            },
        );
        snapshot.token_type = Some(TokenType::Dimension);
        snapshot
    }

    fn run(resolved: Value, options: Option<Value>) -> Option<Value> {
        let tokens = TokenSet::new();
        let snapshot = dimension_snapshot();
        let ctx = TransformContext {
            snapshot: &snapshot,
            resolved,
            raw: json!({}),
            options: options.as_ref(),
            tokens: &tokens,
        };
        RemTransform.run(&ctx).unwrap()
    }

    #[test]
    fn pixels_convert_at_default_base() {
        let out = run(json!({"value": 24, "unit": "px"}), None).unwrap();
        assert_eq!(out, json!("1.5rem"));
    }

    #[test]
    fn base_px_option_changes_the_ratio() {
        let out = run(json!({"value": 20, "unit": "px"}), Some(json!({"basePx": 10}))).unwrap();
        assert_eq!(out, json!("2rem"));
    }

    #[test]
    fn non_px_units_pass_through() {
        let out = run(json!({"value": 50, "unit": "%"}), None).unwrap();
        assert_eq!(out, json!("50%"));
    }

    #[test]
    fn bare_numbers_are_pixels() {
        let out = run(json!(8), None).unwrap();
        assert_eq!(out, json!("0.5rem"));
    }

    #[test]
    fn parse_rejects_strings() {
        assert!(parse_dimension(&json!("16px")).is_none());
    }
}
