//! WCAG contrast rule

use serde_json::{json, Value};

use crate::diagnostics::Severity;
use crate::model::{contrast_ratio, JsonPointer, Rgb};

use super::{PolicyHandler, PolicyInput, PolicyRule, PolicyViolation};

/// `governance.wcagContrast` - checks configured foreground/background pairs
/// against a minimum contrast ratio.
///
/// Options: `{"pairs": [{"foreground": "#/color/fg", "background":
/// "#/color/bg", "minimum": 4.5, "label": "body text"}]}`.
pub struct WcagContrastRule;

impl PolicyRule for WcagContrastRule {
    fn name(&self) -> &'static str {
        "governance.wcagContrast"
    }

    fn setup(&self, options: Option<&Value>) -> anyhow::Result<Box<dyn PolicyHandler>> {
        let pairs = options
            .and_then(|o| o.get("pairs"))
            .and_then(Value::as_array)
            .ok_or_else(|| anyhow::anyhow!("wcagContrast needs a 'pairs' list"))?;

        let mut parsed = Vec::with_capacity(pairs.len());
        for pair in pairs {
            let foreground = pair
                .get("foreground")
                .and_then(Value::as_str)
                .ok_or_else(|| anyhow::anyhow!("pair is missing 'foreground'"))?;
            let background = pair
                .get("background")
                .and_then(Value::as_str)
                .ok_or_else(|| anyhow::anyhow!("pair is missing 'background'"))?;
            let minimum = pair
                .get("minimum")
                .and_then(Value::as_f64)
                .ok_or_else(|| anyhow::anyhow!("pair is missing a numeric 'minimum'"))?;
            parsed.push(ContrastPair {
                foreground: JsonPointer::parse(foreground),
                background: JsonPointer::parse(background),
                minimum,
                label: pair
                    .get("label")
                    .and_then(Value::as_str)
                    .map(String::from),
            });
        }
        if parsed.is_empty() {
            anyhow::bail!("wcagContrast needs at least one pair");
        }

        Ok(Box::new(ContrastHandler { pairs: parsed }))
    }
}

struct ContrastPair {
    foreground: JsonPointer,
    background: JsonPointer,
    minimum: f64,
    label: Option<String>,
}

struct ContrastHandler {
    pairs: Vec<ContrastPair>,
}

impl PolicyHandler for ContrastHandler {
    fn evaluate(&self, input: &PolicyInput) -> anyhow::Result<Vec<PolicyViolation>> {
        let mut violations = Vec::new();

        for pair in &self.pairs {
            let foreground = match color_at(input, &pair.foreground) {
                Ok(color) => color,
                Err(message) => {
                    violations.push(missing_token_violation(pair, &pair.foreground, message));
                    continue;
                }
            };
            let background = match color_at(input, &pair.background) {
                Ok(color) => color,
                Err(message) => {
                    violations.push(missing_token_violation(pair, &pair.background, message));
                    continue;
                }
            };

            let ratio = contrast_ratio(&foreground, &background);
            if ratio < pair.minimum {
                let label = pair
                    .label
                    .clone()
                    .unwrap_or_else(|| format!("{} on {}", pair.foreground, pair.background));
                violations.push(
                    PolicyViolation::new(
                        "governance.wcagContrast",
                        pair.foreground.encoded().to_string(),
                        Severity::Error,
                        format!(
                            "contrast {:.2}:1 for '{label}' is below the required {:.2}:1",
                            ratio, pair.minimum
                        ),
                    )
                    .with_details(json!({
                        "reason": "contrast-below-threshold",
                        "ratio": ratio,
                        "minimum": pair.minimum,
                        "foreground": pair.foreground.encoded(),
                        "background": pair.background.encoded(),
                        "label": pair.label,
                    })),
                );
            }
        }

        Ok(violations)
    }
}

fn color_at(input: &PolicyInput, pointer: &JsonPointer) -> Result<Rgb, String> {
    let snapshot = input
        .get(pointer)
        .ok_or_else(|| format!("no token at {pointer}"))?;
    let value = snapshot
        .value()
        .ok_or_else(|| format!("token {pointer} did not resolve"))?;
    Rgb::from_token_value(&value).ok_or_else(|| format!("token {pointer} is not an sRGB color"))
}

fn missing_token_violation(
    pair: &ContrastPair,
    pointer: &JsonPointer,
    message: String,
) -> PolicyViolation {
    PolicyViolation::new(
        "governance.wcagContrast",
        pointer.encoded().to_string(),
        Severity::Error,
        message,
    )
    .with_details(json!({
        "reason": "token-not-found",
        "foreground": pair.foreground.encoded(),
        "background": pair.background.encoded(),
    }))
}
