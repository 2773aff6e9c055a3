//! Color math for transforms and governance policies
//!
//! Covers the conversions the pipeline needs: sRGB transfer functions, WCAG
//! relative luminance and contrast ratio, and the OKLab/OKLCH round trip.
//! The OKLab matrices are the published reference constants; keep them in
//! sync with the reference implementation if they are ever touched.

use serde_json::Value;

/// An sRGB color with components in `0.0..=1.0` and optional alpha.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgb {
    pub r: f64,
    pub g: f64,
    pub b: f64,
    pub alpha: Option<f64>,
}

/// OKLab coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OkLab {
    pub l: f64,
    pub a: f64,
    pub b: f64,
}

/// OKLCH coordinates; hue in degrees, `0.0..360.0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OkLch {
    pub l: f64,
    pub c: f64,
    pub h: f64,
}

impl Rgb {
    pub fn new(r: f64, g: f64, b: f64) -> Self {
        Self {
            r,
            g,
            b,
            alpha: None,
        }
    }

    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = Some(alpha);
        self
    }

    /// Extract an sRGB color from a DTIF color token value.
    ///
    /// Accepts the structured form
    /// `{ "colorSpace": "srgb", "components": [r, g, b], "alpha"?, "hex"? }`
    /// and the shorthand hex string form `"#RRGGBB"` / `"#RRGGBBAA"`.
    pub fn from_token_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => parse_hex(s),
            Value::Object(map) => {
                let space = map.get("colorSpace").and_then(Value::as_str);
                if let Some(space) = space {
                    if space != "srgb" {
                        return None;
                    }
                }
                let components = map.get("components").and_then(Value::as_array)?;
                if components.len() < 3 {
                    return None;
                }
                let r = components[0].as_f64()?;
                let g = components[1].as_f64()?;
                let b = components[2].as_f64()?;
                let alpha = map.get("alpha").and_then(Value::as_f64);
                Some(Self { r, g, b, alpha })
            }
            _ => None,
        }
    }

    /// Uppercase `#RRGGBB` (or `#RRGGBBAA` when alpha is present and < 1).
    pub fn to_hex(&self) -> String {
        let to_byte = |c: f64| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
        match self.alpha {
            Some(a) if a < 1.0 => format!(
                "#{:02X}{:02X}{:02X}{:02X}",
                to_byte(self.r),
                to_byte(self.g),
                to_byte(self.b),
                to_byte(a)
            ),
            _ => format!(
                "#{:02X}{:02X}{:02X}",
                to_byte(self.r),
                to_byte(self.g),
                to_byte(self.b)
            ),
        }
    }

    /// WCAG relative luminance.
    pub fn relative_luminance(&self) -> f64 {
        let r = srgb_to_linear(self.r);
        let g = srgb_to_linear(self.g);
        let b = srgb_to_linear(self.b);
        0.2126 * r + 0.7152 * g + 0.0722 * b
    }

    pub fn to_oklab(&self) -> OkLab {
        let r = srgb_to_linear(self.r);
        let g = srgb_to_linear(self.g);
        let b = srgb_to_linear(self.b);

        let l = 0.4122214708 * r + 0.5363325363 * g + 0.0514459929 * b;
        let m = 0.2119034982 * r + 0.6806995451 * g + 0.1073969566 * b;
        let s = 0.0883024619 * r + 0.2817188376 * g + 0.6299787005 * b;

        let l_ = l.cbrt();
        let m_ = m.cbrt();
        let s_ = s.cbrt();

        OkLab {
            l: 0.2104542553 * l_ + 0.7936177850 * m_ - 0.0040720468 * s_,
            a: 1.9779984951 * l_ - 2.4285922050 * m_ + 0.4505937099 * s_,
            b: 0.0259040371 * l_ + 0.7827717662 * m_ - 0.8086757660 * s_,
        }
    }

    pub fn to_oklch(&self) -> OkLch {
        self.to_oklab().to_oklch()
    }
}

impl OkLab {
    pub fn to_oklch(&self) -> OkLch {
        let c = (self.a * self.a + self.b * self.b).sqrt();
        let mut h = self.b.atan2(self.a).to_degrees();
        if h < 0.0 {
            h += 360.0;
        }
        OkLch {
            l: self.l,
            c,
            h,
        }
    }

    pub fn to_rgb(&self) -> Rgb {
        let l_ = self.l + 0.3963377774 * self.a + 0.2158037573 * self.b;
        let m_ = self.l - 0.1055613458 * self.a - 0.0638541728 * self.b;
        let s_ = self.l - 0.0894841775 * self.a - 1.2914855480 * self.b;

        let l = l_ * l_ * l_;
        let m = m_ * m_ * m_;
        let s = s_ * s_ * s_;

        let r = 4.0767416621 * l - 3.3077115913 * m + 0.2309699292 * s;
        let g = -1.2684380046 * l + 2.6097574011 * m - 0.3413193965 * s;
        let b = -0.0041960863 * l - 0.7034186147 * m + 1.7076147010 * s;

        Rgb::new(
            linear_to_srgb(r).clamp(0.0, 1.0),
            linear_to_srgb(g).clamp(0.0, 1.0),
            linear_to_srgb(b).clamp(0.0, 1.0),
        )
    }
}

impl OkLch {
    pub fn to_oklab(&self) -> OkLab {
        let rad = self.h.to_radians();
        OkLab {
            l: self.l,
            a: self.c * rad.cos(),
            b: self.c * rad.sin(),
        }
    }

    pub fn to_rgb(&self) -> Rgb {
        self.to_oklab().to_rgb()
    }
}

/// WCAG contrast ratio between two colors, `(L1 + 0.05) / (L2 + 0.05)` with
/// the lighter luminance in the numerator.
pub fn contrast_ratio(a: &Rgb, b: &Rgb) -> f64 {
    let la = a.relative_luminance();
    let lb = b.relative_luminance();
    let (lighter, darker) = if la >= lb { (la, lb) } else { (lb, la) };
    (lighter + 0.05) / (darker + 0.05)
}

/// sRGB transfer function, encoded component → linear.
pub fn srgb_to_linear(c: f64) -> f64 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

/// sRGB transfer function, linear component → encoded.
pub fn linear_to_srgb(c: f64) -> f64 {
    if c <= 0.0031308 {
        12.92 * c
    } else {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    }
}

/// Parse `#RGB`, `#RRGGBB`, or `#RRGGBBAA`.
pub fn parse_hex(input: &str) -> Option<Rgb> {
    let digits = input.strip_prefix('#')?;
    let from_pair = |pair: &str| u8::from_str_radix(pair, 16).ok().map(|v| v as f64 / 255.0);
    match digits.len() {
        3 => {
            let mut chars = digits.chars();
            let r = chars.next()?;
            let g = chars.next()?;
            let b = chars.next()?;
            Some(Rgb::new(
                from_pair(&format!("{r}{r}"))?,
                from_pair(&format!("{g}{g}"))?,
                from_pair(&format!("{b}{b}"))?,
            ))
        }
        6 => Some(Rgb::new(
            from_pair(&digits[0..2])?,
            from_pair(&digits[2..4])?,
            from_pair(&digits[4..6])?,
        )),
        8 => Some(
            Rgb::new(
                from_pair(&digits[0..2])?,
                from_pair(&digits[2..4])?,
                from_pair(&digits[4..6])?,
            )
            .with_alpha(from_pair(&digits[6..8])?),
        ),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn close(a: f64, b: f64, eps: f64) -> bool {
        (a - b).abs() < eps
    }

    #[test]
    fn white_luminance_is_one() {
        let white = Rgb::new(1.0, 1.0, 1.0);
        assert!(close(white.relative_luminance(), 1.0, 1e-9));
        assert!(close(Rgb::new(0.0, 0.0, 0.0).relative_luminance(), 0.0, 1e-9));
    }

    #[test]
    fn black_on_white_contrast_is_21() {
        let ratio = contrast_ratio(&Rgb::new(0.0, 0.0, 0.0), &Rgb::new(1.0, 1.0, 1.0));
        assert!(close(ratio, 21.0, 1e-9));
        // Symmetric in argument order.
        let flipped = contrast_ratio(&Rgb::new(1.0, 1.0, 1.0), &Rgb::new(0.0, 0.0, 0.0));
        assert!(close(ratio, flipped, 1e-12));
    }

    #[test]
    fn oklab_reference_white() {
        // Reference: sRGB white maps to L=1, a=b=0 in OKLab.
        let lab = Rgb::new(1.0, 1.0, 1.0).to_oklab();
        assert!(close(lab.l, 1.0, 1e-3));
        assert!(close(lab.a, 0.0, 1e-3));
        assert!(close(lab.b, 0.0, 1e-3));
    }

    #[test]
    fn oklab_round_trip() {
        let original = Rgb::new(0.25, 0.5, 0.75);
        let back = original.to_oklch().to_rgb();
        assert!(close(original.r, back.r, 1e-6));
        assert!(close(original.g, back.g, 1e-6));
        assert!(close(original.b, back.b, 1e-6));
    }

    #[test]
    fn hex_round_trip() {
        let color = parse_hex("#1A334C").unwrap();
        assert_eq!(color.to_hex(), "#1A334C");
        let with_alpha = parse_hex("#1A334C80").unwrap();
        assert!(close(with_alpha.alpha.unwrap(), 128.0 / 255.0, 1e-9));
        assert_eq!(with_alpha.to_hex(), "#1A334C80");
    }

    #[test]
    fn short_hex() {
        let color = parse_hex("#fff").unwrap();
        assert!(close(color.r, 1.0, 1e-9));
        assert!(close(color.g, 1.0, 1e-9));
        assert!(close(color.b, 1.0, 1e-9));
    }

    #[test]
    fn token_value_forms() {
        let structured = json!({"colorSpace": "srgb", "components": [0.1, 0.2, 0.3]});
        let parsed = Rgb::from_token_value(&structured).unwrap();
        assert!(close(parsed.r, 0.1, 1e-12));
        assert!(close(parsed.b, 0.3, 1e-12));

        let hex = json!("#336699");
        assert!(Rgb::from_token_value(&hex).is_some());

        let other_space = json!({"colorSpace": "display-p3", "components": [0.1, 0.2, 0.3]});
        assert!(Rgb::from_token_value(&other_space).is_none());
    }
}
