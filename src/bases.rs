//! Specialised color bases: hex strings, named colors, `transparent`,
//! `currentcolor`, system colors, `color-mix()`, `device-cmyk()`,
//! `light-dark()` and `contrast-color()`.

use std::sync::Arc;

use crate::calc::{self, CalcContext};
use crate::color::{Color, HueMethod, MixOptions};
use crate::config;
use crate::error::{Error, Result};
use crate::expr::{tokenize, Token, Unit};
use crate::model::{ColorType, ComponentEnv, FormatOptions, Parsed};
use crate::parser::split_call;
use crate::registry;

/// Split on top-level commas, leaving nested calls intact.
fn split_top_level(input: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut current = String::new();
    for ch in input.chars() {
        match ch {
            '(' => {
                depth += 1;
                current.push(ch);
            }
            ')' => {
                depth = depth.saturating_sub(1);
                current.push(ch);
            }
            ',' if depth == 0 => {
                parts.push(current.trim().to_string());
                current = String::new();
            }
            _ => current.push(ch),
        }
    }
    parts.push(current.trim().to_string());
    parts
}

// ============================================================================
// hex-color
// ============================================================================

struct HexColor;

fn hex_digits(input: &str) -> Option<&str> {
    let digits = input.strip_prefix('#')?;
    let valid_len = matches!(digits.len(), 3 | 4 | 6 | 8);
    if valid_len && digits.chars().all(|c| c.is_ascii_hexdigit()) {
        Some(digits)
    } else {
        None
    }
}

fn hex_pair(digits: &[u8], i: usize) -> f64 {
    let text = std::str::from_utf8(&digits[i..i + 2]).expect("ascii hex");
    u8::from_str_radix(text, 16).expect("validated hex") as f64
}

impl ColorType for HexColor {
    fn is_valid(&self, input: &str) -> bool {
        hex_digits(input).is_some()
    }

    fn parse(&self, input: &str) -> Result<Parsed> {
        let digits = hex_digits(input)
            .ok_or_else(|| Error::Parse(format!("invalid hex color {:?}", input)))?;

        // Short forms double every digit.
        let expanded: Vec<u8> = if digits.len() <= 4 {
            digits.bytes().flat_map(|b| [b, b]).collect()
        } else {
            digits.bytes().collect()
        };

        let coords = [
            hex_pair(&expanded, 0),
            hex_pair(&expanded, 2),
            hex_pair(&expanded, 4),
            if expanded.len() == 8 {
                hex_pair(&expanded, 6) / 255.0
            } else {
                1.0
            },
        ];

        Ok(Parsed {
            model: "rgb".into(),
            coords,
        })
    }

    fn format(&self, color: &Color, _options: &FormatOptions) -> Result<String> {
        let rgb = color.in_model("rgb")?;
        let coords = rgb.coords();
        let channel = |v: f64| (v.round().clamp(0.0, 255.0)) as u8;
        let mut out = format!(
            "#{:02X}{:02X}{:02X}",
            channel(coords[0]),
            channel(coords[1]),
            channel(coords[2])
        );
        if coords[3] < 1.0 {
            out.push_str(&format!("{:02X}", (coords[3].clamp(0.0, 1.0) * 255.0).round() as u8));
        }
        Ok(out)
    }
}

/// The `#rgb`/`#rgba`/`#rrggbb`/`#rrggbbaa` base.
pub(crate) fn hex_color_type() -> Arc<dyn ColorType> {
    Arc::new(HexColor)
}

// ============================================================================
// named-color
// ============================================================================

struct NamedColor;

impl ColorType for NamedColor {
    fn is_valid(&self, input: &str) -> bool {
        !input.is_empty()
            && input.chars().all(|c| c.is_ascii_alphabetic())
            && registry::named_color(input).is_some()
    }

    fn parse(&self, input: &str) -> Result<Parsed> {
        let rgb = registry::named_color(input)
            .ok_or_else(|| Error::Parse(format!("unknown color name {:?}", input)))?;
        Ok(Parsed {
            model: "rgb".into(),
            coords: [rgb[0] as f64, rgb[1] as f64, rgb[2] as f64, 1.0],
        })
    }

    fn format(&self, color: &Color, _options: &FormatOptions) -> Result<String> {
        let rgb = color.in_model("rgb")?;
        let coords = rgb.coords();
        let rounded = [
            coords[0].round().clamp(0.0, 255.0) as u8,
            coords[1].round().clamp(0.0, 255.0) as u8,
            coords[2].round().clamp(0.0, 255.0) as u8,
        ];
        registry::named_color_by_value(rounded).ok_or_else(|| Error::UnsupportedFormat {
            model: color.model().to_string(),
            target: "named-color".into(),
            reason: format!("no registered name for rgb({} {} {})", rounded[0], rounded[1], rounded[2]),
        })
    }
}

/// The `<named-color>` base.
pub(crate) fn named_color_type() -> Arc<dyn ColorType> {
    Arc::new(NamedColor)
}

// ============================================================================
// transparent / currentcolor
// ============================================================================

struct Transparent;

impl ColorType for Transparent {
    fn is_valid(&self, input: &str) -> bool {
        input == "transparent"
    }

    fn parse(&self, input: &str) -> Result<Parsed> {
        if input != "transparent" {
            return Err(Error::Parse(format!("{:?} is not 'transparent'", input)));
        }
        Ok(Parsed {
            model: "rgb".into(),
            coords: [0.0, 0.0, 0.0, 0.0],
        })
    }
}

/// The literal `transparent`.
pub(crate) fn transparent_type() -> Arc<dyn ColorType> {
    Arc::new(Transparent)
}

struct CurrentColor;

impl ColorType for CurrentColor {
    fn is_valid(&self, input: &str) -> bool {
        input == "currentcolor"
    }

    fn parse(&self, input: &str) -> Result<Parsed> {
        if input != "currentcolor" {
            return Err(Error::Parse(format!("{:?} is not 'currentcolor'", input)));
        }
        Ok(Parsed {
            model: "rgb".into(),
            coords: [0.0, 0.0, 0.0, 1.0],
        })
    }
}

/// The literal `currentcolor`, opaque black in this engine.
pub(crate) fn currentcolor_type() -> Arc<dyn ColorType> {
    Arc::new(CurrentColor)
}

// ============================================================================
// <system-color>
// ============================================================================

struct SystemColor;

impl ColorType for SystemColor {
    fn is_valid(&self, input: &str) -> bool {
        !input.is_empty()
            && input.chars().all(|c| c.is_ascii_alphabetic())
            && config::system_color(input).is_some()
    }

    fn parse(&self, input: &str) -> Result<Parsed> {
        let rgb = config::system_color(input)
            .ok_or_else(|| Error::Parse(format!("unknown system color {:?}", input)))?;
        Ok(Parsed {
            model: "rgb".into(),
            coords: [rgb[0] as f64, rgb[1] as f64, rgb[2] as f64, 1.0],
        })
    }
}

/// The `<system-color>` table, resolved against the active theme.
pub(crate) fn system_color_type() -> Arc<dyn ColorType> {
    Arc::new(SystemColor)
}

// ============================================================================
// color-mix()
// ============================================================================

struct ColorMix;

fn parse_mix_weight(token: &Token) -> Result<f64> {
    match token {
        Token::Number {
            value,
            unit: Unit::Percent,
        } => Ok(value / 100.0),
        Token::Call(text) if text.starts_with("calc(") => {
            let inner = text
                .strip_prefix("calc(")
                .and_then(|rest| rest.strip_suffix(')'))
                .ok_or_else(|| Error::Parse(format!("malformed weight {:?}", text)))?;
            let env = ComponentEnv::new();
            let ctx = CalcContext {
                range: (0.0, 100.0),
                percent_is_number: true,
                relative: false,
                env: &env,
            };
            Ok(calc::evaluate(inner, &ctx)? / 100.0)
        }
        other => Err(Error::Parse(format!(
            "expected a percentage mix weight, got {:?}",
            other
        ))),
    }
}

fn parse_mix_part(part: &str) -> Result<(String, Option<f64>)> {
    let tokens = tokenize(part)?;
    let mut iter = tokens.into_iter();
    let color = match iter.next() {
        Some(Token::Call(text)) => text,
        Some(Token::Ident(text)) => text,
        other => {
            return Err(Error::Parse(format!(
                "expected a color in color-mix(), got {:?}",
                other
            )))
        }
    };
    let weight = match iter.next() {
        None => None,
        Some(token) => Some(parse_mix_weight(&token)?),
    };
    if iter.next().is_some() {
        return Err(Error::Parse(format!(
            "unexpected trailing tokens in color-mix() part {:?}",
            part
        )));
    }
    Ok((color, weight))
}

impl ColorType for ColorMix {
    fn is_valid(&self, input: &str) -> bool {
        input.starts_with("color-mix(") && input.ends_with(')')
    }

    fn parse(&self, input: &str) -> Result<Parsed> {
        let (name, inner) = split_call(input)?;
        if name != "color-mix" {
            return Err(Error::Parse(format!("'{}' is not color-mix()", name)));
        }

        let parts = split_top_level(&inner);
        if parts.len() != 3 {
            return Err(Error::Parse(format!(
                "color-mix() takes an interpolation method and two colors, got {} part(s)",
                parts.len()
            )));
        }

        // "in <model> [<hue-method> hue]"
        let head: Vec<&str> = parts[0].split(' ').collect();
        if head.first() != Some(&"in") || head.len() < 2 {
            return Err(Error::Parse(
                "color-mix() must start with 'in <color-model>'".into(),
            ));
        }
        let model = registry::maybe_model(head[1]).ok_or(Error::Lookup {
            kind: "model",
            name: head[1].to_string(),
        })?;
        let hue = match head.len() {
            2 => HueMethod::Shorter,
            4 if head[3] == "hue" => {
                if model.hue_component().is_none() {
                    return Err(Error::Parse(format!(
                        "'{}' has no hue component to interpolate",
                        model.name
                    )));
                }
                head[2].parse::<HueMethod>()?
            }
            _ => {
                return Err(Error::Parse(format!(
                    "invalid interpolation method {:?}",
                    parts[0]
                )))
            }
        };

        let (color1, weight1) = parse_mix_part(&parts[1])?;
        let (color2, weight2) = parse_mix_part(&parts[2])?;

        let p1 = weight1.unwrap_or_else(|| 1.0 - weight2.unwrap_or(0.5));
        let p2 = weight2.unwrap_or(1.0 - p1);
        let total = p1 + p2;
        if total <= 0.0 {
            return Err(Error::Parse(
                "color-mix() weights must sum to a positive value".into(),
            ));
        }

        let first = Color::from_css(&color1)?.in_model(&model.name)?;
        let second = Color::from_css(&color2)?;
        let mixed = first.mix(
            &second,
            &MixOptions {
                amount: p2 / total,
                hue,
                ..MixOptions::default()
            },
        )?;

        let mut coords = mixed.coords();
        if total < 1.0 {
            coords[3] *= total;
        }

        Ok(Parsed {
            model: model.name.clone(),
            coords,
        })
    }
}

/// The `color-mix(in <model>, <c1>, <c2>)` base.
pub(crate) fn color_mix_type() -> Arc<dyn ColorType> {
    Arc::new(ColorMix)
}

// ============================================================================
// device-cmyk()
// ============================================================================

struct DeviceCmyk;

fn cmyk_component(token: &Token) -> Result<f64> {
    match token {
        Token::Number {
            value,
            unit: Unit::None,
        } => Ok(*value),
        Token::Number {
            value,
            unit: Unit::Percent,
        } => Ok(value / 100.0),
        Token::Ident(name) if name == "none" => Ok(0.0),
        other => Err(Error::Parse(format!(
            "invalid device-cmyk() component {:?}",
            other
        ))),
    }
}

fn cmyk_to_rgb(c: f64, m: f64, y: f64, k: f64) -> [f64; 3] {
    [
        (1.0 - (c * (1.0 - k) + k).min(1.0)) * 255.0,
        (1.0 - (m * (1.0 - k) + k).min(1.0)) * 255.0,
        (1.0 - (y * (1.0 - k) + k).min(1.0)) * 255.0,
    ]
}

impl ColorType for DeviceCmyk {
    fn is_valid(&self, input: &str) -> bool {
        input.starts_with("device-cmyk(") && input.ends_with(')')
    }

    fn parse(&self, input: &str) -> Result<Parsed> {
        let (name, inner) = split_call(input)?;
        if name != "device-cmyk" {
            return Err(Error::Parse(format!("'{}' is not device-cmyk()", name)));
        }

        let parts = split_top_level(&inner);
        let mut alpha = 1.0;
        let channels: Vec<f64>;

        if parts.len() >= 4 {
            // Legacy comma form: device-cmyk(c, m, y, k[, a]).
            if parts.len() > 5 {
                return Err(Error::Parse(
                    "too many comma-separated device-cmyk() values".into(),
                ));
            }
            let mut values = Vec::with_capacity(5);
            for part in &parts {
                let tokens = tokenize(part)?;
                if tokens.len() != 1 {
                    return Err(Error::Parse(format!(
                        "expected a single value per device-cmyk() slot, got {:?}",
                        part
                    )));
                }
                values.push(cmyk_component(&tokens[0])?);
            }
            if values.len() == 5 {
                alpha = values.pop().expect("five values").clamp(0.0, 1.0);
            }
            channels = values;
        } else {
            // Modern form, optionally with a fallback after the comma. The
            // fallback exists for devices with real CMYK profiles; the
            // naive conversion ignores it.
            let tokens = tokenize(&parts[0])?;
            let mut values = Vec::with_capacity(4);
            let mut iter = tokens.iter().peekable();
            for _ in 0..4 {
                let token = iter.next().ok_or_else(|| {
                    Error::Parse("device-cmyk() requires four components".into())
                })?;
                values.push(cmyk_component(token)?);
            }
            if let Some(Token::Slash) = iter.peek() {
                iter.next();
                let token = iter
                    .next()
                    .ok_or_else(|| Error::Parse("missing alpha value after '/'".into()))?;
                alpha = cmyk_component(token)?.clamp(0.0, 1.0);
            }
            if iter.next().is_some() {
                return Err(Error::Parse(
                    "unexpected trailing tokens in device-cmyk()".into(),
                ));
            }
            channels = values;
        }

        if channels.len() != 4 {
            return Err(Error::Parse(format!(
                "device-cmyk() requires four components, got {}",
                channels.len()
            )));
        }

        let rgb = cmyk_to_rgb(channels[0], channels[1], channels[2], channels[3]);
        Ok(Parsed {
            model: "rgb".into(),
            coords: [rgb[0], rgb[1], rgb[2], alpha],
        })
    }

    fn format(&self, color: &Color, options: &FormatOptions) -> Result<String> {
        let rgb = color.in_model("rgb")?;
        let coords = rgb.coords();
        let (r, g, b) = (
            (coords[0] / 255.0).clamp(0.0, 1.0),
            (coords[1] / 255.0).clamp(0.0, 1.0),
            (coords[2] / 255.0).clamp(0.0, 1.0),
        );

        let k = 1.0 - r.max(g).max(b);
        let (c, m, y) = if k >= 1.0 {
            (0.0, 0.0, 0.0)
        } else {
            (
                (1.0 - r - k) / (1.0 - k),
                (1.0 - g - k) / (1.0 - k),
                (1.0 - b - k) / (1.0 - k),
            )
        };

        let digits = options.precision.unwrap_or(4);
        let round = |v: f64| crate::math::round_to(v, digits);
        let fallback = rgb.to("rgb", &FormatOptions::default())?;
        let alpha = crate::math::round_to(coords[3].clamp(0.0, 1.0), 3);

        Ok(if alpha < 1.0 {
            format!(
                "device-cmyk({} {} {} {} / {}, {})",
                round(c),
                round(m),
                round(y),
                round(k),
                alpha,
                fallback
            )
        } else {
            format!(
                "device-cmyk({} {} {} {}, {})",
                round(c),
                round(m),
                round(y),
                round(k),
                fallback
            )
        })
    }
}

/// The `device-cmyk()` type with its naive RGB conversion.
pub(crate) fn device_cmyk_type() -> Arc<dyn ColorType> {
    Arc::new(DeviceCmyk)
}

// ============================================================================
// light-dark()
// ============================================================================

struct LightDark;

impl ColorType for LightDark {
    fn is_valid(&self, input: &str) -> bool {
        input.starts_with("light-dark(") && input.ends_with(')')
    }

    fn parse(&self, input: &str) -> Result<Parsed> {
        let (name, inner) = split_call(input)?;
        if name != "light-dark" {
            return Err(Error::Parse(format!("'{}' is not light-dark()", name)));
        }
        let parts = split_top_level(&inner);
        if parts.len() != 2 {
            return Err(Error::Parse(format!(
                "light-dark() takes two colors, got {}",
                parts.len()
            )));
        }
        let chosen = match config::theme() {
            config::Theme::Light => &parts[0],
            config::Theme::Dark => &parts[1],
        };
        let color = Color::from_css(chosen)?;
        Ok(Parsed {
            model: color.model().to_string(),
            coords: color.coords(),
        })
    }
}

/// The theme-resolving `light-dark()` type.
pub(crate) fn light_dark_type() -> Arc<dyn ColorType> {
    Arc::new(LightDark)
}

// ============================================================================
// contrast-color()
// ============================================================================

struct ContrastColor;

impl ColorType for ContrastColor {
    fn is_valid(&self, input: &str) -> bool {
        input.starts_with("contrast-color(") && input.ends_with(')')
    }

    fn parse(&self, input: &str) -> Result<Parsed> {
        let (name, inner) = split_call(input)?;
        if name != "contrast-color" {
            return Err(Error::Parse(format!("'{}' is not contrast-color()", name)));
        }
        let color = Color::from_css(&inner)?;
        let y = color.luminance()?;

        // Pick whichever of black and white contrasts more strongly.
        let white_contrast = 1.05 / (y + 0.05);
        let black_contrast = (y + 0.05) / 0.05;
        let value = if white_contrast >= black_contrast {
            255.0
        } else {
            0.0
        };

        Ok(Parsed {
            model: "rgb".into(),
            coords: [value, value, value, 1.0],
        })
    }
}

/// The `contrast-color()` type: black or white, whichever reads better.
pub(crate) fn contrast_color_type() -> Arc<dyn ColorType> {
    Arc::new(ContrastColor)
}
