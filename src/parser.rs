//! Per-model color-function parsing and formatting.
//!
//! One parser handles all four shapes the grammar allows:
//! legacy comma (`rgb(255, 0, 0)`), modern whitespace (`rgb(255 0 0 / .5)`),
//! relative (`rgb(from #f00 calc(r * .5) g b)`) and the `color(<space> ...)`
//! family. Component tokens are interpreted against the component's
//! declared kind, so a single interpreter serves every registered model.

use std::collections::HashMap;
use std::sync::Arc;

use crate::calc::{self, CalcContext};
use crate::color::Color;
use crate::error::{Error, Result};
use crate::expr::{extract_balanced_expression, tokenize, Token, Unit};
use crate::fit::{self, normalize_special};
use crate::model::{ColorModel, ColorType, ComponentEnv, FormatOptions, Parsed, ValueKind};

/// Split `name(payload)` into the function name and the payload between
/// the outer parens; trailing characters are an error.
pub(crate) fn split_call(input: &str) -> Result<(String, String)> {
    let open = input
        .find('(')
        .ok_or_else(|| Error::Parse(format!("expected a function call, got {:?}", input)))?;
    let name = input[..open].to_string();
    let (call, end) = extract_balanced_expression(input, open)?;
    if end != input.len() {
        return Err(Error::Parse(format!(
            "unexpected trailing characters after {:?}",
            &input[..end]
        )));
    }
    Ok((name, call[1..call.len() - 1].to_string()))
}

// ============================================================================
// Shape analysis
// ============================================================================

#[derive(Debug)]
struct Shape {
    relative: bool,
    origin: Option<String>,
    space: Option<String>,
    components: Vec<Token>,
    alpha: Option<Token>,
    comma_separated: bool,
}

fn analyze(tokens: &[Token], expect_space: bool) -> Result<Shape> {
    let mut pos = 0usize;

    let relative = matches!(tokens.first(), Some(Token::From));
    let mut origin = None;
    if relative {
        pos = 1;
        origin = Some(match tokens.get(pos) {
            Some(Token::Ident(s)) => s.clone(),
            Some(Token::Call(s)) => s.clone(),
            _ => {
                return Err(Error::Parse(
                    "expected an origin color after 'from'".into(),
                ))
            }
        });
        pos += 1;
    }

    let mut space = None;
    if expect_space {
        space = Some(match tokens.get(pos) {
            Some(Token::Ident(s)) => s.clone(),
            _ => {
                return Err(Error::Parse(
                    "expected a color space name inside color()".into(),
                ))
            }
        });
        pos += 1;
    }

    let rest = &tokens[pos..];
    let comma_separated = rest.iter().any(|t| matches!(t, Token::Comma));
    if relative && comma_separated {
        return Err(Error::Parse(
            "commas are not allowed in relative color syntax".into(),
        ));
    }

    let mut components = Vec::new();
    let mut alpha = None;

    if comma_separated {
        let mut groups: Vec<Vec<Token>> = vec![Vec::new()];
        for token in rest {
            match token {
                Token::Comma => groups.push(Vec::new()),
                Token::Slash => {
                    return Err(Error::Parse(
                        "'/' is not allowed in legacy comma syntax".into(),
                    ))
                }
                other => groups.last_mut().expect("non-empty").push(other.clone()),
            }
        }
        for group in &groups {
            if group.len() != 1 {
                return Err(Error::Parse(format!(
                    "expected exactly one value per comma-separated slot, got {}",
                    group.len()
                )));
            }
        }
        match groups.len() {
            3 => {
                components = groups.into_iter().map(|mut g| g.remove(0)).collect();
            }
            4 => {
                let mut iter = groups.into_iter().map(|mut g| g.remove(0));
                components = iter.by_ref().take(3).collect();
                alpha = iter.next();
            }
            n => {
                return Err(Error::Parse(format!(
                    "expected 3 or 4 comma-separated values, got {}",
                    n
                )))
            }
        }
    } else {
        let mut after_slash = false;
        for token in rest {
            match token {
                Token::Slash => {
                    if after_slash {
                        return Err(Error::Parse("unexpected second '/'".into()));
                    }
                    after_slash = true;
                }
                other => {
                    if after_slash {
                        if alpha.is_some() {
                            return Err(Error::Parse(
                                "unexpected token after the alpha value".into(),
                            ));
                        }
                        alpha = Some(other.clone());
                    } else {
                        components.push(other.clone());
                    }
                }
            }
        }
        if after_slash && alpha.is_none() {
            return Err(Error::Parse("missing alpha value after '/'".into()));
        }
        if components.len() != 3 {
            return Err(Error::Parse(format!(
                "expected 3 components, got {}",
                components.len()
            )));
        }
    }

    Ok(Shape {
        relative,
        origin,
        space,
        components,
        alpha,
        comma_separated,
    })
}

// ============================================================================
// Component evaluation
// ============================================================================

fn calc_inner(text: &str) -> Result<&str> {
    let inner = text
        .strip_prefix("calc(")
        .and_then(|rest| rest.strip_suffix(')'))
        .ok_or_else(|| Error::Parse(format!("expected a calc() expression, got {:?}", text)))?;
    Ok(inner)
}

fn evaluate_component(
    token: &Token,
    kind: ValueKind,
    env: &ComponentEnv,
    legacy: bool,
    relative: bool,
) -> Result<f64> {
    let range = kind.range();

    let value = match token {
        Token::Ident(name) if name == "none" => {
            if legacy {
                return Err(Error::Parse(
                    "'none' is not allowed in legacy comma syntax".into(),
                ));
            }
            0.0
        }
        Token::Ident(name) if env.contains_key(name.as_str()) => env[name.as_str()],
        Token::Ident(name) if name == "infinity" => range.1,
        Token::Ident(name) if name == "-infinity" => range.0,
        Token::Ident(name) if name == "nan" => 0.0,
        Token::Ident(name) => {
            return Err(Error::Parse(format!("unknown component value '{}'", name)))
        }
        Token::Call(text) => {
            let ctx = CalcContext {
                range,
                percent_is_number: kind == ValueKind::Percentage,
                relative,
                env,
            };
            calc::evaluate(calc_inner(text)?, &ctx)?
        }
        Token::Number { value, unit } => match kind {
            ValueKind::Angle => match unit {
                Unit::None => *value,
                Unit::Percent => {
                    if legacy || relative {
                        return Err(Error::Parse(
                            "percentages are not allowed for hue in this syntax".into(),
                        ));
                    }
                    value / 100.0 * 360.0
                }
                angle => angle.to_degrees(*value),
            },
            ValueKind::Percentage => match unit {
                Unit::Percent => *value,
                Unit::None => {
                    if legacy {
                        return Err(Error::Parse(
                            "bare numbers are not allowed for percentage components in legacy syntax"
                                .into(),
                        ));
                    }
                    *value
                }
                _ => {
                    return Err(Error::Parse(
                        "angle units are not allowed for percentage components".into(),
                    ))
                }
            },
            ValueKind::Range(min, max) => match unit {
                Unit::None => *value,
                Unit::Percent => calc::percent_to_range(*value, min, max),
                _ => {
                    return Err(Error::Parse(
                        "angle units are not allowed for numeric components".into(),
                    ))
                }
            },
        },
        Token::Comma | Token::Slash | Token::From => {
            return Err(Error::Parse(format!("unexpected token {:?}", token)))
        }
    };

    Ok(normalize_special(value, range))
}

fn evaluate_alpha(token: &Token, env: &ComponentEnv, relative: bool) -> Result<f64> {
    let value = match token {
        Token::Ident(name) if name == "none" => 0.0,
        Token::Ident(name) if env.contains_key(name.as_str()) => env[name.as_str()],
        Token::Ident(name) => {
            return Err(Error::Parse(format!("invalid alpha value '{}'", name)))
        }
        Token::Number { value, unit } => match unit {
            Unit::None => *value,
            Unit::Percent => value / 100.0,
            _ => return Err(Error::Parse("invalid unit on alpha value".into())),
        },
        Token::Call(text) => {
            let ctx = CalcContext {
                range: (0.0, 1.0),
                percent_is_number: false,
                relative,
                env,
            };
            calc::evaluate(calc_inner(text)?, &ctx)?
        }
        _ => return Err(Error::Parse(format!("unexpected alpha token {:?}", token))),
    };
    Ok(normalize_special(value, (0.0, 1.0)).clamp(0.0, 1.0))
}

/// In legacy syntax the numeric (range-typed) components must be uniformly
/// percentages or uniformly bare numbers.
fn check_legacy_mix(model: &ColorModel, components: &[Token]) -> Result<()> {
    let mut saw_percent = false;
    let mut saw_number = false;
    for (component, token) in model.components.iter().zip(components) {
        if !matches!(component.kind, ValueKind::Range(..)) {
            continue;
        }
        match token {
            Token::Number {
                unit: Unit::Percent,
                ..
            } => saw_percent = true,
            Token::Number {
                unit: Unit::None, ..
            } => saw_number = true,
            _ => {}
        }
    }
    if saw_percent && saw_number {
        return Err(Error::Parse(
            "legacy syntax cannot mix percentages and numbers".into(),
        ));
    }
    Ok(())
}

fn component_env(model: &ColorModel, coords: [f64; 4]) -> ComponentEnv {
    let mut env = HashMap::new();
    for component in &model.components {
        env.insert(component.name.clone(), coords[component.index]);
    }
    env.insert("alpha".to_string(), coords[3]);
    env
}

// ============================================================================
// Parsing entry points
// ============================================================================

/// Parse `name(...)` / `alpha_variant(...)` for a model function,
/// including relative syntax.
pub(crate) fn parse_with_model(model: &Arc<ColorModel>, input: &str) -> Result<Parsed> {
    let (name, inner) = split_call(input)?;
    let is_alpha_variant = model.alpha_variant.as_deref() == Some(name.as_str());
    if name != model.name && !is_alpha_variant {
        return Err(Error::Parse(format!(
            "'{}' is not the '{}' function",
            name, model.name
        )));
    }

    let tokens = tokenize(&inner)?;
    let shape = analyze(&tokens, false)?;

    if shape.comma_separated && !model.supports_legacy {
        return Err(Error::Parse(format!(
            "'{}' does not support legacy comma syntax",
            model.name
        )));
    }

    let env = match &shape.origin {
        Some(origin) => {
            let origin = Color::from_css(origin)?.in_model(&model.name)?;
            component_env(model, origin.coords())
        }
        None => ComponentEnv::new(),
    };

    if shape.comma_separated {
        check_legacy_mix(model, &shape.components)?;
    }

    let mut coords = [0.0, 0.0, 0.0, 1.0];
    for (component, token) in model.components.iter().zip(&shape.components) {
        coords[component.index] = evaluate_component(
            token,
            component.kind,
            &env,
            shape.comma_separated,
            shape.relative,
        )?;
    }
    if let Some(alpha) = &shape.alpha {
        coords[3] = evaluate_alpha(alpha, &env, shape.relative)?;
    }

    Ok(Parsed {
        model: model.name.clone(),
        coords,
    })
}

/// Parse `color(<space> ...)` for one registered space.
pub(crate) fn parse_with_space(space: &Arc<ColorModel>, input: &str) -> Result<Parsed> {
    let (name, inner) = split_call(input)?;
    if name != "color" {
        return Err(Error::Parse(format!(
            "'{}' is not the color() function",
            name
        )));
    }

    let tokens = tokenize(&inner)?;
    let shape = analyze(&tokens, true)?;

    if shape.comma_separated {
        return Err(Error::Parse("color() has no legacy comma form".into()));
    }
    let space_name = shape.space.as_deref().unwrap_or_default();
    if space_name != space.name {
        return Err(Error::Parse(format!(
            "color space '{}' does not match '{}'",
            space_name, space.name
        )));
    }

    let env = match &shape.origin {
        Some(origin) => {
            let origin = Color::from_css(origin)?.in_model(&space.name)?;
            component_env(space, origin.coords())
        }
        None => ComponentEnv::new(),
    };

    let mut coords = [0.0, 0.0, 0.0, 1.0];
    for (component, token) in space.components.iter().zip(&shape.components) {
        coords[component.index] =
            evaluate_component(token, component.kind, &env, false, shape.relative)?;
    }
    if let Some(alpha) = &shape.alpha {
        coords[3] = evaluate_alpha(alpha, &env, shape.relative)?;
    }

    Ok(Parsed {
        model: space.name.clone(),
        coords,
    })
}

// ============================================================================
// Formatting
// ============================================================================

fn fmt_number(value: f64) -> String {
    // Collapse negative zero so "-0" never reaches output.
    let value = if value == 0.0 { 0.0 } else { value };
    format!("{}", value)
}

/// Format coordinates in a model, applying fit, rounding and the
/// shape/unit rules.
pub(crate) fn format_model(
    model: &Arc<ColorModel>,
    coords: [f64; 4],
    options: &FormatOptions,
) -> Result<String> {
    let fitted = fit::fit(
        [coords[0], coords[1], coords[2]],
        model,
        options.fit.as_deref(),
        options.precision,
    )?;
    let alpha = {
        let a = normalize_special(coords[3], (0.0, 1.0)).clamp(0.0, 1.0);
        crate::math::round_to(a, 3)
    };

    let legacy = options.legacy && model.supports_legacy && !model.is_space;

    let mut parts = Vec::with_capacity(3);
    for component in &model.components {
        let mut text = fmt_number(fitted[component.index]);
        match component.kind {
            ValueKind::Percentage if options.units || legacy => text.push('%'),
            ValueKind::Angle if options.units => text.push_str("deg"),
            _ => {}
        }
        parts.push(text);
    }

    if model.is_space {
        return Ok(if alpha < 1.0 {
            format!(
                "color({} {} {} {} / {})",
                model.name,
                parts[0],
                parts[1],
                parts[2],
                fmt_number(alpha)
            )
        } else {
            format!("color({} {} {} {})", model.name, parts[0], parts[1], parts[2])
        });
    }

    if legacy {
        return Ok(if alpha < 1.0 {
            let name = model.alpha_variant.as_deref().unwrap_or(&model.name);
            format!(
                "{}({}, {}, {}, {})",
                name,
                parts[0],
                parts[1],
                parts[2],
                fmt_number(alpha)
            )
        } else {
            format!("{}({}, {}, {})", model.name, parts[0], parts[1], parts[2])
        });
    }

    Ok(if alpha < 1.0 {
        format!(
            "{}({} {} {} / {})",
            model.name,
            parts[0],
            parts[1],
            parts[2],
            fmt_number(alpha)
        )
    } else {
        format!("{}({} {} {})", model.name, parts[0], parts[1], parts[2])
    })
}

// ============================================================================
// Synthesized color types
// ============================================================================

struct ModelFunctionType {
    model: Arc<ColorModel>,
}

impl ColorType for ModelFunctionType {
    fn is_valid(&self, input: &str) -> bool {
        if !input.ends_with(')') {
            return false;
        }
        let mut prefix = String::with_capacity(self.model.name.len() + 1);
        prefix.push_str(&self.model.name);
        prefix.push('(');
        if input.starts_with(&prefix) {
            return true;
        }
        match &self.model.alpha_variant {
            Some(variant) => input.starts_with(&format!("{}(", variant)),
            None => false,
        }
    }

    fn parse(&self, input: &str) -> Result<Parsed> {
        parse_with_model(&self.model, input)
    }

    fn format(&self, color: &Color, options: &FormatOptions) -> Result<String> {
        let converted = color.in_model(&self.model.name)?;
        format_model(&self.model, converted.coords(), options)
    }
}

/// Wrap a registered model function in a color type.
pub(crate) fn model_type(model: Arc<ColorModel>) -> Arc<dyn ColorType> {
    Arc::new(ModelFunctionType { model })
}

struct SpaceFunctionType {
    space: Arc<ColorModel>,
}

fn color_call_space(input: &str) -> Option<String> {
    let (name, inner) = split_call(input).ok()?;
    if name != "color" {
        return None;
    }
    let tokens = tokenize(&inner).ok()?;
    let pos = if matches!(tokens.first(), Some(Token::From)) {
        2
    } else {
        0
    };
    match tokens.get(pos) {
        Some(Token::Ident(space)) => Some(space.clone()),
        _ => None,
    }
}

impl ColorType for SpaceFunctionType {
    fn is_valid(&self, input: &str) -> bool {
        input.starts_with("color(")
            && color_call_space(input).as_deref() == Some(self.space.name.as_str())
    }

    fn parse(&self, input: &str) -> Result<Parsed> {
        parse_with_space(&self.space, input)
    }

    fn format(&self, color: &Color, options: &FormatOptions) -> Result<String> {
        let converted = color.in_model(&self.space.name)?;
        format_model(&self.space, converted.coords(), options)
    }
}

/// Wrap a registered color space in a color type.
pub(crate) fn space_type(space: Arc<ColorModel>) -> Arc<dyn ColorType> {
    Arc::new(SpaceFunctionType { space })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry;

    fn model(name: &str) -> Arc<ColorModel> {
        registry::maybe_model(name).expect("builtin model")
    }

    #[test]
    fn test_modern_rgb() {
        let parsed = parse_with_model(&model("rgb"), "rgb(255 87 51)").unwrap();
        assert_eq!(parsed.model, "rgb");
        assert_eq!(parsed.coords, [255.0, 87.0, 51.0, 1.0]);
    }

    #[test]
    fn test_modern_alpha() {
        let parsed = parse_with_model(&model("rgb"), "rgb(255 87 51 / 0.5)").unwrap();
        assert_eq!(parsed.coords[3], 0.5);
    }

    #[test]
    fn test_legacy_rgb() {
        let parsed = parse_with_model(&model("rgb"), "rgb(255, 87, 51)").unwrap();
        assert_eq!(parsed.coords, [255.0, 87.0, 51.0, 1.0]);
        let parsed = parse_with_model(&model("rgb"), "rgba(255, 87, 51, 0.25)").unwrap();
        assert_eq!(parsed.coords[3], 0.25);
    }

    #[test]
    fn test_legacy_mixing_rejected() {
        assert!(parse_with_model(&model("rgb"), "rgb(100%, 87, 51)").is_err());
    }

    #[test]
    fn test_legacy_none_rejected() {
        assert!(parse_with_model(&model("rgb"), "rgb(none, 87, 51)").is_err());
    }

    #[test]
    fn test_percent_components() {
        let parsed = parse_with_model(&model("rgb"), "rgb(100% 0% 50%)").unwrap();
        assert_eq!(parsed.coords[0], 255.0);
        assert_eq!(parsed.coords[1], 0.0);
        assert_eq!(parsed.coords[2], 127.5);
    }

    #[test]
    fn test_hsl_units_and_none() {
        let parsed = parse_with_model(&model("hsl"), "hsl(0.5turn 100% 50%)").unwrap();
        assert_eq!(parsed.coords[0], 180.0);
        let parsed = parse_with_model(&model("hsl"), "hsl(none 0 50%)").unwrap();
        assert_eq!(parsed.coords[0], 0.0);
        assert_eq!(parsed.coords[1], 0.0);
        assert_eq!(parsed.coords[2], 50.0);
    }

    #[test]
    fn test_missing_alpha_after_slash() {
        assert!(parse_with_model(&model("rgb"), "rgb(1 2 3 /)").is_err());
    }

    #[test]
    fn test_wrong_component_count() {
        assert!(parse_with_model(&model("rgb"), "rgb(1 2)").is_err());
        assert!(parse_with_model(&model("rgb"), "rgb(1 2 3 4)").is_err());
    }

    #[test]
    fn test_relative_with_calc() {
        let parsed = parse_with_model(
            &model("rgb"),
            "rgb(from #ff0000 calc(r * 0.5) calc(g + 50) calc(b + 75))",
        )
        .unwrap();
        assert_eq!(parsed.coords[0], 127.5);
        assert_eq!(parsed.coords[1], 50.0);
        assert_eq!(parsed.coords[2], 75.0);
    }

    #[test]
    fn test_relative_component_references() {
        let parsed = parse_with_model(&model("hsl"), "hsl(from hsl(120 50% 40%) h s l)").unwrap();
        assert_eq!(parsed.coords[0], 120.0);
        assert_eq!(parsed.coords[1], 50.0);
        assert_eq!(parsed.coords[2], 40.0);
    }

    #[test]
    fn test_space_parse() {
        let space = registry::maybe_model("display-p3").unwrap();
        let parsed = parse_with_space(&space, "color(display-p3 1 0 0)").unwrap();
        assert_eq!(parsed.model, "display-p3");
        assert_eq!(parsed.coords, [1.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_space_percent() {
        let space = registry::maybe_model("srgb").unwrap();
        let parsed = parse_with_space(&space, "color(srgb 50% 0% 100%)").unwrap();
        assert_eq!(parsed.coords[0], 0.5);
        assert_eq!(parsed.coords[2], 1.0);
    }

    #[test]
    fn test_space_mismatch() {
        let space = registry::maybe_model("srgb").unwrap();
        assert!(parse_with_space(&space, "color(display-p3 1 0 0)").is_err());
    }

    #[test]
    fn test_format_modern() {
        let rgb = model("rgb");
        let out = format_model(&rgb, [255.0, 87.0, 51.0, 1.0], &FormatOptions::default()).unwrap();
        assert_eq!(out, "rgb(255 87 51)");
    }

    #[test]
    fn test_format_alpha() {
        let rgb = model("rgb");
        let out = format_model(&rgb, [255.0, 87.0, 51.0, 0.8], &FormatOptions::default()).unwrap();
        assert_eq!(out, "rgb(255 87 51 / 0.8)");
    }

    #[test]
    fn test_format_legacy() {
        let rgb = model("rgb");
        let options = FormatOptions {
            legacy: true,
            ..FormatOptions::default()
        };
        let out = format_model(&rgb, [255.0, 87.0, 51.0, 1.0], &options).unwrap();
        assert_eq!(out, "rgb(255, 87, 51)");
        let out = format_model(&rgb, [255.0, 87.0, 51.0, 0.5], &options).unwrap();
        assert_eq!(out, "rgba(255, 87, 51, 0.5)");
    }

    #[test]
    fn test_format_legacy_forces_percent_units() {
        let hsl = model("hsl");
        let options = FormatOptions {
            legacy: true,
            ..FormatOptions::default()
        };
        let out = format_model(&hsl, [120.0, 100.0, 50.0, 1.0], &options).unwrap();
        assert_eq!(out, "hsl(120, 100%, 50%)");
    }

    #[test]
    fn test_format_units() {
        let hsl = model("hsl");
        let options = FormatOptions {
            units: true,
            ..FormatOptions::default()
        };
        let out = format_model(&hsl, [120.0, 100.0, 50.0, 1.0], &options).unwrap();
        assert_eq!(out, "hsl(120deg 100% 50%)");
    }

    #[test]
    fn test_format_precision_override() {
        let rgb = model("rgb");
        let options = FormatOptions {
            precision: Some(4),
            ..FormatOptions::default()
        };
        let out = format_model(&rgb, [127.5, 50.0, 75.0, 1.0], &options).unwrap();
        assert_eq!(out, "rgb(127.5 50 75)");
    }

    #[test]
    fn test_format_space() {
        let space = registry::maybe_model("display-p3").unwrap();
        let out = format_model(&space, [1.0, 0.0, 0.0, 1.0], &FormatOptions::default()).unwrap();
        assert_eq!(out, "color(display-p3 1 0 0)");
    }
}
