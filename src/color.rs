//! The `Color` value type.
//!
//! A color is an immutable pair of a registered model name and four
//! coordinates (alpha at index 3). Every operation that changes anything
//! returns a fresh value; conversions run along the shortest path of the
//! registered graph.

use std::cell::Cell;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use rand::Rng;

use crate::error::{Error, Result};
use crate::expr::clean;
use crate::fit;
use crate::graph;
use crate::math::{normalize_hue, round_to, Easing};
use crate::model::{FormatOptions, ValueKind};
use crate::registry;

/// Nested color expressions (`color-mix` inside `from` inside ...) are
/// parsed recursively; hostile inputs are cut off at this depth.
const MAX_NESTING: usize = 64;

thread_local! {
    static NESTING: Cell<usize> = const { Cell::new(0) };
}

fn with_nesting<R>(f: impl FnOnce() -> Result<R>) -> Result<R> {
    NESTING.with(|depth| {
        if depth.get() >= MAX_NESTING {
            return Err(Error::Parse(format!(
                "color expression nesting exceeds {} levels",
                MAX_NESTING
            )));
        }
        depth.set(depth.get() + 1);
        let result = f();
        depth.set(depth.get() - 1);
        result
    })
}

// ============================================================================
// Options
// ============================================================================

/// Hue interpolation strategies for `mix` and `color-mix()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HueMethod {
    /// Take the shorter arc around the hue circle.
    #[default]
    Shorter,
    /// Take the longer arc.
    Longer,
    /// Force a monotonically increasing hue.
    Increasing,
    /// Force a monotonically decreasing hue.
    Decreasing,
}

impl FromStr for HueMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "shorter" => Ok(HueMethod::Shorter),
            "longer" => Ok(HueMethod::Longer),
            "increasing" => Ok(HueMethod::Increasing),
            "decreasing" => Ok(HueMethod::Decreasing),
            other => Err(Error::Parse(format!(
                "unknown hue interpolation method '{}'",
                other
            ))),
        }
    }
}

/// Options for [`Color::mix`].
#[derive(Debug, Clone, Copy)]
pub struct MixOptions {
    /// Mix position in [0, 1]; 0 keeps `self`, 1 yields `other`.
    pub amount: f64,
    /// Hue interpolation strategy.
    pub hue: HueMethod,
    /// Easing applied to `amount`.
    pub easing: Easing,
    /// Gamma correction applied after easing: `t' = ease(t)^(1/gamma)`.
    pub gamma: f64,
}

impl Default for MixOptions {
    fn default() -> Self {
        MixOptions {
            amount: 0.5,
            hue: HueMethod::Shorter,
            easing: Easing::Linear,
            gamma: 1.0,
        }
    }
}

/// A per-component bias applied to the uniform sample of
/// [`Color::random`].
pub type BiasFn = Box<dyn Fn(f64) -> f64 + Send + Sync>;

/// Options for [`Color::random`]. Component keys must name a component of
/// the chosen model (or `alpha`).
#[derive(Default)]
pub struct RandomOptions {
    /// Target model; picked uniformly from all registered models when
    /// absent.
    pub model: Option<String>,
    /// Intersect the sampling range per component.
    pub limits: HashMap<String, (f64, f64)>,
    /// Normal-distribution center per component (requires `deviation`).
    pub base: HashMap<String, f64>,
    /// Normal-distribution deviation per component (requires `base`).
    pub deviation: HashMap<String, f64>,
    /// Monotonic bias on the uniform sample per component.
    pub bias: HashMap<String, BiasFn>,
}

/// A single component change for [`Color::with`].
pub enum ComponentUpdate {
    /// Replace the component with a value.
    Set(f64),
    /// Map the previous value.
    Map(Box<dyn Fn(f64) -> f64>),
}

/// The three accepted shapes of [`Color::with`].
pub enum Update {
    /// Partial mapping from component name (or `alpha`) to an update.
    Map(HashMap<String, ComponentUpdate>),
    /// Positional values; `None` leaves a coordinate unchanged. Length 3
    /// or 4.
    Array(Vec<Option<f64>>),
    /// Computed from the current keyed coordinates.
    With(Box<dyn Fn(&HashMap<String, f64>) -> Update>),
}

// ============================================================================
// Color
// ============================================================================

/// An immutable color value: a registered model plus four coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct Color {
    model: String,
    coords: [f64; 4],
}

impl Color {
    /// Construct from a model name and 3 or 4 coordinates. NaN and the
    /// infinities are normalized against the component ranges.
    pub fn new(model: &str, coords: &[f64]) -> Result<Color> {
        let model = registry::model(model)?;
        let coords = match coords {
            [a, b, c] => [*a, *b, *c, 1.0],
            [a, b, c, alpha] => [*a, *b, *c, *alpha],
            _ => {
                return Err(Error::Validation(format!(
                    "expected 3 or 4 coordinates, got {}",
                    coords.len()
                )))
            }
        };
        Ok(Color {
            coords: fit::normalize_coords(coords, &model),
            model: model.name.clone(),
        })
    }

    /// Parse any registered color notation. The types are scanned in
    /// registration order; the first `is_valid` match commits.
    pub fn from_css(input: &str) -> Result<Color> {
        let cleaned = clean(input);
        with_nesting(|| {
            for (_, ty) in registry::types_snapshot() {
                if ty.is_valid(&cleaned) {
                    let parsed = ty.parse(&cleaned)?;
                    return Ok(Color {
                        model: parsed.model,
                        coords: parsed.coords,
                    });
                }
            }
            Err(Error::InvalidFormat(input.to_string()))
        })
    }

    /// Name of the first color type that recognizes the input. In strict
    /// mode a type only counts when its full parse succeeds; the scan
    /// continues past types that fail it.
    pub fn type_of(input: &str, strict: bool) -> Result<String> {
        let cleaned = clean(input);
        for (name, ty) in registry::types_snapshot() {
            if !ty.is_valid(&cleaned) {
                continue;
            }
            if !strict || ty.parse(&cleaned).is_ok() {
                return Ok(name);
            }
        }
        Err(Error::InvalidFormat(input.to_string()))
    }

    /// Whether the input parses, optionally as one specific type.
    pub fn is_valid(input: &str, type_name: Option<&str>) -> bool {
        match type_name {
            None => Color::from_css(input).is_ok(),
            Some(name) => {
                let cleaned = clean(input);
                match registry::format_target(name) {
                    Some(ty) => ty.is_valid(&cleaned) && ty.parse(&cleaned).is_ok(),
                    None => false,
                }
            }
        }
    }

    /// A random color. Bounded components sample uniformly (after limits
    /// and bias); `base`+`deviation` switch a component to a Box-Muller
    /// normal variate. Angles wrap, everything else clamps.
    pub fn random(options: &RandomOptions) -> Result<Color> {
        let mut rng = rand::thread_rng();

        let model = match &options.model {
            Some(name) => registry::model(name)?,
            None => {
                let names = registry::model_names();
                registry::model(&names[rng.gen_range(0..names.len())])?
            }
        };

        let known = |key: &String| key == "alpha" || model.component(key).is_some();
        for key in options
            .limits
            .keys()
            .chain(options.base.keys())
            .chain(options.deviation.keys())
            .chain(options.bias.keys())
        {
            if !known(key) {
                return Err(Error::Validation(format!(
                    "'{}' is not a component of '{}'",
                    key, model.name
                )));
            }
        }

        let mut coords = [0.0, 0.0, 0.0, 1.0];
        let slots: Vec<(String, usize, ValueKind)> = model
            .components
            .iter()
            .map(|c| (c.name.clone(), c.index, c.kind))
            .chain(std::iter::once((
                "alpha".to_string(),
                3,
                ValueKind::Range(0.0, 1.0),
            )))
            .collect();

        for (name, index, kind) in slots {
            let (min, max) = kind.range();

            let value = match (options.base.get(&name), options.deviation.get(&name)) {
                (Some(&base), Some(&deviation)) => {
                    if deviation < 0.0 {
                        return Err(Error::Numeric(format!(
                            "deviation for '{}' must not be negative",
                            name
                        )));
                    }
                    // Box-Muller on two uniforms.
                    let u1: f64 = 1.0 - rng.gen::<f64>();
                    let u2: f64 = rng.gen();
                    let z = (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos();
                    base + deviation * z
                }
                _ => {
                    let (mut lo, mut hi) = (min, max);
                    if let Some(&(limit_lo, limit_hi)) = options.limits.get(&name) {
                        lo = lo.max(limit_lo);
                        hi = hi.min(limit_hi);
                    }
                    if hi < lo {
                        return Err(Error::Validation(format!(
                            "limits for '{}' leave an empty range",
                            name
                        )));
                    }
                    let mut u: f64 = rng.gen();
                    if let Some(bias) = options.bias.get(&name) {
                        u = bias(u).clamp(0.0, 1.0);
                    }
                    lo + u * (hi - lo)
                }
            };

            coords[index] = match kind {
                ValueKind::Angle => normalize_hue(value),
                _ => value.clamp(min, max),
            };
        }

        Ok(Color {
            model: model.name.clone(),
            coords,
        })
    }

    /// The model name.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// The raw coordinates, alpha at index 3.
    pub fn coords(&self) -> [f64; 4] {
        self.coords
    }

    /// The alpha channel.
    pub fn alpha(&self) -> f64 {
        self.coords[3]
    }

    /// Convert into another model along the shortest registered path.
    pub fn in_model(&self, model: &str) -> Result<Color> {
        let target = registry::model(model)?;
        let converted = graph::convert(
            &self.model,
            &target.name,
            [self.coords[0], self.coords[1], self.coords[2]],
        )?;
        Ok(Color {
            model: target.name.clone(),
            coords: [converted[0], converted[1], converted[2], self.coords[3]],
        })
    }

    /// Format as the named color type (a model, a space or any registered
    /// base).
    pub fn to(&self, type_name: &str, options: &FormatOptions) -> Result<String> {
        let target = registry::format_target(type_name).ok_or(Error::Lookup {
            kind: "color type",
            name: type_name.to_string(),
        })?;
        target.format(self, options)
    }

    /// Format in the color's own model.
    pub fn to_css(&self, options: &FormatOptions) -> Result<String> {
        self.to(&self.model, options)
    }

    /// The fitted, rounded coordinate vector.
    pub fn to_array(&self, options: &FormatOptions) -> Result<[f64; 4]> {
        let model = registry::model(&self.model)?;
        let normalized = fit::normalize_coords(self.coords, &model);
        let fitted = fit::fit(
            [normalized[0], normalized[1], normalized[2]],
            &model,
            options.fit.as_deref(),
            options.precision,
        )?;
        let alpha = round_to(normalized[3].clamp(0.0, 1.0), 3);
        Ok([fitted[0], fitted[1], fitted[2], alpha])
    }

    /// The fitted, rounded coordinates keyed by component name plus
    /// `alpha`.
    pub fn to_object(&self, options: &FormatOptions) -> Result<HashMap<String, f64>> {
        let model = registry::model(&self.model)?;
        let array = self.to_array(options)?;
        let mut out = HashMap::with_capacity(4);
        for component in &model.components {
            out.insert(component.name.clone(), array[component.index]);
        }
        out.insert("alpha".to_string(), array[3]);
        Ok(out)
    }

    /// The current coordinates keyed by component name plus `alpha`,
    /// without fitting.
    fn keyed(&self) -> Result<HashMap<String, f64>> {
        let model = registry::model(&self.model)?;
        let mut out = HashMap::with_capacity(4);
        for component in &model.components {
            out.insert(component.name.clone(), self.coords[component.index]);
        }
        out.insert("alpha".to_string(), self.coords[3]);
        Ok(out)
    }

    /// Return a new color with some components changed.
    pub fn with(&self, update: Update) -> Result<Color> {
        let model = registry::model(&self.model)?;
        let update = match update {
            Update::With(f) => f(&self.keyed()?),
            other => other,
        };

        let mut coords = self.coords;
        match update {
            Update::Map(changes) => {
                for (key, change) in changes {
                    let index = if key == "alpha" {
                        3
                    } else {
                        model
                            .component(&key)
                            .ok_or_else(|| {
                                Error::Validation(format!(
                                    "'{}' is not a component of '{}'",
                                    key, model.name
                                ))
                            })?
                            .index
                    };
                    coords[index] = match change {
                        ComponentUpdate::Set(value) => value,
                        ComponentUpdate::Map(f) => f(coords[index]),
                    };
                }
            }
            Update::Array(values) => {
                if !matches!(values.len(), 3 | 4) {
                    return Err(Error::Validation(format!(
                        "expected 3 or 4 positional values, got {}",
                        values.len()
                    )));
                }
                for (index, value) in values.into_iter().enumerate() {
                    if let Some(value) = value {
                        coords[index] = value;
                    }
                }
            }
            Update::With(_) => {
                return Err(Error::Validation(
                    "update functions must not return another function".into(),
                ))
            }
        }

        Ok(Color {
            model: self.model.clone(),
            coords: fit::normalize_coords(coords, &model),
        })
    }

    /// Interpolate toward another color in this color's model. Alpha below
    /// 1 on either side switches to premultiplied interpolation; the hue
    /// component follows the selected hue arc.
    pub fn mix(&self, other: &Color, options: &MixOptions) -> Result<Color> {
        let other = other.in_model(&self.model)?;
        let amount = options.amount.clamp(0.0, 1.0);

        // The endpoints return unchanged, bypassing easing and gamma.
        if amount == 0.0 {
            return Ok(self.clone());
        }
        if amount == 1.0 {
            return Ok(other);
        }

        if !options.gamma.is_finite() || options.gamma <= 0.0 {
            return Err(Error::Numeric(format!(
                "gamma must be a positive number, got {}",
                options.gamma
            )));
        }
        let t = options.easing.apply(amount).powf(1.0 / options.gamma);

        let model = registry::model(&self.model)?;
        let hue_index = model.hue_component().map(|c| c.index);

        let a1 = self.coords[3].clamp(0.0, 1.0);
        let a2 = other.coords[3].clamp(0.0, 1.0);

        let mut coords = [0.0, 0.0, 0.0, 1.0];

        if let Some(index) = hue_index {
            coords[index] =
                interpolate_hue(self.coords[index], other.coords[index], t, options.hue);
        }

        if a1 < 1.0 || a2 < 1.0 {
            let alpha = a1 * (1.0 - t) + a2 * t;
            for index in 0..3 {
                if Some(index) == hue_index {
                    continue;
                }
                coords[index] = if alpha == 0.0 {
                    0.0
                } else {
                    (self.coords[index] * a1 * (1.0 - t) + other.coords[index] * a2 * t) / alpha
                };
            }
            coords[3] = alpha;
        } else {
            for index in 0..3 {
                if Some(index) == hue_index {
                    continue;
                }
                coords[index] = self.coords[index] * (1.0 - t) + other.coords[index] * t;
            }
        }

        Ok(Color {
            model: self.model.clone(),
            coords,
        })
    }

    /// Project into a gamut's space, apply the named fit method and come
    /// back to this color's model.
    pub fn within(&self, gamut: &str, method: &str) -> Result<Color> {
        let target = registry::model(gamut)?;
        let projected = self.in_model(&target.name)?;
        let fit_fn = registry::fit_method(method).ok_or(Error::Lookup {
            kind: "fit method",
            name: method.to_string(),
        })?;
        let fitted = fit_fn(
            [projected.coords[0], projected.coords[1], projected.coords[2]],
            target.as_ref(),
        )?;
        Color {
            model: target.name.clone(),
            coords: [fitted[0], fitted[1], fitted[2], self.coords[3]],
        }
        .in_model(&self.model)
    }

    /// Whether this color sits inside the named gamut (± 1e-5 per
    /// component). Unbounded gamuts contain everything.
    pub fn in_gamut(&self, gamut: &str) -> Result<bool> {
        self.in_gamut_eps(gamut, 1e-5)
    }

    /// [`Color::in_gamut`] with an explicit epsilon.
    pub fn in_gamut_eps(&self, gamut: &str, epsilon: f64) -> Result<bool> {
        let target = registry::model(gamut)?;
        match &target.target_gamut {
            crate::model::Gamut::Unbounded => Ok(true),
            crate::model::Gamut::Space(space) => {
                let converted = self.in_model(space)?;
                let space_model = registry::model(space)?;
                for component in &space_model.components {
                    let (min, max) = component.kind.range();
                    let value = converted.coords[component.index];
                    if value < min - epsilon || value > max + epsilon {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
        }
    }

    /// Component-wise equality within 1e-5; colors in different models are
    /// compared in XYZ-D65.
    pub fn equals(&self, other: &Color) -> bool {
        self.equals_eps(other, 1e-5)
    }

    /// [`Color::equals`] with an explicit epsilon.
    pub fn equals_eps(&self, other: &Color, epsilon: f64) -> bool {
        let (a, b) = if self.model == other.model {
            (self.clone(), other.clone())
        } else {
            match (self.in_model("xyz-d65"), other.in_model("xyz-d65")) {
                (Ok(a), Ok(b)) => (a, b),
                _ => return false,
            }
        };
        a.coords
            .iter()
            .zip(b.coords.iter())
            .all(|(x, y)| (x - y).abs() <= epsilon)
    }

    /// Relative luminance: the Y channel in XYZ-D65.
    pub fn luminance(&self) -> Result<f64> {
        Ok(self.in_model("xyz-d65")?.coords[1])
    }

    /// WCAG 2.1 contrast ratio.
    pub fn contrast(&self, other: &Color) -> Result<f64> {
        let y1 = self.luminance()?;
        let y2 = other.luminance()?;
        let (lighter, darker) = if y1 >= y2 { (y1, y2) } else { (y2, y1) };
        Ok((lighter + 0.05) / (darker + 0.05))
    }

    /// deltaEOK: Euclidean distance in OKLab, scaled by 100.
    pub fn delta_e_ok(&self, other: &Color) -> Result<f64> {
        let a = self.in_model("oklab")?.coords;
        let b = other.in_model("oklab")?.coords;
        let d = [a[0] - b[0], a[1] - b[1], a[2] - b[2]];
        Ok((d[0] * d[0] + d[1] * d[1] + d[2] * d[2]).sqrt() * 100.0)
    }

    /// CIE76: Euclidean distance in CIELAB.
    pub fn delta_e_76(&self, other: &Color) -> Result<f64> {
        let a = self.in_model("lab")?.coords;
        let b = other.in_model("lab")?.coords;
        let d = [a[0] - b[0], a[1] - b[1], a[2] - b[2]];
        Ok((d[0] * d[0] + d[1] * d[1] + d[2] * d[2]).sqrt())
    }

    /// CIE94, graphic-arts constants (kL=1, K1=0.045, K2=0.015).
    pub fn delta_e_94(&self, other: &Color) -> Result<f64> {
        let p = self.in_model("lab")?.coords;
        let q = other.in_model("lab")?.coords;
        let (l1, a1, b1) = (p[0], p[1], p[2]);
        let (l2, a2, b2) = (q[0], q[1], q[2]);

        let dl = l1 - l2;
        let c1 = a1.hypot(b1);
        let c2 = a2.hypot(b2);
        let dc = c1 - c2;

        let da = a1 - a2;
        let db = b1 - b2;
        let dh_sq = (da * da + db * db - dc * dc).max(0.0);

        let sc = 1.0 + 0.045 * c1;
        let sh = 1.0 + 0.015 * c1;

        let dc_term = dc / sc;
        let dh_term = dh_sq.sqrt() / sh;

        Ok((dl * dl + dc_term * dc_term + dh_term * dh_term).sqrt())
    }

    /// CIEDE2000 per Sharma's formulation (kL=kC=kH=1).
    pub fn delta_e_2000(&self, other: &Color) -> Result<f64> {
        use std::f64::consts::PI;
        const TWO_PI: f64 = 2.0 * PI;
        const POW25_7: f64 = 6103515625.0; // 25^7

        let p = self.in_model("lab")?.coords;
        let q = other.in_model("lab")?.coords;
        let (l1, a1, b1) = (p[0], p[1], p[2]);
        let (l2, a2, b2) = (q[0], q[1], q[2]);

        let c1_star = a1.hypot(b1);
        let c2_star = a2.hypot(b2);
        let c_bar = (c1_star + c2_star) / 2.0;

        let c_bar_7 = c_bar.powi(7);
        let g = 0.5 * (1.0 - (c_bar_7 / (c_bar_7 + POW25_7)).sqrt());

        let a1_prime = a1 * (1.0 + g);
        let a2_prime = a2 * (1.0 + g);

        let c1_prime = a1_prime.hypot(b1);
        let c2_prime = a2_prime.hypot(b2);

        let hue_angle = |a: f64, b: f64| {
            if a == 0.0 && b == 0.0 {
                0.0
            } else {
                let h = b.atan2(a);
                if h < 0.0 {
                    h + TWO_PI
                } else {
                    h
                }
            }
        };
        let h1_prime = hue_angle(a1_prime, b1);
        let h2_prime = hue_angle(a2_prime, b2);

        let dl_prime = l2 - l1;
        let dc_prime = c2_prime - c1_prime;

        let dh_prime = if c1_prime * c2_prime == 0.0 {
            0.0
        } else {
            let diff = h2_prime - h1_prime;
            if diff.abs() <= PI {
                diff
            } else if diff > PI {
                diff - TWO_PI
            } else {
                diff + TWO_PI
            }
        };
        let dh_prime_big = 2.0 * (c1_prime * c2_prime).sqrt() * (dh_prime / 2.0).sin();

        let l_bar_prime = (l1 + l2) / 2.0;
        let c_bar_prime = (c1_prime + c2_prime) / 2.0;

        let h_bar_prime = if c1_prime * c2_prime == 0.0 {
            h1_prime + h2_prime
        } else if (h1_prime - h2_prime).abs() <= PI {
            (h1_prime + h2_prime) / 2.0
        } else if h1_prime + h2_prime < TWO_PI {
            (h1_prime + h2_prime + TWO_PI) / 2.0
        } else {
            (h1_prime + h2_prime - TWO_PI) / 2.0
        };

        let t = 1.0 - 0.17 * (h_bar_prime - (30.0f64).to_radians()).cos()
            + 0.24 * (2.0 * h_bar_prime).cos()
            + 0.32 * (3.0 * h_bar_prime + (6.0f64).to_radians()).cos()
            - 0.20 * (4.0 * h_bar_prime - (63.0f64).to_radians()).cos();

        let l_mid_sq = (l_bar_prime - 50.0) * (l_bar_prime - 50.0);
        let sl = 1.0 + (0.015 * l_mid_sq) / (20.0 + l_mid_sq).sqrt();
        let sc = 1.0 + 0.045 * c_bar_prime;
        let sh = 1.0 + 0.015 * c_bar_prime * t;

        let delta_theta = (30.0f64).to_radians()
            * (-((h_bar_prime - (275.0f64).to_radians()) / (25.0f64).to_radians()).powi(2)).exp();
        let c_bar_prime_7 = c_bar_prime.powi(7);
        let rc = 2.0 * (c_bar_prime_7 / (c_bar_prime_7 + POW25_7)).sqrt();
        let rt = -rc * (2.0 * delta_theta).sin();

        let dl_term = dl_prime / sl;
        let dc_term = dc_prime / sc;
        let dh_term = dh_prime_big / sh;

        Ok(
            (dl_term * dl_term + dc_term * dc_term + dh_term * dh_term + rt * dc_term * dh_term)
                .sqrt(),
        )
    }
}

fn interpolate_hue(h1: f64, h2: f64, t: f64, method: HueMethod) -> f64 {
    let h1 = normalize_hue(h1);
    let h2 = normalize_hue(h2);

    let delta = match method {
        HueMethod::Shorter => {
            let mut d = (h2 - h1).rem_euclid(360.0);
            if d >= 180.0 {
                d -= 360.0;
            }
            d
        }
        HueMethod::Longer => {
            let mut d = (h2 - h1).rem_euclid(360.0);
            if d >= 180.0 {
                d -= 360.0;
            }
            // The complement arc, away from zero.
            if d == 0.0 {
                360.0
            } else if d > 0.0 {
                d - 360.0
            } else {
                d + 360.0
            }
        }
        HueMethod::Increasing => (h2 - h1).rem_euclid(360.0),
        HueMethod::Decreasing => {
            let d = (h2 - h1).rem_euclid(360.0);
            if d == 0.0 {
                0.0
            } else {
                d - 360.0
            }
        }
    };

    normalize_hue(h1 + t * delta)
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_css(&FormatOptions::default()) {
            Ok(text) => f.write_str(&text),
            Err(_) => write!(f, "{}({:?})", self.model, self.coords),
        }
    }
}

impl FromStr for Color {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Color::from_css(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from(input: &str) -> Color {
        Color::from_css(input).unwrap()
    }

    #[test]
    fn test_from_hex() {
        let color = from("#ff5733");
        assert_eq!(color.model(), "rgb");
        assert_eq!(color.coords(), [255.0, 87.0, 51.0, 1.0]);
    }

    #[test]
    fn test_scenario_hex_to_rgb() {
        let out = from("#ff5733").to("rgb", &FormatOptions::default()).unwrap();
        assert_eq!(out, "rgb(255 87 51)");
    }

    #[test]
    fn test_scenario_mix_shorter_and_longer() {
        let base = from("hsl(0 100 50)");
        let other = from("hsl(120 100 50)");

        let mixed = base.mix(&other, &MixOptions::default()).unwrap();
        assert_eq!(mixed.to("hsl", &FormatOptions::default()).unwrap(), "hsl(60 100 50)");

        let mixed = base
            .mix(
                &other,
                &MixOptions {
                    hue: HueMethod::Longer,
                    ..MixOptions::default()
                },
            )
            .unwrap();
        assert_eq!(
            mixed.to("hsl", &FormatOptions::default()).unwrap(),
            "hsl(240 100 50)"
        );
    }

    #[test]
    fn test_scenario_color_mix_weights() {
        let out = from("color-mix(in hsl, hsl(0 100 50) 30%, hsl(120 100 50) 50%)")
            .to("hsl", &FormatOptions::default())
            .unwrap();
        assert_eq!(out, "hsl(75 100 50 / 0.8)");
    }

    #[test]
    fn test_scenario_relative_calc() {
        let out = from("rgb(from #ff0000 calc(r * 0.5) calc(g + 50) calc(b + 75))")
            .to_css(&FormatOptions {
                precision: Some(4),
                ..FormatOptions::default()
            })
            .unwrap();
        assert_eq!(out, "rgb(127.5 50 75)");
    }

    #[test]
    fn test_scenario_contrast() {
        let ratio = from("#fff").contrast(&from("#000")).unwrap();
        assert!((ratio - 21.0).abs() < 1e-6, "ratio = {}", ratio);
    }

    #[test]
    fn test_scenario_gamut_checks() {
        let p3_red = from("color(display-p3 1 0 0)");
        assert!(!p3_red.in_gamut("srgb").unwrap());
        assert!(p3_red.in_gamut("xyz").unwrap());
    }

    #[test]
    fn test_scenario_none_and_nan() {
        let out = from("hsl(none calc(NaN) 50%)")
            .to("hsl", &FormatOptions::default())
            .unwrap();
        assert_eq!(out, "hsl(0 0 50)");
    }

    #[test]
    fn test_mix_endpoints() {
        let a = from("rgb(10 20 30)");
        let b = from("rgb(200 100 50)");
        let zero = a
            .mix(
                &b,
                &MixOptions {
                    amount: 0.0,
                    ..MixOptions::default()
                },
            )
            .unwrap();
        assert!(zero.equals(&a));
        let one = a
            .mix(
                &b,
                &MixOptions {
                    amount: 1.0,
                    ..MixOptions::default()
                },
            )
            .unwrap();
        assert!(one.equals(&b));
    }

    #[test]
    fn test_mix_premultiplied() {
        let a = from("rgb(255 0 0 / 0.5)");
        let b = from("rgb(0 0 255)");
        let mixed = a.mix(&b, &MixOptions::default()).unwrap();
        let coords = mixed.coords();
        // alpha' = 0.5*0.5 + 1*0.5 = 0.75
        assert!((coords[3] - 0.75).abs() < 1e-12);
        // r = (255*0.5*0.5 + 0)/0.75 = 85
        assert!((coords[0] - 85.0).abs() < 1e-9);
        // b = (0 + 255*1*0.5)/0.75 = 170
        assert!((coords[2] - 170.0).abs() < 1e-9);
    }

    #[test]
    fn test_roundtrip_through_models() {
        let original = from("#ff5733");
        let back = original
            .in_model("oklch")
            .unwrap()
            .in_model("lab")
            .unwrap()
            .in_model("rgb")
            .unwrap();
        assert!(original.equals(&back), "back = {:?}", back);
    }

    #[test]
    fn test_equals_across_models() {
        let rgb = from("rgb(255 0 0)");
        let hsl = from("hsl(0 100 50)");
        assert!(rgb.equals(&hsl));
        assert!(!rgb.equals(&from("rgb(0 255 0)")));
    }

    #[test]
    fn test_with_map_and_function() {
        let color = from("hsl(120 50 40)");
        let mut changes = HashMap::new();
        changes.insert("h".to_string(), ComponentUpdate::Set(240.0));
        changes.insert(
            "l".to_string(),
            ComponentUpdate::Map(Box::new(|l| l + 10.0)),
        );
        let updated = color.with(Update::Map(changes)).unwrap();
        assert_eq!(updated.coords()[0], 240.0);
        assert_eq!(updated.coords()[2], 50.0);

        let updated = color
            .with(Update::With(Box::new(|current| {
                let mut changes = HashMap::new();
                changes.insert("s".to_string(), ComponentUpdate::Set(current["s"] * 2.0));
                Update::Map(changes)
            })))
            .unwrap();
        assert_eq!(updated.coords()[1], 100.0);
    }

    #[test]
    fn test_with_array() {
        let color = from("rgb(10 20 30)");
        let updated = color
            .with(Update::Array(vec![Some(100.0), None, Some(200.0)]))
            .unwrap();
        assert_eq!(updated.coords(), [100.0, 20.0, 200.0, 1.0]);
    }

    #[test]
    fn test_with_rejects_unknown_component() {
        let color = from("rgb(10 20 30)");
        let mut changes = HashMap::new();
        changes.insert("q".to_string(), ComponentUpdate::Set(1.0));
        assert!(color.with(Update::Map(changes)).is_err());
    }

    #[test]
    fn test_with_normalizes_specials() {
        let color = from("rgb(10 20 30)");
        let mut changes = HashMap::new();
        changes.insert("r".to_string(), ComponentUpdate::Set(f64::INFINITY));
        changes.insert("g".to_string(), ComponentUpdate::Set(f64::NAN));
        let updated = color.with(Update::Map(changes)).unwrap();
        assert_eq!(updated.coords()[0], 255.0);
        assert_eq!(updated.coords()[1], 0.0);
    }

    #[test]
    fn test_random_stays_in_range() {
        for _ in 0..50 {
            let color = Color::random(&RandomOptions {
                model: Some("hsl".into()),
                ..RandomOptions::default()
            })
            .unwrap();
            let coords = color.coords();
            assert!((0.0..360.0).contains(&coords[0]));
            assert!((0.0..=100.0).contains(&coords[1]));
            assert!((0.0..=100.0).contains(&coords[2]));
            assert!((0.0..=1.0).contains(&coords[3]));
        }
    }

    #[test]
    fn test_random_normal_clamps() {
        let mut base = HashMap::new();
        base.insert("l".to_string(), 95.0);
        let mut deviation = HashMap::new();
        deviation.insert("l".to_string(), 30.0);
        for _ in 0..50 {
            let color = Color::random(&RandomOptions {
                model: Some("hsl".into()),
                base: base.clone(),
                deviation: deviation.clone(),
                ..RandomOptions::default()
            })
            .unwrap();
            assert!((0.0..=100.0).contains(&color.coords()[2]));
        }
    }

    #[test]
    fn test_random_rejects_unknown_component() {
        let mut limits = HashMap::new();
        limits.insert("x".to_string(), (0.0, 1.0));
        let err = Color::random(&RandomOptions {
            model: Some("hsl".into()),
            limits,
            ..RandomOptions::default()
        })
        .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_within_brings_in_gamut() {
        let p3 = from("color(display-p3 1 0 0)");
        let fitted = p3.within("srgb", "css-gamut-map").unwrap();
        assert_eq!(fitted.model(), "display-p3");
        assert!(fitted.in_gamut("srgb").unwrap());
    }

    #[test]
    fn test_delta_e_zero_for_same_color() {
        let a = from("#ff5733");
        assert!(a.delta_e_ok(&a).unwrap().abs() < 1e-9);
        assert!(a.delta_e_76(&a).unwrap().abs() < 1e-9);
        assert!(a.delta_e_94(&a).unwrap().abs() < 1e-9);
        assert!(a.delta_e_2000(&a).unwrap().abs() < 1e-9);
    }

    #[test]
    fn test_delta_e_2000_known_pair() {
        // Sharma test pair 1: (50, 2.6772, -79.7751) vs (50, 0, -82.7485)
        // has a CIEDE2000 of 2.0425.
        let a = Color::new("lab", &[50.0, 2.6772, -79.7751]).unwrap();
        let b = Color::new("lab", &[50.0, 0.0, -82.7485]).unwrap();
        let d = a.delta_e_2000(&b).unwrap();
        assert!((d - 2.0425).abs() < 1e-4, "deltaE2000 = {}", d);
    }

    #[test]
    fn test_delta_e_76_is_lab_distance() {
        let a = Color::new("lab", &[50.0, 10.0, 0.0]).unwrap();
        let b = Color::new("lab", &[50.0, 13.0, 4.0]).unwrap();
        assert!((a.delta_e_76(&b).unwrap() - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_type_of() {
        assert_eq!(Color::type_of("#abc", false).unwrap(), "hex-color");
        assert_eq!(Color::type_of("red", false).unwrap(), "named-color");
        assert_eq!(Color::type_of("rgb(1 2 3)", true).unwrap(), "rgb");
        assert_eq!(
            Color::type_of("color(srgb 0 1 0)", true).unwrap(),
            "srgb"
        );
        assert!(Color::type_of("definitely not a color", false).is_err());
    }

    #[test]
    fn test_is_valid() {
        assert!(Color::is_valid("#abc", None));
        assert!(Color::is_valid("#abc", Some("hex-color")));
        assert!(!Color::is_valid("#abc", Some("rgb")));
        assert!(!Color::is_valid("#zzz", None));
    }

    #[test]
    fn test_nesting_limit() {
        let mut input = String::from("#fff");
        for _ in 0..80 {
            input = format!("color-mix(in rgb, {}, #000)", input);
        }
        let err = Color::from_css(&input).unwrap_err();
        assert!(err.to_string().contains("nesting"));
    }

    #[test]
    fn test_interpolate_hue_methods() {
        assert_eq!(interpolate_hue(0.0, 120.0, 0.5, HueMethod::Shorter), 60.0);
        assert_eq!(interpolate_hue(0.0, 120.0, 0.5, HueMethod::Longer), 240.0);
        assert_eq!(
            interpolate_hue(350.0, 10.0, 0.5, HueMethod::Shorter),
            0.0
        );
        // Increasing wraps 350 -> 370, so the midpoint lands on 0.
        assert_eq!(
            interpolate_hue(350.0, 10.0, 0.5, HueMethod::Increasing),
            0.0
        );
        assert_eq!(
            interpolate_hue(0.0, 120.0, 0.5, HueMethod::Increasing),
            60.0
        );
        // Decreasing walks 0 -> -240, so the midpoint lands on 240.
        assert_eq!(
            interpolate_hue(0.0, 120.0, 0.5, HueMethod::Decreasing),
            240.0
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", from("#ff5733")), "rgb(255 87 51)");
    }
}
