//! Gamut fitting: `none`, `clip`, `chroma-reduction` and the CSS Color 4
//! gamut-mapping algorithm, plus the shared rounding step.
//!
//! The binary-search methods work in OKLCH and terminate on the "just
//! noticeable difference" of deltaEOK, following
//! <https://drafts.csswg.org/css-color-4/#gamut-mapping>.

use std::sync::Arc;

use crate::config;
use crate::error::{Error, Result};
use crate::graph;
use crate::math::{normalize_hue, round_to, Vec3};
use crate::model::{ColorModel, Gamut, ValueKind};
use crate::registry::{self, FitFn};

/// deltaEOK threshold below which a clipped color is accepted.
const JND: f64 = 0.02;
/// Binary search convergence tolerance on chroma.
const CONVERGENCE: f64 = 1e-4;
/// Range slack for in-gamut checks.
const GAMUT_EPSILON: f64 = 1e-5;

/// Map `none`/NaN to 0 and the infinities to the range bounds.
#[inline]
pub(crate) fn normalize_special(value: f64, range: (f64, f64)) -> f64 {
    if value.is_nan() {
        0.0
    } else if value == f64::INFINITY {
        range.1
    } else if value == f64::NEG_INFINITY {
        range.0
    } else {
        value
    }
}

/// Normalize all four coordinates of a color against its model's ranges.
pub(crate) fn normalize_coords(coords: [f64; 4], model: &ColorModel) -> [f64; 4] {
    let mut out = coords;
    for component in &model.components {
        out[component.index] = normalize_special(out[component.index], component.kind.range());
    }
    out[3] = normalize_special(out[3], (0.0, 1.0));
    out
}

/// Per-component clamp; angles wrap into [0, 360) instead of clamping.
pub(crate) fn clip(coords: Vec3, model: &ColorModel) -> Vec3 {
    let mut out = coords;
    for component in &model.components {
        let value = out[component.index];
        out[component.index] = match component.kind {
            ValueKind::Angle => normalize_hue(value),
            kind => {
                let (min, max) = kind.range();
                value.clamp(min, max)
            }
        };
    }
    out
}

/// Whether coordinates in `model_name` sit inside the model's target
/// gamut, with `epsilon` slack per component.
pub(crate) fn in_gamut(model_name: &str, coords: Vec3, epsilon: f64) -> Result<bool> {
    let model = registry::model(model_name)?;
    match &model.target_gamut {
        Gamut::Unbounded => Ok(true),
        Gamut::Space(space) => {
            let target = registry::model(space)?;
            let converted = graph::convert(model_name, space, coords)?;
            for component in &target.components {
                let (min, max) = component.kind.range();
                let value = converted[component.index];
                if value < min - epsilon || value > max + epsilon {
                    return Ok(false);
                }
            }
            Ok(true)
        }
    }
}

/// Fit coordinates with the named method (default from the configuration),
/// then round each component to `precision`, its own precision, or 3.
pub(crate) fn fit(
    coords: Vec3,
    model: &Arc<ColorModel>,
    method: Option<&str>,
    precision: Option<u32>,
) -> Result<Vec3> {
    let method_name = match method {
        Some(name) => name.to_string(),
        None => config::default_fit(),
    };
    let method_fn = registry::fit_method(&method_name).ok_or(Error::Lookup {
        kind: "fit method",
        name: method_name,
    })?;

    let mut normalized = coords;
    for component in &model.components {
        normalized[component.index] =
            normalize_special(normalized[component.index], component.kind.range());
    }

    let fitted = method_fn(normalized, model.as_ref())?;

    let mut out = fitted;
    for component in &model.components {
        let digits = precision.or(component.precision).unwrap_or(3);
        out[component.index] = round_to(out[component.index], digits);
    }
    Ok(out)
}

// ============================================================================
// Built-in methods
// ============================================================================

/// deltaEOK between model-space coordinates and an OKLCH reference, on the
/// unscaled (0..~1) OKLab axes.
fn delta_ok(model_name: &str, coords: Vec3, reference_oklch: Vec3) -> Result<f64> {
    let a = graph::convert(model_name, "oklab", coords)?;
    let b = graph::convert("oklch", "oklab", reference_oklch)?;
    let d = [a[0] - b[0], a[1] - b[1], a[2] - b[2]];
    Ok((d[0] * d[0] + d[1] * d[1] + d[2] * d[2]).sqrt())
}

/// Chroma-reduction fit: bisect OKLCH chroma in [0, 1] against the model's
/// target gamut, accepting a clipped candidate within 2 deltaEOK (on the
/// x100 scale).
fn chroma_reduction(coords: Vec3, model: &ColorModel) -> Result<Vec3> {
    if model.target_gamut == Gamut::Unbounded {
        return Ok(coords);
    }
    if in_gamut(&model.name, coords, GAMUT_EPSILON)? {
        return Ok(coords);
    }

    let oklch = graph::convert(&model.name, "oklch", coords)?;
    let lightness = oklch[0].clamp(0.0, 1.0);
    let hue = oklch[2];

    let mut low = 0.0f64;
    let mut high = 1.0f64;
    while high - low > CONVERGENCE {
        let chroma = (low + high) / 2.0;
        let candidate_oklch = [lightness, chroma, hue];
        let candidate = graph::convert("oklch", &model.name, candidate_oklch)?;
        if in_gamut(&model.name, candidate, GAMUT_EPSILON)? {
            low = chroma;
        } else {
            let clipped = clip(candidate, model);
            if delta_ok(&model.name, clipped, candidate_oklch)? * 100.0 < 2.0 {
                return Ok(clipped);
            }
            high = chroma;
        }
    }

    graph::convert("oklch", &model.name, [lightness, low, hue])
}

/// The CSS Color 4 gamut-mapping algorithm (§13.2): binary search on OKLCH
/// chroma with the JND early exits.
fn css_gamut_map(coords: Vec3, model: &ColorModel) -> Result<Vec3> {
    if model.target_gamut == Gamut::Unbounded {
        return Ok(coords);
    }

    let origin_oklch = graph::convert(&model.name, "oklch", coords)?;

    if origin_oklch[0] >= 1.0 {
        return graph::convert("oklab", &model.name, [1.0, 0.0, 0.0]);
    }
    if origin_oklch[0] <= 0.0 {
        return graph::convert("oklab", &model.name, [0.0, 0.0, 0.0]);
    }
    if in_gamut(&model.name, coords, GAMUT_EPSILON)? {
        return Ok(coords);
    }

    let clipped = clip(coords, model);
    if delta_ok(&model.name, clipped, origin_oklch)? < JND {
        return Ok(clipped);
    }

    let mut min = 0.0f64;
    let mut max = origin_oklch[1];
    let mut min_in_gamut = true;
    let mut current_in_space = coords;

    while max - min > CONVERGENCE {
        let chroma = (min + max) / 2.0;
        let current = [origin_oklch[0], chroma, origin_oklch[2]];
        current_in_space = graph::convert("oklch", &model.name, current)?;

        if min_in_gamut && in_gamut(&model.name, current_in_space, GAMUT_EPSILON)? {
            min = chroma;
            continue;
        }

        let clipped = clip(current_in_space, model);
        let e = delta_ok(&model.name, clipped, current)?;
        if e < JND {
            if JND - e < CONVERGENCE {
                return Ok(clipped);
            }
            min_in_gamut = false;
            min = chroma;
        } else {
            max = chroma;
        }
    }

    // The final iterate can sit a convergence-tolerance outside the gamut;
    // clipping it is within the search tolerance.
    Ok(clip(current_in_space, model))
}

/// The built-in fit methods, in registration order.
pub(crate) fn builtin_methods() -> Vec<(&'static str, FitFn)> {
    vec![
        ("none", Arc::new(|coords, _: &ColorModel| Ok(coords)) as FitFn),
        (
            "clip",
            Arc::new(|coords, model: &ColorModel| Ok(clip(coords, model))) as FitFn,
        ),
        (
            "chroma-reduction",
            Arc::new(|coords, model: &ColorModel| chroma_reduction(coords, model)) as FitFn,
        ),
        (
            "css-gamut-map",
            Arc::new(|coords, model: &ColorModel| css_gamut_map(coords, model)) as FitFn,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rgb_model() -> Arc<ColorModel> {
        registry::maybe_model("rgb").unwrap()
    }

    #[test]
    fn test_clip_clamps_and_wraps() {
        let rgb = rgb_model();
        assert_eq!(clip([300.0, -20.0, 128.0], &rgb), [255.0, 0.0, 128.0]);

        let hsl = registry::maybe_model("hsl").unwrap();
        let clipped = clip([370.0, 120.0, -5.0], &hsl);
        assert_eq!(clipped[0], 10.0);
        assert_eq!(clipped[1], 100.0);
        assert_eq!(clipped[2], 0.0);
    }

    #[test]
    fn test_fit_none_still_rounds() {
        let rgb = rgb_model();
        let out = fit([300.123456, -4.5, 12.0], &rgb, Some("none"), Some(2)).unwrap();
        assert_eq!(out, [300.12, -4.5, 12.0]);
    }

    #[test]
    fn test_fit_rounds_to_component_precision() {
        let rgb = rgb_model();
        // rgb components have precision 0.
        let out = fit([127.6, 50.4, 75.5], &rgb, Some("none"), None).unwrap();
        assert_eq!(out, [128.0, 50.0, 76.0]);
    }

    #[test]
    fn test_fit_normalizes_specials() {
        let rgb = rgb_model();
        let out = fit([f64::NAN, f64::INFINITY, f64::NEG_INFINITY], &rgb, Some("none"), None)
            .unwrap();
        assert_eq!(out, [0.0, 255.0, 0.0]);
    }

    #[test]
    fn test_in_gamut_unbounded() {
        assert!(in_gamut("lab", [200.0, 300.0, -300.0], GAMUT_EPSILON).unwrap());
    }

    #[test]
    fn test_in_gamut_rgb() {
        assert!(in_gamut("rgb", [255.0, 0.0, 0.0], GAMUT_EPSILON).unwrap());
        assert!(!in_gamut("rgb", [280.0, 0.0, 0.0], GAMUT_EPSILON).unwrap());
    }

    #[test]
    fn test_chroma_reduction_stays_for_in_gamut() {
        let rgb = rgb_model();
        let coords = [200.0, 100.0, 50.0];
        let out = fit(coords, &rgb, Some("chroma-reduction"), None).unwrap();
        assert_eq!(out, coords);
    }

    #[test]
    fn test_chroma_reduction_brings_into_gamut() {
        let rgb = rgb_model();
        let out = fit([300.0, -40.0, 20.0], &rgb, Some("chroma-reduction"), Some(5)).unwrap();
        assert!(in_gamut("rgb", out, 1e-3).unwrap(), "out = {:?}", out);
    }

    #[test]
    fn test_css_gamut_map_brings_into_gamut() {
        let rgb = rgb_model();
        let out = fit([300.0, -40.0, 20.0], &rgb, Some("css-gamut-map"), Some(5)).unwrap();
        assert!(in_gamut("rgb", out, 1e-3).unwrap(), "out = {:?}", out);
    }

    #[test]
    fn test_css_gamut_map_white_shortcut() {
        let rgb = rgb_model();
        // Lightness >= 1 maps straight to model white.
        let out = fit([400.0, 300.0, 290.0], &rgb, Some("css-gamut-map"), Some(0)).unwrap();
        assert_eq!(out, [255.0, 255.0, 255.0]);
    }

    #[test]
    fn test_unknown_fit_method() {
        let rgb = rgb_model();
        let err = fit([0.0, 0.0, 0.0], &rgb, Some("definitely-not-registered"), None).unwrap_err();
        assert!(matches!(err, Error::Lookup { .. }));
    }
}
