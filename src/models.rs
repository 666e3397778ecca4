//! Built-in model and color-space conversions.
//!
//! Each model converts to and from exactly one bridge model; longer
//! conversions are chained by the graph module. RGB-family matrices are
//! derived from the primaries in `colorspace` at first use, the same way
//! the published CSS conversion code derives them.

use once_cell::sync::Lazy;

use crate::colorspace as cs;
use crate::math::{mat3_invert, mat3_mul_vec3, rgb_to_xyz_matrix, normalize_hue, Mat3, Vec3, MAT3_IDENTITY};
use crate::model::{ColorModel, SpaceBuilder, ValueKind};

// ============================================================================
// Derived matrices
// ============================================================================

static SRGB_TO_XYZ: Lazy<Mat3> = Lazy::new(|| {
    rgb_to_xyz_matrix(
        cs::srgb_primaries::RED,
        cs::srgb_primaries::GREEN,
        cs::srgb_primaries::BLUE,
        cs::WHITE_D65,
    )
});
static XYZ_TO_SRGB: Lazy<Mat3> = Lazy::new(|| mat3_invert(&SRGB_TO_XYZ));

static DISPLAY_P3_TO_XYZ: Lazy<Mat3> = Lazy::new(|| {
    rgb_to_xyz_matrix(
        cs::display_p3_primaries::RED,
        cs::display_p3_primaries::GREEN,
        cs::display_p3_primaries::BLUE,
        cs::WHITE_D65,
    )
});

static A98_TO_XYZ: Lazy<Mat3> = Lazy::new(|| {
    rgb_to_xyz_matrix(
        cs::a98_rgb_primaries::RED,
        cs::a98_rgb_primaries::GREEN,
        cs::a98_rgb_primaries::BLUE,
        cs::WHITE_D65,
    )
});

static PROPHOTO_TO_XYZ: Lazy<Mat3> = Lazy::new(|| {
    rgb_to_xyz_matrix(
        cs::prophoto_rgb_primaries::RED,
        cs::prophoto_rgb_primaries::GREEN,
        cs::prophoto_rgb_primaries::BLUE,
        cs::WHITE_D50,
    )
});

static REC2020_TO_XYZ: Lazy<Mat3> = Lazy::new(|| {
    rgb_to_xyz_matrix(
        cs::rec2020_primaries::RED,
        cs::rec2020_primaries::GREEN,
        cs::rec2020_primaries::BLUE,
        cs::WHITE_D65,
    )
});

// ============================================================================
// Transfer functions
// ============================================================================

/// Decode one sRGB channel (0-1) to linear light. Sign-preserving so that
/// out-of-gamut negative values survive the round trip.
#[inline]
pub fn srgb_to_linear(v: f64) -> f64 {
    let abs = v.abs();
    if abs <= cs::srgb_transfer::DECODE_THRESHOLD {
        v / cs::srgb_transfer::LINEAR_SLOPE
    } else {
        v.signum() * ((abs + cs::srgb_transfer::OFFSET) / cs::srgb_transfer::SCALE).powf(cs::srgb_transfer::GAMMA)
    }
}

/// Encode one linear channel (0-1) to sRGB.
#[inline]
pub fn linear_to_srgb(v: f64) -> f64 {
    let abs = v.abs();
    if abs > cs::srgb_transfer::THRESHOLD {
        v.signum() * (cs::srgb_transfer::SCALE * abs.powf(1.0 / cs::srgb_transfer::GAMMA) - cs::srgb_transfer::OFFSET)
    } else {
        cs::srgb_transfer::LINEAR_SLOPE * v
    }
}

#[inline]
fn a98_to_linear(v: f64) -> f64 {
    v.signum() * v.abs().powf(cs::a98_transfer::GAMMA)
}

#[inline]
fn linear_to_a98(v: f64) -> f64 {
    v.signum() * v.abs().powf(1.0 / cs::a98_transfer::GAMMA)
}

#[inline]
fn prophoto_to_linear(v: f64) -> f64 {
    let abs = v.abs();
    if abs <= cs::prophoto_transfer::DECODE_THRESHOLD {
        v / cs::prophoto_transfer::LINEAR_SLOPE
    } else {
        v.signum() * abs.powf(cs::prophoto_transfer::GAMMA)
    }
}

#[inline]
fn linear_to_prophoto(v: f64) -> f64 {
    let abs = v.abs();
    if abs >= cs::prophoto_transfer::THRESHOLD {
        v.signum() * abs.powf(1.0 / cs::prophoto_transfer::GAMMA)
    } else {
        cs::prophoto_transfer::LINEAR_SLOPE * v
    }
}

#[inline]
fn rec2020_to_linear(v: f64) -> f64 {
    let abs = v.abs();
    if abs < cs::rec2020_transfer::BETA * cs::rec2020_transfer::LINEAR_SLOPE {
        v / cs::rec2020_transfer::LINEAR_SLOPE
    } else {
        v.signum()
            * ((abs + cs::rec2020_transfer::ALPHA - 1.0) / cs::rec2020_transfer::ALPHA)
                .powf(1.0 / cs::rec2020_transfer::GAMMA)
    }
}

#[inline]
fn linear_to_rec2020(v: f64) -> f64 {
    let abs = v.abs();
    if abs < cs::rec2020_transfer::BETA {
        cs::rec2020_transfer::LINEAR_SLOPE * v
    } else {
        v.signum()
            * (cs::rec2020_transfer::ALPHA * abs.powf(cs::rec2020_transfer::GAMMA)
                - (cs::rec2020_transfer::ALPHA - 1.0))
    }
}

// ============================================================================
// rgb <-> xyz-d65
// ============================================================================

/// rgb (0-255 gamma-encoded) to XYZ-D65.
pub fn rgb_to_xyz_d65(coords: Vec3) -> Vec3 {
    let linear = [
        srgb_to_linear(coords[0] / 255.0),
        srgb_to_linear(coords[1] / 255.0),
        srgb_to_linear(coords[2] / 255.0),
    ];
    mat3_mul_vec3(&SRGB_TO_XYZ, linear)
}

/// XYZ-D65 to rgb (0-255 gamma-encoded).
pub fn xyz_d65_to_rgb(coords: Vec3) -> Vec3 {
    let linear = mat3_mul_vec3(&XYZ_TO_SRGB, coords);
    [
        linear_to_srgb(linear[0]) * 255.0,
        linear_to_srgb(linear[1]) * 255.0,
        linear_to_srgb(linear[2]) * 255.0,
    ]
}

// ============================================================================
// hsl / hwb <-> rgb
// ============================================================================

/// hsl (h 0-360, s/l 0-100) to rgb (0-255).
pub fn hsl_to_rgb(coords: Vec3) -> Vec3 {
    let h = normalize_hue(coords[0]);
    let s = coords[1] / 100.0;
    let l = coords[2] / 100.0;

    let f = |n: f64| {
        let k = (n + h / 30.0).rem_euclid(12.0);
        let a = s * l.min(1.0 - l);
        l - a * (k - 3.0).min(9.0 - k).clamp(-1.0, 1.0)
    };

    [f(0.0) * 255.0, f(8.0) * 255.0, f(4.0) * 255.0]
}

/// rgb (0-255) to hsl.
pub fn rgb_to_hsl(coords: Vec3) -> Vec3 {
    let r = coords[0] / 255.0;
    let g = coords[1] / 255.0;
    let b = coords[2] / 255.0;

    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;
    let l = (max + min) / 2.0;

    let s = if delta == 0.0 || l <= 0.0 || l >= 1.0 {
        0.0
    } else {
        (max - l) / l.min(1.0 - l)
    };

    let h = if delta == 0.0 {
        0.0
    } else if max == r {
        60.0 * ((g - b) / delta + if g < b { 6.0 } else { 0.0 })
    } else if max == g {
        60.0 * ((b - r) / delta + 2.0)
    } else {
        60.0 * ((r - g) / delta + 4.0)
    };

    [normalize_hue(h), s * 100.0, l * 100.0]
}

/// hwb (h 0-360, w/b 0-100) to rgb (0-255).
pub fn hwb_to_rgb(coords: Vec3) -> Vec3 {
    let h = coords[0];
    let w = coords[1] / 100.0;
    let b = coords[2] / 100.0;

    if w + b >= 1.0 {
        // Achromatic gray.
        let gray = w / (w + b) * 255.0;
        return [gray, gray, gray];
    }

    let pure = hsl_to_rgb([h, 100.0, 50.0]);
    [
        (pure[0] / 255.0 * (1.0 - w - b) + w) * 255.0,
        (pure[1] / 255.0 * (1.0 - w - b) + w) * 255.0,
        (pure[2] / 255.0 * (1.0 - w - b) + w) * 255.0,
    ]
}

/// rgb (0-255) to hwb.
pub fn rgb_to_hwb(coords: Vec3) -> Vec3 {
    let hsl = rgb_to_hsl(coords);
    let max = coords[0].max(coords[1]).max(coords[2]) / 255.0;
    let min = coords[0].min(coords[1]).min(coords[2]) / 255.0;
    [hsl[0], min * 100.0, (1.0 - max) * 100.0]
}

// ============================================================================
// lab / lch <-> xyz-d50
// ============================================================================

/// CIELAB (L 0-100) to XYZ-D50.
pub fn lab_to_xyz_d50(coords: Vec3) -> Vec3 {
    let (l, a, b) = (coords[0], coords[1], coords[2]);

    let f1 = (l + 16.0) / 116.0;
    let f0 = a / 500.0 + f1;
    let f2 = f1 - b / 200.0;

    let x = if f0 * f0 * f0 > cs::cielab::EPSILON {
        f0 * f0 * f0
    } else {
        (116.0 * f0 - 16.0) / cs::cielab::KAPPA
    };
    let y = if l > cs::cielab::KAPPA * cs::cielab::EPSILON {
        f1 * f1 * f1
    } else {
        l / cs::cielab::KAPPA
    };
    let z = if f2 * f2 * f2 > cs::cielab::EPSILON {
        f2 * f2 * f2
    } else {
        (116.0 * f2 - 16.0) / cs::cielab::KAPPA
    };

    [
        x * cs::WHITE_D50[0],
        y * cs::WHITE_D50[1],
        z * cs::WHITE_D50[2],
    ]
}

/// XYZ-D50 to CIELAB.
pub fn xyz_d50_to_lab(coords: Vec3) -> Vec3 {
    let f = |t: f64| {
        if t > cs::cielab::EPSILON {
            t.cbrt()
        } else {
            (cs::cielab::KAPPA * t + 16.0) / 116.0
        }
    };

    let fx = f(coords[0] / cs::WHITE_D50[0]);
    let fy = f(coords[1] / cs::WHITE_D50[1]);
    let fz = f(coords[2] / cs::WHITE_D50[2]);

    [116.0 * fy - 16.0, 500.0 * (fx - fy), 200.0 * (fy - fz)]
}

/// Polar form: (L, C, H degrees) to the rectangular (L, a, b).
pub fn lch_to_lab(coords: Vec3) -> Vec3 {
    let hue = coords[2].to_radians();
    [coords[0], coords[1] * hue.cos(), coords[1] * hue.sin()]
}

/// Rectangular (L, a, b) to polar (L, C, H degrees).
pub fn lab_to_lch(coords: Vec3) -> Vec3 {
    let (l, a, b) = (coords[0], coords[1], coords[2]);
    let chroma = a.hypot(b);
    let hue = normalize_hue(b.atan2(a).to_degrees());
    [l, chroma, hue]
}

// ============================================================================
// oklab / oklch <-> xyz-d65
// ============================================================================

/// OKLab (L 0-1) to XYZ-D65.
pub fn oklab_to_xyz_d65(coords: Vec3) -> Vec3 {
    let lms = mat3_mul_vec3(&cs::OKLAB_TO_OKLMS, coords);
    let cubed = [
        lms[0] * lms[0] * lms[0],
        lms[1] * lms[1] * lms[1],
        lms[2] * lms[2] * lms[2],
    ];
    mat3_mul_vec3(&cs::OKLMS_TO_XYZ, cubed)
}

/// XYZ-D65 to OKLab. `cbrt` preserves sign for out-of-gamut values.
pub fn xyz_d65_to_oklab(coords: Vec3) -> Vec3 {
    let lms = mat3_mul_vec3(&cs::XYZ_TO_OKLMS, coords);
    let roots = [lms[0].cbrt(), lms[1].cbrt(), lms[2].cbrt()];
    mat3_mul_vec3(&cs::OKLMS_TO_OKLAB, roots)
}

/// OKLCH to OKLab (shares the polar form with lch).
pub fn oklch_to_oklab(coords: Vec3) -> Vec3 {
    lch_to_lab(coords)
}

/// OKLab to OKLCH.
pub fn oklab_to_oklch(coords: Vec3) -> Vec3 {
    lab_to_lch(coords)
}

// ============================================================================
// Built-in registration
// ============================================================================

/// The built-in model functions, in registration order.
pub(crate) fn builtin_models() -> Vec<ColorModel> {
    let rgb = ColorModel::builder("rgb", "xyz-d65")
        .component("r", ValueKind::Range(0.0, 255.0), 0)
        .component("g", ValueKind::Range(0.0, 255.0), 0)
        .component("b", ValueKind::Range(0.0, 255.0), 0)
        .to_bridge(rgb_to_xyz_d65)
        .from_bridge(xyz_d65_to_rgb)
        .target_gamut("rgb")
        .legacy(Some("rgba"))
        .build()
        .expect("builtin rgb model");

    let hsl = ColorModel::builder("hsl", "rgb")
        .component("h", ValueKind::Angle, 1)
        .component("s", ValueKind::Percentage, 1)
        .component("l", ValueKind::Percentage, 1)
        .to_bridge(hsl_to_rgb)
        .from_bridge(rgb_to_hsl)
        .target_gamut("rgb")
        .legacy(Some("hsla"))
        .build()
        .expect("builtin hsl model");

    let hwb = ColorModel::builder("hwb", "rgb")
        .component("h", ValueKind::Angle, 1)
        .component("w", ValueKind::Percentage, 1)
        .component("b", ValueKind::Percentage, 1)
        .to_bridge(hwb_to_rgb)
        .from_bridge(rgb_to_hwb)
        .target_gamut("rgb")
        .build()
        .expect("builtin hwb model");

    let lab = ColorModel::builder("lab", "xyz-d50")
        .component("l", ValueKind::Percentage, 5)
        .component("a", ValueKind::Range(-125.0, 125.0), 5)
        .component("b", ValueKind::Range(-125.0, 125.0), 5)
        .to_bridge(lab_to_xyz_d50)
        .from_bridge(xyz_d50_to_lab)
        .build()
        .expect("builtin lab model");

    let lch = ColorModel::builder("lch", "lab")
        .component("l", ValueKind::Percentage, 5)
        .component("c", ValueKind::Range(0.0, 150.0), 5)
        .component("h", ValueKind::Angle, 5)
        .to_bridge(lch_to_lab)
        .from_bridge(lab_to_lch)
        .build()
        .expect("builtin lch model");

    let oklab = ColorModel::builder("oklab", "xyz-d65")
        .component("l", ValueKind::Range(0.0, 1.0), 5)
        .component("a", ValueKind::Range(-0.4, 0.4), 5)
        .component("b", ValueKind::Range(-0.4, 0.4), 5)
        .to_bridge(oklab_to_xyz_d65)
        .from_bridge(xyz_d65_to_oklab)
        .build()
        .expect("builtin oklab model");

    let oklch = ColorModel::builder("oklch", "oklab")
        .component("l", ValueKind::Range(0.0, 1.0), 5)
        .component("c", ValueKind::Range(0.0, 0.4), 5)
        .component("h", ValueKind::Angle, 5)
        .to_bridge(oklch_to_oklab)
        .from_bridge(oklab_to_oklch)
        .build()
        .expect("builtin oklch model");

    vec![rgb, hsl, hwb, lab, lch, oklab, oklch]
}

/// The built-in `color(<space> ...)` spaces, in registration order.
pub(crate) fn builtin_spaces() -> Vec<ColorModel> {
    let srgb = SpaceBuilder::new("srgb", "xyz-d65", *SRGB_TO_XYZ)
        .transfer(srgb_to_linear, linear_to_srgb)
        .build()
        .expect("builtin srgb space");

    let srgb_linear = SpaceBuilder::new("srgb-linear", "xyz-d65", *SRGB_TO_XYZ)
        .build()
        .expect("builtin srgb-linear space");

    let display_p3 = SpaceBuilder::new("display-p3", "xyz-d65", *DISPLAY_P3_TO_XYZ)
        .transfer(srgb_to_linear, linear_to_srgb)
        .build()
        .expect("builtin display-p3 space");

    let a98 = SpaceBuilder::new("a98-rgb", "xyz-d65", *A98_TO_XYZ)
        .transfer(a98_to_linear, linear_to_a98)
        .build()
        .expect("builtin a98-rgb space");

    let prophoto = SpaceBuilder::new("prophoto-rgb", "xyz-d50", *PROPHOTO_TO_XYZ)
        .transfer(prophoto_to_linear, linear_to_prophoto)
        .build()
        .expect("builtin prophoto-rgb space");

    let rec2020 = SpaceBuilder::new("rec2020", "xyz-d65", *REC2020_TO_XYZ)
        .transfer(rec2020_to_linear, linear_to_rec2020)
        .build()
        .expect("builtin rec2020 space");

    // The XYZ hub models bridge each other through plain Bradford
    // adaptation: identity transfer, adaptation matrix.
    let xyz_d65 = SpaceBuilder::new("xyz-d65", "xyz-d50", cs::XYZ_D65_TO_D50)
        .from_bridge_matrix(cs::XYZ_D50_TO_D65)
        .components(["x", "y", "z"])
        .unbounded()
        .build()
        .expect("builtin xyz-d65 space");

    let xyz_d50 = SpaceBuilder::new("xyz-d50", "xyz-d65", cs::XYZ_D50_TO_D65)
        .from_bridge_matrix(cs::XYZ_D65_TO_D50)
        .components(["x", "y", "z"])
        .unbounded()
        .build()
        .expect("builtin xyz-d50 space");

    let xyz = SpaceBuilder::new("xyz", "xyz-d65", MAT3_IDENTITY)
        .from_bridge_matrix(MAT3_IDENTITY)
        .components(["x", "y", "z"])
        .unbounded()
        .build()
        .expect("builtin xyz alias space");

    vec![srgb, srgb_linear, display_p3, a98, prophoto, rec2020, xyz_d65, xyz_d50, xyz]
}
