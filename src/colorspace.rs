//! Primary color space constants defined by specifications.
//!
//! These are the authoritative constants from standards documents and
//! published research. RGB <-> XYZ matrices are derived from the primaries
//! at registry initialization (see [`crate::math::rgb_to_xyz_matrix`]);
//! matrices that cannot be derived from chromaticities (OKLab LMS, Bradford
//! adaptation) are stored here at full published precision.
//!
//! Sources:
//! - ITU-R BT.709-6 (sRGB primaries, D65)
//! - IEC 61966-2-1:1999 (sRGB transfer function)
//! - IEC 61966-2-5 (Adobe RGB 1998)
//! - ISO 22028-2:2013 (ProPhoto/ROMM RGB)
//! - ITU-R BT.2020-2 (Rec.2020)
//! - CIE 15:2004 (illuminants)
//! - Björn Ottosson (2020) (OKLab)
//! - CSS Color Module Level 4, color-conversion code (Bradford matrices)

use crate::math::{Mat3, Vec3};

// =============================================================================
// ILLUMINANTS (CIE xy chromaticity and derived XYZ)
// =============================================================================

/// D65 standard illuminant - 4-digit rounded values.
/// From ITU-R BT.709 / IEC 61966-2-1 / Adobe RGB specifications.
pub mod d65 {
    pub const X: f64 = 0.3127;
    pub const Y: f64 = 0.3290;
}

/// D50 standard illuminant - CIE xy chromaticity.
/// Used by ProPhoto RGB, CIELAB and ICC color profiles.
/// From CIE 15:2004.
pub mod d50 {
    pub const X: f64 = 0.3457;
    pub const Y: f64 = 0.3585;
}

/// White point XYZ for D65 (Y normalized to 1).
pub const WHITE_D65: Vec3 = [
    d65::X / d65::Y,
    1.0,
    (1.0 - d65::X - d65::Y) / d65::Y,
];

/// White point XYZ for D50 (Y normalized to 1).
pub const WHITE_D50: Vec3 = [
    d50::X / d50::Y,
    1.0,
    (1.0 - d50::X - d50::Y) / d50::Y,
];

// =============================================================================
// COLOR SPACE PRIMARIES (CIE xy chromaticity)
// =============================================================================

/// sRGB / Rec.709 primaries.
/// From ITU-R BT.709-6. White point: D65.
pub mod srgb_primaries {
    pub const RED: (f64, f64) = (0.640, 0.330);
    pub const GREEN: (f64, f64) = (0.300, 0.600);
    pub const BLUE: (f64, f64) = (0.150, 0.060);
}

/// Display P3 primaries.
/// Derived from DCI-P3 cinema standard, adapted for displays.
/// White point: D65.
pub mod display_p3_primaries {
    pub const RED: (f64, f64) = (0.680, 0.320);
    pub const GREEN: (f64, f64) = (0.265, 0.690);
    pub const BLUE: (f64, f64) = (0.150, 0.060);
}

/// Adobe RGB (1998) primaries.
/// From IEC 61966-2-5. Red and blue are identical to sRGB; only green
/// differs. White point: D65.
pub mod a98_rgb_primaries {
    pub const RED: (f64, f64) = (0.6400, 0.3300);
    pub const GREEN: (f64, f64) = (0.2100, 0.7100);
    pub const BLUE: (f64, f64) = (0.1500, 0.0600);
}

/// ProPhoto RGB (ROMM RGB) primaries.
/// From ISO 22028-2:2013. Uses the D50 white point and includes imaginary
/// colors outside human vision.
pub mod prophoto_rgb_primaries {
    pub const RED: (f64, f64) = (0.7347, 0.2653);
    pub const GREEN: (f64, f64) = (0.1596, 0.8404);
    pub const BLUE: (f64, f64) = (0.0366, 0.0001);
}

/// Rec.2020 primaries.
/// From ITU-R BT.2020-2. Ultra-wide gamut for HDR/UHD television.
/// White point: D65.
pub mod rec2020_primaries {
    pub const RED: (f64, f64) = (0.708, 0.292);
    pub const GREEN: (f64, f64) = (0.170, 0.797);
    pub const BLUE: (f64, f64) = (0.131, 0.046);
}

// =============================================================================
// TRANSFER FUNCTION CONSTANTS
// =============================================================================

/// sRGB transfer function constants.
/// From IEC 61966-2-1:1999. The piecewise function ensures continuity and a
/// continuous first derivative.
pub mod srgb_transfer {
    /// Linear segment threshold, encode direction.
    pub const THRESHOLD: f64 = 0.0031308;
    /// Decode-direction threshold (= THRESHOLD * LINEAR_SLOPE).
    pub const DECODE_THRESHOLD: f64 = 0.04045;
    /// Linear segment slope.
    pub const LINEAR_SLOPE: f64 = 12.92;
    /// Power curve exponent.
    pub const GAMMA: f64 = 2.4;
    /// Power curve scale factor.
    pub const SCALE: f64 = 1.055;
    /// Power curve offset.
    pub const OFFSET: f64 = 0.055;
}

/// Adobe RGB (1998) transfer function: pure power curve 563/256.
pub mod a98_transfer {
    pub const GAMMA: f64 = 563.0 / 256.0;
}

/// ProPhoto RGB transfer function constants.
/// From ISO 22028-2:2013.
pub mod prophoto_transfer {
    /// Decode-direction threshold (encoded value).
    pub const DECODE_THRESHOLD: f64 = 16.0 / 512.0;
    /// Encode-direction threshold (linear value).
    pub const THRESHOLD: f64 = 1.0 / 512.0;
    pub const LINEAR_SLOPE: f64 = 16.0;
    pub const GAMMA: f64 = 1.8;
}

/// Rec.2020 transfer function constants.
/// From ITU-R BT.2020-2, at the extended precision used by the CSS
/// conversion code.
pub mod rec2020_transfer {
    pub const ALPHA: f64 = 1.09929682680944;
    pub const BETA: f64 = 0.018053968510807;
    pub const LINEAR_SLOPE: f64 = 4.5;
    pub const GAMMA: f64 = 0.45;
}

// =============================================================================
// CIELAB
// =============================================================================

/// CIELAB constants, in the rational form used by the CSS conversion code.
pub mod cielab {
    /// (6/29)^3: threshold on the linearized axis.
    pub const EPSILON: f64 = 216.0 / 24389.0;
    /// (29/3)^3: slope of the linear segment.
    pub const KAPPA: f64 = 24389.0 / 27.0;
}

// =============================================================================
// OKLAB (Björn Ottosson, 2020)
// =============================================================================
//
// XYZ-D65 <-> LMS and LMS' <-> OKLab matrices at the precision published in
// the CSS Color 4 conversion code. These are not derivable from
// chromaticities, so both directions are stored.

#[rustfmt::skip]
pub const XYZ_TO_OKLMS: Mat3 = [
    [0.8190224379967030, 0.3619062600528904, -0.1288737815209879],
    [0.0329836539323885, 0.9292868615863434,  0.0361446663506424],
    [0.0481771893596242, 0.2642395317527308,  0.6335478284694309],
];

#[rustfmt::skip]
pub const OKLMS_TO_XYZ: Mat3 = [
    [ 1.2268798758459243, -0.5578149944602171,  0.2813910456659647],
    [-0.0405757452148008,  1.1122868032803170, -0.0717110580655164],
    [-0.0763729366746601, -0.4214933324022432,  1.5869240198367816],
];

#[rustfmt::skip]
pub const OKLMS_TO_OKLAB: Mat3 = [
    [0.2104542683093140,  0.7936177747023054, -0.0040720430116193],
    [1.9779985324311684, -2.4285922420485799,  0.4505937096174110],
    [0.0259040424655478,  0.7827717124575296, -0.8086757549230774],
];

#[rustfmt::skip]
pub const OKLAB_TO_OKLMS: Mat3 = [
    [1.0000000000000000,  0.3963377773761749,  0.2158037573099136],
    [1.0000000000000000, -0.1055613458156586, -0.0638541728258133],
    [1.0000000000000000, -0.0894841775298119, -1.2914855480194092],
];

// =============================================================================
// CHROMATIC ADAPTATION (Bradford)
// =============================================================================
//
// Linear Bradford adaptation between D65 and D50, as published in the CSS
// Color 4 conversion code.

#[rustfmt::skip]
pub const XYZ_D65_TO_D50: Mat3 = [
    [ 1.0479297925449969,   0.022946870601609652, -0.05019226628920524],
    [ 0.02962780877005599,  0.9904344267538799,   -0.017073799063418826],
    [-0.009243040646204504, 0.015055191490298152,  0.7518742814281371],
];

#[rustfmt::skip]
pub const XYZ_D50_TO_D65: Mat3 = [
    [ 0.955473421488075,    -0.02309845494876471,  0.06325924320057072],
    [-0.0283697093338637,    1.0099953980813041,   0.021041441191917323],
    [ 0.012314014864481998, -0.020507649298898964, 1.330365926242124],
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::mat3_mul_mat3;

    #[test]
    fn test_bradford_roundtrip() {
        let id = mat3_mul_mat3(&XYZ_D65_TO_D50, &XYZ_D50_TO_D65);
        for (i, row) in id.iter().enumerate() {
            for (j, &v) in row.iter().enumerate() {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!((v - expected).abs() < 1e-6, "id[{}][{}] = {}", i, j, v);
            }
        }
    }

    #[test]
    fn test_oklms_matrices_inverse() {
        let id = mat3_mul_mat3(&XYZ_TO_OKLMS, &OKLMS_TO_XYZ);
        for (i, row) in id.iter().enumerate() {
            for (j, &v) in row.iter().enumerate() {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!((v - expected).abs() < 1e-6, "id[{}][{}] = {}", i, j, v);
            }
        }
    }

    #[test]
    fn test_white_points() {
        assert!((WHITE_D65[0] - 0.9504559270516716).abs() < 1e-12);
        assert!((WHITE_D50[0] - 0.9642956764295677).abs() < 1e-12);
        assert_eq!(WHITE_D65[1], 1.0);
        assert_eq!(WHITE_D50[1], 1.0);
    }
}
