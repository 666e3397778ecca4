//! Converter data model: component definitions, color models, color spaces
//! and the color-type trait the parser dispatches on.
//!
//! A *model* is a coordinate system with a declared bridge into a
//! neighboring model (the conversion graph edges). A *color type* is
//! anything `Color::from_css` can recognize: model functions, the
//! `color(<space> ...)` family, hex strings, named colors and the other
//! specialised bases.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::math::{mat3_invert, mat3_mul_vec3, Mat3, Vec3};

/// Coordinate transform between a model and its bridge.
pub type Transform = Arc<dyn Fn(Vec3) -> Vec3 + Send + Sync>;

/// Per-channel transfer function (gamma encode/decode).
pub type TransferFn = Arc<dyn Fn(f64) -> f64 + Send + Sync>;

/// What a component's textual value means.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ValueKind {
    /// A plain numeric range `[min, max]`.
    Range(f64, f64),
    /// An angle in degrees; implied range [0, 360].
    Angle,
    /// A percentage; implied range [0, 100].
    Percentage,
}

impl ValueKind {
    /// The numeric range backing this kind.
    pub fn range(&self) -> (f64, f64) {
        match *self {
            ValueKind::Range(min, max) => (min, max),
            ValueKind::Angle => (0.0, 360.0),
            ValueKind::Percentage => (0.0, 100.0),
        }
    }
}

/// One coordinate of a color model.
#[derive(Debug, Clone)]
pub struct Component {
    /// Lower-cased component name (`"r"`, `"h"`, ...).
    pub name: String,
    /// Position in the coordinate vector, 0..=2.
    pub index: usize,
    /// Value interpretation.
    pub kind: ValueKind,
    /// Decimal digits kept when formatting; `None` falls back to the
    /// engine default of 3.
    pub precision: Option<u32>,
}

/// Fit target of a model: a color space whose ranges bound it, or nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Gamut {
    /// No gamut limits (XYZ variants, Lab/LCH, OKLab/OKLCH).
    Unbounded,
    /// Bounded by the named color space's component ranges.
    Space(String),
}

/// A registered color model: an ordered component list plus the bridge
/// conversions that put it on the conversion graph.
#[derive(Clone)]
pub struct ColorModel {
    /// Registered (normalized) model name.
    pub name: String,
    /// Components ordered by index; alpha is implicit at index 3.
    pub components: Vec<Component>,
    /// Neighboring model this one converts to and from.
    pub bridge: String,
    /// Convert own coordinates into bridge coordinates.
    pub to_bridge: Transform,
    /// Convert bridge coordinates into own coordinates.
    pub from_bridge: Transform,
    /// Fit target used by gamut mapping.
    pub target_gamut: Gamut,
    /// Whether the historical comma form is accepted.
    pub supports_legacy: bool,
    /// Name of the legacy alpha form (`"rgba"`, `"hsla"`).
    pub alpha_variant: Option<String>,
    /// Parsed and formatted through `color(<name> ...)` instead of
    /// `<name>(...)`.
    pub is_space: bool,
}

impl fmt::Debug for ColorModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColorModel")
            .field("name", &self.name)
            .field("bridge", &self.bridge)
            .field("components", &self.components)
            .field("target_gamut", &self.target_gamut)
            .field("is_space", &self.is_space)
            .finish()
    }
}

impl ColorModel {
    /// Start a builder for a model function (`name(c1 c2 c3)` family).
    pub fn builder(name: &str, bridge: &str) -> ModelBuilder {
        ModelBuilder {
            name: name.to_string(),
            bridge: bridge.to_string(),
            components: Vec::new(),
            to_bridge: None,
            from_bridge: None,
            target_gamut: Gamut::Unbounded,
            supports_legacy: false,
            alpha_variant: None,
        }
    }

    /// Look up a component by lower-cased name.
    pub fn component(&self, name: &str) -> Option<&Component> {
        self.components.iter().find(|c| c.name == name)
    }

    /// The angle component, if the model has one.
    pub fn hue_component(&self) -> Option<&Component> {
        self.components.iter().find(|c| c.kind == ValueKind::Angle)
    }
}

/// Builder for [`ColorModel`] used by `register_color_function`.
pub struct ModelBuilder {
    name: String,
    bridge: String,
    components: Vec<(String, ValueKind, Option<u32>)>,
    to_bridge: Option<Transform>,
    from_bridge: Option<Transform>,
    target_gamut: Gamut,
    supports_legacy: bool,
    alpha_variant: Option<String>,
}

impl ModelBuilder {
    /// Append a component; its index is its position in the call order.
    pub fn component(mut self, name: &str, kind: ValueKind, precision: u32) -> Self {
        self.components.push((name.to_string(), kind, Some(precision)));
        self
    }

    /// Append a component that is never rounded beyond the engine default.
    pub fn component_unrounded(mut self, name: &str, kind: ValueKind) -> Self {
        self.components.push((name.to_string(), kind, None));
        self
    }

    /// Set the conversion into the bridge model.
    pub fn to_bridge(mut self, f: impl Fn(Vec3) -> Vec3 + Send + Sync + 'static) -> Self {
        self.to_bridge = Some(Arc::new(f));
        self
    }

    /// Set the conversion out of the bridge model.
    pub fn from_bridge(mut self, f: impl Fn(Vec3) -> Vec3 + Send + Sync + 'static) -> Self {
        self.from_bridge = Some(Arc::new(f));
        self
    }

    /// Bound the model by the named color space.
    pub fn target_gamut(mut self, space: &str) -> Self {
        self.target_gamut = Gamut::Space(space.to_string());
        self
    }

    /// Accept the legacy comma form, optionally with an alpha variant name.
    pub fn legacy(mut self, alpha_variant: Option<&str>) -> Self {
        self.supports_legacy = true;
        self.alpha_variant = alpha_variant.map(str::to_string);
        self
    }

    /// Validate and produce the model.
    pub fn build(self) -> Result<ColorModel> {
        if self.name.is_empty() {
            return Err(Error::Validation("model name must not be empty".into()));
        }
        if self.bridge == self.name {
            return Err(Error::Validation(format!(
                "model '{}' cannot bridge to itself",
                self.name
            )));
        }
        if self.components.len() != 3 {
            return Err(Error::Validation(format!(
                "model '{}' must declare exactly 3 components, got {}",
                self.name,
                self.components.len()
            )));
        }

        let mut components = Vec::with_capacity(3);
        for (index, (raw_name, kind, precision)) in self.components.into_iter().enumerate() {
            let name = raw_name.trim().to_ascii_lowercase();
            if name == "none" {
                return Err(Error::Validation(
                    "'none' is reserved and cannot name a component".into(),
                ));
            }
            if name.is_empty() {
                return Err(Error::Validation("component name must not be empty".into()));
            }
            if components.iter().any(|c: &Component| c.name == name) {
                return Err(Error::Validation(format!(
                    "duplicate component name '{}'",
                    name
                )));
            }
            components.push(Component {
                name,
                index,
                kind,
                precision,
            });
        }

        let to_bridge = self.to_bridge.ok_or_else(|| {
            Error::Validation(format!("model '{}' is missing to_bridge", self.name))
        })?;
        let from_bridge = self.from_bridge.ok_or_else(|| {
            Error::Validation(format!("model '{}' is missing from_bridge", self.name))
        })?;

        Ok(ColorModel {
            name: self.name,
            components,
            bridge: self.bridge,
            to_bridge,
            from_bridge,
            target_gamut: self.target_gamut,
            supports_legacy: self.supports_legacy,
            alpha_variant: self.alpha_variant,
            is_space: false,
        })
    }
}

/// Builder for the `color(<space> ...)` family used by
/// `register_color_space`. Composes the transfer functions with the
/// bridge matrices into a [`ColorModel`].
pub struct SpaceBuilder {
    name: String,
    bridge: String,
    to_bridge_matrix: Mat3,
    from_bridge_matrix: Option<Mat3>,
    to_linear: Option<TransferFn>,
    from_linear: Option<TransferFn>,
    component_names: [&'static str; 3],
    unbounded: bool,
}

impl SpaceBuilder {
    /// A new space converting to the given bridge through `to_bridge_matrix`.
    pub fn new(name: &str, bridge: &str, to_bridge_matrix: Mat3) -> Self {
        SpaceBuilder {
            name: name.to_string(),
            bridge: bridge.to_string(),
            to_bridge_matrix,
            from_bridge_matrix: None,
            to_linear: None,
            from_linear: None,
            component_names: ["r", "g", "b"],
            unbounded: false,
        }
    }

    /// Supply the inverse matrix explicitly instead of inverting.
    pub fn from_bridge_matrix(mut self, m: Mat3) -> Self {
        self.from_bridge_matrix = Some(m);
        self
    }

    /// Per-channel transfer functions (decode to linear, encode from
    /// linear). Identity when omitted.
    pub fn transfer(
        mut self,
        to_linear: impl Fn(f64) -> f64 + Send + Sync + 'static,
        from_linear: impl Fn(f64) -> f64 + Send + Sync + 'static,
    ) -> Self {
        self.to_linear = Some(Arc::new(to_linear));
        self.from_linear = Some(Arc::new(from_linear));
        self
    }

    /// Rename the three components (`x`/`y`/`z` for the XYZ variants).
    pub fn components(mut self, names: [&'static str; 3]) -> Self {
        self.component_names = names;
        self
    }

    /// Mark the space as having no gamut limits.
    pub fn unbounded(mut self) -> Self {
        self.unbounded = true;
        self
    }

    /// Validate and produce the model.
    pub fn build(self) -> Result<ColorModel> {
        if self.name.is_empty() {
            return Err(Error::Validation("space name must not be empty".into()));
        }
        if self.bridge == self.name {
            return Err(Error::Validation(format!(
                "space '{}' cannot bridge to itself",
                self.name
            )));
        }
        let finite = |m: &Mat3| m.iter().flatten().all(|v| v.is_finite());
        if !finite(&self.to_bridge_matrix) {
            return Err(Error::Validation(format!(
                "space '{}' has a non-numeric to_bridge matrix",
                self.name
            )));
        }
        let from_matrix = match self.from_bridge_matrix {
            Some(m) => {
                if !finite(&m) {
                    return Err(Error::Validation(format!(
                        "space '{}' has a non-numeric from_bridge matrix",
                        self.name
                    )));
                }
                m
            }
            None => mat3_invert(&self.to_bridge_matrix),
        };

        let to_matrix = self.to_bridge_matrix;
        let to_linear = self.to_linear;
        let from_linear = self.from_linear;

        let to_bridge: Transform = {
            let to_linear = to_linear.clone();
            Arc::new(move |coords: Vec3| {
                let linear = match &to_linear {
                    Some(f) => [f(coords[0]), f(coords[1]), f(coords[2])],
                    None => coords,
                };
                mat3_mul_vec3(&to_matrix, linear)
            })
        };
        let from_bridge: Transform = Arc::new(move |coords: Vec3| {
            let linear = mat3_mul_vec3(&from_matrix, coords);
            match &from_linear {
                Some(f) => [f(linear[0]), f(linear[1]), f(linear[2])],
                None => linear,
            }
        });

        let components = self
            .component_names
            .iter()
            .enumerate()
            .map(|(index, name)| Component {
                name: name.to_string(),
                index,
                kind: ValueKind::Range(0.0, 1.0),
                precision: Some(5),
            })
            .collect();

        let target_gamut = if self.unbounded {
            Gamut::Unbounded
        } else {
            Gamut::Space(self.name.clone())
        };

        Ok(ColorModel {
            name: self.name,
            components,
            bridge: self.bridge,
            to_bridge,
            from_bridge,
            target_gamut,
            supports_legacy: false,
            alpha_variant: None,
            is_space: true,
        })
    }
}

// ============================================================================
// Color types
// ============================================================================

/// Result of a successful parse: the model the coordinates are expressed in
/// plus the coordinates with alpha at index 3.
#[derive(Debug, Clone, PartialEq)]
pub struct Parsed {
    /// Registered model name.
    pub model: String,
    /// Coordinates; alpha at index 3.
    pub coords: [f64; 4],
}

/// Output options accepted by `Color::to` and the formatters.
#[derive(Clone, Debug, Default)]
pub struct FormatOptions {
    /// Emit the historical comma form where the model supports it.
    pub legacy: bool,
    /// Fit method; `None` uses the configured default.
    pub fit: Option<String>,
    /// Decimal digits override for all components.
    pub precision: Option<u32>,
    /// Suffix percentage components with `%` and angles with `deg`.
    pub units: bool,
}

/// Anything `Color::from_css` can recognize. Implementations live in
/// `bases` (hex, named colors, ...) and `parser` (model functions).
pub trait ColorType: Send + Sync {
    /// Cheap syntactic check; a `true` here commits the scan to this type.
    fn is_valid(&self, input: &str) -> bool;

    /// Full parse into model coordinates.
    fn parse(&self, input: &str) -> Result<Parsed>;

    /// Format a color as this type. Types that cannot format return
    /// [`Error::UnsupportedFormat`].
    fn format(&self, color: &crate::color::Color, options: &FormatOptions) -> Result<String> {
        let _ = options;
        Err(Error::UnsupportedFormat {
            model: color.model().to_string(),
            target: "this color type".into(),
            reason: "the type has no formatter".into(),
        })
    }
}

/// Origin-component environment for relative color syntax: lower-cased
/// component name to numeric value.
pub type ComponentEnv = HashMap<String, f64>;

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> impl Fn(Vec3) -> Vec3 {
        |c| c
    }

    #[test]
    fn test_builder_rejects_reserved_component() {
        let err = ColorModel::builder("foo", "rgb")
            .component("none", ValueKind::Angle, 1)
            .component("a", ValueKind::Percentage, 1)
            .component("b", ValueKind::Percentage, 1)
            .to_bridge(identity())
            .from_bridge(identity())
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("reserved"));
    }

    #[test]
    fn test_builder_rejects_duplicate_component() {
        let err = ColorModel::builder("foo", "rgb")
            .component("a", ValueKind::Percentage, 1)
            .component("A", ValueKind::Percentage, 1)
            .component("b", ValueKind::Percentage, 1)
            .to_bridge(identity())
            .from_bridge(identity())
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_builder_rejects_self_bridge() {
        let err = ColorModel::builder("foo", "foo")
            .component("a", ValueKind::Percentage, 1)
            .component("b", ValueKind::Percentage, 1)
            .component("c", ValueKind::Percentage, 1)
            .to_bridge(identity())
            .from_bridge(identity())
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("bridge to itself"));
    }

    #[test]
    fn test_space_builder_inverts_matrix() {
        let space = SpaceBuilder::new("demo", "xyz-d65", [[2.0, 0.0, 0.0], [0.0, 4.0, 0.0], [0.0, 0.0, 8.0]])
            .build()
            .unwrap();
        let forward = (space.to_bridge)([1.0, 1.0, 1.0]);
        assert_eq!(forward, [2.0, 4.0, 8.0]);
        let back = (space.from_bridge)(forward);
        for v in back {
            assert!((v - 1.0).abs() < 1e-12);
        }
        assert_eq!(space.target_gamut, Gamut::Space("demo".into()));
    }

    #[test]
    fn test_component_indices_follow_call_order() {
        let model = ColorModel::builder("demo", "rgb")
            .component("x", ValueKind::Range(0.0, 1.0), 5)
            .component("y", ValueKind::Angle, 1)
            .component("z", ValueKind::Percentage, 1)
            .to_bridge(identity())
            .from_bridge(identity())
            .build()
            .unwrap();
        assert_eq!(model.component("y").unwrap().index, 1);
        assert_eq!(model.hue_component().unwrap().name, "y");
    }
}
