//! tinct - a runtime-extensible color engine for CSS Color Modules 4 and 5.
//!
//! Parses every CSS color notation (legacy commas, modern whitespace,
//! relative `from` syntax, `color()`, `color-mix()`, `calc()` and nested
//! expressions), converts between models along a shortest-path graph of
//! registered converters, fits colors into gamuts, manipulates and mixes
//! components, and computes perceptual difference.
//!
//! ```
//! use tinct::{Color, FormatOptions};
//!
//! let coral = Color::from_css("#ff5733")?;
//! assert_eq!(coral.to("rgb", &FormatOptions::default())?, "rgb(255 87 51)");
//! assert_eq!(coral.in_model("oklch")?.model(), "oklch");
//! # Ok::<(), tinct::Error>(())
//! ```
//!
//! Everything the engine knows is held in a process-wide registry of color
//! types, models, spaces, named colors and fit methods. New notations and
//! spaces plug in at runtime through the `register_*` entry points or the
//! [`Plugin`] batch helper.

#![deny(missing_docs)]

mod bases;
mod calc;
mod color;
mod colorspace;
mod config;
mod error;
mod expr;
mod fit;
mod graph;
mod math;
mod model;
mod models;
mod named;
mod parser;
mod plugin;
mod registry;

pub use color::{
    BiasFn, Color, ComponentUpdate, HueMethod, MixOptions, RandomOptions, Update,
};
pub use config::{configure, Config, ConfigUpdate, Defaults, DefaultsUpdate, Theme};
pub use error::{Error, Result};
pub use expr::{clean, extract_balanced_expression};
pub use math::Easing;
pub use model::{
    ColorModel, ColorType, Component, ComponentEnv, FormatOptions, Gamut, ModelBuilder, Parsed,
    SpaceBuilder, TransferFn, Transform, ValueKind,
};
pub use plugin::{apply_plugins, Plugin};
pub use registry::{
    get, register, register_color_base, register_color_function, register_color_space,
    register_color_type, register_fit_method, register_named_color, unregister, FitFn,
    RegistryEntry, Table,
};

#[cfg(test)]
mod tests {
    use super::*;

    fn from(input: &str) -> Color {
        Color::from_css(input).unwrap()
    }

    #[test]
    fn test_registered_named_color_roundtrip() {
        register_named_color("dusk mint", [123, 167, 151]).unwrap();
        let name = from("rgb(123 167 151)")
            .to("named-color", &FormatOptions::default())
            .unwrap();
        assert_eq!(name, "duskmint");
        assert!(Color::is_valid("duskmint", None));
    }

    #[test]
    fn test_bridge_roundtrip_invariant() {
        // from_bridge(to_bridge(c)) must return c within 1e-5 for in-range
        // coordinates of every builtin model function.
        let samples: &[(&str, [f64; 3])] = &[
            ("rgb", [200.0, 120.0, 40.0]),
            ("hsl", [200.0, 40.0, 30.0]),
            ("hwb", [25.0, 10.0, 20.0]),
            ("lab", [50.0, 20.0, -30.0]),
            ("lch", [50.0, 30.0, 120.0]),
            ("oklab", [0.5, 0.1, -0.05]),
            ("oklch", [0.5, 0.1, 120.0]),
            ("srgb", [0.7, 0.3, 0.1]),
            ("display-p3", [0.7, 0.3, 0.1]),
            ("a98-rgb", [0.7, 0.3, 0.1]),
            ("prophoto-rgb", [0.7, 0.3, 0.1]),
            ("rec2020", [0.7, 0.3, 0.1]),
        ];
        for &(name, coords) in samples {
            let color = Color::new(name, &coords).unwrap();
            let bridged = color
                .in_model(match name {
                    "rgb" => "xyz-d65",
                    "hsl" | "hwb" => "rgb",
                    "lab" => "xyz-d50",
                    "lch" => "lab",
                    "oklab" => "xyz-d65",
                    "oklch" => "oklab",
                    _ => "xyz-d65",
                })
                .unwrap();
            let back = bridged.in_model(name).unwrap();
            for i in 0..3 {
                assert!(
                    (back.coords()[i] - coords[i]).abs() < 1e-5,
                    "{}[{}]: {} vs {}",
                    name,
                    i,
                    back.coords()[i],
                    coords[i]
                );
            }
        }
    }

    #[test]
    fn test_parse_format_equivalence() {
        for input in [
            "rgb(255 87 51)",
            "hsl(200 40 30)",
            "hwb(25 10 20)",
            "lab(50 20 -30)",
            "oklch(0.5 0.1 120)",
            "color(display-p3 0.7 0.3 0.1)",
        ] {
            let color = from(input);
            let formatted = color.to_css(&FormatOptions::default()).unwrap();
            let reparsed = from(&formatted);
            assert!(
                color.equals_eps(&reparsed, 1e-4),
                "{} -> {} -> {:?}",
                input,
                formatted,
                reparsed
            );
        }
    }

    #[test]
    fn test_conversion_chain_preserves_color() {
        let original = from("#ff5733");
        let chained = original
            .in_model("lab")
            .unwrap()
            .in_model("oklch")
            .unwrap()
            .in_model("lab")
            .unwrap();
        assert!(original.equals(&chained));
    }

    #[test]
    fn test_cache_invalidation_on_registration() {
        // A model registered after paths were memoized must be reachable,
        // and unreachable again after unregistration.
        let model = ColorModel::builder("doublergb", "rgb")
            .component("r", ValueKind::Range(0.0, 510.0), 0)
            .component("g", ValueKind::Range(0.0, 510.0), 0)
            .component("b", ValueKind::Range(0.0, 510.0), 0)
            .to_bridge(|c| [c[0] / 2.0, c[1] / 2.0, c[2] / 2.0])
            .from_bridge(|c| [c[0] * 2.0, c[1] * 2.0, c[2] * 2.0])
            .build()
            .unwrap();

        // Warm the path cache first.
        let red = from("#ff0000");
        red.in_model("oklch").unwrap();

        register_color_function(model).unwrap();
        let doubled = red.in_model("doublergb").unwrap();
        assert_eq!(doubled.coords(), [510.0, 0.0, 0.0, 1.0]);
        // And the new function parses.
        let parsed = from("doublergb(510 0 0)");
        assert!(parsed.equals(&red));

        unregister(&["doublergb"]);
        assert!(red.in_model("doublergb").is_err());
    }

    #[test]
    fn test_light_dark_follows_theme() {
        configure(ConfigUpdate {
            theme: Some(Theme::Dark),
            ..ConfigUpdate::default()
        });
        let dark = from("light-dark(#fff, #000)");
        configure(ConfigUpdate {
            theme: Some(Theme::Light),
            ..ConfigUpdate::default()
        });
        let light = from("light-dark(#fff, #000)");
        assert_eq!(dark.coords()[0], 0.0);
        assert_eq!(light.coords()[0], 255.0);
    }

    #[test]
    fn test_system_color_parses() {
        let canvas = from("Canvas");
        assert_eq!(canvas.model(), "rgb");
    }

    #[test]
    fn test_contrast_color_picks_readable() {
        let on_white = from("contrast-color(#fff)");
        assert_eq!(on_white.coords()[0], 0.0);
        let on_navy = from("contrast-color(#000080)");
        assert_eq!(on_navy.coords()[0], 255.0);
    }

    #[test]
    fn test_device_cmyk_fallback_format() {
        let color = from("device-cmyk(0 1 1 0)");
        let out = color
            .to("device-cmyk", &FormatOptions::default())
            .unwrap();
        assert_eq!(out, "device-cmyk(0 1 1 0, rgb(255 0 0))");
    }

    #[test]
    fn test_batch_registration_and_get() {
        register(
            Table::NamedColors,
            vec![
                RegistryEntry::NamedColor {
                    name: "batch one".into(),
                    rgb: [1, 3, 5],
                },
                RegistryEntry::NamedColor {
                    name: "batch two".into(),
                    rgb: [2, 4, 6],
                },
            ],
        )
        .unwrap();
        let names = get(Table::NamedColors);
        assert!(names.contains(&"batchone".to_string()));
        assert!(names.contains(&"batchtwo".to_string()));
        unregister(&["batchone", "batchtwo"]);
    }

    #[test]
    fn test_batch_registration_wrong_kind() {
        let err = register(
            Table::FitMethods,
            vec![RegistryEntry::NamedColor {
                name: "nope".into(),
                rgb: [0, 0, 0],
            }],
        )
        .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_plugin_registers_through_public_api() {
        struct Mint;
        impl Plugin for Mint {
            fn name(&self) -> &str {
                "mint-palette"
            }
            fn install(&self) -> Result<()> {
                register_named_color("plugin mint", [152, 255, 221])
            }
        }
        apply_plugins(&[&Mint]).unwrap();
        assert!(Color::is_valid("pluginmint", None));
    }

    #[test]
    fn test_unsupported_format_is_explicit() {
        let err = from("#123456")
            .to("color-mix", &FormatOptions::default())
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat { .. }));
    }

    #[test]
    fn test_fit_methods_respect_gamut_property() {
        let out_of_gamut = from("color(display-p3 1 0 0)");
        for method in ["clip", "chroma-reduction", "css-gamut-map"] {
            let fitted = out_of_gamut.within("srgb", method).unwrap();
            assert!(
                fitted.in_gamut_eps("srgb", 1e-5).unwrap(),
                "method {} left the gamut",
                method
            );
        }
    }

    #[test]
    fn test_invalid_inputs_error() {
        assert!(Color::from_css("not a color at all").is_err());
        assert!(Color::from_css("rgb(1 2)").is_err());
        assert!(Color::from_css("rgb(1 2 3 4 5)").is_err());
        assert!(Color::from_css("#12345").is_err());
        assert!(Color::from_css("color(unregistered-space 0 0 0)").is_err());
    }
}
