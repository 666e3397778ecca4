//! Process-wide converter registry.
//!
//! All tables are owned by a single [`Registry`] behind a reader/writer
//! lock. Mutation happens only through the registration entry points, which
//! also invalidate the memoized conversion graph. Readers clone the `Arc`d
//! entries they need and drop the lock before doing any conversion work, so
//! converter callbacks never run under the lock.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use once_cell::sync::Lazy;

use crate::error::{Error, Result};
use crate::math::Vec3;
use crate::model::{ColorModel, ColorType, Component};
use crate::{bases, fit, graph, models, named, parser};

/// A registered gamut-fit method. Receives the coordinates and the model
/// they are expressed in; returns fitted coordinates.
pub type FitFn = Arc<dyn Fn(Vec3, &ColorModel) -> Result<Vec3> + Send + Sync>;

static REGISTRY: Lazy<RwLock<Registry>> = Lazy::new(|| RwLock::new(Registry::with_builtins()));

fn read_lock() -> RwLockReadGuard<'static, Registry> {
    REGISTRY.read().unwrap_or_else(|e| e.into_inner())
}

fn write_lock() -> RwLockWriteGuard<'static, Registry> {
    REGISTRY.write().unwrap_or_else(|e| e.into_inner())
}

// ============================================================================
// Key normalization
// ============================================================================

/// Collapse whitespace runs to single hyphens and lower-case.
pub fn normalize_key(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_gap = false;
    for ch in name.trim().chars() {
        if ch.is_whitespace() {
            pending_gap = true;
            continue;
        }
        if pending_gap {
            out.push('-');
            pending_gap = false;
        }
        out.push(ch.to_ascii_lowercase());
    }
    out
}

/// Color-function names drop whitespace entirely.
pub fn normalize_function_key(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Named colors keep only letters.
pub fn normalize_named_color_key(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphabetic())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

// ============================================================================
// The registry
// ============================================================================

/// Owner of every converter table. Obtain the process-wide instance through
/// the free functions in this module.
pub struct Registry {
    /// Scan list for `Color::from_css`, in insertion order.
    color_types: Vec<(String, Arc<dyn ColorType>)>,
    /// Formatting targets for `Color::to`, in insertion order.
    color_bases: Vec<(String, Arc<dyn ColorType>)>,
    /// Model functions (`rgb`, `hsl`, ...) by function name.
    color_functions: HashMap<String, Arc<ColorModel>>,
    /// Every registered model, including spaces. Nodes of the graph.
    color_models: HashMap<String, Arc<ColorModel>>,
    /// The `color(<space> ...)` family by space name.
    color_spaces: HashMap<String, Arc<ColorModel>>,
    /// Named colors in insertion order; first value match wins.
    named_colors: Vec<(String, [u8; 3])>,
    /// Gamut-fit methods by name.
    fit_methods: HashMap<String, FitFn>,
}

impl Registry {
    fn empty() -> Self {
        Registry {
            color_types: Vec::new(),
            color_bases: Vec::new(),
            color_functions: HashMap::new(),
            color_models: HashMap::new(),
            color_spaces: HashMap::new(),
            named_colors: Vec::new(),
            fit_methods: HashMap::new(),
        }
    }

    /// The pre-populated registry created at process start.
    fn with_builtins() -> Self {
        let mut reg = Registry::empty();

        // Bootstrap bypasses bridge validation: the builtin edge set is
        // circular at the XYZ hub and valid only as a whole.
        for model in models::builtin_models() {
            reg.install_model(model);
        }
        for space in models::builtin_spaces() {
            reg.install_space(space);
        }

        // Scan order decides which type claims an input first.
        reg.install_base("hex-color", bases::hex_color_type());
        reg.install_base("named-color", bases::named_color_type());
        reg.install_base("transparent", bases::transparent_type());
        reg.install_type("currentcolor", bases::currentcolor_type());
        reg.install_type("system-color", bases::system_color_type());
        for name in ["rgb", "hsl", "hwb", "lab", "lch", "oklab", "oklch"] {
            let model = reg.color_functions[name].clone();
            reg.install_base(name, parser::model_type(model));
        }
        for name in [
            "srgb",
            "srgb-linear",
            "display-p3",
            "a98-rgb",
            "prophoto-rgb",
            "rec2020",
            "xyz-d65",
            "xyz-d50",
            "xyz",
        ] {
            let space = reg.color_spaces[name].clone();
            reg.install_base(name, parser::space_type(space));
        }
        reg.install_base("color-mix", bases::color_mix_type());
        reg.install_type("device-cmyk", bases::device_cmyk_type());
        reg.install_type("light-dark", bases::light_dark_type());
        reg.install_type("contrast-color", bases::contrast_color_type());

        for &(name, rgb) in named::NAMED_COLORS {
            reg.named_colors.push((name.to_string(), rgb));
        }

        for (name, method) in fit::builtin_methods() {
            reg.fit_methods.insert(name.to_string(), method);
        }

        reg
    }

    fn install_model(&mut self, model: ColorModel) {
        let model = Arc::new(model);
        self.color_functions.insert(model.name.clone(), model.clone());
        self.color_models.insert(model.name.clone(), model);
    }

    fn install_space(&mut self, space: ColorModel) {
        let space = Arc::new(space);
        self.color_spaces.insert(space.name.clone(), space.clone());
        self.color_models.insert(space.name.clone(), space);
    }

    fn install_type(&mut self, name: &str, ty: Arc<dyn ColorType>) {
        self.color_types.push((name.to_string(), ty));
    }

    fn install_base(&mut self, name: &str, ty: Arc<dyn ColorType>) {
        self.color_bases.push((name.to_string(), ty.clone()));
        self.color_types.push((name.to_string(), ty));
    }

    // ------------------------------------------------------------------
    // Checked registration
    // ------------------------------------------------------------------

    fn add_color_type(&mut self, name: &str, ty: Arc<dyn ColorType>) -> Result<()> {
        let key = normalize_key(name);
        if self.color_types.iter().any(|(n, _)| *n == key) {
            return Err(Error::Conflict(key));
        }
        self.color_types.push((key, ty));
        Ok(())
    }

    fn add_color_base(&mut self, name: &str, ty: Arc<dyn ColorType>) -> Result<()> {
        let key = normalize_key(name);
        if self.color_types.iter().any(|(n, _)| *n == key)
            || self.color_bases.iter().any(|(n, _)| *n == key)
        {
            return Err(Error::Conflict(key));
        }
        self.color_bases.push((key.clone(), ty.clone()));
        self.color_types.push((key, ty));
        Ok(())
    }

    fn validate_components(components: &[Component]) -> Result<()> {
        if components.len() != 3 {
            return Err(Error::Validation(format!(
                "expected 3 components, got {}",
                components.len()
            )));
        }
        for (index, component) in components.iter().enumerate() {
            if component.index != index {
                return Err(Error::Validation(format!(
                    "component '{}' has index {}, expected {}",
                    component.name, component.index, index
                )));
            }
            if component.name == "none" {
                return Err(Error::Validation(
                    "'none' is reserved and cannot name a component".into(),
                ));
            }
            if components[..index].iter().any(|c| c.name == component.name) {
                return Err(Error::Validation(format!(
                    "duplicate component name '{}'",
                    component.name
                )));
            }
        }
        Ok(())
    }

    fn add_color_function(&mut self, model: ColorModel) -> Result<()> {
        let key = normalize_function_key(&model.name);
        if key.is_empty() {
            return Err(Error::Validation("model name must not be empty".into()));
        }
        if self.color_models.contains_key(&key) {
            return Err(Error::Conflict(key));
        }
        Self::validate_components(&model.components)?;
        let bridge = normalize_key(&model.bridge);
        if bridge == key {
            return Err(Error::Validation(format!(
                "model '{}' cannot bridge to itself",
                key
            )));
        }
        if !self.color_models.contains_key(&bridge) {
            return Err(Error::Validation(format!(
                "bridge '{}' of model '{}' is not a registered model",
                bridge, key
            )));
        }

        let mut model = model;
        model.name = key.clone();
        model.bridge = bridge;
        model.is_space = false;
        let model = Arc::new(model);

        self.color_functions.insert(key.clone(), model.clone());
        self.color_models.insert(key.clone(), model.clone());
        self.add_color_base(&key, parser::model_type(model))?;
        Ok(())
    }

    fn add_color_space(&mut self, space: ColorModel) -> Result<()> {
        let key = normalize_key(&space.name);
        if key.is_empty() {
            return Err(Error::Validation("space name must not be empty".into()));
        }
        if self.color_models.contains_key(&key) {
            return Err(Error::Conflict(key));
        }
        Self::validate_components(&space.components)?;
        let bridge = normalize_key(&space.bridge);
        if !self.color_models.contains_key(&bridge) {
            return Err(Error::Validation(format!(
                "bridge '{}' of space '{}' is not a registered model",
                bridge, key
            )));
        }

        let mut space = space;
        space.name = key.clone();
        space.bridge = bridge;
        space.is_space = true;
        let space = Arc::new(space);

        self.color_spaces.insert(key.clone(), space.clone());
        self.color_models.insert(key.clone(), space.clone());
        self.add_color_base(&key, parser::space_type(space))?;
        Ok(())
    }

    fn add_named_color(&mut self, name: &str, rgb: [u8; 3]) -> Result<()> {
        let key = normalize_named_color_key(name);
        if key.is_empty() {
            return Err(Error::Validation("named color must contain letters".into()));
        }
        if self.named_colors.iter().any(|(n, _)| *n == key) {
            return Err(Error::Conflict(key));
        }
        if let Some((existing, _)) = self.named_colors.iter().find(|(_, v)| *v == rgb) {
            return Err(Error::Conflict(format!(
                "value {:?} is already registered as '{}'",
                rgb, existing
            )));
        }
        self.named_colors.push((key, rgb));
        Ok(())
    }

    fn add_fit_method(&mut self, name: &str, method: FitFn) -> Result<()> {
        let key = normalize_key(name);
        if self.fit_methods.contains_key(&key) {
            return Err(Error::Conflict(key));
        }
        self.fit_methods.insert(key, method);
        Ok(())
    }

    fn remove(&mut self, name: &str) {
        let key = normalize_key(name);
        let function_key = normalize_function_key(name);
        let named_key = normalize_named_color_key(name);

        self.color_types.retain(|(n, _)| *n != key && *n != function_key);
        self.color_bases.retain(|(n, _)| *n != key && *n != function_key);
        self.color_functions.remove(&key);
        self.color_functions.remove(&function_key);
        self.color_models.remove(&key);
        self.color_models.remove(&function_key);
        self.color_spaces.remove(&key);
        self.named_colors.retain(|(n, _)| *n != named_key);
        self.fit_methods.remove(&key);
    }
}

// ============================================================================
// Table selection and batch registration
// ============================================================================

/// Which registry table an operation addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    /// The `Color::from_css` scan list.
    ColorTypes,
    /// Formatting targets.
    ColorBases,
    /// Model functions.
    ColorFunctions,
    /// Every model (functions plus spaces).
    ColorModels,
    /// The `color(<space> ...)` family.
    ColorSpaces,
    /// Named colors.
    NamedColors,
    /// Gamut-fit methods.
    FitMethods,
}

/// One entry for batch registration; the variant must match the addressed
/// table.
pub enum RegistryEntry {
    /// A bare color type.
    ColorType {
        /// Name to register under.
        name: String,
        /// The converter.
        converter: Arc<dyn ColorType>,
    },
    /// A color base (also installed as a type).
    ColorBase {
        /// Name to register under.
        name: String,
        /// The converter.
        converter: Arc<dyn ColorType>,
    },
    /// A model function, built with [`ColorModel::builder`].
    ColorFunction(ColorModel),
    /// A color space, built with [`crate::model::SpaceBuilder`].
    ColorSpace(ColorModel),
    /// A named color.
    NamedColor {
        /// Name to register under (non-letters are stripped).
        name: String,
        /// The sRGB triple.
        rgb: [u8; 3],
    },
    /// A gamut-fit method.
    FitMethod {
        /// Name to register under.
        name: String,
        /// The method.
        method: FitFn,
    },
}

// ============================================================================
// Public registration surface
// ============================================================================

/// Register a bare color type (parse-only unless it formats).
pub fn register_color_type(name: &str, converter: Arc<dyn ColorType>) -> Result<()> {
    let result = write_lock().add_color_type(name, converter);
    graph::invalidate();
    log::debug!("registered color type '{}'", name);
    result
}

/// Register a color base: a type that is also a formatting target.
pub fn register_color_base(name: &str, converter: Arc<dyn ColorType>) -> Result<()> {
    let result = write_lock().add_color_base(name, converter);
    graph::invalidate();
    log::debug!("registered color base '{}'", name);
    result
}

/// Register a model function. The registry synthesizes and installs the
/// wrapping color type; the model's bridge must already be registered.
pub fn register_color_function(model: ColorModel) -> Result<()> {
    let result = write_lock().add_color_function(model);
    graph::invalidate();
    result
}

/// Register a `color(<space> ...)` space. The registry synthesizes and
/// installs the wrapping color type; the space's bridge must already be
/// registered.
pub fn register_color_space(space: ColorModel) -> Result<()> {
    let result = write_lock().add_color_space(space);
    graph::invalidate();
    result
}

/// Register a named color. Rejects both duplicate names and RGB triples
/// already registered under a different name.
pub fn register_named_color(name: &str, rgb: [u8; 3]) -> Result<()> {
    let result = write_lock().add_named_color(name, rgb);
    graph::invalidate();
    result
}

/// Register a gamut-fit method.
pub fn register_fit_method(name: &str, method: FitFn) -> Result<()> {
    let result = write_lock().add_fit_method(name, method);
    graph::invalidate();
    result
}

/// Remove the names from every table they appear in.
pub fn unregister(names: &[&str]) {
    {
        let mut reg = write_lock();
        for name in names {
            reg.remove(name);
        }
    }
    graph::invalidate();
}

/// List the entry names of a table, in iteration order.
pub fn get(kind: Table) -> Vec<String> {
    let reg = read_lock();
    match kind {
        Table::ColorTypes => reg.color_types.iter().map(|(n, _)| n.clone()).collect(),
        Table::ColorBases => reg.color_bases.iter().map(|(n, _)| n.clone()).collect(),
        Table::ColorFunctions => {
            let mut names: Vec<_> = reg.color_functions.keys().cloned().collect();
            names.sort();
            names
        }
        Table::ColorModels => {
            let mut names: Vec<_> = reg.color_models.keys().cloned().collect();
            names.sort();
            names
        }
        Table::ColorSpaces => {
            let mut names: Vec<_> = reg.color_spaces.keys().cloned().collect();
            names.sort();
            names
        }
        Table::NamedColors => reg.named_colors.iter().map(|(n, _)| n.clone()).collect(),
        Table::FitMethods => {
            let mut names: Vec<_> = reg.fit_methods.keys().cloned().collect();
            names.sort();
            names
        }
    }
}

/// Batch-register entries into one table. Every entry must match `kind`.
pub fn register(kind: Table, entries: Vec<RegistryEntry>) -> Result<()> {
    for entry in entries {
        match (kind, entry) {
            (Table::ColorTypes, RegistryEntry::ColorType { name, converter }) => {
                register_color_type(&name, converter)?;
            }
            (Table::ColorBases, RegistryEntry::ColorBase { name, converter }) => {
                register_color_base(&name, converter)?;
            }
            (Table::ColorFunctions, RegistryEntry::ColorFunction(model)) => {
                register_color_function(model)?;
            }
            (Table::ColorSpaces, RegistryEntry::ColorSpace(space)) => {
                register_color_space(space)?;
            }
            (Table::NamedColors, RegistryEntry::NamedColor { name, rgb }) => {
                register_named_color(&name, rgb)?;
            }
            (Table::FitMethods, RegistryEntry::FitMethod { name, method }) => {
                register_fit_method(&name, method)?;
            }
            (kind, _) => {
                return Err(Error::Validation(format!(
                    "entry does not belong to the {:?} table",
                    kind
                )));
            }
        }
    }
    Ok(())
}

// ============================================================================
// Read access used by the engine
// ============================================================================

/// Look up a model by normalized name.
pub(crate) fn model(name: &str) -> Result<Arc<ColorModel>> {
    let key = normalize_key(name);
    read_lock()
        .color_models
        .get(&key)
        .cloned()
        .ok_or(Error::Lookup {
            kind: "model",
            name: key,
        })
}

/// Non-failing model lookup.
pub(crate) fn maybe_model(name: &str) -> Option<Arc<ColorModel>> {
    read_lock().color_models.get(&normalize_key(name)).cloned()
}

/// Snapshot of the scan list for `Color::from_css`.
pub(crate) fn types_snapshot() -> Vec<(String, Arc<dyn ColorType>)> {
    read_lock().color_types.clone()
}

/// Look up a formatting target by name, scanning bases then bare types.
pub(crate) fn format_target(name: &str) -> Option<Arc<dyn ColorType>> {
    let key = normalize_key(name);
    let reg = read_lock();
    reg.color_bases
        .iter()
        .chain(reg.color_types.iter())
        .find(|(n, _)| *n == key)
        .map(|(_, t)| t.clone())
}

/// Named-color lookup by normalized name.
pub(crate) fn named_color(name: &str) -> Option<[u8; 3]> {
    let key = normalize_named_color_key(name);
    read_lock()
        .named_colors
        .iter()
        .find(|(n, _)| *n == key)
        .map(|(_, rgb)| *rgb)
}

/// Reverse named-color lookup; first registered match wins.
pub(crate) fn named_color_by_value(rgb: [u8; 3]) -> Option<String> {
    read_lock()
        .named_colors
        .iter()
        .find(|(_, v)| *v == rgb)
        .map(|(n, _)| n.clone())
}

/// Fit-method lookup.
pub(crate) fn fit_method(name: &str) -> Option<FitFn> {
    read_lock().fit_methods.get(&normalize_key(name)).cloned()
}

/// All model names and their bridges; the graph edge set.
pub(crate) fn model_edges() -> Vec<(String, String)> {
    read_lock()
        .color_models
        .values()
        .map(|m| (m.name.clone(), m.bridge.clone()))
        .collect()
}

/// All registered model names.
pub(crate) fn model_names() -> Vec<String> {
    read_lock().color_models.keys().cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_key() {
        assert_eq!(normalize_key("  Display   P3 "), "display-p3");
        assert_eq!(normalize_key("sRGB"), "srgb");
    }

    #[test]
    fn test_normalize_function_key() {
        assert_eq!(normalize_function_key("device cmyk"), "devicecmyk");
    }

    #[test]
    fn test_normalize_named_color_key() {
        assert_eq!(normalize_named_color_key("dusk mint"), "duskmint");
        assert_eq!(normalize_named_color_key("Rebecca-Purple2"), "rebeccapurple");
    }

    #[test]
    fn test_builtin_tables_populated() {
        assert!(get(Table::ColorModels).contains(&"rgb".to_string()));
        assert!(get(Table::ColorModels).contains(&"xyz-d65".to_string()));
        assert!(get(Table::ColorSpaces).contains(&"display-p3".to_string()));
        assert!(get(Table::ColorTypes).contains(&"hex-color".to_string()));
        assert!(get(Table::FitMethods).contains(&"css-gamut-map".to_string()));
        assert!(get(Table::NamedColors).contains(&"rebeccapurple".to_string()));
    }

    #[test]
    fn test_duplicate_type_rejected() {
        let err = register_color_type("hex-color", bases::hex_color_type()).unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[test]
    fn test_named_color_value_conflict() {
        // aliceblue is a builtin value.
        let err = register_named_color("not aliceblue", [240, 248, 255]).unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[test]
    fn test_function_requires_registered_bridge() {
        use crate::model::ValueKind;
        let model = ColorModel::builder("weird", "no-such-model")
            .component("a", ValueKind::Range(0.0, 1.0), 5)
            .component("b", ValueKind::Range(0.0, 1.0), 5)
            .component("c", ValueKind::Range(0.0, 1.0), 5)
            .to_bridge(|c| c)
            .from_bridge(|c| c)
            .build()
            .unwrap();
        let err = register_color_function(model).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_register_then_unregister_restores_absence() {
        use crate::model::ValueKind;
        let model = ColorModel::builder("tmpmodel", "rgb")
            .component("a", ValueKind::Range(0.0, 1.0), 5)
            .component("b", ValueKind::Range(0.0, 1.0), 5)
            .component("c", ValueKind::Range(0.0, 1.0), 5)
            .to_bridge(|c| c)
            .from_bridge(|c| c)
            .build()
            .unwrap();
        register_color_function(model).unwrap();
        assert!(get(Table::ColorModels).contains(&"tmpmodel".to_string()));
        assert!(get(Table::ColorTypes).contains(&"tmpmodel".to_string()));
        unregister(&["tmpmodel"]);
        assert!(!get(Table::ColorModels).contains(&"tmpmodel".to_string()));
        assert!(!get(Table::ColorTypes).contains(&"tmpmodel".to_string()));
        assert!(!get(Table::ColorBases).contains(&"tmpmodel".to_string()));
    }
}
