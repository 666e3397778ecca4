//! Ambient configuration: active theme, the system-color table and the
//! default fit method.
//!
//! `configure` merges recursively: map entries are merged per key, leaf
//! values are replaced, omitted fields are ignored.

use std::collections::HashMap;
use std::sync::RwLock;

use once_cell::sync::Lazy;

/// Light or dark rendering context, consulted by `light-dark()` and the
/// system-color table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Theme {
    /// Light theme (the default).
    #[default]
    Light,
    /// Dark theme.
    Dark,
}

/// Engine defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Defaults {
    /// Fit method applied when formatting without an explicit override.
    pub fit: String,
}

/// The full ambient configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Active theme.
    pub theme: Theme,
    /// System colors: normalized name to `[light, dark]` sRGB triples.
    pub system_colors: HashMap<String, [[u8; 3]; 2]>,
    /// Engine defaults.
    pub defaults: Defaults,
}

/// A partial configuration; `None` fields are left untouched by
/// [`configure`].
#[derive(Debug, Clone, Default)]
pub struct ConfigUpdate {
    /// Replace the active theme.
    pub theme: Option<Theme>,
    /// Merge these system colors per key.
    pub system_colors: Option<HashMap<String, [[u8; 3]; 2]>>,
    /// Update defaults.
    pub defaults: Option<DefaultsUpdate>,
}

/// Partial defaults.
#[derive(Debug, Clone, Default)]
pub struct DefaultsUpdate {
    /// Replace the default fit method.
    pub fit: Option<String>,
}

/// The CSS system colors with serviceable light/dark values; replaceable
/// through `configure`.
fn default_system_colors() -> HashMap<String, [[u8; 3]; 2]> {
    let entries: &[(&str, [[u8; 3]; 2])] = &[
        ("accentcolor", [[0, 96, 223], [0, 133, 255]]),
        ("accentcolortext", [[255, 255, 255], [255, 255, 255]]),
        ("activetext", [[238, 0, 0], [255, 102, 102]]),
        ("buttonborder", [[128, 128, 128], [110, 110, 110]]),
        ("buttonface", [[240, 240, 240], [60, 60, 60]]),
        ("buttontext", [[0, 0, 0], [255, 255, 255]]),
        ("canvas", [[255, 255, 255], [18, 18, 18]]),
        ("canvastext", [[0, 0, 0], [255, 255, 255]]),
        ("field", [[255, 255, 255], [40, 40, 40]]),
        ("fieldtext", [[0, 0, 0], [255, 255, 255]]),
        ("graytext", [[109, 109, 109], [146, 146, 146]]),
        ("highlight", [[181, 213, 255], [0, 96, 223]]),
        ("highlighttext", [[0, 0, 0], [255, 255, 255]]),
        ("linktext", [[0, 0, 238], [102, 178, 255]]),
        ("mark", [[255, 255, 0], [255, 255, 0]]),
        ("marktext", [[0, 0, 0], [0, 0, 0]]),
        ("visitedtext", [[85, 26, 139], [194, 133, 255]]),
    ];
    entries
        .iter()
        .map(|&(name, pair)| (name.to_string(), pair))
        .collect()
}

impl Default for Config {
    fn default() -> Self {
        Config {
            theme: Theme::Light,
            system_colors: default_system_colors(),
            defaults: Defaults {
                fit: "clip".to_string(),
            },
        }
    }
}

static CONFIG: Lazy<RwLock<Config>> = Lazy::new(|| RwLock::new(Config::default()));

/// Merge a partial configuration into the ambient one.
pub fn configure(update: ConfigUpdate) {
    let mut config = CONFIG.write().unwrap_or_else(|e| e.into_inner());
    if let Some(theme) = update.theme {
        config.theme = theme;
    }
    if let Some(system_colors) = update.system_colors {
        for (name, pair) in system_colors {
            let key: String = name
                .chars()
                .filter(|c| !c.is_whitespace())
                .map(|c| c.to_ascii_lowercase())
                .collect();
            config.system_colors.insert(key, pair);
        }
    }
    if let Some(defaults) = update.defaults {
        if let Some(fit) = defaults.fit {
            config.defaults.fit = fit;
        }
    }
}

/// Snapshot of the current configuration.
pub fn current() -> Config {
    CONFIG.read().unwrap_or_else(|e| e.into_inner()).clone()
}

/// The active theme.
pub fn theme() -> Theme {
    CONFIG.read().unwrap_or_else(|e| e.into_inner()).theme
}

/// The configured default fit method.
pub fn default_fit() -> String {
    CONFIG
        .read()
        .unwrap_or_else(|e| e.into_inner())
        .defaults
        .fit
        .clone()
}

/// Look up a system color case-insensitively, resolved for the active
/// theme.
pub fn system_color(name: &str) -> Option<[u8; 3]> {
    let key: String = name
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| c.to_ascii_lowercase())
        .collect();
    let config = CONFIG.read().unwrap_or_else(|e| e.into_inner());
    let pair = config.system_colors.get(&key)?;
    Some(match config.theme {
        Theme::Light => pair[0],
        Theme::Dark => pair[1],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.theme, Theme::Light);
        assert_eq!(config.defaults.fit, "clip");
        assert!(config.system_colors.contains_key("canvas"));
    }

    #[test]
    fn test_system_color_lookup_case_insensitive() {
        assert!(system_color("Canvas").is_some());
        assert!(system_color("CanvasText").is_some());
        assert!(system_color("NoSuchColor").is_none());
    }

    #[test]
    fn test_configure_merges_system_colors() {
        configure(ConfigUpdate {
            system_colors: Some(
                [("TestColor".to_string(), [[1, 2, 3], [4, 5, 6]])]
                    .into_iter()
                    .collect(),
            ),
            ..ConfigUpdate::default()
        });
        // Existing entries survive a merge.
        assert!(system_color("canvas").is_some());
        assert_eq!(system_color("testcolor"), Some([1, 2, 3]));
    }
}
