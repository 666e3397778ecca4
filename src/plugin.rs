//! Plugin application.
//!
//! Plugins extend the engine exclusively through the public registration
//! entry points. The batch helper skips plugins it has already applied and
//! isolates per-plugin faults: a failing plugin is logged and does not
//! abort the rest of the batch.

use std::collections::HashSet;
use std::sync::RwLock;

use once_cell::sync::Lazy;

use crate::error::{Error, Result};

/// An engine extension. `install` registers converters, named colors or
/// fit methods through the registry API.
pub trait Plugin: Send + Sync {
    /// Unique plugin name, used for duplicate detection.
    fn name(&self) -> &str;

    /// Perform the registrations.
    fn install(&self) -> Result<()>;
}

static APPLIED: Lazy<RwLock<HashSet<String>>> = Lazy::new(|| RwLock::new(HashSet::new()));

/// Apply a batch of plugins. Duplicates (by name) are skipped; individual
/// failures are logged and do not stop the batch. An empty batch is an
/// error.
pub fn apply_plugins(plugins: &[&dyn Plugin]) -> Result<()> {
    if plugins.is_empty() {
        return Err(Error::Validation(
            "at least one plugin is required".into(),
        ));
    }

    for plugin in plugins {
        let name = plugin.name().to_string();
        let already_applied = APPLIED
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&name);
        if already_applied {
            log::debug!("plugin '{}' already applied, skipping", name);
            continue;
        }
        match plugin.install() {
            Ok(()) => {
                APPLIED
                    .write()
                    .unwrap_or_else(|e| e.into_inner())
                    .insert(name);
            }
            Err(err) => {
                log::error!("plugin '{}' failed to install: {}", name, err);
            }
        }
    }

    Ok(())
}
