//! Crate-wide error type.
//!
//! Every fallible operation surfaces one of these variants to its immediate
//! caller; nothing is silently substituted. The plugin helper is the single
//! exception: it logs per-plugin faults and keeps going.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// All failure modes of the engine.
#[derive(Debug, Error)]
pub enum Error {
    /// A name or value is already present in a registry table.
    #[error("'{0}' is already used")]
    Conflict(String),

    /// A converter definition has the wrong shape (missing field, bad
    /// matrix dimension, duplicate or reserved component name, unresolved
    /// bridge).
    #[error("invalid definition: {0}")]
    Validation(String),

    /// A color string failed to parse.
    #[error("parse error: {0}")]
    Parse(String),

    /// A `calc()` expression failed to tokenize, parse or evaluate.
    #[error("invalid calc() expression: {0}")]
    Calc(String),

    /// A lookup into a registry table came up empty.
    #[error("unknown {kind} '{name}'")]
    Lookup {
        /// Which table was consulted ("model", "gamut", "fit method", ...).
        kind: &'static str,
        /// The name that was not found.
        name: String,
    },

    /// The conversion graph has no path between the two models.
    #[error("no path found from '{from}' to '{to}'")]
    NoPath {
        /// Starting model.
        from: String,
        /// Requested target model.
        to: String,
    },

    /// An invalid numeric option (e.g. a negative precision).
    #[error("invalid numeric option: {0}")]
    Numeric(String),

    /// No registered color type recognized the input string.
    #[error("unsupported or invalid color format: {0:?}")]
    InvalidFormat(String),

    /// The requested output type cannot format the given color.
    #[error("cannot format '{model}' as '{target}': {reason}")]
    UnsupportedFormat {
        /// Model of the color being formatted.
        model: String,
        /// The requested output type.
        target: String,
        /// Why formatting is impossible.
        reason: String,
    },
}
