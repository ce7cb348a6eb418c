//! Error types for schema loading.

use std::path::PathBuf;

use clocktree_core::SolveError;

/// Errors that can occur while loading or checking a chip schema.
#[derive(Debug, thiserror::Error)]
pub enum ChipError {
    /// TOML deserialization error.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization error.
    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    /// I/O error reading/writing schema files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Schema file not found.
    #[error("schema file not found: {}", path.display())]
    NotFound {
        /// The path that was not found.
        path: PathBuf,
    },

    /// No builtin schema for this chip.
    #[error("no builtin schema for chip `{chip}` (known: {})", known.join(", "))]
    UnknownChip {
        /// The requested chip.
        chip: String,
        /// Chips with a builtin schema.
        known: Vec<String>,
    },

    /// The schema itself is inconsistent.
    #[error(transparent)]
    Schema(#[from] SolveError),
}

/// Result type for chip schema operations.
pub type Result<T> = std::result::Result<T, ChipError>;
