//! Errors for reading target specifications.
//!
//! Solving itself reports [`clocktree_core::SolveError`]; this type only covers
//! getting a [`TargetSpec`](crate::target::TargetSpec) off disk.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum TargetError {
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The `.target.toml` file does not exist.
    #[error("target file not found: {}", path.display())]
    NotFound {
        /// The missing path.
        path: PathBuf,
    },
}

/// Result type for target file operations.
pub type Result<T> = std::result::Result<T, TargetError>;
