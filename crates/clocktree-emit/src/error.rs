//! Emission errors.

use clocktree_core::SolveError;
use thiserror::Error;

/// Errors that can occur while turning solved settings into register writes.
#[derive(Debug, Error)]
pub enum EmitError {
    /// Two writes in one step target the same register field.
    #[error("ambiguous emission: {peripheral}.{register}.{field} is written twice in one step")]
    EmissionAmbiguity {
        peripheral: String,
        register: String,
        field: String,
    },

    /// A committed setting has no hardware location to write to.
    #[error("`{key}` has no register location")]
    MissingLocation { key: String },

    /// A committed value has no register encoding.
    #[error("value {value} of `{key}` cannot be encoded")]
    Unencodable { key: String, value: String },

    #[error(transparent)]
    Solve(#[from] SolveError),

    #[error("serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, EmitError>;
