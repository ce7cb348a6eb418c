//! Register-write emission for solved clocktree targets.
//!
//! [`emit`] walks the frozen settings of a [`clocktree_solve::Solution`] in
//! boot order and produces an [`Emission`]: grouped read-modify-writes,
//! spin-waits on hardware status fields, and named constants for the
//! firmware. [`fingerprint`] hashes the result for determinism checks.

pub mod emitter;
pub mod error;
pub mod fingerprint;
pub mod group;
pub mod ops;

pub use emitter::emit;
pub use error::{EmitError, Result};
pub use fingerprint::{fingerprint, fingerprint_hex, Fingerprint};
pub use ops::{ConstantValue, EmitOp, EmitWarning, Emission, FieldWrite};
