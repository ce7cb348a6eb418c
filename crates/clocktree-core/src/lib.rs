//! Core model of the clocktree solver.
//!
//! - **Frequencies** ([`frequency`]): exact rational hertz values.
//! - **Constraints and values** ([`constraint`], [`value`]): typed value domains
//!   and the three-way `Undetermined | Unused | Committed` slot value.
//! - **Schema** ([`schema`]): the per-chip capability table and topology.
//! - **Solving state** ([`state`]): single-assignment slots with speculative
//!   overlays, frozen into the settings handed to the emitter.

pub mod constraint;
pub mod error;
pub mod frequency;
pub mod key;
pub mod schema;
pub mod state;
pub mod value;

pub use constraint::{Constraint, Domain, MappingEntry};
pub use error::{Result, SolveError, Subsystem};
pub use frequency::Frequency;
pub use key::Key;
pub use schema::{EntryKind, Location, Schema, SchemaEntry, Topology};
pub use state::{FrozenState, Origin, Slot, SolvingState};
pub use value::{Literal, Value};
