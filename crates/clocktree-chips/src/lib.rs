//! Builtin capability schemas for the chips clocktree supports, plus loading
//! of additional schemas from TOML.
//!
//! - **Builder** ([`builder`]): typed helpers the chip tables are written with.
//! - **Chips** ([`stm32h533`], [`stm32h7s3`]): the builtin tables.
//! - **Files** ([`parse`]): `.schema.toml` loading, validation, and discovery.

pub mod builder;
pub mod error;
pub mod parse;
pub mod stm32h533;
pub mod stm32h7s3;

use clocktree_core::Schema;

pub use error::{ChipError, Result};
pub use parse::{discover_schemas, load_schema_toml, validate_schema, ValidationIssue};

type SchemaFn = fn() -> Result<Schema>;

const BUILTIN: [(&str, &str, SchemaFn); 2] = [
    (
        stm32h533::CHIP,
        "STM32H5, Cortex-M33 up to 250 MHz",
        stm32h533::schema,
    ),
    (
        stm32h7s3::CHIP,
        "STM32H7RS, Cortex-M7 up to 600 MHz",
        stm32h7s3::schema,
    ),
];

/// Names and one-line descriptions of the builtin chips.
pub fn builtin_chips() -> Vec<(&'static str, &'static str)> {
    BUILTIN.iter().map(|&(chip, desc, _)| (chip, desc)).collect()
}

/// Build the schema of a builtin chip. Chip names are matched case-insensitively.
pub fn builtin(chip: &str) -> Result<Schema> {
    match BUILTIN.iter().find(|(name, _, _)| name.eq_ignore_ascii_case(chip)) {
        Some((_, _, build)) => build(),
        None => Err(ChipError::UnknownChip {
            chip: chip.to_string(),
            known: BUILTIN.iter().map(|(name, _, _)| name.to_string()).collect(),
        }),
    }
}
