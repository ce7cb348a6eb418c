//! Clock-tree solver.
//!
//! Takes a chip schema and a target specification and fills the solving state
//! stage by stage: target validation, boot profile, oscillators, PLLs, system
//! clock, SysTick, UART groups, then the tolerance-based peripherals (I2C,
//! timers, SPI, SDMMC). The frozen result is handed to the emitter.

pub mod config;
pub mod error;
pub mod gpio;
pub mod search;
pub mod solver;
pub mod stages;
pub mod target;

#[cfg(test)]
mod scenarios;

pub use config::Tolerances;
pub use error::TargetError;
pub use gpio::{Declarations, PinId, ResolvedGpio, ResolvedInterrupt};
pub use solver::{solve, solve_each, Solution, SolveReport};
pub use target::{
    discover_targets, load_target_toml, parse_target_toml, target_to_toml, GpioDecl, GpioMode,
    Goal, InterruptDecl, Pull, Speed, TargetSpec,
};
