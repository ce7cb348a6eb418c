//! Solver stages, in the order [`solve`](crate::solve) runs them.
//!
//! Each stage reads what earlier stages committed and commits its own keys.
//! Exact stages (PLLs, SCGU, SysTick, UXARTs) accept the first candidate whose
//! dividers are all whole numbers in range; approximate stages (I2C, timers,
//! SPI, SDMMC) keep the candidate with the smallest relative error and accept
//! it when it is within the target's tolerance.

mod boot;
pub mod i2c;
mod oscillators;
mod pll;
mod scgu;
mod sdmmc;
mod spi;
mod systick;
pub mod timer;
mod uxart;
mod validate;

pub use boot::apply_boot_profile;
pub use i2c::solve_i2cs;
pub use oscillators::configure_oscillators;
pub use pll::solve_plls;
pub use scgu::solve_scgu;
pub use sdmmc::solve_sdmmcs;
pub use spi::solve_spis;
pub use systick::solve_systick;
pub use timer::solve_timers;
pub use uxart::solve_uxarts;
pub use validate::validate_target;
