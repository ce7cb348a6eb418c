//! I2C timing search.
//!
//! The SCL period is split evenly between the high and low phases, so one
//! value is written to both `SCLH` and `SCLL`.

use std::ops::RangeInclusive;

use clocktree_core::{key, Constraint, Frequency, Literal, Result, SolvingState, Subsystem};

use crate::search::{goal, int, source_frequency, whole, Best};
use crate::target::TargetSpec;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct I2cTiming {
    pub presc: u64,
    pub scl: u64,
}

/// Relative error of the SCL rate for `presc` and `scl`.
///
/// One SCL period is `2 * (presc + 1) * scl + 1` kernel cycles.
pub fn timing_error(kernel: Frequency, baud: Frequency, presc: u64, scl: u64) -> Option<f64> {
    let cycles = scl.checked_mul(2 * (presc + 1))?.checked_add(1)?;
    let actual = kernel.as_f64() / cycles as f64;
    Some(baud.relative_error(actual))
}

/// The two SCL counts around the exact solution for `presc`, clamped to `scl`.
fn scl_candidates(
    kernel: Frequency,
    baud: Frequency,
    presc: u64,
    scl: &RangeInclusive<u64>,
) -> [u64; 2] {
    let top = kernel.numerator() as u128 * baud.denominator() as u128;
    let bottom = kernel.denominator() as u128 * baud.numerator() as u128;
    let step = 2 * (presc as u128 + 1);
    let below = top.saturating_sub(bottom) / (bottom * step).max(1);
    let below = u64::try_from(below).unwrap_or(u64::MAX);
    let clamp = |n: u64| n.clamp(*scl.start(), *scl.end());
    [clamp(below), clamp(below.saturating_add(1))]
}

/// Minimum-error timing over `prescalers` with SCL counts in `scl`.
pub fn best_timing(
    kernel: Frequency,
    baud: Frequency,
    prescalers: impl IntoIterator<Item = u64>,
    scl: RangeInclusive<u64>,
) -> Best<I2cTiming> {
    let mut best = Best::new();
    if scl.is_empty() {
        return best;
    }
    for presc in prescalers {
        for count in scl_candidates(kernel, baud, presc, &scl) {
            if let Some(error) = timing_error(kernel, baud, presc, count) {
                best.offer(error, I2cTiming { presc, scl: count });
            }
        }
    }
    best
}

/// SCL counts both `SCLH` and `SCLL` accept. A count is at least 1.
fn scl_range(state: &SolvingState<'_>, unit: u8) -> Result<RangeInclusive<u64>> {
    let (mut low, mut high) = (1u64, u64::MAX);
    for field in [key::i2c_sclh(unit), key::i2c_scll(unit)] {
        if let Some(Constraint::IntRange { min, max }) = state.constraint(&field)? {
            low = low.max(u64::try_from(*min).unwrap_or(0));
            high = high.min(u64::try_from(*max).unwrap_or(0));
        }
    }
    Ok(low..=high)
}

/// Choose source, prescaler and SCL count for every I2C with a baud goal.
pub fn solve_i2cs(state: &mut SolvingState<'_>, target: &TargetSpec) -> Result<()> {
    let units = &state.schema().topology().i2cs;
    for &unit in units {
        let instance = key::i2c_instance(unit);
        let Some(baud) = goal(state, &key::baud(&instance))? else {
            continue;
        };
        let source_key = key::kernel_source(&instance);
        let scl = scl_range(state, unit)?;

        let mut best: Best<(Literal, I2cTiming)> = Best::new();
        for source in state.domain(&source_key)? {
            let Some(kernel) = source_frequency(state, &source)? else {
                continue;
            };
            let prescalers = state.domain(&key::i2c_presc(unit))?.filter_map(|p| whole(&p));
            let found = best_timing(kernel, baud, prescalers, scl.clone()).into_inner();
            if let Some((error, timing)) = found {
                best.offer(error, (source, timing));
            }
        }

        let (error, (source, timing)) =
            best.within(target.tolerances.i2c, Subsystem::I2c(unit), state)?;
        log::debug!(
            "{}: {instance} from {source}, PRESC {} SCL {} (error {:.4}%)",
            state.target(),
            timing.presc,
            timing.scl,
            error * 100.0
        );
        state.commit(&source_key, source)?;
        state.commit(&key::i2c_presc(unit), int(timing.presc))?;
        state.commit(&key::i2c_sclh(unit), int(timing.scl))?;
        state.commit(&key::i2c_scll(unit), int(timing.scl))?;
    }
    Ok(())
}
