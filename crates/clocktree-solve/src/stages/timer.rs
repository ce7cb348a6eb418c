//! General purpose timer search.
//!
//! A timer can ask for a counter rate, an update rate, or both. With both, a
//! candidate's error is the larger of the two.

use clocktree_core::schema::TimerUnit;
use clocktree_core::{key, Frequency, Literal, Result, SolveError, SolvingState, Subsystem};

use crate::search::{goal, int, rounded_ratio, settle, whole, Best};
use crate::target::TargetSpec;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerSetting {
    pub divider: u64,
    /// Auto-reload count; only chosen when an update rate is requested.
    pub modulation: Option<u64>,
}

/// Minimum-error divider and modulation for one timer kernel clock.
///
/// The search stops at the first exact candidate.
pub fn best_setting(
    kernel: Frequency,
    dividers: impl IntoIterator<Item = u64>,
    counter: Option<Frequency>,
    update: Option<Frequency>,
    modulation_fits: impl Fn(u64) -> bool,
) -> Best<TimerSetting> {
    let mut best = Best::new();
    for divider in dividers {
        let Some(counter_clock) = kernel.div_int(divider) else {
            continue;
        };
        let counter_error = counter.map_or(0.0, |c| c.relative_error(counter_clock.as_f64()));
        let (update_error, modulation) = match update {
            Some(update) => {
                let Some(arr) = rounded_ratio(counter_clock, update) else {
                    continue;
                };
                if arr == 0 || !modulation_fits(arr) {
                    continue;
                }
                let actual = counter_clock.as_f64() / arr as f64;
                (update.relative_error(actual), Some(arr))
            }
            None => (0.0, None),
        };
        best.offer(
            counter_error.max(update_error),
            TimerSetting {
                divider,
                modulation,
            },
        );
        if best.is_exact() {
            break;
        }
    }
    best
}

struct Wanted<'s> {
    unit: &'s TimerUnit,
    counter: Option<Frequency>,
    update: Option<Frequency>,
}

/// Worst error over the wanted timers, or why a prescaler value fails.
type Attempt = std::result::Result<f64, SolveError>;

/// Commit `prescaler` and every wanted timer's divider and modulation.
fn configure(
    s: &mut SolvingState<'_>,
    prescaler: &Literal,
    factor: u64,
    wanted: &[Wanted<'_>],
    hclk: Frequency,
    tolerance: f64,
) -> Result<Attempt> {
    s.commit(key::GLOBAL_TIMER_PRESCALER, prescaler.clone())?;
    let mut worst: f64 = 0.0;
    for timer in wanted {
        let id = timer.unit.id;
        let Some(kernel) = goal(s, &key::apb_ck(timer.unit.apb))?
            .and_then(|pclk| pclk.mul_int(factor))
            .map(|scaled| scaled.min(hclk))
        else {
            return Ok(Err(s.exhausted(Subsystem::Timer(id))));
        };
        let modulation = s.constraint(&key::timer_modulation(id))?;
        let dividers = s.domain(&key::timer_divider(id))?.filter_map(|d| whole(&d));
        let best = best_setting(kernel, dividers, timer.counter, timer.update, |arr| {
            modulation.map_or(true, |c| c.contains(&int(arr)))
        });
        let (error, setting) = match best.within(tolerance, Subsystem::Timer(id), s) {
            Ok(found) => found,
            Err(error) => return Ok(Err(error)),
        };
        if !settle(s, &key::timer_kernel_ck(id), kernel)? {
            return Ok(Err(s.exhausted(Subsystem::Timer(id))));
        }
        s.commit(&key::timer_divider(id), int(setting.divider))?;
        if let Some(arr) = setting.modulation {
            s.commit(&key::timer_modulation(id), int(arr))?;
        }
        worst = worst.max(error);
    }
    Ok(Ok(worst))
}

/// Choose the chip-wide timer prescaler and every used timer's divider and
/// modulation.
///
/// Each prescaler value is scored by the worst error among the used timers.
/// The lowest score wins; ties go to the earlier value.
pub fn solve_timers(state: &mut SolvingState<'_>, target: &TargetSpec) -> Result<()> {
    let topology = state.schema().topology();
    let mut wanted = Vec::new();
    for unit in &topology.timers {
        let counter = goal(state, &key::timer_counter_rate(unit.id))?;
        let update = goal(state, &key::timer_update_rate(unit.id))?;
        if counter.is_some() || update.is_some() {
            wanted.push(Wanted {
                unit,
                counter,
                update,
            });
        }
    }
    if wanted.is_empty() {
        return Ok(());
    }
    let Some(hclk) = goal(state, key::AXI_AHB_CK)? else {
        return Err(state.exhausted(Subsystem::Timers));
    };

    let tolerance = target.tolerances.timer;
    let mut failure: Option<SolveError> = None;
    let mut best = Best::new();
    for prescaler in state.domain(key::GLOBAL_TIMER_PRESCALER)? {
        let Some(factor) = prescaler.as_bool().and_then(|p| topology.timer_factor(p)) else {
            continue;
        };
        let mut attempt = None;
        state.speculate(|s| {
            attempt = Some(configure(s, &prescaler, factor, &wanted, hclk, tolerance)?);
            Ok(false)
        })?;
        match attempt {
            Some(Ok(worst)) => best.offer(worst, (prescaler, factor)),
            Some(Err(error)) => failure = Some(error),
            None => {}
        }
        if best.is_exact() {
            break;
        }
    }

    let Some((worst, (prescaler, factor))) = best.into_inner() else {
        return Err(failure.unwrap_or_else(|| state.exhausted(Subsystem::Timers)));
    };
    let mut attempt = None;
    state.speculate(|s| {
        let outcome = configure(s, &prescaler, factor, &wanted, hclk, tolerance)?;
        let merged = outcome.is_ok();
        attempt = Some(outcome);
        Ok(merged)
    })?;
    match attempt {
        Some(Ok(_)) => {
            log::debug!(
                "{}: timer prescaler {prescaler}, kernel factor {factor}, worst error {worst:e}",
                state.target()
            );
            Ok(())
        }
        Some(Err(error)) => Err(error),
        None => Err(state.exhausted(Subsystem::Timers)),
    }
}
