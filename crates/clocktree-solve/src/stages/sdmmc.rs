use clocktree_core::{key, Frequency, Literal, Result, SolvingState, Subsystem};

use crate::search::{goal, int, settle, source_frequency, whole, Best};
use crate::target::TargetSpec;

/// Card clock for a kernel clock and `CLKDIV`; 0 bypasses the divider.
fn card_clock(kernel: Frequency, clkdiv: u64) -> Option<Frequency> {
    match clkdiv {
        0 => Some(kernel),
        n => kernel.div_int(2 * n),
    }
}

/// Choose source and clock divider for every SDMMC with a rate goal.
pub fn solve_sdmmcs(state: &mut SolvingState<'_>, target: &TargetSpec) -> Result<()> {
    let topology = state.schema().topology();
    let kernel_limit = topology.sdmmc_kernel_max_hz.map(Frequency::from_hz);
    for &unit in &topology.sdmmcs {
        let Some(rate) = goal(state, &key::sdmmc_rate(unit))? else {
            continue;
        };
        let source_key = key::kernel_source(&key::sdmmc_instance(unit));
        let clkdiv_key = key::sdmmc_clkdiv(unit);

        // A selector shared with an earlier unit is already fixed.
        let sources: Vec<Literal> = match state.committed(&source_key)? {
            Some(fixed) => vec![fixed.clone()],
            None => state.domain(&source_key)?.collect(),
        };

        let mut best: Best<(Literal, u64)> = Best::new();
        for source in sources {
            let Some(kernel) = source_frequency(state, &source)? else {
                continue;
            };
            if kernel_limit.is_some_and(|limit| kernel > limit) {
                continue;
            }
            for clkdiv in state.domain(&clkdiv_key)?.filter_map(|d| whole(&d)) {
                if let Some(sdclk) = card_clock(kernel, clkdiv) {
                    best.offer(rate.relative_error(sdclk.as_f64()), (source.clone(), clkdiv));
                }
                if best.is_exact() {
                    break;
                }
            }
        }

        let (error, (source, clkdiv)) =
            best.within(target.tolerances.sdmmc, Subsystem::Sdmmc(unit), state)?;
        log::debug!(
            "{}: SDMMC{unit} from {source}, CLKDIV {clkdiv} (error {:.4}%)",
            state.target(),
            error * 100.0
        );
        if !settle(state, &source_key, source)? {
            return Err(state.exhausted(Subsystem::Sdmmc(unit)));
        }
        state.commit(&clkdiv_key, int(clkdiv))?;
    }
    Ok(())
}
