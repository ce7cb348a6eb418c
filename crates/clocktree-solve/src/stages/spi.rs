use clocktree_core::{key, Literal, Result, SolvingState, Subsystem};

use crate::search::{goal, source_frequency, whole, Best};
use crate::target::TargetSpec;

/// Choose source and baud rate prescaler for every SPI with a baud goal.
pub fn solve_spis(state: &mut SolvingState<'_>, target: &TargetSpec) -> Result<()> {
    let units = &state.schema().topology().spis;
    for &unit in units {
        let instance = key::spi_instance(unit);
        let Some(baud) = goal(state, &key::baud(&instance))? else {
            continue;
        };
        let source_key = key::kernel_source(&instance);
        let divider_key = key::baud_divider(&instance);

        let mut best: Best<(Literal, Literal)> = Best::new();
        for source in state.domain(&source_key)? {
            let Some(kernel) = source_frequency(state, &source)? else {
                continue;
            };
            for divider in state.domain(&divider_key)? {
                let Some(sck) = whole(&divider).and_then(|d| kernel.div_int(d)) else {
                    continue;
                };
                best.offer(baud.relative_error(sck.as_f64()), (source.clone(), divider));
            }
        }

        let (error, (source, divider)) =
            best.within(target.tolerances.spi, Subsystem::Spi(unit), state)?;
        log::debug!(
            "{}: {instance} from {source} / {divider} (error {:.4}%)",
            state.target(),
            error * 100.0
        );
        state.commit(&source_key, source)?;
        state.commit(&divider_key, divider)?;
    }
    Ok(())
}
