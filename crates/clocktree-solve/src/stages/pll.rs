use clocktree_core::schema::{PllSourceMode, PllUnit};
use clocktree_core::{key, Frequency, Literal, Result, SolvingState, Subsystem};

use crate::search::{goal, int, settle, source_frequency, whole};

/// A unit with the channel goals it has to meet.
struct Request<'s> {
    unit: &'s PllUnit,
    channels: Vec<(&'s str, Frequency)>,
}

/// Pick kernel sources, predividers, multipliers and channel dividers so every
/// requested PLL output is met exactly.
///
/// Units without a single requested channel are switched off.
pub fn solve_plls(state: &mut SolvingState<'_>) -> Result<()> {
    let topology = state.schema().topology();

    let mut requests = Vec::new();
    for unit in &topology.plls {
        let mut channels = Vec::new();
        for channel in &unit.channels {
            if let Some(hz) = goal(state, &key::pll_channel_ck(unit.id, channel))? {
                channels.push((channel.as_str(), hz));
            }
        }
        if channels.is_empty() {
            state.commit(&key::pll_enable(unit.id), false)?;
        } else {
            requests.push(Request { unit, channels });
        }
    }
    if requests.is_empty() {
        return Ok(());
    }

    match topology.pll_source {
        PllSourceMode::Shared => {
            for source in state.domain(key::PLL_KERNEL_SOURCE)? {
                let Some(reference) = source_frequency(state, &source)? else {
                    continue;
                };
                let found = state.speculate(|s| {
                    s.commit(key::PLL_KERNEL_SOURCE, source.clone())?;
                    for request in &requests {
                        if !configure_unit(s, request, reference)? {
                            return Ok(false);
                        }
                    }
                    Ok(true)
                })?;
                if found {
                    log::debug!("{}: PLLs run from {source}", state.target());
                    return Ok(());
                }
            }
            Err(state.exhausted(Subsystem::Plls))
        }
        PllSourceMode::PerUnit => {
            for request in &requests {
                let id = request.unit.id;
                let source_key = key::pll_kernel_source(id);
                let mut found = false;
                for source in state.domain(&source_key)? {
                    let Some(reference) = source_frequency(state, &source)? else {
                        continue;
                    };
                    found = state.speculate(|s| {
                        s.commit(&source_key, source.clone())?;
                        configure_unit(s, request, reference)
                    })?;
                    if found {
                        log::debug!("{}: PLL{id} runs from {source}", state.target());
                        break;
                    }
                }
                if !found {
                    return Err(state.exhausted(Subsystem::Pll(id)));
                }
            }
            Ok(())
        }
    }
}

/// First predivider and multiplier, in ascending order, for which the
/// reference falls in an input band, the VCO is in range and every requested
/// channel divides the VCO exactly.
fn configure_unit(
    state: &mut SolvingState<'_>,
    request: &Request<'_>,
    reference: Frequency,
) -> Result<bool> {
    let id = request.unit.id;
    let vco_key = key::pll_vco(id);

    for predivider in state.domain(&key::pll_predivider(id))? {
        let Some(input) = whole(&predivider).and_then(|m| reference.div_int(m)) else {
            continue;
        };
        let Some(band) = state
            .domain(&key::pll_input_range(id))?
            .find(|band| band.band_contains(input))
        else {
            continue;
        };

        for multiplier in state.domain(&key::pll_multiplier(id))? {
            let Some(vco) = whole(&multiplier).and_then(|n| input.mul_int(n)) else {
                continue;
            };
            if !state.admits(&vco_key, &Literal::Freq(vco))? {
                continue;
            }
            let Some(dividers) = channel_dividers(state, request, vco)? else {
                continue;
            };

            if !settle(state, &vco_key, vco)? {
                continue;
            }
            state.commit(&key::pll_predivider(id), predivider.clone())?;
            state.commit(&key::pll_input_range(id), band)?;
            state.commit(&key::pll_multiplier(id), multiplier.clone())?;
            for channel in &request.unit.channels {
                let divider = dividers
                    .iter()
                    .find(|(c, _)| *c == channel.as_str())
                    .map(|(_, d)| *d);
                match divider {
                    Some(d) => {
                        state.commit(&key::pll_channel_divider(id, channel), int(d))?;
                        state.commit(&key::pll_channel_enable(id, channel), true)?;
                    }
                    None => state.commit(&key::pll_channel_enable(id, channel), false)?,
                }
            }
            state.commit(&key::pll_enable(id), true)?;
            log::debug!(
                "{}: PLL{id} input {input} x{multiplier} -> VCO {vco} ({})",
                state.target(),
                divider_summary(&dividers)
            );
            return Ok(true);
        }
    }
    Ok(false)
}

fn divider_summary(dividers: &[(&str, u64)]) -> String {
    dividers
        .iter()
        .map(|(c, d)| format!("{c}/{d}"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn channel_dividers<'r>(
    state: &SolvingState<'_>,
    request: &Request<'r>,
    vco: Frequency,
) -> Result<Option<Vec<(&'r str, u64)>>> {
    let mut dividers = Vec::with_capacity(request.channels.len());
    for &(channel, target) in &request.channels {
        let Some(divider) = vco.exact_quotient(target) else {
            return Ok(None);
        };
        let divider_key = key::pll_channel_divider(request.unit.id, channel);
        if !state.admits(&divider_key, &int(divider))? {
            return Ok(None);
        }
        dividers.push((channel, divider));
    }
    Ok(Some(dividers))
}
