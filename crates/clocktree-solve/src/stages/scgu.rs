use clocktree_core::{key, Frequency, Result, SolveError, SolvingState, Subsystem};

use crate::search::{goal, int, settle, source_frequency};

/// Choose the system clock source and the CPU, core bus and peripheral bus
/// dividers.
pub fn solve_scgu(state: &mut SolvingState<'_>) -> Result<()> {
    let topology = state.schema().topology();

    let cpu = required(state, key::CPU_CK)?;
    let bus = if topology.core_bus_divider {
        Some(required(state, key::AXI_AHB_CK)?)
    } else {
        None
    };
    let mut apbs = Vec::with_capacity(topology.apbs.len());
    for &unit in &topology.apbs {
        apbs.push((unit, required(state, &key::apb_ck(unit))?));
    }

    for source in state.domain(key::SCGU_KERNEL_SOURCE)? {
        let Some(frequency) = source_frequency(state, &source)? else {
            continue;
        };
        let found = state.speculate(|s| {
            let Some(cpu_divider) = frequency.exact_quotient(cpu) else {
                return Ok(false);
            };
            if !s.try_commit(key::CPU_DIVIDER, int(cpu_divider))? {
                return Ok(false);
            }
            let core_bus = match bus {
                Some(bus) => {
                    let Some(bus_divider) = cpu.exact_quotient(bus) else {
                        return Ok(false);
                    };
                    if !s.try_commit(key::AXI_AHB_DIVIDER, int(bus_divider))? {
                        return Ok(false);
                    }
                    bus
                }
                None => {
                    if !settle(s, key::AXI_AHB_CK, cpu)? {
                        return Ok(false);
                    }
                    cpu
                }
            };
            for &(unit, apb) in &apbs {
                let Some(divider) = core_bus.exact_quotient(apb) else {
                    return Ok(false);
                };
                if !s.try_commit(&key::apb_divider(unit), int(divider))? {
                    return Ok(false);
                }
            }
            s.commit(key::SCGU_KERNEL_SOURCE, source.clone())?;
            Ok(true)
        })?;
        if found {
            log::debug!("{}: system clock from {source}", state.target());
            return Ok(());
        }
    }
    Err(state.exhausted(Subsystem::Scgu))
}

fn required(state: &SolvingState<'_>, key: &str) -> Result<Frequency> {
    goal(state, key)?.ok_or_else(|| SolveError::MissingGoal {
        key: key.to_string(),
        subsystem: Subsystem::Scgu,
    })
}
