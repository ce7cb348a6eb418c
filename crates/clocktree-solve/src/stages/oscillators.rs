use clocktree_core::{key, Frequency, Literal, Result, SolveError, SolvingState};

use crate::search::source_frequency;
use crate::target::TargetSpec;

/// Decide which oscillators run and fix the frequency of every root clock.
pub fn configure_oscillators(state: &mut SolvingState<'_>, target: &TargetSpec) -> Result<()> {
    let topology = state.schema().topology();

    for name in target.oscillators.keys() {
        if !topology.oscillators.iter().any(|osc| &osc.name == name) {
            return Err(SolveError::UnknownKey {
                key: name.clone(),
                chip: state.schema().chip().to_string(),
                suggestions: key::suggest(
                    name,
                    topology.oscillators.iter().map(|osc| osc.name.as_str()),
                    3,
                ),
            });
        }
    }

    for osc in &topology.oscillators {
        let enabled = target
            .oscillators
            .get(&osc.name)
            .copied()
            .unwrap_or(osc.enabled_by_default);
        if !enabled && osc.running_at_reset {
            return Err(SolveError::ConstraintViolation {
                key: osc.enable.clone(),
                value: "false".into(),
                reason: format!("{} runs from reset and cannot be disabled", osc.name),
            });
        }
        state.pin(&osc.enable, enabled)?;
        let hz = if enabled { osc.frequency_hz } else { 0 };
        state.commit(&osc.clock, Literal::hz(hz))?;
    }

    for clock in &topology.disabled_clocks {
        state.commit(clock, Frequency::ZERO)?;
    }

    match (&target.peripheral_clock, topology.peripheral_clock) {
        (Some(source), true) => {
            let option = Literal::symbol(source.as_str());
            state.pin(key::PERIPHERAL_CLOCK_OPTION, option.clone())?;
            let frequency = source_frequency(state, &option)?.unwrap_or(Frequency::ZERO);
            state.commit(key::PER_CK, frequency)?;
        }
        (None, true) => {
            state.pin_unused(key::PERIPHERAL_CLOCK_OPTION)?;
            state.mark_unused(key::PER_CK)?;
        }
        (Some(source), false) => {
            return Err(SolveError::InvalidDeclaration {
                name: source.clone(),
                detail: format!("{} has no peripheral clock option", state.schema().chip()),
            })
        }
        (None, false) => {}
    }

    Ok(())
}
