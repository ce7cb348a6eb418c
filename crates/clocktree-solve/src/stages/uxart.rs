use clocktree_core::{key, Frequency, Result, SolvingState, Subsystem};

use crate::search::{goal, int, source_frequency};

/// Pick one kernel source per UART group so that every member with a baud
/// goal gets an exact divider.
pub fn solve_uxarts(state: &mut SolvingState<'_>) -> Result<()> {
    let groups = &state.schema().topology().uxart_groups;
    for group in groups {
        let mut used: Vec<(&str, Frequency)> = Vec::new();
        for member in &group.members {
            if let Some(baud) = goal(state, &key::baud(member))? {
                used.push((member.as_str(), baud));
            }
        }
        if used.is_empty() {
            continue;
        }

        let selector = group.selector();
        let mut found = false;
        for source in state.domain(&selector)? {
            let Some(kernel) = source_frequency(state, &source)? else {
                continue;
            };
            found = state.speculate(|s| {
                for &(member, baud) in &used {
                    let Some(divider) = kernel.exact_quotient(baud) else {
                        return Ok(false);
                    };
                    if !s.try_commit(&key::baud_divider(member), int(divider))? {
                        return Ok(false);
                    }
                }
                s.commit(&selector, source.clone())?;
                Ok(true)
            })?;
            if found {
                log::debug!("{}: {} kernel {source}", state.target(), group.name);
                break;
            }
        }
        if !found {
            return Err(state.exhausted(Subsystem::Uxart(group.name.clone())));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clocktree_chips::{stm32h533, stm32h7s3};
    use clocktree_core::{Literal, Schema, SolveError};

    fn run<'s>(
        schema: &'s Schema,
        clocks: &[(&str, u64)],
        bauds: &[(&str, u64)],
    ) -> Result<SolvingState<'s>> {
        let mut state = SolvingState::new(schema, "board");
        for &(clock, hz) in clocks {
            state.commit(clock, Literal::hz(hz))?;
        }
        for &(member, baud) in bauds {
            state.pin(&key::baud(member), Literal::hz(baud))?;
        }
        solve_uxarts(&mut state)?;
        Ok(state)
    }

    #[test]
    fn group_shares_one_source() {
        let schema = stm32h7s3::schema().unwrap();
        let state = run(
            &schema,
            &[("APB1_CK", 125_000_000), ("HSI_CK", 64_000_000)],
            &[("USART2", 1_000_000), ("UART4", 500_000)],
        )
        .unwrap();
        assert_eq!(
            state.committed("USART3_KERNEL_SOURCE").unwrap(),
            Some(&Literal::symbol("APB1_CK"))
        );
        assert_eq!(state.committed("USART2_BAUD_DIVIDER").unwrap(), Some(&Literal::Int(125)));
        assert_eq!(state.committed("UART4_BAUD_DIVIDER").unwrap(), Some(&Literal::Int(250)));
    }

    #[test]
    fn inexact_baud_exhausts_group() {
        let schema = stm32h7s3::schema().unwrap();
        let err = run(&schema, &[("APB1_CK", 125_000_000)], &[("USART2", 115_200)]).unwrap_err();
        match err {
            SolveError::SearchExhausted { subsystem, .. } => {
                assert_eq!(subsystem, Subsystem::Uxart("UART234578".into()));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn later_source_when_bus_does_not_divide() {
        let schema = stm32h533::schema().unwrap();
        let state = run(
            &schema,
            &[("APB1_CK", 250_000_000), ("HSI_CK", 32_000_000)],
            &[("USART2", 2_000_000)],
        )
        .unwrap();
        assert_eq!(
            state.committed("USART2_KERNEL_SOURCE").unwrap(),
            Some(&Literal::symbol("APB1_CK"))
        );
        let state = run(
            &schema,
            &[("APB1_CK", 250_000_000), ("HSI_CK", 32_000_000)],
            &[("USART2", 1_000_000)],
        )
        .unwrap();
        assert_eq!(state.committed("USART2_BAUD_DIVIDER").unwrap(), Some(&Literal::Int(250)));
        let state = run(
            &schema,
            &[("APB1_CK", 250_000_000), ("HSI_CK", 32_000_000)],
            &[("USART2", 64_000)],
        )
        .unwrap();
        assert_eq!(
            state.committed("USART2_KERNEL_SOURCE").unwrap(),
            Some(&Literal::symbol("HSI_CK"))
        );
    }
}
