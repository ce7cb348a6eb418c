use clocktree_core::{key, Frequency, Result, SolvingState, Subsystem};

use crate::search::{goal, int};

/// Configure the SysTick reload for the requested tick rate, or switch it off.
pub fn solve_systick(state: &mut SolvingState<'_>) -> Result<()> {
    let schema = state.schema();
    if !schema.contains(key::SYSTICK_ENABLE) {
        return Ok(());
    }
    let Some(tick) = goal(state, key::SYSTICK_CK)? else {
        state.commit(key::SYSTICK_ENABLE, false)?;
        return Ok(());
    };
    let Some(cpu) = goal(state, key::CPU_CK)? else {
        return Err(state.exhausted(Subsystem::SysTick));
    };
    let ratios = &schema.topology().systick_ratios;

    for use_cpu in state.domain(key::SYSTICK_USE_CPU_CK)? {
        let kernels: Vec<Frequency> = if use_cpu.as_bool() == Some(true) {
            vec![cpu]
        } else {
            ratios.iter().filter_map(|&ratio| cpu.div_int(ratio)).collect()
        };
        for kernel in kernels {
            let found = state.speculate(|s| {
                let Some(quotient) = kernel.exact_quotient(tick) else {
                    return Ok(false);
                };
                if !s.try_commit(key::SYSTICK_RELOAD, int(quotient - 1))? {
                    return Ok(false);
                }
                s.commit(key::SYSTICK_USE_CPU_CK, use_cpu.clone())?;
                s.commit(key::SYSTICK_KERNEL_CK, kernel)?;
                s.commit(key::SYSTICK_COUNTER, 0i64)?;
                s.commit(key::SYSTICK_INTERRUPT_ENABLE, true)?;
                s.commit(key::SYSTICK_ENABLE, true)?;
                Ok(true)
            })?;
            if found {
                log::debug!("{}: SysTick kernel {kernel}", state.target());
                return Ok(());
            }
        }
    }
    Err(state.exhausted(Subsystem::SysTick))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clocktree_chips::{stm32h533, stm32h7s3};
    use clocktree_core::{Literal, Schema};

    fn run<'s>(schema: &'s Schema, cpu: u64, tick: Option<u64>) -> Result<SolvingState<'s>> {
        let mut state = SolvingState::new(schema, "board");
        state.pin(key::CPU_CK, Literal::hz(cpu))?;
        if let Some(tick) = tick {
            state.pin(key::SYSTICK_CK, Literal::hz(tick))?;
        }
        solve_systick(&mut state)?;
        Ok(state)
    }

    #[test]
    fn divided_source_comes_first() {
        let schema = stm32h7s3::schema().unwrap();
        let state = run(&schema, 400_000_000, Some(1_000)).unwrap();
        assert_eq!(
            state.committed(key::SYSTICK_USE_CPU_CK).unwrap(),
            Some(&Literal::Bool(false))
        );
        assert_eq!(
            state.committed(key::SYSTICK_RELOAD).unwrap(),
            Some(&Literal::Int(49_999))
        );
    }

    #[test]
    fn falls_back_to_cpu_clock() {
        let schema = stm32h533::schema().unwrap();
        let state = run(&schema, 250_000_000, Some(1_000)).unwrap();
        assert_eq!(
            state.committed(key::SYSTICK_USE_CPU_CK).unwrap(),
            Some(&Literal::Bool(true))
        );
        assert_eq!(
            state.committed(key::SYSTICK_RELOAD).unwrap(),
            Some(&Literal::Int(249_999))
        );
    }

    #[test]
    fn reload_out_of_range() {
        let schema = stm32h533::schema().unwrap();
        assert!(run(&schema, 250_000_000, Some(1)).is_err());
    }

    #[test]
    fn no_goal_disables() {
        let schema = stm32h533::schema().unwrap();
        let state = run(&schema, 250_000_000, None).unwrap();
        assert_eq!(
            state.committed(key::SYSTICK_ENABLE).unwrap(),
            Some(&Literal::Bool(false))
        );
    }
}
