use clocktree_core::{Result, SolvingState};

/// Pin the chip's fixed flash, power and fault settings.
pub fn apply_boot_profile(state: &mut SolvingState<'_>) -> Result<()> {
    let boot = &state.schema().topology().boot;
    for setting in &boot.settings {
        state.pin(&setting.key, setting.value.clone())?;
    }
    log::debug!(
        "{}: boot profile applied ({} settings)",
        state.target(),
        boot.settings.len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clocktree_chips::stm32h7s3;
    use clocktree_core::Literal;

    #[test]
    fn pins_fixed_settings() {
        let schema = stm32h7s3::schema().unwrap();
        let mut state = SolvingState::new(&schema, "board");
        apply_boot_profile(&mut state).unwrap();
        assert_eq!(
            state.committed("FLASH_LATENCY").unwrap(),
            Some(&Literal::Int(7))
        );
        assert_eq!(
            state.committed("INTERNAL_VOLTAGE_SCALING").unwrap(),
            Some(&Literal::symbol("HIGH"))
        );
    }
}
