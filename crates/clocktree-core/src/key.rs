//! Key names and nearest-match suggestions.
//!
//! Keys are plain strings shared by the chip tables, the solver stages and the
//! emitter. Names with a unit or instance component are built by the helper
//! functions here so that all three agree on the spelling.

/// Globally unique name of one configurable quantity.
pub type Key = String;

pub const CPU_CK: &str = "CPU_CK";
pub const AXI_AHB_CK: &str = "AXI_AHB_CK";
pub const NO_CK: &str = "NO_CK";
pub const PER_CK: &str = "PER_CK";
pub const PERIPHERAL_CLOCK_OPTION: &str = "PERIPHERAL_CLOCK_OPTION";

pub const PLL_KERNEL_SOURCE: &str = "PLL_KERNEL_SOURCE";

pub const SCGU_KERNEL_SOURCE: &str = "SCGU_KERNEL_SOURCE";
pub const EFFECTIVE_SCGU_KERNEL_SOURCE: &str = "EFFECTIVE_SCGU_KERNEL_SOURCE";
pub const CPU_DIVIDER: &str = "CPU_DIVIDER";
pub const AXI_AHB_DIVIDER: &str = "AXI_AHB_DIVIDER";

pub const SYSTICK_CK: &str = "SYSTICK_CK";
pub const SYSTICK_KERNEL_CK: &str = "SYSTICK_KERNEL_CK";
pub const SYSTICK_RELOAD: &str = "SYSTICK_RELOAD";
pub const SYSTICK_COUNTER: &str = "SYSTICK_COUNTER";
pub const SYSTICK_USE_CPU_CK: &str = "SYSTICK_USE_CPU_CK";
pub const SYSTICK_INTERRUPT_ENABLE: &str = "SYSTICK_INTERRUPT_ENABLE";
pub const SYSTICK_ENABLE: &str = "SYSTICK_ENABLE";

pub const GLOBAL_TIMER_PRESCALER: &str = "GLOBAL_TIMER_PRESCALER";

pub fn apb_ck(unit: u8) -> Key {
    format!("APB{unit}_CK")
}

pub fn apb_divider(unit: u8) -> Key {
    format!("APB{unit}_DIVIDER")
}

pub fn pll_enable(unit: u8) -> Key {
    format!("PLL{unit}_ENABLE")
}

pub fn pll_ready(unit: u8) -> Key {
    format!("PLL{unit}_READY")
}

pub fn pll_kernel_source(unit: u8) -> Key {
    format!("PLL{unit}_KERNEL_SOURCE")
}

pub fn pll_predivider(unit: u8) -> Key {
    format!("PLL{unit}_PREDIVIDER")
}

pub fn pll_input_range(unit: u8) -> Key {
    format!("PLL{unit}_INPUT_RANGE")
}

pub fn pll_multiplier(unit: u8) -> Key {
    format!("PLL{unit}_MULTIPLIER")
}

pub fn pll_vco(unit: u8) -> Key {
    format!("PLL{unit}_VCO_FREQ")
}

pub fn pll_channel_ck(unit: u8, channel: &str) -> Key {
    format!("PLL{unit}{channel}_CK")
}

pub fn pll_channel_divider(unit: u8, channel: &str) -> Key {
    format!("PLL{unit}{channel}_DIVIDER")
}

pub fn pll_channel_enable(unit: u8, channel: &str) -> Key {
    format!("PLL{unit}{channel}_ENABLE")
}

pub fn uxart_selector(group: &str) -> Key {
    format!("UXART_{group}_KERNEL_SOURCE")
}

pub fn kernel_source(instance: &str) -> Key {
    format!("{instance}_KERNEL_SOURCE")
}

pub fn baud(instance: &str) -> Key {
    format!("{instance}_BAUD")
}

pub fn baud_divider(instance: &str) -> Key {
    format!("{instance}_BAUD_DIVIDER")
}

pub fn i2c_instance(unit: u8) -> String {
    format!("I2C{unit}")
}

pub fn i2c_presc(unit: u8) -> Key {
    format!("I2C{unit}_PRESC")
}

pub fn i2c_sclh(unit: u8) -> Key {
    format!("I2C{unit}_SCLH")
}

pub fn i2c_scll(unit: u8) -> Key {
    format!("I2C{unit}_SCLL")
}

pub fn timer_counter_rate(unit: u8) -> Key {
    format!("TIM{unit}_COUNTER_RATE")
}

pub fn timer_update_rate(unit: u8) -> Key {
    format!("TIM{unit}_UPDATE_RATE")
}

pub fn timer_kernel_ck(unit: u8) -> Key {
    format!("TIM{unit}_KERNEL_CK")
}

pub fn timer_divider(unit: u8) -> Key {
    format!("TIM{unit}_DIVIDER")
}

pub fn timer_modulation(unit: u8) -> Key {
    format!("TIM{unit}_MODULATION")
}

pub fn spi_instance(unit: u8) -> String {
    format!("SPI{unit}")
}

pub fn sdmmc_instance(unit: u8) -> String {
    format!("SDMMC{unit}")
}

pub fn sdmmc_rate(unit: u8) -> Key {
    format!("SDMMC{unit}_RATE")
}

pub fn sdmmc_clkdiv(unit: u8) -> Key {
    format!("SDMMC{unit}_CLKDIV")
}

pub fn gpio_port_enable(port: char) -> Key {
    format!("GPIO{port}_ENABLE")
}

/// Per-pin GPIO setting, e.g. `gpio_pin('A', 5, "MODE")` is `GPIOA5_MODE`.
pub fn gpio_pin(port: char, number: u8, setting: &str) -> Key {
    format!("GPIO{port}{number}_{setting}")
}

pub fn interrupt_priority(name: &str) -> Key {
    format!("INTERRUPT_{name}_PRIORITY")
}

/// Levenshtein edit distance between two keys.
pub fn edit_distance(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut row: Vec<usize> = (0..=b.len()).collect();
    for (i, ca) in a.chars().enumerate() {
        let mut diagonal = row[0];
        row[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let above = row[j + 1];
            let cost = usize::from(ca != *cb);
            row[j + 1] = (above + 1).min(row[j] + 1).min(diagonal + cost);
            diagonal = above;
        }
    }
    row[b.len()]
}

/// The `limit` candidates closest to `given`, nearest first.
///
/// Candidates sharing nothing with `given` are not suggested. Ties keep
/// candidate order, so sorted input gives deterministic output.
pub fn suggest<'a>(
    given: &str,
    candidates: impl IntoIterator<Item = &'a str>,
    limit: usize,
) -> Vec<String> {
    let mut scored: Vec<(usize, &str)> = candidates
        .into_iter()
        .map(|candidate| (edit_distance(given, candidate), candidate))
        .filter(|(distance, candidate)| {
            *distance < given.chars().count().max(candidate.chars().count())
        })
        .collect();
    scored.sort_by_key(|(distance, _)| *distance);
    scored
        .into_iter()
        .take(limit)
        .map(|(_, candidate)| candidate.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edit_distance_basics() {
        assert_eq!(edit_distance("", "abc"), 3);
        assert_eq!(edit_distance("PLL1_ENABLE", "PLL1_ENABLE"), 0);
        assert_eq!(edit_distance("PLL1_ENABLE", "PLL2_ENABLE"), 1);
        assert_eq!(edit_distance("kitten", "sitting"), 3);
    }

    #[test]
    fn suggestions_are_nearest_first() {
        let keys = ["CPU_CK", "CPU_DIVIDER", "PLL1_ENABLE", "PLL1_READY", "PLL2_ENABLE"];
        let found = suggest("PLL1_ENABEL", keys, 3);
        assert_eq!(found[0], "PLL1_ENABLE");
        assert!(found.contains(&"PLL2_ENABLE".to_string()));
        assert!(!found.contains(&"CPU_CK".to_string()));
    }

    #[test]
    fn unrelated_names_get_no_suggestions() {
        assert!(suggest("XYZ", ["PLL1_ENABLE", "CPU_DIVIDER"], 3).is_empty());
    }

    #[test]
    fn key_builders() {
        assert_eq!(pll_channel_divider(1, "P"), "PLL1P_DIVIDER");
        assert_eq!(gpio_pin('A', 5, "MODE"), "GPIOA5_MODE");
        assert_eq!(uxart_selector("USART2"), "UXART_USART2_KERNEL_SOURCE");
        assert_eq!(interrupt_priority("TIM2"), "INTERRUPT_TIM2_PRIORITY");
    }
}
