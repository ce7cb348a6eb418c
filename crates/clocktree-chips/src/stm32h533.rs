//! STM32H533RET6: Cortex-M33, per-unit PLL sources, no separate core bus divider.

use clocktree_core::key;
use clocktree_core::schema::{
    AlternateFunction, BootSequence, FixedSetting, PllSourceMode, PllUnit, TimerFactor,
    TimerUnit, UxartGroup,
};
use clocktree_core::{Constraint, Frequency, Literal, Location, Schema, SchemaEntry, Topology};

use crate::builder::{self, SchemaBuilder};
use crate::error::Result;

pub const CHIP: &str = "STM32H533RET6";

const MAX_CLOCK_HZ: u64 = 250_000_000;

const GPIO_PORTS: [char; 9] = ['A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'I'];

const UXARTS: [&str; 6] = ["USART1", "USART2", "USART3", "UART4", "UART5", "USART6"];

/// (unit, bus, counter is 32 bits wide)
const TIMERS: [(u8, u8, bool); 10] = [
    (1, 2, false),
    (2, 1, true),
    (3, 1, false),
    (4, 1, false),
    (5, 1, true),
    (6, 1, false),
    (7, 1, false),
    (8, 2, false),
    (12, 1, false),
    (15, 2, false),
];

const INTERRUPTS: &[&str] = &[
    "Reset", "NonMaskableInt", "HardFault", "MemoryManagement", "BusFault", "UsageFault",
    "SecureFault", "", "", "", "SVCall", "DebugMonitor", "", "PendSV", "SysTick", "WWDG",
    "PVD_AVD", "RTC", "RTC_S", "TAMP", "RAMCFG", "FLASH", "FLASH_S", "GTZC", "RCC",
    "RCC_S", "EXTI0", "EXTI1", "EXTI2", "EXTI3", "EXTI4", "EXTI5", "EXTI6", "EXTI7",
    "EXTI8", "EXTI9", "EXTI10", "EXTI11", "EXTI12", "EXTI13", "EXTI14", "EXTI15",
    "GPDMA1_Channel0", "GPDMA1_Channel1", "GPDMA1_Channel2", "GPDMA1_Channel3",
    "GPDMA1_Channel4", "GPDMA1_Channel5", "GPDMA1_Channel6", "GPDMA1_Channel7", "IWDG",
    "SAES", "ADC1", "DAC1", "FDCAN1_IT0", "FDCAN1_IT1", "TIM1_BRK", "TIM1_UP",
    "TIM1_TRG_COM", "TIM1_CC", "TIM2", "TIM3", "TIM4", "TIM5", "TIM6", "TIM7", "I2C1_EV",
    "I2C1_ER", "I2C2_EV", "I2C2_ER", "SPI1", "SPI2", "SPI3", "USART1", "USART2", "USART3",
    "UART4", "UART5", "LPUART1", "LPTIM1", "TIM8_BRK", "TIM8_UP", "TIM8_TRG_COM",
    "TIM8_CC", "ADC2", "LPTIM2", "TIM15", "", "", "USB_DRD_FS", "CRS", "UCPD1", "FMC",
    "OCTOSPI1", "SDMMC1", "I2C3_EV", "I2C3_ER", "SPI4", "", "", "USART6", "", "", "", "",
    "GPDMA2_Channel0", "GPDMA2_Channel1", "GPDMA2_Channel2", "GPDMA2_Channel3",
    "GPDMA2_Channel4", "GPDMA2_Channel5", "GPDMA2_Channel6", "GPDMA2_Channel7", "", "", "",
    "", "", "FPU", "ICACHE", "DCACHE1", "", "", "DCMI_PSSI", "FDCAN2_IT0", "FDCAN2_IT1",
    "", "", "DTS", "RNG", "OTFDEC1", "AES", "HASH", "PKA", "CEC", "TIM12", "", "",
    "I3C1_EV", "I3C1_ER", "", "", "", "", "", "", "I3C2_EV", "I3C2_ER",
];

const ALTERNATE_FUNCTIONS: &[(&str, &str, u8)] = &[
    ("A0", "TIM2_CH1", 1),
    ("A2", "USART2_TX", 7),
    ("A3", "USART2_RX", 7),
    ("A5", "TIM2_CH1", 1),
    ("A5", "SPI1_SCK", 5),
    ("A6", "SPI1_MISO", 5),
    ("A7", "SPI1_MOSI", 5),
    ("A8", "TIM1_CH1", 1),
    ("A9", "USART1_TX", 7),
    ("A10", "USART1_RX", 7),
    ("A13", "DEBUG_JTMS_SWDIO", 0),
    ("A14", "DEBUG_JTCK_SWCLK", 0),
    ("B6", "I2C1_SCL", 4),
    ("B7", "I2C1_SDA", 4),
    ("B10", "USART3_TX", 7),
    ("B11", "USART3_RX", 7),
    ("C8", "SDMMC1_D0", 12),
    ("C9", "SDMMC1_D1", 12),
    ("C10", "SDMMC1_D2", 12),
    ("C11", "SDMMC1_D3", 12),
    ("C12", "SDMMC1_CK", 12),
    ("D2", "SDMMC1_CMD", 12),
];

/// Build the STM32H533RET6 schema.
pub fn schema() -> Result<Schema> {
    let mut b = SchemaBuilder::new(CHIP, "STM32H5, Cortex-M33 up to 250 MHz");

    // Oscillators. HSE and LSE are not fitted on the reference board.
    let oscillators = vec![
        b.oscillator("HSI", 32_000_000, true, true),
        b.oscillator("HSI48", 48_000_000, false, false),
        b.oscillator("CSI", 4_000_000, false, false),
    ];
    b.clock("HSE_CK", 0).clock("LSE_CK", 0);
    b.entry(key::NO_CK, SchemaEntry::constant(Frequency::ZERO));
    b.clock(key::PER_CK, MAX_CLOCK_HZ);
    b.setting(
        key::PERIPHERAL_CLOCK_OPTION,
        Location::new("RCC", "CCIPR5", "CKPERSEL"),
        Constraint::sources([("HSI_CK", 0), ("CSI_CK", 1), ("HSE_CK", 2), (key::NO_CK, 3)]),
    );

    // Flash and power.
    b.setting(
        "FLASH_LATENCY",
        Location::new("FLASH", "ACR", "LATENCY"),
        Constraint::int_range(0, 15),
    );
    b.setting(
        "FLASH_PROGRAMMING_DELAY",
        Location::new("FLASH", "ACR", "WRHIGHFREQ"),
        Constraint::int_range(0, 3),
    );
    let vos = Constraint::sources([("VOS3", 0), ("VOS2", 1), ("VOS1", 2), ("VOS0", 3)]);
    b.setting("INTERNAL_VOLTAGE_SCALING", Location::new("PWR", "VOSCR", "VOS"), vos);
    b.status("CURRENT_ACTIVE_VOS", Location::new("PWR", "VOSSR", "ACTVOS"));
    b.status("CURRENT_ACTIVE_VOS_READY", Location::new("PWR", "VOSSR", "ACTVOSRDY"));
    b.flag("LDO_ENABLE", Location::new("PWR", "SCCR", "LDOEN"));
    b.flag("POWER_MANAGEMENT_BYPASS", Location::new("PWR", "SCCR", "BYPASS"));
    b.flag("MEMORY_MANAGEMENT_FAULT_ENABLE", Location::new("SCB", "SHCSR", "MEMFAULTENA"));
    b.flag("BUS_FAULT_ENABLE", Location::new("SCB", "SHCSR", "BUSFAULTENA"));
    b.flag("USAGE_FAULT_ENABLE", Location::new("SCB", "SHCSR", "USGFAULTENA"));

    // PLLs.
    let plls: Vec<PllUnit> = (1..=3u8)
        .map(|id| PllUnit {
            id,
            channels: vec!["P".into(), "Q".into(), "R".into()],
        })
        .collect();
    for pll in &plls {
        let u = pll.id;
        let cfgr = format!("PLL{u}CFGR");
        let divr = format!("PLL{u}DIVR");
        b.flag(key::pll_enable(u), Location::new("RCC", "CR", format!("PLL{u}ON")));
        b.status(key::pll_ready(u), Location::new("RCC", "CR", format!("PLL{u}RDY")));
        b.setting(
            key::pll_kernel_source(u),
            Location::new("RCC", cfgr.as_str(), format!("PLL{u}SRC")),
            Constraint::sources([(key::NO_CK, 0), ("HSI_CK", 1), ("CSI_CK", 2), ("HSE_CK", 3)]),
        );
        b.setting(
            key::pll_input_range(u),
            Location::new("RCC", cfgr.as_str(), format!("PLL{u}RGE")),
            builder::input_bands(&[
                (2_000_000, 4_000_000, 0b01),
                (4_000_000, 8_000_000, 0b10),
                (8_000_000, 16_000_000, 0b11),
            ]),
        );
        b.setting(
            key::pll_predivider(u),
            Location::new("RCC", cfgr.as_str(), format!("PLL{u}M")),
            Constraint::int_range(1, 63),
        );
        b.entry(
            key::pll_multiplier(u),
            SchemaEntry::setting(
                Location::new("RCC", divr.as_str(), format!("PLL{u}N")),
                Constraint::int_range(4, 512),
            )
            .offset_by_one(),
        );
        b.entry(key::pll_vco(u), SchemaEntry::frequency().within(128_000_000, 560_000_000));
        for c in &pll.channels {
            b.entry(
                key::pll_channel_ck(u, c),
                SchemaEntry::frequency().within(1_000_000, MAX_CLOCK_HZ),
            );
            b.entry(
                key::pll_channel_divider(u, c),
                SchemaEntry::setting(
                    Location::new("RCC", divr.as_str(), format!("PLL{u}{c}")),
                    Constraint::int_range(1, 128),
                )
                .offset_by_one(),
            );
            b.flag(
                key::pll_channel_enable(u, c),
                Location::new("RCC", cfgr.as_str(), format!("PLL{u}{c}EN")),
            );
        }
    }

    // System clock generation. The AXI/AHB clock is the CPU clock.
    b.setting(
        key::SCGU_KERNEL_SOURCE,
        Location::new("RCC", "CFGR1", "SW"),
        Constraint::sources([("HSI_CK", 0), ("CSI_CK", 1), ("HSE_CK", 2), ("PLL1P_CK", 3)]),
    );
    b.status(
        key::EFFECTIVE_SCGU_KERNEL_SOURCE,
        Location::new("RCC", "CFGR1", "SWS"),
    );
    b.setting(
        key::CPU_DIVIDER,
        Location::new("RCC", "CFGR2", "HPRE"),
        builder::ahb_prescaler(),
    );
    b.clock(key::CPU_CK, MAX_CLOCK_HZ);
    b.clock(key::AXI_AHB_CK, MAX_CLOCK_HZ);
    let apbs = vec![1u8, 2, 3];
    for &u in &apbs {
        b.clock(key::apb_ck(u), MAX_CLOCK_HZ);
        b.setting(
            key::apb_divider(u),
            Location::new("RCC", "CFGR2", format!("PPRE{u}")),
            builder::apb_prescaler(),
        );
    }

    // SysTick.
    b.entry(key::SYSTICK_CK, SchemaEntry::rate());
    b.clock(key::SYSTICK_KERNEL_CK, MAX_CLOCK_HZ);
    b.setting(
        key::SYSTICK_RELOAD,
        Location::new("SysTick", "LOAD", "RELOAD"),
        Constraint::int_range(1, (1 << 24) - 1),
    );
    b.setting(
        key::SYSTICK_COUNTER,
        Location::new("SysTick", "VAL", "CURRENT"),
        Constraint::int_range(0, (1 << 24) - 1),
    );
    b.flag(key::SYSTICK_USE_CPU_CK, Location::new("SysTick", "CTRL", "CLKSOURCE"));
    b.flag(key::SYSTICK_INTERRUPT_ENABLE, Location::new("SysTick", "CTRL", "TICKINT"));
    b.flag(key::SYSTICK_ENABLE, Location::new("SysTick", "CTRL", "ENABLE"));

    // UXARTs, one selector per instance.
    let mut uxart_groups = Vec::new();
    for inst in UXARTS {
        let bus = if inst == "USART1" { "APB2_CK" } else { "APB1_CK" };
        let group = UxartGroup {
            name: inst.to_string(),
            members: vec![inst.to_string()],
        };
        b.entry(
            group.selector(),
            SchemaEntry::setting(
                Location::new("RCC", "CCIPR1", format!("{inst}SEL")),
                Constraint::sources([
                    (bus, 0b000),
                    ("PLL2Q_CK", 0b001),
                    ("PLL3Q_CK", 0b010),
                    ("HSI_CK", 0b011),
                    ("CSI_CK", 0b100),
                    ("LSE_CK", 0b101),
                    (key::NO_CK, 0b110),
                ]),
            )
            .alias(key::kernel_source(inst)),
        );
        b.entry(key::baud(inst), SchemaEntry::rate());
        b.setting(
            key::baud_divider(inst),
            Location::new(inst, "BRR", "BRR"),
            Constraint::int_range(16, 0xFFFF),
        );
        uxart_groups.push(group);
    }

    // I2Cs.
    let i2cs = vec![1u8, 2, 3];
    for &u in &i2cs {
        let inst = key::i2c_instance(u);
        let bus = if u == 3 { "APB3_CK" } else { "APB1_CK" };
        b.entry(key::baud(&inst), SchemaEntry::rate());
        b.setting(
            key::kernel_source(&inst),
            Location::new("RCC", "CCIPR4", format!("{inst}SEL")),
            Constraint::sources([
                (bus, 0b00),
                ("PLL3R_CK", 0b01),
                ("HSI_CK", 0b10),
                ("CSI_CK", 0b11),
            ]),
        );
        b.setting(
            key::i2c_presc(u),
            Location::new(inst.as_str(), "TIMINGR", "PRESC"),
            Constraint::int_range(0, 15),
        );
        b.setting(
            key::i2c_sclh(u),
            Location::new(inst.as_str(), "TIMINGR", "SCLH"),
            Constraint::int_range(0, 255),
        );
        b.setting(
            key::i2c_scll(u),
            Location::new(inst.as_str(), "TIMINGR", "SCLL"),
            Constraint::int_range(0, 255),
        );
    }

    // Timers.
    b.flag(key::GLOBAL_TIMER_PRESCALER, Location::new("RCC", "CFGR1", "TIMPRE"));
    let mut timers = Vec::new();
    for (u, apb, wide) in TIMERS {
        let inst = format!("TIM{u}");
        let max_count: i64 = if wide { 1 << 32 } else { 1 << 16 };
        b.entry(key::timer_counter_rate(u), SchemaEntry::rate());
        b.entry(
            key::timer_update_rate(u),
            SchemaEntry::rate().alias(format!("TIM{u}_RATE")),
        );
        b.clock(key::timer_kernel_ck(u), MAX_CLOCK_HZ);
        b.entry(
            key::timer_divider(u),
            SchemaEntry::setting(
                Location::new(inst.as_str(), "PSC", "PSC"),
                Constraint::int_range(1, 1 << 16),
            )
            .offset_by_one(),
        );
        b.entry(
            key::timer_modulation(u),
            SchemaEntry::setting(
                Location::new(inst.as_str(), "ARR", "ARR"),
                Constraint::int_range(1, max_count),
            )
            .offset_by_one(),
        );
        timers.push(TimerUnit { id: u, apb });
    }

    // SPIs.
    let spis = vec![1u8, 2, 3];
    for &u in &spis {
        let inst = key::spi_instance(u);
        b.entry(key::baud(&inst), SchemaEntry::rate());
        b.setting(
            key::kernel_source(&inst),
            Location::new("RCC", "CCIPR3", format!("{inst}SEL")),
            Constraint::sources([
                ("PLL1Q_CK", 0b000),
                ("PLL2P_CK", 0b001),
                ("PLL3P_CK", 0b010),
                (key::PER_CK, 0b100),
            ]),
        );
        b.setting(
            key::baud_divider(&inst),
            Location::new(inst.as_str(), "CFG1", "MBR"),
            builder::spi_baud_prescaler(),
        );
    }

    // SDMMC.
    b.entry(key::sdmmc_rate(1), SchemaEntry::rate());
    b.setting(
        key::kernel_source("SDMMC1"),
        Location::new("RCC", "CCIPR4", "SDMMC1SEL"),
        Constraint::sources([("PLL1Q_CK", 0), ("PLL2R_CK", 1)]),
    );
    b.setting(
        key::sdmmc_clkdiv(1),
        Location::new("SDMMC1", "CLKCR", "CLKDIV"),
        Constraint::int_range(0, 1023),
    );

    // GPIOs and interrupts.
    b.gpio_ports(&GPIO_PORTS, "AHB2ENR");
    let interrupts = b.interrupts(INTERRUPTS, 4);

    let topology = Topology {
        pll_source: PllSourceMode::PerUnit,
        plls,
        apbs,
        core_bus_divider: false,
        oscillators,
        disabled_clocks: vec!["HSE_CK".into(), "LSE_CK".into()],
        peripheral_clock: true,
        systick_ratios: Vec::new(),
        uxart_groups,
        i2cs,
        timers,
        timer_factors: vec![
            TimerFactor {
                prescaler: false,
                factor: 2,
            },
            TimerFactor {
                prescaler: true,
                factor: 4,
            },
        ],
        spis,
        sdmmcs: vec![1],
        sdmmc_kernel_max_hz: Some(200_000_000),
        gpio_ports: GPIO_PORTS.to_vec(),
        interrupts,
        nvic_priority_bits: 4,
        mandatory_handlers: vec![
            "Default".into(),
            "MemManage".into(),
            "BusFault".into(),
            "UsageFault".into(),
        ],
        alternate_functions: ALTERNATE_FUNCTIONS
            .iter()
            .map(|&(pin, function, code)| AlternateFunction {
                pin: pin.into(),
                function: function.into(),
                code,
            })
            .collect(),
        boot: BootSequence {
            flash: vec!["FLASH_LATENCY".into(), "FLASH_PROGRAMMING_DELAY".into()],
            power_supply: vec!["LDO_ENABLE".into(), "POWER_MANAGEMENT_BYPASS".into()],
            voltage_scaling: "INTERNAL_VOLTAGE_SCALING".into(),
            voltage_active: "CURRENT_ACTIVE_VOS".into(),
            voltage_ready: "CURRENT_ACTIVE_VOS_READY".into(),
            fault_enables: vec![
                "MEMORY_MANAGEMENT_FAULT_ENABLE".into(),
                "BUS_FAULT_ENABLE".into(),
                "USAGE_FAULT_ENABLE".into(),
            ],
            settings: vec![
                fixed("FLASH_LATENCY", Literal::Int(5)),
                fixed("FLASH_PROGRAMMING_DELAY", Literal::Int(0b10)),
                fixed("INTERNAL_VOLTAGE_SCALING", Literal::symbol("VOS0")),
                fixed("LDO_ENABLE", Literal::Bool(true)),
                fixed("POWER_MANAGEMENT_BYPASS", Literal::Bool(false)),
                fixed("MEMORY_MANAGEMENT_FAULT_ENABLE", Literal::Bool(true)),
                fixed("BUS_FAULT_ENABLE", Literal::Bool(true)),
                fixed("USAGE_FAULT_ENABLE", Literal::Bool(true)),
            ],
        },
    };

    b.build(topology)
}

pub(crate) fn fixed(key: &str, value: Literal) -> FixedSetting {
    FixedSetting {
        key: key.into(),
        value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clocktree_core::EntryKind;

    #[test]
    fn builds() {
        let schema = schema().unwrap();
        assert_eq!(schema.chip(), CHIP);
        assert_eq!(schema.topology().plls.len(), 3);
        assert_eq!(schema.topology().interrupts.iter().filter(|i| i.irqn >= 0).count(), 108);
    }

    #[test]
    fn uxart_aliases() {
        let schema = schema().unwrap();
        assert_eq!(
            schema.resolve("USART2_KERNEL_SOURCE").unwrap(),
            "UXART_USART2_KERNEL_SOURCE"
        );
        assert_eq!(schema.resolve("TIM2_RATE").unwrap(), "TIM2_UPDATE_RATE");
    }

    #[test]
    fn dividers_carry_encoding_offset() {
        let schema = schema().unwrap();
        let (_, multiplier) = schema.entry("PLL1_MULTIPLIER").unwrap();
        assert!(multiplier.encoding_offset);
        let (_, predivider) = schema.entry("PLL1_PREDIVIDER").unwrap();
        assert!(!predivider.encoding_offset);
        let (_, ready) = schema.entry("PLL2_READY").unwrap();
        assert_eq!(ready.kind, EntryKind::Status);
    }

    #[test]
    fn wide_timers_have_32_bit_modulation() {
        let schema = schema().unwrap();
        let (_, tim2) = schema.entry("TIM2_MODULATION").unwrap();
        assert_eq!(tim2.constraint, Some(Constraint::int_range(1, 1 << 32)));
        let (_, tim3) = schema.entry("TIM3_MODULATION").unwrap();
        assert_eq!(tim3.constraint, Some(Constraint::int_range(1, 1 << 16)));
    }
}
