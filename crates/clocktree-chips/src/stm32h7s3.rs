//! STM32H7S3L8H6: Cortex-M7, one kernel source shared by all PLLs, separate
//! AXI/AHB divider, and a single kernel clock selector for six UARTs.

use clocktree_core::key;
use clocktree_core::schema::{
    AlternateFunction, BootSequence, PllSourceMode, PllUnit, UxartGroup,
};
use clocktree_core::{Constraint, Frequency, Literal, Location, Schema, SchemaEntry, Topology};

use crate::builder::{self, SchemaBuilder};
use crate::error::Result;
use crate::stm32h533::fixed;

pub const CHIP: &str = "STM32H7S3L8H6";

const GPIO_PORTS: [char; 9] = ['A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'I'];

const PLL_CHANNELS: [(u8, &[&str]); 3] = [
    (1, &["P", "Q", "S"]),
    (2, &["P", "Q", "R", "S", "T"]),
    (3, &["P", "Q", "R", "S"]),
];

const UART_GROUP: &str = "UART234578";
const UART_MEMBERS: [&str; 6] = ["USART2", "USART3", "UART4", "UART5", "UART7", "UART8"];

const INTERRUPTS: &[&str] = &[
    "Reset", "NonMaskableInt", "HardFault", "MemoryManagement", "BusFault", "UsageFault",
    "", "", "", "", "SVCall", "DebugMonitor", "", "PendSV", "SysTick", "PVD_PVM", "",
    "DTS", "IWDG", "WWDG", "RCC", "", "", "FLASH", "RAMECC", "FPU", "", "", "TAMP", "", "",
    "EXTI0", "EXTI1", "EXTI2", "EXTI3", "EXTI4", "EXTI5", "EXTI6", "EXTI7", "EXTI8",
    "EXTI9", "EXTI10", "EXTI11", "EXTI12", "EXTI13", "EXTI14", "EXTI15", "RTC", "SAES",
    "CRYP", "PKA", "HASH", "RNG", "ADC1_2", "GPDMA1_Channel0", "GPDMA1_Channel1",
    "GPDMA1_Channel2", "GPDMA1_Channel3", "GPDMA1_Channel4", "GPDMA1_Channel5",
    "GPDMA1_Channel6", "GPDMA1_Channel7", "TIM1_BRK", "TIM1_UP", "TIM1_TRG_COM", "TIM1_CC",
    "TIM2", "TIM3", "TIM4", "TIM5", "TIM6", "TIM7", "TIM9", "SPI1", "SPI2", "SPI3", "SPI4",
    "SPI5", "SPI6", "HPDMA1_Channel0", "HPDMA1_Channel1", "HPDMA1_Channel2",
    "HPDMA1_Channel3", "HPDMA1_Channel4", "HPDMA1_Channel5", "HPDMA1_Channel6",
    "HPDMA1_Channel7", "SAI1_A", "SAI1_B", "SAI2_A", "SAI2_B", "I2C1_EV", "I2C1_ER",
    "I2C2_EV", "I2C2_ER", "I2C3_EV", "I2C3_ER", "USART1", "USART2", "USART3", "UART4",
    "UART5", "UART7", "UART8", "I3C1_EV", "I3C1_ER", "OTG_HS", "ETH", "CORDIC", "GFXTIM",
    "DCMIPP", "", "", "DMA2D", "JPEG", "GFXMMU", "I3C1_WKUP", "MCE1", "MCE2", "MCE3",
    "XSPI1", "XSPI2", "FMC", "SDMMC1", "SDMMC2", "", "", "OTG_FS", "TIM12", "TIM13",
    "TIM14", "TIM15", "TIM16", "TIM17", "LPTIM1", "LPTIM2", "LPTIM3", "LPTIM4", "LPTIM5",
    "SPDIF_RX", "MDIOS", "ADF1_FLT0", "CRS", "UCPD1", "CEC", "PSSI", "LPUART1",
    "WAKEUP_PIN", "GPDMA1_Channel8", "GPDMA1_Channel9", "GPDMA1_Channel10",
    "GPDMA1_Channel11", "GPDMA1_Channel12", "GPDMA1_Channel13", "GPDMA1_Channel14",
    "GPDMA1_Channel15", "HPDMA1_Channel8", "HPDMA1_Channel9", "HPDMA1_Channel10",
    "HPDMA1_Channel11", "HPDMA1_Channel12", "HPDMA1_Channel13", "HPDMA1_Channel14",
    "HPDMA1_Channel15", "", "", "", "FDCAN1_IT0", "FDCAN1_IT1", "FDCAN2_IT0", "FDCAN2_IT1",
];

const ALTERNATE_FUNCTIONS: &[(&str, &str, u8)] = &[
    ("A2", "USART2_TX", 7),
    ("A3", "USART2_RX", 7),
    ("D8", "USART3_TX", 7),
    ("D9", "USART3_RX", 7),
    ("A0", "UART4_TX", 8),
    ("A1", "UART4_RX", 8),
    ("C8", "SDMMC1_D0", 12),
    ("C9", "SDMMC1_D1", 12),
    ("C10", "SDMMC1_D2", 12),
    ("C11", "SDMMC1_D3", 12),
    ("C12", "SDMMC1_CK", 12),
    ("D2", "SDMMC1_CMD", 12),
    ("A13", "DEBUG_JTMS_SWDIO", 0),
    ("A14", "DEBUG_JTCK_SWCLK", 0),
];

/// Build the STM32H7S3L8H6 schema.
pub fn schema() -> Result<Schema> {
    let mut b = SchemaBuilder::new(CHIP, "STM32H7RS, Cortex-M7 up to 600 MHz");

    let oscillators = vec![
        b.oscillator("HSI", 64_000_000, true, true),
        b.oscillator("HSI48", 48_000_000, false, false),
        b.oscillator("CSI", 4_000_000, false, false),
    ];
    b.clock("HSE_CK", 0).clock("LSE_CK", 0);
    b.entry(key::NO_CK, SchemaEntry::constant(Frequency::ZERO));
    b.clock(key::PER_CK, 200_000_000);
    b.setting(
        key::PERIPHERAL_CLOCK_OPTION,
        Location::new("RCC", "CCIPR1", "CKPERSEL"),
        Constraint::sources([("HSI_CK", 0), ("CSI_CK", 1), ("HSE_CK", 2), (key::NO_CK, 3)]),
    );

    // Flash and power supply.
    b.setting(
        "FLASH_LATENCY",
        Location::new("FLASH", "ACR", "LATENCY"),
        Constraint::int_range(0, 15),
    );
    b.setting(
        "FLASH_PROGRAMMING_DELAY",
        Location::new("FLASH", "ACR", "WRHIGHFREQ"),
        Constraint::Choices(vec![Literal::Int(0b00), Literal::Int(0b11)]),
    );
    b.setting(
        "INTERNAL_VOLTAGE_SCALING",
        Location::new("PWR", "CSR4", "VOS"),
        Constraint::sources([("LOW", 0), ("HIGH", 1)]),
    );
    b.status("CURRENT_ACTIVE_VOS", Location::new("PWR", "SR1", "ACTVOS"));
    b.status("CURRENT_ACTIVE_VOS_READY", Location::new("PWR", "SR1", "ACTVOSRDY"));
    b.flag("SMPS_ENABLE", Location::new("PWR", "CSR2", "SDEN"));
    b.flag("LDO_ENABLE", Location::new("PWR", "CSR2", "LDOEN"));
    b.flag("POWER_MANAGEMENT_BYPASS", Location::new("PWR", "CSR2", "BYPASS"));
    b.flag("SMPS_OUTPUT_LEVEL", Location::new("PWR", "CSR2", "SDHILEVEL"));
    b.flag("SMPS_FORCED_ON", Location::new("PWR", "CSR2", "SMPSEXTHP"));
    b.flag("MEMORY_MANAGEMENT_FAULT_ENABLE", Location::new("SCB", "SHCSR", "MEMFAULTENA"));
    b.flag("BUS_FAULT_ENABLE", Location::new("SCB", "SHCSR", "BUSFAULTENA"));
    b.flag("USAGE_FAULT_ENABLE", Location::new("SCB", "SHCSR", "USGFAULTENA"));

    // PLLs. The kernel source and the predividers live in PLLCKSELR.
    b.setting(
        key::PLL_KERNEL_SOURCE,
        Location::new("RCC", "PLLCKSELR", "PLLSRC"),
        Constraint::sources([("HSI_CK", 0), ("CSI_CK", 1), ("HSE_CK", 2), (key::NO_CK, 3)]),
    );
    let mut plls = Vec::new();
    for (u, channels) in PLL_CHANNELS {
        b.flag(key::pll_enable(u), Location::new("RCC", "CR", format!("PLL{u}ON")));
        b.status(key::pll_ready(u), Location::new("RCC", "CR", format!("PLL{u}RDY")));
        b.setting(
            key::pll_input_range(u),
            Location::new("RCC", "PLLCFGR", format!("PLL{u}RGE")),
            builder::input_bands(&[
                (2_000_000, 4_000_000, 0b01),
                (4_000_000, 8_000_000, 0b10),
                (8_000_000, 16_000_000, 0b11),
            ]),
        );
        b.setting(
            key::pll_predivider(u),
            Location::new("RCC", "PLLCKSELR", format!("DIVM{u}")),
            Constraint::int_range(1, 63),
        );
        b.entry(
            key::pll_multiplier(u),
            SchemaEntry::setting(
                Location::new("RCC", format!("PLL{u}DIVR1"), "DIVN"),
                Constraint::int_range(12, 420),
            )
            .offset_by_one(),
        );
        b.entry(key::pll_vco(u), SchemaEntry::frequency().within(192_000_000, 836_000_000));
        for &c in channels {
            let register = if matches!(c, "S" | "T") {
                format!("PLL{u}DIVR2")
            } else {
                format!("PLL{u}DIVR1")
            };
            b.entry(
                key::pll_channel_ck(u, c),
                SchemaEntry::frequency().within(1_000_000, 600_000_000),
            );
            b.entry(
                key::pll_channel_divider(u, c),
                SchemaEntry::setting(
                    Location::new("RCC", register, format!("DIV{c}")),
                    Constraint::int_range(1, 128),
                )
                .offset_by_one(),
            );
            b.flag(
                key::pll_channel_enable(u, c),
                Location::new("RCC", "PLLCFGR", format!("PLL{u}{c}EN")),
            );
        }
        plls.push(PllUnit {
            id: u,
            channels: channels.iter().map(|c| c.to_string()).collect(),
        });
    }

    // System clock generation.
    b.setting(
        key::SCGU_KERNEL_SOURCE,
        Location::new("RCC", "CFGR", "SW"),
        Constraint::sources([("HSI_CK", 0), ("CSI_CK", 1), ("HSE_CK", 2), ("PLL1P_CK", 3)]),
    );
    b.status(
        key::EFFECTIVE_SCGU_KERNEL_SOURCE,
        Location::new("RCC", "CFGR", "SWS"),
    );
    b.setting(
        key::CPU_DIVIDER,
        Location::new("RCC", "CDCFGR", "CPRE"),
        builder::ahb_prescaler(),
    );
    b.setting(
        key::AXI_AHB_DIVIDER,
        Location::new("RCC", "BMCFGR", "BMPRE"),
        builder::ahb_prescaler(),
    );
    b.clock(key::CPU_CK, 600_000_000);
    b.clock(key::AXI_AHB_CK, 300_000_000);
    let apbs = vec![1u8, 2, 4, 5];
    for &u in &apbs {
        b.clock(key::apb_ck(u), 150_000_000);
        b.setting(
            key::apb_divider(u),
            Location::new("RCC", "APBCFGR", format!("PPRE{u}")),
            builder::apb_prescaler(),
        );
    }

    // SysTick, clocked from the CPU or the CPU divided by 8.
    b.entry(key::SYSTICK_CK, SchemaEntry::rate());
    b.clock(key::SYSTICK_KERNEL_CK, 600_000_000);
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

    // One selector for USART2/3 and UART4/5/7/8.
    let group = UxartGroup {
        name: UART_GROUP.to_string(),
        members: UART_MEMBERS.iter().map(|m| m.to_string()).collect(),
    };
    let mut selector = SchemaEntry::setting(
        Location::new("RCC", "CCIPR2", format!("{UART_GROUP}SEL")),
        Constraint::sources([
            ("APB1_CK", 0b000),
            ("PLL2Q_CK", 0b001),
            ("PLL3Q_CK", 0b010),
            ("HSI_CK", 0b011),
            ("CSI_CK", 0b100),
            ("LSE_CK", 0b101),
        ]),
    );
    for member in UART_MEMBERS {
        selector = selector.alias(key::kernel_source(member));
        b.entry(key::baud(member), SchemaEntry::rate());
        b.setting(
            key::baud_divider(member),
            Location::new(member, "BRR", "BRR"),
            Constraint::int_range(16, 0xFFFF),
        );
    }
    b.entry(group.selector(), selector);

    // SDMMC1 and SDMMC2 share one selector.
    let sdmmcs = vec![1u8, 2];
    let mut selector = SchemaEntry::setting(
        Location::new("RCC", "CCIPR1", "SDMMC12SEL"),
        Constraint::sources([("PLL2S_CK", 0), ("PLL2T_CK", 1)]),
    );
    for &u in &sdmmcs {
        let inst = key::sdmmc_instance(u);
        selector = selector.alias(key::kernel_source(&inst));
        b.entry(key::sdmmc_rate(u), SchemaEntry::rate());
        b.setting(
            key::sdmmc_clkdiv(u),
            Location::new(inst.as_str(), "CLKCR", "CLKDIV"),
            Constraint::int_range(0, 1023),
        );
    }
    b.entry("SDMMC12_KERNEL_SOURCE", selector);

    b.gpio_ports(&GPIO_PORTS, "AHB4ENR");
    let interrupts = b.interrupts(INTERRUPTS, 4);

    let topology = Topology {
        pll_source: PllSourceMode::Shared,
        plls,
        apbs,
        core_bus_divider: true,
        oscillators,
        disabled_clocks: vec!["HSE_CK".into(), "LSE_CK".into()],
        peripheral_clock: true,
        systick_ratios: vec![8],
        uxart_groups: vec![group],
        i2cs: Vec::new(),
        timers: Vec::new(),
        timer_factors: Vec::new(),
        spis: Vec::new(),
        sdmmcs,
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
            power_supply: vec![
                "SMPS_ENABLE".into(),
                "LDO_ENABLE".into(),
                "POWER_MANAGEMENT_BYPASS".into(),
                "SMPS_OUTPUT_LEVEL".into(),
                "SMPS_FORCED_ON".into(),
            ],
            voltage_scaling: "INTERNAL_VOLTAGE_SCALING".into(),
            voltage_active: "CURRENT_ACTIVE_VOS".into(),
            voltage_ready: "CURRENT_ACTIVE_VOS_READY".into(),
            fault_enables: vec![
                "MEMORY_MANAGEMENT_FAULT_ENABLE".into(),
                "BUS_FAULT_ENABLE".into(),
                "USAGE_FAULT_ENABLE".into(),
            ],
            settings: vec![
                fixed("FLASH_LATENCY", Literal::Int(7)),
                fixed("FLASH_PROGRAMMING_DELAY", Literal::Int(0b11)),
                fixed("INTERNAL_VOLTAGE_SCALING", Literal::symbol("HIGH")),
                fixed("SMPS_ENABLE", Literal::Bool(false)),
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
