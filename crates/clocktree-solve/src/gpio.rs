//! GPIO and interrupt normalization.
//!
//! Declarations are checked against the chip and turned into pinned settings
//! before any clock search runs, so a bad pin fails the target early.

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

use clocktree_core::{key, Literal, Result, SolveError, SolvingState};

use crate::target::{GpioMode, TargetSpec};

/// A pin such as `A5`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct PinId {
    pub port: char,
    pub number: u8,
}

impl PinId {
    /// Parse `<port><number>` against the ports a chip has.
    pub fn parse(text: &str, ports: &[char]) -> Option<PinId> {
        let mut chars = text.trim().chars();
        let port = chars.next()?.to_ascii_uppercase();
        let number: u8 = chars.as_str().parse().ok()?;
        (ports.contains(&port) && number < 16).then_some(PinId { port, number })
    }
}

impl fmt::Display for PinId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.port, self.number)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedGpio {
    pub name: String,
    pub pin: Option<PinId>,
    pub mode: GpioMode,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedInterrupt {
    pub name: String,
    pub irqn: i32,
    pub priority: Option<u8>,
}

/// The checked GPIO and interrupt declarations of a target.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Declarations {
    pub gpios: Vec<ResolvedGpio>,
    /// Sorted by IRQ number.
    pub interrupts: Vec<ResolvedInterrupt>,
}

/// Check the target's GPIOs and interrupts and pin their settings.
pub fn normalize(state: &mut SolvingState<'_>, target: &TargetSpec) -> Result<Declarations> {
    let gpios = normalize_gpios(state, target)?;
    let interrupts = normalize_interrupts(state, target)?;
    Ok(Declarations { gpios, interrupts })
}

fn normalize_gpios(state: &mut SolvingState<'_>, target: &TargetSpec) -> Result<Vec<ResolvedGpio>> {
    let schema = state.schema();
    let ports = &schema.topology().gpio_ports;
    let mut names = BTreeSet::new();
    let mut pins = BTreeSet::new();
    let mut enabled_ports = BTreeSet::new();
    let mut resolved = Vec::with_capacity(target.gpios.len());

    for decl in &target.gpios {
        if !names.insert(decl.name.as_str()) {
            return Err(SolveError::DuplicateDeclaration {
                kind: "GPIO",
                name: decl.name.clone(),
            });
        }
        let pin = match &decl.pin {
            None => None,
            Some(text) => {
                let pin = PinId::parse(text, ports).ok_or_else(|| SolveError::InvalidDeclaration {
                    name: decl.name.clone(),
                    detail: format!("`{text}` is not a pin of {}", schema.chip()),
                })?;
                if !pins.insert(pin) {
                    return Err(SolveError::DuplicateDeclaration {
                        kind: "pin",
                        name: pin.to_string(),
                    });
                }
                Some(pin)
            }
        };

        if let (Some(pin), Some(mode)) = (pin, decl.mode.symbol()) {
            if enabled_ports.insert(pin.port) {
                state.pin(&key::gpio_port_enable(pin.port), true)?;
            }
            let setting = |name: &str| key::gpio_pin(pin.port, pin.number, name);
            state.pin(&setting("MODE"), Literal::symbol(mode))?;
            match &decl.mode {
                GpioMode::Input { pull } => {
                    state.pin(&setting("PULL"), Literal::symbol(pull.symbol()))?;
                }
                GpioMode::Output {
                    initial_level,
                    speed,
                    open_drain,
                } => {
                    state.pin(&setting("INITIAL_LEVEL"), *initial_level)?;
                    if let Some(speed) = speed {
                        state.pin(&setting("SPEED"), Literal::symbol(speed.symbol()))?;
                    }
                    if let Some(open_drain) = open_drain {
                        state.pin(&setting("OPEN_DRAIN"), *open_drain)?;
                    }
                }
                GpioMode::Alternate {
                    function,
                    speed,
                    pull,
                    open_drain,
                } => {
                    let code = schema.alternate_function(&pin.to_string(), function)?;
                    state.pin(&setting("ALTERNATE_FUNCTION"), i64::from(code))?;
                    if let Some(speed) = speed {
                        state.pin(&setting("SPEED"), Literal::symbol(speed.symbol()))?;
                    }
                    if let Some(pull) = pull {
                        state.pin(&setting("PULL"), Literal::symbol(pull.symbol()))?;
                    }
                    if let Some(open_drain) = open_drain {
                        state.pin(&setting("OPEN_DRAIN"), *open_drain)?;
                    }
                }
                GpioMode::Analog | GpioMode::Reserved => {}
            }
            log::debug!("{}: GPIO {} on {pin} as {mode}", state.target(), decl.name);
        }

        resolved.push(ResolvedGpio {
            name: decl.name.clone(),
            pin,
            mode: decl.mode.clone(),
        });
    }
    Ok(resolved)
}

fn normalize_interrupts(
    state: &mut SolvingState<'_>,
    target: &TargetSpec,
) -> Result<Vec<ResolvedInterrupt>> {
    let schema = state.schema();
    let topology = schema.topology();
    let max_priority = 1u32
        .checked_shl(u32::from(topology.nvic_priority_bits))
        .map_or(u32::MAX, |levels| levels - 1);
    let mut seen = BTreeSet::new();
    let mut resolved = Vec::with_capacity(target.interrupts.len());

    for decl in &target.interrupts {
        let line = topology.interrupt(&decl.name).ok_or_else(|| SolveError::UnknownKey {
            key: decl.name.clone(),
            chip: schema.chip().to_string(),
            suggestions: key::suggest(
                &decl.name,
                topology.interrupts.iter().map(|line| line.name.as_str()),
                3,
            ),
        })?;
        if !seen.insert(decl.name.as_str()) {
            return Err(SolveError::DuplicateDeclaration {
                kind: "interrupt",
                name: decl.name.clone(),
            });
        }
        if let Some(priority) = decl.priority {
            let priority_key = key::interrupt_priority(&decl.name);
            if !schema.contains(&priority_key) {
                return Err(SolveError::InvalidDeclaration {
                    name: decl.name.clone(),
                    detail: "this exception has a fixed priority".into(),
                });
            }
            if u32::from(priority) > max_priority {
                return Err(SolveError::ConstraintViolation {
                    key: priority_key,
                    value: priority.to_string(),
                    reason: format!(
                        "{} has {} priority bits (0 to {})",
                        schema.chip(),
                        topology.nvic_priority_bits,
                        max_priority
                    ),
                });
            }
            state.pin(&priority_key, i64::from(priority))?;
        }
        resolved.push(ResolvedInterrupt {
            name: decl.name.clone(),
            irqn: line.irqn,
            priority: decl.priority,
        });
    }
    resolved.sort_by_key(|interrupt| interrupt.irqn);
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::{GpioDecl, Pull, Speed};
    use clocktree_chips::parse::{parse_schema_toml, schema_to_toml};
    use clocktree_chips::stm32h533;
    use clocktree_core::Value;

    fn led() -> GpioDecl {
        GpioDecl::new(
            "led",
            Some("A5"),
            GpioMode::Output {
                initial_level: true,
                speed: Some(Speed::High),
                open_drain: None,
            },
        )
    }

    #[test]
    fn pin_parsing() {
        let ports = ['A', 'B'];
        assert_eq!(PinId::parse("a5", &ports), Some(PinId { port: 'A', number: 5 }));
        assert_eq!(PinId::parse("B15", &ports), Some(PinId { port: 'B', number: 15 }));
        assert_eq!(PinId::parse("B16", &ports), None);
        assert_eq!(PinId::parse("C1", &ports), None);
        assert_eq!(PinId::parse("A", &ports), None);
    }

    #[test]
    fn output_settings_are_pinned() {
        let schema = stm32h533::schema().unwrap();
        let mut state = SolvingState::new(&schema, "board");
        let target = TargetSpec::new("board", stm32h533::CHIP).gpio(led());
        let decls = normalize(&mut state, &target).unwrap();
        assert_eq!(decls.gpios[0].pin, Some(PinId { port: 'A', number: 5 }));
        assert_eq!(
            state.committed("GPIOA_ENABLE").unwrap(),
            Some(&Literal::Bool(true))
        );
        assert_eq!(
            state.committed("GPIOA5_MODE").unwrap(),
            Some(&Literal::symbol("OUTPUT"))
        );
        assert_eq!(
            state.committed("GPIOA5_SPEED").unwrap(),
            Some(&Literal::symbol("HIGH"))
        );
        assert_eq!(state.get("GPIOA5_OPEN_DRAIN").unwrap(), &Value::Undetermined);
    }

    #[test]
    fn alternate_function_resolved() {
        let schema = stm32h533::schema().unwrap();
        let mut state = SolvingState::new(&schema, "board");
        let target = TargetSpec::new("board", stm32h533::CHIP).gpio(GpioDecl::new(
            "scl",
            Some("B6"),
            GpioMode::Alternate {
                function: "I2C1_SCL".into(),
                speed: None,
                pull: Some(Pull::Up),
                open_drain: Some(true),
            },
        ));
        normalize(&mut state, &target).unwrap();
        assert_eq!(
            state.committed("GPIOB6_ALTERNATE_FUNCTION").unwrap(),
            Some(&Literal::Int(4))
        );
        assert_eq!(
            state.committed("GPIOB6_OPEN_DRAIN").unwrap(),
            Some(&Literal::Bool(true))
        );
    }

    #[test]
    fn unknown_alternate_function_suggests() {
        let schema = stm32h533::schema().unwrap();
        let mut state = SolvingState::new(&schema, "board");
        let target = TargetSpec::new("board", stm32h533::CHIP).gpio(GpioDecl::new(
            "sck",
            Some("A5"),
            GpioMode::Alternate {
                function: "SPI1_SCLK".into(),
                speed: None,
                pull: None,
                open_drain: None,
            },
        ));
        match normalize(&mut state, &target).unwrap_err() {
            SolveError::UnknownAlternateFunction { pin, suggestions, .. } => {
                assert_eq!(pin, "A5");
                assert_eq!(suggestions[0], "SPI1_SCK");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn duplicate_names_rejected() {
        let schema = stm32h533::schema().unwrap();
        let mut state = SolvingState::new(&schema, "board");
        let mut other = led();
        other.pin = Some("A6".into());
        let target = TargetSpec::new("board", stm32h533::CHIP).gpio(led()).gpio(other);
        assert!(matches!(
            normalize(&mut state, &target),
            Err(SolveError::DuplicateDeclaration { kind: "GPIO", .. })
        ));
    }

    #[test]
    fn pinless_and_reserved_produce_no_settings() {
        let schema = stm32h533::schema().unwrap();
        let mut state = SolvingState::new(&schema, "board");
        let target = TargetSpec::new("board", stm32h533::CHIP)
            .gpio(GpioDecl::new("later", None, GpioMode::Analog))
            .gpio(GpioDecl::new("swd", Some("A13"), GpioMode::Reserved));
        let decls = normalize(&mut state, &target).unwrap();
        assert_eq!(decls.gpios.len(), 2);
        assert_eq!(state.get("GPIOA_ENABLE").unwrap(), &Value::Undetermined);
        assert_eq!(state.get("GPIOA13_MODE").unwrap(), &Value::Undetermined);
    }

    #[test]
    fn interrupts_checked_and_sorted() {
        let schema = stm32h533::schema().unwrap();
        let mut state = SolvingState::new(&schema, "board");
        let target = TargetSpec::new("board", stm32h533::CHIP)
            .interrupt("TIM2", Some(3))
            .interrupt("SysTick", None);
        let decls = normalize(&mut state, &target).unwrap();
        let names: Vec<&str> = decls.interrupts.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["SysTick", "TIM2"]);
        assert_eq!(
            state.committed("INTERRUPT_TIM2_PRIORITY").unwrap(),
            Some(&Literal::Int(3))
        );
    }

    #[test]
    fn wide_priority_bits_do_not_overflow() {
        let toml_str = schema_to_toml(&stm32h533::schema().unwrap()).unwrap();
        let mut table: toml::Table = toml::from_str(&toml_str).unwrap();
        table["topology"]
            .as_table_mut()
            .unwrap()
            .insert("nvic-priority-bits".into(), toml::Value::Integer(40));
        let schema = parse_schema_toml(&toml::to_string(&table).unwrap()).unwrap();

        let mut state = SolvingState::new(&schema, "board");
        let target = TargetSpec::new("board", stm32h533::CHIP).interrupt("TIM2", Some(15));
        normalize(&mut state, &target).unwrap();

        // The field itself still only holds four bits.
        let mut state = SolvingState::new(&schema, "board");
        let target = TargetSpec::new("board", stm32h533::CHIP).interrupt("TIM2", Some(200));
        assert!(matches!(
            normalize(&mut state, &target).unwrap_err(),
            SolveError::ConstraintViolation { .. }
        ));
    }

    #[test]
    fn interrupt_errors() {
        let schema = stm32h533::schema().unwrap();
        let check = |target: TargetSpec| {
            let mut state = SolvingState::new(&schema, "board");
            normalize(&mut state, &target).unwrap_err()
        };
        let board = || TargetSpec::new("board", stm32h533::CHIP);

        assert!(matches!(
            check(board().interrupt("TIM22", None)),
            SolveError::UnknownKey { .. }
        ));
        assert!(matches!(
            check(board().interrupt("TIM2", None).interrupt("TIM2", None)),
            SolveError::DuplicateDeclaration { kind: "interrupt", .. }
        ));
        assert!(matches!(
            check(board().interrupt("TIM2", Some(16))),
            SolveError::ConstraintViolation { .. }
        ));
        assert!(matches!(
            check(board().interrupt("HardFault", Some(0))),
            SolveError::InvalidDeclaration { .. }
        ));
    }
}
