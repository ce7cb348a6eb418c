//! Typed builder for chip schemas.
//!
//! The builtin chip tables are written as builder calls; the helpers here
//! cover the parts that are identical across the STM32 families (GPIO ports,
//! interrupt priorities, oscillator bits, the usual prescaler encodings).

use std::collections::BTreeMap;

use clocktree_core::key::{self, Key};
use clocktree_core::schema::{InterruptLine, Oscillator};
use clocktree_core::{Constraint, Literal, Location, Schema, SchemaEntry, Topology};

use crate::error::Result;

/// GPIO mode encodings shared by every STM32 port.
pub const GPIO_MODES: [(&str, u64); 4] =
    [("INPUT", 0), ("OUTPUT", 1), ("ALTERNATE", 2), ("ANALOG", 3)];
pub const GPIO_SPEEDS: [(&str, u64); 4] =
    [("LOW", 0), ("MEDIUM", 1), ("HIGH", 2), ("VERY_HIGH", 3)];
pub const GPIO_PULLS: [(&str, u64); 3] = [("NONE", 0), ("UP", 1), ("DOWN", 2)];

/// Accumulates schema entries for one chip.
#[derive(Debug)]
pub struct SchemaBuilder {
    chip: String,
    description: String,
    entries: BTreeMap<Key, SchemaEntry>,
}

impl SchemaBuilder {
    pub fn new(chip: impl Into<String>, description: impl Into<String>) -> Self {
        SchemaBuilder {
            chip: chip.into(),
            description: description.into(),
            entries: BTreeMap::new(),
        }
    }

    pub fn entry(&mut self, key: impl Into<Key>, entry: SchemaEntry) -> &mut Self {
        self.entries.insert(key.into(), entry);
        self
    }

    /// A clock frequency with an upper bound.
    pub fn clock(&mut self, key: impl Into<Key>, max_hz: u64) -> &mut Self {
        self.entry(key, SchemaEntry::frequency().within(0, max_hz))
    }

    /// A register field with a plain constraint.
    pub fn setting(
        &mut self,
        key: impl Into<Key>,
        location: Location,
        constraint: Constraint,
    ) -> &mut Self {
        self.entry(key, SchemaEntry::setting(location, constraint))
    }

    pub fn flag(&mut self, key: impl Into<Key>, location: Location) -> &mut Self {
        self.entry(key, SchemaEntry::flag(location))
    }

    pub fn status(&mut self, key: impl Into<Key>, location: Location) -> &mut Self {
        self.entry(key, SchemaEntry::status(location))
    }

    /// Oscillator entries: `<name>_CK`, `<name>_ENABLE` and `<name>_READY` in `RCC.CR`.
    pub fn oscillator(
        &mut self,
        name: &str,
        frequency_hz: u64,
        running_at_reset: bool,
        enabled_by_default: bool,
    ) -> Oscillator {
        let osc = Oscillator {
            name: name.to_string(),
            clock: format!("{name}_CK"),
            enable: format!("{name}_ENABLE"),
            ready: format!("{name}_READY"),
            frequency_hz,
            running_at_reset,
            enabled_by_default,
        };
        self.clock(osc.clock.clone(), frequency_hz);
        self.flag(osc.enable.clone(), Location::new("RCC", "CR", format!("{name}ON")));
        self.status(osc.ready.clone(), Location::new("RCC", "CR", format!("{name}RDY")));
        osc
    }

    /// Port enable bits and the per-pin settings of every port.
    pub fn gpio_ports(&mut self, ports: &[char], enable_register: &str) -> &mut Self {
        for &port in ports {
            let peripheral = format!("GPIO{port}");
            self.flag(
                key::gpio_port_enable(port),
                Location::new("RCC", enable_register, format!("GPIO{port}EN")),
            );
            for n in 0..16u8 {
                let at = |register: &str, field: &str| {
                    Location::new(peripheral.as_str(), register, format!("{field}{n}"))
                };
                let afr = if n < 8 { "AFRL" } else { "AFRH" };
                self.setting(
                    key::gpio_pin(port, n, "MODE"),
                    at("MODER", "MODE"),
                    Constraint::sources(GPIO_MODES),
                );
                self.flag(key::gpio_pin(port, n, "OPEN_DRAIN"), at("OTYPER", "OT"));
                self.flag(key::gpio_pin(port, n, "INITIAL_LEVEL"), at("ODR", "OD"));
                self.setting(
                    key::gpio_pin(port, n, "SPEED"),
                    at("OSPEEDR", "OSPEED"),
                    Constraint::sources(GPIO_SPEEDS),
                );
                self.setting(
                    key::gpio_pin(port, n, "PULL"),
                    at("PUPDR", "PUPD"),
                    Constraint::sources(GPIO_PULLS),
                );
                self.setting(
                    key::gpio_pin(port, n, "ALTERNATE_FUNCTION"),
                    at(afr, "AFSEL"),
                    Constraint::int_range(0, 15),
                );
            }
        }
        self
    }

    /// Interrupt table from vector order starting at `Reset`; empty names are
    /// reserved vectors. Adds a priority key for every configurable line.
    pub fn interrupts(&mut self, table: &[&str], priority_bits: u8) -> Vec<InterruptLine> {
        let max_priority = (1i64 << priority_bits) - 1;
        let mut lines = Vec::new();
        for (position, name) in table.iter().enumerate() {
            if name.is_empty() {
                continue;
            }
            let irqn = position as i32 - 15;
            // Reset, NMI and HardFault have fixed priorities.
            let location = match irqn {
                n if n >= 0 => Some(Location::new("NVIC", format!("IPR{n}"), "PRI")),
                n if n >= -12 => Some(Location::new("SCB", format!("SHPR{}", n + 12), "PRI")),
                _ => None,
            };
            if let Some(location) = location {
                self.setting(
                    key::interrupt_priority(name),
                    location,
                    Constraint::int_range(0, max_priority),
                );
            }
            lines.push(InterruptLine {
                name: name.to_string(),
                irqn,
            });
        }
        lines
    }

    pub fn build(self, topology: Topology) -> Result<Schema> {
        Ok(Schema::new(
            self.chip,
            self.description,
            self.entries,
            topology,
        )?)
    }
}

/// AHB-style prescaler: divide by 1 to 512, skipping 32.
pub fn ahb_prescaler() -> Constraint {
    Constraint::mapping([
        (1i64, 0b0000),
        (2, 0b1000),
        (4, 0b1001),
        (8, 0b1010),
        (16, 0b1011),
        (64, 0b1100),
        (128, 0b1101),
        (256, 0b1110),
        (512, 0b1111),
    ])
}

/// APB-style prescaler: divide by 1 to 16.
pub fn apb_prescaler() -> Constraint {
    Constraint::mapping([(1i64, 0b000), (2, 0b100), (4, 0b101), (8, 0b110), (16, 0b111)])
}

/// SPI master baud rate prescaler: powers of two from 2 to 256.
pub fn spi_baud_prescaler() -> Constraint {
    Constraint::mapping((0..8u64).map(|code| (2i64 << code, code)))
}

/// PLL reference input ranges as half-open bands.
pub fn input_bands(bands: &[(u64, u64, u64)]) -> Constraint {
    Constraint::mapping(
        bands
            .iter()
            .map(|&(lo, hi, code)| (Literal::Band { lo, hi }, code)),
    )
}
