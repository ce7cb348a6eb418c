//! Per-chip capability schema.
//!
//! A [`Schema`] maps every configurable quantity of a chip to its hardware
//! location, its legal values and its register encoding, and carries the fixed
//! topology facts the solver stages iterate over (PLL units and channels, bus
//! numbers, peripheral groups, the interrupt table). It is built once per chip
//! and only ever read afterwards.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constraint::Constraint;
use crate::error::{Result, SolveError};
use crate::key::{self, Key};
use crate::value::Literal;

/// Where a key lives in hardware.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Location {
    pub peripheral: String,
    pub register: String,
    pub field: String,
}

impl Location {
    pub fn new(
        peripheral: impl Into<String>,
        register: impl Into<String>,
        field: impl Into<String>,
    ) -> Self {
        Location {
            peripheral: peripheral.into(),
            register: register.into(),
            field: field.into(),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.peripheral, self.register, self.field)
    }
}

/// What kind of quantity an entry describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntryKind {
    /// A clock frequency.
    Frequency,
    /// An event rate such as a baud rate or a timer update rate.
    Rate,
    /// A writable register field.
    Setting,
    /// A read-only hardware flag, only used as a spin-wait target.
    Status,
    /// A fixed property of the chip.
    Constant,
}

impl EntryKind {
    /// Whether goals may be given for this kind of entry.
    pub fn is_goal(self) -> bool {
        matches!(self, EntryKind::Frequency | EntryKind::Rate)
    }
}

fn is_false(b: &bool) -> bool {
    !*b
}

/// One key of the schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SchemaEntry {
    pub kind: EntryKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraint: Option<Constraint>,
    /// The register stores the desired value minus one.
    #[serde(default, skip_serializing_if = "is_false")]
    pub encoding_offset: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<Key>,
    /// Fixed value of a [`EntryKind::Constant`] entry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Literal>,
}

impl SchemaEntry {
    fn of_kind(kind: EntryKind) -> Self {
        SchemaEntry {
            kind,
            location: None,
            constraint: None,
            encoding_offset: false,
            aliases: Vec::new(),
            value: None,
        }
    }

    pub fn frequency() -> Self {
        Self::of_kind(EntryKind::Frequency)
    }

    pub fn rate() -> Self {
        Self::of_kind(EntryKind::Rate)
    }

    pub fn setting(location: Location, constraint: Constraint) -> Self {
        SchemaEntry {
            location: Some(location),
            constraint: Some(constraint),
            ..Self::of_kind(EntryKind::Setting)
        }
    }

    /// A boolean register bit.
    pub fn flag(location: Location) -> Self {
        Self::setting(location, Constraint::flag())
    }

    pub fn status(location: Location) -> Self {
        SchemaEntry {
            location: Some(location),
            ..Self::of_kind(EntryKind::Status)
        }
    }

    pub fn constant(value: impl Into<Literal>) -> Self {
        SchemaEntry {
            value: Some(value.into()),
            ..Self::of_kind(EntryKind::Constant)
        }
    }

    /// Restrict a frequency or rate to `min..=max` hertz.
    pub fn within(mut self, min: u64, max: u64) -> Self {
        self.constraint = Some(Constraint::real_range(min, max));
        self
    }

    pub fn constrained(mut self, constraint: Constraint) -> Self {
        self.constraint = Some(constraint);
        self
    }

    pub fn offset_by_one(mut self) -> Self {
        self.encoding_offset = true;
        self
    }

    pub fn alias(mut self, alias: impl Into<Key>) -> Self {
        self.aliases.push(alias.into());
        self
    }
}

/// How PLL units choose their kernel clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PllSourceMode {
    /// One selector (`PLL_KERNEL_SOURCE`) feeds every unit.
    Shared,
    /// Each unit has its own `PLL<n>_KERNEL_SOURCE`.
    PerUnit,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PllUnit {
    pub id: u8,
    /// Output channel letters in order, e.g. `["P", "Q", "R"]`.
    pub channels: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Oscillator {
    /// Name used by targets, e.g. `HSI48`.
    pub name: String,
    /// Frequency key, e.g. `HSI48_CK`.
    pub clock: Key,
    pub enable: Key,
    pub ready: Key,
    pub frequency_hz: u64,
    /// Already running when the core starts; never re-enabled and never disabled.
    pub running_at_reset: bool,
    pub enabled_by_default: bool,
}

/// UART-like instances sharing one kernel clock selector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UxartGroup {
    pub name: String,
    pub members: Vec<String>,
}

impl UxartGroup {
    pub fn selector(&self) -> Key {
        key::uxart_selector(&self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerUnit {
    pub id: u8,
    /// Peripheral bus the timer hangs off.
    pub apb: u8,
}

/// Timer kernel multiplier for one value of the timer prescaler selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerFactor {
    pub prescaler: bool,
    pub factor: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterruptLine {
    pub name: String,
    /// CMSIS IRQ number; negative numbers are system exceptions.
    pub irqn: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlternateFunction {
    /// Pin such as `A5`.
    pub pin: String,
    pub function: String,
    pub code: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixedSetting {
    pub key: Key,
    pub value: Literal,
}

/// Keys and fixed values of the power-up steps that precede clock switching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BootSequence {
    pub flash: Vec<Key>,
    pub power_supply: Vec<Key>,
    pub voltage_scaling: Key,
    pub voltage_active: Key,
    pub voltage_ready: Key,
    pub fault_enables: Vec<Key>,
    pub settings: Vec<FixedSetting>,
}

/// Fixed structural facts of a chip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Topology {
    pub pll_source: PllSourceMode,
    pub plls: Vec<PllUnit>,
    pub apbs: Vec<u8>,
    /// Whether the core bus has its own divider below the CPU clock.
    pub core_bus_divider: bool,
    pub oscillators: Vec<Oscillator>,
    /// Clocks the chip does not provide, fixed at 0 Hz.
    #[serde(default)]
    pub disabled_clocks: Vec<Key>,
    #[serde(default)]
    pub peripheral_clock: bool,
    /// Fixed CPU clock ratios available to SysTick besides the CPU clock itself.
    #[serde(default)]
    pub systick_ratios: Vec<u64>,
    #[serde(default)]
    pub uxart_groups: Vec<UxartGroup>,
    #[serde(default)]
    pub i2cs: Vec<u8>,
    #[serde(default)]
    pub timers: Vec<TimerUnit>,
    #[serde(default)]
    pub timer_factors: Vec<TimerFactor>,
    #[serde(default)]
    pub spis: Vec<u8>,
    #[serde(default)]
    pub sdmmcs: Vec<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdmmc_kernel_max_hz: Option<u64>,
    pub gpio_ports: Vec<char>,
    pub interrupts: Vec<InterruptLine>,
    pub nvic_priority_bits: u8,
    /// Handlers every firmware image must define.
    #[serde(default)]
    pub mandatory_handlers: Vec<String>,
    #[serde(default)]
    pub alternate_functions: Vec<AlternateFunction>,
    pub boot: BootSequence,
}

impl Topology {
    pub fn timer_factor(&self, prescaler: bool) -> Option<u64> {
        self.timer_factors
            .iter()
            .find(|f| f.prescaler == prescaler)
            .map(|f| f.factor)
    }

    pub fn interrupt(&self, name: &str) -> Option<&InterruptLine> {
        self.interrupts.iter().find(|line| line.name == name)
    }
}

/// Serialized form of a [`Schema`]; the alias index is rebuilt on load.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SchemaDef {
    chip: String,
    #[serde(default)]
    description: String,
    topology: Topology,
    entries: BTreeMap<Key, SchemaEntry>,
}

/// The complete capability schema of one chip.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "SchemaDef", into = "SchemaDef")]
pub struct Schema {
    chip: String,
    description: String,
    topology: Topology,
    entries: BTreeMap<Key, SchemaEntry>,
    aliases: BTreeMap<Key, Key>,
}

impl TryFrom<SchemaDef> for Schema {
    type Error = SolveError;

    fn try_from(def: SchemaDef) -> Result<Self> {
        Schema::new(def.chip, def.description, def.entries, def.topology)
    }
}

impl From<Schema> for SchemaDef {
    fn from(schema: Schema) -> Self {
        SchemaDef {
            chip: schema.chip,
            description: schema.description,
            topology: schema.topology,
            entries: schema.entries,
        }
    }
}

impl Schema {
    /// Assemble a schema, indexing aliases. Aliases may not shadow keys or
    /// each other.
    pub fn new(
        chip: impl Into<String>,
        description: impl Into<String>,
        entries: BTreeMap<Key, SchemaEntry>,
        topology: Topology,
    ) -> Result<Self> {
        let mut aliases = BTreeMap::new();
        for (key, entry) in &entries {
            for alias in &entry.aliases {
                if entries.contains_key(alias) || aliases.contains_key(alias) {
                    return Err(SolveError::DuplicateDeclaration {
                        kind: "alias",
                        name: alias.clone(),
                    });
                }
                aliases.insert(alias.clone(), key.clone());
            }
        }
        Ok(Schema {
            chip: chip.into(),
            description: description.into(),
            topology,
            entries,
            aliases,
        })
    }

    pub fn chip(&self) -> &str {
        &self.chip
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn entries(&self) -> impl Iterator<Item = (&Key, &SchemaEntry)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key) || self.aliases.contains_key(key)
    }

    /// Map a key or alias to its canonical key.
    pub fn resolve(&self, key: &str) -> Result<&Key> {
        if let Some((canonical, _)) = self.entries.get_key_value(key) {
            return Ok(canonical);
        }
        if let Some(target) = self.aliases.get(key) {
            if let Some((canonical, _)) = self.entries.get_key_value(target) {
                return Ok(canonical);
            }
        }
        Err(self.unknown_key(key))
    }

    /// Canonical key and entry for a key or alias.
    pub fn entry(&self, key: &str) -> Result<(&Key, &SchemaEntry)> {
        let canonical = self.resolve(key)?;
        let entry = &self.entries[canonical];
        Ok((canonical, entry))
    }

    fn unknown_key(&self, key: &str) -> SolveError {
        let candidates = self
            .entries
            .keys()
            .chain(self.aliases.keys())
            .map(String::as_str);
        SolveError::UnknownKey {
            key: key.to_string(),
            chip: self.chip.clone(),
            suggestions: key::suggest(key, candidates, 3),
        }
    }

    /// Alternate function code of `function` on `pin`.
    pub fn alternate_function(&self, pin: &str, function: &str) -> Result<u8> {
        let on_pin: Vec<&AlternateFunction> = self
            .topology
            .alternate_functions
            .iter()
            .filter(|af| af.pin == pin)
            .collect();
        if let Some(af) = on_pin.iter().find(|af| af.function == function) {
            return Ok(af.code);
        }
        let mut suggestions: Vec<&str> = on_pin.iter().map(|af| af.function.as_str()).collect();
        suggestions.sort_by_key(|candidate| key::edit_distance(function, candidate));
        Err(SolveError::UnknownAlternateFunction {
            pin: pin.to_string(),
            function: function.to_string(),
            suggestions: suggestions.into_iter().map(String::from).collect(),
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn tiny_topology() -> Topology {
        Topology {
            pll_source: PllSourceMode::PerUnit,
            plls: vec![PllUnit {
                id: 1,
                channels: vec!["P".into()],
            }],
            apbs: vec![1],
            core_bus_divider: false,
            oscillators: Vec::new(),
            disabled_clocks: Vec::new(),
            peripheral_clock: false,
            systick_ratios: Vec::new(),
            uxart_groups: Vec::new(),
            i2cs: Vec::new(),
            timers: Vec::new(),
            timer_factors: Vec::new(),
            spis: Vec::new(),
            sdmmcs: Vec::new(),
            sdmmc_kernel_max_hz: None,
            gpio_ports: vec!['A'],
            interrupts: vec![InterruptLine {
                name: "TIM2".into(),
                irqn: 45,
            }],
            nvic_priority_bits: 4,
            mandatory_handlers: Vec::new(),
            alternate_functions: vec![
                AlternateFunction {
                    pin: "A5".into(),
                    function: "SPI1_SCK".into(),
                    code: 5,
                },
                AlternateFunction {
                    pin: "A5".into(),
                    function: "TIM2_CH1".into(),
                    code: 1,
                },
            ],
            boot: BootSequence {
                flash: Vec::new(),
                power_supply: Vec::new(),
                voltage_scaling: "VOS".into(),
                voltage_active: "VOS_ACTIVE".into(),
                voltage_ready: "VOS_READY".into(),
                fault_enables: Vec::new(),
                settings: Vec::new(),
            },
        }
    }

    pub(crate) fn tiny_schema() -> Schema {
        let mut entries = BTreeMap::new();
        entries.insert("CPU_CK".to_string(), SchemaEntry::frequency().within(0, 250_000_000));
        entries.insert(
            "UXART_G_KERNEL_SOURCE".to_string(),
            SchemaEntry::setting(
                Location::new("RCC", "CCIPR2", "UART234578SEL"),
                Constraint::sources([("APB1_CK", 0), ("HSI_CK", 3)]),
            )
            .alias("USART2_KERNEL_SOURCE")
            .alias("USART3_KERNEL_SOURCE"),
        );
        entries.insert(
            "PLL1_ENABLE".to_string(),
            SchemaEntry::flag(Location::new("RCC", "CR", "PLL1ON")),
        );
        Schema::new("TINY", "test chip", entries, tiny_topology()).unwrap()
    }

    #[test]
    fn aliases_resolve_to_shared_entry() {
        let schema = tiny_schema();
        assert_eq!(schema.resolve("USART2_KERNEL_SOURCE").unwrap(), "UXART_G_KERNEL_SOURCE");
        assert_eq!(schema.resolve("USART3_KERNEL_SOURCE").unwrap(), "UXART_G_KERNEL_SOURCE");
        assert!(schema.contains("USART3_KERNEL_SOURCE"));
    }

    #[test]
    fn unknown_key_suggests_neighbours() {
        let schema = tiny_schema();
        match schema.resolve("PLL1_ENABEL") {
            Err(SolveError::UnknownKey { chip, suggestions, .. }) => {
                assert_eq!(chip, "TINY");
                assert_eq!(suggestions[0], "PLL1_ENABLE");
            }
            other => panic!("expected UnknownKey, got {other:?}"),
        }
    }

    #[test]
    fn alias_shadowing_a_key_is_rejected() {
        let mut entries = BTreeMap::new();
        entries.insert("A".to_string(), SchemaEntry::frequency());
        entries.insert("B".to_string(), SchemaEntry::frequency().alias("A"));
        let err = Schema::new("X", "", entries, tiny_topology()).unwrap_err();
        assert!(matches!(err, SolveError::DuplicateDeclaration { kind: "alias", .. }));
    }

    #[test]
    fn alternate_function_lookup() {
        let schema = tiny_schema();
        assert_eq!(schema.alternate_function("A5", "TIM2_CH1").unwrap(), 1);
        match schema.alternate_function("A5", "SPI1_SCLK") {
            Err(SolveError::UnknownAlternateFunction { suggestions, .. }) => {
                assert_eq!(suggestions, vec!["SPI1_SCK".to_string(), "TIM2_CH1".to_string()]);
            }
            other => panic!("expected UnknownAlternateFunction, got {other:?}"),
        }
    }

    #[test]
    fn json_round_trip_rebuilds_alias_index() {
        let schema = tiny_schema();
        let json = serde_json::to_string(&schema).unwrap();
        let back: Schema = serde_json::from_str(&json).unwrap();
        assert_eq!(back.resolve("USART2_KERNEL_SOURCE").unwrap(), "UXART_G_KERNEL_SOURCE");
        assert_eq!(back.len(), schema.len());
    }
}
