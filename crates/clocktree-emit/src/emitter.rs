//! Turns a solved target into the ordered boot sequence.
//!
//! Steps run in a fixed order: GPIO, interrupts, fault enables, flash, power
//! supply, voltage scaling, oscillators, the peripheral clock option, PLLs,
//! system clock switch, SysTick, timer prescaler, kernel selectors, then the
//! per-peripheral initialisation constants. Each step coalesces its own writes
//! by register. Every committed value is consumed by exactly one step or by the
//! frequency export; anything left over is reported as a warning.

use std::collections::BTreeSet;

use clocktree_core::key;
use clocktree_core::schema::PllSourceMode;
use clocktree_core::{Constraint, FrozenState, Literal, Location, Origin, Schema, SchemaEntry};
use clocktree_solve::{Declarations, Solution};

use crate::error::{EmitError, Result};
use crate::group::GroupedWrites;
use crate::ops::{ConstantValue, EmitOp, EmitWarning, Emission};

/// Per-pin settings in emission order. The mode goes last so a pin only
/// switches once its driver is configured.
const PIN_SETTINGS: [&str; 6] = [
    "OPEN_DRAIN",
    "INITIAL_LEVEL",
    "SPEED",
    "PULL",
    "ALTERNATE_FUNCTION",
    "MODE",
];

/// Register encoding of a committed value.
pub(crate) fn encode(key: &str, entry: &SchemaEntry, value: &Literal) -> Result<u64> {
    let bits = match &entry.constraint {
        Some(constraint @ Constraint::Mapping(_)) => constraint.encode(value),
        _ if entry.encoding_offset => value.raw_bits().and_then(|bits| bits.checked_sub(1)),
        _ => value.raw_bits(),
    };
    bits.ok_or_else(|| EmitError::Unencodable {
        key: key.to_string(),
        value: value.to_string(),
    })
}

/// Read access to the frozen settings that records what was consumed.
struct Reader<'a, 's> {
    settings: &'a FrozenState<'s>,
    consumed: BTreeSet<&'s str>,
}

impl<'a, 's> Reader<'a, 's> {
    fn new(settings: &'a FrozenState<'s>) -> Self {
        Reader {
            settings,
            consumed: BTreeSet::new(),
        }
    }

    fn canonical(&self, key: &str) -> Result<&'s str> {
        let schema: &'s Schema = self.settings.schema();
        Ok(schema.resolve(key)?.as_str())
    }

    /// Committed value of `key` without consuming it.
    fn peek(&self, key: &str) -> Result<Option<(&'s str, &'a Literal)>> {
        let canonical = self.canonical(key)?;
        let settings: &'a FrozenState<'s> = self.settings;
        Ok(settings.committed(canonical)?.map(|value| (canonical, value)))
    }

    /// Consume the committed value of `key`. A key reached again through an
    /// alias yields nothing the second time.
    fn take(&mut self, key: &str) -> Result<Option<(&'s str, &'a Literal)>> {
        let Some((canonical, value)) = self.peek(key)? else {
            return Ok(None);
        };
        Ok(self.consumed.insert(canonical).then_some((canonical, value)))
    }

    /// Like [`Reader::take`], for keys the chip may not have.
    fn take_optional(&mut self, key: &str) -> Result<Option<(&'s str, &'a Literal)>> {
        if !self.settings.schema().contains(key) {
            return Ok(None);
        }
        self.take(key)
    }

    fn leftovers(&self) -> Vec<&'s str> {
        self.settings
            .slots()
            .filter(|(_, slot)| slot.value.is_committed() && slot.origin != Origin::Constant)
            .filter(|(key, _)| !self.consumed.contains(key))
            .map(|(key, _)| key)
            .collect()
    }
}

struct Emitter<'a, 's> {
    schema: &'s Schema,
    reader: Reader<'a, 's>,
    ops: Vec<EmitOp>,
}

impl<'a, 's> Emitter<'a, 's> {
    fn location(&self, key: &str) -> Result<&'s Location> {
        let (canonical, entry) = self.schema.entry(key)?;
        entry.location.as_ref().ok_or_else(|| EmitError::MissingLocation {
            key: canonical.clone(),
        })
    }

    fn encoded(&self, key: &str, value: &Literal) -> Result<u64> {
        let (canonical, entry) = self.schema.entry(key)?;
        encode(canonical, entry, value)
    }

    /// Queue the committed value of `key`, returning its encoding.
    fn write(&mut self, writes: &mut GroupedWrites, key: &str) -> Result<Option<u64>> {
        let Some((canonical, value)) = self.reader.take(key)? else {
            return Ok(None);
        };
        let bits = self.encoded(canonical, value)?;
        writes.push(self.location(canonical)?, bits)?;
        Ok(Some(bits))
    }

    fn write_optional(&mut self, writes: &mut GroupedWrites, key: &str) -> Result<Option<u64>> {
        if !self.schema.contains(key) {
            return Ok(None);
        }
        self.write(writes, key)
    }

    fn flush(&mut self, writes: GroupedWrites) {
        self.ops.extend(writes.into_ops());
    }

    /// A step made of a single write.
    fn write_step(&mut self, key: &str) -> Result<Option<u64>> {
        let mut writes = GroupedWrites::new();
        let bits = self.write_optional(&mut writes, key)?;
        self.flush(writes);
        Ok(bits)
    }

    fn wait(&mut self, key: &str, expected: u64) -> Result<()> {
        let location = self.location(key)?;
        self.ops.push(EmitOp::SpinWait {
            peripheral: location.peripheral.clone(),
            register: location.register.clone(),
            field: location.field.clone(),
            expected,
        });
        Ok(())
    }

    fn define(&mut self, name: impl Into<String>, value: ConstantValue) {
        self.ops.push(EmitOp::DefineConstant {
            name: name.into(),
            value,
        });
    }

    /// Consume `key` and define its encoding as `name`.
    fn init_constant(&mut self, name: String, key: &str) -> Result<bool> {
        let Some((canonical, value)) = self.reader.take_optional(key)? else {
            return Ok(false);
        };
        let bits = self.encoded(canonical, value)?;
        self.define(name, ConstantValue::Unsigned(bits));
        Ok(true)
    }

    /// Define the encoding of `key` as `name` without consuming it.
    fn init_constant_of_written(&mut self, name: String, key: &str) -> Result<()> {
        if !self.schema.contains(key) {
            return Ok(());
        }
        if let Some((canonical, value)) = self.reader.peek(key)? {
            let bits = self.encoded(canonical, value)?;
            self.define(name, ConstantValue::Unsigned(bits));
        }
        Ok(())
    }

    fn gpio(&mut self, declarations: &Declarations) -> Result<()> {
        let ports = &self.schema.topology().gpio_ports;

        let mut enables = GroupedWrites::new();
        for &port in ports {
            self.write(&mut enables, &key::gpio_port_enable(port))?;
        }
        self.flush(enables);

        for setting in PIN_SETTINGS {
            let mut writes = GroupedWrites::new();
            for &port in ports {
                for number in 0..16 {
                    self.write(&mut writes, &key::gpio_pin(port, number, setting))?;
                }
            }
            self.flush(writes);
        }

        for gpio in &declarations.gpios {
            let Some(pin) = gpio.pin else { continue };
            if gpio.mode.symbol().is_none() {
                continue;
            }
            self.define(
                format!("GPIO_{}_PORT", gpio.name),
                ConstantValue::Symbol(format!("GPIO{}", pin.port)),
            );
            self.define(
                format!("GPIO_{}_NUMBER", gpio.name),
                ConstantValue::Unsigned(u64::from(pin.number)),
            );
        }
        Ok(())
    }

    fn interrupts(&mut self, declarations: &Declarations) -> Result<()> {
        let topology = self.schema.topology();
        let mut routines: Vec<&str> = topology
            .mandatory_handlers
            .iter()
            .map(String::as_str)
            .collect();
        for interrupt in &declarations.interrupts {
            if !routines.contains(&interrupt.name.as_str()) {
                routines.push(&interrupt.name);
            }
        }
        for routine in routines {
            self.define(
                format!("INTERRUPT_{routine}"),
                ConstantValue::Symbol(routine.to_string()),
            );
        }

        let mut priorities = GroupedWrites::new();
        for interrupt in &declarations.interrupts {
            self.write_optional(&mut priorities, &key::interrupt_priority(&interrupt.name))?;
        }
        self.flush(priorities);
        Ok(())
    }

    fn boot(&mut self) -> Result<()> {
        let boot = &self.schema.topology().boot;

        let mut faults = GroupedWrites::new();
        for key in &boot.fault_enables {
            self.write(&mut faults, key)?;
        }
        self.flush(faults);

        let mut flash = GroupedWrites::new();
        let mut written = Vec::new();
        for key in &boot.flash {
            if let Some(bits) = self.write(&mut flash, key)? {
                written.push((key, bits));
            }
        }
        self.flush(flash);
        for (key, bits) in written {
            self.wait(key, bits)?;
        }

        let mut supply = GroupedWrites::new();
        for key in &boot.power_supply {
            self.write(&mut supply, key)?;
        }
        self.flush(supply);

        if let Some(vos) = self.write_step(&boot.voltage_scaling)? {
            self.wait(&boot.voltage_active, vos)?;
            self.wait(&boot.voltage_ready, 1)?;
        }
        Ok(())
    }

    fn oscillators(&mut self) -> Result<()> {
        let mut writes = GroupedWrites::new();
        let mut ready = Vec::new();
        for osc in &self.schema.topology().oscillators {
            let Some((_, enabled)) = self.reader.take(&osc.enable)? else {
                continue;
            };
            if osc.running_at_reset || enabled.as_bool() != Some(true) {
                continue;
            }
            writes.push(self.location(&osc.enable)?, 1)?;
            ready.push(&osc.ready);
        }
        self.flush(writes);
        for key in ready {
            self.wait(key, 1)?;
        }

        self.write_step(key::PERIPHERAL_CLOCK_OPTION)?;
        Ok(())
    }

    fn plls(&mut self) -> Result<()> {
        let topology = self.schema.topology();

        let mut config = GroupedWrites::new();
        if topology.pll_source == PllSourceMode::Shared {
            self.write_optional(&mut config, key::PLL_KERNEL_SOURCE)?;
        }
        for unit in &topology.plls {
            let id = unit.id;
            if topology.pll_source == PllSourceMode::PerUnit {
                self.write(&mut config, &key::pll_kernel_source(id))?;
            }
            self.write_optional(&mut config, &key::pll_input_range(id))?;
            self.write(&mut config, &key::pll_predivider(id))?;
            self.write(&mut config, &key::pll_multiplier(id))?;
            for channel in &unit.channels {
                self.write(&mut config, &key::pll_channel_divider(id, channel))?;
            }
            for channel in &unit.channels {
                self.write(&mut config, &key::pll_channel_enable(id, channel))?;
            }
        }
        self.flush(config);

        let mut enables = GroupedWrites::new();
        let mut ready = Vec::new();
        for unit in &topology.plls {
            if self.write(&mut enables, &key::pll_enable(unit.id))? == Some(1) {
                ready.push(unit.id);
            }
        }
        self.flush(enables);
        for id in ready {
            self.wait(&key::pll_ready(id), 1)?;
        }
        Ok(())
    }

    fn scgu(&mut self) -> Result<()> {
        let mut dividers = GroupedWrites::new();
        self.write(&mut dividers, key::CPU_DIVIDER)?;
        self.write_optional(&mut dividers, key::AXI_AHB_DIVIDER)?;
        for &unit in &self.schema.topology().apbs {
            self.write(&mut dividers, &key::apb_divider(unit))?;
        }
        self.flush(dividers);

        if let Some(source) = self.write_step(key::SCGU_KERNEL_SOURCE)? {
            self.wait(key::EFFECTIVE_SCGU_KERNEL_SOURCE, source)?;
        }
        Ok(())
    }

    fn systick(&mut self) -> Result<()> {
        if !self.schema.contains(key::SYSTICK_ENABLE) {
            return Ok(());
        }
        let enabled = self
            .reader
            .peek(key::SYSTICK_ENABLE)?
            .and_then(|(_, value)| value.as_bool())
            == Some(true);
        if !enabled {
            self.reader.take(key::SYSTICK_ENABLE)?;
            return Ok(());
        }

        let mut writes = GroupedWrites::new();
        for key in [
            key::SYSTICK_RELOAD,
            key::SYSTICK_COUNTER,
            key::SYSTICK_USE_CPU_CK,
            key::SYSTICK_INTERRUPT_ENABLE,
            key::SYSTICK_ENABLE,
        ] {
            self.write(&mut writes, key)?;
        }
        self.flush(writes);
        Ok(())
    }

    fn kernel_selectors(&mut self) -> Result<()> {
        let topology = self.schema.topology();
        let mut writes = GroupedWrites::new();
        for group in &topology.uxart_groups {
            self.write(&mut writes, &group.selector())?;
        }
        for &unit in &topology.i2cs {
            self.write_optional(&mut writes, &key::kernel_source(&key::i2c_instance(unit)))?;
        }
        for &unit in &topology.spis {
            self.write_optional(&mut writes, &key::kernel_source(&key::spi_instance(unit)))?;
        }
        for &unit in &topology.sdmmcs {
            self.write_optional(&mut writes, &key::kernel_source(&key::sdmmc_instance(unit)))?;
        }
        self.flush(writes);
        Ok(())
    }

    fn init_constants(&mut self) -> Result<()> {
        let topology = self.schema.topology();

        for group in &topology.uxart_groups {
            for member in &group.members {
                let divider = key::baud_divider(member);
                if self.init_constant(format!("{member}_BRR_BRR_init"), &divider)? {
                    self.init_constant_of_written(
                        format!("{member}_KERNEL_SOURCE_init"),
                        &key::kernel_source(member),
                    )?;
                }
            }
        }

        for &unit in &topology.i2cs {
            let instance = key::i2c_instance(unit);
            if self.reader.peek(&key::i2c_presc(unit))?.is_none() {
                continue;
            }
            self.init_constant_of_written(
                format!("{instance}_KERNEL_SOURCE_init"),
                &key::kernel_source(&instance),
            )?;
            self.init_constant(format!("{instance}_TIMINGR_PRESC_init"), &key::i2c_presc(unit))?;
            self.init_constant(format!("{instance}_TIMINGR_SCLH_init"), &key::i2c_sclh(unit))?;
            self.init_constant(format!("{instance}_TIMINGR_SCLL_init"), &key::i2c_scll(unit))?;
        }

        if !topology.timers.is_empty() {
            self.init_constant_of_written(
                format!("{}_init", key::GLOBAL_TIMER_PRESCALER),
                key::GLOBAL_TIMER_PRESCALER,
            )?;
        }
        for timer in &topology.timers {
            let id = timer.id;
            self.init_constant(format!("TIM{id}_DIVIDER_init"), &key::timer_divider(id))?;
            self.init_constant(format!("TIM{id}_MODULATION_init"), &key::timer_modulation(id))?;
        }

        for &unit in &topology.spis {
            let instance = key::spi_instance(unit);
            if self.init_constant(format!("{instance}_MBR_init"), &key::baud_divider(&instance))? {
                self.init_constant_of_written(
                    format!("{instance}_KERNEL_SOURCE_init"),
                    &key::kernel_source(&instance),
                )?;
            }
        }

        for &unit in &topology.sdmmcs {
            let instance = key::sdmmc_instance(unit);
            if self.init_constant(format!("{instance}_CLKDIV_init"), &key::sdmmc_clkdiv(unit))? {
                self.init_constant_of_written(
                    format!("{instance}_KERNEL_SOURCE_init"),
                    &key::kernel_source(&instance),
                )?;
            }
        }
        Ok(())
    }
}

/// Emit the boot sequence of a solved target.
pub fn emit(solution: &Solution<'_>) -> Result<Emission> {
    let settings = &solution.settings;
    let schema = settings.schema();
    let mut emitter = Emitter {
        schema,
        reader: Reader::new(settings),
        ops: Vec::new(),
    };

    // Step 1: GPIO ports and pins
    emitter.gpio(&solution.declarations)?;

    // Step 2: Interrupt handlers and priorities
    emitter.interrupts(&solution.declarations)?;

    // Step 3: Fault enables, flash, power supply, voltage scaling
    emitter.boot()?;

    // Step 4: Oscillators and the peripheral clock option
    emitter.oscillators()?;

    // Step 5: PLLs
    emitter.plls()?;

    // Step 6: Bus dividers and the system clock switch
    emitter.scgu()?;

    // Step 7: SysTick
    emitter.systick()?;

    // Step 8: Timer prescaler and peripheral kernel selectors
    emitter.write_step(key::GLOBAL_TIMER_PRESCALER)?;
    emitter.kernel_selectors()?;

    // Step 9: Peripheral initialisation constants
    emitter.init_constants()?;

    // Step 10: Frequency export
    let frequencies = settings
        .frequencies()
        .into_iter()
        .map(|(key, frequency)| (key.to_string(), frequency))
        .collect();
    for (key, slot) in settings.slots() {
        let is_goal = schema.entry(key).is_ok_and(|(_, entry)| entry.kind.is_goal());
        if is_goal && slot.value.is_committed() {
            emitter.reader.consumed.insert(key);
        }
    }

    let warnings: Vec<EmitWarning> = emitter
        .reader
        .leftovers()
        .into_iter()
        .map(|key| {
            log::warn!("{}: committed value `{key}` was never emitted", settings.target());
            EmitWarning::UnusedCommittedValue {
                key: key.to_string(),
            }
        })
        .collect();

    let emission = Emission {
        target: settings.target().to_string(),
        chip: schema.chip().to_string(),
        ops: emitter.ops,
        frequencies,
        warnings,
    };
    log::info!(
        "emitted `{}`: {} register writes, {} operations",
        emission.target,
        emission.writes(),
        emission.ops.len()
    );
    Ok(emission)
}
