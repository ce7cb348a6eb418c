//! TOML loading, serialization, validation, and discovery for chip schemas.
//!
//! Besides the builtin tables, schemas can be kept as `.schema.toml` files in
//! the `chips/` directory of a project. A file uses the same serde model as
//! the builtin tables, so `chips describe --format toml` produces a valid
//! starting point for a new chip.

use std::path::{Path, PathBuf};

use clocktree_core::schema::PllSourceMode;
use clocktree_core::{key, EntryKind, Schema};

use crate::error::{ChipError, Result};

/// A consistency problem found in a schema.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    /// Severity: "error" or "warning".
    pub severity: &'static str,
    /// Human-readable description.
    pub message: String,
}

/// Load a schema from a `.schema.toml` file.
pub fn load_schema_toml(path: &Path) -> Result<Schema> {
    if !path.exists() {
        return Err(ChipError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let content = std::fs::read_to_string(path)?;
    parse_schema_toml(&content)
}

/// Parse a schema from a TOML string.
pub fn parse_schema_toml(toml_str: &str) -> Result<Schema> {
    let schema: Schema = toml::from_str(toml_str)?;
    Ok(schema)
}

/// Serialize a schema to pretty TOML.
pub fn schema_to_toml(schema: &Schema) -> Result<String> {
    let toml_str = toml::to_string_pretty(schema)?;
    Ok(toml_str)
}

/// Check that every key the topology refers to exists with a sensible kind.
///
/// Returns `Ok(())` if consistent, or `Err(issues)` with a list of problems.
pub fn validate_schema(schema: &Schema) -> std::result::Result<(), Vec<ValidationIssue>> {
    let mut issues = Vec::new();
    let topology = schema.topology();

    let mut require = |key: &str, kinds: &[EntryKind]| match schema.entry(key) {
        Ok((_, entry)) if kinds.contains(&entry.kind) => {}
        Ok((_, entry)) => issues.push(ValidationIssue {
            severity: "error",
            message: format!("`{key}` is a {:?} entry, expected one of {kinds:?}", entry.kind),
        }),
        Err(_) => issues.push(ValidationIssue {
            severity: "error",
            message: format!("topology refers to missing key `{key}`"),
        }),
    };

    let setting: &[EntryKind] = &[EntryKind::Setting];
    let clock: &[EntryKind] = &[EntryKind::Frequency, EntryKind::Constant];
    let status: &[EntryKind] = &[EntryKind::Status];
    let rate: &[EntryKind] = &[EntryKind::Rate];

    require(key::CPU_CK, clock);
    require(key::AXI_AHB_CK, clock);
    require(key::CPU_DIVIDER, setting);
    require(key::SCGU_KERNEL_SOURCE, setting);
    require(key::EFFECTIVE_SCGU_KERNEL_SOURCE, status);
    if topology.core_bus_divider {
        require(key::AXI_AHB_DIVIDER, setting);
    }
    for &apb in &topology.apbs {
        require(&key::apb_ck(apb), clock);
        require(&key::apb_divider(apb), setting);
    }
    for osc in &topology.oscillators {
        require(&osc.clock, clock);
        require(&osc.enable, setting);
        require(&osc.ready, status);
    }
    if topology.pll_source == PllSourceMode::Shared {
        require(key::PLL_KERNEL_SOURCE, setting);
    }
    for pll in &topology.plls {
        let u = pll.id;
        if topology.pll_source == PllSourceMode::PerUnit {
            require(&key::pll_kernel_source(u), setting);
        }
        require(&key::pll_enable(u), setting);
        require(&key::pll_ready(u), status);
        require(&key::pll_predivider(u), setting);
        require(&key::pll_input_range(u), setting);
        require(&key::pll_multiplier(u), setting);
        require(&key::pll_vco(u), clock);
        for c in &pll.channels {
            require(&key::pll_channel_ck(u, c), clock);
            require(&key::pll_channel_divider(u, c), setting);
            require(&key::pll_channel_enable(u, c), setting);
        }
    }
    for group in &topology.uxart_groups {
        require(&group.selector(), setting);
        for member in &group.members {
            require(&key::baud(member), rate);
            require(&key::baud_divider(member), setting);
        }
    }
    for &u in &topology.i2cs {
        require(&key::kernel_source(&key::i2c_instance(u)), setting);
        require(&key::i2c_presc(u), setting);
        require(&key::i2c_sclh(u), setting);
        require(&key::i2c_scll(u), setting);
    }
    if !topology.timers.is_empty() {
        require(key::GLOBAL_TIMER_PRESCALER, setting);
    }
    for timer in &topology.timers {
        require(&key::timer_divider(timer.id), setting);
        require(&key::timer_modulation(timer.id), setting);
        require(&key::timer_kernel_ck(timer.id), clock);
    }
    for &u in &topology.spis {
        let inst = key::spi_instance(u);
        require(&key::kernel_source(&inst), setting);
        require(&key::baud_divider(&inst), setting);
    }
    for &u in &topology.sdmmcs {
        require(&key::kernel_source(&key::sdmmc_instance(u)), setting);
        require(&key::sdmmc_clkdiv(u), setting);
    }
    for setting_key in topology
        .boot
        .flash
        .iter()
        .chain(&topology.boot.power_supply)
        .chain(&topology.boot.fault_enables)
        .chain([&topology.boot.voltage_scaling])
    {
        require(setting_key.as_str(), setting);
    }
    require(&topology.boot.voltage_active, status);
    require(&topology.boot.voltage_ready, status);

    for fixed in &topology.boot.settings {
        if let Ok((_, entry)) = schema.entry(&fixed.key) {
            if let Some(constraint) = &entry.constraint {
                if !constraint.contains(&fixed.value) {
                    issues.push(ValidationIssue {
                        severity: "error",
                        message: format!(
                            "boot setting `{}` = {} violates {constraint}",
                            fixed.key, fixed.value
                        ),
                    });
                }
            }
        } else {
            issues.push(ValidationIssue {
                severity: "error",
                message: format!("boot setting refers to missing key `{}`", fixed.key),
            });
        }
    }

    if !(1..=8).contains(&topology.nvic_priority_bits) {
        issues.push(ValidationIssue {
            severity: "error",
            message: format!(
                "nvic-priority-bits is {}, expected 1 to 8",
                topology.nvic_priority_bits
            ),
        });
    }

    if !topology.timers.is_empty() {
        for prescaler in [false, true] {
            if topology.timer_factor(prescaler).is_none() {
                issues.push(ValidationIssue {
                    severity: "warning",
                    message: format!("no timer multiplier for prescaler selector {prescaler}"),
                });
            }
        }
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(issues)
    }
}

/// Discover all `.schema.toml` files in a project's `chips/` directory.
///
/// Returns a list of (chip_name, file_path) pairs.
pub fn discover_schemas(project_dir: &Path) -> Result<Vec<(String, PathBuf)>> {
    let chips_dir = project_dir.join("chips");
    if !chips_dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut schemas = Vec::new();
    for entry in std::fs::read_dir(&chips_dir)? {
        let path = entry?.path();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.strip_suffix(".schema.toml"))
            .map(str::to_string);
        if let Some(name) = name {
            schemas.push((name, path));
        }
    }
    schemas.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(schemas)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{stm32h533, stm32h7s3};

    #[test]
    fn builtin_schemas_validate() {
        for schema in [stm32h533::schema().unwrap(), stm32h7s3::schema().unwrap()] {
            if let Err(issues) = validate_schema(&schema) {
                let messages: Vec<String> = issues.into_iter().map(|i| i.message).collect();
                panic!("{}: {}", schema.chip(), messages.join("; "));
            }
        }
    }

    #[test]
    fn round_trip_h7s3() {
        let original = stm32h7s3::schema().unwrap();
        let toml_str = schema_to_toml(&original).unwrap();
        let parsed = parse_schema_toml(&toml_str).unwrap();
        assert_eq!(parsed.chip(), original.chip());
        assert_eq!(parsed.len(), original.len());
        assert_eq!(parsed.topology(), original.topology());
        assert_eq!(
            parsed.resolve("USART3_KERNEL_SOURCE").unwrap(),
            "UXART_UART234578_KERNEL_SOURCE"
        );
    }

    #[test]
    fn validate_missing_divider() {
        let toml_str = schema_to_toml(&stm32h533::schema().unwrap()).unwrap();
        let mut table: toml::Table = toml::from_str(&toml_str).unwrap();
        table["entries"]
            .as_table_mut()
            .unwrap()
            .remove("CPU_DIVIDER")
            .unwrap();
        let schema = parse_schema_toml(&toml::to_string(&table).unwrap()).unwrap();
        let issues = validate_schema(&schema).unwrap_err();
        assert!(issues.iter().any(|i| i.message.contains("CPU_DIVIDER")));
    }

    #[test]
    fn validate_priority_bits() {
        let toml_str = schema_to_toml(&stm32h533::schema().unwrap()).unwrap();
        let mut table: toml::Table = toml::from_str(&toml_str).unwrap();
        table["topology"]
            .as_table_mut()
            .unwrap()
            .insert("nvic-priority-bits".into(), toml::Value::Integer(16));
        let schema = parse_schema_toml(&toml::to_string(&table).unwrap()).unwrap();
        let issues = validate_schema(&schema).unwrap_err();
        assert!(issues.iter().any(|i| i.message.contains("nvic-priority-bits")));
    }

    #[test]
    fn load_not_found() {
        let result = load_schema_toml(Path::new("/nonexistent/chip.schema.toml"));
        assert!(matches!(result, Err(ChipError::NotFound { .. })));
    }

    #[test]
    fn discover_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let chips = dir.path().join("chips");
        std::fs::create_dir(&chips).unwrap();
        std::fs::write(chips.join("zeta.schema.toml"), "").unwrap();
        std::fs::write(chips.join("alpha.schema.toml"), "").unwrap();
        std::fs::write(chips.join("notes.txt"), "").unwrap();
        let found = discover_schemas(dir.path()).unwrap();
        let names: Vec<&str> = found.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
    }

    #[test]
    fn discover_without_chips_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(discover_schemas(dir.path()).unwrap().is_empty());
    }
}
