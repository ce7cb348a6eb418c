//! `clocktree chips`: chip listing and description.

use std::path::Path;

use anyhow::{bail, Result};
use clocktree_chips::parse::schema_to_toml;
use clocktree_core::schema::PllSourceMode;
use clocktree_core::{EntryKind, Schema};

use crate::manifest::resolve_schema;

/// List builtin chips and any schema files in the project.
pub fn list(project_dir: Option<&Path>) -> Result<()> {
    println!("Builtin chips:");
    println!();
    for (name, description) in clocktree_chips::builtin_chips() {
        println!("  {name:<20} {description}");
    }
    if let Some(dir) = project_dir {
        let files = clocktree_chips::discover_schemas(dir)?;
        if !files.is_empty() {
            println!();
            println!("Project chips:");
            println!();
            for (name, path) in files {
                println!("  {name:<20} {}", path.display());
            }
        }
    }
    println!();
    println!("Use 'clocktree chips describe <name>' for details.");
    Ok(())
}

/// Describe one chip, as a summary or as a TOML schema file.
pub fn describe(name: &str, project_dir: Option<&Path>, format: Option<&str>) -> Result<()> {
    let schema = resolve_schema(project_dir, name)?;
    match format {
        None | Some("text") => print!("{}", summary(&schema)),
        Some("toml") => print!("{}", schema_to_toml(&schema)?),
        Some(other) => bail!("unknown format '{other}' (expected text or toml)"),
    }
    Ok(())
}

fn summary(schema: &Schema) -> String {
    let topology = schema.topology();
    let mut out = String::new();
    let mut line = |text: String| {
        out.push_str(&text);
        out.push('\n');
    };

    line(format!("=== Chip: {} ===", schema.chip()));
    line(schema.description().to_string());
    line(String::new());

    line("--- Oscillators ---".into());
    for osc in &topology.oscillators {
        let reset = if osc.running_at_reset { " (running at reset)" } else { "" };
        line(format!("  {:<8} {} Hz{reset}", osc.name, osc.frequency_hz));
    }
    line(String::new());

    line("--- PLLs ---".into());
    let source = match topology.pll_source {
        PllSourceMode::Shared => "shared kernel source",
        PllSourceMode::PerUnit => "per-unit kernel source",
    };
    line(format!("  {} units, {source}", topology.plls.len()));
    for pll in &topology.plls {
        line(format!("  PLL{}: channels {}", pll.id, pll.channels.join(", ")));
    }
    line(String::new());

    line("--- Buses ---".into());
    let apbs: Vec<String> = topology.apbs.iter().map(|u| format!("APB{u}")).collect();
    line(format!("  {}", apbs.join(", ")));
    if topology.core_bus_divider {
        line("  AXI/AHB divider below the CPU clock".into());
    }
    line(String::new());

    line("--- Peripherals ---".into());
    for group in &topology.uxart_groups {
        line(format!("  {} selector: {}", group.name, group.members.join(", ")));
    }
    let units = |prefix: &str, ids: &[u8]| -> String {
        ids.iter().map(|u| format!("{prefix}{u}")).collect::<Vec<_>>().join(", ")
    };
    let timers: Vec<u8> = topology.timers.iter().map(|t| t.id).collect();
    for (label, text) in [
        ("I2C", units("I2C", &topology.i2cs)),
        ("Timers", units("TIM", &timers)),
        ("SPI", units("SPI", &topology.spis)),
        ("SDMMC", units("SDMMC", &topology.sdmmcs)),
    ] {
        if !text.is_empty() {
            line(format!("  {label:<7} {text}"));
        }
    }
    let ports: String = topology.gpio_ports.iter().collect();
    line(format!("  GPIO    ports {ports}"));
    line(format!(
        "  NVIC    {} interrupts, {} priority bits",
        topology.interrupts.len(),
        topology.nvic_priority_bits
    ));
    line(String::new());

    let settings = schema
        .entries()
        .filter(|(_, entry)| entry.kind == EntryKind::Setting)
        .count();
    line(format!("{} keys, {settings} writable settings", schema.len()));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use clocktree_chips::{stm32h533, stm32h7s3};

    #[test]
    fn summary_names_the_parts() {
        let schema = stm32h7s3::schema().unwrap();
        let text = summary(&schema);
        assert!(text.contains("=== Chip: STM32H7S3L8H6 ==="));
        assert!(text.contains("shared kernel source"));
        assert!(text.contains("UART234578 selector"));
    }

    #[test]
    fn describe_known_chip() {
        assert!(describe(stm32h533::CHIP, None, None).is_ok());
        assert!(describe(stm32h533::CHIP, None, Some("toml")).is_ok());
    }

    #[test]
    fn describe_unknown_chip_or_format() {
        assert!(describe("nonexistent", None, None).is_err());
        assert!(describe(stm32h533::CHIP, None, Some("yaml")).is_err());
    }
}
