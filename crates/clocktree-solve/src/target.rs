//! Target specifications: what a board wants from its chip.
//!
//! A target names its chip, the clock goals the solver has to meet, which
//! oscillators to run, and the GPIOs and interrupts it uses. Targets are
//! usually kept as `targets/<name>.target.toml` in a project:
//!
//! ```toml
//! name = "blinky"
//! chip = "STM32H533RET6"
//!
//! [clock-goals]
//! CPU_CK = "250 MHz"
//! PLL1P_CK = "250 MHz"
//! USART2_BAUD = 115200
//! PLL2P_CK = "unused"
//!
//! [[gpios]]
//! name = "led"
//! pin = "A5"
//! mode = "output"
//! initial-level = false
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use clocktree_core::Key;

use crate::config::Tolerances;
use crate::error::{Result, TargetError};

/// A clock goal: a frequency in hertz, or an explicit statement that the
/// clock is not used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawGoal", into = "RawGoal")]
pub enum Goal {
    Hz(u64),
    Unused,
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RawGoal {
    Hz(u64),
    Text(String),
}

impl TryFrom<RawGoal> for Goal {
    type Error = String;

    fn try_from(raw: RawGoal) -> std::result::Result<Self, String> {
        match raw {
            RawGoal::Hz(hz) => Ok(Goal::Hz(hz)),
            RawGoal::Text(text) if text.trim().eq_ignore_ascii_case("unused") => Ok(Goal::Unused),
            RawGoal::Text(text) => parse_hz(&text).map(Goal::Hz).ok_or_else(|| {
                format!("`{text}` is not a frequency (try \"48 MHz\" or \"unused\")")
            }),
        }
    }
}

impl From<Goal> for RawGoal {
    fn from(goal: Goal) -> Self {
        match goal {
            Goal::Hz(hz) => RawGoal::Hz(hz),
            Goal::Unused => RawGoal::Text("unused".into()),
        }
    }
}

impl fmt::Display for Goal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Goal::Hz(hz) => write!(f, "{hz} Hz"),
            Goal::Unused => write!(f, "unused"),
        }
    }
}

/// Parse `"250 MHz"`, `"1.5kHz"`, `"115_200"` and the like into whole hertz.
pub fn parse_hz(text: &str) -> Option<u64> {
    let text = text.trim();
    let split = text
        .find(|c: char| c.is_ascii_alphabetic())
        .unwrap_or(text.len());
    let (number, unit) = text.split_at(split);
    let scale: u64 = match unit.trim().to_ascii_lowercase().as_str() {
        "" | "hz" => 1,
        "khz" => 1_000,
        "mhz" => 1_000_000,
        "ghz" => 1_000_000_000,
        _ => return None,
    };
    let number = number.trim().replace('_', "");
    let (whole, fraction) = number.split_once('.').unwrap_or((number.as_str(), ""));
    if whole.is_empty() && fraction.is_empty() {
        return None;
    }
    let whole: u64 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
    let mut hz = whole.checked_mul(scale)?;
    let mut place = scale;
    for c in fraction.chars() {
        let digit = u64::from(c.to_digit(10)?);
        place /= 10;
        if place == 0 && digit != 0 {
            return None;
        }
        hz = hz.checked_add(digit * place)?;
    }
    Some(hz)
}

/// Output driver speed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Speed {
    Low,
    Medium,
    High,
    VeryHigh,
}

impl Speed {
    /// Name used by the chip's speed mapping.
    pub fn symbol(self) -> &'static str {
        match self {
            Speed::Low => "LOW",
            Speed::Medium => "MEDIUM",
            Speed::High => "HIGH",
            Speed::VeryHigh => "VERY_HIGH",
        }
    }
}

/// Pull resistor configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Pull {
    #[serde(rename = "none")]
    Floating,
    Up,
    Down,
}

impl Pull {
    pub fn symbol(self) -> &'static str {
        match self {
            Pull::Floating => "NONE",
            Pull::Up => "UP",
            Pull::Down => "DOWN",
        }
    }
}

/// How a declared GPIO is used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "kebab-case")]
pub enum GpioMode {
    Input {
        pull: Pull,
    },
    Output {
        #[serde(rename = "initial-level")]
        initial_level: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        speed: Option<Speed>,
        #[serde(default, rename = "open-drain", skip_serializing_if = "Option::is_none")]
        open_drain: Option<bool>,
    },
    Alternate {
        function: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        speed: Option<Speed>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pull: Option<Pull>,
        #[serde(default, rename = "open-drain", skip_serializing_if = "Option::is_none")]
        open_drain: Option<bool>,
    },
    Analog,
    /// Claimed by the board but left at its reset configuration.
    Reserved,
}

impl GpioMode {
    /// Name used by the chip's mode mapping; `None` for reserved pins.
    pub fn symbol(&self) -> Option<&'static str> {
        match self {
            GpioMode::Input { .. } => Some("INPUT"),
            GpioMode::Output { .. } => Some("OUTPUT"),
            GpioMode::Alternate { .. } => Some("ALTERNATE"),
            GpioMode::Analog => Some("ANALOG"),
            GpioMode::Reserved => None,
        }
    }
}

/// A named GPIO. Without a pin the name is kept but nothing is configured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GpioDecl {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pin: Option<String>,
    #[serde(flatten)]
    pub mode: GpioMode,
}

impl GpioDecl {
    pub fn new(name: impl Into<String>, pin: Option<&str>, mode: GpioMode) -> Self {
        GpioDecl {
            name: name.into(),
            pin: pin.map(str::to_string),
            mode,
        }
    }
}

/// An interrupt the firmware handles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterruptDecl {
    /// Name from the chip's vector table, e.g. `TIM2` or `SysTick`.
    pub name: String,
    /// NVIC priority, lower is more urgent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<u8>,
}

/// Everything the solver needs to know about one target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TargetSpec {
    pub name: String,
    pub chip: String,
    #[serde(default)]
    pub clock_goals: BTreeMap<Key, Goal>,
    /// Oscillator enables by name (`HSI48 = true`); others keep the chip default.
    #[serde(default)]
    pub oscillators: BTreeMap<String, bool>,
    /// Source of the peripheral clock option, e.g. `"HSI_CK"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peripheral_clock: Option<String>,
    /// SysTick is driven by something else (an RTOS tick, say).
    #[serde(default)]
    pub external_time_base: bool,
    #[serde(default)]
    pub tolerances: Tolerances,
    #[serde(default)]
    pub gpios: Vec<GpioDecl>,
    #[serde(default)]
    pub interrupts: Vec<InterruptDecl>,
}

impl TargetSpec {
    pub fn new(name: impl Into<String>, chip: impl Into<String>) -> Self {
        TargetSpec {
            name: name.into(),
            chip: chip.into(),
            clock_goals: BTreeMap::new(),
            oscillators: BTreeMap::new(),
            peripheral_clock: None,
            external_time_base: false,
            tolerances: Tolerances::default(),
            gpios: Vec::new(),
            interrupts: Vec::new(),
        }
    }

    pub fn goal(mut self, key: impl Into<Key>, hz: u64) -> Self {
        self.clock_goals.insert(key.into(), Goal::Hz(hz));
        self
    }

    pub fn unused(mut self, key: impl Into<Key>) -> Self {
        self.clock_goals.insert(key.into(), Goal::Unused);
        self
    }

    pub fn oscillator(mut self, name: impl Into<String>, enabled: bool) -> Self {
        self.oscillators.insert(name.into(), enabled);
        self
    }

    pub fn peripheral_clock(mut self, source: impl Into<String>) -> Self {
        self.peripheral_clock = Some(source.into());
        self
    }

    pub fn gpio(mut self, decl: GpioDecl) -> Self {
        self.gpios.push(decl);
        self
    }

    pub fn interrupt(mut self, name: impl Into<String>, priority: Option<u8>) -> Self {
        self.interrupts.push(InterruptDecl {
            name: name.into(),
            priority,
        });
        self
    }
}

/// Load a target from a `.target.toml` file.
pub fn load_target_toml(path: &Path) -> Result<TargetSpec> {
    if !path.exists() {
        return Err(TargetError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let content = std::fs::read_to_string(path)?;
    parse_target_toml(&content)
}

pub fn parse_target_toml(toml_str: &str) -> Result<TargetSpec> {
    Ok(toml::from_str(toml_str)?)
}

pub fn target_to_toml(target: &TargetSpec) -> Result<String> {
    Ok(toml::to_string_pretty(target)?)
}

/// Find `targets/*.target.toml` under a project directory, sorted by name.
pub fn discover_targets(project_dir: &Path) -> Result<Vec<(String, PathBuf)>> {
    let dir = project_dir.join("targets");
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut found = Vec::new();
    for entry in std::fs::read_dir(&dir)? {
        let path = entry?.path();
        let stem = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.strip_suffix(".target.toml"))
            .map(str::to_string);
        if let Some(stem) = stem {
            found.push((stem, path));
        }
    }
    found.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(found)
}
