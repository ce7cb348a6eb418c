//! Error types for schema lookup and clock-tree solving.

use std::fmt;

/// The part of the solver an error is attributed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Subsystem {
    /// Target validation before any search.
    Validation,
    /// Fixed per-chip boot settings.
    BootProfile,
    /// Oscillator enables and the peripheral clock option.
    Oscillators,
    /// The PLL family as a whole (shared kernel source).
    Plls,
    /// A single PLL unit.
    Pll(u8),
    /// System clock generation unit.
    Scgu,
    /// SysTick timer.
    SysTick,
    /// A shared-selector UART group, by group name.
    Uxart(String),
    /// An I2C unit.
    I2c(u8),
    /// The general purpose timers.
    Timers,
    /// A single timer.
    Timer(u8),
    /// An SPI unit.
    Spi(u8),
    /// An SDMMC unit.
    Sdmmc(u8),
    /// GPIO declarations.
    Gpio,
    /// Interrupt declarations.
    Interrupts,
}

impl fmt::Display for Subsystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Subsystem::Validation => write!(f, "validation"),
            Subsystem::BootProfile => write!(f, "boot profile"),
            Subsystem::Oscillators => write!(f, "oscillators"),
            Subsystem::Plls => write!(f, "PLLs"),
            Subsystem::Pll(unit) => write!(f, "PLL{unit}"),
            Subsystem::Scgu => write!(f, "SCGU"),
            Subsystem::SysTick => write!(f, "SysTick"),
            Subsystem::Uxart(group) => write!(f, "UXART group {group}"),
            Subsystem::I2c(unit) => write!(f, "I2C{unit}"),
            Subsystem::Timers => write!(f, "timers"),
            Subsystem::Timer(unit) => write!(f, "TIM{unit}"),
            Subsystem::Spi(unit) => write!(f, "SPI{unit}"),
            Subsystem::Sdmmc(unit) => write!(f, "SDMMC{unit}"),
            Subsystem::Gpio => write!(f, "GPIO"),
            Subsystem::Interrupts => write!(f, "interrupts"),
        }
    }
}

/// Errors that can occur while resolving keys or solving a target.
#[derive(Debug, thiserror::Error)]
pub enum SolveError {
    /// A key (or alias) is not present in the chip's schema.
    #[error("unknown key `{key}` for {chip}{}", format_suggestions(suggestions))]
    UnknownKey {
        /// The key as written.
        key: String,
        /// The chip whose schema was searched.
        chip: String,
        /// Nearest existing keys, closest first.
        suggestions: Vec<String>,
    },

    /// A value lies outside the key's constraint or has the wrong type.
    #[error("value {value} is not valid for `{key}`: {reason}")]
    ConstraintViolation {
        /// The canonical key.
        key: String,
        /// The rejected value, rendered.
        value: String,
        /// What went wrong.
        reason: String,
    },

    /// A key that already holds a committed value was written again.
    #[error("`{key}` is already committed for target `{target}`")]
    Reassignment {
        /// The canonical key.
        key: String,
        /// The target being solved.
        target: String,
    },

    /// A search stage tried every candidate without success.
    #[error("no valid configuration for {subsystem} on {chip} (target `{target}`)")]
    SearchExhausted {
        /// The failing subsystem.
        subsystem: Subsystem,
        /// The chip being solved for.
        chip: String,
        /// The target being solved.
        target: String,
    },

    /// The best candidate of an approximate search is still too far off.
    #[error(
        "best configuration for {subsystem} misses its goal by {:.4}% (allowed {:.4}%, target `{target}`)",
        achieved * 100.0,
        allowed * 100.0
    )]
    ToleranceExceeded {
        /// The failing subsystem.
        subsystem: Subsystem,
        /// The target being solved.
        target: String,
        /// Smallest relative error found.
        achieved: f64,
        /// Configured relative tolerance.
        allowed: f64,
    },

    /// A pin, name, or interrupt was declared more than once.
    #[error("duplicate {kind} `{name}`")]
    DuplicateDeclaration {
        /// What kind of declaration was duplicated.
        kind: &'static str,
        /// The duplicated name.
        name: String,
    },

    /// Two parts of the target want the same hardware resource.
    #[error("resource conflict on {resource}: {detail}")]
    ResourceConflict {
        /// The contested resource.
        resource: String,
        /// Description of the conflict.
        detail: String,
    },

    /// A stage needs a goal the target does not provide.
    #[error("{subsystem} requires a goal for `{key}`")]
    MissingGoal {
        /// The key that needs a goal.
        key: String,
        /// The subsystem asking for it.
        subsystem: Subsystem,
    },

    /// A GPIO or interrupt declaration is malformed.
    #[error("invalid declaration `{name}`: {detail}")]
    InvalidDeclaration {
        /// The declaration name.
        name: String,
        /// What is wrong with it.
        detail: String,
    },

    /// A target was written for a different chip than the schema provided.
    #[error("target `{target}` is for {expected}, but the schema describes {found}")]
    ChipMismatch {
        /// The target name.
        target: String,
        /// Chip named by the target.
        expected: String,
        /// Chip described by the schema.
        found: String,
    },

    /// The pin has no alternate function with this name.
    #[error("pin {pin} has no alternate function `{function}`{}", format_suggestions(suggestions))]
    UnknownAlternateFunction {
        /// The pin, e.g. `A5`.
        pin: String,
        /// The requested function name.
        function: String,
        /// Functions that are available on the pin.
        suggestions: Vec<String>,
    },

    /// Speculative overlays were nested deeper than the configured limit.
    #[error("speculation depth limit of {limit} exceeded")]
    DepthExceeded {
        /// The configured limit.
        limit: usize,
    },
}

fn format_suggestions(suggestions: &[String]) -> String {
    if suggestions.is_empty() {
        String::new()
    } else {
        format!(" (did you mean {}?)", suggestions.join(", "))
    }
}

/// Result type for solving operations.
pub type Result<T> = std::result::Result<T, SolveError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_key_lists_suggestions() {
        let err = SolveError::UnknownKey {
            key: "PLL1_FOOBAR".into(),
            chip: "STM32H533RET6".into(),
            suggestions: vec!["PLL1_ENABLE".into(), "PLL1_READY".into()],
        };
        assert_eq!(
            err.to_string(),
            "unknown key `PLL1_FOOBAR` for STM32H533RET6 (did you mean PLL1_ENABLE, PLL1_READY?)"
        );
    }

    #[test]
    fn tolerance_message_in_percent() {
        let err = SolveError::ToleranceExceeded {
            subsystem: Subsystem::I2c(1),
            target: "board".into(),
            achieved: 0.0588,
            allowed: 0.01,
        };
        let text = err.to_string();
        assert!(text.contains("I2C1"));
        assert!(text.contains("5.8800%"));
        assert!(text.contains("1.0000%"));
    }
}
