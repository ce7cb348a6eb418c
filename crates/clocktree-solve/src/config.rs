//! Solver configuration carried by a target.

use serde::{Deserialize, Serialize};

use clocktree_core::{Result, SolveError};

/// Relative error each approximate search may accept, as a fraction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Tolerances {
    pub i2c: f64,
    pub timer: f64,
    pub spi: f64,
    pub sdmmc: f64,
}

impl Default for Tolerances {
    fn default() -> Self {
        Tolerances {
            i2c: 0.01,
            timer: 0.001,
            spi: 0.05,
            sdmmc: 0.05,
        }
    }
}

impl Tolerances {
    /// Every tolerance must be a finite fraction in `[0, 1)`.
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("i2c", self.i2c),
            ("timer", self.timer),
            ("spi", self.spi),
            ("sdmmc", self.sdmmc),
        ];
        for (name, value) in fields {
            if !value.is_finite() || !(0.0..1.0).contains(&value) {
                return Err(SolveError::ConstraintViolation {
                    key: format!("tolerances.{name}"),
                    value: value.to_string(),
                    reason: "tolerance must be a fraction in [0, 1)".into(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let t = Tolerances::default();
        assert_eq!(t.i2c, 0.01);
        assert_eq!(t.timer, 0.001);
        assert!(t.validate().is_ok());
    }

    #[test]
    fn partial_table_keeps_other_defaults() {
        let t: Tolerances = toml::from_str("spi = 0.02").unwrap();
        assert_eq!(t.spi, 0.02);
        assert_eq!(t.sdmmc, 0.05);
    }

    #[test]
    fn rejects_out_of_range() {
        let t = Tolerances {
            i2c: 1.5,
            ..Tolerances::default()
        };
        let err = t.validate().unwrap_err();
        assert!(err.to_string().contains("tolerances.i2c"));
    }
}
