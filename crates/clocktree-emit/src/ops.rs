//! The emit stream.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use clocktree_core::Frequency;

/// Prefix of the exported frequency constants.
pub const FREQUENCY_PREFIX: &str = "CLOCK_TREE_FREQUENCY_OF_";

/// One field of a register write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldWrite {
    pub field: String,
    pub value: u64,
}

/// Value of a generated constant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConstantValue {
    Unsigned(u64),
    Symbol(String),
}

impl fmt::Display for ConstantValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstantValue::Unsigned(n) => write!(f, "{n}"),
            ConstantValue::Symbol(s) => write!(f, "{s}"),
        }
    }
}

/// A single operation of the boot sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "kebab-case")]
pub enum EmitOp {
    /// Read-modify-write of several fields of one register.
    ModifyGroup {
        peripheral: String,
        register: String,
        fields: Vec<FieldWrite>,
    },
    /// Busy-wait until a field reads back `expected`.
    SpinWait {
        peripheral: String,
        register: String,
        field: String,
        expected: u64,
    },
    /// A named constant for the firmware.
    DefineConstant { name: String, value: ConstantValue },
}

impl fmt::Display for EmitOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmitOp::ModifyGroup {
                peripheral,
                register,
                fields,
            } => {
                write!(f, "modify {peripheral}.{register}:")?;
                for (i, write) in fields.iter().enumerate() {
                    let sep = if i == 0 { " " } else { ", " };
                    write!(f, "{sep}{}={:#x}", write.field, write.value)?;
                }
                Ok(())
            }
            EmitOp::SpinWait {
                peripheral,
                register,
                field,
                expected,
            } => write!(f, "wait   {peripheral}.{register}.{field} == {expected:#x}"),
            EmitOp::DefineConstant { name, value } => write!(f, "define {name} = {value}"),
        }
    }
}

/// Non-fatal findings of an emission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum EmitWarning {
    /// A committed value that no emission step consumed.
    UnusedCommittedValue { key: String },
}

impl fmt::Display for EmitWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmitWarning::UnusedCommittedValue { key } => {
                write!(f, "committed value `{key}` was never emitted")
            }
        }
    }
}

/// Everything emitted for one target.
#[derive(Debug, Clone, Serialize)]
pub struct Emission {
    pub target: String,
    pub chip: String,
    pub ops: Vec<EmitOp>,
    /// Resolved non-zero frequencies, by key.
    pub frequencies: BTreeMap<String, Frequency>,
    pub warnings: Vec<EmitWarning>,
}

impl Emission {
    /// `CLOCK_TREE_FREQUENCY_OF_<key>` constants in key order.
    pub fn frequency_constants(&self) -> Vec<(String, Frequency)> {
        self.frequencies
            .iter()
            .map(|(key, frequency)| (format!("{FREQUENCY_PREFIX}{key}"), *frequency))
            .collect()
    }

    pub fn writes(&self) -> usize {
        self.ops
            .iter()
            .filter(|op| matches!(op, EmitOp::ModifyGroup { .. }))
            .count()
    }
}

impl fmt::Display for Emission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Emission: {} ({}) ===", self.target, self.chip)?;
        for op in &self.ops {
            writeln!(f, "{op}")?;
        }
        if !self.frequencies.is_empty() {
            writeln!(f)?;
            for (name, frequency) in self.frequency_constants() {
                writeln!(f, "{name} = {frequency}")?;
            }
        }
        for warning in &self.warnings {
            writeln!(f, "warning: {warning}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listing_format() {
        let op = EmitOp::ModifyGroup {
            peripheral: "RCC".into(),
            register: "CR".into(),
            fields: vec![
                FieldWrite {
                    field: "PLL1ON".into(),
                    value: 1,
                },
                FieldWrite {
                    field: "PLL2ON".into(),
                    value: 0,
                },
            ],
        };
        assert_eq!(op.to_string(), "modify RCC.CR: PLL1ON=0x1, PLL2ON=0x0");

        let wait = EmitOp::SpinWait {
            peripheral: "RCC".into(),
            register: "CR".into(),
            field: "PLL1RDY".into(),
            expected: 1,
        };
        assert_eq!(wait.to_string(), "wait   RCC.CR.PLL1RDY == 0x1");
    }

    #[test]
    fn json_is_tagged() {
        let op = EmitOp::DefineConstant {
            name: "GPIO_LED_PORT".into(),
            value: ConstantValue::Symbol("GPIOA".into()),
        };
        let json = serde_json::to_value(&op).unwrap();
        assert_eq!(json["op"], "define-constant");
        assert_eq!(json["value"]["symbol"], "GPIOA");
    }

    #[test]
    fn frequency_constant_names() {
        let emission = Emission {
            target: "t".into(),
            chip: "c".into(),
            ops: Vec::new(),
            frequencies: BTreeMap::from([("CPU_CK".to_string(), Frequency::from_hz(64_000_000))]),
            warnings: Vec::new(),
        };
        assert_eq!(
            emission.frequency_constants(),
            vec![(
                "CLOCK_TREE_FREQUENCY_OF_CPU_CK".to_string(),
                Frequency::from_hz(64_000_000)
            )]
        );
    }
}
