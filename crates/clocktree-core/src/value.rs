//! Literal values and the three-way slot value.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::frequency::Frequency;

/// A concrete value a key can hold.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Literal {
    Bool(bool),
    Int(i64),
    Freq(Frequency),
    /// A symbolic name, usually the key of a clock (`"HSI_CK"`) or a mode name.
    Symbol(String),
    /// A half-open frequency band `[lo, hi)` in hertz.
    Band { lo: u64, hi: u64 },
}

impl Literal {
    pub fn symbol(name: impl Into<String>) -> Self {
        Literal::Symbol(name.into())
    }

    pub fn hz(hz: u64) -> Self {
        Literal::Freq(Frequency::from_hz(hz))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Literal::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Integer view. Whole-hertz frequencies count as integers.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Literal::Int(n) => Some(*n),
            Literal::Freq(f) => f.as_hz().and_then(|hz| i64::try_from(hz).ok()),
            _ => None,
        }
    }

    /// Frequency view. Non-negative integers count as whole hertz.
    pub fn as_frequency(&self) -> Option<Frequency> {
        match self {
            Literal::Freq(f) => Some(*f),
            Literal::Int(n) => u64::try_from(*n).ok().map(Frequency::from_hz),
            _ => None,
        }
    }

    pub fn as_symbol(&self) -> Option<&str> {
        match self {
            Literal::Symbol(s) => Some(s),
            _ => None,
        }
    }

    /// Whether `frequency` falls in this band (`lo <= f < hi`).
    pub fn band_contains(&self, frequency: Frequency) -> bool {
        match self {
            Literal::Band { lo, hi } => {
                Frequency::from_hz(*lo) <= frequency && frequency < Frequency::from_hz(*hi)
            }
            _ => false,
        }
    }

    /// Value equality that treats `Int(n)` and a whole `Freq(n)` as equal.
    pub fn same_value(&self, other: &Literal) -> bool {
        match (self, other) {
            (Literal::Int(_), Literal::Freq(_)) | (Literal::Freq(_), Literal::Int(_)) => {
                self.as_frequency().is_some() && self.as_frequency() == other.as_frequency()
            }
            _ => self == other,
        }
    }

    /// The raw register bits of a value that needs no mapping table.
    pub fn raw_bits(&self) -> Option<u64> {
        match self {
            Literal::Bool(b) => Some(u64::from(*b)),
            Literal::Int(n) => u64::try_from(*n).ok(),
            Literal::Freq(f) => f.as_hz(),
            Literal::Symbol(_) | Literal::Band { .. } => None,
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Bool(b) => write!(f, "{b}"),
            Literal::Int(n) => write!(f, "{n}"),
            Literal::Freq(freq) => write!(f, "{freq}"),
            Literal::Symbol(s) => write!(f, "{s}"),
            Literal::Band { lo, hi } => write!(f, "[{lo} Hz, {hi} Hz)"),
        }
    }
}

impl From<bool> for Literal {
    fn from(b: bool) -> Self {
        Literal::Bool(b)
    }
}

impl From<i64> for Literal {
    fn from(n: i64) -> Self {
        Literal::Int(n)
    }
}

impl From<Frequency> for Literal {
    fn from(f: Frequency) -> Self {
        Literal::Freq(f)
    }
}

/// The state of one key during and after solving.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Value {
    /// Nothing decided yet.
    #[default]
    Undetermined,
    /// Explicitly not used; the emitter skips it.
    Unused,
    Committed(Literal),
}

impl Value {
    pub fn committed(&self) -> Option<&Literal> {
        match self {
            Value::Committed(literal) => Some(literal),
            _ => None,
        }
    }

    pub fn is_committed(&self) -> bool {
        matches!(self, Value::Committed(_))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undetermined => write!(f, "undetermined"),
            Value::Unused => write!(f, "unused"),
            Value::Committed(literal) => write!(f, "{literal}"),
        }
    }
}
