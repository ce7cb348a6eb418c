//! Value-domain constraints attached to schema entries.

use std::fmt;
use std::ops::RangeInclusive;
use std::slice;

use serde::{Deserialize, Serialize};

use crate::frequency::Frequency;
use crate::value::Literal;

/// One symbolic name of a [`Constraint::Mapping`] and its register encoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingEntry {
    pub name: Literal,
    pub code: u64,
}

impl MappingEntry {
    pub fn new(name: impl Into<Literal>, code: u64) -> Self {
        MappingEntry {
            name: name.into(),
            code,
        }
    }
}

/// The legal values of a key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Constraint {
    /// An explicit list, iterated in declaration order.
    Choices(Vec<Literal>),
    /// Integers from `min` to `max` inclusive, iterated ascending.
    IntRange { min: i64, max: i64 },
    /// Frequencies between `min` and `max` hertz inclusive. Not enumerable.
    RealRange { min: u64, max: u64 },
    /// Symbolic names with their final register encodings, in declaration order.
    Mapping(Vec<MappingEntry>),
}

impl Constraint {
    /// The boolean choice `[false, true]`.
    pub fn flag() -> Self {
        Constraint::Choices(vec![Literal::Bool(false), Literal::Bool(true)])
    }

    pub fn int_range(min: i64, max: i64) -> Self {
        Constraint::IntRange { min, max }
    }

    pub fn real_range(min: u64, max: u64) -> Self {
        Constraint::RealRange { min, max }
    }

    /// Build a mapping from `(name, code)` pairs.
    pub fn mapping<L: Into<Literal>>(entries: impl IntoIterator<Item = (L, u64)>) -> Self {
        Constraint::Mapping(
            entries
                .into_iter()
                .map(|(name, code)| MappingEntry::new(name, code))
                .collect(),
        )
    }

    /// A mapping whose names are clock keys.
    pub fn sources<'a>(entries: impl IntoIterator<Item = (&'a str, u64)>) -> Self {
        Self::mapping(
            entries
                .into_iter()
                .map(|(name, code)| (Literal::symbol(name), code)),
        )
    }

    pub fn contains(&self, value: &Literal) -> bool {
        match self {
            Constraint::Choices(choices) => choices.iter().any(|c| c.same_value(value)),
            Constraint::IntRange { min, max } => value
                .as_int()
                .is_some_and(|n| (*min..=*max).contains(&n)),
            Constraint::RealRange { min, max } => value.as_frequency().is_some_and(|f| {
                Frequency::from_hz(*min) <= f && f <= Frequency::from_hz(*max)
            }),
            Constraint::Mapping(entries) => entries.iter().any(|e| e.name.same_value(value)),
        }
    }

    /// Enumerate the domain. `None` for [`Constraint::RealRange`].
    pub fn iter(&self) -> Option<Domain<'_>> {
        match self {
            Constraint::Choices(choices) => Some(Domain::List(choices.iter())),
            Constraint::IntRange { min, max } => Some(Domain::Range(*min..=*max)),
            Constraint::RealRange { .. } => None,
            Constraint::Mapping(entries) => Some(Domain::Mapping(entries.iter())),
        }
    }

    /// Register encoding of a mapped name. `None` for other constraint kinds.
    pub fn encode(&self, value: &Literal) -> Option<u64> {
        match self {
            Constraint::Mapping(entries) => entries
                .iter()
                .find(|e| e.name.same_value(value))
                .map(|e| e.code),
            _ => None,
        }
    }

    /// Number of enumerable values.
    pub fn len(&self) -> Option<u64> {
        match self {
            Constraint::Choices(choices) => Some(choices.len() as u64),
            Constraint::IntRange { min, max } => {
                Some(max.saturating_sub(*min).saturating_add(1).max(0) as u64)
            }
            Constraint::RealRange { .. } => None,
            Constraint::Mapping(entries) => Some(entries.len() as u64),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == Some(0)
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constraint::Choices(choices) => {
                let items: Vec<String> = choices.iter().map(|c| c.to_string()).collect();
                write!(f, "one of [{}]", items.join(", "))
            }
            Constraint::IntRange { min, max } => write!(f, "integer in {min}..={max}"),
            Constraint::RealRange { min, max } => write!(
                f,
                "frequency in {}..={}",
                Frequency::from_hz(*min),
                Frequency::from_hz(*max)
            ),
            Constraint::Mapping(entries) => {
                let items: Vec<String> = entries
                    .iter()
                    .map(|e| format!("{} => {:#b}", e.name, e.code))
                    .collect();
                write!(f, "mapping {{{}}}", items.join(", "))
            }
        }
    }
}

/// Iterator over an enumerable constraint.
#[derive(Debug, Clone)]
pub enum Domain<'a> {
    List(slice::Iter<'a, Literal>),
    Range(RangeInclusive<i64>),
    Mapping(slice::Iter<'a, MappingEntry>),
}

impl Iterator for Domain<'_> {
    type Item = Literal;

    fn next(&mut self) -> Option<Literal> {
        match self {
            Domain::List(iter) => iter.next().cloned(),
            Domain::Range(range) => range.next().map(Literal::Int),
            Domain::Mapping(iter) => iter.next().map(|e| e.name.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cpu_dividers() -> Constraint {
        Constraint::mapping([
            (1i64, 0b0000),
            (2, 0b1000),
            (4, 0b1001),
            (8, 0b1010),
            (16, 0b1011),
            (64, 0b1100),
        ])
    }

    #[test]
    fn choices_iterate_in_declaration_order() {
        let c = Constraint::Choices(vec![Literal::Bool(true), Literal::Bool(false)]);
        let values: Vec<Literal> = c.iter().unwrap().collect();
        assert_eq!(values, vec![Literal::Bool(true), Literal::Bool(false)]);
        assert!(c.contains(&Literal::Bool(false)));
        assert!(!c.contains(&Literal::Int(0)));
    }

    #[test]
    fn int_range_is_inclusive_and_ascending() {
        let c = Constraint::int_range(1, 4);
        let values: Vec<i64> = c.iter().unwrap().filter_map(|l| l.as_int()).collect();
        assert_eq!(values, vec![1, 2, 3, 4]);
        assert!(c.contains(&Literal::Int(4)));
        assert!(!c.contains(&Literal::Int(0)));
        assert!(!c.contains(&Literal::Int(5)));
        assert_eq!(c.len(), Some(4));
    }

    #[test]
    fn real_range_membership_only() {
        let vco = Constraint::real_range(128_000_000, 560_000_000);
        assert!(vco.iter().is_none());
        assert!(vco.contains(&Literal::hz(128_000_000)));
        assert!(vco.contains(&Literal::hz(560_000_000)));
        assert!(!vco.contains(&Literal::hz(560_000_001)));
        let fractional = Frequency::new(383_999_999 * 3 + 1, 3).unwrap();
        assert!(vco.contains(&Literal::Freq(fractional)));
    }

    #[test]
    fn mapping_encodes_and_skips_gaps() {
        let c = cpu_dividers();
        assert_eq!(c.encode(&Literal::Int(4)), Some(0b1001));
        assert!(!c.contains(&Literal::Int(32)));
        assert_eq!(c.encode(&Literal::Int(32)), None);
        let names: Vec<i64> = c.iter().unwrap().filter_map(|l| l.as_int()).collect();
        assert_eq!(names, vec![1, 2, 4, 8, 16, 64]);
    }

    #[test]
    fn source_mapping_by_symbol() {
        let c = Constraint::sources([("HSI_CK", 0), ("CSI_CK", 1), ("PLL1P_CK", 3)]);
        assert_eq!(c.encode(&Literal::symbol("PLL1P_CK")), Some(3));
        assert!(!c.contains(&Literal::symbol("HSE_CK")));
    }
}
