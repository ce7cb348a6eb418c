//! Per-target solving state with speculative overlays.
//!
//! The base layer holds pinned inputs and committed derivations. A search
//! stage opens an overlay with [`SolvingState::speculate`]; everything written
//! inside it is either merged into the layer below (the closure returned
//! `Ok(true)`) or discarded. Every key is single-assignment: once a value is
//! committed in any visible layer it can no longer be written.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::constraint::{Constraint, Domain};
use crate::error::{Result, SolveError, Subsystem};
use crate::frequency::Frequency;
use crate::schema::{EntryKind, Schema, SchemaEntry};
use crate::value::{Literal, Value};

/// Default bound on nested speculation.
pub const DEFAULT_MAX_DEPTH: usize = 16;

static UNDETERMINED: Value = Value::Undetermined;

/// How a slot got its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Origin {
    /// Fixed by the chip.
    Constant,
    /// Supplied by the target or the boot profile before search.
    Pinned,
    /// Chosen by a search stage.
    Derived,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Slot {
    pub value: Value,
    pub origin: Origin,
}

/// Mutable state of one target while it is being solved.
#[derive(Debug)]
pub struct SolvingState<'s> {
    schema: &'s Schema,
    target: String,
    base: BTreeMap<&'s str, Slot>,
    overlays: Vec<BTreeMap<&'s str, Value>>,
    max_depth: usize,
}

impl<'s> SolvingState<'s> {
    /// Fresh state for `target`, with the chip's constants already committed.
    pub fn new(schema: &'s Schema, target: impl Into<String>) -> Self {
        let base = schema
            .entries()
            .filter(|(_, entry)| entry.kind == EntryKind::Constant)
            .filter_map(|(key, entry)| {
                let value = entry.value.clone()?;
                Some((
                    key.as_str(),
                    Slot {
                        value: Value::Committed(value),
                        origin: Origin::Constant,
                    },
                ))
            })
            .collect();
        SolvingState {
            schema,
            target: target.into(),
            base,
            overlays: Vec::new(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn schema(&self) -> &'s Schema {
        self.schema
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Current speculation depth; 0 outside any overlay.
    pub fn depth(&self) -> usize {
        self.overlays.len()
    }

    pub fn resolve(&self, key: &str) -> Result<&'s str> {
        Ok(self.schema.resolve(key)?.as_str())
    }

    fn entry(&self, key: &str) -> Result<(&'s str, &'s SchemaEntry)> {
        let (canonical, entry) = self.schema.entry(key)?;
        Ok((canonical.as_str(), entry))
    }

    fn lookup(&self, canonical: &str) -> &Value {
        for overlay in self.overlays.iter().rev() {
            if let Some(value) = overlay.get(canonical) {
                return value;
            }
        }
        self.base
            .get(canonical)
            .map(|slot| &slot.value)
            .unwrap_or(&UNDETERMINED)
    }

    pub fn get(&self, key: &str) -> Result<&Value> {
        let canonical = self.resolve(key)?;
        Ok(self.lookup(canonical))
    }

    pub fn committed(&self, key: &str) -> Result<Option<&Literal>> {
        Ok(self.get(key)?.committed())
    }

    /// The committed frequency of `key`; `None` while undetermined or unused.
    pub fn frequency(&self, key: &str) -> Result<Option<Frequency>> {
        let canonical = self.resolve(key)?;
        match self.lookup(canonical) {
            Value::Committed(literal) => literal.as_frequency().map(Some).ok_or_else(|| {
                SolveError::ConstraintViolation {
                    key: canonical.to_string(),
                    value: literal.to_string(),
                    reason: "not a frequency".into(),
                }
            }),
            _ => Ok(None),
        }
    }

    pub fn constraint(&self, key: &str) -> Result<Option<&'s Constraint>> {
        let (_, entry) = self.entry(key)?;
        Ok(entry.constraint.as_ref())
    }

    /// Enumerate the legal values of `key`.
    ///
    /// The iterator borrows only the schema, so the state can be written while
    /// iterating.
    pub fn domain(&self, key: &str) -> Result<Domain<'s>> {
        let (canonical, entry) = self.entry(key)?;
        entry
            .constraint
            .as_ref()
            .and_then(Constraint::iter)
            .ok_or_else(|| SolveError::ConstraintViolation {
                key: canonical.to_string(),
                value: "-".into(),
                reason: "domain is not enumerable".into(),
            })
    }

    /// Whether `value` satisfies the constraint of `key`. Unconstrained keys admit anything.
    pub fn admits(&self, key: &str, value: &Literal) -> Result<bool> {
        Ok(self
            .constraint(key)?
            .map_or(true, |constraint| constraint.contains(value)))
    }

    fn write(&mut self, key: &str, value: Value, origin: Origin) -> Result<()> {
        let (canonical, entry) = self.entry(key)?;
        if matches!(entry.kind, EntryKind::Constant | EntryKind::Status) {
            return Err(SolveError::ConstraintViolation {
                key: canonical.to_string(),
                value: value.to_string(),
                reason: "key is read-only".into(),
            });
        }
        if let Value::Committed(literal) = &value {
            if let Some(constraint) = &entry.constraint {
                if !constraint.contains(literal) {
                    return Err(SolveError::ConstraintViolation {
                        key: canonical.to_string(),
                        value: literal.to_string(),
                        reason: format!("expected {constraint}"),
                    });
                }
            }
        }
        if self.lookup(canonical).is_committed() {
            return Err(SolveError::Reassignment {
                key: canonical.to_string(),
                target: self.target.clone(),
            });
        }
        log::trace!("{}: {canonical} = {value}", self.target);
        match self.overlays.last_mut() {
            Some(overlay) => {
                overlay.insert(canonical, value);
            }
            None => {
                self.base.insert(canonical, Slot { value, origin });
            }
        }
        Ok(())
    }

    /// Record a target-supplied or boot-profile value.
    pub fn pin(&mut self, key: &str, value: impl Into<Literal>) -> Result<()> {
        self.write(key, Value::Committed(value.into()), Origin::Pinned)
    }

    /// Record that the target explicitly does not use `key`.
    pub fn pin_unused(&mut self, key: &str) -> Result<()> {
        self.write(key, Value::Unused, Origin::Pinned)
    }

    /// Commit a derived value; fails if it violates the constraint.
    pub fn commit(&mut self, key: &str, value: impl Into<Literal>) -> Result<()> {
        self.write(key, Value::Committed(value.into()), Origin::Derived)
    }

    /// Commit a derived value if the constraint admits it.
    pub fn try_commit(&mut self, key: &str, value: impl Into<Literal>) -> Result<bool> {
        let value = value.into();
        if !self.admits(key, &value)? {
            return Ok(false);
        }
        self.commit(key, value)?;
        Ok(true)
    }

    pub fn mark_unused(&mut self, key: &str) -> Result<()> {
        self.write(key, Value::Unused, Origin::Derived)
    }

    /// Run `attempt` inside a fresh overlay.
    ///
    /// `Ok(true)` keeps the overlay's writes, `Ok(false)` and errors discard
    /// them. Overlays nest up to the configured depth.
    pub fn speculate<F>(&mut self, attempt: F) -> Result<bool>
    where
        F: FnOnce(&mut Self) -> Result<bool>,
    {
        if self.overlays.len() >= self.max_depth {
            return Err(SolveError::DepthExceeded {
                limit: self.max_depth,
            });
        }
        self.overlays.push(BTreeMap::new());
        let outcome = attempt(self);
        let overlay = self.overlays.pop().unwrap_or_default();
        if let Ok(true) = outcome {
            match self.overlays.last_mut() {
                Some(below) => below.extend(overlay),
                None => {
                    for (key, value) in overlay {
                        self.base.insert(
                            key,
                            Slot {
                                value,
                                origin: Origin::Derived,
                            },
                        );
                    }
                }
            }
        }
        outcome
    }

    /// `SearchExhausted` for `subsystem` on this state's chip and target.
    pub fn exhausted(&self, subsystem: Subsystem) -> SolveError {
        SolveError::SearchExhausted {
            subsystem,
            chip: self.schema.chip().to_string(),
            target: self.target.clone(),
        }
    }

    /// Freeze the base layer into a read-only result.
    pub fn freeze(self) -> FrozenState<'s> {
        FrozenState {
            schema: self.schema,
            target: self.target,
            slots: self.base,
        }
    }
}

/// The settings of a solved target. Read-only.
#[derive(Debug, Clone)]
pub struct FrozenState<'s> {
    schema: &'s Schema,
    target: String,
    slots: BTreeMap<&'s str, Slot>,
}

impl<'s> FrozenState<'s> {
    pub fn schema(&self) -> &'s Schema {
        self.schema
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn get(&self, key: &str) -> Result<&Value> {
        let canonical = self.schema.resolve(key)?;
        Ok(self
            .slots
            .get(canonical.as_str())
            .map(|slot| &slot.value)
            .unwrap_or(&UNDETERMINED))
    }

    pub fn committed(&self, key: &str) -> Result<Option<&Literal>> {
        Ok(self.get(key)?.committed())
    }

    /// Slots that hold a value, in key order.
    pub fn slots(&self) -> impl Iterator<Item = (&'s str, &Slot)> {
        self.slots.iter().map(|(key, slot)| (*key, slot))
    }

    /// Committed, non-zero frequencies and rates.
    pub fn frequencies(&self) -> BTreeMap<&'s str, Frequency> {
        self.slots()
            .filter(|(key, _)| {
                self.schema
                    .entry(key)
                    .is_ok_and(|(_, entry)| entry.kind.is_goal())
            })
            .filter_map(|(key, slot)| {
                let frequency = slot.value.committed()?.as_frequency()?;
                (!frequency.is_zero()).then_some((key, frequency))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::tests::tiny_schema;

    #[test]
    fn single_assignment() {
        let schema = tiny_schema();
        let mut state = SolvingState::new(&schema, "t");
        state.pin("CPU_CK", Literal::hz(250_000_000)).unwrap();
        let err = state.commit("CPU_CK", Literal::hz(200_000_000)).unwrap_err();
        assert!(matches!(err, SolveError::Reassignment { .. }));
    }

    #[test]
    fn aliases_write_the_shared_slot() {
        let schema = tiny_schema();
        let mut state = SolvingState::new(&schema, "t");
        state
            .commit("USART2_KERNEL_SOURCE", Literal::symbol("HSI_CK"))
            .unwrap();
        assert_eq!(
            state.committed("USART3_KERNEL_SOURCE").unwrap(),
            Some(&Literal::symbol("HSI_CK"))
        );
        assert!(state
            .commit("USART3_KERNEL_SOURCE", Literal::symbol("APB1_CK"))
            .is_err());
    }

    #[test]
    fn constraint_violation_and_try_commit() {
        let schema = tiny_schema();
        let mut state = SolvingState::new(&schema, "t");
        let err = state.pin("CPU_CK", Literal::hz(300_000_000)).unwrap_err();
        assert!(matches!(err, SolveError::ConstraintViolation { .. }));
        assert!(!state
            .try_commit("UXART_G_KERNEL_SOURCE", Literal::symbol("PLL1P_CK"))
            .unwrap());
        assert_eq!(state.get("UXART_G_KERNEL_SOURCE").unwrap(), &Value::Undetermined);
    }

    #[test]
    fn rejected_speculation_leaves_no_trace() {
        let schema = tiny_schema();
        let mut state = SolvingState::new(&schema, "t");
        let kept = state
            .speculate(|state| {
                state.commit("PLL1_ENABLE", true)?;
                assert_eq!(state.committed("PLL1_ENABLE")?, Some(&Literal::Bool(true)));
                Ok(false)
            })
            .unwrap();
        assert!(!kept);
        assert_eq!(state.get("PLL1_ENABLE").unwrap(), &Value::Undetermined);
        assert_eq!(state.depth(), 0);
    }

    #[test]
    fn accepted_nested_speculation_merges_down() {
        let schema = tiny_schema();
        let mut state = SolvingState::new(&schema, "t");
        let kept = state
            .speculate(|state| {
                let inner = state.speculate(|state| {
                    state.commit("PLL1_ENABLE", true)?;
                    Ok(true)
                })?;
                assert!(inner);
                assert_eq!(state.depth(), 1);
                state.commit("CPU_CK", Literal::hz(64_000_000))?;
                Ok(true)
            })
            .unwrap();
        assert!(kept);
        let frozen = state.freeze();
        assert_eq!(frozen.committed("PLL1_ENABLE").unwrap(), Some(&Literal::Bool(true)));
        let slot = frozen.slots().find(|(key, _)| *key == "CPU_CK").unwrap().1;
        assert_eq!(slot.origin, Origin::Derived);
    }

    #[test]
    fn overlay_cannot_rewrite_base() {
        let schema = tiny_schema();
        let mut state = SolvingState::new(&schema, "t");
        state.pin("PLL1_ENABLE", false).unwrap();
        let err = state
            .speculate(|state| {
                state.commit("PLL1_ENABLE", true)?;
                Ok(true)
            })
            .unwrap_err();
        assert!(matches!(err, SolveError::Reassignment { .. }));
        assert_eq!(state.committed("PLL1_ENABLE").unwrap(), Some(&Literal::Bool(false)));
    }

    #[test]
    fn depth_is_bounded() {
        let schema = tiny_schema();
        let mut state = SolvingState::new(&schema, "t").with_max_depth(1);
        let err = state
            .speculate(|state| state.speculate(|_| Ok(true)))
            .unwrap_err();
        assert!(matches!(err, SolveError::DepthExceeded { limit: 1 }));
    }

    #[test]
    fn domain_of_real_range_is_an_error() {
        let schema = tiny_schema();
        let state = SolvingState::new(&schema, "t");
        assert!(state.domain("CPU_CK").is_err());
        assert_eq!(state.domain("PLL1_ENABLE").unwrap().count(), 2);
    }

    #[test]
    fn frozen_frequencies_skip_zero_and_settings() {
        let schema = tiny_schema();
        let mut state = SolvingState::new(&schema, "t");
        state.pin("CPU_CK", Literal::hz(0)).unwrap();
        state.pin("PLL1_ENABLE", true).unwrap();
        assert!(state.freeze().frequencies().is_empty());
    }
}
