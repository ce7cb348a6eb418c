//! Coalescing of field writes into register groups.

use clocktree_core::Location;

use crate::error::{EmitError, Result};
use crate::ops::{EmitOp, FieldWrite};

/// The writes of one emission step, grouped by register in first-appearance
/// order.
#[derive(Debug, Default)]
pub struct GroupedWrites {
    groups: Vec<(String, String, Vec<FieldWrite>)>,
}

impl GroupedWrites {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, location: &Location, value: u64) -> Result<()> {
        let index = match self.groups.iter().position(|(peripheral, register, _)| {
            *peripheral == location.peripheral && *register == location.register
        }) {
            Some(index) => index,
            None => {
                self.groups.push((
                    location.peripheral.clone(),
                    location.register.clone(),
                    Vec::new(),
                ));
                self.groups.len() - 1
            }
        };
        let fields = &mut self.groups[index].2;
        if fields.iter().any(|write| write.field == location.field) {
            return Err(EmitError::EmissionAmbiguity {
                peripheral: location.peripheral.clone(),
                register: location.register.clone(),
                field: location.field.clone(),
            });
        }
        fields.push(FieldWrite {
            field: location.field.clone(),
            value,
        });
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn into_ops(self) -> impl Iterator<Item = EmitOp> {
        self.groups
            .into_iter()
            .map(|(peripheral, register, fields)| EmitOp::ModifyGroup {
                peripheral,
                register,
                fields,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coalesces_in_first_appearance_order() {
        let mut writes = GroupedWrites::new();
        writes.push(&Location::new("RCC", "CR", "PLL1ON"), 1).unwrap();
        writes.push(&Location::new("RCC", "CFGR1", "SW"), 3).unwrap();
        writes.push(&Location::new("RCC", "CR", "PLL2ON"), 0).unwrap();

        let ops: Vec<_> = writes.into_ops().collect();
        assert_eq!(ops.len(), 2);
        match &ops[0] {
            EmitOp::ModifyGroup { register, fields, .. } => {
                assert_eq!(register, "CR");
                let names: Vec<_> = fields.iter().map(|w| w.field.as_str()).collect();
                assert_eq!(names, ["PLL1ON", "PLL2ON"]);
            }
            other => panic!("unexpected op: {other}"),
        }
    }

    #[test]
    fn same_field_twice_is_ambiguous() {
        let mut writes = GroupedWrites::new();
        let location = Location::new("GPIOA", "MODER", "MODE5");
        writes.push(&location, 1).unwrap();
        match writes.push(&location, 2).unwrap_err() {
            EmitError::EmissionAmbiguity { field, .. } => assert_eq!(field, "MODE5"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
