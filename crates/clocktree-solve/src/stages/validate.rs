use std::collections::BTreeSet;

use clocktree_core::{key, Literal, Result, SolveError, SolvingState};

use crate::gpio::{self, Declarations};
use crate::search::goal;
use crate::target::{Goal, TargetSpec};

/// Check the target against the schema and pin its goals and declarations.
///
/// Nothing is searched here; every error is about the target itself.
pub fn validate_target(state: &mut SolvingState<'_>, target: &TargetSpec) -> Result<Declarations> {
    let schema = state.schema();
    if !schema.chip().eq_ignore_ascii_case(&target.chip) {
        return Err(SolveError::ChipMismatch {
            target: target.name.clone(),
            expected: target.chip.clone(),
            found: schema.chip().to_string(),
        });
    }
    target.tolerances.validate()?;

    let mut seen = BTreeSet::new();
    for (given, goal) in &target.clock_goals {
        let (canonical, entry) = schema.entry(given)?;
        if !seen.insert(canonical.as_str()) {
            return Err(SolveError::DuplicateDeclaration {
                kind: "clock goal",
                name: canonical.clone(),
            });
        }
        if !entry.kind.is_goal() {
            return Err(SolveError::ConstraintViolation {
                key: canonical.clone(),
                value: goal.to_string(),
                reason: "only frequencies and rates can be goals".into(),
            });
        }
        match *goal {
            Goal::Hz(0) => {
                return Err(SolveError::ConstraintViolation {
                    key: canonical.clone(),
                    value: goal.to_string(),
                    reason: "a goal must be above 0 Hz; use \"unused\" instead".into(),
                })
            }
            Goal::Hz(hz) => state.pin(canonical, Literal::hz(hz))?,
            Goal::Unused => state.pin_unused(canonical)?,
        }
    }

    let declarations = gpio::normalize(state, target)?;

    if target.external_time_base
        && schema.contains(key::SYSTICK_CK)
        && goal(state, key::SYSTICK_CK)?.is_some()
    {
        return Err(SolveError::ResourceConflict {
            resource: "SysTick".into(),
            detail: format!(
                "target `{}` uses an external time base but also sets a {} goal",
                target.name,
                key::SYSTICK_CK
            ),
        });
    }

    Ok(declarations)
}
