//! Helpers shared by the search stages.

use clocktree_core::{Frequency, Literal, Result, SolveError, SolvingState, Subsystem};

/// Minimum-error tracker for the approximate searches.
///
/// Only a strictly smaller error replaces the current best, so among equally
/// good candidates the first one offered wins.
#[derive(Debug)]
pub struct Best<T> {
    best: Option<(f64, T)>,
}

impl<T> Default for Best<T> {
    fn default() -> Self {
        Best { best: None }
    }
}

impl<T> Best<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn offer(&mut self, error: f64, candidate: T) {
        if self.best.as_ref().map_or(true, |(current, _)| error < *current) {
            self.best = Some((error, candidate));
        }
    }

    pub fn error(&self) -> Option<f64> {
        self.best.as_ref().map(|(error, _)| *error)
    }

    /// Nothing can beat an exact match.
    pub fn is_exact(&self) -> bool {
        self.error() == Some(0.0)
    }

    pub fn into_inner(self) -> Option<(f64, T)> {
        self.best
    }

    /// The best candidate if it is within `tolerance`.
    ///
    /// No candidate at all is `SearchExhausted`; a best candidate that is too
    /// far off is `ToleranceExceeded`.
    pub fn within(
        self,
        tolerance: f64,
        subsystem: Subsystem,
        state: &SolvingState<'_>,
    ) -> Result<(f64, T)> {
        match self.best {
            None => Err(state.exhausted(subsystem)),
            Some((error, _)) if error > tolerance => Err(SolveError::ToleranceExceeded {
                subsystem,
                target: state.target().to_string(),
                achieved: error,
                allowed: tolerance,
            }),
            Some(best) => Ok(best),
        }
    }
}

/// `a / b` rounded to the nearest integer, halves away from zero.
pub fn rounded_ratio(a: Frequency, b: Frequency) -> Option<u64> {
    let top = a.numerator() as u128 * b.denominator() as u128;
    let bottom = a.denominator() as u128 * b.numerator() as u128;
    if bottom == 0 {
        return None;
    }
    u64::try_from((2 * top + bottom) / (2 * bottom)).ok()
}

/// The frequency of a candidate clock source, if it is running.
///
/// Sources are symbols naming a clock key. Undetermined, unused and 0 Hz
/// sources are not candidates.
pub fn source_frequency(state: &SolvingState<'_>, source: &Literal) -> Result<Option<Frequency>> {
    let Some(name) = source.as_symbol() else {
        return Ok(None);
    };
    Ok(state.frequency(name)?.filter(|f| !f.is_zero()))
}

/// The committed, non-zero goal of `key`.
pub fn goal(state: &SolvingState<'_>, key: &str) -> Result<Option<Frequency>> {
    Ok(state.frequency(key)?.filter(|f| !f.is_zero()))
}

/// Integer view of a domain element; enumerated dividers are never negative.
pub fn whole(literal: &Literal) -> Option<u64> {
    literal.as_int().and_then(|n| u64::try_from(n).ok())
}

/// A computed divider as a literal. Values past `i64::MAX` saturate and are
/// then rejected by any range constraint.
pub fn int(n: u64) -> Literal {
    Literal::Int(i64::try_from(n).unwrap_or(i64::MAX))
}

/// Commit `value` unless `key` already holds a value; then it has to agree.
///
/// Returns `false` when the constraint rejects the value or the existing
/// value differs.
pub fn settle(state: &mut SolvingState<'_>, key: &str, value: impl Into<Literal>) -> Result<bool> {
    let value = value.into();
    if let Some(existing) = state.committed(key)? {
        return Ok(existing.same_value(&value));
    }
    state.try_commit(key, value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_minimum_wins() {
        let mut best = Best::new();
        best.offer(0.5, "a");
        best.offer(0.1, "b");
        best.offer(0.1, "c");
        best.offer(0.3, "d");
        assert_eq!(best.into_inner(), Some((0.1, "b")));
    }

    #[test]
    fn exactness() {
        let mut best = Best::new();
        assert!(!best.is_exact());
        best.offer(0.0, ());
        assert!(best.is_exact());
    }

    #[test]
    fn rounding_halves_away_from_zero() {
        let f = Frequency::from_hz;
        assert_eq!(rounded_ratio(f(5), f(2)), Some(3));
        assert_eq!(rounded_ratio(f(7), f(3)), Some(2));
        assert_eq!(rounded_ratio(f(8), f(3)), Some(3));
        assert_eq!(rounded_ratio(f(1), f(0)), None);
        let third = Frequency::new(1, 3).unwrap();
        assert_eq!(rounded_ratio(f(1), third), Some(3));
    }
}
