//! Content fingerprint of an emit stream.
//!
//! The fingerprint covers the ordered operations and the exported frequencies
//! but not the target name, so two targets that boot identically share it.

use std::collections::BTreeMap;

use serde::Serialize;
use sha2::{Digest, Sha256};

use clocktree_core::Frequency;

use crate::error::Result;
use crate::ops::{EmitOp, Emission};

/// A 32-byte SHA-256 digest.
pub type Fingerprint = [u8; 32];

#[derive(Serialize)]
struct Fingerprinted<'a> {
    ops: &'a [EmitOp],
    frequencies: &'a BTreeMap<String, Frequency>,
}

pub fn fingerprint(emission: &Emission) -> Result<Fingerprint> {
    let json = serde_json::to_vec(&Fingerprinted {
        ops: &emission.ops,
        frequencies: &emission.frequencies,
    })?;
    let mut hasher = Sha256::new();
    hasher.update(&json);
    Ok(hasher.finalize().into())
}

/// Lowercase hex form of a fingerprint.
pub fn fingerprint_hex(fingerprint: &Fingerprint) -> String {
    fingerprint.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clocktree_chips::stm32h533;
    use clocktree_solve::{solve, TargetSpec};

    fn target(name: &str, cpu: u64) -> TargetSpec {
        TargetSpec::new(name, stm32h533::CHIP)
            .goal("CPU_CK", cpu)
            .goal("APB1_CK", cpu)
            .goal("APB2_CK", cpu)
            .goal("APB3_CK", cpu)
    }

    fn fingerprint_of(target: &TargetSpec) -> Fingerprint {
        let schema = stm32h533::schema().unwrap();
        let solution = solve(&schema, target).unwrap();
        fingerprint(&crate::emit(&solution).unwrap()).unwrap()
    }

    #[test]
    fn repeated_runs_match() {
        let first = fingerprint_of(&target("a", 32_000_000));
        let second = fingerprint_of(&target("b", 32_000_000));
        assert_eq!(first, second);
        assert_eq!(fingerprint_hex(&first).len(), 64);
    }

    #[test]
    fn different_clocks_differ() {
        assert_ne!(
            fingerprint_of(&target("a", 32_000_000)),
            fingerprint_of(&target("a", 16_000_000))
        );
    }
}
