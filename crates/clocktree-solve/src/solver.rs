//! Solver orchestration.

use std::fmt;
use std::time::Instant;

use serde::Serialize;

use clocktree_core::{FrozenState, Origin, Result, Schema, SolvingState};

use crate::gpio::Declarations;
use crate::stages;
use crate::target::TargetSpec;

/// The solved settings of one target, ready for emission.
#[derive(Debug, Clone)]
pub struct Solution<'s> {
    pub settings: FrozenState<'s>,
    pub declarations: Declarations,
    pub report: SolveReport,
}

/// Summary of a solver run.
#[derive(Debug, Clone, Serialize)]
pub struct SolveReport {
    pub target: String,
    pub chip: String,
    pub duration_ms: u64,
    /// Values fixed by the chip.
    pub constants: usize,
    /// Values supplied by the target and the boot profile.
    pub pinned: usize,
    /// Values chosen by the search stages.
    pub derived: usize,
    pub gpios: usize,
    pub interrupts: usize,
}

impl fmt::Display for SolveReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Solve Report ===")?;
        writeln!(f, "Target: {} ({})", self.target, self.chip)?;
        writeln!(f, "Duration: {} ms", self.duration_ms)?;
        writeln!(
            f,
            "  Settings: {} constant, {} pinned, {} derived",
            self.constants, self.pinned, self.derived
        )?;
        write!(
            f,
            "  Declarations: {} GPIOs, {} interrupts",
            self.gpios, self.interrupts
        )
    }
}

/// Solve one target against a chip schema:
/// validation -> boot profile -> oscillators -> PLLs -> SCGU -> SysTick ->
/// UXART groups -> I2C -> timers -> SPI -> SDMMC.
///
/// The first failing stage aborts the run; its error names the subsystem.
pub fn solve<'s>(schema: &'s Schema, target: &TargetSpec) -> Result<Solution<'s>> {
    let start = Instant::now();
    let mut state = SolvingState::new(schema, target.name.as_str());

    // Stage 0: Target validation, GPIO and interrupt normalization
    let declarations = stages::validate_target(&mut state, target)?;

    // Stage 1: Fixed boot settings
    stages::apply_boot_profile(&mut state)?;

    // Stage 2: Oscillators and the peripheral clock option
    stages::configure_oscillators(&mut state, target)?;

    // Stage 3: PLLs
    stages::solve_plls(&mut state)?;

    // Stage 4: System clock and bus dividers
    stages::solve_scgu(&mut state)?;

    // Stage 5: SysTick
    stages::solve_systick(&mut state)?;

    // Stage 6: Shared-selector UART groups
    stages::solve_uxarts(&mut state)?;

    // Stage 7a: I2C timing
    stages::solve_i2cs(&mut state, target)?;

    // Stage 7b: Timers
    stages::solve_timers(&mut state, target)?;

    // Stage 7c: SPI prescalers
    stages::solve_spis(&mut state, target)?;

    // Stage 7d: SDMMC clock dividers
    stages::solve_sdmmcs(&mut state, target)?;

    let settings = state.freeze();
    let (mut constants, mut pinned, mut derived) = (0, 0, 0);
    for (_, slot) in settings.slots() {
        match slot.origin {
            Origin::Constant => constants += 1,
            Origin::Pinned => pinned += 1,
            Origin::Derived => derived += 1,
        }
    }

    let report = SolveReport {
        target: target.name.clone(),
        chip: schema.chip().to_string(),
        duration_ms: start.elapsed().as_millis() as u64,
        constants,
        pinned,
        derived,
        gpios: declarations.gpios.len(),
        interrupts: declarations.interrupts.len(),
    };
    log::info!(
        "solved `{}` for {} in {} ms ({} derived settings)",
        report.target,
        report.chip,
        report.duration_ms,
        report.derived
    );

    Ok(Solution {
        settings,
        declarations,
        report,
    })
}

/// Solve independent targets in parallel, one thread per target.
///
/// Results come back in job order. A panicking solver thread panics the caller.
pub fn solve_each<'s>(jobs: &[(&'s Schema, &TargetSpec)]) -> Vec<Result<Solution<'s>>> {
    std::thread::scope(|scope| {
        let handles: Vec<_> = jobs
            .iter()
            .map(|&(schema, target)| scope.spawn(move || solve(schema, target)))
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().unwrap_or_else(|panic| std::panic::resume_unwind(panic)))
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clocktree_chips::stm32h533;

    fn minimal() -> TargetSpec {
        TargetSpec::new("minimal", stm32h533::CHIP)
            .goal("CPU_CK", 32_000_000)
            .goal("APB1_CK", 32_000_000)
            .goal("APB2_CK", 32_000_000)
            .goal("APB3_CK", 32_000_000)
    }

    #[test]
    fn report_counts_origins() {
        let schema = stm32h533::schema().unwrap();
        let solution = solve(&schema, &minimal()).unwrap();
        let report = &solution.report;
        assert_eq!(report.target, "minimal");
        assert!(report.constants >= 1);
        assert!(report.pinned >= 4);
        assert!(report.derived > 0);
        assert!(report.to_string().contains("=== Solve Report ==="));
    }

    #[test]
    fn parallel_results_keep_job_order() {
        let schema = stm32h533::schema().unwrap();
        let good = minimal();
        let bad = TargetSpec::new("bad", stm32h533::CHIP).goal("CPU_CK", 32_000_000);
        let results = solve_each(&[(&schema, &good), (&schema, &bad), (&schema, &good)]);
        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
        assert_eq!(results[2].as_ref().unwrap().report.target, "minimal");
    }
}
