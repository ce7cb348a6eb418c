//! `clocktree solve` and `clocktree check`: solve targets and emit their
//! boot sequences.

use std::fs;
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use serde::Serialize;

use clocktree_core::Schema;
use clocktree_emit::{emit, fingerprint, fingerprint_hex, Emission};
use clocktree_solve::{solve_each, SolveReport, TargetSpec};

use crate::manifest::resolve_schema;

/// Output format of `clocktree solve`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Text,
    Json,
}

impl Format {
    pub fn parse(name: Option<&str>) -> Result<Self> {
        match name {
            None | Some("text") => Ok(Format::Text),
            Some("json") => Ok(Format::Json),
            Some(other) => bail!("unknown format '{other}' (expected text or json)"),
        }
    }
}

/// The result of one target, as written by `--format json`.
#[derive(Debug, Serialize)]
pub struct TargetOutput {
    pub report: SolveReport,
    pub fingerprint: String,
    pub emission: Emission,
}

/// Solve and emit every target, in parallel. A failing target does not stop the
/// others; the command fails if any did.
pub fn solve_targets(
    project_dir: Option<&Path>,
    targets: &[TargetSpec],
) -> Vec<Result<TargetOutput>> {
    let mut schemas: Vec<Schema> = Vec::new();
    let mut slots: Vec<Result<usize>> = Vec::with_capacity(targets.len());
    for target in targets {
        let known = schemas
            .iter()
            .position(|s| s.chip().eq_ignore_ascii_case(&target.chip));
        if let Some(index) = known {
            slots.push(Ok(index));
            continue;
        }
        match resolve_schema(project_dir, &target.chip) {
            Ok(schema) => {
                schemas.push(schema);
                slots.push(Ok(schemas.len() - 1));
            }
            Err(e) => slots.push(Err(e)),
        }
    }

    let jobs: Vec<(&Schema, &TargetSpec)> = slots
        .iter()
        .zip(targets)
        .filter_map(|(slot, target)| slot.as_ref().ok().map(|&i| (&schemas[i], target)))
        .collect();
    let mut solved = solve_each(&jobs).into_iter();

    slots
        .into_iter()
        .zip(targets)
        .map(|(slot, target)| {
            slot.with_context(|| format!("target '{}'", target.name))?;
            let solution = solved
                .next()
                .ok_or_else(|| anyhow!("missing result for target '{}'", target.name))?
                .with_context(|| format!("solving target '{}'", target.name))?;
            let emission =
                emit(&solution).with_context(|| format!("emitting target '{}'", target.name))?;
            let fingerprint = fingerprint_hex(&fingerprint(&emission)?);
            Ok(TargetOutput {
                report: solution.report,
                fingerprint,
                emission,
            })
        })
        .collect()
}

fn finish(failures: usize, total: usize) -> Result<()> {
    if failures > 0 {
        bail!("{failures} of {total} targets failed");
    }
    Ok(())
}

/// Print the full emission of each target, or write it under `out_dir`.
pub fn run(
    project_dir: Option<&Path>,
    targets: &[TargetSpec],
    format: Format,
    out_dir: Option<&Path>,
) -> Result<()> {
    if let Some(dir) = out_dir {
        fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }

    let results = solve_targets(project_dir, targets);
    let mut failures = 0;
    for result in results {
        let output = match result {
            Ok(output) => output,
            Err(e) => {
                eprintln!("error: {e:#}");
                failures += 1;
                continue;
            }
        };
        let (text, extension) = match format {
            Format::Text => (render_text(&output), "txt"),
            Format::Json => (serde_json::to_string_pretty(&output)?, "json"),
        };
        match out_dir {
            Some(dir) => {
                let path = dir.join(format!("{}.{extension}", output.report.target));
                fs::write(&path, text).with_context(|| format!("writing {}", path.display()))?;
                println!("{} -> {}", output.report.target, path.display());
            }
            None => println!("{text}"),
        }
    }
    finish(failures, targets.len())
}

/// Solve every target and print a one-line summary each.
pub fn check(project_dir: Option<&Path>, targets: &[TargetSpec]) -> Result<()> {
    let mut failures = 0;
    for result in solve_targets(project_dir, targets) {
        match result {
            Ok(output) => {
                let warnings = output.emission.warnings.len();
                println!(
                    "ok    {:<16} {:<16} {} writes, {} warnings, {}",
                    output.report.target,
                    output.report.chip,
                    output.emission.writes(),
                    warnings,
                    &output.fingerprint[..16]
                );
            }
            Err(e) => {
                println!("FAIL  {e:#}");
                failures += 1;
            }
        }
    }
    finish(failures, targets.len())
}

fn render_text(output: &TargetOutput) -> String {
    format!(
        "{}\n\n{}Fingerprint: {}\n",
        output.report, output.emission, output.fingerprint
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use clocktree_chips::stm32h533;

    fn target(name: &str, chip: &str) -> TargetSpec {
        TargetSpec::new(name, chip)
            .goal("CPU_CK", 32_000_000)
            .goal("APB1_CK", 32_000_000)
            .goal("APB2_CK", 32_000_000)
            .goal("APB3_CK", 32_000_000)
    }

    #[test]
    fn results_follow_target_order() {
        let targets = [
            target("a", stm32h533::CHIP),
            target("b", "STM32F401"),
            TargetSpec::new("c", stm32h533::CHIP).goal("CPU_CK", 32_000_000),
            target("d", stm32h533::CHIP),
        ];
        let results = solve_targets(None, &targets);
        assert_eq!(results.len(), 4);
        assert_eq!(results[0].as_ref().unwrap().report.target, "a");
        assert!(results[1].is_err());
        assert!(format!("{:#}", results[2].as_ref().unwrap_err()).contains("'c'"));
        let d = results[3].as_ref().unwrap();
        assert_eq!(d.report.target, "d");
        assert_eq!(d.fingerprint, results[0].as_ref().unwrap().fingerprint);
    }

    #[test]
    fn json_files_per_target() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        run(None, &[target("board", stm32h533::CHIP)], Format::Json, Some(&out)).unwrap();

        let text = fs::read_to_string(out.join("board.json")).unwrap();
        let json: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(json["report"]["target"], "board");
        assert_eq!(json["fingerprint"].as_str().unwrap().len(), 64);
        assert!(json["emission"]["ops"].as_array().unwrap().len() > 5);
    }

    #[test]
    fn failures_fail_the_command() {
        let err = check(None, &[target("bad", "STM32F401")]).unwrap_err();
        assert!(err.to_string().contains("1 of 1"));
    }

    #[test]
    fn format_names() {
        assert_eq!(Format::parse(None).unwrap(), Format::Text);
        assert_eq!(Format::parse(Some("json")).unwrap(), Format::Json);
        assert!(Format::parse(Some("xml")).is_err());
    }
}
