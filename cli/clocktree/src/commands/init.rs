//! `clocktree init`: project scaffolding.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use clocktree_chips::stm32h533;
use clocktree_solve::{target_to_toml, GpioDecl, GpioMode, TargetSpec};

use crate::manifest::ClocktreeManifest;

const STARTER_TARGET: &str = "board";

/// Create a new clocktree project named `name` under the current directory.
pub fn run(name: &str) -> Result<()> {
    create_project(Path::new(name), name)
}

/// A runnable starting point: 250 MHz from the internal oscillator, a 1 kHz
/// tick and one LED.
fn starter_target() -> TargetSpec {
    TargetSpec::new(STARTER_TARGET, stm32h533::CHIP)
        .goal("CPU_CK", 250_000_000)
        .goal("PLL1P_CK", 250_000_000)
        .goal("APB1_CK", 250_000_000)
        .goal("APB2_CK", 250_000_000)
        .goal("APB3_CK", 125_000_000)
        .goal("SYSTICK_CK", 1_000)
        .gpio(GpioDecl::new(
            "LED",
            Some("A5"),
            GpioMode::Output {
                initial_level: false,
                speed: None,
                open_drain: None,
            },
        ))
}

pub(crate) fn create_project(project_dir: &Path, name: &str) -> Result<()> {
    if project_dir.exists() {
        bail!("directory '{}' already exists", project_dir.display());
    }

    fs::create_dir_all(project_dir.join("targets")).context("creating targets/ directory")?;
    fs::create_dir_all(project_dir.join("chips")).context("creating chips/ directory")?;

    fs::write(
        project_dir.join("clocktree.toml"),
        ClocktreeManifest::template(name, STARTER_TARGET),
    )
    .context("writing clocktree.toml")?;

    let target = target_to_toml(&starter_target()).context("serializing starter target")?;
    let target_file = format!("{STARTER_TARGET}.target.toml");
    fs::write(project_dir.join("targets").join(&target_file), target)
        .with_context(|| format!("writing targets/{target_file}"))?;

    println!("Created project '{name}'");
    println!("  {name}/clocktree.toml");
    println!("  {name}/targets/{target_file}");
    println!("  {name}/chips/");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::solve;
    use crate::manifest::resolve_targets;

    #[test]
    fn init_creates_project_structure() {
        let dir = tempfile::tempdir().unwrap();
        let project_path = dir.path().join("bringup");

        create_project(&project_path, "bringup").unwrap();

        assert!(project_path.join("clocktree.toml").is_file());
        assert!(project_path.join("targets/board.target.toml").is_file());
        assert!(project_path.join("chips").is_dir());
    }

    #[test]
    fn starter_target_solves() {
        let dir = tempfile::tempdir().unwrap();
        let project_path = dir.path().join("starter");
        create_project(&project_path, "starter").unwrap();

        let (manifest, found) = ClocktreeManifest::find_and_load(&project_path).unwrap().unwrap();
        assert_eq!(found, project_path);
        let targets = resolve_targets(&found, Some(&manifest), None, false).unwrap();
        assert_eq!(targets[0].name, "board");
        solve::check(Some(&found), &targets).unwrap();
    }

    #[test]
    fn init_refuses_existing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let project_path = dir.path().join("existing");
        fs::create_dir(&project_path).unwrap();

        let result = create_project(&project_path, "existing");
        assert!(result.unwrap_err().to_string().contains("already exists"));
    }
}
