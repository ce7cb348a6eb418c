//! clocktree CLI: solve MCU clock trees and emit their boot sequences.

mod commands;
mod logger;
mod manifest;

use std::path::{Path, PathBuf};
use std::process;

use clap::{ArgAction, Parser, Subcommand};

use manifest::ClocktreeManifest;

#[derive(Parser)]
#[command(name = "clocktree", version, about = "MCU clock-tree solver and boot-sequence emitter")]
struct Cli {
    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new clocktree project
    Init {
        /// Project name
        name: String,
    },
    /// Inspect the supported chips
    Chips {
        #[command(subcommand)]
        action: ChipsAction,
    },
    /// Solve targets and print their boot sequences
    Solve {
        /// Target name (from targets/) or path to a .target.toml file
        target: Option<String>,
        /// Solve every target in targets/
        #[arg(long)]
        all_targets: bool,
        /// Output format (text, json)
        #[arg(long)]
        format: Option<String>,
        /// Write one file per target into this directory instead of stdout
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },
    /// Solve targets and report success or the first error of each
    Check {
        /// Target name (from targets/) or path to a .target.toml file
        target: Option<String>,
        /// Check every target in targets/
        #[arg(long)]
        all_targets: bool,
    },
}

#[derive(Subcommand)]
enum ChipsAction {
    /// List builtin and project chips
    List,
    /// Show details of a chip
    Describe {
        /// Chip name
        name: String,
        /// Output format (default: human-readable, "toml" for a schema file)
        #[arg(long)]
        format: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();
    logger::init(cli.verbose, cli.quiet);

    let result = run(cli);
    if let Err(e) = result {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let cwd = std::env::current_dir()?;

    match cli.command {
        Commands::Init { name } => commands::init::run(&name),

        Commands::Chips { action } => {
            let (_, project_dir) = load_manifest_optional(&cwd)?;
            match action {
                ChipsAction::List => commands::chips::list(project_dir.as_deref()),
                ChipsAction::Describe { name, format } => {
                    commands::chips::describe(&name, project_dir.as_deref(), format.as_deref())
                }
            }
        }

        Commands::Solve {
            target,
            all_targets,
            format,
            out_dir,
        } => {
            let format = commands::solve::Format::parse(format.as_deref())?;
            let (manifest, project_dir) = load_manifest_optional(&cwd)?;
            let root = project_dir.clone().unwrap_or(cwd);
            let targets = manifest::resolve_targets(
                &root,
                manifest.as_ref(),
                target.as_deref(),
                all_targets,
            )?;
            commands::solve::run(project_dir.as_deref(), &targets, format, out_dir.as_deref())
        }

        Commands::Check {
            target,
            all_targets,
        } => {
            let (manifest, project_dir) = load_manifest_optional(&cwd)?;
            let root = project_dir.clone().unwrap_or(cwd);
            let targets = manifest::resolve_targets(
                &root,
                manifest.as_ref(),
                target.as_deref(),
                all_targets,
            )?;
            commands::solve::check(project_dir.as_deref(), &targets)
        }
    }
}

/// Try to load a manifest from the current directory upward. Returns (None, None) if not found.
fn load_manifest_optional(
    cwd: &Path,
) -> anyhow::Result<(Option<ClocktreeManifest>, Option<PathBuf>)> {
    match ClocktreeManifest::find_and_load(cwd)? {
        Some((manifest, dir)) => Ok((Some(manifest), Some(dir))),
        None => Ok((None, None)),
    }
}

#[cfg(test)]
mod integration_tests {
    use super::*;

    /// Full workflow: init, then solve every target to JSON files.
    #[test]
    fn init_then_solve_all_targets() {
        let dir = tempfile::tempdir().unwrap();
        let project_path = dir.path().join("workflow");
        commands::init::create_project(&project_path, "workflow").unwrap();

        let (manifest, project_dir) = load_manifest_optional(&project_path).unwrap();
        let project_dir = project_dir.unwrap();
        let targets =
            manifest::resolve_targets(&project_dir, manifest.as_ref(), None, true).unwrap();
        let out = project_dir.join("out");
        commands::solve::run(
            Some(&project_dir),
            &targets,
            commands::solve::Format::Json,
            Some(&out),
        )
        .unwrap();
        assert!(out.join("board.json").is_file());
    }

    #[test]
    fn cli_parses_verbosity() {
        let cli = Cli::try_parse_from(["clocktree", "-vv", "check", "--all-targets"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert!(matches!(
            cli.command,
            Commands::Check {
                all_targets: true,
                ..
            }
        ));
    }
}
