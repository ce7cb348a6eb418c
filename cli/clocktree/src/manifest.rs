//! `clocktree.toml` manifest parsing and project lookups.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use clocktree_core::Schema;
use clocktree_solve::{discover_targets, load_target_toml, TargetSpec};

/// The top-level manifest of a clocktree project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClocktreeManifest {
    pub project: ProjectConfig,
    #[serde(default)]
    pub targets: Option<TargetsConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub name: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub description: Option<String>,
}

fn default_version() -> String {
    "0.1.0".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetsConfig {
    /// Target solved when none is named on the command line.
    #[serde(default)]
    pub default: Option<String>,
}

impl ClocktreeManifest {
    /// Search upward from `start_dir` for a `clocktree.toml` file, parse and
    /// return it along with the directory it was found in.
    pub fn find_and_load(start_dir: &Path) -> Result<Option<(Self, PathBuf)>> {
        let mut dir = start_dir.to_path_buf();
        loop {
            let candidate = dir.join("clocktree.toml");
            if candidate.is_file() {
                let content = std::fs::read_to_string(&candidate)
                    .with_context(|| format!("reading {}", candidate.display()))?;
                let manifest: ClocktreeManifest = toml::from_str(&content)
                    .with_context(|| format!("parsing {}", candidate.display()))?;
                return Ok(Some((manifest, dir)));
            }
            if !dir.pop() {
                break;
            }
        }
        Ok(None)
    }

    #[cfg(test)]
    pub fn from_str(s: &str) -> Result<Self> {
        toml::from_str(s).context("parsing clocktree.toml")
    }

    pub fn default_target(&self) -> Option<&str> {
        self.targets.as_ref().and_then(|t| t.default.as_deref())
    }

    /// Generate the default template for `clocktree init`.
    pub fn template(name: &str, default_target: &str) -> String {
        format!(
            r#"[project]
name = "{name}"
version = "0.1.0"

[targets]
default = "{default_target}"
"#
        )
    }
}

/// Schema for `chip`: a `chips/<chip>.schema.toml` in the project wins over the
/// builtin table.
pub fn resolve_schema(project_dir: Option<&Path>, chip: &str) -> Result<Schema> {
    if let Some(dir) = project_dir {
        let found = clocktree_chips::discover_schemas(dir)
            .with_context(|| format!("scanning {}/chips", dir.display()))?;
        if let Some((_, path)) = found
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(chip))
        {
            log::debug!("using schema file {}", path.display());
            return clocktree_chips::load_schema_toml(path)
                .with_context(|| format!("loading {}", path.display()));
        }
    }
    Ok(clocktree_chips::builtin(chip)?)
}

/// Targets selected on the command line.
///
/// `target` is either a path to a `.target.toml` file or the stem of one in
/// `targets/`. Without it, `all` selects every discovered target; otherwise the
/// manifest default is used, or the only target if there is just one.
pub fn resolve_targets(
    project_dir: &Path,
    manifest: Option<&ClocktreeManifest>,
    target: Option<&str>,
    all: bool,
) -> Result<Vec<TargetSpec>> {
    let load = |path: &Path| {
        load_target_toml(path).with_context(|| format!("loading {}", path.display()))
    };

    if let Some(name) = target {
        let path = Path::new(name);
        if path.is_file() {
            return Ok(vec![load(path)?]);
        }
        return Ok(vec![load(&find_target(project_dir, name)?)?]);
    }

    let discovered = discover_targets(project_dir)
        .with_context(|| format!("scanning {}/targets", project_dir.display()))?;
    if all {
        if discovered.is_empty() {
            bail!("no targets found in {}/targets", project_dir.display());
        }
        return discovered.iter().map(|(_, path)| load(path)).collect();
    }
    if let Some(name) = manifest.and_then(ClocktreeManifest::default_target) {
        return Ok(vec![load(&find_target(project_dir, name)?)?]);
    }
    match discovered.as_slice() {
        [(_, path)] => Ok(vec![load(path)?]),
        [] => bail!("no targets found in {}/targets", project_dir.display()),
        _ => bail!("several targets found; name one or pass --all-targets"),
    }
}

fn find_target(project_dir: &Path, name: &str) -> Result<PathBuf> {
    let discovered = discover_targets(project_dir)?;
    match discovered.into_iter().find(|(stem, _)| stem == name) {
        Some((_, path)) => Ok(path),
        None => bail!(
            "unknown target '{name}': no {}/targets/{name}.target.toml",
            project_dir.display()
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clocktree_chips::stm32h533;
    use clocktree_solve::target_to_toml;

    fn write_target(dir: &Path, name: &str) {
        let targets = dir.join("targets");
        std::fs::create_dir_all(&targets).unwrap();
        let spec = TargetSpec::new(name, stm32h533::CHIP).goal("CPU_CK", 32_000_000);
        std::fs::write(
            targets.join(format!("{name}.target.toml")),
            target_to_toml(&spec).unwrap(),
        )
        .unwrap();
    }

    #[test]
    fn parse_manifest() {
        let manifest = ClocktreeManifest::from_str(
            r#"
[project]
name = "board"
description = "bring-up"

[targets]
default = "nucleo"
"#,
        )
        .unwrap();
        assert_eq!(manifest.project.name, "board");
        assert_eq!(manifest.project.version, "0.1.0");
        assert_eq!(manifest.default_target(), Some("nucleo"));
    }

    #[test]
    fn template_is_valid_toml() {
        let template = ClocktreeManifest::template("x", "board");
        let manifest = ClocktreeManifest::from_str(&template).unwrap();
        assert_eq!(manifest.project.name, "x");
        assert_eq!(manifest.default_target(), Some("board"));
    }

    #[test]
    fn find_and_load_walks_up() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = "[project]\nname = \"parent\"\n";
        std::fs::write(dir.path().join("clocktree.toml"), manifest).unwrap();
        let nested = dir.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();

        let (manifest, found) = ClocktreeManifest::find_and_load(&nested).unwrap().unwrap();
        assert_eq!(manifest.project.name, "parent");
        assert_eq!(found, dir.path());
    }

    #[test]
    fn single_target_is_the_default() {
        let dir = tempfile::tempdir().unwrap();
        write_target(dir.path(), "only");
        let targets = resolve_targets(dir.path(), None, None, false).unwrap();
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].name, "only");
    }

    #[test]
    fn several_targets_need_a_choice() {
        let dir = tempfile::tempdir().unwrap();
        write_target(dir.path(), "a");
        write_target(dir.path(), "b");
        assert!(resolve_targets(dir.path(), None, None, false).is_err());
        assert_eq!(resolve_targets(dir.path(), None, None, true).unwrap().len(), 2);
        assert_eq!(resolve_targets(dir.path(), None, Some("b"), false).unwrap()[0].name, "b");
        assert!(resolve_targets(dir.path(), None, Some("c"), false).is_err());
    }

    #[test]
    fn builtin_schema_without_project() {
        let schema = resolve_schema(None, "stm32h533ret6").unwrap();
        assert_eq!(schema.chip(), stm32h533::CHIP);
        assert!(resolve_schema(None, "STM32F401").is_err());
    }
}
