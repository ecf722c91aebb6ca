//! Shared pipeline helpers for CLI commands.
//!
//! Project root resolution, configuration loading and duration parsing used
//! by `plan` and `sim`.

use std::path::{Path, PathBuf};

use strobe_config::{ProjectConfig, ResolvedDesign, CONFIG_FILE_NAME};
use strobe_sim::time::{FS_PER_MS, FS_PER_NS, FS_PER_PS, FS_PER_S, FS_PER_US};

use crate::GlobalArgs;

/// A loaded project: where it lives, what it says, and what it resolves to.
#[derive(Debug)]
pub struct Project {
    /// Directory holding the configuration.
    pub root: PathBuf,
    /// Parsed configuration.
    pub config: ProjectConfig,
    /// Resolved design.
    pub design: ResolvedDesign,
}

/// Walks up from `start` looking for the nearest directory containing
/// `strobe.toml`.
pub fn find_project_root(start: &Path) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let mut current = start.to_path_buf();
    loop {
        if current.join(CONFIG_FILE_NAME).exists() {
            return Ok(current);
        }
        if !current.pop() {
            return Err(format!(
                "could not find {CONFIG_FILE_NAME} in {} or any parent directory",
                start.display()
            )
            .into());
        }
    }
}

/// Resolves the project root directory from global CLI args.
///
/// If `--config` is specified, uses that path (file → parent dir, dir → itself).
/// Otherwise walks up from the current directory looking for `strobe.toml`.
pub fn resolve_project_root(global: &GlobalArgs) -> Result<PathBuf, Box<dyn std::error::Error>> {
    if let Some(ref config_path) = global.config {
        let p = PathBuf::from(config_path);
        if p.is_file() {
            Ok(p.parent()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| PathBuf::from(".")))
        } else {
            Ok(p)
        }
    } else {
        find_project_root(&std::env::current_dir()?)
    }
}

/// Loads and resolves the project selected by the global args. An explicit
/// `--config` file is read as-is, whatever its name.
pub fn load_project(global: &GlobalArgs) -> Result<Project, Box<dyn std::error::Error>> {
    let root = resolve_project_root(global)?;
    let config = match global.config.as_deref().map(Path::new) {
        Some(file) if file.is_file() => {
            strobe_config::load_config_from_str(&std::fs::read_to_string(file)?)?
        }
        _ => strobe_config::load_config(&root)?,
    };
    let design = strobe_config::resolve_design(&config)?;
    tracing::debug!(root = %root.display(), design = %design.name, "loaded project");
    Ok(Project {
        root,
        config,
        design,
    })
}

/// Parses a human-readable duration string into femtoseconds.
///
/// Supports units: `fs`, `ps`, `ns`, `us`, `ms`, `s`.
/// Examples: `"100ns"`, `"2us"`, `"500ps"`, `"0fs"`.
pub fn parse_duration(s: &str) -> Result<u64, Box<dyn std::error::Error>> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".into());
    }

    let digit_end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    if digit_end == 0 {
        return Err(format!("invalid duration: no numeric value in '{s}'").into());
    }

    let number: u64 = s[..digit_end]
        .parse()
        .map_err(|_| format!("invalid number in duration '{s}'"))?;

    let unit = s[digit_end..].trim();
    let multiplier = match unit {
        "fs" => 1,
        "ps" => FS_PER_PS,
        "ns" => FS_PER_NS,
        "us" => FS_PER_US,
        "ms" => FS_PER_MS,
        "s" => FS_PER_S,
        "" => {
            return Err(
                format!("missing unit in duration '{s}' (use fs, ps, ns, us, ms, or s)").into(),
            )
        }
        _ => {
            return Err(
                format!("unknown duration unit '{unit}' (use fs, ps, ns, us, ms, or s)").into(),
            )
        }
    };

    number
        .checked_mul(multiplier)
        .ok_or_else(|| format!("duration '{s}' overflows the femtosecond range").into())
}
