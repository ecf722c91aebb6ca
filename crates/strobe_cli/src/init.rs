//! `strobe init`: write a reference `strobe.toml`.
//!
//! The template describes the USB FIFO loopback board: a 100 MHz reference,
//! the memory-controller clock set, a 200 MHz delay-calibration domain and an
//! 8192-entry loopback bridge in `sys`.

use std::fs;
use std::path::{Path, PathBuf};

use strobe_config::CONFIG_FILE_NAME;

use crate::GlobalArgs;

/// Runs the `strobe init` command.
///
/// If `name` is `Some`, creates a new subdirectory with that name.
/// Otherwise initializes in the current working directory.
pub fn run(name: Option<String>, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let project_dir = match &name {
        Some(n) => {
            let dir = PathBuf::from(n);
            if dir.exists() {
                return Err(format!("directory '{n}' already exists").into());
            }
            fs::create_dir_all(&dir)?;
            dir
        }
        None => std::env::current_dir()?,
    };

    let project_name = project_dir
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("strobe_project")
        .to_string();

    let path = write_config(&project_dir, &project_name)?;
    if !global.quiet {
        eprintln!("  Creating new Strobe project `{project_name}`");
        eprintln!("     Created {}", path.display());
    }
    Ok(0)
}

/// Writes the template configuration, refusing to overwrite an existing one.
pub(crate) fn write_config(root: &Path, name: &str) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let path = root.join(CONFIG_FILE_NAME);
    if path.exists() {
        return Err(format!("{} already exists", path.display()).into());
    }
    fs::write(&path, template(name))?;
    Ok(path)
}

/// Reference configuration for a project called `name`.
pub(crate) fn template(name: &str) -> String {
    format!(
        r#"[project]
name = "{name}"
description = "USB FIFO loopback with DDR clocking"

[reference]
frequency = "100MHz"
port = "usb_fifo_clock"

[pll]
lock_cycles = 64

[reset]
sync_stages = 2

[[domains]]
name = "sys"
frequency = "100MHz"

[[domains]]
name = "sys4x"
frequency = "400MHz"
reset = "reset-less"

[[domains]]
name = "sys4x_dqs"
frequency = "400MHz"
phase = 90.0
reset = "reset-less"

[[domains]]
name = "clk200"
frequency = "200MHz"

# Spare PLL tap: planned, never clocked.
[[domains]]
name = "aux"
frequency = "400MHz"
reserved = true

[[domains]]
name = "clk100"
frequency = "100MHz"
source = "reference"

[calibration]
domain = "clk200"
hold_cycles = 15

[bridge]
domain = "sys"
width = 32
capacity = 8192

[sim]
time = "2us"
frames = [1, 2, 3]
"#
    )
}
