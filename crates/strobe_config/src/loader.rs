//! Configuration file loading and validation.

use crate::error::ConfigError;
use crate::types::ProjectConfig;
use std::collections::BTreeSet;
use std::path::Path;

/// File name looked up in a project directory.
pub const CONFIG_FILE_NAME: &str = "strobe.toml";

/// Loads and validates a `strobe.toml` configuration from a project directory.
///
/// Reads `<project_dir>/strobe.toml`, parses it, and validates required fields.
pub fn load_config(project_dir: &Path) -> Result<ProjectConfig, ConfigError> {
    let config_path = project_dir.join(CONFIG_FILE_NAME);
    let content = std::fs::read_to_string(&config_path)?;
    load_config_from_str(&content)
}

/// Parses and validates a `strobe.toml` configuration from a string.
///
/// Useful for testing without filesystem dependencies.
pub fn load_config_from_str(content: &str) -> Result<ProjectConfig, ConfigError> {
    let config: ProjectConfig =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

/// Validates required fields and cross-references between sections.
fn validate_config(config: &ProjectConfig) -> Result<(), ConfigError> {
    if config.project.name.is_empty() {
        return Err(ConfigError::MissingField("project.name".to_string()));
    }
    if config.reference.frequency.is_empty() {
        return Err(ConfigError::MissingField("reference.frequency".to_string()));
    }

    let mut names = BTreeSet::new();
    for domain in &config.domains {
        if domain.name.is_empty() {
            return Err(ConfigError::MissingField("domains.name".to_string()));
        }
        if !names.insert(domain.name.as_str()) {
            return Err(ConfigError::DuplicateDomain(domain.name.clone()));
        }
    }

    let clocked = |name: &str| {
        config
            .domains
            .iter()
            .any(|d| d.name == name && !d.reserved)
    };
    if let Some(cal) = &config.calibration {
        if !clocked(&cal.domain) {
            return Err(ConfigError::UnknownDomain(cal.domain.clone()));
        }
    }
    if let Some(bridge) = &config.bridge {
        if !clocked(&bridge.domain) {
            return Err(ConfigError::UnknownDomain(bridge.domain.clone()));
        }
    }
    if !(0.0..=1.0).contains(&config.sim.stall_probability) {
        return Err(ConfigError::ValidationError(format!(
            "sim.stall_probability must be within [0, 1], got {}",
            config.sim.stall_probability
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
[project]
name = "usb_loopback"
description = "FT245 loopback through an 8192-entry FIFO"

[reference]
frequency = "100MHz"
port = "usb_fifo_clock"

[pll]
lock_cycles = 32

[reset]
sync_stages = 3

[[domains]]
name = "sys"
frequency = "100MHz"

[[domains]]
name = "sys4x_dqs"
frequency = "400MHz"
phase = 90.0
reset = "reset-less"

[[domains]]
name = "clk200"
frequency = "200MHz"

[[domains]]
name = "aux"
frequency = "400MHz"
reserved = true

[calibration]
domain = "clk200"

[bridge]
capacity = 8192

[sim]
time = "2us"
frames = [1, 2, 3]
"#;

    #[test]
    fn parse_full_config() {
        let config = load_config_from_str(FULL).unwrap();
        assert_eq!(config.project.name, "usb_loopback");
        assert_eq!(config.reference.port, "usb_fifo_clock");
        assert_eq!(config.pll.lock_cycles, Some(32));
        assert_eq!(config.reset.sync_stages, 3);
        assert_eq!(config.domains.len(), 4);
        assert_eq!(config.domains[1].phase, 90.0);
        assert!(config.domains[3].reserved);
        assert_eq!(config.calibration.as_ref().unwrap().hold_cycles, 15);
        assert_eq!(config.sim.frames, vec![1, 2, 3]);
        assert_eq!(config.sim.time.as_deref(), Some("2us"));
    }

    #[test]
    fn default_values() {
        let toml = r#"
[project]
name = "t"

[reference]
frequency = "50MHz"
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.reference.port, "clk");
        assert_eq!(config.reset.sync_stages, 2);
        assert!(config.domains.is_empty());
        assert!(config.calibration.is_none());
        assert!(config.bridge.is_none());
        assert!(config.pll.mult.is_none());
        assert!(config.sim.stall_seed.is_none());
    }

    #[test]
    fn missing_name_errors() {
        let toml = "[project]\nname = \"\"\n[reference]\nfrequency = \"100MHz\"\n";
        let err = load_config_from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField(_)));
    }

    #[test]
    fn missing_reference_errors() {
        let toml = "[project]\nname = \"t\"\n";
        let err = load_config_from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn duplicate_domain_errors() {
        let toml = r#"
[project]
name = "t"
[reference]
frequency = "100MHz"
[[domains]]
name = "sys"
frequency = "100MHz"
[[domains]]
name = "sys"
frequency = "200MHz"
"#;
        let err = load_config_from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateDomain(ref n) if n == "sys"));
    }

    #[test]
    fn calibration_on_reserved_domain_errors() {
        let toml = r#"
[project]
name = "t"
[reference]
frequency = "100MHz"
[[domains]]
name = "aux"
frequency = "400MHz"
reserved = true
[calibration]
domain = "aux"
"#;
        let err = load_config_from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownDomain(ref n) if n == "aux"));
    }

    #[test]
    fn bridge_on_missing_domain_errors() {
        let toml = r#"
[project]
name = "t"
[reference]
frequency = "100MHz"
[bridge]
domain = "usb"
"#;
        let err = load_config_from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownDomain(ref n) if n == "usb"));
    }

    #[test]
    fn stall_probability_out_of_range_errors() {
        let toml = "[project]\nname = \"t\"\n[reference]\nfrequency = \"100MHz\"\n[sim]\nstall_probability = 1.5\n";
        let err = load_config_from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn invalid_toml_errors() {
        let err = load_config_from_str("this is not valid toml {{{}}}").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn load_from_directory() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::write(tmp.path().join(CONFIG_FILE_NAME), FULL).unwrap();
        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.project.name, "usb_loopback");
    }

    #[test]
    fn io_error_from_nonexistent_dir() {
        let err = load_config(Path::new("/nonexistent/dir")).unwrap_err();
        assert!(matches!(err, ConfigError::IoError(_)));
    }
}
