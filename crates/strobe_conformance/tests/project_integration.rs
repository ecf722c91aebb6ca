//! Integration tests for on-disk project workflows.
//!
//! These tests write a `strobe.toml` into a temporary directory and run the
//! full pipeline (load → resolve → plan → simulate) including waveform output.

use std::fs;
use std::path::Path;

use strobe_conformance::REFERENCE_CONFIG;
use strobe_sim::{SimConfig, StallPolicy};
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Helper: lay out a project directory
// ---------------------------------------------------------------------------

fn write_project(dir: &Path, extra: &str) {
    let content = format!("{REFERENCE_CONFIG}\n{extra}");
    fs::write(dir.join(strobe_config::CONFIG_FILE_NAME), content).unwrap();
}

fn load(dir: &Path) -> strobe_config::ResolvedDesign {
    let config = strobe_config::load_config(dir).unwrap();
    strobe_config::resolve_design(&config).unwrap()
}

// ===========================================================================
// Pipeline from disk
// ===========================================================================

#[test]
fn disk_project_simulates_with_waveform() {
    let tmp = TempDir::new().unwrap();
    write_project(tmp.path(), "[sim]\ntime = \"2us\"\nframes = [1, 2, 3]\n");

    let config = strobe_config::load_config(tmp.path()).unwrap();
    assert_eq!(config.sim.frames, vec![1, 2, 3]);
    let design = strobe_config::resolve_design(&config).unwrap();

    let out = tmp.path().join("out");
    fs::create_dir_all(&out).unwrap();
    let vcd_path = out.join("usb_loopback.vcd");
    let sim = SimConfig {
        time_limit: Some(2 * strobe_sim::time::FS_PER_US),
        waveform_path: Some(vcd_path.clone()),
        frames: vec![1, 2, 3],
        ..SimConfig::default()
    };
    let result = strobe_sim::simulate(&design, &sim).unwrap();
    assert!(result.locked);
    assert_eq!(result.bridge.as_ref().unwrap().received, vec![1, 2, 3]);

    let vcd = fs::read_to_string(&vcd_path).unwrap();
    assert!(vcd.starts_with("$version"));
    assert!(vcd.contains("$timescale\n  1fs\n$end"));
    assert!(vcd.contains("$scope module usb_fifo_clock_crg $end"));
    for name in [
        "locked",
        "sys_rst",
        "clk200_rst",
        "clk100_rst",
        "cal_reset",
        "cal_countdown",
        "fifo_level",
        "fifo_sink_ready",
        "fifo_source_valid",
    ] {
        assert!(vcd.contains(&format!(" {name} $end")), "missing {name}");
    }
    assert!(!vcd.contains("sys4x_rst"));
    assert_eq!(vcd.matches("$enddefinitions $end").count(), 1);
    // lock on the 64th reference edge
    assert!(vcd.contains("#630000000\n1!"));
}

#[test]
fn disk_project_result_serializes() {
    let tmp = TempDir::new().unwrap();
    write_project(tmp.path(), "");
    let design = load(tmp.path());

    let sim = SimConfig {
        time_limit: Some(20 * strobe_sim::time::FS_PER_US),
        stall: StallPolicy::random(9, 0.3),
        frames: (1..=50).collect(),
        ..SimConfig::default()
    };
    let result = strobe_sim::simulate(&design, &sim).unwrap();
    let json = serde_json::to_value(&result).unwrap();

    assert_eq!(json["locked"], true);
    assert_eq!(json["domains"].as_array().unwrap().len(), 5);
    assert_eq!(json["calibration"]["domain"], "clk200");
    let received: Vec<u64> = json["bridge"]["received"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_u64().unwrap())
        .collect();
    assert_eq!(received, (1..=50).collect::<Vec<u64>>());
}

#[test]
fn unwritable_waveform_path_is_an_error() {
    let tmp = TempDir::new().unwrap();
    write_project(tmp.path(), "");
    let design = load(tmp.path());
    let sim = SimConfig {
        waveform_path: Some(tmp.path().join("missing").join("wave.vcd")),
        ..SimConfig::default()
    };
    let err = strobe_sim::simulate(&design, &sim).unwrap_err();
    assert!(err.to_string().contains("waveform I/O error"));
}

// ===========================================================================
// Configuration errors from disk
// ===========================================================================

#[test]
fn missing_project_file_reports_read_error() {
    let tmp = TempDir::new().unwrap();
    let err = strobe_config::load_config(tmp.path()).unwrap_err();
    assert!(err.to_string().contains("failed to read configuration"));
}

#[test]
fn duplicate_domain_on_disk_rejected() {
    let tmp = TempDir::new().unwrap();
    write_project(
        tmp.path(),
        "[[domains]]\nname = \"sys\"\nfrequency = \"50MHz\"\n",
    );
    let err = strobe_config::load_config(tmp.path()).unwrap_err();
    assert!(err.to_string().contains("duplicate clock domain 'sys'"));
}

#[test]
fn bridge_in_reserved_domain_rejected() {
    let tmp = TempDir::new().unwrap();
    fs::write(
        tmp.path().join(strobe_config::CONFIG_FILE_NAME),
        REFERENCE_CONFIG.replace("domain = \"sys\"", "domain = \"aux\""),
    )
    .unwrap();
    let err = strobe_config::load_config(tmp.path()).unwrap_err();
    assert!(err.to_string().contains("unknown clock domain 'aux'"));
}
