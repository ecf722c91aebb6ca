//! Conformance test helpers for the Strobe clock/reset model.
//!
//! Provides the reference board configuration and small builders that take
//! configuration text through load → resolve → plan → kernel so integration
//! tests can drive and inspect a running design.

#![warn(missing_docs)]

use strobe_config::ResolvedDesign;
use strobe_sim::{
    plan_design, ClockPlan, LockBehavior, SimKernel, SimResult, SimTime, StallPolicy, Top,
    TopConfig,
};

/// Reference USB FIFO loopback board.
pub const REFERENCE_CONFIG: &str = r#"
[project]
name = "usb_loopback"

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
"#;

/// Loads and resolves configuration text. Panics on invalid input.
pub fn design_from_str(toml: &str) -> ResolvedDesign {
    let config = strobe_config::load_config_from_str(toml).unwrap();
    strobe_config::resolve_design(&config).unwrap()
}

/// The reference board design.
pub fn reference_design() -> ResolvedDesign {
    design_from_str(REFERENCE_CONFIG)
}

/// The reference design with `[reset] sync_stages` replaced.
pub fn reference_design_with_depth(depth: u32) -> ResolvedDesign {
    design_from_str(&REFERENCE_CONFIG.replace("sync_stages = 2", &format!("sync_stages = {depth}")))
}

/// Run-time knobs for [`kernel`].
#[derive(Debug, Clone, Default)]
pub struct Scenario {
    /// Lock model; the design's latency when `None`.
    pub lock: Option<LockBehavior>,
    /// PHY backpressure.
    pub stall: StallPolicy,
    /// Host payloads.
    pub frames: Vec<u64>,
}

/// Plans `design` and builds a kernel at time zero.
pub fn kernel(design: &ResolvedDesign, scenario: &Scenario) -> SimKernel {
    let plan = plan_design(design).unwrap();
    let mut config = TopConfig::from_design(design);
    if let Some(lock) = scenario.lock {
        config.lock = lock;
    }
    config.stall = scenario.stall;
    config.frames = scenario.frames.clone();
    SimKernel::new(Top::new(&plan, &config).unwrap())
}

/// Index of a domain in the plan. Panics when absent.
pub fn domain_index(plan: &ClockPlan, name: &str) -> usize {
    plan.domain_index(name)
        .unwrap_or_else(|| panic!("no domain named {name}"))
}

/// Report entry for a domain. Panics when absent.
pub fn domain_report<'a>(result: &'a SimResult, name: &str) -> &'a strobe_sim::DomainReport {
    result
        .domains
        .iter()
        .find(|d| d.name == name)
        .unwrap_or_else(|| panic!("no report for domain {name}"))
}

/// Time helper: nanoseconds.
pub fn ns(n: u64) -> SimTime {
    SimTime::from_ns(n)
}

/// Advances `kernel` in `step_fs` increments up to `limit`, calling `check`
/// after each step.
pub fn step_until(
    kernel: &mut SimKernel,
    limit: SimTime,
    step_fs: u64,
    mut check: impl FnMut(&SimKernel),
) {
    let mut t = kernel.current_time().fs;
    while t < limit.fs {
        t = (t + step_fs).min(limit.fs);
        kernel.run_until(SimTime::from_fs(t)).unwrap();
        check(kernel);
    }
}
