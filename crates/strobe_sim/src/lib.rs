//! Cycle-accurate model of a clock/reset generation core and a loopback
//! streaming bridge.
//!
//! A resolved design is planned into a [`ClockPlan`] (one multiply/divide
//! stage, integer output dividers, phase offsets) and then simulated edge by
//! edge: a behavioral PLL asserts `locked`, every resettable domain releases
//! its reset through a lock-qualified synchronizer, a calibration gate holds
//! its collaborator for a fixed number of cycles, and a ready/valid FIFO
//! bridge loops host traffic back through a PHY model.
//!
//! # Usage
//!
//! ```ignore
//! use strobe_sim::{simulate, SimConfig};
//!
//! let result = simulate(&design, &SimConfig::default())?;
//! println!("locked at {:?}", result.lock_time);
//! ```
//!
//! # Modules
//!
//! - `error`: simulation and planning errors
//! - `time`: femtosecond time and edge placement
//! - `pll`: clock planning and the behavioral PLL
//! - `reset`: lock-qualified reset synchronizer
//! - `calib`: calibration gate sequencer
//! - `stream`, `fifo`: frames, handshake checking, elastic buffer, bridge
//! - `phy`: loopback PHY model
//! - `crg`, `top`: composition
//! - `waveform`: VCD output
//! - `kernel`: multi-clock edge scheduler

#![warn(missing_docs)]

pub mod calib;
pub mod crg;
pub mod error;
pub mod fifo;
pub mod kernel;
pub mod phy;
pub mod pll;
pub mod reset;
pub mod stream;
pub mod time;
pub mod top;
pub mod waveform;

use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

use strobe_config::ResolvedDesign;

pub use calib::{CalibrationGate, GateState};
pub use crg::{CalibrationReport, ClockResetGenerator};
pub use error::SimError;
pub use fifo::{BridgeStats, ElasticBuffer, PushError, StreamBridge, Transfer};
pub use kernel::{DomainReport, SimKernel, SimResult};
pub use phy::{LoopbackPhy, StallPolicy};
pub use pll::{ClockDomainSpec, ClockPlan, LockBehavior, PllLimits, PllModel};
pub use reset::ResetSynchronizer;
pub use stream::{FrameFlags, HandshakeMonitor, HandshakeViolation, StreamFrame};
pub use time::SimTime;
pub use top::{BridgeReport, Top, TopConfig};
pub use waveform::{SignalId, VcdRecorder, WaveformRecorder};

/// Run length when none is configured: 10 µs.
pub const DEFAULT_TIME_LIMIT_FS: u64 = 10 * time::FS_PER_US;

/// Configuration for a simulation run.
#[derive(Debug, Clone, Default)]
pub struct SimConfig {
    /// Simulation time limit in femtoseconds. Defaults to
    /// [`DEFAULT_TIME_LIMIT_FS`].
    pub time_limit: Option<u64>,
    /// Optional path for VCD output.
    pub waveform_path: Option<PathBuf>,
    /// Overrides the configured lock latency.
    pub lock: Option<LockBehavior>,
    /// Backpressure injected by the PHY.
    pub stall: StallPolicy,
    /// Payloads the host sends through the loopback.
    pub frames: Vec<u64>,
}

/// Plans the clock tree of a design against Artix-7 limits, narrowed by any
/// VCO overrides in the design.
pub fn plan_design(design: &ResolvedDesign) -> Result<ClockPlan, SimError> {
    let limits = PllLimits::artix7().with_overrides(design.pll.vco_min, design.pll.vco_max);
    ClockPlan::plan(design, &limits)
}

/// High-level entry point: plans and simulates a design.
///
/// Builds the [`Top`], optionally attaches a VCD recorder, and runs to the
/// time limit.
pub fn simulate(design: &ResolvedDesign, config: &SimConfig) -> Result<SimResult, SimError> {
    let plan = plan_design(design)?;

    let mut top_config = TopConfig::from_design(design);
    if let Some(lock) = config.lock {
        top_config.lock = lock;
    }
    top_config.stall = config.stall;
    top_config.frames = config.frames.clone();

    let mut kernel = SimKernel::new(Top::new(&plan, &top_config)?);
    if let Some(path) = &config.waveform_path {
        let writer = BufWriter::new(File::create(path)?);
        kernel.set_recorder(Box::new(VcdRecorder::new(writer)))?;
    }

    let limit = config.time_limit.unwrap_or(DEFAULT_TIME_LIMIT_FS);
    let result = kernel.run_until(SimTime::from_fs(limit))?;
    kernel.finish()?;

    tracing::info!(
        design = %design.name,
        time = %result.final_time,
        locked = result.locked,
        "simulation finished"
    );
    Ok(result)
}
