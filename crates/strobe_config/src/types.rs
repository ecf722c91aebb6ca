//! Configuration types deserialized from `strobe.toml`.

use serde::{Deserialize, Serialize};

/// The top-level configuration parsed from `strobe.toml`.
///
/// Describes the reference clock, the multiply/divide stage, the derived
/// clock domain table, the calibration gate, the streaming bridge, and the
/// defaults for simulation runs.
#[derive(Debug, Deserialize)]
pub struct ProjectConfig {
    /// Project metadata.
    pub project: ProjectMeta,
    /// The single external reference clock.
    pub reference: ReferenceConfig,
    /// Multiply/divide stage settings.
    #[serde(default)]
    pub pll: PllSettings,
    /// Reset synchronizer settings shared by every resettable domain.
    #[serde(default)]
    pub reset: ResetSettings,
    /// Ordered clock domain table. Order determines PLL output assignment.
    #[serde(default)]
    pub domains: Vec<DomainDef>,
    /// Calibration gate sequencer, if the design has a dependent
    /// calibration block.
    #[serde(default)]
    pub calibration: Option<CalibrationSettings>,
    /// Streaming FIFO bridge, if present.
    #[serde(default)]
    pub bridge: Option<BridgeSettings>,
    /// Defaults for `strobe sim`.
    #[serde(default)]
    pub sim: SimSettings,
}

/// Project metadata.
#[derive(Debug, Deserialize)]
pub struct ProjectMeta {
    /// The project name.
    pub name: String,
    /// A brief description of the project.
    #[serde(default)]
    pub description: String,
}

/// The external reference clock input.
#[derive(Debug, Deserialize)]
pub struct ReferenceConfig {
    /// Reference frequency (e.g. `"100MHz"`).
    pub frequency: String,
    /// Name of the board port carrying the reference clock.
    #[serde(default = "default_reference_port")]
    pub port: String,
}

fn default_reference_port() -> String {
    "clk".to_string()
}

/// Multiply/divide stage settings.
///
/// When `mult` and `divide` are both omitted the planner searches for the
/// best legal combination. Limit overrides replace the device defaults.
#[derive(Debug, Default, Deserialize)]
pub struct PllSettings {
    /// Explicit feedback multiplier (M).
    pub mult: Option<u32>,
    /// Explicit input divider (D).
    pub divide: Option<u32>,
    /// Reference cycles between power-up and `locked` in simulation.
    pub lock_cycles: Option<u64>,
    /// Lower VCO bound override (e.g. `"800MHz"`).
    pub vco_min: Option<String>,
    /// Upper VCO bound override (e.g. `"1600MHz"`).
    pub vco_max: Option<String>,
}

/// Reset synchronizer settings.
#[derive(Debug, Deserialize)]
pub struct ResetSettings {
    /// Number of synchronizer flip-flop stages (2 to 16).
    #[serde(default = "default_sync_stages")]
    pub sync_stages: u32,
}

impl Default for ResetSettings {
    fn default() -> Self {
        Self {
            sync_stages: default_sync_stages(),
        }
    }
}

fn default_sync_stages() -> u32 {
    2
}

/// Whether a domain's reset passes through a lock-qualified synchronizer.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ResetPolicy {
    /// Reset derived from `!locked || raw_request` through a synchronizer.
    #[default]
    Resettable,
    /// No reset; logic must tolerate the clock's power-up instability.
    ResetLess,
}

/// Where a domain's clock comes from.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ClockSource {
    /// An output divider of the multiply/divide stage.
    #[default]
    Pll,
    /// The reference clock itself, through a clock buffer.
    Reference,
}

/// One row of the clock domain table.
#[derive(Debug, Deserialize)]
pub struct DomainDef {
    /// Domain name (e.g. `"sys"`, `"clk200"`).
    pub name: String,
    /// Target frequency (e.g. `"400MHz"`).
    pub frequency: String,
    /// Phase offset in degrees relative to the VCO-aligned zero.
    #[serde(default)]
    pub phase: f64,
    /// Reset policy.
    #[serde(default)]
    pub reset: ResetPolicy,
    /// Clock source.
    #[serde(default)]
    pub source: ClockSource,
    /// Reserve the PLL output without buffering it into a domain.
    #[serde(default)]
    pub reserved: bool,
    /// OR the external reset request line into this domain's reset.
    #[serde(default)]
    pub external_reset: bool,
}

/// Calibration gate settings.
#[derive(Debug, Deserialize)]
pub struct CalibrationSettings {
    /// The domain whose cycles are counted.
    pub domain: String,
    /// Cycles to hold the dependent block in reset.
    #[serde(default = "default_hold_cycles")]
    pub hold_cycles: u32,
}

fn default_hold_cycles() -> u32 {
    15
}

/// Streaming FIFO bridge settings.
#[derive(Debug, Deserialize)]
pub struct BridgeSettings {
    /// The domain clocking the bridge.
    #[serde(default = "default_bridge_domain")]
    pub domain: String,
    /// Payload word width in bits.
    #[serde(default = "default_bridge_width")]
    pub width: u32,
    /// Number of buffered frames.
    #[serde(default = "default_bridge_capacity")]
    pub capacity: u32,
    /// Byte-enable value driven to the attached PHY. Defaults to all bytes.
    pub byte_enable: Option<u8>,
}

fn default_bridge_domain() -> String {
    "sys".to_string()
}

fn default_bridge_width() -> u32 {
    32
}

fn default_bridge_capacity() -> u32 {
    8192
}

/// Defaults applied by `strobe sim` when no CLI override is given.
#[derive(Debug, Default, Deserialize)]
pub struct SimSettings {
    /// Simulation duration (e.g. `"2us"`).
    pub time: Option<String>,
    /// Payloads the host pushes through the loopback.
    #[serde(default)]
    pub frames: Vec<u32>,
    /// Seed for stall injection. No stalls when absent.
    pub stall_seed: Option<u64>,
    /// Probability in `[0, 1]` that either side stalls on a given cycle.
    #[serde(default)]
    pub stall_probability: f64,
}
