//! Resolution of a parsed configuration into exact, typed requests.
//!
//! Frequencies become [`Frequency`] values, defaults are filled in, and
//! constraints that can be checked without planning the clock tree (phase
//! range, reference passthrough rules) are enforced here.

use crate::error::ConfigError;
use crate::types::{ClockSource, ProjectConfig, ResetPolicy};
use strobe_common::Frequency;

/// Reference cycles before the behavioral PLL reports lock, when unset.
pub const DEFAULT_LOCK_CYCLES: u64 = 64;

/// A configuration with every value parsed and defaulted.
#[derive(Debug, Clone)]
pub struct ResolvedDesign {
    /// Project name.
    pub name: String,
    /// Reference clock frequency.
    pub reference: Frequency,
    /// Board port carrying the reference clock.
    pub reference_port: String,
    /// Multiply/divide stage request.
    pub pll: ResolvedPll,
    /// Synchronizer depth for resettable domains.
    pub sync_stages: u32,
    /// Domain table in declaration order.
    pub domains: Vec<DomainRequest>,
    /// Calibration gate request.
    pub calibration: Option<CalibrationRequest>,
    /// Streaming bridge request.
    pub bridge: Option<BridgeRequest>,
}

/// Multiply/divide stage request.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedPll {
    /// Explicit `(M, D)` pair, or `None` to let the planner search.
    pub fixed_ratio: Option<(u32, u32)>,
    /// Reference cycles to lock.
    pub lock_cycles: u64,
    /// Lower VCO bound override.
    pub vco_min: Option<Frequency>,
    /// Upper VCO bound override.
    pub vco_max: Option<Frequency>,
}

/// One requested clock domain.
#[derive(Debug, Clone, PartialEq)]
pub struct DomainRequest {
    /// Domain name.
    pub name: String,
    /// Exact target frequency.
    pub frequency: Frequency,
    /// Phase offset in degrees, `0 <= phase < 360`.
    pub phase_deg: f64,
    /// Reset policy.
    pub reset: ResetPolicy,
    /// Clock source.
    pub source: ClockSource,
    /// Output is reserved and not buffered.
    pub reserved: bool,
    /// External reset request is OR'd into this domain's reset.
    pub external_reset: bool,
}

/// Calibration gate request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalibrationRequest {
    /// Domain whose cycles are counted.
    pub domain: String,
    /// Hold duration in cycles.
    pub hold_cycles: u32,
}

/// Streaming bridge request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeRequest {
    /// Domain clocking the bridge.
    pub domain: String,
    /// Payload width in bits.
    pub width: u32,
    /// Buffer capacity in frames.
    pub capacity: u32,
    /// Byte-enable value presented to the PHY.
    pub byte_enable: u8,
}

/// Byte-enable mask with every byte of a `width`-bit word enabled.
pub fn all_bytes_enabled(width: u32) -> u8 {
    let bytes = width.div_ceil(8).min(8);
    ((1u16 << bytes) - 1) as u8
}

fn parse_frequency(field: &str, value: &str) -> Result<Frequency, ConfigError> {
    let f: Frequency = value
        .parse()
        .map_err(|e| ConfigError::ValidationError(format!("{field}: {e}")))?;
    if f.is_zero() {
        return Err(ConfigError::ValidationError(format!(
            "{field}: frequency must be non-zero"
        )));
    }
    Ok(f)
}

/// Resolves a parsed configuration into exact requests.
pub fn resolve_design(config: &ProjectConfig) -> Result<ResolvedDesign, ConfigError> {
    let reference = parse_frequency("reference.frequency", &config.reference.frequency)?;

    let fixed_ratio = match (config.pll.mult, config.pll.divide) {
        (Some(m), Some(d)) => Some((m, d)),
        (None, None) => None,
        (Some(_), None) => return Err(ConfigError::MissingField("pll.divide".to_string())),
        (None, Some(_)) => return Err(ConfigError::MissingField("pll.mult".to_string())),
    };
    let vco_min = config
        .pll
        .vco_min
        .as_deref()
        .map(|v| parse_frequency("pll.vco_min", v))
        .transpose()?;
    let vco_max = config
        .pll
        .vco_max
        .as_deref()
        .map(|v| parse_frequency("pll.vco_max", v))
        .transpose()?;

    let mut domains = Vec::with_capacity(config.domains.len());
    for def in &config.domains {
        let field = format!("domains.{}.frequency", def.name);
        let frequency = parse_frequency(&field, &def.frequency)?;
        if !def.phase.is_finite() || def.phase < 0.0 || def.phase >= 360.0 {
            return Err(ConfigError::ValidationError(format!(
                "domains.{}.phase: {} is outside [0, 360)",
                def.name, def.phase
            )));
        }
        if def.source == ClockSource::Reference {
            if frequency != reference {
                return Err(ConfigError::ValidationError(format!(
                    "domain '{}' is sourced from the reference and must run at {reference}, not {frequency}",
                    def.name
                )));
            }
            if def.phase != 0.0 || def.reserved {
                return Err(ConfigError::ValidationError(format!(
                    "domain '{}' is sourced from the reference and cannot be phase shifted or reserved",
                    def.name
                )));
            }
        }
        domains.push(DomainRequest {
            name: def.name.clone(),
            frequency,
            phase_deg: def.phase,
            reset: def.reset,
            source: def.source,
            reserved: def.reserved,
            external_reset: def.external_reset,
        });
    }

    let calibration = config.calibration.as_ref().map(|c| CalibrationRequest {
        domain: c.domain.clone(),
        hold_cycles: c.hold_cycles,
    });

    let bridge = config.bridge.as_ref().map(|b| BridgeRequest {
        domain: b.domain.clone(),
        width: b.width,
        capacity: b.capacity,
        byte_enable: b.byte_enable.unwrap_or_else(|| all_bytes_enabled(b.width)),
    });

    Ok(ResolvedDesign {
        name: config.project.name.clone(),
        reference,
        reference_port: config.reference.port.clone(),
        pll: ResolvedPll {
            fixed_ratio,
            lock_cycles: config.pll.lock_cycles.unwrap_or(DEFAULT_LOCK_CYCLES),
            vco_min,
            vco_max,
        },
        sync_stages: config.reset.sync_stages,
        domains,
        calibration,
        bridge,
    })
}
