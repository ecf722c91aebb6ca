//! Error types for clock planning and simulation.
//!
//! Planning errors are configuration errors: the planner refuses to produce a
//! design instead of emitting one with silently wrong timing. Nothing in the
//! running model reports errors for liveness failures or protocol
//! violations; those are observable states, not faults.

use std::io;

use strobe_common::Frequency;

/// Errors that can occur while planning a clock tree or running a simulation.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    /// The reference frequency is outside the device's input range.
    #[error("reference {reference} is outside the PLL input range {min}..={max}")]
    InputOutOfRange {
        /// The reference frequency.
        reference: Frequency,
        /// Lowest legal input.
        min: Frequency,
        /// Highest legal input.
        max: Frequency,
    },

    /// The phase-frequency detector frequency (F_ref / D) is out of range.
    #[error("PFD frequency {pfd} is outside {min}..={max}")]
    PfdOutOfRange {
        /// The PFD frequency.
        pfd: Frequency,
        /// Lowest legal PFD frequency.
        min: Frequency,
        /// Highest legal PFD frequency.
        max: Frequency,
    },

    /// The VCO frequency is out of range.
    #[error("VCO frequency {vco} is outside {min}..={max}")]
    VcoOutOfRange {
        /// The VCO frequency.
        vco: Frequency,
        /// Lowest legal VCO frequency.
        min: Frequency,
        /// Highest legal VCO frequency.
        max: Frequency,
    },

    /// A divider or multiplier setting is outside its legal range.
    #[error("{name} = {value} is outside {min}..={max}")]
    DividerOutOfRange {
        /// Which setting (`"mult"`, `"divide"`, or an output name).
        name: String,
        /// The requested value.
        value: u64,
        /// Lowest legal value.
        min: u32,
        /// Highest legal value.
        max: u32,
    },

    /// A domain's target cannot be produced exactly from the VCO.
    #[error("domain '{domain}': {target} is not an integer division of VCO {vco}")]
    UnrealizableFrequency {
        /// The domain name.
        domain: String,
        /// The requested frequency.
        target: Frequency,
        /// The VCO frequency it was checked against.
        vco: Frequency,
    },

    /// A domain's phase is not a multiple of the output's phase step.
    #[error("domain '{domain}': phase {phase_deg} deg is not a multiple of {step_deg} deg")]
    PhaseNotRepresentable {
        /// The domain name.
        domain: String,
        /// The requested phase.
        phase_deg: f64,
        /// The phase resolution of that output.
        step_deg: f64,
    },

    /// More PLL outputs were requested than the device provides.
    #[error("{requested} PLL outputs requested, device provides {available}")]
    TooManyOutputs {
        /// Outputs requested.
        requested: usize,
        /// Outputs available.
        available: usize,
    },

    /// No multiply/divide combination satisfies every domain.
    #[error("no PLL configuration from {reference} satisfies every domain")]
    NoValidPll {
        /// The reference frequency.
        reference: Frequency,
    },

    /// The elastic buffer capacity is not a supported size.
    #[error("invalid FIFO capacity {0} (must be between 1 and 1048576)")]
    InvalidCapacity(u32),

    /// The stream word width is not supported.
    #[error("invalid stream width {0} (must be 1..=64 bits)")]
    InvalidWidth(u32),

    /// Reset synchronizers need between two and sixteen stages.
    #[error("invalid synchronizer depth {0} (must be between 2 and 16)")]
    InvalidSyncDepth(u32),

    /// A component was attached to a domain that does not exist in the plan.
    #[error("unknown clock domain '{0}'")]
    UnknownDomain(String),

    /// A waveform signal reference could not be resolved.
    #[error("invalid signal reference: {reason}")]
    InvalidSignalRef {
        /// Description of why the signal reference is invalid.
        reason: String,
    },

    /// An I/O error occurred while writing waveform data.
    #[error("waveform I/O error: {0}")]
    WaveformIo(#[from] io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unrealizable_display() {
        let e = SimError::UnrealizableFrequency {
            domain: "odd".into(),
            target: Frequency::from_mhz(33),
            vco: Frequency::from_mhz(1600),
        };
        assert_eq!(
            e.to_string(),
            "domain 'odd': 33MHz is not an integer division of VCO 1.6GHz"
        );
    }

    #[test]
    fn vco_out_of_range_display() {
        let e = SimError::VcoOutOfRange {
            vco: Frequency::from_mhz(400),
            min: Frequency::from_mhz(800),
            max: Frequency::from_mhz(1600),
        };
        assert_eq!(
            e.to_string(),
            "VCO frequency 400MHz is outside 800MHz..=1.6GHz"
        );
    }

    #[test]
    fn divider_out_of_range_display() {
        let e = SimError::DividerOutOfRange {
            name: "mult".into(),
            value: 65,
            min: 2,
            max: 64,
        };
        assert_eq!(e.to_string(), "mult = 65 is outside 2..=64");
    }

    #[test]
    fn phase_display() {
        let e = SimError::PhaseNotRepresentable {
            domain: "dqs".into(),
            phase_deg: 10.0,
            step_deg: 11.25,
        };
        assert_eq!(
            e.to_string(),
            "domain 'dqs': phase 10 deg is not a multiple of 11.25 deg"
        );
    }

    #[test]
    fn capacity_display() {
        assert_eq!(
            SimError::InvalidCapacity(0).to_string(),
            "invalid FIFO capacity 0 (must be between 1 and 1048576)"
        );
    }

    #[test]
    fn sync_depth_display() {
        assert_eq!(
            SimError::InvalidSyncDepth(1).to_string(),
            "invalid synchronizer depth 1 (must be between 2 and 16)"
        );
    }

    #[test]
    fn waveform_io_display() {
        let e = SimError::WaveformIo(io::Error::new(io::ErrorKind::NotFound, "file not found"));
        assert!(e.to_string().contains("waveform I/O error"));
    }
}
