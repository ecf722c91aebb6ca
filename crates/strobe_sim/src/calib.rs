//! Calibration gate sequencer.
//!
//! Holds a dependent calibration block in reset for a fixed number of cycles
//! of its reference domain once that domain leaves reset, then releases it.
//! Release is monotonic: only a reset of the reference domain (an upstream
//! full reset) puts the gate back into [`GateState::Hold`].

use serde::Serialize;

/// Hold duration used by the reference design, in reference-domain cycles.
pub const DEFAULT_HOLD_CYCLES: u32 = 15;

/// Gate state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GateState {
    /// Dependent block held in reset; countdown running.
    Hold,
    /// Dependent block released. Terminal until an upstream reset.
    Released,
}

/// Timed reset hold for a dependent subsystem.
#[derive(Debug, Clone)]
pub struct CalibrationGate {
    hold_cycles: u32,
    countdown: u32,
    state: GateState,
}

impl CalibrationGate {
    /// Creates a gate in `Hold` with the countdown at `hold_cycles`.
    pub fn new(hold_cycles: u32) -> Self {
        Self {
            hold_cycles,
            countdown: hold_cycles,
            state: GateState::Hold,
        }
    }

    /// Advances one reference-domain edge. `domain_in_reset` is the domain's
    /// reset as seen before the edge. Returns `true` on the edge that
    /// releases the gate.
    pub fn clock(&mut self, domain_in_reset: bool) -> bool {
        if domain_in_reset {
            self.rearm();
            return false;
        }
        if self.state == GateState::Released {
            return false;
        }
        self.countdown = self.countdown.saturating_sub(1);
        if self.countdown == 0 {
            self.state = GateState::Released;
            true
        } else {
            false
        }
    }

    /// Asynchronous upstream reset: back to `Hold` with a full countdown.
    pub fn rearm(&mut self) {
        self.countdown = self.hold_cycles;
        self.state = GateState::Hold;
    }

    /// Active-high reset driven into the dependent block.
    pub fn reset_output(&self) -> bool {
        self.state == GateState::Hold
    }

    /// Current state.
    pub fn state(&self) -> GateState {
        self.state
    }

    /// Remaining hold cycles.
    pub fn countdown(&self) -> u32 {
        self.countdown
    }

    /// Configured hold duration.
    pub fn hold_cycles(&self) -> u32 {
        self.hold_cycles
    }
}

impl Default for CalibrationGate {
    fn default() -> Self {
        Self::new(DEFAULT_HOLD_CYCLES)
    }
}
