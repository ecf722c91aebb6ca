//! Lock-qualified reset synchronizer.
//!
//! Reset is requested asynchronously whenever the PLL is unlocked or the raw
//! external request is high. Assertion is immediate: every stage is preset at
//! once. De-assertion is sampled through a shift register clocked by the
//! owning domain, so `reset_out` only falls on a local clock edge and never
//! in the same edge that first observes the release.

use crate::error::SimError;

/// Minimum number of synchronizer stages.
pub const MIN_SYNC_STAGES: u32 = 2;

/// Maximum number of synchronizer stages.
pub const MAX_SYNC_STAGES: u32 = 16;

/// Per-domain reset state.
///
/// Initial state: unlocked, no raw request, every stage asserted.
#[derive(Debug, Clone)]
pub struct ResetSynchronizer {
    raw_request: bool,
    lock: bool,
    stages: Vec<bool>,
}

impl ResetSynchronizer {
    /// Creates a synchronizer with `depth` stages, held in reset.
    pub fn new(depth: u32) -> Result<Self, SimError> {
        if !(MIN_SYNC_STAGES..=MAX_SYNC_STAGES).contains(&depth) {
            return Err(SimError::InvalidSyncDepth(depth));
        }
        Ok(Self {
            raw_request: false,
            lock: false,
            stages: vec![true; depth as usize],
        })
    }

    /// Number of stages.
    pub fn depth(&self) -> usize {
        self.stages.len()
    }

    /// Updates the asynchronous inputs. Assertion takes effect immediately.
    pub fn drive(&mut self, locked: bool, raw_request: bool) {
        self.lock = locked;
        self.raw_request = raw_request;
        if self.async_reset() {
            self.stages.fill(true);
        }
    }

    /// The unsynchronized reset request: `!lock || raw_request`.
    pub fn async_reset(&self) -> bool {
        !self.lock || self.raw_request
    }

    /// Advances one edge of the owning domain's clock and returns the new
    /// `reset_out`.
    pub fn clock(&mut self) -> bool {
        if self.async_reset() {
            self.stages.fill(true);
        } else {
            self.stages.rotate_right(1);
            self.stages[0] = false;
        }
        self.reset_out()
    }

    /// The synchronized, active-high reset for the owning domain.
    pub fn reset_out(&self) -> bool {
        self.stages.last().copied().unwrap_or(true)
    }
}
