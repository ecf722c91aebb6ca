//! Simulation time with femtosecond precision and clock edge arithmetic.
//!
//! [`SimTime`] is a point on the global timeline. Edge `k` of a clock with
//! frequency `f` and offset `o` lands at `o + floor(k * 1e15 / f)` fs, which
//! keeps long runs drift-free even when the period is not a whole number of
//! femtoseconds.

use serde::{Deserialize, Serialize};
use std::fmt;

use strobe_common::Frequency;

/// Femtoseconds per picosecond.
pub const FS_PER_PS: u64 = 1_000;
/// Femtoseconds per nanosecond.
pub const FS_PER_NS: u64 = 1_000_000;
/// Femtoseconds per microsecond.
pub const FS_PER_US: u64 = 1_000_000_000;
/// Femtoseconds per millisecond.
pub const FS_PER_MS: u64 = 1_000_000_000_000;
/// Femtoseconds per second.
pub const FS_PER_S: u64 = 1_000_000_000_000_000;

/// A simulation time point with femtosecond resolution.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct SimTime {
    /// Simulation time in femtoseconds.
    pub fs: u64,
}

impl SimTime {
    /// Time zero.
    pub fn zero() -> Self {
        Self { fs: 0 }
    }

    /// Creates a time from a nanosecond value.
    pub fn from_ns(ns: u64) -> Self {
        Self { fs: ns * FS_PER_NS }
    }

    /// Creates a time from a picosecond value.
    pub fn from_ps(ps: u64) -> Self {
        Self { fs: ps * FS_PER_PS }
    }

    /// Creates a time from a femtosecond value.
    pub fn from_fs(fs: u64) -> Self {
        Self { fs }
    }

    /// Converts to nanoseconds (truncated).
    pub fn to_ns(&self) -> u64 {
        self.fs / FS_PER_NS
    }
}

/// Time of rising edge `cycle` of a clock at `freq` shifted by `offset_fs`.
pub fn edge_time(freq: Frequency, cycle: u64, offset_fs: u64) -> SimTime {
    let hz = freq.hz().max(1) as u128;
    let t = (cycle as u128 * FS_PER_S as u128) / hz;
    SimTime::from_fs(offset_fs.saturating_add(u64::try_from(t).unwrap_or(u64::MAX)))
}

/// One clock period in femtoseconds, rounded down.
pub fn period_fs(freq: Frequency) -> u64 {
    FS_PER_S / freq.hz().max(1)
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fs = self.fs;
        if fs == 0 {
            write!(f, "0 fs")
        } else if fs >= FS_PER_MS && fs.is_multiple_of(FS_PER_MS) {
            write!(f, "{} ms", fs / FS_PER_MS)
        } else if fs >= FS_PER_US && fs.is_multiple_of(FS_PER_US) {
            write!(f, "{} us", fs / FS_PER_US)
        } else if fs >= FS_PER_NS && fs.is_multiple_of(FS_PER_NS) {
            write!(f, "{} ns", fs / FS_PER_NS)
        } else if fs >= FS_PER_PS && fs.is_multiple_of(FS_PER_PS) {
            write!(f, "{} ps", fs / FS_PER_PS)
        } else {
            write!(f, "{fs} fs")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors() {
        assert_eq!(SimTime::from_ns(10).fs, 10_000_000);
        assert_eq!(SimTime::from_ps(500).fs, 500_000);
        assert_eq!(SimTime::from_fs(42).fs, 42);
        assert_eq!(SimTime::default(), SimTime::zero());
    }

    #[test]
    fn to_ns_truncates() {
        assert_eq!(SimTime::from_fs(1_500_000).to_ns(), 1);
    }

    #[test]
    fn edge_times_100mhz() {
        let f = Frequency::from_mhz(100);
        assert_eq!(edge_time(f, 0, 0), SimTime::zero());
        assert_eq!(edge_time(f, 1, 0), SimTime::from_ns(10));
        assert_eq!(edge_time(f, 15, 0), SimTime::from_ns(150));
    }

    #[test]
    fn edge_times_with_offset() {
        let f = Frequency::from_mhz(400);
        assert_eq!(edge_time(f, 0, 625_000), SimTime::from_ps(625));
        assert_eq!(edge_time(f, 1, 625_000), SimTime::from_ps(3125));
    }

    #[test]
    fn edge_times_do_not_drift() {
        // 3 MHz has a non-integer femtosecond period.
        let f = Frequency::from_mhz(3);
        assert_eq!(edge_time(f, 3, 0), SimTime::from_ns(1000));
        assert_eq!(period_fs(f), 333_333_333);
    }

    #[test]
    fn display_units() {
        assert_eq!(SimTime::zero().to_string(), "0 fs");
        assert_eq!(SimTime::from_ns(10).to_string(), "10 ns");
        assert_eq!(SimTime::from_ps(625).to_string(), "625 ps");
        assert_eq!(SimTime::from_fs(5 * FS_PER_US).to_string(), "5 us");
        assert_eq!(SimTime::from_fs(2 * FS_PER_MS).to_string(), "2 ms");
        assert_eq!(SimTime::from_fs(1500).to_string(), "1500 fs");
    }

    #[test]
    fn ordering() {
        assert!(SimTime::from_ns(1) < SimTime::from_ns(2));
    }

    #[test]
    fn serde_roundtrip() {
        let t = SimTime::from_fs(12345);
        let json = serde_json::to_string(&t).unwrap();
        let back: SimTime = serde_json::from_str(&json).unwrap();
        assert_eq!(t, back);
    }
}
