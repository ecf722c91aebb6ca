//! Exact frequency values with unit parsing and display.
//!
//! Frequencies are stored as whole Hertz so that ratios between clocks can be
//! checked exactly. Parsing accepts decimal mantissas ("44.1KHz") as long as
//! the result is a whole number of Hertz.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A frequency value stored as an exact number of Hertz.
///
/// Supports parsing from strings like "50MHz", "100KHz", "1.6GHz", "48000Hz",
/// and bare integers (interpreted as Hz). Displays using the most appropriate
/// unit for readability.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Frequency(u64);

impl Frequency {
    /// Creates a new frequency from a value in Hertz.
    pub const fn new(hz: u64) -> Self {
        Self(hz)
    }

    /// Creates a frequency from a whole number of megahertz.
    pub const fn from_mhz(mhz: u64) -> Self {
        Self(mhz * 1_000_000)
    }

    /// Returns the frequency in Hertz.
    pub fn hz(&self) -> u64 {
        self.0
    }

    /// Returns the frequency in kilohertz.
    pub fn khz(&self) -> f64 {
        self.0 as f64 / 1_000.0
    }

    /// Returns the frequency in megahertz.
    pub fn mhz(&self) -> f64 {
        self.0 as f64 / 1_000_000.0
    }

    /// Returns the frequency in gigahertz.
    pub fn ghz(&self) -> f64 {
        self.0 as f64 / 1_000_000_000.0
    }

    /// Returns `true` for a 0 Hz value.
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Multiplies by `num / den`, returning `None` unless the result is a
    /// whole number of Hertz (or `den` is zero).
    pub fn scale(&self, num: u64, den: u64) -> Option<Frequency> {
        if den == 0 {
            return None;
        }
        let product = (self.0 as u128) * (num as u128);
        if product % den as u128 != 0 {
            return None;
        }
        u64::try_from(product / den as u128).ok().map(Frequency)
    }

    /// Returns `self / other` when it is an exact positive integer.
    pub fn exact_div(&self, other: Frequency) -> Option<u64> {
        if other.0 == 0 || self.0 % other.0 != 0 {
            return None;
        }
        Some(self.0 / other.0)
    }

    /// Returns the ratio `self / other` reduced to lowest terms.
    pub fn ratio_to(&self, other: Frequency) -> Option<(u64, u64)> {
        if other.0 == 0 {
            return None;
        }
        let g = gcd(self.0, other.0);
        Some((self.0 / g, other.0 / g))
    }
}

/// Greatest common divisor (Euclid). `gcd(0, 0)` is defined as 1.
pub fn gcd(a: u64, b: u64) -> u64 {
    let (mut a, mut b) = (a, b);
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a.max(1)
}

impl fmt::Debug for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Frequency({self})")
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hz = self.0;
        if hz >= 1_000_000_000 {
            write!(f, "{}GHz", self.ghz())
        } else if hz >= 1_000_000 {
            write!(f, "{}MHz", self.mhz())
        } else if hz >= 1_000 {
            write!(f, "{}KHz", self.khz())
        } else {
            write!(f, "{hz}Hz")
        }
    }
}

/// Error type for parsing frequency strings.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid frequency: '{input}'")]
pub struct ParseFrequencyError {
    /// The input string that failed to parse.
    pub input: String,
}

/// Parses a decimal mantissa and scales it by `scale`, requiring an exact
/// integer result.
fn parse_scaled(num: &str, scale: u64) -> Option<u64> {
    let num = num.trim();
    let (int_part, frac_part) = match num.split_once('.') {
        Some((i, f)) => (i, f),
        None => (num, ""),
    };
    if int_part.is_empty() && frac_part.is_empty() {
        return None;
    }
    if !int_part.chars().all(|c| c.is_ascii_digit())
        || !frac_part.chars().all(|c| c.is_ascii_digit())
    {
        return None;
    }
    let int_val: u64 = if int_part.is_empty() {
        0
    } else {
        int_part.parse().ok()?
    };
    let mut total = int_val.checked_mul(scale)?;
    if !frac_part.is_empty() {
        let digits = u32::try_from(frac_part.len()).ok()?;
        let denom = 10u64.checked_pow(digits)?;
        let frac_val: u64 = frac_part.parse().ok()?;
        let scaled = (frac_val as u128) * (scale as u128);
        if scaled % denom as u128 != 0 {
            return None;
        }
        total = total.checked_add(u64::try_from(scaled / denom as u128).ok()?)?;
    }
    Some(total)
}

impl FromStr for Frequency {
    type Err = ParseFrequencyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let err = || ParseFrequencyError {
            input: s.to_string(),
        };

        let lower = s.to_ascii_lowercase();
        let (num, scale) = if let Some(num) = lower.strip_suffix("ghz") {
            (num, 1_000_000_000)
        } else if let Some(num) = lower.strip_suffix("mhz") {
            (num, 1_000_000)
        } else if let Some(num) = lower.strip_suffix("khz") {
            (num, 1_000)
        } else if let Some(num) = lower.strip_suffix("hz") {
            (num, 1)
        } else {
            (lower.as_str(), 1)
        };

        parse_scaled(num, scale).map(Frequency).ok_or_else(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_ghz() {
        let f: Frequency = "1GHz".parse().unwrap();
        assert_eq!(f.hz(), 1_000_000_000);
    }

    #[test]
    fn parse_mhz() {
        let f: Frequency = "100MHz".parse().unwrap();
        assert_eq!(f.hz(), 100_000_000);
    }

    #[test]
    fn parse_fractional_mantissa() {
        let f: Frequency = "1.6GHz".parse().unwrap();
        assert_eq!(f.hz(), 1_600_000_000);
        let f: Frequency = "44.1KHz".parse().unwrap();
        assert_eq!(f.hz(), 44_100);
    }

    #[test]
    fn parse_sub_hertz_rejected() {
        assert!("0.5Hz".parse::<Frequency>().is_err());
    }

    #[test]
    fn parse_bare_number() {
        let f: Frequency = "25000000".parse().unwrap();
        assert_eq!(f.hz(), 25_000_000);
    }

    #[test]
    fn parse_case_insensitive() {
        let f: Frequency = "200mhz".parse().unwrap();
        assert_eq!(f, Frequency::from_mhz(200));
    }

    #[test]
    fn parse_invalid() {
        assert!("not_a_freq".parse::<Frequency>().is_err());
        assert!("-5MHz".parse::<Frequency>().is_err());
        assert!("MHz".parse::<Frequency>().is_err());
    }

    #[test]
    fn scale_exact_and_inexact() {
        let f = Frequency::from_mhz(100);
        assert_eq!(f.scale(16, 1), Some(Frequency::from_mhz(1600)));
        assert_eq!(f.scale(16, 4), Some(Frequency::from_mhz(400)));
        assert_eq!(Frequency::new(100).scale(1, 3), None);
        assert_eq!(f.scale(1, 0), None);
    }

    #[test]
    fn exact_div() {
        let vco = Frequency::from_mhz(1600);
        assert_eq!(vco.exact_div(Frequency::from_mhz(400)), Some(4));
        assert_eq!(vco.exact_div(Frequency::from_mhz(300)), None);
    }

    #[test]
    fn ratio_is_reduced() {
        let a = Frequency::from_mhz(400);
        let b = Frequency::from_mhz(100);
        assert_eq!(a.ratio_to(b), Some((4, 1)));
        assert_eq!(b.ratio_to(Frequency::from_mhz(150)), Some((2, 3)));
    }

    #[test]
    fn gcd_basics() {
        assert_eq!(gcd(12, 18), 6);
        assert_eq!(gcd(7, 0), 7);
        assert_eq!(gcd(0, 0), 1);
    }

    #[test]
    fn display_selects_best_unit() {
        assert_eq!(Frequency::new(1_600_000_000).to_string(), "1.6GHz");
        assert_eq!(Frequency::from_mhz(400).to_string(), "400MHz");
        assert_eq!(Frequency::new(44_100).to_string(), "44.1KHz");
        assert_eq!(Frequency::new(500).to_string(), "500Hz");
    }

    #[test]
    fn serde_roundtrip() {
        let f = Frequency::from_mhz(200);
        let json = serde_json::to_string(&f).unwrap();
        let back: Frequency = serde_json::from_str(&json).unwrap();
        assert_eq!(f, back);
    }
}
