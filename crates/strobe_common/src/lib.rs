//! Shared foundational types used across the Strobe clock/reset workspace.
//!
//! This crate provides exact integer frequencies and the rational arithmetic
//! the clock planner relies on to prove that every derived clock is an exact
//! multiple of the reference.

#![warn(missing_docs)]

pub mod frequency;

pub use frequency::{gcd, Frequency, ParseFrequencyError};
