//! Clock domain generator: multiply/divide planning and the behavioral PLL.
//!
//! A [`ClockPlan`] is the single declarative node standing in for the PLL and
//! its feedback path: one reference, one `(M, D)` pair, and one integer output
//! divider plus phase per domain. Every output shares the VCO
//! (`F_ref * M / D`) and is phase-coherent with the others by construction.
//! Planning happens once, at configuration time; a plan that cannot
//! reproduce every requested frequency exactly is rejected.
//!
//! [`PllModel`] is the run-time half: it only exposes `locked`, asserted
//! after a fixed number of reference cycles.

use serde::Serialize;
use strobe_common::Frequency;
use strobe_config::{ClockSource, DomainRequest, ResetPolicy, ResolvedDesign};

use crate::error::SimError;
use crate::time::FS_PER_S;

/// Electrical limits of a multiply/divide clocking primitive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PllLimits {
    /// Lowest reference frequency.
    pub input_min: Frequency,
    /// Highest reference frequency.
    pub input_max: Frequency,
    /// Lowest phase-frequency detector frequency (`F_ref / D`).
    pub pfd_min: Frequency,
    /// Highest phase-frequency detector frequency.
    pub pfd_max: Frequency,
    /// Lowest VCO frequency.
    pub vco_min: Frequency,
    /// Highest VCO frequency.
    pub vco_max: Frequency,
    /// Legal feedback multipliers `M`.
    pub mult_min: u32,
    /// Highest feedback multiplier.
    pub mult_max: u32,
    /// Lowest input divider `D`.
    pub divide_min: u32,
    /// Highest input divider.
    pub divide_max: u32,
    /// Lowest output divider `O`.
    pub output_divide_min: u32,
    /// Highest output divider.
    pub output_divide_max: u32,
    /// Number of clock outputs.
    pub max_outputs: usize,
    /// Phase steps per VCO period.
    pub phase_steps_per_vco: u32,
}

impl PllLimits {
    /// Xilinx 7-series PLLE2 limits for the slowest speed grade.
    pub fn artix7() -> Self {
        Self {
            input_min: Frequency::from_mhz(19),
            input_max: Frequency::from_mhz(800),
            pfd_min: Frequency::from_mhz(19),
            pfd_max: Frequency::from_mhz(450),
            vco_min: Frequency::from_mhz(800),
            vco_max: Frequency::from_mhz(1600),
            mult_min: 2,
            mult_max: 64,
            divide_min: 1,
            divide_max: 56,
            output_divide_min: 1,
            output_divide_max: 128,
            max_outputs: 6,
            phase_steps_per_vco: 8,
        }
    }

    /// Applies VCO overrides from the configuration.
    pub fn with_overrides(mut self, vco_min: Option<Frequency>, vco_max: Option<Frequency>) -> Self {
        if let Some(min) = vco_min {
            self.vco_min = min;
        }
        if let Some(max) = vco_max {
            self.vco_max = max;
        }
        self
    }
}

impl Default for PllLimits {
    fn default() -> Self {
        Self::artix7()
    }
}

/// A fully derived clock domain. Immutable once planned.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClockDomainSpec {
    /// Domain name.
    pub name: String,
    /// Where the clock comes from.
    pub source: ClockSource,
    /// Exact output frequency.
    pub frequency: Frequency,
    /// Numerator of `frequency / reference`, in lowest terms.
    pub multiply: u64,
    /// Denominator of `frequency / reference`, in lowest terms.
    pub divide: u64,
    /// PLL output index, for PLL-sourced outputs.
    pub output_index: Option<usize>,
    /// PLL output divider `O`, for PLL-sourced outputs.
    pub output_divide: Option<u32>,
    /// Phase offset in degrees.
    pub phase_deg: f64,
    /// Phase offset in VCO phase steps.
    pub phase_steps: u32,
    /// Phase offset in femtoseconds.
    pub phase_offset_fs: u64,
    /// Reset policy.
    pub reset_policy: ResetPolicy,
    /// Whether the external reset request feeds this domain.
    pub external_reset: bool,
    /// Output reserved; no domain logic is clocked by it.
    pub reserved: bool,
}

impl ClockDomainSpec {
    /// Whether a synchronizer guards this domain's reset.
    pub fn is_resettable(&self) -> bool {
        self.reset_policy == ResetPolicy::Resettable && !self.reserved
    }
}

/// The planned clock tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClockPlan {
    /// Reference frequency.
    pub reference: Frequency,
    /// Board port of the reference clock.
    pub reference_port: String,
    /// Feedback multiplier `M`.
    pub mult: u32,
    /// Input divider `D`.
    pub divide: u32,
    /// VCO frequency, `reference * M / D`.
    pub vco: Frequency,
    /// Derived domains in declaration order.
    pub domains: Vec<ClockDomainSpec>,
    /// Reference cycles until lock in the behavioral model.
    pub lock_cycles: u64,
}

/// Per-output result of evaluating one `(M, D)` candidate.
struct OutputAssignment {
    divide: u32,
    phase_steps: u32,
}

impl ClockPlan {
    /// Plans the clock tree for a resolved design.
    ///
    /// Honours an explicit `(M, D)` pair; otherwise picks the legal pair with
    /// the highest VCO, then the smallest `D`.
    pub fn plan(design: &ResolvedDesign, limits: &PllLimits) -> Result<Self, SimError> {
        let reference = design.reference;
        if reference < limits.input_min || reference > limits.input_max {
            return Err(SimError::InputOutOfRange {
                reference,
                min: limits.input_min,
                max: limits.input_max,
            });
        }

        let outputs: Vec<&DomainRequest> = design
            .domains
            .iter()
            .filter(|d| d.source == ClockSource::Pll)
            .collect();
        if outputs.len() > limits.max_outputs {
            return Err(SimError::TooManyOutputs {
                requested: outputs.len(),
                available: limits.max_outputs,
            });
        }

        let (mult, divide, vco, assignments) = match design.pll.fixed_ratio {
            Some((m, d)) => {
                check_range("mult", m as u64, limits.mult_min, limits.mult_max)?;
                check_range("divide", d as u64, limits.divide_min, limits.divide_max)?;
                let (vco, assignments) = evaluate(reference, m, d, &outputs, limits)?;
                (m, d, vco, assignments)
            }
            None => search(reference, &outputs, limits)?,
        };

        tracing::debug!(
            %reference,
            mult,
            divide,
            %vco,
            "planned multiply/divide stage"
        );

        let mut assignments = assignments.into_iter();
        let mut domains = Vec::with_capacity(design.domains.len());
        let mut output_index = 0;
        for request in &design.domains {
            let (multiply, divide_ratio) =
                request.frequency.ratio_to(reference).unwrap_or((1, 1));
            let spec = match request.source {
                ClockSource::Pll => {
                    let assign = assignments.next().ok_or_else(|| SimError::UnknownDomain(
                        request.name.clone(),
                    ))?;
                    let index = output_index;
                    output_index += 1;
                    ClockDomainSpec {
                        name: request.name.clone(),
                        source: ClockSource::Pll,
                        frequency: request.frequency,
                        multiply,
                        divide: divide_ratio,
                        output_index: Some(index),
                        output_divide: Some(assign.divide),
                        phase_deg: request.phase_deg,
                        phase_steps: assign.phase_steps,
                        phase_offset_fs: phase_offset_fs(
                            vco,
                            assign.phase_steps,
                            limits.phase_steps_per_vco,
                        ),
                        reset_policy: request.reset,
                        external_reset: request.external_reset,
                        reserved: request.reserved,
                    }
                }
                ClockSource::Reference => ClockDomainSpec {
                    name: request.name.clone(),
                    source: ClockSource::Reference,
                    frequency: reference,
                    multiply: 1,
                    divide: 1,
                    output_index: None,
                    output_divide: None,
                    phase_deg: 0.0,
                    phase_steps: 0,
                    phase_offset_fs: 0,
                    reset_policy: request.reset,
                    external_reset: request.external_reset,
                    reserved: false,
                },
            };
            domains.push(spec);
        }

        Ok(Self {
            reference,
            reference_port: design.reference_port.clone(),
            mult,
            divide,
            vco,
            domains,
            lock_cycles: design.pll.lock_cycles,
        })
    }

    /// Looks up a domain by name.
    pub fn domain(&self, name: &str) -> Option<&ClockDomainSpec> {
        self.domains.iter().find(|d| d.name == name)
    }

    /// Index of a domain in [`ClockPlan::domains`].
    pub fn domain_index(&self, name: &str) -> Option<usize> {
        self.domains.iter().position(|d| d.name == name)
    }
}

fn check_range(name: &str, value: u64, min: u32, max: u32) -> Result<(), SimError> {
    if value < min as u64 || value > max as u64 {
        return Err(SimError::DividerOutOfRange {
            name: name.to_string(),
            value,
            min,
            max,
        });
    }
    Ok(())
}

/// Checks one `(M, D)` candidate against the limits and every PLL output.
fn evaluate(
    reference: Frequency,
    mult: u32,
    divide: u32,
    outputs: &[&DomainRequest],
    limits: &PllLimits,
) -> Result<(Frequency, Vec<OutputAssignment>), SimError> {
    // F_ref / D is compared without division to stay exact.
    let ref_hz = reference.hz() as u128;
    let d = divide as u128;
    if ref_hz < limits.pfd_min.hz() as u128 * d || ref_hz > limits.pfd_max.hz() as u128 * d {
        return Err(SimError::PfdOutOfRange {
            pfd: Frequency::new(reference.hz() / divide.max(1) as u64),
            min: limits.pfd_min,
            max: limits.pfd_max,
        });
    }

    let vco = reference
        .scale(mult as u64, divide as u64)
        .ok_or(SimError::NoValidPll { reference })?;
    if vco < limits.vco_min || vco > limits.vco_max {
        return Err(SimError::VcoOutOfRange {
            vco,
            min: limits.vco_min,
            max: limits.vco_max,
        });
    }

    let mut assignments = Vec::with_capacity(outputs.len());
    for request in outputs {
        let o = vco
            .exact_div(request.frequency)
            .ok_or_else(|| SimError::UnrealizableFrequency {
                domain: request.name.clone(),
                target: request.frequency,
                vco,
            })?;
        check_range(
            &format!("domains.{}.divide", request.name),
            o,
            limits.output_divide_min,
            limits.output_divide_max,
        )?;
        let o = o as u32;
        let phase_steps = phase_steps(request, o, limits.phase_steps_per_vco)?;
        assignments.push(OutputAssignment {
            divide: o,
            phase_steps,
        });
    }
    Ok((vco, assignments))
}

/// Converts a phase in degrees into VCO phase steps for output divider `o`.
fn phase_steps(request: &DomainRequest, o: u32, steps_per_vco: u32) -> Result<u32, SimError> {
    let steps_per_output = (o * steps_per_vco) as f64;
    let exact = request.phase_deg * steps_per_output / 360.0;
    let rounded = exact.round();
    if (exact - rounded).abs() > 1e-6 {
        return Err(SimError::PhaseNotRepresentable {
            domain: request.name.clone(),
            phase_deg: request.phase_deg,
            step_deg: 360.0 / steps_per_output,
        });
    }
    Ok(rounded as u32)
}

fn phase_offset_fs(vco: Frequency, steps: u32, steps_per_vco: u32) -> u64 {
    let num = steps as u128 * FS_PER_S as u128;
    let den = vco.hz() as u128 * steps_per_vco as u128;
    u64::try_from(num / den.max(1)).unwrap_or(u64::MAX)
}

fn search(
    reference: Frequency,
    outputs: &[&DomainRequest],
    limits: &PllLimits,
) -> Result<(u32, u32, Frequency, Vec<OutputAssignment>), SimError> {
    let mut best: Option<(u32, u32, Frequency, Vec<OutputAssignment>)> = None;
    for divide in limits.divide_min..=limits.divide_max {
        for mult in limits.mult_min..=limits.mult_max {
            let Ok((vco, assignments)) = evaluate(reference, mult, divide, outputs, limits) else {
                continue;
            };
            let better = match &best {
                None => true,
                Some((_, _, best_vco, _)) => vco > *best_vco,
            };
            if better {
                best = Some((mult, divide, vco, assignments));
            }
        }
    }
    best.ok_or(SimError::NoValidPll { reference })
}

/// How the behavioral PLL acquires lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LockBehavior {
    /// Lock after this many reference cycles.
    AfterCycles(u64),
    /// Never lock (e.g. missing or out-of-range reference).
    Never,
}

/// Behavioral model of the PLL's lock output.
///
/// Initial state: unlocked, zero reference cycles observed.
#[derive(Debug, Clone)]
pub struct PllModel {
    behavior: LockBehavior,
    cycles: u64,
    locked: bool,
}

impl PllModel {
    /// Creates an unlocked PLL.
    pub fn new(behavior: LockBehavior) -> Self {
        Self {
            behavior,
            cycles: 0,
            locked: false,
        }
    }

    /// Current lock status. Asynchronous to every derived domain.
    pub fn locked(&self) -> bool {
        self.locked
    }

    /// Advances the lock counter on a reference edge. Returns `true` when
    /// `locked` changed on this edge.
    pub fn on_reference_edge(&mut self) -> bool {
        if self.locked {
            return false;
        }
        match self.behavior {
            LockBehavior::Never => false,
            LockBehavior::AfterCycles(n) => {
                self.cycles += 1;
                if self.cycles >= n {
                    self.locked = true;
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Drops lock and restarts acquisition. Returns `true` if lock was held.
    pub fn unlock(&mut self) -> bool {
        let was_locked = self.locked;
        self.locked = false;
        self.cycles = 0;
        was_locked
    }
}
