//! Clock/reset generator: the PLL model, every domain's reset synchronizer
//! and the calibration gate, owned in one place.
//!
//! Asynchronous inputs (lock changes, the external reset request) are
//! pushed into every synchronizer as soon as they change. Domain edges only
//! advance the synchronizer and, for the calibration domain, the gate.

use serde::Serialize;
use strobe_config::CalibrationRequest;

use crate::calib::{CalibrationGate, GateState};
use crate::error::SimError;
use crate::pll::{ClockDomainSpec, ClockPlan, LockBehavior, PllModel};
use crate::reset::ResetSynchronizer;
use crate::time::SimTime;

/// Run-time state of one derived domain.
#[derive(Debug, Clone)]
pub struct DomainState {
    spec: ClockDomainSpec,
    sync: Option<ResetSynchronizer>,
    edges: u64,
    released_at: Option<SimTime>,
}

impl DomainState {
    /// The planned domain.
    pub fn spec(&self) -> &ClockDomainSpec {
        &self.spec
    }

    /// Rising edges seen so far.
    pub fn edges(&self) -> u64 {
        self.edges
    }

    /// When the domain's reset last deasserted, if it is currently released.
    pub fn released_at(&self) -> Option<SimTime> {
        self.released_at
    }

    /// The synchronized reset. Reset-less domains are never in reset.
    pub fn in_reset(&self) -> bool {
        self.sync.as_ref().is_some_and(|s| s.reset_out())
    }
}

/// Snapshot of the calibration gate.
#[derive(Debug, Clone, Serialize)]
pub struct CalibrationReport {
    /// Reference domain of the gate.
    pub domain: String,
    /// Gate state.
    pub state: GateState,
    /// Remaining hold cycles.
    pub countdown: u32,
    /// When the gate released, if it has.
    pub released_at: Option<SimTime>,
}

#[derive(Debug, Clone)]
struct GateSlot {
    domain: usize,
    gate: CalibrationGate,
    released_at: Option<SimTime>,
}

/// Owner of lock, resets and the calibration gate.
#[derive(Debug, Clone)]
pub struct ClockResetGenerator {
    pll: PllModel,
    domains: Vec<DomainState>,
    gate: Option<GateSlot>,
    external_request: bool,
    lock_time: Option<SimTime>,
}

impl ClockResetGenerator {
    /// Builds the generator for a plan. Every resettable domain starts in
    /// reset and the PLL starts unlocked.
    pub fn new(
        plan: &ClockPlan,
        sync_stages: u32,
        lock: LockBehavior,
        calibration: Option<&CalibrationRequest>,
    ) -> Result<Self, SimError> {
        let mut domains = Vec::with_capacity(plan.domains.len());
        for spec in &plan.domains {
            let sync = if spec.is_resettable() {
                Some(ResetSynchronizer::new(sync_stages)?)
            } else {
                None
            };
            domains.push(DomainState {
                spec: spec.clone(),
                sync,
                edges: 0,
                released_at: None,
            });
        }

        let gate = match calibration {
            Some(req) => {
                let domain = plan
                    .domain_index(&req.domain)
                    .filter(|&i| !plan.domains[i].reserved)
                    .ok_or_else(|| SimError::UnknownDomain(req.domain.clone()))?;
                Some(GateSlot {
                    domain,
                    gate: CalibrationGate::new(req.hold_cycles),
                    released_at: None,
                })
            }
            None => None,
        };

        Ok(Self {
            pll: PllModel::new(lock),
            domains,
            gate,
            external_request: false,
            lock_time: None,
        })
    }

    /// Current PLL lock status.
    pub fn locked(&self) -> bool {
        self.pll.locked()
    }

    /// When lock was last acquired, if currently locked.
    pub fn lock_time(&self) -> Option<SimTime> {
        self.lock_time
    }

    /// All domains in plan order.
    pub fn domains(&self) -> &[DomainState] {
        &self.domains
    }

    /// Synchronized reset of domain `index`.
    pub fn domain_reset(&self, index: usize) -> bool {
        self.domains.get(index).is_some_and(DomainState::in_reset)
    }

    /// Whether logic clocked by domain `index` must stay idle: the domain is
    /// in reset, or it has no reset and the PLL is unlocked.
    pub fn domain_held(&self, index: usize) -> bool {
        let locked = self.pll.locked();
        self.domains
            .get(index)
            .is_some_and(|d| d.in_reset() || (d.sync.is_none() && !locked))
    }

    /// Reset driven into the calibration collaborator, if a gate exists.
    pub fn calibration_reset(&self) -> Option<bool> {
        self.gate.as_ref().map(|g| g.gate.reset_output())
    }

    /// The calibration gate, if configured.
    pub fn gate(&self) -> Option<&CalibrationGate> {
        self.gate.as_ref().map(|g| &g.gate)
    }

    /// Snapshot of the calibration gate, if configured.
    pub fn calibration_report(&self) -> Option<CalibrationReport> {
        self.gate.as_ref().map(|g| CalibrationReport {
            domain: self.domains[g.domain].spec.name.clone(),
            state: g.gate.state(),
            countdown: g.gate.countdown(),
            released_at: g.released_at,
        })
    }

    /// Reference clock edge: advances the lock counter.
    pub fn on_reference_edge(&mut self, now: SimTime) {
        if self.pll.on_reference_edge() {
            self.lock_time = Some(now);
            tracing::info!(time = %now, "PLL locked");
            self.drive_async(now);
        }
    }

    /// Rising edge of domain `index`.
    pub fn on_domain_edge(&mut self, index: usize, now: SimTime) {
        let locked = self.pll.locked();
        let Some(domain) = self.domains.get_mut(index) else {
            return;
        };
        domain.edges += 1;
        let pre_edge_reset = domain.in_reset() || (domain.sync.is_none() && !locked);

        if let Some(sync) = &mut domain.sync {
            let was = sync.reset_out();
            if was && !sync.clock() {
                domain.released_at = Some(now);
                tracing::debug!(domain = %domain.spec.name, time = %now, "reset released");
            }
        }

        if let Some(slot) = self.gate.as_mut().filter(|g| g.domain == index) {
            if slot.gate.clock(pre_edge_reset) {
                slot.released_at = Some(now);
                tracing::info!(time = %now, "calibration gate released");
            }
        }
    }

    /// Drives the raw external reset request into opted-in domains.
    pub fn set_external_reset(&mut self, asserted: bool, now: SimTime) {
        if self.external_request != asserted {
            self.external_request = asserted;
            self.drive_async(now);
        }
    }

    /// Loss of reference: drops lock immediately.
    pub fn unlock(&mut self, now: SimTime) {
        if self.pll.unlock() {
            tracing::warn!(time = %now, "PLL lost lock");
        }
        self.lock_time = None;
        self.drive_async(now);
    }

    fn drive_async(&mut self, now: SimTime) {
        let locked = self.pll.locked();
        for domain in &mut self.domains {
            let raw = self.external_request && domain.spec.external_reset;
            if let Some(sync) = &mut domain.sync {
                let was = sync.reset_out();
                sync.drive(locked, raw);
                if !was && sync.reset_out() {
                    domain.released_at = None;
                    tracing::debug!(domain = %domain.spec.name, time = %now, "reset asserted");
                }
            }
        }
        if let Some(slot) = &mut self.gate {
            let domain = &self.domains[slot.domain];
            let upstream_reset = domain.in_reset() || (domain.sync.is_none() && !locked);
            if upstream_reset {
                if slot.gate.state() == GateState::Released {
                    slot.released_at = None;
                    tracing::info!(time = %now, "calibration gate re-armed");
                }
                slot.gate.rearm();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strobe_common::Frequency;
    use strobe_config::{ClockSource, DomainRequest, ResetPolicy, ResolvedDesign, ResolvedPll};

    use crate::pll::PllLimits;

    fn plan() -> ClockPlan {
        let request = |name: &str, mhz, reset| DomainRequest {
            name: name.to_string(),
            frequency: Frequency::from_mhz(mhz),
            phase_deg: 0.0,
            reset,
            source: ClockSource::Pll,
            reserved: false,
            external_reset: name == "sys",
        };
        let design = ResolvedDesign {
            name: "t".to_string(),
            reference: Frequency::from_mhz(100),
            reference_port: "clk".to_string(),
            pll: ResolvedPll {
                fixed_ratio: None,
                lock_cycles: 2,
                vco_min: None,
                vco_max: None,
            },
            sync_stages: 2,
            domains: vec![
                request("sys", 100, ResetPolicy::Resettable),
                request("sys4x", 400, ResetPolicy::ResetLess),
                request("clk200", 200, ResetPolicy::Resettable),
            ],
            calibration: None,
            bridge: None,
        };
        ClockPlan::plan(&design, &PllLimits::artix7()).unwrap()
    }

    fn crg(lock: LockBehavior, hold: u32) -> ClockResetGenerator {
        let cal = CalibrationRequest {
            domain: "clk200".to_string(),
            hold_cycles: hold,
        };
        ClockResetGenerator::new(&plan(), 2, lock, Some(&cal)).unwrap()
    }

    fn t(ns: u64) -> SimTime {
        SimTime::from_ns(ns)
    }

    #[test]
    fn initial_state_all_in_reset() {
        let crg = crg(LockBehavior::AfterCycles(2), 3);
        assert!(!crg.locked());
        assert!(crg.domain_reset(0));
        assert!(!crg.domain_reset(1));
        assert!(crg.domain_reset(2));
        assert_eq!(crg.calibration_reset(), Some(true));
    }

    #[test]
    fn lock_then_release_after_depth_edges() {
        let mut crg = crg(LockBehavior::AfterCycles(2), 3);
        crg.on_reference_edge(t(0));
        crg.on_reference_edge(t(10));
        assert!(crg.locked());
        assert_eq!(crg.lock_time(), Some(t(10)));
        assert!(crg.domain_reset(0));
        crg.on_domain_edge(0, t(20));
        assert!(crg.domain_reset(0));
        crg.on_domain_edge(0, t(30));
        assert!(!crg.domain_reset(0));
        assert_eq!(crg.domains()[0].released_at(), Some(t(30)));
    }

    #[test]
    fn gate_counts_only_after_domain_release() {
        let mut crg = crg(LockBehavior::AfterCycles(1), 3);
        crg.on_reference_edge(t(0));
        // Two edges to release clk200, then three hold cycles.
        crg.on_domain_edge(2, t(5));
        crg.on_domain_edge(2, t(10));
        assert_eq!(crg.gate().unwrap().countdown(), 3);
        crg.on_domain_edge(2, t(15));
        crg.on_domain_edge(2, t(20));
        assert_eq!(crg.calibration_reset(), Some(true));
        crg.on_domain_edge(2, t(25));
        assert_eq!(crg.calibration_reset(), Some(false));
        let report = crg.calibration_report().unwrap();
        assert_eq!(report.released_at, Some(t(25)));
        assert_eq!(report.domain, "clk200");
    }

    #[test]
    fn never_locked_is_stuck() {
        let mut crg = crg(LockBehavior::Never, 3);
        for i in 0..200 {
            crg.on_reference_edge(t(i * 10));
            crg.on_domain_edge(0, t(i * 10));
            crg.on_domain_edge(2, t(i * 10 + 5));
        }
        assert!(crg.domain_reset(0));
        assert!(crg.domain_reset(2));
        assert_eq!(crg.gate().unwrap().countdown(), 3);
        assert_eq!(crg.calibration_reset(), Some(true));
    }

    #[test]
    fn unlock_reasserts_and_rearms() {
        let mut crg = crg(LockBehavior::AfterCycles(1), 1);
        crg.on_reference_edge(t(0));
        for i in 1..=3 {
            crg.on_domain_edge(0, t(i * 10));
            crg.on_domain_edge(2, t(i * 10));
        }
        assert!(!crg.domain_reset(0));
        assert_eq!(crg.calibration_reset(), Some(false));

        crg.unlock(t(40));
        assert!(!crg.locked());
        assert!(crg.domain_reset(0));
        assert!(crg.domain_reset(2));
        assert_eq!(crg.calibration_reset(), Some(true));
        assert_eq!(crg.domains()[0].released_at(), None);
    }

    #[test]
    fn external_reset_only_hits_opted_in_domains() {
        let mut crg = crg(LockBehavior::AfterCycles(1), 1);
        crg.on_reference_edge(t(0));
        for i in 1..=2 {
            crg.on_domain_edge(0, t(i * 10));
            crg.on_domain_edge(2, t(i * 10));
        }
        crg.set_external_reset(true, t(30));
        assert!(crg.domain_reset(0));
        assert!(!crg.domain_reset(2));
        crg.set_external_reset(false, t(40));
        crg.on_domain_edge(0, t(50));
        crg.on_domain_edge(0, t(60));
        assert!(!crg.domain_reset(0));
    }

    #[test]
    fn unknown_calibration_domain() {
        let cal = CalibrationRequest {
            domain: "nope".to_string(),
            hold_cycles: 15,
        };
        let err = ClockResetGenerator::new(&plan(), 2, LockBehavior::Never, Some(&cal))
            .unwrap_err();
        assert!(matches!(err, SimError::UnknownDomain(ref n) if n == "nope"));
    }

    #[test]
    fn edges_are_counted() {
        let mut crg = crg(LockBehavior::Never, 1);
        crg.on_domain_edge(1, t(0));
        crg.on_domain_edge(1, t(2));
        assert_eq!(crg.domains()[1].edges(), 2);
    }
}
