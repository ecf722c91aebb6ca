//! Composition root: clock/reset generator plus the loopback bridge.
//!
//! Wiring follows the reference board design: `phy.source → bridge.sink`
//! and `bridge.source → phy.sink`, all clocked by the bridge's domain.

use serde::Serialize;
use strobe_config::{BridgeRequest, CalibrationRequest, ResolvedDesign};

use crate::crg::ClockResetGenerator;
use crate::error::SimError;
use crate::fifo::{BridgeStats, StreamBridge};
use crate::phy::{LoopbackPhy, StallPolicy};
use crate::pll::{ClockPlan, LockBehavior};
use crate::stream::HandshakeMonitor;
use crate::time::SimTime;

/// Everything besides the clock plan needed to build a [`Top`].
#[derive(Debug, Clone)]
pub struct TopConfig {
    /// Synchronizer depth for every resettable domain.
    pub sync_stages: u32,
    /// Calibration gate, if any.
    pub calibration: Option<CalibrationRequest>,
    /// Loopback bridge, if any.
    pub bridge: Option<BridgeRequest>,
    /// Behavioral lock model.
    pub lock: LockBehavior,
    /// Backpressure injected by the PHY.
    pub stall: StallPolicy,
    /// Payloads the host sends as one packet.
    pub frames: Vec<u64>,
}

impl TopConfig {
    /// Takes the design's settings; the PLL locks after its configured
    /// latency and the PHY never stalls.
    pub fn from_design(design: &ResolvedDesign) -> Self {
        Self {
            sync_stages: design.sync_stages,
            calibration: design.calibration.clone(),
            bridge: design.bridge.clone(),
            lock: LockBehavior::AfterCycles(design.pll.lock_cycles),
            stall: StallPolicy::None,
            frames: Vec::new(),
        }
    }
}

/// Loopback bridge with its PHY and handshake checker.
#[derive(Debug, Clone)]
pub struct BridgeSlot {
    domain: usize,
    bridge: StreamBridge,
    phy: LoopbackPhy,
    monitor: HandshakeMonitor,
}

impl BridgeSlot {
    /// Index of the bridge's clock domain.
    pub fn domain(&self) -> usize {
        self.domain
    }

    /// The FIFO bridge.
    pub fn bridge(&self) -> &StreamBridge {
        &self.bridge
    }

    /// The PHY model.
    pub fn phy(&self) -> &LoopbackPhy {
        &self.phy
    }

    /// Mutable PHY, for queueing host traffic.
    pub fn phy_mut(&mut self) -> &mut LoopbackPhy {
        &mut self.phy
    }

    /// Producer-side handshake violations seen so far.
    pub fn violations(&self) -> u64 {
        self.monitor.violations()
    }

    fn clock(&mut self, held: bool) {
        if held {
            self.bridge.reset();
            self.monitor.reset();
            return;
        }
        let offered = self.phy.source();
        self.monitor.observe(offered, self.bridge.sink_ready());
        let transfer = self.bridge.clock(offered, self.phy.sink_ready());
        self.phy.clock(transfer.accepted, transfer.delivered);
    }
}

/// Summary of the loopback path.
#[derive(Debug, Clone, Serialize)]
pub struct BridgeReport {
    /// Clock domain of the bridge.
    pub domain: String,
    /// Word width.
    pub width: u32,
    /// Capacity in frames.
    pub capacity: usize,
    /// Byte-enable value driven by the PHY.
    pub byte_enable: u8,
    /// Frames buffered at the end of the run.
    pub occupancy: usize,
    /// Traffic counters.
    pub stats: BridgeStats,
    /// Payloads received back by the host, in order.
    pub received: Vec<u64>,
    /// Host frames not yet accepted.
    pub pending: usize,
    /// Producer-side handshake violations.
    pub handshake_violations: u64,
}

/// The whole design.
#[derive(Debug, Clone)]
pub struct Top {
    plan: ClockPlan,
    crg: ClockResetGenerator,
    bridge: Option<BridgeSlot>,
}

impl Top {
    /// Builds every component for a plan.
    pub fn new(plan: &ClockPlan, config: &TopConfig) -> Result<Self, SimError> {
        let crg = ClockResetGenerator::new(
            plan,
            config.sync_stages,
            config.lock,
            config.calibration.as_ref(),
        )?;

        let bridge = match &config.bridge {
            Some(req) => {
                let domain = plan
                    .domain_index(&req.domain)
                    .filter(|&i| !plan.domains[i].reserved)
                    .ok_or_else(|| SimError::UnknownDomain(req.domain.clone()))?;
                let mut phy = LoopbackPhy::new(req.byte_enable, config.stall);
                if !config.frames.is_empty() {
                    phy.send_packet(&config.frames);
                }
                Some(BridgeSlot {
                    domain,
                    bridge: StreamBridge::new(req.width, req.capacity)?,
                    phy,
                    monitor: HandshakeMonitor::new(),
                })
            }
            None => None,
        };

        Ok(Self {
            plan: plan.clone(),
            crg,
            bridge,
        })
    }

    /// The clock plan.
    pub fn plan(&self) -> &ClockPlan {
        &self.plan
    }

    /// Clock/reset generator.
    pub fn crg(&self) -> &ClockResetGenerator {
        &self.crg
    }

    /// Mutable clock/reset generator, for fault injection.
    pub fn crg_mut(&mut self) -> &mut ClockResetGenerator {
        &mut self.crg
    }

    /// The loopback bridge, if configured.
    pub fn bridge(&self) -> Option<&BridgeSlot> {
        self.bridge.as_ref()
    }

    /// Mutable loopback bridge.
    pub fn bridge_mut(&mut self) -> Option<&mut BridgeSlot> {
        self.bridge.as_mut()
    }

    /// Reference clock edge.
    pub fn on_reference_edge(&mut self, now: SimTime) {
        self.crg.on_reference_edge(now);
    }

    /// Rising edge of domain `index`. Logic in the domain sees the reset
    /// value from before the edge; in a reset-less domain it idles while the
    /// PLL is unlocked.
    pub fn on_domain_edge(&mut self, index: usize, now: SimTime) {
        let held = self.crg.domain_held(index);
        self.crg.on_domain_edge(index, now);
        if let Some(slot) = self.bridge.as_mut().filter(|s| s.domain == index) {
            slot.clock(held);
        }
    }

    /// Summary of the loopback path, if configured.
    pub fn bridge_report(&self) -> Option<BridgeReport> {
        self.bridge.as_ref().map(|slot| BridgeReport {
            domain: self.plan.domains[slot.domain].name.clone(),
            width: slot.bridge.width(),
            capacity: slot.bridge.capacity(),
            byte_enable: slot.phy.byte_enable(),
            occupancy: slot.bridge.occupancy(),
            stats: slot.bridge.stats(),
            received: slot.phy.received().iter().map(|f| f.payload).collect(),
            pending: slot.phy.pending(),
            handshake_violations: slot.monitor.violations(),
        })
    }
}
