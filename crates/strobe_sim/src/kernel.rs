//! Multi-clock edge scheduler.
//!
//! [`SimKernel`] keeps one pending rising edge per clock in a min-heap keyed
//! by `(time, class, index)`. Edges that coincide are handled as one batch:
//! domain edges first, then the reference edge, so a lock change produced by
//! a reference edge is seen by domain logic on its next edge (clock-to-out).
//! Traced signals are sampled after every batch and only changes are recorded.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use serde::Serialize;
use strobe_common::Frequency;

use crate::crg::CalibrationReport;
use crate::error::SimError;
use crate::pll::ClockPlan;
use crate::time::{edge_time, SimTime};
use crate::top::{BridgeReport, Top};
use crate::waveform::{SignalId, WaveformRecorder};

/// Kind of clock owning an edge. Order matters: domains before reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum EdgeClass {
    Domain,
    Reference,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct ClockEdge {
    time: SimTime,
    class: EdgeClass,
    index: usize,
    cycle: u64,
}

#[derive(Debug, Clone)]
struct ClockSource {
    frequency: Frequency,
    offset_fs: u64,
}

/// A sampled signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trace {
    Locked,
    DomainReset(usize),
    CalibrationReset,
    CalibrationCountdown,
    FifoLevel,
    SinkReady,
    SourceValid,
}

#[derive(Debug, Clone)]
struct TraceSlot {
    trace: Trace,
    id: SignalId,
    last: Option<u64>,
}

/// Per-domain summary of a run.
#[derive(Debug, Clone, Serialize)]
pub struct DomainReport {
    /// Domain name.
    pub name: String,
    /// Clock frequency.
    pub frequency: Frequency,
    /// Rising edges simulated.
    pub edges: u64,
    /// Whether the domain has a reset synchronizer.
    pub resettable: bool,
    /// Reset state at the end of the run.
    pub in_reset: bool,
    /// When reset last deasserted, if released.
    pub reset_released_at: Option<SimTime>,
}

/// The result of a completed simulation run.
#[derive(Debug, Clone, Serialize)]
pub struct SimResult {
    /// Time of the last processed edge batch.
    pub final_time: SimTime,
    /// Lock status at the end of the run.
    pub locked: bool,
    /// When lock was acquired, if locked.
    pub lock_time: Option<SimTime>,
    /// Clocked domains.
    pub domains: Vec<DomainReport>,
    /// Calibration gate, if configured.
    pub calibration: Option<CalibrationReport>,
    /// Loopback path, if configured.
    pub bridge: Option<BridgeReport>,
}

/// The simulation kernel.
///
/// Construct via [`SimKernel::new`], optionally attach a recorder, then call
/// [`run`](SimKernel::run) or [`run_until`](SimKernel::run_until). Runs may
/// be chained; faults can be injected between them through
/// [`top_mut`](SimKernel::top_mut).
pub struct SimKernel {
    top: Top,
    current_time: SimTime,
    queue: BinaryHeap<Reverse<ClockEdge>>,
    domain_clocks: Vec<Option<ClockSource>>,
    reference: ClockSource,
    recorder: Option<Box<dyn WaveformRecorder>>,
    traces: Vec<TraceSlot>,
}

impl SimKernel {
    /// Schedules the first edge of the reference and of every clocked
    /// domain. Reserved outputs are not scheduled.
    pub fn new(top: Top) -> Self {
        let plan = top.plan();
        let reference = ClockSource {
            frequency: plan.reference,
            offset_fs: 0,
        };
        let domain_clocks: Vec<Option<ClockSource>> = plan
            .domains
            .iter()
            .map(|d| {
                (!d.reserved).then(|| ClockSource {
                    frequency: d.frequency,
                    offset_fs: d.phase_offset_fs,
                })
            })
            .collect();

        let mut queue = BinaryHeap::new();
        queue.push(Reverse(ClockEdge {
            time: edge_time(reference.frequency, 0, reference.offset_fs),
            class: EdgeClass::Reference,
            index: 0,
            cycle: 0,
        }));
        for (index, clock) in domain_clocks.iter().enumerate() {
            if let Some(clock) = clock {
                queue.push(Reverse(ClockEdge {
                    time: edge_time(clock.frequency, 0, clock.offset_fs),
                    class: EdgeClass::Domain,
                    index,
                    cycle: 0,
                }));
            }
        }

        Self {
            top,
            current_time: SimTime::zero(),
            queue,
            domain_clocks,
            reference,
            recorder: None,
            traces: Vec::new(),
        }
    }

    /// Attaches a waveform recorder, declares every trace and records the
    /// initial values.
    pub fn set_recorder(&mut self, mut recorder: Box<dyn WaveformRecorder>) -> Result<(), SimError> {
        let plan = self.top.plan();
        let mut declared: Vec<(Trace, String, u32)> = vec![(Trace::Locked, "locked".into(), 1)];
        for (i, d) in plan.domains.iter().enumerate() {
            if d.is_resettable() {
                declared.push((Trace::DomainReset(i), format!("{}_rst", d.name), 1));
            }
        }
        if let Some(gate) = self.top.crg().gate() {
            declared.push((Trace::CalibrationReset, "cal_reset".into(), 1));
            declared.push((
                Trace::CalibrationCountdown,
                "cal_countdown".into(),
                bits_for(gate.hold_cycles() as u64),
            ));
        }
        if let Some(slot) = self.top.bridge() {
            declared.push((
                Trace::FifoLevel,
                "fifo_level".into(),
                bits_for(slot.bridge().capacity() as u64),
            ));
            declared.push((Trace::SinkReady, "fifo_sink_ready".into(), 1));
            declared.push((Trace::SourceValid, "fifo_source_valid".into(), 1));
        }

        recorder.begin_scope(&plan_scope(plan))?;
        self.traces.clear();
        for (raw, (trace, name, width)) in declared.into_iter().enumerate() {
            let id = SignalId::from_raw(raw as u32);
            recorder.register_signal(id, &name, width)?;
            self.traces.push(TraceSlot {
                trace,
                id,
                last: None,
            });
        }
        recorder.end_scope()?;
        self.recorder = Some(recorder);
        self.sample()
    }

    /// The design being simulated.
    pub fn top(&self) -> &Top {
        &self.top
    }

    /// Mutable design, for fault injection between runs.
    pub fn top_mut(&mut self) -> &mut Top {
        &mut self.top
    }

    /// Current simulation time.
    pub fn current_time(&self) -> SimTime {
        self.current_time
    }

    /// Drops PLL lock at the current time.
    pub fn unlock(&mut self) -> Result<(), SimError> {
        let now = self.current_time;
        self.top.crg_mut().unlock(now);
        self.sample()
    }

    /// Drives the raw external reset request at the current time.
    pub fn set_external_reset(&mut self, asserted: bool) -> Result<(), SimError> {
        let now = self.current_time;
        self.top.crg_mut().set_external_reset(asserted, now);
        self.sample()
    }

    /// Runs for `duration_fs` femtoseconds past the current time.
    pub fn run(&mut self, duration_fs: u64) -> Result<SimResult, SimError> {
        let limit = SimTime::from_fs(self.current_time.fs.saturating_add(duration_fs));
        self.run_until(limit)
    }

    /// Processes every edge at or before `limit`.
    pub fn run_until(&mut self, limit: SimTime) -> Result<SimResult, SimError> {
        while let Some(Reverse(next)) = self.queue.peek().copied() {
            if next.time > limit {
                break;
            }
            self.current_time = next.time;
            while let Some(Reverse(edge)) = self.queue.peek().copied() {
                if edge.time != next.time {
                    break;
                }
                self.queue.pop();
                self.fire(edge);
            }
            self.sample()?;
        }
        Ok(self.result())
    }

    /// Flushes the recorder, if any.
    pub fn finish(&mut self) -> Result<(), SimError> {
        if let Some(recorder) = &mut self.recorder {
            recorder.finalize()?;
        }
        Ok(())
    }

    /// Summary of the current state.
    pub fn result(&self) -> SimResult {
        let crg = self.top.crg();
        let domains = crg
            .domains()
            .iter()
            .filter(|d| !d.spec().reserved)
            .map(|d| DomainReport {
                name: d.spec().name.clone(),
                frequency: d.spec().frequency,
                edges: d.edges(),
                resettable: d.spec().is_resettable(),
                in_reset: d.in_reset(),
                reset_released_at: d.released_at(),
            })
            .collect();
        SimResult {
            final_time: self.current_time,
            locked: crg.locked(),
            lock_time: crg.lock_time(),
            domains,
            calibration: crg.calibration_report(),
            bridge: self.top.bridge_report(),
        }
    }

    fn fire(&mut self, edge: ClockEdge) {
        let clock = match edge.class {
            EdgeClass::Reference => {
                self.top.on_reference_edge(edge.time);
                Some(&self.reference)
            }
            EdgeClass::Domain => {
                self.top.on_domain_edge(edge.index, edge.time);
                self.domain_clocks[edge.index].as_ref()
            }
        };
        if let Some(clock) = clock {
            let cycle = edge.cycle + 1;
            self.queue.push(Reverse(ClockEdge {
                time: edge_time(clock.frequency, cycle, clock.offset_fs),
                cycle,
                ..edge
            }));
        }
    }

    fn sample(&mut self) -> Result<(), SimError> {
        let Some(recorder) = self.recorder.as_mut() else {
            return Ok(());
        };
        let now = self.current_time.fs;
        for slot in &mut self.traces {
            let value = trace_value(&self.top, slot.trace);
            if slot.last != Some(value) {
                recorder.record_change(now, slot.id, value)?;
                slot.last = Some(value);
            }
        }
        Ok(())
    }
}

fn trace_value(top: &Top, trace: Trace) -> u64 {
    let crg = top.crg();
    let bridge = top.bridge().map(|s| s.bridge());
    let value = match trace {
        Trace::Locked => crg.locked(),
        Trace::DomainReset(i) => crg.domain_reset(i),
        Trace::CalibrationReset => crg.calibration_reset().unwrap_or(false),
        Trace::CalibrationCountdown => {
            return crg.gate().map_or(0, |g| g.countdown() as u64);
        }
        Trace::FifoLevel => return bridge.map_or(0, |b| b.occupancy() as u64),
        Trace::SinkReady => bridge.is_some_and(|b| b.sink_ready()),
        Trace::SourceValid => bridge.is_some_and(|b| b.source().is_some()),
    };
    u64::from(value)
}

/// Bits needed to hold values `0..=max`.
fn bits_for(max: u64) -> u32 {
    (u64::BITS - max.leading_zeros()).max(1)
}

fn plan_scope(plan: &ClockPlan) -> String {
    plan.reference_port.replace(|c: char| !c.is_ascii_alphanumeric() && c != '_', "_") + "_crg"
}
