//! Behavioral stand-in for the synchronous-FIFO USB PHY.
//!
//! The host side is a transmit queue and a receive log. Towards the bridge
//! the PHY exposes a `source` interface (frames from the host) and a `sink`
//! interface (frames back to the host). Both are registered: what the PHY
//! offers or accepts on an edge was decided on the previous edge.

use std::collections::VecDeque;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::stream::{FrameFlags, StreamFrame};

/// Backpressure injected by the PHY model.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum StallPolicy {
    /// Offer as soon as a frame is queued; always accept.
    #[default]
    None,
    /// Seeded pseudo-random stalls.
    Random {
        /// RNG seed.
        seed: u64,
        /// Chance per cycle that an idle source waits instead of offering.
        source: f64,
        /// Chance per cycle that the sink deasserts `ready`.
        sink: f64,
    },
}

impl StallPolicy {
    /// Same stall probability on both sides.
    pub fn random(seed: u64, probability: f64) -> Self {
        Self::Random {
            seed,
            source: probability,
            sink: probability,
        }
    }
}

/// Loopback PHY: host TX queue → `source`, `sink` → host RX log.
#[derive(Debug, Clone)]
pub struct LoopbackPhy {
    tx: VecDeque<StreamFrame>,
    rx: Vec<StreamFrame>,
    offering: Option<StreamFrame>,
    sink_ready: bool,
    byte_enable: u8,
    stalls: Option<(StdRng, f64, f64)>,
}

impl LoopbackPhy {
    /// Creates an idle PHY with a fixed byte-enable value.
    pub fn new(byte_enable: u8, policy: StallPolicy) -> Self {
        let stalls = match policy {
            StallPolicy::None => None,
            StallPolicy::Random { seed, source, sink } => Some((
                StdRng::seed_from_u64(seed),
                clamp_probability(source),
                clamp_probability(sink),
            )),
        };
        Self {
            tx: VecDeque::new(),
            rx: Vec::new(),
            offering: None,
            sink_ready: true,
            byte_enable,
            stalls,
        }
    }

    /// Queues payloads as one packet: `FIRST` on the first word, `LAST` on
    /// the last.
    pub fn send_packet(&mut self, payloads: &[u64]) {
        let last = payloads.len().saturating_sub(1);
        for (i, &payload) in payloads.iter().enumerate() {
            let mut flags = FrameFlags::NONE;
            if i == 0 {
                flags = flags | FrameFlags::FIRST;
            }
            if i == last {
                flags = flags | FrameFlags::LAST;
            }
            self.tx.push_back(StreamFrame::with_flags(payload, flags));
        }
    }

    /// Queues one frame.
    pub fn send(&mut self, frame: StreamFrame) {
        self.tx.push_back(frame);
    }

    /// The frame currently offered on `source` (`valid` when `Some`).
    pub fn source(&self) -> Option<StreamFrame> {
        self.offering
    }

    /// `ready` of the `sink` interface for the current cycle.
    pub fn sink_ready(&self) -> bool {
        self.sink_ready
    }

    /// Fixed byte-enable field driven on every word.
    pub fn byte_enable(&self) -> u8 {
        self.byte_enable
    }

    /// Advances one edge given what the bridge did with the interfaces.
    pub fn clock(&mut self, accepted: bool, delivered: Option<StreamFrame>) {
        if accepted {
            self.offering = None;
        }
        if let Some(frame) = delivered {
            self.rx.push(frame);
        }

        let (source_stall, sink_stall) = match &mut self.stalls {
            None => (false, false),
            Some((rng, source, sink)) => {
                // Stall draws happen only while idle so an offer stays stable.
                let source_stall = self.offering.is_none() && rng.gen_bool(*source);
                (source_stall, rng.gen_bool(*sink))
            }
        };

        if self.offering.is_none() && !source_stall {
            self.offering = self.tx.pop_front();
        }
        self.sink_ready = !sink_stall;
    }

    /// Frames received back by the host.
    pub fn received(&self) -> &[StreamFrame] {
        &self.rx
    }

    /// Frames not yet handed to the bridge, including one on offer.
    pub fn pending(&self) -> usize {
        self.tx.len() + usize::from(self.offering.is_some())
    }
}

fn clamp_probability(p: f64) -> f64 {
    if p.is_nan() {
        0.0
    } else {
        p.clamp(0.0, 1.0)
    }
}
