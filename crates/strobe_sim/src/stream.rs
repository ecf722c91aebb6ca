//! Stream frames and ready/valid handshake checking.
//!
//! An interface carries `Option<StreamFrame>`: `Some` is `valid = 1` with the
//! frame as payload. A frame moves on a cycle where the sender offers it and
//! the receiver's `ready` was high.

use serde::Serialize;

/// Opaque control flags carried alongside a payload.
///
/// The bridge never interprets these; the named bits follow the usual
/// start/end-of-packet convention of attached PHYs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub struct FrameFlags(u8);

impl FrameFlags {
    /// No flags.
    pub const NONE: Self = Self(0);
    /// First word of a packet.
    pub const FIRST: Self = Self(1 << 0);
    /// Last word of a packet.
    pub const LAST: Self = Self(1 << 1);

    /// Wraps raw flag bits.
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    /// Raw flag bits.
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Whether every bit of `other` is set.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for FrameFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// One word on a stream interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct StreamFrame {
    /// Payload word. Only the low `width` bits of the interface are carried.
    pub payload: u64,
    /// Pass-through control flags.
    pub flags: FrameFlags,
}

impl StreamFrame {
    /// A frame with no flags.
    pub fn new(payload: u64) -> Self {
        Self {
            payload,
            flags: FrameFlags::NONE,
        }
    }

    /// A frame with flags.
    pub fn with_flags(payload: u64, flags: FrameFlags) -> Self {
        Self { payload, flags }
    }
}

/// A ready/valid contract violation by a producer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HandshakeViolation {
    /// `valid` fell while the previous offer had not been accepted.
    Dropped {
        /// The frame that was withdrawn.
        frame: StreamFrame,
    },
    /// The payload changed while the previous offer had not been accepted.
    Changed {
        /// The frame originally offered.
        before: StreamFrame,
        /// The frame offered instead.
        after: StreamFrame,
    },
}

/// Watches one interface and reports producers that do not hold
/// `valid`/payload stable under backpressure. Observing never alters the
/// data path.
#[derive(Debug, Clone, Default)]
pub struct HandshakeMonitor {
    pending: Option<StreamFrame>,
    violations: u64,
}

impl HandshakeMonitor {
    /// Creates an idle monitor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Observes one cycle: what the producer offered and whether the
    /// receiver was ready.
    pub fn observe(
        &mut self,
        offered: Option<StreamFrame>,
        ready: bool,
    ) -> Option<HandshakeViolation> {
        let violation = match (self.pending, offered) {
            (Some(before), None) => Some(HandshakeViolation::Dropped { frame: before }),
            (Some(before), Some(after)) if before != after => {
                Some(HandshakeViolation::Changed { before, after })
            }
            _ => None,
        };
        if let Some(v) = &violation {
            self.violations += 1;
            tracing::warn!(?v, "ready/valid contract violated by producer");
        }
        self.pending = if ready { None } else { offered };
        violation
    }

    /// Violations seen so far.
    pub fn violations(&self) -> u64 {
        self.violations
    }

    /// Forgets any pending offer (used when the interface is reset).
    pub fn reset(&mut self) {
        self.pending = None;
    }
}
