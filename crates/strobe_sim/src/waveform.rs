//! Waveform recording for simulation output.
//!
//! The [`WaveformRecorder`] trait abstracts waveform output. [`VcdRecorder`]
//! writes IEEE 1364 Value Change Dump text that GTKWave or Surfer can open.
//! Values are plain unsigned integers: every traced signal in this model is a
//! two-state bit or counter.

use std::io::Write;

use crate::error::SimError;

/// Handle of a recorded signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SignalId(u32);

impl SignalId {
    /// Wraps a raw index.
    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// The raw index.
    pub fn as_raw(self) -> u32 {
        self.0
    }
}

/// Trait for recording simulation waveforms.
pub trait WaveformRecorder {
    /// Registers a signal for recording.
    fn register_signal(&mut self, id: SignalId, name: &str, width: u32) -> Result<(), SimError>;

    /// Opens a new scope (hierarchy level).
    fn begin_scope(&mut self, name: &str) -> Result<(), SimError>;

    /// Closes the current scope.
    fn end_scope(&mut self) -> Result<(), SimError>;

    /// Records a value change at the given time (in femtoseconds).
    fn record_change(&mut self, time_fs: u64, id: SignalId, value: u64) -> Result<(), SimError>;

    /// Finalizes the output (flush, write trailer, etc.).
    fn finalize(&mut self) -> Result<(), SimError>;
}

/// VCD recorder.
///
/// Signal identifiers use printable ASCII characters starting from `!`.
pub struct VcdRecorder<W: Write> {
    writer: W,
    id_map: Vec<(SignalId, String, u32)>, // (signal, id code, width)
    header_written: bool,
    definitions_closed: bool,
    current_time: Option<u64>,
}

impl<W: Write> VcdRecorder<W> {
    /// Creates a recorder writing to `writer`.
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            id_map: Vec::new(),
            header_written: false,
            definitions_closed: false,
            current_time: None,
        }
    }

    /// Consumes the recorder and returns the writer.
    pub fn into_inner(self) -> W {
        self.writer
    }

    fn ensure_header(&mut self) -> Result<(), SimError> {
        if self.header_written {
            return Ok(());
        }
        self.header_written = true;
        writeln!(self.writer, "$version")?;
        writeln!(self.writer, "  Strobe clock/reset model")?;
        writeln!(self.writer, "$end")?;
        writeln!(self.writer, "$timescale")?;
        writeln!(self.writer, "  1fs")?;
        writeln!(self.writer, "$end")?;
        Ok(())
    }

    fn close_definitions(&mut self) -> Result<(), SimError> {
        self.ensure_header()?;
        if !self.definitions_closed {
            self.definitions_closed = true;
            writeln!(self.writer, "$enddefinitions $end")?;
        }
        Ok(())
    }

    /// VCD identifier code for a sequential index; multi-character from 94.
    fn make_id_code(index: u32) -> String {
        let mut result = String::new();
        let mut idx = index;
        loop {
            result.push((b'!' + (idx % 94) as u8) as char);
            idx /= 94;
            if idx == 0 {
                break;
            }
            idx -= 1;
        }
        result
    }

    fn format_value(value: u64, width: u32) -> String {
        if width == 1 {
            (value & 1).to_string()
        } else {
            let width = width.min(64) as usize;
            let masked = if width == 64 {
                value
            } else {
                value & ((1u64 << width) - 1)
            };
            format!("b{masked:0width$b}")
        }
    }
}

impl<W: Write> WaveformRecorder for VcdRecorder<W> {
    fn register_signal(&mut self, id: SignalId, name: &str, width: u32) -> Result<(), SimError> {
        if self.definitions_closed {
            return Err(SimError::InvalidSignalRef {
                reason: format!("signal '{name}' registered after the first value change"),
            });
        }
        self.ensure_header()?;
        let id_code = Self::make_id_code(self.id_map.len() as u32);
        writeln!(self.writer, "$var wire {width} {id_code} {name} $end")?;
        self.id_map.push((id, id_code, width));
        Ok(())
    }

    fn begin_scope(&mut self, name: &str) -> Result<(), SimError> {
        self.ensure_header()?;
        writeln!(self.writer, "$scope module {name} $end")?;
        Ok(())
    }

    fn end_scope(&mut self) -> Result<(), SimError> {
        writeln!(self.writer, "$upscope $end")?;
        Ok(())
    }

    fn record_change(&mut self, time_fs: u64, id: SignalId, value: u64) -> Result<(), SimError> {
        self.close_definitions()?;
        if self.current_time != Some(time_fs) {
            writeln!(self.writer, "#{time_fs}")?;
            self.current_time = Some(time_fs);
        }

        let (_, id_code, width) = self
            .id_map
            .iter()
            .find(|(sid, _, _)| *sid == id)
            .ok_or_else(|| SimError::InvalidSignalRef {
                reason: format!("unregistered VCD signal {}", id.as_raw()),
            })?;

        let val_str = Self::format_value(value, *width);
        if *width == 1 {
            writeln!(self.writer, "{val_str}{id_code}")?;
        } else {
            writeln!(self.writer, "{val_str} {id_code}")?;
        }
        Ok(())
    }

    fn finalize(&mut self) -> Result<(), SimError> {
        self.close_definitions()?;
        self.writer.flush()?;
        Ok(())
    }
}
