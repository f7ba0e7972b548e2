use crate::builtin::Module;
use crate::bus::{BusGeometry, ReadBus, WriteBus};
use crate::dma::reader::ReadInputs;
use crate::dma::writer::WriteInputs;
use crate::dma::{DescriptorRegs, EngineStatus, ReadEngine, StreamFifo, WriteEngine};

use super::stream::{StreamSink, StreamSource};

/// Per-port options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortParams {
  pub fifo_depth: usize,
  /// Writer takes its length from the stream's end-of-frame tag
  pub frame_mode: bool,
  pub source_throttle: u32,
  pub sink_throttle: u32,
}

impl Default for PortParams {
  fn default() -> Self {
    Self {
      fifo_depth: 32,
      frame_mode: false,
      source_throttle: 0,
      sink_throttle: 0,
    }
  }
}

/// One read engine and one write engine with their FIFOs, registers and
/// stream endpoints
pub struct DmaPort {
  name: String,
  pub reader: ReadEngine,
  pub writer: WriteEngine,

  /// memory -> reader -> sink
  pub read_fifo: StreamFifo,
  /// source -> writer -> memory
  pub write_fifo: StreamFifo,

  pub read_regs: DescriptorRegs,
  pub write_regs: DescriptorRegs,

  pub source: StreamSource,
  pub sink: StreamSink,

  pub rd: ReadBus,
  pub wr: WriteBus,
}

impl DmaPort {
  pub fn new(index: usize, params: &PortParams, geometry: BusGeometry) -> Self {
    Self {
      name: format!("port{}", index),
      reader: ReadEngine::new(format!("port{}.rd", index), geometry),
      writer: WriteEngine::new(format!("port{}.wr", index), geometry, params.frame_mode),
      read_fifo: StreamFifo::new(params.fifo_depth, false),
      write_fifo: StreamFifo::new(params.fifo_depth, params.frame_mode),
      read_regs: DescriptorRegs::new(),
      write_regs: DescriptorRegs::new(),
      source: StreamSource::new(params.source_throttle),
      sink: StreamSink::new(params.sink_throttle),
      rd: ReadBus::default(),
      wr: WriteBus::default(),
    }
  }

  pub fn read_status(&self) -> EngineStatus {
    EngineStatus {
      remaining: self.reader.core().remaining_words(),
      error: self.reader.error(),
      fifo_level: self.read_fifo.level(),
    }
  }

  pub fn write_status(&self) -> EngineStatus {
    EngineStatus {
      remaining: self.writer.core().remaining_words(),
      error: self.writer.error(),
      fifo_level: self.write_fifo.level(),
    }
  }

  /// Nothing left to do on this port
  pub fn is_quiescent(&self) -> bool {
    self.reader.is_idle()
      && self.writer.is_idle()
      && self.read_regs.pending().is_none()
      && self.write_regs.pending().is_none()
      && self.read_fifo.is_empty()
      && self.write_fifo.is_empty()
  }
}

impl Module for DmaPort {
  fn eval(&mut self) {
    self.reader.eval();
    self.writer.fifo_head = self.write_fifo.head().copied();
    self.writer.eval();

    self.rd.ar.data.drive(self.reader.output.ar);
    self.rd.r.ready = self.reader.output.r_ready;
    self.wr.aw.data.drive(self.writer.output.aw);
    self.wr.w.data.drive(self.writer.output.w);
    self.wr.b.ready = self.writer.output.b_ready;
  }

  fn run(&mut self) {
    // Reader
    self.reader.input = ReadInputs {
      desc: self.read_regs.pending().filter(|_| self.reader.output.desc_ready),
      fifo_free: self.read_fifo.free(),
      ar_fire: self.rd.ar.fire(),
      r_beat: self.rd.r.fired().copied(),
      clear_error: self.read_regs.take_clear_error(),
    };
    if self.reader.output.done {
      self.read_regs.raise_irq();
    }
    self.reader.run();
    let step = self.reader.step;
    if step.desc_taken {
      self.read_regs.consume();
    }
    if let Some(beat) = step.push {
      if !self.read_fifo.push(beat) {
        log::warn!("[{}] read FIFO overflow, beat {:#x} lost", self.name, beat.data);
      }
    }

    // Writer
    self.writer.input = WriteInputs {
      desc: self.write_regs.pending().filter(|_| self.writer.output.desc_ready),
      fifo_level: self.write_fifo.level(),
      eof_latched: self.write_fifo.eof_latched(),
      aw_fire: self.wr.aw.fire(),
      w_fire: self.wr.w.fire(),
      b: self.wr.b.fired().copied(),
      clear_error: self.write_regs.take_clear_error(),
    };
    if self.writer.output.done {
      self.write_regs.raise_irq();
    }
    self.writer.run();
    let step = self.writer.step;
    if step.desc_taken {
      self.write_regs.consume();
    }
    if step.pop {
      self.write_fifo.pop();
    }

    // Stream side
    self.source.tick(&mut self.write_fifo);
    self.sink.tick(&mut self.read_fifo);
  }

  fn reset(&mut self) {
    self.reader.reset();
    self.writer.reset();
    self.read_fifo.clear();
    self.write_fifo.clear();
    self.read_regs.reset();
    self.write_regs.reset();
    self.source.clear();
    self.sink.clear();
    self.rd = ReadBus::default();
    self.wr = WriteBus::default();
  }

  fn name(&self) -> &str {
    &self.name
  }
}
