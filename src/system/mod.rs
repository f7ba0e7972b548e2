//! N DMA ports sharing one memory through a read and a write arbiter.
//!
//! `tick()` is one clock cycle: every module first drives its outputs from
//! registered state, the wires are copied through the arbiters so each
//! handshake is resolved, and then every module advances.

pub mod event;
pub mod port;
pub mod stream;

use crate::arbiter::{ReadArbiter, ReadArbiterConfig, WriteArbiter};
use crate::builtin::rr::MAX_REQUESTERS;
use crate::builtin::Module;
use crate::bus::BusGeometry;
use crate::dma::regs::reg_index;
use crate::dma::StreamBeat;
use crate::error::{Result, SimError};
use crate::memory::{AxiMemory, MemoryParams};

pub use event::{BusEvent, EngineKind, TraceRecord};
pub use port::{DmaPort, PortParams};
pub use stream::{StreamSink, StreamSource};

/// Register address bit selecting the reader's register file
pub const READER_SELECT: u32 = 1 << 31;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SystemParams {
  pub geometry: BusGeometry,
  pub ports: Vec<PortParams>,
  pub memory: MemoryParams,
  pub input_register: bool,
  pub output_register: bool,
}

/// Byte address of register `reg` of one engine
pub fn reg_address(port: usize, reader: bool, reg: u32) -> u32 {
  let sel = if reader { READER_SELECT } else { 0 };
  sel | ((port as u32 & 0xff) << 16) | (reg << 2)
}

pub struct DmaSystem {
  cycle: u64,
  ports: Vec<DmaPort>,
  read_arb: ReadArbiter,
  write_arb: WriteArbiter,
  memory: AxiMemory,

  capture: bool,
  events: Vec<TraceRecord>,
}

impl DmaSystem {
  pub fn new(params: SystemParams) -> Result<Self> {
    let n = params.ports.len();
    if n == 0 || n > MAX_REQUESTERS {
      return Err(SimError::invalid(format!("port count {} not in 1..={}", n, MAX_REQUESTERS)));
    }
    if params.memory.read_outstanding == 0 {
      return Err(SimError::invalid("read_outstanding must be at least 1"));
    }
    if let Some(i) = params.ports.iter().position(|p| p.fifo_depth == 0) {
      return Err(SimError::invalid(format!("port {} has a zero-depth FIFO", i)));
    }

    let ports = params
      .ports
      .iter()
      .enumerate()
      .map(|(i, p)| DmaPort::new(i, p, params.geometry))
      .collect();
    let read_arb = ReadArbiter::new(
      "rd_arb",
      ReadArbiterConfig {
        requesters: n,
        max_outstanding: params.memory.read_outstanding,
        input_register: params.input_register,
        output_register: params.output_register,
      },
    );
    let write_arb = WriteArbiter::new("wr_arb", n);
    let memory = AxiMemory::new("mem", params.memory.clone(), params.geometry);

    Ok(Self {
      cycle: 0,
      ports,
      read_arb,
      write_arb,
      memory,
      capture: false,
      events: Vec::new(),
    })
  }

  pub fn cycle(&self) -> u64 {
    self.cycle
  }

  pub fn num_ports(&self) -> usize {
    self.ports.len()
  }

  pub fn port(&self, i: usize) -> &DmaPort {
    &self.ports[i]
  }

  pub fn port_mut(&mut self, i: usize) -> &mut DmaPort {
    &mut self.ports[i]
  }

  pub fn ports(&self) -> &[DmaPort] {
    &self.ports
  }

  pub fn memory(&self) -> &AxiMemory {
    &self.memory
  }

  pub fn memory_mut(&mut self) -> &mut AxiMemory {
    &mut self.memory
  }

  pub fn read_arbiter(&self) -> &ReadArbiter {
    &self.read_arb
  }

  pub fn write_arbiter(&self) -> &WriteArbiter {
    &self.write_arb
  }

  /// Record a `TraceRecord` for every handshake from now on
  pub fn capture_events(&mut self, on: bool) {
    self.capture = on;
  }

  pub fn take_events(&mut self) -> Vec<TraceRecord> {
    std::mem::take(&mut self.events)
  }

  fn decode(&self, addr: u32) -> Option<(usize, bool, u32)> {
    let port = ((addr >> 16) & 0xff) as usize;
    if port >= self.ports.len() {
      log::warn!("register access {:#010x} hits no port", addr);
      return None;
    }
    Some((port, addr & READER_SELECT != 0, reg_index(addr)))
  }

  pub fn reg_write(&mut self, addr: u32, value: u32) {
    if let Some((port, reader, reg)) = self.decode(addr) {
      let p = &mut self.ports[port];
      if reader {
        p.read_regs.write(reg, value);
      } else {
        p.write_regs.write(reg, value);
      }
    }
  }

  pub fn reg_read(&self, addr: u32) -> u32 {
    match self.decode(addr) {
      Some((port, true, reg)) => {
        let p = &self.ports[port];
        p.read_regs.read(reg, &p.read_status())
      },
      Some((port, false, reg)) => {
        let p = &self.ports[port];
        p.write_regs.read(reg, &p.write_status())
      },
      None => 0,
    }
  }

  /// IRQ line `2p` is port p's writer, `2p+1` its reader
  pub fn irq(&self, line: usize) -> bool {
    match self.ports.get(line / 2) {
      Some(p) if line % 2 == 0 => p.write_regs.irq(),
      Some(p) => p.read_regs.irq(),
      None => false,
    }
  }

  pub fn push_stream(&mut self, port: usize, beats: impl IntoIterator<Item = StreamBeat>) {
    self.ports[port].source.extend(beats);
  }

  pub fn take_output(&mut self, port: usize) -> Vec<StreamBeat> {
    self.ports[port].sink.take()
  }

  pub fn is_quiescent(&self) -> bool {
    self.ports.iter().all(|p| p.is_quiescent() && p.source.is_drained())
      && self.read_arb.is_idle()
      && self.write_arb.is_idle()
      && self.memory.is_idle()
  }

  /// Tick until `done` holds or `max_cycles` more cycles have passed;
  /// returns whether `done` was reached
  pub fn run_until(&mut self, max_cycles: u64, mut done: impl FnMut(&DmaSystem) -> bool) -> bool {
    for _ in 0..max_cycles {
      if done(self) {
        return true;
      }
      self.tick();
    }
    done(self)
  }

  pub fn tick(&mut self) {
    // Moore outputs
    self.memory.eval();
    self.ports.iter_mut().for_each(|p| p.eval());

    // Connection update through the arbiters
    for (i, p) in self.ports.iter().enumerate() {
      self.read_arb.up[i].from_master(&p.rd);
      self.write_arb.up[i].from_master(&p.wr);
    }
    self.read_arb.down.from_slave(&self.memory.rd);
    self.write_arb.down.from_slave(&self.memory.wr);
    self.read_arb.eval();
    self.write_arb.eval();
    for (i, p) in self.ports.iter_mut().enumerate() {
      p.rd.from_slave(&self.read_arb.up[i]);
      p.wr.from_slave(&self.write_arb.up[i]);
    }
    self.memory.rd.from_master(&self.read_arb.down);
    self.memory.wr.from_master(&self.write_arb.down);

    if self.capture {
      self.record();
    }

    self.memory.run();
    self.read_arb.run();
    self.write_arb.run();
    self.ports.iter_mut().for_each(|p| p.run());
    self.cycle += 1;
  }

  fn record(&mut self) {
    let cycle = self.cycle;
    for (port, p) in self.ports.iter().enumerate() {
      let mut push = |event| self.events.push(TraceRecord { cycle, port, event });
      if let Some(ar) = p.rd.ar.fired() {
        push(BusEvent::Ar { addr: ar.addr, len: ar.len });
      }
      if let Some(r) = p.rd.r.fired() {
        push(BusEvent::R {
          data: r.data,
          resp: r.resp,
          last: r.last,
        });
      }
      if let Some(aw) = p.wr.aw.fired() {
        push(BusEvent::Aw { addr: aw.addr, len: aw.len });
      }
      if let Some(w) = p.wr.w.fired() {
        push(BusEvent::W { data: w.data, last: w.last });
      }
      if let Some(b) = p.wr.b.fired() {
        push(BusEvent::B { resp: b.resp });
      }
      if p.reader.output.done {
        push(BusEvent::Done { engine: EngineKind::Reader });
      }
      if p.writer.output.done {
        push(BusEvent::Done { engine: EngineKind::Writer });
      }
    }
  }

  /// Back to idle: in-flight bursts and queued stream data are dropped,
  /// memory contents are kept
  pub fn reset(&mut self) {
    self.memory.reset();
    self.read_arb.reset();
    self.write_arb.reset();
    self.ports.iter_mut().for_each(|p| p.reset());
    self.events.clear();
    log::info!("system reset at cycle {}", self.cycle);
  }
}
