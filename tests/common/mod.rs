#![allow(dead_code)]

use axidma::dma::regs::{REG_BURST, REG_LENGTH, REG_START, REG_VALID};
use axidma::dma::StreamBeat;
use axidma::memory::MemoryParams;
use axidma::system::{reg_address, BusEvent, DmaSystem, PortParams, SystemParams, TraceRecord};

pub fn params(ports: usize) -> SystemParams {
  SystemParams {
    ports: vec![PortParams::default(); ports],
    ..SystemParams::default()
  }
}

pub fn system_with(params: SystemParams) -> DmaSystem {
  let mut sys = DmaSystem::new(params).unwrap();
  sys.capture_events(true);
  sys
}

pub fn system(ports: usize) -> DmaSystem {
  system_with(params(ports))
}

pub fn memory(size_words: usize) -> MemoryParams {
  MemoryParams {
    size_words,
    ..MemoryParams::default()
  }
}

/// Stage a descriptor and pulse VALID
pub fn start(sys: &mut DmaSystem, port: usize, reader: bool, addr: u32, len: u32, burst: u32) {
  sys.reg_write(reg_address(port, reader, REG_START), addr);
  sys.reg_write(reg_address(port, reader, REG_LENGTH), len);
  sys.reg_write(reg_address(port, reader, REG_BURST), burst);
  sys.reg_write(reg_address(port, reader, REG_VALID), 1);
}

pub fn writer_irq(port: usize) -> usize {
  2 * port
}

pub fn reader_irq(port: usize) -> usize {
  2 * port + 1
}

pub fn frame(data: &[u64]) -> Vec<StreamBeat> {
  data
    .iter()
    .enumerate()
    .map(|(i, &d)| StreamBeat::new(d, i + 1 == data.len()))
    .collect()
}

/// (port, addr, beats) of every AR
pub fn reads(events: &[TraceRecord]) -> Vec<(usize, u64, u32)> {
  events
    .iter()
    .filter_map(|e| match e.event {
      BusEvent::Ar { addr, len } => Some((e.port, addr, len as u32 + 1)),
      _ => None,
    })
    .collect()
}

/// (port, addr, beats) of every AW
pub fn writes(events: &[TraceRecord]) -> Vec<(usize, u64, u32)> {
  events
    .iter()
    .filter_map(|e| match e.event {
      BusEvent::Aw { addr, len } => Some((e.port, addr, len as u32 + 1)),
      _ => None,
    })
    .collect()
}
