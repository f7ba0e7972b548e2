use serde::Serialize;

use crate::bus::Resp;
use crate::dma::EngineStats;
use crate::memory::MemoryStats;
use crate::simulator::script::Mismatch;

#[derive(Debug, Clone, Serialize)]
pub struct PortReport {
  pub port: usize,
  pub reader: EngineStats,
  pub writer: EngineStats,
  pub read_error: Resp,
  pub write_error: Resp,
  pub read_grants: u64,
  pub write_grants: u64,
  pub dropped_descriptors: u64,
  pub sink_words: usize,
  /// `None` when no reference stream was configured
  pub sink_match: Option<bool>,
}

/// End-of-run summary
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
  pub cycles: u64,
  pub timed_out: bool,
  pub ports: Vec<PortReport>,
  pub memory: MemoryStats,
  pub memory_match: Option<bool>,
  pub mismatches: Vec<Mismatch>,
}

impl RunReport {
  pub fn passed(&self) -> bool {
    !self.timed_out
      && self.mismatches.is_empty()
      && self.memory_match != Some(false)
      && self.ports.iter().all(|p| p.sink_match != Some(false))
  }

  pub fn print(&self) {
    println!("\n--- Simulation Report ---");
    println!("cycles: {}{}", self.cycles, if self.timed_out { " (max_cycles reached)" } else { "" });
    for p in &self.ports {
      println!(
        "[port{}] rd: {} transfers, {} bursts, {} words, error {:?} | wr: {} transfers, {} bursts, {} words, error {:?}",
        p.port,
        p.reader.transfers,
        p.reader.bursts,
        p.reader.words,
        p.read_error,
        p.writer.transfers,
        p.writer.bursts,
        p.writer.words,
        p.write_error
      );
      println!(
        "[port{}] grants rd={} wr={}, dropped descriptors={}, sink words={}{}",
        p.port,
        p.read_grants,
        p.write_grants,
        p.dropped_descriptors,
        p.sink_words,
        match p.sink_match {
          Some(true) => ", sink matches reference",
          Some(false) => ", SINK MISMATCH",
          None => "",
        }
      );
    }
    println!(
      "[mem] read bursts={} write bursts={} error responses={}",
      self.memory.read_bursts, self.memory.write_bursts, self.memory.errors
    );
    match self.memory_match {
      Some(true) => println!("[mem] contents match reference"),
      Some(false) => println!("[mem] CONTENTS MISMATCH"),
      None => {},
    }
    for m in &self.mismatches {
      println!(
        "[script] {}:{} @{} RD {:08x}: expected {:08x}, got {:08x}",
        m.script, m.line, m.cycle, m.addr, m.expected, m.got
      );
    }
    println!("result: {}", if self.passed() { "PASS" } else { "FAIL" });
    println!("--- End Report ---\n");
  }
}
