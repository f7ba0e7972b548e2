//! Memory responder: the slave end of the shared bus.
//!
//! Reads are pipelined up to `read_outstanding` bursts and complete in
//! order. Writes are handled one transaction at a time: AW and W are
//! collected independently, committed together, and answered on B after
//! `write_latency` cycles.

use std::collections::VecDeque;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::builtin::Module;
use crate::bus::{AddrReq, BusGeometry, ReadBeat, ReadBus, Resp, WriteBeat, WriteBus, WriteResp};
use crate::error::{Result, SimError};

/// Byte range `[start, end)` that answers every access with `resp`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRegion {
  pub start: u64,
  pub end: u64,
  pub resp: Resp,
}

impl ErrorRegion {
  pub fn contains(&self, addr: u64) -> bool {
    addr >= self.start && addr < self.end
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryParams {
  pub size_words: usize,
  pub read_latency: u32,
  pub write_latency: u32,
  pub read_outstanding: usize,
  pub error_regions: Vec<ErrorRegion>,
}

impl Default for MemoryParams {
  fn default() -> Self {
    Self {
      size_words: 1 << 14,
      read_latency: 4,
      write_latency: 2,
      read_outstanding: 4,
      error_regions: Vec::new(),
    }
  }
}

#[derive(Debug, Clone, Copy)]
struct ReadJob {
  req: AddrReq,
  ready_at: u64,
  beat: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MemoryStats {
  pub read_bursts: u64,
  pub write_bursts: u64,
  pub read_words: u64,
  pub write_words: u64,
  pub errors: u64,
}

pub struct AxiMemory {
  name: String,
  params: MemoryParams,
  geometry: BusGeometry,
  words: Vec<u64>,
  cycle: u64,

  reads: VecDeque<ReadJob>,
  aw: Option<AddrReq>,
  w_beats: Vec<WriteBeat>,
  w_done: bool,
  b_pending: Option<(WriteResp, u64)>,

  pub rd: ReadBus,
  pub wr: WriteBus,

  stats: MemoryStats,
}

impl AxiMemory {
  pub fn new(name: impl Into<String>, params: MemoryParams, geometry: BusGeometry) -> Self {
    Self {
      name: name.into(),
      words: vec![0; params.size_words],
      params,
      geometry,
      cycle: 0,
      reads: VecDeque::new(),
      aw: None,
      w_beats: Vec::new(),
      w_done: false,
      b_pending: None,
      rd: ReadBus::default(),
      wr: WriteBus::default(),
      stats: MemoryStats::default(),
    }
  }

  pub fn words(&self) -> &[u64] {
    &self.words
  }

  pub fn read_word(&self, index: usize) -> Option<u64> {
    self.words.get(index).copied()
  }

  pub fn write_word(&mut self, index: usize, value: u64) -> bool {
    match self.words.get_mut(index) {
      Some(w) => {
        *w = value;
        true
      },
      None => false,
    }
  }

  /// Copy `data` into memory starting at word `base`
  pub fn load_words(&mut self, base: usize, data: &[u64]) -> Result<()> {
    let end = base + data.len();
    if end > self.words.len() {
      return Err(SimError::invalid(format!(
        "image of {} words at {} overflows memory of {} words",
        data.len(),
        base,
        self.words.len()
      )));
    }
    self.words[base..end].copy_from_slice(data);
    Ok(())
  }

  pub fn load_image(&mut self, path: &Path) -> Result<()> {
    let text = fs::read_to_string(path).map_err(|e| SimError::io(path, e))?;
    let data = parse_image(&text, &path.display().to_string())?;
    log::info!("[{}] loaded {} words from {}", self.name, data.len(), path.display());
    self.load_words(0, &data)
  }

  pub fn dump_image(&self, path: &Path) -> Result<()> {
    fs::write(path, format_image(&self.words)).map_err(|e| SimError::io(path, e))
  }

  pub fn stats(&self) -> &MemoryStats {
    &self.stats
  }

  pub fn is_idle(&self) -> bool {
    self.reads.is_empty() && self.aw.is_none() && self.w_beats.is_empty() && self.b_pending.is_none()
  }

  /// Word index for a byte address, or the response code it fails with
  fn locate(&self, addr: u64) -> std::result::Result<usize, Resp> {
    if let Some(region) = self.params.error_regions.iter().find(|r| r.contains(addr)) {
      return Err(region.resp);
    }
    let index = self.geometry.word_index(addr);
    if index < self.words.len() as u64 {
      Ok(index as usize)
    } else {
      Err(Resp::DecErr)
    }
  }

  fn read_beat(&self, job: &ReadJob) -> ReadBeat {
    let addr = self.geometry.advance(job.req.addr, job.beat);
    let (data, resp) = match self.locate(addr) {
      Ok(i) => (self.words[i], Resp::Okay),
      Err(resp) => (0, resp),
    };
    ReadBeat {
      id: job.req.id,
      data,
      resp,
      last: job.beat + 1 == job.req.beats(),
    }
  }

  /// Store every collected beat and return the worst response
  fn commit_write(&mut self, aw: AddrReq) -> Resp {
    let mut worst = Resp::Okay;
    let beats = std::mem::take(&mut self.w_beats);
    if beats.len() as u32 != aw.beats() {
      log::warn!("[{}] AW len {} but {} W beats", self.name, aw.beats(), beats.len());
    }
    for (i, beat) in beats.iter().enumerate() {
      let addr = self.geometry.advance(aw.addr, i as u32);
      match self.locate(addr) {
        Ok(index) => self.words[index] = beat.data,
        Err(resp) => worst = worst.max(resp),
      }
    }
    self.stats.write_words += beats.len() as u64;
    worst
  }
}

impl Module for AxiMemory {
  fn eval(&mut self) {
    self.rd.ar.ready = self.reads.len() < self.params.read_outstanding;
    let beat = self.reads.front().filter(|j| j.ready_at <= self.cycle).map(|j| self.read_beat(j));
    self.rd.r.data.drive(beat);

    self.wr.aw.ready = self.aw.is_none() && self.b_pending.is_none();
    self.wr.w.ready = !self.w_done && self.b_pending.is_none();
    let b = self.b_pending.filter(|(_, at)| *at <= self.cycle).map(|(b, _)| b);
    self.wr.b.data.drive(b);
  }

  fn run(&mut self) {
    if let Some(beat) = self.rd.r.fired().copied() {
      if beat.resp.is_err() {
        self.stats.errors += 1;
      }
      self.stats.read_words += 1;
      if beat.last {
        self.reads.pop_front();
      } else if let Some(job) = self.reads.front_mut() {
        job.beat += 1;
      }
    }
    if let Some(req) = self.rd.ar.fired().copied() {
      self.stats.read_bursts += 1;
      self.reads.push_back(ReadJob {
        req,
        ready_at: self.cycle + self.params.read_latency.max(1) as u64,
        beat: 0,
      });
    }

    if self.wr.b.fire() {
      self.b_pending = None;
    }
    if let Some(req) = self.wr.aw.fired().copied() {
      self.aw = Some(req);
    }
    if let Some(beat) = self.wr.w.fired().copied() {
      self.w_beats.push(beat);
      self.w_done = beat.last;
    }
    if self.w_done {
      if let Some(aw) = self.aw.take() {
        let resp = self.commit_write(aw);
        if resp.is_err() {
          self.stats.errors += 1;
          log::debug!("[{}] write at {:#x} answered {:?}", self.name, aw.addr, resp);
        }
        self.stats.write_bursts += 1;
        self.w_done = false;
        let ready_at = self.cycle + self.params.write_latency.max(1) as u64;
        self.b_pending = Some((WriteResp { id: aw.id, resp }, ready_at));
      }
    }

    self.cycle += 1;
  }

  fn reset(&mut self) {
    self.reads.clear();
    self.aw = None;
    self.w_beats.clear();
    self.w_done = false;
    self.b_pending = None;
    self.rd = ReadBus::default();
    self.wr = WriteBus::default();
  }

  fn name(&self) -> &str {
    &self.name
  }
}

/// One hex word per line; blank lines and `#` comments are skipped
pub fn parse_image(text: &str, file: &str) -> Result<Vec<u64>> {
  let mut out = Vec::new();
  for (n, raw) in text.lines().enumerate() {
    let line = raw.split('#').next().unwrap_or("").trim();
    if line.is_empty() {
      continue;
    }
    let digits = line.trim_start_matches("0x").trim_start_matches("0X");
    let word = u64::from_str_radix(digits, 16)
      .map_err(|e| SimError::parse(file, n + 1, format!("bad hex word '{}': {}", line, e)))?;
    out.push(word);
  }
  Ok(out)
}

pub fn format_image(words: &[u64]) -> String {
  words.iter().map(|w| format!("{:016x}\n", w)).collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  fn memory(params: MemoryParams) -> AxiMemory {
    AxiMemory::new("mem", params, BusGeometry::default())
  }

  /// Drive one AR and collect the beats that come back
  fn read_burst(mem: &mut AxiMemory, addr: u64, beats: u32) -> Vec<ReadBeat> {
    let mut got = Vec::new();
    mem.rd.ar.data.set(AddrReq::incr(addr, beats, &BusGeometry::default()));
    mem.rd.r.ready = true;
    for _ in 0..64 {
      mem.eval();
      if mem.rd.ar.fire() {
        mem.run();
        mem.rd.ar.data.clear();
        continue;
      }
      if let Some(b) = mem.rd.r.fired() {
        got.push(*b);
      }
      mem.run();
      if got.last().map_or(false, |b| b.last) {
        break;
      }
    }
    got
  }

  #[test]
  fn read_returns_stored_words_after_latency() {
    let mut mem = memory(MemoryParams::default());
    mem.load_words(2, &[11, 12, 13]).unwrap();
    let beats = read_burst(&mut mem, 16, 3);
    assert_eq!(beats.iter().map(|b| b.data).collect::<Vec<_>>(), vec![11, 12, 13]);
    assert!(beats[2].last);
    assert!(beats.iter().all(|b| b.resp == Resp::Okay));
  }

  #[test]
  fn out_of_range_and_error_region() {
    let mut mem = memory(MemoryParams {
      size_words: 4,
      error_regions: vec![ErrorRegion {
        start: 0x8,
        end: 0x10,
        resp: Resp::SlvErr,
      }],
      ..MemoryParams::default()
    });
    let beats = read_burst(&mut mem, 0x0, 1);
    assert_eq!(beats[0].resp, Resp::Okay);
    let beats = read_burst(&mut mem, 0x8, 1);
    assert_eq!(beats[0].resp, Resp::SlvErr);
    let beats = read_burst(&mut mem, 0x20, 1);
    assert_eq!((beats[0].data, beats[0].resp), (0, Resp::DecErr));
  }

  #[test]
  fn write_commits_then_answers() {
    let mut mem = memory(MemoryParams::default());
    mem.wr.aw.data.set(AddrReq::incr(8, 2, &BusGeometry::default()));
    mem.wr.w.data.set(WriteBeat::full(5, false));
    mem.wr.b.ready = true;
    mem.eval();
    mem.run();
    mem.wr.aw.data.clear();
    mem.wr.w.data.set(WriteBeat::full(6, true));
    mem.eval();
    mem.run();
    mem.wr.w.data.clear();
    assert_eq!(&mem.words()[1..3], &[5, 6]);

    let mut resp = None;
    for _ in 0..8 {
      mem.eval();
      if let Some(b) = mem.wr.b.fired() {
        resp = Some(b.resp);
      }
      mem.run();
    }
    assert_eq!(resp, Some(Resp::Okay));
    assert!(mem.is_idle());
  }

  #[test]
  fn image_text_format() {
    let text = format_image(&[0x1, 0xdead_beef]);
    assert_eq!(text, "0000000000000001\n00000000deadbeef\n");
    assert_eq!(parse_image(&text, "img").unwrap(), vec![1, 0xdead_beef]);
    assert!(parse_image("zz\n", "img").is_err());
  }
}
