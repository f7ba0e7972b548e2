//! Read engine: memory bursts into a stream FIFO.

use serde::Serialize;

use super::burst::{burst_candidate, words_until_boundary, BurstRequest, TransferDescriptor};
use super::credit::PendingTracker;
use super::fifo::StreamBeat;
use super::EngineStats;
use crate::builtin::Module;
use crate::bus::{AddrReq, BusGeometry, ReadBeat, Resp};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum ReadState {
  #[default]
  Idle,
  /// 1: size against remaining, 2: clamp at the 4K boundary, 3: register request
  PrepareBurst(u8),
  WaitForCredit,
  IssueBurst,
  TransferBurst,
  WaitForCompletion,
  Done,
}

/// Registered state of the read engine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadCore {
  pub state: ReadState,
  addr: u64,
  /// Words not yet requested on the bus
  remaining: u32,
  length: u32,
  delivered: u32,
  max_burst: u32,
  candidate: u32,
  burst_len: u32,
  request: AddrReq,
  pub pending: PendingTracker,
  pub error: Resp,
}

impl ReadCore {
  /// Words of the current transfer not yet delivered to the stream
  pub fn remaining_words(&self) -> u32 {
    self.length - self.delivered
  }
}

/// Resolved inputs for one clock edge
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadInputs {
  pub desc: Option<TransferDescriptor>,
  pub fifo_free: u32,
  pub ar_fire: bool,
  /// R beat accepted this cycle
  pub r_beat: Option<ReadBeat>,
  pub clear_error: bool,
}

/// Outputs driven from registered state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadOutputs {
  pub desc_ready: bool,
  pub ar: Option<AddrReq>,
  pub r_ready: bool,
  pub done: bool,
}

/// Side effects of one clock edge
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadStep {
  pub desc_taken: bool,
  pub issued: Option<BurstRequest>,
  /// Beat to push into the destination FIFO
  pub push: Option<StreamBeat>,
}

pub fn outputs(core: &ReadCore) -> ReadOutputs {
  ReadOutputs {
    desc_ready: core.state == ReadState::Idle,
    ar: (core.state == ReadState::IssueBurst).then_some(core.request),
    // Credit was reserved before the request went out
    r_ready: true,
    done: core.state == ReadState::Done,
  }
}

pub fn transition(core: &ReadCore, inp: &ReadInputs, geometry: &BusGeometry) -> (ReadCore, ReadStep) {
  let mut next = *core;
  let mut step = ReadStep::default();

  if inp.clear_error {
    next.error = Resp::Okay;
  }

  // Data phase runs independently of the address-phase state machine
  if let Some(beat) = inp.r_beat {
    next.pending.retire_word(beat.last);
    if beat.resp.is_err() {
      next.error = beat.resp;
    }
    next.delivered += 1;
    step.push = Some(StreamBeat::new(beat.data, next.delivered == next.length));
  }

  next.state = match core.state {
    ReadState::Idle => match inp.desc {
      Some(desc) => {
        step.desc_taken = true;
        next.addr = geometry.align(desc.start_address);
        next.length = desc.length_words;
        next.remaining = desc.length_words;
        next.delivered = 0;
        next.max_burst = desc.max_burst_words.clamp(1, 16);
        if desc.length_words == 0 {
          ReadState::Done
        } else {
          ReadState::PrepareBurst(1)
        }
      },
      None => ReadState::Idle,
    },
    ReadState::PrepareBurst(1) => {
      next.candidate = burst_candidate(core.remaining, core.max_burst);
      ReadState::PrepareBurst(2)
    },
    ReadState::PrepareBurst(2) => {
      next.burst_len = core.candidate.min(words_until_boundary(core.addr, geometry));
      ReadState::PrepareBurst(3)
    },
    ReadState::PrepareBurst(_) => {
      next.request = AddrReq::incr(core.addr, core.burst_len, geometry);
      ReadState::WaitForCredit
    },
    ReadState::WaitForCredit => {
      if core.pending.read_credit(inp.fifo_free, core.burst_len) {
        ReadState::IssueBurst
      } else {
        ReadState::WaitForCredit
      }
    },
    ReadState::IssueBurst => {
      if inp.ar_fire {
        next.pending.issue(core.burst_len);
        next.addr = geometry.advance(core.addr, core.burst_len);
        next.remaining = core.remaining - core.burst_len;
        step.issued = Some(BurstRequest {
          address: core.addr,
          burst_len: core.burst_len,
        });
        ReadState::TransferBurst
      } else {
        ReadState::IssueBurst
      }
    },
    ReadState::TransferBurst => {
      if core.remaining > 0 {
        ReadState::PrepareBurst(1)
      } else {
        ReadState::WaitForCompletion
      }
    },
    ReadState::WaitForCompletion => {
      if next.pending.is_idle() {
        ReadState::Done
      } else {
        ReadState::WaitForCompletion
      }
    },
    ReadState::Done => ReadState::Idle,
  };

  (next, step)
}

/// Read engine wrapped as a clocked module
pub struct ReadEngine {
  name: String,
  geometry: BusGeometry,
  core: ReadCore,

  // Inputs, set by the port before run()
  pub input: ReadInputs,

  // Outputs
  pub output: ReadOutputs,
  pub step: ReadStep,

  stats: EngineStats,
}

impl ReadEngine {
  pub fn new(name: impl Into<String>, geometry: BusGeometry) -> Self {
    Self {
      name: name.into(),
      geometry,
      core: ReadCore::default(),
      input: ReadInputs::default(),
      output: ReadOutputs::default(),
      step: ReadStep::default(),
      stats: EngineStats::default(),
    }
  }

  pub fn core(&self) -> &ReadCore {
    &self.core
  }

  pub fn state(&self) -> ReadState {
    self.core.state
  }

  pub fn is_idle(&self) -> bool {
    self.core.state == ReadState::Idle
  }

  pub fn error(&self) -> Resp {
    self.core.error
  }

  pub fn pending_words(&self) -> u32 {
    self.core.pending.words()
  }

  pub fn stats(&self) -> &EngineStats {
    &self.stats
  }
}

impl Module for ReadEngine {
  fn eval(&mut self) {
    self.output = outputs(&self.core);
  }

  fn run(&mut self) {
    let (core, step) = transition(&self.core, &self.input, &self.geometry);
    if let Some(desc) = self.input.desc.filter(|_| step.desc_taken) {
      if !self.geometry.is_aligned(desc.start_address) {
        log::warn!(
          "[{}] start {:#x} not word aligned, using {:#x}",
          self.name,
          desc.start_address,
          core.addr
        );
      }
    }
    if let Some(burst) = step.issued {
      self.stats.bursts += 1;
      log::debug!("[{}] AR addr={:#x} len={}", self.name, burst.address, burst.burst_len);
    }
    if let Some(beat) = self.input.r_beat {
      self.stats.words += 1;
      if beat.resp.is_err() {
        self.stats.errors += 1;
        log::warn!("[{}] read response {:?} latched", self.name, beat.resp);
      }
    }
    if core.state == ReadState::Done && self.core.state != ReadState::Done {
      self.stats.transfers += 1;
      log::debug!("[{}] transfer done", self.name);
    }
    self.core = core;
    self.step = step;
    self.input = ReadInputs::default();
  }

  fn reset(&mut self) {
    self.core = ReadCore::default();
    self.input = ReadInputs::default();
    self.output = ReadOutputs::default();
    self.step = ReadStep::default();
  }

  fn name(&self) -> &str {
    &self.name
  }
}
