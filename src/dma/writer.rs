//! Write engine: stream FIFO into memory bursts.

use serde::Serialize;

use super::burst::{burst_candidate, words_until_boundary, BurstRequest, TransferDescriptor};
use super::credit::PendingTracker;
use super::fifo::StreamBeat;
use super::EngineStats;
use crate::builtin::Module;
use crate::bus::{AddrReq, BusGeometry, Resp, WriteBeat, WriteResp};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum WriteState {
  #[default]
  Idle,
  /// 1: size against remaining, 2: clamp at the 4K boundary
  PrepareBurst(u8),
  WaitForCredit,
  IssueBurst,
  TransferBurst,
  WaitForCompletion,
  Done,
}

/// Registered state of the write engine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteCore {
  pub state: WriteState,
  /// Length comes from the stream's end-of-frame tag instead of the descriptor
  frame_mode: bool,
  addr: u64,
  remaining: u32,
  length: u32,
  written: u32,
  max_burst: u32,
  candidate: u32,
  burst_len: u32,
  /// Beats of the current burst already accepted
  beat: u32,
  final_burst: bool,
  request: AddrReq,
  pub pending: PendingTracker,
  /// Bursts whose B response has not arrived yet
  outstanding: u32,
  pub error: Resp,
}

impl WriteCore {
  pub fn new(frame_mode: bool) -> Self {
    Self {
      frame_mode,
      ..Self::default()
    }
  }

  pub fn frame_mode(&self) -> bool {
    self.frame_mode
  }

  /// Status view: words left in length mode, words written in frame mode
  pub fn remaining_words(&self) -> u32 {
    if self.frame_mode {
      self.written
    } else {
      self.length - self.written
    }
  }

  pub fn outstanding(&self) -> u32 {
    self.outstanding
  }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct WriteInputs {
  pub desc: Option<TransferDescriptor>,
  pub fifo_level: u32,
  pub eof_latched: bool,
  pub aw_fire: bool,
  pub w_fire: bool,
  /// B response accepted this cycle
  pub b: Option<WriteResp>,
  pub clear_error: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteOutputs {
  pub desc_ready: bool,
  pub aw: Option<AddrReq>,
  pub w: Option<WriteBeat>,
  pub b_ready: bool,
  pub done: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteStep {
  pub desc_taken: bool,
  pub issued: Option<BurstRequest>,
  /// The FIFO head was sent on W and must be popped
  pub pop: bool,
}

/// W data comes straight from the source FIFO head
pub fn outputs(core: &WriteCore, fifo_head: Option<&StreamBeat>) -> WriteOutputs {
  let w = match core.state {
    WriteState::TransferBurst => fifo_head.map(|h| WriteBeat::full(h.data, core.beat + 1 == core.burst_len)),
    _ => None,
  };
  WriteOutputs {
    desc_ready: core.state == WriteState::Idle,
    aw: (core.state == WriteState::IssueBurst).then_some(core.request),
    w,
    b_ready: true,
    done: core.state == WriteState::Done,
  }
}

pub fn transition(core: &WriteCore, inp: &WriteInputs, geometry: &BusGeometry) -> (WriteCore, WriteStep) {
  let mut next = *core;
  let mut step = WriteStep::default();

  if inp.clear_error {
    next.error = Resp::Okay;
  }

  if let Some(b) = inp.b {
    match next.outstanding.checked_sub(1) {
      Some(n) => next.outstanding = n,
      None => log::warn!("write response with no outstanding burst, ignored"),
    }
    if b.resp.is_err() {
      next.error = b.resp;
    }
  }

  next.state = match core.state {
    WriteState::Idle => match inp.desc {
      Some(desc) => {
        step.desc_taken = true;
        next.addr = geometry.align(desc.start_address);
        next.length = desc.length_words;
        next.remaining = desc.length_words;
        next.written = 0;
        next.max_burst = desc.max_burst_words.clamp(1, 16);
        if !core.frame_mode && desc.length_words == 0 {
          WriteState::Done
        } else {
          WriteState::PrepareBurst(1)
        }
      },
      None => WriteState::Idle,
    },
    WriteState::PrepareBurst(1) => {
      next.candidate = if core.frame_mode {
        core.max_burst
      } else {
        burst_candidate(core.remaining, core.max_burst)
      };
      WriteState::PrepareBurst(2)
    },
    WriteState::PrepareBurst(_) => {
      next.candidate = core.candidate.min(words_until_boundary(core.addr, geometry));
      WriteState::WaitForCredit
    },
    WriteState::WaitForCredit => {
      let sized = if core.frame_mode && inp.eof_latched {
        // The whole rest of the frame is buffered: size the tail burst from it
        let len = core.candidate.min(inp.fifo_level);
        (len > 0).then_some((len, inp.fifo_level <= core.candidate))
      } else if PendingTracker::write_credit(inp.fifo_level, core.candidate) {
        Some((core.candidate, !core.frame_mode && core.remaining == core.candidate))
      } else {
        None
      };
      match sized {
        Some((len, last)) => {
          next.burst_len = len;
          next.final_burst = last;
          next.request = AddrReq::incr(core.addr, len, geometry);
          WriteState::IssueBurst
        },
        None => WriteState::WaitForCredit,
      }
    },
    WriteState::IssueBurst => {
      if inp.aw_fire {
        next.pending.issue(core.burst_len);
        next.outstanding += 1;
        next.beat = 0;
        step.issued = Some(BurstRequest {
          address: core.addr,
          burst_len: core.burst_len,
        });
        WriteState::TransferBurst
      } else {
        WriteState::IssueBurst
      }
    },
    WriteState::TransferBurst => {
      if inp.w_fire {
        let last = core.beat + 1 == core.burst_len;
        next.pending.retire_word(last);
        next.beat = core.beat + 1;
        next.written = core.written + 1;
        step.pop = true;
        if last {
          next.addr = geometry.advance(core.addr, core.burst_len);
          next.remaining = core.remaining.saturating_sub(core.burst_len);
          if core.final_burst {
            WriteState::WaitForCompletion
          } else {
            WriteState::PrepareBurst(1)
          }
        } else {
          WriteState::TransferBurst
        }
      } else {
        WriteState::TransferBurst
      }
    },
    WriteState::WaitForCompletion => {
      if next.outstanding == 0 {
        WriteState::Done
      } else {
        WriteState::WaitForCompletion
      }
    },
    WriteState::Done => WriteState::Idle,
  };

  (next, step)
}

/// Write engine wrapped as a clocked module
pub struct WriteEngine {
  name: String,
  geometry: BusGeometry,
  core: WriteCore,

  pub input: WriteInputs,
  /// FIFO head seen by `eval()`
  pub fifo_head: Option<StreamBeat>,

  pub output: WriteOutputs,
  pub step: WriteStep,

  stats: EngineStats,
}

impl WriteEngine {
  pub fn new(name: impl Into<String>, geometry: BusGeometry, frame_mode: bool) -> Self {
    Self {
      name: name.into(),
      geometry,
      core: WriteCore::new(frame_mode),
      input: WriteInputs::default(),
      fifo_head: None,
      output: WriteOutputs::default(),
      step: WriteStep::default(),
      stats: EngineStats::default(),
    }
  }

  pub fn core(&self) -> &WriteCore {
    &self.core
  }

  pub fn state(&self) -> WriteState {
    self.core.state
  }

  pub fn is_idle(&self) -> bool {
    self.core.state == WriteState::Idle
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

impl Module for WriteEngine {
  fn eval(&mut self) {
    self.output = outputs(&self.core, self.fifo_head.as_ref());
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
      log::debug!("[{}] AW addr={:#x} len={}", self.name, burst.address, burst.burst_len);
    }
    if step.pop {
      self.stats.words += 1;
    }
    if let Some(b) = self.input.b {
      if b.resp.is_err() {
        self.stats.errors += 1;
        log::warn!("[{}] write response {:?} latched", self.name, b.resp);
      }
    }
    if core.state == WriteState::Done && self.core.state != WriteState::Done {
      self.stats.transfers += 1;
      log::debug!("[{}] transfer done", self.name);
    }
    self.core = core;
    self.step = step;
    self.input = WriteInputs::default();
  }

  fn reset(&mut self) {
    self.core = WriteCore::new(self.core.frame_mode);
    self.input = WriteInputs::default();
    self.fifo_head = None;
    self.output = WriteOutputs::default();
    self.step = WriteStep::default();
  }

  fn name(&self) -> &str {
    &self.name
  }
}
