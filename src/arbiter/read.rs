//! Read-channel arbiter.
//!
//! Address requests are granted round-robin and forwarded one at a time.
//! Every granted burst leaves its requester id in an ownership queue; read
//! data is steered to the queue head and the head retires on the last
//! beat. The queue depth bounds the number of outstanding reads.

use super::ownership::OwnershipQueue;
use super::request_mask;
use crate::builtin::{Module, RoundRobin, SkidBuffer};
use crate::bus::{AddrReq, ReadBeat, ReadBus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadArbiterConfig {
  pub requesters: usize,
  /// Ownership queue depth, the outstanding-read limit
  pub max_outstanding: usize,
  /// Register slice on every requester's AR
  pub input_register: bool,
  /// Register slices on the bus-side AR and on returning R
  pub output_register: bool,
}

pub struct ReadArbiter {
  name: String,
  config: ReadArbiterConfig,
  rr: RoundRobin,
  queue: OwnershipQueue,

  in_skid: Vec<SkidBuffer<AddrReq>>,
  ar_skid: SkidBuffer<AddrReq>,
  r_skid: SkidBuffer<ReadBeat>,

  /// Requester side: masters drive AR and R ready, the arbiter the rest
  pub up: Vec<ReadBus>,
  /// Memory side: the arbiter drives AR and R ready
  pub down: ReadBus,

  // Resolved in eval()
  sel_fire: bool,

  grants: Vec<u64>,
}

impl ReadArbiter {
  pub fn new(name: impl Into<String>, config: ReadArbiterConfig) -> Self {
    let n = config.requesters;
    Self {
      name: name.into(),
      config,
      rr: RoundRobin::new(n),
      queue: OwnershipQueue::new(config.max_outstanding),
      in_skid: (0..n).map(|_| SkidBuffer::new()).collect(),
      ar_skid: SkidBuffer::new(),
      r_skid: SkidBuffer::new(),
      up: vec![ReadBus::default(); n],
      down: ReadBus::default(),
      sel_fire: false,
      grants: vec![0; n],
    }
  }

  pub fn selected(&self) -> usize {
    self.rr.selected()
  }

  pub fn outstanding(&self) -> usize {
    self.queue.len()
  }

  pub fn queue(&self) -> &OwnershipQueue {
    &self.queue
  }

  /// Number of address grants per requester
  pub fn grants(&self) -> &[u64] {
    &self.grants
  }

  pub fn is_idle(&self) -> bool {
    self.queue.is_empty()
      && self.ar_skid.is_empty()
      && self.r_skid.is_empty()
      && self.in_skid.iter().all(SkidBuffer::is_empty)
  }

  /// AR offered by requester `i` after its optional input register
  fn source(&self, i: usize) -> Option<AddrReq> {
    if self.config.input_register {
      self.in_skid[i].peek().copied()
    } else {
      self.up[i].ar.data.get().copied()
    }
  }

  fn requests(&self) -> u32 {
    request_mask((0..self.up.len()).map(|i| self.source(i).is_some()))
  }
}

impl Module for ReadArbiter {
  fn eval(&mut self) {
    let sel = self.rr.selected();
    let room = !self.queue.is_full();
    let src = self.source(sel).map(|mut ar| {
      ar.id = sel as u8;
      ar
    });

    // Address path
    let accept = if self.config.output_register {
      self.down.ar.data.drive(self.ar_skid.peek().copied());
      self.ar_skid.in_ready()
    } else {
      self.down.ar.data.drive(src.filter(|_| room));
      self.down.ar.ready
    };
    self.sel_fire = room && accept && src.is_some();

    for (i, bus) in self.up.iter_mut().enumerate() {
      bus.ar.ready = if self.config.input_register {
        self.in_skid[i].in_ready()
      } else {
        i == sel && room && accept
      };
      bus.r.data.clear();
    }

    // Data path
    let beat = if self.config.output_register {
      self.r_skid.peek().copied()
    } else {
      self.down.r.data.get().copied()
    };
    let deliver_ready = match self.queue.head() {
      Some(h) => {
        self.up[h].r.data.drive(beat);
        self.up[h].r.ready
      },
      None => false,
    };
    self.down.r.ready = if self.config.output_register {
      self.r_skid.in_ready()
    } else {
      deliver_ready
    };
  }

  fn run(&mut self) {
    let sel = self.rr.selected();
    let requests = self.requests();

    // Taken before the input registers advance past it
    let granted = self.source(sel).filter(|_| self.sel_fire).map(|mut ar| {
      ar.id = sel as u8;
      ar
    });

    if self.config.input_register {
      for i in 0..self.up.len() {
        let pushed = self.up[i].ar.fired().copied();
        self.in_skid[i].tick(pushed, i == sel && self.sel_fire);
      }
    }

    if self.sel_fire {
      self.queue.push(sel);
      self.grants[sel] += 1;
      log::trace!("[{}] AR grant -> {}", self.name, sel);
    }
    if self.config.output_register {
      let popped = self.down.ar.fire();
      self.ar_skid.tick(granted, popped);
    }

    if self.sel_fire || requests & (1 << sel) == 0 {
      self.rr.advance(requests);
    }

    let delivered = self.queue.head().and_then(|h| self.up[h].r.fired().copied());
    if let Some(beat) = delivered {
      debug_assert_eq!(Some(beat.id as usize), self.queue.head(), "read data out of order");
      if beat.last {
        self.queue.pop();
      }
    }
    if self.config.output_register {
      let pushed = self.down.r.fired().copied();
      self.r_skid.tick(pushed, delivered.is_some());
    }

    self.sel_fire = false;
  }

  fn reset(&mut self) {
    self.rr.reset();
    self.queue.clear();
    self.in_skid.iter_mut().for_each(SkidBuffer::clear);
    self.ar_skid.clear();
    self.r_skid.clear();
    self.up.iter_mut().for_each(|b| *b = ReadBus::default());
    self.down = ReadBus::default();
    self.sel_fire = false;
  }

  fn name(&self) -> &str {
    &self.name
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::bus::{BusGeometry, Resp};

  fn arbiter(n: usize, depth: usize) -> ReadArbiter {
    ReadArbiter::new(
      "rd_arb",
      ReadArbiterConfig {
        requesters: n,
        max_outstanding: depth,
        input_register: false,
        output_register: false,
      },
    )
  }

  fn request(arb: &mut ReadArbiter, i: usize, addr: u64) {
    arb.up[i].ar.data.set(AddrReq::incr(addr, 1, &BusGeometry::default()));
    arb.up[i].r.ready = true;
  }

  #[test]
  fn alternates_between_continuous_requesters() {
    let mut arb = arbiter(2, 8);
    let mut order = Vec::new();
    for _ in 0..4 {
      request(&mut arb, 0, 0x0);
      request(&mut arb, 1, 0x1000);
      arb.down.ar.ready = true;
      arb.eval();
      order.push(arb.down.ar.data.get().map(|ar| ar.id));
      arb.run();
    }
    assert_eq!(order, vec![Some(0), Some(1), Some(0), Some(1)]);
  }

  #[test]
  fn full_queue_blocks_address_phase() {
    let mut arb = arbiter(1, 1);
    request(&mut arb, 0, 0);
    arb.down.ar.ready = true;
    arb.eval();
    assert!(arb.down.ar.fire());
    arb.run();

    arb.eval();
    assert!(arb.down.ar.data.get().is_none());
    assert!(!arb.up[0].ar.ready);

    arb.down.r.data.set(ReadBeat {
      id: 0,
      data: 7,
      resp: Resp::Okay,
      last: true,
    });
    arb.eval();
    assert_eq!(arb.up[0].r.data.get().map(|b| b.data), Some(7));
    assert!(arb.down.r.ready);
    arb.run();
    assert_eq!(arb.outstanding(), 0);
  }
}
