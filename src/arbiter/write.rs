//! Write-channel arbiter.
//!
//! The first AW or W handshake of the selected requester locks it in; its
//! address, data and response then complete before anyone else is
//! connected, so write bursts of different requesters never interleave.

use serde::Serialize;

use super::request_mask;
use crate::builtin::{Module, RoundRobin};
use crate::bus::WriteBus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum WriteArbState {
  #[default]
  Select,
  /// Data still flowing; `addr_done` once AW has been accepted
  WaitWriteChannel { id: usize, addr_done: bool },
  /// All data accepted, address still pending
  WaitAddressChannel { id: usize },
  WaitResponseChannel { id: usize },
}

impl WriteArbState {
  /// (owner, AW open, W open, B open)
  fn routing(self, selected: usize) -> (usize, bool, bool, bool) {
    match self {
      WriteArbState::Select => (selected, true, true, false),
      WriteArbState::WaitWriteChannel { id, addr_done } => (id, !addr_done, true, false),
      WriteArbState::WaitAddressChannel { id } => (id, true, false, false),
      WriteArbState::WaitResponseChannel { id } => (id, false, false, true),
    }
  }
}

pub struct WriteArbiter {
  name: String,
  rr: RoundRobin,
  state: WriteArbState,

  pub up: Vec<WriteBus>,
  pub down: WriteBus,

  grants: Vec<u64>,
}

impl WriteArbiter {
  pub fn new(name: impl Into<String>, requesters: usize) -> Self {
    Self {
      name: name.into(),
      rr: RoundRobin::new(requesters),
      state: WriteArbState::Select,
      up: vec![WriteBus::default(); requesters],
      down: WriteBus::default(),
      grants: vec![0; requesters],
    }
  }

  pub fn state(&self) -> WriteArbState {
    self.state
  }

  pub fn selected(&self) -> usize {
    self.rr.selected()
  }

  pub fn grants(&self) -> &[u64] {
    &self.grants
  }

  pub fn is_idle(&self) -> bool {
    self.state == WriteArbState::Select
  }

  fn requests(&self) -> u32 {
    request_mask(self.up.iter().map(|b| b.aw.data.valid || b.w.data.valid))
  }
}

impl Module for WriteArbiter {
  fn eval(&mut self) {
    let (owner, aw_open, w_open, b_open) = self.state.routing(self.rr.selected());

    for bus in self.up.iter_mut() {
      bus.aw.ready = false;
      bus.w.ready = false;
      bus.b.data.clear();
    }

    let aw = self.up[owner].aw.data.get().copied().filter(|_| aw_open).map(|mut aw| {
      aw.id = owner as u8;
      aw
    });
    self.down.aw.data.drive(aw);
    self.down.w.data.drive(self.up[owner].w.data.get().copied().filter(|_| w_open));
    self.up[owner].aw.ready = aw_open && self.down.aw.ready;
    self.up[owner].w.ready = w_open && self.down.w.ready;

    if b_open {
      self.up[owner].b.forward_from(&self.down.b);
      self.down.b.ready = self.up[owner].b.ready;
    } else {
      self.down.b.ready = false;
    }
  }

  fn run(&mut self) {
    let sel = self.rr.selected();
    let requests = self.requests();
    let aw_fire = self.down.aw.fire();
    let w_fire = self.down.w.fire();
    let w_last = w_fire && self.down.w.data.value.last;
    let b_fire = self.down.b.fire();

    self.state = match self.state {
      WriteArbState::Select => {
        if aw_fire || w_fire {
          self.grants[sel] += 1;
          log::trace!("[{}] AW/W locked to {}", self.name, sel);
          if aw_fire && w_last {
            WriteArbState::WaitResponseChannel { id: sel }
          } else if w_last {
            WriteArbState::WaitAddressChannel { id: sel }
          } else {
            WriteArbState::WaitWriteChannel {
              id: sel,
              addr_done: aw_fire,
            }
          }
        } else {
          if requests & (1 << sel) == 0 {
            self.rr.advance(requests);
          }
          WriteArbState::Select
        }
      },
      WriteArbState::WaitWriteChannel { id, addr_done } => {
        let addr_done = addr_done || aw_fire;
        if w_last && addr_done {
          WriteArbState::WaitResponseChannel { id }
        } else if w_last {
          WriteArbState::WaitAddressChannel { id }
        } else {
          WriteArbState::WaitWriteChannel { id, addr_done }
        }
      },
      WriteArbState::WaitAddressChannel { id } => {
        if aw_fire {
          WriteArbState::WaitResponseChannel { id }
        } else {
          WriteArbState::WaitAddressChannel { id }
        }
      },
      WriteArbState::WaitResponseChannel { id } => {
        if b_fire {
          self.rr.advance(requests);
          WriteArbState::Select
        } else {
          WriteArbState::WaitResponseChannel { id }
        }
      },
    };
  }

  fn reset(&mut self) {
    self.rr.reset();
    self.state = WriteArbState::Select;
    self.up.iter_mut().for_each(|b| *b = WriteBus::default());
    self.down = WriteBus::default();
  }

  fn name(&self) -> &str {
    &self.name
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::bus::{AddrReq, BusGeometry, Resp, WriteBeat, WriteResp};

  fn aw(addr: u64, beats: u32) -> AddrReq {
    AddrReq::incr(addr, beats, &BusGeometry::default())
  }

  #[test]
  fn winner_holds_the_bus_until_b() {
    let mut arb = WriteArbiter::new("wr_arb", 2);
    arb.down.aw.ready = true;
    arb.down.w.ready = true;

    // Both request; requester 0 wins and sends AW plus the first of two beats
    arb.up[0].aw.data.set(aw(0x0, 2));
    arb.up[0].w.data.set(WriteBeat::full(1, false));
    arb.up[1].aw.data.set(aw(0x1000, 1));
    arb.eval();
    assert_eq!(arb.down.aw.data.get().map(|a| a.id), Some(0));
    arb.run();
    assert_eq!(arb.state(), WriteArbState::WaitWriteChannel { id: 0, addr_done: true });

    // Requester 1 keeps asking but only 0's W gets through
    arb.up[0].aw.data.clear();
    arb.up[0].w.data.set(WriteBeat::full(2, true));
    arb.eval();
    assert!(arb.down.aw.data.get().is_none());
    assert!(!arb.up[1].aw.ready);
    assert_eq!(arb.down.w.data.get().map(|w| w.data), Some(2));
    arb.run();
    assert_eq!(arb.state(), WriteArbState::WaitResponseChannel { id: 0 });

    arb.up[0].w.data.clear();
    arb.up[0].b.ready = true;
    arb.up[1].b.ready = true;
    arb.down.b.data.set(WriteResp { id: 0, resp: Resp::Okay });
    arb.eval();
    assert!(arb.up[0].b.fire());
    assert!(arb.up[1].b.data.get().is_none());
    arb.run();
    arb.down.b.data.clear();

    assert_eq!(arb.state(), WriteArbState::Select);
    assert_eq!(arb.selected(), 1);
    arb.eval();
    assert_eq!(arb.down.aw.data.get().map(|a| a.id), Some(1));
  }

  #[test]
  fn data_before_address_waits_for_aw() {
    let mut arb = WriteArbiter::new("wr_arb", 1);
    arb.down.w.ready = true;
    arb.up[0].aw.data.set(aw(0x40, 1));
    arb.up[0].w.data.set(WriteBeat::full(9, true));
    arb.eval();
    arb.run();
    assert_eq!(arb.state(), WriteArbState::WaitAddressChannel { id: 0 });

    arb.down.aw.ready = true;
    arb.up[0].w.data.clear();
    arb.eval();
    assert!(arb.down.w.data.get().is_none());
    arb.run();
    assert_eq!(arb.state(), WriteArbState::WaitResponseChannel { id: 0 });
  }
}
