use serde::{Deserialize, Serialize};

use super::BusGeometry;
use crate::builtin::Channel;

/// Two-bit response code carried on R and B
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resp {
  #[default]
  Okay,
  ExOkay,
  SlvErr,
  DecErr,
}

impl Resp {
  pub fn code(self) -> u8 {
    match self {
      Resp::Okay => 0,
      Resp::ExOkay => 1,
      Resp::SlvErr => 2,
      Resp::DecErr => 3,
    }
  }

  pub fn from_code(code: u8) -> Self {
    match code & 0x3 {
      0 => Resp::Okay,
      1 => Resp::ExOkay,
      2 => Resp::SlvErr,
      _ => Resp::DecErr,
    }
  }

  /// Anything but OKAY is latched by the engines
  pub fn is_err(self) -> bool {
    self != Resp::Okay
  }
}

/// Burst type. Only incrementing bursts are generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BurstKind {
  Fixed,
  #[default]
  Incr,
  Wrap,
}

/// Address-phase request (AR / AW)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AddrReq {
  pub id: u8,
  pub addr: u64,
  /// Beats minus one, 0..=15
  pub len: u8,
  pub size: u8,
  pub burst: BurstKind,
}

impl AddrReq {
  /// Incrementing full-width burst of `beats` words
  pub fn incr(addr: u64, beats: u32, geometry: &BusGeometry) -> Self {
    debug_assert!((1..=16).contains(&beats), "illegal burst length {}", beats);
    Self {
      id: 0,
      addr,
      len: (beats - 1) as u8,
      size: geometry.size_code(),
      burst: BurstKind::Incr,
    }
  }

  pub fn beats(&self) -> u32 {
    self.len as u32 + 1
  }
}

/// Read-data beat (R)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReadBeat {
  pub id: u8,
  pub data: u64,
  pub resp: Resp,
  pub last: bool,
}

/// Write-data beat (W)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WriteBeat {
  pub data: u64,
  /// Byte strobes, always all-enabled
  pub strb: u8,
  pub last: bool,
}

impl WriteBeat {
  pub fn full(data: u64, last: bool) -> Self {
    Self { data, strb: 0xff, last }
  }
}

/// Write response (B)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WriteResp {
  pub id: u8,
  pub resp: Resp,
}

/// AR + R channels between one master and one slave
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReadBus {
  pub ar: Channel<AddrReq>,
  pub r: Channel<ReadBeat>,
}

impl ReadBus {
  /// Take the master-driven signals (AR valid/payload, R ready) from `m`
  pub fn from_master(&mut self, m: &ReadBus) {
    self.ar.forward_from(&m.ar);
    self.r.backward_from(&m.r);
  }

  /// Take the slave-driven signals (AR ready, R valid/payload) from `s`
  pub fn from_slave(&mut self, s: &ReadBus) {
    self.ar.backward_from(&s.ar);
    self.r.forward_from(&s.r);
  }
}

/// AW + W + B channels between one master and one slave
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBus {
  pub aw: Channel<AddrReq>,
  pub w: Channel<WriteBeat>,
  pub b: Channel<WriteResp>,
}

impl WriteBus {
  pub fn from_master(&mut self, m: &WriteBus) {
    self.aw.forward_from(&m.aw);
    self.w.forward_from(&m.w);
    self.b.backward_from(&m.b);
  }

  pub fn from_slave(&mut self, s: &WriteBus) {
    self.aw.backward_from(&s.aw);
    self.w.backward_from(&s.w);
    self.b.forward_from(&s.b);
  }
}
