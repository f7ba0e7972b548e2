use serde::Serialize;

use crate::bus::Resp;

/// Which engine of a port raised `done`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
  Reader,
  Writer,
}

/// One handshake seen on a port's bus interface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "channel", rename_all = "lowercase")]
pub enum BusEvent {
  Ar { addr: u64, len: u8 },
  R { data: u64, resp: Resp, last: bool },
  Aw { addr: u64, len: u8 },
  W { data: u64, last: bool },
  B { resp: Resp },
  Done { engine: EngineKind },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TraceRecord {
  pub cycle: u64,
  pub port: usize,
  #[serde(flatten)]
  pub event: BusEvent,
}
