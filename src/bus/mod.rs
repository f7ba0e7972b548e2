//! AXI3-style bus surface shared by engines, arbiters and the memory responder.

pub mod axi;

pub use axi::{AddrReq, BurstKind, ReadBeat, ReadBus, Resp, WriteBeat, WriteBus, WriteResp};

/// Largest burst the protocol allows, in words
pub const MAX_BURST_WORDS: u32 = 16;

/// No burst may cross a boundary of this many bytes
pub const BOUNDARY_BYTES: u64 = 4096;

/// Data-path width of the bus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusGeometry {
  pub word_bytes: u32,
}

impl BusGeometry {
  /// Word sizes must be a power of two between 1 and 8 bytes
  pub fn new(word_bytes: u32) -> Option<Self> {
    if word_bytes.is_power_of_two() && word_bytes <= 8 {
      Some(Self { word_bytes })
    } else {
      None
    }
  }

  /// AXI `size` field: log2 of the bytes per beat
  pub fn size_code(&self) -> u8 {
    self.word_bytes.trailing_zeros() as u8
  }

  pub fn word_index(&self, addr: u64) -> u64 {
    addr / self.word_bytes as u64
  }

  /// Round a byte address down to its word
  pub fn align(&self, addr: u64) -> u64 {
    addr & !(self.word_bytes.max(1) as u64 - 1)
  }

  pub fn is_aligned(&self, addr: u64) -> bool {
    self.align(addr) == addr
  }

  pub fn advance(&self, addr: u64, words: u32) -> u64 {
    addr + words as u64 * self.word_bytes as u64
  }
}

impl Default for BusGeometry {
  fn default() -> Self {
    Self { word_bytes: 8 }
  }
}
