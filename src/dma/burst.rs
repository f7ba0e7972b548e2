//! Burst decomposition of a transfer descriptor.

use serde::{Deserialize, Serialize};

use crate::bus::{BusGeometry, BOUNDARY_BYTES, MAX_BURST_WORDS};

/// One logical transfer as handed over by the register front end
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TransferDescriptor {
  pub start_address: u64,
  pub length_words: u32,
  pub max_burst_words: u32,
}

impl TransferDescriptor {
  /// `max_burst_words` is clamped into 1..=16
  pub fn new(start_address: u64, length_words: u32, max_burst_words: u32) -> Self {
    Self {
      start_address,
      length_words,
      max_burst_words: max_burst_words.clamp(1, MAX_BURST_WORDS),
    }
  }

  /// Bursts of this descriptor; an unaligned start is rounded down to its word
  pub fn bursts(&self, geometry: BusGeometry) -> BurstPlan {
    BurstPlan {
      geometry,
      addr: geometry.align(self.start_address),
      remaining: self.length_words,
      max_burst: self.max_burst_words.clamp(1, MAX_BURST_WORDS),
    }
  }
}

/// One bus-legal burst
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BurstRequest {
  pub address: u64,
  pub burst_len: u32,
}

impl BurstRequest {
  pub fn end_address(&self, geometry: &BusGeometry) -> u64 {
    geometry.advance(self.address, self.burst_len)
  }

  /// True if the burst stays inside one 4K window
  pub fn within_boundary(&self, geometry: &BusGeometry) -> bool {
    let last_byte = self.end_address(geometry) - 1;
    self.address / BOUNDARY_BYTES == last_byte / BOUNDARY_BYTES
  }
}

/// Words left before the next 4K boundary, never less than one
pub fn words_until_boundary(addr: u64, geometry: &BusGeometry) -> u32 {
  let bytes = BOUNDARY_BYTES - (addr % BOUNDARY_BYTES);
  ((bytes / geometry.word_bytes.max(1) as u64) as u32).max(1)
}

/// First sizing stage: bounded by what is left and the configured burst size
pub fn burst_candidate(remaining: u32, max_burst: u32) -> u32 {
  remaining.min(max_burst)
}

/// Full sizing rule: `min(remaining, max_burst, words until the boundary)`
pub fn burst_len(addr: u64, remaining: u32, max_burst: u32, geometry: &BusGeometry) -> u32 {
  burst_candidate(remaining, max_burst).min(words_until_boundary(addr, geometry))
}

/// Iterator over the bursts of a descriptor, in issue order
#[derive(Debug, Clone)]
pub struct BurstPlan {
  geometry: BusGeometry,
  addr: u64,
  remaining: u32,
  max_burst: u32,
}

impl Iterator for BurstPlan {
  type Item = BurstRequest;

  fn next(&mut self) -> Option<BurstRequest> {
    if self.remaining == 0 {
      return None;
    }
    let len = burst_len(self.addr, self.remaining, self.max_burst, &self.geometry);
    let req = BurstRequest {
      address: self.addr,
      burst_len: len,
    };
    self.addr = self.geometry.advance(self.addr, len);
    self.remaining -= len;
    Some(req)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn boundary_forces_split() {
    let g = BusGeometry::default();
    let desc = TransferDescriptor::new(0x0FF8, 4, 16);
    let plan: Vec<_> = desc.bursts(g).collect();
    assert_eq!(
      plan,
      vec![
        BurstRequest { address: 0x0FF8, burst_len: 1 },
        BurstRequest { address: 0x1000, burst_len: 3 },
      ]
    );
  }

  #[test]
  fn max_burst_is_clamped() {
    assert_eq!(TransferDescriptor::new(0, 10, 0).max_burst_words, 1);
    assert_eq!(TransferDescriptor::new(0, 10, 99).max_burst_words, 16);
  }

  #[test]
  fn zero_length_has_no_bursts() {
    assert_eq!(TransferDescriptor::new(0x40, 0, 8).bursts(BusGeometry::default()).count(), 0);
  }

  #[test]
  fn narrow_words_fit_more_per_window() {
    let g = BusGeometry::new(4).unwrap();
    assert_eq!(words_until_boundary(0x0FF0, &g), 4);
    assert_eq!(words_until_boundary(0x1000, &g), 1024);
  }

  #[test]
  fn unaligned_start_is_rounded_down() {
    let g = BusGeometry::default();
    assert_eq!(words_until_boundary(0x0FFC, &g), 1);
    let plan: Vec<_> = TransferDescriptor::new(0x0FFC, 4, 16).bursts(g).take(5).collect();
    assert_eq!(
      plan,
      vec![
        BurstRequest { address: 0x0FF8, burst_len: 1 },
        BurstRequest { address: 0x1000, burst_len: 3 },
      ]
    );
  }
}
