use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// One word on the streaming side, with its end-of-frame tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StreamBeat {
  pub data: u64,
  pub last: bool,
}

impl StreamBeat {
  pub fn new(data: u64, last: bool) -> Self {
    Self { data, last }
  }
}

/// Bounded word buffer between an engine and its stream endpoint
///
/// With `frame_latch` set, the FIFO refuses pushes while it holds a
/// last-tagged beat, so it never contains words of two frames.
#[derive(Debug, Clone)]
pub struct StreamFifo {
  buf: VecDeque<StreamBeat>,
  capacity: usize,
  frame_latch: bool,
  eof_held: usize,
}

impl StreamFifo {
  pub fn new(capacity: usize, frame_latch: bool) -> Self {
    Self {
      buf: VecDeque::with_capacity(capacity),
      capacity,
      frame_latch,
      eof_held: 0,
    }
  }

  pub fn capacity(&self) -> usize {
    self.capacity
  }

  pub fn level(&self) -> u32 {
    self.buf.len() as u32
  }

  pub fn free(&self) -> u32 {
    (self.capacity - self.buf.len()) as u32
  }

  pub fn is_empty(&self) -> bool {
    self.buf.is_empty()
  }

  /// A last-tagged beat is buffered and the frame latch is active
  pub fn eof_latched(&self) -> bool {
    self.frame_latch && self.eof_held > 0
  }

  pub fn can_push(&self) -> bool {
    self.buf.len() < self.capacity && !self.eof_latched()
  }

  /// Returns false (and drops nothing) when the push is not allowed
  pub fn push(&mut self, beat: StreamBeat) -> bool {
    if !self.can_push() {
      return false;
    }
    if beat.last {
      self.eof_held += 1;
    }
    self.buf.push_back(beat);
    true
  }

  pub fn head(&self) -> Option<&StreamBeat> {
    self.buf.front()
  }

  pub fn pop(&mut self) -> Option<StreamBeat> {
    let beat = self.buf.pop_front()?;
    if beat.last {
      self.eof_held -= 1;
    }
    Some(beat)
  }

  pub fn clear(&mut self) {
    self.buf.clear();
    self.eof_held = 0;
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn frame_latch_blocks_second_frame() {
    let mut fifo = StreamFifo::new(8, true);
    assert!(fifo.push(StreamBeat::new(1, false)));
    assert!(fifo.push(StreamBeat::new(2, true)));
    assert!(fifo.eof_latched());
    assert!(!fifo.push(StreamBeat::new(3, false)));

    fifo.pop();
    assert!(fifo.eof_latched());
    fifo.pop();
    assert!(!fifo.eof_latched());
    assert!(fifo.push(StreamBeat::new(3, false)));
  }

  #[test]
  fn capacity_is_respected() {
    let mut fifo = StreamFifo::new(2, false);
    assert!(fifo.push(StreamBeat::new(1, true)));
    assert!(fifo.push(StreamBeat::new(2, true)));
    assert!(!fifo.push(StreamBeat::new(3, false)));
    assert_eq!(fifo.free(), 0);
  }
}
