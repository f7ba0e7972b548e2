use std::collections::VecDeque;

/// FIFO of requester ids, one per outstanding read burst
///
/// Pushed when a read address is granted, popped when the last beat of
/// that burst reaches its requester. The memory answers in order, so the
/// head always owns the beat on the data channel.
#[derive(Debug, Clone)]
pub struct OwnershipQueue {
  ids: VecDeque<usize>,
  depth: usize,
}

impl OwnershipQueue {
  pub fn new(depth: usize) -> Self {
    Self {
      ids: VecDeque::with_capacity(depth),
      depth,
    }
  }

  pub fn depth(&self) -> usize {
    self.depth
  }

  pub fn len(&self) -> usize {
    self.ids.len()
  }

  pub fn is_empty(&self) -> bool {
    self.ids.is_empty()
  }

  pub fn is_full(&self) -> bool {
    self.ids.len() >= self.depth
  }

  /// Returns false when the queue is full
  pub fn push(&mut self, id: usize) -> bool {
    if self.is_full() {
      return false;
    }
    self.ids.push_back(id);
    true
  }

  pub fn head(&self) -> Option<usize> {
    self.ids.front().copied()
  }

  pub fn pop(&mut self) -> Option<usize> {
    self.ids.pop_front()
  }

  pub fn clear(&mut self) {
    self.ids.clear();
  }
}
