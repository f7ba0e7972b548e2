/// Pending-transaction tracker
///
/// Counts words and bursts that were granted on the bus but whose data has
/// not moved yet. Only granted bursts are counted, never ones still waiting
/// for the arbiter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PendingTracker {
  words: u32,
  bursts: u32,
}

impl PendingTracker {
  pub fn words(&self) -> u32 {
    self.words
  }

  pub fn bursts(&self) -> u32 {
    self.bursts
  }

  pub fn is_idle(&self) -> bool {
    self.words == 0 && self.bursts == 0
  }

  /// Address handshake of a `beats`-word burst completed
  pub fn issue(&mut self, beats: u32) {
    self.words += beats;
    self.bursts += 1;
  }

  /// One data word moved; `last` closes the burst
  pub fn retire_word(&mut self, last: bool) {
    match self.words.checked_sub(1) {
      Some(w) => self.words = w,
      None => log::warn!("data beat with no pending words, ignored"),
    }
    if last {
      match self.bursts.checked_sub(1) {
        Some(b) => self.bursts = b,
        None => log::warn!("burst end with no pending burst, ignored"),
      }
    }
  }

  /// Read side: the destination buffer must hold everything already in
  /// flight plus the next burst
  pub fn read_credit(&self, fifo_free: u32, burst_len: u32) -> bool {
    fifo_free >= self.words + burst_len
  }

  /// Write side: the source buffer must already hold the whole burst
  pub fn write_credit(fifo_level: u32, burst_len: u32) -> bool {
    fifo_level >= burst_len
  }
}
