//! Stream endpoints and the stream file format.
//!
//! A stream file holds one word per line as `data [eof]`, decimal or
//! `0x`-prefixed hex. `#` starts a comment.

use std::collections::VecDeque;
use std::fs;
use std::path::Path;

use crate::dma::{StreamBeat, StreamFifo};
use crate::error::{Result, SimError};

/// Feeds queued beats into a write FIFO
#[derive(Debug, Clone, Default)]
pub struct StreamSource {
  queue: VecDeque<StreamBeat>,
  /// Idle cycles between two pushes
  throttle: u32,
  wait: u32,
  pushed: u64,
}

impl StreamSource {
  pub fn new(throttle: u32) -> Self {
    Self {
      throttle,
      ..Self::default()
    }
  }

  pub fn extend(&mut self, beats: impl IntoIterator<Item = StreamBeat>) {
    self.queue.extend(beats);
  }

  pub fn queued(&self) -> usize {
    self.queue.len()
  }

  pub fn is_drained(&self) -> bool {
    self.queue.is_empty()
  }

  pub fn pushed(&self) -> u64 {
    self.pushed
  }

  /// One cycle: push the next beat if the FIFO takes it
  pub fn tick(&mut self, fifo: &mut StreamFifo) -> Option<StreamBeat> {
    if self.wait > 0 {
      self.wait -= 1;
      return None;
    }
    let beat = *self.queue.front()?;
    if !fifo.push(beat) {
      return None;
    }
    self.queue.pop_front();
    self.pushed += 1;
    self.wait = self.throttle;
    Some(beat)
  }

  pub fn clear(&mut self) {
    self.queue.clear();
    self.wait = 0;
  }
}

/// Drains a read FIFO and records what it saw
#[derive(Debug, Clone, Default)]
pub struct StreamSink {
  received: Vec<StreamBeat>,
  throttle: u32,
  wait: u32,
}

impl StreamSink {
  pub fn new(throttle: u32) -> Self {
    Self {
      throttle,
      ..Self::default()
    }
  }

  pub fn received(&self) -> &[StreamBeat] {
    &self.received
  }

  pub fn take(&mut self) -> Vec<StreamBeat> {
    std::mem::take(&mut self.received)
  }

  pub fn tick(&mut self, fifo: &mut StreamFifo) -> Option<StreamBeat> {
    if self.wait > 0 {
      self.wait -= 1;
      return None;
    }
    let beat = fifo.pop()?;
    self.received.push(beat);
    self.wait = self.throttle;
    Some(beat)
  }

  pub fn clear(&mut self) {
    self.received.clear();
    self.wait = 0;
  }
}

fn parse_word(token: &str) -> std::result::Result<u64, std::num::ParseIntError> {
  match token.strip_prefix("0x").or_else(|| token.strip_prefix("0X")) {
    Some(hex) => u64::from_str_radix(hex, 16),
    None => token.parse(),
  }
}

pub fn parse_stream(text: &str, file: &str) -> Result<Vec<StreamBeat>> {
  let mut beats = Vec::new();
  for (n, raw) in text.lines().enumerate() {
    let line = raw.split('#').next().unwrap_or("").trim();
    let mut tokens = line.split_whitespace();
    let Some(first) = tokens.next() else {
      continue;
    };
    let data = parse_word(first).map_err(|e| SimError::parse(file, n + 1, format!("bad word '{}': {}", first, e)))?;
    let last = match tokens.next() {
      None => false,
      Some(t) if t.eq_ignore_ascii_case("eof") => true,
      Some(t) => return Err(SimError::parse(file, n + 1, format!("unexpected token '{}'", t))),
    };
    beats.push(StreamBeat::new(data, last));
  }
  Ok(beats)
}

pub fn format_stream(beats: &[StreamBeat]) -> String {
  beats
    .iter()
    .map(|b| {
      if b.last {
        format!("{} eof\n", b.data)
      } else {
        format!("{}\n", b.data)
      }
    })
    .collect()
}

pub fn load_stream(path: &Path) -> Result<Vec<StreamBeat>> {
  let text = fs::read_to_string(path).map_err(|e| SimError::io(path, e))?;
  parse_stream(&text, &path.display().to_string())
}

pub fn save_stream(path: &Path, beats: &[StreamBeat]) -> Result<()> {
  fs::write(path, format_stream(beats)).map_err(|e| SimError::io(path, e))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_decimal_hex_and_eof() {
    let beats = parse_stream("# frame\n1\n0x10 eof\n\n  7   # tail\n", "s").unwrap();
    assert_eq!(
      beats,
      vec![StreamBeat::new(1, false), StreamBeat::new(16, true), StreamBeat::new(7, false)]
    );
    assert!(parse_stream("1 end\n", "s").is_err());
  }

  #[test]
  fn throttled_source_pushes_every_other_cycle() {
    let mut fifo = StreamFifo::new(8, false);
    let mut src = StreamSource::new(1);
    src.extend((0..3).map(|i| StreamBeat::new(i, false)));
    let pushed: Vec<bool> = (0..5).map(|_| src.tick(&mut fifo).is_some()).collect();
    assert_eq!(pushed, vec![true, false, true, false, true]);
    assert!(src.is_drained());
  }
}
