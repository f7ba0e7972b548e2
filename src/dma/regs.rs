//! Descriptor register file of one engine.
//!
//! Registers are 32 bits wide and sit at byte offset `reg << 2`. START,
//! LENGTH and BURST are staging registers; writing 1 to VALID copies them
//! into a one-deep holding register that the engine absorbs when idle.

use super::burst::TransferDescriptor;
use crate::bus::Resp;

pub const REG_START: u32 = 0;
pub const REG_LENGTH: u32 = 1;
pub const REG_BURST: u32 = 2;
pub const REG_VALID: u32 = 3;
pub const REG_REMAINING: u32 = 4;
pub const REG_ERROR: u32 = 5;
pub const REG_FIFO: u32 = 6;
pub const REG_IRQ: u32 = 7;

/// Register index addressed by a byte offset
pub fn reg_index(offset: u32) -> u32 {
  (offset >> 2) & 0x7
}

/// Live engine state visible through the read-only registers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStatus {
  pub remaining: u32,
  pub error: Resp,
  pub fifo_level: u32,
}

#[derive(Debug, Clone, Default)]
pub struct DescriptorRegs {
  start: u32,
  length: u32,
  burst: u32,
  holding: Option<TransferDescriptor>,
  irq: bool,
  clear_error: bool,
  dropped: u64,
}

impl DescriptorRegs {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn write(&mut self, reg: u32, value: u32) {
    match reg {
      REG_START => self.start = value,
      REG_LENGTH => self.length = value,
      REG_BURST => self.burst = value,
      REG_VALID => {
        if value & 1 == 0 {
          return;
        }
        let desc = TransferDescriptor::new(self.start as u64, self.length, self.burst);
        if self.holding.is_some() {
          self.dropped += 1;
          log::warn!(
            "descriptor start={:#x} len={} dropped: holding register full",
            desc.start_address,
            desc.length_words
          );
        } else {
          self.holding = Some(desc);
        }
      },
      REG_ERROR => self.clear_error = true,
      REG_IRQ => self.irq = value & 1 != 0,
      _ => log::warn!("write to read-only register {}", reg),
    }
  }

  pub fn read(&self, reg: u32, status: &EngineStatus) -> u32 {
    match reg {
      REG_START => self.start,
      REG_LENGTH => self.length,
      REG_BURST => self.burst,
      REG_VALID => self.holding.is_some() as u32,
      REG_REMAINING => status.remaining,
      REG_ERROR => status.error.code() as u32,
      REG_FIFO => status.fifo_level,
      REG_IRQ => self.irq as u32,
      _ => 0,
    }
  }

  /// Descriptor offered to the engine this cycle
  pub fn pending(&self) -> Option<TransferDescriptor> {
    self.holding
  }

  /// The engine accepted the held descriptor
  pub fn consume(&mut self) {
    self.holding = None;
  }

  /// Engine raised `done`
  pub fn raise_irq(&mut self) {
    self.irq = true;
  }

  pub fn irq(&self) -> bool {
    self.irq
  }

  /// One-cycle error-clear pulse, reset once read
  pub fn take_clear_error(&mut self) -> bool {
    std::mem::take(&mut self.clear_error)
  }

  pub fn dropped(&self) -> u64 {
    self.dropped
  }

  pub fn reset(&mut self) {
    *self = Self::default();
  }
}
