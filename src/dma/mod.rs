//! Burst transfer engines and their per-engine building blocks.

pub mod burst;
pub mod credit;
pub mod fifo;
pub mod reader;
pub mod regs;
pub mod writer;

use serde::Serialize;

pub use burst::{BurstPlan, BurstRequest, TransferDescriptor};
pub use credit::PendingTracker;
pub use fifo::{StreamBeat, StreamFifo};
pub use reader::{ReadEngine, ReadState};
pub use regs::{DescriptorRegs, EngineStatus};
pub use writer::{WriteEngine, WriteState};

/// Per-engine counters for the end-of-run report
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EngineStats {
  pub bursts: u64,
  pub words: u64,
  pub transfers: u64,
  pub errors: u64,
}
