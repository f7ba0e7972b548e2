//! Cycle-level model of a burst DMA engine pair sharing an AXI3-style
//! memory bus through round-robin arbiters.

pub mod arbiter;
pub mod builtin;
pub mod bus;
pub mod dma;
pub mod error;
pub mod memory;
pub mod simulator;
pub mod system;

pub use error::{Result, SimError};
pub use system::{DmaSystem, SystemParams};
