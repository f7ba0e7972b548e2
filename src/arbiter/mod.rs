//! Shared-bus arbiters: N engine-side ports onto one memory-side port.

pub mod ownership;
pub mod read;
pub mod write;

pub use ownership::OwnershipQueue;
pub use read::{ReadArbiter, ReadArbiterConfig};
pub use write::{WriteArbState, WriteArbiter};

/// Bit set of requesters with a valid signal
pub(crate) fn request_mask(valid: impl Iterator<Item = bool>) -> u32 {
  valid
    .enumerate()
    .fold(0u32, |acc, (i, v)| if v { acc | (1 << i) } else { acc })
}
