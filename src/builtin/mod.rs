pub mod port;
pub mod rr;
pub mod skid;

pub use port::{Channel, Wire};
pub use rr::{next_grant, RoundRobin};
pub use skid::SkidBuffer;

/// Clocked hardware module
///
/// Parents drive a module's input wires, then call `run()` once per clock
/// edge. Outputs computed from registered state are refreshed by `eval()`
/// before the parent resolves handshakes for the cycle.
pub trait Module {
  /// Refresh outputs from the current registered state
  fn eval(&mut self) {}

  /// Advance one clock edge using the inputs set by the parent
  fn run(&mut self);

  /// Synchronous reset back to the idle state
  fn reset(&mut self);

  fn name(&self) -> &str;
}
