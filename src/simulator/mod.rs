pub mod config;
pub mod script;
pub mod shell;
pub mod simulator;
pub mod testgen;
pub mod trace;
pub mod utils;

pub use simulator::{Simulator, StepMode};
