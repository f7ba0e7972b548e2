use std::path::Path;

use super::config::AppConfig;
use super::script::{load_script, ScriptRunner};
use super::shell::{Command, Shell};
use super::trace::TraceWriter;
use super::utils::report::{PortReport, RunReport};
use crate::dma::StreamBeat;
use crate::error::Result;
use crate::memory::parse_image;
use crate::system::stream::load_stream;
use crate::system::DmaSystem;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepMode {
  Continuous,
  Step,
}

/// Drives a `DmaSystem` with register scripts, stream files and tracing
pub struct Simulator {
  system: DmaSystem,
  runners: Vec<ScriptRunner>,
  trace: Option<TraceWriter>,
  stream_refs: Vec<Option<Vec<StreamBeat>>>,
  memory_ref: Option<Vec<u64>>,
  dump_file: Option<String>,
  max_cycles: u64,
  step_mode: StepMode,
}

fn non_empty(s: &str) -> Option<&str> {
  (!s.is_empty()).then_some(s)
}

impl Simulator {
  /// Build the system and load every file the config names
  pub fn new(config: &AppConfig) -> Result<Self> {
    let mut system = DmaSystem::new(config.system_params()?)?;

    if let Some(path) = non_empty(&config.memory.init_file) {
      system.memory_mut().load_image(Path::new(path))?;
    }
    let memory_ref = match non_empty(&config.memory.ref_file) {
      Some(path) => {
        let text = std::fs::read_to_string(path).map_err(|e| crate::error::SimError::io(path, e))?;
        Some(parse_image(&text, path)?)
      },
      None => None,
    };

    let mut runners = Vec::new();
    let mut stream_refs = Vec::new();
    for (i, port) in config.ports.iter().enumerate() {
      if let Some(path) = non_empty(&port.input_file) {
        let beats = load_stream(Path::new(path))?;
        log::info!("[port{}] {} input words from {}", i, beats.len(), path);
        system.push_stream(i, beats);
      }
      stream_refs.push(match non_empty(&port.ref_file) {
        Some(path) => Some(load_stream(Path::new(path))?),
        None => None,
      });
      for script in &port.scripts {
        runners.push(ScriptRunner::new(load_script(Path::new(script))?));
      }
    }

    let trace = match non_empty(&config.simulation.trace_file) {
      Some(path) => {
        system.capture_events(true);
        Some(TraceWriter::create(Path::new(path))?)
      },
      None => None,
    };

    Ok(Self {
      system,
      runners,
      trace,
      stream_refs,
      memory_ref,
      dump_file: non_empty(&config.memory.dump_file).map(str::to_string),
      max_cycles: config.simulation.max_cycles,
      step_mode: if config.simulation.step_mode {
        StepMode::Step
      } else {
        StepMode::Continuous
      },
    })
  }

  /// Simulator around an already built system, for programmatic use
  pub fn with_system(system: DmaSystem, runners: Vec<ScriptRunner>, max_cycles: u64) -> Self {
    let n = system.num_ports();
    Self {
      system,
      runners,
      trace: None,
      stream_refs: vec![None; n],
      memory_ref: None,
      dump_file: None,
      max_cycles,
      step_mode: StepMode::Continuous,
    }
  }

  pub fn system(&self) -> &DmaSystem {
    &self.system
  }

  pub fn system_mut(&mut self) -> &mut DmaSystem {
    &mut self.system
  }

  pub fn set_stream_ref(&mut self, port: usize, beats: Vec<StreamBeat>) {
    self.stream_refs[port] = Some(beats);
  }

  /// Scripts done and nothing moving
  pub fn finished(&self) -> bool {
    self.runners.iter().all(ScriptRunner::is_done) && self.system.is_quiescent()
  }

  pub fn run(&mut self) -> Result<RunReport> {
    match self.step_mode {
      StepMode::Continuous => self.run_continuous()?,
      StepMode::Step => self.run_step_mode()?,
    }
    if let Some(trace) = self.trace.as_mut() {
      trace.flush()?;
      log::info!("{} trace records written", trace.records());
    }
    if let Some(path) = &self.dump_file {
      self.system.memory().dump_image(Path::new(path))?;
      log::info!("memory dumped to {}", path);
    }
    Ok(self.report())
  }

  fn run_continuous(&mut self) -> Result<()> {
    log::info!("continuous mode, max {} cycles", self.max_cycles);
    while !self.finished() && self.system.cycle() < self.max_cycles {
      self.step()?;
    }
    Ok(())
  }

  fn run_step_mode(&mut self) -> Result<()> {
    println!("Step mode - Enter to step, 'si N' to step N cycles, 'c' to continue, 'q' to quit");
    let mut shell = Shell::new()?;
    loop {
      match shell.read_command(self.system.cycle())? {
        Command::Step(n) => {
          for _ in 0..n {
            if self.finished() {
              break;
            }
            self.step()?;
          }
          self.print_status();
        },
        Command::Continue => return self.run_continuous(),
        Command::Quit => return Ok(()),
      }
      if self.finished() {
        println!("all scripts done and system idle at cycle {}", self.system.cycle());
        return Ok(());
      }
    }
  }

  fn print_status(&self) {
    for (i, p) in self.system.ports().iter().enumerate() {
      println!(
        "[port{}] rd {:?} pending={} fifo={} | wr {:?} pending={} fifo={}",
        i,
        p.reader.state(),
        p.reader.pending_words(),
        p.read_fifo.level(),
        p.writer.state(),
        p.writer.pending_words(),
        p.write_fifo.level()
      );
    }
    println!(
      "[arb] rd sel={} outstanding={} | wr {:?}",
      self.system.read_arbiter().selected(),
      self.system.read_arbiter().outstanding(),
      self.system.write_arbiter().state()
    );
  }

  /// One cycle: every script takes a step, then the system ticks
  pub fn step(&mut self) -> Result<()> {
    for runner in self.runners.iter_mut() {
      runner.step(&mut self.system);
    }
    self.system.tick();
    if let Some(trace) = self.trace.as_mut() {
      trace.write_all(&self.system.take_events())?;
    }
    Ok(())
  }

  pub fn report(&self) -> RunReport {
    let rd_grants = self.system.read_arbiter().grants();
    let wr_grants = self.system.write_arbiter().grants();
    let ports = self
      .system
      .ports()
      .iter()
      .enumerate()
      .map(|(i, p)| PortReport {
        port: i,
        reader: p.reader.stats().clone(),
        writer: p.writer.stats().clone(),
        read_error: p.reader.error(),
        write_error: p.writer.error(),
        read_grants: rd_grants[i],
        write_grants: wr_grants[i],
        dropped_descriptors: p.read_regs.dropped() + p.write_regs.dropped(),
        sink_words: p.sink.received().len(),
        sink_match: self.stream_refs[i].as_ref().map(|r| {
          let ok = r.as_slice() == p.sink.received();
          if !ok {
            log::error!("[port{}] sink got {} words, reference has {}", i, p.sink.received().len(), r.len());
          }
          ok
        }),
      })
      .collect();

    let memory_match = self.memory_ref.as_ref().map(|r| {
      let words = self.system.memory().words();
      match r.iter().zip(words).position(|(a, b)| a != b) {
        Some(i) => {
          log::error!("memory word {} is {:#018x}, expected {:#018x}", i, words[i], r[i]);
          false
        },
        None => r.len() <= words.len(),
      }
    });

    RunReport {
      cycles: self.system.cycle(),
      timed_out: !self.finished(),
      ports,
      memory: *self.system.memory().stats(),
      memory_match,
      mismatches: self.runners.iter().flat_map(|r| r.mismatches().iter().cloned()).collect(),
    }
  }
}
