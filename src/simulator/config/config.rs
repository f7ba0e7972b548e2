use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::bus::{BusGeometry, MAX_BURST_WORDS};
use crate::error::{Result, SimError};
use crate::memory::{ErrorRegion, MemoryParams};
use crate::system::{PortParams, SystemParams};

const DEFAULT_CONFIG: &str = include_str!("default.toml");

/// Environment prefix, e.g. `AXIDMA_SIMULATION__MAX_CYCLES=500`
pub const ENV_PREFIX: &str = "AXIDMA";

/// Simulation section
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SimulationSection {
  #[serde(default = "default_max_cycles")]
  pub max_cycles: u64,
  #[serde(default)]
  pub quiet: bool,
  #[serde(default)]
  pub step_mode: bool,
  #[serde(default)]
  pub trace_file: String,
}

fn default_max_cycles() -> u64 {
  1_000_000
}

impl Default for SimulationSection {
  fn default() -> Self {
    Self {
      max_cycles: default_max_cycles(),
      quiet: false,
      step_mode: false,
      trace_file: String::new(),
    }
  }
}

/// Shared bus section
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BusSection {
  #[serde(default = "default_word_bytes")]
  pub word_bytes: u32,
  #[serde(default = "default_read_outstanding")]
  pub read_outstanding: usize,
  #[serde(default)]
  pub input_register: bool,
  #[serde(default)]
  pub output_register: bool,
}

fn default_word_bytes() -> u32 {
  8
}

fn default_read_outstanding() -> usize {
  4
}

impl Default for BusSection {
  fn default() -> Self {
    Self {
      word_bytes: default_word_bytes(),
      read_outstanding: default_read_outstanding(),
      input_register: false,
      output_register: false,
    }
  }
}

/// Memory responder section
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MemorySection {
  #[serde(default = "default_size_words")]
  pub size_words: usize,
  #[serde(default = "default_read_latency")]
  pub read_latency: u32,
  #[serde(default = "default_write_latency")]
  pub write_latency: u32,
  /// Image loaded before the first cycle
  #[serde(default)]
  pub init_file: String,
  /// Image the final memory contents must match
  #[serde(default)]
  pub ref_file: String,
  #[serde(default)]
  pub dump_file: String,
  #[serde(default)]
  pub error_regions: Vec<ErrorRegion>,
}

fn default_size_words() -> usize {
  1 << 14
}

fn default_read_latency() -> u32 {
  4
}

fn default_write_latency() -> u32 {
  2
}

impl Default for MemorySection {
  fn default() -> Self {
    Self {
      size_words: default_size_words(),
      read_latency: default_read_latency(),
      write_latency: default_write_latency(),
      init_file: String::new(),
      ref_file: String::new(),
      dump_file: String::new(),
      error_regions: Vec::new(),
    }
  }
}

/// One DMA port
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PortSection {
  #[serde(default = "default_fifo_depth")]
  pub fifo_depth: usize,
  #[serde(default)]
  pub frame_mode: bool,
  #[serde(default)]
  pub source_throttle: u32,
  #[serde(default)]
  pub sink_throttle: u32,
  /// Stream file fed into the write FIFO
  #[serde(default)]
  pub input_file: String,
  /// Stream file the sink output must match
  #[serde(default)]
  pub ref_file: String,
  /// Register scripts driving this port, run concurrently
  #[serde(default)]
  pub scripts: Vec<String>,
}

fn default_fifo_depth() -> usize {
  32
}

impl Default for PortSection {
  fn default() -> Self {
    Self {
      fifo_depth: default_fifo_depth(),
      frame_mode: false,
      source_throttle: 0,
      sink_throttle: 0,
      input_file: String::new(),
      ref_file: String::new(),
      scripts: Vec::new(),
    }
  }
}

/// Unified application config
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
  #[serde(default)]
  pub simulation: SimulationSection,
  #[serde(default)]
  pub bus: BusSection,
  #[serde(default)]
  pub memory: MemorySection,
  #[serde(default = "default_ports")]
  pub ports: Vec<PortSection>,
}

fn default_ports() -> Vec<PortSection> {
  vec![PortSection::default()]
}

impl Default for AppConfig {
  fn default() -> Self {
    Self {
      simulation: SimulationSection::default(),
      bus: BusSection::default(),
      memory: MemorySection::default(),
      ports: default_ports(),
    }
  }
}

impl AppConfig {
  pub fn system_params(&self) -> Result<SystemParams> {
    let geometry = BusGeometry::new(self.bus.word_bytes)
      .ok_or_else(|| SimError::invalid(format!("word_bytes {} is not 1, 2, 4 or 8", self.bus.word_bytes)))?;
    Ok(SystemParams {
      geometry,
      ports: self
        .ports
        .iter()
        .map(|p| PortParams {
          fifo_depth: p.fifo_depth,
          frame_mode: p.frame_mode,
          source_throttle: p.source_throttle,
          sink_throttle: p.sink_throttle,
        })
        .collect(),
      memory: MemoryParams {
        size_words: self.memory.size_words,
        read_latency: self.memory.read_latency,
        write_latency: self.memory.write_latency,
        read_outstanding: self.bus.read_outstanding,
        error_regions: self.memory.error_regions.clone(),
      },
      input_register: self.bus.input_register,
      output_register: self.bus.output_register,
    })
  }
}

/// Flags given on the command line; they win over every file and env layer
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
  pub quiet: bool,
  pub step: bool,
  pub trace_file: Option<String>,
  pub max_cycles: Option<u64>,
}

/// Parse the built-in default.toml
pub fn load_default_config() -> Result<AppConfig> {
  Ok(toml::from_str::<AppConfig>(DEFAULT_CONFIG)?)
}

/// Parse a single TOML file, without layering
pub fn load_config_file(path: &Path) -> Result<AppConfig> {
  let content = fs::read_to_string(path).map_err(|e| SimError::io(path, e))?;
  Ok(toml::from_str::<AppConfig>(&content)?)
}

/// Defaults, then the user file, then `AXIDMA_*` environment variables
pub fn layered_config(custom: Option<&Path>) -> Result<AppConfig> {
  let mut builder = Config::builder().add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml));
  if let Some(path) = custom {
    if !path.exists() {
      return Err(SimError::io(path, std::io::Error::from(std::io::ErrorKind::NotFound)));
    }
    builder = builder.add_source(File::new(&path.to_string_lossy(), FileFormat::Toml).required(true));
  }
  let built = builder
    .add_source(
      Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true),
    )
    .build()?;
  Ok(built.try_deserialize::<AppConfig>()?)
}

pub fn apply_cli_overrides(config: &mut AppConfig, cli: &CliOverrides) {
  if cli.quiet {
    config.simulation.quiet = true;
  }
  if cli.step {
    config.simulation.step_mode = true;
  }
  if let Some(file) = &cli.trace_file {
    config.simulation.trace_file = file.clone();
  }
  if let Some(n) = cli.max_cycles {
    config.simulation.max_cycles = n;
  }
}

/// Reject configs the system cannot be built from; warn about ones that
/// may stall
pub fn validate_config(config: &AppConfig) -> Result<()> {
  if BusGeometry::new(config.bus.word_bytes).is_none() {
    return Err(SimError::invalid(format!(
      "word_bytes must be 1, 2, 4 or 8, got {}",
      config.bus.word_bytes
    )));
  }
  if config.bus.read_outstanding == 0 {
    return Err(SimError::invalid("read_outstanding cannot be 0"));
  }
  if config.memory.size_words == 0 {
    return Err(SimError::invalid("memory size_words cannot be 0"));
  }
  if config.ports.is_empty() {
    return Err(SimError::invalid("at least one [[ports]] entry is required"));
  }
  for region in &config.memory.error_regions {
    if region.start >= region.end {
      return Err(SimError::invalid(format!(
        "error region {:#x}..{:#x} is empty",
        region.start, region.end
      )));
    }
  }
  for (i, port) in config.ports.iter().enumerate() {
    if port.fifo_depth == 0 {
      return Err(SimError::invalid(format!("port {} fifo_depth cannot be 0", i)));
    }
    if port.fifo_depth < MAX_BURST_WORDS as usize {
      log::warn!(
        "port {} fifo_depth {} is below the {}-word burst limit; bursts longer than the FIFO never get credit",
        i,
        port.fifo_depth,
        MAX_BURST_WORDS
      );
    }
  }
  Ok(())
}

/// Make relative paths absolute against `base`, the config file's directory
pub fn resolve_paths(config: &mut AppConfig, base: &Path) {
  let sim = &mut config.simulation;
  sim.trace_file = resolve_single_path(&sim.trace_file, base);
  let mem = &mut config.memory;
  mem.init_file = resolve_single_path(&mem.init_file, base);
  mem.ref_file = resolve_single_path(&mem.ref_file, base);
  mem.dump_file = resolve_single_path(&mem.dump_file, base);
  for port in config.ports.iter_mut() {
    port.input_file = resolve_single_path(&port.input_file, base);
    port.ref_file = resolve_single_path(&port.ref_file, base);
    for script in port.scripts.iter_mut() {
      *script = resolve_single_path(script, base);
    }
  }
}

fn resolve_single_path(path_str: &str, base: &Path) -> String {
  if path_str.is_empty() || Path::new(path_str).is_absolute() {
    return path_str.to_string();
  }
  base.join(path_str).to_string_lossy().to_string()
}

/// Load and merge configs
///
/// 1. built-in defaults
/// 2. the user file, if any
/// 3. environment overrides
/// 4. CLI flags
/// 5. path resolution against the user file's directory
/// 6. validation
pub fn load_and_merge_configs(custom: Option<&Path>, cli: &CliOverrides) -> Result<AppConfig> {
  let mut config = layered_config(custom)?;
  apply_cli_overrides(&mut config, cli);

  let base = match custom.and_then(Path::parent) {
    Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
    _ => PathBuf::from("."),
  };
  resolve_paths(&mut config, &base);
  validate_config(&config)?;
  Ok(config)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults_parse_and_validate() {
    let config = load_default_config().unwrap();
    assert_eq!(config.bus.word_bytes, 8);
    assert_eq!(config.ports.len(), 1);
    validate_config(&config).unwrap();
    assert_eq!(config.system_params().unwrap().ports[0].fifo_depth, 32);
  }

  #[test]
  fn rejects_bad_word_size() {
    let mut config = AppConfig::default();
    config.bus.word_bytes = 3;
    assert!(matches!(validate_config(&config), Err(SimError::InvalidConfig(_))));
  }

  #[test]
  fn relative_paths_follow_config_dir() {
    let mut config = AppConfig::default();
    config.ports[0].scripts = vec!["w.txt".into(), "/abs/r.txt".into()];
    resolve_paths(&mut config, Path::new("/cfg"));
    assert_eq!(config.ports[0].scripts, vec!["/cfg/w.txt".to_string(), "/abs/r.txt".to_string()]);
    assert_eq!(config.memory.init_file, "");
  }

  #[test]
  fn cli_wins() {
    let mut config = AppConfig::default();
    apply_cli_overrides(
      &mut config,
      &CliOverrides {
        quiet: true,
        max_cycles: Some(10),
        ..CliOverrides::default()
      },
    );
    assert!(config.simulation.quiet);
    assert_eq!(config.simulation.max_cycles, 10);
  }
}
