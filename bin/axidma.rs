use std::path::PathBuf;
use std::process::ExitCode;

use axidma::bus::BusGeometry;
use axidma::dma::TransferDescriptor;
use axidma::simulator::config::{load_and_merge_configs, CliOverrides};
use axidma::simulator::testgen::{write_vectors, LoopbackParams};
use axidma::simulator::utils::log::{init_log, set_quiet};
use axidma::simulator::Simulator;
use axidma::SimError;
use clap::{Parser, Subcommand};

/// axidma - cycle-level burst DMA and bus arbiter simulator
#[derive(Parser, Debug)]
#[command(name = "axidma")]
#[command(version = "0.1.0")]
#[command(about = "Cycle-level AXI3 burst DMA simulator", long_about = None)]
struct Args {
  /// Quiet mode (warnings and errors only)
  #[arg(short, long, global = true)]
  quiet: bool,

  #[command(subcommand)]
  cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
  /// Run a simulation described by a TOML config
  Run {
    /// Config file, layered over the built-in defaults
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable step mode (interactive stepping)
    #[arg(short, long)]
    step: bool,

    /// Output trace file path (JSON lines)
    #[arg(long, value_name = "FILE")]
    trace_file: Option<String>,

    /// Stop after this many cycles
    #[arg(long, value_name = "N")]
    max_cycles: Option<u64>,
  },

  /// Print the burst decomposition of one descriptor
  Plan {
    /// Start byte address (decimal or 0x hex)
    #[arg(value_parser = parse_u64)]
    address: u64,

    /// Length in words
    length: u32,

    /// Max burst words (clamped to 1..16)
    #[arg(short, long, default_value_t = 16)]
    burst: u32,

    #[arg(short, long, default_value_t = 8)]
    word_bytes: u32,
  },

  /// Generate loopback vectors, scripts and a config
  Gen {
    /// Output directory
    #[arg(short, long, default_value = "loopback")]
    out: PathBuf,

    #[arg(long, default_value_t = 2)]
    ports: usize,

    #[arg(long, default_value_t = 4)]
    frames: usize,

    /// Words per frame
    #[arg(long, default_value_t = 40)]
    words: usize,

    /// Writer takes frame length from the end-of-frame tag
    #[arg(long)]
    frame_mode: bool,
  },
}

fn parse_u64(s: &str) -> Result<u64, String> {
  let r = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
    Some(hex) => u64::from_str_radix(hex, 16),
    None => s.parse(),
  };
  r.map_err(|e| format!("invalid address '{}': {}", s, e))
}

fn run(args: Args) -> Result<bool, SimError> {
  match args.cmd {
    Cmd::Run {
      config,
      step,
      trace_file,
      max_cycles,
    } => {
      let cli = CliOverrides {
        quiet: args.quiet,
        step,
        trace_file,
        max_cycles,
      };
      let config = load_and_merge_configs(config.as_deref(), &cli)?;
      if config.simulation.quiet {
        set_quiet();
      }
      let mut simulator = Simulator::new(&config)?;
      let report = simulator.run()?;
      report.print();
      Ok(report.passed())
    },
    Cmd::Plan {
      address,
      length,
      burst,
      word_bytes,
    } => {
      let geometry =
        BusGeometry::new(word_bytes).ok_or_else(|| SimError::invalid(format!("bad word size {}", word_bytes)))?;
      let desc = TransferDescriptor::new(address, length, burst);
      for (i, b) in desc.bursts(geometry).enumerate() {
        println!("{:4}  addr={:#010x}  len={:2}", i, b.address, b.burst_len);
      }
      Ok(true)
    },
    Cmd::Gen {
      out,
      ports,
      frames,
      words,
      frame_mode,
    } => {
      let params = LoopbackParams {
        ports,
        frames,
        words,
        frame_mode,
        ..LoopbackParams::default()
      };
      let path = write_vectors(&params, &out)?;
      println!("config written to {}", path.display());
      Ok(true)
    },
  }
}

fn main() -> ExitCode {
  let args = Args::parse();
  init_log(args.quiet);

  match run(args) {
    Ok(true) => ExitCode::SUCCESS,
    Ok(false) => ExitCode::FAILURE,
    Err(e) => {
      log::error!("{}", e);
      ExitCode::from(2)
    },
  }
}
