//! Register command scripts.
//!
//! ```text
//! WR 80000000 00000100   # write: hex address, hex data
//! RD 80000004 00000010   # read and compare
//! RP 80000010 00000000   # poll until equal
//! WT 1                   # wait for IRQ line 1
//! ST 20                  # stall 20 cycles
//! ```

use std::fs;
use std::path::Path;

use serde::Serialize;

use crate::error::{Result, SimError};
use crate::system::DmaSystem;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptCmd {
  Write { addr: u32, data: u32 },
  Read { addr: u32, expected: u32 },
  Poll { addr: u32, expected: u32 },
  WaitIrq(usize),
  Stall(u64),
}

#[derive(Debug, Clone)]
pub struct Script {
  pub name: String,
  /// Commands with their source line numbers
  pub cmds: Vec<(usize, ScriptCmd)>,
}

fn parse_hex(token: &str) -> std::result::Result<u32, String> {
  let digits = token.trim_start_matches("0x").trim_start_matches("0X");
  u32::from_str_radix(digits, 16).map_err(|e| format!("bad hex value '{}': {}", token, e))
}

fn parse_dec(token: &str) -> std::result::Result<u64, String> {
  token.parse().map_err(|e| format!("bad count '{}': {}", token, e))
}

fn parse_line(line: &str) -> std::result::Result<Option<ScriptCmd>, String> {
  let tokens: Vec<&str> = line.split_whitespace().collect();
  let Some((&op, args)) = tokens.split_first() else {
    return Ok(None);
  };
  let want = |n: usize| {
    if args.len() == n {
      Ok(())
    } else {
      Err(format!("{} takes {} argument(s), got {}", op, n, args.len()))
    }
  };
  let cmd = match op.to_ascii_uppercase().as_str() {
    "WR" => {
      want(2)?;
      ScriptCmd::Write {
        addr: parse_hex(args[0])?,
        data: parse_hex(args[1])?,
      }
    },
    "RD" => {
      want(2)?;
      ScriptCmd::Read {
        addr: parse_hex(args[0])?,
        expected: parse_hex(args[1])?,
      }
    },
    "RP" => {
      want(2)?;
      ScriptCmd::Poll {
        addr: parse_hex(args[0])?,
        expected: parse_hex(args[1])?,
      }
    },
    "WT" => {
      want(1)?;
      ScriptCmd::WaitIrq(parse_dec(args[0])? as usize)
    },
    "ST" => {
      want(1)?;
      ScriptCmd::Stall(parse_dec(args[0])?)
    },
    other => return Err(format!("unknown command '{}'", other)),
  };
  Ok(Some(cmd))
}

pub fn parse_script(text: &str, name: &str) -> Result<Script> {
  let mut cmds = Vec::new();
  for (n, raw) in text.lines().enumerate() {
    let line = raw.split('#').next().unwrap_or("");
    match parse_line(line) {
      Ok(Some(cmd)) => cmds.push((n + 1, cmd)),
      Ok(None) => {},
      Err(msg) => return Err(SimError::parse(name, n + 1, msg)),
    }
  }
  Ok(Script {
    name: name.to_string(),
    cmds,
  })
}

pub fn load_script(path: &Path) -> Result<Script> {
  let text = fs::read_to_string(path).map_err(|e| SimError::io(path, e))?;
  parse_script(&text, &path.display().to_string())
}

/// A register read that did not return the expected value
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Mismatch {
  pub script: String,
  pub line: usize,
  pub cycle: u64,
  pub addr: u32,
  pub expected: u32,
  pub got: u32,
}

/// Plays one script against the system, one command step per cycle
#[derive(Debug, Clone)]
pub struct ScriptRunner {
  script: Script,
  pc: usize,
  stall_left: Option<u64>,
  mismatches: Vec<Mismatch>,
}

impl ScriptRunner {
  pub fn new(script: Script) -> Self {
    Self {
      script,
      pc: 0,
      stall_left: None,
      mismatches: Vec::new(),
    }
  }

  pub fn name(&self) -> &str {
    &self.script.name
  }

  pub fn is_done(&self) -> bool {
    self.pc >= self.script.cmds.len()
  }

  pub fn mismatches(&self) -> &[Mismatch] {
    &self.mismatches
  }

  /// Source line of the command being executed
  pub fn current_line(&self) -> Option<usize> {
    self.script.cmds.get(self.pc).map(|(line, _)| *line)
  }

  /// Execute (or keep waiting on) the current command
  pub fn step(&mut self, sys: &mut DmaSystem) {
    let Some(&(line, cmd)) = self.script.cmds.get(self.pc) else {
      return;
    };
    let advance = match cmd {
      ScriptCmd::Write { addr, data } => {
        sys.reg_write(addr, data);
        true
      },
      ScriptCmd::Read { addr, expected } => {
        let got = sys.reg_read(addr);
        if got != expected {
          log::error!(
            "{}:{} RD {:08x}: expected {:08x}, got {:08x}",
            self.script.name,
            line,
            addr,
            expected,
            got
          );
          self.mismatches.push(Mismatch {
            script: self.script.name.clone(),
            line,
            cycle: sys.cycle(),
            addr,
            expected,
            got,
          });
        }
        true
      },
      ScriptCmd::Poll { addr, expected } => sys.reg_read(addr) == expected,
      ScriptCmd::WaitIrq(n) => sys.irq(n),
      ScriptCmd::Stall(n) => {
        let left = self.stall_left.unwrap_or(n);
        if left == 0 {
          self.stall_left = None;
          true
        } else {
          self.stall_left = Some(left - 1);
          false
        }
      },
    };
    if advance {
      self.pc += 1;
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_all_commands() {
    let text = "# setup\nWR 80000000 00000100  # start\nrd 80000004 10\nRP 10 0\nWT 1\nST 5\n\n";
    let script = parse_script(text, "t").unwrap();
    let cmds: Vec<ScriptCmd> = script.cmds.iter().map(|(_, c)| *c).collect();
    assert_eq!(
      cmds,
      vec![
        ScriptCmd::Write { addr: 0x8000_0000, data: 0x100 },
        ScriptCmd::Read { addr: 0x8000_0004, expected: 0x10 },
        ScriptCmd::Poll { addr: 0x10, expected: 0 },
        ScriptCmd::WaitIrq(1),
        ScriptCmd::Stall(5),
      ]
    );
    assert_eq!(script.cmds[0].0, 2);
  }

  #[test]
  fn reports_line_of_bad_command() {
    match parse_script("WR 0 0\nXX 1\n", "bad.txt") {
      Err(SimError::Parse { line, .. }) => assert_eq!(line, 2),
      other => panic!("unexpected {:?}", other.map(|s| s.cmds.len())),
    }
    assert!(parse_script("WR 0\n", "bad.txt").is_err());
  }
}
