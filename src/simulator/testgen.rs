//! Loopback test vectors.
//!
//! Every port streams `frames` frames of `words` words into memory with its
//! writer and reads each frame back out with its reader, so the sink must
//! see exactly the input stream. The reader script clears the writer IRQ
//! once it has seen it, and the writer script waits for that clear before
//! queueing its next frame, so two completions never merge into one
//! sticky IRQ bit.

use std::fs;
use std::path::{Path, PathBuf};

use crate::dma::regs::{REG_BURST, REG_IRQ, REG_LENGTH, REG_START, REG_VALID};
use crate::dma::StreamBeat;
use crate::error::{Result, SimError};
use crate::memory::format_image;
use crate::simulator::config::config::{AppConfig, PortSection};
use crate::system::reg_address;
use crate::system::stream::format_stream;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopbackParams {
  pub ports: usize,
  pub frames: usize,
  pub words: usize,
  /// Writer length comes from the end-of-frame tag (LENGTH written as 0)
  pub frame_mode: bool,
  pub word_bytes: u32,
}

impl Default for LoopbackParams {
  fn default() -> Self {
    Self {
      ports: 2,
      frames: 4,
      words: 40,
      frame_mode: false,
      word_bytes: 8,
    }
  }
}

pub struct LoopbackVectors {
  pub inputs: Vec<Vec<StreamBeat>>,
  pub writer_scripts: Vec<String>,
  pub reader_scripts: Vec<String>,
  pub memory_ref: Vec<u64>,
  pub memory_words: usize,
}

/// Data of word `i` on port `p`
pub fn pattern(port: usize, i: usize) -> u64 {
  (((port + 1) * i) % 256) as u64
}

/// Burst size used for frame `f`
pub fn frame_burst(f: usize) -> u32 {
  (f % 16) as u32 + 1
}

/// Byte address of a frame; `None` when it does not fit the 32-bit START register
fn frame_address(params: &LoopbackParams, port: usize, frame: usize) -> Option<u32> {
  let words = (port as u64)
    .checked_mul(params.frames as u64)?
    .checked_add(frame as u64)?
    .checked_mul(params.words as u64)?;
  u32::try_from(words.checked_mul(params.word_bytes as u64)?).ok()
}

fn wr(script: &mut String, port: usize, reader: bool, reg: u32, data: u32, comment: &str) {
  let addr = reg_address(port, reader, reg);
  if comment.is_empty() {
    script.push_str(&format!("WR {:08x} {:08x}\n", addr, data));
  } else {
    script.push_str(&format!("WR {:08x} {:08x}  # {}\n", addr, data, comment));
  }
}

pub fn generate(params: &LoopbackParams) -> Result<LoopbackVectors> {
  let too_big = || {
    SimError::invalid(format!(
      "{} port(s) x {} frame(s) x {} words do not fit a 32-bit address space",
      params.ports, params.frames, params.words
    ))
  };
  let total_words = params
    .ports
    .checked_mul(params.frames)
    .and_then(|n| n.checked_mul(params.words))
    .ok_or_else(too_big)?;
  // Every frame must start at an address the START register can hold
  if (total_words as u64).saturating_mul(params.word_bytes as u64) > u32::MAX as u64 {
    return Err(too_big());
  }
  let memory_words = total_words.max(1024);
  let mut memory_ref = vec![0u64; memory_words];
  let mut inputs = Vec::new();
  let mut writer_scripts = Vec::new();
  let mut reader_scripts = Vec::new();

  for p in 0..params.ports {
    let mut beats = Vec::with_capacity(params.frames * params.words);
    let mut wscript = format!("# port {} writer\n", p);
    let mut rscript = format!("# port {} reader\n", p);
    let (wirq, rirq) = (2 * p, 2 * p + 1);

    for f in 0..params.frames {
      let addr = frame_address(params, p, f).ok_or_else(too_big)?;
      let base = addr as usize / params.word_bytes as usize;
      for w in 0..params.words {
        let i = f * params.words + w;
        let data = pattern(p, i);
        beats.push(StreamBeat::new(data, w + 1 == params.words));
        memory_ref[base + w] = data;
      }

      let len = if params.frame_mode { 0 } else { params.words as u32 };
      wr(&mut wscript, p, false, REG_START, addr, &format!("write frame {}", f));
      wr(&mut wscript, p, false, REG_LENGTH, len, "");
      wr(&mut wscript, p, false, REG_BURST, frame_burst(f), "");
      wr(&mut wscript, p, false, REG_VALID, 1, "");
      wr(&mut wscript, p, false, REG_VALID, 0, "");
      wscript.push_str(&format!("WT {}  # wait for writer (frame {})\n", wirq, f));
      let irq = reg_address(p, false, REG_IRQ);
      wscript.push_str(&format!("RP {:08x} 00000000  # reader took frame {}\n", irq, f));

      rscript.push_str(&format!("WT {}  # wait for writer (frame {})\n", wirq, f));
      wr(&mut rscript, p, false, REG_IRQ, 0, "clear writer irq");
      wr(&mut rscript, p, true, REG_START, addr, &format!("read frame {}", f));
      wr(&mut rscript, p, true, REG_LENGTH, params.words as u32, "");
      wr(&mut rscript, p, true, REG_BURST, frame_burst(f), "");
      wr(&mut rscript, p, true, REG_VALID, 1, "");
      wr(&mut rscript, p, true, REG_VALID, 0, "");
      rscript.push_str(&format!("WT {}  # wait for reader (frame {})\n", rirq, f));
      wr(&mut rscript, p, true, REG_IRQ, 0, "clear reader irq");
    }

    inputs.push(beats);
    writer_scripts.push(wscript);
    reader_scripts.push(rscript);
  }

  Ok(LoopbackVectors {
    inputs,
    writer_scripts,
    reader_scripts,
    memory_ref,
    memory_words,
  })
}

/// Write the vectors and a config wiring them together; returns the
/// config path
pub fn write_vectors(params: &LoopbackParams, dir: &Path) -> Result<PathBuf> {
  fs::create_dir_all(dir).map_err(|e| SimError::io(dir, e))?;
  let vectors = generate(params)?;
  let write = |name: &str, text: &str| -> Result<()> {
    let path = dir.join(name);
    fs::write(&path, text).map_err(|e| SimError::io(&path, e))
  };

  let mut config = AppConfig::default();
  config.bus.word_bytes = params.word_bytes;
  config.memory.size_words = vectors.memory_words;
  config.memory.ref_file = "memref.dat".to_string();
  config.ports.clear();

  for p in 0..params.ports {
    let input = format!("port{}_in.dat", p);
    let reference = format!("port{}_ref.dat", p);
    let wscript = format!("port{}_wr.txt", p);
    let rscript = format!("port{}_rd.txt", p);
    let stream = format_stream(&vectors.inputs[p]);
    write(&input, &stream)?;
    write(&reference, &stream)?;
    write(&wscript, &vectors.writer_scripts[p])?;
    write(&rscript, &vectors.reader_scripts[p])?;
    config.ports.push(PortSection {
      frame_mode: params.frame_mode,
      input_file: input,
      ref_file: reference,
      scripts: vec![wscript, rscript],
      ..PortSection::default()
    });
  }
  write("memref.dat", &format_image(&vectors.memory_ref))?;

  let text = toml::to_string_pretty(&config).map_err(|e| SimError::invalid(format!("cannot encode config: {}", e)))?;
  let path = dir.join("loopback.toml");
  write("loopback.toml", &text)?;
  log::info!(
    "wrote {} port(s) x {} frame(s) x {} words to {}",
    params.ports,
    params.frames,
    params.words,
    dir.display()
  );
  Ok(path)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::simulator::script::parse_script;

  #[test]
  fn pattern_and_eof_placement() {
    let v = generate(&LoopbackParams {
      ports: 2,
      frames: 2,
      words: 3,
      ..LoopbackParams::default()
    })
    .unwrap();
    let data: Vec<u64> = v.inputs[1].iter().map(|b| b.data).collect();
    assert_eq!(data, vec![0, 2, 4, 6, 8, 10]);
    let eofs: Vec<bool> = v.inputs[0].iter().map(|b| b.last).collect();
    assert_eq!(eofs, vec![false, false, true, false, false, true]);
  }

  #[test]
  fn scripts_parse() {
    let v = generate(&LoopbackParams::default()).unwrap();
    for text in v.writer_scripts.iter().chain(v.reader_scripts.iter()) {
      parse_script(text, "gen").unwrap();
    }
  }

  #[test]
  fn oversized_layout_is_rejected() {
    let params = LoopbackParams {
      ports: 32,
      frames: 1 << 16,
      words: 1 << 12,
      ..LoopbackParams::default()
    };
    assert!(matches!(generate(&params), Err(SimError::InvalidConfig(_))));
  }
}
